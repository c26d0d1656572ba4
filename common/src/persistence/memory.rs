use std::collections::{HashMap, HashSet};

use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::RwLock;

use crate::error::ConversionResult;

use super::{
    common::{check_readable_name, check_writable_name, not_found},
    IStorageArea, Partition, StoredFile,
};

/// In-memory storage area, for tests and ephemeral deployments.
#[derive(Default)]
pub struct MemoryStorageArea {
    partitions: RwLock<HashSet<Partition>>,
    files: RwLock<HashMap<(Partition, String), Bytes>>,
}

impl MemoryStorageArea {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn has_partition(&self, partition: Partition) -> bool {
        self.partitions.read().await.contains(&partition)
    }
}

#[async_trait::async_trait]
impl IStorageArea for MemoryStorageArea {
    async fn ensure(&self, partition: Partition) -> ConversionResult<()> {
        self.partitions.write().await.insert(partition);
        Ok(())
    }

    async fn put(&self, partition: Partition, name: &str, content: Bytes) -> ConversionResult<()> {
        check_writable_name(name)?;
        self.ensure(partition).await?;
        self.files.write().await.insert((partition, name.to_string()), content);
        Ok(())
    }

    async fn get(&self, partition: Partition, name: &str) -> ConversionResult<Bytes> {
        check_readable_name(name)?;
        self.files
            .read()
            .await
            .get(&(partition, name.to_string()))
            .cloned()
            .ok_or_else(|| not_found(partition, name))
    }

    async fn exists(&self, partition: Partition, name: &str) -> ConversionResult<bool> {
        Ok(self.files.read().await.contains_key(&(partition, name.to_string())))
    }

    async fn list(&self, partition: Partition) -> ConversionResult<Vec<String>> {
        let mut names: Vec<String> = self
            .files
            .read()
            .await
            .keys()
            .filter(|(file_partition, _)| *file_partition == partition)
            .map(|(_, name)| name.clone())
            .collect();
        names.sort();
        Ok(names)
    }

    async fn stream(&self, partition: Partition, name: &str) -> ConversionResult<StoredFile> {
        let content = self.get(partition, name).await?;
        Ok(StoredFile {
            name: name.to_string(),
            size: content.len() as u64,
            content: futures::stream::once(async move { Ok(content) }).boxed(),
        })
    }
}
