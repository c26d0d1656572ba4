use std::{io::ErrorKind, path::PathBuf};

use bytes::Bytes;
use futures::StreamExt;
use tokio::fs;
use tokio_util::io::ReaderStream;
use tracing::info;

use crate::{
    error::ConversionResult,
    util::{names::is_valid_storage_name, random::generate_alphanumeric},
};

use super::{
    common::{check_readable_name, check_writable_name, not_found},
    IStorageArea, Partition, StoredFile,
};

/// Storage area on the local filesystem: `<root>/uploads` and `<root>/converted`.
pub struct LocalStorageArea {
    root: PathBuf,
}

impl LocalStorageArea {
    pub async fn build(root: impl Into<PathBuf>) -> ConversionResult<Self> {
        let storage = LocalStorageArea { root: root.into() };
        storage.ensure(Partition::Uploads).await?;
        storage.ensure(Partition::Converted).await?;
        Ok(storage)
    }

    fn partition_path(&self, partition: Partition) -> PathBuf {
        self.root.join(partition.dir_name())
    }

    fn file_path(&self, partition: Partition, name: &str) -> PathBuf {
        self.partition_path(partition).join(name)
    }
}

#[async_trait::async_trait]
impl IStorageArea for LocalStorageArea {
    async fn ensure(&self, partition: Partition) -> ConversionResult<()> {
        fs::create_dir_all(self.partition_path(partition)).await?;
        Ok(())
    }

    async fn put(&self, partition: Partition, name: &str, content: Bytes) -> ConversionResult<()> {
        check_writable_name(name)?;
        self.ensure(partition).await?;
        // Dot-prefixed names are never valid storage names, so the partial
        // file stays invisible to get/list until the rename.
        let partial = self.file_path(partition, &format!(".{}.{}.part", name, generate_alphanumeric(8)));
        if let Err(err) = fs::write(&partial, &content).await {
            _ = fs::remove_file(&partial).await;
            return Err(err.into());
        }
        if let Err(err) = fs::rename(&partial, self.file_path(partition, name)).await {
            _ = fs::remove_file(&partial).await;
            return Err(err.into());
        }
        info!("Stored {} bytes as {}/{}", content.len(), partition, name);
        Ok(())
    }

    async fn get(&self, partition: Partition, name: &str) -> ConversionResult<Bytes> {
        check_readable_name(name)?;
        match fs::read(self.file_path(partition, name)).await {
            Ok(content) => Ok(Bytes::from(content)),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(not_found(partition, name)),
            Err(err) => Err(err.into()),
        }
    }

    async fn exists(&self, partition: Partition, name: &str) -> ConversionResult<bool> {
        if !is_valid_storage_name(name) {
            return Ok(false);
        }
        match fs::metadata(self.file_path(partition, name)).await {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn list(&self, partition: Partition) -> ConversionResult<Vec<String>> {
        let mut entries = match fs::read_dir(self.partition_path(partition)).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(err) => return Err(err.into()),
        };
        let mut names = vec![];
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                if is_valid_storage_name(name) && entry.file_type().await?.is_file() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    async fn stream(&self, partition: Partition, name: &str) -> ConversionResult<StoredFile> {
        check_readable_name(name)?;
        let file = match fs::File::open(self.file_path(partition, name)).await {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Err(not_found(partition, name)),
            Err(err) => return Err(err.into()),
        };
        let metadata = file.metadata().await?;
        if !metadata.is_file() {
            return Err(not_found(partition, name));
        }
        Ok(StoredFile {
            name: name.to_string(),
            size: metadata.len(),
            content: ReaderStream::new(file).boxed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use futures::TryStreamExt;

    use super::*;
    use crate::error::ConversionError;

    #[tokio::test]
    async fn creates_both_partitions() {
        let root = tempfile::tempdir().unwrap();
        LocalStorageArea::build(root.path()).await.unwrap();
        assert!(root.path().join("uploads").is_dir());
        assert!(root.path().join("converted").is_dir());
    }

    #[tokio::test]
    async fn put_get_list_and_stream() {
        let root = tempfile::tempdir().unwrap();
        let storage = LocalStorageArea::build(root.path()).await.unwrap();

        storage.put(Partition::Converted, "b.png", Bytes::from_static(b"png")).await.unwrap();
        storage.put(Partition::Converted, "a.jpg", Bytes::from_static(b"jpeg")).await.unwrap();

        assert_eq!(storage.get(Partition::Converted, "a.jpg").await.unwrap(), Bytes::from_static(b"jpeg"));
        assert!(storage.exists(Partition::Converted, "b.png").await.unwrap());
        assert!(!storage.exists(Partition::Uploads, "b.png").await.unwrap());
        assert_eq!(storage.list(Partition::Converted).await.unwrap(), vec!["a.jpg", "b.png"]);

        let stored = storage.stream(Partition::Converted, "b.png").await.unwrap();
        assert_eq!(stored.size, 3);
        let chunks: Vec<Bytes> = stored.content.try_collect().await.unwrap();
        assert_eq!(chunks.concat(), b"png");
    }

    #[tokio::test]
    async fn overwrite_replaces_whole_file() {
        let root = tempfile::tempdir().unwrap();
        let storage = LocalStorageArea::build(root.path()).await.unwrap();
        storage.put(Partition::Uploads, "x", Bytes::from_static(b"a much longer first version")).await.unwrap();
        storage.put(Partition::Uploads, "x", Bytes::from_static(b"short")).await.unwrap();
        assert_eq!(storage.get(Partition::Uploads, "x").await.unwrap(), Bytes::from_static(b"short"));
        assert_eq!(storage.list(Partition::Uploads).await.unwrap(), vec!["x"]);
    }

    #[tokio::test]
    async fn missing_and_escaping_names_are_not_found() {
        let root = tempfile::tempdir().unwrap();
        let storage = LocalStorageArea::build(root.path().join("store")).await.unwrap();
        std::fs::write(root.path().join("secret"), b"secret").unwrap();

        assert!(matches!(storage.get(Partition::Converted, "nope").await, Err(ConversionError::NotFound(_))));
        assert!(matches!(storage.get(Partition::Converted, "../../secret").await, Err(ConversionError::NotFound(_))));
        assert!(matches!(storage.stream(Partition::Converted, "..").await, Err(ConversionError::NotFound(_))));
        assert!(!storage.exists(Partition::Converted, "../../secret").await.unwrap());
        assert!(matches!(
            storage.put(Partition::Converted, "../escape", Bytes::new()).await,
            Err(ConversionError::InvalidRequest(_))
        ));
    }
}
