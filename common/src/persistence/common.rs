use std::fmt;

use bytes::Bytes;
use futures::stream::BoxStream;

use crate::{
    error::{ConversionError, ConversionResult},
    util::names::is_valid_storage_name,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    Uploads,
    Converted,
}

impl Partition {
    pub fn dir_name(&self) -> &'static str {
        match self {
            Partition::Uploads => "uploads",
            Partition::Converted => "converted",
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

pub type ByteStream = BoxStream<'static, std::io::Result<Bytes>>;

pub struct StoredFile {
    pub name: String,
    pub size: u64,
    pub content: ByteStream,
}

/// Flat, name addressed staging area with an `uploads` and a `converted`
/// partition. A `put` is all or nothing: readers see the old state or the
/// complete new file.
#[async_trait::async_trait]
pub trait IStorageArea: Send + Sync {
    /// Creates the partition if missing. Idempotent.
    async fn ensure(&self, partition: Partition) -> ConversionResult<()>;
    async fn put(&self, partition: Partition, name: &str, content: Bytes) -> ConversionResult<()>;
    async fn get(&self, partition: Partition, name: &str) -> ConversionResult<Bytes>;
    async fn exists(&self, partition: Partition, name: &str) -> ConversionResult<bool>;
    async fn list(&self, partition: Partition) -> ConversionResult<Vec<String>>;
    async fn stream(&self, partition: Partition, name: &str) -> ConversionResult<StoredFile>;
}

pub(crate) fn check_readable_name(name: &str) -> ConversionResult<()> {
    if is_valid_storage_name(name) {
        Ok(())
    } else {
        Err(ConversionError::NotFound(format!("File '{}'", name)))
    }
}

pub(crate) fn check_writable_name(name: &str) -> ConversionResult<()> {
    if is_valid_storage_name(name) {
        Ok(())
    } else {
        Err(ConversionError::invalid_request(format!("'{}' is not a valid storage name", name)))
    }
}

pub(crate) fn not_found(partition: Partition, name: &str) -> ConversionError {
    ConversionError::NotFound(format!("File '{}' in {}", name, partition))
}
