use std::sync::Arc;

use bytes::Bytes;
use mime::Mime;
use tracing::info;

use crate::{
    error::{ConversionError, ConversionResult},
    models::UploadedFile,
    persistence::{IStorageArea, Partition, StoredFile},
    util::{mime::get_content_type, random::generate_storage_name},
};

/// A file as it arrived in a request, before it has a storage name.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub original_name: String,
    pub mime_type: Option<String>,
    pub content: Bytes,
}

pub struct Download {
    pub file: StoredFile,
    pub content_type: Mime,
}

#[async_trait::async_trait]
pub trait IFileService: Send + Sync {
    async fn upload(&self, file: Option<IncomingFile>) -> ConversionResult<UploadedFile>;
    async fn download(&self, storage_name: &str) -> ConversionResult<Download>;
}

pub struct FileService {
    pub storage: Arc<dyn IStorageArea>,
}

#[async_trait::async_trait]
impl IFileService for FileService {
    #[tracing::instrument(skip(self, file))]
    async fn upload(&self, file: Option<IncomingFile>) -> ConversionResult<UploadedFile> {
        let file = file.ok_or_else(|| ConversionError::invalid_request("No file uploaded"))?;
        let storage_name = generate_storage_name();
        let mime_type = get_content_type(file.mime_type.as_deref(), &file.original_name);
        let size_bytes = file.content.len() as u64;
        self.storage.put(Partition::Uploads, &storage_name, file.content).await?;
        info!("Uploaded '{}' as {} ({} bytes)", &file.original_name, &storage_name, size_bytes);
        Ok(UploadedFile {
            storage_name,
            original_name: file.original_name,
            mime_type: mime_type.to_string(),
            size_bytes,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn download(&self, storage_name: &str) -> ConversionResult<Download> {
        let file = self.storage.stream(Partition::Converted, storage_name).await?;
        let content_type = get_content_type(None, &file.name);
        Ok(Download { file, content_type })
    }
}
