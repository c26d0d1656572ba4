use serde::{Deserialize, Serialize};

use crate::models::{ConversionState, UploadedFile};

/// Field names match what the original frontend reads.
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResultDto {
    pub message: String,
    pub filename: String,
    pub originalname: String,
    pub mimetype: String,
    pub size: u64,
}

impl From<UploadedFile> for UploadResultDto {
    fn from(file: UploadedFile) -> Self {
        UploadResultDto {
            message: "File uploaded successfully".to_string(),
            filename: file.storage_name,
            originalname: file.original_name,
            mimetype: file.mime_type,
            size: file.size_bytes,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConvertImageDto {
    pub filename: Option<String>,
    pub format: Option<String>,
    pub quality: Option<u8>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResultDto {
    pub message: String,
    pub converted_filename: String,
    pub download_url: String,
    pub status: ConversionState,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDto {
    pub error: String,
}
