use std::{path::Path, str::FromStr};

use mime::Mime;

use crate::models::{DocumentFormat, ImageFormat};

/// Declared mime type if it parses, otherwise a guess from the extension.
pub fn get_content_type(mime_type: Option<&str>, filename: &str) -> Mime {
    if let Some(mime_type) = mime_type {
        if let Ok(content_type) = Mime::from_str(mime_type) {
            return content_type;
        }
    }
    if let Some(extension) = Path::new(filename).extension() {
        if let Some(extension) = extension.to_str() {
            if let Some(format) = ImageFormat::from_extension(extension) {
                return format.mime_type();
            }
            if let Some(format) = DocumentFormat::from_extension(extension) {
                return format.mime_type();
            }
        }
    }
    mime::APPLICATION_OCTET_STREAM
}
