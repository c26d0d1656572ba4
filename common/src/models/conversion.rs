use std::fmt;

use mime::Mime;
use serde::{Deserialize, Serialize};

use crate::error::{ConversionError, ConversionResult};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpg,
    Png,
    Webp,
    Gif,
    Bmp,
}

impl ImageFormat {
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(ImageFormat::Jpg),
            "png" => Some(ImageFormat::Png),
            "webp" => Some(ImageFormat::Webp),
            "gif" => Some(ImageFormat::Gif),
            "bmp" => Some(ImageFormat::Bmp),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Webp => "webp",
            ImageFormat::Gif => "gif",
            ImageFormat::Bmp => "bmp",
        }
    }

    pub fn mime_type(&self) -> Mime {
        match self {
            ImageFormat::Jpg => mime::IMAGE_JPEG,
            ImageFormat::Png => mime::IMAGE_PNG,
            ImageFormat::Webp => "image/webp".parse().unwrap_or(mime::APPLICATION_OCTET_STREAM),
            ImageFormat::Gif => mime::IMAGE_GIF,
            ImageFormat::Bmp => mime::IMAGE_BMP,
        }
    }

    /// Formats the image converter can encode.
    pub fn is_encodable(&self) -> bool {
        matches!(self, ImageFormat::Jpg | ImageFormat::Png | ImageFormat::Webp)
    }

    /// Only lossy encodings honour a quality setting.
    pub fn is_lossy(&self) -> bool {
        matches!(self, ImageFormat::Jpg)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Doc,
    Odt,
    Rtf,
}

impl DocumentFormat {
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "pdf" => Some(DocumentFormat::Pdf),
            "docx" => Some(DocumentFormat::Docx),
            "doc" => Some(DocumentFormat::Doc),
            "odt" => Some(DocumentFormat::Odt),
            "rtf" => Some(DocumentFormat::Rtf),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Docx => "docx",
            DocumentFormat::Doc => "doc",
            DocumentFormat::Odt => "odt",
            DocumentFormat::Rtf => "rtf",
        }
    }

    pub fn mime_type(&self) -> Mime {
        let mime_type = match self {
            DocumentFormat::Pdf => return mime::APPLICATION_PDF,
            DocumentFormat::Docx => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            DocumentFormat::Doc => "application/msword",
            DocumentFormat::Odt => "application/vnd.oasis.opendocument.text",
            DocumentFormat::Rtf => "application/rtf",
        };
        mime_type.parse().unwrap_or(mime::APPLICATION_OCTET_STREAM)
    }
}

/// What an uploaded file turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Image(ImageFormat),
    Document(DocumentFormat),
}

impl SourceKind {
    pub fn from_extension(extension: &str) -> Option<Self> {
        ImageFormat::from_extension(extension)
            .map(SourceKind::Image)
            .or_else(|| DocumentFormat::from_extension(extension).map(SourceKind::Document))
    }

    pub fn from_mime_type(mime_type: &Mime) -> Option<Self> {
        let essence = mime_type.essence_str();
        [ImageFormat::Jpg, ImageFormat::Png, ImageFormat::Webp, ImageFormat::Gif, ImageFormat::Bmp]
            .into_iter()
            .find(|format| format.mime_type().essence_str() == essence)
            .map(SourceKind::Image)
            .or_else(|| {
                [DocumentFormat::Pdf, DocumentFormat::Docx, DocumentFormat::Doc, DocumentFormat::Odt, DocumentFormat::Rtf]
                    .into_iter()
                    .find(|format| format.mime_type().essence_str() == essence)
                    .map(SourceKind::Document)
            })
    }

    /// Target used when the caller names none.
    pub fn default_target(&self) -> TargetFormat {
        match self {
            SourceKind::Image(_) => TargetFormat::Image(ImageFormat::Jpg),
            SourceKind::Document(DocumentFormat::Pdf) => TargetFormat::Document(DocumentFormat::Docx),
            SourceKind::Document(_) => TargetFormat::Document(DocumentFormat::Pdf),
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Image(format) => f.write_str(format.extension()),
            SourceKind::Document(format) => f.write_str(format.extension()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetFormat {
    Image(ImageFormat),
    Document(DocumentFormat),
}

impl TargetFormat {
    pub fn parse(format: &str) -> Option<Self> {
        let format = format.trim().trim_start_matches('.');
        match ImageFormat::from_extension(format) {
            Some(image) if image.is_encodable() => Some(TargetFormat::Image(image)),
            Some(_) => None,
            None => DocumentFormat::from_extension(format).map(TargetFormat::Document),
        }
    }

    /// Image endpoint semantics: absent or unrecognised formats become `jpg`.
    ///
    /// Kept for compatibility with existing clients of the image endpoint.
    pub fn image_or_default(format: Option<&str>) -> Self {
        match format.and_then(TargetFormat::parse) {
            Some(TargetFormat::Image(image)) => TargetFormat::Image(image),
            _ => TargetFormat::Image(ImageFormat::Jpg),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            TargetFormat::Image(format) => format.extension(),
            TargetFormat::Document(format) => format.extension(),
        }
    }

    pub fn mime_type(&self) -> Mime {
        match self {
            TargetFormat::Image(format) => format.mime_type(),
            TargetFormat::Document(format) => format.mime_type(),
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Largest width or height an image may be resized to.
pub const MAX_DIMENSION: u32 = 10_000;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct ConvertOptions {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub quality: Option<u8>,
}

impl ConvertOptions {
    pub fn validate(&self) -> ConversionResult<()> {
        if self.width == Some(0) {
            return Err(ConversionError::invalid_request("Width must be greater than 0"));
        }
        if self.height == Some(0) {
            return Err(ConversionError::invalid_request("Height must be greater than 0"));
        }
        if self.width.max(self.height).unwrap_or(0) > MAX_DIMENSION {
            return Err(ConversionError::invalid_request(format!("Width and height must not exceed {}", MAX_DIMENSION)));
        }
        if let Some(quality) = self.quality {
            if !(1..=100).contains(&quality) {
                return Err(ConversionError::invalid_request("Quality must be between 1 and 100"));
            }
        }
        Ok(())
    }

    pub fn has_resize(&self) -> bool {
        self.width.is_some() || self.height.is_some()
    }
}

/// One dispatch call. Also the fingerprint for in-flight deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversionRequest {
    pub source_storage_name: String,
    /// `None` picks the default for the classified source kind.
    pub target_format: Option<TargetFormat>,
    pub options: ConvertOptions,
    /// Client side filename; document artifacts are named after it.
    pub source_name: Option<String>,
    pub source_mime_type: Option<String>,
}

impl ConversionRequest {
    pub fn new(source_storage_name: impl Into<String>, target_format: Option<TargetFormat>) -> Self {
        ConversionRequest {
            source_storage_name: source_storage_name.into(),
            target_format,
            options: ConvertOptions::default(),
            source_name: None,
            source_mime_type: None,
        }
    }

    pub fn with_options(mut self, options: ConvertOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_source_name(mut self, source_name: impl Into<String>) -> Self {
        self.source_name = Some(source_name.into());
        self
    }

    pub fn with_source_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.source_mime_type = Some(mime_type.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_image_formats_fall_back_to_jpg() {
        assert_eq!(TargetFormat::image_or_default(None), TargetFormat::Image(ImageFormat::Jpg));
        assert_eq!(TargetFormat::image_or_default(Some("tiff")), TargetFormat::Image(ImageFormat::Jpg));
        assert_eq!(TargetFormat::image_or_default(Some("docx")), TargetFormat::Image(ImageFormat::Jpg));
        assert_eq!(TargetFormat::image_or_default(Some("WEBP")), TargetFormat::Image(ImageFormat::Webp));
    }

    #[test]
    fn only_encodable_images_are_targets() {
        assert_eq!(TargetFormat::parse("gif"), None);
        assert_eq!(TargetFormat::parse("jpeg"), Some(TargetFormat::Image(ImageFormat::Jpg)));
        assert_eq!(TargetFormat::parse(".docx"), Some(TargetFormat::Document(DocumentFormat::Docx)));
    }

    #[test]
    fn options_are_range_checked() {
        assert!(ConvertOptions { width: Some(1), height: None, quality: Some(100) }.validate().is_ok());
        assert!(ConvertOptions { width: Some(0), ..Default::default() }.validate().is_err());
        assert!(ConvertOptions { height: Some(0), ..Default::default() }.validate().is_err());
        assert!(ConvertOptions { quality: Some(0), ..Default::default() }.validate().is_err());
        assert!(ConvertOptions { quality: Some(101), ..Default::default() }.validate().is_err());
        assert!(ConvertOptions { width: Some(MAX_DIMENSION), height: Some(MAX_DIMENSION), quality: None }.validate().is_ok());
        assert!(ConvertOptions { width: Some(100_000), height: Some(100_000), quality: None }.validate().is_err());
        assert!(ConvertOptions { height: Some(MAX_DIMENSION + 1), ..Default::default() }.validate().is_err());
    }

    #[test]
    fn default_targets_follow_source_kind() {
        assert_eq!(SourceKind::Image(ImageFormat::Gif).default_target(), TargetFormat::Image(ImageFormat::Jpg));
        assert_eq!(SourceKind::Document(DocumentFormat::Pdf).default_target(), TargetFormat::Document(DocumentFormat::Docx));
        assert_eq!(SourceKind::Document(DocumentFormat::Odt).default_target(), TargetFormat::Document(DocumentFormat::Pdf));
    }

    #[test]
    fn mime_types_classify_sources() {
        let docx: Mime = "application/vnd.openxmlformats-officedocument.wordprocessingml.document".parse().unwrap();
        assert_eq!(SourceKind::from_mime_type(&docx), Some(SourceKind::Document(DocumentFormat::Docx)));
        assert_eq!(SourceKind::from_mime_type(&mime::IMAGE_PNG), Some(SourceKind::Image(ImageFormat::Png)));
        assert_eq!(SourceKind::from_mime_type(&mime::TEXT_PLAIN), None);
    }
}
