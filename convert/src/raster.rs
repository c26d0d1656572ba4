use bytes::Bytes;
use common::{
    error::{ConversionError, ConversionResult},
    models::{ImageFormat, TargetFormat, MAX_DIMENSION},
};
use image::{
    codecs::{jpeg::JpegEncoder, png::PngEncoder, webp::WebPEncoder},
    imageops::FilterType,
    ColorType, DynamicImage, ImageEncoder,
};
use tracing::info;

use crate::converter::{ConverterInput, IConverter};

pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Raster conversions through the `image` crate: optional resize, then encode.
pub struct ImageConverter {
    pub default_quality: u8,
}

impl Default for ImageConverter {
    fn default() -> Self {
        ImageConverter {
            default_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

#[async_trait::async_trait]
impl IConverter for ImageConverter {
    #[tracing::instrument(skip(self, input), fields(source = %input.source, target = %input.target))]
    async fn convert(&self, input: ConverterInput) -> ConversionResult<Bytes> {
        let target = match input.target {
            TargetFormat::Image(format) if format.is_encodable() => format,
            other => return Err(ConversionError::capability(format!("Image converter can't produce {}", other))),
        };
        let quality = input.options.quality.unwrap_or(self.default_quality);
        let (width, height) = (input.options.width, input.options.height);
        let content = input.content;
        let bytes = tokio::task::spawn_blocking(move || transcode(&content, target, width, height, quality))
            .await
            .map_err(|_| ConversionError::capability("Image conversion was aborted"))??;
        info!("Encoded {} bytes of {}", bytes.len(), target.extension());
        Ok(bytes)
    }
}

fn transcode(content: &[u8], target: ImageFormat, width: Option<u32>, height: Option<u32>, quality: u8) -> ConversionResult<Bytes> {
    let source = image::load_from_memory(content).map_err(|err| ConversionError::capability(format!("Could not decode image: {}", err)))?;
    let resized = resize(source, width, height)?;
    encode(&resized, target, quality)
}

/// One dimension scales the other to keep the aspect ratio; both crop to fill.
/// A scaled dimension past `MAX_DIMENSION` is refused before allocating.
fn resize(image: DynamicImage, width: Option<u32>, height: Option<u32>) -> ConversionResult<DynamicImage> {
    let (width, height) = match (width, height) {
        (Some(width), Some(height)) => return Ok(image.resize_to_fill(width, height, FilterType::Lanczos3)),
        (Some(width), None) => (width, scale(image.height(), width, image.width())),
        (None, Some(height)) => (scale(image.width(), height, image.height()), height),
        (None, None) => return Ok(image),
    };
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(ConversionError::invalid_request(format!(
            "Resizing to {}x{} exceeds the limit of {} pixels per side",
            width, height, MAX_DIMENSION
        )));
    }
    Ok(image.resize_exact(width, height, FilterType::Lanczos3))
}

fn scale(other: u32, requested: u32, original: u32) -> u32 {
    if original == 0 {
        return other.max(1);
    }
    ((other as f64 * requested as f64 / original as f64).round().min(u32::MAX as f64) as u32).max(1)
}

fn encode(image: &DynamicImage, target: ImageFormat, quality: u8) -> ConversionResult<Bytes> {
    let mut buffer = Vec::new();
    let (width, height) = (image.width(), image.height());
    let result = match target {
        ImageFormat::Jpg => {
            let rgb = image.to_rgb8();
            JpegEncoder::new_with_quality(&mut buffer, quality).encode(rgb.as_raw(), width, height, ColorType::Rgb8)
        }
        ImageFormat::Png => {
            let rgba = image.to_rgba8();
            PngEncoder::new(&mut buffer).write_image(rgba.as_raw(), width, height, ColorType::Rgba8)
        }
        // lossless encoder, quality does not apply
        ImageFormat::Webp => {
            let rgba = image.to_rgba8();
            WebPEncoder::new_lossless(&mut buffer).encode(rgba.as_raw(), width, height, ColorType::Rgba8)
        }
        ImageFormat::Gif | ImageFormat::Bmp => {
            return Err(ConversionError::capability(format!("Encoding {} is not supported", target.extension())));
        }
    };
    result.map_err(|err| ConversionError::capability(format!("Could not encode image: {}", err)))?;
    Ok(Bytes::from(buffer))
}
