use bytes::Bytes;
use common::{
    error::ConversionResult,
    models::{ConvertOptions, SourceKind, TargetFormat},
};

/// Everything a capability gets to see of a request.
#[derive(Debug, Clone)]
pub struct ConverterInput {
    pub content: Bytes,
    pub source: SourceKind,
    pub target: TargetFormat,
    pub options: ConvertOptions,
    /// Name the output is expected under, without extension.
    pub base_name: String,
}

/// Turns bytes of one format into bytes of another. Implementations own
/// whatever they need to do that (a codec library, an external process) and
/// report every failure as a `ConversionError`.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait IConverter: Send + Sync {
    async fn convert(&self, input: ConverterInput) -> ConversionResult<Bytes>;
}
