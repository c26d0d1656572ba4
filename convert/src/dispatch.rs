use std::sync::Arc;

use common::{
    error::{ConversionError, ConversionResult},
    models::{ConversionRequest, ConversionState, ConvertedArtifact, DocumentFormat, ImageFormat, SourceKind, TargetFormat},
    persistence::{IStorageArea, Partition},
    util::names::{base_name, extension, is_valid_storage_name},
};
use futures::FutureExt;
use mime::Mime;
use tracing::{error, info};

use crate::{
    converter::{ConverterInput, IConverter},
    inflight::InFlight,
};

#[async_trait::async_trait]
pub trait IConvertService: Send + Sync {
    async fn convert(&self, request: ConversionRequest) -> ConversionResult<ConvertedArtifact>;
}

/// Validates a request, picks the one capability for its (source, target)
/// pair, runs it and publishes the artifact into `converted`.
pub struct ConvertService {
    pipeline: Pipeline,
    in_flight: Option<InFlight<ConversionRequest, ConversionResult<ConvertedArtifact>>>,
}

impl ConvertService {
    pub fn new(storage: Arc<dyn IStorageArea>, image_converter: Arc<dyn IConverter>, document_converter: Arc<dyn IConverter>, deduplicate: bool) -> Self {
        ConvertService {
            pipeline: Pipeline {
                storage,
                image_converter,
                document_converter,
            },
            in_flight: deduplicate.then(InFlight::new),
        }
    }
}

#[async_trait::async_trait]
impl IConvertService for ConvertService {
    #[tracing::instrument(skip(self))]
    async fn convert(&self, request: ConversionRequest) -> ConversionResult<ConvertedArtifact> {
        match &self.in_flight {
            Some(in_flight) => {
                let pipeline = self.pipeline.clone();
                let key = request.clone();
                in_flight.run(key, move || pipeline.run(request).boxed()).await
            }
            None => self.pipeline.clone().run(request).await,
        }
    }
}

#[derive(Clone)]
struct Pipeline {
    storage: Arc<dyn IStorageArea>,
    image_converter: Arc<dyn IConverter>,
    document_converter: Arc<dyn IConverter>,
}

impl Pipeline {
    async fn run(self, request: ConversionRequest) -> ConversionResult<ConvertedArtifact> {
        let mut progress = Progress::new(&request.source_storage_name);
        let result = self.process(&request, &mut progress).await;
        match &result {
            Ok(artifact) => info!("Conversion of {} available as {}", &request.source_storage_name, &artifact.storage_name),
            Err(err) => {
                progress.advance(ConversionState::Failed);
                if err.is_client_error() {
                    info!("Rejected conversion of {}: {}", &request.source_storage_name, err);
                } else {
                    error!("Conversion of {} failed: {}", &request.source_storage_name, err);
                }
            }
        }
        result
    }

    async fn process(&self, request: &ConversionRequest, progress: &mut Progress<'_>) -> ConversionResult<ConvertedArtifact> {
        let source_name = &request.source_storage_name;
        if source_name.is_empty() {
            return Err(ConversionError::invalid_request("Filename is required"));
        }
        if !is_valid_storage_name(source_name) || !self.storage.exists(Partition::Uploads, source_name).await? {
            return Err(ConversionError::NotFound("File".to_string()));
        }
        request.options.validate()?;
        progress.advance(ConversionState::Validated);

        self.storage.ensure(Partition::Converted).await?;
        let content = self.storage.get(Partition::Uploads, source_name).await?;
        let source = classify(request, &content).ok_or_else(|| ConversionError::UnsupportedConversion {
            from: "unknown".to_string(),
            to: request.target_format.map(|target| target.to_string()).unwrap_or_else(|| "any format".to_string()),
        })?;
        let target = request.target_format.unwrap_or_else(|| source.default_target());
        let converter = self.select(source, target)?;
        let artifact_base = artifact_base_name(request, source);

        let output = converter
            .convert(ConverterInput {
                content,
                source,
                target,
                options: request.options,
                base_name: artifact_base.clone(),
            })
            .await?;
        progress.advance(ConversionState::Converted);

        let storage_name = format!("{}.{}", artifact_base, target.extension());
        self.storage.put(Partition::Converted, &storage_name, output).await?;
        progress.advance(ConversionState::Available);
        Ok(ConvertedArtifact {
            storage_name,
            mime_type: target.mime_type().to_string(),
        })
    }

    /// Each supported pair has exactly one capability.
    fn select(&self, source: SourceKind, target: TargetFormat) -> ConversionResult<&Arc<dyn IConverter>> {
        use DocumentFormat::*;
        match (source, target) {
            (SourceKind::Image(_), TargetFormat::Image(format)) if format.is_encodable() => Ok(&self.image_converter),
            (SourceKind::Document(Pdf), TargetFormat::Document(Docx | Odt | Rtf)) => Ok(&self.document_converter),
            (SourceKind::Document(Docx | Doc | Odt | Rtf), TargetFormat::Document(Pdf)) => Ok(&self.document_converter),
            (source, target) => Err(ConversionError::UnsupportedConversion {
                from: source.to_string(),
                to: target.to_string(),
            }),
        }
    }
}

/// Images are named after their upload handle, documents after the client's
/// filename, which is what the external tool names its output after. The
/// result only holds `[A-Za-z0-9._-]` so it can go into URLs and headers as is.
fn artifact_base_name(request: &ConversionRequest, source: SourceKind) -> String {
    match (source, &request.source_name) {
        (SourceKind::Document(_), Some(source_name)) => {
            let base: String = base_name(source_name)
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
                .collect();
            let base = base.trim_start_matches('.');
            if base.is_empty() {
                request.source_storage_name.clone()
            } else {
                base.to_string()
            }
        }
        _ => request.source_storage_name.clone(),
    }
}

/// Declared mime type first, then the client's extension, then the bytes.
fn classify(request: &ConversionRequest, content: &[u8]) -> Option<SourceKind> {
    let declared = request
        .source_mime_type
        .as_deref()
        .and_then(|mime_type| mime_type.parse::<Mime>().ok())
        .and_then(|mime_type| SourceKind::from_mime_type(&mime_type));
    let by_extension = || {
        request
            .source_name
            .as_deref()
            .and_then(extension)
            .and_then(|extension| SourceKind::from_extension(&extension))
    };
    declared.or_else(by_extension).or_else(|| sniff(content, request.source_name.as_deref()))
}

fn sniff(content: &[u8], source_name: Option<&str>) -> Option<SourceKind> {
    if content.starts_with(b"%PDF-") {
        return Some(SourceKind::Document(DocumentFormat::Pdf));
    }
    if content.starts_with(b"{\\rtf") {
        return Some(SourceKind::Document(DocumentFormat::Rtf));
    }
    if content.starts_with(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1]) {
        return Some(SourceKind::Document(DocumentFormat::Doc));
    }
    if content.starts_with(b"PK\x03\x04") {
        if contains(content, b"mimetypeapplication/vnd.oasis.opendocument.text") {
            return Some(SourceKind::Document(DocumentFormat::Odt));
        }
        if contains(content, b"word/") || source_name.and_then(extension).as_deref() == Some("docx") {
            return Some(SourceKind::Document(DocumentFormat::Docx));
        }
        return None;
    }
    match image::guess_format(content).ok()? {
        image::ImageFormat::Jpeg => Some(SourceKind::Image(ImageFormat::Jpg)),
        image::ImageFormat::Png => Some(SourceKind::Image(ImageFormat::Png)),
        image::ImageFormat::WebP => Some(SourceKind::Image(ImageFormat::Webp)),
        image::ImageFormat::Gif => Some(SourceKind::Image(ImageFormat::Gif)),
        image::ImageFormat::Bmp => Some(SourceKind::Image(ImageFormat::Bmp)),
        _ => None,
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

struct Progress<'a> {
    storage_name: &'a str,
    state: ConversionState,
}

impl<'a> Progress<'a> {
    fn new(storage_name: &'a str) -> Self {
        info!("Received conversion of {}", storage_name);
        Progress {
            storage_name,
            state: ConversionState::Received,
        }
    }

    fn advance(&mut self, next: ConversionState) {
        if !self.state.can_transition_to(next) {
            error!("Ignoring transition of {} from {:?} to {:?}", self.storage_name, self.state, next);
            return;
        }
        info!("Conversion of {} is {:?}", self.storage_name, next);
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::atomic::{AtomicUsize, Ordering}, time::Duration};

    use bytes::Bytes;
    use common::{models::ConvertOptions, persistence::memory::MemoryStorageArea};
    use mockall::predicate::function;

    use super::*;
    use crate::converter::MockIConverter;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

    fn unused() -> Arc<dyn IConverter> {
        let mut converter = MockIConverter::new();
        converter.expect_convert().never();
        Arc::new(converter)
    }

    fn echo(prefix: &'static [u8]) -> Arc<dyn IConverter> {
        let mut converter = MockIConverter::new();
        converter.expect_convert().returning(move |input| Ok(Bytes::from([prefix, &input.content[..]].concat())));
        Arc::new(converter)
    }

    async fn storage_with(name: &str, content: &'static [u8]) -> Arc<MemoryStorageArea> {
        let storage = Arc::new(MemoryStorageArea::new());
        storage.put(Partition::Uploads, name, Bytes::from_static(content)).await.unwrap();
        storage
    }

    #[tokio::test]
    async fn image_pairs_go_to_the_image_converter() {
        let storage = storage_with("abc", PNG_MAGIC).await;
        let service = ConvertService::new(storage.clone(), echo(b"img:"), unused(), false);

        let request = ConversionRequest::new("abc", Some(TargetFormat::Image(ImageFormat::Webp)));
        let artifact = service.convert(request).await.unwrap();

        assert_eq!(artifact.storage_name, "abc.webp");
        assert_eq!(artifact.mime_type, "image/webp");
        assert!(storage.has_partition(Partition::Converted).await);
        assert_eq!(storage.get(Partition::Converted, "abc.webp").await.unwrap(), Bytes::from([&b"img:"[..], PNG_MAGIC].concat()));
    }

    #[tokio::test]
    async fn documents_are_named_after_the_original_file() {
        let storage = storage_with("xyz", b"%PDF-1.7").await;
        let mut document = MockIConverter::new();
        document
            .expect_convert()
            .with(function(|input: &ConverterInput| {
                input.base_name == "report" && input.source == SourceKind::Document(DocumentFormat::Pdf) && input.target == TargetFormat::Document(DocumentFormat::Docx)
            }))
            .times(1)
            .returning(|_| Ok(Bytes::from_static(b"PK\x03\x04docx")));
        let service = ConvertService::new(storage.clone(), unused(), Arc::new(document), false);

        let request = ConversionRequest::new("xyz", None).with_source_name("C:\\Users\\me\\report.pdf");
        let artifact = service.convert(request).await.unwrap();

        assert_eq!(artifact.storage_name, "report.docx");
        assert!(storage.exists(Partition::Converted, "report.docx").await.unwrap());
    }

    #[tokio::test]
    async fn missing_sources_are_not_found() {
        let storage = Arc::new(MemoryStorageArea::new());
        let service = ConvertService::new(storage, unused(), unused(), false);

        let missing = service.convert(ConversionRequest::new("nope", None)).await;
        assert!(matches!(missing, Err(ConversionError::NotFound(_))));
        let escaping = service.convert(ConversionRequest::new("../uploads/x", None)).await;
        assert!(matches!(escaping, Err(ConversionError::NotFound(_))));
    }

    #[tokio::test]
    async fn empty_names_are_invalid() {
        let service = ConvertService::new(Arc::new(MemoryStorageArea::new()), unused(), unused(), false);
        assert!(matches!(service.convert(ConversionRequest::new("", None)).await, Err(ConversionError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn out_of_range_options_are_invalid() {
        let storage = storage_with("abc", PNG_MAGIC).await;
        let service = ConvertService::new(storage, unused(), unused(), false);
        let request = ConversionRequest::new("abc", None).with_options(ConvertOptions { quality: Some(0), ..Default::default() });
        assert!(matches!(service.convert(request).await, Err(ConversionError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn unsupported_pairs_are_rejected() {
        let storage = storage_with("pdf", b"%PDF-1.7").await;
        storage.put(Partition::Uploads, "png", Bytes::from_static(PNG_MAGIC)).await.unwrap();
        storage.put(Partition::Uploads, "txt", Bytes::from_static(b"plain text")).await.unwrap();
        let service = ConvertService::new(storage.clone(), unused(), unused(), false);

        let pdf_to_jpg = ConversionRequest::new("pdf", Some(TargetFormat::Image(ImageFormat::Jpg)));
        assert!(matches!(service.convert(pdf_to_jpg).await, Err(ConversionError::UnsupportedConversion { .. })));
        let png_to_docx = ConversionRequest::new("png", Some(TargetFormat::Document(DocumentFormat::Docx)));
        assert!(matches!(service.convert(png_to_docx).await, Err(ConversionError::UnsupportedConversion { .. })));
        let unknown = ConversionRequest::new("txt", None);
        assert!(matches!(service.convert(unknown).await, Err(ConversionError::UnsupportedConversion { .. })));
        assert!(storage.list(Partition::Converted).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_conversions_publish_nothing() {
        let storage = storage_with("abc", PNG_MAGIC).await;
        let mut image = MockIConverter::new();
        image.expect_convert().returning(|_| Err(ConversionError::capability("boom")));
        let service = ConvertService::new(storage.clone(), Arc::new(image), unused(), false);

        let result = service.convert(ConversionRequest::new("abc", None)).await;
        assert_eq!(result, Err(ConversionError::CapabilityFailure("boom".to_string())));
        assert!(storage.list(Partition::Converted).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn declared_mime_type_beats_sniffing() {
        let storage = storage_with("abc", b"%PDF-1.7").await;
        let service = ConvertService::new(storage, echo(b""), unused(), false);
        let request = ConversionRequest::new("abc", Some(TargetFormat::Image(ImageFormat::Png))).with_source_mime_type("image/png");
        assert_eq!(service.convert(request).await.unwrap().storage_name, "abc.png");
    }

    struct SlowConverter {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl IConverter for SlowConverter {
        async fn convert(&self, input: ConverterInput) -> ConversionResult<Bytes> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(input.content)
        }
    }

    #[tokio::test]
    async fn concurrent_identical_requests_convert_once() {
        let storage = storage_with("abc", PNG_MAGIC).await;
        let slow = Arc::new(SlowConverter { calls: AtomicUsize::new(0) });
        let service = ConvertService::new(storage, slow.clone(), unused(), true);

        let request = ConversionRequest::new("abc", Some(TargetFormat::Image(ImageFormat::Png)));
        let (first, second) = tokio::join!(service.convert(request.clone()), service.convert(request));

        assert_eq!(first.unwrap(), second.unwrap());
        assert_eq!(slow.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn without_deduplication_every_request_converts() {
        let storage = storage_with("abc", PNG_MAGIC).await;
        let slow = Arc::new(SlowConverter { calls: AtomicUsize::new(0) });
        let service = ConvertService::new(storage, slow.clone(), unused(), false);

        let request = ConversionRequest::new("abc", Some(TargetFormat::Image(ImageFormat::Png)));
        let (first, second) = tokio::join!(service.convert(request.clone()), service.convert(request));

        assert_eq!(first.unwrap().storage_name, second.unwrap().storage_name);
        assert_eq!(slow.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn document_names_are_url_and_header_safe() {
        let pdf = SourceKind::Document(DocumentFormat::Pdf);
        let named = |name: &str| artifact_base_name(&ConversionRequest::new("stored", None).with_source_name(name), pdf);
        assert_eq!(named("Q1 #2.pdf"), "Q1__2");
        assert_eq!(named("a?b.pdf"), "a_b");
        assert_eq!(named("Bericht M\u{e4}rz \"final\".pdf"), "Bericht_M_rz__final_");
        assert_eq!(named("annual-report_v1.2.pdf"), "annual-report_v1.2");
        assert_eq!(named(".hidden.pdf"), "hidden");
        assert_eq!(named("..."), "stored");
        let image = SourceKind::Image(ImageFormat::Png);
        assert_eq!(artifact_base_name(&ConversionRequest::new("stored", None).with_source_name("a b.png"), image), "stored");
    }

    #[test]
    fn sniffs_office_containers() {
        let docx = [&b"PK\x03\x04"[..], b"....word/document.xml"].concat();
        assert_eq!(sniff(&docx, None), Some(SourceKind::Document(DocumentFormat::Docx)));
        let odt = [&b"PK\x03\x04"[..], b"..mimetypeapplication/vnd.oasis.opendocument.text"].concat();
        assert_eq!(sniff(&odt, None), Some(SourceKind::Document(DocumentFormat::Odt)));
        assert_eq!(sniff(b"PK\x03\x04zip", None), None);
        assert_eq!(sniff(b"PK\x03\x04zip", Some("letter.DOCX")), Some(SourceKind::Document(DocumentFormat::Docx)));
        assert_eq!(sniff(b"{\\rtf1 hello}", None), Some(SourceKind::Document(DocumentFormat::Rtf)));
    }
}
