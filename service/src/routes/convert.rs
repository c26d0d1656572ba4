use axum::{
    extract::{multipart::MultipartRejection, rejection::JsonRejection, Multipart, State},
    routing::post,
    Json, Router,
};
use common::{
    dtos::{ConversionResultDto, ConvertImageDto},
    error::ConversionError,
    files::IncomingFile,
    models::{ConversionRequest, ConversionState, ConvertOptions, DocumentFormat, TargetFormat},
    util::names::extension,
};

use super::files::read_form;
use crate::{error::ApiError, state::Services};

pub fn create_route(services: Services) -> Router {
    Router::new()
        .route("/convert/image", post(convert_image))
        .route("/convert/document", post(convert_document))
        .route("/convert/pdf-to-docx", post(convert_pdf_to_docx))
        .with_state(services)
}

#[tracing::instrument(skip(services, payload))]
pub async fn convert_image(State(services): State<Services>, payload: Result<Json<ConvertImageDto>, JsonRejection>) -> Result<Json<ConversionResultDto>, ApiError> {
    let Json(payload) = payload?;
    let filename = payload.filename.unwrap_or_default();
    if filename.is_empty() {
        return Err(ConversionError::invalid_request("Filename is required").into());
    }
    let options = ConvertOptions {
        width: payload.width,
        height: payload.height,
        quality: payload.quality,
    };
    let request = ConversionRequest::new(filename, Some(TargetFormat::image_or_default(payload.format.as_deref()))).with_options(options);
    let artifact = services.convert_service.convert(request).await?;
    Ok(Json(ConversionResultDto {
        message: "Image converted successfully".to_string(),
        download_url: services.download_url(&artifact.storage_name),
        converted_filename: artifact.storage_name,
        status: ConversionState::Available,
    }))
}

#[tracing::instrument(skip(services, multipart))]
pub async fn convert_document(State(services): State<Services>, multipart: Result<Multipart, MultipartRejection>) -> Result<Json<ConversionResultDto>, ApiError> {
    let form = read_form(multipart).await?;
    let target = match form.fields.get("format").map(|format| format.trim()).filter(|format| !format.is_empty()) {
        Some(format) => Some(TargetFormat::parse(format).ok_or_else(|| ConversionError::invalid_request(format!("Unknown format '{}'", format)))?),
        None => None,
    };
    convert_upload(services, form.file, target, None).await
}

#[tracing::instrument(skip(services, multipart))]
pub async fn convert_pdf_to_docx(State(services): State<Services>, multipart: Result<Multipart, MultipartRejection>) -> Result<Json<ConversionResultDto>, ApiError> {
    let form = read_form(multipart).await?;
    let target = TargetFormat::Document(DocumentFormat::Docx);
    convert_upload(services, form.file, Some(target), Some("PDF converted to DOCX successfully")).await
}

async fn convert_upload(services: Services, file: Option<IncomingFile>, target: Option<TargetFormat>, message: Option<&str>) -> Result<Json<ConversionResultDto>, ApiError> {
    let uploaded = services.file_service.upload(file).await?;
    let request = ConversionRequest::new(&uploaded.storage_name, target)
        .with_source_name(&uploaded.original_name)
        .with_source_mime_type(&uploaded.mime_type);
    let artifact = services.convert_service.convert(request).await?;
    let message = match message {
        Some(message) => message.to_string(),
        None => format!("Document converted to {} successfully", extension(&artifact.storage_name).unwrap_or_default().to_uppercase()),
    };
    Ok(Json(ConversionResultDto {
        message,
        download_url: services.download_url(&artifact.storage_name),
        converted_filename: artifact.storage_name,
        status: ConversionState::Available,
    }))
}
