use std::collections::HashMap;

use axum::{
    body::StreamBody,
    extract::{multipart::MultipartRejection, Multipart, Path, State},
    http::header,
    response::{AppendHeaders, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use common::{dtos::UploadResultDto, error::ConversionError, files::IncomingFile};

use crate::{error::ApiError, state::Services};

pub fn create_route(services: Services) -> Router {
    Router::new()
        .route("/upload", post(upload))
        .route("/download/:filename", get(download))
        .with_state(services)
}

#[tracing::instrument(skip(services, multipart))]
pub async fn upload(State(services): State<Services>, multipart: Result<Multipart, MultipartRejection>) -> Result<Json<UploadResultDto>, ApiError> {
    let form = read_form(multipart).await?;
    let uploaded = services.file_service.upload(form.file).await?;
    Ok(Json(uploaded.into()))
}

#[tracing::instrument(skip(services))]
pub async fn download(State(services): State<Services>, Path(filename): Path<String>) -> Result<impl IntoResponse, ApiError> {
    let download = services.file_service.download(&filename).await?;
    let headers = AppendHeaders([
        (header::CONTENT_TYPE, download.content_type.to_string()),
        (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", &download.file.name)),
        (header::CONTENT_LENGTH, download.file.size.to_string()),
    ]);
    Ok((headers, StreamBody::new(download.file.content)))
}

/// A multipart body with at most one `file` part; every other part is kept
/// as text.
pub struct UploadForm {
    pub file: Option<IncomingFile>,
    pub fields: HashMap<String, String>,
}

pub async fn read_form(multipart: Result<Multipart, MultipartRejection>) -> Result<UploadForm, ApiError> {
    let mut multipart = multipart.map_err(|rejection| ConversionError::invalid_request(rejection.body_text()))?;
    let mut form = UploadForm {
        file: None,
        fields: HashMap::new(),
    };
    while let Some(field) = multipart.next_field().await.map_err(|err| ConversionError::invalid_request(err.body_text()))? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            if form.file.is_some() {
                return Err(ConversionError::invalid_request("Only one file can be uploaded per request").into());
            }
            let original_name = field.file_name().unwrap_or("upload").to_string();
            let mime_type = field.content_type().map(|mime_type| mime_type.to_string());
            let content = field.bytes().await.map_err(|err| ConversionError::invalid_request(err.body_text()))?;
            form.file = Some(IncomingFile {
                original_name,
                mime_type,
                content,
            });
        } else {
            let value = field.text().await.map_err(|err| ConversionError::invalid_request(err.body_text()))?;
            form.fields.insert(name, value);
        }
    }
    Ok(form)
}
