use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    BoxError, Json,
};
use common::{dtos::ErrorDto, error::ConversionError};

/// `ConversionError` at the HTTP boundary.
#[derive(Debug)]
pub struct ApiError(pub ConversionError);

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            ConversionError::InvalidRequest(_) | ConversionError::UnsupportedConversion { .. } => StatusCode::BAD_REQUEST,
            ConversionError::NotFound(_) => StatusCode::NOT_FOUND,
            ConversionError::ArtifactNotFound(_) | ConversionError::CapabilityFailure(_) | ConversionError::IoFailure(_) | ConversionError::Timeout(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Safe to show to clients; server side details only go to the log.
    pub fn user_message(&self) -> String {
        match &self.0 {
            ConversionError::ArtifactNotFound(_) => "Conversion failed, file not found".to_string(),
            ConversionError::CapabilityFailure(_) => "Failed to convert file".to_string(),
            ConversionError::IoFailure(_) => "Failed to access storage".to_string(),
            err => err.to_string(),
        }
    }
}

impl From<ConversionError> for ApiError {
    fn from(err: ConversionError) -> Self {
        ApiError(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(ConversionError::invalid_request(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", &self.0);
        } else {
            tracing::debug!("Client error: {}", &self.0);
        }
        (status, Json(ErrorDto { error: self.user_message() })).into_response()
    }
}

/// Answer for requests cut off by the service wide timeout.
pub async fn handle_timeout(err: BoxError) -> (StatusCode, Json<ErrorDto>) {
    tracing::warn!("Request aborted: {}", err);
    (
        StatusCode::REQUEST_TIMEOUT,
        Json(ErrorDto {
            error: "Request timed out".to_string(),
        }),
    )
}
