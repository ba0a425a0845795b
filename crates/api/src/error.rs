use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use extract::ExtractError;
use serde::Serialize;
use tracing::warn;

/// Request failure as seen by HTTP clients
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Extract(#[from] ExtractError),
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Extract(ExtractError::Config(_)) => StatusCode::BAD_REQUEST,
            ApiError::Extract(ExtractError::Llm(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Extract(ExtractError::Schema(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = self.to_string();
        warn!(status = status.as_u16(), error = %detail, "Request failed");

        (status, Json(ErrorResponse { detail })).into_response()
    }
}
