use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use shopdesk_core::ShopError;

/// Error body returned by every failing endpoint.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: "bad_request",
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

pub fn shop_error_status(err: &ShopError) -> StatusCode {
    match err {
        ShopError::ServerNotFound(_)
        | ShopError::NotFound(_)
        | ShopError::BackupNotFound(_)
        | ShopError::NoBackupsFound(_)
        | ShopError::EntryNotFound(_) => StatusCode::NOT_FOUND,
        ShopError::AlreadyExists(_) => StatusCode::CONFLICT,
        ShopError::InvalidShopId(_) | ShopError::InvalidEntry(_) => StatusCode::BAD_REQUEST,
        ShopError::MalformedDocument(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ShopError::TransferError(_) => StatusCode::BAD_GATEWAY,
    }
}

impl From<ShopError> for ApiError {
    fn from(err: ShopError) -> Self {
        let status = shop_error_status(&err);
        if status.is_server_error() {
            tracing::error!(kind = err.kind(), "{}", err);
        }
        Self {
            status,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: rejection.status(),
            kind: "invalid_body",
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.kind,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}
