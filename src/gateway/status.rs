//! gRPC status to HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tonic::{Code, Status};

/// HTTP status for a gRPC status code.
pub fn http_status(code: Code) -> StatusCode {
    match code {
        Code::Ok => StatusCode::OK,
        Code::Cancelled => StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST),
        Code::InvalidArgument | Code::FailedPrecondition | Code::OutOfRange => {
            StatusCode::BAD_REQUEST
        }
        Code::Unauthenticated => StatusCode::UNAUTHORIZED,
        Code::PermissionDenied => StatusCode::FORBIDDEN,
        Code::NotFound => StatusCode::NOT_FOUND,
        Code::AlreadyExists | Code::Aborted => StatusCode::CONFLICT,
        Code::ResourceExhausted => StatusCode::TOO_MANY_REQUESTS,
        Code::Unimplemented => StatusCode::NOT_IMPLEMENTED,
        Code::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        Code::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        Code::Unknown | Code::Internal | Code::DataLoss => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: i32,
    message: String,
    details: Vec<serde_json::Value>,
}

/// A failed gateway call, rendered as a JSON error body.
#[derive(Debug)]
pub struct GatewayError(Status);

impl GatewayError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self(Status::invalid_argument(message))
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self(Status::not_found(message))
    }
}

impl From<Status> for GatewayError {
    fn from(status: Status) -> Self {
        Self(status)
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = http_status(self.0.code());
        if status.is_server_error() {
            tracing::warn!(
                code = ?self.0.code(),
                message = self.0.message(),
                "Gateway call failed"
            );
        }
        let body = ErrorBody {
            code: self.0.code() as i32,
            message: self.0.message().to_string(),
            details: Vec::new(),
        };
        (status, Json(body)).into_response()
    }
}
