use crate::domain::error::ReconError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Newtype over the domain error so the HTTP mapping lives in the adapter
/// layer, not in the services.
pub struct ApiError(pub ReconError);

impl From<ReconError> for ApiError {
    fn from(err: ReconError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self.0 {
            ReconError::Auth(msg) => (StatusCode::BAD_REQUEST, "auth_error", msg.clone()),
            ReconError::Validation(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "validation_error", msg.clone())
            }
            ReconError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            ReconError::StateGuard(msg) => (StatusCode::CONFLICT, "state_error", msg.clone()),
            ReconError::Gateway(msg) => {
                tracing::error!("gateway error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "gateway_error",
                    "payment processor request failed".to_string(),
                )
            }
            ReconError::Dispatch(msg) => {
                tracing::error!("dispatch error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Failed to schedule action.".to_string(),
                )
            }
            ReconError::Serialization(err) => {
                tracing::error!("serialization error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal error".to_string(),
                )
            }
        };

        let body = serde_json::json!({
            "error_code": error_code,
            "message": message,
        });

        (status, Json(body)).into_response()
    }
}
