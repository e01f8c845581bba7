use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::container::InvalidContainerName;
use crate::reset::ResetError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    InvalidContainer(#[from] InvalidContainerName),

    #[error("Reset failed: {0}")]
    Reset(#[from] ResetError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::InvalidContainer(e) => {
                tracing::warn!(error = %e, "Rejected container name");
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            AppError::Reset(e) => {
                tracing::error!(error = %e, exit_code = ?e.exit_code(), "Reset failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, message).into_response()
    }
}
