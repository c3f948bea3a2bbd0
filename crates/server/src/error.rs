use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use services::services::{cases::CaseServiceError, pending_cases::PendingCaseError};
use thiserror::Error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Case(#[from] CaseServiceError),
    #[error(transparent)]
    PendingCases(#[from] PendingCaseError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Case(e) => match e {
                CaseServiceError::CaseNotFound(_)
                | CaseServiceError::CustomerNotFound(_)
                | CaseServiceError::TechnicianNotFound(_) => StatusCode::NOT_FOUND,
                CaseServiceError::TechnicianInactive(_)
                | CaseServiceError::InvalidTransition { .. } => StatusCode::CONFLICT,
                CaseServiceError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::PendingCases(_) | ApiError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body: ApiResponse<()> = ApiResponse::error(&self.to_string());
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[test]
    fn test_case_errors_map_to_status_codes() {
        let id = Uuid::new_v4();
        assert_eq!(
            ApiError::Case(CaseServiceError::CaseNotFound(id)).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Case(CaseServiceError::TechnicianInactive(id)).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::Case(CaseServiceError::Database(sqlx::Error::PoolClosed)).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::NotFound("customer").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Conflict("busy".to_string()).status_code(),
            StatusCode::CONFLICT
        );
    }
}
