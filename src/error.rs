use crate::domain::MachineId;
use crate::store::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use serde_json::json;
use thiserror::Error;

/// Errors surfaced by the settlement core and the repository write paths.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("No counter reading on or before {end_date} for machine {machine_id}")]
    NoDataForPeriod {
        machine_id: MachineId,
        end_date: NaiveDate,
    },
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl LedgerError {
    pub fn machine_not_found(id: &MachineId) -> Self {
        LedgerError::NotFound(format!("machine {}", id))
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        LedgerError::Storage(StoreError::Db(err))
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Internal server error: {0}")]
    Internal(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Unprocessable: {0}")]
    Unprocessable(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::from(LedgerError::Storage(err))
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound(msg) => AppError::NotFound(msg),
            e @ LedgerError::NoDataForPeriod { .. } => AppError::Unprocessable(e.to_string()),
            LedgerError::InvalidInput(msg) => AppError::BadRequest(msg),
            LedgerError::Conflict(msg) => AppError::Conflict(msg),
            LedgerError::Storage(e) => {
                tracing::warn!(error = %e, "storage failure");
                AppError::Internal(e.to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_error_status_mapping() {
        let cases = [
            (LedgerError::NotFound("machine x".into()), StatusCode::NOT_FOUND),
            (
                LedgerError::NoDataForPeriod {
                    machine_id: MachineId::new("x".into()),
                    end_date: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (LedgerError::InvalidInput("bad".into()), StatusCode::BAD_REQUEST),
            (LedgerError::Conflict("dup".into()), StatusCode::CONFLICT),
            (
                LedgerError::Storage(StoreError::Corrupt("coin_price=abc".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            let response = AppError::from(err).into_response();
            assert_eq!(response.status(), status);
        }
    }

    #[test]
    fn test_no_data_message_names_period_end() {
        let err = LedgerError::NoDataForPeriod {
            machine_id: MachineId::new("m-1".into()),
            end_date: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        };
        assert_eq!(
            err.to_string(),
            "No counter reading on or before 2024-01-31 for machine m-1"
        );
    }
}
