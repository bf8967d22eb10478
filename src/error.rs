use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use derive_more::Display;
use serde::Serialize;
use serde_json::json;
use sqlx::mysql::MySqlDatabaseError;
use std::collections::BTreeMap;

use crate::model::transition::TransitionError;

pub type AppResult<T> = Result<T, AppError>;

/// Field name -> list of messages, rendered as `{"errors": {...}}` on 422.
#[derive(Debug, Default, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn check(&mut self, ok: bool, field: &str, message: &str) {
        if !ok {
            self.add(field, message);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn into_result(self) -> AppResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

#[derive(Debug, Display)]
pub enum AppError {
    #[display(fmt = "Validation failed")]
    Validation(FieldErrors),
    #[display(fmt = "{}", _0)]
    BadRequest(String),
    #[display(fmt = "{}", _0)]
    Unauthorized(String),
    #[display(fmt = "{}", _0)]
    Forbidden(String),
    #[display(fmt = "{}", _0)]
    NotFound(String),
    #[display(fmt = "{}", _0)]
    Conflict(String),
    #[display(fmt = "Database error: {}", _0)]
    Database(sqlx::Error),
    #[display(fmt = "Internal error: {}", _0)]
    Internal(String),
}

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        AppError::BadRequest(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        AppError::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        AppError::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }

    /// Single-field validation failure.
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.add(field, message);
        AppError::Validation(errors)
    }

    /// A concurrent writer won: duplicate key or deadlock. Re-running the
    /// whole transaction is safe.
    pub fn is_write_race(&self) -> bool {
        match self {
            AppError::Database(sqlx::Error::Database(db_err)) => db_err
                .try_downcast_ref::<MySqlDatabaseError>()
                .is_some_and(|e| is_race_number(e.number())),
            _ => false,
        }
    }
}

const MYSQL_DUPLICATE_KEY: u16 = 1062;
const MYSQL_DEADLOCK: u16 = 1213;

fn is_race_number(number: u16) -> bool {
    matches!(number, MYSQL_DUPLICATE_KEY | MYSQL_DEADLOCK)
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".to_string()),
            other => AppError::Database(other),
        }
    }
}

impl From<TransitionError> for AppError {
    fn from(e: TransitionError) -> Self {
        AppError::Conflict(e.to_string())
    }
}

impl From<actix_web::error::BlockingError> for AppError {
    fn from(e: actix_web::error::BlockingError) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            AppError::Validation(errors) => HttpResponse::build(self.status_code()).json(json!({
                "message": "Validation failed",
                "errors": errors
            })),
            AppError::Database(e) => {
                tracing::error!(error = %e, "Database error");
                HttpResponse::InternalServerError().json(json!({
                    "message": "Internal Server Error"
                }))
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                HttpResponse::InternalServerError().json(json!({
                    "message": "Internal Server Error"
                }))
            }
            other => HttpResponse::build(self.status_code()).json(json!({
                "message": other.to_string()
            })),
        }
    }
}

/// Detects MySQL duplicate-key violations (SQLSTATE 23000).
pub fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23000"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[test]
    fn status_codes_follow_variant() {
        assert_eq!(
            AppError::invalid("reason", "required").status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(AppError::conflict("x").status_code(), StatusCode::CONFLICT);
        assert_eq!(AppError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::from(sqlx::Error::RowNotFound).status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn only_duplicates_and_deadlocks_are_races() {
        assert!(is_race_number(1062));
        assert!(is_race_number(1213));
        // foreign key failures share SQLSTATE 23000 but are not races
        assert!(!is_race_number(1452));
        assert!(!AppError::from(sqlx::Error::RowNotFound).is_write_race());
        assert!(!AppError::conflict("x").is_write_race());
    }

    #[actix_web::test]
    async fn internal_errors_hide_details() {
        let resp = AppError::internal("secret stack trace").error_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(resp.into_body()).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(!text.contains("secret"));
    }

    #[actix_web::test]
    async fn validation_errors_are_grouped_by_field() {
        let mut errors = FieldErrors::new();
        errors.add("end_date", "must be on or after start_date");
        errors.add("end_date", "must be a date");
        errors.add("reason", "is required");
        let resp = AppError::Validation(errors).error_response();
        let body = to_bytes(resp.into_body()).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["errors"]["end_date"].as_array().unwrap().len(), 2);
        assert_eq!(value["errors"]["reason"][0], "is required");
    }
}
