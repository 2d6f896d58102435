// src/error.rs

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;

/// A failure raised by a pipeline stage.
///
/// Expected rejections (bad input, wrong credentials, missing rights) are not
/// errors: stages answer those with a 4xx `Reply`. Everything here is a
/// collaborator failure and ends the request with a single 500.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("password hashing failed: {0}")]
    Hashing(#[from] bcrypt::BcryptError),

    #[error("token signing failed: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("mail delivery failed: {0}")]
    Mail(String),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// A stage expected an earlier stage to have populated the context.
    #[error("{0} missing from request context")]
    MissingContext(&'static str),

    /// A handler calls into a collaborator that was never bound.
    #[error("{0} is not defined")]
    UndefinedCollaborator(&'static str),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "success": false,
            "message": "Internal server error"
        }))
    }
}

impl From<lettre::error::Error> for ApiError {
    fn from(e: lettre::error::Error) -> Self {
        ApiError::Mail(e.to_string())
    }
}

impl From<lettre::transport::smtp::Error> for ApiError {
    fn from(e: lettre::transport::smtp::Error) -> Self {
        ApiError::Mail(e.to_string())
    }
}

impl From<lettre::address::AddressError> for ApiError {
    fn from(e: lettre::address::AddressError) -> Self {
        ApiError::Mail(e.to_string())
    }
}
