use actix_multipart::MultipartError;
use actix_web::{
    http::{header, StatusCode},
    HttpResponse, ResponseError,
};
use sqlx::{migrate::MigrateError, Error as SqlxError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Email already registered")]
    DuplicateEmail,

    #[error("Missing session")]
    MissingSession,

    #[error("Forbidden for this role")]
    ForbiddenRole,

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Unknown status: {0}")]
    UnknownStatus(String),

    #[error("Transition from {from} to {to} is not allowed")]
    InvalidTransition { from: String, to: String },

    #[error("Not found")]
    NotFound,

    #[error("Upload exceeds {0} bytes")]
    UploadTooLarge(usize),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Password error: {0}")]
    PasswordError(String),

    #[error("Identity error: {0}")]
    IdentityError(String),

    #[error("Session error: {0}")]
    SessionError(String),

    #[error("Template error: {0}")]
    TemplateError(#[from] tera::Error),

    #[error("Multipart error: {0}")]
    MultipartError(#[from] MultipartError),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Migration error: {0}")]
    MigrateError(#[from] MigrateError),

    #[error("SQLx error: {0}")]
    SqlxError(#[from] SqlxError),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::MissingSession | AppError::ForbiddenRole => StatusCode::SEE_OTHER,
            AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::DuplicateEmail => StatusCode::CONFLICT,
            AppError::MissingField(_)
            | AppError::InvalidAmount(_)
            | AppError::UnknownStatus(_)
            | AppError::InvalidTransition { .. }
            | AppError::MultipartError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::UploadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            // policy failures send the client back to the login view
            AppError::MissingSession | AppError::ForbiddenRole => HttpResponse::SeeOther()
                .insert_header((header::LOCATION, "/"))
                .finish(),
            _ if self.status_code().is_server_error() => {
                log::error!("Request failed: {}", self);
                HttpResponse::build(self.status_code())
                    .content_type("text/plain; charset=utf-8")
                    .body("Ocorreu um erro ao processar a solicitação. Tente novamente.")
            }
            _ => HttpResponse::build(self.status_code())
                .content_type("text/plain; charset=utf-8")
                .body(self.to_string()),
        }
    }
}

impl From<AppError> for std::io::Error {
    fn from(err: AppError) -> Self {
        std::io::Error::new(std::io::ErrorKind::Other, err.to_string())
    }
}
