//! Errors for the PortFlow backend
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PortflowError {
    #[error("Not found")]
    NotFound,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid IMO number")]
    InvalidImo(String),

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error")]
    SerdeError(#[from] serde_json::Error),

    #[error("Configuration load error")]
    ConfigError(#[from] config::ConfigError),

    #[error("HTTP request error")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error")]
    IoError(#[from] std::io::Error),

    #[error("Database connection error: {0}")]
    DatabaseConnectionError(String),

    #[error("Database migration error: {0}")]
    MigrationError(String),

    #[error("Database error")]
    DatabaseError(#[from] sqlx::Error),
}
