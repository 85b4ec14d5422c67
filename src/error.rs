//! Error types shared by the store, the calculators and the web layer.

use thiserror::Error;

/// Errors that can occur while serving a Ficore tool.
#[derive(Debug, Error)]
pub enum FicoreError {
    /// The worksheet backend could not be used (missing worksheet, bad file, ...)
    #[error("Store error: {0}")]
    Store(String),

    /// Google Sheets returned an error response
    #[error("Google Sheets API error ({status}): {message}")]
    SheetsApi { status: u16, message: String },

    /// Failed to obtain a Google access token
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// HTTP request failed
    #[cfg(feature = "web")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// SMTP or message building failure
    #[error("Mail error: {0}")]
    Mail(String),

    #[error("Template error: {0}")]
    Template(String),

    /// Chart drawing failed
    #[error("Chart error: {0}")]
    Chart(String),

    /// A date string could not be parsed
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

#[cfg(feature = "web")]
impl From<gcp_auth::Error> for FicoreError {
    fn from(err: gcp_auth::Error) -> Self {
        FicoreError::Auth(err.to_string())
    }
}

#[cfg(feature = "web")]
impl From<handlebars::RenderError> for FicoreError {
    fn from(err: handlebars::RenderError) -> Self {
        FicoreError::Template(err.to_string())
    }
}

#[cfg(feature = "web")]
impl From<lettre::error::Error> for FicoreError {
    fn from(err: lettre::error::Error) -> Self {
        FicoreError::Mail(err.to_string())
    }
}

#[cfg(feature = "web")]
impl From<lettre::transport::smtp::Error> for FicoreError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        FicoreError::Mail(err.to_string())
    }
}

#[cfg(feature = "web")]
impl From<lettre::address::AddressError> for FicoreError {
    fn from(err: lettre::address::AddressError) -> Self {
        FicoreError::Mail(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FicoreError>;
