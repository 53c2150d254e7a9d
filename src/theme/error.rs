//! Theme engine error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ThemeError {
    /// Template name not registered
    #[error("Template not found: {0}")]
    NotFound(String),

    /// Template parsing or rendering error, with its cause chain
    #[error("Template error: {0}")]
    TemplateError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
