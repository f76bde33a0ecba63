use thiserror::Error;

use crate::media_type::MediaType;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Unknown media type: {0}")]
    UnknownMediaType(String),

    #[error("No handler registered for media type: {0}")]
    NoHandler(MediaType),

    #[error("Settings parse error: {0}")]
    SettingsParse(String),

    #[error("Importer error: {0}")]
    Importer(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::SettingsParse(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Internal(format!("serialization: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput("empty identifier".to_string());
        assert_eq!(err.to_string(), "Invalid input: empty identifier");

        let err = Error::NoHandler(MediaType::Season);
        assert_eq!(
            err.to_string(),
            "No handler registered for media type: season"
        );
    }

    #[test]
    fn test_cancelled_is_distinguishable() {
        let err = Error::Cancelled;
        assert!(matches!(err, Error::Cancelled));
    }
}
