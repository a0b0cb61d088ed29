use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Event error: {0}")]
    Event(#[from] EventError),
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid principal: {0}")]
    InvalidPrincipal(String),

    #[error("Invalid source address: {0}")]
    InvalidAddress(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(String),
}

#[derive(Debug, Error)]
pub enum EventError {
    #[error("Event handler error: {0}")]
    HandlerError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let validation_error =
            Error::Validation(ValidationError::InvalidPrincipal("too long".to_string()));
        assert_eq!(
            validation_error.to_string(),
            "Validation error: Invalid principal: too long"
        );

        let storage_error = Error::Storage(StorageError::Database("connection failed".to_string()));
        assert_eq!(
            storage_error.to_string(),
            "Storage error: Database error: connection failed"
        );

        let event_error = Error::Event(EventError::HandlerError("timeout".to_string()));
        assert_eq!(
            event_error.to_string(),
            "Event error: Event handler error: timeout"
        );
    }

    #[test]
    fn test_error_from_conversions() {
        let validation_error = ValidationError::MissingField("address".to_string());
        let error: Error = validation_error.into();
        assert!(matches!(
            error,
            Error::Validation(ValidationError::MissingField(_))
        ));

        let storage_error = StorageError::Io("disk full".to_string());
        let error: Error = storage_error.into();
        assert!(matches!(error, Error::Storage(StorageError::Io(_))));
    }
}
