use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Pin not found: {0}")]
    NotFoundPin(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Hardware error: {0}")]
    Hardware(String),
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl AppError {
    /// Errors raised synchronously by a call that violates its contract,
    /// before any side effect took place.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            AppError::NotFoundPin(_) | AppError::InvalidArgument(_) | AppError::Config(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_failures_are_not_hardware_or_configuration() {
        let err = AppError::Runtime("spawn switch monitor on pin 18: resource unavailable".into());

        assert!(!err.is_configuration());
        assert!(!matches!(err, AppError::Hardware(_)));
        assert!(err.to_string().starts_with("Runtime error"));
    }
}
