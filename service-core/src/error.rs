use thiserror::Error;

/// Startup and infrastructure failures. Request errors have their own
/// per-service types.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),

    #[error("Database error: {0}")]
    DatabaseError(anyhow::Error),

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

impl From<mongodb::error::Error> for AppError {
    fn from(err: mongodb::error::Error) -> Self {
        AppError::DatabaseError(anyhow::Error::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_is_internal() {
        let err = AppError::from(std::io::Error::other("port in use"));
        assert!(matches!(err, AppError::InternalError(_)));
        assert!(err.to_string().contains("port in use"));
    }

    #[test]
    fn config_error_is_config() {
        let err = AppError::from(config::ConfigError::NotFound("port".to_string()));
        assert!(matches!(err, AppError::ConfigError(_)));
    }
}
