use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    #[error("invalid_input - {0}")]
    InvalidInput(String),
    #[error("invalid_data - {0}")]
    InvalidData(String),
    #[error("io_error - {0}")]
    Io(String),
    #[error("backend_unavailable - {0}")]
    BackendUnavailable(String),
    #[error("backend_error - {0}")]
    Backend(String),
    #[error("timeout - {0}")]
    Timeout(String),
}

impl AppError {
    pub fn invalid_input<M: Into<String>>(message: M) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn invalid_data<M: Into<String>>(message: M) -> Self {
        Self::InvalidData(message.into())
    }

    pub fn io<M: Into<String>>(message: M) -> Self {
        Self::Io(message.into())
    }

    pub fn backend_unavailable<M: Into<String>>(message: M) -> Self {
        Self::BackendUnavailable(message.into())
    }

    pub fn backend<M: Into<String>>(message: M) -> Self {
        Self::Backend(message.into())
    }

    pub fn timeout<M: Into<String>>(message: M) -> Self {
        Self::Timeout(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::InvalidData(_) => "invalid_data",
            Self::Io(_) => "io_error",
            Self::BackendUnavailable(_) => "backend_unavailable",
            Self::Backend(_) => "backend_error",
            Self::Timeout(_) => "timeout",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::InvalidInput(message)
            | Self::InvalidData(message)
            | Self::Io(message)
            | Self::BackendUnavailable(message)
            | Self::Backend(message)
            | Self::Timeout(message) => message,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_data(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        Self::backend(err.to_string())
    }
}
