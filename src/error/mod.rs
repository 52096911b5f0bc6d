use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Registration rejected ({status}): {message}")]
    Registration { status: u16, message: String },

    #[error("{operation} returned HTTP {status}")]
    UnexpectedStatus {
        operation: &'static str,
        status: u16,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayError {
    /// Whether this error must end the run.
    ///
    /// Authentication, registration and configuration failures are fatal;
    /// transport errors are recovered by the component that hit them.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RelayError::Config(_) | RelayError::Auth(_) | RelayError::Registration { .. }
        )
    }

    /// Stable short code used in log fields
    pub fn code(&self) -> &'static str {
        match self {
            RelayError::Config(_) => "CONFIG_ERROR",
            RelayError::Auth(_) => "UNAUTHORIZED",
            RelayError::Registration { .. } => "REGISTRATION_FAILED",
            RelayError::UnexpectedStatus { .. } => "UNEXPECTED_STATUS",
            RelayError::Http(_) => "HTTP_ERROR",
            RelayError::Serialization(_) => "SERIALIZATION_ERROR",
            RelayError::Io(_) => "IO_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
