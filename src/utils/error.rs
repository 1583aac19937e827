use thiserror::Error;

#[derive(Error, Debug)]
pub enum RadarError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Invalid query field '{field}': {reason}")]
    InvalidQuery { field: String, reason: String },

    #[error("Data store '{store}' unavailable: {message}")]
    StoreUnavailable { store: String, message: String },

    #[error("{service} request failed: {message}")]
    ExternalService { service: String, message: String },

    #[error("{service} rate limit exceeded")]
    RateLimited { service: String },

    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Configuration,
    Storage,
    ExternalDependency,
    Processing,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl RadarError {
    pub fn store(store: &str, message: impl Into<String>) -> Self {
        RadarError::StoreUnavailable {
            store: store.to_string(),
            message: message.into(),
        }
    }

    pub fn external(service: &str, message: impl Into<String>) -> Self {
        RadarError::ExternalService {
            service: service.to_string(),
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            RadarError::InvalidQuery { .. } => ErrorCategory::Input,
            RadarError::ConfigValidationError { .. }
            | RadarError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            RadarError::StoreUnavailable { .. } => ErrorCategory::Storage,
            RadarError::HttpError(_)
            | RadarError::ExternalService { .. }
            | RadarError::RateLimited { .. }
            | RadarError::Timeout { .. } => ErrorCategory::ExternalDependency,
            RadarError::SerializationError(_) => ErrorCategory::Processing,
            RadarError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            RadarError::RateLimited { .. } | RadarError::Timeout { .. } => ErrorSeverity::Medium,
            RadarError::HttpError(_) | RadarError::ExternalService { .. } => ErrorSeverity::Medium,
            RadarError::InvalidQuery { .. }
            | RadarError::ConfigValidationError { .. }
            | RadarError::InvalidConfigValueError { .. }
            | RadarError::SerializationError(_) => ErrorSeverity::High,
            RadarError::StoreUnavailable { .. } | RadarError::IoError(_) => {
                ErrorSeverity::Critical
            }
        }
    }

    /// Whether a later attempt with the same input could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RadarError::HttpError(_)
                | RadarError::RateLimited { .. }
                | RadarError::Timeout { .. }
                | RadarError::ExternalService { .. }
        )
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Input => "Use a search term of 1-200 characters and a horizon of 3-30 years",
            ErrorCategory::Configuration => "Check the TOML configuration file and referenced environment variables",
            ErrorCategory::Storage => "Verify that the dataset file exists and was fully imported",
            ErrorCategory::ExternalDependency => "The external service may be down or rate limited; retry later",
            ErrorCategory::Processing => "Inspect the input data for malformed records",
            ErrorCategory::System => "Check file permissions and available disk space",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            RadarError::InvalidQuery { field, reason } => {
                format!("The request is invalid ({}): {}", field, reason)
            }
            RadarError::StoreUnavailable { store, .. } => {
                format!("The local {} dataset could not be read", store)
            }
            RadarError::RateLimited { service } => {
                format!("{} is currently rate limiting requests", service)
            }
            RadarError::Timeout { operation, .. } => {
                format!("{} took too long to respond", operation)
            }
            other => other.to_string(),
        }
    }
}

impl From<toml::de::Error> for RadarError {
    fn from(err: toml::de::Error) -> Self {
        RadarError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", err),
        }
    }
}

pub type Result<T> = std::result::Result<T, RadarError>;
