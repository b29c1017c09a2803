use thiserror::Error;

#[derive(Error, Debug)]
pub enum MatcherError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("API returned {status} for {url}: {body}")]
    HttpStatusError { status: u16, url: String, body: String },

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Cannot parse {field} '{value}': {reason}")]
    ParseError {
        field: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Data,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl MatcherError {
    pub fn config(message: impl Into<String>) -> Self {
        MatcherError::ConfigError {
            message: message.into(),
        }
    }

    pub fn parse(field: &str, value: &str, reason: impl Into<String>) -> Self {
        MatcherError::ParseError {
            field: field.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Name of the offending field for record-level parse failures.
    pub fn field(&self) -> Option<&str> {
        match self {
            MatcherError::ParseError { field, .. }
            | MatcherError::InvalidConfigValueError { field, .. }
            | MatcherError::MissingConfigError { field } => Some(field),
            _ => None,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            MatcherError::ConfigError { .. }
            | MatcherError::InvalidConfigValueError { .. }
            | MatcherError::MissingConfigError { .. } => ErrorCategory::Configuration,
            MatcherError::ApiError(_) | MatcherError::HttpStatusError { .. } => {
                ErrorCategory::Network
            }
            MatcherError::CsvError(_)
            | MatcherError::SerializationError(_)
            | MatcherError::ParseError { .. } => ErrorCategory::Data,
            MatcherError::IoError(_) | MatcherError::ZipError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            MatcherError::ParseError { .. } => ErrorSeverity::Low,
            MatcherError::ApiError(_) | MatcherError::HttpStatusError { .. } => {
                ErrorSeverity::Medium
            }
            MatcherError::ConfigError { .. }
            | MatcherError::InvalidConfigValueError { .. }
            | MatcherError::MissingConfigError { .. }
            | MatcherError::CsvError(_)
            | MatcherError::SerializationError(_) => ErrorSeverity::High,
            MatcherError::IoError(_) | MatcherError::ZipError(_) => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            MatcherError::HttpStatusError { status: 401, .. } => {
                "Check that the API token or client credentials are valid".to_string()
            }
            MatcherError::HttpStatusError { status: 404, .. } => {
                "Check the budget id and base URL".to_string()
            }
            MatcherError::ApiError(_) | MatcherError::HttpStatusError { .. } => {
                "Check your network connection and try again".to_string()
            }
            MatcherError::MissingConfigError { field } => {
                format!("Set '{}' in the config file or its environment variable", field)
            }
            MatcherError::InvalidConfigValueError { field, .. } => {
                format!("Fix the value of '{}' in the config file", field)
            }
            MatcherError::ConfigError { .. } => {
                "Review the matcher configuration file".to_string()
            }
            MatcherError::CsvError(_) => {
                "Re-export the PayPal activity as CSV (Activity > Download)".to_string()
            }
            MatcherError::ParseError { field, .. } => {
                format!("The record's {} field is malformed; it was skipped", field)
            }
            MatcherError::SerializationError(_) => {
                "The API response had an unexpected shape".to_string()
            }
            MatcherError::IoError(_) | MatcherError::ZipError(_) => {
                "Check file paths and permissions".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Network => format!("Could not reach a data source: {}", self),
            ErrorCategory::Data => format!("Could not read transaction data: {}", self),
            ErrorCategory::System => format!("System error: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, MatcherError>;
