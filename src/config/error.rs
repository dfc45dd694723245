//! Configuration error types.

use crate::error::FulfillmentError;

#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("cannot read {path}: {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML in {path}: {detail}")]
    InvalidYaml { path: String, detail: String },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: String,
    },
}

impl ConfigurationError {
    pub fn file_read(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_yaml(path: impl Into<String>, detail: impl ToString) -> Self {
        Self::InvalidYaml {
            path: path.into(),
            detail: detail.to_string(),
        }
    }

    pub fn invalid_value(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

impl From<ConfigurationError> for FulfillmentError {
    fn from(error: ConfigurationError) -> Self {
        FulfillmentError::Configuration(error.to_string())
    }
}
