use thiserror::Error;

#[derive(Error, Debug)]
pub enum BeanwatchError {
    #[error("Bad query: {0}")]
    BadQuery(String),

    #[error("Store unavailable during {op} of '{key}': {reason}")]
    StoreUnavailable {
        key: String,
        op: &'static str,
        reason: String,
    },

    #[error("No record for '{key}'; store was not initialized for this entity")]
    MissingRecord { key: String },

    #[error("Provider '{provider}' failed: {reason}")]
    ProviderFatal { provider: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] postcard::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BeanwatchError {
    /// Builds a `StoreUnavailable` error for the given key and operation.
    pub fn store(key: impl Into<String>, op: &'static str, reason: impl ToString) -> Self {
        BeanwatchError::StoreUnavailable {
            key: key.into(),
            op,
            reason: reason.to_string(),
        }
    }

    /// Builds a `ProviderFatal` error attributed to `provider`.
    pub fn provider(provider: impl Into<String>, reason: impl ToString) -> Self {
        BeanwatchError::ProviderFatal {
            provider: provider.into(),
            reason: reason.to_string(),
        }
    }

    /// Returns true when the error was caused by the client's input rather
    /// than a server-side failure.
    pub fn is_client_error(&self) -> bool {
        matches!(self, BeanwatchError::BadQuery(_))
    }
}

pub type Result<T> = std::result::Result<T, BeanwatchError>;
