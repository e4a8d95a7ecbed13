use thiserror::Error;

use crate::providers::errors::ProviderError;
use crate::store::StoreError;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Invalid arguments for {function}: {reason}")]
    InvalidArguments { function: String, reason: String },

    #[error("Model provider failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("Area lookup failed: {0}")]
    Database(#[from] StoreError),

    #[error("Failed to render prompt: {0}")]
    Prompt(String),

    #[error("The model returned no answer")]
    EmptyAnswer,
}

impl ChatError {
    pub fn invalid_arguments<F: Into<String>, R: Into<String>>(function: F, reason: R) -> Self {
        ChatError::InvalidArguments {
            function: function.into(),
            reason: reason.into(),
        }
    }

    /// True when the failure was caused by the caller's input rather than a backend.
    pub fn is_client_error(&self) -> bool {
        matches!(self, ChatError::InvalidRequest(_))
    }
}

pub type ChatResult<T> = Result<T, ChatError>;
