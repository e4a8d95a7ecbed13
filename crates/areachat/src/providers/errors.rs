use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Authentication with the model API failed ({0})")]
    Authentication(u16),

    #[error("Rate limited by the model API")]
    RateLimited,

    #[error("Model API server error: {0}")]
    Server(u16),

    #[error("Request failed: {status}: {body}")]
    Request { status: u16, body: String },

    #[error("Context length exceeded. Message: {0}")]
    ContextLengthExceeded(String),

    #[error("Model API error: {0}")]
    Api(String),

    #[error("Unexpected response from model API: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl ProviderError {
    pub fn is_authentication(&self) -> bool {
        matches!(self, ProviderError::Authentication(_))
    }
}
