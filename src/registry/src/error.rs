use thiserror::Error;

/// Errors returned by registry clients.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry url, user and password must be provided")]
    MissingCredentials,

    #[error("invalid registry url '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} failed with status {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl RegistryError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            RegistryError::Http { source, .. } => {
                source.is_timeout() || source.is_connect() || source.is_request()
            }
            RegistryError::Status { status, .. } => *status == 429 || *status >= 500,
            RegistryError::MissingCredentials
            | RegistryError::InvalidUrl { .. }
            | RegistryError::Decode { .. } => false,
        }
    }
}
