use thiserror::Error;

/// Failure of a single call to an external service. Carried per asset so a
/// failed request never aborts its siblings.
#[derive(Debug, Error)]
pub enum StudioError {
    #[error("{0} not set")]
    MissingCredential(String),

    #[error("upload rejected: {0}")]
    Upload(String),

    #[error("tool {tool} failed: {message}")]
    Tool { tool: String, message: String },

    #[error("{service} request failed: {source}")]
    Transport {
        service: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} request failed ({code}): {body}")]
    Http {
        service: String,
        code: u16,
        body: String,
    },

    #[error("{service} returned an unusable response: {message}")]
    InvalidResponse { service: String, message: String },

    #[error("video operation {operation} not finished after {waited_s:.1}s")]
    VideoTimeout { operation: String, waited_s: f64 },
}

impl StudioError {
    pub fn tool(tool: &str, message: impl Into<String>) -> Self {
        StudioError::Tool {
            tool: tool.to_string(),
            message: message.into(),
        }
    }

    pub fn invalid(service: &str, message: impl Into<String>) -> Self {
        StudioError::InvalidResponse {
            service: service.to_string(),
            message: message.into(),
        }
    }

    pub fn transport(service: &str, source: reqwest::Error) -> Self {
        StudioError::Transport {
            service: service.to_string(),
            source,
        }
    }
}
