use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArmError {
    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success response. `message` is the service's `code: message`
    /// when the body carries one, otherwise the raw body.
    #[error("server returned {status}: {message}")]
    Server { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed resource {id}: {source}")]
    Malformed {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("credential error: {0}")]
    Credential(String),
}
