//! Error handling for the Argos engine

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Image decode/encode error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Model could not be loaded (fatal to one worker instance)
    #[error("Model load error: {0}")]
    ModelLoad(String),

    /// Frame stream failure (recovered by reconnect)
    #[error("Stream error: {0}")]
    Stream(String),

    /// Object store upload/url failure
    #[error("Object store error: {0}")]
    ObjectStore(String),

    /// Notification transport failure
    #[error("Notify error: {0}")]
    Notify(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
