use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpriteError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Rate limited by {service} after {attempts} attempts")]
    RateLimited { service: String, attempts: u32 },

    #[error("Job {job_id} failed: {detail}")]
    JobFailed { job_id: String, detail: String },

    #[error("Job {job_id} did not complete in {}s", waited.as_secs())]
    TimedOut { job_id: String, waited: Duration },

    #[error("Unrecognized response shape (keys: {keys:?}, saved to {preserved_at:?})")]
    UnrecognizedResponseShape {
        keys: Vec<String>,
        preserved_at: Option<PathBuf>,
    },

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Task panicked: {0}")]
    TaskPanicked(String),
}

impl SpriteError {
    /// Configuration problems abort the run before any task starts; every
    /// other kind is confined to the task that raised it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SpriteError::Config(_))
    }
}

impl From<reqwest::Error> for SpriteError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => SpriteError::Http {
                status: status.as_u16(),
                body: e.to_string(),
            },
            None => SpriteError::Network(e.to_string()),
        }
    }
}

impl From<base64::DecodeError> for SpriteError {
    fn from(e: base64::DecodeError) -> Self {
        SpriteError::Decode(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SpriteError>;
