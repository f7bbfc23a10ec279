use thiserror::Error;

#[derive(Error, Debug)]
pub enum SlidecastError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Translation error: {0}")]
    Translation(String),

    #[error("Speech synthesis error: {0}")]
    Speech(String),

    #[error("Media processing error: {0}")]
    Media(String),

    #[error("Transition error: {0}")]
    Transition(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),
}

pub type Result<T> = std::result::Result<T, SlidecastError>;
