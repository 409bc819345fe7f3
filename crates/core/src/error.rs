use jarweave_java::PatchError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnhanceError {
    #[error("Failed to collect runtime archives under {}: {cause}", root.display())]
    Collection {
        root: PathBuf,
        #[source]
        cause: std::io::Error,
    },
    #[error("Failed to write overlay copy of {}: {cause}", original.display())]
    CacheWrite {
        original: PathBuf,
        #[source]
        cause: std::io::Error,
    },
    #[error(transparent)]
    Patch(#[from] PatchError),
    #[error("Malformed location {location:?}: {cause}")]
    MalformedLocation {
        location: String,
        #[source]
        cause: url::ParseError,
    },
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Api(#[from] jarweave_api::ApiError),
}

impl From<globset::Error> for EnhanceError {
    fn from(err: globset::Error) -> Self {
        EnhanceError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EnhanceError>;
