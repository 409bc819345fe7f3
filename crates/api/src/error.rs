#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid version: {0:?}")]
    InvalidVersion(String),
    #[error("Invalid module identifier: {0:?}")]
    InvalidModule(String),
    #[error("Invalid descriptor {descriptor:?}: {reason}")]
    InvalidDescriptor {
        descriptor: String,
        reason: String,
    },
    #[error("Invalid method name: {0:?}")]
    InvalidMethodName(String),
    #[error("Unknown access modifier: {0:?}")]
    UnknownAccess(String),
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
