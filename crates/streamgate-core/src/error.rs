use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid endpoint '{0}', expected host:port")]
    InvalidEndpoint(String),

    #[error("invalid value for '{key}': {reason}")]
    InvalidProperty { key: String, reason: String },

    #[error("state store '{0}' is not available")]
    StoreNotAvailable(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}

pub type Result<T> = std::result::Result<T, Error>;
