//! Query-plane error handling.
//!
//! Maps between in-process errors and the wire error codes the query
//! protocol carries.

use std::time::Duration;

use thiserror::Error;

use streamgate_core::HostInfo;

/// Result type for query operations
pub type Result<T> = std::result::Result<T, QueryError>;

/// Query-plane errors
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("unknown key serde: {0}")]
    UnknownSerde(String),

    #[error("a serde named '{0}' is already registered")]
    SerdeAlreadyRegistered(String),

    #[error("key conversion failed: {0}")]
    KeyConversion(String),

    #[error("no host available for store '{0}'")]
    NoRoute(String),

    #[error("no compatible store for host {0}")]
    NoStoreForHost(HostInfo),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("host is not the owner of the queried partition: {0}")]
    NotOwner(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("query timed out after {0:?}")]
    Timeout(Duration),

    #[error("a required config is missing [application.server]")]
    MissingSelfEndpoint,

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("runtime error: {0}")]
    Runtime(String),
}

impl From<streamgate_core::Error> for QueryError {
    fn from(err: streamgate_core::Error) -> Self {
        QueryError::Runtime(err.to_string())
    }
}

/// Wire error codes carried in error response frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WireErrorCode {
    Internal = 0,
    NotOwner = 1,
    Deserialization = 2,
}

impl WireErrorCode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(code: u8) -> Self {
        match code {
            1 => WireErrorCode::NotOwner,
            2 => WireErrorCode::Deserialization,
            _ => WireErrorCode::Internal,
        }
    }

    /// Rebuild the client-side error from a wire error frame.
    pub fn into_error(self, message: String) -> QueryError {
        match self {
            WireErrorCode::NotOwner => QueryError::NotOwner(message),
            WireErrorCode::Deserialization => QueryError::Deserialization(message),
            WireErrorCode::Internal => QueryError::Runtime(message),
        }
    }
}

impl From<&QueryError> for WireErrorCode {
    fn from(err: &QueryError) -> Self {
        match err {
            QueryError::NotOwner(_) => WireErrorCode::NotOwner,
            QueryError::Deserialization(_) => WireErrorCode::Deserialization,
            _ => WireErrorCode::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_error_code_round_trip() {
        for code in [
            WireErrorCode::Internal,
            WireErrorCode::NotOwner,
            WireErrorCode::Deserialization,
        ] {
            assert_eq!(WireErrorCode::from_u8(code.as_u8()), code);
        }
    }

    #[test]
    fn test_unknown_wire_code_maps_to_internal() {
        assert_eq!(WireErrorCode::from_u8(250), WireErrorCode::Internal);
    }

    #[test]
    fn test_into_error_preserves_kind_and_message() {
        let err = WireErrorCode::NotOwner.into_error("partition moved".to_string());
        assert!(matches!(err, QueryError::NotOwner(m) if m == "partition moved"));

        let err = WireErrorCode::Deserialization.into_error("bad bytes".to_string());
        assert!(matches!(err, QueryError::Deserialization(m) if m == "bad bytes"));
    }

    #[test]
    fn test_error_to_wire_code() {
        assert_eq!(
            WireErrorCode::from(&QueryError::NotOwner("x".into())),
            WireErrorCode::NotOwner
        );
        assert_eq!(
            WireErrorCode::from(&QueryError::Transport("x".into())),
            WireErrorCode::Internal
        );
    }

    #[test]
    fn test_query_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<QueryError>();
        assert_sync::<QueryError>();
    }
}
