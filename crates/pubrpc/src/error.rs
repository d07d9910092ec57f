// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for RPC bridge operations.

use crate::codec::CodecError;
use crate::message::MessageType;
use std::fmt;

/// Result type for RPC operations
pub type RpcResult<T> = Result<T, RpcError>;

/// Coarse status code attached to every [`RpcError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum StatusCode {
    #[default]
    Ok = 0,
    InvalidArgument = 3,
    FailedPrecondition = 9,
    Internal = 13,
    Unavailable = 14,
}

impl StatusCode {
    pub fn as_str(self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::InvalidArgument => "INVALID_ARGUMENT",
            StatusCode::FailedPrecondition => "FAILED_PRECONDITION",
            StatusCode::Internal => "INTERNAL",
            StatusCode::Unavailable => "UNAVAILABLE",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur during RPC operations
#[derive(Debug)]
pub enum RpcError {
    /// Session or worker pool could not be brought up or torn down
    Unavailable(String),

    /// Client has no live session (init was never called, or fully terminated)
    NotInitialized,

    /// Attributes carry a message type other than Request
    WrongMessageType(MessageType),

    /// Failed to serialize call metadata
    Serialization(CodecError),

    /// Transport refused the publish
    PublishFailed(String),

    /// Worker pool is shutting down and no longer accepts work
    Shutdown,

    /// Configuration value out of range
    InvalidConfig(String),

    /// Resource identifier could not be parsed
    InvalidUri(String),

    /// Internal error
    Internal(String),
}

impl RpcError {
    /// Coarse status code for this error.
    pub fn code(&self) -> StatusCode {
        match self {
            Self::Unavailable(_) | Self::PublishFailed(_) | Self::Shutdown => {
                StatusCode::Unavailable
            }
            Self::NotInitialized => StatusCode::FailedPrecondition,
            Self::WrongMessageType(_) | Self::InvalidConfig(_) | Self::InvalidUri(_) => {
                StatusCode::InvalidArgument
            }
            Self::Serialization(_) | Self::Internal(_) => StatusCode::Internal,
        }
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(msg) => write!(f, "RPC client unavailable: {}", msg),
            Self::NotInitialized => write!(f, "RPC client is not initialized"),
            Self::WrongMessageType(found) => write!(f, "Wrong message type = {}", found),
            Self::Serialization(e) => write!(f, "RPC serialization error: {}", e),
            Self::PublishFailed(msg) => write!(f, "RPC publish failed: {}", msg),
            Self::Shutdown => write!(f, "RPC worker pool shut down"),
            Self::InvalidConfig(msg) => write!(f, "Invalid RPC configuration: {}", msg),
            Self::InvalidUri(msg) => write!(f, "Invalid URI: {}", msg),
            Self::Internal(msg) => write!(f, "Internal RPC error: {}", msg),
        }
    }
}

impl std::error::Error for RpcError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Serialization(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CodecError> for RpcError {
    fn from(e: CodecError) -> Self {
        Self::Serialization(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_error_display() {
        let err = RpcError::WrongMessageType(MessageType::Publish);
        assert_eq!(err.to_string(), "Wrong message type = pub.v1");

        let err = RpcError::Unavailable("session manager init failed".into());
        assert!(err.to_string().contains("session manager init failed"));
    }

    #[test]
    fn test_lifecycle_errors_map_to_unavailable() {
        assert_eq!(
            RpcError::Unavailable(String::new()).code(),
            StatusCode::Unavailable
        );
        assert_eq!(RpcError::NotInitialized.code(), StatusCode::FailedPrecondition);
        assert_eq!(StatusCode::Unavailable.to_string(), "UNAVAILABLE");
    }

    #[test]
    fn test_codec_error_is_source() {
        use std::error::Error;

        let err: RpcError = CodecError::TooLarge { offset: 0, len: 9 }.into();
        assert!(err.source().is_some());
        assert_eq!(err.code(), StatusCode::Internal);
    }
}
