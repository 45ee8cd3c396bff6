//! Realtime error values delivered to continuations and listeners.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

/// Realtime error codes. Non-negative codes come from the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RtErrorCode {
    Unknown,
    /// A request was in flight when the connection closed.
    Disconnected,
    ConnectError,
    TransportError,
    RuntimeException,
    UnrecognizedPayload,
    MissingPayload,
    BadInput,
    MatchNotFound,
    MatchJoinRejected,
    RuntimeFunctionNotFound,
    RuntimeFunctionException,
}

impl RtErrorCode {
    pub fn as_i32(self) -> i32 {
        match self {
            Self::Unknown => -100,
            Self::Disconnected => -3,
            Self::ConnectError => -2,
            Self::TransportError => -1,
            Self::RuntimeException => 0,
            Self::UnrecognizedPayload => 1,
            Self::MissingPayload => 2,
            Self::BadInput => 3,
            Self::MatchNotFound => 4,
            Self::MatchJoinRejected => 5,
            Self::RuntimeFunctionNotFound => 6,
            Self::RuntimeFunctionException => 7,
        }
    }

    pub fn from_i32(code: i32) -> Self {
        match code {
            -3 => Self::Disconnected,
            -2 => Self::ConnectError,
            -1 => Self::TransportError,
            0 => Self::RuntimeException,
            1 => Self::UnrecognizedPayload,
            2 => Self::MissingPayload,
            3 => Self::BadInput,
            4 => Self::MatchNotFound,
            5 => Self::MatchJoinRejected,
            6 => Self::RuntimeFunctionNotFound,
            7 => Self::RuntimeFunctionException,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::Disconnected => "DISCONNECTED",
            Self::ConnectError => "CONNECT_ERROR",
            Self::TransportError => "TRANSPORT_ERROR",
            Self::RuntimeException => "RUNTIME_EXCEPTION",
            Self::UnrecognizedPayload => "UNRECOGNIZED_PAYLOAD",
            Self::MissingPayload => "MISSING_PAYLOAD",
            Self::BadInput => "BAD_INPUT",
            Self::MatchNotFound => "MATCH_NOT_FOUND",
            Self::MatchJoinRejected => "MATCH_JOIN_REJECTED",
            Self::RuntimeFunctionNotFound => "RUNTIME_FUNCTION_NOT_FOUND",
            Self::RuntimeFunctionException => "RUNTIME_FUNCTION_EXCEPTION",
        }
    }
}

impl fmt::Display for RtErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error on the realtime channel, either reported by the server or raised locally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct RtError {
    pub code: RtErrorCode,
    pub message: String,
    pub context: HashMap<String, String>,
}

impl RtError {
    pub fn new(code: RtErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: HashMap::new(),
        }
    }

    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(RtErrorCode::ConnectError, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(RtErrorCode::TransportError, message)
    }

    pub fn disconnected(message: impl Into<String>) -> Self {
        Self::new(RtErrorCode::Disconnected, message)
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}
