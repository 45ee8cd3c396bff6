//! Events and connection metadata shared by all transports.

use std::fmt;

/// How outbound frames are framed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// Binary frames, used by binary codecs.
    Binary,
    /// Text frames, used by the JSON codec.
    Text,
}

/// Something that happened on the connection, handed out by `RtTransport::poll`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected,
    Disconnected(DisconnectInfo),
    Error(String),
    Message(Vec<u8>),
}

/// Close codes. WebSocket codes plus the client-side codes 4000 and 4001.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisconnectCode {
    NormalClosure,
    GoingAway,
    ProtocolError,
    UnsupportedData,
    NoStatusReceived,
    AbnormalClosure,
    InvalidFramePayloadData,
    PolicyViolation,
    MessageTooBig,
    MandatoryExtension,
    InternalServerError,
    TlsHandshake,
    /// The heartbeat went unanswered.
    HeartbeatFailure,
    /// A frame could not be handed to the transport.
    TransportError,
    Other(u16),
}

impl DisconnectCode {
    pub fn as_u16(self) -> u16 {
        match self {
            Self::NormalClosure => 1000,
            Self::GoingAway => 1001,
            Self::ProtocolError => 1002,
            Self::UnsupportedData => 1003,
            Self::NoStatusReceived => 1005,
            Self::AbnormalClosure => 1006,
            Self::InvalidFramePayloadData => 1007,
            Self::PolicyViolation => 1008,
            Self::MessageTooBig => 1009,
            Self::MandatoryExtension => 1010,
            Self::InternalServerError => 1011,
            Self::TlsHandshake => 1015,
            Self::HeartbeatFailure => 4000,
            Self::TransportError => 4001,
            Self::Other(code) => code,
        }
    }
}

impl From<u16> for DisconnectCode {
    fn from(code: u16) -> Self {
        match code {
            1000 => Self::NormalClosure,
            1001 => Self::GoingAway,
            1002 => Self::ProtocolError,
            1003 => Self::UnsupportedData,
            1005 => Self::NoStatusReceived,
            1006 => Self::AbnormalClosure,
            1007 => Self::InvalidFramePayloadData,
            1008 => Self::PolicyViolation,
            1009 => Self::MessageTooBig,
            1010 => Self::MandatoryExtension,
            1011 => Self::InternalServerError,
            1015 => Self::TlsHandshake,
            4000 => Self::HeartbeatFailure,
            4001 => Self::TransportError,
            other => Self::Other(other),
        }
    }
}

/// Why a connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisconnectInfo {
    pub code: DisconnectCode,
    pub reason: String,
    /// True when the server (or the network) closed the connection.
    pub remote: bool,
}

impl DisconnectInfo {
    pub fn new(code: DisconnectCode, reason: impl Into<String>, remote: bool) -> Self {
        Self {
            code,
            reason: reason.into(),
            remote,
        }
    }

    /// A close initiated by this side.
    pub fn local(code: DisconnectCode, reason: impl Into<String>) -> Self {
        Self::new(code, reason, false)
    }

    /// A close initiated by the server or the network.
    pub fn remote(code: DisconnectCode, reason: impl Into<String>) -> Self {
        Self::new(code, reason, true)
    }
}

impl fmt::Display for DisconnectInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "code: {}, remote: {}, reason: {}",
            self.code.as_u16(),
            self.remote,
            self.reason
        )
    }
}
