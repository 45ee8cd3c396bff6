//! Envelope codecs.

use serde_json::{Map, Value};
use thiserror::Error;

use nakama_ws::FrameKind;

use super::message::{Envelope, EnvelopeMessage};

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("envelope is not a JSON object")]
    NotAnObject,

    #[error("envelope carries more than one message: {0:?}")]
    MultipleMessages(Vec<String>),

    #[error("invalid cid: {0}")]
    InvalidCid(String),

    #[error("codec error: {0}")]
    Codec(String),
}

/// Wire format requested at connect time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RtClientProtocol {
    #[default]
    Json,
    /// Binary envelopes. Requires a codec installed with `RtClient::set_binary_protocol`.
    Protobuf,
}

/// Encodes and decodes envelopes.
pub trait RtProtocol: Send + Sync {
    fn serialize(&self, envelope: &Envelope) -> Result<Vec<u8>, ProtocolError>;

    fn parse(&self, data: &[u8]) -> Result<Envelope, ProtocolError>;

    /// Frame type the transport must use for this format.
    fn frame_kind(&self) -> FrameKind;

    /// Value of the `format` query parameter, if the server must be told.
    fn format(&self) -> Option<&'static str> {
        None
    }
}

/// JSON envelopes: the message is a single top-level key next to `cid`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonProtocol;

impl RtProtocol for JsonProtocol {
    fn serialize(&self, envelope: &Envelope) -> Result<Vec<u8>, ProtocolError> {
        let mut object = match &envelope.message {
            Some(message) => match serde_json::to_value(message)? {
                Value::Object(object) => object,
                _ => return Err(ProtocolError::NotAnObject),
            },
            None => Map::new(),
        };

        if let Some(cid) = &envelope.cid {
            object.insert("cid".into(), Value::String(cid.clone()));
        }

        Ok(serde_json::to_vec(&Value::Object(object))?)
    }

    fn parse(&self, data: &[u8]) -> Result<Envelope, ProtocolError> {
        let mut object: Map<String, Value> = match serde_json::from_slice(data)? {
            Value::Object(object) => object,
            _ => return Err(ProtocolError::NotAnObject),
        };

        let cid = match object.remove("cid") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(other) => return Err(ProtocolError::InvalidCid(other.to_string())),
        };

        let message = match object.len() {
            0 => None,
            1 => Some(serde_json::from_value::<EnvelopeMessage>(Value::Object(object))?),
            _ => return Err(ProtocolError::MultipleMessages(object.keys().cloned().collect())),
        };

        Ok(Envelope { cid, message })
    }

    fn frame_kind(&self) -> FrameKind {
        FrameKind::Text
    }
}
