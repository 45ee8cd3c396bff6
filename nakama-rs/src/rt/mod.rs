//! Realtime channel.
//!
//! [`RtClient`] keeps one WebSocket to the server, correlates requests with
//! replies and hands server pushes to an [`RtClientListener`]. Everything is
//! driven by [`RtClient::tick`].

mod callback;
mod client;
mod error;
mod heartbeat;
mod listener;
mod message;
mod protocol;
mod requests;
mod types;
mod verbs;

pub use callback::{RtCallback, RtReceiver};
pub use client::{RtClient, RtClientConfig};
pub use error::{RtError, RtErrorCode};
pub use heartbeat::{
    Clock, Heartbeat, HeartbeatAction, ManualClock, SystemClock, DEFAULT_HEARTBEAT_INTERVAL_MS,
};
pub use listener::{PushEvent, RtClientListener};
pub use message::*;
pub use protocol::{JsonProtocol, ProtocolError, RtClientProtocol, RtProtocol};
pub use requests::{PendingRequest, RequestTable};
pub use types::*;
pub use verbs::MatchmakerParams;

pub use nakama_ws::{DisconnectCode, DisconnectInfo, FrameKind, RtTransport, TransportEvent};
