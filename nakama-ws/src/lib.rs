//! # nakama-ws
//!
//! Realtime transport for the Nakama client.
//!
//! ## Features
//!
//! - **Composable**: the realtime client only sees the [`RtTransport`] trait
//! - **Tick driven**: events are queued and handed out by [`RtTransport::poll`],
//!   so they reach the client serially on the thread that pumps it
//! - **WebSocket**: [`WsTransport`] runs a tungstenite client on its own I/O thread
//! - **In-process**: [`MemoryTransport`] is scripted through a [`MemoryPeer`]
//!
//! ## Example
//!
//! ```rust,no_run
//! use nakama_ws::{FrameKind, RtTransport, TransportEvent, WsTransport};
//!
//! let mut transport = WsTransport::new();
//! transport.connect("ws://127.0.0.1:7350/ws?token=...", FrameKind::Text);
//!
//! loop {
//!     for event in transport.poll() {
//!         match event {
//!             TransportEvent::Connected => println!("connected"),
//!             TransportEvent::Message(bytes) => println!("{} bytes", bytes.len()),
//!             TransportEvent::Error(description) => eprintln!("{description}"),
//!             TransportEvent::Disconnected(info) => println!("closed: {info}"),
//!         }
//!     }
//!     std::thread::sleep(std::time::Duration::from_millis(50));
//! }
//! ```

mod error;
mod event;
mod memory;
mod transport;

use std::time::Duration;

pub use error::{Result, WsError};
pub use event::{DisconnectCode, DisconnectInfo, FrameKind, TransportEvent};
pub use memory::{MemoryPeer, MemoryTransport};
pub use transport::WsTransport;

/// Transport trait consumed by the realtime client.
///
/// Implementations must uphold the following:
/// - `connect` and `disconnect` never produce events synchronously; events are
///   only handed out by `poll`.
/// - `is_connected` returns false as soon as `disconnect` returns, and nothing
///   raised by the old connection is handed out afterwards.
/// - `connect` may be called again after `disconnect` on the same instance.
pub trait RtTransport: Send {
    /// Start connecting to `url`, framing outbound data as `kind`.
    fn connect(&mut self, url: &str, kind: FrameKind);

    /// Close the connection (or abandon a connect in progress).
    fn disconnect(&mut self);

    /// Queue one frame. Returns false if the frame could not be handed over.
    fn send(&mut self, data: &[u8]) -> bool;

    fn is_connected(&self) -> bool;

    fn is_connecting(&self) -> bool;

    /// Drain the events raised since the previous call, oldest first.
    fn poll(&mut self) -> Vec<TransportEvent>;

    /// Close the connection when nothing arrives for `timeout`. `None` disables it.
    fn set_activity_timeout(&mut self, _timeout: Option<Duration>) {}

    fn activity_timeout(&self) -> Option<Duration> {
        None
    }
}

impl<T: RtTransport + ?Sized> RtTransport for Box<T> {
    fn connect(&mut self, url: &str, kind: FrameKind) {
        (**self).connect(url, kind)
    }

    fn disconnect(&mut self) {
        (**self).disconnect()
    }

    fn send(&mut self, data: &[u8]) -> bool {
        (**self).send(data)
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn is_connecting(&self) -> bool {
        (**self).is_connecting()
    }

    fn poll(&mut self) -> Vec<TransportEvent> {
        (**self).poll()
    }

    fn set_activity_timeout(&mut self, timeout: Option<Duration>) {
        (**self).set_activity_timeout(timeout)
    }

    fn activity_timeout(&self) -> Option<Duration> {
        (**self).activity_timeout()
    }
}
