//! In-process transport driven by a [`MemoryPeer`].
//!
//! Nothing touches the network. The peer plays the server: it decides when a
//! connect completes, injects inbound frames and closes, and inspects what the
//! client sent.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::{DisconnectCode, DisconnectInfo, FrameKind, RtTransport, TransportEvent};

#[derive(Default)]
struct MemoryState {
    connected: bool,
    connecting: bool,
    inbound: VecDeque<TransportEvent>,
    sent: Vec<Vec<u8>>,
    last_url: Option<String>,
    last_kind: Option<FrameKind>,
    fail_sends: bool,
    connect_count: usize,
}

pub struct MemoryTransport {
    state: Arc<Mutex<MemoryState>>,
}

/// Server side of a [`MemoryTransport`].
#[derive(Clone)]
pub struct MemoryPeer {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryTransport {
    pub fn pair() -> (Self, MemoryPeer) {
        let transport = Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
        };
        let peer = transport.peer();
        (transport, peer)
    }

    pub fn peer(&self) -> MemoryPeer {
        MemoryPeer {
            state: self.state.clone(),
        }
    }
}

impl RtTransport for MemoryTransport {
    fn connect(&mut self, url: &str, kind: FrameKind) {
        let mut state = self.state.lock();
        if state.connected || state.connecting {
            return;
        }
        state.connecting = true;
        state.inbound.clear();
        state.last_url = Some(url.to_string());
        state.last_kind = Some(kind);
        state.connect_count += 1;
    }

    fn disconnect(&mut self) {
        let mut state = self.state.lock();
        state.connected = false;
        state.connecting = false;
        state.inbound.clear();
    }

    fn send(&mut self, data: &[u8]) -> bool {
        let mut state = self.state.lock();
        if !state.connected || state.fail_sends {
            return false;
        }
        state.sent.push(data.to_vec());
        true
    }

    fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    fn is_connecting(&self) -> bool {
        self.state.lock().connecting
    }

    fn poll(&mut self) -> Vec<TransportEvent> {
        let mut state = self.state.lock();
        let drained: Vec<TransportEvent> = state.inbound.drain(..).collect();

        for event in &drained {
            match event {
                TransportEvent::Connected => {
                    state.connecting = false;
                    state.connected = true;
                }
                TransportEvent::Disconnected(_) => {
                    state.connecting = false;
                    state.connected = false;
                }
                TransportEvent::Error(_) if !state.connected => state.connecting = false,
                _ => {}
            }
        }

        drained
    }
}

impl MemoryPeer {
    fn push(&self, event: TransportEvent) {
        self.state.lock().inbound.push_back(event);
    }

    /// Accept the pending connect. Ignored when no connect is in progress.
    pub fn complete_connect(&self) {
        let mut state = self.state.lock();
        if state.connecting {
            state.inbound.push_back(TransportEvent::Connected);
        }
    }

    /// Refuse the pending connect with a transport error.
    pub fn fail_connect(&self, description: impl Into<String>) {
        self.push(TransportEvent::Error(description.into()));
    }

    pub fn push_message(&self, data: impl Into<Vec<u8>>) {
        self.push(TransportEvent::Message(data.into()));
    }

    pub fn push_error(&self, description: impl Into<String>) {
        self.push(TransportEvent::Error(description.into()));
    }

    /// Close the connection from the server side.
    pub fn close_remote(&self, code: DisconnectCode, reason: impl Into<String>) {
        self.push(TransportEvent::Disconnected(DisconnectInfo::remote(code, reason)));
    }

    /// Frames the client sent since the previous call.
    pub fn take_sent(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.state.lock().sent)
    }

    pub fn sent_count(&self) -> usize {
        self.state.lock().sent.len()
    }

    /// Make every following `send` report failure.
    pub fn set_fail_sends(&self, fail: bool) {
        self.state.lock().fail_sends = fail;
    }

    pub fn last_url(&self) -> Option<String> {
        self.state.lock().last_url.clone()
    }

    pub fn last_frame_kind(&self) -> Option<FrameKind> {
        self.state.lock().last_kind
    }

    pub fn connect_count(&self) -> usize {
        self.state.lock().connect_count
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().connected
    }
}
