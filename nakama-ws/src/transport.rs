//! WebSocket transport implementation.

use std::collections::VecDeque;
use std::io;
use std::net::TcpStream;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tungstenite::protocol::WebSocket;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{client, Message};

use crate::{DisconnectCode, DisconnectInfo, FrameKind, RtTransport, TransportEvent, WsError};

/// How long the I/O thread sleeps when a pass moved no data.
const IDLE_SLEEP: Duration = Duration::from_millis(2);

type Socket = WebSocket<MaybeTlsStream<TcpStream>>;
type EventQueue = Arc<Mutex<VecDeque<WorkerEvent>>>;

enum Command {
    Frame(Vec<u8>),
    Close,
}

enum WorkerEvent {
    Connected,
    ConnectFailed(String),
    Disconnected(DisconnectInfo),
    Error(String),
    Message(Vec<u8>),
}

/// WebSocket client transport.
///
/// The socket lives on a dedicated I/O thread. Outbound frames reach it through
/// a channel; everything it observes is queued and handed out by `poll`. Each
/// connection gets a fresh queue, so a connection abandoned by `disconnect`
/// can never leak events into the next one.
pub struct WsTransport {
    events: EventQueue,
    commands: Option<Sender<Command>>,
    connected: bool,
    connecting: bool,
    activity_timeout: Option<Duration>,
}

impl WsTransport {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::new())),
            commands: None,
            connected: false,
            connecting: false,
            activity_timeout: None,
        }
    }

    fn shutdown(&mut self) {
        if let Some(tx) = self.commands.take() {
            let _ = tx.send(Command::Close);
        }
        self.events = Arc::new(Mutex::new(VecDeque::new()));
        self.connected = false;
        self.connecting = false;
    }
}

impl Default for WsTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl RtTransport for WsTransport {
    fn connect(&mut self, url: &str, kind: FrameKind) {
        if self.connected || self.connecting {
            tracing::warn!("connect ignored, transport is busy");
            return;
        }

        let (tx, rx) = mpsc::channel();
        let events: EventQueue = Arc::new(Mutex::new(VecDeque::new()));
        let worker = Worker {
            url: url.to_string(),
            kind,
            commands: rx,
            events: events.clone(),
            activity_timeout: self.activity_timeout,
        };

        self.events = events;
        self.connecting = true;

        let spawned = thread::Builder::new()
            .name("nakama-ws-io".into())
            .spawn(move || worker.run());

        match spawned {
            Ok(_) => self.commands = Some(tx),
            Err(e) => {
                self.events
                    .lock()
                    .push_back(WorkerEvent::ConnectFailed(format!("spawn I/O thread: {e}")));
            }
        }
    }

    fn disconnect(&mut self) {
        self.shutdown();
    }

    fn send(&mut self, data: &[u8]) -> bool {
        if !self.connected {
            return false;
        }
        match &self.commands {
            Some(tx) => tx.send(Command::Frame(data.to_vec())).is_ok(),
            None => false,
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn is_connecting(&self) -> bool {
        self.connecting
    }

    fn poll(&mut self) -> Vec<TransportEvent> {
        let drained: Vec<WorkerEvent> = self.events.lock().drain(..).collect();
        let mut out = Vec::with_capacity(drained.len());

        for event in drained {
            match event {
                WorkerEvent::Connected => {
                    self.connecting = false;
                    self.connected = true;
                    out.push(TransportEvent::Connected);
                }
                WorkerEvent::ConnectFailed(description) => {
                    self.connecting = false;
                    self.commands = None;
                    out.push(TransportEvent::Error(description));
                }
                WorkerEvent::Disconnected(info) => {
                    self.connecting = false;
                    self.connected = false;
                    self.commands = None;
                    out.push(TransportEvent::Disconnected(info));
                }
                WorkerEvent::Error(description) => out.push(TransportEvent::Error(description)),
                WorkerEvent::Message(data) => out.push(TransportEvent::Message(data)),
            }
        }

        out
    }

    fn set_activity_timeout(&mut self, timeout: Option<Duration>) {
        self.activity_timeout = timeout;
    }

    fn activity_timeout(&self) -> Option<Duration> {
        self.activity_timeout
    }
}

/// State owned by the I/O thread of one connection.
struct Worker {
    url: String,
    kind: FrameKind,
    commands: Receiver<Command>,
    events: EventQueue,
    activity_timeout: Option<Duration>,
}

impl Worker {
    fn push(&self, event: WorkerEvent) {
        self.events.lock().push_back(event);
    }

    fn run(self) {
        if !(self.url.starts_with("ws://") || self.url.starts_with("wss://")) {
            self.push(WorkerEvent::ConnectFailed(WsError::invalid_url(&self.url).to_string()));
            return;
        }

        let mut ws = match client::connect(self.url.as_str()) {
            Ok((ws, _response)) => ws,
            Err(e) => {
                tracing::debug!("connect failed: {}", e);
                self.push(WorkerEvent::ConnectFailed(WsError::WebSocket(e).to_string()));
                return;
            }
        };

        if let Err(e) = set_nonblocking(&ws) {
            self.push(WorkerEvent::ConnectFailed(WsError::Io(e).to_string()));
            return;
        }

        tracing::debug!("connected");
        self.push(WorkerEvent::Connected);

        let mut last_activity = Instant::now();

        loop {
            if !self.pump_outbound(&mut ws) {
                return;
            }

            let (received, open) = self.pump_inbound(&mut ws);
            if !open {
                return;
            }

            if received > 0 {
                last_activity = Instant::now();
            } else if let Some(timeout) = self.activity_timeout {
                if last_activity.elapsed() > timeout {
                    let _ = ws.close(None);
                    let _ = ws.flush();
                    let reason = WsError::ActivityTimeout(timeout.as_millis()).to_string();
                    self.push(WorkerEvent::Disconnected(DisconnectInfo::local(
                        DisconnectCode::AbnormalClosure,
                        reason,
                    )));
                    return;
                }
            }

            if let Err(e) = ws.flush() {
                if !would_block(&e) {
                    self.fail(e);
                    return;
                }
            }

            if received == 0 {
                thread::sleep(IDLE_SLEEP);
            }
        }
    }

    /// Writes queued frames. Returns false once the connection is finished.
    fn pump_outbound(&self, ws: &mut Socket) -> bool {
        loop {
            let data = match self.commands.try_recv() {
                Ok(Command::Frame(data)) => data,
                Ok(Command::Close) | Err(TryRecvError::Disconnected) => {
                    let _ = ws.close(None);
                    let _ = ws.flush();
                    return false;
                }
                Err(TryRecvError::Empty) => return true,
            };

            let message = match self.kind {
                FrameKind::Binary => Message::Binary(data),
                FrameKind::Text => match String::from_utf8(data) {
                    Ok(text) => Message::Text(text),
                    Err(_) => {
                        self.push(WorkerEvent::Error("text frame is not valid UTF-8".into()));
                        continue;
                    }
                },
            };

            if let Err(e) = ws.send(message) {
                if !would_block(&e) {
                    self.fail(e);
                    return false;
                }
            }
        }
    }

    /// Reads every frame available. Returns the frame count and whether the socket is still open.
    fn pump_inbound(&self, ws: &mut Socket) -> (usize, bool) {
        let mut count = 0;

        loop {
            match ws.read() {
                Ok(Message::Text(text)) => {
                    self.push(WorkerEvent::Message(text.into_bytes()));
                    count += 1;
                }
                Ok(Message::Binary(data)) => {
                    self.push(WorkerEvent::Message(data));
                    count += 1;
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => {
                    count += 1;
                }
                Ok(Message::Close(frame)) => {
                    let info = match frame {
                        Some(frame) => DisconnectInfo::remote(
                            DisconnectCode::from(u16::from(frame.code)),
                            frame.reason.to_string(),
                        ),
                        None => DisconnectInfo::remote(DisconnectCode::NoStatusReceived, ""),
                    };
                    let _ = ws.flush();
                    tracing::debug!("closed by server: {}", info);
                    self.push(WorkerEvent::Disconnected(info));
                    return (count, false);
                }
                Err(e) if would_block(&e) => return (count, true),
                Err(e) => {
                    self.fail(e);
                    return (count, false);
                }
            }
        }
    }

    fn fail(&self, e: tungstenite::Error) {
        let description = WsError::WebSocket(e).to_string();
        tracing::debug!("connection failed: {}", description);
        self.push(WorkerEvent::Error(description.clone()));
        self.push(WorkerEvent::Disconnected(DisconnectInfo::remote(
            DisconnectCode::AbnormalClosure,
            description,
        )));
    }
}

fn set_nonblocking(ws: &Socket) -> io::Result<()> {
    match ws.get_ref() {
        MaybeTlsStream::Plain(stream) => stream.set_nonblocking(true),
        MaybeTlsStream::Rustls(stream) => stream.get_ref().set_nonblocking(true),
        _ => Ok(()),
    }
}

fn would_block(e: &tungstenite::Error) -> bool {
    matches!(e, tungstenite::Error::Io(io_err) if io_err.kind() == io::ErrorKind::WouldBlock)
}
