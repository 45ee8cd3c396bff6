//! Realtime client: connection state machine, correlation and dispatch.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use url::Url;

use nakama_ws::{DisconnectCode, DisconnectInfo, RtTransport, TransportEvent};

use super::callback::{self, RtCallback, RtReceiver};
use super::error::{RtError, RtErrorCode};
use super::heartbeat::{Clock, Heartbeat, HeartbeatAction, SystemClock, DEFAULT_HEARTBEAT_INTERVAL_MS};
use super::listener::{PushEvent, RtClientListener};
use super::message::{Envelope, EnvelopeMessage, Ping};
use super::protocol::{JsonProtocol, RtClientProtocol, RtProtocol};
use super::requests::{PendingRequest, RequestTable};
use crate::config::{DEFAULT_HOST, DEFAULT_PORT};
use crate::session::Session;

/// Realtime connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtClientConfig {
    pub host: String,
    pub port: u16,
    pub ssl: bool,
    /// `None` disables the heartbeat.
    pub heartbeat_interval_ms: Option<u64>,
}

impl Default for RtClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            ssl: false,
            heartbeat_interval_ms: Some(DEFAULT_HEARTBEAT_INTERVAL_MS),
        }
    }
}

/// Completion of the current connect attempt. Completing twice is a no-op.
#[derive(Default)]
struct ConnectSignal {
    tx: Option<oneshot::Sender<Result<(), RtError>>>,
}

impl ConnectSignal {
    fn arm(&mut self) -> RtReceiver<()> {
        let (tx, rx) = callback::channel();
        self.tx = Some(tx);
        rx
    }

    fn complete(&mut self, result: Result<(), RtError>) -> bool {
        settle(self.tx.take(), result)
    }

    /// Detach the outstanding completion, leaving room for a new attempt.
    fn take(&mut self) -> Option<oneshot::Sender<Result<(), RtError>>> {
        self.tx.take()
    }
}

fn settle(tx: Option<oneshot::Sender<Result<(), RtError>>>, result: Result<(), RtError>) -> bool {
    match tx {
        Some(tx) => {
            let _ = tx.send(result);
            true
        }
        None => false,
    }
}

enum SendError {
    NotConnected,
    Serialize(String),
    Transport,
}

/// Client for the realtime channel.
///
/// Nothing happens in the background: transport events, replies, pushes and
/// the heartbeat are all processed by [`RtClient::tick`], which the
/// application calls periodically (or hands to [`RtClient::spawn_ticker`]).
/// Listener methods and request continuations run on the thread calling
/// `tick`, except for failures detected while issuing a request, which run on
/// the calling thread.
///
/// Requests have no individual timeout. A request whose reply never arrives is
/// only released when the connection closes; the heartbeat is what closes a
/// silently dead connection.
pub struct RtClient {
    config: RtClientConfig,
    transport: Mutex<Box<dyn RtTransport>>,
    protocol: RwLock<Arc<dyn RtProtocol>>,
    binary_protocol: RwLock<Option<Arc<dyn RtProtocol>>>,
    listener: RwLock<Option<Arc<dyn RtClientListener>>>,
    requests: RequestTable,
    heartbeat: Arc<Mutex<Heartbeat>>,
    clock: Arc<dyn Clock>,
    want_disconnect: AtomicBool,
    /// Bumped whenever a connection is abandoned; stale events are dropped.
    epoch: AtomicU64,
    connect_signal: Mutex<ConnectSignal>,
}

impl RtClient {
    pub fn new(transport: impl RtTransport + 'static, config: RtClientConfig) -> Self {
        let heartbeat = Heartbeat::new(config.heartbeat_interval_ms);
        Self {
            config,
            transport: Mutex::new(Box::new(transport)),
            protocol: RwLock::new(Arc::new(JsonProtocol)),
            binary_protocol: RwLock::new(None),
            listener: RwLock::new(None),
            requests: RequestTable::new(),
            heartbeat: Arc::new(Mutex::new(heartbeat)),
            clock: Arc::new(SystemClock),
            want_disconnect: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
            connect_signal: Mutex::new(ConnectSignal::default()),
        }
    }

    /// Replace the time source used by the heartbeat.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &RtClientConfig {
        &self.config
    }

    pub fn set_listener(&self, listener: Arc<dyn RtClientListener>) {
        *self.listener.write() = Some(listener);
    }

    pub fn clear_listener(&self) {
        *self.listener.write() = None;
    }

    /// Install the codec used by [`RtClientProtocol::Protobuf`].
    pub fn set_binary_protocol(&self, protocol: Arc<dyn RtProtocol>) {
        *self.binary_protocol.write() = Some(protocol);
    }

    pub fn heartbeat_interval_ms(&self) -> Option<u64> {
        self.heartbeat.lock().interval_ms()
    }

    pub fn set_heartbeat_interval_ms(&self, interval_ms: Option<u64>) {
        self.heartbeat.lock().set_interval_ms(interval_ms);
    }

    /// Close the connection when nothing arrives for `timeout`, if the transport supports it.
    pub fn set_activity_timeout(&self, timeout: Option<Duration>) {
        self.transport.lock().set_activity_timeout(timeout);
    }

    pub fn is_connected(&self) -> bool {
        self.transport.lock().is_connected()
    }

    pub fn is_connecting(&self) -> bool {
        self.transport.lock().is_connecting()
    }

    /// Number of requests awaiting a reply.
    pub fn pending_requests(&self) -> usize {
        self.requests.len()
    }

    fn listener(&self) -> Option<Arc<dyn RtClientListener>> {
        self.listener.read().clone()
    }

    // ========================================================================
    // Connection lifecycle
    // ========================================================================

    /// Start connecting with `session`'s token.
    ///
    /// The receiver resolves once the connection is up or the attempt fails.
    /// It is already resolved with `Ok` if a connection exists or is in progress.
    pub fn connect(
        &self,
        session: &Session,
        create_status: bool,
        protocol: RtClientProtocol,
    ) -> RtReceiver<()> {
        let mut transport = self.transport.lock();

        if transport.is_connected() || transport.is_connecting() {
            tracing::debug!("connect ignored, already connected or connecting");
            return RtReceiver::ready(Ok(()));
        }

        let codec: Arc<dyn RtProtocol> = match protocol {
            RtClientProtocol::Json => Arc::new(JsonProtocol),
            RtClientProtocol::Protobuf => match self.binary_protocol.read().clone() {
                Some(codec) => codec,
                None => {
                    drop(transport);
                    return self.refuse_connect(RtError::connect("no binary protocol installed"));
                }
            },
        };

        let url = match self.connect_url(&session.token, create_status, codec.format()) {
            Ok(url) => url,
            Err(e) => {
                drop(transport);
                return self.refuse_connect(RtError::connect(format!("invalid server address: {e}")));
            }
        };

        let rx = self.connect_signal.lock().arm();
        self.want_disconnect.store(false, Ordering::SeqCst);
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.heartbeat.lock().reset();
        *self.protocol.write() = codec.clone();

        tracing::info!(
            "connecting to {}:{} (ssl: {}, protocol: {:?})",
            self.config.host,
            self.config.port,
            self.config.ssl,
            protocol
        );
        transport.connect(url.as_str(), codec.frame_kind());

        rx
    }

    fn refuse_connect(&self, err: RtError) -> RtReceiver<()> {
        self.notify_error(&err);
        RtReceiver::ready(Err(err))
    }

    fn connect_url(
        &self,
        token: &str,
        create_status: bool,
        format: Option<&str>,
    ) -> Result<Url, url::ParseError> {
        let scheme = if self.config.ssl { "wss" } else { "ws" };
        let mut url = Url::parse(&format!(
            "{}://{}:{}/ws",
            scheme, self.config.host, self.config.port
        ))?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("token", token);
            query.append_pair("status", if create_status { "true" } else { "false" });
            if let Some(format) = format {
                query.append_pair("format", format);
            }
        }

        Ok(url)
    }

    pub fn disconnect(&self) {
        self.disconnect_with(DisconnectInfo::local(
            DisconnectCode::NormalClosure,
            "Disconnect initiated by us",
        ));
    }

    /// Close the connection, reporting `info` to the listener.
    ///
    /// When a connection was up, pending requests fail and `on_disconnect`
    /// fires before this returns. Calling it while disconnected does nothing
    /// beyond failing a connect still in progress.
    pub fn disconnect_with(&self, info: DisconnectInfo) {
        let was_connected = {
            let mut transport = self.transport.lock();
            let was_connected = transport.is_connected();
            transport.disconnect();
            was_connected
        };

        self.want_disconnect.store(true, Ordering::SeqCst);
        self.epoch.fetch_add(1, Ordering::SeqCst);

        if was_connected {
            self.on_transport_disconnected(info);
        } else {
            let pending = self.connect_signal.lock().take();
            settle(pending, Err(RtError::connect("Disconnected while connecting.")));
        }
    }

    /// Process heartbeat and transport events. Call regularly, e.g. every 50 ms.
    pub fn tick(&self) {
        self.heartbeat_step();

        let epoch = self.epoch.load(Ordering::SeqCst);
        let events = self.transport.lock().poll();

        for event in events {
            if self.epoch.load(Ordering::SeqCst) != epoch {
                tracing::debug!("connection replaced, dropping remaining events");
                break;
            }

            match event {
                TransportEvent::Connected => self.on_transport_connected(),
                TransportEvent::Disconnected(info) => self.on_transport_disconnected(info),
                TransportEvent::Error(description) => self.on_transport_error(&description),
                TransportEvent::Message(data) => self.on_transport_message(&data),
            }
        }
    }

    /// Call [`tick`](Self::tick) every `period` on the tokio runtime.
    ///
    /// The task ends once the last other reference to the client is dropped.
    pub fn spawn_ticker(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let client = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                match client.upgrade() {
                    Some(client) => client.tick(),
                    None => break,
                }
            }
        })
    }

    fn heartbeat_step(&self) {
        let now = self.clock.now_ms();
        let connected = self.transport.lock().is_connected();
        let action = self.heartbeat.lock().check(
            now,
            connected,
            self.want_disconnect.load(Ordering::SeqCst),
            !self.requests.is_empty(),
        );

        match action {
            HeartbeatAction::Idle => {}
            HeartbeatAction::Fail => {
                tracing::debug!("heartbeat went unanswered");
                self.disconnect_with(DisconnectInfo::local(
                    DisconnectCode::HeartbeatFailure,
                    "Heartbeat failure",
                ));
            }
            HeartbeatAction::SendPing => self.ping(now),
        }
    }

    fn ping(&self, now: u64) {
        tracing::debug!("sending heartbeat");
        let heartbeat = self.heartbeat.clone();
        let request = PendingRequest::new().on_success(move |_| {
            heartbeat.lock().record_pong();
            Ok(())
        });

        if self.request(EnvelopeMessage::Ping(Ping {}), request) {
            self.heartbeat.lock().record_ping(now);
        }
    }

    // ========================================================================
    // Transport events
    // ========================================================================

    fn on_transport_connected(&self) {
        tracing::info!("connected");
        self.heartbeat.lock().on_connected(self.clock.now_ms());

        if let Some(listener) = self.listener() {
            listener.on_connect();
        }

        self.connect_signal.lock().complete(Ok(()));
    }

    fn on_transport_disconnected(&self, info: DisconnectInfo) {
        tracing::debug!("disconnected: {}", info);

        // A connect issued by the listener below arms its own completion.
        let pending = self.connect_signal.lock().take();

        let cancelled = self.requests.cancel_all(&RtError::disconnected("Disconnected"));
        if cancelled > 0 {
            tracing::debug!("{} pending requests cancelled", cancelled);
        }

        if let Some(listener) = self.listener() {
            listener.on_disconnect(&info);
        }

        settle(pending, Err(RtError::connect("Disconnected while connecting.")));
    }

    fn on_transport_error(&self, description: &str) {
        let code = if self.transport.lock().is_connected() {
            RtErrorCode::TransportError
        } else {
            RtErrorCode::ConnectError
        };

        let pending = self.connect_signal.lock().take();
        self.notify_error(&RtError::new(code, description));

        let err = RtError::connect("An error occurred while connecting.").with_context("reason", description);
        settle(pending, Err(err));
    }

    fn on_transport_message(&self, data: &[u8]) {
        self.heartbeat.lock().record_activity(self.clock.now_ms());

        let protocol = self.protocol.read().clone();

        let envelope = match protocol.parse(data) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::debug!("unparseable frame: {}", e);
                self.on_transport_error("parse message failed");
                return;
            }
        };

        let cid = match envelope.correlation_id().map(str::to_string) {
            None => {
                self.dispatch_push(envelope.message);
                return;
            }
            Some(cid) => cid,
        };

        let request = cid.parse::<i32>().ok().and_then(|cid| self.requests.resolve(cid));
        let request = match request {
            Some(request) => request,
            None => {
                self.on_transport_error(&format!("request context not found. cid: {cid}"));
                return;
            }
        };

        let outcome = match envelope.message {
            Some(EnvelopeMessage::Error(e)) => {
                let err = RtError::from(e);
                tracing::error!("request {} failed: {}", cid, err);
                Err(err)
            }
            other => Ok(other),
        };

        if let Some(unhandled) = request.complete(outcome) {
            self.report_unhandled(unhandled);
        }
    }

    fn dispatch_push(&self, message: Option<EnvelopeMessage>) {
        let message = match message {
            Some(message) => message,
            None => {
                self.on_transport_error("Unknown message received");
                return;
            }
        };

        let name = message.name();
        match PushEvent::try_from(message) {
            Ok(event) => match self.listener() {
                Some(listener) => event.dispatch(listener.as_ref()),
                None => tracing::warn!("no listener, {} dropped", name),
            },
            Err(_) => self.on_transport_error(&format!("Unknown message received: {name}")),
        }
    }

    // ========================================================================
    // Requests
    // ========================================================================

    /// Reserve a cid for `request` and send `message` under it.
    ///
    /// Returns whether the frame was handed to the transport. On failure the
    /// request has already been failed.
    pub(crate) fn request(&self, message: EnvelopeMessage, request: PendingRequest) -> bool {
        let name = message.name();

        let cid = match self.requests.reserve(request) {
            Ok(cid) => cid,
            Err(request) => {
                let err = RtError::new(RtErrorCode::Unknown, "no free correlation id");
                if let Some(unhandled) = request.complete(Err(err)) {
                    self.report_unhandled(unhandled);
                }
                return false;
            }
        };

        tracing::debug!("request {} cid {}", name, cid);
        self.transmit(Envelope::new(message).with_cid(cid.to_string()), Some(cid))
    }

    /// Typed request: `decode` picks the expected reply out of the envelope.
    pub(crate) fn typed_request<T, F>(
        &self,
        message: EnvelopeMessage,
        callback: RtCallback<T>,
        decode: F,
    ) where
        T: Send + 'static,
        F: FnOnce(Option<EnvelopeMessage>) -> Option<T> + Send + 'static,
    {
        let (on_success, on_error) = callback.into_parts();

        let mut request = PendingRequest::new().on_success(move |reply| {
            let name = reply.as_ref().map_or("empty reply", EnvelopeMessage::name);
            match decode(reply) {
                Some(value) => {
                    if let Some(on_success) = on_success {
                        on_success(value);
                    }
                    Ok(())
                }
                None => Err(RtError::new(
                    RtErrorCode::UnrecognizedPayload,
                    format!("unexpected reply: {name}"),
                )),
            }
        });

        if let Some(on_error) = on_error {
            request = request.on_error(on_error);
        }

        self.request(message, request);
    }

    /// Send a message no reply is expected for.
    pub(crate) fn send_message(&self, message: EnvelopeMessage) -> bool {
        self.transmit(Envelope::new(message), None)
    }

    fn transmit(&self, envelope: Envelope, cid: Option<i32>) -> bool {
        let (err, broken) = match self.send_envelope(&envelope) {
            Ok(()) => return true,
            Err(SendError::NotConnected) => (RtError::connect("Not connected"), false),
            Err(SendError::Serialize(reason)) => (
                RtError::transport("Serialize message failed").with_context("reason", reason),
                false,
            ),
            Err(SendError::Transport) => (RtError::transport("Send message failed"), true),
        };

        match cid {
            Some(cid) => self.fail_request(cid, err),
            None => self.notify_error(&err),
        }

        if broken {
            self.disconnect_with(DisconnectInfo::local(
                DisconnectCode::TransportError,
                "Send message failed",
            ));
        }

        false
    }

    fn send_envelope(&self, envelope: &Envelope) -> Result<(), SendError> {
        let protocol = self.protocol.read().clone();

        {
            let mut transport = self.transport.lock();
            if !transport.is_connected() {
                return Err(SendError::NotConnected);
            }

            let bytes = protocol
                .serialize(envelope)
                .map_err(|e| SendError::Serialize(e.to_string()))?;

            if !transport.send(&bytes) {
                return Err(SendError::Transport);
            }
        }

        self.heartbeat.lock().record_activity(self.clock.now_ms());
        Ok(())
    }

    /// Fail the request registered under `cid` with a locally raised error.
    fn fail_request(&self, cid: i32, err: RtError) {
        match self.requests.resolve(cid) {
            Some(request) => {
                if let Some(unhandled) = request.complete(Err(err)) {
                    self.report_unhandled(unhandled);
                }
            }
            None => {
                tracing::error!("request context not found. cid: {}", cid);
                self.notify_error(&err);
            }
        }
    }

    fn report_unhandled(&self, err: RtError) {
        match self.listener() {
            Some(listener) => listener.on_error(&err),
            None => tracing::warn!("unhandled realtime error: {}", err),
        }
    }

    fn notify_error(&self, err: &RtError) {
        tracing::error!("{}", err);
        if let Some(listener) = self.listener() {
            listener.on_error(err);
        }
    }
}
