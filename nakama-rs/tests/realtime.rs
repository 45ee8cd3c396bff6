use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use parking_lot::Mutex;
use serde_json::{json, Value};

use nakama_rs::rt::{
    ChannelType, DisconnectCode, DisconnectInfo, ManualClock, MatchmakerParams, Notifications,
    RtCallback, RtClient, RtClientConfig, RtClientListener, RtClientProtocol, RtError, RtErrorCode,
    RtReceiver, UserPresence,
};
use nakama_rs::Session;
use nakama_ws::{MemoryPeer, MemoryTransport};

const START_MS: u64 = 1_000_000;

fn session() -> Session {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(
        json!({ "exp": 4_000_000_000u64, "uid": "user-1", "usn": "player1" }).to_string(),
    );
    Session::restore(&format!("{header}.{body}.signature"), None).unwrap()
}

#[derive(Default)]
struct Recorder {
    log: Mutex<Vec<String>>,
    errors: Mutex<Vec<RtError>>,
    disconnects: Mutex<Vec<DisconnectInfo>>,
    notifications: Mutex<Vec<Notifications>>,
}

impl Recorder {
    fn log(&self) -> Vec<String> {
        self.log.lock().clone()
    }
}

impl RtClientListener for Recorder {
    fn on_connect(&self) {
        self.log.lock().push("connect".into());
    }

    fn on_disconnect(&self, info: &DisconnectInfo) {
        self.log.lock().push("disconnect".into());
        self.disconnects.lock().push(info.clone());
    }

    fn on_error(&self, error: &RtError) {
        self.log.lock().push("error".into());
        self.errors.lock().push(error.clone());
    }

    fn on_notifications(&self, notifications: &Notifications) {
        self.log.lock().push("notifications".into());
        self.notifications.lock().push(notifications.clone());
    }
}

struct Harness {
    client: Arc<RtClient>,
    peer: MemoryPeer,
    clock: Arc<ManualClock>,
    listener: Arc<Recorder>,
}

impl Harness {
    fn new() -> Self {
        let (transport, peer) = MemoryTransport::pair();
        let clock = Arc::new(ManualClock::new(START_MS));
        let client = RtClient::new(transport, RtClientConfig::default()).with_clock(clock.clone());
        let listener = Arc::new(Recorder::default());
        client.set_listener(listener.clone());

        Self {
            client: Arc::new(client),
            peer,
            clock,
            listener,
        }
    }

    fn connected() -> Self {
        let h = Self::new();
        h.connect();
        h
    }

    fn connect(&self) {
        let mut rx = self.client.connect(&session(), true, RtClientProtocol::Json);
        self.peer.complete_connect();
        self.client.tick();
        assert_eq!(rx.try_result(), Some(Ok(())));
        assert!(self.client.is_connected());
    }

    fn sent(&self) -> Vec<Value> {
        self.peer
            .take_sent()
            .iter()
            .map(|frame| serde_json::from_slice(frame).unwrap())
            .collect()
    }

    fn reply(&self, frame: Value) {
        self.peer.push_message(frame.to_string());
        self.client.tick();
    }
}

fn cid(frame: &Value) -> String {
    frame["cid"].as_str().unwrap().to_string()
}

fn error_counter(counter: &Arc<AtomicUsize>, expected: RtErrorCode) -> RtCallback<()> {
    let counter = counter.clone();
    RtCallback::none().on_error(move |err| {
        assert_eq!(err.code, expected);
        counter.fetch_add(1, Ordering::SeqCst);
    })
}

#[test]
fn test_connect_builds_url_and_notifies() {
    let h = Harness::connected();

    let url = h.peer.last_url().unwrap();
    assert!(url.starts_with("ws://127.0.0.1:7350/ws?token="));
    assert!(url.contains(&session().token));
    assert!(url.ends_with("&status=true"));
    assert_eq!(h.listener.log(), vec!["connect"]);
}

#[test]
fn test_join_chat_round_trip() {
    let h = Harness::connected();

    let (callback, mut rx) = RtCallback::oneshot();
    h.client.join_chat("room1", ChannelType::Room, None, None, callback);

    let sent = h.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["channel_join"]["target"], "room1");
    assert_eq!(sent[0]["channel_join"]["type"], 1);
    assert_eq!(sent[0]["channel_join"]["persistence"], false);
    assert_eq!(h.client.pending_requests(), 1);
    assert!(rx.try_result().is_none());

    h.reply(json!({ "cid": cid(&sent[0]), "channel": { "id": "room1" } }));

    let channel = rx.try_result().unwrap().unwrap();
    assert_eq!(channel.id, "room1");
    assert_eq!(h.client.pending_requests(), 0);
}

#[test]
fn test_push_reaches_listener() {
    let h = Harness::connected();
    let (callback, mut rx) = RtCallback::<()>::oneshot();
    h.client.leave_chat("room1", callback);

    h.reply(json!({
        "notifications": { "notifications": [ { "id": "n1", "subject": "hello", "code": 1 } ] }
    }));

    let notifications = h.listener.notifications.lock().clone();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].notifications[0].id, "n1");
    assert!(h.listener.errors.lock().is_empty());
    assert!(rx.try_result().is_none());
    assert_eq!(h.client.pending_requests(), 1);
}

#[test]
fn test_reply_for_unknown_cid_is_reported() {
    let h = Harness::connected();

    h.reply(json!({ "cid": "77", "pong": {} }));

    let errors = h.listener.errors.lock().clone();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, RtErrorCode::TransportError);
    assert_eq!(errors[0].message, "request context not found. cid: 77");
    assert!(h.client.is_connected());
}

#[test]
fn test_garbage_frames_are_reported() {
    let h = Harness::connected();

    h.reply(json!({ "ping": {}, "pong": {} }));
    h.peer.push_message("not json");
    h.client.tick();
    h.reply(json!({}));

    let errors = h.listener.errors.lock().clone();
    let messages: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(
        messages,
        vec!["parse message failed", "parse message failed", "Unknown message received"]
    );
    assert!(h.client.is_connected());
}

#[test]
fn test_disconnect_fails_every_pending_request() {
    let h = Harness::connected();
    let failed = Arc::new(AtomicUsize::new(0));

    for id in ["a", "b", "c"] {
        h.client.leave_chat(id, error_counter(&failed, RtErrorCode::Disconnected));
    }
    assert_eq!(h.client.pending_requests(), 3);

    h.client.disconnect();

    assert_eq!(failed.load(Ordering::SeqCst), 3);
    assert_eq!(h.client.pending_requests(), 0);
    assert!(!h.client.is_connected());

    let disconnects = h.listener.disconnects.lock().clone();
    assert_eq!(disconnects.len(), 1);
    assert_eq!(disconnects[0].code, DisconnectCode::NormalClosure);
    assert!(!disconnects[0].remote);
}

#[test]
fn test_disconnect_is_idempotent() {
    let h = Harness::connected();

    h.client.disconnect();
    h.client.disconnect();
    h.client.tick();

    assert_eq!(h.listener.disconnects.lock().len(), 1);
}

#[test]
fn test_remote_close() {
    let h = Harness::connected();
    let failed = Arc::new(AtomicUsize::new(0));
    h.client.leave_match("m1", error_counter(&failed, RtErrorCode::Disconnected));

    h.peer.close_remote(DisconnectCode::GoingAway, "server shutdown");
    h.client.tick();

    assert_eq!(failed.load(Ordering::SeqCst), 1);
    let disconnects = h.listener.disconnects.lock().clone();
    assert_eq!(disconnects.len(), 1);
    assert_eq!(disconnects[0].code, DisconnectCode::GoingAway);
    assert_eq!(disconnects[0].reason, "server shutdown");
    assert!(disconnects[0].remote);
    assert!(!h.client.is_connected());
}

#[test]
fn test_no_heartbeat_while_requests_pending() {
    let h = Harness::connected();
    h.client.leave_chat("room1", RtCallback::none());
    let request = h.sent().remove(0);

    h.clock.advance(60_000);
    h.client.tick();
    assert!(h.sent().is_empty());

    // The reply counts as traffic, so the next ping waits a full interval.
    h.reply(json!({ "cid": cid(&request) }));
    h.clock.advance(4_999);
    h.client.tick();
    assert!(h.sent().is_empty());

    h.clock.advance(1);
    h.client.tick();
    let sent = h.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].get("ping").is_some());
}

#[test]
fn test_answered_heartbeat_keeps_connection() {
    let h = Harness::connected();

    h.clock.advance(5_000);
    h.client.tick();
    let ping = h.sent().remove(0);
    assert!(ping.get("ping").is_some());

    h.reply(json!({ "cid": cid(&ping), "pong": {} }));
    h.clock.advance(5_001);
    h.client.tick();

    assert!(h.client.is_connected());
    assert!(h.listener.disconnects.lock().is_empty());
    assert!(h.sent()[0].get("ping").is_some());
}

#[test]
fn test_heartbeat_failure_fires_once() {
    let h = Harness::connected();

    h.clock.advance(5_000);
    h.client.tick();
    assert_eq!(h.sent().len(), 1);

    h.clock.advance(5_001);
    h.client.tick();

    for _ in 0..20 {
        h.clock.advance(10_000);
        h.client.tick();
    }

    let disconnects = h.listener.disconnects.lock().clone();
    assert_eq!(disconnects.len(), 1);
    assert_eq!(disconnects[0].code, DisconnectCode::HeartbeatFailure);
    assert_eq!(disconnects[0].reason, "Heartbeat failure");
    assert!(!h.client.is_connected());

    // A new connection arms the check again.
    h.connect();
    h.clock.advance(5_000);
    h.client.tick();
    h.clock.advance(5_001);
    h.client.tick();
    assert_eq!(h.listener.disconnects.lock().len(), 2);
}

#[test]
fn test_disabled_heartbeat_never_pings() {
    let h = Harness::connected();
    h.client.set_heartbeat_interval_ms(None);

    for _ in 0..5 {
        h.clock.advance(60_000);
        h.client.tick();
    }

    assert!(h.sent().is_empty());
    assert!(h.client.is_connected());
}

#[test]
fn test_correlation_ids_restart_after_drain() {
    let h = Harness::connected();

    for _ in 0..3 {
        for i in 0..10 {
            h.client.leave_chat(&format!("room{i}"), RtCallback::none());
        }
        let cids: Vec<String> = h.sent().iter().map(cid).collect();
        assert_eq!(cids, (0..10).map(|i| i.to_string()).collect::<Vec<_>>());

        for cid in cids {
            h.peer.push_message(json!({ "cid": cid }).to_string());
        }
        h.client.tick();
        assert_eq!(h.client.pending_requests(), 0);
    }

    assert!(h.listener.errors.lock().is_empty());
}

#[test]
fn test_server_error_routing() {
    let h = Harness::connected();

    let (callback, mut rx) = RtCallback::<()>::oneshot();
    h.client.leave_party("p1", callback);
    h.client.leave_party("p2", RtCallback::none());
    let sent = h.sent();

    h.reply(json!({ "cid": cid(&sent[0]), "error": { "code": 3, "message": "bad party id" } }));
    let err = rx.try_result().unwrap().unwrap_err();
    assert_eq!(err.code, RtErrorCode::BadInput);
    assert_eq!(err.message, "bad party id");
    assert!(h.listener.errors.lock().is_empty());

    h.reply(json!({ "cid": cid(&sent[1]), "error": { "code": 4, "message": "gone" } }));
    let errors = h.listener.errors.lock().clone();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, RtErrorCode::MatchNotFound);

    assert!(h.client.is_connected());
}

#[test]
fn test_unexpected_reply_payload() {
    let h = Harness::connected();

    let (callback, mut rx) = RtCallback::oneshot();
    h.client.create_match(None, callback);
    let sent = h.sent();
    assert_eq!(sent[0]["match_create"], json!({}));

    h.reply(json!({ "cid": cid(&sent[0]), "status": {} }));
    let err = rx.try_result().unwrap().unwrap_err();
    assert_eq!(err.code, RtErrorCode::UnrecognizedPayload);
}

#[test]
fn test_send_failure_fails_request_then_disconnects() {
    let h = Harness::connected();
    let listener = h.listener.clone();
    h.peer.set_fail_sends(true);

    h.client.add_matchmaker(
        MatchmakerParams::new(),
        RtCallback::none().on_error(move |err| {
            assert_eq!(err.code, RtErrorCode::TransportError);
            assert_eq!(err.message, "Send message failed");
            listener.log.lock().push("request_error".into());
        }),
    );

    assert_eq!(h.listener.log(), vec!["connect", "request_error", "disconnect"]);
    let disconnects = h.listener.disconnects.lock().clone();
    assert_eq!(disconnects[0].code, DisconnectCode::TransportError);
    assert!(!h.client.is_connected());
    assert_eq!(h.client.pending_requests(), 0);
}

#[test]
fn test_request_while_disconnected() {
    let h = Harness::new();

    let (callback, mut rx) = RtCallback::oneshot();
    h.client.follow_users(&["u1"], callback);

    let err = rx.try_result().unwrap().unwrap_err();
    assert_eq!(err.code, RtErrorCode::ConnectError);
    assert_eq!(err.message, "Not connected");
    assert_eq!(h.peer.sent_count(), 0);
    assert_eq!(h.client.pending_requests(), 0);
}

#[test]
fn test_connect_failure() {
    let h = Harness::new();

    let mut rx = h.client.connect(&session(), false, RtClientProtocol::Json);
    assert!(h.client.is_connecting());
    h.peer.fail_connect("connection refused");
    h.client.tick();

    let err = rx.try_result().unwrap().unwrap_err();
    assert_eq!(err.code, RtErrorCode::ConnectError);
    assert_eq!(err.message, "An error occurred while connecting.");

    let errors = h.listener.errors.lock().clone();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, RtErrorCode::ConnectError);
    assert_eq!(errors[0].message, "connection refused");
    assert!(!h.client.is_connecting());

    // A failed attempt can be retried.
    h.connect();
    assert_eq!(h.peer.connect_count(), 2);
}

#[test]
fn test_disconnect_while_connecting() {
    let h = Harness::new();

    let mut rx = h.client.connect(&session(), false, RtClientProtocol::Json);
    h.client.disconnect();

    let err = rx.try_result().unwrap().unwrap_err();
    assert_eq!(err.message, "Disconnected while connecting.");
    assert!(h.listener.disconnects.lock().is_empty());

    // The abandoned attempt can no longer complete.
    h.peer.complete_connect();
    h.client.tick();
    assert!(!h.client.is_connected());
    assert!(h.listener.log().is_empty());
}

#[test]
fn test_connect_right_after_disconnect() {
    let h = Harness::new();

    let mut abandoned = h.client.connect(&session(), false, RtClientProtocol::Json);
    h.client.disconnect();
    let mut second = h.client.connect(&session(), false, RtClientProtocol::Json);

    assert!(abandoned.try_result().unwrap().is_err());
    assert_eq!(second.try_result(), None);

    h.peer.complete_connect();
    h.client.tick();
    assert_eq!(second.try_result(), Some(Ok(())));

    h.client.disconnect();
    let mut third = h.client.connect(&session(), false, RtClientProtocol::Json);
    assert_eq!(third.try_result(), None);

    h.peer.complete_connect();
    h.client.tick();
    assert_eq!(third.try_result(), Some(Ok(())));
    assert_eq!(h.listener.log(), vec!["connect", "disconnect", "connect"]);
}

/// Starts a new connect whenever the connection drops or fails.
#[derive(Default)]
struct Reconnector {
    client: Mutex<Weak<RtClient>>,
    attempts: Mutex<Vec<RtReceiver<()>>>,
}

impl Reconnector {
    fn reconnect(&self) {
        let client = self.client.lock().upgrade();
        if let Some(client) = client {
            let attempt = client.connect(&session(), false, RtClientProtocol::Json);
            self.attempts.lock().push(attempt);
        }
    }
}

impl RtClientListener for Reconnector {
    fn on_disconnect(&self, _info: &DisconnectInfo) {
        self.reconnect();
    }

    fn on_error(&self, _error: &RtError) {
        self.reconnect();
    }
}

fn reconnecting_client() -> (Arc<RtClient>, MemoryPeer, Arc<Reconnector>) {
    let (transport, peer) = MemoryTransport::pair();
    let config = RtClientConfig {
        heartbeat_interval_ms: None,
        ..Default::default()
    };
    let client = Arc::new(RtClient::new(transport, config));
    let listener = Arc::new(Reconnector::default());
    *listener.client.lock() = Arc::downgrade(&client);
    client.set_listener(listener.clone());
    (client, peer, listener)
}

#[test]
fn test_reconnect_from_disconnect_listener() {
    let (client, peer, listener) = reconnecting_client();

    let mut first = client.connect(&session(), false, RtClientProtocol::Json);
    peer.complete_connect();
    client.tick();
    assert_eq!(first.try_result(), Some(Ok(())));

    peer.close_remote(DisconnectCode::GoingAway, "server restart");
    client.tick();

    assert_eq!(peer.connect_count(), 2);
    let mut attempt = listener.attempts.lock().pop().unwrap();
    assert_eq!(attempt.try_result(), None);

    peer.complete_connect();
    client.tick();
    assert_eq!(attempt.try_result(), Some(Ok(())));
    assert!(client.is_connected());
}

#[test]
fn test_retry_from_error_listener() {
    let (client, peer, listener) = reconnecting_client();

    let mut first = client.connect(&session(), false, RtClientProtocol::Json);
    peer.fail_connect("connection refused");
    client.tick();

    let err = first.try_result().unwrap().unwrap_err();
    assert_eq!(err.message, "An error occurred while connecting.");
    assert_eq!(peer.connect_count(), 2);

    let mut retry = listener.attempts.lock().pop().unwrap();
    assert_eq!(retry.try_result(), None);

    peer.complete_connect();
    client.tick();
    assert_eq!(retry.try_result(), Some(Ok(())));
}

#[test]
fn test_send_match_data_skips_invalid_presences() {
    let h = Harness::connected();

    let valid = UserPresence {
        user_id: "u1".into(),
        session_id: "s1".into(),
        ..Default::default()
    };
    let missing_session = UserPresence {
        user_id: "u2".into(),
        ..Default::default()
    };

    h.client.send_match_data("m1", 5, b"hi", &[valid, missing_session]);

    let sent = h.sent();
    let data = &sent[0]["match_data_send"];
    assert!(sent[0].get("cid").is_none());
    assert_eq!(data["op_code"], "5");
    assert_eq!(data["data"], "aGk=");
    assert_eq!(data["presences"].as_array().unwrap().len(), 1);
    assert_eq!(data["presences"][0]["user_id"], "u1");
    assert_eq!(h.client.pending_requests(), 0);
}

#[test]
fn test_send_party_data() {
    let h = Harness::connected();

    h.client.send_party_data("p1", -1, &[0xff]);

    let sent = h.sent();
    assert_eq!(sent[0]["party_data_send"]["party_id"], "p1");
    assert_eq!(sent[0]["party_data_send"]["op_code"], "-1");
    assert_eq!(sent[0]["party_data_send"]["data"], "/w==");
}

struct Disconnector {
    client: Mutex<Option<Weak<RtClient>>>,
    seen: AtomicUsize,
}

impl RtClientListener for Disconnector {
    fn on_notifications(&self, _notifications: &Notifications) {
        self.seen.fetch_add(1, Ordering::SeqCst);
        if let Some(client) = self.client.lock().as_ref().and_then(Weak::upgrade) {
            client.disconnect();
        }
    }
}

#[test]
fn test_events_after_local_disconnect_are_dropped() {
    let h = Harness::connected();
    let listener = Arc::new(Disconnector {
        client: Mutex::new(Some(Arc::downgrade(&h.client))),
        seen: AtomicUsize::new(0),
    });
    h.client.set_listener(listener.clone());

    for _ in 0..2 {
        h.peer
            .push_message(json!({ "notifications": { "notifications": [] } }).to_string());
    }
    h.client.tick();

    assert_eq!(listener.seen.load(Ordering::SeqCst), 1);
    assert!(!h.client.is_connected());
}

#[test]
fn test_clear_listener() {
    let h = Harness::connected();
    h.client.clear_listener();

    h.reply(json!({ "notifications": { "notifications": [] } }));
    h.reply(json!({ "cid": "5", "pong": {} }));

    assert_eq!(h.listener.log(), vec!["connect"]);
}

#[tokio::test]
async fn test_spawned_ticker_drives_client() {
    let h = Harness::new();
    let ticker = h.client.spawn_ticker(Duration::from_millis(5));

    let rx = h.client.connect(&session(), true, RtClientProtocol::Json);
    h.peer.complete_connect();

    let connected = tokio::time::timeout(Duration::from_secs(2), rx).await.unwrap();
    assert_eq!(connected, Ok(()));

    let (callback, rx) = RtCallback::oneshot();
    h.client.rpc("echo", Some(r#"{"x":1}"#), callback);
    let request = h.sent().remove(0);
    assert_eq!(request["rpc"]["id"], "echo");
    h.peer.push_message(
        json!({ "cid": cid(&request), "rpc": { "id": "echo", "payload": "{\"x\":1}" } }).to_string(),
    );

    let rpc = tokio::time::timeout(Duration::from_secs(2), rx).await.unwrap().unwrap();
    assert_eq!(rpc.payload, r#"{"x":1}"#);

    drop(h);
    tokio::time::timeout(Duration::from_secs(2), ticker)
        .await
        .unwrap()
        .unwrap();
}
