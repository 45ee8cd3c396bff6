use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::{Json, Router};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use parking_lot::Mutex;
use serde_json::{json, Value};

use nakama_rs::{
    CreateGroup, Error, LeaderboardRecordWrite, NakamaClient, Session, StorageReadRequest,
    StorageWriteRequest, UpdateAccount,
};

/// One request as the mock server saw it.
#[derive(Debug, Clone)]
struct Recorded {
    method: Method,
    path: String,
    auth: Option<String>,
    query: Vec<(String, String)>,
    body: Value,
}

impl Recorded {
    fn query(&self, name: &str) -> Vec<&str> {
        self.query
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }
}

type Log = Arc<Mutex<Vec<Recorded>>>;

fn token(user_id: &str, exp: u64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(json!({ "exp": exp, "uid": user_id, "usn": "player1" }).to_string());
    format!("{header}.{body}.signature")
}

const FAR_FUTURE: u64 = 4_000_000_000;

async fn handle(
    State(log): State<Log>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let recorded = Recorded {
        method: method.clone(),
        path: uri.path().to_string(),
        auth: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        query: url::form_urlencoded::parse(uri.query().unwrap_or("").as_bytes())
            .into_owned()
            .collect(),
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
    };
    log.lock().push(recorded.clone());

    let path = recorded.path.as_str();
    match (method.as_str(), path) {
        ("POST", p) if p.starts_with("/v2/account/authenticate/") => (
            StatusCode::OK,
            Json(json!({
                "created": true,
                "token": token("user-1", FAR_FUTURE),
                "refresh_token": token("user-1", FAR_FUTURE + 1000),
            })),
        ),
        ("POST", "/v2/account/session/refresh") => (
            StatusCode::OK,
            Json(json!({ "token": token("user-1", FAR_FUTURE + 5) })),
        ),
        ("GET", "/v2/account") => (
            StatusCode::OK,
            Json(json!({
                "user": { "id": "user-1", "username": "player1", "online": true },
                "wallet": "{\"coins\":10}",
                "devices": [ { "id": "device-123" } ]
            })),
        ),
        ("GET", "/v2/user") => (
            StatusCode::OK,
            Json(json!({ "users": [ { "id": "u1" }, { "id": "u2" } ] })),
        ),
        ("GET", "/v2/friend") => (
            StatusCode::OK,
            Json(json!({ "friends": [ { "user": { "id": "u2" }, "state": 2 } ], "cursor": "next" })),
        ),
        ("POST", "/v2/group") => (
            StatusCode::OK,
            Json(json!({ "id": "g1", "name": recorded.body["name"], "open": true, "edge_count": 1 })),
        ),
        ("PUT", "/v2/storage") => (
            StatusCode::OK,
            Json(json!({ "acks": [ { "collection": "saves", "key": "slot1", "version": "v1" } ] })),
        ),
        ("POST", "/v2/storage") => (
            StatusCode::OK,
            Json(json!({ "objects": [ { "collection": "saves", "key": "slot1", "value": "{\"level\":3}" } ] })),
        ),
        ("GET", "/v2/storage/missing") => (
            StatusCode::NOT_FOUND,
            Json(json!({ "code": 5, "message": "Collection not found" })),
        ),
        ("POST", "/v2/leaderboard/weekly") => (
            StatusCode::OK,
            Json(json!({ "leaderboard_id": "weekly", "owner_id": "user-1", "score": "1500", "rank": "1" })),
        ),
        ("POST", p) if p.starts_with("/v2/rpc/") => (
            StatusCode::OK,
            Json(json!({
                "id": p.trim_start_matches("/v2/rpc/"),
                "payload": recorded.body.as_str().unwrap_or_default(),
            })),
        ),
        ("DELETE", _) | ("PUT", "/v2/account") | ("POST", "/v2/session/logout") => {
            (StatusCode::OK, Json(json!({})))
        }
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "code": 13, "message": format!("unexpected {} {}", method, path) })),
        ),
    }
}

async fn serve() -> (NakamaClient, Log) {
    let log: Log = Arc::default();
    let router = Router::new().fallback(handle).with_state(log.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let client = NakamaClient::builder()
        .host("127.0.0.1")
        .port(addr.port())
        .server_key("defaultkey")
        .build()
        .unwrap();

    (client, log)
}

fn last(log: &Log) -> Recorded {
    log.lock().last().cloned().unwrap()
}

async fn login(client: &NakamaClient) -> Session {
    client.authenticate_device("device-123", true, None).await.unwrap()
}

#[tokio::test]
async fn test_authenticate_device_uses_server_key() {
    let (client, log) = serve().await;

    let session = client
        .authenticate_device("device-123", true, Some("player1"))
        .await
        .unwrap();

    assert_eq!(session.user_id, "user-1");
    assert_eq!(session.username.as_deref(), Some("player1"));
    assert!(session.created);
    assert!(session.refresh_token.is_some());

    let req = last(&log);
    assert_eq!(req.method, Method::POST);
    assert_eq!(req.path, "/v2/account/authenticate/device");
    // base64("defaultkey:")
    assert_eq!(req.auth.as_deref(), Some("Basic ZGVmYXVsdGtleTo="));
    assert_eq!(req.query("create"), vec!["true"]);
    assert_eq!(req.query("username"), vec!["player1"]);
    assert_eq!(req.body, json!({ "id": "device-123" }));
}

#[tokio::test]
async fn test_authenticate_email_and_custom() {
    let (client, log) = serve().await;

    client
        .authenticate_email("a@example.com", "secret", false, None)
        .await
        .unwrap();
    let req = last(&log);
    assert_eq!(req.path, "/v2/account/authenticate/email");
    assert_eq!(req.query("create"), vec!["false"]);
    assert!(req.query("username").is_empty());
    assert_eq!(req.body, json!({ "email": "a@example.com", "password": "secret" }));

    client.authenticate_custom("steam-42", true, None).await.unwrap();
    assert_eq!(last(&log).path, "/v2/account/authenticate/custom");
}

#[tokio::test]
async fn test_session_calls_use_bearer_token() {
    let (client, log) = serve().await;
    let session = login(&client).await;

    let account = client.get_account(&session).await.unwrap();
    assert_eq!(account.user.id, "user-1");
    assert!(account.user.online);
    assert_eq!(account.devices[0].id, "device-123");

    let req = last(&log);
    assert_eq!(req.method, Method::GET);
    assert_eq!(req.auth, Some(format!("Bearer {}", session.token)));

    client
        .update_account(
            &session,
            &UpdateAccount {
                display_name: Some("Player One".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let req = last(&log);
    assert_eq!(req.method, Method::PUT);
    assert_eq!(req.body, json!({ "display_name": "Player One" }));
}

#[tokio::test]
async fn test_repeated_query_parameters() {
    let (client, log) = serve().await;
    let session = login(&client).await;

    let users = client.get_users(&session, &["u1", "u2"], &["bob"]).await.unwrap();
    assert_eq!(users.len(), 2);

    let req = last(&log);
    assert_eq!(req.query("ids"), vec!["u1", "u2"]);
    assert_eq!(req.query("usernames"), vec!["bob"]);

    let friends = client
        .list_friends(&session, Some(10), Some(nakama_rs::FriendState::InviteReceived), None)
        .await
        .unwrap();
    assert_eq!(friends.friends[0].friend_state(), nakama_rs::FriendState::InviteReceived);
    assert_eq!(friends.cursor, "next");
    let req = last(&log);
    assert_eq!(req.query("limit"), vec!["10"]);
    assert_eq!(req.query("state"), vec!["2"]);

    client.delete_friends(&session, &["u2"], &[]).await.unwrap();
    let req = last(&log);
    assert_eq!(req.method, Method::DELETE);
    assert_eq!(req.path, "/v2/friend");
}

#[tokio::test]
async fn test_groups() {
    let (client, log) = serve().await;
    let session = login(&client).await;

    let group = client
        .create_group(
            &session,
            &CreateGroup {
                name: "raiders".into(),
                open: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(group.id, "g1");
    assert_eq!(group.name, "raiders");
    assert_eq!(last(&log).body, json!({ "name": "raiders", "open": true }));

    let err = client.join_group(&session, "g1").await.unwrap_err();
    assert!(matches!(err, Error::Server { code: Some(13), .. }));
    assert_eq!(last(&log).path, "/v2/group/g1/join");
}

#[tokio::test]
async fn test_storage() {
    let (client, log) = serve().await;
    let session = login(&client).await;

    let write = StorageWriteRequest::json("saves", "slot1", &json!({ "level": 3 })).unwrap();
    let acks = client.write_storage_objects(&session, &[write]).await.unwrap();
    assert_eq!(acks[0].version, "v1");

    let req = last(&log);
    assert_eq!(req.method, Method::PUT);
    assert_eq!(req.body["objects"][0]["value"], "{\"level\":3}");

    let objects = client
        .read_storage_objects(
            &session,
            &[StorageReadRequest {
                collection: "saves".into(),
                key: "slot1".into(),
                user_id: Some(session.user_id.clone()),
            }],
        )
        .await
        .unwrap();
    let value: Value = objects[0].value_as().unwrap();
    assert_eq!(value["level"], 3);
    assert_eq!(last(&log).body["object_ids"][0]["user_id"], "user-1");

    let err = client
        .list_storage_objects(&session, "missing", None, Some(10), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(ref m) if m == "Collection not found"));
}

#[tokio::test]
async fn test_leaderboard_scores_are_strings() {
    let (client, log) = serve().await;
    let session = login(&client).await;

    let record = client
        .write_leaderboard_record(
            &session,
            "weekly",
            &LeaderboardRecordWrite {
                score: 1500,
                subscore: Some(7),
                metadata: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(record.score, 1500);
    assert_eq!(record.rank, 1);
    assert_eq!(last(&log).body, json!({ "score": "1500", "subscore": "7" }));

    client.delete_leaderboard_record(&session, "weekly").await.unwrap();
    let req = last(&log);
    assert_eq!(req.method, Method::DELETE);
    assert_eq!(req.path, "/v2/leaderboard/weekly");
}

#[tokio::test]
async fn test_rpc_payload_is_json_string() {
    let (client, log) = serve().await;
    let session = login(&client).await;

    let result = client
        .rpc(&session, "reward", Some(r#"{"amount":5}"#))
        .await
        .unwrap();
    assert_eq!(result.id, "reward");
    assert_eq!(result.payload, r#"{"amount":5}"#);
    assert_eq!(last(&log).body, Value::String(r#"{"amount":5}"#.into()));

    let result = client
        .rpc_with_http_key("http-secret", "status", None)
        .await
        .unwrap();
    assert_eq!(result.id, "status");

    let req = last(&log);
    assert_eq!(req.auth, None);
    assert_eq!(req.query("http_key"), vec!["http-secret"]);
    assert_eq!(req.body, Value::Null);
}

#[tokio::test]
async fn test_refresh_keeps_refresh_token() {
    let (client, log) = serve().await;
    let session = login(&client).await;

    let refreshed = client.refresh_session(&session).await.unwrap();
    assert_eq!(refreshed.expires_at_ms, (FAR_FUTURE + 5) * 1000);
    assert_eq!(refreshed.refresh_token, session.refresh_token);

    let req = last(&log);
    assert!(req.auth.unwrap().starts_with("Basic "));
    assert_eq!(req.body["token"], session.refresh_token.clone().unwrap().as_str());

    client.logout(&session).await.unwrap();
    assert_eq!(last(&log).path, "/v2/session/logout");
}

#[tokio::test]
async fn test_expired_session_is_rejected_locally() {
    let (client, log) = serve().await;
    let expired = Session::restore(&token("user-1", 1_000), None).unwrap();

    let err = client.get_account(&expired).await.unwrap_err();
    assert!(matches!(err, Error::SessionExpired));

    let err = client.refresh_session(&expired).await.unwrap_err();
    assert!(matches!(err, Error::Auth(_)));

    assert!(log.lock().is_empty());
}

#[tokio::test]
async fn test_notifications_and_matches() {
    let (client, log) = serve().await;
    let session = login(&client).await;

    client.delete_notifications(&session, &["n1", "n2"]).await.unwrap();
    let req = last(&log);
    assert_eq!(req.path, "/v2/notification");
    assert_eq!(req.query("ids"), vec!["n1", "n2"]);

    let filter = nakama_rs::MatchListQuery {
        limit: Some(5),
        authoritative: Some(true),
        ..Default::default()
    };
    let err = client.list_matches(&session, &filter).await.unwrap_err();
    assert!(matches!(err, Error::Server { .. }));
    let req = last(&log);
    assert_eq!(req.query("limit"), vec!["5"]);
    assert_eq!(req.query("authoritative"), vec!["true"]);
}
