//! Nakama HTTP client for REST API calls.

use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use url::Url;

use nakama_ws::WsTransport;

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::rt::{RtClient, RtClientConfig};
use crate::session::Session;
use crate::types::*;

/// gRPC status codes the server reports in error bodies.
const GRPC_NOT_FOUND: i32 = 5;
const GRPC_UNAUTHENTICATED: i32 = 16;

/// How a request authenticates.
enum Auth<'a> {
    /// Server key as HTTP basic auth, for authentication calls.
    ServerKey,
    Session(&'a Session),
    /// No header; the `http_key` query parameter authenticates.
    None,
}

type Query = Vec<(&'static str, String)>;

/// Client for the Nakama REST API.
///
/// # Example
///
/// ```rust,no_run
/// use nakama_rs::NakamaClient;
///
/// # async fn example() -> nakama_rs::Result<()> {
/// let client = NakamaClient::builder().host("127.0.0.1").port(7350).build()?;
/// let session = client.authenticate_device("my-device-id", true, None).await?;
/// println!("Logged in as: {}", session.user_id);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct NakamaClient {
    http: Client,
    config: ClientConfig,
    base_url: Url,
}

impl NakamaClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let base_url = Url::parse(&config.http_base_url())?;

        let http = Client::builder().timeout(config.timeout).build()?;

        tracing::info!("nakama client created for {}", base_url);

        Ok(Self {
            http,
            config,
            base_url,
        })
    }

    /// Client configured from `NAKAMA_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env())
    }

    pub fn builder() -> NakamaClientBuilder {
        NakamaClientBuilder::default()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // ========================================================================
    // Internal HTTP helpers
    // ========================================================================

    fn endpoint(&self, segments: &[&str], query: &[(&'static str, String)]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::InvalidUrl(self.base_url.to_string()))?
            .clear()
            .extend(segments);

        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }

        Ok(url)
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        segments: &[&str],
        query: Query,
        body: Option<impl Serialize>,
        auth: Auth<'_>,
    ) -> Result<T> {
        let url = self.endpoint(segments, &query)?;
        tracing::debug!("{} {}", method, url.path());

        let mut req = self.http.request(method, url);

        match auth {
            Auth::ServerKey => req = req.basic_auth(&self.config.server_key, Some("")),
            Auth::Session(session) => {
                if session.is_expired() {
                    return Err(Error::SessionExpired);
                }
                req = req.header("Authorization", session.auth_header());
            }
            Auth::None => {}
        }

        req = req.header("Accept", "application/json");

        if let Some(b) = body {
            req = req.json(&b);
        }

        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            let err = error_from_response(status, &text);
            tracing::error!("request failed: {}", err);
            return Err(err);
        }

        // Empty replies carry no fields.
        let text = if text.trim().is_empty() { "{}" } else { text.as_str() };
        Ok(serde_json::from_str(text)?)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: Query,
        session: &Session,
    ) -> Result<T> {
        self.request(Method::GET, segments, query, None::<()>, Auth::Session(session))
            .await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: Query,
        body: Option<impl Serialize>,
        session: &Session,
    ) -> Result<T> {
        self.request(Method::POST, segments, query, body, Auth::Session(session))
            .await
    }

    async fn put<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        body: impl Serialize,
        session: &Session,
    ) -> Result<T> {
        self.request(Method::PUT, segments, Query::new(), Some(body), Auth::Session(session))
            .await
    }

    async fn delete(&self, segments: &[&str], query: Query, session: &Session) -> Result<()> {
        let _: serde_json::Value = self
            .request(Method::DELETE, segments, query, None::<()>, Auth::Session(session))
            .await?;
        Ok(())
    }

    // ========================================================================
    // Authentication
    // ========================================================================

    async fn authenticate(
        &self,
        kind: &str,
        body: impl Serialize,
        create: bool,
        username: Option<&str>,
    ) -> Result<Session> {
        let mut query = vec![("create", create.to_string())];
        if let Some(username) = username {
            query.push(("username", username.to_string()));
        }

        let resp: ApiSession = self
            .request(
                Method::POST,
                &["v2", "account", "authenticate", kind],
                query,
                Some(body),
                Auth::ServerKey,
            )
            .await?;

        session_from(resp, None)
    }

    /// Authenticate with a device id.
    ///
    /// With `create` a new account is made if none is linked to the device.
    pub async fn authenticate_device(
        &self,
        device_id: &str,
        create: bool,
        username: Option<&str>,
    ) -> Result<Session> {
        #[derive(Serialize)]
        struct Request<'a> {
            id: &'a str,
        }

        self.authenticate("device", Request { id: device_id }, create, username)
            .await
    }

    /// Authenticate with email and password.
    pub async fn authenticate_email(
        &self,
        email: &str,
        password: &str,
        create: bool,
        username: Option<&str>,
    ) -> Result<Session> {
        #[derive(Serialize)]
        struct Request<'a> {
            email: &'a str,
            password: &'a str,
        }

        self.authenticate("email", Request { email, password }, create, username)
            .await
    }

    /// Authenticate with an id from an external identity system.
    pub async fn authenticate_custom(
        &self,
        id: &str,
        create: bool,
        username: Option<&str>,
    ) -> Result<Session> {
        #[derive(Serialize)]
        struct Request<'a> {
            id: &'a str,
        }

        self.authenticate("custom", Request { id }, create, username)
            .await
    }

    /// Exchange the session's refresh token for a new session.
    pub async fn refresh_session(&self, session: &Session) -> Result<Session> {
        let refresh_token = session
            .refresh_token
            .as_deref()
            .ok_or_else(|| Error::Auth("Session does not have a refresh token".into()))?;

        if session.is_refresh_expired() {
            return Err(Error::SessionExpired);
        }

        #[derive(Serialize)]
        struct Request<'a> {
            token: &'a str,
        }

        let resp: ApiSession = self
            .request(
                Method::POST,
                &["v2", "account", "session", "refresh"],
                Query::new(),
                Some(Request {
                    token: refresh_token,
                }),
                Auth::ServerKey,
            )
            .await?;

        session_from(resp, Some(refresh_token))
    }

    /// Invalidate the session and its refresh token on the server.
    pub async fn logout(&self, session: &Session) -> Result<()> {
        #[derive(Serialize)]
        struct Request<'a> {
            token: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            refresh_token: Option<&'a str>,
        }

        let _: serde_json::Value = self
            .post(
                &["v2", "session", "logout"],
                Query::new(),
                Some(Request {
                    token: &session.token,
                    refresh_token: session.refresh_token.as_deref(),
                }),
                session,
            )
            .await?;
        Ok(())
    }

    // ========================================================================
    // Account and users
    // ========================================================================

    pub async fn get_account(&self, session: &Session) -> Result<Account> {
        self.get(&["v2", "account"], Query::new(), session).await
    }

    pub async fn update_account(&self, session: &Session, update: &UpdateAccount) -> Result<()> {
        let _: serde_json::Value = self.put(&["v2", "account"], update, session).await?;
        Ok(())
    }

    /// Fetch users by id and by username.
    pub async fn get_users(
        &self,
        session: &Session,
        ids: &[&str],
        usernames: &[&str],
    ) -> Result<Vec<User>> {
        let mut query = repeated("ids", ids);
        query.extend(repeated("usernames", usernames));

        let resp: Users = self.get(&["v2", "user"], query, session).await?;
        Ok(resp.users)
    }

    // ========================================================================
    // Friends
    // ========================================================================

    pub async fn list_friends(
        &self,
        session: &Session,
        limit: Option<i32>,
        state: Option<FriendState>,
        cursor: Option<&str>,
    ) -> Result<FriendList> {
        let mut query = Query::new();
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }
        if let Some(state) = state {
            query.push(("state", state.as_i32().to_string()));
        }
        if let Some(cursor) = cursor.filter(|c| !c.is_empty()) {
            query.push(("cursor", cursor.to_string()));
        }

        self.get(&["v2", "friend"], query, session).await
    }

    /// Send friend requests, or accept pending ones.
    pub async fn add_friends(&self, session: &Session, ids: &[&str], usernames: &[&str]) -> Result<()> {
        let mut query = repeated("ids", ids);
        query.extend(repeated("usernames", usernames));

        let _: serde_json::Value = self
            .post(&["v2", "friend"], query, None::<()>, session)
            .await?;
        Ok(())
    }

    pub async fn delete_friends(
        &self,
        session: &Session,
        ids: &[&str],
        usernames: &[&str],
    ) -> Result<()> {
        let mut query = repeated("ids", ids);
        query.extend(repeated("usernames", usernames));

        self.delete(&["v2", "friend"], query, session).await
    }

    pub async fn block_friends(
        &self,
        session: &Session,
        ids: &[&str],
        usernames: &[&str],
    ) -> Result<()> {
        let mut query = repeated("ids", ids);
        query.extend(repeated("usernames", usernames));

        let _: serde_json::Value = self
            .post(&["v2", "friend", "block"], query, None::<()>, session)
            .await?;
        Ok(())
    }

    // ========================================================================
    // Groups
    // ========================================================================

    pub async fn create_group(&self, session: &Session, group: &CreateGroup) -> Result<Group> {
        self.post(&["v2", "group"], Query::new(), Some(group), session)
            .await
    }

    pub async fn list_groups(
        &self,
        session: &Session,
        name: Option<&str>,
        limit: Option<i32>,
        cursor: Option<&str>,
    ) -> Result<GroupList> {
        let mut query = Query::new();
        if let Some(name) = name.filter(|n| !n.is_empty()) {
            query.push(("name", name.to_string()));
        }
        if let Some(limit) = limit.filter(|l| *l > 0) {
            query.push(("limit", limit.to_string()));
        }
        if let Some(cursor) = cursor.filter(|c| !c.is_empty()) {
            query.push(("cursor", cursor.to_string()));
        }

        self.get(&["v2", "group"], query, session).await
    }

    pub async fn join_group(&self, session: &Session, group_id: &str) -> Result<()> {
        let _: serde_json::Value = self
            .post(&["v2", "group", group_id, "join"], Query::new(), None::<()>, session)
            .await?;
        Ok(())
    }

    pub async fn leave_group(&self, session: &Session, group_id: &str) -> Result<()> {
        let _: serde_json::Value = self
            .post(&["v2", "group", group_id, "leave"], Query::new(), None::<()>, session)
            .await?;
        Ok(())
    }

    // ========================================================================
    // Storage
    // ========================================================================

    pub async fn read_storage_objects(
        &self,
        session: &Session,
        requests: &[StorageReadRequest],
    ) -> Result<Vec<StorageObject>> {
        #[derive(Serialize)]
        struct Request<'a> {
            object_ids: &'a [StorageReadRequest],
        }

        let resp: StorageObjects = self
            .post(
                &["v2", "storage"],
                Query::new(),
                Some(Request {
                    object_ids: requests,
                }),
                session,
            )
            .await?;

        Ok(resp.objects)
    }

    pub async fn write_storage_objects(
        &self,
        session: &Session,
        objects: &[StorageWriteRequest],
    ) -> Result<Vec<StorageObjectAck>> {
        #[derive(Serialize)]
        struct Request<'a> {
            objects: &'a [StorageWriteRequest],
        }

        let resp: StorageObjectAcks = self
            .put(&["v2", "storage"], Request { objects }, session)
            .await?;

        Ok(resp.acks)
    }

    pub async fn delete_storage_objects(
        &self,
        session: &Session,
        requests: &[StorageDeleteRequest],
    ) -> Result<()> {
        #[derive(Serialize)]
        struct Request<'a> {
            object_ids: &'a [StorageDeleteRequest],
        }

        let _: serde_json::Value = self
            .put(
                &["v2", "storage", "delete"],
                Request {
                    object_ids: requests,
                },
                session,
            )
            .await?;

        Ok(())
    }

    /// List objects in a collection, optionally only those owned by `user_id`.
    pub async fn list_storage_objects(
        &self,
        session: &Session,
        collection: &str,
        user_id: Option<&str>,
        limit: Option<i32>,
        cursor: Option<&str>,
    ) -> Result<StorageObjectList> {
        let mut query = Query::new();
        if let Some(user_id) = user_id {
            query.push(("user_id", user_id.to_string()));
        }
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor.to_string()));
        }

        self.get(&["v2", "storage", collection], query, session)
            .await
    }

    // ========================================================================
    // Leaderboards
    // ========================================================================

    pub async fn list_leaderboard_records(
        &self,
        session: &Session,
        leaderboard_id: &str,
        owner_ids: &[&str],
        limit: Option<i32>,
        cursor: Option<&str>,
    ) -> Result<LeaderboardRecordList> {
        let mut query = repeated("owner_ids", owner_ids);
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor.to_string()));
        }

        self.get(&["v2", "leaderboard", leaderboard_id], query, session)
            .await
    }

    pub async fn write_leaderboard_record(
        &self,
        session: &Session,
        leaderboard_id: &str,
        record: &LeaderboardRecordWrite,
    ) -> Result<LeaderboardRecord> {
        self.post(
            &["v2", "leaderboard", leaderboard_id],
            Query::new(),
            Some(record),
            session,
        )
        .await
    }

    /// Remove the caller's own record.
    pub async fn delete_leaderboard_record(&self, session: &Session, leaderboard_id: &str) -> Result<()> {
        self.delete(&["v2", "leaderboard", leaderboard_id], Query::new(), session)
            .await
    }

    // ========================================================================
    // Matches and notifications
    // ========================================================================

    pub async fn list_matches(&self, session: &Session, filter: &MatchListQuery) -> Result<MatchList> {
        let mut query = Query::new();
        if let Some(limit) = filter.limit {
            query.push(("limit", limit.to_string()));
        }
        if let Some(authoritative) = filter.authoritative {
            query.push(("authoritative", authoritative.to_string()));
        }
        if let Some(label) = &filter.label {
            query.push(("label", label.clone()));
        }
        if let Some(min_size) = filter.min_size {
            query.push(("min_size", min_size.to_string()));
        }
        if let Some(max_size) = filter.max_size {
            query.push(("max_size", max_size.to_string()));
        }
        if let Some(q) = &filter.query {
            query.push(("query", q.clone()));
        }

        self.get(&["v2", "match"], query, session).await
    }

    pub async fn list_notifications(
        &self,
        session: &Session,
        limit: Option<i32>,
        cacheable_cursor: Option<&str>,
    ) -> Result<NotificationList> {
        let mut query = Query::new();
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }
        if let Some(cursor) = cacheable_cursor {
            query.push(("cursor", cursor.to_string()));
        }

        self.get(&["v2", "notification"], query, session).await
    }

    pub async fn delete_notifications(&self, session: &Session, ids: &[&str]) -> Result<()> {
        self.delete(&["v2", "notification"], repeated("ids", ids), session)
            .await
    }

    // ========================================================================
    // RPC
    // ========================================================================

    /// Call a server function. `payload` is sent as a JSON string.
    pub async fn rpc(&self, session: &Session, id: &str, payload: Option<&str>) -> Result<RpcResult> {
        self.post(&["v2", "rpc", id], Query::new(), payload, session)
            .await
    }

    /// Call a server function authenticated by the runtime HTTP key instead of a session.
    pub async fn rpc_with_http_key(
        &self,
        http_key: &str,
        id: &str,
        payload: Option<&str>,
    ) -> Result<RpcResult> {
        self.request(
            Method::POST,
            &["v2", "rpc", id],
            vec![("http_key", http_key.to_string())],
            payload,
            Auth::None,
        )
        .await
    }

    // ========================================================================
    // Realtime
    // ========================================================================

    /// Realtime settings matching this client's server.
    pub fn rt_config(&self) -> RtClientConfig {
        RtClientConfig {
            host: self.config.host.clone(),
            port: self.config.port,
            ssl: self.config.ssl,
            ..RtClientConfig::default()
        }
    }

    /// Realtime client over a WebSocket to this client's server.
    ///
    /// ```rust,no_run
    /// # use std::sync::Arc;
    /// # use std::time::Duration;
    /// # use nakama_rs::{NakamaClient, rt::RtClientProtocol};
    /// # async fn example() -> nakama_rs::Result<()> {
    /// let client = NakamaClient::builder().build()?;
    /// let session = client.authenticate_device("device-id", true, None).await?;
    ///
    /// let rt = Arc::new(client.create_rt_client());
    /// rt.spawn_ticker(Duration::from_millis(50));
    /// rt.connect(&session, true, RtClientProtocol::Json).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn create_rt_client(&self) -> RtClient {
        RtClient::new(WsTransport::new(), self.rt_config())
    }
}

fn repeated(name: &'static str, values: &[&str]) -> Query {
    values.iter().map(|v| (name, v.to_string())).collect()
}

fn session_from(resp: ApiSession, previous_refresh: Option<&str>) -> Result<Session> {
    let refresh = if resp.refresh_token.is_empty() {
        previous_refresh
    } else {
        Some(resp.refresh_token.as_str())
    };
    Session::new(&resp.token, refresh, resp.created)
}

fn error_from_response(status: StatusCode, text: &str) -> Error {
    #[derive(Deserialize)]
    struct ErrorBody {
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        code: Option<i32>,
    }

    let body = match serde_json::from_str::<ErrorBody>(text) {
        Ok(body) => body,
        Err(_) => return Error::server(format!("HTTP {}: {}", status, text)),
    };

    let message = body
        .message
        .or(body.error)
        .unwrap_or_else(|| format!("HTTP {}", status));

    match body.code {
        Some(GRPC_NOT_FOUND) => Error::NotFound(message),
        Some(GRPC_UNAUTHENTICATED) => Error::Auth(message),
        Some(code) => Error::server_with_code(message, code),
        None => Error::server(message),
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for NakamaClient configuration.
#[derive(Debug, Clone, Default)]
pub struct NakamaClientBuilder {
    config: ClientConfig,
}

impl NakamaClientBuilder {
    /// Start from an existing configuration.
    pub fn from_config(config: ClientConfig) -> Self {
        Self { config }
    }

    /// Set the server host.
    pub fn host(mut self, host: &str) -> Self {
        self.config.host = host.to_string();
        self
    }

    /// Set the server port.
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Enable or disable SSL/TLS.
    pub fn ssl(mut self, ssl: bool) -> Self {
        self.config.ssl = ssl;
        self
    }

    pub fn server_key(mut self, key: &str) -> Self {
        self.config.server_key = key.to_string();
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<NakamaClient> {
        NakamaClient::new(self.config)
    }
}
