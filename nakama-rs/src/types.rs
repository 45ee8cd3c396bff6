//! Type definitions for the Nakama REST API.
//!
//! The server omits fields holding their default value, so every response type
//! is `#[serde(default)]`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::serde_ext::{i64_string, opt_i64_string};

// ============================================================================
// Authentication
// ============================================================================

/// Tokens returned by authenticate and refresh calls.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiSession {
    pub created: bool,
    pub token: String,
    pub refresh_token: String,
}

// ============================================================================
// Users and accounts
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub avatar_url: String,
    pub lang_tag: String,
    pub location: String,
    pub timezone: String,
    /// JSON object encoded as a string.
    pub metadata: String,
    pub facebook_id: String,
    pub google_id: String,
    pub gamecenter_id: String,
    pub steam_id: String,
    pub online: bool,
    pub edge_count: i32,
    pub create_time: String,
    pub update_time: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Users {
    pub users: Vec<User>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AccountDevice {
    pub id: String,
    pub vars: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Account {
    pub user: User,
    /// JSON object encoded as a string.
    pub wallet: String,
    pub email: String,
    pub devices: Vec<AccountDevice>,
    pub custom_id: String,
    pub verify_time: String,
    pub disable_time: String,
}

/// Fields to change on the current account. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateAccount {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lang_tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

// ============================================================================
// Friends
// ============================================================================

/// Relationship state of a friend entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FriendState {
    Friend,
    InviteSent,
    InviteReceived,
    Blocked,
    Unknown(i32),
}

impl From<i32> for FriendState {
    fn from(v: i32) -> Self {
        match v {
            0 => Self::Friend,
            1 => Self::InviteSent,
            2 => Self::InviteReceived,
            3 => Self::Blocked,
            other => Self::Unknown(other),
        }
    }
}

impl FriendState {
    pub fn as_i32(self) -> i32 {
        match self {
            Self::Friend => 0,
            Self::InviteSent => 1,
            Self::InviteReceived => 2,
            Self::Blocked => 3,
            Self::Unknown(v) => v,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Friend {
    pub user: User,
    pub state: i32,
    pub update_time: String,
}

impl Friend {
    pub fn friend_state(&self) -> FriendState {
        FriendState::from(self.state)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FriendList {
    pub friends: Vec<Friend>,
    pub cursor: String,
}

// ============================================================================
// Groups
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Group {
    pub id: String,
    pub creator_id: String,
    pub name: String,
    pub description: String,
    pub lang_tag: String,
    pub metadata: String,
    pub avatar_url: String,
    pub open: bool,
    pub edge_count: i32,
    pub max_count: i32,
    pub create_time: String,
    pub update_time: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GroupList {
    pub groups: Vec<Group>,
    pub cursor: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateGroup {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub lang_tag: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub avatar_url: String,
    pub open: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_count: Option<i32>,
}

// ============================================================================
// Storage
// ============================================================================

/// A storage object. `value` is a JSON document encoded as a string.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct StorageObject {
    pub collection: String,
    pub key: String,
    pub user_id: String,
    pub value: String,
    pub version: String,
    pub permission_read: i32,
    pub permission_write: i32,
    pub create_time: String,
    pub update_time: String,
}

impl StorageObject {
    /// Decode `value` into a typed document.
    pub fn value_as<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(&self.value)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageObjects {
    pub objects: Vec<StorageObject>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageObjectList {
    pub objects: Vec<StorageObject>,
    pub cursor: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct StorageObjectAck {
    pub collection: String,
    pub key: String,
    pub version: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageObjectAcks {
    pub acks: Vec<StorageObjectAck>,
}

/// Request to write a storage object.
#[derive(Debug, Clone, Serialize)]
pub struct StorageWriteRequest {
    pub collection: String,
    pub key: String,
    /// JSON document encoded as a string.
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission_read: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission_write: Option<i32>,
}

impl StorageWriteRequest {
    /// Write request whose value is `value` serialized as JSON.
    pub fn json<T: Serialize>(
        collection: &str,
        key: &str,
        value: &T,
    ) -> serde_json::Result<Self> {
        Ok(Self {
            collection: collection.to_string(),
            key: key.to_string(),
            value: serde_json::to_string(value)?,
            version: None,
            permission_read: None,
            permission_write: None,
        })
    }
}

/// Request to read storage objects.
#[derive(Debug, Clone, Serialize)]
pub struct StorageReadRequest {
    pub collection: String,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Request to delete storage objects.
#[derive(Debug, Clone, Serialize)]
pub struct StorageDeleteRequest {
    pub collection: String,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

// ============================================================================
// Leaderboards
// ============================================================================

/// A leaderboard record.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LeaderboardRecord {
    pub leaderboard_id: String,
    pub owner_id: String,
    pub username: String,
    #[serde(with = "i64_string")]
    pub score: i64,
    #[serde(with = "i64_string")]
    pub subscore: i64,
    pub num_score: i32,
    pub max_num_score: i32,
    pub metadata: String,
    pub create_time: String,
    pub update_time: String,
    pub expiry_time: String,
    #[serde(with = "i64_string")]
    pub rank: i64,
}

/// A page of leaderboard records.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LeaderboardRecordList {
    pub records: Vec<LeaderboardRecord>,
    pub owner_records: Vec<LeaderboardRecord>,
    pub next_cursor: String,
    pub prev_cursor: String,
}

/// Body of a leaderboard record write.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LeaderboardRecordWrite {
    #[serde(with = "i64_string")]
    pub score: i64,
    #[serde(skip_serializing_if = "Option::is_none", with = "opt_i64_string")]
    pub subscore: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
}

// ============================================================================
// Matches, notifications, RPC
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MatchEntry {
    pub match_id: String,
    pub authoritative: bool,
    pub label: Option<String>,
    pub size: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MatchList {
    pub matches: Vec<MatchEntry>,
}

/// Filters for listing matches. Unset fields are not sent.
#[derive(Debug, Clone, Default)]
pub struct MatchListQuery {
    pub limit: Option<i32>,
    pub authoritative: Option<bool>,
    pub label: Option<String>,
    pub min_size: Option<i32>,
    pub max_size: Option<i32>,
    pub query: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Notification {
    pub id: String,
    pub subject: String,
    /// JSON object encoded as a string.
    pub content: String,
    pub code: i32,
    pub sender_id: String,
    pub create_time: String,
    pub persistent: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NotificationList {
    pub notifications: Vec<Notification>,
    pub cacheable_cursor: String,
}

/// Result of an RPC call. `payload` is whatever string the function returned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcResult {
    pub id: String,
    pub payload: String,
}
