//! Data carried by realtime replies and server pushes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::serde_ext::{base64_bytes, i64_string};
pub use crate::types::Notification;

/// A user's presence on a stream (chat channel, match, party or status).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserPresence {
    pub user_id: String,
    pub session_id: String,
    pub username: String,
    pub persistence: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Kind of chat channel to join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelType {
    Room,
    DirectMessage,
    Group,
}

impl ChannelType {
    pub fn as_i32(self) -> i32 {
        match self {
            Self::Room => 1,
            Self::DirectMessage => 2,
            Self::Group => 3,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Channel {
    pub id: String,
    pub presences: Vec<UserPresence>,
    #[serde(rename = "self")]
    pub self_presence: UserPresence,
    pub room_name: String,
    pub group_id: String,
    pub user_id_one: String,
    pub user_id_two: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelMessage {
    pub channel_id: String,
    pub message_id: String,
    pub code: i32,
    pub sender_id: String,
    pub username: String,
    /// JSON object encoded as a string.
    pub content: String,
    pub create_time: String,
    pub update_time: String,
    pub persistent: bool,
    pub room_name: String,
    pub group_id: String,
    pub user_id_one: String,
    pub user_id_two: String,
}

/// Server acknowledgement of a chat message send, update or remove.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelMessageAck {
    pub channel_id: String,
    pub message_id: String,
    pub code: i32,
    pub username: String,
    pub create_time: String,
    pub update_time: String,
    pub persistent: bool,
    pub room_name: String,
    pub group_id: String,
    pub user_id_one: String,
    pub user_id_two: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelPresenceEvent {
    pub channel_id: String,
    pub joins: Vec<UserPresence>,
    pub leaves: Vec<UserPresence>,
    pub room_name: String,
    pub group_id: String,
    pub user_id_one: String,
    pub user_id_two: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Match {
    pub match_id: String,
    pub authoritative: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub size: i32,
    pub presences: Vec<UserPresence>,
    #[serde(rename = "self")]
    pub self_presence: UserPresence,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchData {
    pub match_id: String,
    pub presence: UserPresence,
    #[serde(with = "i64_string")]
    pub op_code: i64,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    pub reliable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchPresenceEvent {
    pub match_id: String,
    pub joins: Vec<UserPresence>,
    pub leaves: Vec<UserPresence>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchmakerUser {
    pub presence: UserPresence,
    pub party_id: String,
    pub string_properties: HashMap<String, String>,
    pub numeric_properties: HashMap<String, f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchmakerMatched {
    pub ticket: String,
    /// Set when the match is relayed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_id: Option<String>,
    /// Set when the match is authoritative; pass it to `join_match_by_token`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub users: Vec<MatchmakerUser>,
    #[serde(rename = "self")]
    pub self_user: MatchmakerUser,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchmakerTicket {
    pub ticket: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Notifications {
    pub notifications: Vec<Notification>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Party {
    pub party_id: String,
    pub open: bool,
    pub max_size: i32,
    #[serde(rename = "self")]
    pub self_presence: UserPresence,
    pub leader: UserPresence,
    pub presences: Vec<UserPresence>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartyClose {
    pub party_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartyData {
    pub party_id: String,
    pub presence: UserPresence,
    #[serde(with = "i64_string")]
    pub op_code: i64,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

/// Users waiting for the leader to accept them into a closed party.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartyJoinRequest {
    pub party_id: String,
    pub presences: Vec<UserPresence>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartyLeader {
    pub party_id: String,
    pub presence: UserPresence,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartyMatchmakerTicket {
    pub party_id: String,
    pub ticket: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartyPresenceEvent {
    pub party_id: String,
    pub joins: Vec<UserPresence>,
    pub leaves: Vec<UserPresence>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Status {
    pub presences: Vec<UserPresence>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusPresenceEvent {
    pub joins: Vec<UserPresence>,
    pub leaves: Vec<UserPresence>,
}

/// Identifies a server-side stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stream {
    pub mode: i32,
    pub subject: String,
    pub subcontext: String,
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamData {
    pub stream: Stream,
    pub sender: UserPresence,
    pub data: String,
    pub reliable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamPresenceEvent {
    pub stream: Stream,
    pub joins: Vec<UserPresence>,
    pub leaves: Vec<UserPresence>,
}

/// RPC over the realtime channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RtRpc {
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub payload: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub http_key: String,
}
