//! Realtime envelope and request payloads.
//!
//! Every frame on the realtime channel is one [`Envelope`]: an optional
//! correlation id plus at most one populated message field.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::error::{RtError, RtErrorCode};
use super::types::*;
use crate::serde_ext::{base64_bytes, i64_string};

/// One realtime frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Envelope {
    /// Correlation id. Set on requests expecting a reply and on their replies.
    pub cid: Option<String>,
    /// `None` for a bare acknowledgement.
    pub message: Option<EnvelopeMessage>,
}

impl Envelope {
    pub fn new(message: EnvelopeMessage) -> Self {
        Self {
            cid: None,
            message: Some(message),
        }
    }

    pub fn with_cid(mut self, cid: impl Into<String>) -> Self {
        self.cid = Some(cid.into());
        self
    }

    /// A correlation id that is present and non-empty.
    pub fn correlation_id(&self) -> Option<&str> {
        self.cid.as_deref().filter(|cid| !cid.is_empty())
    }
}

/// The populated field of an envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeMessage {
    Channel(Channel),
    ChannelJoin(ChannelJoin),
    ChannelLeave(ChannelLeave),
    ChannelMessage(ChannelMessage),
    ChannelMessageAck(ChannelMessageAck),
    ChannelMessageSend(ChannelMessageSend),
    ChannelMessageUpdate(ChannelMessageUpdate),
    ChannelMessageRemove(ChannelMessageRemove),
    ChannelPresenceEvent(ChannelPresenceEvent),
    Error(ServerError),
    Match(Match),
    MatchCreate(MatchCreate),
    MatchData(MatchData),
    MatchDataSend(MatchDataSend),
    MatchJoin(MatchJoin),
    MatchLeave(MatchLeave),
    MatchPresenceEvent(MatchPresenceEvent),
    MatchmakerAdd(MatchmakerAdd),
    MatchmakerMatched(MatchmakerMatched),
    MatchmakerRemove(MatchmakerRemove),
    MatchmakerTicket(MatchmakerTicket),
    Notifications(Notifications),
    Rpc(RtRpc),
    Status(Status),
    StatusFollow(StatusFollow),
    StatusPresenceEvent(StatusPresenceEvent),
    StatusUnfollow(StatusUnfollow),
    StatusUpdate(StatusUpdate),
    StreamData(StreamData),
    StreamPresenceEvent(StreamPresenceEvent),
    Ping(Ping),
    Pong(Pong),
    Party(Party),
    PartyCreate(PartyCreate),
    PartyJoin(PartyJoin),
    PartyLeave(PartyLeave),
    PartyPromote(PartyPromote),
    PartyLeader(PartyLeader),
    PartyAccept(PartyAccept),
    PartyRemove(PartyRemove),
    PartyClose(PartyClose),
    PartyJoinRequestList(PartyJoinRequestList),
    PartyJoinRequest(PartyJoinRequest),
    PartyMatchmakerAdd(PartyMatchmakerAdd),
    PartyMatchmakerRemove(PartyMatchmakerRemove),
    PartyMatchmakerTicket(PartyMatchmakerTicket),
    PartyData(PartyData),
    PartyDataSend(PartyDataSend),
    PartyPresenceEvent(PartyPresenceEvent),
}

impl EnvelopeMessage {
    /// Wire name of the populated field.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Channel(_) => "channel",
            Self::ChannelJoin(_) => "channel_join",
            Self::ChannelLeave(_) => "channel_leave",
            Self::ChannelMessage(_) => "channel_message",
            Self::ChannelMessageAck(_) => "channel_message_ack",
            Self::ChannelMessageSend(_) => "channel_message_send",
            Self::ChannelMessageUpdate(_) => "channel_message_update",
            Self::ChannelMessageRemove(_) => "channel_message_remove",
            Self::ChannelPresenceEvent(_) => "channel_presence_event",
            Self::Error(_) => "error",
            Self::Match(_) => "match",
            Self::MatchCreate(_) => "match_create",
            Self::MatchData(_) => "match_data",
            Self::MatchDataSend(_) => "match_data_send",
            Self::MatchJoin(_) => "match_join",
            Self::MatchLeave(_) => "match_leave",
            Self::MatchPresenceEvent(_) => "match_presence_event",
            Self::MatchmakerAdd(_) => "matchmaker_add",
            Self::MatchmakerMatched(_) => "matchmaker_matched",
            Self::MatchmakerRemove(_) => "matchmaker_remove",
            Self::MatchmakerTicket(_) => "matchmaker_ticket",
            Self::Notifications(_) => "notifications",
            Self::Rpc(_) => "rpc",
            Self::Status(_) => "status",
            Self::StatusFollow(_) => "status_follow",
            Self::StatusPresenceEvent(_) => "status_presence_event",
            Self::StatusUnfollow(_) => "status_unfollow",
            Self::StatusUpdate(_) => "status_update",
            Self::StreamData(_) => "stream_data",
            Self::StreamPresenceEvent(_) => "stream_presence_event",
            Self::Ping(_) => "ping",
            Self::Pong(_) => "pong",
            Self::Party(_) => "party",
            Self::PartyCreate(_) => "party_create",
            Self::PartyJoin(_) => "party_join",
            Self::PartyLeave(_) => "party_leave",
            Self::PartyPromote(_) => "party_promote",
            Self::PartyLeader(_) => "party_leader",
            Self::PartyAccept(_) => "party_accept",
            Self::PartyRemove(_) => "party_remove",
            Self::PartyClose(_) => "party_close",
            Self::PartyJoinRequestList(_) => "party_join_request_list",
            Self::PartyJoinRequest(_) => "party_join_request",
            Self::PartyMatchmakerAdd(_) => "party_matchmaker_add",
            Self::PartyMatchmakerRemove(_) => "party_matchmaker_remove",
            Self::PartyMatchmakerTicket(_) => "party_matchmaker_ticket",
            Self::PartyData(_) => "party_data",
            Self::PartyDataSend(_) => "party_data_send",
            Self::PartyPresenceEvent(_) => "party_presence_event",
        }
    }
}

/// Error reported by the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, String>,
}

impl From<ServerError> for RtError {
    fn from(e: ServerError) -> Self {
        let code = RtErrorCode::from_i32(e.code);
        let mut err = RtError {
            code,
            message: e.message,
            context: e.context,
        };
        if code == RtErrorCode::Unknown {
            err.context.insert("code".into(), e.code.to_string());
        }
        err
    }
}

// ============================================================================
// Chat
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelJoin {
    pub target: String,
    #[serde(rename = "type")]
    pub channel_type: i32,
    pub persistence: bool,
    pub hidden: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelLeave {
    pub channel_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelMessageSend {
    pub channel_id: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelMessageUpdate {
    pub channel_id: String,
    pub message_id: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelMessageRemove {
    pub channel_id: String,
    pub message_id: String,
}

// ============================================================================
// Matches and matchmaking
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchCreate {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchDataSend {
    pub match_id: String,
    #[serde(with = "i64_string")]
    pub op_code: i64,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub presences: Vec<UserPresence>,
    pub reliable: bool,
}

/// Join by match id, or by the token handed out by the matchmaker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchJoin {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchLeave {
    pub match_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchmakerAdd {
    pub min_count: i32,
    pub max_count: i32,
    pub query: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub string_properties: HashMap<String, String>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub numeric_properties: HashMap<String, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count_multiple: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchmakerRemove {
    pub ticket: String,
}

// ============================================================================
// Status
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusFollow {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub user_ids: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub usernames: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusUnfollow {
    pub user_ids: Vec<String>,
}

/// `None` marks the user as offline to followers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ping {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pong {}

// ============================================================================
// Parties
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartyCreate {
    pub open: bool,
    pub max_size: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartyJoin {
    pub party_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartyLeave {
    pub party_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartyPromote {
    pub party_id: String,
    pub presence: UserPresence,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartyAccept {
    pub party_id: String,
    pub presence: UserPresence,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartyRemove {
    pub party_id: String,
    pub presence: UserPresence,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartyJoinRequestList {
    pub party_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartyMatchmakerAdd {
    pub party_id: String,
    pub min_count: i32,
    pub max_count: i32,
    pub query: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub string_properties: HashMap<String, String>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub numeric_properties: HashMap<String, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count_multiple: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartyMatchmakerRemove {
    pub party_id: String,
    pub ticket: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartyDataSend {
    pub party_id: String,
    #[serde(with = "i64_string")]
    pub op_code: i64,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}
