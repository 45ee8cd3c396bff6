//! Realtime requests: chat, matches, matchmaker, status, RPC and parties.

use std::collections::HashMap;

use super::callback::RtCallback;
use super::client::RtClient;
use super::message::*;
use super::types::*;

// ============================================================================
// Matchmaker parameters
// ============================================================================

/// Parameters of a matchmaker ticket.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchmakerParams {
    min_count: i32,
    max_count: i32,
    query: String,
    string_properties: HashMap<String, String>,
    numeric_properties: HashMap<String, f64>,
    count_multiple: Option<i32>,
}

impl Default for MatchmakerParams {
    fn default() -> Self {
        Self {
            min_count: 2,
            max_count: 8,
            query: "*".to_string(),
            string_properties: HashMap::new(),
            numeric_properties: HashMap::new(),
            count_multiple: None,
        }
    }
}

impl MatchmakerParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(mut self, query: &str) -> Self {
        self.query = query.to_string();
        self
    }

    pub fn min_count(mut self, count: i32) -> Self {
        self.min_count = count;
        self
    }

    pub fn max_count(mut self, count: i32) -> Self {
        self.max_count = count;
        self
    }

    /// Matched groups must have a size that is a multiple of `multiple`.
    pub fn count_multiple(mut self, multiple: i32) -> Self {
        self.count_multiple = Some(multiple);
        self
    }

    pub fn string_property(mut self, key: &str, value: &str) -> Self {
        self.string_properties.insert(key.to_string(), value.to_string());
        self
    }

    pub fn numeric_property(mut self, key: &str, value: f64) -> Self {
        self.numeric_properties.insert(key.to_string(), value);
        self
    }

    fn into_solo(self) -> MatchmakerAdd {
        MatchmakerAdd {
            min_count: self.min_count,
            max_count: self.max_count,
            query: self.query,
            string_properties: self.string_properties,
            numeric_properties: self.numeric_properties,
            count_multiple: self.count_multiple,
        }
    }

    fn into_party(self, party_id: &str) -> PartyMatchmakerAdd {
        PartyMatchmakerAdd {
            party_id: party_id.to_string(),
            min_count: self.min_count,
            max_count: self.max_count,
            query: self.query,
            string_properties: self.string_properties,
            numeric_properties: self.numeric_properties,
            count_multiple: self.count_multiple,
        }
    }
}

fn owned(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

// ============================================================================
// Requests
// ============================================================================

impl RtClient {
    // --- chat ---

    /// Join a chat room, group channel or direct conversation.
    ///
    /// `persistence` and `hidden` default to `false`.
    pub fn join_chat(
        &self,
        target: &str,
        channel_type: ChannelType,
        persistence: Option<bool>,
        hidden: Option<bool>,
        callback: RtCallback<Channel>,
    ) {
        let message = EnvelopeMessage::ChannelJoin(ChannelJoin {
            target: target.to_string(),
            channel_type: channel_type.as_i32(),
            persistence: persistence.unwrap_or(false),
            hidden: hidden.unwrap_or(false),
        });

        self.typed_request(message, callback, |reply| match reply {
            Some(EnvelopeMessage::Channel(channel)) => Some(channel),
            _ => None,
        });
    }

    pub fn leave_chat(&self, channel_id: &str, callback: RtCallback<()>) {
        let message = EnvelopeMessage::ChannelLeave(ChannelLeave {
            channel_id: channel_id.to_string(),
        });
        self.typed_request(message, callback, |_| Some(()));
    }

    /// `content` must be a JSON object.
    pub fn write_chat_message(
        &self,
        channel_id: &str,
        content: &str,
        callback: RtCallback<ChannelMessageAck>,
    ) {
        let message = EnvelopeMessage::ChannelMessageSend(ChannelMessageSend {
            channel_id: channel_id.to_string(),
            content: content.to_string(),
        });
        self.typed_request(message, callback, message_ack);
    }

    pub fn update_chat_message(
        &self,
        channel_id: &str,
        message_id: &str,
        content: &str,
        callback: RtCallback<ChannelMessageAck>,
    ) {
        let message = EnvelopeMessage::ChannelMessageUpdate(ChannelMessageUpdate {
            channel_id: channel_id.to_string(),
            message_id: message_id.to_string(),
            content: content.to_string(),
        });
        self.typed_request(message, callback, message_ack);
    }

    pub fn remove_chat_message(
        &self,
        channel_id: &str,
        message_id: &str,
        callback: RtCallback<ChannelMessageAck>,
    ) {
        let message = EnvelopeMessage::ChannelMessageRemove(ChannelMessageRemove {
            channel_id: channel_id.to_string(),
            message_id: message_id.to_string(),
        });
        self.typed_request(message, callback, message_ack);
    }

    // --- matches ---

    /// Create a relayed match. A non-empty `name` makes the match id deterministic.
    pub fn create_match(&self, name: Option<&str>, callback: RtCallback<Match>) {
        let message = EnvelopeMessage::MatchCreate(MatchCreate {
            name: name.unwrap_or_default().to_string(),
        });
        self.typed_request(message, callback, match_reply);
    }

    pub fn join_match(
        &self,
        match_id: &str,
        metadata: HashMap<String, String>,
        callback: RtCallback<Match>,
    ) {
        let message = EnvelopeMessage::MatchJoin(MatchJoin {
            match_id: Some(match_id.to_string()),
            token: None,
            metadata,
        });
        self.typed_request(message, callback, match_reply);
    }

    /// Join the match a matchmaker result points at.
    pub fn join_match_by_token(&self, token: &str, callback: RtCallback<Match>) {
        let message = EnvelopeMessage::MatchJoin(MatchJoin {
            match_id: None,
            token: Some(token.to_string()),
            metadata: HashMap::new(),
        });
        self.typed_request(message, callback, match_reply);
    }

    pub fn leave_match(&self, match_id: &str, callback: RtCallback<()>) {
        let message = EnvelopeMessage::MatchLeave(MatchLeave {
            match_id: match_id.to_string(),
        });
        self.typed_request(message, callback, |_| Some(()));
    }

    /// Send match state. No reply is expected.
    ///
    /// With an empty `presences` the data goes to every match participant.
    /// Presences without a user id or session id are skipped.
    pub fn send_match_data(
        &self,
        match_id: &str,
        op_code: i64,
        data: &[u8],
        presences: &[UserPresence],
    ) {
        let presences = presences
            .iter()
            .filter(|presence| {
                let valid = !presence.user_id.is_empty() && !presence.session_id.is_empty();
                if !valid {
                    tracing::error!(
                        "skipping invalid presence (user_id: {:?}, session_id: {:?})",
                        presence.user_id,
                        presence.session_id
                    );
                }
                valid
            })
            .cloned()
            .collect();

        self.send_message(EnvelopeMessage::MatchDataSend(MatchDataSend {
            match_id: match_id.to_string(),
            op_code,
            data: data.to_vec(),
            presences,
            reliable: true,
        }));
    }

    // --- matchmaker ---

    pub fn add_matchmaker(&self, params: MatchmakerParams, callback: RtCallback<MatchmakerTicket>) {
        let message = EnvelopeMessage::MatchmakerAdd(params.into_solo());
        self.typed_request(message, callback, |reply| match reply {
            Some(EnvelopeMessage::MatchmakerTicket(ticket)) => Some(ticket),
            _ => None,
        });
    }

    pub fn remove_matchmaker(&self, ticket: &str, callback: RtCallback<()>) {
        let message = EnvelopeMessage::MatchmakerRemove(MatchmakerRemove {
            ticket: ticket.to_string(),
        });
        self.typed_request(message, callback, |_| Some(()));
    }

    // --- status ---

    /// Follow users' status. The reply lists the ones currently online.
    pub fn follow_users(&self, user_ids: &[&str], callback: RtCallback<Status>) {
        let message = EnvelopeMessage::StatusFollow(StatusFollow {
            user_ids: owned(user_ids),
            usernames: Vec::new(),
        });
        self.typed_request(message, callback, |reply| match reply {
            Some(EnvelopeMessage::Status(status)) => Some(status),
            _ => None,
        });
    }

    pub fn unfollow_users(&self, user_ids: &[&str], callback: RtCallback<()>) {
        let message = EnvelopeMessage::StatusUnfollow(StatusUnfollow {
            user_ids: owned(user_ids),
        });
        self.typed_request(message, callback, |_| Some(()));
    }

    /// Publish a status. `None` appears offline.
    pub fn update_status(&self, status: Option<&str>, callback: RtCallback<()>) {
        let message = EnvelopeMessage::StatusUpdate(StatusUpdate {
            status: status.map(str::to_string),
        });
        self.typed_request(message, callback, |_| Some(()));
    }

    // --- rpc ---

    pub fn rpc(&self, id: &str, payload: Option<&str>, callback: RtCallback<RtRpc>) {
        let message = EnvelopeMessage::Rpc(RtRpc {
            id: id.to_string(),
            payload: payload.unwrap_or_default().to_string(),
            http_key: String::new(),
        });
        self.typed_request(message, callback, |reply| match reply {
            Some(EnvelopeMessage::Rpc(rpc)) => Some(rpc),
            _ => None,
        });
    }

    // --- parties ---

    pub fn create_party(&self, open: bool, max_size: i32, callback: RtCallback<Party>) {
        let message = EnvelopeMessage::PartyCreate(PartyCreate { open, max_size });
        self.typed_request(message, callback, |reply| match reply {
            Some(EnvelopeMessage::Party(party)) => Some(party),
            _ => None,
        });
    }

    pub fn join_party(&self, party_id: &str, callback: RtCallback<()>) {
        let message = EnvelopeMessage::PartyJoin(PartyJoin {
            party_id: party_id.to_string(),
        });
        self.typed_request(message, callback, |_| Some(()));
    }

    pub fn leave_party(&self, party_id: &str, callback: RtCallback<()>) {
        let message = EnvelopeMessage::PartyLeave(PartyLeave {
            party_id: party_id.to_string(),
        });
        self.typed_request(message, callback, |_| Some(()));
    }

    /// Only the leader may close a party.
    pub fn close_party(&self, party_id: &str, callback: RtCallback<()>) {
        let message = EnvelopeMessage::PartyClose(PartyClose {
            party_id: party_id.to_string(),
        });
        self.typed_request(message, callback, |_| Some(()));
    }

    pub fn promote_party_member(
        &self,
        party_id: &str,
        presence: UserPresence,
        callback: RtCallback<()>,
    ) {
        let message = EnvelopeMessage::PartyPromote(PartyPromote {
            party_id: party_id.to_string(),
            presence,
        });
        self.typed_request(message, callback, |_| Some(()));
    }

    pub fn accept_party_member(
        &self,
        party_id: &str,
        presence: UserPresence,
        callback: RtCallback<()>,
    ) {
        let message = EnvelopeMessage::PartyAccept(PartyAccept {
            party_id: party_id.to_string(),
            presence,
        });
        self.typed_request(message, callback, |_| Some(()));
    }

    /// Kick a member, or reject a pending join request.
    pub fn remove_party_member(
        &self,
        party_id: &str,
        presence: UserPresence,
        callback: RtCallback<()>,
    ) {
        let message = EnvelopeMessage::PartyRemove(PartyRemove {
            party_id: party_id.to_string(),
            presence,
        });
        self.typed_request(message, callback, |_| Some(()));
    }

    pub fn list_party_join_requests(
        &self,
        party_id: &str,
        callback: RtCallback<PartyJoinRequest>,
    ) {
        let message = EnvelopeMessage::PartyJoinRequestList(PartyJoinRequestList {
            party_id: party_id.to_string(),
        });
        self.typed_request(message, callback, |reply| match reply {
            Some(EnvelopeMessage::PartyJoinRequest(requests)) => Some(requests),
            _ => None,
        });
    }

    pub fn add_matchmaker_party(
        &self,
        party_id: &str,
        params: MatchmakerParams,
        callback: RtCallback<PartyMatchmakerTicket>,
    ) {
        let message = EnvelopeMessage::PartyMatchmakerAdd(params.into_party(party_id));
        self.typed_request(message, callback, |reply| match reply {
            Some(EnvelopeMessage::PartyMatchmakerTicket(ticket)) => Some(ticket),
            _ => None,
        });
    }

    pub fn remove_matchmaker_party(&self, party_id: &str, ticket: &str, callback: RtCallback<()>) {
        let message = EnvelopeMessage::PartyMatchmakerRemove(PartyMatchmakerRemove {
            party_id: party_id.to_string(),
            ticket: ticket.to_string(),
        });
        self.typed_request(message, callback, |_| Some(()));
    }

    /// Send data to party members. No reply is expected.
    pub fn send_party_data(&self, party_id: &str, op_code: i64, data: &[u8]) {
        self.send_message(EnvelopeMessage::PartyDataSend(PartyDataSend {
            party_id: party_id.to_string(),
            op_code,
            data: data.to_vec(),
        }));
    }
}

fn message_ack(reply: Option<EnvelopeMessage>) -> Option<ChannelMessageAck> {
    match reply {
        Some(EnvelopeMessage::ChannelMessageAck(ack)) => Some(ack),
        _ => None,
    }
}

fn match_reply(reply: Option<EnvelopeMessage>) -> Option<Match> {
    match reply {
        Some(EnvelopeMessage::Match(m)) => Some(m),
        _ => None,
    }
}
