//! Listener for connection lifecycle and server pushes.

use nakama_ws::DisconnectInfo;

use super::error::RtError;
use super::message::{EnvelopeMessage, ServerError};
use super::types::*;

/// Callbacks invoked from `RtClient::tick`. Every method defaults to a no-op.
#[allow(unused_variables)]
pub trait RtClientListener: Send + Sync {
    fn on_connect(&self) {}

    fn on_disconnect(&self, info: &DisconnectInfo) {}

    /// Connection errors and server errors no request claimed.
    fn on_error(&self, error: &RtError) {}

    fn on_channel_message(&self, message: &ChannelMessage) {}

    fn on_channel_presence(&self, event: &ChannelPresenceEvent) {}

    fn on_match_data(&self, data: &MatchData) {}

    fn on_match_presence(&self, event: &MatchPresenceEvent) {}

    fn on_matchmaker_matched(&self, matched: &MatchmakerMatched) {}

    fn on_notifications(&self, notifications: &Notifications) {}

    fn on_status_presence(&self, event: &StatusPresenceEvent) {}

    fn on_stream_data(&self, data: &StreamData) {}

    fn on_stream_presence(&self, event: &StreamPresenceEvent) {}

    fn on_party(&self, party: &Party) {}

    fn on_party_close(&self, close: &PartyClose) {}

    fn on_party_data(&self, data: &PartyData) {}

    fn on_party_join_request(&self, request: &PartyJoinRequest) {}

    fn on_party_leader(&self, leader: &PartyLeader) {}

    fn on_party_matchmaker_ticket(&self, ticket: &PartyMatchmakerTicket) {}

    fn on_party_presence(&self, event: &PartyPresenceEvent) {}
}

/// A message the server sends without a correlation id.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    Error(ServerError),
    ChannelMessage(ChannelMessage),
    ChannelPresence(ChannelPresenceEvent),
    MatchData(MatchData),
    MatchPresence(MatchPresenceEvent),
    MatchmakerMatched(MatchmakerMatched),
    Notifications(Notifications),
    StatusPresence(StatusPresenceEvent),
    StreamData(StreamData),
    StreamPresence(StreamPresenceEvent),
    Party(Party),
    PartyClose(PartyClose),
    PartyData(PartyData),
    PartyJoinRequest(PartyJoinRequest),
    PartyLeader(PartyLeader),
    PartyMatchmakerTicket(PartyMatchmakerTicket),
    PartyPresence(PartyPresenceEvent),
}

impl TryFrom<EnvelopeMessage> for PushEvent {
    /// Messages that are never pushed are handed back.
    type Error = EnvelopeMessage;

    fn try_from(message: EnvelopeMessage) -> Result<Self, EnvelopeMessage> {
        use EnvelopeMessage as M;

        match message {
            M::Error(e) => Ok(Self::Error(e)),
            M::ChannelMessage(m) => Ok(Self::ChannelMessage(m)),
            M::ChannelPresenceEvent(e) => Ok(Self::ChannelPresence(e)),
            M::MatchData(d) => Ok(Self::MatchData(d)),
            M::MatchPresenceEvent(e) => Ok(Self::MatchPresence(e)),
            M::MatchmakerMatched(m) => Ok(Self::MatchmakerMatched(m)),
            M::Notifications(n) => Ok(Self::Notifications(n)),
            M::StatusPresenceEvent(e) => Ok(Self::StatusPresence(e)),
            M::StreamData(d) => Ok(Self::StreamData(d)),
            M::StreamPresenceEvent(e) => Ok(Self::StreamPresence(e)),
            M::Party(p) => Ok(Self::Party(p)),
            M::PartyClose(c) => Ok(Self::PartyClose(c)),
            M::PartyData(d) => Ok(Self::PartyData(d)),
            M::PartyJoinRequest(r) => Ok(Self::PartyJoinRequest(r)),
            M::PartyLeader(l) => Ok(Self::PartyLeader(l)),
            M::PartyMatchmakerTicket(t) => Ok(Self::PartyMatchmakerTicket(t)),
            M::PartyPresenceEvent(e) => Ok(Self::PartyPresence(e)),

            other @ (M::Channel(_)
            | M::ChannelJoin(_)
            | M::ChannelLeave(_)
            | M::ChannelMessageAck(_)
            | M::ChannelMessageSend(_)
            | M::ChannelMessageUpdate(_)
            | M::ChannelMessageRemove(_)
            | M::Match(_)
            | M::MatchCreate(_)
            | M::MatchDataSend(_)
            | M::MatchJoin(_)
            | M::MatchLeave(_)
            | M::MatchmakerAdd(_)
            | M::MatchmakerRemove(_)
            | M::MatchmakerTicket(_)
            | M::Rpc(_)
            | M::Status(_)
            | M::StatusFollow(_)
            | M::StatusUnfollow(_)
            | M::StatusUpdate(_)
            | M::Ping(_)
            | M::Pong(_)
            | M::PartyCreate(_)
            | M::PartyJoin(_)
            | M::PartyLeave(_)
            | M::PartyPromote(_)
            | M::PartyAccept(_)
            | M::PartyRemove(_)
            | M::PartyJoinRequestList(_)
            | M::PartyMatchmakerAdd(_)
            | M::PartyMatchmakerRemove(_)
            | M::PartyDataSend(_)) => Err(other),
        }
    }
}

impl PushEvent {
    pub fn dispatch(&self, listener: &dyn RtClientListener) {
        match self {
            Self::Error(e) => listener.on_error(&RtError::from(e.clone())),
            Self::ChannelMessage(m) => listener.on_channel_message(m),
            Self::ChannelPresence(e) => listener.on_channel_presence(e),
            Self::MatchData(d) => listener.on_match_data(d),
            Self::MatchPresence(e) => listener.on_match_presence(e),
            Self::MatchmakerMatched(m) => listener.on_matchmaker_matched(m),
            Self::Notifications(n) => listener.on_notifications(n),
            Self::StatusPresence(e) => listener.on_status_presence(e),
            Self::StreamData(d) => listener.on_stream_data(d),
            Self::StreamPresence(e) => listener.on_stream_presence(e),
            Self::Party(p) => listener.on_party(p),
            Self::PartyClose(c) => listener.on_party_close(c),
            Self::PartyData(d) => listener.on_party_data(d),
            Self::PartyJoinRequest(r) => listener.on_party_join_request(r),
            Self::PartyLeader(l) => listener.on_party_leader(l),
            Self::PartyMatchmakerTicket(t) => listener.on_party_matchmaker_ticket(t),
            Self::PartyPresence(e) => listener.on_party_presence(e),
        }
    }
}
