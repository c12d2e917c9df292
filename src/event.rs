//! Typed events emitted by line processing.
//!
//! Every processed line produces zero or more events describing what
//! changed. State mutation happens before the event is emitted, so a
//! consumer observing an event sees the post-change session (parts,
//! kicks, and quits can be flipped to pre-change removal through
//! [`EngineConfig::remove_after_callback`](crate::config::EngineConfig)).

use crate::error::Severity;

/// Where a message-style event was delivered and what shape it took.
///
/// The fifteen message variants cover the cross product of target kind
/// (channel, the local client, unknown) and payload shape (plain message,
/// CTCP action, other CTCP, CTCP reply, notice), plus the status-prefixed
/// channel variants.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A numeric reply was received. Emitted for every numeric in
    /// addition to any more specific event.
    Numeric {
        numeric: u16,
        params: Vec<String>,
    },
    /// The welcome reply arrived; the connection is registered.
    Registered,
    /// A nickname changed.
    NickChanged {
        old: String,
        new: String,
        is_self: bool,
    },
    /// The local client joined a channel.
    ChannelSelfJoin { channel: String },
    /// Another client joined a channel we are on.
    ChannelJoin { channel: String, nick: String },
    /// A client (possibly us) left a channel.
    ChannelPart {
        channel: String,
        nick: String,
        reason: String,
        is_self: bool,
    },
    /// A client was kicked from a channel.
    ChannelKick {
        channel: String,
        kicked: String,
        /// Absent when the kicker is hidden (server-side kick).
        kicker: Option<String>,
        kicker_host: String,
        reason: String,
    },
    /// A client quit the network.
    Quit { nick: String, reason: String },
    /// Per-channel echo of a quit, one per shared channel.
    ChannelQuit {
        channel: String,
        nick: String,
        reason: String,
    },
    /// Topic text or metadata changed.
    ChannelTopic {
        channel: String,
        /// True for a live TOPIC change, false for the replies sent on
        /// join.
        is_update: bool,
    },
    /// A MODE change finished applying to a channel (aggregate).
    ChannelModesChanged {
        channel: String,
        source: String,
    },
    /// One non-prefix channel mode changed.
    ChannelSingleModeChanged {
        channel: String,
        source: String,
        adding: bool,
        mode: char,
        param: String,
    },
    /// A member's prefix mode changed.
    ChannelUserModeChanged {
        channel: String,
        target: String,
        source: String,
        adding: bool,
        mode: char,
    },
    /// The NAMES burst for a channel completed.
    ChannelGotNames { channel: String },
    /// All requested list-mode batches for a channel completed.
    ChannelGotListModes { channel: String },
    /// The local client's user modes changed.
    UserModesChanged { modes: String },
    /// The server reported the local client's user modes (221).
    UserModesDiscovered { modes: String },
    /// The local client's away state changed.
    AwayStateSelf {
        away: bool,
        reason: String,
    },
    /// Another client's away state changed.
    AwayStateUser {
        nick: String,
        away: bool,
        reason: String,
    },
    /// Per-channel echo of a user's away transition.
    AwayStateChannelUser {
        channel: String,
        nick: String,
        away: bool,
    },
    /// A capability's negotiation state changed.
    CapabilityState {
        name: String,
        enabled: bool,
    },
    /// A message to a channel.
    ChannelMessage {
        channel: String,
        source: String,
        text: String,
    },
    /// A CTCP ACTION to a channel.
    ChannelAction {
        channel: String,
        source: String,
        text: String,
    },
    /// A non-ACTION CTCP to a channel.
    ChannelCtcp {
        channel: String,
        source: String,
        ctcp_type: String,
        args: String,
    },
    /// A CTCP reply to a channel.
    ChannelCtcpReply {
        channel: String,
        source: String,
        ctcp_type: String,
        args: String,
    },
    /// A notice to a channel.
    ChannelNotice {
        channel: String,
        source: String,
        text: String,
    },
    /// A message to a channel restricted to holders of a status prefix
    /// (e.g. `@#channel`).
    ChannelModeMessage {
        prefix: char,
        channel: String,
        source: String,
        text: String,
    },
    /// A notice to a status-prefixed channel target.
    ChannelModeNotice {
        prefix: char,
        channel: String,
        source: String,
        text: String,
    },
    /// A private message to the local client.
    PrivateMessage { source: String, text: String },
    /// A CTCP ACTION in private.
    PrivateAction { source: String, text: String },
    /// A non-ACTION CTCP in private.
    PrivateCtcp {
        source: String,
        ctcp_type: String,
        args: String,
    },
    /// A CTCP reply in private.
    PrivateCtcpReply {
        source: String,
        ctcp_type: String,
        args: String,
    },
    /// A private notice.
    PrivateNotice { source: String, text: String },
    /// A message whose target is neither a known channel nor us.
    UnknownMessage {
        target: String,
        source: String,
        text: String,
    },
    /// A CTCP ACTION to an unknown target.
    UnknownAction {
        target: String,
        source: String,
        text: String,
    },
    /// A non-ACTION CTCP to an unknown target.
    UnknownCtcp {
        target: String,
        source: String,
        ctcp_type: String,
        args: String,
    },
    /// A CTCP reply to an unknown target.
    UnknownCtcpReply {
        target: String,
        source: String,
        ctcp_type: String,
        args: String,
    },
    /// A notice to an unknown target.
    UnknownNotice {
        target: String,
        source: String,
        text: String,
    },
    /// A server notice received before registration (`NOTICE AUTH`).
    NoticeAuth { text: String },
    /// A client's services account changed (`ACCOUNT`).
    AccountChanged {
        nick: String,
        account: Option<String>,
    },
    /// A client's visible user/host changed (`CHGHOST`).
    HostChanged { nick: String },
    /// A recoverable processing problem, surfaced instead of being
    /// swallowed.
    EngineError {
        severity: Severity,
        message: String,
        raw_line: String,
    },
}

impl Event {
    /// The discriminant of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Numeric { .. } => EventKind::Numeric,
            Event::Registered => EventKind::Registered,
            Event::NickChanged { .. } => EventKind::NickChanged,
            Event::ChannelSelfJoin { .. } => EventKind::ChannelSelfJoin,
            Event::ChannelJoin { .. } => EventKind::ChannelJoin,
            Event::ChannelPart { .. } => EventKind::ChannelPart,
            Event::ChannelKick { .. } => EventKind::ChannelKick,
            Event::Quit { .. } => EventKind::Quit,
            Event::ChannelQuit { .. } => EventKind::ChannelQuit,
            Event::ChannelTopic { .. } => EventKind::ChannelTopic,
            Event::ChannelModesChanged { .. } => EventKind::ChannelModesChanged,
            Event::ChannelSingleModeChanged { .. } => EventKind::ChannelSingleModeChanged,
            Event::ChannelUserModeChanged { .. } => EventKind::ChannelUserModeChanged,
            Event::ChannelGotNames { .. } => EventKind::ChannelGotNames,
            Event::ChannelGotListModes { .. } => EventKind::ChannelGotListModes,
            Event::UserModesChanged { .. } => EventKind::UserModesChanged,
            Event::UserModesDiscovered { .. } => EventKind::UserModesDiscovered,
            Event::AwayStateSelf { .. } => EventKind::AwayStateSelf,
            Event::AwayStateUser { .. } => EventKind::AwayStateUser,
            Event::AwayStateChannelUser { .. } => EventKind::AwayStateChannelUser,
            Event::CapabilityState { .. } => EventKind::CapabilityState,
            Event::ChannelMessage { .. } => EventKind::ChannelMessage,
            Event::ChannelAction { .. } => EventKind::ChannelAction,
            Event::ChannelCtcp { .. } => EventKind::ChannelCtcp,
            Event::ChannelCtcpReply { .. } => EventKind::ChannelCtcpReply,
            Event::ChannelNotice { .. } => EventKind::ChannelNotice,
            Event::ChannelModeMessage { .. } => EventKind::ChannelModeMessage,
            Event::ChannelModeNotice { .. } => EventKind::ChannelModeNotice,
            Event::PrivateMessage { .. } => EventKind::PrivateMessage,
            Event::PrivateAction { .. } => EventKind::PrivateAction,
            Event::PrivateCtcp { .. } => EventKind::PrivateCtcp,
            Event::PrivateCtcpReply { .. } => EventKind::PrivateCtcpReply,
            Event::PrivateNotice { .. } => EventKind::PrivateNotice,
            Event::UnknownMessage { .. } => EventKind::UnknownMessage,
            Event::UnknownAction { .. } => EventKind::UnknownAction,
            Event::UnknownCtcp { .. } => EventKind::UnknownCtcp,
            Event::UnknownCtcpReply { .. } => EventKind::UnknownCtcpReply,
            Event::UnknownNotice { .. } => EventKind::UnknownNotice,
            Event::NoticeAuth { .. } => EventKind::NoticeAuth,
            Event::AccountChanged { .. } => EventKind::AccountChanged,
            Event::HostChanged { .. } => EventKind::HostChanged,
            Event::EngineError { .. } => EventKind::EngineError,
        }
    }
}

/// Discriminant-only view of [`Event`], for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)] // mirrors Event one-to-one
pub enum EventKind {
    Numeric,
    Registered,
    NickChanged,
    ChannelSelfJoin,
    ChannelJoin,
    ChannelPart,
    ChannelKick,
    Quit,
    ChannelQuit,
    ChannelTopic,
    ChannelModesChanged,
    ChannelSingleModeChanged,
    ChannelUserModeChanged,
    ChannelGotNames,
    ChannelGotListModes,
    UserModesChanged,
    UserModesDiscovered,
    AwayStateSelf,
    AwayStateUser,
    AwayStateChannelUser,
    CapabilityState,
    ChannelMessage,
    ChannelAction,
    ChannelCtcp,
    ChannelCtcpReply,
    ChannelNotice,
    ChannelModeMessage,
    ChannelModeNotice,
    PrivateMessage,
    PrivateAction,
    PrivateCtcp,
    PrivateCtcpReply,
    PrivateNotice,
    UnknownMessage,
    UnknownAction,
    UnknownCtcp,
    UnknownCtcpReply,
    UnknownNotice,
    NoticeAuth,
    AccountChanged,
    HostChanged,
    EngineError,
}
