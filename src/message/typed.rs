//! Typed message kinds.
//!
//! A [`RawMessage`] is classified into a [`TwitchMessage`] exactly once,
//! at the boundary between the connection and its consumers. The variant
//! is keyed on the command string; anything unrecognized lands in
//! [`TwitchMessage::Undefined`] so the set of kinds stays open without
//! re-dispatching downstream.

use super::raw::RawMessage;

/// A classified chat message.
///
/// Each variant carries the underlying [`RawMessage`]; field-level
/// accessors beyond [`RawMessage`]'s own stay out of this crate.
#[derive(Debug, Clone, PartialEq)]
pub enum TwitchMessage {
    /// `001` — successful login. The `channel` slot of the raw record
    /// holds the logged-in username.
    Welcome(RawMessage),
    /// `GLOBALUSERSTATE` — global settings of the logged-in user.
    GlobalUserState(RawMessage),
    /// `JOIN` — a user joined a channel.
    Join(RawMessage),
    /// `PART` — a user left a channel.
    Part(RawMessage),
    /// `USERSTATE` — the user's settings within a channel.
    UserState(RawMessage),
    /// `ROOMSTATE` — channel settings such as slow or emote-only mode.
    RoomState(RawMessage),
    /// `PRIVMSG` — an ordinary chat message.
    Privmsg(RawMessage),
    /// `CLEARCHAT` — a ban or timeout cleared a user's messages.
    ClearChat(RawMessage),
    /// `CLEARMSG` — a single message was removed.
    ClearMsg(RawMessage),
    /// `NOTICE` — a server notice addressed to the client.
    Notice(RawMessage),
    /// `USERNOTICE` — subscriptions, raids and similar channel events.
    UserNotice(RawMessage),
    /// `WHISPER` — a direct message.
    Whisper(RawMessage),
    /// Any command without a dedicated variant.
    Undefined(RawMessage),
}

impl TwitchMessage {
    /// The underlying raw record.
    pub fn raw(&self) -> &RawMessage {
        match self {
            Self::Welcome(raw)
            | Self::GlobalUserState(raw)
            | Self::Join(raw)
            | Self::Part(raw)
            | Self::UserState(raw)
            | Self::RoomState(raw)
            | Self::Privmsg(raw)
            | Self::ClearChat(raw)
            | Self::ClearMsg(raw)
            | Self::Notice(raw)
            | Self::UserNotice(raw)
            | Self::Whisper(raw)
            | Self::Undefined(raw) => raw,
        }
    }

    /// Consumes the message, returning the raw record.
    pub fn into_raw(self) -> RawMessage {
        match self {
            Self::Welcome(raw)
            | Self::GlobalUserState(raw)
            | Self::Join(raw)
            | Self::Part(raw)
            | Self::UserState(raw)
            | Self::RoomState(raw)
            | Self::Privmsg(raw)
            | Self::ClearChat(raw)
            | Self::ClearMsg(raw)
            | Self::Notice(raw)
            | Self::UserNotice(raw)
            | Self::Whisper(raw)
            | Self::Undefined(raw) => raw,
        }
    }
}

impl From<RawMessage> for TwitchMessage {
    fn from(raw: RawMessage) -> Self {
        match raw.command.as_deref() {
            Some("001") => Self::Welcome(raw),
            Some("GLOBALUSERSTATE") => Self::GlobalUserState(raw),
            Some("JOIN") => Self::Join(raw),
            Some("PART") => Self::Part(raw),
            Some("USERSTATE") => Self::UserState(raw),
            Some("ROOMSTATE") => Self::RoomState(raw),
            Some("PRIVMSG") => Self::Privmsg(raw),
            Some("CLEARCHAT") => Self::ClearChat(raw),
            Some("CLEARMSG") => Self::ClearMsg(raw),
            Some("NOTICE") => Self::Notice(raw),
            Some("USERNOTICE") => Self::UserNotice(raw),
            Some("WHISPER") => Self::Whisper(raw),
            _ => Self::Undefined(raw),
        }
    }
}
