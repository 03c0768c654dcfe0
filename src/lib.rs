//! # tmi-client
//!
//! An async client for Twitch chat (TMI), the IRC dialect served over
//! WebSocket at `irc-ws.chat.twitch.tv`.
//!
//! ## Features
//!
//! - Tolerant wire-format parsing of tag-annotated protocol lines
//! - Connection lifecycle with handshake, keepalive replies and
//!   broadcast state transitions
//! - One inbound stream fanned out to any number of independently-paced
//!   subscriber streams
//! - An ordered, named plugin pipeline filtering and transforming
//!   traffic in both directions
//! - Ready-made plugins: automatic reconnect with channel rejoin, and
//!   outbound throttling
//!
//! ## Quick Start
//!
//! ```no_run
//! use futures_util::StreamExt;
//! use tmi_client::{TmiClient, TmiConfig, TwitchMessage};
//!
//! # async fn run() {
//! let client = TmiClient::new(TmiConfig::new("oauth:token", "mybot"));
//! client.connect().await;
//!
//! let mut messages = client.messages();
//! while let Some(message) = messages.next().await {
//!     if let TwitchMessage::Privmsg(raw) = message {
//!         println!("{}: {:?}", raw.author(), raw.text);
//!     }
//! }
//! # }
//! ```
//!
//! ## Acknowledgments
//!
//! The protocol-handling shape of this crate follows the conventions of
//! the slirc-proto IRC library.

#![deny(clippy::all)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod chan;
pub mod client;
pub mod config;
pub mod conn;
pub mod error;
pub mod fanout;
pub mod message;
pub mod plugins;
pub mod transport;

pub use self::chan::ChannelExt;
pub use self::client::{TmiClient, TmiHandle};
pub use self::config::{TmiConfig, TWITCH_HOST};
pub use self::conn::{IrcState, TmiConnection};
pub use self::error::{Result, TmiError};
pub use self::fanout::{Fanout, FinishedSource, Subscription};
pub use self::message::{parse_message, RawMessage, TwitchMessage};
pub use self::plugins::{Pipeline, Plugin, ReconnectPlugin, ThrottlePlugin};
pub use self::transport::{Connector, MockHandle, Transport};
