//! The consumer-facing client.
//!
//! [`TmiClient`] wires the connection state machine to two fanouts (one
//! for parsed messages, one for state transitions) and runs the plugin
//! pipeline over both directions of traffic. The client is cheaply
//! cloneable; every clone shares the same connection and pipeline.

use std::sync::{Arc, Mutex, Weak};

use futures_util::{future, Stream, StreamExt};
use tracing::debug;

use crate::chan::ChannelExt;
use crate::config::TmiConfig;
use crate::conn::{IrcState, TmiConnection};
use crate::error::{Result, TmiError};
use crate::fanout::{Fanout, Subscription};
use crate::message::{RawMessage, TwitchMessage};
use crate::plugins::{Pipeline, Plugin};
use crate::transport::Connector;

struct ClientInner {
    conn: TmiConnection,
    messages: Fanout<RawMessage>,
    states: Fanout<IrcState>,
    pipeline: Arc<Pipeline>,
    username: Mutex<Option<String>>,
}

/// An asynchronous Twitch chat client.
///
/// Must be created inside a tokio runtime: construction spawns the
/// background tasks that learn the logged-in username and forward state
/// transitions to registered plugins.
#[derive(Clone)]
pub struct TmiClient {
    inner: Arc<ClientInner>,
}

impl TmiClient {
    /// Creates a client that dials the Twitch WebSocket gateway.
    pub fn new(config: TmiConfig) -> Self {
        Self::with_connector(config, Connector::WebSocket)
    }

    /// Creates a client over a custom [`Connector`]. Tests use this with
    /// [`Connector::mock`] to script whole sessions.
    pub fn with_connector(config: TmiConfig, connector: Connector) -> Self {
        let (conn, messages_rx, states_rx) = TmiConnection::new(config, connector);
        let inner = Arc::new(ClientInner {
            conn,
            messages: Fanout::new(messages_rx),
            states: Fanout::new(states_rx),
            pipeline: Arc::new(Pipeline::new()),
            username: Mutex::new(None),
        });

        // Learn our username from the first welcome reply; its channel
        // slot carries the logged-in name.
        let mut raw = inner.messages.subscribe();
        let learner = Arc::downgrade(&inner);
        tokio::spawn(async move {
            while let Some(message) = raw.next().await {
                if message.command.as_deref() == Some("001") {
                    store_username(&learner, message.channel);
                    break;
                }
            }
        });

        // Single observer forwarding each transition to the pipeline, so
        // plugins see every transition exactly once.
        let mut states = inner.states.subscribe();
        let pipeline = inner.pipeline.clone();
        tokio::spawn(async move {
            while let Some(state) = states.next().await {
                pipeline.notify_state(state);
            }
        });

        Self { inner }
    }

    /// A weak handle for plugins and other long-lived observers that
    /// must not keep the client alive.
    pub fn handle(&self) -> TmiHandle {
        TmiHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Connects to the chat gateway and starts delivering to
    /// subscribers. A transport failure surfaces as a `Disconnected`
    /// state transition rather than an error.
    pub async fn connect(&self) {
        // A manual disconnect leaves the closing session's final
        // `Disconnected` queued behind the stopped states fanout. It
        // must not surface once delivery resumes, or the reconnect
        // plugin would fight this session with a retry loop. Waiting
        // the driver out first guarantees the transition is queued
        // (not in flight) when the backlog is discarded.
        self.inner.conn.shutdown().await;
        self.inner.states.discard_backlog().await;
        self.inner.messages.start();
        self.inner.states.start();
        self.inner.conn.connect().await;
    }

    /// Stops delivery to subscribers and closes the session. Subscribers
    /// stay registered and resume on the next [`connect`].
    ///
    /// [`connect`]: TmiClient::connect
    pub fn disconnect(&self) {
        self.inner.messages.stop();
        self.inner.states.stop();
        self.inner.conn.disconnect();
    }

    /// Sends one raw protocol line through the outgoing pipeline.
    ///
    /// A pipeline veto silently drops the line and returns `Ok`. Fails
    /// with [`TmiError::NotConnected`] unless the welcome line has been
    /// observed on the live session.
    pub fn send_raw(&self, line: impl Into<String>) -> Result<()> {
        let Some(line) = self.inner.pipeline.apply_outgoing(line.into()) else {
            debug!("outgoing line vetoed by pipeline");
            return Ok(());
        };
        if self.inner.conn.current_state() != IrcState::Connected {
            return Err(TmiError::NotConnected);
        }
        self.inner.conn.send_message(line)
    }

    /// Joins a channel; accepts `name` or `#name`.
    pub fn join(&self, channel: &str) -> Result<()> {
        self.send_raw(format!("JOIN {}", channel.as_channel_name()))
    }

    /// Leaves a channel.
    pub fn part(&self, channel: &str) -> Result<()> {
        self.send_raw(format!("PART {}", channel.as_channel_name()))
    }

    /// Sends a chat message to a channel.
    pub fn privmsg(&self, channel: &str, text: &str) -> Result<()> {
        self.send_raw(format!("PRIVMSG {} :{}", channel.as_channel_name(), text))
    }

    /// Adds a plugin to the pipeline. Fails on a duplicate name, keeping
    /// the first registration.
    pub fn register_plugin(&self, plugin: Arc<dyn Plugin>) -> Result<()> {
        self.inner.pipeline.register(plugin)
    }

    /// Stream of every parsed message, before the pipeline touches it.
    pub fn raw(&self) -> Subscription<RawMessage> {
        self.inner.messages.subscribe()
    }

    /// Stream of typed messages, filtered and mapped by the pipeline.
    pub fn messages(&self) -> impl Stream<Item = TwitchMessage> + Send + Unpin {
        let pipeline = self.inner.pipeline.clone();
        self.raw()
            .map(TwitchMessage::from)
            .filter_map(move |message| future::ready(pipeline.apply_incoming(message)))
    }

    /// Stream of connection-state transitions.
    pub fn states(&self) -> Subscription<IrcState> {
        self.inner.states.subscribe()
    }

    /// The logged-in username, once the first welcome reply arrived.
    pub fn username(&self) -> Option<String> {
        self.inner.username.lock().unwrap().clone()
    }

    /// Current connection status.
    pub fn current_state(&self) -> IrcState {
        self.inner.conn.current_state()
    }
}

fn store_username(inner: &Weak<ClientInner>, name: Option<String>) {
    if let (Some(inner), Some(name)) = (inner.upgrade(), name) {
        debug!("logged in as {}", name);
        *inner.username.lock().unwrap() = Some(name);
    }
}

/// A weak, cloneable handle to a [`TmiClient`].
///
/// Plugins hold this instead of the client itself so the pipeline's
/// plugin list does not keep the client alive in a reference cycle.
#[derive(Clone)]
pub struct TmiHandle {
    inner: Weak<ClientInner>,
}

impl TmiHandle {
    /// Upgrades to the client, or `None` once it has been dropped.
    pub fn client(&self) -> Option<TmiClient> {
        self.inner.upgrade().map(|inner| TmiClient { inner })
    }
}
