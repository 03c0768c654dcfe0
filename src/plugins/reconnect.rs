//! Automatic reconnect plugin.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::client::{TmiClient, TmiHandle};
use crate::conn::IrcState;
use crate::message::TwitchMessage;
use crate::plugins::Plugin;

const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

/// Reconnects after a connection loss and rejoins the channels the
/// client was in.
///
/// Transitions into `Connecting` are ignored so nothing fires
/// mid-handshake. A transition into `Disconnected` (from a different
/// state) starts a retry loop that calls `connect` then waits a fixed
/// interval, `attempts` times (`0` retries forever, with no backoff
/// growth). A `Connected` transition cancels the loop and re-issues a
/// join for every remembered channel.
///
/// The remembered set tracks JOIN/PART messages whose author is the
/// client's own username, learned from the first successful login.
pub struct ReconnectPlugin {
    handle: TmiHandle,
    attempts: u32,
    interval: Duration,
    state: Mutex<ReconnectState>,
}

struct ReconnectState {
    active_channels: HashSet<String>,
    last_state: IrcState,
    retry: Option<CancellationToken>,
    // Learned from the first welcome reply on the same ordered stream
    // the joins arrive on, so a join echo can never outrun it.
    username: Option<String>,
}

impl ReconnectPlugin {
    /// Retry forever, every ten seconds.
    pub fn new(client: &TmiClient) -> Arc<Self> {
        Self::with_policy(client, 0, DEFAULT_INTERVAL)
    }

    /// Retry `attempts` times (`0` means unbounded) spaced by
    /// `interval`.
    pub fn with_policy(client: &TmiClient, attempts: u32, interval: Duration) -> Arc<Self> {
        let plugin = Arc::new(Self {
            handle: client.handle(),
            attempts,
            interval,
            state: Mutex::new(ReconnectState {
                active_channels: HashSet::new(),
                last_state: IrcState::Disconnected,
                retry: None,
                username: None,
            }),
        });

        // Track the client's own joins and parts. The subscription ends
        // by itself when the message fanout goes away.
        let mut messages = client.messages();
        let tracker: Weak<Self> = Arc::downgrade(&plugin);
        tokio::spawn(async move {
            while let Some(message) = messages.next().await {
                let Some(plugin) = tracker.upgrade() else { break };
                plugin.observe(&message);
            }
        });

        plugin
    }

    fn observe(&self, message: &TwitchMessage) {
        if let TwitchMessage::Welcome(raw) = message {
            if let Some(name) = raw.channel.clone() {
                self.state.lock().unwrap().username = Some(name);
            }
            return;
        }

        let mut state = self.state.lock().unwrap();
        let Some(own) = state.username.clone() else { return };
        match message {
            TwitchMessage::Join(raw) if raw.author() == own => {
                if let Some(channel) = raw.channel.clone() {
                    state.active_channels.insert(channel);
                }
            }
            TwitchMessage::Part(raw) if raw.author() == own => {
                if let Some(channel) = raw.channel.as_deref() {
                    state.active_channels.remove(channel);
                }
            }
            _ => {}
        }
    }

    fn start_retry(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let cancel = token.clone();
        let handle = self.handle.clone();
        let attempts = self.attempts;
        let interval = self.interval;

        tokio::spawn(async move {
            let mut attempt = 0u32;
            loop {
                if attempts > 0 && attempt >= attempts {
                    debug!("reconnect gave up after {} attempts", attempts);
                    return;
                }
                attempt += 1;

                let Some(client) = handle.client() else { return };
                if client.current_state() != IrcState::Connected {
                    info!("reconnect attempt {}", attempt);
                    client.connect().await;
                }
                drop(client);

                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
        });

        token
    }

    fn rejoin(&self) {
        let channels: Vec<String> = {
            let state = self.state.lock().unwrap();
            state.active_channels.iter().cloned().collect()
        };
        let Some(client) = self.handle.client() else { return };
        for channel in channels {
            info!("rejoining {}", channel);
            if let Err(e) = client.join(&channel) {
                debug!("rejoin of {} failed: {}", channel, e);
            }
        }
    }
}

impl Plugin for ReconnectPlugin {
    fn name(&self) -> &str {
        "reconnect"
    }

    fn on_connection_state_change(&self, new_state: IrcState) {
        let mut state = self.state.lock().unwrap();
        if state.last_state == new_state || new_state == IrcState::Connecting {
            return;
        }
        state.last_state = new_state;

        match new_state {
            IrcState::Disconnected => {
                if let Some(token) = state.retry.take() {
                    token.cancel();
                }
                state.retry = Some(self.start_retry());
            }
            IrcState::Connected => {
                if let Some(token) = state.retry.take() {
                    token.cancel();
                }
                drop(state);
                self.rejoin();
            }
            IrcState::Connecting => {}
        }
    }
}
