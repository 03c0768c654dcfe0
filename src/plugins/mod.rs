//! Pluggable message pipeline.
//!
//! Plugins are named, ordered stages applied to every inbound message
//! before subscribers see it and to every outgoing raw line before it
//! reaches the connection. Hooks are synchronous and take `&self`;
//! stateful plugins keep their state behind interior mutability.

mod reconnect;
mod throttle;

pub use self::reconnect::ReconnectPlugin;
pub use self::throttle::ThrottlePlugin;

use std::sync::{Arc, Mutex};

use tracing::trace;

use crate::conn::IrcState;
use crate::error::{Result, TmiError};
use crate::message::TwitchMessage;

/// A named pipeline stage that may filter or transform traffic and
/// observe connection-state changes.
///
/// All hooks have pass-through defaults, so a plugin implements only
/// what it cares about.
pub trait Plugin: Send + Sync {
    /// Unique name within one pipeline. Registration of a duplicate
    /// name fails.
    fn name(&self) -> &str;

    /// Return false to drop an incoming message.
    fn filter_incoming(&self, _message: &TwitchMessage) -> bool {
        true
    }

    /// Transform an incoming message. Applied in registration order,
    /// each plugin receiving the previous plugin's output.
    fn map_incoming(&self, message: TwitchMessage) -> TwitchMessage {
        message
    }

    /// Return false to veto an outgoing line. Any veto drops the whole
    /// send.
    fn filter_outgoing(&self, _line: &str) -> bool {
        true
    }

    /// Transform an outgoing line, in registration order.
    fn map_outgoing(&self, line: String) -> String {
        line
    }

    /// Observe a connection-state transition. Called once per
    /// transition, in registration order.
    fn on_connection_state_change(&self, _state: IrcState) {}
}

/// An ordered set of [`Plugin`]s with unique names.
pub struct Pipeline {
    plugins: Mutex<Vec<Arc<dyn Plugin>>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            plugins: Mutex::new(Vec::new()),
        }
    }

    /// Adds a plugin at the end of the pipeline.
    ///
    /// Fails with [`TmiError::DuplicatePlugin`] if the name is taken,
    /// keeping the first registration.
    pub fn register(&self, plugin: Arc<dyn Plugin>) -> Result<()> {
        let mut plugins = self.plugins.lock().unwrap();
        if plugins.iter().any(|p| p.name() == plugin.name()) {
            return Err(TmiError::DuplicatePlugin(plugin.name().to_string()));
        }
        trace!("registered plugin {:?}", plugin.name());
        plugins.push(plugin);
        Ok(())
    }

    /// Number of registered plugins.
    pub fn len(&self) -> usize {
        self.plugins.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.lock().unwrap().is_empty()
    }

    /// Runs an incoming message through every filter, then every map,
    /// in registration order. `None` means some plugin dropped it.
    pub fn apply_incoming(&self, message: TwitchMessage) -> Option<TwitchMessage> {
        let plugins = self.snapshot();
        if !plugins.iter().all(|p| p.filter_incoming(&message)) {
            return None;
        }
        Some(
            plugins
                .iter()
                .fold(message, |message, p| p.map_incoming(message)),
        )
    }

    /// Outgoing counterpart of [`apply_incoming`]: same order, same
    /// all-filters-then-maps shape. `None` means the send is vetoed.
    ///
    /// [`apply_incoming`]: Pipeline::apply_incoming
    pub fn apply_outgoing(&self, line: String) -> Option<String> {
        let plugins = self.snapshot();
        if !plugins.iter().all(|p| p.filter_outgoing(&line)) {
            return None;
        }
        Some(plugins.iter().fold(line, |line, p| p.map_outgoing(line)))
    }

    /// Broadcasts a state transition to every plugin in registration
    /// order.
    pub fn notify_state(&self, state: IrcState) {
        for plugin in self.snapshot() {
            plugin.on_connection_state_change(state);
        }
    }

    // Hooks run outside the lock so one may register plugins itself.
    fn snapshot(&self) -> Vec<Arc<dyn Plugin>> {
        self.plugins.lock().unwrap().clone()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}
