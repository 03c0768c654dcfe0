//! Connection lifecycle state machine.
//!
//! [`TmiConnection`] owns the transport session, performs the
//! authentication handshake, answers keepalive pings, and feeds every
//! parsed line into the inbound message channel that the fanout layer
//! drains. It is the single transition authority for [`IrcState`]; all
//! other components only observe the state channel.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::{TmiConfig, CAP_REQ, PONG_REPLY, WELCOME_PREFIX};
use crate::error::{Result, TmiError};
use crate::message::{parse_message, RawMessage};
use crate::transport::{Connector, TransportReader, TransportWriter};

/// Connection status of the client.
///
/// Fully cyclic: `Disconnected → Connecting → Connected → Disconnected`.
/// The initial state is `Disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IrcState {
    /// Transport opened, handshake sent, welcome not yet observed.
    Connecting,
    /// Welcome line observed; sends are accepted.
    Connected,
    /// No live session.
    Disconnected,
}

/// Shared pieces both the connection handle and its driver task touch.
struct ConnShared {
    state: Mutex<IrcState>,
    states_tx: mpsc::UnboundedSender<IrcState>,
    messages_tx: mpsc::UnboundedSender<RawMessage>,
}

impl ConnShared {
    fn set_state(&self, state: IrcState) {
        *self.state.lock().unwrap() = state;
        let _ = self.states_tx.send(state);
    }
}

/// One live session: the outgoing line queue plus the token that tears
/// the driver task down.
struct Session {
    outgoing: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
    driver: tokio::task::JoinHandle<()>,
}

/// The connection state machine.
pub struct TmiConnection {
    config: TmiConfig,
    connector: Connector,
    shared: Arc<ConnShared>,
    session: Mutex<Option<Session>>,
    // Driver of the last closed session, kept until someone awaits it
    // in shutdown so its final Disconnected is known to be queued.
    retired: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl TmiConnection {
    /// Creates the connection plus the two inbound channels it feeds:
    /// parsed messages and state transitions.
    pub fn new(
        config: TmiConfig,
        connector: Connector,
    ) -> (
        Self,
        mpsc::UnboundedReceiver<RawMessage>,
        mpsc::UnboundedReceiver<IrcState>,
    ) {
        let (messages_tx, messages_rx) = mpsc::unbounded_channel();
        let (states_tx, states_rx) = mpsc::unbounded_channel();
        let conn = Self {
            config,
            connector,
            shared: Arc::new(ConnShared {
                state: Mutex::new(IrcState::Disconnected),
                states_tx,
                messages_tx,
            }),
            session: Mutex::new(None),
            retired: Mutex::new(None),
        };
        (conn, messages_rx, states_rx)
    }

    /// Current connection status: the last state set by this machine.
    pub fn current_state(&self) -> IrcState {
        *self.shared.state.lock().unwrap()
    }

    /// Opens a new session, force-closing any existing one first.
    ///
    /// Emits `Connecting` once the transport is open, sends the
    /// handshake (capability request, password, nickname, in that
    /// order), then hands the session to a background driver task.
    /// A failure to open surfaces as a `Disconnected` transition, not as
    /// an error.
    pub async fn connect(&self) {
        // Wait the old driver out so its Disconnected emission cannot
        // land after the new session's Connecting.
        self.shutdown().await;

        let url = self.config.url();
        let transport = match self.connector.open(&url).await {
            Ok(transport) => transport,
            Err(e) => {
                warn!("failed to open transport to {}: {}", url, e);
                self.shared.set_state(IrcState::Disconnected);
                return;
            }
        };

        self.shared.set_state(IrcState::Connecting);

        let (mut writer, reader) = transport.split();
        for line in [
            CAP_REQ.to_string(),
            self.config.pass_line(),
            self.config.nick_line(),
        ] {
            if let Err(e) = writer.send_text(&line).await {
                warn!("handshake send failed: {}", e);
                self.shared.set_state(IrcState::Disconnected);
                return;
            }
        }

        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let driver = tokio::spawn(drive(
            self.shared.clone(),
            writer,
            reader,
            outgoing_rx,
            cancel.clone(),
        ));
        *self.session.lock().unwrap() = Some(Session {
            outgoing: outgoing_tx,
            cancel,
            driver,
        });
    }

    /// Requests the session be closed.
    ///
    /// Does not emit state itself; the driver task emits `Disconnected`
    /// when the transport actually goes down.
    pub fn disconnect(&self) {
        self.close_session();
    }

    /// Closes any live session and waits for its driver to finish, so
    /// the final `Disconnected` has been queued when this returns.
    pub async fn shutdown(&self) {
        self.close_session();
        let retired = self.retired.lock().unwrap().take();
        if let Some(driver) = retired {
            let _ = driver.await;
        }
    }

    /// Queues one raw line for the live session.
    ///
    /// Fails with [`TmiError::NotConnected`] when no session is live,
    /// which covers in-flight sends racing a disconnect.
    pub fn send_message(&self, line: String) -> Result<()> {
        let session = self.session.lock().unwrap();
        match session.as_ref() {
            Some(session) => session
                .outgoing
                .send(line)
                .map_err(|_| TmiError::NotConnected),
            None => Err(TmiError::NotConnected),
        }
    }

    fn close_session(&self) {
        if let Some(session) = self.session.lock().unwrap().take() {
            session.cancel.cancel();
            *self.retired.lock().unwrap() = Some(session.driver);
        }
    }
}

/// Session driver: multiplexes cancellation, the outgoing queue, and
/// inbound frames until the session dies, then emits `Disconnected`.
async fn drive(
    shared: Arc<ConnShared>,
    mut writer: TransportWriter,
    mut reader: TransportReader,
    mut outgoing_rx: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                writer.close().await;
                break;
            }
            line = outgoing_rx.recv() => {
                let Some(line) = line else { break };
                trace!("send: {}", line);
                if let Err(e) = writer.send_text(&line).await {
                    debug!("send failed, closing session: {}", e);
                    break;
                }
            }
            frame = reader.read_text() => {
                match frame {
                    Ok(Some(frame)) => handle_frame(&shared, &mut writer, &frame).await,
                    Ok(None) => break,
                    Err(e) => {
                        debug!("transport error: {}", e);
                        break;
                    }
                }
            }
        }
    }
    shared.set_state(IrcState::Disconnected);
}

/// Handles one transport frame.
///
/// Keepalive pings are answered immediately and never reach parsing or
/// the inbound channel. Everything else is split on newlines (one frame
/// may carry several protocol lines); a welcome line anywhere in the
/// frame transitions to `Connected`, name-list replies are skipped, and
/// the rest is parsed and forwarded.
async fn handle_frame(shared: &ConnShared, writer: &mut TransportWriter, frame: &str) {
    if frame.starts_with("PING") {
        if let Err(e) = writer.send_text(PONG_REPLY).await {
            debug!("pong send failed: {}", e);
        }
        return;
    }

    for line in frame.trim().lines() {
        if line.starts_with(WELCOME_PREFIX) {
            shared.set_state(IrcState::Connected);
        }
        if line_ignored(line) {
            continue;
        }
        let _ = shared.messages_tx.send(parse_message(line));
    }
}

/// Lines skipped wholesale before parsing: the NAMES reply and its
/// terminator, whose payloads are user lists rather than chat traffic.
fn line_ignored(line: &str) -> bool {
    matches!(line.split(' ').nth(1), Some("353") | Some("366"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_ignored() {
        assert!(line_ignored(":ronni.tmi.twitch.tv 353 ronni = #dallas :a b c"));
        assert!(line_ignored(":ronni.tmi.twitch.tv 366 ronni #dallas :End of /NAMES list"));
        assert!(!line_ignored(":tmi.twitch.tv 001 ronni :Welcome, GLHF!"));
        assert!(!line_ignored("lonely"));
    }

    #[tokio::test]
    async fn test_send_without_session_fails() {
        let (connector, _sessions) = Connector::mock();
        let (conn, _messages, _states) = TmiConnection::new(
            TmiConfig::new("oauth:secret", "ronni"),
            connector,
        );
        assert_eq!(conn.current_state(), IrcState::Disconnected);
        assert!(matches!(
            conn.send_message("JOIN #dallas".to_string()),
            Err(TmiError::NotConnected)
        ));
    }
}
