//! Duplex text-frame transports.
//!
//! The connection machinery only needs a way to open a URL, push text
//! frames, and observe the frames and the close of the peer. The
//! [`Transport`] enum covers the real WebSocket backend and a
//! channel-backed mock used by the test suite (and by embedders that
//! drive the client from a captured session).

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::warn;

use crate::error::{Result, TmiError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A connected duplex text-frame socket.
pub enum Transport {
    /// A live WebSocket session.
    WebSocket(WsStream),
    /// An in-memory session driven through a [`MockHandle`].
    Mock {
        events: mpsc::UnboundedReceiver<MockEvent>,
        sent: mpsc::UnboundedSender<String>,
    },
}

impl Transport {
    /// Creates an in-memory transport together with the peer-side handle
    /// that feeds it.
    pub fn mock() -> (Self, MockHandle) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        (
            Self::Mock {
                events: events_rx,
                sent: sent_tx,
            },
            MockHandle {
                events: events_tx,
                sent: sent_rx,
            },
        )
    }

    /// Splits the transport into independently usable halves so a reader
    /// and a writer can live in the same `select!` loop.
    pub fn split(self) -> (TransportWriter, TransportReader) {
        match self {
            Self::WebSocket(stream) => {
                let (sink, stream) = stream.split();
                (TransportWriter::WebSocket(sink), TransportReader::WebSocket(stream))
            }
            Self::Mock { events, sent } => {
                (TransportWriter::Mock(sent), TransportReader::Mock(events))
            }
        }
    }
}

/// Write half of a [`Transport`].
pub enum TransportWriter {
    WebSocket(SplitSink<WsStream, WsMessage>),
    Mock(mpsc::UnboundedSender<String>),
}

impl TransportWriter {
    /// Sends one text frame.
    pub async fn send_text(&mut self, line: &str) -> Result<()> {
        match self {
            Self::WebSocket(sink) => {
                sink.send(WsMessage::Text(line.to_string()))
                    .await
                    .map_err(TmiError::from)
            }
            Self::Mock(sent) => sent
                .send(line.to_string())
                .map_err(|_| TmiError::NotConnected),
        }
    }

    /// Closes the session. Errors are irrelevant at this point and are
    /// discarded.
    pub async fn close(&mut self) {
        if let Self::WebSocket(sink) = self {
            let _ = sink.send(WsMessage::Close(None)).await;
            let _ = sink.close().await;
        }
    }
}

/// Read half of a [`Transport`].
pub enum TransportReader {
    WebSocket(SplitStream<WsStream>),
    Mock(mpsc::UnboundedReceiver<MockEvent>),
}

impl TransportReader {
    /// Waits for the next text frame. `Ok(None)` means the peer closed
    /// the session.
    pub async fn read_text(&mut self) -> Result<Option<String>> {
        match self {
            Self::WebSocket(stream) => loop {
                match stream.next().await {
                    Some(Ok(WsMessage::Text(text))) => return Ok(Some(text)),
                    Some(Ok(WsMessage::Close(_))) | None => return Ok(None),
                    Some(Ok(WsMessage::Binary(_))) => {
                        warn!("ignoring binary WebSocket frame (chat is text-only)");
                        continue;
                    }
                    Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_))) => {
                        continue;
                    }
                    Some(Err(e)) => return Err(e.into()),
                }
            },
            Self::Mock(events) => match events.recv().await {
                Some(MockEvent::Message(text)) => Ok(Some(text)),
                Some(MockEvent::Closed) | None => Ok(None),
            },
        }
    }
}

/// Events a [`MockHandle`] can feed into its transport.
#[derive(Debug, Clone)]
pub enum MockEvent {
    /// A text frame arriving from the "server".
    Message(String),
    /// Orderly close of the session.
    Closed,
}

/// Peer side of a mock transport: plays the server role in tests.
pub struct MockHandle {
    events: mpsc::UnboundedSender<MockEvent>,
    sent: mpsc::UnboundedReceiver<String>,
}

impl MockHandle {
    /// Delivers a text frame to the client. A frame may carry several
    /// newline-separated protocol lines.
    pub fn push_text(&self, text: impl Into<String>) {
        let _ = self.events.send(MockEvent::Message(text.into()));
    }

    /// Closes the session from the server side.
    pub fn close(&self) {
        let _ = self.events.send(MockEvent::Closed);
    }

    /// Waits for the next frame the client sent, or `None` once the
    /// client side is gone.
    pub async fn next_sent(&mut self) -> Option<String> {
        self.sent.recv().await
    }
}

/// Opens a fresh [`Transport`] for every connection attempt.
pub enum Connector {
    /// Dial the configured URL over WebSocket.
    WebSocket,
    /// Hand out mock sessions; each open sends the server-side
    /// [`MockHandle`] through this channel.
    Mock(mpsc::UnboundedSender<MockHandle>),
}

impl Connector {
    /// Creates a mock connector and the receiver on which the handle of
    /// every opened session arrives.
    pub fn mock() -> (Self, mpsc::UnboundedReceiver<MockHandle>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::Mock(tx), rx)
    }

    pub(crate) async fn open(&self, url: &str) -> Result<Transport> {
        match self {
            Self::WebSocket => {
                let (stream, _response) = connect_async(url).await?;
                Ok(Transport::WebSocket(stream))
            }
            Self::Mock(handles) => {
                let (transport, handle) = Transport::mock();
                handles.send(handle).map_err(|_| {
                    TmiError::Io(std::io::Error::new(
                        std::io::ErrorKind::BrokenPipe,
                        "mock session receiver dropped",
                    ))
                })?;
                Ok(transport)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_round_trip() {
        let (transport, mut handle) = Transport::mock();
        let (mut writer, mut reader) = transport.split();

        handle.push_text("PING :tmi.twitch.tv");
        assert_eq!(
            reader.read_text().await.unwrap().as_deref(),
            Some("PING :tmi.twitch.tv")
        );

        writer.send_text("PONG :tmi.twitch.tv").await.unwrap();
        assert_eq!(
            handle.next_sent().await.as_deref(),
            Some("PONG :tmi.twitch.tv")
        );

        handle.close();
        assert!(reader.read_text().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mock_handle_drop_reads_as_close() {
        let (transport, handle) = Transport::mock();
        let (_writer, mut reader) = transport.split();

        drop(handle);
        assert!(reader.read_text().await.unwrap().is_none());
    }
}
