//! In-process loopback connector.
//!
//! Each successful [`MemoryConnector::connect`] creates a [`MemoryPeer`]
//! playing the server: it pushes frames to the session and reads what the
//! session sent. Used by tests and by embedders that want a session
//! without a socket.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;

use super::{ConnectRequest, Connection, Connector, Frame};
use crate::error::TransportError;

/// Connector that hands out in-memory peers.
#[derive(Default)]
pub struct MemoryConnector {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    requests: Vec<ConnectRequest>,
    peers: Vec<MemoryPeer>,
    refuse_next: Option<String>,
}

impl MemoryConnector {
    /// Empty connector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next connect attempt with [`TransportError::Refused`].
    pub fn refuse_next(&self, reason: impl Into<String>) {
        self.state.lock().refuse_next = Some(reason.into());
    }

    /// Number of connect attempts, including refused ones.
    pub fn connect_count(&self) -> usize {
        self.state.lock().requests.len()
    }

    /// Every request seen, oldest first.
    pub fn requests(&self) -> Vec<ConnectRequest> {
        self.state.lock().requests.clone()
    }

    /// Peer of the most recent successful connect.
    pub fn last_peer(&self) -> Option<MemoryPeer> {
        self.state.lock().peers.last().cloned()
    }
}

#[async_trait::async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, request: &ConnectRequest) -> Result<Connection, TransportError> {
        let mut state = self.state.lock();
        state.requests.push(request.clone());
        if let Some(reason) = state.refuse_next.take() {
            debug!(url = %request.url, %reason, "memory connect refused");
            return Err(TransportError::Refused(reason));
        }

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let peer = MemoryPeer {
            inner: Arc::new(PeerInner {
                inbound_tx,
                outbound_rx: tokio::sync::Mutex::new(outbound_rx),
            }),
        };
        state.peers.push(peer);
        debug!(url = %request.url, "memory connection opened");

        Ok(Connection::new(
            outbound_tx,
            UnboundedReceiverStream::new(inbound_rx),
        ))
    }
}

/// Server side of an in-memory connection.
#[derive(Clone)]
pub struct MemoryPeer {
    inner: Arc<PeerInner>,
}

struct PeerInner {
    inbound_tx: mpsc::UnboundedSender<Frame>,
    outbound_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,
}

impl MemoryPeer {
    /// Send a text message to the session.
    pub fn push_text(&self, text: impl Into<String>) -> bool {
        self.push(Frame::Text(text.into()))
    }

    /// Report a transport error to the session.
    pub fn push_error(&self, error: impl Into<String>) -> bool {
        self.push(Frame::Error(error.into()))
    }

    /// Close the connection with an optional status code.
    pub fn close(&self, code: Option<u16>) -> bool {
        self.push(Frame::Close(code))
    }

    /// Push any frame. Returns `false` once the session stopped reading.
    pub fn push(&self, frame: Frame) -> bool {
        self.inner.inbound_tx.send(frame).is_ok()
    }

    /// Whether the session is still reading from this peer.
    pub fn is_open(&self) -> bool {
        !self.inner.inbound_tx.is_closed()
    }

    /// Next payload sent by the session. `None` once the session closed.
    pub async fn next_sent(&self) -> Option<String> {
        self.inner.outbound_rx.lock().await.recv().await
    }

    /// Next payload sent by the session, if one is already queued.
    pub fn try_next_sent(&self) -> Option<String> {
        self.inner.outbound_rx.try_lock().ok()?.try_recv().ok()
    }
}

impl std::fmt::Debug for MemoryPeer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryPeer")
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn connect_records_request_and_peer() {
        let connector = MemoryConnector::new();
        let request = ConnectRequest::new("ws://memory/feed").with_header("Cookie", "sid=1");
        let connection = connector.connect(&request).await.unwrap();

        assert_eq!(connector.connect_count(), 1);
        assert_eq!(connector.requests()[0].header("cookie"), Some("sid=1"));

        let peer = connector.last_peer().unwrap();
        let (outbound, mut inbound) = connection.into_parts();

        assert!(peer.push_text("hello"));
        assert_eq!(inbound.next().await, Some(Frame::Text("hello".into())));

        outbound.send("request".into()).unwrap();
        assert_eq!(peer.next_sent().await.as_deref(), Some("request"));
        assert_eq!(peer.try_next_sent(), None);
    }

    #[tokio::test]
    async fn refuse_next_fails_once() {
        let connector = MemoryConnector::new();
        connector.refuse_next("offline");

        let err = connector
            .connect(&ConnectRequest::new("ws://memory/feed"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Refused(ref r) if r == "offline"));
        assert!(connector.last_peer().is_none());

        assert!(connector.connect(&ConnectRequest::new("ws://memory/feed")).await.is_ok());
        assert_eq!(connector.connect_count(), 2);
    }

    #[tokio::test]
    async fn dropping_connection_closes_peer() {
        let connector = MemoryConnector::new();
        let connection = connector
            .connect(&ConnectRequest::new("ws://memory/feed"))
            .await
            .unwrap();
        let peer = connector.last_peer().unwrap();
        assert!(peer.is_open());

        drop(connection);
        assert!(!peer.is_open());
        assert!(!peer.push_text("late"));
        assert_eq!(peer.next_sent().await, None);
    }
}
