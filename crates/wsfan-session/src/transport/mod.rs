//! Connection seam between the session and a WebSocket implementation.
//!
//! A [`Connector`] turns a [`ConnectRequest`] into a [`Connection`]: an
//! outbound text sender plus an inbound stream of [`Frame`]s. The session
//! never touches sockets directly, so the same logic runs over
//! [`TungsteniteConnector`] in production and [`MemoryConnector`] in tests.

pub mod memory;
pub mod tungstenite;

use async_trait::async_trait;
use futures::Stream;
use futures::stream::BoxStream;
use tokio::sync::mpsc;

use crate::error::TransportError;

pub use memory::{MemoryConnector, MemoryPeer};
pub use tungstenite::TungsteniteConnector;

/// Target URL plus extra handshake headers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectRequest {
    /// WebSocket URL (`ws://` or `wss://`).
    pub url: String,
    /// Header name/value pairs sent with the upgrade request.
    pub headers: Vec<(String, String)>,
}

impl ConnectRequest {
    /// Request with no extra headers.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
        }
    }

    /// Add a handshake header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// First header value with this name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// One item read from the inbound side of a connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    /// A text message.
    Text(String),
    /// A read error. The stream may continue or close afterwards.
    Error(String),
    /// The connection closed with this status code, if one was sent.
    Close(Option<u16>),
}

/// An open connection.
pub struct Connection {
    outbound: mpsc::UnboundedSender<String>,
    inbound: BoxStream<'static, Frame>,
}

impl Connection {
    /// Assemble a connection from its two halves.
    ///
    /// Dropping every clone of `outbound` must close the underlying socket.
    pub fn new(
        outbound: mpsc::UnboundedSender<String>,
        inbound: impl Stream<Item = Frame> + Send + 'static,
    ) -> Self {
        Self {
            outbound,
            inbound: Box::pin(inbound),
        }
    }

    pub(crate) fn into_parts(self) -> (mpsc::UnboundedSender<String>, BoxStream<'static, Frame>) {
        (self.outbound, self.inbound)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("outbound_closed", &self.outbound.is_closed())
            .finish_non_exhaustive()
    }
}

/// Opens WebSocket connections.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Dial `request.url` and complete the handshake.
    async fn connect(&self, request: &ConnectRequest) -> Result<Connection, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn header_lookup_is_case_insensitive() {
        let request = ConnectRequest::new("ws://localhost/feed").with_header("Cookie", "sid=1");
        assert_eq!(request.header("cookie"), Some("sid=1"));
        assert_eq!(request.header("COOKIE"), Some("sid=1"));
        assert_eq!(request.header("Authorization"), None);
    }

    #[test]
    fn new_request_has_no_headers() {
        let request = ConnectRequest::new("ws://localhost/feed");
        assert_eq!(request.url, "ws://localhost/feed");
        assert!(request.headers.is_empty());
    }

    #[tokio::test]
    async fn connection_parts_round_trip() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let frames = futures::stream::iter(vec![Frame::Text("a".into()), Frame::Close(Some(1000))]);
        let connection = Connection::new(tx, frames);

        let (outbound, mut inbound) = connection.into_parts();
        outbound.send("req".into()).unwrap();
        assert_eq!(rx.recv().await.as_deref(), Some("req"));
        assert_eq!(inbound.next().await, Some(Frame::Text("a".into())));
        assert_eq!(inbound.next().await, Some(Frame::Close(Some(1000))));
        assert_eq!(inbound.next().await, None);
    }
}
