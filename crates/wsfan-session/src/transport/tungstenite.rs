//! Production connector over `tokio-tungstenite`.

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, Stream, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};
use wsfan_core::constants::{CLOSE_ABNORMAL, CLOSE_NO_STATUS};

use super::{ConnectRequest, Connection, Connector, Frame};
use crate::error::TransportError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Dials real WebSocket servers.
///
/// The write half runs on its own task, fed by the connection's outbound
/// sender. When the session drops that sender the task sends a normal
/// close frame and exits.
#[derive(Clone, Copy, Debug, Default)]
pub struct TungsteniteConnector;

#[async_trait::async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, request: &ConnectRequest) -> Result<Connection, TransportError> {
        let mut ws_request =
            request
                .url
                .as_str()
                .into_client_request()
                .map_err(|e| TransportError::InvalidUrl {
                    url: request.url.clone(),
                    reason: e.to_string(),
                })?;

        for (name, value) in &request.headers {
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| TransportError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            let header_value =
                HeaderValue::from_str(value).map_err(|e| TransportError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            let _ = ws_request.headers_mut().insert(header_name, header_value);
        }

        let (ws, response) = connect_async(ws_request)
            .await
            .map_err(|e| TransportError::Handshake(e.to_string()))?;
        debug!(url = %request.url, status = %response.status(), "websocket handshake complete");

        let (ws_tx, ws_rx) = ws.split();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let _writer = tokio::spawn(write_loop(ws_tx, outbound_rx));

        Ok(Connection::new(outbound_tx, frames(ws_rx)))
    }
}

async fn write_loop(
    mut ws_tx: SplitSink<WsStream, Message>,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
) {
    while let Some(text) = outbound_rx.recv().await {
        if let Err(e) = ws_tx.send(Message::Text(text.into())).await {
            warn!(error = %e, "websocket write failed, stopping writer");
            return;
        }
    }

    let close = CloseFrame {
        code: CloseCode::Normal,
        reason: "".into(),
    };
    let _ = ws_tx.send(Message::Close(Some(close))).await;
    let _ = ws_tx.close().await;
    debug!("websocket writer closed");
}

/// Map raw websocket messages to [`Frame`]s.
///
/// A close frame without a status maps to 1005. A stream that ends
/// without any close frame maps to 1006. Binary payloads are passed on
/// when they are valid UTF-8; control frames are skipped.
fn frames(ws_rx: SplitStream<WsStream>) -> impl Stream<Item = Frame> + Send + 'static {
    futures::stream::unfold(Some(ws_rx), |state| async move {
        let mut ws_rx = state?;
        loop {
            let frame = match ws_rx.next().await {
                Some(Ok(Message::Text(text))) => Frame::Text(text.as_str().to_owned()),
                Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => Frame::Text(text),
                    Err(_) => {
                        debug!(len = data.len(), "skipping non-utf8 binary message");
                        continue;
                    }
                },
                Some(Ok(Message::Close(close))) => {
                    let code = close.map_or(CLOSE_NO_STATUS, |c| u16::from(c.code));
                    return Some((Frame::Close(Some(code)), None));
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => Frame::Error(e.to_string()),
                None => return Some((Frame::Close(Some(CLOSE_ABNORMAL)), None)),
            };
            return Some((frame, Some(ws_rx)));
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn invalid_url_is_rejected() {
        let err = TungsteniteConnector
            .connect(&ConnectRequest::new("not a url"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::InvalidUrl { .. }));
    }

    #[tokio::test]
    async fn invalid_header_name_is_rejected() {
        let request = ConnectRequest::new("ws://127.0.0.1:1/").with_header("Bad Header", "x");
        let err = TungsteniteConnector.connect(&request).await.unwrap_err();
        match err {
            TransportError::InvalidHeader { name, .. } => assert_eq!(name, "Bad Header"),
            other => panic!("expected InvalidHeader, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_header_value_is_rejected() {
        let request = ConnectRequest::new("ws://127.0.0.1:1/").with_header("Cookie", "a\nb");
        let err = TungsteniteConnector.connect(&request).await.unwrap_err();
        assert!(matches!(err, TransportError::InvalidHeader { .. }));
    }

    #[tokio::test]
    async fn refused_connection_is_handshake_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = TungsteniteConnector
            .connect(&ConnectRequest::new(format!("ws://127.0.0.1:{port}/")))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Handshake(_)));
    }
}
