//! End-to-end over a real socket against a local tungstenite server.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use wsfan_session::{SessionSettings, SubscribeError, SubscriptionEvent, WebSocketSession};

struct ServerReport {
    cookie: Option<String>,
    client_close: Option<u16>,
}

/// Accept one client, echo its first request, then close with `close`.
async fn spawn_server(
    close: Option<CloseFrame>,
) -> (String, oneshot::Receiver<ServerReport>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/feed", listener.local_addr().unwrap());
    let (report_tx, report_rx) = oneshot::channel();

    let _server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (cookie_tx, cookie_rx) = oneshot::channel();
        let callback = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            let cookie = req
                .headers()
                .get("cookie")
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);
            let _ = cookie_tx.send(cookie);
            Ok(resp)
        };
        let mut ws = tokio_tungstenite::accept_hdr_async(stream, callback)
            .await
            .unwrap();
        let cookie = cookie_rx.await.unwrap();

        if let Some(Ok(Message::Text(request))) = ws.next().await {
            ws.send(Message::Text(format!("echo:{}", request.as_str()).into()))
                .await
                .unwrap();
        }

        let client_close = match close {
            Some(frame) => {
                let _ = ws.close(Some(frame)).await;
                while ws.next().await.is_some() {}
                None
            }
            None => loop {
                match ws.next().await {
                    Some(Ok(Message::Close(frame))) => break frame.map(|f| u16::from(f.code)),
                    Some(Ok(_)) => {}
                    _ => break None,
                }
            },
        };
        let _ = report_tx.send(ServerReport {
            cookie,
            client_close,
        });
    });

    (url, report_rx)
}

async fn wait_for_close_code(session: &WebSocketSession) -> Option<u16> {
    for _ in 0..200 {
        if let Some(code) = session.close_code() {
            return Some(code);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    None
}

#[tokio::test]
async fn request_reply_and_client_close() {
    let (url, report) = spawn_server(None).await;
    let session = WebSocketSession::with_tungstenite(SessionSettings::default());
    session.init_websocket(&url, Some("sid=42")).await.unwrap();

    let mut handle = session.subscribe_channel("echo", Some(5)).unwrap();
    assert!(session.send_request_data("ping"));
    let reply = tokio::time::timeout(Duration::from_secs(5), handle.first_message())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reply, "echo:ping");

    session.close_websocket();
    let report = tokio::time::timeout(Duration::from_secs(5), report)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.cookie.as_deref(), Some("sid=42"));
    assert_eq!(report.client_close, Some(1000));
}

#[tokio::test]
async fn server_close_code_is_recorded() {
    let frame = CloseFrame {
        code: CloseCode::from(4000),
        reason: "bye".into(),
    };
    let (url, _report) = spawn_server(Some(frame)).await;
    let session = WebSocketSession::with_tungstenite(SessionSettings::default());
    session.init_websocket(&url, None).await.unwrap();

    let mut handle = session.subscribe_channel("watch", Some(5)).unwrap();
    assert!(session.send_request_data("hello"));

    let first = tokio::time::timeout(Duration::from_secs(5), handle.recv())
        .await
        .unwrap();
    assert_eq!(first, Some(SubscriptionEvent::Message("echo:hello".into())));
    let second = tokio::time::timeout(Duration::from_secs(5), handle.recv())
        .await
        .unwrap();
    assert_eq!(second, Some(SubscriptionEvent::Done));

    assert_eq!(wait_for_close_code(&session).await, Some(4000));
    assert!(session.is_connected());
}

#[tokio::test]
async fn close_without_status_times_out_session() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/feed", listener.local_addr().unwrap());
    let _server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let _ = ws.close(None).await;
        while ws.next().await.is_some() {}
    });

    let session = WebSocketSession::with_tungstenite(SessionSettings::default());
    session.init_websocket(&url, None).await.unwrap();
    assert_eq!(wait_for_close_code(&session).await, Some(1005));

    let err = session.subscribe_channel("late", Some(5)).unwrap_err();
    assert_eq!(err, SubscribeError::SessionTimedOut);
    assert!(!session.is_connected());
}

#[tokio::test]
async fn dropped_stream_surfaces_error_then_abnormal_close() {
    use tokio::io::AsyncWriteExt;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/feed", listener.local_addr().unwrap());
    let _server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let _ = ws.next().await;
        // Header of a 5-byte text frame followed by a single payload byte.
        let _ = ws.get_mut().write_all(&[0x81, 0x05, b'h']).await;
        let _ = ws.get_mut().flush().await;
        drop(ws);
    });

    let session = WebSocketSession::with_tungstenite(SessionSettings::default());
    session.init_websocket(&url, None).await.unwrap();
    let mut handle = session.subscribe_channel("watch", Some(5)).unwrap();
    assert!(session.send_request_data("go"));

    let first = tokio::time::timeout(Duration::from_secs(5), handle.recv())
        .await
        .unwrap();
    assert!(matches!(first, Some(SubscriptionEvent::Error(_))));
    let second = tokio::time::timeout(Duration::from_secs(5), handle.recv())
        .await
        .unwrap();
    assert_eq!(second, Some(SubscriptionEvent::Done));

    assert_eq!(wait_for_close_code(&session).await, Some(1006));
    assert!(session.is_subscribed("watch"));
}
