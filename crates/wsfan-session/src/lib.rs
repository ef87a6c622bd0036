//! # wsfan-session
//!
//! One WebSocket connection fanned out to many named subscribers.
//!
//! ```ignore
//! let session = WebSocketSession::with_tungstenite(SessionSettings::default());
//! session.init_websocket("wss://example.test/feed", Some("sid=abc")).await?;
//!
//! session.subscribe(
//!     "orders",
//!     Some(10),
//!     Callbacks::new()
//!         .message(|msg| println!("{msg}"))
//!         .timeout(|| eprintln!("no reply")),
//! )?;
//! session.send_request_data(r#"{"op":"orders"}"#);
//! ```
//!
//! - [`session`]: connect, send, subscribe, close
//! - [`registry`]: named subscriptions, their timers, and callback ordering
//! - [`tap`]: republishes the inbound stream to every subscriber
//! - [`transport`]: the [`Connector`] seam, with tungstenite and in-memory
//!   implementations
//! - [`listener`] and [`handle`]: callback and channel delivery

#![deny(unsafe_code)]

pub mod error;
pub mod handle;
pub mod listener;
pub mod registry;
pub mod session;
pub mod tap;
pub mod transport;

pub use error::{SessionError, SubscribeError, SubscriptionError, TransportError};
pub use handle::SubscriptionHandle;
pub use listener::{Callbacks, SubscriptionListener};
pub use registry::SubscriptionRegistry;
pub use session::WebSocketSession;
pub use tap::{BroadcastTap, TapStatus};
pub use transport::{
    ConnectRequest, Connection, Connector, Frame, MemoryConnector, MemoryPeer,
    TungsteniteConnector,
};
pub use wsfan_core::{InboundEvent, SubscriptionEvent};
pub use wsfan_settings::SessionSettings;
