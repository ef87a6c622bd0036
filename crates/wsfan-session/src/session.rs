//! The session: one connection, many named subscriptions.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use wsfan_core::constants::CLOSE_NO_STATUS;
use wsfan_settings::SessionSettings;

use crate::error::{SessionError, SubscribeError};
use crate::handle::SubscriptionHandle;
use crate::listener::{ChannelListener, SubscriptionListener};
use crate::registry::SubscriptionRegistry;
use crate::tap::{BroadcastTap, TapStatus};
use crate::transport::{ConnectRequest, Connector, TungsteniteConnector};

struct LiveConnection {
    url: String,
    outbound: mpsc::UnboundedSender<String>,
    tap: BroadcastTap,
    runtime: Handle,
}

/// A single WebSocket connection shared by named subscribers.
///
/// Every inbound message is delivered to every live subscriber. Each
/// subscriber has its own timer: if no message, error, or close reaches it
/// inside `timeout + padding` seconds it is removed and told so.
///
/// Only [`init_websocket`](Self::init_websocket) is async. Everything else
/// can be called from any thread once the session is connected, including
/// from inside a listener callback.
pub struct WebSocketSession {
    connector: Arc<dyn Connector>,
    settings: SessionSettings,
    registry: SubscriptionRegistry,
    live: Mutex<Option<LiveConnection>>,
    connecting: tokio::sync::Mutex<()>,
}

impl WebSocketSession {
    /// Session that dials through `connector`.
    pub fn new(connector: Arc<dyn Connector>, settings: SessionSettings) -> Self {
        Self {
            connector,
            settings,
            registry: SubscriptionRegistry::new(),
            live: Mutex::new(None),
            connecting: tokio::sync::Mutex::new(()),
        }
    }

    /// Session over real sockets.
    pub fn with_tungstenite(settings: SessionSettings) -> Self {
        Self::new(Arc::new(TungsteniteConnector), settings)
    }

    /// Settings in effect.
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Open the connection, sending `cookie` in the configured header.
    ///
    /// A no-op if a connection already exists. On failure the session stays
    /// unconnected and the call may be retried.
    pub async fn init_websocket(&self, url: &str, cookie: Option<&str>) -> Result<(), SessionError> {
        let _connecting = self.connecting.lock().await;
        if self.is_connected() {
            debug!(url, "websocket already initialized");
            return Ok(());
        }

        let mut request = ConnectRequest::new(url);
        if let Some(cookie) = cookie {
            request = request.with_header(self.settings.cookie_header.as_str(), cookie);
        }

        let connection = match self.connector.connect(&request).await {
            Ok(connection) => connection,
            Err(source) => {
                warn!(url, error = %source, "websocket connect failed");
                return Err(SessionError::Connect {
                    url: url.to_owned(),
                    source,
                });
            }
        };

        let (outbound, inbound) = connection.into_parts();
        let tap = BroadcastTap::spawn(inbound, self.settings.tap_capacity);
        *self.live.lock() = Some(LiveConnection {
            url: url.to_owned(),
            outbound,
            tap,
            runtime: Handle::current(),
        });
        info!(url, "websocket connected");
        Ok(())
    }

    /// Remove every subscription, then close the connection.
    ///
    /// Safe to call when nothing is connected. No callback fires after this
    /// returns.
    pub fn close_websocket(&self) {
        let _timeline = self.registry.enter();
        let cleared = self.registry.clear_all();
        let live = self.live.lock().take();
        match live {
            Some(live) => {
                live.tap.close();
                drop(live.outbound);
                info!(url = %live.url, cleared, "websocket closed");
            }
            None => debug!(cleared, "close requested with no live websocket"),
        }
    }

    /// Send a text payload. Returns `false` (and logs) when there is no
    /// live connection to send on.
    pub fn send_request_data(&self, data: impl Into<String>) -> bool {
        let data = data.into();
        let live = self.live.lock();
        let Some(live) = live.as_ref() else {
            warn!("no live websocket, request data dropped");
            return false;
        };
        if live.outbound.send(data).is_err() {
            warn!(url = %live.url, "websocket writer stopped, request data dropped");
            return false;
        }
        debug!(url = %live.url, "request data sent");
        true
    }

    /// Register `listener` under `name`.
    ///
    /// The timer window is `timeout_secs` (or the configured default) plus
    /// the configured padding. Preconditions are checked in order:
    ///
    /// 1. no connection: [`SubscribeError::NotConnected`]
    /// 2. server closed with 1005: the session is closed,
    ///    `on_session_timeout` runs, then [`SubscribeError::SessionTimedOut`]
    /// 3. name already live: [`SubscribeError::DuplicateName`]
    pub fn subscribe(
        &self,
        name: impl Into<String>,
        timeout_secs: Option<u64>,
        listener: impl SubscriptionListener,
    ) -> Result<(), SubscribeError> {
        self.attach(name.into(), timeout_secs, Arc::new(listener))
            .map(|_| ())
    }

    /// Like [`subscribe`](Self::subscribe), with events delivered to the
    /// returned handle.
    pub fn subscribe_channel(
        &self,
        name: impl Into<String>,
        timeout_secs: Option<u64>,
    ) -> Result<SubscriptionHandle, SubscribeError> {
        let name = name.into();
        let (listener, events) = ChannelListener::new();
        let id = self.attach(name.clone(), timeout_secs, Arc::new(listener))?;
        Ok(SubscriptionHandle::new(
            name,
            id,
            events,
            self.registry.clone(),
        ))
    }

    fn attach(
        &self,
        name: String,
        timeout_secs: Option<u64>,
        listener: Arc<dyn SubscriptionListener>,
    ) -> Result<u64, SubscribeError> {
        let _timeline = self.registry.enter();

        let attachment = self
            .live
            .lock()
            .as_ref()
            .map(|live| (live.tap.close_code(), live.runtime.clone()));
        let Some((close_code, runtime)) = attachment else {
            warn!(subscription = %name, "no live websocket, subscribe ignored");
            return Err(SubscribeError::NotConnected);
        };

        if close_code == Some(CLOSE_NO_STATUS) {
            warn!(subscription = %name, "websocket session timed out, closing");
            self.close_websocket();
            listener.on_session_timeout();
            return Err(SubscribeError::SessionTimedOut);
        }

        if self.registry.contains(&name) {
            warn!(subscription = %name, "subscription already registered");
            return Err(SubscribeError::DuplicateName { name });
        }

        let Some(events) = self.live.lock().as_ref().map(|live| live.tap.subscribe()) else {
            return Err(SubscribeError::NotConnected);
        };
        let window = self.settings.timeout_window(timeout_secs);
        self.registry
            .register(&runtime, &name, window, events, listener)
            .ok_or(SubscribeError::DuplicateName { name })
    }

    /// Remove `name`. Returns whether it was live.
    pub fn unsubscribe(&self, name: &str) -> bool {
        self.registry.unsubscribe(name)
    }

    /// Remove every subscription, keeping the connection open.
    pub fn clear_all_subscriptions(&self) {
        let cleared = self.registry.clear_all();
        debug!(cleared, "all subscriptions cleared");
    }

    /// Whether a connection exists (it may since have been closed by the
    /// server; see [`close_code`](Self::close_code)).
    pub fn is_connected(&self) -> bool {
        self.live.lock().is_some()
    }

    /// Close code received from the server on the current connection.
    pub fn close_code(&self) -> Option<u16> {
        self.live.lock().as_ref().and_then(|live| live.tap.close_code())
    }

    /// Reader state of the current connection.
    pub fn connection_status(&self) -> Option<TapStatus> {
        self.live.lock().as_ref().map(|live| live.tap.status())
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.registry.len()
    }

    /// Whether `name` is live.
    pub fn is_subscribed(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    /// Live subscription names, sorted.
    pub fn subscription_names(&self) -> Vec<String> {
        self.registry.names()
    }
}

impl Drop for WebSocketSession {
    fn drop(&mut self) {
        self.close_websocket();
    }
}

impl std::fmt::Debug for WebSocketSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketSession")
            .field("connected", &self.is_connected())
            .field("subscriptions", &self.subscription_names())
            .finish_non_exhaustive()
    }
}
