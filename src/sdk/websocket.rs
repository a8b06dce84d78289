use crate::core::errors::DConnectError;
use crate::core::kernel::{GatewayCodec, GatewayFrame, TungsteniteWs, WsConfig, WsSession};
use crate::core::profiles::WEBSOCKET_ENDPOINT;
use crate::core::types::{WsState, WsStatus};
use crate::sdk::{DConnectSdk, SdkInner};
use futures_util::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Receives lifecycle notifications of the event socket
pub type StatusListener = Arc<dyn Fn(WsStatus) + Send + Sync>;

struct ChannelSlot {
    state: WsState,
    listener: Option<StatusListener>,
    shutdown: Option<oneshot::Sender<()>>,
    monitor: Option<JoinHandle<()>>,
    /// Bumped on every open and disconnect; a reader task only acts while its
    /// session is current.
    session: u64,
}

impl Default for ChannelSlot {
    fn default() -> Self {
        Self {
            state: WsState::Closed,
            listener: None,
            shutdown: None,
            monitor: None,
            session: 0,
        }
    }
}

/// The single event socket slot of an SDK instance
#[derive(Default)]
pub struct WebSocketChannel {
    slot: Mutex<ChannelSlot>,
}

impl WebSocketChannel {
    pub fn state(&self) -> WsState {
        self.slot.lock().state
    }

    /// Listener of `session`, or `None` once that session was superseded.
    fn listener_for(&self, session: u64) -> Option<Option<StatusListener>> {
        let slot = self.slot.lock();
        (slot.session == session).then(|| slot.listener.clone())
    }

    /// Mark `session` as closed by the peer; returns the listener to notify.
    fn close_session(&self, session: u64) -> Option<StatusListener> {
        let mut slot = self.slot.lock();
        if slot.session != session {
            return None;
        }
        slot.state = WsState::Closed;
        slot.shutdown = None;
        slot.listener.clone()
    }
}

fn notify(listener: Option<StatusListener>, status: WsStatus) {
    if let Some(listener) = listener {
        listener(status);
    }
}

impl DConnectSdk {
    pub fn websocket_state(&self) -> WsState {
        self.inner.channel.state()
    }

    /// Whether a physical socket is open
    pub fn is_connected_websocket(&self) -> bool {
        self.websocket_state().is_open()
    }

    /// Whether the gateway acknowledged the socket and events are flowing
    pub fn is_websocket_ready(&self) -> bool {
        self.websocket_state() == WsState::Established
    }

    pub fn websocket_url(&self) -> String {
        let config = &self.inner.config;
        format!(
            "{}://{}:{}/{}/{}",
            config.ws_scheme(),
            config.host,
            config.port,
            config.api,
            WEBSOCKET_ENDPOINT
        )
    }

    /// Open the event socket
    ///
    /// Only one socket may exist per SDK. A second call before
    /// [`disconnect_websocket`](Self::disconnect_websocket) reports
    /// [`WsStatus::Error`] to its listener and fails with
    /// [`DConnectError::AlreadyOpen`]. Authorizes first when no token is stored.
    #[instrument(skip(self, listener))]
    pub async fn connect_websocket<F>(&self, listener: F) -> Result<(), DConnectError>
    where
        F: Fn(WsStatus) + Send + Sync + 'static,
    {
        let listener: StatusListener = Arc::new(listener);
        {
            let mut slot = self.inner.channel.slot.lock();
            if slot.state != WsState::Closed {
                drop(slot);
                let err = DConnectError::AlreadyOpen;
                listener(WsStatus::Error(err.to_string()));
                return Err(err);
            }
            slot.state = WsState::Opening;
        }

        if self.access_token().is_none() {
            let scopes = self.scopes();
            let app_name = self.inner.config.app_name.clone();
            if let Err(e) = self.authorize(&scopes, &app_name).await {
                self.inner.channel.slot.lock().state = WsState::Closed;
                listener(WsStatus::Error(e.to_string()));
                return Err(e);
            }
        }

        self.open_socket(Some(listener)).await
    }

    /// Close the event socket and stop the liveness monitor. Safe to call when closed.
    pub fn disconnect_websocket(&self) {
        let (shutdown, monitor, previous) = {
            let mut slot = self.inner.channel.slot.lock();
            let previous = slot.state;
            slot.state = WsState::Closed;
            slot.listener = None;
            slot.session += 1;
            (slot.shutdown.take(), slot.monitor.take(), previous)
        };
        if let Some(monitor) = monitor {
            monitor.abort();
        }
        if let Some(shutdown) = shutdown {
            let _ = shutdown.send(());
        }
        if previous != WsState::Closed {
            info!("event socket disconnected");
        }
    }

    /// Reconnect an open socket so it announces the current token.
    pub(crate) async fn refresh_websocket(&self) {
        let listener = {
            let slot = self.inner.channel.slot.lock();
            if !slot.state.is_open() {
                return;
            }
            slot.listener.clone()
        };
        info!("reconnecting event socket with the new access token");
        self.disconnect_websocket();
        if let Err(e) = self.open_socket(listener).await {
            warn!(error = %e, "failed to reopen event socket");
        }
    }

    /// Connect, send the handshake and hand the socket to a reader task.
    ///
    /// `None` keeps the listener already installed in the slot.
    fn open_socket(
        &self,
        listener: Option<StatusListener>,
    ) -> BoxFuture<'static, Result<(), DConnectError>> {
        let sdk = self.clone();
        async move {
            let session = {
                let mut slot = sdk.inner.channel.slot.lock();
                slot.session += 1;
                slot.state = WsState::Opening;
                if listener.is_some() {
                    slot.listener = listener;
                }
                slot.session
            };

            let token = sdk.access_token().unwrap_or_default();
            let config = WsConfig {
                connect_timeout_ms: sdk.inner.config.timeout_seconds.saturating_mul(1_000),
            };
            let mut ws = TungsteniteWs::new(sdk.websocket_url(), GatewayCodec).with_config(config);

            let opened = match ws.connect().await {
                Ok(()) => ws.handshake(&token).await,
                Err(e) => Err(e),
            };
            if let Err(e) = opened {
                warn!(url = %ws.url(), error = %e, "event socket failed to open");
                let listener = sdk.inner.channel.close_session(session);
                notify(listener, WsStatus::Error(e.to_string()));
                return Err(e);
            }

            let (shutdown_tx, shutdown_rx) = oneshot::channel();
            let listener = {
                let mut slot = sdk.inner.channel.slot.lock();
                if slot.session != session {
                    None
                } else {
                    slot.state = WsState::OpenedUnestablished;
                    slot.shutdown = Some(shutdown_tx);
                    Some(slot.listener.clone())
                }
            };
            let Some(listener) = listener else {
                debug!("event socket superseded while opening");
                let _ = ws.close().await;
                return Ok(());
            };

            debug!(url = %ws.url(), "event socket open, handshake sent");
            notify(listener, WsStatus::Open);
            tokio::spawn(run_session(
                Arc::downgrade(&sdk.inner),
                session,
                ws,
                shutdown_rx,
            ));
            Ok(())
        }
        .boxed()
    }

    fn handle_frame(&self, session: u64, frame: GatewayFrame) {
        let state = {
            let slot = self.inner.channel.slot.lock();
            if slot.session != session {
                return;
            }
            slot.state
        };

        if state == WsState::Established {
            let event = frame.into_event();
            self.inner.registry.dispatch(&self.inner.config.api, &event);
            return;
        }

        match frame.handshake_result() {
            Ok(()) => {
                let listener = {
                    let mut slot = self.inner.channel.slot.lock();
                    if slot.session != session {
                        return;
                    }
                    slot.state = WsState::Established;
                    slot.listener.clone()
                };
                info!("event socket established");
                self.start_monitor();
                notify(listener, WsStatus::Established);
            }
            Err(e) => {
                warn!(code = e.error_code(), message = %e.error_message(), "event socket rejected");
                let listener = self.inner.channel.listener_for(session).flatten();
                notify(
                    listener,
                    WsStatus::Rejected {
                        code: e.error_code(),
                        message: e.error_message(),
                    },
                );
            }
        }
    }

    /// Start the liveness monitor unless one is already running.
    fn start_monitor(&self) {
        let mut slot = self.inner.channel.slot.lock();
        if slot.monitor.as_ref().is_some_and(|m| !m.is_finished()) {
            return;
        }

        let weak = Arc::downgrade(&self.inner);
        let period = Duration::from_millis(self.inner.config.monitor_interval_ms.max(1));
        slot.monitor = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let sdk = DConnectSdk { inner };
                if sdk.websocket_state() == WsState::Closed {
                    info!("event socket lost, reconnecting");
                    if let Err(e) = sdk.open_socket(None).await {
                        debug!(error = %e, "reconnect attempt failed");
                    }
                }
            }
        }));
    }
}

async fn run_session(
    inner: Weak<SdkInner>,
    session: u64,
    mut ws: TungsteniteWs<GatewayCodec>,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        let next = tokio::select! {
            _ = &mut shutdown => None,
            next = ws.next_message() => Some(next),
        };
        let Some(next) = next else {
            let _ = ws.close().await;
            return;
        };

        let Some(inner) = inner.upgrade() else {
            let _ = ws.close().await;
            return;
        };
        let sdk = DConnectSdk { inner };
        match next {
            Some(Ok(frame)) => sdk.handle_frame(session, frame),
            Some(Err(e)) => warn!(error = %e, "dropping unreadable event frame"),
            None => {
                if let Some(listener) = sdk.inner.channel.close_session(session) {
                    listener(WsStatus::Closed);
                }
                info!("event socket closed by peer");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::SdkConfig;

    #[tokio::test]
    async fn test_socket_url_mirrors_http_settings() {
        let sdk = DConnectSdk::new(SdkConfig::new("192.168.0.2", 4035).ssl_enabled(true))
            .await
            .unwrap();
        assert_eq!(sdk.websocket_url(), "wss://192.168.0.2:4035/gotapi/websocket");
        assert_eq!(sdk.websocket_state(), WsState::Closed);
        assert!(!sdk.is_connected_websocket());
        assert!(!sdk.is_websocket_ready());
    }

    #[tokio::test]
    async fn test_disconnect_when_closed_is_noop() {
        let sdk = DConnectSdk::new(SdkConfig::default()).await.unwrap();
        sdk.disconnect_websocket();
        sdk.disconnect_websocket();
        assert_eq!(sdk.websocket_state(), WsState::Closed);
    }
}
