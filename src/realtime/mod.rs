//! Watch-party session over STOMP: one connection, at most one room
//! subscription, fire-and-forget commands and a multicast event stream.
//!
//! Each connection is owned by a driver task that multiplexes outbound
//! frames, heart-beats and inbound messages. Connection state is published
//! through a `watch` channel so callers never need the driver's lock.

pub mod event;
pub mod frame;
pub mod transport;


use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use uuid::Uuid;

use crate::config::RealtimeConfig;
use crate::models::RoomId;
use crate::session::Session;

pub use event::{command_destination, room_topic, RealtimeEvent, RoomCommand};
pub use frame::{Frame, FrameCommand, FrameError};
pub use transport::{Connector, Transport, WsConnector};

const DISCONNECT_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
pub enum RealtimeError {
    #[error("Not connected")]
    NotConnected,

    #[error("Handshake timed out")]
    HandshakeTimeout,

    #[error("Server rejected connection: {0}")]
    Rejected(String),

    #[error("Connection closed")]
    Closed,

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected { subscribed: bool },
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        matches!(self, ConnectionState::Connected { .. })
    }
}

/// The live room subscription. Replacing it sends UNSUBSCRIBE for the old id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub id: String,
    pub room_id: RoomId,
}

struct Link {
    outbound: mpsc::UnboundedSender<Frame>,
    active: watch::Sender<Option<Subscription>>,
    driver: JoinHandle<()>,
}

impl Link {
    fn send(&self, frame: Frame) -> Result<(), RealtimeError> {
        self.outbound.send(frame).map_err(|_| RealtimeError::Closed)
    }

    /// The driver still owns a transport.
    fn is_alive(&self) -> bool {
        !self.driver.is_finished() && !self.outbound.is_closed()
    }
}

struct Inner {
    config: RealtimeConfig,
    session: Session,
    connector: Box<dyn Connector>,
    state: watch::Sender<ConnectionState>,
    events: broadcast::Sender<RealtimeEvent>,
    link: Mutex<Option<Link>>,
}

#[derive(Clone)]
pub struct RealtimeClient {
    inner: Arc<Inner>,
}

impl RealtimeClient {
    pub fn new(
        config: RealtimeConfig,
        session: Session,
        connector: impl Connector + 'static,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (events, _) = broadcast::channel(config.event_buffer.max(1));
        Self {
            inner: Arc::new(Inner {
                config,
                session,
                connector: Box::new(connector),
                state,
                events,
                link: Mutex::new(None),
            }),
        }
    }

    /// Client for the configured WebSocket endpoint.
    pub fn websocket(config: RealtimeConfig, session: Session) -> Self {
        let connector = WsConnector::new(config.url.clone());
        Self::new(config, session, connector)
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// A fresh receiver of every event decoded from now on.
    pub fn events(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.inner.events.subscribe()
    }

    /// [`events`](Self::events) as a `Stream`; lagged receivers skip ahead.
    pub fn event_stream(&self) -> impl Stream<Item = RealtimeEvent> {
        BroadcastStream::new(self.events()).filter_map(|item| match item {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::warn!("Event stream lagged: {}", e);
                None
            }
        })
    }

    pub async fn subscription(&self) -> Option<Subscription> {
        let link = self.inner.link.lock().await;
        link.as_ref().and_then(|l| l.active.borrow().clone())
    }

    /// Open the connection unless one is already up, then run `on_ready`.
    pub async fn connect<F: FnOnce()>(&self, on_ready: F) -> Result<(), RealtimeError> {
        let mut guard = self.inner.link.lock().await;

        if guard.as_ref().is_some_and(Link::is_alive) && self.is_connected() {
            drop(guard);
            on_ready();
            return Ok(());
        }

        if let Some(stale) = guard.take() {
            stale.driver.abort();
            let _ = stale.driver.await;
        }

        self.inner.state.send_replace(ConnectionState::Connecting);
        let (transport, heartbeat) = match self.handshake().await {
            Ok(connected) => connected,
            Err(e) => {
                tracing::error!("Realtime connection failed: {}", e);
                self.inner.state.send_replace(ConnectionState::Disconnected);
                return Err(e);
            }
        };

        // The driver owns the transition back to Disconnected.
        self.inner
            .state
            .send_replace(ConnectionState::Connected { subscribed: false });
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (active, active_rx) = watch::channel(None);
        let driver = tokio::spawn(drive(
            transport,
            outbound_rx,
            active_rx,
            self.inner.events.clone(),
            self.inner.state.clone(),
            heartbeat,
        ));

        *guard = Some(Link {
            outbound,
            active,
            driver,
        });
        drop(guard);

        tracing::info!("Connected to {}", self.inner.config.url);
        on_ready();
        Ok(())
    }

    async fn handshake(&self) -> Result<(Box<dyn Transport>, Option<Duration>), RealtimeError> {
        let config = &self.inner.config;
        let mut transport = self.inner.connector.open().await?;

        let mut connect = Frame::new(FrameCommand::Connect)
            .header("accept-version", "1.2,1.1,1.0")
            .header("heart-beat", config.heart_beat_header());
        if let Some(token) = self.inner.session.credential() {
            connect = connect.header("Authorization", format!("Bearer {}", token));
        }
        transport.send(connect.encode()).await?;

        let reply = time::timeout(config.handshake_timeout(), async {
            loop {
                match transport.recv().await {
                    Some(Ok(text)) => match Frame::decode(&text) {
                        Ok(Some(frame)) => return Ok(frame),
                        Ok(None) => continue,
                        Err(e) => return Err(RealtimeError::from(e)),
                    },
                    Some(Err(e)) => return Err(e),
                    None => return Err(RealtimeError::Closed),
                }
            }
        })
        .await
        .map_err(|_| RealtimeError::HandshakeTimeout)??;

        match reply.command {
            FrameCommand::Connected => {
                let heartbeat =
                    negotiate_heartbeat(config.heartbeat_outgoing_ms, reply.get("heart-beat"));
                Ok((transport, heartbeat))
            }
            FrameCommand::Error => {
                let _ = transport.close().await;
                let message = reply.get("message").unwrap_or(&reply.body).to_string();
                Err(RealtimeError::Rejected(message))
            }
            other => {
                let _ = transport.close().await;
                Err(RealtimeError::Protocol(format!(
                    "expected CONNECTED, got {}",
                    other
                )))
            }
        }
    }

    /// Record the subscription flag unless the driver has already given up.
    fn mark_subscribed(&self, subscribed: bool) {
        self.inner.state.send_if_modified(|state| match state {
            ConnectionState::Connected { subscribed: current } if *current != subscribed => {
                *current = subscribed;
                true
            }
            _ => false,
        });
    }

    /// Subscribe to a room topic, releasing any previous subscription first.
    pub async fn subscribe_to_room(&self, room_id: RoomId) -> Result<(), RealtimeError> {
        let guard = self.inner.link.lock().await;
        let link = guard
            .as_ref()
            .filter(|l| l.is_alive() && self.is_connected())
            .ok_or(RealtimeError::NotConnected)?;

        let previous = link.active.borrow().clone();
        if let Some(previous) = previous {
            link.send(Frame::new(FrameCommand::Unsubscribe).header("id", previous.id))?;
            tracing::debug!("Released subscription to room {}", previous.room_id);
        }

        let id = format!("sub-{}", Uuid::now_v7());
        link.active.send_replace(Some(Subscription {
            id: id.clone(),
            room_id,
        }));
        link.send(
            Frame::new(FrameCommand::Subscribe)
                .header("id", id)
                .header("destination", room_topic(room_id))
                .header("ack", "auto"),
        )?;

        self.mark_subscribed(true);
        tracing::info!("Subscribed to room {}", room_id);
        Ok(())
    }

    pub async fn unsubscribe(&self) -> Result<(), RealtimeError> {
        let guard = self.inner.link.lock().await;
        let Some(link) = guard.as_ref() else {
            return Ok(());
        };
        let Some(previous) = link.active.send_replace(None) else {
            return Ok(());
        };

        link.send(Frame::new(FrameCommand::Unsubscribe).header("id", previous.id))?;
        self.mark_subscribed(false);
        tracing::info!("Unsubscribed from room {}", previous.room_id);
        Ok(())
    }

    /// Send a room command. Nothing is sent while disconnected.
    pub async fn publish(&self, room_id: RoomId, command: RoomCommand) -> Result<(), RealtimeError> {
        let guard = self.inner.link.lock().await;
        let link = guard
            .as_ref()
            .filter(|l| l.is_alive() && self.is_connected())
            .ok_or(RealtimeError::NotConnected)?;

        let destination = command_destination(room_id, &command);
        tracing::debug!("SEND {}", destination);
        link.send(
            Frame::new(FrameCommand::Send)
                .header("destination", destination)
                .header("content-type", "application/json")
                .with_body(command.body().to_string()),
        )
    }

    /// Best-effort DISCONNECT, then tear the connection down.
    pub async fn disconnect(&self) {
        let link = self.inner.link.lock().await.take();
        if let Some(Link {
            outbound,
            mut driver,
            ..
        }) = link
        {
            let _ = outbound.send(Frame::new(FrameCommand::Disconnect));
            drop(outbound);
            if time::timeout(DISCONNECT_GRACE, &mut driver).await.is_err() {
                driver.abort();
            }
            tracing::info!("Disconnected from {}", self.inner.config.url);
        }
        self.inner.state.send_replace(ConnectionState::Disconnected);
    }
}

/// Our outgoing interval against the server's requested incoming one, per
/// STOMP: zero on either side disables it, otherwise the larger wins.
fn negotiate_heartbeat(ours_ms: u64, server_header: Option<&str>) -> Option<Duration> {
    let theirs_ms = server_header
        .and_then(|h| h.split(',').nth(1))
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(0);
    if ours_ms == 0 || theirs_ms == 0 {
        return None;
    }
    Some(Duration::from_millis(ours_ms.max(theirs_ms)))
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn drive(
    mut transport: Box<dyn Transport>,
    mut outbound: mpsc::UnboundedReceiver<Frame>,
    active: watch::Receiver<Option<Subscription>>,
    events: broadcast::Sender<RealtimeEvent>,
    state: watch::Sender<ConnectionState>,
    heartbeat: Option<Duration>,
) {
    let mut ticker = heartbeat.map(|every| time::interval_at(Instant::now() + every, every));

    loop {
        tokio::select! {
            frame = outbound.recv() => {
                let Some(frame) = frame else { break };
                let last = frame.command == FrameCommand::Disconnect;
                tracing::debug!("> {}", frame.command);
                if let Err(e) = transport.send(frame.encode()).await {
                    tracing::error!("Realtime send failed: {}", e);
                    break;
                }
                if last {
                    break;
                }
            }
            _ = tick(&mut ticker) => {
                if let Err(e) = transport.send("\n".to_string()).await {
                    tracing::error!("Heart-beat failed: {}", e);
                    break;
                }
            }
            inbound = transport.recv() => match inbound {
                Some(Ok(text)) => {
                    if !dispatch(&text, &active, &events) {
                        break;
                    }
                }
                Some(Err(e)) => {
                    tracing::error!("Realtime transport error: {}", e);
                    break;
                }
                None => {
                    tracing::info!("Realtime connection closed by server");
                    break;
                }
            },
        }
    }

    let _ = transport.close().await;
    state.send_replace(ConnectionState::Disconnected);
}

/// Handle one inbound message. Returns false when the connection must end.
fn dispatch(
    text: &str,
    active: &watch::Receiver<Option<Subscription>>,
    events: &broadcast::Sender<RealtimeEvent>,
) -> bool {
    let frame = match Frame::decode(text) {
        Ok(Some(frame)) => frame,
        Ok(None) => return true,
        Err(e) => {
            tracing::warn!("Dropping undecodable frame: {}", e);
            return true;
        }
    };

    match frame.command {
        FrameCommand::Message => {
            let Some(subscription) = active.borrow().clone() else {
                tracing::debug!("Dropping message with no active subscription");
                return true;
            };
            if frame.get("subscription") != Some(subscription.id.as_str()) {
                tracing::debug!("Dropping message for released subscription");
                return true;
            }
            match RealtimeEvent::decode(&frame.body, subscription.room_id) {
                Ok(event) => {
                    // No receivers is fine.
                    let _ = events.send(event);
                }
                Err(e) => tracing::warn!("Dropping malformed event {:?}: {}", frame.body, e),
            }
            true
        }
        FrameCommand::Error => {
            tracing::error!(
                "Server error: {}",
                frame.get("message").unwrap_or(&frame.body)
            );
            false
        }
        other => {
            tracing::debug!("Ignoring {} frame", other);
            true
        }
    }
}
