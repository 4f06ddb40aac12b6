//! The connection manager: one realtime link per process.
//!
//! `ConnectionManager` owns the single realtime link the client keeps to
//! its backend. It's responsible for:
//! - Opening the link lazily, at most once at a time
//! - Binding the link to a user (`authenticate` + `join-user-room`),
//!   exactly once per user
//! - Reconnecting after transport drops with bounded backoff
//! - Tearing everything down on logout
//!
//! # Shared state
//!
//! The manager is a cheap `Clone` handle over an `Arc`. Every clone talks
//! to the same link, so build it once and hand clones to whoever needs
//! it. All mutation of the link state happens under one `tokio` mutex:
//! the public lifecycle calls take it, and so does the background driver
//! task when it swaps a dead link for a reconnected one. Holding it across
//! the connect `await` is what makes concurrent `ensure_connected` and
//! `initialize_for_user` calls collapse into a single link and a single
//! setup.
//!
//! ## Lifecycle
//!
//! ```text
//!   Disconnected ──(ensure_connected)──→ Connecting ──→ Connected
//!        ↑                                                  │
//!        │                                     (transport drop)
//!   (teardown)                                              ▼
//!        │                         Reconnecting{n} ──(budget spent)──→ Failed
//!        │                               │                               │
//!        └───────────────────────────────┴──────(explicit call)──────────┘
//! ```

use std::sync::Arc;

use tether_protocol::{
    ClientEvent, Codec, DisconnectReason, EventFrame, JsonCodec, UserId,
};
use tether_transport::{Connector, Link, TransportError};
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;

use crate::{
    Backoff, ConnectionEvent, ConnectionObserver, LoggingObserver,
    RealtimeConfig, RealtimeError,
};

/// Capacity of the inbound event broadcast. Slow subscribers that fall
/// further behind than this lose the oldest frames.
const INCOMING_CAPACITY: usize = 64;

/// Coarse state of the realtime link, published on a `watch` channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// No link, and nothing is trying to open one.
    Disconnected,
    /// An explicit connect is in flight.
    Connecting,
    /// A link is open.
    Connected,
    /// Waiting for, or making, automatic reconnect attempt `attempt`.
    Reconnecting {
        /// 1-based attempt number.
        attempt: u32,
    },
    /// Automatic reconnection gave up.
    Failed,
}

/// A point-in-time view of the connection handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionHandle {
    /// `true` while a link is open.
    pub connected: bool,
    /// The user the link is bound to, if any.
    pub initialized_for_user: Option<UserId>,
}

/// Outcome of [`ConnectionManager::initialize_for_user`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Initialized {
    /// The link was bound to the user just now.
    Fresh,
    /// The link was already bound to this user and open. Nothing was sent.
    AlreadyActive,
    /// The link was bound to this user but down; a new link was opened
    /// and the binding re-sent on it.
    Restored,
}

/// Owns the process's realtime link.
///
/// See the [module docs](self) for the lifecycle.
pub struct ConnectionManager<C: Connector> {
    inner: Arc<Inner<C>>,
}

impl<C: Connector> Clone for ConnectionManager<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Builder for a [`ConnectionManager`]. Observers can only be added here.
pub struct ConnectionManagerBuilder<C: Connector> {
    connector: C,
    config: RealtimeConfig,
    observers: Vec<Box<dyn ConnectionObserver>>,
}

impl<C: Connector> ConnectionManagerBuilder<C> {
    /// Registers an observer for lifecycle events.
    pub fn observer(mut self, observer: impl ConnectionObserver) -> Self {
        self.observers.push(Box::new(observer));
        self
    }

    /// Builds the manager. No link is opened until one is asked for.
    pub fn build(self) -> ConnectionManager<C> {
        let mut observers: Vec<Box<dyn ConnectionObserver>> =
            Vec::with_capacity(self.observers.len() + 1);
        observers.push(Box::new(LoggingObserver));
        observers.extend(self.observers);

        let (status, _) = watch::channel(LinkStatus::Disconnected);
        let (incoming, _) = broadcast::channel(INCOMING_CAPACITY);

        ConnectionManager {
            inner: Arc::new(Inner {
                connector: self.connector,
                config: self.config.validated(),
                codec: JsonCodec,
                state: Mutex::new(LinkState {
                    link: None,
                    initialized_for: None,
                    driver: None,
                }),
                status,
                incoming,
                observers,
            }),
        }
    }
}

impl<C: Connector> ConnectionManager<C> {
    /// Creates a builder.
    pub fn builder(
        connector: C,
        config: RealtimeConfig,
    ) -> ConnectionManagerBuilder<C> {
        ConnectionManagerBuilder {
            connector,
            config,
            observers: Vec::new(),
        }
    }

    /// Creates a manager with only the logging observer.
    pub fn new(connector: C, config: RealtimeConfig) -> Self {
        Self::builder(connector, config).build()
    }

    /// Opens the link unless one is already open.
    ///
    /// Safe to call repeatedly and concurrently: callers that arrive
    /// while a connect is in flight wait for it and share its link. If
    /// the link is bound to a user, the binding is re-sent on the new
    /// link.
    ///
    /// # Errors
    /// [`RealtimeError::Transport`] if the link can't be opened.
    pub async fn ensure_connected(&self) -> Result<(), RealtimeError> {
        let mut state = self.inner.state.lock().await;
        Arc::clone(&self.inner)
            .ensure_link(&mut state)
            .await
            .map(|_| ())
    }

    /// Binds the link to `user_id`, opening it first if needed.
    ///
    /// `user_id` is the idempotency key: repeated calls for the user the
    /// open link is already bound to return [`Initialized::AlreadyActive`]
    /// without emitting anything.
    ///
    /// # Errors
    /// - [`RealtimeError::UserMismatch`] if the link is bound to someone
    ///   else (tear down first).
    /// - [`RealtimeError::Transport`] / [`RealtimeError::Protocol`] if the
    ///   link can't be opened or the setup events can't be sent.
    pub async fn initialize_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Initialized, RealtimeError> {
        let mut state = self.inner.state.lock().await;

        match state.initialized_for.clone() {
            Some(active) if active == *user_id => {
                if state.link.is_some() {
                    tracing::debug!(%user_id, "realtime already initialized for user");
                    return Ok(Initialized::AlreadyActive);
                }
                Arc::clone(&self.inner).ensure_link(&mut state).await?;
                return Ok(Initialized::Restored);
            }
            Some(active) => {
                return Err(RealtimeError::UserMismatch {
                    active,
                    requested: user_id.clone(),
                });
            }
            None => {}
        }

        let link = Arc::clone(&self.inner).ensure_link(&mut state).await?;
        self.inner.send_setup(link.as_ref(), user_id).await?;
        state.initialized_for = Some(user_id.clone());

        tracing::info!(%user_id, "realtime initialized for user");
        Ok(Initialized::Fresh)
    }

    /// Closes the link and forgets the user binding.
    ///
    /// Idempotent: tearing down an already torn-down manager does nothing.
    /// Stops any automatic reconnection in progress.
    pub async fn teardown(&self) {
        let mut state = self.inner.state.lock().await;

        if let Some(driver) = state.driver.take() {
            driver.abort();
        }
        let user = state.initialized_for.take();

        match state.link.take() {
            Some(link) => {
                if let Err(e) = link.close().await {
                    tracing::debug!(error = %e, "close during teardown failed");
                }
                self.inner.notify(&ConnectionEvent::Disconnect {
                    reason: DisconnectReason::ClientDisconnect,
                });
                tracing::info!(user = ?user, "realtime link torn down");
            }
            None => tracing::debug!("teardown with no open link"),
        }

        self.inner.status.send_replace(LinkStatus::Disconnected);
    }

    /// Emits one event on the open link.
    ///
    /// # Errors
    /// [`RealtimeError::NotConnected`] if no link is open.
    pub async fn emit(&self, event: &ClientEvent) -> Result<(), RealtimeError> {
        let state = self.inner.state.lock().await;
        let link = state.link.as_ref().ok_or(RealtimeError::NotConnected)?;
        self.inner.send_event(link.as_ref(), event).await
    }

    /// Returns a snapshot of the connection handle.
    pub async fn handle(&self) -> ConnectionHandle {
        let state = self.inner.state.lock().await;
        ConnectionHandle {
            connected: state.link.is_some(),
            initialized_for_user: state.initialized_for.clone(),
        }
    }

    /// The user the link is bound to, if any.
    pub async fn initialized_for_user(&self) -> Option<UserId> {
        self.inner.state.lock().await.initialized_for.clone()
    }

    /// Current link status.
    pub fn status(&self) -> LinkStatus {
        *self.inner.status.borrow()
    }

    /// Subscribes to link status changes.
    pub fn watch_status(&self) -> watch::Receiver<LinkStatus> {
        self.inner.status.subscribe()
    }

    /// Subscribes to events pushed by the server.
    pub fn incoming(&self) -> broadcast::Receiver<EventFrame> {
        self.inner.incoming.subscribe()
    }
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

struct Inner<C: Connector> {
    connector: C,
    config: RealtimeConfig,
    codec: JsonCodec,
    state: Mutex<LinkState<C::Link>>,
    status: watch::Sender<LinkStatus>,
    incoming: broadcast::Sender<EventFrame>,
    observers: Vec<Box<dyn ConnectionObserver>>,
}

struct LinkState<L> {
    /// The open link. `None` while disconnected or reconnecting.
    link: Option<Arc<L>>,
    /// The idempotency key for per-user setup.
    initialized_for: Option<UserId>,
    /// The task reading the current link and running reconnection.
    driver: Option<JoinHandle<()>>,
}

impl<C: Connector> Inner<C> {
    fn notify(&self, event: &ConnectionEvent) {
        for observer in &self.observers {
            observer.on_event(event);
        }
    }

    /// Returns the open link, or opens one and starts a driver for it.
    ///
    /// Explicit callers only. The driver never calls this, since it would
    /// abort itself.
    async fn ensure_link(
        self: Arc<Self>,
        state: &mut LinkState<C::Link>,
    ) -> Result<Arc<C::Link>, RealtimeError> {
        if let Some(link) = &state.link {
            return Ok(Arc::clone(link));
        }

        // A driver still sleeping in backoff, or one that gave up.
        if let Some(stale) = state.driver.take() {
            stale.abort();
        }

        self.status.send_replace(LinkStatus::Connecting);
        let link = match self.connector.connect(&self.config.endpoint).await {
            Ok(link) => Arc::new(link),
            Err(e) => {
                self.connect_failed(&e);
                self.status.send_replace(LinkStatus::Disconnected);
                return Err(e.into());
            }
        };

        self.install(state, Arc::clone(&link), true).await;
        let driver = tokio::spawn(Arc::clone(&self).drive(Arc::clone(&link)));
        state.driver = Some(driver);
        Ok(link)
    }

    /// Makes `link` the current link and, if asked, re-binds it to the
    /// user the previous link was bound to.
    async fn install(
        &self,
        state: &mut LinkState<C::Link>,
        link: Arc<C::Link>,
        rebind: bool,
    ) {
        state.link = Some(Arc::clone(&link));
        self.status.send_replace(LinkStatus::Connected);
        self.notify(&ConnectionEvent::Connect { link: link.id() });

        if let (true, Some(user_id)) = (rebind, &state.initialized_for) {
            match self.send_setup(link.as_ref(), user_id).await {
                Ok(()) => tracing::info!(%user_id, "re-sent realtime setup on new link"),
                Err(e) => tracing::warn!(
                    %user_id,
                    error = %e,
                    "failed to re-send realtime setup on new link"
                ),
            }
        }
    }

    async fn send_setup(
        &self,
        link: &C::Link,
        user_id: &UserId,
    ) -> Result<(), RealtimeError> {
        for event in ClientEvent::setup_for(user_id) {
            self.send_event(link, &event).await?;
        }
        Ok(())
    }

    async fn send_event(
        &self,
        link: &C::Link,
        event: &ClientEvent,
    ) -> Result<(), RealtimeError> {
        let bytes = self.codec.encode(event)?;
        link.send(&bytes).await?;
        tracing::debug!(event = event.name(), link = %link.id(), "emitted event");
        Ok(())
    }

    fn connect_failed(&self, error: &TransportError) {
        self.notify(&ConnectionEvent::ConnectError {
            message: error.to_string(),
        });
    }

    /// Background task: reads the link until it dies, then reconnects.
    ///
    /// Keeps running across reconnects (the same task drives each new
    /// link) and exits when reconnection gives up, or when teardown or an
    /// explicit connect replaces the link underneath it.
    async fn drive(self: Arc<Self>, mut link: Arc<C::Link>) {
        loop {
            let reason = self.pump(link.as_ref()).await;

            {
                let mut state = self.state.lock().await;
                let still_current = state
                    .link
                    .as_ref()
                    .is_some_and(|current| Arc::ptr_eq(current, &link));
                if !still_current {
                    // Torn down or replaced by an explicit connect.
                    return;
                }
                state.link = None;
            }
            self.status.send_replace(LinkStatus::Disconnected);
            self.notify(&ConnectionEvent::Disconnect { reason });

            let next = if reason == DisconnectReason::ServerDisconnect {
                self.reconnect_once().await
            } else if self.config.reconnection && reason.uses_reconnect_policy() {
                self.reconnect_with_backoff().await
            } else {
                None
            };

            match next {
                Some(new_link) => link = new_link,
                None => return,
            }
        }
    }

    /// Reads frames off `link` and fans them out until the link ends.
    async fn pump(&self, link: &C::Link) -> DisconnectReason {
        loop {
            match link.recv().await {
                Ok(Some(bytes)) => match self.codec.decode::<EventFrame>(&bytes) {
                    Ok(frame) => {
                        tracing::debug!(event = %frame.event, "received event");
                        // No subscribers is fine.
                        let _ = self.incoming.send(frame);
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "dropping undecodable frame");
                    }
                },
                Ok(None) => return DisconnectReason::ServerDisconnect,
                Err(TransportError::LinkClosed(_)) => {
                    return DisconnectReason::TransportClose;
                }
                Err(e) => {
                    tracing::debug!(error = %e, "link receive failed");
                    return DisconnectReason::TransportError;
                }
            }
        }
    }

    /// One immediate reconnect after a server-initiated close.
    async fn reconnect_once(&self) -> Option<Arc<C::Link>> {
        tracing::info!("server closed the link, reconnecting once");

        let mut state = self.state.lock().await;
        if state.link.is_some() {
            return None;
        }

        self.status.send_replace(LinkStatus::Connecting);
        match self.connector.connect(&self.config.endpoint).await {
            Ok(link) => {
                let link = Arc::new(link);
                self.install(
                    &mut state,
                    Arc::clone(&link),
                    self.config.reauthenticate_on_reconnect,
                )
                .await;
                Some(link)
            }
            Err(e) => {
                self.connect_failed(&e);
                self.status.send_replace(LinkStatus::Disconnected);
                None
            }
        }
    }

    /// Automatic reconnection under the backoff policy.
    async fn reconnect_with_backoff(&self) -> Option<Arc<C::Link>> {
        let mut backoff = Backoff::new(&self.config);

        while let Some(delay) = backoff.next_delay() {
            let attempt = backoff.attempts();
            {
                let state = self.state.lock().await;
                if state.link.is_some() {
                    return None;
                }
                self.status.send_replace(LinkStatus::Reconnecting { attempt });
            }
            tokio::time::sleep(delay).await;

            let mut state = self.state.lock().await;
            if state.link.is_some() {
                return None;
            }

            self.notify(&ConnectionEvent::ReconnectAttempt { attempt });
            match self.connector.connect(&self.config.endpoint).await {
                Ok(link) => {
                    let link = Arc::new(link);
                    self.install(
                        &mut state,
                        Arc::clone(&link),
                        self.config.reauthenticate_on_reconnect,
                    )
                    .await;
                    self.notify(&ConnectionEvent::Reconnect { attempts: attempt });
                    return Some(link);
                }
                Err(e) => self.connect_failed(&e),
            }
        }

        let state = self.state.lock().await;
        if state.link.is_none() {
            self.status.send_replace(LinkStatus::Failed);
            self.notify(&ConnectionEvent::ReconnectFailed);
        }
        None
    }
}
