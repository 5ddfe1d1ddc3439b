//! The event channel.
//!
//! [`EventChannel`] owns the single live connection of a client process.
//! Widgets subscribe to topics and read the connection status; the channel
//! runs one session task per `connect()` that opens the transport, pumps
//! inbound events into the dispatcher, and retries after loss.

use crate::reconnect::ReconnectPolicy;
use crate::session::Session;
use radar_core::{
    Activity, ConnectionState, ConnectionStatus, Dispatcher, DispatcherStats, Envelope,
    Notification, RegistryStats, StatsUpdate, Subscription, SubscriptionRegistry, StatusCell,
    Topic,
};
use radar_protocol::Frame;
use radar_transport::{Connector, Endpoint};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Event channel settings.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Live endpoint.
    pub endpoint: Endpoint,
    /// Retry policy after a failed or lost connection.
    pub reconnect: ReconnectPolicy,
    /// Time allowed for one connect attempt.
    pub connect_timeout: Duration,
    /// Silence after which an open connection is treated as lost. `None`
    /// trusts the transport to report drops.
    pub heartbeat_timeout: Option<Duration>,
}

impl ChannelConfig {
    /// Settings with the default retry policy, a 10 s connect timeout and a
    /// 60 s heartbeat timeout.
    #[must_use]
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            reconnect: ReconnectPolicy::default(),
            connect_timeout: Duration::from_secs(10),
            heartbeat_timeout: Some(Duration::from_secs(60)),
        }
    }
}

/// Instructions from the channel to its session task.
#[derive(Debug)]
pub(crate) enum Command {
    Send(Frame),
    Shutdown,
}

pub(crate) struct SessionHandle {
    pub(crate) generation: u64,
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

pub(crate) struct Inner {
    pub(crate) config: ChannelConfig,
    pub(crate) connector: Arc<dyn Connector>,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) status: StatusCell,
    pub(crate) session: Mutex<Option<SessionHandle>>,
    generations: AtomicU64,
}

impl Inner {
    pub(crate) fn session(&self) -> MutexGuard<'_, Option<SessionHandle>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Detach the running session, if any, and tell it to close.
    fn stop_session(&self) -> Option<u64> {
        let handle = {
            let mut session = self.session();
            let handle = session.take();
            self.status.set(ConnectionState::Disconnected);
            self.status.reset_attempts();
            handle
        }?;

        // A finished task has already dropped its receiver.
        let _ = handle.commands.send(Command::Shutdown);
        crate::metrics::record_disconnected();
        Some(handle.generation)
    }
}

/// Shared by every clone of an [`EventChannel`].
///
/// The session task holds `Inner` but never `Shared`, so dropping the last
/// channel handle runs `Drop` here and ends the session.
struct Shared {
    inner: Arc<Inner>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Some(generation) = self.inner.stop_session() {
            debug!(generation, "Last channel handle dropped, session stopped");
        }
    }
}

/// Handle to the live event channel.
///
/// Cheap to clone; all clones share one connection, one registry and one
/// status. Dropping the last clone closes the connection.
#[derive(Clone)]
pub struct EventChannel {
    shared: Arc<Shared>,
}

impl EventChannel {
    /// Create a disconnected channel.
    #[must_use]
    pub fn create(config: ChannelConfig, connector: Arc<dyn Connector>) -> Self {
        info!(endpoint = %config.endpoint, transport = connector.name(), "Event channel created");
        let inner = Arc::new(Inner {
            config,
            connector,
            dispatcher: Dispatcher::new(SubscriptionRegistry::new()),
            status: StatusCell::new(),
            session: Mutex::new(None),
            generations: AtomicU64::new(0),
        });
        Self {
            shared: Arc::new(Shared { inner }),
        }
    }

    fn inner(&self) -> &Arc<Inner> {
        &self.shared.inner
    }

    /// Open the live connection with `token`.
    ///
    /// Does nothing while a session is already running, whatever its token.
    /// After the retry budget ran out, starts a fresh session. Must be called
    /// within a tokio runtime.
    pub fn connect(&self, token: impl Into<String>) {
        let mut session = self.inner().session();

        if let Some(handle) = session.as_ref() {
            if !handle.task.is_finished() {
                debug!(generation = handle.generation, "Session already running, ignoring connect");
                return;
            }
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                error!(error = %e, "connect() called outside a tokio runtime");
                return;
            }
        };

        let generation = self.inner().generations.fetch_add(1, Ordering::Relaxed) + 1;
        let (commands, rx) = mpsc::unbounded_channel();

        self.inner().status.reset_attempts();
        self.inner().status.set(ConnectionState::Connecting);

        // The task takes the session lock before touching state, so it
        // observes the handle stored below.
        let task = runtime.spawn(Session::new(self.inner().clone(), generation, token.into(), rx).run());
        *session = Some(SessionHandle {
            generation,
            commands,
            task,
        });

        info!(generation, endpoint = %self.inner().config.endpoint, "Connecting");
    }

    /// Close the live connection and cancel any pending retry.
    ///
    /// Idempotent. Afterwards the status reads disconnected with zero
    /// attempts and `connect()` starts fresh.
    pub fn disconnect(&self) {
        if let Some(generation) = self.inner().stop_session() {
            info!(generation, "Disconnected");
        }
    }

    /// Disconnect and drop every subscription.
    pub fn dispose(&self) {
        self.disconnect();
        self.inner().dispatcher.registry().clear();
        debug!("Event channel disposed");
    }

    /// Current connection status.
    #[must_use]
    pub fn connection_status(&self) -> ConnectionStatus {
        self.inner().status.status()
    }

    /// Whether the live connection is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner().status.state().is_connected()
    }

    /// Receive connection state changes.
    #[must_use]
    pub fn watch_status(&self) -> watch::Receiver<ConnectionState> {
        self.inner().status.watch()
    }

    /// Register a listener for every envelope on `topic`.
    pub fn subscribe<F>(&self, topic: Topic, callback: F) -> Subscription
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        self.inner().dispatcher.registry().subscribe(topic, callback)
    }

    /// Register a listener for activity messages.
    ///
    /// The callback receives the activity and the message name
    /// (`new_activity` or `activity_update`). Payloads that are not valid
    /// activities are logged and skipped.
    pub fn subscribe_activities<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Activity, &str) + Send + Sync + 'static,
    {
        self.subscribe(Topic::Activity, move |envelope| {
            match envelope.decode::<Activity>() {
                Ok(activity) => callback(activity, &envelope.name),
                Err(e) => warn!(envelope = envelope.id, error = %e, "Skipping malformed activity"),
            }
        })
    }

    /// Register a listener for notifications.
    pub fn subscribe_notifications<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Notification) + Send + Sync + 'static,
    {
        self.subscribe(Topic::Notification, move |envelope| {
            match envelope.decode::<Notification>() {
                Ok(notification) => callback(notification),
                Err(e) => {
                    warn!(envelope = envelope.id, error = %e, "Skipping malformed notification")
                }
            }
        })
    }

    /// Register a listener for stats updates.
    pub fn subscribe_stats<F>(&self, callback: F) -> Subscription
    where
        F: Fn(StatsUpdate) + Send + Sync + 'static,
    {
        self.subscribe(Topic::Stats, move |envelope| {
            if let Some(update) = StatsUpdate::from_envelope(envelope) {
                callback(update);
            }
        })
    }

    /// Ask the server to add this connection to `room`.
    ///
    /// Dropped with a debug log while not connected.
    pub fn join_room(&self, room: &str) {
        self.send(Frame::join(room));
    }

    /// Ask the server to remove this connection from `room`.
    ///
    /// Dropped with a debug log while not connected.
    pub fn leave_room(&self, room: &str) {
        self.send(Frame::leave(room));
    }

    fn send(&self, frame: Frame) {
        if !self.is_connected() {
            debug!(frame = ?frame.frame_type(), "Not connected, dropping outbound frame");
            return;
        }
        let session = self.inner().session();
        if let Some(handle) = session.as_ref() {
            let _ = handle.commands.send(Command::Send(frame));
        }
    }

    /// Registry counters.
    #[must_use]
    pub fn registry_stats(&self) -> RegistryStats {
        self.inner().dispatcher.registry().stats()
    }

    /// Dispatcher counters.
    #[must_use]
    pub fn dispatcher_stats(&self) -> DispatcherStats {
        self.inner().dispatcher.stats()
    }

    /// Endpoint this channel connects to.
    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.inner().config.endpoint
    }
}

impl std::fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventChannel")
            .field("endpoint", &self.inner().config.endpoint.to_string())
            .field("status", &self.connection_status())
            .finish()
    }
}
