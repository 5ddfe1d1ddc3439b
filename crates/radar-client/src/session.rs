//! The session task behind an [`EventChannel`](crate::EventChannel).
//!
//! One task runs per `connect()`. It owns the transport, pumps inbound
//! frames into the dispatcher and schedules retries. Every wait also listens
//! for commands, so `disconnect()` interrupts a pending connect or retry.
//! State is only written while the task's generation is still the current
//! session.

use crate::channel::{Command, Inner, SessionHandle};
use crate::metrics;
use radar_core::ConnectionState;
use radar_protocol::{Frame, PROTOCOL_VERSION};
use radar_transport::{Connection, TransportError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Upper bound on a graceful close.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Stand-in window when the heartbeat check is off.
const UNCHECKED: Duration = Duration::from_secs(24 * 60 * 60);

enum Opened {
    Connection(Box<dyn Connection>),
    Failed(TransportError),
    Shutdown,
}

enum Exit {
    Lost,
    Shutdown,
}

pub(crate) struct Session {
    inner: Arc<Inner>,
    generation: u64,
    token: String,
    commands: mpsc::UnboundedReceiver<Command>,
}

impl Session {
    pub(crate) fn new(
        inner: Arc<Inner>,
        generation: u64,
        token: String,
        commands: mpsc::UnboundedReceiver<Command>,
    ) -> Self {
        Self {
            inner,
            generation,
            token,
            commands,
        }
    }

    pub(crate) async fn run(mut self) {
        loop {
            match self.open().await {
                Opened::Shutdown => return,
                Opened::Failed(e) => {
                    warn!(generation = self.generation, error = %e, "Connection attempt failed");
                }
                Opened::Connection(mut conn) => {
                    if !self.mark_connected(&*conn) {
                        close_quietly(conn).await;
                        return;
                    }
                    match self.pump(&mut conn).await {
                        Exit::Shutdown => {
                            close_quietly(conn).await;
                            return;
                        }
                        Exit::Lost => metrics::record_disconnected(),
                    }
                }
            }

            if !self.wait_for_retry().await {
                return;
            }
        }
    }

    /// Whether this task is still the channel's session.
    fn is_current(&self, session: &Option<SessionHandle>) -> bool {
        session
            .as_ref()
            .map(|handle| handle.generation == self.generation)
            .unwrap_or(false)
    }

    async fn open(&mut self) -> Opened {
        let attempt = tokio::time::timeout(
            self.inner.config.connect_timeout,
            self.inner
                .connector
                .connect(&self.inner.config.endpoint, &self.token),
        );
        tokio::pin!(attempt);

        loop {
            tokio::select! {
                result = &mut attempt => {
                    return match result {
                        Ok(Ok(conn)) => Opened::Connection(conn),
                        Ok(Err(e)) => Opened::Failed(e),
                        Err(_) => Opened::Failed(TransportError::Timeout),
                    };
                }
                command = self.commands.recv() => match command {
                    Some(Command::Send(frame)) => {
                        debug!(frame = ?frame.frame_type(), "Not connected, dropping outbound frame");
                    }
                    Some(Command::Shutdown) | None => {
                        debug!(generation = self.generation, "Connect attempt cancelled");
                        return Opened::Shutdown;
                    }
                },
            }
        }
    }

    fn mark_connected(&self, conn: &dyn Connection) -> bool {
        {
            let session = self.inner.session();
            if !self.is_current(&session) {
                return false;
            }
            self.inner.status.reset_attempts();
            self.inner.status.set(ConnectionState::Connected);
        }
        metrics::record_connected();
        info!(
            generation = self.generation,
            connection = %conn.id(),
            endpoint = %self.inner.config.endpoint,
            "Connected"
        );
        true
    }

    async fn pump(&mut self, conn: &mut Box<dyn Connection>) -> Exit {
        let mut window = self.inner.config.heartbeat_timeout;
        let mut last_seen = Instant::now();
        let mut pinged = false;

        loop {
            // Disabled branches still build their sleep, so give them a
            // finite deadline.
            let silence = window.unwrap_or(UNCHECKED);
            let ping_at = last_seen + silence / 2;
            let deadline = last_seen + silence;

            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(Command::Send(frame)) => {
                        if let Err(e) = conn.send(frame).await {
                            warn!(connection = %conn.id(), error = %e, "Send failed");
                            return Exit::Lost;
                        }
                    }
                    Some(Command::Shutdown) | None => return Exit::Shutdown,
                },

                inbound = conn.recv() => {
                    last_seen = Instant::now();
                    pinged = false;
                    match inbound {
                        Ok(Some(Frame::Ping { timestamp })) => {
                            if let Err(e) = conn.send(Frame::pong(timestamp)).await {
                                warn!(connection = %conn.id(), error = %e, "Failed to answer ping");
                            }
                        }
                        Ok(Some(Frame::Connected { connection_id, version, heartbeat })) => {
                            if !PROTOCOL_VERSION.accepts_major(version) {
                                warn!(server_version = version, "Server speaks another protocol version");
                            }
                            if heartbeat > 0 {
                                let announced = Duration::from_millis(u64::from(heartbeat) * 2);
                                window = window.map(|w| w.max(announced));
                            }
                            debug!(
                                server_connection = %connection_id,
                                heartbeat,
                                window = ?window,
                                "Server confirmed connection"
                            );
                        }
                        Ok(Some(Frame::Pong { .. })) => {}
                        Ok(Some(Frame::Error { code, message })) => {
                            warn!(connection = %conn.id(), code, %message, "Server reported an error");
                        }
                        Ok(Some(frame)) => {
                            if let Some(outcome) = self.inner.dispatcher.dispatch_frame(frame) {
                                metrics::record_dispatch(&outcome);
                            }
                        }
                        Ok(None) => {
                            info!(connection = %conn.id(), "Connection closed by server");
                            return Exit::Lost;
                        }
                        Err(e) => {
                            warn!(connection = %conn.id(), error = %e, "Connection lost");
                            return Exit::Lost;
                        }
                    }
                }

                _ = tokio::time::sleep_until(ping_at), if window.is_some() && !pinged => {
                    pinged = true;
                    if let Err(e) = conn.send(Frame::ping()).await {
                        warn!(connection = %conn.id(), error = %e, "Failed to send keepalive");
                        return Exit::Lost;
                    }
                }

                _ = tokio::time::sleep_until(deadline), if window.is_some() => {
                    warn!(
                        connection = %conn.id(),
                        silent_ms = silence.as_millis() as u64,
                        "No traffic from server, treating connection as lost"
                    );
                    return Exit::Lost;
                }
            }
        }
    }

    /// Count a retry and sleep until it is due.
    ///
    /// Returns `false` when the session is over: superseded, cancelled, or
    /// out of attempts.
    async fn wait_for_retry(&mut self) -> bool {
        let policy = self.inner.config.reconnect;

        let attempt = {
            let mut session = self.inner.session();
            if !self.is_current(&session) {
                return false;
            }
            let attempts = self.inner.status.reconnect_attempts();
            if !policy.allows(attempts) {
                self.inner.status.set(ConnectionState::Disconnected);
                // Let the next connect() start a fresh session.
                *session = None;
                drop(session);
                warn!(
                    generation = self.generation,
                    attempts,
                    "Max reconnection attempts reached, giving up"
                );
                return false;
            }
            self.inner.status.set(ConnectionState::Connecting);
            self.inner.status.record_attempt()
        };

        metrics::record_reconnect_attempt();
        let delay = policy.delay(attempt);
        info!(
            attempt,
            max_attempts = policy.max_attempts,
            delay_ms = delay.as_millis() as u64,
            "Reconnecting"
        );

        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return true,
                command = self.commands.recv() => match command {
                    Some(Command::Send(frame)) => {
                        debug!(frame = ?frame.frame_type(), "Not connected, dropping outbound frame");
                    }
                    Some(Command::Shutdown) | None => {
                        debug!(generation = self.generation, "Pending reconnect cancelled");
                        return false;
                    }
                },
            }
        }
    }
}

async fn close_quietly(mut conn: Box<dyn Connection>) {
    match tokio::time::timeout(CLOSE_TIMEOUT, conn.close()).await {
        Ok(Ok(())) => debug!(connection = %conn.id(), "Connection closed"),
        Ok(Err(e)) => debug!(connection = %conn.id(), error = %e, "Close failed"),
        Err(_) => debug!(connection = %conn.id(), "Close timed out"),
    }
}
