//! Reconnection supervisor for one resource.
//!
//! Wraps a [`Session`] with failure detection and a fixed-interval retry,
//! and publishes the resulting [`ConnectionStatus`] on a watch channel.

use std::sync::Arc;
use std::time::Duration;

use appwatch_types::{current_timestamp_ms, CollectorType, MonitoredResource};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::data::duration::format_duration;
use crate::data::{decode_value, MetricStore};
use crate::error::StreamError;
use crate::source::{CredentialSource, SharedTransport, StaticToken};

use super::session::{Session, SessionEvent};
use super::status::{ConnectionStatus, SupervisorState};

/// Delay between a lost connection and the next attempt.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Message shown while the supervisor is waiting to reconnect.
pub const CONNECTION_LOST: &str = "connection lost, retrying";

/// Keeps one resource's stream alive until stopped.
///
/// Retries forever at a fixed interval. Metric history survives reconnects;
/// only the connection status changes. Dropping the supervisor stops it.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use appwatch::source::ChannelTransport;
/// use appwatch::stream::{Supervisor, SupervisorState};
///
/// # tokio_test::block_on(async {
/// let transport = ChannelTransport::new("memory");
/// let supervisor = Supervisor::builder(Arc::new(transport.clone()))
///     .start("app-1", "ec2")
///     .unwrap();
///
/// assert_eq!(supervisor.status().state, SupervisorState::Connecting);
/// supervisor.stop();
/// assert_eq!(supervisor.status().state, SupervisorState::Closed);
/// # });
/// ```
#[derive(Debug)]
pub struct Supervisor {
    shared: Arc<Shared>,
    driver: JoinHandle<()>,
    seeder: Option<JoinHandle<()>>,
}

struct Shared {
    transport: SharedTransport,
    credentials: Arc<dyn CredentialSource>,
    store: Arc<MetricStore>,
    retry_delay: Duration,
    status: watch::Sender<ConnectionStatus>,
    events: mpsc::UnboundedSender<SessionEvent>,
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    closed: bool,
    session: Option<Session>,
    next_id: u64,
}

impl Inner {
    fn is_current(&self, session: u64) -> bool {
        self.session.as_ref().map(Session::id) == Some(session)
    }
}

impl std::fmt::Debug for Shared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shared")
            .field("resource_id", &self.store.resource_id())
            .field("transport", &self.transport.description())
            .field("retry_delay", &self.retry_delay)
            .field("status", &*self.status.borrow())
            .finish()
    }
}

impl Supervisor {
    pub fn builder(transport: SharedTransport) -> SupervisorBuilder {
        SupervisorBuilder::new(transport)
    }

    pub fn resource_id(&self) -> &str {
        self.shared.store.resource_id()
    }

    pub fn collector_type(&self) -> CollectorType {
        self.shared.store.collector_type()
    }

    /// The resource's snapshot and history.
    pub fn store(&self) -> Arc<MetricStore> {
        self.shared.store.clone()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.shared.status.borrow().clone()
    }

    /// Receiver notified on every status change.
    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.shared.status.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.inner.lock().closed
    }

    /// Shut down for good.
    ///
    /// Disposes the active session and cancels any pending retry. Safe to
    /// call in any state and more than once. Nothing touches the store or
    /// the status after this returns.
    pub fn stop(&self) {
        {
            let mut inner = self.shared.inner.lock();
            if inner.closed {
                return;
            }
            inner.closed = true;
            if let Some(session) = inner.session.take() {
                session.dispose();
            }
            self.shared
                .status
                .send_replace(ConnectionStatus::new(SupervisorState::Closed));
        }

        self.driver.abort();
        if let Some(seeder) = &self.seeder {
            seeder.abort();
        }
        info!(resource_id = %self.resource_id(), "stopped watching resource");
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Shared {
    /// Open a fresh session. Caller holds the inner lock and has checked
    /// that the supervisor is not closed.
    fn open_session(&self, inner: &mut Inner) -> Result<(), StreamError> {
        let id = inner.next_id;
        inner.next_id += 1;

        let token = self.credentials.current_token();
        let session = Session::open(
            id,
            self.transport.as_ref(),
            token,
            self.store.clone(),
            self.events.clone(),
        )?;
        inner.session = Some(session);
        Ok(())
    }

    fn resource_id(&self) -> &str {
        self.store.resource_id()
    }

    /// Mark the stream live once the current session confirms.
    fn on_live(&self, session: u64) {
        let inner = self.inner.lock();
        if inner.closed || !inner.is_current(session) {
            return;
        }
        self.status.send_modify(|status| {
            status.state = SupervisorState::Live;
            status.error = None;
            status.attempt = 0;
        });
    }

    /// Dispose a dead session and enter `Reconnecting`.
    ///
    /// Returns the attempt number, or `None` when the event is stale.
    fn on_terminated(&self, session: u64) -> Option<u32> {
        let mut inner = self.inner.lock();
        if inner.closed || !inner.is_current(session) {
            return None;
        }
        if let Some(dead) = inner.session.take() {
            dead.dispose();
        }

        let mut attempt = 0;
        self.status.send_modify(|status| {
            status.state = SupervisorState::Reconnecting;
            status.error = Some(CONNECTION_LOST.to_string());
            status.attempt += 1;
            attempt = status.attempt;
        });
        Some(attempt)
    }

    /// Open the next session after the retry delay. Returns false once the
    /// supervisor has been stopped.
    fn reconnect(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.closed {
            return false;
        }
        if inner.session.is_some() {
            return true;
        }

        debug!(resource_id = %self.resource_id(), "reconnecting");
        if let Err(e) = self.open_session(&mut inner) {
            error!(resource_id = %self.resource_id(), error = %e, "failed to reopen metrics stream");
            return false;
        }
        true
    }
}

/// Handle session lifecycle events until the supervisor is stopped.
async fn drive(shared: Arc<Shared>, mut events: mpsc::UnboundedReceiver<SessionEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::Live { session } => shared.on_live(session),
            SessionEvent::Terminated { session, error } => {
                let Some(attempt) = shared.on_terminated(session) else {
                    continue;
                };
                warn!(
                    resource_id = %shared.resource_id(),
                    attempt,
                    error = %error,
                    retry_in = %format_duration(shared.retry_delay),
                    "connection lost, retrying"
                );

                tokio::time::sleep(shared.retry_delay).await;
                if !shared.reconnect() {
                    return;
                }
            }
        }
    }
}

/// Fill the store from the backend's last reading so charts are not blank
/// while the stream warms up.
async fn seed(shared: Arc<Shared>) {
    let resource_id = shared.resource_id().to_string();
    let token = shared.credentials.current_token();

    let record = match shared.transport.latest_metrics(&resource_id, token.as_deref()).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            debug!(resource_id = %resource_id, "no stored metrics to seed from");
            return;
        }
        Err(e) => {
            debug!(resource_id = %resource_id, error = %e, "could not fetch latest metrics");
            return;
        }
    };

    let snapshot = match decode_value(shared.store.collector_type(), &record) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            debug!(resource_id = %resource_id, error = %e, "ignoring unreadable latest metrics");
            return;
        }
    };

    let inner = shared.inner.lock();
    if inner.closed {
        return;
    }
    if shared.store.seed(snapshot, current_timestamp_ms()) {
        debug!(resource_id = %resource_id, "seeded from latest metrics");
    }
}

/// Builder for [`Supervisor`].
pub struct SupervisorBuilder {
    transport: SharedTransport,
    credentials: Arc<dyn CredentialSource>,
    retry_delay: Duration,
    history_capacity: usize,
    seed: bool,
}

impl SupervisorBuilder {
    pub fn new(transport: SharedTransport) -> Self {
        Self {
            transport,
            credentials: Arc::new(StaticToken::none()),
            retry_delay: DEFAULT_RETRY_DELAY,
            history_capacity: appwatch_types::DEFAULT_HISTORY_CAPACITY,
            seed: true,
        }
    }

    /// Set the delay between a lost connection and the next attempt.
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Set how many points each chart keeps.
    pub fn history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    /// Set where bearer tokens come from. Asked again on every reconnect.
    pub fn credentials(mut self, credentials: impl CredentialSource + 'static) -> Self {
        self.credentials = Arc::new(credentials);
        self
    }

    /// Share an existing credential source.
    pub fn shared_credentials(mut self, credentials: Arc<dyn CredentialSource>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Whether to seed from the backend's latest reading (default: true).
    pub fn seed(mut self, enabled: bool) -> Self {
        self.seed = enabled;
        self
    }

    /// Start watching a resource whose collector type is given as text.
    ///
    /// Accepts canonical names and the `ec2`/`s3`/`lambda` aliases.
    pub fn start(self, resource_id: &str, collector: &str) -> Result<Supervisor, StreamError> {
        let collector: CollectorType = collector.parse()?;
        self.start_typed(resource_id, collector)
    }

    /// Start watching a resource described by its metadata.
    pub fn start_resource(self, resource: &MonitoredResource) -> Result<Supervisor, StreamError> {
        self.start_typed(&resource.id, resource.collector_type)
    }

    /// Start watching a resource. Must be called inside a tokio runtime.
    pub fn start_typed(
        self,
        resource_id: &str,
        collector: CollectorType,
    ) -> Result<Supervisor, StreamError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| StreamError::NoRuntime)?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (status, _) = watch::channel(ConnectionStatus::default());
        let shared = Arc::new(Shared {
            transport: self.transport,
            credentials: self.credentials,
            store: Arc::new(MetricStore::new(resource_id, collector, self.history_capacity)),
            retry_delay: self.retry_delay,
            status,
            events: events_tx,
            inner: Mutex::new(Inner::default()),
        });

        info!(
            resource_id = %resource_id,
            collector = %collector,
            transport = shared.transport.description(),
            "watching resource"
        );

        {
            let mut inner = shared.inner.lock();
            shared
                .status
                .send_replace(ConnectionStatus::new(SupervisorState::Connecting));
            shared.open_session(&mut inner)?;
        }

        let driver = runtime.spawn(drive(shared.clone(), events_rx));
        let seeder = self.seed.then(|| runtime.spawn(seed(shared.clone())));

        Ok(Supervisor {
            shared,
            driver,
            seeder,
        })
    }
}

impl std::fmt::Debug for SupervisorBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupervisorBuilder")
            .field("transport", &self.transport.description())
            .field("retry_delay", &self.retry_delay)
            .field("history_capacity", &self.history_capacity)
            .field("seed", &self.seed)
            .finish()
    }
}
