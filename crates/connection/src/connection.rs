//! One authenticated channel to one hub.
//!
//! A [`Connection`] is a cheap handle; clones share the socket, the id
//! counter, the pending-request table and the subscriptions. All of that
//! lives behind a single lock, which is what keeps ids unique and frames in
//! call order.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use halink_protocol::{Command, SubscribeEventsRequest, SubscribeTriggerRequest, codec};

use crate::correlator::{Outcome, PendingRequests};
use crate::error::ConnectionError;
use crate::inbound::LinkHandle;
use crate::pumps::read::read_pump;
use crate::pumps::write::write_pump;
use crate::subscriptions::{EventCallback, SubscriptionRegistry};
use crate::transport::{Dialer, FrameSink, FrameStream};
use crate::types::{ConnectionConfig, ConnectionState, normalize_hub_url};

/// Capacity of the channel feeding a socket's write pump, on top of room
/// for a full flush of the outbound queue.
const WRITE_CHANNEL_CAPACITY: usize = 256;

pub(crate) type ConnectOutcome = Result<(), ConnectionError>;

/// Handle to a hub connection.
///
/// Nothing happens on construction; the socket is opened by the first
/// [`connect`](Self::connect) or command.
#[derive(Clone)]
pub struct Connection {
    pub(crate) inner: Arc<ConnectionInner>,
}

pub(crate) struct ConnectionInner {
    pub(crate) hub_url: String,
    pub(crate) credential: String,
    pub(crate) config: ConnectionConfig,
    dialer: Dialer,
    pub(crate) state: Mutex<Shared>,
}

/// Mutable connection state, guarded by `ConnectionInner::state`.
pub(crate) struct Shared {
    pub(crate) phase: ConnectionState,
    pub(crate) link: Option<Link>,
    next_link: u64,
    pub(crate) next_id: u64,
    pub(crate) outbound: VecDeque<QueuedFrame>,
    pub(crate) pending: PendingRequests,
    pub(crate) subscriptions: SubscriptionRegistry,
    pub(crate) reconnect_attempts: u32,
    pub(crate) reconnect_cancel: Option<CancellationToken>,
    attempt: Option<ConnectAttempt>,
    next_attempt: u64,
    pub(crate) ha_version: Option<String>,
}

/// The live socket: its write channel and the token that stops both pumps.
pub(crate) struct Link {
    pub(crate) epoch: u64,
    pub(crate) write_tx: mpsc::Sender<tungstenite::Message>,
    cancel: CancellationToken,
}

/// An encoded command waiting for authentication.
pub(crate) struct QueuedFrame {
    pub(crate) id: u64,
    pub(crate) text: String,
}

/// The in-flight connect every caller of `connect` waits on.
struct ConnectAttempt {
    seq: u64,
    outcome: watch::Sender<Option<ConnectOutcome>>,
}

impl Shared {
    fn new(config: &ConnectionConfig) -> Self {
        Self {
            phase: ConnectionState::Disconnected,
            link: None,
            next_link: 0,
            next_id: 1,
            outbound: VecDeque::new(),
            pending: PendingRequests::default(),
            subscriptions: SubscriptionRegistry::new(config.event_buffer),
            reconnect_attempts: 0,
            reconnect_cancel: None,
            attempt: None,
            next_attempt: 0,
            ha_version: None,
        }
    }

    /// Whether `epoch` names the current socket.
    pub(crate) fn link_is(&self, epoch: u64) -> bool {
        self.link.as_ref().is_some_and(|link| link.epoch == epoch)
    }

    fn attempt_is(&self, seq: u64) -> bool {
        self.attempt.as_ref().is_some_and(|attempt| attempt.seq == seq)
    }

    /// Stops both pumps of the current socket, if any.
    pub(crate) fn drop_link(&mut self) {
        if let Some(link) = self.link.take() {
            link.cancel.cancel();
        }
    }

    /// Publishes the outcome of the in-flight connect to every waiter.
    pub(crate) fn settle_attempt(&mut self, outcome: ConnectOutcome) {
        if let Some(attempt) = self.attempt.take() {
            attempt.outcome.send_replace(Some(outcome));
        }
    }

    /// Whether commands can go straight to the socket instead of the queue.
    fn can_write(&self) -> bool {
        self.phase == ConnectionState::Authenticated && self.link.is_some()
    }
}

impl Link {
    /// Hands a frame to the write pump without waiting.
    ///
    /// A full channel means the socket cannot keep up: the link is cancelled
    /// and its closure fails whatever is still pending.
    pub(crate) fn push(&self, frame: tungstenite::Message) -> bool {
        match self.write_tx.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(epoch = self.epoch, "write channel full, dropping link");
                self.cancel.cancel();
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

impl Connection {
    /// Creates a connection with default settings.
    pub fn new(hub_url: &str, credential: impl Into<String>) -> Self {
        Self::with_config(hub_url, credential, ConnectionConfig::default())
    }

    pub fn with_config(
        hub_url: &str,
        credential: impl Into<String>,
        config: ConnectionConfig,
    ) -> Self {
        Self::build(hub_url, credential.into(), config, Dialer::WebSocket)
    }

    pub(crate) fn build(
        hub_url: &str,
        credential: String,
        config: ConnectionConfig,
        dialer: Dialer,
    ) -> Self {
        let state = Mutex::new(Shared::new(&config));
        Self {
            inner: Arc::new(ConnectionInner {
                hub_url: normalize_hub_url(hub_url),
                credential,
                config,
                dialer,
                state,
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<ConnectionInner>) -> Self {
        Self { inner }
    }

    /// Hub base URL, normalized (no trailing slash).
    pub fn hub_url(&self) -> &str {
        &self.inner.hub_url
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    /// Whether both handles refer to the same underlying connection.
    pub fn ptr_eq(&self, other: &Connection) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub async fn state(&self) -> ConnectionState {
        self.inner.state.lock().await.phase
    }

    /// True only while the socket is open and the hub has accepted the credential.
    pub async fn is_connected(&self) -> bool {
        let st = self.inner.state.lock().await;
        st.phase == ConnectionState::Authenticated && st.link.is_some()
    }

    /// Hub version reported during the last successful handshake.
    pub async fn ha_version(&self) -> Option<String> {
        self.inner.state.lock().await.ha_version.clone()
    }

    /// Commands still waiting for their result.
    pub async fn pending_requests(&self) -> usize {
        self.inner.state.lock().await.pending.len()
    }

    pub async fn subscription_count(&self) -> usize {
        self.inner.state.lock().await.subscriptions.len()
    }

    /// Opens the socket and authenticates.
    ///
    /// Returns at once when already authenticated. Concurrent callers share
    /// a single attempt and all see its outcome.
    pub async fn connect(&self) -> Result<(), ConnectionError> {
        let mut settled = {
            let mut st = self.inner.state.lock().await;
            if st.phase == ConnectionState::Authenticated {
                return Ok(());
            }
            match &st.attempt {
                Some(attempt) => attempt.outcome.subscribe(),
                None => self.inner.begin_attempt(&mut st),
            }
        };

        let outcome = settled
            .wait_for(Option::is_some)
            .await
            .map_err(|_| ConnectionError::Disconnected)?
            .clone();
        outcome.unwrap_or(Err(ConnectionError::Disconnected))
    }

    /// Closes the connection for good.
    ///
    /// Stops any reconnect loop, closes the socket, fails every pending
    /// command with [`ConnectionError::Disconnected`] and drops all
    /// subscriptions. A later `connect` starts over.
    pub async fn disconnect(&self) {
        let mut st = self.inner.state.lock().await;
        if let Some(cancel) = st.reconnect_cancel.take() {
            cancel.cancel();
        }
        st.phase = ConnectionState::Closing;
        st.drop_link();
        st.settle_attempt(Err(ConnectionError::Disconnected));

        let failed = st.pending.fail_all(ConnectionError::Disconnected);
        let dropped = st.outbound.len();
        st.outbound.clear();
        let subscriptions = st.subscriptions.clear();

        st.phase = ConnectionState::Disconnected;
        st.reconnect_attempts = 0;
        debug!(
            hub = %self.inner.hub_url,
            failed,
            dropped,
            subscriptions,
            "disconnected"
        );
    }

    /// Sends a command and waits for its result with the configured timeout.
    pub async fn send_command(&self, command: Command) -> Result<Value, ConnectionError> {
        self.send_command_with_timeout(command, self.inner.config.command_timeout)
            .await
    }

    /// Sends a command and waits up to `timeout` for its result.
    pub async fn send_command_with_timeout(
        &self,
        command: Command,
        timeout: Duration,
    ) -> Result<Value, ConnectionError> {
        self.connect().await?;
        let (id, waiter) = self.inner.submit(&command, None).await?;
        self.inner.await_outcome(id, waiter, timeout).await
    }

    /// Subscribes to bus events, all of them when `event_type` is `None`.
    ///
    /// The callback is registered before the request is sent, so events
    /// that race ahead of the acknowledgement are not lost. Returns the
    /// subscription id used to unsubscribe.
    pub async fn subscribe_events(
        &self,
        event_type: Option<&str>,
        callback: impl Fn(Value) + Send + Sync + 'static,
    ) -> Result<u64, ConnectionError> {
        let command = Command::SubscribeEvents(SubscribeEventsRequest {
            event_type: event_type.map(str::to_string),
        });
        self.subscribe(command, Box::new(callback)).await
    }

    /// Subscribes to an automation trigger; the callback receives each firing.
    pub async fn subscribe_trigger(
        &self,
        trigger: Value,
        callback: impl Fn(Value) + Send + Sync + 'static,
    ) -> Result<u64, ConnectionError> {
        let command = Command::SubscribeTrigger(SubscribeTriggerRequest { trigger });
        self.subscribe(command, Box::new(callback)).await
    }

    async fn subscribe(
        &self,
        command: Command,
        callback: EventCallback,
    ) -> Result<u64, ConnectionError> {
        self.connect().await?;
        let (id, waiter) = self.inner.submit(&command, Some(callback)).await?;
        let timeout = self.inner.config.command_timeout;
        match self.inner.await_outcome(id, waiter, timeout).await {
            Ok(_) => {
                debug!(hub = %self.inner.hub_url, id, kind = command.message_type(), "subscribed");
                Ok(id)
            }
            Err(err) => {
                self.inner.state.lock().await.subscriptions.remove(id);
                Err(err)
            }
        }
    }

    /// Drops the local callback, then asks the hub to stop sending.
    ///
    /// The callback is gone even if the hub's reply is an error.
    pub async fn unsubscribe_events(&self, subscription: u64) -> Result<(), ConnectionError> {
        let removed = self.inner.state.lock().await.subscriptions.remove(subscription);
        trace!(subscription, removed, "unsubscribing");
        self.send_command(Command::UnsubscribeEvents(
            halink_protocol::UnsubscribeEventsRequest { subscription },
        ))
        .await?;
        Ok(())
    }

    /// Trigger subscriptions are cancelled the same way as event ones.
    pub async fn unsubscribe_trigger(&self, subscription: u64) -> Result<(), ConnectionError> {
        self.unsubscribe_events(subscription).await
    }
}

impl ConnectionInner {
    /// Starts a connect attempt. Caller holds the state lock and has checked
    /// that none is in flight.
    fn begin_attempt(
        self: &Arc<Self>,
        st: &mut Shared,
    ) -> watch::Receiver<Option<ConnectOutcome>> {
        st.next_attempt += 1;
        let seq = st.next_attempt;
        let (outcome, settled) = watch::channel(None);
        st.drop_link();
        st.attempt = Some(ConnectAttempt { seq, outcome });
        st.phase = ConnectionState::Connecting;
        debug!(hub = %self.hub_url, seq, "connecting");

        tokio::spawn(establish(self.clone(), seq, settled.clone()));
        settled
    }

    /// Wires a freshly opened socket into the connection. Returns `false`
    /// when the attempt was abandoned meanwhile; the halves are dropped.
    async fn attach(self: &Arc<Self>, seq: u64, write: FrameSink, read: FrameStream) -> bool {
        let mut st = self.state.lock().await;
        if !st.attempt_is(seq) {
            debug!(hub = %self.hub_url, seq, "socket opened for an abandoned attempt");
            return false;
        }

        st.drop_link();
        st.next_link += 1;
        let epoch = st.next_link;
        let capacity = WRITE_CHANNEL_CAPACITY + self.config.max_queued_messages;
        let (write_tx, write_rx) = mpsc::channel(capacity);
        let cancel = CancellationToken::new();

        tokio::spawn(write_pump(
            write,
            write_rx,
            self.config.ping_period,
            cancel.clone(),
        ));
        tokio::spawn(read_pump(
            read,
            LinkHandle::new(self, epoch),
            write_tx.clone(),
            self.config.read_idle_timeout,
            cancel.clone(),
        ));

        st.link = Some(Link {
            epoch,
            write_tx,
            cancel,
        });
        debug!(hub = %self.hub_url, epoch, "socket open, awaiting auth_required");
        true
    }

    /// Fails attempt `seq` unless it has already been settled or replaced.
    async fn abandon_attempt(&self, seq: u64, err: ConnectionError) {
        let mut st = self.state.lock().await;
        if !st.attempt_is(seq) {
            return;
        }
        st.drop_link();
        st.phase = ConnectionState::Disconnected;
        warn!(hub = %self.hub_url, error = %err, "connect failed");
        st.settle_attempt(Err(err));
    }

    /// Assigns the next id and either writes the frame or queues it until
    /// authentication. With `on_event`, the subscription is registered under
    /// the same id before anything is sent.
    pub(crate) async fn submit(
        &self,
        command: &Command,
        on_event: Option<EventCallback>,
    ) -> Result<(u64, oneshot::Receiver<Outcome>), ConnectionError> {
        let mut st = self.state.lock().await;
        let id = st.next_id;
        st.next_id += 1;
        let text = codec::encode_command(id, command)?;

        let direct = st.can_write();
        if !direct && st.outbound.len() >= self.config.max_queued_messages {
            warn!(hub = %self.hub_url, id, queued = st.outbound.len(), "outbound queue full");
            return Err(ConnectionError::QueueFull(st.outbound.len()));
        }

        let waiter = st.pending.register(id);
        if let Some(callback) = on_event {
            st.subscriptions.register(id, callback);
        }

        if direct {
            trace!(id, kind = command.message_type(), "sending command");
            let frame = tungstenite::Message::Text(text.into());
            if !st.link.as_ref().is_some_and(|link| link.push(frame)) {
                // The socket is going down; its closure fails this command.
                debug!(id, "write pump gone");
            }
        } else {
            trace!(id, kind = command.message_type(), "queueing command until authenticated");
            st.outbound.push_back(QueuedFrame { id, text });
        }
        Ok((id, waiter))
    }

    /// Waits for the result of command `id`.
    ///
    /// On timeout the entry and any still-queued frame are removed; a
    /// result that landed in the same instant wins over the timeout.
    pub(crate) async fn await_outcome(
        &self,
        id: u64,
        mut waiter: oneshot::Receiver<Outcome>,
        timeout: Duration,
    ) -> Result<Value, ConnectionError> {
        match tokio::time::timeout(timeout, &mut waiter).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(ConnectionError::Disconnected),
            Err(_) => {
                let mut st = self.state.lock().await;
                if st.pending.cancel(id) {
                    st.outbound.retain(|frame| frame.id != id);
                    warn!(hub = %self.hub_url, id, "command timed out");
                    return Err(ConnectionError::CommandTimeout);
                }
                drop(st);
                waiter.try_recv().unwrap_or(Err(ConnectionError::CommandTimeout))
            }
        }
    }
}

impl Drop for ConnectionInner {
    fn drop(&mut self) {
        let st = self.state.get_mut();
        if let Some(cancel) = st.reconnect_cancel.take() {
            cancel.cancel();
        }
        st.drop_link();
    }
}

/// Dials, attaches the socket and waits for the handshake, all within the
/// connect timeout.
async fn establish(
    inner: Arc<ConnectionInner>,
    seq: u64,
    mut settled: watch::Receiver<Option<ConnectOutcome>>,
) {
    let deadline = Instant::now() + inner.config.connect_timeout;
    let dial = inner.dialer.dial(&inner.hub_url, inner.config.max_message_size);
    let (write, read) = match tokio::time::timeout_at(deadline, dial).await {
        Ok(Ok(halves)) => halves,
        Ok(Err(err)) => {
            inner.abandon_attempt(seq, err).await;
            return;
        }
        Err(_) => {
            inner.abandon_attempt(seq, ConnectionError::ConnectTimeout).await;
            return;
        }
    };

    if !inner.attach(seq, write, read).await {
        return;
    }

    let handshake = tokio::time::timeout_at(deadline, settled.wait_for(Option::is_some));
    let timed_out = handshake.await.is_err();
    if timed_out {
        inner.abandon_attempt(seq, ConnectionError::ConnectTimeout).await;
    }
}
