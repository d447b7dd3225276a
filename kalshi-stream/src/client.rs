//! Kalshi WebSocket client for real-time streaming
//!
//! One [`StreamClient`] owns one logical session across any number of
//! physical connections. Two background tasks run per session: the read
//! loop (parse, correlate, route, reconnect) and the keepalive loop. Both
//! stop on a shared cancellation token.
//!
//! Authentication: signed `KALSHI-ACCESS-*` headers on the upgrade request.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex as SyncMutex, RwLock};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, timeout, MissedTickBehavior};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::{self, Message as Frame};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use kalshi_core::{Channel, Command, ConnectionState, KalshiError, KalshiResult, Message, Params};

use crate::backoff;
use crate::config::ClientOptions;
use crate::pending::PendingResponses;
use crate::router::{MessageHandler, MessageRouter};
use crate::subscription::{Subscription, SubscriptionManager};

/// Keepalive ids start here, far above anything the subscription counter reaches
pub const PING_ID_BASE: u64 = 1 << 48;

/// Called for every recoverable failure (read, parse, dispatch, ping, reconnect)
pub type ErrorCallback = Arc<dyn Fn(&KalshiError) + Send + Sync>;

/// Called after the session has reconnected and restored its subscriptions
pub type ReconnectCallback = Arc<dyn Fn() + Send + Sync>;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, Frame>;
type WsReader = SplitStream<WsStream>;

/// Kalshi streaming client
pub struct StreamClient {
    shared: Arc<Shared>,
    /// Session token, created by `connect`, cancelled by `close`
    cancel: SyncMutex<Option<CancellationToken>>,
    tasks: Mutex<Option<BackgroundTasks>>,
    closed: AtomicBool,
}

struct BackgroundTasks {
    reader: JoinHandle<()>,
    keepalive: JoinHandle<()>,
}

impl BackgroundTasks {
    async fn join(self) {
        if let Err(e) = self.reader.await {
            warn!("[Kalshi WS] Read loop ended abnormally: {}", e);
        }
        if let Err(e) = self.keepalive.await {
            warn!("[Kalshi WS] Keepalive loop ended abnormally: {}", e);
        }
    }
}

/// State touched by both the caller and the background tasks
struct Shared {
    options: ClientOptions,
    state: AtomicU8,
    writer: Mutex<Option<WsWriter>>,
    subscriptions: SubscriptionManager,
    router: MessageRouter,
    pending: PendingResponses,
    next_ping_id: AtomicU64,
    on_error: RwLock<Option<ErrorCallback>>,
    on_reconnect: RwLock<Option<ReconnectCallback>>,
}

impl StreamClient {
    /// Create a client. Nothing is validated or dialed until `connect`.
    pub fn new(options: ClientOptions) -> Self {
        Self {
            shared: Arc::new(Shared {
                options,
                state: AtomicU8::new(ConnectionState::Disconnected.as_u8()),
                writer: Mutex::new(None),
                subscriptions: SubscriptionManager::new(),
                router: MessageRouter::new(),
                pending: PendingResponses::new(),
                next_ping_id: AtomicU64::new(PING_ID_BASE),
                on_error: RwLock::new(None),
                on_reconnect: RwLock::new(None),
            }),
            cancel: SyncMutex::new(None),
            tasks: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// Validate options, open and authenticate the transport, and start the
    /// background tasks
    pub async fn connect(&self) -> KalshiResult<()> {
        self.connect_with_cancel(&CancellationToken::new()).await
    }

    /// Like [`connect`](Self::connect), bound to a caller token
    ///
    /// Cancelling `parent` aborts an in-flight connect and stops the
    /// background tasks of an established session. A session stopped that
    /// way can be connected again; its tracked subscriptions are re-sent.
    pub async fn connect_with_cancel(&self, parent: &CancellationToken) -> KalshiResult<()> {
        self.shared.options.validate()?;

        let mut tasks = self.tasks.lock().await;
        if self.closed.load(Ordering::SeqCst) {
            return Err(KalshiError::Closed);
        }
        if tasks.is_some() && self.session_cancelled() {
            if let Some(stale) = tasks.take() {
                stale.join().await;
                debug!("[Kalshi WS] Reaped session stopped by its caller");
            }
        }
        if tasks.is_some() {
            return Err(KalshiError::config("Client is already connected"));
        }

        let cancel = parent.child_token();
        *self.cancel.lock() = Some(cancel.clone());

        let dialed = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(KalshiError::Cancelled),
            result = self.shared.dial() => result,
        };
        let dialed = match dialed {
            Ok(reader) => self.shared.restore_subscriptions().await.map(|()| reader),
            Err(e) => Err(e),
        };
        let reader = match dialed {
            Ok(reader) => reader,
            Err(e) => {
                error!("[Kalshi WS] Connect failed: {}", e);
                self.cancel.lock().take();
                self.shared.teardown_transport().await;
                return Err(e);
            }
        };
        self.shared.set_state(ConnectionState::Connected);
        info!("[Kalshi WS] Connected to {}", self.shared.options.url);

        *tasks = Some(BackgroundTasks {
            reader: tokio::spawn(Shared::run_reader(
                Arc::clone(&self.shared),
                reader,
                cancel.clone(),
            )),
            keepalive: tokio::spawn(Shared::run_keepalive(Arc::clone(&self.shared), cancel)),
        });
        Ok(())
    }

    /// Subscribe to `channel` without waiting for the server's reply
    ///
    /// Returns the id of the subscribe command.
    pub async fn subscribe(&self, channel: Channel, params: Params) -> KalshiResult<u64> {
        self.ensure_connected()?;
        let cmd = self.shared.subscriptions.subscribe(channel, params);
        self.shared.send_command(&cmd).await?;
        info!("[Kalshi WS] Subscribe {} sent (id: {})", channel, cmd.id);
        Ok(cmd.id)
    }

    /// Subscribe to `channel` and wait for the server's reply
    ///
    /// An `error` reply untracks the subscription and is returned as
    /// [`KalshiError::Server`].
    pub async fn subscribe_confirmed(&self, channel: Channel, params: Params) -> KalshiResult<Message> {
        self.ensure_connected()?;
        let cmd = self.shared.subscriptions.subscribe(channel, params);
        let reply = self.shared.request(&cmd).await?;
        if let Some(err) = reply.server_error() {
            self.shared.subscriptions.discard(channel, cmd.id);
            return Err(err);
        }
        info!("[Kalshi WS] Subscribed to {} (id: {}, sid: {:?})", channel, cmd.id, reply.sid);
        Ok(reply)
    }

    /// Unsubscribe from a tracked channel
    pub async fn unsubscribe(&self, channel: Channel) -> KalshiResult<()> {
        self.ensure_connected()?;
        let cmd = self.shared.subscriptions.unsubscribe(channel)?;
        self.shared.send_command(&cmd).await?;
        info!("[Kalshi WS] Unsubscribed from {} (id: {})", channel, cmd.id);
        Ok(())
    }

    /// Route messages for `channel` to `handler`, replacing any previous one
    pub fn register_handler<H>(&self, channel: Channel, handler: H)
    where
        H: MessageHandler + 'static,
    {
        self.shared.router.register(channel, handler);
    }

    pub fn unregister_handler(&self, channel: Channel) {
        self.shared.router.unregister(channel);
    }

    pub fn on_error<F>(&self, callback: F)
    where
        F: Fn(&KalshiError) + Send + Sync + 'static,
    {
        *self.shared.on_error.write() = Some(Arc::new(callback));
    }

    pub fn on_reconnect<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.shared.on_reconnect.write() = Some(Arc::new(callback));
    }

    /// Stop the session
    ///
    /// Idempotent and safe to call concurrently. Returns only after both
    /// background tasks have exited.
    pub async fn close(&self) {
        let first = !self.closed.swap(true, Ordering::SeqCst);
        self.cancel_session();
        self.shared
            .state
            .store(ConnectionState::Closed.as_u8(), Ordering::SeqCst);

        let mut tasks = self.tasks.lock().await;
        // A connect that won the lock before `closed` was set may have
        // installed a fresh token since.
        self.cancel_session();
        if let Some(tasks) = tasks.take() {
            tasks.join().await;
        }
        self.shared.teardown_transport().await;

        if first {
            info!("[Kalshi WS] Session closed");
        }
    }

    /// Last known transport state; a snapshot, not a guarantee
    pub fn is_connected(&self) -> bool {
        self.shared.is_connected()
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Copy of the tracked subscriptions
    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.shared.subscriptions.snapshot()
    }

    /// Whether the current session token was cancelled from outside
    fn session_cancelled(&self) -> bool {
        self.cancel
            .lock()
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    fn cancel_session(&self) {
        if let Some(cancel) = self.cancel.lock().take() {
            cancel.cancel();
        }
    }

    fn ensure_connected(&self) -> KalshiResult<()> {
        if self.shared.is_connected() {
            Ok(())
        } else if self.closed.load(Ordering::SeqCst) {
            Err(KalshiError::Closed)
        } else {
            Err(KalshiError::NotConnected)
        }
    }
}

impl Drop for StreamClient {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.get_mut().take() {
            cancel.cancel();
        }
    }
}

impl fmt::Debug for StreamClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamClient")
            .field("options", &self.shared.options)
            .field("state", &self.state())
            .finish()
    }
}

impl Shared {
    fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Move to `next` unless the session is already closed
    fn set_state(&self, next: ConnectionState) {
        let closed = ConnectionState::Closed.as_u8();
        let _ = self
            .state
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                (current != closed).then_some(next.as_u8())
            });
    }

    /// Open a signed transport and install its write half
    ///
    /// Leaves the state at `Authenticating` on success; the caller flips it
    /// to `Connected` once the session is ready for foreground traffic.
    async fn dial(&self) -> KalshiResult<WsReader> {
        self.set_state(ConnectionState::Authenticating);
        match self.open_transport().await {
            Ok(stream) => {
                let (writer, reader) = stream.split();
                *self.writer.lock().await = Some(writer);
                Ok(reader)
            }
            Err(e) => {
                self.set_state(ConnectionState::Disconnected);
                Err(e)
            }
        }
    }

    async fn open_transport(&self) -> KalshiResult<WsStream> {
        let options = &self.options;
        let credentials = options.fresh_credentials()?;

        let mut request = options
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| KalshiError::config(format!("Failed to build request: {}", e)))?;
        let headers = request.headers_mut();
        for (name, value) in credentials.headers() {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| KalshiError::config(format!("Invalid header name {}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| KalshiError::config(format!("Invalid {} header value: {}", name, e)))?;
            headers.insert(name, value);
        }

        debug!("[Kalshi WS] Connecting to {}", options.url);
        match timeout(options.connect_timeout, connect_async(request)).await {
            Err(_) => Err(KalshiError::timeout(format!(
                "Connecting to {} took longer than {:?}",
                options.url, options.connect_timeout
            ))),
            Ok(Err(e)) => Err(classify_connect_error(e)),
            Ok(Ok((stream, _response))) => Ok(stream),
        }
    }

    /// Drop the current transport: close the write half, fail pending waits
    async fn teardown_transport(&self) {
        self.set_state(ConnectionState::Disconnected);
        let writer = self.writer.lock().await.take();
        if let Some(mut writer) = writer {
            if let Ok(Err(e)) = timeout(self.options.write_timeout, writer.close()).await {
                debug!("[Kalshi WS] Close handshake failed: {}", e);
            }
        }
        self.pending.clear();
    }

    async fn send_command(&self, cmd: &Command) -> KalshiResult<()> {
        let json = cmd.to_json()?;
        debug!("[Kalshi WS] Sending {:?} (id: {})", cmd.cmd, cmd.id);
        self.send_frame(Frame::Text(json.into())).await
    }

    async fn send_frame(&self, frame: Frame) -> KalshiResult<()> {
        let mut writer = self.writer.lock().await;
        let sink = writer.as_mut().ok_or(KalshiError::NotConnected)?;
        match timeout(self.options.write_timeout, sink.send(frame)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(KalshiError::transport(format!("Write failed: {}", e))),
            Err(_) => Err(KalshiError::timeout(format!(
                "Write took longer than {:?}",
                self.options.write_timeout
            ))),
        }
    }

    /// Send `cmd` and wait for the frame carrying its id
    async fn request(&self, cmd: &Command) -> KalshiResult<Message> {
        let reply = self.pending.register(cmd.id);
        if let Err(e) = self.send_command(cmd).await {
            self.pending.cancel(cmd.id);
            return Err(e);
        }

        match timeout(self.options.reply_timeout, reply).await {
            Ok(Ok(message)) => Ok(message),
            Ok(Err(_)) => Err(KalshiError::transport(format!(
                "Connection lost before reply to command {}",
                cmd.id
            ))),
            Err(_) => {
                self.pending.cancel(cmd.id);
                Err(KalshiError::timeout(format!(
                    "No reply to command {} within {:?}",
                    cmd.id, self.options.reply_timeout
                )))
            }
        }
    }

    fn report(&self, err: &KalshiError) {
        warn!("[Kalshi WS] {}", err);
        let callback = self.on_error.read().clone();
        if let Some(callback) = callback {
            callback(err);
        }
    }

    fn notify_reconnect(&self) {
        let callback = self.on_reconnect.read().clone();
        if let Some(callback) = callback {
            callback();
        }
    }

    // ------------------------------------------------------------------------
    // Read loop
    // ------------------------------------------------------------------------

    async fn run_reader(shared: Arc<Shared>, mut reader: WsReader, cancel: CancellationToken) {
        loop {
            let Some(err) = shared.pump(&mut reader, &cancel).await else {
                break;
            };
            shared.teardown_transport().await;
            shared.report(&err);

            match shared.reconnect(&cancel).await {
                Some(next) => reader = next,
                None => break,
            }
        }
        shared.teardown_transport().await;
        debug!("[Kalshi WS] Read loop stopped");
    }

    /// Process frames until the connection fails (`Some`) or the session is
    /// cancelled (`None`)
    async fn pump(&self, reader: &mut WsReader, cancel: &CancellationToken) -> Option<KalshiError> {
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return None,
                next = timeout(self.options.read_timeout, reader.next()) => next,
            };

            let frame = match next {
                Err(_) => {
                    return Some(KalshiError::timeout(format!(
                        "No frame received for {:?}",
                        self.options.read_timeout
                    )))
                }
                Ok(None) => return Some(KalshiError::transport("Stream ended")),
                Ok(Some(Err(e))) => return Some(KalshiError::transport(format!("Read failed: {}", e))),
                Ok(Some(Ok(frame))) => frame,
            };

            match frame {
                Frame::Text(text) => self.handle_frame(Message::parse(text.as_str())),
                Frame::Binary(bytes) => self.handle_frame(Message::parse_slice(&bytes)),
                // tungstenite queues the pong and flushes it on the next read
                Frame::Ping(_) => debug!("[Kalshi WS] Ping from server"),
                Frame::Close(close) => {
                    let reason = close
                        .map(|c| format!("{} {}", c.code, c.reason.as_str()))
                        .unwrap_or_else(|| "no reason".to_string());
                    return Some(KalshiError::transport(format!(
                        "Connection closed by server ({})",
                        reason
                    )));
                }
                _ => {}
            }
        }
    }

    /// Replies go to their waiting slot; everything else is routed
    fn handle_frame(&self, parsed: KalshiResult<Message>) {
        let message = match parsed {
            Ok(message) => message,
            Err(e) => {
                self.report(&e);
                return;
            }
        };

        let message = match self.pending.complete(message) {
            Ok(()) => return,
            Err(message) => message,
        };

        if let Some(err) = message.server_error() {
            self.report(&err);
            return;
        }

        if let Err(e) = self.router.route(&message) {
            self.report(&e);
        }
    }

    /// Retry the connection until it succeeds or the session is cancelled
    async fn reconnect(&self, cancel: &CancellationToken) -> Option<WsReader> {
        let mut attempt: u32 = 0;
        loop {
            let wait = backoff::delay(
                attempt,
                self.options.reconnect_base_delay,
                self.options.reconnect_max_delay,
            );
            info!("[Kalshi WS] Reconnecting in {:?} (attempt {})", wait, attempt + 1);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return None,
                _ = sleep(wait) => {}
            }
            attempt = attempt.saturating_add(1);

            let dialed = tokio::select! {
                biased;
                _ = cancel.cancelled() => return None,
                result = self.dial() => result,
            };
            let reader = match dialed {
                Ok(reader) => reader,
                Err(e) => {
                    self.report(&e);
                    continue;
                }
            };
            match self.restore_subscriptions().await {
                Ok(()) => {
                    self.set_state(ConnectionState::Connected);
                    info!("[Kalshi WS] Reconnected after {} attempt(s)", attempt);
                    self.notify_reconnect();
                    return Some(reader);
                }
                Err(e) => {
                    self.report(&e);
                    self.teardown_transport().await;
                }
            }
        }
    }

    /// Re-send a subscribe for everything tracked before the drop
    ///
    /// Runs before the state returns to `Connected`, so no foreground
    /// subscribe can interleave with the snapshot/clear/restore sequence.
    /// A failed send leaves every entry tracked for the next attempt.
    async fn restore_subscriptions(&self) -> KalshiResult<()> {
        let snapshot = self.subscriptions.snapshot();
        self.subscriptions.clear();
        let commands = self.subscriptions.restore(snapshot);
        if commands.is_empty() {
            return Ok(());
        }

        info!("[Kalshi WS] Restoring {} subscription(s)", commands.len());
        for cmd in &commands {
            self.send_command(cmd).await?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Keepalive
    // ------------------------------------------------------------------------

    async fn run_keepalive(shared: Arc<Shared>, cancel: CancellationToken) {
        let mut ticker = interval(shared.options.ping_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if !shared.is_connected() {
                        continue;
                    }
                    let cmd = Command::ping(shared.next_ping_id.fetch_add(1, Ordering::SeqCst));
                    if let Err(e) = shared.send_command(&cmd).await {
                        shared.report(&e);
                    }
                }
            }
        }
        debug!("[Kalshi WS] Keepalive loop stopped");
    }
}

/// Map a failed upgrade to an auth error (401/403) or a transport error
fn classify_connect_error(err: tungstenite::Error) -> KalshiError {
    match err {
        tungstenite::Error::Http(response) => {
            let status = response.status();
            if matches!(status.as_u16(), 401 | 403) {
                KalshiError::auth(format!("Upgrade rejected with {}", status))
            } else {
                KalshiError::transport(format!("Upgrade rejected with {}", status))
            }
        }
        other => KalshiError::transport(format!("Connection failed: {}", other)),
    }
}
