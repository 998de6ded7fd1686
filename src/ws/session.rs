#![expect(
    clippy::module_name_repetitions,
    reason = "Session types expose their domain in the name for clarity"
)]

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt as _, StreamExt as _};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, MutexGuard, watch};
use tokio::time::{self, timeout, timeout_at};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::config::Config;
use super::endpoint::Endpoint;
use super::error::WsError;
use crate::Result;
use crate::error::{Error, Failure, Kind, Timeout};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Session lifecycle: `Idle → Open → Closed`. `Closed` is terminal.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum SessionState {
    /// Created, no connection attempted yet
    Idle,
    /// Connected and usable
    Open {
        /// When the connection was established
        since: Instant,
    },
    /// Closed explicitly or after a fatal failure; a new session is required
    Closed,
}

impl SessionState {
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open { .. })
    }

    #[must_use]
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// Operations a session performs, used to label timeouts and busy errors.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Operation {
    Connect,
    Send,
    Receive,
    Close,
}

/// One WebSocket connection's lifetime.
///
/// A `Session` is a cheap handle; clones share the same connection. The connection is
/// split into a write half and a read half that are locked independently, so a pending
/// [`receive`](Self::receive) never blocks a [`send`](Self::send). Within each half,
/// operations are serialized:
/// - a second concurrent `send` (or `receive`) fails with [`Kind::Busy`]
/// - [`close`](Self::close) waits for an in-flight write and wakes a pending receive
///
/// Any fatal transport failure moves the session to [`SessionState::Closed`] and
/// records the failure as [`last_error`](Self::last_error).
///
/// # Example
///
/// ```no_run
/// use ws_chat_session::ws::{Config, Session};
///
/// # async fn example() -> ws_chat_session::Result<()> {
/// let session = Session::connect("127.0.0.1", "9487", Config::default()).await?;
///
/// let reply = session.send_and_receive("hello").await?;
/// println!("server replied: {reply}");
///
/// session.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

struct Inner {
    id: Uuid,
    endpoint: Endpoint,
    config: Config,
    /// Watch channel sender for state changes
    state_tx: watch::Sender<SessionState>,
    writer: Mutex<Option<WsSink>>,
    reader: Mutex<Option<WsSource>>,
    sending: AtomicBool,
    receiving: AtomicBool,
    /// Cancelled once the session is closed, waking any pending receive
    shutdown: CancellationToken,
    last_error: RwLock<Option<Failure>>,
}

impl Session {
    /// Create an idle session for `endpoint`. No I/O happens until [`open`](Self::open).
    #[must_use]
    pub fn new(endpoint: Endpoint, config: Config) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Idle);

        Self {
            inner: Arc::new(Inner {
                id: Uuid::now_v7(),
                endpoint,
                config,
                state_tx,
                writer: Mutex::new(None),
                reader: Mutex::new(None),
                sending: AtomicBool::new(false),
                receiving: AtomicBool::new(false),
                shutdown: CancellationToken::new(),
                last_error: RwLock::new(None),
            }),
        }
    }

    /// Validate `host` and `port`, then open a session to `ws://host:port{config.path}`.
    ///
    /// A single attempt is made within `config.timeout`; retrying is up to the caller.
    pub async fn connect(host: &str, port: &str, config: Config) -> Result<Self> {
        let endpoint = Endpoint::parse(host, port, &config.path)?;
        let session = Self::new(endpoint, config);
        session.open().await?;

        Ok(session)
    }

    /// Open the connection. Only valid on an [`Idle`](SessionState::Idle) session.
    ///
    /// On failure the session becomes `Closed` and the error kind is
    /// [`Kind::Connection`], including when the attempt times out.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            level = "debug",
            skip(self),
            fields(session_id = %self.inner.id, endpoint = %self.inner.endpoint)
        )
    )]
    pub async fn open(&self) -> Result<()> {
        let inner = &self.inner;
        let mut writer = inner.writer.lock().await;

        let state = inner.state();
        if !matches!(state, SessionState::Idle) {
            return Err(Error::validation(format!(
                "session cannot be opened from state {state}, create a new session"
            )));
        }

        let attempt = timeout(
            inner.config.timeout,
            connect_async(inner.endpoint.url().as_str()),
        )
        .await;

        let stream = match attempt {
            Ok(Ok((stream, _response))) => stream,
            Ok(Err(e)) => {
                return Err(inner.fail(Error::with_source(
                    Kind::Connection,
                    WsError::Handshake(e),
                )));
            }
            Err(_elapsed) => {
                return Err(inner.fail(Error::with_source(
                    Kind::Connection,
                    Timeout {
                        operation: Operation::Connect,
                        after: inner.config.timeout,
                    },
                )));
            }
        };

        let (sink, source) = stream.split();
        *inner.reader.lock().await = Some(source);
        *writer = Some(sink);

        inner.state_tx.send_if_modified(|state| {
            if matches!(state, SessionState::Idle) {
                *state = SessionState::Open {
                    since: Instant::now(),
                };
                true
            } else {
                false
            }
        });

        #[cfg(feature = "tracing")]
        tracing::debug!("Session opened");

        Ok(())
    }

    /// Send one text message.
    ///
    /// Fails with [`Kind::NotConnected`] unless the session is open, [`Kind::Busy`] if
    /// another send is in flight, and [`Kind::Timeout`] after `config.timeout`. A
    /// timeout that interrupts a partially written frame closes the session.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            level = "debug",
            skip(self, message),
            fields(session_id = %self.inner.id, len = message.len())
        )
    )]
    pub async fn send(&self, message: &str) -> Result<()> {
        let deadline = time::Instant::now() + self.inner.config.timeout;
        self.send_until(message, deadline).await
    }

    /// Wait for exactly one inbound text message.
    ///
    /// Ping and pong frames are skipped. A timeout leaves the session open; a peer
    /// close or transport error closes it and fails with [`Kind::Receive`].
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "debug", skip(self), fields(session_id = %self.inner.id))
    )]
    pub async fn receive(&self) -> Result<String> {
        let deadline = time::Instant::now() + self.inner.config.timeout;
        self.receive_until(deadline).await
    }

    /// Send `message` and wait for one reply, both within a single `config.timeout` window.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            level = "debug",
            skip(self, message),
            fields(session_id = %self.inner.id, len = message.len())
        )
    )]
    pub async fn send_and_receive(&self, message: &str) -> Result<String> {
        let deadline = time::Instant::now() + self.inner.config.timeout;
        self.send_until(message, deadline).await?;
        self.receive_until(deadline).await
    }

    /// Send a normal-closure frame and release the connection.
    ///
    /// Idempotent: closing a closed (or never opened) session is a no-op. The session is
    /// `Closed` and the connection released when this returns, even if sending the close
    /// frame failed; that failure is still returned so the caller can report it.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "debug", skip(self), fields(session_id = %self.inner.id))
    )]
    pub async fn close(&self) -> Result<()> {
        let inner = &self.inner;

        let sink = {
            let mut writer = inner.writer.lock().await;
            inner.mark_closed();
            writer.take()
        };
        let source = inner.reader.lock().await.take();

        match sink {
            Some(sink) => inner.close_gracefully(sink, source).await,
            None => Ok(()),
        }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.inner.endpoint
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the current session state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.inner.state()
    }

    /// Subscribe to session state changes, e.g. to drive a status label.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<SessionState> {
        self.inner.state_tx.subscribe()
    }

    /// The most recent fatal failure, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<Failure> {
        self.inner
            .last_error
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn send_until(&self, message: &str, deadline: time::Instant) -> Result<()> {
        let inner = &self.inner;
        inner.ensure_open()?;
        if message.is_empty() {
            return Err(Error::validation("message must not be empty"));
        }

        let _in_flight = InFlight::acquire(&inner.sending, Operation::Send)?;

        let frame = Message::Text(message.to_owned().into());
        let outcome = timeout_at(deadline, inner.write(frame)).await;
        let result = match outcome {
            Ok(result) => result,
            Err(_elapsed) => {
                let error = Error::timeout(Operation::Send, inner.config.timeout);
                if inner.state().is_closed() {
                    // The write was cut off mid-frame
                    inner.record(&error);
                }
                Err(error)
            }
        };

        if result.is_err() && inner.state().is_closed() {
            inner.release();
        }
        result
    }

    async fn receive_until(&self, deadline: time::Instant) -> Result<String> {
        let inner = &self.inner;
        inner.ensure_open()?;

        let _in_flight = InFlight::acquire(&inner.receiving, Operation::Receive)?;

        let result = tokio::select! {
            biased;

            () = inner.shutdown.cancelled() => Err(Error::not_connected(inner.state())),

            outcome = timeout_at(deadline, inner.read()) => match outcome {
                Ok(result) => result,
                Err(_elapsed) => Err(Error::timeout(Operation::Receive, inner.config.timeout)),
            },
        };

        if result.is_err() && inner.state().is_closed() {
            inner.release();
        }
        result
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("endpoint", &self.inner.endpoint.url().as_str())
            .field("state", &self.inner.state())
            .finish_non_exhaustive()
    }
}

impl Inner {
    fn state(&self) -> SessionState {
        *self.state_tx.borrow()
    }

    fn ensure_open(&self) -> Result<()> {
        let state = self.state();
        if state.is_open() {
            Ok(())
        } else {
            Err(Error::not_connected(state))
        }
    }

    async fn write(&self, message: Message) -> Result<()> {
        let slot = self.writer.lock().await;
        let mut pending = PendingWrite::arm(self, slot)?;
        pending.send(message).await
    }

    async fn read(&self) -> Result<String> {
        let mut slot = self.reader.lock().await;
        let Some(source) = slot.as_mut() else {
            return Err(Error::not_connected(self.state()));
        };

        let error = loop {
            match source.next().await {
                Some(Ok(Message::Text(text))) => {
                    #[cfg(feature = "tracing")]
                    tracing::trace!(%text, "Received WebSocket text message");
                    return Ok(text.to_string());
                }
                Some(Ok(Message::Binary(bytes))) => {
                    return String::from_utf8(bytes.to_vec()).map_err(|e| {
                        Error::with_source(
                            Kind::Receive,
                            WsError::InvalidMessage(format!("binary frame is not UTF-8: {e}")),
                        )
                    });
                }
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = match frame {
                        Some(frame) => (Some(u16::from(frame.code)), frame.reason.to_string()),
                        None => (None, String::new()),
                    };
                    break WsError::ConnectionClosed { code, reason };
                }
                Some(Ok(_)) => {
                    // Ping, pong and raw frames are handled by the protocol layer
                }
                Some(Err(e)) => break WsError::Transport(e),
                None => {
                    break WsError::ConnectionClosed {
                        code: None,
                        reason: String::new(),
                    };
                }
            }
        };

        slot.take();
        Err(self.fail(Error::with_source(Kind::Receive, error)))
    }

    async fn close_gracefully(&self, mut sink: WsSink, source: Option<WsSource>) -> Result<()> {
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: self.config.close_reason.clone().into(),
        };

        let result = match timeout(self.config.timeout, sink.send(Message::Close(Some(frame))))
            .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(Error::with_source(Kind::Send, WsError::Transport(e))),
            Err(_elapsed) => Err(Error::timeout(Operation::Close, self.config.timeout)),
        };

        if result.is_ok()
            && let Some(mut source) = source
        {
            // Wait for the peer to echo the close frame
            let drained = timeout(self.config.close_timeout, async {
                while let Some(Ok(message)) = source.next().await {
                    if message.is_close() {
                        break;
                    }
                }
            })
            .await;

            if drained.is_err() {
                #[cfg(feature = "tracing")]
                tracing::debug!("Peer did not answer the close frame in time");
            }
        }

        if let Err(e) = &result {
            #[cfg(feature = "tracing")]
            tracing::warn!(error = %e, "Error sending close frame");
            #[cfg(not(feature = "tracing"))]
            let _ = &e;
        }

        result
    }

    /// Record `error`, close the session and hand the error back.
    fn fail(&self, error: Error) -> Error {
        #[cfg(feature = "tracing")]
        tracing::warn!(session_id = %self.id, error = %error, "Session failed");

        self.record(&error);
        self.mark_closed();
        error
    }

    fn record(&self, error: &Error) {
        *self
            .last_error
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Failure::from(error));
    }

    fn mark_closed(&self) {
        self.state_tx.send_if_modified(|state| {
            if state.is_closed() {
                false
            } else {
                *state = SessionState::Closed;
                true
            }
        });
        self.shutdown.cancel();
    }

    /// Drop whatever connection halves are not in use. A half still held by a stalled
    /// operation is left to that operation, which sees the closed state when it ends.
    fn release(&self) {
        if let Ok(mut writer) = self.writer.try_lock() {
            writer.take();
        }
        if let Ok(mut reader) = self.reader.try_lock() {
            reader.take();
        }
    }
}

/// Write access to the connection that closes the session if dropped before the
/// write finished, so a partially written frame is never followed by another one.
struct PendingWrite<'session> {
    inner: &'session Inner,
    slot: MutexGuard<'session, Option<WsSink>>,
    armed: bool,
}

impl<'session> PendingWrite<'session> {
    fn arm(
        inner: &'session Inner,
        slot: MutexGuard<'session, Option<WsSink>>,
    ) -> Result<Self> {
        if slot.is_none() {
            return Err(Error::not_connected(inner.state()));
        }

        Ok(Self {
            inner,
            slot,
            armed: true,
        })
    }

    async fn send(&mut self, message: Message) -> Result<()> {
        let Some(sink) = self.slot.as_mut() else {
            return Err(Error::not_connected(self.inner.state()));
        };

        let result = sink.send(message).await;
        self.armed = false;

        match result {
            Ok(()) => Ok(()),
            Err(e) => {
                self.slot.take();
                Err(self
                    .inner
                    .fail(Error::with_source(Kind::Send, WsError::Transport(e))))
            }
        }
    }
}

impl Drop for PendingWrite<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        self.slot.take();
        self.inner
            .fail(Error::with_source(Kind::Send, WsError::Interrupted));
        if let Ok(mut reader) = self.inner.reader.try_lock() {
            reader.take();
        }
    }
}

/// Marks one operation kind as in flight for as long as it is held.
#[derive(Debug)]
struct InFlight<'flag>(&'flag AtomicBool);

impl<'flag> InFlight<'flag> {
    fn acquire(flag: &'flag AtomicBool, operation: Operation) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_in_flight| Error::busy(operation))?;

        Ok(Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
