//! Command/event boundary between a front end and a [`Session`].
//!
//! A GUI button handler must never block on network I/O. Instead it hands a
//! [`Command`] to the [`Controller`], whose worker task owns the current session and
//! reports back through [`Event`]s the UI drains on its own schedule.
//!
//! # Example
//!
//! ```no_run
//! use ws_chat_session::controller::{Controller, Event};
//! use ws_chat_session::ws::Config;
//!
//! # async fn example() -> ws_chat_session::Result<()> {
//! let (controller, mut events) = Controller::spawn(Config::default());
//!
//! controller.connect("127.0.0.1", "9487")?;
//! controller.send("hello")?;
//!
//! while let Some(event) = events.recv().await {
//!     if let Event::Received { text } = event {
//!         println!("server replied: {text}");
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;
use std::error::Error as StdError;
use std::fmt;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::Result;
use crate::error::{Error, Failure, Kind};
use crate::ws::{Config, Session, SessionState};

/// Requests a front end can issue.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Open a session to `ws://host:port{path}`, closing any current one first
    Connect { host: String, port: String },
    /// Send a message and wait for its reply
    Send(String),
    /// Close the current session
    Disconnect,
}

/// Outcomes reported back to the front end, in the order they happened.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Connected {
        endpoint: String,
    },
    Sent {
        text: String,
    },
    Received {
        text: String,
    },
    Failed {
        failure: Failure,
    },
    /// The session ended, either on request or after a fatal failure
    Disconnected {
        requested: bool,
    },
}

/// The controller's worker task is no longer running.
#[non_exhaustive]
#[derive(Debug)]
pub struct WorkerStopped;

impl fmt::Display for WorkerStopped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "controller worker has stopped")
    }
}

impl StdError for WorkerStopped {}

/// Handle for issuing [`Command`]s to a background worker that owns the session.
///
/// Commands are processed one at a time in the order they were issued, except that a
/// [`Command::Disconnect`] abandons a reply still being waited for. A reply that does not
/// arrive in time closes the session, so a late answer is never paired with the next
/// message. Dropping the controller closes any open session and stops the worker.
#[derive(Debug, Clone)]
pub struct Controller {
    commands: mpsc::UnboundedSender<Command>,
}

impl Controller {
    /// Spawn the worker on the current tokio runtime.
    #[must_use]
    pub fn spawn(config: Config) -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let worker = Worker {
            config,
            events: events_tx,
            session: None,
            deferred: VecDeque::new(),
        };
        tokio::spawn(worker.run(commands_rx));

        (
            Self {
                commands: commands_tx,
            },
            events_rx,
        )
    }

    pub fn connect<H: Into<String>, P: Into<String>>(&self, host: H, port: P) -> Result<()> {
        self.dispatch(Command::Connect {
            host: host.into(),
            port: port.into(),
        })
    }

    pub fn send<S: Into<String>>(&self, text: S) -> Result<()> {
        self.dispatch(Command::Send(text.into()))
    }

    pub fn disconnect(&self) -> Result<()> {
        self.dispatch(Command::Disconnect)
    }

    pub fn dispatch(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_e| Error::with_source(Kind::Internal, WorkerStopped))
    }
}

struct Worker {
    config: Config,
    events: mpsc::UnboundedSender<Event>,
    session: Option<Session>,
    /// Commands that arrived while a reply was pending
    deferred: VecDeque<Command>,
}

impl Worker {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        loop {
            let command = match self.deferred.pop_front() {
                Some(command) => command,
                None => match commands.recv().await {
                    Some(command) => command,
                    None => break,
                },
            };

            #[cfg(feature = "tracing")]
            tracing::debug!(?command, "Handling command");

            match command {
                Command::Connect { host, port } => self.connect(&host, &port).await,
                Command::Send(text) => self.send(text, &mut commands).await,
                Command::Disconnect => self.disconnect().await,
            }
        }

        if let Some(session) = self.session.take()
            && let Err(e) = session.close().await
        {
            #[cfg(feature = "tracing")]
            tracing::warn!(error = %e, "Error closing session on shutdown");
            #[cfg(not(feature = "tracing"))]
            let _ = &e;
        }
    }

    async fn connect(&mut self, host: &str, port: &str) {
        if self.session.is_some() {
            self.disconnect().await;
        }

        match Session::connect(host, port, self.config.clone()).await {
            Ok(session) => {
                self.emit(Event::Connected {
                    endpoint: session.endpoint().to_string(),
                });
                self.session = Some(session);
            }
            Err(e) => self.fail(&e),
        }
    }

    async fn send(&mut self, text: String, commands: &mut mpsc::UnboundedReceiver<Command>) {
        let Some(session) = self.session.clone() else {
            self.fail(&Error::not_connected(SessionState::Idle));
            return;
        };

        if let Err(e) = session.send(&text).await {
            self.fail(&e);
            self.drop_if_closed(&session);
            return;
        }
        self.emit(Event::Sent { text });

        let Some(reply) = self.await_reply(&session, commands).await else {
            self.disconnect().await;
            return;
        };

        match reply {
            Ok(reply) => self.emit(Event::Received { text: reply }),
            Err(e) => {
                self.fail(&e);
                if e.kind() == Kind::Timeout {
                    // A late reply would otherwise answer the next message
                    self.close_quietly(&session).await;
                }
                self.drop_if_closed(&session);
            }
        }
    }

    /// Wait for the reply to the message just sent. Returns `None` when a
    /// [`Command::Disconnect`] arrives first; other commands are deferred.
    async fn await_reply(
        &mut self,
        session: &Session,
        commands: &mut mpsc::UnboundedReceiver<Command>,
    ) -> Option<Result<String>> {
        let receive = session.receive();
        tokio::pin!(receive);

        loop {
            tokio::select! {
                reply = &mut receive => return Some(reply),
                Some(command) = commands.recv() => match command {
                    Command::Disconnect => return None,
                    command => self.deferred.push_back(command),
                },
            }
        }
    }

    async fn close_quietly(&self, session: &Session) {
        if let Err(e) = session.close().await {
            #[cfg(feature = "tracing")]
            tracing::debug!(error = %e, "Error closing session after reply timeout");
            #[cfg(not(feature = "tracing"))]
            let _ = &e;
        }
    }

    async fn disconnect(&mut self) {
        if let Some(session) = self.session.take()
            && let Err(e) = session.close().await
        {
            self.fail(&e);
        }
        self.emit(Event::Disconnected { requested: true });
    }

    fn drop_if_closed(&mut self, session: &Session) {
        if session.state().is_closed() {
            self.session = None;
            self.emit(Event::Disconnected { requested: false });
        }
    }

    fn fail(&self, error: &Error) {
        self.emit(Event::Failed {
            failure: Failure::from(error),
        });
    }

    fn emit(&self, event: Event) {
        // The front end may have stopped listening
        _ = self.events.send(event);
    }
}
