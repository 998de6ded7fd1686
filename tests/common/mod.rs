#![allow(
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    reason = "Do not need additional syntax for setting up tests"
)]
#![allow(
    unused,
    reason = "Each test binary uses a different subset of these helpers"
)]

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt as _, StreamExt as _};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use ws_chat_session::ws::Config;

/// How the mock server answers text frames.
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    /// Reply with the same text
    Echo,
    /// Reply with the text behind a prefix, like the bundled echo server
    Reply(&'static str),
    /// Read and record frames but never reply
    Silent,
    /// Complete the handshake and then never read from the socket
    NoRead,
    /// Answer the first text frame with a close frame
    CloseOnMessage,
    /// Send a ping before echoing
    PingThenEcho,
    /// Answer with a binary frame holding the echoed bytes
    BinaryEcho,
    /// Answer with a binary frame that is not valid UTF-8
    InvalidUtf8Binary,
    /// Reply with a prefix after a delay
    DelayedReply(&'static str, Duration),
    /// Drop the TCP stream right after the handshake
    DropAfterHandshake,
    /// Send a close frame after a delay, never reading from the socket
    CloseWithoutReading(Duration),
}

/// What the server observed from the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    Text(String),
    Close { code: Option<u16>, reason: String },
}

/// Mock WebSocket server.
pub struct MockWsServer {
    addr: SocketAddr,
    /// Frames received from clients, across all connections
    events_rx: mpsc::UnboundedReceiver<ServerEvent>,
}

impl MockWsServer {
    /// Start a mock WebSocket server on a random port.
    pub async fn start(behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };

                let Ok(ws_stream) = tokio_tungstenite::accept_async(stream).await else {
                    continue;
                };

                tokio::spawn(serve(ws_stream, behavior, events_tx.clone()));
            }
        });

        Self { addr, events_rx }
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> String {
        self.addr.port().to_string()
    }

    /// Receive the next frame the server observed.
    pub async fn next_event(&mut self) -> Option<ServerEvent> {
        timeout(Duration::from_secs(2), self.events_rx.recv())
            .await
            .ok()
            .flatten()
    }
}

async fn serve(
    ws_stream: WebSocketStream<TcpStream>,
    behavior: Behavior,
    events_tx: mpsc::UnboundedSender<ServerEvent>,
) {
    match behavior {
        Behavior::NoRead => {
            sleep(Duration::from_secs(30)).await;
            drop(ws_stream);
            return;
        }
        Behavior::DropAfterHandshake => {
            drop(ws_stream);
            return;
        }
        Behavior::CloseWithoutReading(after) => {
            let (mut write, read) = ws_stream.split();
            sleep(after).await;
            let frame = CloseFrame {
                code: CloseCode::Away,
                reason: "going away".to_owned().into(),
            };
            drop(write.send(Message::Close(Some(frame))).await);
            sleep(Duration::from_secs(30)).await;
            drop((write, read));
            return;
        }
        _ => {}
    }

    let (mut write, mut read) = ws_stream.split();

    while let Some(Ok(message)) = read.next().await {
        match message {
            Message::Text(text) => {
                let text = text.to_string();
                drop(events_tx.send(ServerEvent::Text(text.clone())));

                let sent = match behavior {
                    Behavior::Echo => write.send(Message::Text(text.into())).await,
                    Behavior::Reply(prefix) => {
                        write
                            .send(Message::Text(format!("{prefix}{text}").into()))
                            .await
                    }
                    Behavior::PingThenEcho => {
                        let pinged = write.send(Message::Ping("heartbeat".into())).await;
                        match pinged {
                            Ok(()) => write.send(Message::Text(text.into())).await,
                            Err(e) => Err(e),
                        }
                    }
                    Behavior::BinaryEcho => {
                        write
                            .send(Message::Binary(text.into_bytes().into()))
                            .await
                    }
                    Behavior::InvalidUtf8Binary => {
                        write
                            .send(Message::Binary(vec![0xff, 0xfe, 0xfd].into()))
                            .await
                    }
                    Behavior::DelayedReply(prefix, delay) => {
                        sleep(delay).await;
                        write
                            .send(Message::Text(format!("{prefix}{text}").into()))
                            .await
                    }
                    Behavior::CloseOnMessage => {
                        let frame = CloseFrame {
                            code: CloseCode::Away,
                            reason: "going away".to_owned().into(),
                        };
                        drop(write.send(Message::Close(Some(frame))).await);
                        break;
                    }
                    Behavior::Silent
                    | Behavior::NoRead
                    | Behavior::DropAfterHandshake
                    | Behavior::CloseWithoutReading(_) => Ok(()),
                };

                if sent.is_err() {
                    break;
                }
            }
            Message::Close(frame) => {
                let (code, reason) = match frame {
                    Some(frame) => (Some(u16::from(frame.code)), frame.reason.to_string()),
                    None => (None, String::new()),
                };
                drop(events_tx.send(ServerEvent::Close { code, reason }));
                // Let tungstenite flush the close reply
                drop(read.next().await);
                break;
            }
            _ => {}
        }
    }
}

/// A port nothing listens on.
pub async fn unused_port() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port.to_string()
}

/// A listener that accepts TCP connections but never completes a WebSocket handshake.
pub async fn stalled_listener() -> (String, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port().to_string();

    let handle = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    (port, handle)
}

pub fn fast_config() -> Config {
    Config::builder()
        .timeout(Duration::from_millis(500))
        .close_timeout(Duration::from_millis(500))
        .close_reason("test finished")
        .build()
}
