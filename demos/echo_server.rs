//! WebSocket server for trying the chat client locally.
//!
//! Serves `/ws` on port 9487, answers every text message with `reply: <message>` and
//! pings each client every 30 seconds. Stop it with Ctrl+C.
//!
//! ```sh
//! RUST_LOG=info cargo run --example echo_server
//! ```

use std::time::Duration;

use futures_util::{SinkExt as _, StreamExt as _};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{MissedTickBehavior, interval};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tracing::{debug, info, warn};
use ws_chat_session::DEFAULT_PORT;
use ws_chat_session::ws::config::DEFAULT_PATH;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const REPLY_PREFIX: &str = "reply: ";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let listener = TcpListener::bind(("0.0.0.0", DEFAULT_PORT)).await?;
    info!(port = DEFAULT_PORT, path = DEFAULT_PATH, "WebSocket server listening");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = accepted?;
                tokio::spawn(async move {
                    if let Err(e) = serve(stream).await {
                        debug!(%peer, error = %e, "Connection ended with error");
                    }
                });
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal, stopping server");
                break;
            }
        }
    }

    Ok(())
}

fn only_chat_path(request: &Request, response: Response) -> Result<Response, ErrorResponse> {
    if request.uri().path() == DEFAULT_PATH {
        Ok(response)
    } else {
        let mut rejection = ErrorResponse::new(Some("not found".to_owned()));
        *rejection.status_mut() = StatusCode::NOT_FOUND;
        Err(rejection)
    }
}

async fn serve(stream: TcpStream) -> anyhow::Result<()> {
    let ws_stream = tokio_tungstenite::accept_hdr_async(stream, only_chat_path).await?;
    info!("WebSocket connection opened");

    let (mut write, mut read) = ws_stream.split();
    let mut heartbeat = interval(HEARTBEAT_INTERVAL);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            message = read.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        info!(%text, "Received message");
                        write
                            .send(Message::Text(format!("{REPLY_PREFIX}{text}").into()))
                            .await?;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "Error reading message");
                        break;
                    }
                }
            }
            _ = heartbeat.tick() => {
                write.send(Message::Ping("heartbeat".into())).await?;
            }
        }
    }

    info!("WebSocket connection closed");
    Ok(())
}
