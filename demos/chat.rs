//! Terminal chat front end driving a [`Controller`].
//!
//! Type a line to send it, `/quit` to disconnect and exit. The server address comes
//! from `WS_CHAT_HOST` / `WS_CHAT_PORT` (default `127.0.0.1:9487`).
//!
//! Start the bundled echo server first:
//! ```sh
//! cargo run --example echo_server
//! RUST_LOG=info cargo run --example chat --features tracing
//! ```

use std::env;

use tokio::io::{AsyncBufReadExt as _, BufReader};
use tracing::{info, warn};
use ws_chat_session::controller::{Controller, Event};
use ws_chat_session::transcript::Transcript;
use ws_chat_session::ws::Config;
use ws_chat_session::{DEFAULT_PORT, HOST_VAR, PORT_VAR};

const QUIT: &str = "/quit";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let host = env::var(HOST_VAR).unwrap_or_else(|_| "127.0.0.1".to_owned());
    let port = env::var(PORT_VAR).unwrap_or_else(|_| DEFAULT_PORT.to_string());

    let (controller, mut events) = Controller::spawn(Config::default());
    controller.connect(host, port)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut transcript = Transcript::new();
    let mut reading = true;

    loop {
        tokio::select! {
            line = lines.next_line(), if reading => {
                match line? {
                    Some(line) if line.is_empty() => {}
                    Some(line) if line.trim() != QUIT => controller.send(line)?,
                    // `/quit` or end of input
                    _ => {
                        reading = false;
                        controller.disconnect()?;
                    }
                }
            }
            Some(event) = events.recv() => {
                transcript.apply(&event);

                match event {
                    Event::Connected { endpoint } => info!(%endpoint, "Connected"),
                    Event::Sent { text } => info!(%text, "Sent"),
                    Event::Received { text } => info!(%text, "Received"),
                    Event::Failed { failure } => {
                        warn!(kind = ?failure.kind, error = %failure, "Request failed");
                    }
                    Event::Disconnected { requested } => {
                        info!(requested, "Disconnected");
                        break;
                    }
                    _ => {}
                }
            }
            else => break,
        }
    }

    if !transcript.is_empty() {
        info!(lines = transcript.len(), transcript = %transcript, "Session transcript");
    }

    Ok(())
}
