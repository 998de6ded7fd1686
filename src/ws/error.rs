#![expect(
    clippy::module_name_repetitions,
    reason = "Error types include the module name to indicate their scope"
)]

use std::error::Error as StdError;
use std::fmt;

/// WebSocket transport error variants.
///
/// These are carried as the source of a [`crate::error::Error`]; the error's
/// [`Kind`](crate::error::Kind) tells which operation they failed.
#[non_exhaustive]
#[derive(Debug)]
pub enum WsError {
    /// Error opening the connection or completing the upgrade handshake
    Handshake(tokio_tungstenite::tungstenite::Error),
    /// Error reading from or writing to an established connection
    Transport(tokio_tungstenite::tungstenite::Error),
    /// The peer closed the connection
    ConnectionClosed {
        /// Close code sent by the peer, if it sent a close frame
        code: Option<u16>,
        /// Close reason sent by the peer
        reason: String,
    },
    /// Received a frame that cannot be delivered as text
    InvalidMessage(String),
    /// A write was abandoned before the frame was fully written
    Interrupted,
}

impl fmt::Display for WsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handshake(e) => write!(f, "WebSocket handshake failed: {e}"),
            Self::Transport(e) => write!(f, "WebSocket transport error: {e}"),
            Self::ConnectionClosed {
                code: Some(code),
                reason,
            } => write!(f, "WebSocket connection closed by peer ({code}): {reason}"),
            Self::ConnectionClosed { code: None, .. } => {
                write!(f, "WebSocket connection closed by peer")
            }
            Self::InvalidMessage(msg) => write!(f, "Invalid WebSocket message: {msg}"),
            Self::Interrupted => write!(f, "WebSocket write interrupted before completion"),
        }
    }
}

impl StdError for WsError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Handshake(e) | Self::Transport(e) => Some(e),
            _ => None,
        }
    }
}
