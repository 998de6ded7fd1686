//! WebSocket session management.
//!
//! This module owns the single duplex connection a chat front end talks through.
//!
//! # Architecture
//!
//! - [`Endpoint`]: validated `ws://host:port/path` target
//! - [`Session`]: one connection's lifetime, `Idle → Open → Closed`
//! - [`Config`]: timeouts, path and close reason
//!
//! # Example
//!
//! ```no_run
//! use ws_chat_session::ws::{Config, Session};
//!
//! # async fn example() -> ws_chat_session::Result<()> {
//! let session = Session::connect("127.0.0.1", "9487", Config::default()).await?;
//! session.send("hello").await?;
//! let reply = session.receive().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod endpoint;
pub mod error;
pub mod session;

pub use config::Config;
pub use endpoint::Endpoint;
#[expect(
    clippy::module_name_repetitions,
    reason = "WsError includes module name for clarity when used outside this module"
)]
pub use error::WsError;
pub use session::{Operation, Session, SessionState};
