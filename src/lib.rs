#![cfg_attr(doc, doc = include_str!("../README.md"))]

pub mod controller;
pub mod error;
pub mod transcript;
pub mod ws;

use crate::error::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Environment variable the demos read the server host from
pub const HOST_VAR: &str = "WS_CHAT_HOST";

/// Environment variable the demos read the server port from
pub const PORT_VAR: &str = "WS_CHAT_PORT";

/// Port the bundled echo server listens on
pub const DEFAULT_PORT: u16 = 9487;
