#![expect(
    clippy::module_name_repetitions,
    reason = "Configuration types intentionally mirror the module name for clarity"
)]

use std::time::Duration;

use bon::Builder;

const DEFAULT_TIMEOUT_DURATION: Duration = Duration::from_secs(10);
const DEFAULT_CLOSE_TIMEOUT_DURATION: Duration = Duration::from_secs(2);
pub const DEFAULT_PATH: &str = "/ws";
pub const DEFAULT_CLOSE_REASON: &str = "connection closed by client";

/// Configuration for session behavior.
///
/// ```
/// use std::time::Duration;
/// use ws_chat_session::ws::config::Config;
///
/// let config = Config::builder()
///     .timeout(Duration::from_secs(3))
///     .close_reason("bye")
///     .build();
///
/// assert_eq!(config.path, "/ws");
/// ```
#[non_exhaustive]
#[derive(Debug, Clone, Builder)]
pub struct Config {
    /// Bound on connect, on each send and on each receive
    #[builder(default = DEFAULT_TIMEOUT_DURATION)]
    pub timeout: Duration,
    /// How long `close` waits for the peer to answer the close frame
    #[builder(default = DEFAULT_CLOSE_TIMEOUT_DURATION)]
    pub close_timeout: Duration,
    /// URL path of the chat endpoint
    #[builder(into, default = DEFAULT_PATH.to_owned())]
    pub path: String,
    /// Reason sent with the normal-closure frame
    #[builder(into, default = DEFAULT_CLOSE_REASON.to_owned())]
    pub close_reason: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::builder().build()
    }
}
