use std::fmt;

use url::Url;

use crate::Result;
use crate::error::Error;

/// Validated WebSocket target, e.g. `ws://127.0.0.1:9487/ws`.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    url: Url,
}

impl Endpoint {
    /// Parses the host and port strings a front end collects.
    ///
    /// The port must be numeric and within `1..=65535`. IPv6 literals may be given
    /// with or without brackets.
    pub fn parse(host: &str, port: &str, path: &str) -> Result<Self> {
        let port = match port.parse::<u16>() {
            Ok(0) | Err(_) => {
                return Err(Error::validation(format!(
                    "port must be a number between 1 and 65535, got {port:?}"
                )));
            }
            Ok(port) => port,
        };

        Self::new(host, port, path)
    }

    pub fn new(host: &str, port: u16, path: &str) -> Result<Self> {
        if host.is_empty() {
            return Err(Error::validation("host must not be empty"));
        }
        if port == 0 {
            return Err(Error::validation("port must not be 0"));
        }

        let authority = if host.contains(':') && !host.starts_with('[') {
            format!("[{host}]:{port}")
        } else {
            format!("{host}:{port}")
        };
        let path = if path.starts_with('/') {
            path.to_owned()
        } else {
            format!("/{path}")
        };
        let url = Url::parse(&format!("ws://{authority}{path}"))?;

        Ok(Self {
            host: host.to_owned(),
            port,
            url,
        })
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}
