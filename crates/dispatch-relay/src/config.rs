use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};

pub const DEFAULT_PORT: u16 = 8787;

/// Everything the relay needs at startup. Immutable once serving.
#[derive(Clone)]
pub struct RelayConfig {
    pub bind: SocketAddr,
    /// Backend base URL without trailing slash, e.g. `https://xyz.supabase.co`.
    pub remote_url: String,
    /// Service credential sent as `apikey` and bearer token. Never leaves the relay.
    pub service_key: String,
    /// Fixed `Access-Control-Allow-Origin`; the request's `Origin` is mirrored when unset.
    pub cors_origin: Option<String>,
}

impl RelayConfig {
    pub fn new(remote_url: &str, service_key: impl Into<String>) -> Self {
        Self {
            bind: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            remote_url: remote_url.trim_end_matches('/').to_string(),
            service_key: service_key.into(),
            cors_origin: None,
        }
    }

    pub fn with_bind(mut self, bind: SocketAddr) -> Self {
        self.bind = bind;
        self
    }

    pub fn with_cors_origin(mut self, origin: Option<String>) -> Self {
        self.cors_origin = origin.filter(|o| !o.trim().is_empty());
        self
    }
}

impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("bind", &self.bind)
            .field("remote_url", &self.remote_url)
            .field("service_key", &"<redacted>")
            .field("cors_origin", &self.cors_origin)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_trailing_slash() {
        let config = RelayConfig::new("https://db.example.com/", "k");
        assert_eq!(config.remote_url, "https://db.example.com");
        assert_eq!(config.bind.port(), DEFAULT_PORT);
    }

    #[test]
    fn debug_redacts_service_key() {
        let config = RelayConfig::new("https://db.example.com", "super-secret");
        let printed = format!("{config:?}");
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn blank_cors_origin_is_unset() {
        let config = RelayConfig::new("https://db", "k").with_cors_origin(Some("  ".into()));
        assert!(config.cors_origin.is_none());
        let config = config.with_cors_origin(Some("https://pages.example".into()));
        assert_eq!(config.cors_origin.as_deref(), Some("https://pages.example"));
    }
}
