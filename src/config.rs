use crate::h2::hpack::HpackSecurityLimits;
use crate::types::ClientTimeouts;
use std::time::Duration;

/// Immutable, `Clone`-able client configuration. There is no global
/// singleton: every `Client` is built from one of these, constructed
/// through `ClientConfigBuilder`.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub timeouts: ClientTimeouts,
    pub alpn_protocols: Vec<Vec<u8>>,
    pub tls_insecure_skip_verify: bool,
    pub h2_prior_knowledge: bool,
    pub local_settings: LocalSettingsOverrides,
    pub hpack_limits: HpackSecurityLimits,
    pub pool: PoolConfig,
    pub negotiator_cache_ttl: Duration,
    pub breaker: BreakerDefaults,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeouts: ClientTimeouts::default(),
            alpn_protocols: vec![b"h2".to_vec(), b"http/1.1".to_vec()],
            tls_insecure_skip_verify: false,
            h2_prior_knowledge: false,
            local_settings: LocalSettingsOverrides::default(),
            hpack_limits: HpackSecurityLimits::default(),
            pool: PoolConfig::default(),
            negotiator_cache_ttl: Duration::from_secs(3600),
            breaker: BreakerDefaults::default(),
        }
    }
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }
}

/// Local SETTINGS overrides sent during the HTTP/2 handshake. `None` leaves
/// the connection's built-in default (see `h2::consts`) untouched.
#[derive(Debug, Clone, Default)]
pub struct LocalSettingsOverrides {
    pub header_table_size: Option<u32>,
    pub max_concurrent_streams: Option<u32>,
    pub initial_window_size: Option<u32>,
    pub max_frame_size: Option<u32>,
    pub max_header_list_size: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_connections_per_key: usize,
    pub idle_ttl: Duration,
    pub cleanup_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections_per_key: 8,
            idle_ttl: Duration::from_secs(90),
            cleanup_interval: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BreakerDefaults {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub open_duration: Duration,
}

impl Default for BreakerDefaults {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            open_duration: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn timeouts(mut self, timeouts: ClientTimeouts) -> Self {
        self.config.timeouts = timeouts;
        self
    }

    pub fn alpn_protocols(mut self, protocols: Vec<Vec<u8>>) -> Self {
        self.config.alpn_protocols = protocols;
        self
    }

    /// Disables certificate verification. Never wire this to untrusted or
    /// externally supplied configuration; it exists for talking to local
    /// test servers with self-signed certificates.
    pub fn tls_insecure_skip_verify(mut self, insecure: bool) -> Self {
        self.config.tls_insecure_skip_verify = insecure;
        self
    }

    pub fn h2_prior_knowledge(mut self, prior_knowledge: bool) -> Self {
        self.config.h2_prior_knowledge = prior_knowledge;
        self
    }

    pub fn local_settings(mut self, overrides: LocalSettingsOverrides) -> Self {
        self.config.local_settings = overrides;
        self
    }

    pub fn hpack_limits(mut self, limits: HpackSecurityLimits) -> Self {
        self.config.hpack_limits = limits;
        self
    }

    pub fn pool(mut self, pool: PoolConfig) -> Self {
        self.config.pool = pool;
        self
    }

    pub fn negotiator_cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.negotiator_cache_ttl = ttl;
        self
    }

    pub fn breaker(mut self, breaker: BreakerDefaults) -> Self {
        self.config.breaker = breaker;
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_prefers_h2_with_http11_fallback() {
        let config = ClientConfig::default();
        assert_eq!(config.alpn_protocols, vec![b"h2".to_vec(), b"http/1.1".to_vec()]);
        assert!(!config.tls_insecure_skip_verify);
    }

    #[test]
    fn builder_overrides_defaults() {
        let config = ClientConfig::builder()
            .tls_insecure_skip_verify(true)
            .h2_prior_knowledge(true)
            .build();
        assert!(config.tls_insecure_skip_verify);
        assert!(config.h2_prior_knowledge);
    }
}
