use crate::stream;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiatedProtocol {
    Http2,
    Http11,
}

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    protocol: NegotiatedProtocol,
    confidence: f32,
    recorded_at: Instant,
}

/// Caches which protocol a `(host, port)` actually speaks so repeat
/// connections skip the ALPN round trip. Confidence distinguishes a real
/// ALPN result (1.0) from a heuristic guess recorded without ever
/// connecting; a later higher-confidence observation overwrites a lower
/// one even before the TTL expires.
pub struct ProtocolNegotiator {
    ttl: Duration,
    cache: Mutex<HashMap<(String, u16), CacheEntry>>,
    forced: Mutex<HashMap<(String, u16), NegotiatedProtocol>>,
}

impl ProtocolNegotiator {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            cache: Mutex::new(HashMap::new()),
            forced: Mutex::new(HashMap::new()),
        }
    }

    /// Non-TLS ports never run ALPN, so they're always `http/1.1`. TLS ports
    /// consult `force_protocol` overrides, then the cache; on a cache miss
    /// this dials a real TLS handshake advertising both `h2` and
    /// `http/1.1`, reads back whichever the peer actually picked, and
    /// records it at confidence 1.0 before returning. The probe connection
    /// itself is not reused as the live request connection: a connection
    /// pool lookup happens separately, keyed by the protocol this returns.
    pub async fn negotiate(
        &self,
        host: &str,
        port: u16,
        is_tls: bool,
        h2_prior_knowledge: bool,
    ) -> Result<NegotiatedProtocol, crate::types::ProtocolError> {
        let key = (host.to_string(), port);

        if h2_prior_knowledge {
            return Ok(NegotiatedProtocol::Http2);
        }

        if !is_tls {
            return Ok(NegotiatedProtocol::Http11);
        }

        if let Some(forced) = self.forced.lock().unwrap().get(&key) {
            return Ok(*forced);
        }

        {
            let mut cache = self.cache.lock().unwrap();
            if let Some(entry) = cache.get(&key) {
                if entry.recorded_at.elapsed() < self.ttl {
                    return Ok(entry.protocol);
                }
                cache.remove(&key);
            }
        }

        let protocol = self.probe_alpn(host, port).await?;
        self.record(host, port, protocol, 1.0);
        Ok(protocol)
    }

    async fn probe_alpn(
        &self,
        host: &str,
        port: u16,
    ) -> Result<NegotiatedProtocol, crate::types::ProtocolError> {
        let transport = stream::create_tls_stream(host, port, host)
            .await
            .map_err(|e| crate::types::ProtocolError::ConnectionFailed(e.to_string()))?;

        let protocol = match transport.negotiated_alpn() {
            Some(proto) if proto.as_slice() == b"h2" => NegotiatedProtocol::Http2,
            _ => NegotiatedProtocol::Http11,
        };
        debug!(host, port, ?protocol, "probed ALPN via dedicated handshake");
        Ok(protocol)
    }

    /// Records the outcome of an actual ALPN handshake (confidence 1.0) or a
    /// heuristic guess (confidence < 1.0, e.g. derived from Alt-Svc).
    pub fn record(&self, host: &str, port: u16, protocol: NegotiatedProtocol, confidence: f32) {
        let key = (host.to_string(), port);
        let mut cache = self.cache.lock().unwrap();

        let should_replace = match cache.get(&key) {
            Some(existing) => confidence >= existing.confidence,
            None => true,
        };

        if should_replace {
            debug!(host, port, ?protocol, confidence, "caching negotiated protocol");
            cache.insert(
                key,
                CacheEntry {
                    protocol,
                    confidence,
                    recorded_at: Instant::now(),
                },
            );
        }
    }

    /// Overrides negotiation for `(host, port)` unconditionally, bypassing
    /// TTL expiry and confidence comparisons.
    pub fn force_protocol(&self, host: &str, port: u16, protocol: NegotiatedProtocol) {
        self.forced
            .lock()
            .unwrap()
            .insert((host.to_string(), port), protocol);
    }

    pub fn clear_forced(&self, host: &str, port: u16) {
        self.forced.lock().unwrap().remove(&(host.to_string(), port));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn non_tls_always_negotiates_http11() {
        let negotiator = ProtocolNegotiator::new(Duration::from_secs(60));
        assert_eq!(
            negotiator.negotiate("example.com", 80, false, false).await.unwrap(),
            NegotiatedProtocol::Http11
        );
    }

    #[tokio::test]
    async fn prior_knowledge_skips_everything() {
        let negotiator = ProtocolNegotiator::new(Duration::from_secs(60));
        assert_eq!(
            negotiator.negotiate("example.com", 443, true, true).await.unwrap(),
            NegotiatedProtocol::Http2
        );
    }

    #[tokio::test]
    async fn cache_hit_avoids_a_new_probe() {
        let negotiator = ProtocolNegotiator::new(Duration::from_secs(60));
        negotiator.record("example.com", 443, NegotiatedProtocol::Http2, 1.0);
        assert_eq!(
            negotiator.negotiate("example.com", 443, true, false).await.unwrap(),
            NegotiatedProtocol::Http2
        );
    }

    #[tokio::test]
    async fn forced_protocol_overrides_cache() {
        let negotiator = ProtocolNegotiator::new(Duration::from_secs(60));
        negotiator.record("example.com", 443, NegotiatedProtocol::Http2, 1.0);
        negotiator.force_protocol("example.com", 443, NegotiatedProtocol::Http11);
        assert_eq!(
            negotiator.negotiate("example.com", 443, true, false).await.unwrap(),
            NegotiatedProtocol::Http11
        );
    }

    #[test]
    fn cache_entry_expires_after_ttl() {
        let negotiator = ProtocolNegotiator::new(Duration::from_millis(1));
        negotiator.record("example.com", 443, NegotiatedProtocol::Http2, 1.0);
        std::thread::sleep(Duration::from_millis(5));
        let cache = negotiator.cache.lock().unwrap();
        let entry = cache.get(&("example.com".to_string(), 443)).unwrap();
        assert!(entry.recorded_at.elapsed() >= negotiator.ttl);
    }
}
