use crate::breaker::CircuitBreaker;
use crate::config::ClientConfig;
use crate::h2::connection::H2Connection;
use crate::negotiator::{NegotiatedProtocol, ProtocolNegotiator};
use crate::pool::{ConnectionPool, PoolKey};
use crate::types::{ProtocolError, Request, Response};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{info_span, Instrument};

/// A response counts as an application-level failure for breaker purposes
/// when its status falls outside 2xx/3xx.
fn is_breaker_failure(response: &Response) -> bool {
    !(200..400).contains(&response.status)
}

/// Composes the connection pool, protocol negotiator, and per-host circuit
/// breakers behind a single request entry point. All convenience methods
/// (`get`/`post`/...) funnel through `request()`; HTTP/2 is the only wire
/// protocol in scope, so there is exactly one code path, not one per
/// protocol.
pub struct HttpClient {
    config: ClientConfig,
    pool: ConnectionPool,
    negotiator: ProtocolNegotiator,
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
}

impl HttpClient {
    pub fn new(config: ClientConfig) -> Self {
        let pool = ConnectionPool::new(config.pool.clone());
        let negotiator = ProtocolNegotiator::new(config.negotiator_cache_ttl);
        Self {
            config,
            pool,
            negotiator,
            breakers: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn breaker_for(&self, host: &str, port: u16) -> Arc<CircuitBreaker> {
        let key = format!("{}:{}", host, port);
        let mut breakers = self.breakers.lock().unwrap();
        breakers
            .entry(key.clone())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(key, self.config.breaker.clone())))
            .clone()
    }

    pub async fn request(&self, method: &str, url: &str) -> Result<Response, ProtocolError> {
        self.send(Request::new(url, method)?).await
    }

    pub async fn get(&self, url: &str) -> Result<Response, ProtocolError> {
        self.request("GET", url).await
    }

    pub async fn head(&self, url: &str) -> Result<Response, ProtocolError> {
        self.request("HEAD", url).await
    }

    pub async fn post(&self, url: &str, body: impl Into<Bytes>) -> Result<Response, ProtocolError> {
        self.send(Request::new(url, "POST")?.with_body(body)).await
    }

    pub async fn put(&self, url: &str, body: impl Into<Bytes>) -> Result<Response, ProtocolError> {
        self.send(Request::new(url, "PUT")?.with_body(body)).await
    }

    pub async fn patch(&self, url: &str, body: impl Into<Bytes>) -> Result<Response, ProtocolError> {
        self.send(Request::new(url, "PATCH")?.with_body(body)).await
    }

    pub async fn delete(&self, url: &str) -> Result<Response, ProtocolError> {
        self.request("DELETE", url).await
    }

    pub async fn options(&self, url: &str) -> Result<Response, ProtocolError> {
        self.request("OPTIONS", url).await
    }

    pub async fn send(&self, request: Request) -> Result<Response, ProtocolError> {
        let host = request
            .target
            .host()
            .ok_or_else(|| ProtocolError::InvalidTarget("Target missing host".to_string()))?
            .to_string();
        let port = request
            .target
            .port()
            .ok_or_else(|| ProtocolError::InvalidTarget("Target missing port".to_string()))?;
        let is_tls = request.target.scheme() == "https";

        let breaker = self.breaker_for(&host, port);
        let span = info_span!("request", host = %host, port, method = %request.method);

        breaker
            .execute_with(
                async { self.send_uncircuited(request, &host, port, is_tls).await },
                is_breaker_failure,
            )
            .instrument(span)
            .await
    }

    async fn send_uncircuited(
        &self,
        request: Request,
        host: &str,
        port: u16,
        is_tls: bool,
    ) -> Result<Response, ProtocolError> {
        let key = PoolKey::new(host, port, if is_tls { "https" } else { "http" });

        let protocol = self
            .negotiator
            .negotiate(host, port, is_tls, self.config.h2_prior_knowledge)
            .await?;

        if protocol != NegotiatedProtocol::Http2 {
            return Err(ProtocolError::RequestFailed(format!(
                "negotiated protocol for {}:{} is not HTTP/2",
                host, port
            )));
        }

        if let Some(connection) = self.pool.acquire(&key).await {
            let response = Self::dispatch(&connection, &request).await;
            self.pool.put_back(key, connection).await;
            return response;
        }

        let timeouts = request.effective_timeouts(&self.config.timeouts);
        let conn = H2Connection::connect(request.target.as_str(), &timeouts).await?;
        let response = Self::dispatch(&conn, &request).await;
        self.pool.put_back(key, conn).await;
        response
    }

    async fn dispatch(
        connection: &H2Connection,
        request: &Request,
    ) -> Result<Response, ProtocolError> {
        let stream_id = connection.create_stream().await?;

        let pseudo_headers = crate::utils::prepare_pseudo_headers(request)?;
        let mut headers = crate::utils::merge_headers(pseudo_headers, request);
        crate::utils::ensure_user_agent(&mut headers);

        let has_body = request.body.as_ref().map_or(false, |b| !b.is_empty());
        let has_trailers = request.trailers.as_ref().map_or(false, |t| !t.is_empty());
        let end_stream = !has_body && !has_trailers;
        connection.send_headers(stream_id, &headers, end_stream).await?;

        if let Some(body) = request.body.as_ref() {
            if !body.is_empty() {
                connection
                    .send_data(stream_id, body, !has_trailers)
                    .await?;
            }
        }

        if let Some(trailers) = request.trailers.as_ref() {
            if !trailers.is_empty() {
                let normalized = crate::utils::normalize_headers(trailers);
                connection.send_headers(stream_id, &normalized, true).await?;
            }
        }

        connection.read_response(stream_id).await
    }
}
