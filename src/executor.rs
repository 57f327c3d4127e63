//! Runs one logical request against the [EndpointPool], rotating to the next endpoint and
//! retrying whenever no server could be reached.

use crate::endpoint::EndpointPool;
use crate::requests::query_utils::Query;
use crate::requests::{Error, ErrorKind, Result};
use crate::transport::{ApiResponse, Transport};

use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use std::sync::Arc;
use std::time::Duration;

/// How hard the executor tries before giving up on a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    #[builder(default = 2)]
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Pause before every retry
    #[builder(default = Duration::from_secs(1))]
    #[serde(default = "default_backoff", with = "crate::config::duration_ms")]
    pub backoff: Duration,
    /// Per-attempt limit, a request may carry a longer one
    #[builder(default = Duration::from_secs(15))]
    #[serde(default = "default_timeout", with = "crate::config::duration_ms")]
    pub timeout: Duration,
}

fn default_max_retries() -> u32 {
    2
}

fn default_backoff() -> Duration {
    Duration::from_secs(1)
}

fn default_timeout() -> Duration {
    Duration::from_secs(15)
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Method, relative path and payload of a backend call
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    method: Method,
    path: String,
    query: Option<String>,
    body: Option<Value>,
    headers: Vec<(String, String)>,
    timeout: Option<Duration>,
}

#[bon::bon]
impl RequestSpec {
    /// `path` has to be relative to the base url: it must start with `/` and must not name a
    /// scheme or host of its own
    #[builder]
    pub fn new(
        #[builder(default = Method::GET)] method: Method,
        #[builder(into)] path: String,
        #[builder(into)] query: Option<String>,
        body: Option<Value>,
        #[builder(default)] headers: Vec<(String, String)>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        if !path.starts_with('/') || path.starts_with("//") || path.contains("://") {
            return Err(Error::InvalidPath(path));
        }

        Ok(Self {
            method,
            path,
            query: query.filter(|q| !q.is_empty()),
            body,
            headers,
            timeout,
        })
    }
}

impl RequestSpec {
    pub fn get(path: impl Into<String>) -> Result<Self> {
        Self::builder().path(path).build()
    }

    pub fn post(path: impl Into<String>, body: Value) -> Result<Self> {
        Self::builder()
            .method(Method::POST)
            .path(path)
            .body(body)
            .build()
    }

    /// Replaces the query string with the [serde_qs] encoding of `query`
    pub fn with_query(mut self, query: &impl Query) -> Result<Self> {
        let encoded = serde_qs::to_string(query)?;
        self.query = Some(encoded).filter(|q| !q.is_empty());

        Ok(self)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Full url of this request against `base_url`
    pub fn url(&self, base_url: &str) -> String {
        let base = base_url.trim_end_matches('/');

        match &self.query {
            Some(query) => format!("{base}{}?{query}", self.path),
            None => format!("{base}{}", self.path),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Some server answered, with any status
    Answered(StatusCode),
    Unreachable,
    Failed(ErrorKind),
}

/// What happened to one attempt of a logical call. Only ever logged
#[derive(Debug, Clone)]
pub struct RequestAttempt {
    pub endpoint: String,
    pub attempt: u32,
    pub outcome: AttemptOutcome,
}

/// Executes requests against the currently selected endpoint of a shared [EndpointPool].
///
/// Only [`Error::NetworkUnavailable`] (including per-attempt timeouts) leads to a retry. Every
/// retry first rotates the pool and then waits [`RetryPolicy::backoff`]. A successful call
/// leaves the pool alone, so the endpoint that answered stays current for later calls.
#[derive(Debug)]
pub struct Executor<T> {
    transport: Arc<T>,
    pool: Arc<EndpointPool>,
    policy: RetryPolicy,
}

impl<T> Clone for Executor<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            pool: Arc::clone(&self.pool),
            policy: self.policy,
        }
    }
}

impl<T: Transport> Executor<T> {
    pub fn new(transport: T, pool: Arc<EndpointPool>, policy: RetryPolicy) -> Self {
        Self {
            transport: Arc::new(transport),
            pool,
            policy,
        }
    }

    pub fn pool(&self) -> &EndpointPool {
        &self.pool
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// One attempt against `base_url` with the timeout applied, no status interpretation
    pub async fn send_once(&self, base_url: &str, request: &RequestSpec) -> Result<ApiResponse> {
        let limit = request.timeout().unwrap_or(self.policy.timeout);

        match tokio::time::timeout(limit, self.transport.send(base_url, request)).await {
            Ok(res) => res,
            Err(_) => Err(Error::NetworkUnavailable {
                endpoint: request.url(base_url),
                reason: format!("no response within {limit:?}"),
            }),
        }
    }

    /// Runs `request` until it gets an answer or runs out of attempts.
    ///
    /// A 2xx response is returned untouched. Any other status is turned into
    /// [`Error::NotFound`] or [`Error::UpstreamError`] right away, without retrying.
    #[tracing::instrument(skip_all, fields(method = %request.method(), path = %request.path()))]
    pub async fn execute(&self, request: &RequestSpec) -> Result<ApiResponse> {
        let max_attempts = self.policy.max_retries.saturating_add(1);
        let mut attempts: Vec<RequestAttempt> = Vec::new();

        loop {
            let endpoint = self.pool.current().to_owned();
            let attempt = attempts.len() as u32 + 1;

            let res = self.send_once(&endpoint, request).await;

            let outcome = match &res {
                Ok(resp) => AttemptOutcome::Answered(resp.status),
                Err(e) if e.is_network_unavailable() => AttemptOutcome::Unreachable,
                Err(e) => AttemptOutcome::Failed(e.kind()),
            };
            attempts.push(RequestAttempt {
                endpoint,
                attempt,
                outcome,
            });

            match res {
                Ok(resp) => {
                    if attempt > 1 {
                        tracing::info!(
                            endpoint = %resp.endpoint,
                            ?attempts,
                            "request went through after {attempt} attempts"
                        );
                    }

                    return resp.error_for_status();
                }
                Err(e) if e.is_network_unavailable() && attempt < max_attempts => {
                    tracing::warn!(attempt, "{e}, trying the next endpoint");

                    self.pool.rotate();
                    tokio::time::sleep(self.policy.backoff).await;
                }
                Err(e) => {
                    tracing::warn!(?attempts, "giving up: {e}");

                    return Err(e);
                }
            }
        }
    }
}
