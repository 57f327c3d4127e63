//! The seam between the executor and the network.
//!
//! A [Transport] only reports what happened on the wire: either some HTTP response came back
//! (whatever its status) or the connection could not be made, which is
//! [`Error::NetworkUnavailable`]. Deciding what a 404 means is left to the caller.

use crate::executor::RequestSpec;
use crate::requests::{Error, Result, ServerResponseError};

use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_tracing::TracingMiddleware;
use serde::de::DeserializeOwned;

use std::future::Future;

pub trait Transport: Send + Sync {
    /// Issues `request` against `base_url`
    fn send(
        &self,
        base_url: &str,
        request: &RequestSpec,
    ) -> impl Future<Output = Result<ApiResponse>> + Send;
}

/// Raw response together with the endpoint that produced it
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub endpoint: String,
    pub status: StatusCode,
    pub body: Bytes,
}

impl ApiResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Turns 4xx/5xx into [`Error::NotFound`] or [`Error::UpstreamError`], using the message
    /// from the `{success: false, message, error?}` body when there is one
    pub fn error_for_status(self) -> Result<Self> {
        if self.status.is_success() {
            return Ok(self);
        }

        let body: ServerResponseError = serde_json::from_slice(&self.body).unwrap_or_default();
        let message = body
            .message
            .or(body.error)
            .or_else(|| self.status.canonical_reason().map(str::to_owned))
            .unwrap_or_else(|| "unknown error".to_owned());

        tracing::warn!(endpoint = %self.endpoint, status = %self.status, "got an error from server: {message}");

        if self.status == StatusCode::NOT_FOUND {
            Err(Error::NotFound(message))
        } else {
            Err(Error::UpstreamError {
                status: self.status.as_u16(),
                message,
            })
        }
    }
}

/// [Transport] backed by reqwest with request tracing
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: ClientWithMiddleware,
}

impl HttpTransport {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder().user_agent(user_agent).build()?;

        Ok(Self::from_client(client))
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        let client = ClientBuilder::new(client)
            .with(TracingMiddleware::default())
            .build();

        Self { client }
    }
}

/// Connect, DNS and timeout failures mean no server answered
fn classify(url: &str, e: reqwest_middleware::Error) -> Error {
    match e {
        reqwest_middleware::Error::Reqwest(e) if e.is_connect() || e.is_timeout() => {
            Error::NetworkUnavailable {
                endpoint: url.to_owned(),
                reason: e.to_string(),
            }
        }
        e => Error::RequestWithMiddleWareError(e),
    }
}

impl Transport for HttpTransport {
    async fn send(&self, base_url: &str, request: &RequestSpec) -> Result<ApiResponse> {
        let url = request.url(base_url);

        let mut builder = self.client.request(request.method().clone(), url.as_str());
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body() {
            builder = builder
                .header(CONTENT_TYPE, "application/json")
                .body(serde_json::to_vec(body)?);
        }

        let resp = builder.send().await.map_err(|e| classify(&url, e))?;
        let status = resp.status();

        let body = match resp.bytes().await {
            Ok(body) => body,
            Err(e) if e.is_timeout() || e.is_body() => {
                return Err(Error::NetworkUnavailable {
                    endpoint: url,
                    reason: e.to_string(),
                })
            }
            Err(e) => return Err(Error::ReqwestError(e)),
        };

        Ok(ApiResponse {
            endpoint: base_url.to_owned(),
            status,
            body,
        })
    }
}
