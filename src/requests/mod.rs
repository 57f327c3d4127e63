//! Structs and utilities for making requests to the MangaVaani backend

pub mod auth;
pub mod chapter;
pub mod manga;
pub mod query_utils;

use crate::executor::RequestSpec;
use crate::transport::{ApiResponse, Transport};
use crate::{images, VaaniClient};
use chapter::{sort_chapters_desc, ChapterImageSet, ChapterSummary};
use manga::{ListKind, MangaDetail, MangaSummary, SearchResults};
use query_utils::{take_field, ListQuery, ResponseSucceeded as _, SearchQuery, PAGE_SIZE};

use bytes::Bytes;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use std::time::Duration;

/// Chapter image lists can take a while to assemble upstream
const CHAPTER_IMAGES_TIMEOUT: Duration = Duration::from_secs(30);

/// Body the backend sends along with a 4xx/5xx status
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ServerResponseError {
    #[serde(default)]
    pub success: bool,
    pub message: Option<String>,
    pub error: Option<String>,
}

/// Custom error type that contains all errors that can be emitted by this crate's functions
#[derive(Error, Debug)]
pub enum Error {
    #[error("cannot reach {endpoint}: {reason}")]
    NetworkUnavailable { endpoint: String, reason: String },
    #[error("{status} server response: {message}")]
    UpstreamError { status: u16, message: String },
    #[error("404 server response: {0}")]
    NotFound(String),
    #[error("invalid {field}: {message}")]
    ValidationError {
        field: &'static str,
        message: String,
    },
    #[error("endpoint pool must contain at least one base url")]
    EmptyEndpointPool,
    #[error("request path must be relative and start with '/', got {0:?}")]
    InvalidPath(String),
    #[error("bad configuration: {0}")]
    Config(String),
    #[error(transparent)]
    ReqwestError(#[from] reqwest::Error),
    #[error(transparent)]
    RequestWithMiddleWareError(#[from] reqwest_middleware::Error),
    #[error(transparent)]
    JsonError(#[from] serde_json::Error),
    #[error("error while parsing json value")]
    ParseError,
    #[error(transparent)]
    QsError(#[from] serde_qs::Error),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
}

/// Coarse classification of [Error], used by screens to pick what to render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Upstream,
    NotFound,
    Validation,
    Internal,
}

impl Error {
    /// Only these failures make the executor rotate endpoints and retry
    pub fn is_network_unavailable(&self) -> bool {
        matches!(self, Error::NetworkUnavailable { .. })
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NetworkUnavailable { .. } => ErrorKind::Network,
            Error::UpstreamError { .. } => ErrorKind::Upstream,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::ValidationError { .. } => ErrorKind::Validation,
            _ => ErrorKind::Internal,
        }
    }

    pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Error::ValidationError {
            field,
            message: message.into(),
        }
    }
}

/// Type alias for the [`Result`](std::result::Result) that is used in the crate's functions
pub type Result<T> = std::result::Result<T, Error>;

impl<T: Transport> VaaniClient<T> {
    /// Reads the `{success, message?, ...payload}` envelope out of a 2xx response.
    /// `success: false` is reported as [`Error::UpstreamError`] even though the status was fine
    pub fn parse_envelope(resp: ApiResponse) -> Result<Value> {
        let status = resp.status.as_u16();
        let body: Value = resp.json()?;

        if body.response_succeeded()? {
            Ok(body)
        } else {
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("request was not successful")
                .to_owned();

            Err(Error::UpstreamError { status, message })
        }
    }

    /// Lists manga, optionally narrowed to the popular or recent shelves
    #[tracing::instrument(skip(self))]
    pub async fn list_manga(&self, kind: Option<ListKind>) -> Result<Vec<MangaSummary>> {
        let request = RequestSpec::get("/manga")?.with_query(&ListQuery { kind })?;
        let resp = self.executor.execute(&request).await?;

        let mut body = Self::parse_envelope(resp)?;
        take_field(&mut body, "data")
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_manga_details(&self, id: &str) -> Result<MangaDetail> {
        let request = RequestSpec::get(format!("/manga/{}", query_utils::encode_segment(id)))?;
        let resp = self.executor.execute(&request).await?;

        let mut body = Self::parse_envelope(resp)?;
        take_field(&mut body, "data")
    }

    /// Chapters of the manga with the given `id`, highest chapter number first
    #[tracing::instrument(skip(self))]
    pub async fn get_manga_chapters(&self, id: &str) -> Result<Vec<ChapterSummary>> {
        let request = RequestSpec::get(format!(
            "/manga/{}/chapters",
            query_utils::encode_segment(id)
        ))?;
        let resp = self.executor.execute(&request).await?;

        let mut body = Self::parse_envelope(resp)?;
        let mut chapters: Vec<ChapterSummary> = take_field(&mut body, "data")?;
        sort_chapters_desc(&mut chapters);

        Ok(chapters)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_chapter_images(&self, chapter_id: &str) -> Result<ChapterImageSet> {
        let request = RequestSpec::get(format!(
            "/manga/chapter/{}",
            query_utils::encode_segment(chapter_id)
        ))?
        .with_timeout(CHAPTER_IMAGES_TIMEOUT);
        let resp = self.executor.execute(&request).await?;

        let mut body = Self::parse_envelope(resp)?;
        let data: chapter::ChapterImagesPayload = take_field(&mut body, "data")?;

        let id = data.chapter_id.unwrap_or_else(|| chapter_id.to_owned());
        if data.page_count.is_some_and(|count| count != data.images.len()) {
            tracing::warn!(
                chapter_id = %id,
                reported = ?data.page_count,
                actual = data.images.len(),
                "page count disagrees with image list, using image list"
            );
        }

        Ok(ChapterImageSet::new(id, data.images))
    }

    /// Searches by title. `page` is 1-indexed, [`PAGE_SIZE`] entries per page
    #[tracing::instrument(skip(self))]
    pub async fn search_manga(&self, query: &str, page: u32) -> Result<SearchResults> {
        if query.trim().is_empty() {
            return Err(Error::validation("query", "search query must not be empty"));
        }

        let offset = query_utils::search_offset(page)?;
        let request = RequestSpec::get(format!(
            "/manga/search/{}",
            query_utils::encode_segment(query)
        ))?
        .with_query(&SearchQuery {
            limit: PAGE_SIZE,
            offset,
        })?;
        let resp = self.executor.execute(&request).await?;

        let mut body = Self::parse_envelope(resp)?;
        let results: Vec<MangaSummary> = take_field(&mut body, "data")?;
        let total = match body.get("total") {
            Some(total) => total.as_u64().ok_or(Error::ParseError)?,
            None => results.len() as u64 + u64::from(offset),
        };

        Ok(SearchResults {
            results,
            total,
            page,
            offset,
        })
    }

    /// Connectivity self-test. Any failure, transport or upstream, reads as unreachable
    #[tracing::instrument(skip(self))]
    pub async fn check_status(&self) -> bool {
        let request = match RequestSpec::get("/manga/status") {
            Ok(r) => r,
            Err(_) => return false,
        };

        match self.executor.execute(&request).await {
            Ok(resp) => match Self::parse_envelope(resp) {
                Ok(_) => true,
                Err(e) => {
                    tracing::warn!("status probe answered with an error: {e}");
                    false
                }
            },
            Err(e) => {
                tracing::warn!("status probe failed: {e}");
                false
            }
        }
    }

    /// Handler behind the "Cannot connect" panel: moves to the next endpoint and probes it.
    /// Returns the probe result together with the endpoint that is current afterwards
    #[tracing::instrument(skip(self))]
    pub async fn rotate_and_probe(&self) -> (bool, String) {
        self.executor.pool().rotate();

        let reachable = self.check_status().await;

        (reachable, self.executor.pool().current().to_owned())
    }

    /// Downloads one page image from its absolute `url`. Images are served from wherever the
    /// url points, so the endpoint pool is not involved and nothing is retried except one
    /// attempt on the data-saver tier when `prefer_data_saver` allows it
    #[tracing::instrument(skip(self))]
    pub async fn download_page(&self, url: &str, prefer_data_saver: bool) -> Result<Bytes> {
        match self.fetch_image(url).await {
            Ok(bytes) => Ok(bytes),
            Err(e) => {
                let fallback = images::resolve_fallback(url, prefer_data_saver);
                if fallback == url || images::is_placeholder(&fallback) {
                    return Err(e);
                }

                tracing::warn!("page failed to load ({e}), trying {fallback}");
                self.fetch_image(&fallback).await
            }
        }
    }

    async fn fetch_image(&self, url: &str) -> Result<Bytes> {
        let parsed = Url::parse(url).map_err(|_| Error::InvalidPath(url.to_owned()))?;
        let origin = parsed.origin().ascii_serialization();
        let path = parsed
            .as_str()
            .strip_prefix(origin.as_str())
            .filter(|p| p.starts_with('/'))
            .ok_or_else(|| Error::InvalidPath(url.to_owned()))?;

        let resp = self
            .executor
            .send_once(&origin, &RequestSpec::get(path)?)
            .await?
            .error_for_status()?;

        Ok(resp.body)
    }
}
