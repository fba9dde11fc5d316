use std::collections::BTreeMap;
use std::fmt;
use std::io::prelude::*;
use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use flate2::read::GzDecoder;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;

use crate::planner::QuerySpec;

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout: Duration,
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Connect,
    Redirect,
    Request,
    Body,
    Decode,
    Render,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Ok,
    HttpError(u16),
    TransportError(TransportKind),
    Timeout,
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::HttpError(code) => write!(f, "status code {code}"),
            Self::TransportError(kind) => write!(f, "transport error ({kind:?})"),
            Self::Timeout => write!(f, "timeout"),
        }
    }
}

/// Outcome of exactly one retrieval attempt
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub query: QuerySpec,
    pub status: FetchStatus,
    pub body: Option<String>,
    pub elapsed: Duration,
}

impl FetchResult {
    pub fn ok(query: QuerySpec, body: String, elapsed: Duration) -> Self {
        Self {
            query,
            status: FetchStatus::Ok,
            body: Some(body),
            elapsed,
        }
    }

    pub fn failed(query: QuerySpec, status: FetchStatus, elapsed: Duration) -> Self {
        Self {
            query,
            status,
            body: None,
            elapsed,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == FetchStatus::Ok
    }
}

/// One retrieval per call, no retry. Network conditions are reported through
/// [`FetchStatus`], never as errors.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Called once before the first fetch, an error aborts the crawl
    async fn setup(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn fetch(&self, query: &QuerySpec, url: &str) -> FetchResult;
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .with_context(|| format!("Invalid header name {name}"))?;
            let value = HeaderValue::from_str(value)
                .with_context(|| format!("Invalid value for header {name}"))?;
            headers.insert(name, value);
        }

        let client = reqwest::ClientBuilder::new()
            .gzip(true)
            .deflate(true)
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .context("Couldn't build HTTP client")?;

        Ok(Self { client })
    }

    async fn download(&self, url: &str) -> Result<String, FetchStatus> {
        let resp = self.client.get(url).send().await.map_err(classify)?;

        let status = resp.status();
        if status != StatusCode::OK {
            return Err(FetchStatus::HttpError(status.as_u16()));
        }

        match resp.headers().get(CONTENT_TYPE) {
            Some(c) if c == "application/x-gzip" || c == "application/gzip" => {
                let compressed = resp.bytes().await.map_err(classify)?;
                let mut gz = GzDecoder::new(&compressed[..]);
                let mut page = String::new();
                gz.read_to_string(&mut page)
                    .map_err(|_| FetchStatus::TransportError(TransportKind::Decode))?;
                Ok(page)
            }
            _ => resp.text().await.map_err(classify),
        }
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, query: &QuerySpec, url: &str) -> FetchResult {
        let started = Instant::now();
        match self.download(url).await {
            Ok(page) => {
                log::debug!("Fetched {url} ({} bytes)", page.len());
                FetchResult::ok(query.clone(), page, started.elapsed())
            }
            Err(status) => {
                log::debug!("Couldn't fetch {url} got: {status}");
                FetchResult::failed(query.clone(), status, started.elapsed())
            }
        }
    }
}

fn classify(e: reqwest::Error) -> FetchStatus {
    if e.is_timeout() {
        return FetchStatus::Timeout;
    }
    let kind = if e.is_connect() {
        TransportKind::Connect
    } else if e.is_redirect() {
        TransportKind::Redirect
    } else if e.is_body() {
        TransportKind::Body
    } else if e.is_decode() {
        TransportKind::Decode
    } else if e.is_request() {
        TransportKind::Request
    } else {
        TransportKind::Other
    };
    log::trace!("Transport failure: {e}");
    FetchStatus::TransportError(kind)
}
