use std::fmt;

use bytes::Bytes;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, ETAG, LAST_MODIFIED};
use reqwest::{Client, StatusCode};
use serde::Serialize;

use crate::settings::Settings;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    pub password: Option<String>,
}

impl BasicAuth {
    pub fn from_parts(username: Option<String>, password: Option<String>) -> Option<Self> {
        username.filter(|u| !u.is_empty()).map(|username| BasicAuth { username, password })
    }
}

#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct FeedHeaders {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub content_length: Option<i64>,
}

/// A fetched body together with the transport metadata the diagnostics report.
#[derive(Clone, Debug)]
pub struct FetchedFeed {
    pub source: String,
    /// None when the source is a local file.
    pub status: Option<u16>,
    pub content_type: Option<String>,
    pub headers: FeedHeaders,
    pub body: Bytes,
}

impl FetchedFeed {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn is_success(&self) -> bool {
        self.status.map(|s| (200..300).contains(&s)).unwrap_or(true)
    }
}

#[derive(Debug)]
pub enum FetchError {
    EmptySource,
    Http(reqwest::Error),
    Timeout,
    Status { status: StatusCode, url: String },
    Io { path: String, source: std::io::Error },
}

impl FetchError {
    fn http(err: reqwest::Error) -> Self {
        if err.is_timeout() { FetchError::Timeout } else { FetchError::Http(err) }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(status.as_u16()),
            FetchError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::EmptySource => write!(f, "no XML feed URL provided"),
            FetchError::Http(e) => write!(f, "http error: {e}"),
            FetchError::Timeout => write!(f, "request timed out"),
            FetchError::Status { status, url } => write!(f, "{status} returned by {url}"),
            FetchError::Io { path, source } => write!(f, "cannot read {path}: {source}"),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Http(e) => Some(e),
            FetchError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

#[derive(Clone)]
pub struct FeedFetcher {
    http: Client,
}

impl FeedFetcher {
    pub fn new(settings: &Settings) -> Result<Self, FetchError> {
        let http = Client::builder()
            .timeout(settings.fetch_timeout)
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(FetchError::http)?;
        Ok(Self { http })
    }

    /// GET without judging the status code; diagnostics want to see 4xx/5xx bodies too.
    pub async fn get(&self, url: &str, auth: Option<&BasicAuth>) -> Result<FetchedFeed, FetchError> {
        let mut req = self.http.get(url);
        if let Some(a) = auth { req = req.basic_auth(&a.username, a.password.as_ref()); }
        let resp = req.send().await.map_err(FetchError::http)?;
        let status = resp.status().as_u16();
        let content_type = header_str(resp.headers(), CONTENT_TYPE);
        let headers = feed_headers(resp.headers());
        let body = resp.bytes().await.map_err(FetchError::http)?;
        Ok(FetchedFeed { source: url.to_string(), status: Some(status), content_type, headers, body })
    }

    pub async fn head(&self, url: &str, auth: Option<&BasicAuth>) -> Result<FeedHeaders, FetchError> {
        let mut req = self.http.head(url);
        if let Some(a) = auth { req = req.basic_auth(&a.username, a.password.as_ref()); }
        let resp = req.send().await.map_err(FetchError::http)?;
        if !resp.status().is_success() {
            return Err(FetchError::Status { status: resp.status(), url: url.to_string() });
        }
        Ok(feed_headers(resp.headers()))
    }

    /// Reads a URL or a local file path.
    pub async fn read(&self, source: &str, auth: Option<&BasicAuth>) -> Result<FetchedFeed, FetchError> {
        let source = source.trim();
        if source.is_empty() { return Err(FetchError::EmptySource); }
        if is_remote(source) { return self.get(source, auth).await; }
        let body = tokio::fs::read(source)
            .await
            .map_err(|e| FetchError::Io { path: source.to_string(), source: e })?;
        let len = body.len() as i64;
        Ok(FetchedFeed {
            source: source.to_string(),
            status: None,
            content_type: None,
            headers: FeedHeaders { content_length: Some(len), ..Default::default() },
            body: Bytes::from(body),
        })
    }

    /// Like [`read`](Self::read) but treats non-2xx answers as failures.
    pub async fn fetch_content(&self, source: &str, auth: Option<&BasicAuth>) -> Result<String, FetchError> {
        let feed = self.read(source, auth).await?;
        if let Some(code) = feed.status {
            if !feed.is_success() {
                let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                return Err(FetchError::Status { status, url: feed.source });
            }
        }
        Ok(feed.text())
    }
}

fn header_str(headers: &reqwest::header::HeaderMap, name: reqwest::header::HeaderName) -> Option<String> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(|s| s.to_string())
}

fn feed_headers(headers: &reqwest::header::HeaderMap) -> FeedHeaders {
    FeedHeaders {
        etag: header_str(headers, ETAG),
        last_modified: header_str(headers, LAST_MODIFIED),
        content_length: header_str(headers, CONTENT_LENGTH).and_then(|v| v.parse::<i64>().ok()),
    }
}
