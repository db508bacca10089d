use crate::config::{FetchConfig, MIN_REQUEST_DELAY_MS};
use anyhow::{Context, Result, bail};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use std::cell::Cell;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed with status {status}")]
    Status { url: String, status: u16 },
    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to read response body from {url}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Source of raw page markup. Implementations own their rate limiting.
pub trait PageFetcher {
    fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Blocking HTTP fetcher that waits a fixed delay after every request,
/// successful or not, before the next one may start.
pub struct HttpFetcher {
    client: Client,
    delay: Duration,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        if config.request_delay_ms < MIN_REQUEST_DELAY_MS {
            bail!(
                "request delay of {}ms is below the {MIN_REQUEST_DELAY_MS}ms minimum",
                config.request_delay_ms
            );
        }

        let mut headers = HeaderMap::new();
        for (k, v) in &config.headers {
            let name = HeaderName::from_bytes(k.as_bytes())
                .with_context(|| format!("invalid header name {k}"))?;
            let value = HeaderValue::from_str(v)
                .with_context(|| format!("invalid header value for {k}"))?;
            headers.insert(name, value);
        }

        if let Some(user_agent) = &config.user_agent {
            headers.insert(USER_AGENT, HeaderValue::from_str(user_agent)?);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            client,
            delay: Duration::from_millis(config.request_delay_ms),
        })
    }

    fn request(&self, url: &str) -> Result<String, FetchError> {
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        resp.text().map_err(|source| FetchError::Body {
            url: url.to_string(),
            source,
        })
    }
}

impl PageFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let result = self.request(url);
        match &result {
            Ok(body) => info!(%url, bytes = body.len(), "fetched page"),
            Err(err) => warn!(%url, error = %err, "fetch failed"),
        }

        info!(
            delay_ms = self.delay.as_millis() as u64,
            "respecting source rate limit"
        );
        std::thread::sleep(self.delay);

        result
    }
}

/// Wraps another fetcher and counts the pages it delivered.
pub struct CountingFetcher<'a> {
    inner: &'a dyn PageFetcher,
    fetched: Cell<usize>,
}

impl<'a> CountingFetcher<'a> {
    pub fn new(inner: &'a dyn PageFetcher) -> Self {
        Self {
            inner,
            fetched: Cell::new(0),
        }
    }

    pub fn fetched(&self) -> usize {
        self.fetched.get()
    }
}

impl PageFetcher for CountingFetcher<'_> {
    fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let body = self.inner.fetch(url)?;
        self.fetched.set(self.fetched.get() + 1);
        Ok(body)
    }
}
