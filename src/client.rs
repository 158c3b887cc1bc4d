use anyhow::{Context, Result, bail};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Url;
use reqwest::blocking::Client as HttpClient;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use std::time::Duration;

use crate::config::load_config;
use crate::error::{format_api_error, parse_api_error};
use crate::export::Endpoint;
use crate::extract::{Extracted, ResponseShape, extract_items};
use crate::query::{QueryParams, build_url};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base API URL, typically `https://api.researchmap.jp`.
    pub url: String,
    /// Researcher permalink, the path segment after the base URL.
    pub permalink: String,
    /// Whether to verify TLS certificates.
    pub verify: bool,
}

#[derive(Debug, Clone)]
pub struct Client {
    url: String,
    permalink: String,
    verify: bool,

    timeout: Option<Duration>,
    progress: bool,

    http: HttpClient,
}

impl Client {
    /// Creates a client using environment variables and/or `.researchmaprc`.
    ///
    /// This is equivalent to `Client::new(None, None, None)`.
    pub fn from_env() -> Result<Self> {
        Self::new(None, None, None)
    }

    /// Creates a client using (in order of precedence):
    /// - explicit `url`/`permalink` arguments
    /// - environment variables `RESEARCHMAP_URL` / `RESEARCHMAP_PERMALINK`
    /// - config file from `RESEARCHMAP_RC` or `.researchmaprc`
    /// - the public API and the built-in permalink
    pub fn new(
        url: Option<String>,
        permalink: Option<String>,
        verify: Option<bool>,
    ) -> Result<Self> {
        let cfg = load_config(url, permalink, verify)?;
        Self::with_config(cfg)
    }

    pub fn with_config(cfg: ClientConfig) -> Result<Self> {
        let http = build_http(cfg.verify, None)?;
        Ok(Self {
            url: cfg.url,
            permalink: cfg.permalink,
            verify: cfg.verify,
            timeout: None,
            progress: true,
            http,
        })
    }

    /// Sets a whole-request timeout. Without one, a stalled server blocks forever.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.timeout = Some(timeout);
        self.http = build_http(self.verify, self.timeout)?;
        Ok(self)
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.url
    }

    pub fn permalink(&self) -> &str {
        &self.permalink
    }

    /// Builds the request URL for `endpoint`, with `overrides` merged over the
    /// default query parameters.
    pub fn endpoint_url(&self, endpoint: Endpoint, overrides: &QueryParams) -> Result<Url> {
        let params = QueryParams::defaults().merged(overrides);
        build_url(&self.url, &self.permalink, endpoint.as_str(), &params)
    }

    /// Fetches one endpoint and returns its items.
    ///
    /// Transport, status and decoding failures are returned as errors; an
    /// unrecognized response shape is logged and yields no items.
    pub fn fetch_items(&self, endpoint: Endpoint, overrides: &QueryParams) -> Result<Vec<Value>> {
        let url = self.endpoint_url(endpoint, overrides)?;
        let data = self
            .fetch_json(&url)
            .with_context(|| format!("failed to fetch {}", endpoint))?;

        let extracted = extract_items(&data);
        log_extracted(endpoint, &extracted);
        Ok(extracted.items)
    }

    /// GETs `url` and parses the body as JSON.
    pub fn fetch_json(&self, url: &Url) -> Result<Value> {
        tracing::info!("fetching: {}", url);

        let pb = if self.progress {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::with_template("{spinner:.green} {msg} ({elapsed})")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb.set_message(url.path().to_string());
            pb.enable_steady_tick(Duration::from_millis(120));
            Some(pb)
        } else {
            None
        };

        let result = self.get_json(url);
        if let Some(pb) = &pb {
            pb.finish_and_clear();
        }
        result
    }

    fn get_json(&self, url: &Url) -> Result<Value> {
        let resp = self
            .http
            .get(url.clone())
            .send()
            .with_context(|| format!("could not connect to {}", url))?;

        let status = resp.status();
        let bytes = resp
            .bytes()
            .with_context(|| format!("failed to read response body (url={})", url))?;
        tracing::debug!(%status, len = bytes.len(), "response received");

        if !status.is_success() {
            let text = String::from_utf8_lossy(&bytes);
            if let Some(err) = parse_api_error(&text) {
                return Err(format_api_error(status, url.as_str(), &err));
            }

            bail!(
                "API request failed: HTTP {} for url ({})\n{}",
                status,
                url,
                text
            );
        }

        let text = std::str::from_utf8(&bytes)
            .with_context(|| format!("response body is not valid UTF-8 (url={})", url))?;
        serde_json::from_str::<Value>(text)
            .with_context(|| format!("failed to parse API JSON (url={}, status={})", url, status))
    }
}

fn log_extracted(endpoint: Endpoint, extracted: &Extracted) {
    match &extracted.shape {
        ResponseShape::UnknownObject(keys) => {
            tracing::info!("  dict keys for {}: {:?}", endpoint, keys);
        }
        shape => tracing::debug!(?shape, endpoint = %endpoint, "response shape"),
    }
    tracing::info!("  -> {} items", extracted.items.len());
}

fn build_http(verify: bool, timeout: Option<Duration>) -> Result<HttpClient> {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&format!("researchmap-export/{}", env!("CARGO_PKG_VERSION")))
            .unwrap_or(HeaderValue::from_static("researchmap-export")),
    );
    default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    // The blocking client defaults to a 30s timeout; `None` disables it.
    let mut builder = HttpClient::builder()
        .default_headers(default_headers)
        .timeout(timeout);

    if !verify {
        builder = builder.danger_accept_invalid_certs(true);
    }

    builder.build().context("failed to build HTTP client")
}
