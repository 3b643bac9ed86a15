use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use regex::Regex;
use spider_client::shapes::request::{ReturnFormat, ReturnFormatHandling};
use spider_client::{RequestParams, Spider};
use thiserror::Error;
use tracing::{debug, warn};

use crate::identity::short_hash;

static IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").unwrap());
static BLANKS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());
static SLUG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^A-Za-z0-9]+").unwrap());

const BASE_BACKOFF_MS: u64 = 2000;
const MAX_SLUG: usize = 120;
const USER_AGENT: &str = "Mozilla/5.0 (compatible; hkacadjobs)";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("SPIDER_API_KEY is not set")]
    MissingApiKey,
    #[error("spider request for {url} failed: {message}")]
    Spider { url: String, message: String },
    #[error("{url} answered with status {status}")]
    Status { url: String, status: i64 },
    #[error("no content in spider response for {0}")]
    EmptyContent(String),
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} did not answer with JSON: {source}")]
    Json {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    fn is_retryable(&self) -> bool {
        match self {
            FetchError::Spider { message, .. } => {
                ["429", "rate", "500", "502", "503"].iter().any(|code| message.contains(code))
            }
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            FetchError::Http { source, .. } => source.is_timeout() || source.is_connect(),
            _ => false,
        }
    }
}

/// Turns a listing URL into page markdown, or an API URL into JSON.
pub enum Fetcher {
    /// Live rendering through spider.cloud; JSON endpoints are called directly.
    Spider {
        spider: Spider,
        http: reqwest::Client,
        max_retries: u32,
    },
    /// Saved dumps, one `<slug>.md` (pages) or `<slug>.json` (API answers)
    /// file per URL.
    Dir(PathBuf),
}

impl Fetcher {
    pub fn spider(api_key: Option<String>, max_retries: u32) -> Result<Self, FetchError> {
        let api_key = api_key
            .or_else(|| std::env::var("SPIDER_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
            .ok_or(FetchError::MissingApiKey)?;
        let spider = Spider::new(Some(api_key)).map_err(|e| FetchError::Spider {
            url: String::new(),
            message: e.to_string(),
        })?;
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(20))
            .build()
            .map_err(|source| FetchError::Http { url: String::new(), source })?;
        Ok(Fetcher::Spider { spider, http, max_retries })
    }

    pub fn dir(path: impl Into<PathBuf>) -> Self {
        Fetcher::Dir(path.into())
    }

    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        match self {
            Fetcher::Spider { spider, max_retries, .. } => {
                scrape_with_retry(spider, url, *max_retries).await
            }
            Fetcher::Dir(dir) => read_dump(dir, &dump_name(url)).await,
        }
    }

    /// GET a JSON endpoint, sending the extra `headers` the site expects.
    pub async fn fetch_json(
        &self,
        url: &str,
        headers: &[(&'static str, String)],
    ) -> Result<serde_json::Value, FetchError> {
        let body = match self {
            Fetcher::Spider { http, max_retries, .. } => {
                get_with_retry(http, url, headers, *max_retries).await?
            }
            Fetcher::Dir(dir) => read_dump(dir, &json_dump_name(url)).await?,
        };
        serde_json::from_str(&body).map_err(|source| FetchError::Json { url: url.to_string(), source })
    }
}

/// URL with every non-alphanumeric run replaced by `_`. Long slugs keep a
/// prefix and end in a hash of the whole URL.
fn slug(url: &str) -> String {
    let slug = SLUG_RE.replace_all(url, "_");
    let slug = slug.trim_matches('_');
    if slug.len() <= MAX_SLUG {
        return slug.to_string();
    }
    let head = slug[..MAX_SLUG - 11].trim_end_matches('_');
    format!("{head}_{}", short_hash(url))
}

/// File name a page dump is stored under.
pub fn dump_name(url: &str) -> String {
    format!("{}.md", slug(url))
}

/// File name a saved API answer is stored under.
pub fn json_dump_name(url: &str) -> String {
    format!("{}.json", slug(url))
}

async fn read_dump(dir: &Path, name: &str) -> Result<String, FetchError> {
    let path = dir.join(name);
    debug!(path = ?path, "reading dump");
    tokio::fs::read_to_string(&path)
        .await
        .map_err(|source| FetchError::Io { path, source })
}

async fn scrape_with_retry(spider: &Spider, url: &str, max_retries: u32) -> Result<String, FetchError> {
    let mut attempt = 0;
    loop {
        match scrape_one(spider, url).await {
            Err(e) if e.is_retryable() && attempt < max_retries => {
                let backoff = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt));
                warn!(
                    "{} on {} (attempt {}/{}), backing off {:.1}s",
                    e,
                    url,
                    attempt + 1,
                    max_retries,
                    backoff.as_secs_f64()
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}

async fn get_with_retry(
    http: &reqwest::Client,
    url: &str,
    headers: &[(&'static str, String)],
    max_retries: u32,
) -> Result<String, FetchError> {
    let mut attempt = 0;
    loop {
        match get_one(http, url, headers).await {
            Err(e) if e.is_retryable() && attempt < max_retries => {
                let backoff = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt));
                warn!("{} (attempt {}/{}), backing off {:.1}s", e, attempt + 1, max_retries, backoff.as_secs_f64());
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}

async fn get_one(
    http: &reqwest::Client,
    url: &str,
    headers: &[(&'static str, String)],
) -> Result<String, FetchError> {
    let http_err = |source| FetchError::Http { url: url.to_string(), source };

    let request = headers
        .iter()
        .fold(http.get(url), |req, (name, value)| req.header(*name, value.as_str()));
    let start = Instant::now();
    let response = request.send().await.map_err(http_err)?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status { url: url.to_string(), status: i64::from(status.as_u16()) });
    }
    let body = response.text().await.map_err(http_err)?;
    debug!(url, latency_ms = start.elapsed().as_millis() as u64, bytes = body.len(), "fetched json");
    Ok(body)
}

async fn scrape_one(spider: &Spider, url: &str) -> Result<String, FetchError> {
    let params = RequestParams {
        return_format: Some(ReturnFormatHandling::Single(ReturnFormat::Markdown)),
        ..Default::default()
    };

    let start = Instant::now();
    let response = spider
        .scrape_url(url, Some(params), "application/json")
        .await
        .map_err(|e| FetchError::Spider {
            url: url.to_string(),
            message: e.to_string(),
        })?;
    debug!(url, latency_ms = start.elapsed().as_millis() as u64, "scraped");

    let parsed: serde_json::Value = match response.as_str() {
        Some(s) => serde_json::from_str(s).unwrap_or(response.clone()),
        None => response,
    };
    let first = parsed.as_array().and_then(|arr| arr.first());

    if let Some(status) = first.and_then(|obj| obj.get("status")).and_then(|s| s.as_i64()) {
        if status >= 400 {
            return Err(FetchError::Status { url: url.to_string(), status });
        }
    }

    first
        .and_then(|obj| obj.get("content"))
        .and_then(|c| c.as_str())
        .map(strip_images)
        .ok_or_else(|| FetchError::EmptyContent(url.to_string()))
}

/// Remove markdown images (`![alt](url)`) and squeeze the blank runs they leave.
fn strip_images(md: &str) -> String {
    let cleaned = IMAGE_RE.replace_all(md, "");
    BLANKS_RE.replace_all(&cleaned, "\n\n").to_string()
}
