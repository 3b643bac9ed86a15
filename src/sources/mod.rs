pub mod cityu;
pub mod cuhk;
pub mod eduhk;
pub mod hkbu;
pub mod hku;
pub mod hkust;
pub mod linklist;
pub mod polyu;

use std::sync::Arc;

use indicatif::ProgressBar;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::fetch::{FetchError, Fetcher};
use crate::model::{RawJobRecord, University};

/// A listing page a source reads, with the label the page stands for
/// (category, declared position type).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub url: String,
    pub label: &'static str,
}

impl Listing {
    pub fn new(url: impl Into<String>, label: &'static str) -> Self {
        Listing { url: url.into(), label }
    }
}

#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub listing: Listing,
    pub markdown: String,
}

/// A JSON search endpoint paged with `limit`/`offset` whose answers read
/// `{"items": [...], "hasMore": bool}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonFeed {
    /// Endpoint with every query parameter except `limit` and `offset`.
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub page_size: usize,
    /// Last offset requested.
    pub max_offset: usize,
}

impl JsonFeed {
    pub fn page_url(&self, offset: usize) -> String {
        let sep = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{}limit={}&offset={}", self.url, sep, self.page_size, offset)
    }
}

/// One institution's job listings.
pub trait RawRecordSource: Send + Sync {
    fn university(&self) -> &'static University;

    fn listings(&self) -> Vec<Listing>;

    /// Mine records from the fetched pages, which arrive in `listings()`
    /// order (pages that failed to fetch are missing).
    fn parse(&self, pages: &[FetchedPage]) -> Vec<RawJobRecord>;

    /// Structured endpoint tried before the listing pages.
    fn feed(&self) -> Option<JsonFeed> {
        None
    }

    /// Records from every item the feed returned.
    fn parse_feed(&self, _items: &[serde_json::Value]) -> Vec<RawJobRecord> {
        Vec::new()
    }
}

/// Every source that can be harvested, keyed by university key.
pub fn source_for(key: &str) -> Option<Box<dyn RawRecordSource>> {
    match key.trim().to_lowercase().as_str() {
        "polyu" => Some(Box::new(polyu::PolyU)),
        "eduhk" => Some(Box::new(eduhk::EdUhk)),
        "lingnan" | "lu" => Some(Box::new(linklist::lingnan())),
        "hku" => Some(Box::new(hku::Hku)),
        "hkust" => Some(Box::new(hkust::Hkust)),
        "cityu" => Some(Box::new(cityu::CityU)),
        "hkbu" => Some(Box::new(hkbu::Hkbu::default())),
        "cuhk" => Some(Box::new(cuhk::Cuhk)),
        _ => None,
    }
}

/// Fetch every listing of `source` and parse the pages. A source with a
/// JSON feed is read from the feed, and only falls back to its pages when the
/// feed fails.
///
/// Never fails: pages that cannot be fetched are logged and skipped, so a
/// dead site simply yields no records.
pub async fn produce(
    source: &dyn RawRecordSource,
    fetcher: Arc<Fetcher>,
    concurrency: usize,
    pb: &ProgressBar,
) -> Vec<RawJobRecord> {
    let uni = source.university();

    if let Some(feed) = source.feed() {
        match read_feed(&feed, &fetcher).await {
            Ok(items) => {
                let records = source.parse_feed(&items);
                pb.inc(source.listings().len() as u64);
                info!(university = uni.code, items = items.len(), records = records.len(), "feed harvested");
                return records;
            }
            Err(e) => warn!(university = uni.code, "feed failed, reading listing pages: {}", e),
        }
    }

    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));

    let handles: Vec<_> = source
        .listings()
        .into_iter()
        .map(|listing| {
            let fetcher = Arc::clone(&fetcher);
            let sem = Arc::clone(&semaphore);
            tokio::spawn(async move {
                let _permit = sem.acquire().await;
                let result = fetcher.fetch(&listing.url).await;
                (listing, result)
            })
        })
        .collect();

    let mut pages = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok((listing, Ok(markdown))) => pages.push(FetchedPage { listing, markdown }),
            Ok((listing, Err(e))) => {
                warn!(university = uni.code, url = %listing.url, "fetch failed: {}", e)
            }
            Err(e) => warn!(university = uni.code, "fetch task failed: {}", e),
        }
        pb.inc(1);
    }

    let records = source.parse(&pages);
    info!(
        university = uni.code,
        pages = pages.len(),
        records = records.len(),
        "source harvested"
    );
    records
}

/// Every item of a paged feed, in page order. Stops at the first page that
/// is empty or says there is nothing more.
async fn read_feed(feed: &JsonFeed, fetcher: &Fetcher) -> Result<Vec<serde_json::Value>, FetchError> {
    let mut items = Vec::new();
    let mut offset = 0;
    while offset <= feed.max_offset {
        let page = fetcher.fetch_json(&feed.page_url(offset), &feed.headers).await?;
        let batch = page.get("items").and_then(|v| v.as_array()).cloned().unwrap_or_default();
        let has_more = page.get("hasMore").and_then(|v| v.as_bool()).unwrap_or(false);
        debug!(url = %feed.url, offset, items = batch.len(), has_more, "feed page");

        let done = batch.is_empty() || !has_more;
        items.extend(batch);
        if done {
            break;
        }
        offset += feed.page_size.max(1);
    }
    Ok(items)
}

/// Split `"Title, Department"` at its last comma.
pub(crate) fn split_last_comma(full: &str) -> (String, Option<String>) {
    match full.rsplit_once(',') {
        Some((title, dept)) if !title.trim().is_empty() && !dept.trim().is_empty() => {
            (title.trim().to_string(), Some(dept.trim().to_string()))
        }
        _ => (full.trim().to_string(), None),
    }
}

/// `href` resolved against a site root.
pub(crate) fn absolute(base: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else if href.starts_with('/') {
        format!("{base}{href}")
    } else {
        format!("{base}/{href}")
    }
}

/// First `n` characters of `s`.
pub(crate) fn prefix(s: &str, n: usize) -> &str {
    s.char_indices().nth(n).map_or(s, |(i, _)| &s[..i])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UNIVERSITIES;

    #[test]
    fn comma_split() {
        assert_eq!(
            split_last_comma("Senior HR Officer, Human Resources Office"),
            ("Senior HR Officer".to_string(), Some("Human Resources Office".to_string()))
        );
        assert_eq!(
            split_last_comma("Lecturer, Part-time, Dept of History"),
            ("Lecturer, Part-time".to_string(), Some("Dept of History".to_string()))
        );
        assert_eq!(split_last_comma("Professor"), ("Professor".to_string(), None));
        assert_eq!(split_last_comma("Professor,"), ("Professor,".to_string(), None));
    }

    #[test]
    fn absolute_links() {
        assert_eq!(absolute("https://jobs.hku.hk", "/en/job/1"), "https://jobs.hku.hk/en/job/1");
        assert_eq!(absolute("https://jobs.hku.hk", "https://x/y"), "https://x/y");
        assert_eq!(absolute("https://www.cityu.edu.hk", "Vacancy.aspx?ref=A1"), "https://www.cityu.edu.hk/Vacancy.aspx?ref=A1");
    }

    #[test]
    fn char_prefix() {
        assert_eq!(prefix("abcdef", 3), "abc");
        assert_eq!(prefix("ab", 3), "ab");
        assert_eq!(prefix("講師職位", 2), "講師");
    }

    #[test]
    fn sources_match_their_university() {
        for uni in UNIVERSITIES.iter().copied() {
            if let Some(source) = source_for(uni.key) {
                assert_eq!(source.university(), uni);
                assert!(!source.listings().is_empty());
            }
        }
        assert!(source_for("mit").is_none());
    }

    #[test]
    fn every_university_has_a_source() {
        for uni in UNIVERSITIES.iter().copied() {
            assert!(source_for(uni.key).is_some(), "{}", uni.key);
        }
    }

    #[test]
    fn feed_pages() {
        let feed = JsonFeed {
            url: "https://api.example/jobs?onlyData=true".into(),
            headers: Vec::new(),
            page_size: 25,
            max_offset: 1000,
        };
        assert_eq!(feed.page_url(50), "https://api.example/jobs?onlyData=true&limit=25&offset=50");
    }

    #[tokio::test]
    async fn feed_read_until_no_more() {
        let fetcher = Fetcher::dir("tests/fixtures");
        let feed = JsonFeed {
            url: "https://api.example/feed".into(),
            headers: Vec::new(),
            page_size: 2,
            max_offset: 1000,
        };
        let items = read_feed(&feed, &fetcher).await.unwrap();
        let ids: Vec<_> = items.iter().filter_map(|i| i["Id"].as_i64()).collect();
        assert_eq!(ids, [1, 2, 3]);
    }

    #[tokio::test]
    async fn feed_stops_at_max_offset() {
        let fetcher = Fetcher::dir("tests/fixtures");
        let feed = JsonFeed {
            url: "https://api.example/feed".into(),
            headers: Vec::new(),
            page_size: 2,
            max_offset: 0,
        };
        assert_eq!(read_feed(&feed, &fetcher).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn failed_pages_yield_nothing() {
        let fetcher = Arc::new(Fetcher::dir("tests/fixtures/empty"));
        let source = source_for("hkust").unwrap();
        let records = produce(source.as_ref(), fetcher, 2, &ProgressBar::hidden()).await;
        assert!(records.is_empty());
    }
}
