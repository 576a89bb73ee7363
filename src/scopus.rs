//! Scopus Search API client
//!
//! Pages through `content/search/scopus` sorted by citation count and keeps
//! the entries that pass the citation and date filters of a [`SearchQuery`].
//!
//! API Details:
//! - Max 25 entries per page with the STANDARD view
//! - `start` is a zero-based entry offset
//! - Counts (`citedby-count`, `opensearch:totalResults`) arrive as strings
//! - An empty result set is reported as a single entry carrying `error`

use crate::config::ScopusConfig;
use crate::error::{Result, ScopusError};
use crate::query::{SearchQuery, View};
use futures::stream::{self, Stream, StreamExt};
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::VecDeque;
use tracing::{debug, info, warn};

/// Upstream page-size ceiling
pub const MAX_PAGE_SIZE: usize = 25;

/// Sentinel for fields upstream did not provide
pub const UNKNOWN: &str = "N/A";

/// Header carrying the API key
const API_KEY_HEADER: &str = "X-ELS-APIKey";

/// Sort order requested from upstream (most cited first)
const SORT_ORDER: &str = "citedby-count";

const DOI_RESOLVER: &str = "https://doi.org/";

/// One article that passed the filters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub title: Option<String>,
    pub authors: String,
    pub publication_date: String,
    pub citations: u64,
    pub journal: Option<String>,
    pub journal_link: String,
    pub doi_link: String,
}

// === Scopus API Response Types ===

#[derive(Debug, Deserialize)]
struct ScopusResponse {
    #[serde(rename = "search-results", default)]
    search_results: Option<SearchResults>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchResults {
    #[serde(rename = "opensearch:totalResults", default, deserialize_with = "lenient_count")]
    total_results: Option<u64>,
    #[serde(default)]
    entry: Option<Vec<ScopusEntry>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ScopusEntry {
    #[serde(rename = "dc:title")]
    title: Option<String>,
    #[serde(rename = "prism:doi")]
    doi: Option<String>,
    #[serde(rename = "prism:publicationName")]
    publication_name: Option<String>,
    #[serde(rename = "prism:url")]
    url: Option<String>,
    #[serde(rename = "citedby-count", default, deserialize_with = "lenient_count")]
    cited_by_count: Option<u64>,
    #[serde(rename = "prism:coverDate")]
    cover_date: Option<String>,
    #[serde(rename = "dc:creator")]
    creator: Option<String>,
    /// Only populated with the COMPLETE view
    #[serde(default)]
    author: Option<Vec<ScopusAuthor>>,
    error: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ScopusAuthor {
    #[serde(rename = "given-name")]
    given_name: Option<String>,
    surname: Option<String>,
}

/// Accept counts sent as strings, numbers, or nothing at all.
fn lenient_count<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }))
}

impl ScopusEntry {
    fn citations(&self) -> u64 {
        self.cited_by_count.unwrap_or(0)
    }

    fn into_record(self, view: View) -> ArticleRecord {
        let citations = self.citations();

        let doi_link = self
            .doi
            .as_deref()
            .map(str::trim)
            .filter(|doi| !doi.is_empty())
            .map(|doi| format!("{}{}", DOI_RESOLVER, doi))
            .unwrap_or_else(|| UNKNOWN.to_string());

        // Full author list with COMPLETE view, first author otherwise
        let author_list = match view {
            View::Complete => self.author.as_deref().map(join_authors).unwrap_or_default(),
            View::Standard => String::new(),
        };
        let authors = if author_list.is_empty() {
            self.creator.unwrap_or_else(|| UNKNOWN.to_string())
        } else {
            author_list
        };

        ArticleRecord {
            title: self.title,
            authors,
            publication_date: self.cover_date.unwrap_or_else(|| UNKNOWN.to_string()),
            citations,
            journal: self.publication_name,
            journal_link: self.url.unwrap_or_else(|| UNKNOWN.to_string()),
            doi_link,
        }
    }
}

fn join_authors(authors: &[ScopusAuthor]) -> String {
    authors
        .iter()
        .map(|a| {
            format!(
                "{} {}",
                a.given_name.as_deref().unwrap_or_default(),
                a.surname.as_deref().unwrap_or_default()
            )
            .trim()
            .to_string()
        })
        .filter(|name| !name.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// One page of upstream results
#[derive(Debug, Default)]
struct Page {
    entries: Vec<ScopusEntry>,
    total_results: Option<u64>,
}

/// Scopus search client.
///
/// Cloning is cheap; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct ScopusClient {
    client: Client,
    config: ScopusConfig,
}

impl ScopusClient {
    /// Create a client from resolved settings.
    pub fn new(config: ScopusConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("scopusfetch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ScopusError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Create a client from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::new(ScopusConfig::from_env()?)
    }

    pub fn config(&self) -> &ScopusConfig {
        &self.config
    }

    /// Lazily page through results for `query`.
    ///
    /// Pages are requested only as records are pulled. The stream ends after
    /// `query.limit` records, on an empty page, or on the first failed
    /// request (the failure is logged, not yielded).
    pub fn stream(&self, query: &SearchQuery) -> Result<impl Stream<Item = ArticleRecord>> {
        query.validate()?;

        let pager = Pager {
            client: self.clone(),
            page_size: query.limit.min(MAX_PAGE_SIZE),
            query: query.clone(),
            start: 0,
            pending: VecDeque::new(),
            exhausted: false,
        };

        let records = stream::unfold(pager, |mut pager| async move {
            pager.next_record().await.map(|record| (record, pager))
        });

        Ok(records.take(query.limit))
    }

    /// Collect up to `query.limit` matching records.
    pub async fn fetch(&self, query: &SearchQuery) -> Result<Vec<ArticleRecord>> {
        info!(
            topic = %query.topic,
            min_citations = query.min_citations,
            limit = query.limit,
            start_date = ?query.start_date,
            end_date = ?query.end_date,
            "Starting Scopus query"
        );

        let records: Vec<ArticleRecord> = self.stream(query)?.collect().await;

        info!(total = records.len(), "Scopus query complete");
        Ok(records)
    }

    /// Fetch a single page starting at entry offset `start`
    async fn fetch_page(&self, query: &SearchQuery, start: usize, count: usize) -> Result<Page> {
        debug!(start = start, count = count, "Fetching Scopus page");

        let response = self
            .client
            .get(self.config.base_url.clone())
            .header(ACCEPT, "application/json")
            .header(API_KEY_HEADER, &self.config.api_key)
            .query(&[
                ("query", query.expression()),
                ("count", count.to_string()),
                ("sort", SORT_ORDER.to_string()),
                ("view", query.view.as_param().to_string()),
                ("start", start.to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), error = %error_text, "Scopus API error");
            return Err(ScopusError::Api {
                code: status.as_u16(),
                message: error_text,
            });
        }

        let body: ScopusResponse = response
            .json()
            .await
            .map_err(|e| ScopusError::Parse(format!("Failed to parse Scopus response: {}", e)))?;

        let results = body.search_results.unwrap_or_default();
        let entries = results
            .entry
            .unwrap_or_default()
            .into_iter()
            .filter(|entry| match &entry.error {
                Some(reason) => {
                    debug!(reason = %reason, "Skipping error entry");
                    false
                }
                None => true,
            })
            .collect();

        Ok(Page {
            entries,
            total_results: results.total_results,
        })
    }
}

/// Pagination state behind [`ScopusClient::stream`]
struct Pager {
    client: ScopusClient,
    query: SearchQuery,
    page_size: usize,
    start: usize,
    pending: VecDeque<ScopusEntry>,
    exhausted: bool,
}

impl Pager {
    async fn next_record(&mut self) -> Option<ArticleRecord> {
        loop {
            while let Some(entry) = self.pending.pop_front() {
                if self.query.admits(entry.citations(), entry.cover_date.as_deref()) {
                    return Some(entry.into_record(self.query.view));
                }
                debug!(
                    title = entry.title.as_deref().unwrap_or(UNKNOWN),
                    citations = entry.citations(),
                    date = entry.cover_date.as_deref().unwrap_or(UNKNOWN),
                    "Entry filtered out"
                );
            }

            if self.exhausted {
                return None;
            }
            self.load_next_page().await;
        }
    }

    async fn load_next_page(&mut self) {
        match self.client.fetch_page(&self.query, self.start, self.page_size).await {
            Ok(page) if page.entries.is_empty() => {
                debug!(start = self.start, "Empty page, result set exhausted");
                self.exhausted = true;
            }
            Ok(page) => {
                info!(start = self.start, count = page.entries.len(), "Parsed Scopus page");
                self.start += self.page_size;
                if page.total_results.is_some_and(|total| self.start as u64 >= total) {
                    self.exhausted = true;
                }
                self.pending.extend(page.entries);
            }
            Err(e) => {
                warn!(start = self.start, error = %e, "Stopping pagination, returning partial results");
                self.exhausted = true;
            }
        }
    }
}

/// Fetch articles using configuration from the process environment.
///
/// A missing API key fails here, before any request is sent.
pub async fn fetch(query: &SearchQuery) -> Result<Vec<ArticleRecord>> {
    fetch_with(query, |key| std::env::var(key).ok()).await
}

/// Like [`fetch`], resolving configuration through `lookup`.
pub async fn fetch_with<F>(query: &SearchQuery, lookup: F) -> Result<Vec<ArticleRecord>>
where
    F: Fn(&str) -> Option<String>,
{
    let config = ScopusConfig::from_lookup(lookup)?;
    ScopusClient::new(config)?.fetch(query).await
}

/// Fetch by plain parameters; dates are `YYYY-MM-DD`.
///
/// # Arguments
///
/// * `topic` - Searched in title, abstract and keywords
/// * `min_citations` - Minimum citation count
/// * `limit` - Maximum number of articles returned
/// * `start_date` / `end_date` - Optional inclusive cover-date bounds
pub async fn get_articles(
    topic: &str,
    min_citations: u64,
    limit: usize,
    start_date: Option<&str>,
    end_date: Option<&str>,
) -> Result<Vec<ArticleRecord>> {
    let client = ScopusClient::from_env()?;
    let query = SearchQuery::new(topic)
        .with_min_citations(min_citations)
        .with_limit(limit)
        .with_date_range(start_date, end_date)?;
    client.fetch(&query).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{API_KEY_VAR, BASE_URL_VAR};
    use serde_json::{json, Value};
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SEARCH_PATH: &str = "/content/search/scopus";

    fn entry(i: usize, citations: u64, date: &str) -> Value {
        json!({
            "dc:title": format!("Paper {}", i),
            "prism:doi": format!("10.1000/p{}", i),
            "prism:publicationName": "Journal of Tests",
            "prism:url": format!("https://api.elsevier.com/content/abstract/scopus_id/{}", i),
            "citedby-count": citations.to_string(),
            "prism:coverDate": date,
            "dc:creator": "Doe J.",
        })
    }

    fn page_body(entries: Vec<Value>) -> Value {
        json!({ "search-results": { "entry": entries } })
    }

    fn entries(range: std::ops::Range<usize>) -> Vec<Value> {
        range.map(|i| entry(i, 1000 - i as u64, "2021-03-01")).collect()
    }

    async fn client_for(server: &MockServer) -> ScopusClient {
        let config = ScopusConfig::new("test-key")
            .unwrap()
            .with_base_url(&format!("{}{}", server.uri(), SEARCH_PATH))
            .unwrap();
        ScopusClient::new(config).unwrap()
    }

    async fn mount_page(server: &MockServer, start: usize, body: Value) {
        Mock::given(method("GET"))
            .and(path(SEARCH_PATH))
            .and(query_param("start", start.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    async fn request_count(server: &MockServer) -> usize {
        server.received_requests().await.map(|r| r.len()).unwrap_or(0)
    }

    #[test]
    fn test_into_record_derives_links() {
        let entry: ScopusEntry = serde_json::from_value(entry(7, 42, "2020-05-17")).unwrap();
        let record = entry.into_record(View::Standard);
        assert_eq!(record.title.as_deref(), Some("Paper 7"));
        assert_eq!(record.citations, 42);
        assert_eq!(record.doi_link, "https://doi.org/10.1000/p7");
        assert_eq!(record.publication_date, "2020-05-17");
        assert_eq!(record.authors, "Doe J.");
        assert_eq!(record.journal.as_deref(), Some("Journal of Tests"));
    }

    #[test]
    fn test_missing_fields_use_sentinel() {
        let entry: ScopusEntry = serde_json::from_value(json!({ "dc:title": null })).unwrap();
        let record = entry.into_record(View::Standard);
        assert_eq!(record.title, None);
        assert_eq!(record.journal, None);
        assert_eq!(record.citations, 0);
        assert_eq!(record.doi_link, UNKNOWN);
        assert_eq!(record.journal_link, UNKNOWN);
        assert_eq!(record.publication_date, UNKNOWN);
        assert_eq!(record.authors, UNKNOWN);
    }

    #[test]
    fn test_citation_count_formats() {
        let numeric: ScopusEntry = serde_json::from_value(json!({ "citedby-count": 12 })).unwrap();
        assert_eq!(numeric.citations(), 12);
        let garbage: ScopusEntry = serde_json::from_value(json!({ "citedby-count": "many" })).unwrap();
        assert_eq!(garbage.citations(), 0);
    }

    #[test]
    fn test_complete_view_author_list() {
        let raw = json!({
            "dc:creator": "Curie M.",
            "author": [
                { "given-name": "Marie", "surname": "Curie" },
                { "given-name": null, "surname": "Curie" },
                { }
            ]
        });
        let entry: ScopusEntry = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(entry.into_record(View::Complete).authors, "Marie Curie, Curie");

        let entry: ScopusEntry = serde_json::from_value(raw).unwrap();
        assert_eq!(entry.into_record(View::Standard).authors, "Curie M.");

        let entry: ScopusEntry =
            serde_json::from_value(json!({ "dc:creator": "Curie M.", "author": [] })).unwrap();
        assert_eq!(entry.into_record(View::Complete).authors, "Curie M.");
    }

    #[tokio::test]
    async fn test_sends_key_and_search_params() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SEARCH_PATH))
            .and(header("X-ELS-APIKey", "test-key"))
            .and(header("Accept", "application/json"))
            .and(query_param("query", "TITLE-ABS-KEY(deep learning)"))
            .and(query_param("count", "5"))
            .and(query_param("sort", "citedby-count"))
            .and(query_param("view", "STANDARD"))
            .and(query_param("start", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_body(entries(0..5))))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let query = SearchQuery::new("deep learning").with_limit(5);
        let records = client.fetch(&query).await.unwrap();
        assert_eq!(records.len(), 5);
    }

    #[tokio::test]
    async fn test_two_pages_limit_30() {
        let server = MockServer::start().await;
        mount_page(&server, 0, page_body(entries(0..25))).await;
        mount_page(&server, 25, page_body(entries(25..50))).await;

        let client = client_for(&server).await;
        let query = SearchQuery::new("graphene").with_limit(30);
        let records = client.fetch(&query).await.unwrap();

        assert_eq!(records.len(), 30);
        assert_eq!(request_count(&server).await, 2);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.title.as_deref(), Some(format!("Paper {}", i).as_str()));
        }
    }

    #[tokio::test]
    async fn test_server_error_returns_partial_results() {
        let server = MockServer::start().await;
        mount_page(&server, 0, page_body(entries(0..5))).await;
        Mock::given(method("GET"))
            .and(path(SEARCH_PATH))
            .and(query_param("start", "10"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let query = SearchQuery::new("graphene").with_limit(10);
        let records = client.fetch(&query).await.unwrap();

        assert_eq!(records.len(), 5);
        assert_eq!(request_count(&server).await, 2);
        assert_eq!(records[4].title.as_deref(), Some("Paper 4"));
    }

    #[tokio::test]
    async fn test_empty_first_page() {
        let server = MockServer::start().await;
        mount_page(&server, 0, page_body(vec![])).await;

        let client = client_for(&server).await;
        let records = client.fetch(&SearchQuery::new("nothing")).await.unwrap();
        assert!(records.is_empty());
        assert_eq!(request_count(&server).await, 1);
    }

    #[tokio::test]
    async fn test_empty_result_sentinel_entry() {
        let server = MockServer::start().await;
        let body = json!({
            "search-results": {
                "opensearch:totalResults": "0",
                "entry": [{ "@_fa": "true", "error": "Result set was empty" }]
            }
        });
        mount_page(&server, 0, body).await;

        let client = client_for(&server).await;
        let records = client.fetch(&SearchQuery::new("nothing")).await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_missing_key_sends_no_request() {
        let server = MockServer::start().await;
        let base_url = format!("{}{}", server.uri(), SEARCH_PATH);

        let err = fetch_with(&SearchQuery::new("graphene"), |key| {
            (key == BASE_URL_VAR).then(|| base_url.clone())
        })
        .await
        .unwrap_err();

        assert!(matches!(err, ScopusError::Config(_)));
        assert_eq!(request_count(&server).await, 0);
    }

    #[tokio::test]
    async fn test_fetch_with_resolves_config() {
        let server = MockServer::start().await;
        mount_page(&server, 0, page_body(entries(0..3))).await;
        let base_url = format!("{}{}", server.uri(), SEARCH_PATH);

        let records = fetch_with(&SearchQuery::new("graphene").with_limit(3), |key| match key {
            k if k == API_KEY_VAR => Some("test-key".to_string()),
            k if k == BASE_URL_VAR => Some(base_url.clone()),
            _ => None,
        })
        .await
        .unwrap();
        assert_eq!(records.len(), 3);
    }

    #[tokio::test]
    async fn test_citation_threshold_spans_pages() {
        let server = MockServer::start().await;
        let first: Vec<Value> = (0..4).map(|i| entry(i, if i % 2 == 0 { 100 } else { 3 }, "2021-01-01")).collect();
        let second: Vec<Value> = (4..8).map(|i| entry(i, if i % 2 == 0 { 100 } else { 3 }, "2021-01-01")).collect();
        mount_page(&server, 0, page_body(first)).await;
        mount_page(&server, 4, page_body(second)).await;
        mount_page(&server, 8, page_body(vec![])).await;

        let client = client_for(&server).await;
        let query = SearchQuery::new("graphene").with_limit(4).with_min_citations(10);
        let records = client.fetch(&query).await.unwrap();

        assert_eq!(records.len(), 4);
        assert!(records.iter().all(|r| r.citations >= 10));
        let titles: Vec<_> = records.iter().filter_map(|r| r.title.clone()).collect();
        assert_eq!(titles, vec!["Paper 0", "Paper 2", "Paper 4", "Paper 6"]);
        assert_eq!(request_count(&server).await, 2);
    }

    #[tokio::test]
    async fn test_date_range_filtering() {
        let server = MockServer::start().await;
        let body = page_body(vec![
            entry(0, 50, "2019-12-31"),
            entry(1, 40, "2020-01-01"),
            entry(2, 30, "garbled"),
            entry(3, 20, "2020-12-31"),
            entry(4, 10, "2021-01-01"),
            json!({ "dc:title": "Undated", "citedby-count": "5" }),
        ]);
        mount_page(&server, 0, body).await;
        mount_page(&server, 10, page_body(vec![])).await;

        let client = client_for(&server).await;
        let query = SearchQuery::new("graphene")
            .with_date_range(Some("2020-01-01"), Some("2020-12-31"))
            .unwrap();
        let records = client.fetch(&query).await.unwrap();

        let titles: Vec<_> = records.iter().filter_map(|r| r.title.clone()).collect();
        assert_eq!(titles, vec!["Paper 1", "Paper 3", "Undated"]);
        assert_eq!(records[2].publication_date, UNKNOWN);
    }

    #[tokio::test]
    async fn test_unparseable_date_kept_without_bounds() {
        let server = MockServer::start().await;
        mount_page(&server, 0, page_body(vec![entry(0, 1, "garbled")])).await;
        mount_page(&server, 10, page_body(vec![])).await;

        let client = client_for(&server).await;
        let records = client.fetch(&SearchQuery::new("graphene")).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].publication_date, "garbled");
    }

    #[tokio::test]
    async fn test_missing_doi_is_unknown() {
        let server = MockServer::start().await;
        let mut without_doi = entry(0, 9, "2022-02-02");
        without_doi["prism:doi"] = Value::Null;
        let mut absent_doi = entry(1, 8, "2022-02-02");
        absent_doi.as_object_mut().unwrap().remove("prism:doi");
        mount_page(&server, 0, page_body(vec![without_doi, absent_doi])).await;

        let client = client_for(&server).await;
        let records = client.fetch(&SearchQuery::new("graphene").with_limit(2)).await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.doi_link == UNKNOWN));
    }

    #[tokio::test]
    async fn test_total_results_stops_paging() {
        let server = MockServer::start().await;
        let body = json!({
            "search-results": {
                "opensearch:totalResults": "3",
                "entry": entries(0..3)
            }
        });
        mount_page(&server, 0, body).await;

        let client = client_for(&server).await;
        let records = client.fetch(&SearchQuery::new("graphene")).await.unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(request_count(&server).await, 1);
    }

    #[tokio::test]
    async fn test_stream_is_lazy() {
        let server = MockServer::start().await;
        mount_page(&server, 0, page_body(entries(0..25))).await;
        mount_page(&server, 25, page_body(entries(25..50))).await;

        let client = client_for(&server).await;
        let query = SearchQuery::new("graphene").with_limit(50);
        let stream = client.stream(&query).unwrap();
        let first: Vec<ArticleRecord> = stream.take(3).collect().await;

        assert_eq!(first.len(), 3);
        assert_eq!(request_count(&server).await, 1);
    }

    #[tokio::test]
    async fn test_invalid_query_sends_no_request() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;

        let err = client.fetch(&SearchQuery::new("graphene").with_limit(0)).await.unwrap_err();
        assert!(matches!(err, ScopusError::Validation(_)));
        assert_eq!(request_count(&server).await, 0);
    }
}
