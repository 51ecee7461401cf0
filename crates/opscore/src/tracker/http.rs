//! HttpTracker: REST client for the tracker API (v2).
//!
//! Features:
//! - OAuth token + organization header on every request
//! - Request pacing through a shared `RateLimiter`
//! - Retries with backoff, honouring `Retry-After`: reads and updates on
//!   429/5xx/transport errors, creations only on 429 and refused connections
//! - Transparent pagination for issue and entity searches

use crate::core::config::{self, OrgId, TrackerSettings};
use crate::core::error::AppResult;
use crate::core::metrics;
use crate::core::rate_limiter::RateLimiter;
use crate::core::retry::{retry, Idempotency, RetryPolicy};
use crate::tracker::{EntityKind, Record, TrackerError, TrackerGateway, TrackerResult};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, AUTHORIZATION, RETRY_AFTER};
use reqwest::{Client, Method};
use serde_json::{json, Value};
use std::time::{Duration, Instant};

/// Header carrying the page count of a paginated answer.
const TOTAL_PAGES_HEADER: &str = "X-Total-Pages";

/// Hard stop for pagination loops against a misbehaving server.
const MAX_PAGES: u32 = 10_000;

/// Longest error body excerpt kept in an error message.
const MAX_ERROR_EXCERPT: usize = 300;

/// Tracker gateway speaking the REST API over reqwest.
pub struct HttpTracker {
    client: Client,
    api_url: String,
    token: String,
    org: OrgId,
    retry: RetryPolicy,
    limiter: RateLimiter,
    page_size: u32,
}

/// A decoded answer plus the pagination hint that came with it.
struct Page {
    body: Value,
    total_pages: Option<u32>,
}

impl HttpTracker {
    /// Creates a client with default retry, pacing and page size.
    ///
    /// # Errors
    /// Fails only when the TLS backend cannot be initialized.
    pub fn new(settings: TrackerSettings) -> AppResult<Self> {
        let client = Client::builder()
            .user_agent(concat!("opsdesk/", env!("CARGO_PKG_VERSION")))
            .timeout(config::network::timeout())
            .connect_timeout(config::network::connect_timeout())
            .build()
            .map_err(TrackerError::from)?;

        Ok(Self {
            client,
            api_url: settings.api_url,
            token: settings.token,
            org: settings.org,
            retry: RetryPolicy::default(),
            limiter: RateLimiter::default(),
            page_size: config::network::PAGE_SIZE,
        })
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Sends one call, repeating it as far as `idempotency` allows.
    async fn request(
        &self,
        operation: &'static str,
        method: Method,
        idempotency: Idempotency,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> TrackerResult<Page> {
        let url = format!("{}{}", self.api_url, path);
        let started = Instant::now();

        let result = retry(&self.retry, operation, idempotency, || {
            self.send_once(operation, method.clone(), &url, query, body)
        })
        .await;

        metrics::record_tracker_request(operation, result.is_ok(), started.elapsed());
        if let Err(e) = &result {
            log::debug!("{} {} failed: {}", method, path, e);
        }
        result
    }

    async fn send_once(
        &self,
        operation: &'static str,
        method: Method,
        url: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> TrackerResult<Page> {
        self.limiter.acquire().await;

        let mut request = self
            .client
            .request(method, url)
            .header(AUTHORIZATION, format!("OAuth {}", self.token))
            .header(self.org.header_name(), self.org.value());
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(TrackerError::Status {
                operation,
                status,
                message: error_message(&text),
                retry_after: retry_after(&headers),
            });
        }

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).map_err(|e| TrackerError::Decode {
                operation,
                message: e.to_string(),
            })?
        };

        Ok(Page {
            body,
            total_pages: header_u32(&headers, TOTAL_PAGES_HEADER),
        })
    }

    async fn get_list(&self, operation: &'static str, path: &str) -> TrackerResult<Vec<Record>> {
        let page = self
            .request(operation, Method::GET, Idempotency::Idempotent, path, &[], None)
            .await?;
        into_list(operation, page.body)
    }
}

#[async_trait]
impl TrackerGateway for HttpTracker {
    async fn get_entity(&self, kind: EntityKind, id: &str, fields: &[&str]) -> TrackerResult<Record> {
        let path = format!("/v2/entities/{}/{}", kind, segment(id));
        let query = fields_query(fields);
        let page = self
            .request("get_entity", Method::GET, Idempotency::Idempotent, &path, &query, None)
            .await?;
        Ok(page.body)
    }

    async fn search_entities(
        &self,
        kind: EntityKind,
        filter: Option<&Value>,
        fields: &[&str],
    ) -> TrackerResult<Vec<Record>> {
        let path = format!("/v2/entities/{}/_search", kind);
        let body = match filter {
            Some(filter) => json!({ "filter": filter }),
            None => json!({}),
        };

        let mut all = Vec::new();
        let mut page_no = 1;
        loop {
            let mut query = fields_query(fields);
            query.push(("perPage", self.page_size.to_string()));
            query.push(("page", page_no.to_string()));

            let page = self
                .request("search_entities", Method::POST, Idempotency::Idempotent, &path, &query, Some(&body))
                .await?;

            // Entity search answers `{hits, pages, values}`; tolerate a bare array too.
            let pages = page
                .body
                .get("pages")
                .and_then(Value::as_u64)
                .and_then(|p| u32::try_from(p).ok())
                .or(page.total_pages);
            let values = match page.body {
                Value::Object(mut map) => map.remove("values").unwrap_or(Value::Array(Vec::new())),
                other => other,
            };
            let values = into_list("search_entities", values)?;
            let fetched = values.len();
            all.extend(values);

            match next_page(page_no, pages, fetched, self.page_size) {
                Some(next) => page_no = next,
                None => break,
            }
        }
        Ok(all)
    }

    async fn create_entity(&self, kind: EntityKind, fields: &Value) -> TrackerResult<Record> {
        let path = format!("/v2/entities/{}", kind);
        let body = json!({ "fields": fields });
        let page = self
            .request("create_entity", Method::POST, Idempotency::NonIdempotent, &path, &[], Some(&body))
            .await?;
        Ok(page.body)
    }

    async fn get_issue(&self, key: &str) -> TrackerResult<Record> {
        let path = format!("/v2/issues/{}", segment(key));
        let page = self
            .request("get_issue", Method::GET, Idempotency::Idempotent, &path, &[], None)
            .await?;
        Ok(page.body)
    }

    async fn search_issues(&self, filter: &Value) -> TrackerResult<Vec<Record>> {
        let body = json!({ "filter": filter });

        let mut all = Vec::new();
        let mut page_no = 1;
        loop {
            let query = [("perPage", self.page_size.to_string()), ("page", page_no.to_string())];
            let page = self
                .request(
                    "search_issues",
                    Method::POST,
                    Idempotency::Idempotent,
                    "/v2/issues/_search",
                    &query,
                    Some(&body),
                )
                .await?;
            let issues = into_list("search_issues", page.body)?;
            let fetched = issues.len();
            all.extend(issues);

            match next_page(page_no, page.total_pages, fetched, self.page_size) {
                Some(next) => page_no = next,
                None => break,
            }
        }
        Ok(all)
    }

    async fn create_issue(&self, fields: &Value) -> TrackerResult<Record> {
        let page = self
            .request("create_issue", Method::POST, Idempotency::NonIdempotent, "/v2/issues/", &[], Some(fields))
            .await?;
        Ok(page.body)
    }

    async fn update_issue(&self, key: &str, fields: &Value) -> TrackerResult<Record> {
        let path = format!("/v2/issues/{}", segment(key));
        let page = self
            .request("update_issue", Method::PATCH, Idempotency::Idempotent, &path, &[], Some(fields))
            .await?;
        Ok(page.body)
    }

    async fn get_checklist(&self, key: &str) -> TrackerResult<Vec<Record>> {
        self.get_list("get_checklist", &format!("/v2/issues/{}/checklistItems", segment(key)))
            .await
    }

    async fn create_checklist_item(&self, key: &str, text: &str, checked: bool) -> TrackerResult<()> {
        let path = format!("/v2/issues/{}/checklistItems", segment(key));
        let body = json!({ "text": text, "checked": checked });
        self.request(
            "create_checklist_item",
            Method::POST,
            Idempotency::NonIdempotent,
            &path,
            &[],
            Some(&body),
        )
        .await?;
        Ok(())
    }

    async fn get_links(&self, key: &str) -> TrackerResult<Vec<Record>> {
        self.get_list("get_links", &format!("/v2/issues/{}/links", segment(key)))
            .await
    }

    async fn create_link(&self, key: &str, relationship: &str, target: &str) -> TrackerResult<()> {
        let path = format!("/v2/issues/{}/links", segment(key));
        let body = json!({ "relationship": relationship, "issue": target });
        self.request("create_link", Method::POST, Idempotency::NonIdempotent, &path, &[], Some(&body))
            .await?;
        Ok(())
    }

    async fn get_comments(&self, key: &str) -> TrackerResult<Vec<Record>> {
        self.get_list("get_comments", &format!("/v2/issues/{}/comments", segment(key)))
            .await
    }

    async fn create_comment(&self, key: &str, text: &str) -> TrackerResult<()> {
        let path = format!("/v2/issues/{}/comments", segment(key));
        let body = json!({ "text": text });
        self.request("create_comment", Method::POST, Idempotency::NonIdempotent, &path, &[], Some(&body))
            .await?;
        Ok(())
    }
}

/// Percent-encodes one path segment.
fn segment(raw: &str) -> String {
    url::form_urlencoded::byte_serialize(raw.as_bytes()).collect()
}

fn fields_query(fields: &[&str]) -> Vec<(&'static str, String)> {
    if fields.is_empty() {
        Vec::new()
    } else {
        vec![("fields", fields.join(","))]
    }
}

fn into_list(operation: &'static str, body: Value) -> TrackerResult<Vec<Record>> {
    match body {
        Value::Array(items) => Ok(items),
        Value::Null => Ok(Vec::new()),
        other => Err(TrackerError::Decode {
            operation,
            message: format!("expected a JSON array, got {}", kind_of(&other)),
        }),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Decides whether another page must be requested.
///
/// With a page count from the server it is authoritative. Without one, a
/// full page means "maybe more" and a short page ends the scan.
fn next_page(current: u32, total_pages: Option<u32>, fetched: usize, page_size: u32) -> Option<u32> {
    if current >= MAX_PAGES {
        log::warn!("Pagination stopped after {} pages", MAX_PAGES);
        return None;
    }
    match total_pages {
        Some(total) => (current < total).then_some(current + 1),
        None => (fetched > 0 && fetched >= page_size as usize).then_some(current + 1),
    }
}

fn header_u32(headers: &HeaderMap, name: &str) -> Option<u32> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Human-readable message out of an error body.
///
/// The tracker answers `{"errors": {...}, "errorMessages": [...]}`; anything
/// else is quoted (shortened).
fn error_message(body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<Value>(body) {
        let mut messages: Vec<String> = parsed
            .get("errorMessages")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default();

        if let Some(errors) = parsed.get("errors").and_then(Value::as_object) {
            messages.extend(
                errors
                    .iter()
                    .filter_map(|(field, msg)| msg.as_str().map(|m| format!("{field}: {m}"))),
            );
        }

        if !messages.is_empty() {
            return messages.join("; ");
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response body".to_string();
    }
    trimmed.chars().take(MAX_ERROR_EXCERPT).collect()
}
