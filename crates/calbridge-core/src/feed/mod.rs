//! Source feed fetching.
//!
//! The fetcher owns the retry budget: a fixed number of attempts with a
//! fixed delay between them, retrying on transport errors, non-2xx
//! statuses, and HTML error pages served where feed data was expected.
//! Fetching is all-or-nothing; no partial snapshot is ever returned.

pub mod ics;

use std::time::Duration;

use url::Url;

use crate::error::FeedError;
use crate::model::{Snapshot, SourceEvent};

/// Default retry budget: 30 attempts, 10 seconds apart.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Outcome of one successful fetch.
#[derive(Debug)]
pub struct FetchResult {
    /// Every well-formed event in the feed.
    pub snapshot: Snapshot,
    /// Per-event construction failures; the run continues without them.
    pub malformed: Vec<FeedError>,
}

/// Retrieves the current snapshot of source events.
pub struct Fetcher {
    client: reqwest::Client,
    max_attempts: u32,
    retry_delay: Duration,
}

impl Fetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Override the retry budget.
    pub fn with_retry(mut self, max_attempts: u32, retry_delay: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.retry_delay = retry_delay;
        self
    }

    /// Fetch the feed and parse it into a snapshot.
    ///
    /// Fails with [`FeedError::SourceUnavailable`] once the retry budget
    /// is exhausted. Individual malformed events are skipped and returned
    /// in [`FetchResult::malformed`], not treated as fetch failures.
    pub async fn fetch(&self, url: &Url) -> Result<FetchResult, FeedError> {
        let mut last_reason = String::new();

        for attempt in 1..=self.max_attempts {
            match self.try_fetch(url).await {
                Ok(body) => return Ok(parse_feed(&body)),
                Err(reason) => {
                    tracing::warn!(attempt, max = self.max_attempts, %reason, "feed fetch failed");
                    last_reason = reason;
                }
            }

            if attempt < self.max_attempts {
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        Err(FeedError::SourceUnavailable {
            attempts: self.max_attempts,
            reason: last_reason,
        })
    }

    /// One attempt: GET the url and validate the response shape.
    async fn try_fetch(&self, url: &Url) -> Result<String, String> {
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = resp.status();
        if !status.is_success() {
            return Err(format!("HTTP {status}"));
        }

        let body = resp.text().await.map_err(|e| e.to_string())?;
        if looks_like_html(&body) {
            return Err("response body is an HTML document, not feed data".to_string());
        }

        Ok(body)
    }
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Calendar endpoints answer some auth/error conditions with a 200 HTML
/// page instead of a proper status code.
fn looks_like_html(body: &str) -> bool {
    let head = body.trim_start().to_ascii_lowercase();
    head.starts_with("<!doctype html") || head.starts_with("<html")
}

/// Parse a feed body into a snapshot, collecting per-event failures.
fn parse_feed(body: &str) -> FetchResult {
    let mut snapshot = Snapshot::new();
    let mut malformed = Vec::new();

    for props in ics::parse_events(body) {
        match SourceEvent::from_ics_props(&props) {
            Ok(event) => {
                snapshot.insert(event);
            }
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed feed event");
                malformed.push(e);
            }
        }
    }

    FetchResult { snapshot, malformed }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD_FEED: &str = "BEGIN:VCALENDAR\r\n\
BEGIN:VEVENT\r\n\
UID:ev-1\r\n\
SUMMARY:Homework\r\n\
DTSTART:20240310T000000Z\r\n\
LAST-MODIFIED:20240301T120000Z\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

    const MIXED_FEED: &str = "BEGIN:VCALENDAR\r\n\
BEGIN:VEVENT\r\n\
UID:ev-1\r\n\
SUMMARY:Homework\r\n\
DTSTART:20240310T000000Z\r\n\
LAST-MODIFIED:20240301T120000Z\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
UID:ev-2\r\n\
DTSTART:20240311T000000Z\r\n\
LAST-MODIFIED:20240301T120000Z\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

    fn test_fetcher() -> Fetcher {
        Fetcher::new().with_retry(2, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn fetch_parses_feed_into_snapshot() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/basic.ics")
            .with_status(200)
            .with_body(GOOD_FEED)
            .create_async()
            .await;

        let url = Url::parse(&format!("{}/basic.ics", server.url())).unwrap();
        let result = test_fetcher().fetch(&url).await.unwrap();

        mock.assert_async().await;
        assert_eq!(result.snapshot.len(), 1);
        assert!(result.snapshot.contains("ev-1"));
        assert!(result.malformed.is_empty());
    }

    #[tokio::test]
    async fn fetch_skips_malformed_events_but_keeps_the_rest() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/basic.ics")
            .with_status(200)
            .with_body(MIXED_FEED)
            .create_async()
            .await;

        let url = Url::parse(&format!("{}/basic.ics", server.url())).unwrap();
        let result = test_fetcher().fetch(&url).await.unwrap();

        assert_eq!(result.snapshot.len(), 1);
        assert_eq!(result.malformed.len(), 1);
        assert!(matches!(
            result.malformed[0],
            FeedError::MalformedEvent { field: "SUMMARY", .. }
        ));
    }

    #[tokio::test]
    async fn fetch_exhausts_retries_on_server_error() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/basic.ics")
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let url = Url::parse(&format!("{}/basic.ics", server.url())).unwrap();
        let err = Fetcher::new()
            .with_retry(3, Duration::from_millis(1))
            .fetch(&url)
            .await
            .unwrap_err();

        mock.assert_async().await;
        match err {
            FeedError::SourceUnavailable { attempts, reason } => {
                assert_eq!(attempts, 3);
                assert!(reason.contains("503"));
            }
            other => panic!("expected SourceUnavailable, got {other}"),
        }
    }

    #[tokio::test]
    async fn fetch_rejects_html_error_page() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/basic.ics")
            .with_status(200)
            .with_body("<!DOCTYPE html>\n<html><body>Sign in</body></html>")
            .create_async()
            .await;

        let url = Url::parse(&format!("{}/basic.ics", server.url())).unwrap();
        let err = test_fetcher().fetch(&url).await.unwrap_err();

        match err {
            FeedError::SourceUnavailable { reason, .. } => {
                assert!(reason.contains("HTML"));
            }
            other => panic!("expected SourceUnavailable, got {other}"),
        }
    }

    #[test]
    fn html_detection_is_case_insensitive() {
        assert!(looks_like_html("  <!doctype HTML><html>"));
        assert!(looks_like_html("<HTML lang=\"en\">"));
        assert!(!looks_like_html("BEGIN:VCALENDAR"));
    }
}
