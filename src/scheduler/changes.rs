use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::configuration::types::ImportConfiguration;
use crate::source::{is_remote, FeedFetcher, FeedHeaders};

/// Same size only counts as unchanged this soon after the last import.
const SIZE_WINDOW_HOURS: i64 = 1;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedChange {
    pub changed: bool,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<FeedHeaders>,
}

impl FeedChange {
    fn changed(reason: impl Into<String>, headers: Option<FeedHeaders>) -> Self {
        FeedChange { changed: true, reason: reason.into(), headers }
    }

    fn unchanged(reason: impl Into<String>, headers: FeedHeaders) -> Self {
        FeedChange { changed: false, reason: reason.into(), headers: Some(headers) }
    }
}

/// Compares fresh HEAD headers with what the configuration stored after the last run.
pub fn compare(config: &ImportConfiguration, current: FeedHeaders, now: DateTime<Utc>) -> FeedChange {
    if let (Some(old), Some(new)) = (&config.last_etag, &current.etag) {
        if old == new {
            return FeedChange::unchanged("same ETag", current);
        }
    }
    if let (Some(old), Some(new)) = (&config.last_modified, &current.last_modified) {
        if old == new {
            return FeedChange::unchanged("same Last-Modified", current);
        }
    }
    if let (Some(old), Some(new), Some(last)) = (config.last_content_size, current.content_length, config.last_import) {
        if old == new && now - last < Duration::hours(SIZE_WINDOW_HOURS) {
            return FeedChange::unchanged("same Content-Length within the last hour", current);
        }
    }
    FeedChange::changed("feed headers differ from the last import", Some(current))
}

/// HEAD-based change detection; any failure counts as a change so the import still runs.
pub async fn has_feed_changed(fetcher: &FeedFetcher, config: &ImportConfiguration, now: DateTime<Utc>) -> FeedChange {
    if !is_remote(&config.xml_feed_url) {
        return FeedChange::changed("local source, no headers to compare", None);
    }
    match fetcher.head(&config.xml_feed_url, config.auth().as_ref()).await {
        Ok(headers) => compare(config, headers, now),
        Err(e) => FeedChange::changed(format!("change check failed ({e}), assuming changed"), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::configuration::types::ImportType;
    use crate::settings::Settings;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 2, 12, 0, 0).unwrap()
    }

    fn previous() -> ImportConfiguration {
        ImportConfiguration {
            last_etag: Some("\"v1\"".into()),
            last_modified: Some("Thu, 01 May 2025 10:00:00 GMT".into()),
            last_content_size: Some(2048),
            last_import: Some(now() - Duration::minutes(30)),
            ..ImportConfiguration::fixture(ImportType::Orders, "https://shop.example/o.xml")
        }
    }

    fn headers(etag: Option<&str>, modified: Option<&str>, len: Option<i64>) -> FeedHeaders {
        FeedHeaders { etag: etag.map(Into::into), last_modified: modified.map(Into::into), content_length: len }
    }

    #[test]
    fn etag_and_last_modified_short_circuit() {
        let c = compare(&previous(), headers(Some("\"v1\""), None, None), now());
        assert!(!c.changed);
        assert_eq!(c.reason, "same ETag");

        let c = compare(&previous(), headers(Some("\"v2\""), Some("Thu, 01 May 2025 10:00:00 GMT"), None), now());
        assert!(!c.changed);
        assert_eq!(c.reason, "same Last-Modified");
    }

    #[test]
    fn size_only_counts_within_an_hour() {
        let c = compare(&previous(), headers(None, None, Some(2048)), now());
        assert!(!c.changed);

        let stale = ImportConfiguration { last_import: Some(now() - Duration::hours(2)), ..previous() };
        assert!(compare(&stale, headers(None, None, Some(2048)), now()).changed);
        assert!(compare(&previous(), headers(None, None, Some(4096)), now()).changed);
    }

    #[test]
    fn first_run_is_a_change() {
        let fresh = ImportConfiguration::fixture(ImportType::Items, "https://shop.example/i.xml");
        let c = compare(&fresh, headers(Some("\"v1\""), None, Some(10)), now());
        assert!(c.changed);
        assert_eq!(c.headers.and_then(|h| h.etag).as_deref(), Some("\"v1\""));
    }

    #[tokio::test]
    async fn head_failures_assume_changed() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD")).respond_with(ResponseTemplate::new(405)).mount(&server).await;
        let config = ImportConfiguration { xml_feed_url: server.uri(), ..previous() };
        let fetcher = FeedFetcher::new(&Settings::default()).unwrap();

        let c = has_feed_changed(&fetcher, &config, now()).await;
        assert!(c.changed);
        assert!(c.headers.is_none());
        assert!(c.reason.starts_with("change check failed"));
    }

    #[tokio::test]
    async fn unchanged_etag_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200).insert_header("etag", "\"v1\""))
            .mount(&server)
            .await;
        let config = ImportConfiguration { xml_feed_url: server.uri(), ..previous() };
        let fetcher = FeedFetcher::new(&Settings::default()).unwrap();

        assert!(!has_feed_changed(&fetcher, &config, now()).await.changed);
    }
}
