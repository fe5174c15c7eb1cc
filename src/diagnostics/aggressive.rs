use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use tracing::Instrument;

use crate::configuration::types::ImportConfiguration;
use crate::importer::ImportSummary;
use crate::source::FeedFetcher;
use crate::telemetry;
use crate::telemetry::ops::aggressive::Phase as AggressivePhase;
use crate::xml::parse_document;

use super::types::{AggressiveCheck, AttemptResult};

/// Polls the feed up to `max_attempts` times, `interval` apart, until it contains at
/// least one matched element; then runs `trigger` once and stops.
pub async fn aggressive_import_check<F, Fut>(
    fetcher: &FeedFetcher,
    config: &ImportConfiguration,
    max_attempts: u32,
    interval: Duration,
    trigger: F,
) -> AggressiveCheck
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = ImportSummary>,
{
    let log = telemetry::aggressive();
    let element = config.import_type.element();
    let auth = config.auth();
    let mut trigger = Some(trigger);
    let mut attempts = Vec::new();
    let mut found_on_attempt = None;

    for attempt in 1..=max_attempts {
        let mut res = AttemptResult {
            attempt,
            time: Utc::now(),
            status_code: None,
            content_length: 0,
            xml_valid: false,
            element_count: 0,
            import_triggered: false,
            import_result: None,
            error: None,
        };
        let fetched = fetcher
            .read(&config.xml_feed_url, auth.as_ref())
            .instrument(log.span_kv(&AggressivePhase::Poll, [("attempt", attempt.to_string())]))
            .await;
        match fetched {
            Ok(feed) => {
                res.status_code = feed.status;
                res.content_length = feed.body.len();
                if !feed.is_success() {
                    res.error = Some(format!("HTTP {}", feed.status.unwrap_or_default()));
                } else {
                    match parse_document(&feed.text()) {
                        Ok(root) => {
                            res.xml_valid = true;
                            res.element_count = root.count_descendants(element);
                        }
                        Err(e) => res.error = Some(format!("XML parsing failed: {e}")),
                    }
                }
            }
            Err(e) => res.error = Some(e.to_string()),
        }
        log.info(format!(
            "🔁 attempt {}/{} status={:?} bytes={} {}={}",
            attempt, max_attempts, res.status_code, res.content_length, element, res.element_count
        ));

        if res.element_count > 0 {
            if let Some(run) = trigger.take() {
                let summary = run().instrument(log.span(&AggressivePhase::Trigger)).await;
                log.info(format!("🚀 import triggered on attempt {attempt}: {}", summary.headline()));
                res.import_triggered = true;
                res.import_result = Some(summary);
            }
            found_on_attempt = Some(attempt);
            attempts.push(res);
            break;
        }
        attempts.push(res);
        if attempt < max_attempts {
            tokio::time::sleep(interval).await;
        }
    }

    let import_triggered = attempts.iter().any(|a| a.import_triggered);
    let message = match found_on_attempt {
        Some(n) => format!("Found {element} data on attempt {n} of {max_attempts}; import triggered"),
        None => format!("No {element} data found after {max_attempts} attempts"),
    };
    AggressiveCheck {
        success: found_on_attempt.is_some(),
        source: config.xml_feed_url.clone(),
        element: element.to_string(),
        max_attempts,
        interval_secs: interval.as_secs(),
        found_on_attempt,
        import_triggered,
        attempts,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::configuration::types::ImportType;
    use crate::settings::Settings;

    fn config(url: String) -> ImportConfiguration {
        ImportConfiguration::fixture(ImportType::Orders, url)
    }

    #[tokio::test]
    async fn stops_on_first_attempt_with_orders() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("   "))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<ORDERS><ORDER><ORDER_ID>1</ORDER_ID></ORDER></ORDERS>"))
            .mount(&server)
            .await;

        let fetcher = FeedFetcher::new(&Settings::default()).unwrap();
        let calls = AtomicUsize::new(0);
        let check = aggressive_import_check(&fetcher, &config(server.uri()), 5, Duration::from_millis(5), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            ImportSummary { success: true, imported: 1, total_processed: 1, ..Default::default() }
        })
        .await;

        assert!(check.success);
        assert_eq!(check.found_on_attempt, Some(3));
        assert_eq!(check.attempts.len(), 3);
        assert!(!check.attempts[0].import_triggered);
        assert!(check.attempts[0].error.is_some());
        assert!(check.attempts[2].import_triggered);
        assert_eq!(check.attempts[2].element_count, 1);
        assert_eq!(check.attempts[2].import_result.as_ref().map(|s| s.imported), Some(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_fixed_attempts_without_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<ORDERS/>"))
            .mount(&server)
            .await;

        let fetcher = FeedFetcher::new(&Settings::default()).unwrap();
        let check = aggressive_import_check(&fetcher, &config(server.uri()), 4, Duration::from_millis(1), || async {
            panic!("import must not run without data")
        })
        .await;

        assert!(!check.success);
        assert!(!check.import_triggered);
        assert_eq!(check.attempts.len(), 4);
        assert!(check.attempts.iter().all(|a| a.xml_valid && a.element_count == 0 && !a.import_triggered));
        assert_eq!(check.message, "No ORDER data found after 4 attempts");
    }
}
