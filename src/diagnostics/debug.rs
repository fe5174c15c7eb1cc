use std::sync::OnceLock;

use regex::Regex;
use tracing::Instrument;

use crate::configuration::types::ImportConfiguration;
use crate::importer::clean::truncate_chars;
use crate::source::{FeedFetcher, FetchError, FetchedFeed};
use crate::telemetry::{self};
use crate::telemetry::ops::debug::Phase as DebugPhase;
use crate::xml::{parse_document, pretty_print};

use super::types::FeedDebug;

pub const RAW_LIMIT: usize = 10_000;

fn title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid regex"))
}

/// Non-empty body whose non-whitespace part is under a tenth of its size.
pub fn mostly_whitespace(raw_len: usize, stripped_len: usize) -> bool {
    raw_len > 0 && stripped_len * 10 < raw_len
}

pub fn looks_like_error_page(status: Option<u16>, body: &str) -> bool {
    if status.is_some_and(|s| s >= 400) {
        return true;
    }
    let head = truncate_chars(body.trim_start(), 2048).to_lowercase();
    if head.starts_with("<!doctype html") || head.contains("<html") {
        return true;
    }
    title_re()
        .captures(&head)
        .and_then(|c| c.get(1))
        .map(|t| {
            let t = t.as_str();
            t.contains("error") || t.contains("not found") || t.contains("forbidden")
        })
        .unwrap_or(false)
}

fn suggestions(d: &FeedDebug) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(status) = d.status_code {
        match status {
            401 | 403 => out.push("The server refused access; check the auth username and password of the configuration.".to_string()),
            404 => out.push("The feed URL was not found; verify the XML Feed URL.".to_string()),
            s if s >= 500 => out.push("The feed server reported an error; try again later or contact the feed provider.".to_string()),
            _ => {}
        }
    }
    if d.is_empty {
        out.push("The feed returned no content; the export may still be generating, try the aggressive import check.".to_string());
    } else if d.mostly_whitespace {
        out.push("The feed is almost entirely whitespace; the export is probably empty or still being written.".to_string());
    }
    if d.looks_like_error_page {
        out.push("The response looks like an HTML page rather than XML; the URL may point to a login or error page.".to_string());
    }
    if !d.is_empty && !d.xml_valid && !d.looks_like_error_page {
        out.push("The content is not well-formed XML; inspect the raw content around the reported position.".to_string());
    }
    if let Some(ct) = &d.content_type {
        if !ct.contains("xml") && !ct.starts_with("text/plain") && !d.looks_like_error_page {
            out.push(format!("Unexpected content type '{ct}'; an XML feed usually answers text/xml or application/xml."));
        }
    }
    out
}

/// Builds the debug report for a fetched body.
pub fn inspect(feed: &FetchedFeed, auth_used: bool) -> FeedDebug {
    let body = feed.text();
    let stripped_length = body.chars().filter(|c| !c.is_whitespace()).count();
    let raw_length = body.chars().count();
    let parsed = parse_document(&body);
    let mut d = FeedDebug {
        success: feed.is_success(),
        source: feed.source.clone(),
        auth_used,
        status_code: feed.status,
        content_type: feed.content_type.clone(),
        raw_length,
        stripped_length,
        is_empty: stripped_length == 0,
        mostly_whitespace: mostly_whitespace(raw_length, stripped_length),
        looks_like_error_page: looks_like_error_page(feed.status, &body),
        xml_valid: parsed.is_ok(),
        parse_error: parsed.as_ref().err().map(|e| e.to_string()),
        raw_content: truncate_chars(&body, RAW_LIMIT),
        raw_truncated: raw_length > RAW_LIMIT,
        pretty_content: None,
        suggestions: Vec::new(),
        error: None,
    };
    if d.xml_valid {
        d.pretty_content = pretty_print(&body).ok();
    }
    d.suggestions = suggestions(&d);
    d
}

fn fetch_failure(source: &str, auth_used: bool, err: &FetchError) -> FeedDebug {
    let mut suggestions = vec!["Check that the XML Feed URL is reachable from this host.".to_string()];
    match err {
        FetchError::Timeout => suggestions.push("The request timed out; the feed may be slow or very large.".to_string()),
        FetchError::EmptySource => suggestions = vec!["Set the XML Feed URL of the configuration.".to_string()],
        FetchError::Io { .. } => suggestions = vec!["Check that the local file exists and is readable.".to_string()],
        _ => {}
    }
    FeedDebug {
        success: false,
        source: source.to_string(),
        auth_used,
        status_code: err.status_code(),
        error: Some(err.to_string()),
        suggestions,
        ..Default::default()
    }
}

pub async fn debug_xml_feed(fetcher: &FeedFetcher, config: &ImportConfiguration) -> FeedDebug {
    let log = telemetry::debug();
    let auth = config.auth();
    let fetched = fetcher
        .read(&config.xml_feed_url, auth.as_ref())
        .instrument(log.span(&DebugPhase::Fetch))
        .await;
    let report = match fetched {
        Ok(feed) => log.span(&DebugPhase::Inspect).in_scope(|| inspect(&feed, auth.is_some())),
        Err(e) => fetch_failure(&config.xml_feed_url, auth.is_some(), &e),
    };
    log.info(format!(
        "🩺 status={:?} raw={} stripped={} valid={} suggestions={}",
        report.status_code, report.raw_length, report.stripped_length, report.xml_valid, report.suggestions.len()
    ));
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn feed(status: Option<u16>, content_type: Option<&str>, body: &str) -> FetchedFeed {
        FetchedFeed {
            source: "https://shop.example/orders.xml".into(),
            status,
            content_type: content_type.map(str::to_string),
            headers: Default::default(),
            body: Bytes::from(body.to_string()),
        }
    }

    #[test]
    fn whitespace_threshold() {
        assert!(mostly_whitespace(100, 9));
        assert!(!mostly_whitespace(100, 10));
        assert!(!mostly_whitespace(0, 0));
    }

    #[test]
    fn error_page_heuristics() {
        assert!(looks_like_error_page(Some(500), "<ORDERS/>"));
        assert!(looks_like_error_page(Some(200), "<!DOCTYPE html><p>hi</p>"));
        assert!(looks_like_error_page(Some(200), "<HTML><body/></HTML>"));
        assert!(looks_like_error_page(None, "<page><title>404 Not Found</title></page>"));
        assert!(!looks_like_error_page(Some(200), "<ORDERS><title>Spring sale</title></ORDERS>"));
    }

    #[test]
    fn valid_xml_gets_pretty_output_and_no_suggestions() {
        let d = inspect(&feed(Some(200), Some("application/xml"), "<ORDERS><ORDER><ORDER_ID>1</ORDER_ID></ORDER></ORDERS>"), false);
        assert!(d.success);
        assert!(d.xml_valid);
        assert!(d.pretty_content.as_deref().unwrap().contains("\n  <ORDER>"));
        assert!(d.suggestions.is_empty());
        assert!(!d.raw_truncated);
    }

    #[test]
    fn empty_and_whitespace_bodies_are_flagged() {
        let empty = inspect(&feed(Some(200), Some("text/xml"), ""), false);
        assert!(empty.is_empty);
        assert!(!empty.mostly_whitespace);
        assert!(!empty.xml_valid);
        assert!(empty.suggestions.iter().any(|s| s.contains("no content")));

        let blank = inspect(&feed(Some(200), Some("text/xml"), &format!("{}<a/>{}", " ".repeat(200), "\n".repeat(200))), false);
        assert!(blank.mostly_whitespace);
        assert!(blank.xml_valid);
        assert!(blank.suggestions.iter().any(|s| s.contains("whitespace")));
    }

    #[test]
    fn error_pages_and_auth_failures_get_advice() {
        let d = inspect(&feed(Some(401), Some("text/html"), "<html><title>Unauthorized</title></html>"), true);
        assert!(!d.success);
        assert!(d.looks_like_error_page);
        assert!(d.suggestions.iter().any(|s| s.contains("auth")));
        assert!(d.suggestions.iter().any(|s| s.contains("HTML page")));
    }

    #[test]
    fn raw_content_is_capped() {
        let body = format!("<a>{}</a>", "x".repeat(RAW_LIMIT * 2));
        let d = inspect(&feed(Some(200), Some("text/xml"), &body), false);
        assert!(d.raw_truncated);
        assert_eq!(d.raw_content.chars().count(), RAW_LIMIT);
    }

    #[test]
    fn fetch_failures_fill_error() {
        let d = fetch_failure("", false, &FetchError::EmptySource);
        assert!(!d.success);
        assert_eq!(d.error.as_deref(), Some("no XML feed URL provided"));
        assert_eq!(d.suggestions.len(), 1);
    }
}
