use tracing::Instrument;

use crate::configuration::types::{ImportConfiguration, ImportType};
use crate::importer::clean::{clean_name, truncate_chars};
use crate::importer::{items, orders};
use crate::source::FeedFetcher;
use crate::telemetry::{self};
use crate::telemetry::ops::check::Phase as CheckPhase;
use crate::xml::{parse_document, XmlNode};

use super::types::{EntrySample, StreamAnalysis};

pub const SAMPLE_SIZE: usize = 3;
pub const PREFIX_CHARS: usize = 500;

/// `1536` -> `1.5 KB`; bytes below 1 KB are printed as-is.
pub fn human_size(bytes: usize) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

pub fn sample_entry(import_type: ImportType, index: usize, node: &XmlNode) -> EntrySample {
    match import_type {
        ImportType::Items | ImportType::ProductUpdates => {
            let item = items::parse_shop_item(node);
            EntrySample { index, key: item.item_code, name: clean_name(&item.item_name), item_count: None, total: None }
        }
        ImportType::Orders => {
            let order = orders::parse_order(node);
            EntrySample {
                index,
                name: orders::customer_name(&order),
                item_count: Some(order.lines.len()),
                total: Some(order.total_with_tax),
                key: order.external_order_id,
            }
        }
        ImportType::Customers => EntrySample {
            index,
            key: node.child_text("EMAIL"),
            name: clean_name(&node.child_text("NAME")),
            item_count: None,
            total: None,
        },
    }
}

/// Structure report for a fetched body.
pub fn analyze(import_type: ImportType, source: &str, body: &str) -> StreamAnalysis {
    let mut out = StreamAnalysis {
        success: true,
        source: source.to_string(),
        content_length: body.len(),
        content_length_human: human_size(body.len()),
        element: import_type.element().to_string(),
        ..Default::default()
    };
    match parse_document(body) {
        Ok(root) => {
            let elements = root.descendants(import_type.element());
            out.xml_valid = true;
            out.root_tag = Some(root.tag.clone());
            out.element_count = elements.len();
            out.sample = elements.iter().take(SAMPLE_SIZE).enumerate().map(|(i, n)| sample_entry(import_type, i, n)).collect();
        }
        Err(e) => {
            out.parse_error = Some(e.to_string());
            out.content_prefix = Some(truncate_chars(body, PREFIX_CHARS));
        }
    }
    out
}

pub async fn check_stream_length(fetcher: &FeedFetcher, config: &ImportConfiguration) -> StreamAnalysis {
    let log = telemetry::check();
    let failed = |error: String| StreamAnalysis {
        success: false,
        source: config.xml_feed_url.clone(),
        element: config.import_type.element().to_string(),
        content_length_human: human_size(0),
        error: Some(error),
        ..Default::default()
    };
    let fetched = fetcher
        .read(&config.xml_feed_url, config.auth().as_ref())
        .instrument(log.span(&CheckPhase::Fetch))
        .await;
    let feed = match fetched {
        Ok(f) => f,
        Err(e) => {
            log.warn(format!("❌ fetch failed: {e}"));
            return failed(format!("Failed to fetch XML feed: {e}"));
        }
    };
    let mut out = log.span(&CheckPhase::Analyze).in_scope(|| analyze(config.import_type, &feed.source, &feed.text()));
    log.info(format!(
        "📏 {} ({}) valid={} {}={}",
        out.source, out.content_length_human, out.xml_valid, out.element, out.element_count
    ));
    out.status_code = feed.status;
    out.content_type = feed.content_type.clone();
    if !feed.is_success() {
        out.success = false;
        out.error = Some(format!("Feed answered with HTTP {}", feed.status.unwrap_or_default()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORDERS: &str = r#"<ORDERS>
        <ORDER><ORDER_ID>1</ORDER_ID><CUSTOMER><EMAIL>a@x.sk</EMAIL></CUSTOMER>
          <TOTAL_PRICE><WITH_VAT>9,90</WITH_VAT></TOTAL_PRICE>
          <ORDER_ITEMS><ITEM><TYPE>product</TYPE><CODE>A</CODE></ITEM></ORDER_ITEMS></ORDER>
        <ORDER><ORDER_ID>2</ORDER_ID></ORDER>
        <ORDER><ORDER_ID>3</ORDER_ID></ORDER>
        <ORDER><ORDER_ID>4</ORDER_ID></ORDER>
    </ORDERS>"#;

    #[test]
    fn human_sizes() {
        assert_eq!(human_size(0), "0 B");
        assert_eq!(human_size(1023), "1023 B");
        assert_eq!(human_size(1536), "1.5 KB");
        assert_eq!(human_size(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(human_size(3 * 1024 * 1024 * 1024), "3.0 GB");
    }

    #[test]
    fn valid_feed_reports_root_count_and_sample() {
        let a = analyze(ImportType::Orders, "feed.xml", ORDERS);
        assert!(a.xml_valid);
        assert_eq!(a.root_tag.as_deref(), Some("ORDERS"));
        assert_eq!(a.element, "ORDER");
        assert_eq!(a.element_count, 4);
        assert_eq!(a.sample.len(), 3);
        assert_eq!(a.sample[0].key, "1");
        assert_eq!(a.sample[0].name, "a");
        assert_eq!(a.sample[0].item_count, Some(1));
        assert_eq!(a.sample[0].total, Some(9.9));
        assert!(a.parse_error.is_none());
        assert!(a.content_prefix.is_none());
    }

    #[test]
    fn malformed_feed_reports_error_and_prefix() {
        let body = format!("<ORDERS><ORDER>{}", "x".repeat(800));
        let a = analyze(ImportType::Orders, "feed.xml", &body);
        assert!(!a.xml_valid);
        assert!(a.parse_error.is_some());
        assert_eq!(a.content_prefix.as_ref().map(|p| p.chars().count()), Some(PREFIX_CHARS));
        assert_eq!(a.element_count, 0);
    }

    #[test]
    fn items_are_matched_for_product_updates() {
        let a = analyze(ImportType::ProductUpdates, "f", "<SHOP><SHOPITEM><CODE>X</CODE><NAME>Tea</NAME></SHOPITEM></SHOP>");
        assert_eq!(a.element, "SHOPITEM");
        assert_eq!(a.sample[0].key, "X");
        assert_eq!(a.sample[0].name, "Tea");
    }
}
