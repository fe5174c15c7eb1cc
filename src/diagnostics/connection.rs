use tracing::Instrument;

use crate::configuration::types::ImportConfiguration;
use crate::source::FeedFetcher;
use crate::telemetry::{self};
use crate::telemetry::ops::test_connection::Phase as TestPhase;
use crate::xml::parse_document;

use super::types::ConnectionTest;

pub async fn test_connection(fetcher: &FeedFetcher, config: &ImportConfiguration) -> ConnectionTest {
    let failed = |reason: String| ConnectionTest {
        success: false,
        message: format!("Connection failed: {reason}"),
        element_count: 0,
    };
    let log = telemetry::test_connection();
    let fetched = fetcher
        .fetch_content(&config.xml_feed_url, config.auth().as_ref())
        .instrument(log.span(&TestPhase::Fetch))
        .await;
    let body = match fetched {
        Ok(b) => b,
        Err(e) => return failed(e.to_string()),
    };
    match parse_document(&body) {
        Ok(root) => {
            let n = root.count_descendants(config.import_type.element());
            ConnectionTest { success: true, message: format!("Connection successful! Found {n} items in XML feed."), element_count: n }
        }
        Err(e) => failed(format!("XML parsing failed: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::configuration::types::ImportType;
    use crate::settings::Settings;

    async fn serve(status: u16, body: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn counts_items_on_success() {
        let server = serve(200, "<SHOP><SHOPITEM/><SHOPITEM/></SHOP>").await;
        let config = ImportConfiguration::fixture(ImportType::Items, format!("{}/feed.xml", server.uri()));
        let t = test_connection(&FeedFetcher::new(&Settings::default()).unwrap(), &config).await;
        assert!(t.success);
        assert_eq!(t.element_count, 2);
        assert_eq!(t.message, "Connection successful! Found 2 items in XML feed.");
    }

    #[tokio::test]
    async fn http_and_parse_failures_are_reported() {
        let fetcher = FeedFetcher::new(&Settings::default()).unwrap();

        let server = serve(500, "oops").await;
        let config = ImportConfiguration::fixture(ImportType::Orders, format!("{}/feed.xml", server.uri()));
        let t = test_connection(&fetcher, &config).await;
        assert!(!t.success);
        assert!(t.message.starts_with("Connection failed: "));

        let server = serve(200, "<ORDERS><ORDER>").await;
        let config = ImportConfiguration::fixture(ImportType::Orders, format!("{}/feed.xml", server.uri()));
        let t = test_connection(&fetcher, &config).await;
        assert!(!t.success);
        assert!(t.message.contains("XML parsing failed"));
    }
}
