use anyhow::Result;
use chrono::Utc;
use clap::Args;
use sqlx::PgPool;
use tracing::Instrument;

use crate::audit::{self, types::{ImportStatus, NewLogEntry}};
use crate::configuration::{self, types::{ConfigRef, ImportConfiguration}};
use crate::importer::{self, store::RecordStore, ImportOptions, ImportSummary, PgRecordStore};
use crate::settings::Settings;
use crate::source::FeedFetcher;
use crate::telemetry::{self};
use crate::telemetry::ops::import::Phase as ImportPhase;

pub mod types;

use types::{ImportPlan, ManualImport};

/// xmlfeed import <config>: fetch the feed and import it (plan-only by default)
#[derive(Args)]
pub struct ImportCmd {
    /// Configuration id or name
    pub config: ConfigRef,
    #[arg(long, default_value_t = false)]
    pub apply: bool,
}

/// Reason a configuration cannot be imported right now.
pub fn precondition_failure(config: &ImportConfiguration) -> Option<String> {
    if !config.enabled {
        return Some(format!("Import is disabled for configuration '{}'", config.name));
    }
    if !config.has_url() {
        return Some(format!("XML Feed URL is not set for configuration '{}'", config.name));
    }
    if !config.import_type.is_supported() {
        return Some(format!("Import type '{}' is not yet implemented", config.import_type));
    }
    None
}

/// Fetches the configured feed and runs it through the importer.
pub async fn run_import<S: RecordStore>(store: &S, fetcher: &FeedFetcher, config: &ImportConfiguration) -> ImportSummary {
    let log = telemetry::import();
    let fetched = fetcher
        .fetch_content(&config.xml_feed_url, config.auth().as_ref())
        .instrument(log.span(&ImportPhase::Fetch))
        .await;
    let xml = match fetched {
        Ok(x) => x,
        Err(e) => {
            log.warn(format!("❌ fetch failed for {}: {e}", config.xml_feed_url));
            return ImportSummary::failed(format!("Failed to fetch XML feed: {e}"));
        }
    };
    log.info(format!("📥 fetched {} bytes from {}", xml.len(), config.xml_feed_url));
    importer::import_content(store, config.import_type, &xml, &ImportOptions::from(config))
        .instrument(log.span(&ImportPhase::Import))
        .await
}

/// Post-run bookkeeping: status on the configuration plus an import log entry.
pub async fn record_run(pool: &PgPool, settings: &Settings, config: &ImportConfiguration, summary: &ImportSummary) -> Result<(ImportStatus, i64)> {
    let status = ImportStatus::of(summary);
    configuration::db::record_import(pool, config.config_id, Utc::now(), status.as_str()).await?;
    let entry = NewLogEntry::from_summary(config.import_type, Some(config.config_id), &config.xml_feed_url, summary);
    let log_id = audit::create_import_log(pool, settings.log_retention, &entry).await?;
    Ok((status, log_id))
}

fn refused(config: &ImportConfiguration, message: String) -> ManualImport {
    ManualImport {
        success: false,
        config_id: config.config_id,
        name: config.name.clone(),
        import_type: config.import_type,
        source: config.xml_feed_url.clone(),
        message,
        status: None,
        log_id: None,
        result: None,
    }
}

/// Runs one configuration end to end. Refusals come back as `success = false`;
/// only database failures are errors.
pub async fn trigger_manual_import(pool: &PgPool, settings: &Settings, fetcher: &FeedFetcher, config: &ImportConfiguration) -> Result<ManualImport> {
    let log = telemetry::import();
    if let Some(reason) = precondition_failure(config) {
        log.warn(format!("⚠️ {reason}"));
        return Ok(refused(config, reason));
    }

    let store = PgRecordStore::new(pool);
    let summary = run_import(&store, fetcher, config).await;
    let (status, log_id) = record_run(pool, settings, config, &summary)
        .instrument(log.span(&ImportPhase::Record))
        .await?;
    log.info_kv(&format!("✅ {}", summary.headline()), [
        ("config_id", config.config_id.to_string()),
        ("status", status.to_string()),
        ("log_id", log_id.to_string()),
    ]);
    Ok(ManualImport {
        success: summary.success,
        message: summary.headline(),
        status: Some(status),
        log_id: Some(log_id),
        result: Some(summary),
        ..refused(config, String::new())
    })
}

pub async fn run(pool: &PgPool, settings: &Settings, args: ImportCmd) -> Result<()> {
    let log = telemetry::import();
    let _g = log.root_span_kv([
        ("mode", if args.apply { "apply".to_string() } else { "plan".to_string() }),
        ("config", args.config.to_string()),
    ]).entered();

    let config = {
        let _s = log.span(&ImportPhase::Load).entered();
        configuration::db::get(pool, &args.config).await?
    };

    if !args.apply {
        let blocked = precondition_failure(&config);
        log.info(format!(
            "📝 Import plan: [{}] {} type={} url={} company={:?}",
            config.config_id, config.name, config.import_type, config.xml_feed_url, config.company
        ));
        if let Some(b) = &blocked { log.warn(format!("   ⚠️ {b}")); }
        log.info("   Use --apply to execute.");
        if telemetry::config::json_mode() {
            log.plan(&ImportPlan {
                config_id: config.config_id,
                name: config.name.clone(),
                import_type: config.import_type,
                source: config.xml_feed_url.clone(),
                company: config.company.clone(),
                auth: config.auth().is_some(),
                blocked,
            })?;
        }
        return Ok(());
    }

    let fetcher = FeedFetcher::new(settings)?;
    let outcome = trigger_manual_import(pool, settings, &fetcher, &config).await?;
    if let Some(summary) = &outcome.result {
        for m in &summary.error_messages {
            log.warn(format!("   ❌ {m}"));
        }
    }
    log.info(format!("📦 {}", outcome.message));
    if telemetry::config::json_mode() {
        log.result(&outcome)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::configuration::types::ImportType;
    use crate::importer::store::memory::MemoryStore;

    #[test]
    fn refuses_disabled_unset_and_unsupported() {
        let ok = ImportConfiguration::fixture(ImportType::Items, "https://shop.example/items.xml");
        assert_eq!(precondition_failure(&ok), None);

        let disabled = ImportConfiguration { enabled: false, ..ok.clone() };
        assert!(precondition_failure(&disabled).unwrap().contains("disabled"));

        let no_url = ImportConfiguration { xml_feed_url: " ".into(), ..ok.clone() };
        assert!(precondition_failure(&no_url).unwrap().starts_with("XML Feed URL is not set"));

        let customers = ImportConfiguration::fixture(ImportType::Customers, "https://shop.example/c.xml");
        assert_eq!(precondition_failure(&customers).as_deref(), Some("Import type 'Customers' is not yet implemented"));
    }

    #[tokio::test]
    async fn imports_live_feed_into_store() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<SHOP><SHOPITEM id=\"1\"><CODE>K-1</CODE><NAME>Kettle</NAME></SHOPITEM></SHOP>",
            ))
            .mount(&server)
            .await;
        let config = ImportConfiguration::fixture(ImportType::Items, server.uri());
        let store = MemoryStore::default();
        let fetcher = FeedFetcher::new(&Settings::default()).unwrap();

        let summary = run_import(&store, &fetcher, &config).await;
        assert!(summary.success);
        assert_eq!(summary.imported, 1);
        store.with(|st| assert_eq!(st.items["K-1"].item_name, "Kettle"));
    }

    #[tokio::test]
    async fn fetch_failures_become_failed_summaries() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(403)).mount(&server).await;
        let config = ImportConfiguration::fixture(ImportType::Orders, server.uri());
        let fetcher = FeedFetcher::new(&Settings::default()).unwrap();

        let summary = run_import(&MemoryStore::default(), &fetcher, &config).await;
        assert!(!summary.success);
        assert!(summary.headline().starts_with("Failed to fetch XML feed"));
        assert_eq!(ImportStatus::of(&summary), ImportStatus::Failed);
    }
}
