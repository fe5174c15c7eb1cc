use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use sqlx::PgPool;
use tokio::io::AsyncReadExt;
use tracing::Instrument;

use crate::audit::{self, types::{NewLogEntry, PASTED_SOURCE}};
use crate::configuration::{self, types::{ConfigRef, ImportConfiguration}};
use crate::import;
use crate::importer::{ImportOptions, PgRecordStore};
use crate::settings::Settings;
use crate::source::FeedFetcher;
use crate::telemetry::{self};
use crate::telemetry::ops::paste::Phase as PastePhase;

pub mod aggressive;
pub mod connection;
pub mod debug;
pub mod paste;
pub mod stream;
pub mod types;

use types::{AggressiveCheck, PastedImport};

/// Shared positional argument of the diagnostic commands.
#[derive(Args)]
pub struct ConfigArg {
    /// Configuration id or name
    pub config: ConfigRef,
}

/// xmlfeed paste <config> [--file F]: import a document instead of the live feed
#[derive(Args)]
pub struct PasteCmd {
    pub config: ConfigRef,
    /// Read the document from a file instead of stdin
    #[arg(long)]
    pub file: Option<PathBuf>,
    /// Include the tag structure of the root and first element
    #[arg(long, default_value_t = false)]
    pub structure: bool,
    #[arg(long, default_value_t = false)]
    pub apply: bool,
}

/// Aggressive check wired to the real importer; a triggered import is recorded like a
/// manual one.
pub async fn aggressive_check_and_record(pool: &PgPool, settings: &Settings, fetcher: &FeedFetcher, config: &ImportConfiguration) -> Result<AggressiveCheck> {
    let log = telemetry::aggressive();
    if let Some(reason) = import::precondition_failure(config) {
        log.warn(format!("⚠️ {reason}"));
        return Ok(AggressiveCheck {
            success: false,
            source: config.xml_feed_url.clone(),
            element: config.import_type.element().to_string(),
            max_attempts: settings.aggressive_attempts,
            interval_secs: settings.aggressive_interval.as_secs(),
            found_on_attempt: None,
            import_triggered: false,
            attempts: Vec::new(),
            message: reason,
        });
    }

    let store = PgRecordStore::new(pool);
    let check = aggressive::aggressive_import_check(
        fetcher,
        config,
        settings.aggressive_attempts,
        settings.aggressive_interval,
        || import::run_import(&store, fetcher, config),
    )
    .await;

    if let Some(summary) = check.attempts.iter().find_map(|a| a.import_result.as_ref()) {
        let (status, log_id) = import::record_run(pool, settings, config, summary).await?;
        log.info(format!("🧾 aggressive import recorded status={status} log_id={log_id}"));
    }
    Ok(check)
}

/// Imports an operator-supplied document with the options of `config` and appends a
/// log entry tagged as pasted content. The configuration's last-import fields are left alone.
pub async fn paste_and_record(pool: &PgPool, settings: &Settings, config: &ImportConfiguration, xml: &str, structure: bool) -> Result<PastedImport> {
    let log = telemetry::paste();
    let store = PgRecordStore::new(pool);
    let result = paste::import_from_pasted_content(&store, config.import_type, xml, &ImportOptions::from(config), structure)
        .instrument(log.span(&PastePhase::Import))
        .await;
    if let Some(summary) = &result.import_result {
        let entry = NewLogEntry::from_summary(config.import_type, Some(config.config_id), PASTED_SOURCE, summary);
        audit::create_import_log(pool, settings.log_retention, &entry)
            .instrument(log.span(&PastePhase::Record))
            .await?;
    }
    Ok(result)
}

pub async fn run_check(pool: &PgPool, settings: &Settings, args: ConfigArg) -> Result<()> {
    let log = telemetry::check();
    let _g = log.root_span_kv([("config", args.config.to_string())]).entered();
    let config = configuration::db::get(pool, &args.config).await?;
    let fetcher = FeedFetcher::new(settings)?;

    let a = stream::check_stream_length(&fetcher, &config).await;
    if let Some(e) = &a.error { log.warn(format!("❌ {e}")); }
    if let Some(root) = &a.root_tag { log.info(format!("   root=<{root}>")); }
    for s in &a.sample {
        log.info(format!("   #{} {} {}", s.index, s.key, s.name));
    }
    if let Some(e) = &a.parse_error {
        log.warn(format!("   parse error: {e}"));
        log.info(format!("   prefix: {}", a.content_prefix.as_deref().unwrap_or_default()));
    }
    if telemetry::config::json_mode() {
        log.result(&a)?;
    }
    Ok(())
}

pub async fn run_debug(pool: &PgPool, settings: &Settings, args: ConfigArg) -> Result<()> {
    let log = telemetry::debug();
    let _g = log.root_span_kv([("config", args.config.to_string())]).entered();
    let config = configuration::db::get(pool, &args.config).await?;
    let fetcher = FeedFetcher::new(settings)?;

    let d = debug::debug_xml_feed(&fetcher, &config).await;
    if let Some(e) = &d.error { log.warn(format!("❌ {e}")); }
    log.info(format!("   content_type={:?} empty={} whitespace={} error_page={}", d.content_type, d.is_empty, d.mostly_whitespace, d.looks_like_error_page));
    if let Some(e) = &d.parse_error { log.warn(format!("   parse error: {e}")); }
    for s in &d.suggestions {
        log.info(format!("   💡 {s}"));
    }
    if telemetry::config::json_mode() {
        log.result(&d)?;
    }
    Ok(())
}

pub async fn run_aggressive(pool: &PgPool, settings: &Settings, args: ConfigArg) -> Result<()> {
    let log = telemetry::aggressive();
    let _g = log.root_span_kv([
        ("config", args.config.to_string()),
        ("attempts", settings.aggressive_attempts.to_string()),
        ("interval_secs", settings.aggressive_interval.as_secs().to_string()),
    ]).entered();
    let config = configuration::db::get(pool, &args.config).await?;
    let fetcher = FeedFetcher::new(settings)?;

    let check = aggressive_check_and_record(pool, settings, &fetcher, &config).await?;
    log.info(format!("🏁 {}", check.message));
    if telemetry::config::json_mode() {
        log.result(&check)?;
    }
    Ok(())
}

pub async fn run_test(pool: &PgPool, settings: &Settings, args: ConfigArg) -> Result<()> {
    let log = telemetry::test_connection();
    let _g = log.root_span_kv([("config", args.config.to_string())]).entered();
    let config = configuration::db::get(pool, &args.config).await?;
    let fetcher = FeedFetcher::new(settings)?;

    let t = connection::test_connection(&fetcher, &config).await;
    if t.success { log.info(format!("✅ {}", t.message)); } else { log.warn(format!("❌ {}", t.message)); }
    if telemetry::config::json_mode() {
        log.result(&t)?;
    }
    Ok(())
}

async fn read_document(file: Option<&PathBuf>) -> Result<String> {
    match file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display())),
        None => {
            let mut buf = String::new();
            tokio::io::stdin().read_to_string(&mut buf).await.context("reading stdin")?;
            Ok(buf)
        }
    }
}

pub async fn run_paste(pool: &PgPool, settings: &Settings, args: PasteCmd) -> Result<()> {
    let log = telemetry::paste();
    let _g = log.root_span_kv([
        ("mode", if args.apply { "apply".to_string() } else { "plan".to_string() }),
        ("config", args.config.to_string()),
        ("file", format!("{:?}", args.file)),
    ]).entered();
    let config = configuration::db::get(pool, &args.config).await?;
    let xml = {
        let _s = log.span(&PastePhase::Read).entered();
        read_document(args.file.as_ref()).await?
    };

    if !args.apply {
        let (report, _) = paste::validate_pasted(config.import_type, &xml, args.structure);
        log.info(format!("📝 Paste plan: [{}] {} {}", config.config_id, config.name, report.message));
        log.info("   Use --apply to execute.");
        if telemetry::config::json_mode() {
            log.plan(&report)?;
        }
        return Ok(());
    }

    let result = paste_and_record(pool, settings, &config, &xml, args.structure).await?;
    if let Some(summary) = &result.import_result {
        for m in &summary.error_messages {
            log.warn(format!("   ❌ {m}"));
        }
    }
    log.info(format!("📦 {}", result.message));
    if telemetry::config::json_mode() {
        log.result(&result)?;
    }
    Ok(())
}
