use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;
use sqlx::PgPool;

use crate::audit::{self, types::ImportLogEntry};
use crate::configuration::{self, types::{ConfigRef, ImportConfiguration, ImportType}};
use crate::scheduler::due;
use crate::telemetry::{self};
use crate::telemetry::ops::status::Phase as StatusPhase;

const RECENT_LOGS: i64 = 10;

/// xmlfeed status [config]: last and next import per configuration
#[derive(Args)]
pub struct StatusCmd {
    pub config: Option<ConfigRef>,
}

#[derive(Debug, Serialize)]
pub struct ConfigStatus {
    pub config_id: i32,
    pub name: String,
    pub import_type: ImportType,
    pub enabled: bool,
    pub xml_feed_url: String,
    pub last_import: Option<DateTime<Utc>>,
    pub last_import_status: Option<String>,
    pub next_run: Option<DateTime<Utc>>,
    pub due: bool,
    pub recent_logs: Vec<ImportLogEntry>,
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub configurations: Vec<ConfigStatus>,
}

fn config_status(c: ImportConfiguration, recent_logs: Vec<ImportLogEntry>, now: DateTime<Utc>) -> ConfigStatus {
    ConfigStatus {
        next_run: due::next_run(&c),
        due: due::is_due(&c, now),
        config_id: c.config_id,
        name: c.name,
        import_type: c.import_type,
        enabled: c.enabled,
        xml_feed_url: c.xml_feed_url,
        last_import: c.last_import,
        last_import_status: c.last_import_status,
        recent_logs,
    }
}

pub async fn collect(pool: &PgPool, config: Option<&ConfigRef>) -> Result<StatusReport> {
    let configs = match config {
        Some(r) => vec![configuration::db::get(pool, r).await?],
        None => configuration::db::list(pool, None).await?,
    };
    let now = Utc::now();
    let mut configurations = Vec::with_capacity(configs.len());
    for c in configs {
        let logs = audit::db::list(pool, Some(c.config_id), None, RECENT_LOGS).await?;
        configurations.push(config_status(c, logs, now));
    }
    Ok(StatusReport { configurations })
}

pub async fn run(pool: &PgPool, args: StatusCmd) -> Result<()> {
    let log = telemetry::status();
    let _g = log.root_span_kv([("config", format!("{:?}", args.config))]).entered();
    let report = {
        let _s = log.span(&StatusPhase::Load).entered();
        collect(pool, args.config.as_ref()).await?
    };

    let _s = log.span(&StatusPhase::Logs).entered();
    for c in &report.configurations {
        log.info(format!(
            "📅 [{}] {} ({}) enabled={} last_import={:?} status={:?} next_run={:?}{}",
            c.config_id, c.name, c.import_type, c.enabled, c.last_import, c.last_import_status, c.next_run,
            if c.due && c.enabled { " due" } else { "" }
        ));
        for e in &c.recent_logs {
            log.info(format!(
                "   [{}] {} {} imported={} updated={} errors={}",
                e.log_id, e.import_datetime.format("%Y-%m-%d %H:%M"), e.status, e.records_imported, e.records_updated, e.error_count
            ));
        }
    }
    if telemetry::config::json_mode() {
        log.result(&report)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn status_carries_next_run() {
        let now = Utc::now();
        let c = ImportConfiguration {
            last_import: Some(now - Duration::hours(2)),
            last_import_status: Some("Partial".into()),
            import_frequency: crate::configuration::types::Frequency::Hourly,
            ..ImportConfiguration::fixture(ImportType::Items, "https://shop.example/i.xml")
        };
        let s = config_status(c, Vec::new(), now);
        assert_eq!(s.next_run, Some(now - Duration::hours(1)));
        assert!(s.due);
        assert_eq!(s.last_import_status.as_deref(), Some("Partial"));
    }
}
