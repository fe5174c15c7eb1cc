use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use sqlx::PgPool;

use crate::configuration::{self, types::ConfigRef};
use crate::telemetry::{self};
use crate::telemetry::ops::log::Phase as LogPhase;
use crate::util::time::parse_since_opt;

pub mod db;
pub mod types;

use types::{LogList, NewLogEntry};

/// xmlfeed log ls
#[derive(Args)]
pub struct LogCmd {
    #[command(subcommand)]
    pub cmd: LogSub,
}

#[derive(Subcommand)]
pub enum LogSub {
    /// List import log entries, newest first
    Ls {
        #[arg(long)]
        config: Option<ConfigRef>,
        #[arg(long, default_value_t = 20)]
        limit: i64,
        /// "2d", "YYYY-MM-DD" or RFC3339
        #[arg(long)]
        since: Option<String>,
    },
}

/// Appends an audit entry for one import run.
pub async fn create_import_log(pool: &PgPool, retention: i64, entry: &NewLogEntry) -> Result<i64> {
    let log = telemetry::log();
    let id = db::insert(pool, entry, retention).await?;
    log.info_kv("🧾 import logged", [
        ("log_id", id.to_string()),
        ("import_type", entry.import_type.to_string()),
        ("status", entry.status.to_string()),
    ]);
    Ok(id)
}

pub async fn run(pool: &PgPool, args: LogCmd) -> Result<()> {
    match args.cmd {
        LogSub::Ls { config, limit, since } => ls_logs(pool, config, limit, since).await,
    }
}

async fn ls_logs(pool: &PgPool, config: Option<ConfigRef>, limit: i64, since: Option<String>) -> Result<()> {
    let log = telemetry::log();
    let _g = log.root_span_kv([
        ("config", format!("{:?}", config)),
        ("limit", limit.to_string()),
        ("since", format!("{:?}", since)),
    ]).entered();

    if limit <= 0 { bail!("--limit must be positive"); }
    let since_ts = parse_since_opt(&since)?;
    let config_id = match &config {
        Some(r) => Some(configuration::db::get(pool, r).await?.config_id),
        None => None,
    };

    let _s = log.span(&LogPhase::List).entered();
    let entries = db::list(pool, config_id, since_ts, limit).await?;
    log.info("🧾 Import log:");
    for e in &entries {
        log.info(format!(
            "[{}] {} {} {} imported={} updated={} errors={} source={}",
            e.log_id, e.import_datetime.format("%Y-%m-%d %H:%M:%S"), e.import_type, e.status,
            e.records_imported, e.records_updated, e.error_count, e.xml_source
        ));
    }
    if telemetry::config::json_mode() {
        log.result(&LogList { entries })?;
    }
    Ok(())
}
