use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::telemetry::{self};
use crate::telemetry::ops::init::Phase as InitPhase;

/// xmlfeed init: create the `xml` schema and tables
#[derive(Args)]
pub struct InitCmd {
    #[arg(long, default_value_t = false)]
    apply: bool,
}

#[derive(Serialize)]
struct MigrationInfo {
    version: i64,
    description: String,
}

#[derive(Serialize)]
struct InitPlan {
    migrations: Vec<MigrationInfo>,
}

#[derive(Serialize)]
struct InitResult {
    applied: usize,
}

pub async fn connect(dsn: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(dsn)
        .await
        .context("connecting to postgres")
}

pub async fn run(pool: &PgPool, args: InitCmd) -> Result<()> {
    let log = telemetry::init();
    let _g = log.root_span_kv([("mode", if args.apply { "apply".to_string() } else { "plan".to_string() })]).entered();
    let migrator = sqlx::migrate!();

    if !args.apply {
        let _s = log.span(&InitPhase::Plan).entered();
        let migrations: Vec<MigrationInfo> = migrator
            .iter()
            .map(|m| MigrationInfo { version: m.version, description: m.description.to_string() })
            .collect();
        log.info(format!("📝 Init plan: {} migration(s) embedded", migrations.len()));
        for m in &migrations {
            log.info(format!("   {} {}", m.version, m.description));
        }
        log.info("   Use --apply to execute.");
        if telemetry::config::json_mode() {
            log.plan(&InitPlan { migrations })?;
        }
        return Ok(());
    }

    let _s = log.span(&InitPhase::Migrate).entered();
    // idempotent: already applied versions are skipped
    migrator.run(pool).await.context("running migrations")?;
    log.info("✅ Database initialized");
    if telemetry::config::json_mode() {
        log.result(&InitResult { applied: migrator.iter().count() })?;
    }
    Ok(())
}
