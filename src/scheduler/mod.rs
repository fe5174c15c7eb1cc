use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;
use sqlx::PgPool;

use crate::configuration::{self, types::ImportConfiguration};
use crate::import::{self, types::ManualImport};
use crate::settings::Settings;
use crate::source::FeedFetcher;
use crate::telemetry::{self};
use crate::telemetry::ops::schedule::Phase as SchedulePhase;

pub mod changes;
pub mod due;
pub mod notify;

use notify::{notify_run, Notifications};

/// xmlfeed schedule: import every enabled configuration that is due (plan-only by default)
#[derive(Args)]
pub struct ScheduleCmd {
    #[arg(long, default_value_t = false)]
    pub apply: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduledAction { NotDue, Due, Unchanged, Imported, Failed }

#[derive(Debug, Serialize)]
pub struct ScheduledRun {
    pub config_id: i32,
    pub name: String,
    pub next_run: Option<DateTime<Utc>>,
    pub action: ScheduledAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ManualImport>,
}

#[derive(Debug, Serialize)]
pub struct ScheduleReport {
    pub runs: Vec<ScheduledRun>,
}

pub(crate) fn planned(config: &ImportConfiguration, now: DateTime<Utc>) -> ScheduledRun {
    ScheduledRun {
        config_id: config.config_id,
        name: config.name.clone(),
        next_run: due::next_run(config),
        action: if due::is_due(config, now) { ScheduledAction::Due } else { ScheduledAction::NotDue },
        reason: None,
        result: None,
    }
}

async fn run_due(pool: &PgPool, settings: &Settings, fetcher: &FeedFetcher, config: &ImportConfiguration, now: DateTime<Utc>) -> Result<ScheduledRun> {
    let log = telemetry::schedule();
    let mut run = planned(config, now);
    if config.check_feed_changes {
        let _s = log.span_kv(&SchedulePhase::Changes, [("config_id", config.config_id.to_string())]).entered();
        let change = changes::has_feed_changed(fetcher, config, now).await;
        if let Some(h) = &change.headers {
            configuration::db::record_feed_headers(pool, config.config_id, h).await?;
        }
        if !change.changed {
            log.info(format!("⏭️ [{}] {} unchanged: {}", config.config_id, config.name, change.reason));
            run.action = ScheduledAction::Unchanged;
            run.reason = Some(change.reason);
            return Ok(run);
        }
        run.reason = Some(change.reason);
    }

    let _s = log.span_kv(&SchedulePhase::Import, [("config_id", config.config_id.to_string())]).entered();
    let outcome = import::trigger_manual_import(pool, settings, fetcher, config).await?;
    log.info(format!("📦 [{}] {}: {}", config.config_id, config.name, outcome.message));
    run.action = ScheduledAction::Imported;
    run.result = Some(outcome);
    Ok(run)
}

pub async fn run(pool: &PgPool, settings: &Settings, args: ScheduleCmd) -> Result<()> {
    let log = telemetry::schedule();
    let _g = log.root_span_kv([("mode", if args.apply { "apply".to_string() } else { "plan".to_string() })]).entered();
    let now = Utc::now();
    let configs = configuration::db::list(pool, Some(true)).await?;

    if !args.apply {
        let _s = log.span(&SchedulePhase::Plan).entered();
        let runs: Vec<ScheduledRun> = configs.iter().map(|c| planned(c, now)).collect();
        log.info(format!(
            "📝 Schedule plan: {} of {} enabled configuration(s) due",
            runs.iter().filter(|r| r.action == ScheduledAction::Due).count(),
            runs.len()
        ));
        for r in &runs {
            log.info(format!("   [{}] {} {:?} next_run={:?}", r.config_id, r.name, r.action, r.next_run));
        }
        log.info("   Use --apply to execute.");
        if telemetry::config::json_mode() {
            log.plan(&ScheduleReport { runs })?;
        }
        return Ok(());
    }

    let fetcher = FeedFetcher::new(settings)?;
    let notifier = Notifications::from_settings(settings)?;
    let mut runs = Vec::with_capacity(configs.len());
    for config in &configs {
        if !due::is_due(config, now) {
            runs.push(planned(config, now));
            continue;
        }
        // one failing configuration does not stop the others
        let run = match run_due(pool, settings, &fetcher, config, now).await {
            Ok(r) => r,
            Err(e) => {
                log.error(format!("❌ [{}] {}: {e:#}", config.config_id, config.name));
                ScheduledRun { action: ScheduledAction::Failed, reason: Some(format!("{e:#}")), ..planned(config, now) }
            }
        };
        notify_run(&notifier, config, &run).await;
        runs.push(run);
    }
    let imported = runs.iter().filter(|r| r.action == ScheduledAction::Imported).count();
    log.info(format!("✅ Scheduled run finished: {imported} import(s)"));
    if telemetry::config::json_mode() {
        log.result(&ScheduleReport { runs })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use crate::configuration::types::ImportType;

    #[test]
    fn plan_marks_due_and_pending_configurations() {
        let now = Utc::now();
        let fresh = ImportConfiguration::fixture(ImportType::Orders, "https://shop.example/o.xml");
        let recent = ImportConfiguration { last_import: Some(now - Duration::minutes(5)), ..fresh.clone() };

        assert_eq!(planned(&fresh, now).action, ScheduledAction::Due);
        let r = planned(&recent, now);
        assert_eq!(r.action, ScheduledAction::NotDue);
        assert_eq!(r.next_run, Some(now - Duration::minutes(5) + Duration::days(1)));
    }
}
