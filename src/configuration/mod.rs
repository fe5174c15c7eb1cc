use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use sqlx::PgPool;

use crate::telemetry::{self};
use crate::telemetry::ops::config::Phase as ConfigPhase;

pub mod db;
pub mod types;

use types::{ConfigList, ConfigPlan, ConfigRef, ConfigSaved, ConfigurationSettings, Frequency, ImportType};

/// xmlfeed config add/ls/show/set
#[derive(Args)]
pub struct ConfigCmd {
    #[command(subcommand)]
    pub cmd: ConfigSub,
}

#[derive(Subcommand)]
pub enum ConfigSub {
    /// Create a configuration (plan-only by default; use --apply to write)
    Add {
        name: String,
        #[arg(long = "type", value_enum)]
        import_type: ImportType,
        #[command(flatten)]
        fields: SettingsArgs,
        #[arg(long, default_value_t = false)]
        apply: bool,
    },
    /// List configurations
    Ls {
        #[arg(long)]
        enabled: Option<bool>,
    },
    /// Show one configuration by id or name
    Show { config: ConfigRef },
    /// Edit an existing configuration (plan-only by default)
    Set {
        config: ConfigRef,
        #[arg(long = "type", value_enum)]
        import_type: Option<ImportType>,
        #[command(flatten)]
        fields: SettingsArgs,
        #[arg(long, default_value_t = false)]
        apply: bool,
    },
}

/// Optional field overrides shared by `add` and `set`.
#[derive(Args, Default)]
pub struct SettingsArgs {
    #[arg(long)] pub enabled: Option<bool>,
    #[arg(long)] pub url: Option<String>,
    #[arg(long)] pub company: Option<String>,
    #[arg(long, value_enum)] pub frequency: Option<Frequency>,
    #[arg(long)] pub check_feed_changes: Option<bool>,
    #[arg(long)] pub auth_username: Option<String>,
    #[arg(long)] pub auth_password: Option<String>,
    #[arg(long)] pub create_item_groups: Option<bool>,
    #[arg(long)] pub create_manufacturers: Option<bool>,
    #[arg(long)] pub update_stock_levels: Option<bool>,
    #[arg(long)] pub download_images: Option<bool>,
    #[arg(long)] pub create_customers: Option<bool>,
    #[arg(long)] pub create_placeholder_items: Option<bool>,
    #[arg(long)] pub auto_submit_orders: Option<bool>,
    /// Comma separated list of addresses
    #[arg(long)] pub notification_emails: Option<String>,
}

impl SettingsArgs {
    /// Applies every flag that was given; empty strings clear optional text fields.
    pub fn apply_to(self, s: &mut ConfigurationSettings) {
        fn text(v: String) -> Option<String> { let v = v.trim().to_string(); (!v.is_empty()).then_some(v) }
        if let Some(v) = self.enabled { s.enabled = v; }
        if let Some(v) = self.url { s.xml_feed_url = v.trim().to_string(); }
        if let Some(v) = self.company { s.company = text(v); }
        if let Some(v) = self.frequency { s.import_frequency = v; }
        if let Some(v) = self.check_feed_changes { s.check_feed_changes = v; }
        if let Some(v) = self.auth_username { s.auth_username = text(v); }
        if let Some(v) = self.auth_password { s.auth_password = text(v); }
        if let Some(v) = self.create_item_groups { s.create_item_groups = v; }
        if let Some(v) = self.create_manufacturers { s.create_manufacturers = v; }
        if let Some(v) = self.update_stock_levels { s.update_stock_levels = v; }
        if let Some(v) = self.download_images { s.download_images = v; }
        if let Some(v) = self.create_customers { s.create_customers = v; }
        if let Some(v) = self.create_placeholder_items { s.create_placeholder_items = v; }
        if let Some(v) = self.auto_submit_orders { s.auto_submit_orders = v; }
        if let Some(v) = self.notification_emails { s.notification_emails = text(v); }
    }
}

pub async fn run(pool: &PgPool, args: ConfigCmd) -> Result<()> {
    match args.cmd {
        ConfigSub::Add { name, import_type, fields, apply } => {
            let mut settings = ConfigurationSettings::new(name, import_type);
            fields.apply_to(&mut settings);
            save_settings(pool, "add", settings, apply).await?
        }
        ConfigSub::Ls { enabled } => ls_configs(pool, enabled).await?,
        ConfigSub::Show { config } => show_config(pool, config).await?,
        ConfigSub::Set { config, import_type, fields, apply } => {
            let current = db::get(pool, &config).await?;
            let mut settings = current.settings();
            if let Some(t) = import_type { settings.import_type = t; }
            fields.apply_to(&mut settings);
            save_settings(pool, "set", settings, apply).await?
        }
    }
    Ok(())
}

async fn save_settings(pool: &PgPool, action: &'static str, settings: ConfigurationSettings, apply: bool) -> Result<()> {
    let log = telemetry::config();
    let _g = log.root_span_kv([
        ("mode", if apply { "apply".to_string() } else { "plan".to_string() }),
        ("action", action.to_string()),
        ("name", settings.name.clone()),
    ]).entered();

    // friendly validation error before DB I/O
    settings.validate().with_context(|| format!("configuration '{}'", settings.name))?;

    if !apply {
        let _s = log.span(&ConfigPhase::Plan).entered();
        log.info(format!(
            "📝 Config plan: {} name={} type={} enabled={} url={:?} company={:?} frequency={}",
            action, settings.name, settings.import_type, settings.enabled, settings.xml_feed_url, settings.company, settings.import_frequency
        ));
        log.info("   Use --apply to execute.");
        if telemetry::config::json_mode() {
            log.plan(&ConfigPlan { action, settings })?;
        }
        return Ok(());
    }

    let _s = log.span(&ConfigPhase::Save).entered();
    let (config_id, inserted) = db::save(pool, &settings).await?;
    if inserted { log.info(format!("➕ Configuration #{config_id} added")); } else { log.info(format!("♻️ Configuration #{config_id} updated")); }
    if telemetry::config::json_mode() {
        log.result(&ConfigSaved { config_id, inserted, name: settings.name })?;
    }
    Ok(())
}

async fn ls_configs(pool: &PgPool, enabled: Option<bool>) -> Result<()> {
    let log = telemetry::config();
    let _g = log.root_span_kv([("enabled", format!("{:?}", enabled))]).entered();
    let _s = log.span(&ConfigPhase::List).entered();
    let configurations = db::list(pool, enabled).await?;
    log.info("🗂️ Configurations:");
    for c in &configurations {
        log.info(format!(
            "[{}] {} type={} enabled={} url={} last_import={:?} status={:?}",
            c.config_id, c.name, c.import_type, c.enabled, c.xml_feed_url, c.last_import, c.last_import_status
        ));
    }
    if telemetry::config::json_mode() {
        log.result(&ConfigList { configurations })?;
    }
    Ok(())
}

async fn show_config(pool: &PgPool, config: ConfigRef) -> Result<()> {
    let log = telemetry::config();
    let _g = log.root_span_kv([("config", config.to_string())]).entered();
    let _s = log.span(&ConfigPhase::Show).entered();
    let c = db::get(pool, &config).await?;
    log.info(format!("🗂️ [{}] {} ({})", c.config_id, c.name, c.import_type));
    log.info(format!("   enabled={} frequency={} check_feed_changes={}", c.enabled, c.import_frequency, c.check_feed_changes));
    log.info(format!("   url={} company={:?} auth={}", c.xml_feed_url, c.company, c.auth_username.is_some()));
    log.info(format!("   last_import={:?} status={:?} etag={:?} size={:?}", c.last_import, c.last_import_status, c.last_etag, c.last_content_size));
    if telemetry::config::json_mode() {
        log.result(&c)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_args_override_and_clear() {
        let mut s = ConfigurationSettings::new("Items", ImportType::Items);
        s.company = Some("Old".into());
        let args = SettingsArgs {
            enabled: Some(true),
            url: Some(" https://shop.example/items.xml ".into()),
            company: Some("".into()),
            frequency: Some(Frequency::Hourly),
            download_images: Some(false),
            ..SettingsArgs::default()
        };
        args.apply_to(&mut s);
        assert!(s.enabled);
        assert_eq!(s.xml_feed_url, "https://shop.example/items.xml");
        assert_eq!(s.company, None);
        assert_eq!(s.import_frequency, Frequency::Hourly);
        assert!(!s.download_images);
        assert!(s.create_item_groups);
    }
}
