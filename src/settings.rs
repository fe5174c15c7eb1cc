use std::time::Duration;

const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 60;
const DEFAULT_USER_AGENT: &str = concat!("xmlfeed/", env!("CARGO_PKG_VERSION"));
const DEFAULT_AGGRESSIVE_ATTEMPTS: u32 = 5;
const DEFAULT_AGGRESSIVE_INTERVAL_SECS: u64 = 3;
const DEFAULT_LOG_RETENTION: i64 = 100;
const DEFAULT_BIND: &str = "127.0.0.1:8710";
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_SMTP_FROM: &str = "xmlfeed@localhost";

/// Outgoing mail for scheduled import notices; absent means notices only go to the log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
}

/// Process-wide knobs read from the environment (after `.env` is loaded).
#[derive(Clone, Debug)]
pub struct Settings {
    pub fetch_timeout: Duration,
    pub user_agent: String,
    pub aggressive_attempts: u32,
    pub aggressive_interval: Duration,
    pub log_retention: i64,
    pub bind: String,
    pub smtp: Option<SmtpSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            aggressive_attempts: DEFAULT_AGGRESSIVE_ATTEMPTS,
            aggressive_interval: Duration::from_secs(DEFAULT_AGGRESSIVE_INTERVAL_SECS),
            log_retention: DEFAULT_LOG_RETENTION,
            bind: DEFAULT_BIND.to_string(),
            smtp: None,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(secs) = lookup("XMLFEED_FETCH_TIMEOUT_SECS").and_then(|v| v.parse::<u64>().ok()) {
            cfg.fetch_timeout = Duration::from_secs(secs);
        }
        if let Some(ua) = lookup("XMLFEED_USER_AGENT").filter(|v| !v.trim().is_empty()) {
            cfg.user_agent = ua;
        }
        if let Some(n) = lookup("XMLFEED_AGGRESSIVE_ATTEMPTS").and_then(|v| v.parse::<u32>().ok()) {
            cfg.aggressive_attempts = n.max(1);
        }
        if let Some(secs) = lookup("XMLFEED_AGGRESSIVE_INTERVAL_SECS").and_then(|v| v.parse::<u64>().ok()) {
            cfg.aggressive_interval = Duration::from_secs(secs);
        }
        if let Some(n) = lookup("XMLFEED_LOG_RETENTION").and_then(|v| v.parse::<i64>().ok()) {
            if n > 0 { cfg.log_retention = n; }
        }
        if let Some(bind) = lookup("XMLFEED_BIND") {
            cfg.bind = bind;
        }
        if let Some(host) = lookup("XMLFEED_SMTP_HOST").filter(|v| !v.trim().is_empty()) {
            cfg.smtp = Some(SmtpSettings {
                host,
                port: lookup("XMLFEED_SMTP_PORT").and_then(|v| v.parse().ok()).unwrap_or(DEFAULT_SMTP_PORT),
                username: lookup("XMLFEED_SMTP_USERNAME").filter(|v| !v.is_empty()),
                password: lookup("XMLFEED_SMTP_PASSWORD"),
                from: lookup("XMLFEED_SMTP_FROM").unwrap_or_else(|| DEFAULT_SMTP_FROM.to_string()),
            });
        }
        cfg
    }
}
