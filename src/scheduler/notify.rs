use anyhow::{Context, Result};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::configuration::types::ImportConfiguration;
use crate::settings::{Settings, SmtpSettings};
use crate::telemetry;
use crate::telemetry::ops::schedule::Phase as SchedulePhase;

use super::{ScheduledAction, ScheduledRun};

/// What a recipient learns about one scheduled run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportNotice {
    pub config_id: i32,
    pub name: String,
    pub success: bool,
    pub message: String,
}

impl ImportNotice {
    /// Imported and failed runs produce a notice; skipped ones do not.
    pub fn for_run(run: &ScheduledRun) -> Option<Self> {
        let (success, message) = match (run.action, &run.result) {
            (ScheduledAction::Imported, Some(r)) => (r.success, r.message.clone()),
            (ScheduledAction::Failed, _) => (false, run.reason.clone().unwrap_or_else(|| "import failed".into())),
            _ => return None,
        };
        Some(ImportNotice { config_id: run.config_id, name: run.name.clone(), success, message })
    }

    pub fn subject(&self) -> String {
        let outcome = if self.success { "succeeded" } else { "failed" };
        format!("[xmlfeed] Import {outcome}: {}", self.name)
    }

    pub fn body(&self) -> String {
        format!("Configuration: {} (#{})\n\n{}\n", self.name, self.config_id, self.message)
    }
}

#[allow(async_fn_in_trait)]
pub trait Notifier {
    async fn notify(&self, recipients: &[String], notice: &ImportNotice) -> Result<()>;
}

/// Writes notices to the log only; used when no SMTP relay is configured.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    async fn notify(&self, recipients: &[String], notice: &ImportNotice) -> Result<()> {
        telemetry::schedule().info_kv(&format!("📧 {}", notice.subject()), [
            ("config_id", notice.config_id.to_string()),
            ("to", recipients.join(",")),
            ("success", notice.success.to_string()),
        ]);
        Ok(())
    }
}

pub struct SmtpNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(cfg: &SmtpSettings) -> Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.host)
            .with_context(|| format!("SMTP relay {}", cfg.host))?
            .port(cfg.port);
        if let Some(user) = &cfg.username {
            builder = builder.credentials(Credentials::new(user.clone(), cfg.password.clone().unwrap_or_default()));
        }
        let from = cfg.from.parse::<Mailbox>().with_context(|| format!("invalid sender address {}", cfg.from))?;
        Ok(Self { mailer: builder.build(), from })
    }
}

impl Notifier for SmtpNotifier {
    /// One message per recipient; a bad address or a rejected send does not stop the rest.
    async fn notify(&self, recipients: &[String], notice: &ImportNotice) -> Result<()> {
        let log = telemetry::schedule();
        for addr in recipients {
            let to = match addr.parse::<Mailbox>() {
                Ok(to) => to,
                Err(e) => {
                    log.warn(format!("✉️ skipping recipient {addr}: {e}"));
                    continue;
                }
            };
            let msg = Message::builder()
                .from(self.from.clone())
                .to(to)
                .subject(notice.subject())
                .header(ContentType::TEXT_PLAIN)
                .body(notice.body())?;
            match self.mailer.send(msg).await {
                Ok(_) => log.debug(format!("✉️ notice sent to {addr}")),
                Err(e) => log.warn(format!("✉️ sending to {addr} failed: {e}")),
            }
        }
        Ok(())
    }
}

pub enum Notifications {
    Log(LogNotifier),
    Smtp(SmtpNotifier),
}

impl Notifications {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(match &settings.smtp {
            Some(cfg) => Notifications::Smtp(SmtpNotifier::new(cfg)?),
            None => Notifications::Log(LogNotifier),
        })
    }
}

impl Notifier for Notifications {
    async fn notify(&self, recipients: &[String], notice: &ImportNotice) -> Result<()> {
        match self {
            Notifications::Log(n) => n.notify(recipients, notice).await,
            Notifications::Smtp(n) => n.notify(recipients, notice).await,
        }
    }
}

/// Sends the notice for `run` to the configuration's recipients. Notification failures are logged, never raised.
pub async fn notify_run<N: Notifier>(notifier: &N, config: &ImportConfiguration, run: &ScheduledRun) {
    let recipients = config.emails();
    if recipients.is_empty() { return; }
    let Some(notice) = ImportNotice::for_run(run) else { return };
    let log = telemetry::schedule();
    let _s = log.span_kv(&SchedulePhase::Notify, [("config_id", config.config_id.to_string())]).entered();
    if let Err(e) = notifier.notify(&recipients, &notice).await {
        log.warn(format!("✉️ [{}] notice not sent: {e:#}", config.config_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use anyhow::bail;
    use chrono::Utc;

    use crate::configuration::types::ImportType;
    use crate::import::types::ManualImport;
    use crate::scheduler::planned;

    #[derive(Default)]
    struct Recording {
        sent: Mutex<Vec<(Vec<String>, ImportNotice)>>,
    }

    impl Notifier for Recording {
        async fn notify(&self, recipients: &[String], notice: &ImportNotice) -> Result<()> {
            self.sent.lock().unwrap().push((recipients.to_vec(), notice.clone()));
            Ok(())
        }
    }

    struct Refusing;

    impl Notifier for Refusing {
        async fn notify(&self, _: &[String], _: &ImportNotice) -> Result<()> {
            bail!("relay refused")
        }
    }

    fn config(emails: Option<&str>) -> ImportConfiguration {
        ImportConfiguration {
            notification_emails: emails.map(str::to_string),
            ..ImportConfiguration::fixture(ImportType::Orders, "https://shop.example/o.xml")
        }
    }

    fn imported(config: &ImportConfiguration) -> ScheduledRun {
        ScheduledRun {
            action: ScheduledAction::Imported,
            result: Some(ManualImport {
                success: true,
                config_id: config.config_id,
                name: config.name.clone(),
                import_type: config.import_type,
                source: config.xml_feed_url.clone(),
                message: "Imported 3, updated 0".into(),
                status: None,
                log_id: Some(7),
                result: None,
            }),
            ..planned(config, Utc::now())
        }
    }

    #[tokio::test]
    async fn imported_and_failed_runs_reach_every_recipient() {
        let cfg = config(Some("ops@example.sk, sklad@example.sk"));
        let notifier = Recording::default();

        notify_run(&notifier, &cfg, &imported(&cfg)).await;
        let failed = ScheduledRun {
            action: ScheduledAction::Failed,
            reason: Some("503 returned by https://shop.example/o.xml".into()),
            ..planned(&cfg, Utc::now())
        };
        notify_run(&notifier, &cfg, &failed).await;

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, vec!["ops@example.sk".to_string(), "sklad@example.sk".to_string()]);
        assert!(sent[0].1.success);
        assert_eq!(sent[0].1.subject(), "[xmlfeed] Import succeeded: Orders feed");
        assert!(!sent[1].1.success);
        assert!(sent[1].1.body().contains("503 returned by"));
    }

    #[tokio::test]
    async fn skipped_runs_and_empty_recipient_lists_send_nothing() {
        let notifier = Recording::default();
        let with_emails = config(Some("ops@example.sk"));
        let unchanged = ScheduledRun { action: ScheduledAction::Unchanged, ..planned(&with_emails, Utc::now()) };
        notify_run(&notifier, &with_emails, &unchanged).await;

        let silent = config(Some(" , "));
        notify_run(&notifier, &silent, &imported(&silent)).await;

        assert!(notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn notifier_errors_do_not_escape() {
        let cfg = config(Some("ops@example.sk"));
        notify_run(&Refusing, &cfg, &imported(&cfg)).await;
    }
}
