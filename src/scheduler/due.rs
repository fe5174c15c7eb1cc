use chrono::{DateTime, Utc};

use crate::configuration::types::ImportConfiguration;

/// `last_import + frequency`; None until the first import.
pub fn next_run(config: &ImportConfiguration) -> Option<DateTime<Utc>> {
    config.last_import.map(|t| t + config.import_frequency.interval())
}

/// Enabled configurations that never ran or whose next run has passed.
pub fn is_due(config: &ImportConfiguration, now: DateTime<Utc>) -> bool {
    config.enabled && next_run(config).is_none_or(|next| next <= now)
}
