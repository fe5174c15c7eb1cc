#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Html,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Some(OutputFormat::Text),
            "json" => Some(OutputFormat::Json),
            "html" => Some(OutputFormat::Html),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub pretty: bool,
}

impl OutputConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// `--json` wins over `XMLFEED_OUTPUT_FORMAT` when no format is set.
    pub(crate) fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let format = lookup("XMLFEED_OUTPUT_FORMAT")
            .and_then(|v| OutputFormat::parse(&v))
            .unwrap_or(if crate::telemetry::config::json_mode() { OutputFormat::Json } else { OutputFormat::Text });
        let pretty = matches!(
            lookup("XMLFEED_OUTPUT_PRETTY").map(|v| v.to_ascii_lowercase()).as_deref(),
            Some("1" | "true" | "yes")
        );
        OutputConfig { format, pretty }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_format_and_pretty_flag() {
        let cfg = OutputConfig::from_lookup(|k| match k {
            "XMLFEED_OUTPUT_FORMAT" => Some("HTML".into()),
            "XMLFEED_OUTPUT_PRETTY" => Some("Yes".into()),
            _ => None,
        });
        assert_eq!(cfg, OutputConfig { format: OutputFormat::Html, pretty: true });

        let cfg = OutputConfig::from_lookup(|k| (k == "XMLFEED_OUTPUT_FORMAT").then(|| "json".to_string()));
        assert_eq!(cfg.format, OutputFormat::Json);
        assert!(!cfg.pretty);
        assert_eq!(OutputFormat::parse("yaml"), None);
    }
}
