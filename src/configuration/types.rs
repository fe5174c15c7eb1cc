use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::source::BasicAuth;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
pub enum ImportType {
    Items,
    Orders,
    Customers,
    #[serde(rename = "Product Updates")]
    #[value(name = "product-updates")]
    ProductUpdates,
}

impl ImportType {
    pub const ALL: [ImportType; 4] = [ImportType::Items, ImportType::Orders, ImportType::Customers, ImportType::ProductUpdates];

    pub fn as_str(&self) -> &'static str {
        match self {
            ImportType::Items => "Items",
            ImportType::Orders => "Orders",
            ImportType::Customers => "Customers",
            ImportType::ProductUpdates => "Product Updates",
        }
    }

    /// Feed element that represents one record of this type.
    pub fn element(&self) -> &'static str {
        match self {
            ImportType::Items | ImportType::ProductUpdates => "SHOPITEM",
            ImportType::Orders => "ORDER",
            ImportType::Customers => "CUSTOMER",
        }
    }

    /// Types the import pipeline can persist.
    pub fn is_supported(&self) -> bool {
        matches!(self, ImportType::Items | ImportType::Orders)
    }
}

impl fmt::Display for ImportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant { pub kind: &'static str, pub value: String }

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {} '{}'", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

impl FromStr for ImportType {
    type Err = UnknownVariant;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ImportType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownVariant { kind: "import type", value: s.to_string() })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum Frequency {
    Hourly,
    #[default]
    Daily,
    Weekly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self { Frequency::Hourly => "Hourly", Frequency::Daily => "Daily", Frequency::Weekly => "Weekly" }
    }

    pub fn interval(&self) -> Duration {
        match self { Frequency::Hourly => Duration::hours(1), Frequency::Daily => Duration::days(1), Frequency::Weekly => Duration::weeks(1) }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Frequency {
    type Err = UnknownVariant;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hourly" => Ok(Frequency::Hourly),
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            _ => Err(UnknownVariant { kind: "import frequency", value: s.to_string() }),
        }
    }
}

/// Row of `xml.import_configuration` as stored.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ConfigurationRow {
    pub config_id: i32,
    pub name: String,
    pub import_type: String,
    pub enabled: bool,
    pub xml_feed_url: String,
    pub company: Option<String>,
    pub import_frequency: String,
    pub check_feed_changes: bool,
    pub auth_username: Option<String>,
    pub auth_password: Option<String>,
    pub create_item_groups: bool,
    pub create_manufacturers: bool,
    pub update_stock_levels: bool,
    pub download_images: bool,
    pub create_customers: bool,
    pub create_placeholder_items: bool,
    pub auto_submit_orders: bool,
    pub notification_emails: Option<String>,
    pub last_import: Option<DateTime<Utc>>,
    pub last_import_status: Option<String>,
    pub last_etag: Option<String>,
    pub last_modified: Option<String>,
    pub last_content_size: Option<i64>,
}

/// One configured feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportConfiguration {
    pub config_id: i32,
    pub name: String,
    pub import_type: ImportType,
    pub enabled: bool,
    pub xml_feed_url: String,
    pub company: Option<String>,
    pub import_frequency: Frequency,
    pub check_feed_changes: bool,
    pub auth_username: Option<String>,
    #[serde(skip_serializing)]
    pub auth_password: Option<String>,
    pub create_item_groups: bool,
    pub create_manufacturers: bool,
    pub update_stock_levels: bool,
    pub download_images: bool,
    pub create_customers: bool,
    pub create_placeholder_items: bool,
    pub auto_submit_orders: bool,
    pub notification_emails: Option<String>,
    pub last_import: Option<DateTime<Utc>>,
    pub last_import_status: Option<String>,
    pub last_etag: Option<String>,
    pub last_modified: Option<String>,
    pub last_content_size: Option<i64>,
}

impl TryFrom<ConfigurationRow> for ImportConfiguration {
    type Error = UnknownVariant;
    fn try_from(r: ConfigurationRow) -> Result<Self, Self::Error> {
        Ok(ImportConfiguration {
            config_id: r.config_id,
            name: r.name,
            import_type: r.import_type.parse()?,
            enabled: r.enabled,
            xml_feed_url: r.xml_feed_url,
            company: r.company,
            import_frequency: r.import_frequency.parse()?,
            check_feed_changes: r.check_feed_changes,
            auth_username: r.auth_username,
            auth_password: r.auth_password,
            create_item_groups: r.create_item_groups,
            create_manufacturers: r.create_manufacturers,
            update_stock_levels: r.update_stock_levels,
            download_images: r.download_images,
            create_customers: r.create_customers,
            create_placeholder_items: r.create_placeholder_items,
            auto_submit_orders: r.auto_submit_orders,
            notification_emails: r.notification_emails,
            last_import: r.last_import,
            last_import_status: r.last_import_status,
            last_etag: r.last_etag,
            last_modified: r.last_modified,
            last_content_size: r.last_content_size,
        })
    }
}

impl ImportConfiguration {
    pub fn auth(&self) -> Option<BasicAuth> {
        BasicAuth::from_parts(self.auth_username.clone(), self.auth_password.clone())
    }

    pub fn has_url(&self) -> bool { !self.xml_feed_url.trim().is_empty() }

    /// Recipients of scheduled import notices.
    pub fn emails(&self) -> Vec<String> { split_emails(self.notification_emails.as_deref()) }

    /// Settings editable by an administrator, detached from the bookkeeping fields.
    pub fn settings(&self) -> ConfigurationSettings {
        ConfigurationSettings {
            name: self.name.clone(),
            import_type: self.import_type,
            enabled: self.enabled,
            xml_feed_url: self.xml_feed_url.clone(),
            company: self.company.clone(),
            import_frequency: self.import_frequency,
            check_feed_changes: self.check_feed_changes,
            auth_username: self.auth_username.clone(),
            auth_password: self.auth_password.clone(),
            create_item_groups: self.create_item_groups,
            create_manufacturers: self.create_manufacturers,
            update_stock_levels: self.update_stock_levels,
            download_images: self.download_images,
            create_customers: self.create_customers,
            create_placeholder_items: self.create_placeholder_items,
            auto_submit_orders: self.auto_submit_orders,
            notification_emails: self.notification_emails.clone(),
        }
    }
}

#[cfg(test)]
impl ImportConfiguration {
    /// Enabled configuration pointing at `url`, as the tests build it.
    pub fn fixture(import_type: ImportType, url: impl Into<String>) -> Self {
        let s = ConfigurationSettings::new(format!("{import_type} feed"), import_type);
        ImportConfiguration {
            config_id: 1,
            name: s.name,
            import_type,
            enabled: true,
            xml_feed_url: url.into(),
            company: Some("Herbatica".into()),
            import_frequency: s.import_frequency,
            check_feed_changes: s.check_feed_changes,
            auth_username: None,
            auth_password: None,
            create_item_groups: s.create_item_groups,
            create_manufacturers: s.create_manufacturers,
            update_stock_levels: s.update_stock_levels,
            download_images: false,
            create_customers: s.create_customers,
            create_placeholder_items: s.create_placeholder_items,
            auto_submit_orders: s.auto_submit_orders,
            notification_emails: None,
            last_import: None,
            last_import_status: None,
            last_etag: None,
            last_modified: None,
            last_content_size: None,
        }
    }
}

/// Administrator-editable part of a configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigurationSettings {
    pub name: String,
    pub import_type: ImportType,
    pub enabled: bool,
    pub xml_feed_url: String,
    pub company: Option<String>,
    pub import_frequency: Frequency,
    pub check_feed_changes: bool,
    pub auth_username: Option<String>,
    #[serde(skip_serializing)]
    pub auth_password: Option<String>,
    pub create_item_groups: bool,
    pub create_manufacturers: bool,
    pub update_stock_levels: bool,
    pub download_images: bool,
    pub create_customers: bool,
    pub create_placeholder_items: bool,
    pub auto_submit_orders: bool,
    pub notification_emails: Option<String>,
}

impl ConfigurationSettings {
    pub fn new(name: impl Into<String>, import_type: ImportType) -> Self {
        ConfigurationSettings {
            name: name.into(),
            import_type,
            enabled: false,
            xml_feed_url: String::new(),
            company: None,
            import_frequency: Frequency::Daily,
            check_feed_changes: true,
            auth_username: None,
            auth_password: None,
            create_item_groups: true,
            create_manufacturers: true,
            update_stock_levels: true,
            download_images: true,
            create_customers: true,
            create_placeholder_items: true,
            auto_submit_orders: false,
            notification_emails: None,
        }
    }

    /// Checks applied before every save.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingName);
        }
        let url = self.xml_feed_url.trim();
        if self.enabled {
            if url.is_empty() { return Err(ValidationError::MissingUrl); }
            if self.company.as_deref().map(str::trim).unwrap_or_default().is_empty() {
                return Err(ValidationError::MissingCompany);
            }
        }
        if !url.is_empty() && !url.starts_with('/') && !is_feed_url(url) {
            return Err(ValidationError::InvalidUrl(url.to_string()));
        }
        for email in self.emails() {
            if !email.contains('@') {
                return Err(ValidationError::InvalidEmail(email));
            }
        }
        Ok(())
    }

    pub fn emails(&self) -> Vec<String> { split_emails(self.notification_emails.as_deref()) }
}

fn split_emails(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .collect()
}

/// Absolute http(s) URL with a host.
fn is_feed_url(raw: &str) -> bool {
    Url::parse(raw)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some_and(|h| !h.is_empty()))
        .unwrap_or(false)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    MissingName,
    MissingUrl,
    MissingCompany,
    InvalidUrl(String),
    InvalidEmail(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::MissingName => write!(f, "configuration name is required"),
            ValidationError::MissingUrl => write!(f, "XML Feed URL is required when import is enabled"),
            ValidationError::MissingCompany => write!(f, "Company is required when import is enabled"),
            ValidationError::InvalidUrl(u) => write!(f, "XML Feed URL must be an http(s) URL or an absolute path: {u}"),
            ValidationError::InvalidEmail(e) => write!(f, "Invalid email address: {e}"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Configuration reference accepted on the command line and by the HTTP API: id or name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawConfigRef")]
pub enum ConfigRef {
    Id(i32),
    Name(String),
}

/// JSON form: a number, or a string that is read like the command-line argument.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawConfigRef {
    Id(i32),
    Text(String),
}

impl From<RawConfigRef> for ConfigRef {
    fn from(raw: RawConfigRef) -> Self {
        match raw {
            RawConfigRef::Id(id) => ConfigRef::Id(id),
            RawConfigRef::Text(s) => match s.parse() {
                Ok(r) => r,
                Err(never) => match never {},
            },
        }
    }
}

impl FromStr for ConfigRef {
    type Err = std::convert::Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().parse::<i32>() {
            Ok(id) => ConfigRef::Id(id),
            Err(_) => ConfigRef::Name(s.trim().to_string()),
        })
    }
}

impl fmt::Display for ConfigRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { ConfigRef::Id(id) => write!(f, "#{id}"), ConfigRef::Name(n) => write!(f, "'{n}'") }
    }
}

#[derive(Serialize)]
pub struct ConfigPlan {
    pub action: &'static str,
    pub settings: ConfigurationSettings,
}

#[derive(Serialize)]
pub struct ConfigSaved {
    pub config_id: i32,
    pub inserted: bool,
    pub name: String,
}

#[derive(Serialize)]
pub struct ConfigList {
    pub configurations: Vec<ImportConfiguration>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled() -> ConfigurationSettings {
        ConfigurationSettings {
            enabled: true,
            xml_feed_url: "https://shop.example/feed.xml".into(),
            company: Some("Herbatica".into()),
            ..ConfigurationSettings::new("Orders feed", ImportType::Orders)
        }
    }

    #[test]
    fn import_type_names_and_elements() {
        assert_eq!("product updates".parse::<ImportType>().unwrap(), ImportType::ProductUpdates);
        assert_eq!(ImportType::Orders.element(), "ORDER");
        assert_eq!(ImportType::ProductUpdates.element(), "SHOPITEM");
        assert_eq!(ImportType::Customers.element(), "CUSTOMER");
        assert!("Invoices".parse::<ImportType>().is_err());
        assert_eq!(serde_json::to_string(&ImportType::ProductUpdates).unwrap(), "\"Product Updates\"");
    }

    #[test]
    fn frequency_intervals() {
        assert_eq!(Frequency::Hourly.interval(), Duration::hours(1));
        assert_eq!("weekly".parse::<Frequency>().unwrap(), Frequency::Weekly);
        assert!("monthly".parse::<Frequency>().is_err());
    }

    #[test]
    fn enabled_configuration_needs_url_and_company() {
        assert_eq!(enabled().validate(), Ok(()));

        let no_url = ConfigurationSettings { xml_feed_url: " ".into(), ..enabled() };
        assert_eq!(no_url.validate(), Err(ValidationError::MissingUrl));

        let no_company = ConfigurationSettings { company: None, ..enabled() };
        assert_eq!(no_company.validate(), Err(ValidationError::MissingCompany));

        let disabled = ConfigurationSettings { enabled: false, xml_feed_url: String::new(), company: None, ..enabled() };
        assert_eq!(disabled.validate(), Ok(()));
    }

    #[test]
    fn url_scheme_and_emails_are_checked() {
        let ftp = ConfigurationSettings { xml_feed_url: "ftp://x/feed.xml".into(), ..enabled() };
        assert!(matches!(ftp.validate(), Err(ValidationError::InvalidUrl(_))));

        let local = ConfigurationSettings { xml_feed_url: "/srv/feeds/orders.xml".into(), ..enabled() };
        assert_eq!(local.validate(), Ok(()));

        for bad in ["https://", "http://shop example.sk/feed.xml", "shop.example.sk/feed.xml", "feed.xml"] {
            let cfg = ConfigurationSettings { xml_feed_url: bad.into(), ..enabled() };
            assert!(matches!(cfg.validate(), Err(ValidationError::InvalidUrl(_))), "{bad}");
        }
        let remote = ConfigurationSettings { xml_feed_url: "https://shop.example.sk/export?type=orders".into(), ..enabled() };
        assert_eq!(remote.validate(), Ok(()));

        let emails = ConfigurationSettings { notification_emails: Some("ops@example.sk, nobody".into()), ..enabled() };
        assert_eq!(emails.validate(), Err(ValidationError::InvalidEmail("nobody".into())));
        assert_eq!(emails.emails().len(), 2);
    }

    #[test]
    fn config_refs_parse_ids_and_names() {
        assert_eq!("12".parse::<ConfigRef>().unwrap(), ConfigRef::Id(12));
        assert_eq!("Orders feed".parse::<ConfigRef>().unwrap(), ConfigRef::Name("Orders feed".into()));
        let from_json: ConfigRef = serde_json::from_str("3").unwrap();
        assert_eq!(from_json, ConfigRef::Id(3));
        let quoted: ConfigRef = serde_json::from_str(r#"" 12 ""#).unwrap();
        assert_eq!(quoted, ConfigRef::Id(12));
        let named: ConfigRef = serde_json::from_str(r#""Shop""#).unwrap();
        assert_eq!(named, ConfigRef::Name("Shop".into()));
        assert!(serde_json::from_str::<ConfigRef>("true").is_err());
    }
}
