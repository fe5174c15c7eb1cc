use anyhow::Result;

use super::items::ItemRecord;
use super::orders::OrderWrite;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome { Inserted, Updated }

/// Persistence used by the import pipeline.
#[allow(async_fn_in_trait)]
pub trait RecordStore {
    async fn ensure_item_group(&self, name: &str) -> Result<()>;
    async fn ensure_manufacturer(&self, name: &str) -> Result<()>;
    async fn upsert_item(&self, item: &ItemRecord) -> Result<UpsertOutcome>;
    async fn item_exists(&self, item_code: &str) -> Result<bool>;

    async fn order_exists(&self, external_order_id: &str) -> Result<bool>;
    /// Looks a customer up by e-mail first, then by name.
    async fn find_customer(&self, email: Option<&str>, name: &str) -> Result<Option<i64>>;
    /// Writes customer, addresses, placeholder items and the order in one unit;
    /// on error nothing of it remains. Returns the new order id.
    async fn write_order(&self, write: &OrderWrite) -> Result<i64>;
}
