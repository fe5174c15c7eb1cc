use serde::Serialize;
use tracing::Instrument;

use crate::configuration::types::{ImportConfiguration, ImportType};
use crate::telemetry::{self};
use crate::telemetry::ops::pipeline::Phase as PipelinePhase;
use crate::xml::{parse_document, XmlNode};

pub mod clean;
pub mod db;
pub mod items;
pub mod orders;
pub mod store;

use items::DEFAULT_ITEM_GROUP;
use orders::{CustomerWrite, OrderLineRecord, OrderWrite, SalesOrderRecord};
use store::{RecordStore, UpsertOutcome};

pub use db::PgRecordStore;

const MAX_ERROR_MESSAGES: usize = 10;

/// Per-run switches, taken from the configuration record.
#[derive(Clone, Debug, Default)]
pub struct ImportOptions {
    pub company: Option<String>,
    pub create_item_groups: bool,
    pub create_manufacturers: bool,
    pub update_stock_levels: bool,
    pub download_images: bool,
    pub create_customers: bool,
    pub create_placeholder_items: bool,
    pub auto_submit_orders: bool,
}

impl From<&ImportConfiguration> for ImportOptions {
    fn from(c: &ImportConfiguration) -> Self {
        ImportOptions {
            company: c.company.clone(),
            create_item_groups: c.create_item_groups,
            create_manufacturers: c.create_manufacturers,
            update_stock_levels: c.update_stock_levels,
            download_images: c.download_images,
            create_customers: c.create_customers,
            create_placeholder_items: c.create_placeholder_items,
            auto_submit_orders: c.auto_submit_orders,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteOutcome { Imported, Updated, Skipped, Failed }

/// What happened to one matched element.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ItemNote {
    pub index: usize,
    pub key: String,
    pub outcome: NoteOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ImportSummary {
    pub success: bool,
    pub imported: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: usize,
    /// First ten error messages.
    pub error_messages: Vec<String>,
    /// Number of matched elements in the document.
    pub total_processed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<ItemNote>,
}

impl ImportSummary {
    pub fn failed(msg: impl Into<String>) -> Self {
        ImportSummary { success: false, error: Some(msg.into()), ..Default::default() }
    }

    /// "Imported: 3, Updated: 1, Errors: 0"
    pub fn headline(&self) -> String {
        match &self.error {
            Some(e) if !self.success => e.clone(),
            _ => format!("Imported: {}, Updated: {}, Errors: {}", self.imported, self.updated, self.errors),
        }
    }

    fn note(&mut self, index: usize, key: &str, outcome: NoteOutcome, message: Option<String>) {
        match outcome {
            NoteOutcome::Imported => self.imported += 1,
            NoteOutcome::Updated => self.updated += 1,
            NoteOutcome::Skipped => self.skipped += 1,
            NoteOutcome::Failed => {
                self.errors += 1;
                if let Some(m) = &message {
                    if self.error_messages.len() < MAX_ERROR_MESSAGES { self.error_messages.push(m.clone()); }
                }
            }
        }
        self.notes.push(ItemNote { index, key: key.to_string(), outcome, message });
    }
}

/// Runs parse, map and persist over a whole document.
///
/// Never fails: parse errors, unsupported types and per-element failures all end
/// up in the returned summary.
pub async fn import_content<S: RecordStore>(store: &S, import_type: ImportType, xml: &str, opts: &ImportOptions) -> ImportSummary {
    let log = telemetry::pipeline();
    let root_span = log.root_span_kv([("import_type", import_type.to_string()), ("bytes", xml.len().to_string())]);
    let root = {
        let _g = root_span.enter();
        if !import_type.is_supported() {
            return ImportSummary::failed(format!("Import type '{}' is not yet implemented", import_type));
        }
        let _s = log.span(&PipelinePhase::Parse).entered();
        match parse_document(xml) {
            Ok(r) => r,
            Err(e) => {
                log.warn(format!("⚠️ XML parsing failed: {e}"));
                return ImportSummary::failed(format!("XML parsing failed: {e}"));
            }
        }
    };
    import_tree(store, import_type, &root, opts).instrument(root_span).await
}

pub async fn import_tree<S: RecordStore>(store: &S, import_type: ImportType, root: &XmlNode, opts: &ImportOptions) -> ImportSummary {
    let log = telemetry::pipeline();
    let elements = root.descendants(import_type.element());
    log.info(format!("🔎 Found {} {} elements to process", elements.len(), import_type.element()));

    let mut summary = ImportSummary { success: true, total_processed: elements.len(), ..Default::default() };
    for (idx, el) in elements.into_iter().enumerate() {
        let span = log.span_kv(&PipelinePhase::Element, [("index", idx.to_string())]);
        match import_type {
            ImportType::Items => import_item(store, el, opts, idx, &mut summary).instrument(span).await,
            ImportType::Orders => import_order(store, el, opts, idx, &mut summary).instrument(span).await,
            ImportType::Customers | ImportType::ProductUpdates => {}
        }
    }
    log.summary(&summary);
    summary
}

async fn import_item<S: RecordStore>(store: &S, el: &XmlNode, opts: &ImportOptions, idx: usize, summary: &mut ImportSummary) {
    let log = telemetry::pipeline();
    let parsed = items::parse_shop_item(el);
    let Some(mut record) = items::to_record(&parsed, opts) else {
        let msg = format!("Missing item code for XML ID: {}", parsed.external_id);
        summary.note(idx, &parsed.external_id, NoteOutcome::Failed, Some(msg));
        return;
    };

    if record.item_group != DEFAULT_ITEM_GROUP {
        if let Err(e) = store.ensure_item_group(&record.item_group).await {
            log.warn(format!("⚠️ item group {} not created: {e:#}", record.item_group));
            record.item_group = DEFAULT_ITEM_GROUP.to_string();
        }
    }
    if let Some(m) = record.manufacturer.clone() {
        if let Err(e) = store.ensure_manufacturer(&m).await {
            log.warn(format!("⚠️ manufacturer {m} not created: {e:#}"));
            record.manufacturer = None;
        }
    }

    match store.upsert_item(&record).instrument(log.span(&PipelinePhase::Write)).await {
        Ok(UpsertOutcome::Inserted) => {
            log.info_kv("➕ item", [("item_code", record.item_code.clone())]);
            summary.note(idx, &record.item_code, NoteOutcome::Imported, None);
        }
        Ok(UpsertOutcome::Updated) => {
            log.info_kv("♻️ item", [("item_code", record.item_code.clone())]);
            summary.note(idx, &record.item_code, NoteOutcome::Updated, None);
        }
        Err(e) => {
            let msg = format!("Failed to process item {}: {e:#}", record.item_code);
            log.warn_kv(&format!("❌ {msg}"), [("index", idx.to_string()), ("item_code", record.item_code.clone())]);
            summary.note(idx, &record.item_code, NoteOutcome::Failed, Some(msg));
        }
    }
}

async fn import_order<S: RecordStore>(store: &S, el: &XmlNode, opts: &ImportOptions, idx: usize, summary: &mut ImportSummary) {
    let log = telemetry::pipeline();
    let order = orders::parse_order(el);
    if order.external_order_id.is_empty() {
        summary.note(idx, "", NoteOutcome::Failed, Some("Missing external order ID".to_string()));
        return;
    }
    let key = order.external_order_id.clone();
    match persist_order(store, &order, opts).instrument(log.span(&PipelinePhase::Write)).await {
        Ok(OrderOutcome::Created { dropped_lines }) => {
            log.info_kv("➕ order", [("external_order_id", key.clone())]);
            if !dropped_lines.is_empty() {
                log.debug(format!("order {key}: dropped lines {dropped_lines:?}"));
            }
            let message = (!dropped_lines.is_empty()).then(|| format!("lines without catalogue item dropped: {}", dropped_lines.join(", ")));
            summary.note(idx, &key, NoteOutcome::Imported, message);
        }
        Ok(OrderOutcome::Exists) => {
            log.info_kv("↩️ order exists", [("external_order_id", key.clone())]);
            summary.note(idx, &key, NoteOutcome::Skipped, Some(format!("Order {key} already exists")));
        }
        Err(e) => {
            let msg = format!("Failed to process order {key}: {e:#}");
            log.warn(format!("❌ {msg}"));
            summary.note(idx, &key, NoteOutcome::Failed, Some(msg));
        }
    }
}

enum OrderOutcome {
    Created { dropped_lines: Vec<String> },
    Exists,
}

async fn persist_order<S: RecordStore>(store: &S, order: &orders::ParsedOrder, opts: &ImportOptions) -> anyhow::Result<OrderOutcome> {
    if store.order_exists(&order.external_order_id).await? {
        return Ok(OrderOutcome::Exists);
    }

    let customer = orders::customer_record(order);
    let addresses = if opts.create_customers { orders::address_records(&customer.name, order) } else { Vec::new() };
    let existing = store.find_customer(customer.email.as_deref(), &customer.name).await?;
    let customer = match (existing, opts.create_customers) {
        (Some(id), true) => CustomerWrite::Update(id, customer),
        (Some(id), false) => CustomerWrite::Existing(id),
        (None, true) => CustomerWrite::Create(customer),
        (None, false) => anyhow::bail!("customer '{}' not found and customer creation is disabled", customer.name),
    };

    let mut lines = Vec::new();
    let mut placeholders: Vec<(String, String)> = Vec::new();
    let mut dropped_lines = Vec::new();
    for line in order.product_lines().filter(|l| !l.item_code.is_empty()) {
        let known = store.item_exists(&line.item_code).await? || placeholders.iter().any(|(c, _)| *c == line.item_code);
        if !known {
            if opts.create_placeholder_items {
                let name = if line.item_name.is_empty() { &line.item_code } else { &line.item_name };
                placeholders.push((line.item_code.clone(), name.clone()));
            } else {
                dropped_lines.push(line.item_code.clone());
                continue;
            }
        }
        lines.push(OrderLineRecord::from_line(line));
    }

    let write = OrderWrite {
        customer,
        addresses,
        placeholders,
        order: SalesOrderRecord {
            external_order_id: order.external_order_id.clone(),
            order_code: Some(order.order_code.clone()).filter(|s| !s.is_empty()),
            order_status: Some(order.order_status.clone()).filter(|s| !s.is_empty()),
            docstatus: if opts.auto_submit_orders { "Submitted" } else { "Draft" }.to_string(),
            company: opts.company.clone(),
            transaction_date: orders::parse_order_date(&order.order_date),
            currency: if order.currency.is_empty() { "EUR".to_string() } else { order.currency.clone() },
            source_name: Some(order.source_name.clone()).filter(|s| !s.is_empty()),
            customer_remark: Some(order.customer_remark.clone()).filter(|s| !s.is_empty()),
            total_with_tax: order.total_with_tax,
            total_without_tax: order.total_without_tax,
            is_paid: order.is_paid,
            lines,
        },
    };
    store.write_order(&write).await?;
    Ok(OrderOutcome::Created { dropped_lines })
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::memory::MemoryStore;

    const ITEMS: &str = r#"<?xml version="1.0"?>
<SHOP>
  <SHOPITEM id="1"><CODE>A-1</CODE><NAME>Alpha</NAME><CATEGORIES><CATEGORY>Tea &gt; Black</CATEGORY></CATEGORIES><MANUFACTURER>Leaf</MANUFACTURER></SHOPITEM>
  <SHOPITEM id="2"><CODE>B-2</CODE><NAME>Beta</NAME></SHOPITEM>
  <SHOPITEM id="3"><NAME>No code</NAME></SHOPITEM>
</SHOP>"#;

    const ORDERS: &str = r#"<ORDERS>
  <ORDER>
    <ORDER_ID>500</ORDER_ID><CODE>O-500</CODE><DATE>2025-02-01 10:00:00</DATE>
    <CUSTOMER><EMAIL>eva@example.sk</EMAIL>
      <BILLING_ADDRESS><NAME>Eva Mala</NAME><STREET>Nova</STREET><HOUSENUMBER>1</HOUSENUMBER><CITY>Nitra</CITY></BILLING_ADDRESS>
    </CUSTOMER>
    <TOTAL_PRICE><WITH_VAT>12</WITH_VAT><WITHOUT_VAT>10</WITHOUT_VAT></TOTAL_PRICE>
    <ORDER_ITEMS>
      <ITEM><TYPE>product</TYPE><CODE>A-1</CODE><NAME>Alpha</NAME><AMOUNT>1</AMOUNT></ITEM>
      <ITEM><TYPE>product</TYPE><CODE>NEW-9</CODE><NAME>Mystery</NAME><AMOUNT>2</AMOUNT></ITEM>
      <ITEM><TYPE>shipping</TYPE><NAME>Post</NAME></ITEM>
    </ORDER_ITEMS>
  </ORDER>
  <ORDER><CODE>no id</CODE></ORDER>
</ORDERS>"#;

    fn opts() -> ImportOptions {
        ImportOptions {
            company: Some("Herbatica".into()),
            create_item_groups: true,
            create_manufacturers: true,
            update_stock_levels: true,
            download_images: false,
            create_customers: true,
            create_placeholder_items: true,
            auto_submit_orders: false,
        }
    }

    #[tokio::test]
    async fn items_insert_then_update() {
        let store = MemoryStore::default();
        let first = import_content(&store, ImportType::Items, ITEMS, &opts()).await;
        assert!(first.success);
        assert_eq!(first.total_processed, 3);
        assert_eq!(first.imported, 2);
        assert_eq!(first.updated, 0);
        assert_eq!(first.errors, 1);
        assert_eq!(first.error_messages, vec!["Missing item code for XML ID: 3".to_string()]);
        assert_eq!(first.notes.len(), 3);
        store.with(|st| {
            assert!(st.groups.contains("Tea - Black"));
            assert!(st.manufacturers.contains("Leaf"));
            assert_eq!(st.items["A-1"].company.as_deref(), Some("Herbatica"));
        });

        let second = import_content(&store, ImportType::Items, ITEMS, &opts()).await;
        assert_eq!(second.imported, 0);
        assert_eq!(second.updated, 2);
        assert_eq!(second.headline(), "Imported: 0, Updated: 2, Errors: 1");
    }

    #[tokio::test]
    async fn item_store_failures_are_counted_not_raised() {
        let store = MemoryStore { fail_items: ["B-2".to_string()].into(), ..Default::default() };
        let summary = import_content(&store, ImportType::Items, ITEMS, &opts()).await;
        assert!(summary.success);
        assert_eq!(summary.imported, 1);
        assert_eq!(summary.errors, 2);
        assert!(summary.error_messages.iter().any(|m| m.starts_with("Failed to process item B-2")));
    }

    #[tokio::test]
    async fn orders_are_idempotent() {
        let store = MemoryStore::default();
        let first = import_content(&store, ImportType::Orders, ORDERS, &opts()).await;
        assert_eq!(first.total_processed, 2);
        assert_eq!(first.imported, 1);
        assert_eq!(first.errors, 1);
        assert_eq!(first.error_messages, vec!["Missing external order ID".to_string()]);
        store.with(|st| {
            assert_eq!(st.orders.len(), 1);
            let o = &st.orders[0];
            assert_eq!(o.lines.len(), 2);
            assert_eq!(o.docstatus, "Draft");
            assert_eq!(o.currency, "EUR");
            assert!(st.items["NEW-9"].is_placeholder);
            assert_eq!(st.customers[0].name, "Eva Mala");
            assert!(st.addresses.contains_key("Eva Mala-Billing"));
        });

        let second = import_content(&store, ImportType::Orders, ORDERS, &opts()).await;
        assert_eq!(second.imported, 0);
        assert_eq!(second.skipped, 1);
        store.with(|st| assert_eq!(st.orders.len(), 1));
    }

    #[tokio::test]
    async fn order_options_change_behaviour() {
        let store = MemoryStore::default();
        let o = ImportOptions { create_placeholder_items: false, auto_submit_orders: true, ..opts() };
        let summary = import_content(&store, ImportType::Orders, ORDERS, &o).await;
        assert_eq!(summary.imported, 1);
        let note = &summary.notes[0];
        assert_eq!(note.outcome, NoteOutcome::Imported);
        assert!(note.message.as_deref().unwrap_or_default().contains("A-1"));
        store.with(|st| {
            assert!(st.orders[0].lines.is_empty());
            assert_eq!(st.orders[0].docstatus, "Submitted");
        });

        let strict = MemoryStore::default();
        let o = ImportOptions { create_customers: false, ..opts() };
        let summary = import_content(&strict, ImportType::Orders, ORDERS, &o).await;
        assert_eq!(summary.imported, 0);
        assert!(summary.error_messages[0].contains("customer creation is disabled"));
    }

    #[tokio::test]
    async fn failed_order_write_leaves_nothing_behind() {
        let store = MemoryStore { fail_orders: ["500".to_string()].into(), ..Default::default() };
        let summary = import_content(&store, ImportType::Orders, ORDERS, &opts()).await;
        assert_eq!(summary.imported, 0);
        assert_eq!(summary.errors, 2);
        assert!(summary.error_messages.iter().any(|m| m.starts_with("Failed to process order 500")));
        store.with(|st| {
            assert!(st.orders.is_empty());
            assert!(st.customers.is_empty());
            assert!(st.addresses.is_empty());
            assert!(!st.items.contains_key("NEW-9"));
        });

        // the same document goes through once the order row can be written
        let retry = MemoryStore::default();
        let summary = import_content(&retry, ImportType::Orders, ORDERS, &opts()).await;
        assert_eq!(summary.imported, 1);
        retry.with(|st| assert_eq!(st.customers.len(), 1));
    }

    #[tokio::test]
    async fn parse_errors_and_unsupported_types() {
        let store = MemoryStore::default();
        let bad = import_content(&store, ImportType::Items, "<SHOP><SHOPITEM></SHOP>", &opts()).await;
        assert!(!bad.success);
        assert!(bad.error.as_deref().unwrap().starts_with("XML parsing failed"));

        let unsupported = import_content(&store, ImportType::Customers, ITEMS, &opts()).await;
        assert!(!unsupported.success);
        assert_eq!(unsupported.headline(), "Import type 'Customers' is not yet implemented");
    }
}
