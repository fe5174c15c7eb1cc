use serde::Serialize;

use crate::xml::XmlNode;

use super::clean::{category_to_group, clean_html_content, clean_name, map_uom, parse_decimal, parse_flag};
use super::ImportOptions;

pub const DEFAULT_ITEM_GROUP: &str = "All Item Groups";

/// One `SHOPITEM` as it appears in the feed, before any mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ShopItem {
    pub external_id: String,
    pub import_code: String,
    pub item_code: String,
    pub item_name: String,
    pub guid: String,
    pub barcode: String,
    pub short_description: String,
    pub long_description: String,
    pub manufacturer: String,
    pub supplier: String,
    pub currency: String,
    pub price_vat: f64,
    pub purchase_price: f64,
    pub vat_rate: f64,
    pub stock_amount: Option<f64>,
    pub weight: Option<f64>,
    pub unit: String,
    pub visible: bool,
    pub categories: Vec<String>,
    pub images: Vec<String>,
}

pub fn parse_shop_item(node: &XmlNode) -> ShopItem {
    let stock = node.find("STOCK");
    let logistic = node.find("LOGISTIC");
    ShopItem {
        external_id: node.attr("id").unwrap_or_default().to_string(),
        import_code: node.attr("import-code").unwrap_or_default().to_string(),
        item_code: node.child_text("CODE"),
        item_name: node.child_text("NAME"),
        guid: node.child_text("GUID"),
        barcode: node.child_text("EAN"),
        short_description: clean_html_content(&node.child_text("SHORT_DESCRIPTION")),
        long_description: clean_html_content(&node.child_text("DESCRIPTION")),
        manufacturer: node.child_text("MANUFACTURER"),
        supplier: node.child_text("SUPPLIER"),
        currency: node.child_text("CURRENCY"),
        price_vat: parse_decimal(&node.child_text("PRICE_VAT")),
        purchase_price: parse_decimal(&node.child_text("PURCHASE_PRICE")),
        vat_rate: parse_decimal(&node.child_text("VAT")),
        stock_amount: stock.map(|s| parse_decimal(&s.child_text("AMOUNT"))),
        weight: logistic.map(|l| parse_decimal(&l.child_text("WEIGHT"))),
        unit: node.child_text("UNIT"),
        visible: parse_flag(&node.child_text("VISIBLE")),
        categories: node
            .find("CATEGORIES")
            .map(|c| c.find_all("CATEGORY").map(|x| x.text.trim().to_string()).collect())
            .unwrap_or_default(),
        images: node
            .find("IMAGES")
            .map(|c| c.find_all("IMAGE").map(|x| x.text.trim().to_string()).filter(|u| !u.is_empty()).collect())
            .unwrap_or_default(),
    }
}

/// Row written to `xml.item`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemRecord {
    pub item_code: String,
    pub item_name: String,
    pub description: String,
    pub item_group: String,
    pub stock_uom: String,
    pub manufacturer: Option<String>,
    pub external_id: Option<String>,
    pub guid: Option<String>,
    pub barcode: Option<String>,
    pub weight_per_unit: Option<f64>,
    pub selling_price: Option<f64>,
    pub currency: String,
    pub purchase_price: Option<f64>,
    pub stock_qty: Option<f64>,
    pub image_url: Option<String>,
    pub is_placeholder: bool,
    pub company: Option<String>,
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// Maps a feed item onto a catalogue row. Groups and manufacturers are only named
/// here; creating them is the pipeline's job.
pub fn to_record(item: &ShopItem, opts: &ImportOptions) -> Option<ItemRecord> {
    let item_code = non_empty(&item.item_code)?;
    let item_name = match clean_name(&item.item_name) {
        n if n.is_empty() => item_code.clone(),
        n => n,
    };
    let description = if item.short_description.is_empty() { item.long_description.clone() } else { item.short_description.clone() };
    let item_group = if opts.create_item_groups {
        item.categories.iter().map(|c| category_to_group(c)).find(|g| !g.is_empty())
    } else {
        None
    };
    let manufacturer = if opts.create_manufacturers { non_empty(&clean_name(&item.manufacturer)) } else { None };

    Some(ItemRecord {
        item_code,
        item_name,
        description,
        item_group: item_group.unwrap_or_else(|| DEFAULT_ITEM_GROUP.to_string()),
        stock_uom: map_uom(&item.unit),
        manufacturer,
        external_id: non_empty(&item.external_id),
        guid: non_empty(&item.guid),
        barcode: non_empty(&item.barcode),
        weight_per_unit: item.weight,
        selling_price: (item.price_vat > 0.0).then_some(item.price_vat),
        currency: non_empty(&item.currency).unwrap_or_else(|| "EUR".to_string()),
        purchase_price: (item.purchase_price > 0.0).then_some(item.purchase_price),
        stock_qty: if opts.update_stock_levels { item.stock_amount } else { None },
        image_url: if opts.download_images { item.images.first().cloned() } else { None },
        is_placeholder: false,
        company: opts.company.clone(),
    })
}
