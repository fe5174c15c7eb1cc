use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;

use crate::xml::XmlNode;

use super::clean::{clean_html_content, clean_name, parse_decimal, parse_flag};

pub const PRODUCT_LINE: &str = "product";
pub const DEFAULT_TERRITORY: &str = "Slovakia";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AddressBlock {
    pub name: String,
    pub company: String,
    pub street: String,
    pub house_number: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
    pub company_id: String,
    pub vat_id: String,
}

impl AddressBlock {
    fn parse(node: &XmlNode) -> Self {
        AddressBlock {
            name: clean_name(&node.child_text("NAME")),
            company: clean_name(&node.child_text("COMPANY")),
            street: node.child_text("STREET"),
            house_number: node.child_text("HOUSENUMBER"),
            city: node.child_text("CITY"),
            postal_code: node.child_text("ZIP"),
            country: node.child_text("COUNTRY"),
            company_id: node.child_text("COMPANY_ID"),
            vat_id: node.child_text("VAT_ID"),
        }
    }

    fn is_present(&self) -> bool {
        !self.name.is_empty() || !self.street.is_empty()
    }

    fn line1(&self) -> String {
        if self.house_number.is_empty() { self.street.clone() } else { format!("{} {}", self.street, self.house_number).trim().to_string() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OrderLine {
    pub line_type: String,
    pub item_code: String,
    pub item_name: String,
    pub quantity: f64,
    pub unit: String,
    pub unit_price_without_tax: f64,
    pub total_price_without_tax: f64,
}

/// One `ORDER` element of an order feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedOrder {
    pub external_order_id: String,
    pub order_code: String,
    pub order_date: String,
    pub order_status: String,
    pub currency: String,
    pub email: String,
    pub phone: String,
    pub billing: Option<AddressBlock>,
    pub shipping: Option<AddressBlock>,
    pub customer_remark: String,
    pub total_with_tax: f64,
    pub total_without_tax: f64,
    pub is_paid: bool,
    pub source_name: String,
    pub lines: Vec<OrderLine>,
}

impl ParsedOrder {
    pub fn product_lines(&self) -> impl Iterator<Item = &OrderLine> {
        self.lines.iter().filter(|l| l.line_type == PRODUCT_LINE)
    }
}

pub fn parse_order(node: &XmlNode) -> ParsedOrder {
    let customer = node.find("CUSTOMER");
    let totals = node.find("TOTAL_PRICE");
    let total = |tag: &str| totals.map(|t| parse_decimal(&t.child_text(tag))).unwrap_or(0.0);
    ParsedOrder {
        external_order_id: node.child_text("ORDER_ID"),
        order_code: node.child_text("CODE"),
        order_date: node.child_text("DATE"),
        order_status: node.child_text("STATUS"),
        currency: node.find("CURRENCY").map(|c| c.child_text("CODE")).unwrap_or_default(),
        email: customer.map(|c| c.child_text("EMAIL")).unwrap_or_default(),
        phone: customer.map(|c| c.child_text("PHONE")).unwrap_or_default(),
        billing: customer.and_then(|c| c.find("BILLING_ADDRESS")).map(AddressBlock::parse),
        shipping: customer.and_then(|c| c.find("SHIPPING_ADDRESS")).map(AddressBlock::parse),
        customer_remark: clean_html_content(&node.child_text("REMARK")),
        total_with_tax: total("WITH_VAT"),
        total_without_tax: total("WITHOUT_VAT"),
        is_paid: totals.map(|t| parse_flag(&t.child_text("PAID"))).unwrap_or(false),
        source_name: node.child_text("SOURCE_NAME"),
        lines: node
            .find("ORDER_ITEMS")
            .map(|items| items.find_all("ITEM").map(parse_order_line).collect())
            .unwrap_or_default(),
    }
}

pub fn parse_order_line(node: &XmlNode) -> OrderLine {
    let unit_price = node.find("UNIT_PRICE");
    let total_price = node.find("TOTAL_PRICE");
    OrderLine {
        line_type: node.child_text("TYPE"),
        item_code: node.child_text("CODE"),
        item_name: clean_name(&node.child_text("NAME")),
        quantity: parse_decimal(&node.child_text("AMOUNT")),
        unit: node.child_text("UNIT"),
        unit_price_without_tax: unit_price.map(|p| parse_decimal(&p.child_text("WITHOUT_VAT"))).unwrap_or(0.0),
        total_price_without_tax: total_price.map(|p| parse_decimal(&p.child_text("WITHOUT_VAT"))).unwrap_or(0.0),
    }
}

/// Billing company, then billing name, then the e-mail local part, then `Customer-<order id>`.
pub fn customer_name(order: &ParsedOrder) -> String {
    let billing = order.billing.clone().unwrap_or_default();
    let candidate = [billing.company.as_str(), billing.name.as_str()]
        .into_iter()
        .find(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| order.email.split('@').next().filter(|s| !s.is_empty()).map(str::to_string))
        .unwrap_or_else(|| format!("Customer-{}", order.external_order_id));
    clean_name(&candidate)
}

/// Feed dates come as `YYYY-MM-DD HH:MM:SS`, ISO or RFC3339; unparsable dates fall back to today.
pub fn parse_order_date(raw: &str) -> NaiveDate {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.date_naive();
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%d.%m.%Y %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return dt.date();
        }
    }
    for fmt in ["%Y-%m-%d", "%d.%m.%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            return d;
        }
    }
    Utc::now().date_naive()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerRecord {
    pub name: String,
    pub customer_type: String,
    pub email: Option<String>,
    pub mobile_no: Option<String>,
    pub tax_id: Option<String>,
    pub details: Option<String>,
    pub territory: String,
}

pub fn customer_record(order: &ParsedOrder) -> CustomerRecord {
    let billing = order.billing.clone().unwrap_or_default();
    let opt = |s: &str| (!s.is_empty()).then(|| s.to_string());
    CustomerRecord {
        name: customer_name(order),
        customer_type: if billing.company.is_empty() { "Individual" } else { "Company" }.to_string(),
        email: opt(&order.email),
        mobile_no: opt(&order.phone),
        tax_id: opt(&billing.vat_id),
        details: opt(&billing.company_id).map(|id| format!("Company ID: {id}")),
        territory: DEFAULT_TERRITORY.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddressRecord {
    pub address_title: String,
    pub address_type: String,
    pub line1: String,
    pub city: String,
    pub pincode: String,
    pub country: String,
}

/// Billing address plus a shipping address when it differs from billing.
pub fn address_records(customer: &str, order: &ParsedOrder) -> Vec<AddressRecord> {
    let mut out = Vec::new();
    let mk = |block: &AddressBlock, kind: &str| {
        let line1 = block.line1();
        (!line1.is_empty()).then(|| AddressRecord {
            address_title: format!("{customer}-{kind}"),
            address_type: kind.to_string(),
            line1,
            city: block.city.clone(),
            pincode: block.postal_code.clone(),
            country: if block.country.is_empty() { DEFAULT_TERRITORY.to_string() } else { block.country.clone() },
        })
    };
    if let Some(b) = order.billing.as_ref().filter(|b| b.is_present()) {
        out.extend(mk(b, "Billing"));
    }
    if let Some(s) = order.shipping.as_ref().filter(|s| s.is_present()) {
        if order.billing.as_ref() != Some(s) {
            out.extend(mk(s, "Shipping"));
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderLineRecord {
    pub item_code: String,
    pub item_name: String,
    pub qty: f64,
    pub rate: f64,
    pub amount: f64,
}

impl OrderLineRecord {
    pub fn from_line(line: &OrderLine) -> Self {
        OrderLineRecord {
            item_code: line.item_code.clone(),
            item_name: if line.item_name.is_empty() { line.item_code.clone() } else { line.item_name.clone() },
            qty: if line.quantity > 0.0 { line.quantity } else { 1.0 },
            rate: line.unit_price_without_tax,
            amount: line.total_price_without_tax,
        }
    }
}

/// Row written to `xml.sales_order` with its lines.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesOrderRecord {
    pub external_order_id: String,
    pub order_code: Option<String>,
    pub order_status: Option<String>,
    pub docstatus: String,
    pub company: Option<String>,
    pub transaction_date: NaiveDate,
    pub currency: String,
    pub source_name: Option<String>,
    pub customer_remark: Option<String>,
    pub total_with_tax: f64,
    pub total_without_tax: f64,
    pub is_paid: bool,
    pub lines: Vec<OrderLineRecord>,
}

/// How the order's customer gets written.
#[derive(Debug, Clone, PartialEq)]
pub enum CustomerWrite {
    Existing(i64),
    Update(i64, CustomerRecord),
    Create(CustomerRecord),
}

/// Every row one order produces. Stores apply it all or nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderWrite {
    pub customer: CustomerWrite,
    pub addresses: Vec<AddressRecord>,
    /// `(item_code, item_name)` of catalogue items created for unknown lines.
    pub placeholders: Vec<(String, String)>,
    pub order: SalesOrderRecord,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parse_document;

    const ORDER: &str = r#"<ORDER>
        <ORDER_ID>9001</ORDER_ID>
        <CODE>2025000123</CODE>
        <DATE>2025-03-14 09:30:00</DATE>
        <STATUS>New</STATUS>
        <CURRENCY><CODE>EUR</CODE></CURRENCY>
        <CUSTOMER>
            <EMAIL>jana.k@example.sk</EMAIL>
            <PHONE>+421900000000</PHONE>
            <BILLING_ADDRESS>
                <NAME>Jana Kovac</NAME>
                <COMPANY></COMPANY>
                <STREET>Hlavna</STREET>
                <HOUSENUMBER>12</HOUSENUMBER>
                <CITY>Bratislava</CITY>
                <ZIP>81101</ZIP>
                <COUNTRY>Slovakia</COUNTRY>
            </BILLING_ADDRESS>
            <SHIPPING_ADDRESS>
                <NAME>Jana Kovac</NAME>
                <STREET>Dlha</STREET>
                <HOUSENUMBER>3</HOUSENUMBER>
                <CITY>Trnava</CITY>
            </SHIPPING_ADDRESS>
        </CUSTOMER>
        <REMARK><![CDATA[<p>Ring twice</p>]]></REMARK>
        <TOTAL_PRICE><WITH_VAT>30,50</WITH_VAT><WITHOUT_VAT>25,42</WITHOUT_VAT><PAID>1</PAID></TOTAL_PRICE>
        <ORDER_ITEMS>
            <ITEM><TYPE>product</TYPE><CODE>GT-100</CODE><NAME>Green tea</NAME><AMOUNT>2</AMOUNT>
                <UNIT_PRICE><WITHOUT_VAT>10,75</WITHOUT_VAT></UNIT_PRICE><TOTAL_PRICE><WITHOUT_VAT>21,50</WITHOUT_VAT></TOTAL_PRICE></ITEM>
            <ITEM><TYPE>shipping</TYPE><NAME>Courier</NAME><AMOUNT>1</AMOUNT></ITEM>
        </ORDER_ITEMS>
        <SOURCE_NAME>eshop</SOURCE_NAME>
    </ORDER>"#;

    #[test]
    fn parses_order_and_lines() {
        let order = parse_order(&parse_document(ORDER).unwrap());
        assert_eq!(order.external_order_id, "9001");
        assert_eq!(order.currency, "EUR");
        assert_eq!(order.total_with_tax, 30.5);
        assert!(order.is_paid);
        assert_eq!(order.customer_remark, "Ring twice");
        assert_eq!(order.lines.len(), 2);
        let products: Vec<_> = order.product_lines().collect();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].quantity, 2.0);
        assert_eq!(products[0].unit_price_without_tax, 10.75);
    }

    #[test]
    fn customer_name_fallbacks() {
        let mut order = parse_order(&parse_document(ORDER).unwrap());
        assert_eq!(customer_name(&order), "Jana Kovac");

        if let Some(b) = order.billing.as_mut() { b.company = "Tea House".into(); }
        assert_eq!(customer_name(&order), "Tea House");
        assert_eq!(customer_record(&order).customer_type, "Company");

        order.billing = None;
        assert_eq!(customer_name(&order), "jana.k");
        assert_eq!(customer_record(&order).customer_type, "Individual");

        order.email.clear();
        assert_eq!(customer_name(&order), "Customer-9001");
    }

    #[test]
    fn addresses_skip_identical_shipping() {
        let order = parse_order(&parse_document(ORDER).unwrap());
        let addrs = address_records("Jana Kovac", &order);
        assert_eq!(addrs.len(), 2);
        assert_eq!(addrs[0].address_title, "Jana Kovac-Billing");
        assert_eq!(addrs[0].line1, "Hlavna 12");
        assert_eq!(addrs[1].address_type, "Shipping");
        assert_eq!(addrs[1].country, "Slovakia");

        let mut same = order.clone();
        same.shipping = same.billing.clone();
        assert_eq!(address_records("Jana Kovac", &same).len(), 1);
    }

    #[test]
    fn order_dates() {
        assert_eq!(parse_order_date("2025-03-14 09:30:00"), NaiveDate::from_ymd_opt(2025, 3, 14).unwrap());
        assert_eq!(parse_order_date("2025-03-14T09:30:00+01:00"), NaiveDate::from_ymd_opt(2025, 3, 14).unwrap());
        assert_eq!(parse_order_date("14.03.2025"), NaiveDate::from_ymd_opt(2025, 3, 14).unwrap());
        assert_eq!(parse_order_date("garbage"), Utc::now().date_naive());
    }

    #[test]
    fn line_records_default_quantity_and_name() {
        let rec = OrderLineRecord::from_line(&OrderLine { item_code: "X".into(), ..Default::default() });
        assert_eq!(rec.qty, 1.0);
        assert_eq!(rec.item_name, "X");
    }
}
