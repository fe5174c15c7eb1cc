use anyhow::{Context, Result};
use sqlx::{PgConnection, PgPool, Row};

use super::items::{ItemRecord, DEFAULT_ITEM_GROUP};
use super::orders::{AddressRecord, CustomerRecord, CustomerWrite, OrderWrite, SalesOrderRecord};
use super::store::{RecordStore, UpsertOutcome};

pub struct PgRecordStore<'a> {
    pool: &'a PgPool,
}

impl<'a> PgRecordStore<'a> {
    pub fn new(pool: &'a PgPool) -> Self { Self { pool } }
}

impl RecordStore for PgRecordStore<'_> {
    async fn ensure_item_group(&self, name: &str) -> Result<()> {
        sqlx::query("INSERT INTO xml.item_group (name, parent) VALUES ($1, $2) ON CONFLICT (name) DO NOTHING")
            .bind(name)
            .bind(DEFAULT_ITEM_GROUP)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    async fn ensure_manufacturer(&self, name: &str) -> Result<()> {
        sqlx::query("INSERT INTO xml.manufacturer (short_name) VALUES ($1) ON CONFLICT (short_name) DO NOTHING")
            .bind(name)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    async fn upsert_item(&self, item: &ItemRecord) -> Result<UpsertOutcome> {
        let row = sqlx::query(
            r#"
            INSERT INTO xml.item (item_code, item_name, description, item_group, stock_uom, manufacturer,
                external_id, guid, barcode, weight_per_unit, selling_price, currency, purchase_price,
                stock_qty, image_url, is_placeholder, company, last_sync)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, FALSE, $16, now())
            ON CONFLICT (item_code) DO UPDATE
              SET item_name       = EXCLUDED.item_name,
                  description     = EXCLUDED.description,
                  item_group      = EXCLUDED.item_group,
                  stock_uom       = EXCLUDED.stock_uom,
                  manufacturer    = COALESCE(EXCLUDED.manufacturer, xml.item.manufacturer),
                  external_id     = EXCLUDED.external_id,
                  guid            = EXCLUDED.guid,
                  barcode         = EXCLUDED.barcode,
                  weight_per_unit = EXCLUDED.weight_per_unit,
                  selling_price   = COALESCE(EXCLUDED.selling_price, xml.item.selling_price),
                  currency        = EXCLUDED.currency,
                  purchase_price  = COALESCE(EXCLUDED.purchase_price, xml.item.purchase_price),
                  stock_qty       = COALESCE(EXCLUDED.stock_qty, xml.item.stock_qty),
                  image_url       = COALESCE(EXCLUDED.image_url, xml.item.image_url),
                  is_placeholder  = FALSE,
                  company         = COALESCE(EXCLUDED.company, xml.item.company),
                  last_sync       = now()
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(&item.item_code)
        .bind(&item.item_name)
        .bind(&item.description)
        .bind(&item.item_group)
        .bind(&item.stock_uom)
        .bind(&item.manufacturer)
        .bind(&item.external_id)
        .bind(&item.guid)
        .bind(&item.barcode)
        .bind(item.weight_per_unit)
        .bind(item.selling_price)
        .bind(&item.currency)
        .bind(item.purchase_price)
        .bind(item.stock_qty)
        .bind(&item.image_url)
        .bind(&item.company)
        .fetch_one(self.pool)
        .await
        .with_context(|| format!("upsert item {}", item.item_code))?;
        let inserted: bool = row.try_get("inserted")?;
        Ok(if inserted { UpsertOutcome::Inserted } else { UpsertOutcome::Updated })
    }

    async fn item_exists(&self, item_code: &str) -> Result<bool> {
        let found: Option<i32> = sqlx::query_scalar("SELECT 1 FROM xml.item WHERE item_code = $1")
            .bind(item_code)
            .fetch_optional(self.pool)
            .await?;
        Ok(found.is_some())
    }

    async fn order_exists(&self, external_order_id: &str) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT order_id FROM xml.sales_order WHERE external_order_id = $1")
            .bind(external_order_id)
            .fetch_optional(self.pool)
            .await?;
        Ok(found.is_some())
    }

    async fn find_customer(&self, email: Option<&str>, name: &str) -> Result<Option<i64>> {
        if let Some(email) = email {
            let id: Option<i64> = sqlx::query_scalar("SELECT customer_id FROM xml.customer WHERE email_id = $1 ORDER BY customer_id LIMIT 1")
                .bind(email)
                .fetch_optional(self.pool)
                .await?;
            if id.is_some() { return Ok(id); }
        }
        let id: Option<i64> = sqlx::query_scalar("SELECT customer_id FROM xml.customer WHERE customer_name = $1 ORDER BY customer_id LIMIT 1")
            .bind(name)
            .fetch_optional(self.pool)
            .await?;
        Ok(id)
    }

    async fn write_order(&self, write: &OrderWrite) -> Result<i64> {
        // dropping the transaction on any error rolls the whole order back
        let mut tx = self.pool.begin().await?;
        let customer_id = match &write.customer {
            CustomerWrite::Existing(id) => *id,
            CustomerWrite::Update(id, c) => save_customer(&mut tx, Some(*id), c).await?,
            CustomerWrite::Create(c) => save_customer(&mut tx, None, c).await?,
        };
        for a in &write.addresses {
            ensure_address(&mut tx, customer_id, a).await?;
        }
        for (code, name) in &write.placeholders {
            insert_placeholder_item(&mut tx, code, name).await?;
        }
        let order_id = insert_order(&mut tx, customer_id, &write.order).await?;
        tx.commit().await?;
        Ok(order_id)
    }
}

async fn insert_placeholder_item(conn: &mut PgConnection, item_code: &str, item_name: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO xml.item (item_code, item_name, description, item_group, stock_uom, is_placeholder)
        VALUES ($1, $2, $3, $4, 'Nos', TRUE)
        ON CONFLICT (item_code) DO NOTHING
        "#,
    )
    .bind(item_code)
    .bind(item_name)
    .bind(format!("Auto-created from order import - {item_name}"))
    .bind(DEFAULT_ITEM_GROUP)
    .execute(conn)
    .await
    .with_context(|| format!("placeholder item {item_code}"))?;
    Ok(())
}

async fn save_customer(conn: &mut PgConnection, existing: Option<i64>, c: &CustomerRecord) -> Result<i64> {
    let id: i64 = match existing {
        Some(id) => sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE xml.customer
               SET customer_name = $2, customer_type = $3,
                   email_id  = COALESCE($4, email_id),
                   mobile_no = COALESCE($5, mobile_no),
                   tax_id    = COALESCE($6, tax_id),
                   details   = COALESCE($7, details),
                   territory = $8, modified_at = now()
             WHERE customer_id = $1
            RETURNING customer_id
            "#,
        )
        .bind(id),
        None => sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO xml.customer (customer_name, customer_type, email_id, mobile_no, tax_id, details, territory)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING customer_id
            "#,
        ),
    }
    .bind(&c.name)
    .bind(&c.customer_type)
    .bind(&c.email)
    .bind(&c.mobile_no)
    .bind(&c.tax_id)
    .bind(&c.details)
    .bind(&c.territory)
    .fetch_one(conn)
    .await
    .with_context(|| format!("save customer {}", c.name))?;
    Ok(id)
}

async fn ensure_address(conn: &mut PgConnection, customer_id: i64, a: &AddressRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO xml.address (address_title, customer_id, address_type, address_line1, city, pincode, country)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (address_title) DO NOTHING
        "#,
    )
    .bind(&a.address_title)
    .bind(customer_id)
    .bind(&a.address_type)
    .bind(&a.line1)
    .bind(&a.city)
    .bind(&a.pincode)
    .bind(&a.country)
    .execute(conn)
    .await?;
    Ok(())
}

async fn insert_order(conn: &mut PgConnection, customer_id: i64, o: &SalesOrderRecord) -> Result<i64> {
    let order_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO xml.sales_order (external_order_id, order_code, order_status, docstatus, customer_id,
            company, transaction_date, currency, source_name, customer_remark,
            total_with_tax, total_without_tax, is_paid)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING order_id
        "#,
    )
    .bind(&o.external_order_id)
    .bind(&o.order_code)
    .bind(&o.order_status)
    .bind(&o.docstatus)
    .bind(customer_id)
    .bind(&o.company)
    .bind(o.transaction_date)
    .bind(&o.currency)
    .bind(&o.source_name)
    .bind(&o.customer_remark)
    .bind(o.total_with_tax)
    .bind(o.total_without_tax)
    .bind(o.is_paid)
    .fetch_one(&mut *conn)
    .await
    .with_context(|| format!("insert order {}", o.external_order_id))?;

    for (idx, line) in o.lines.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO xml.sales_order_item (order_id, line_no, item_code, item_name, qty, rate, amount)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(order_id)
        .bind(idx as i32 + 1)
        .bind(&line.item_code)
        .bind(&line.item_name)
        .bind(line.qty)
        .bind(line.rate)
        .bind(line.amount)
        .execute(&mut *conn)
        .await?;
    }
    Ok(order_id)
}
