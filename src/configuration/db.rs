use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::source::FeedHeaders;

use super::types::{ConfigRef, ConfigurationRow, ConfigurationSettings, ImportConfiguration};

const COLUMNS: &str = r#"
    config_id, name, import_type, enabled, xml_feed_url, company, import_frequency, check_feed_changes,
    auth_username, auth_password, create_item_groups, create_manufacturers, update_stock_levels,
    download_images, create_customers, create_placeholder_items, auto_submit_orders, notification_emails,
    last_import, last_import_status, last_etag, last_modified, last_content_size
"#;

fn convert(rows: Vec<ConfigurationRow>) -> Result<Vec<ImportConfiguration>> {
    rows.into_iter()
        .map(|r| {
            let id = r.config_id;
            ImportConfiguration::try_from(r).with_context(|| format!("configuration #{id}"))
        })
        .collect()
}

pub async fn list(pool: &PgPool, enabled: Option<bool>) -> Result<Vec<ImportConfiguration>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM xml.import_configuration WHERE ($1::bool IS NULL OR enabled = $1) ORDER BY config_id"
    );
    let rows: Vec<ConfigurationRow> = sqlx::query_as(&sql).bind(enabled).fetch_all(pool).await?;
    convert(rows)
}

pub async fn find(pool: &PgPool, r: &ConfigRef) -> Result<Option<ImportConfiguration>> {
    let row: Option<ConfigurationRow> = match r {
        ConfigRef::Id(id) => {
            let sql = format!("SELECT {COLUMNS} FROM xml.import_configuration WHERE config_id = $1");
            sqlx::query_as(&sql).bind(id).fetch_optional(pool).await?
        }
        ConfigRef::Name(name) => {
            let sql = format!("SELECT {COLUMNS} FROM xml.import_configuration WHERE name = $1");
            sqlx::query_as(&sql).bind(name).fetch_optional(pool).await?
        }
    };
    Ok(convert(row.into_iter().collect())?.pop())
}

/// Like [`find`] but a missing configuration is an error.
pub async fn get(pool: &PgPool, r: &ConfigRef) -> Result<ImportConfiguration> {
    find(pool, r).await?.ok_or_else(|| anyhow!("configuration {r} not found"))
}

/// Inserts or updates by name; returns `(config_id, inserted)`.
pub async fn save(pool: &PgPool, s: &ConfigurationSettings) -> Result<(i32, bool)> {
    let (id, inserted): (i32, bool) = sqlx::query_as(
        r#"
        INSERT INTO xml.import_configuration (name, import_type, enabled, xml_feed_url, company, import_frequency,
            check_feed_changes, auth_username, auth_password, create_item_groups, create_manufacturers,
            update_stock_levels, download_images, create_customers, create_placeholder_items,
            auto_submit_orders, notification_emails)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
        ON CONFLICT (name) DO UPDATE
          SET import_type = EXCLUDED.import_type,
              enabled = EXCLUDED.enabled,
              xml_feed_url = EXCLUDED.xml_feed_url,
              company = EXCLUDED.company,
              import_frequency = EXCLUDED.import_frequency,
              check_feed_changes = EXCLUDED.check_feed_changes,
              auth_username = EXCLUDED.auth_username,
              auth_password = EXCLUDED.auth_password,
              create_item_groups = EXCLUDED.create_item_groups,
              create_manufacturers = EXCLUDED.create_manufacturers,
              update_stock_levels = EXCLUDED.update_stock_levels,
              download_images = EXCLUDED.download_images,
              create_customers = EXCLUDED.create_customers,
              create_placeholder_items = EXCLUDED.create_placeholder_items,
              auto_submit_orders = EXCLUDED.auto_submit_orders,
              notification_emails = EXCLUDED.notification_emails,
              modified_at = now()
        RETURNING config_id, (xmax = 0) AS inserted
        "#,
    )
    .bind(&s.name)
    .bind(s.import_type.as_str())
    .bind(s.enabled)
    .bind(s.xml_feed_url.trim())
    .bind(&s.company)
    .bind(s.import_frequency.as_str())
    .bind(s.check_feed_changes)
    .bind(&s.auth_username)
    .bind(&s.auth_password)
    .bind(s.create_item_groups)
    .bind(s.create_manufacturers)
    .bind(s.update_stock_levels)
    .bind(s.download_images)
    .bind(s.create_customers)
    .bind(s.create_placeholder_items)
    .bind(s.auto_submit_orders)
    .bind(&s.notification_emails)
    .fetch_one(pool)
    .await
    .with_context(|| format!("save configuration '{}' (is another configuration using the same type and URL?)", s.name))?;
    Ok((id, inserted))
}

/// Post-import bookkeeping.
pub async fn record_import(pool: &PgPool, config_id: i32, at: DateTime<Utc>, status: &str) -> Result<()> {
    sqlx::query("UPDATE xml.import_configuration SET last_import = $2, last_import_status = $3 WHERE config_id = $1")
        .bind(config_id)
        .bind(at)
        .bind(status)
        .execute(pool)
        .await?;
    Ok(())
}

/// Remembers the feed headers used for change detection.
pub async fn record_feed_headers(pool: &PgPool, config_id: i32, h: &FeedHeaders) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE xml.import_configuration
           SET last_etag = COALESCE($2, last_etag),
               last_modified = COALESCE($3, last_modified),
               last_content_size = COALESCE($4, last_content_size)
         WHERE config_id = $1
        "#,
    )
    .bind(config_id)
    .bind(&h.etag)
    .bind(&h.last_modified)
    .bind(h.content_length)
    .execute(pool)
    .await?;
    Ok(())
}
