use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::types::{ImportLogEntry, NewLogEntry};

/// Appends one entry and trims the log to the newest `retention` rows.
pub async fn insert(pool: &PgPool, entry: &NewLogEntry, retention: i64) -> Result<i64> {
    let mut tx = pool.begin().await?;
    let log_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO xml.import_log (import_type, config_id, xml_source, status, records_imported,
            records_updated, error_count, total_processed, error_message, summary)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING log_id
        "#,
    )
    .bind(entry.import_type.as_str())
    .bind(entry.config_id)
    .bind(&entry.xml_source)
    .bind(entry.status.as_str())
    .bind(entry.records_imported)
    .bind(entry.records_updated)
    .bind(entry.error_count)
    .bind(entry.total_processed())
    .bind(&entry.error_message)
    .bind(&entry.summary)
    .fetch_one(&mut *tx)
    .await?;

    let newest_first: Vec<i64> =
        sqlx::query_scalar("SELECT log_id FROM xml.import_log ORDER BY import_datetime DESC, log_id DESC")
            .fetch_all(&mut *tx)
            .await?;
    let stale = expired(&newest_first, retention);
    if !stale.is_empty() {
        sqlx::query("DELETE FROM xml.import_log WHERE log_id = ANY($1)")
            .bind(stale)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    Ok(log_id)
}

/// Ids past the newest `retention` entries. The newest entry always survives.
pub fn expired(newest_first: &[i64], retention: i64) -> &[i64] {
    let keep = usize::try_from(retention.max(1)).unwrap_or(usize::MAX);
    newest_first.get(keep..).unwrap_or(&[])
}

pub async fn list(pool: &PgPool, config_id: Option<i32>, since: Option<DateTime<Utc>>, limit: i64) -> Result<Vec<ImportLogEntry>> {
    let rows = sqlx::query_as::<_, ImportLogEntry>(
        r#"
        SELECT log_id, import_datetime, import_type, config_id, xml_source, status, records_imported,
               records_updated, error_count, total_processed, error_message, summary
        FROM xml.import_log
        WHERE ($1::INT4 IS NULL OR config_id = $1)
          AND ($2::TIMESTAMPTZ IS NULL OR import_datetime >= $2)
        ORDER BY import_datetime DESC, log_id DESC
        LIMIT $3
        "#,
    )
    .bind(config_id)
    .bind(since)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_newest_entries_survive_the_trim() {
        let ids: Vec<i64> = (1..=105).rev().collect();
        let stale = expired(&ids, 100);
        assert_eq!(stale, &[5, 4, 3, 2, 1]);
        assert_eq!(ids.len() - stale.len(), 100);

        assert!(expired(&ids[..100], 100).is_empty());
        assert!(expired(&[], 100).is_empty());
        assert_eq!(expired(&[9, 8, 7], 0), &[8, 7]);
    }
}
