//! Static config table lookups
//!
//! Client share-config dumps are imported as `(category, key) -> JSON` rows.

use sqlx::FromRow;

use super::DbPool;

#[derive(Debug, Clone, FromRow)]
pub struct ConfigEntry {
    pub category: String,
    pub key: String,
    pub data: String,
}

/// Raw JSON stored under `(category, key)`.
pub async fn get_config_entry(pool: &DbPool, category: &str, key: &str) -> Result<Option<String>, sqlx::Error> {
    let row: Option<(String,)> = sqlx::query_as(
        r#"
        SELECT data FROM config_entries WHERE category = ? AND key = ?
        "#,
    )
    .bind(category)
    .bind(key)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(data,)| data))
}

/// Every entry of a category, ordered by key.
pub async fn list_config_entries(pool: &DbPool, category: &str) -> Result<Vec<ConfigEntry>, sqlx::Error> {
    sqlx::query_as::<_, ConfigEntry>(
        r#"
        SELECT category, key, data
        FROM config_entries
        WHERE category = ?
        ORDER BY key
        "#,
    )
    .bind(category)
    .fetch_all(pool)
    .await
}

pub async fn upsert_config_entry(pool: &DbPool, category: &str, key: &str, data: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO config_entries (category, key, data)
        VALUES (?, ?, ?)
        ON CONFLICT (category, key) DO UPDATE SET data = excluded.data
        "#,
    )
    .bind(category)
    .bind(key)
    .bind(data)
    .execute(pool)
    .await?;

    Ok(())
}
