//! Commander database operations

use sqlx::sqlite::SqliteExecutor;
use sqlx::FromRow;

use super::DbPool;

/// Commander record from database
#[derive(Debug, Clone, FromRow)]
pub struct Commander {
    pub commander_id: i64,
    pub account_id: i64,
    pub name: String,
    pub created_at: String,
}

/// Find the commander bound to a client account.
pub async fn get_commander_by_account(pool: &DbPool, account_id: i64) -> Result<Option<Commander>, sqlx::Error> {
    sqlx::query_as::<_, Commander>(
        r#"
        SELECT commander_id, account_id, name, created_at
        FROM commanders
        WHERE account_id = ?
        "#,
    )
    .bind(account_id)
    .fetch_optional(pool)
    .await
}

pub async fn get_commander(pool: &DbPool, commander_id: i64) -> Result<Option<Commander>, sqlx::Error> {
    sqlx::query_as::<_, Commander>(
        r#"
        SELECT commander_id, account_id, name, created_at
        FROM commanders
        WHERE commander_id = ?
        "#,
    )
    .bind(commander_id)
    .fetch_optional(pool)
    .await
}

/// Current amount of a resource; zero when the commander has none.
pub async fn get_resource_amount(pool: &DbPool, commander_id: i64, resource_id: u32) -> Result<i64, sqlx::Error> {
    let amount = sqlx::query_scalar::<_, i64>(
        r#"SELECT amount FROM owned_resources WHERE commander_id = ? AND resource_id = ?"#,
    )
    .bind(commander_id)
    .bind(resource_id)
    .fetch_optional(pool)
    .await?;

    Ok(amount.unwrap_or(0))
}

pub async fn get_item_count(pool: &DbPool, commander_id: i64, item_id: u32) -> Result<i64, sqlx::Error> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"SELECT count FROM owned_items WHERE commander_id = ? AND item_id = ?"#,
    )
    .bind(commander_id)
    .bind(item_id)
    .fetch_optional(pool)
    .await?;

    Ok(count.unwrap_or(0))
}

/// Subtract `amount` from a resource. Returns false without changing anything
/// if the balance is too low.
pub async fn consume_resource<'e, E>(
    executor: E,
    commander_id: i64,
    resource_id: u32,
    amount: u32,
) -> Result<bool, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        UPDATE owned_resources
        SET amount = amount - ?
        WHERE commander_id = ? AND resource_id = ? AND amount >= ?
        "#,
    )
    .bind(amount)
    .bind(commander_id)
    .bind(resource_id)
    .bind(amount)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Subtract `count` of an item. Returns false if the commander holds fewer.
pub async fn consume_item<'e, E>(executor: E, commander_id: i64, item_id: u32, count: u32) -> Result<bool, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        UPDATE owned_items
        SET count = count - ?
        WHERE commander_id = ? AND item_id = ? AND count >= ?
        "#,
    )
    .bind(count)
    .bind(commander_id)
    .bind(item_id)
    .bind(count)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Check whether a ship instance belongs to the commander.
pub async fn owns_ship(pool: &DbPool, commander_id: i64, ship_instance_id: u32) -> Result<bool, sqlx::Error> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"SELECT COUNT(*) FROM owned_ships WHERE owner_id = ? AND id = ?"#,
    )
    .bind(commander_id)
    .bind(ship_instance_id)
    .fetch_one(pool)
    .await?;

    Ok(count > 0)
}
