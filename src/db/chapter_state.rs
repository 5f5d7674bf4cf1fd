//! Chapter session persistence
//!
//! One row per commander holding the serialized session. Rows idle for longer
//! than the session TTL are treated as gone unless the chapter is cleared.

use sqlx::sqlite::SqliteExecutor;
use sqlx::FromRow;

use super::{get_chapter_progress, DbPool};
use crate::constants::CHAPTER_PROGRESS_CLEARED;

#[derive(Debug, Clone, FromRow)]
pub struct ChapterState {
    pub commander_id: i64,
    pub chapter_id: i64,
    pub state: Vec<u8>,
    pub updated_at: i64,
}

impl ChapterState {
    fn is_stale(&self, ttl_secs: u64, now: i64) -> bool {
        self.updated_at != 0 && now.saturating_sub(self.updated_at) > ttl_secs as i64
    }
}

/// Get a commander's session row, discarding it if it has expired.
pub async fn get_chapter_state(
    pool: &DbPool,
    commander_id: i64,
    ttl_secs: u64,
    now: i64,
) -> Result<Option<ChapterState>, sqlx::Error> {
    let state = sqlx::query_as::<_, ChapterState>(
        r#"
        SELECT commander_id, chapter_id, state, updated_at
        FROM chapter_states
        WHERE commander_id = ?
        "#,
    )
    .bind(commander_id)
    .fetch_optional(pool)
    .await?;

    let Some(state) = state else {
        return Ok(None);
    };
    if !state.is_stale(ttl_secs, now) {
        return Ok(Some(state));
    }

    // Cleared chapters keep their session indefinitely
    let progress = get_chapter_progress(pool, commander_id, state.chapter_id).await?;
    if progress.is_some_and(|p| p.progress >= i64::from(CHAPTER_PROGRESS_CLEARED)) {
        return Ok(Some(state));
    }

    delete_chapter_state(pool, commander_id).await?;
    Ok(None)
}

/// Insert or replace a commander's session.
pub async fn upsert_chapter_state<'e, E>(
    executor: E,
    commander_id: i64,
    chapter_id: i64,
    state: &[u8],
    now: i64,
) -> Result<(), sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO chapter_states (commander_id, chapter_id, state, updated_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT (commander_id) DO UPDATE SET
            chapter_id = excluded.chapter_id,
            state = excluded.state,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(commander_id)
    .bind(chapter_id)
    .bind(state)
    .bind(now)
    .execute(executor)
    .await?;

    Ok(())
}

/// Delete a commander's session. Returns whether a row existed.
pub async fn delete_chapter_state<'e, E>(executor: E, commander_id: i64) -> Result<bool, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query("DELETE FROM chapter_states WHERE commander_id = ?")
        .bind(commander_id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete every expired session whose chapter is not cleared.
pub async fn delete_expired_chapter_states(pool: &DbPool, ttl_secs: u64, now: i64) -> Result<u64, sqlx::Error> {
    let cutoff = now.saturating_sub(ttl_secs as i64);
    let result = sqlx::query(
        r#"
        DELETE FROM chapter_states
        WHERE updated_at != 0
          AND updated_at < ?
          AND NOT EXISTS (
              SELECT 1 FROM chapter_progress p
              WHERE p.commander_id = chapter_states.commander_id
                AND p.chapter_id = chapter_states.chapter_id
                AND p.progress >= ?
          )
        "#,
    )
    .bind(cutoff)
    .bind(i64::from(CHAPTER_PROGRESS_CLEARED))
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

pub async fn count_chapter_states(pool: &DbPool) -> Result<i64, sqlx::Error> {
    let result: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM chapter_states")
        .fetch_one(pool)
        .await?;

    Ok(result.0)
}
