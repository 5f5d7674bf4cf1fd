//! Per-chapter progress counters

use sqlx::sqlite::SqliteExecutor;
use sqlx::FromRow;

use super::DbPool;

#[derive(Debug, Clone, FromRow)]
pub struct ChapterProgress {
    pub commander_id: i64,
    pub chapter_id: i64,
    pub progress: i64,
    pub kill_boss_count: i64,
    pub kill_enemy_count: i64,
    pub take_box_count: i64,
    pub defeat_count: i64,
    pub today_defeat_count: i64,
    pub pass_count: i64,
    pub updated_at: i64,
}

pub async fn get_chapter_progress<'e, E>(
    executor: E,
    commander_id: i64,
    chapter_id: i64,
) -> Result<Option<ChapterProgress>, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, ChapterProgress>(
        r#"
        SELECT commander_id, chapter_id, progress, kill_boss_count, kill_enemy_count,
               take_box_count, defeat_count, today_defeat_count, pass_count, updated_at
        FROM chapter_progress
        WHERE commander_id = ? AND chapter_id = ?
        "#,
    )
    .bind(commander_id)
    .bind(chapter_id)
    .fetch_optional(executor)
    .await
}

/// Create an empty progress row on first entry. Existing rows are left alone.
pub async fn ensure_chapter_progress<'e, E>(
    executor: E,
    commander_id: i64,
    chapter_id: i64,
    now: i64,
) -> Result<(), sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO chapter_progress (commander_id, chapter_id, updated_at)
        VALUES (?, ?, ?)
        ON CONFLICT (commander_id, chapter_id) DO NOTHING
        "#,
    )
    .bind(commander_id)
    .bind(chapter_id)
    .bind(now)
    .execute(executor)
    .await?;

    Ok(())
}

/// Every progress row of a commander, lowest chapter first.
pub async fn list_chapter_progress(pool: &DbPool, commander_id: i64) -> Result<Vec<ChapterProgress>, sqlx::Error> {
    sqlx::query_as::<_, ChapterProgress>(
        r#"
        SELECT commander_id, chapter_id, progress, kill_boss_count, kill_enemy_count,
               take_box_count, defeat_count, today_defeat_count, pass_count, updated_at
        FROM chapter_progress
        WHERE commander_id = ?
        ORDER BY chapter_id
        "#,
    )
    .bind(commander_id)
    .fetch_all(pool)
    .await
}

/// Insert or overwrite a progress row.
pub async fn upsert_chapter_progress<'e, E>(executor: E, progress: &ChapterProgress) -> Result<(), sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO chapter_progress (commander_id, chapter_id, progress, kill_boss_count, kill_enemy_count,
                                      take_box_count, defeat_count, today_defeat_count, pass_count, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (commander_id, chapter_id) DO UPDATE SET
            progress = excluded.progress,
            kill_boss_count = excluded.kill_boss_count,
            kill_enemy_count = excluded.kill_enemy_count,
            take_box_count = excluded.take_box_count,
            defeat_count = excluded.defeat_count,
            today_defeat_count = excluded.today_defeat_count,
            pass_count = excluded.pass_count,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(progress.commander_id)
    .bind(progress.chapter_id)
    .bind(progress.progress)
    .bind(progress.kill_boss_count)
    .bind(progress.kill_enemy_count)
    .bind(progress.take_box_count)
    .bind(progress.defeat_count)
    .bind(progress.today_defeat_count)
    .bind(progress.pass_count)
    .bind(progress.updated_at)
    .execute(executor)
    .await?;

    Ok(())
}

pub async fn delete_chapter_progress(pool: &DbPool, commander_id: i64, chapter_id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(r#"DELETE FROM chapter_progress WHERE commander_id = ? AND chapter_id = ?"#)
        .bind(commander_id)
        .bind(chapter_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
