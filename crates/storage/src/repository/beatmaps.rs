use sqlx::{PgPool, Postgres, Transaction};

use crate::error::Result;
use crate::models::{Beatmap, DifficultyAttributeKey, DifficultyAttributes};

pub async fn get(tx: &mut Transaction<'_, Postgres>, beatmap_id: i64) -> Result<Option<Beatmap>> {
    let beatmap = sqlx::query_as::<_, Beatmap>(
        "SELECT beatmap_id, approved, hit_objects, difficulty_rating, playcount FROM beatmaps WHERE beatmap_id = $1",
    )
    .bind(beatmap_id)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(beatmap)
}

/// Loads the stored difficulty attributes for one (beatmap, ruleset, mods)
/// key. An empty result is returned as `None`; rating computation for the
/// score is skipped rather than failed.
pub async fn difficulty_attributes(
    tx: &mut Transaction<'_, Postgres>,
    key: &DifficultyAttributeKey,
) -> Result<Option<DifficultyAttributes>> {
    let rows: Vec<(String, f64)> = sqlx::query_as(
        r#"
        SELECT attrib, value FROM difficulty_attributes
        WHERE beatmap_id = $1 AND ruleset_id = $2 AND mods = $3
        "#,
    )
    .bind(key.beatmap_id)
    .bind(key.ruleset_id)
    .bind(key.mods)
    .fetch_all(&mut **tx)
    .await?;

    if rows.is_empty() {
        return Ok(None);
    }

    Ok(Some(DifficultyAttributes::from_rows(rows)))
}

/// Cross-user playcount bump, issued outside the per-event transaction so it
/// cannot roll back with it.
pub async fn increment_playcount(pool: &PgPool, beatmap_id: i64) -> Result<()> {
    sqlx::query("UPDATE beatmaps SET playcount = playcount + 1 WHERE beatmap_id = $1")
        .bind(beatmap_id)
        .execute(pool)
        .await?;

    Ok(())
}
