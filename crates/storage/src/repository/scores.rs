use sqlx::types::Json;
use sqlx::{Postgres, Transaction};

use crate::error::Result;
use crate::models::{RankedScore, ScoreEvent};

/// All of a user's passing scores for one ruleset, joined with their computed
/// ratings and the status of the beatmap each was set on. Input to the
/// performance aggregator.
pub async fn user_ranked_scores(
    tx: &mut Transaction<'_, Postgres>,
    user_id: i64,
    ruleset_id: i16,
) -> Result<Vec<RankedScore>> {
    let scores = sqlx::query_as::<_, RankedScore>(
        r#"
        SELECT
            s.id AS score_id,
            s.beatmap_id,
            s.accuracy,
            r.rating,
            s.legacy,
            s.build_id,
            COALESCE(b.approved, 0::smallint) AS beatmap_status
        FROM scores s
        LEFT JOIN score_ratings r ON r.score_id = s.id
        LEFT JOIN beatmaps b ON b.beatmap_id = s.beatmap_id
        WHERE s.user_id = $1 AND s.ruleset_id = $2 AND s.passed
        "#,
    )
    .bind(user_id)
    .bind(ruleset_id)
    .fetch_all(&mut **tx)
    .await?;

    Ok(scores)
}

/// Flags a score as preserved so it is never purged. Applied to every passing
/// score inside the processing transaction.
pub async fn mark_preserved(tx: &mut Transaction<'_, Postgres>, score_id: i64) -> Result<()> {
    sqlx::query("UPDATE scores SET preserved = TRUE WHERE id = $1")
        .bind(score_id)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

pub async fn upsert_rating(
    tx: &mut Transaction<'_, Postgres>,
    score_id: i64,
    rating: f64,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO score_ratings (score_id, rating)
        VALUES ($1, $2)
        ON CONFLICT (score_id) DO UPDATE SET rating = EXCLUDED.rating
        "#,
    )
    .bind(score_id)
    .bind(rating)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

pub async fn delete_rating(tx: &mut Transaction<'_, Postgres>, score_id: i64) -> Result<()> {
    sqlx::query("DELETE FROM score_ratings WHERE score_id = $1")
        .bind(score_id)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

/// Inserts a converted legacy score, letting the store assign the new id.
/// Insertion order matters to callers: ids must stay monotonic within one
/// beatmap because downstream tie-breaking falls back to the id when
/// timestamps collide at second resolution.
///
/// Returns `None` when the legacy id was already imported. Replays happen
/// whenever an import resumes from a watermark written before the batch
/// fully committed, so they must not abort the transaction.
pub async fn insert_imported(
    tx: &mut Transaction<'_, Postgres>,
    event: &ScoreEvent,
    legacy_score_id: i64,
) -> Result<Option<i64>> {
    let id = sqlx::query_scalar(
        r#"
        INSERT INTO scores (
            user_id, beatmap_id, ruleset_id, passed, preserved, total_score,
            accuracy, max_combo, rank, statistics, maximum_statistics, mods,
            legacy, build_id, started_at, ended_at, legacy_score_id
        )
        VALUES ($1, $2, $3, $4, $4, $5, $6, $7, $8, $9, $10, $11, TRUE, $12, $13, $14, $15)
        ON CONFLICT (ruleset_id, legacy_score_id) WHERE legacy_score_id IS NOT NULL
            DO NOTHING
        RETURNING id
        "#,
    )
    .bind(event.user_id)
    .bind(event.beatmap_id)
    .bind(event.ruleset_id)
    .bind(event.passed)
    .bind(event.total_score)
    .bind(event.accuracy)
    .bind(event.max_combo)
    .bind(event.rank.as_str())
    .bind(Json(&event.statistics))
    .bind(Json(&event.maximum_statistics))
    .bind(Json(&event.mods))
    .bind(event.build_id)
    .bind(event.started_at)
    .bind(event.ended_at)
    .bind(legacy_score_id)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(id)
}

#[cfg(test)]
mod tests {
    use sqlx::postgres::PgTypeInfo;
    use sqlx::{Postgres, Type};

    // The status projection must stay int2: `COALESCE(smallint, int)` would
    // resolve to int4, which does not decode into the i16 field.
    #[test]
    fn beatmap_status_decodes_only_from_smallint() {
        assert!(<i16 as Type<Postgres>>::compatible(
            &<i16 as Type<Postgres>>::type_info()
        ));
        assert!(!<i16 as Type<Postgres>>::compatible(&PgTypeInfo::with_name(
            "INT4"
        )));
    }
}
