use chrono::Utc;
use sqlx::{Postgres, Transaction};

use crate::error::{Result, StorageError};
use crate::models::{RulesetId, UserStats};

/// Loads the aggregate row for (user, ruleset) under a row lock, creating a
/// zeroed row seeded with the user's denormalised country on first contact.
///
/// Returns `Ok(None)` for an unsupported ruleset id. That is a signal to skip
/// the event, not a failure: an invalid ruleset is never transient.
pub async fn get_or_create_for_update(
    tx: &mut Transaction<'_, Postgres>,
    user_id: i64,
    ruleset_id: i16,
) -> Result<Option<UserStats>> {
    if RulesetId::try_from(ruleset_id).is_err() {
        return Ok(None);
    }

    if let Some(stats) = select_for_update(tx, user_id, ruleset_id).await? {
        return Ok(Some(stats));
    }

    let country: Option<String> =
        sqlx::query_scalar("SELECT country FROM users WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&mut **tx)
            .await?;

    let stats = UserStats::zeroed(user_id, ruleset_id, country.unwrap_or_else(|| "XX".to_owned()));
    insert_if_absent(tx, &stats).await?;

    // Re-read under the lock; a concurrent creator may have won the insert.
    let stats = select_for_update(tx, user_id, ruleset_id)
        .await?
        .ok_or(StorageError::NotFound)?;

    Ok(Some(stats))
}

async fn select_for_update(
    tx: &mut Transaction<'_, Postgres>,
    user_id: i64,
    ruleset_id: i16,
) -> Result<Option<UserStats>> {
    let stats = sqlx::query_as::<_, UserStats>(
        "SELECT * FROM user_stats WHERE user_id = $1 AND ruleset_id = $2 FOR UPDATE",
    )
    .bind(user_id)
    .bind(ruleset_id)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(stats)
}

async fn insert_if_absent(tx: &mut Transaction<'_, Postgres>, stats: &UserStats) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO user_stats (
            user_id, ruleset_id, playcount, play_time, total_score, ranked_score,
            count_300, count_100, count_50, count_miss,
            accuracy_total, accuracy_count, accuracy,
            rank_count_xh, rank_count_x, rank_count_sh, rank_count_s, rank_count_a,
            rating, rating_rank, country, last_update, last_played
        )
        VALUES ($1, $2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, $3, $4, $4)
        ON CONFLICT (user_id, ruleset_id) DO NOTHING
        "#,
    )
    .bind(stats.user_id)
    .bind(stats.ruleset_id)
    .bind(&stats.country)
    .bind(Utc::now())
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Writes the full aggregate row back. Callers hold the row lock taken by
/// [`get_or_create_for_update`] until their transaction commits.
pub async fn persist(tx: &mut Transaction<'_, Postgres>, stats: &UserStats) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE user_stats SET
            playcount = $3, play_time = $4, total_score = $5, ranked_score = $6,
            count_300 = $7, count_100 = $8, count_50 = $9, count_miss = $10,
            accuracy_total = $11, accuracy_count = $12, accuracy = $13,
            rank_count_xh = $14, rank_count_x = $15, rank_count_sh = $16,
            rank_count_s = $17, rank_count_a = $18,
            rating = $19, rating_rank = $20, country = $21,
            last_update = $22, last_played = $23
        WHERE user_id = $1 AND ruleset_id = $2
        "#,
    )
    .bind(stats.user_id)
    .bind(stats.ruleset_id)
    .bind(stats.playcount)
    .bind(stats.play_time)
    .bind(stats.total_score)
    .bind(stats.ranked_score)
    .bind(stats.count_300)
    .bind(stats.count_100)
    .bind(stats.count_50)
    .bind(stats.count_miss)
    .bind(stats.accuracy_total)
    .bind(stats.accuracy_count)
    .bind(stats.accuracy)
    .bind(stats.rank_count_xh)
    .bind(stats.rank_count_x)
    .bind(stats.rank_count_sh)
    .bind(stats.rank_count_s)
    .bind(stats.rank_count_a)
    .bind(stats.rating)
    .bind(stats.rating_rank)
    .bind(&stats.country)
    .bind(stats.last_update)
    .bind(stats.last_played)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Rewrites `rating_rank` for every aggregate row in one ruleset from the
/// current rating ordering. Returns the number of rows touched.
pub async fn recompute_ranks(pool: &sqlx::PgPool, ruleset_id: i16) -> Result<u64> {
    let rows: Vec<(i64, f64)> = sqlx::query_as(
        "SELECT user_id, rating FROM user_stats WHERE ruleset_id = $1 ORDER BY rating DESC",
    )
    .bind(ruleset_id)
    .fetch_all(pool)
    .await?;

    let (user_ids, positions): (Vec<i64>, Vec<i32>) =
        rank_by_rating(&rows).into_iter().unzip();

    let result = sqlx::query(
        r#"
        UPDATE user_stats u SET rating_rank = ranked.pos
        FROM UNNEST($2::bigint[], $3::int[]) AS ranked(user_id, pos)
        WHERE u.user_id = ranked.user_id AND u.ruleset_id = $1
        "#,
    )
    .bind(ruleset_id)
    .bind(&user_ids)
    .bind(&positions)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Competition ranking over rows already sorted by rating descending: tied
/// ratings share a position and the next distinct rating resumes at its
/// one-based offset.
fn rank_by_rating(rows: &[(i64, f64)]) -> Vec<(i64, i32)> {
    let mut ranked = Vec::with_capacity(rows.len());
    let mut position = 0;
    let mut previous = None;
    for (index, (user_id, rating)) in rows.iter().enumerate() {
        if previous != Some(*rating) {
            position = index as i32 + 1;
            previous = Some(*rating);
        }
        ranked.push((*user_id, position));
    }
    ranked
}

/// User ids that currently have an aggregate row for the given ruleset,
/// ordered for stable batch partitioning.
pub async fn user_ids_for_ruleset(pool: &sqlx::PgPool, ruleset_id: i16) -> Result<Vec<i64>> {
    let ids = sqlx::query_scalar(
        "SELECT user_id FROM user_stats WHERE ruleset_id = $1 ORDER BY user_id",
    )
    .bind(ruleset_id)
    .fetch_all(pool)
    .await?;

    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tied_ratings_share_a_rank_and_the_next_one_skips() {
        let ranked = rank_by_rating(&[(1, 900.0), (2, 750.0), (3, 750.0), (4, 100.0)]);
        assert_eq!(ranked, vec![(1, 1), (2, 2), (3, 2), (4, 4)]);
    }

    #[test]
    fn no_rows_rank_nobody() {
        assert!(rank_by_rating(&[]).is_empty());
    }
}
