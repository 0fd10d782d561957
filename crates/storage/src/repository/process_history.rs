use sqlx::{Postgres, Transaction};

use crate::error::Result;
use crate::models::ProcessHistory;

pub async fn get(
    tx: &mut Transaction<'_, Postgres>,
    score_id: i64,
) -> Result<Option<ProcessHistory>> {
    let history = sqlx::query_as::<_, ProcessHistory>(
        "SELECT score_id, processed_version, processed_at FROM process_history WHERE score_id = $1",
    )
    .bind(score_id)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(history)
}

/// Stamps the score with the pipeline version that just applied it. Commits
/// atomically with the aggregate mutation in the caller's transaction.
pub async fn upsert(
    tx: &mut Transaction<'_, Postgres>,
    score_id: i64,
    processed_version: i16,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO process_history (score_id, processed_version, processed_at)
        VALUES ($1, $2, now())
        ON CONFLICT (score_id) DO UPDATE SET
            processed_version = EXCLUDED.processed_version,
            processed_at = EXCLUDED.processed_at
        "#,
    )
    .bind(score_id)
    .bind(processed_version)
    .execute(&mut **tx)
    .await?;

    Ok(())
}
