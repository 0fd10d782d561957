use std::collections::HashMap;

use sqlx::PgPool;

use crate::error::Result;
use crate::models::Build;

/// Loads the full build table into a map. The table is small and is read once
/// per processing run.
pub async fn load_all(pool: &PgPool) -> Result<HashMap<i32, bool>> {
    let builds =
        sqlx::query_as::<_, Build>("SELECT build_id, allow_performance FROM builds")
            .fetch_all(pool)
            .await?;

    Ok(builds
        .into_iter()
        .map(|b| (b.build_id, b.allow_performance))
        .collect())
}
