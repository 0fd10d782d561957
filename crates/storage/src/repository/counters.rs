use sqlx::PgPool;

use crate::error::Result;

/// Small key-value counters table used for import watermarks and global
/// counts. Writes go straight through the pool: watermark persistence must
/// not be entangled with any worker transaction.
pub struct CounterRepository {
    pool: PgPool,
}

impl CounterRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, name: &str) -> Result<Option<i64>> {
        let value = sqlx::query_scalar("SELECT value FROM counters WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(value)
    }

    pub async fn set(&self, name: &str, value: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO counters (name, value)
            VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE SET value = EXCLUDED.value
            "#,
        )
        .bind(name)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn increment(&self, name: &str, delta: i64) -> Result<i64> {
        let value = sqlx::query_scalar(
            r#"
            INSERT INTO counters (name, value)
            VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE SET value = counters.value + EXCLUDED.value
            RETURNING value
            "#,
        )
        .bind(name)
        .bind(delta)
        .fetch_one(&self.pool)
        .await?;

        Ok(value)
    }
}
