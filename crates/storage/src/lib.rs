pub mod cache;
pub mod error;
pub mod models;
pub mod repository;

pub use cache::StoreCaches;
pub use error::{Result, StorageError};

use sqlx::PgPool;

pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
