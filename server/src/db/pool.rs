//! PostgreSQL pool setup.

use sqlx::migrate::MigrateError;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Connect to PostgreSQL and bring the schema up to date.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, PoolError> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// Failure while preparing the database.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Database connection failed: {0}")]
    Connect(#[from] sqlx::Error),

    #[error("Database migration failed: {0}")]
    Migrate(#[from] MigrateError),
}
