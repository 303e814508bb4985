use pocketlegal_common::{AppError, DatabaseConfig};
use sqlx::migrate::{MigrateDatabase, MigrateError, Migrator};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};

pub type DbPool = Pool<Postgres>;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

pub(crate) fn migrate_error(err: MigrateError) -> AppError {
    AppError::Database(sqlx::Error::Migrate(Box::new(err)))
}

pub async fn create_pool(config: &DatabaseConfig) -> Result<DbPool, AppError> {
    let connection_string = config.connection_string();

    if !Postgres::database_exists(&connection_string).await.unwrap_or(false) {
        tracing::info!("Creating database: {}", config.database);
        Postgres::create_database(&connection_string).await?;
    }

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&connection_string)
        .await?;

    sqlx::query("SELECT 1").execute(&pool).await?;

    tracing::info!(
        "Database connection established ({} max connections)",
        config.max_connections
    );
    Ok(pool)
}

pub async fn run_migrations(pool: &DbPool) -> Result<(), AppError> {
    MIGRATOR.run(pool).await.map_err(migrate_error)?;

    tracing::info!("Database migrations completed");
    Ok(())
}

/// Returns true when at least one migration has not been applied yet.
pub async fn check_migration_status(pool: &DbPool) -> Result<bool, AppError> {
    let pending = crate::migrations::MigrationRunner::new(pool.clone())
        .check_migration_status()
        .await?
        .pending;

    if pending > 0 {
        tracing::info!("Found {} pending migrations", pending);
        Ok(true)
    } else {
        tracing::info!("All migrations are up to date");
        Ok(false)
    }
}
