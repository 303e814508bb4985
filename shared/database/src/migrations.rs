use pocketlegal_common::AppError;
use sqlx::migrate::Migrate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::connection::{migrate_error, MIGRATOR};

pub struct MigrationRunner {
    pool: PgPool,
}

impl MigrationRunner {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn run_all_migrations(&self) -> Result<(), AppError> {
        tracing::info!("Starting database migrations...");

        MIGRATOR.run(&self.pool).await.map_err(migrate_error)?;

        tracing::info!("All migrations completed successfully");
        Ok(())
    }

    pub async fn check_migration_status(&self) -> Result<MigrationStatus, AppError> {
        let mut conn = self.pool.acquire().await?;
        conn.ensure_migrations_table().await.map_err(migrate_error)?;
        let applied = conn
            .list_applied_migrations()
            .await
            .map_err(migrate_error)?;

        let total = MIGRATOR
            .migrations
            .iter()
            .filter(|m| !m.migration_type.is_down_migration())
            .count();
        let applied_count = MIGRATOR
            .migrations
            .iter()
            .filter(|m| applied.iter().any(|a| a.version == m.version))
            .count();
        let pending = total.saturating_sub(applied_count);

        Ok(MigrationStatus {
            total,
            applied: applied_count,
            pending,
            is_up_to_date: pending == 0,
        })
    }

    /// Drops every table in the public schema and replays all migrations.
    pub async fn reset_database(&self) -> Result<(), AppError> {
        tracing::warn!("Dropping public schema");

        sqlx::query("DROP SCHEMA public CASCADE")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE SCHEMA public")
            .execute(&self.pool)
            .await?;

        self.run_all_migrations().await
    }

    /// Promotes an existing account to the admin role. Admins cannot
    /// self-register.
    pub async fn grant_admin(&self, email: &str) -> Result<Uuid, AppError> {
        let user_id: Option<Uuid> = sqlx::query_scalar(
            "UPDATE users SET role = 'admin', updated_at = NOW() \
             WHERE LOWER(email) = LOWER($1) RETURNING id",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        let user_id =
            user_id.ok_or_else(|| AppError::NotFound(format!("No user with email {}", email)))?;
        tracing::info!(%user_id, "Admin role granted");
        Ok(user_id)
    }
}

#[derive(Debug)]
pub struct MigrationStatus {
    pub total: usize,
    pub applied: usize,
    pub pending: usize,
    pub is_up_to_date: bool,
}

impl std::fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Migrations: {}/{} applied, {} pending",
            self.applied, self.total, self.pending
        )
    }
}
