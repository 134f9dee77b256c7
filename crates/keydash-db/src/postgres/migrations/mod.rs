use sqlx::PgPool;

use super::pg_err;
use crate::DbError;

/// Advisory lock key held while migrating, so concurrent servers apply each step once.
const MIGRATION_LOCK_KEY: i64 = 0x6B65_7964_6173_6800; // "keydash\0"

/// Ordered schema steps. Versions must increase.
const MIGRATIONS: &[(i32, &str)] = &[(1, include_str!("sql/V1__initial.sql"))];

pub async fn run(pool: &PgPool) -> Result<(), DbError> {
    sqlx::query("SELECT pg_advisory_lock($1)")
        .bind(MIGRATION_LOCK_KEY)
        .execute(pool)
        .await
        .map_err(pg_err)?;

    let result = apply_pending(pool).await;

    if let Err(e) = sqlx::query("SELECT pg_advisory_unlock($1)")
        .bind(MIGRATION_LOCK_KEY)
        .execute(pool)
        .await
    {
        tracing::warn!(error = %e, "failed to release migration lock");
    }

    result
}

async fn apply_pending(pool: &PgPool) -> Result<(), DbError> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version    INTEGER PRIMARY KEY,
            applied_at TIMESTAMPTZ NOT NULL
        )",
    )
    .execute(pool)
    .await
    .map_err(pg_err)?;

    let current: i32 = sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_version")
        .fetch_one(pool)
        .await
        .map_err(pg_err)?;

    for (version, sql) in MIGRATIONS.iter().filter(|(v, _)| *v > current) {
        let mut tx = pool.begin().await.map_err(pg_err)?;
        sqlx::raw_sql(sql).execute(&mut *tx).await.map_err(pg_err)?;
        sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES ($1, now())")
            .bind(version)
            .execute(&mut *tx)
            .await
            .map_err(pg_err)?;
        tx.commit().await.map_err(pg_err)?;
        tracing::info!(version, "applied postgres migration");
    }

    Ok(())
}
