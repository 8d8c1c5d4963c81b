//! Directory-based schema migrations.
//!
//! Migrations live in a directory as reversible pairs:
//!
//! ```text
//! migrations/
//! ├── 20240101120000_create_users.up.sql
//! ├── 20240101120000_create_users.down.sql
//! ├── 20240102090000_add_posts.up.sql
//! └── 20240102090000_add_posts.down.sql
//! ```
//!
//! Applied versions are tracked in the `_sqlx_migrations` table. Each
//! migration runs in its own transaction.

use crate::error::{Error, Result};
use sqlx::migrate::{Migrate, Migrator};
use sqlx::{Database, Pool};
use std::path::Path;

/// Status of one migration found in the migrations directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    pub version: i64,
    pub description: String,
    pub applied: bool,
}

async fn load(dir: &Path) -> Result<Migrator> {
    Migrator::new(dir).await.map_err(|e| {
        Error::MigrationError(format!("Failed to read migrations from {}: {}", dir.display(), e))
    })
}

async fn applied_versions<DB>(pool: &Pool<DB>) -> Result<Vec<i64>>
where
    DB: Database,
    DB::Connection: Migrate,
{
    let mut conn = pool.acquire().await?;
    conn.ensure_migrations_table().await?;
    let mut versions: Vec<i64> = conn
        .list_applied_migrations()
        .await?
        .into_iter()
        .map(|m| m.version)
        .collect();
    versions.sort_unstable();
    Ok(versions)
}

async fn up<DB>(pool: &Pool<DB>, dir: &Path) -> Result<()>
where
    DB: Database,
    DB::Connection: Migrate,
{
    let migrator = load(dir).await?;
    migrator.run(pool).await?;
    info!("✓ Migrations applied from {}", dir.display());
    Ok(())
}

async fn down_to<DB>(pool: &Pool<DB>, dir: &Path, target: i64) -> Result<()>
where
    DB: Database,
    DB::Connection: Migrate,
{
    let migrator = load(dir).await?;
    migrator.undo(pool, target).await?;
    info!("✓ Migrations above version {} reverted", target);
    Ok(())
}

async fn down_one<DB>(pool: &Pool<DB>, dir: &Path) -> Result<()>
where
    DB: Database,
    DB::Connection: Migrate,
{
    let versions = applied_versions(pool).await?;
    match versions.as_slice() {
        [] => {
            debug!("» No applied migrations to revert");
            Ok(())
        }
        [.., previous, _] => down_to(pool, dir, *previous).await,
        [_] => down_to(pool, dir, 0).await,
    }
}

async fn version<DB>(pool: &Pool<DB>) -> Result<Option<i64>>
where
    DB: Database,
    DB::Connection: Migrate,
{
    Ok(applied_versions(pool).await?.last().copied())
}

async fn status<DB>(pool: &Pool<DB>, dir: &Path) -> Result<Vec<MigrationStatus>>
where
    DB: Database,
    DB::Connection: Migrate,
{
    let migrator = load(dir).await?;
    let applied = applied_versions(pool).await?;

    Ok(migrator
        .iter()
        .filter(|m| !m.migration_type.is_down_migration())
        .map(|m| MigrationStatus {
            version: m.version,
            description: m.description.to_string(),
            applied: applied.binary_search(&m.version).is_ok(),
        })
        .collect())
}

// ============================================================================
// SQLite
// ============================================================================

/// Apply all pending migrations from `dir` to a SQLite database.
///
/// # Errors
/// Returns `Error::MigrationError` if the directory cannot be read, an applied
/// migration was modified, or a migration fails.
#[cfg(feature = "sqlite")]
pub async fn sqlite_migrate(pool: &sqlx::SqlitePool, dir: impl AsRef<Path>) -> Result<()> {
    up(pool, dir.as_ref()).await
}

/// Revert the most recently applied migration.
#[cfg(feature = "sqlite")]
pub async fn sqlite_migrate_down(pool: &sqlx::SqlitePool, dir: impl AsRef<Path>) -> Result<()> {
    down_one(pool, dir.as_ref()).await
}

/// Revert every applied migration with a version above `target`.
#[cfg(feature = "sqlite")]
pub async fn sqlite_migrate_down_to(
    pool: &sqlx::SqlitePool,
    dir: impl AsRef<Path>,
    target: i64,
) -> Result<()> {
    down_to(pool, dir.as_ref(), target).await
}

/// Revert all applied migrations.
#[cfg(feature = "sqlite")]
pub async fn sqlite_migrate_reset(pool: &sqlx::SqlitePool, dir: impl AsRef<Path>) -> Result<()> {
    down_to(pool, dir.as_ref(), 0).await
}

/// Highest applied migration version, `None` if nothing has been applied.
#[cfg(feature = "sqlite")]
pub async fn sqlite_migrate_version(pool: &sqlx::SqlitePool) -> Result<Option<i64>> {
    version(pool).await
}

/// Every migration in `dir` with whether it has been applied.
#[cfg(feature = "sqlite")]
pub async fn sqlite_migrate_status(
    pool: &sqlx::SqlitePool,
    dir: impl AsRef<Path>,
) -> Result<Vec<MigrationStatus>> {
    status(pool, dir.as_ref()).await
}

// ============================================================================
// PostgreSQL
// ============================================================================

/// Apply all pending migrations from `dir` to a PostgreSQL database.
///
/// Concurrent runners are serialized with an advisory lock.
///
/// # Errors
/// Returns `Error::MigrationError` if the directory cannot be read, an applied
/// migration was modified, or a migration fails.
#[cfg(feature = "postgres")]
pub async fn postgres_migrate(pool: &sqlx::PgPool, dir: impl AsRef<Path>) -> Result<()> {
    up(pool, dir.as_ref()).await
}

/// Revert the most recently applied migration.
#[cfg(feature = "postgres")]
pub async fn postgres_migrate_down(pool: &sqlx::PgPool, dir: impl AsRef<Path>) -> Result<()> {
    down_one(pool, dir.as_ref()).await
}

/// Revert every applied migration with a version above `target`.
#[cfg(feature = "postgres")]
pub async fn postgres_migrate_down_to(
    pool: &sqlx::PgPool,
    dir: impl AsRef<Path>,
    target: i64,
) -> Result<()> {
    down_to(pool, dir.as_ref(), target).await
}

/// Revert all applied migrations.
#[cfg(feature = "postgres")]
pub async fn postgres_migrate_reset(pool: &sqlx::PgPool, dir: impl AsRef<Path>) -> Result<()> {
    down_to(pool, dir.as_ref(), 0).await
}

/// Highest applied migration version, `None` if nothing has been applied.
#[cfg(feature = "postgres")]
pub async fn postgres_migrate_version(pool: &sqlx::PgPool) -> Result<Option<i64>> {
    version(pool).await
}

/// Every migration in `dir` with whether it has been applied.
#[cfg(feature = "postgres")]
pub async fn postgres_migrate_status(
    pool: &sqlx::PgPool,
    dir: impl AsRef<Path>,
) -> Result<Vec<MigrationStatus>> {
    status(pool, dir.as_ref()).await
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::sqlite::sqlite_in_memory;
    use std::fs;

    fn write_migrations(dir: &Path) {
        let files = [
            ("1_create_users.up.sql", "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL);"),
            ("1_create_users.down.sql", "DROP TABLE users;"),
            ("2_create_posts.up.sql", "CREATE TABLE posts (id INTEGER PRIMARY KEY, user_id INTEGER REFERENCES users(id));"),
            ("2_create_posts.down.sql", "DROP TABLE posts;"),
        ];
        for (name, sql) in files {
            fs::write(dir.join(name), sql).expect("Failed to write migration");
        }
    }

    async fn table_exists(pool: &sqlx::SqlitePool, name: &str) -> bool {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind(name)
                .fetch_one(pool)
                .await
                .expect("Failed to query sqlite_master");
        count == 1
    }

    #[tokio::test]
    async fn test_migrate_up_down_reset() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        write_migrations(dir.path());
        let pool = sqlite_in_memory().await.expect("Failed to open in-memory");

        assert_eq!(sqlite_migrate_version(&pool).await.expect("version"), None);

        sqlite_migrate(&pool, dir.path()).await.expect("Failed to migrate");
        assert_eq!(sqlite_migrate_version(&pool).await.expect("version"), Some(2));
        assert!(table_exists(&pool, "users").await);
        assert!(table_exists(&pool, "posts").await);

        // Idempotent
        sqlite_migrate(&pool, dir.path()).await.expect("Second migrate should be a no-op");
        assert_eq!(sqlite_migrate_version(&pool).await.expect("version"), Some(2));

        sqlite_migrate_down(&pool, dir.path()).await.expect("Failed to migrate down");
        assert_eq!(sqlite_migrate_version(&pool).await.expect("version"), Some(1));
        assert!(!table_exists(&pool, "posts").await);
        assert!(table_exists(&pool, "users").await);

        sqlite_migrate_reset(&pool, dir.path()).await.expect("Failed to reset");
        assert_eq!(sqlite_migrate_version(&pool).await.expect("version"), None);
        assert!(!table_exists(&pool, "users").await);
    }

    #[tokio::test]
    async fn test_migrate_down_to_and_status() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        write_migrations(dir.path());
        let pool = sqlite_in_memory().await.expect("Failed to open in-memory");

        sqlite_migrate(&pool, dir.path()).await.expect("Failed to migrate");
        sqlite_migrate_down_to(&pool, dir.path(), 1)
            .await
            .expect("Failed to migrate down to 1");

        let status = sqlite_migrate_status(&pool, dir.path()).await.expect("status");
        assert_eq!(status.len(), 2);
        assert_eq!(status[0].version, 1);
        assert!(status[0].applied);
        assert_eq!(status[1].version, 2);
        assert!(!status[1].applied);
        assert_eq!(status[1].description, "create posts");
    }

    #[tokio::test]
    async fn test_migrate_down_with_nothing_applied_is_noop() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        write_migrations(dir.path());
        let pool = sqlite_in_memory().await.expect("Failed to open in-memory");

        sqlite_migrate_down(&pool, dir.path()).await.expect("Down on empty db should succeed");
        assert_eq!(sqlite_migrate_version(&pool).await.expect("version"), None);
    }

    #[tokio::test]
    async fn test_migrate_missing_dir_is_migration_error() {
        let pool = sqlite_in_memory().await.expect("Failed to open in-memory");
        let err = sqlite_migrate(&pool, "/definitely/not/a/migrations/dir")
            .await
            .expect_err("missing directory must fail");
        assert!(matches!(err, Error::MigrationError(_)), "got {:?}", err);
    }
}
