use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::debug;

struct Migration {
    version: i32,
    description: &'static str,
    statements: &'static [&'static str],
}

/// Ordered schema history. Each step runs in one transaction together with
/// its version bump.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create user settings",
        statements: &[r"
            CREATE TABLE IF NOT EXISTS user_settings (
                user_id INTEGER PRIMARY KEY,
                language TEXT NOT NULL DEFAULT 'ru',
                default_quality TEXT NOT NULL DEFAULT 'ask',
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
        "],
    },
    Migration {
        version: 2,
        description: "add user profile columns",
        statements: &[
            "ALTER TABLE user_settings ADD COLUMN username TEXT",
            "ALTER TABLE user_settings ADD COLUMN first_name TEXT",
            "ALTER TABLE user_settings ADD COLUMN last_name TEXT",
            "ALTER TABLE user_settings ADD COLUMN phone_number TEXT",
            "ALTER TABLE user_settings ADD COLUMN is_premium INTEGER NOT NULL DEFAULT 0",
            "CREATE INDEX IF NOT EXISTS idx_user_settings_updated ON user_settings(updated_at)",
        ],
    },
    Migration {
        version: 3,
        description: "create group settings",
        statements: &[r"
            CREATE TABLE IF NOT EXISTS group_settings (
                group_id INTEGER PRIMARY KEY,
                admin_id INTEGER NOT NULL,
                language TEXT NOT NULL DEFAULT 'ru',
                default_quality TEXT NOT NULL DEFAULT 'ask',
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
        "],
    },
];

pub const LATEST_VERSION: i32 = 3;

/// Apply every migration newer than the stored version.
pub async fn run(pool: &SqlitePool) -> Result<()> {
    sqlx::query("CREATE TABLE IF NOT EXISTS _schema_version (version INTEGER PRIMARY KEY)")
        .execute(pool)
        .await
        .context("Failed to create schema version table")?;

    let current = current_version(pool).await?;
    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        debug!(
            version = migration.version,
            "Running migration: {}", migration.description
        );

        let mut tx = pool.begin().await?;
        for statement in migration.statements {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .with_context(|| {
                    format!(
                        "Migration v{} ({}) failed",
                        migration.version, migration.description
                    )
                })?;
        }
        sqlx::query("DELETE FROM _schema_version")
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO _schema_version (version) VALUES (?)")
            .bind(migration.version)
            .execute(&mut *tx)
            .await?;
        tx.commit()
            .await
            .with_context(|| format!("Failed to commit migration v{}", migration.version))?;
    }

    Ok(())
}

/// Stored schema version; 0 for a store that was never migrated.
pub async fn current_version(pool: &SqlitePool) -> Result<i32> {
    let (has_table,): (bool,) = sqlx::query_as(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = '_schema_version')",
    )
    .fetch_one(pool)
    .await
    .context("Failed to inspect schema")?;
    if !has_table {
        return Ok(0);
    }

    let row: Option<(i32,)> = sqlx::query_as("SELECT version FROM _schema_version LIMIT 1")
        .fetch_optional(pool)
        .await
        .context("Failed to get schema version")?;
    Ok(row.map_or(0, |(v,)| v))
}
