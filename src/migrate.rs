//! Primary schema migrations.
//!
//! Column names mirror the JSON record fields one-to-one so a record can be
//! moved between the primary store and the fallback files without mapping.
//! Map and set fields (`keywords`, `tags`) are stored as JSON text.
//! `search_first` and `search_second` hold the lowercased search fields and
//! have no JSON counterpart.
//! Every statement is idempotent.

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use tracing::info;

use readnest_core::models::EntityKind;

use crate::config::Config;
use crate::db;
use crate::sql_store;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Creates all tables and indexes on an existing pool.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS journals (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            word_count INTEGER NOT NULL DEFAULT 0,
            keywords TEXT NOT NULL DEFAULT '{}',
            search_first TEXT,
            search_second TEXT
        )
        "#,
    )
    .execute(pool)
    .await
    .context("creating journals table")?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS feed_subscriptions (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            url TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            last_updated TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            search_first TEXT,
            search_second TEXT,
            UNIQUE(user_id, url)
        )
        "#,
    )
    .execute(pool)
    .await
    .context("creating feed_subscriptions table")?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS articles (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            title TEXT NOT NULL,
            source TEXT NOT NULL DEFAULT '',
            snippet TEXT NOT NULL DEFAULT '',
            date TEXT NOT NULL,
            type TEXT NOT NULL CHECK (type IN ('rss', 'pdf')),
            url TEXT,
            feed_id TEXT,
            content TEXT,
            author TEXT,
            tags TEXT NOT NULL DEFAULT '[]',
            search_first TEXT,
            search_second TEXT
        )
        "#,
    )
    .execute(pool)
    .await
    .context("creating articles table")?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            name TEXT NOT NULL,
            type TEXT NOT NULL CHECK (type IN ('pdf', 'doc')),
            size INTEGER NOT NULL DEFAULT 0,
            upload_date TEXT NOT NULL,
            content TEXT,
            status TEXT NOT NULL
                CHECK (status IN ('uploading', 'processing', 'ready', 'error')),
            search_first TEXT,
            search_second TEXT
        )
        "#,
    )
    .execute(pool)
    .await
    .context("creating documents table")?;

    // Databases created before search columns existed.
    for kind in EntityKind::ALL {
        let table = kind.collection();
        for column in ["search_first", "search_second"] {
            add_column_if_missing(pool, table, column).await?;
        }
    }
    let filled = sql_store::backfill_search_columns(pool)
        .await
        .context("backfilling search columns")?;
    if filled > 0 {
        info!(rows = filled, "backfilled search columns");
    }

    for statement in [
        "CREATE INDEX IF NOT EXISTS idx_journals_user ON journals(user_id)",
        "CREATE INDEX IF NOT EXISTS idx_feeds_user ON feed_subscriptions(user_id)",
        "CREATE INDEX IF NOT EXISTS idx_articles_user ON articles(user_id)",
        "CREATE INDEX IF NOT EXISTS idx_articles_feed ON articles(feed_id)",
        "CREATE INDEX IF NOT EXISTS idx_documents_user ON documents(user_id)",
    ] {
        sqlx::query(statement)
            .execute(pool)
            .await
            .with_context(|| format!("running `{statement}`"))?;
    }

    Ok(())
}

async fn add_column_if_missing(pool: &SqlitePool, table: &str, column: &str) -> Result<()> {
    let present: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM pragma_table_info(?) WHERE name = ?")
            .bind(table)
            .bind(column)
            .fetch_one(pool)
            .await
            .with_context(|| format!("inspecting columns of {table}"))?;

    if present == 0 {
        sqlx::query(&format!("ALTER TABLE {table} ADD COLUMN {column} TEXT"))
            .execute(pool)
            .await
            .with_context(|| format!("adding {table}.{column}"))?;
    }
    Ok(())
}
