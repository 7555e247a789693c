//! Relational [`Store`] implementation (the primary store).
//!
//! Maps every [`Store`] operation to parameterized SQL against the schema
//! created by [`migrate`](crate::migrate). Every statement carries the
//! caller's user id; addressing another user's row by id is reported as
//! [`StoreError::AuthorizationDenied`].
//!
//! # Error mapping
//!
//! | sqlx failure | StoreError |
//! |--------------|------------|
//! | unique violation | `Conflict` |
//! | check / foreign key violation | `Invalid` |
//! | pool, I/O, protocol, decode, any other database error | `Transient` |
//!
//! `Transient` is what sends an operation to the fallback store, so any
//! failure that is not attributable to the input lands there.
//!
//! # Search
//!
//! Each table carries `search_first` and `search_second`, the record's
//! [`folded_fields`] written on every insert and update. Search is a plain
//! `instr` over those columns; SQLite's `lower()` is never used.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use sqlx::sqlite::{Sqlite, SqliteRow};
use sqlx::{Row, SqlitePool};

use readnest_core::models::{
    Article, ArticleType, Document, DocumentStatus, DocumentType, Entity, EntityKind,
    FeedSubscription, Journal, ListFilter, UserId,
};
use readnest_core::search::folded_fields;
use readnest_core::store::Store;
use readnest_core::{StoreError, StoreResult};

/// Primary store backed by a [`SqlitePool`].
pub struct SqlStore {
    pool: SqlitePool,
}

impl SqlStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Fails with `NotFound` or `AuthorizationDenied` unless `id` exists and
    /// belongs to `owner`.
    async fn check_owner(&self, owner: &UserId, kind: EntityKind, id: &str) -> StoreResult<()> {
        let sql = format!("SELECT user_id FROM {} WHERE id = ?", kind.collection());
        let row_owner: Option<String> = sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        match row_owner {
            None => Err(StoreError::not_found(kind, id)),
            Some(user) if user != owner.as_str() => Err(StoreError::denied(kind, id)),
            Some(_) => Ok(()),
        }
    }
}

pub(crate) fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return StoreError::Conflict(db_err.message().to_string());
        }
        if db_err.is_check_violation() || db_err.is_foreign_key_violation() {
            return StoreError::invalid("record", db_err.message().to_string());
        }
    }
    StoreError::Transient(err.to_string())
}

fn col<'r, T>(row: &'r SqliteRow, name: &str) -> StoreResult<T>
where
    T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get(name).map_err(map_sqlx_error)
}

fn invalid_row(kind: EntityKind, column: &str, detail: impl std::fmt::Display) -> StoreError {
    StoreError::Transient(format!(
        "invalid persisted value in {}.{column}: {detail}",
        kind.collection()
    ))
}

fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn ts_col(row: &SqliteRow, kind: EntityKind, name: &str) -> StoreResult<DateTime<Utc>> {
    let text: String = col(row, name)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| invalid_row(kind, name, err))
}

fn json_col<T: DeserializeOwned>(row: &SqliteRow, kind: EntityKind, name: &str) -> StoreResult<T> {
    let text: String = col(row, name)?;
    serde_json::from_str(&text).map_err(|err| invalid_row(kind, name, err))
}

fn to_json_text<T: serde::Serialize>(value: &T) -> StoreResult<String> {
    serde_json::to_string(value).map_err(|err| StoreError::Internal(err.to_string()))
}

fn journal_from_row(row: &SqliteRow) -> StoreResult<Journal> {
    let kind = EntityKind::Journal;
    let word_count: i64 = col(row, "word_count")?;
    Ok(Journal {
        id: col(row, "id")?,
        title: col(row, "title")?,
        content: col(row, "content")?,
        created_at: ts_col(row, kind, "created_at")?,
        updated_at: ts_col(row, kind, "updated_at")?,
        word_count: u32::try_from(word_count)
            .map_err(|err| invalid_row(kind, "word_count", err))?,
        keywords: json_col(row, kind, "keywords")?,
        user_id: UserId::new(col::<String>(row, "user_id")?),
    })
}

fn feed_from_row(row: &SqliteRow) -> StoreResult<FeedSubscription> {
    Ok(FeedSubscription {
        id: col(row, "id")?,
        url: col(row, "url")?,
        title: col(row, "title")?,
        description: col(row, "description")?,
        last_updated: ts_col(row, EntityKind::Feed, "last_updated")?,
        is_active: col(row, "is_active")?,
        user_id: UserId::new(col::<String>(row, "user_id")?),
    })
}

fn article_from_row(row: &SqliteRow) -> StoreResult<Article> {
    let kind = EntityKind::Article;
    let date: String = col(row, "date")?;
    let type_text: String = col(row, "type")?;
    Ok(Article {
        id: col(row, "id")?,
        title: col(row, "title")?,
        source: col(row, "source")?,
        snippet: col(row, "snippet")?,
        date: NaiveDate::parse_from_str(&date, "%Y-%m-%d")
            .map_err(|err| invalid_row(kind, "date", err))?,
        kind: ArticleType::parse(&type_text)
            .ok_or_else(|| invalid_row(kind, "type", &type_text))?,
        url: col(row, "url")?,
        feed_id: col(row, "feed_id")?,
        content: col(row, "content")?,
        author: col(row, "author")?,
        tags: json_col(row, kind, "tags")?,
        user_id: UserId::new(col::<String>(row, "user_id")?),
    })
}

fn document_from_row(row: &SqliteRow) -> StoreResult<Document> {
    let kind = EntityKind::Document;
    let type_text: String = col(row, "type")?;
    let status_text: String = col(row, "status")?;
    let size: i64 = col(row, "size")?;
    Ok(Document {
        id: col(row, "id")?,
        name: col(row, "name")?,
        kind: DocumentType::parse(&type_text)
            .ok_or_else(|| invalid_row(kind, "type", &type_text))?,
        size: u64::try_from(size).map_err(|err| invalid_row(kind, "size", err))?,
        upload_date: ts_col(row, kind, "upload_date")?,
        content: col(row, "content")?,
        status: DocumentStatus::parse(&status_text)
            .ok_or_else(|| invalid_row(kind, "status", &status_text))?,
        user_id: UserId::new(col::<String>(row, "user_id")?),
    })
}

fn entity_from_row(kind: EntityKind, row: &SqliteRow) -> StoreResult<Entity> {
    Ok(match kind {
        EntityKind::Journal => Entity::Journal(journal_from_row(row)?),
        EntityKind::Feed => Entity::Feed(feed_from_row(row)?),
        EntityKind::Article => Entity::Article(article_from_row(row)?),
        EntityKind::Document => Entity::Document(document_from_row(row)?),
    })
}

/// Fills `search_first` / `search_second` on rows written before those
/// columns existed.
pub(crate) async fn backfill_search_columns(pool: &SqlitePool) -> StoreResult<u64> {
    let mut filled = 0;
    for kind in EntityKind::ALL {
        let table = kind.collection();
        let select = format!(
            "SELECT * FROM {table} WHERE search_first IS NULL OR search_second IS NULL"
        );
        let rows = sqlx::query(&select)
            .fetch_all(pool)
            .await
            .map_err(map_sqlx_error)?;

        let update = format!("UPDATE {table} SET search_first = ?, search_second = ? WHERE id = ?");
        for row in &rows {
            let entity = entity_from_row(kind, row)?;
            let [first, second] = folded_fields(&entity);
            sqlx::query(&update)
                .bind(first)
                .bind(second)
                .bind(entity.id())
                .execute(pool)
                .await
                .map_err(map_sqlx_error)?;
            filled += 1;
        }
    }
    Ok(filled)
}

fn document_size(doc: &Document) -> StoreResult<i64> {
    i64::try_from(doc.size).map_err(|_| StoreError::invalid("size", "exceeds the storable range"))
}

#[async_trait]
impl Store for SqlStore {
    fn name(&self) -> &'static str {
        "primary"
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn insert(&self, owner: &UserId, entity: &Entity) -> StoreResult<Entity> {
        if entity.owner() != owner {
            return Err(StoreError::denied(entity.kind(), entity.id()));
        }

        let [search_first, search_second] = folded_fields(entity);
        let result = match entity {
            Entity::Journal(j) => {
                sqlx::query(
                    r#"
                    INSERT INTO journals (id, user_id, title, content, created_at,
                                          updated_at, word_count, keywords,
                                          search_first, search_second)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&j.id)
                .bind(j.user_id.as_str())
                .bind(&j.title)
                .bind(&j.content)
                .bind(format_ts(&j.created_at))
                .bind(format_ts(&j.updated_at))
                .bind(i64::from(j.word_count))
                .bind(to_json_text(&j.keywords)?)
                .bind(&search_first)
                .bind(&search_second)
                .execute(&self.pool)
                .await
            }
            Entity::Feed(f) => {
                sqlx::query(
                    r#"
                    INSERT INTO feed_subscriptions (id, user_id, url, title, description,
                                                    last_updated, is_active,
                                                    search_first, search_second)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&f.id)
                .bind(f.user_id.as_str())
                .bind(&f.url)
                .bind(&f.title)
                .bind(&f.description)
                .bind(format_ts(&f.last_updated))
                .bind(f.is_active)
                .bind(&search_first)
                .bind(&search_second)
                .execute(&self.pool)
                .await
            }
            Entity::Article(a) => {
                sqlx::query(
                    r#"
                    INSERT INTO articles (id, user_id, title, source, snippet, date, type,
                                          url, feed_id, content, author, tags,
                                          search_first, search_second)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&a.id)
                .bind(a.user_id.as_str())
                .bind(&a.title)
                .bind(&a.source)
                .bind(&a.snippet)
                .bind(a.date.format("%Y-%m-%d").to_string())
                .bind(a.kind.as_str())
                .bind(&a.url)
                .bind(&a.feed_id)
                .bind(&a.content)
                .bind(&a.author)
                .bind(to_json_text(&a.tags)?)
                .bind(&search_first)
                .bind(&search_second)
                .execute(&self.pool)
                .await
            }
            Entity::Document(d) => {
                sqlx::query(
                    r#"
                    INSERT INTO documents (id, user_id, name, type, size, upload_date,
                                           content, status, search_first, search_second)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&d.id)
                .bind(d.user_id.as_str())
                .bind(&d.name)
                .bind(d.kind.as_str())
                .bind(document_size(d)?)
                .bind(format_ts(&d.upload_date))
                .bind(&d.content)
                .bind(d.status.as_str())
                .bind(&search_first)
                .bind(&search_second)
                .execute(&self.pool)
                .await
            }
        };

        result.map_err(map_sqlx_error)?;
        Ok(entity.clone())
    }

    async fn get(&self, owner: &UserId, kind: EntityKind, id: &str) -> StoreResult<Entity> {
        let sql = format!("SELECT * FROM {} WHERE id = ?", kind.collection());
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .ok_or_else(|| StoreError::not_found(kind, id))?;

        let row_owner: String = col(&row, "user_id")?;
        if row_owner != owner.as_str() {
            return Err(StoreError::denied(kind, id));
        }

        entity_from_row(kind, &row)
    }

    async fn list(
        &self,
        owner: &UserId,
        kind: EntityKind,
        filter: &ListFilter,
    ) -> StoreResult<Vec<Entity>> {
        let feed_filter = match kind {
            EntityKind::Article => filter.feed_id.as_deref(),
            _ => None,
        };

        let mut sql = format!("SELECT * FROM {} WHERE user_id = ?", kind.collection());
        if feed_filter.is_some() {
            sql.push_str(" AND feed_id = ?");
        }
        sql.push_str(" ORDER BY rowid ASC");

        let mut query = sqlx::query(&sql).bind(owner.as_str());
        if let Some(feed_id) = feed_filter {
            query = query.bind(feed_id);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        rows.iter().map(|row| entity_from_row(kind, row)).collect()
    }

    async fn update(&self, owner: &UserId, entity: &Entity) -> StoreResult<Entity> {
        let kind = entity.kind();
        if entity.owner() != owner {
            return Err(StoreError::denied(kind, entity.id()));
        }
        self.check_owner(owner, kind, entity.id()).await?;

        let [search_first, search_second] = folded_fields(entity);
        let result = match entity {
            Entity::Journal(j) => {
                sqlx::query(
                    r#"
                    UPDATE journals
                    SET title = ?, content = ?, created_at = ?, updated_at = ?,
                        word_count = ?, keywords = ?, search_first = ?, search_second = ?
                    WHERE id = ? AND user_id = ?
                    "#,
                )
                .bind(&j.title)
                .bind(&j.content)
                .bind(format_ts(&j.created_at))
                .bind(format_ts(&j.updated_at))
                .bind(i64::from(j.word_count))
                .bind(to_json_text(&j.keywords)?)
                .bind(&search_first)
                .bind(&search_second)
                .bind(&j.id)
                .bind(owner.as_str())
                .execute(&self.pool)
                .await
            }
            Entity::Feed(f) => {
                sqlx::query(
                    r#"
                    UPDATE feed_subscriptions
                    SET url = ?, title = ?, description = ?, last_updated = ?, is_active = ?,
                        search_first = ?, search_second = ?
                    WHERE id = ? AND user_id = ?
                    "#,
                )
                .bind(&f.url)
                .bind(&f.title)
                .bind(&f.description)
                .bind(format_ts(&f.last_updated))
                .bind(f.is_active)
                .bind(&search_first)
                .bind(&search_second)
                .bind(&f.id)
                .bind(owner.as_str())
                .execute(&self.pool)
                .await
            }
            Entity::Article(a) => {
                sqlx::query(
                    r#"
                    UPDATE articles
                    SET title = ?, source = ?, snippet = ?, date = ?, type = ?, url = ?,
                        feed_id = ?, content = ?, author = ?, tags = ?,
                        search_first = ?, search_second = ?
                    WHERE id = ? AND user_id = ?
                    "#,
                )
                .bind(&a.title)
                .bind(&a.source)
                .bind(&a.snippet)
                .bind(a.date.format("%Y-%m-%d").to_string())
                .bind(a.kind.as_str())
                .bind(&a.url)
                .bind(&a.feed_id)
                .bind(&a.content)
                .bind(&a.author)
                .bind(to_json_text(&a.tags)?)
                .bind(&search_first)
                .bind(&search_second)
                .bind(&a.id)
                .bind(owner.as_str())
                .execute(&self.pool)
                .await
            }
            Entity::Document(d) => {
                sqlx::query(
                    r#"
                    UPDATE documents
                    SET name = ?, type = ?, size = ?, upload_date = ?, content = ?, status = ?,
                        search_first = ?, search_second = ?
                    WHERE id = ? AND user_id = ?
                    "#,
                )
                .bind(&d.name)
                .bind(d.kind.as_str())
                .bind(document_size(d)?)
                .bind(format_ts(&d.upload_date))
                .bind(&d.content)
                .bind(d.status.as_str())
                .bind(&search_first)
                .bind(&search_second)
                .bind(&d.id)
                .bind(owner.as_str())
                .execute(&self.pool)
                .await
            }
        };

        let changed = result.map_err(map_sqlx_error)?.rows_affected();
        if changed == 0 {
            return Err(StoreError::not_found(kind, entity.id()));
        }
        Ok(entity.clone())
    }

    async fn delete(&self, owner: &UserId, kind: EntityKind, id: &str) -> StoreResult<()> {
        self.check_owner(owner, kind, id).await?;

        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        if kind == EntityKind::Feed {
            sqlx::query("DELETE FROM articles WHERE feed_id = ? AND user_id = ?")
                .bind(id)
                .bind(owner.as_str())
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        }

        let sql = format!(
            "DELETE FROM {} WHERE id = ? AND user_id = ?",
            kind.collection()
        );
        let changed = sqlx::query(&sql)
            .bind(id)
            .bind(owner.as_str())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?
            .rows_affected();

        if changed == 0 {
            return Err(StoreError::not_found(kind, id));
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn search(
        &self,
        owner: &UserId,
        kind: EntityKind,
        query: &str,
    ) -> StoreResult<Vec<Entity>> {
        let sql = format!(
            "SELECT * FROM {} WHERE user_id = ? \
             AND (instr(search_first, ?) > 0 OR instr(search_second, ?) > 0) \
             ORDER BY rowid ASC",
            kind.collection()
        );

        let rows = sqlx::query(&sql)
            .bind(owner.as_str())
            .bind(query)
            .bind(query)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        rows.iter().map(|row| entity_from_row(kind, row)).collect()
    }
}
