//! Entity records stored by ReadNest.
//!
//! Each record mirrors the column set of its relational table one-to-one,
//! so the same serde shape is used for JSON fallback files and HTTP bodies.
//! Records move through the storage layer wrapped in [`Entity`], a tagged
//! variant carrying its [`EntityKind`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::{StoreError, StoreResult};

/// Opaque identifier of the user owning a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The four collections ReadNest persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Journal,
    Feed,
    Article,
    Document,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Journal,
        EntityKind::Feed,
        EntityKind::Article,
        EntityKind::Document,
    ];

    /// Table name in the primary store, also the stem of the fallback file.
    pub fn collection(self) -> &'static str {
        match self {
            EntityKind::Journal => "journals",
            EntityKind::Feed => "feed_subscriptions",
            EntityKind::Article => "articles",
            EntityKind::Document => "documents",
        }
    }

    /// Prefix used when generating ids for this kind.
    pub fn id_prefix(self) -> &'static str {
        match self {
            EntityKind::Journal => "j",
            EntityKind::Feed => "feed",
            EntityKind::Article => "article",
            EntityKind::Document => "doc",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Journal => "journal",
            EntityKind::Feed => "feed subscription",
            EntityKind::Article => "article",
            EntityKind::Document => "document",
        };
        f.write_str(name)
    }
}

/// A journal entry. `word_count` and `keywords` are derived from `content`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Journal {
    pub id: String,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub word_count: u32,
    #[serde(default)]
    pub keywords: BTreeMap<String, u32>,
    pub user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSubscription {
    pub id: String,
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub last_updated: DateTime<Utc>,
    pub is_active: bool,
    pub user_id: UserId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleType {
    Rss,
    Pdf,
}

impl ArticleType {
    pub fn as_str(self) -> &'static str {
        match self {
            ArticleType::Rss => "rss",
            ArticleType::Pdf => "pdf",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "rss" => Some(ArticleType::Rss),
            "pdf" => Some(ArticleType::Pdf),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub snippet: String,
    pub date: NaiveDate,
    /// Serialized as `type` to match the table column.
    #[serde(rename = "type")]
    pub kind: ArticleType,
    #[serde(default)]
    pub url: Option<String>,
    /// Parent subscription; `None` for articles imported from a PDF.
    #[serde(default)]
    pub feed_id: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub user_id: UserId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Pdf,
    Doc,
}

impl DocumentType {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentType::Pdf => "pdf",
            DocumentType::Doc => "doc",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pdf" => Some(DocumentType::Pdf),
            "doc" => Some(DocumentType::Doc),
            _ => None,
        }
    }
}

/// Upload/processing lifecycle of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Uploading,
    Processing,
    Ready,
    Error,
}

impl DocumentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentStatus::Uploading => "uploading",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Ready => "ready",
            DocumentStatus::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "uploading" => Some(DocumentStatus::Uploading),
            "processing" => Some(DocumentStatus::Processing),
            "ready" => Some(DocumentStatus::Ready),
            "error" => Some(DocumentStatus::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DocumentType,
    pub size: u64,
    pub upload_date: DateTime<Utc>,
    #[serde(default)]
    pub content: Option<String>,
    pub status: DocumentStatus,
    pub user_id: UserId,
}

/// Any stored record, tagged by kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entity {
    Journal(Journal),
    Feed(FeedSubscription),
    Article(Article),
    Document(Document),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Journal(_) => EntityKind::Journal,
            Entity::Feed(_) => EntityKind::Feed,
            Entity::Article(_) => EntityKind::Article,
            Entity::Document(_) => EntityKind::Document,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Entity::Journal(j) => &j.id,
            Entity::Feed(f) => &f.id,
            Entity::Article(a) => &a.id,
            Entity::Document(d) => &d.id,
        }
    }

    pub fn owner(&self) -> &UserId {
        match self {
            Entity::Journal(j) => &j.user_id,
            Entity::Feed(f) => &f.user_id,
            Entity::Article(a) => &a.user_id,
            Entity::Document(d) => &d.user_id,
        }
    }

    /// Serializes the inner record without the kind tag, as stored on disk.
    pub fn to_record(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            Entity::Journal(j) => serde_json::to_value(j),
            Entity::Feed(f) => serde_json::to_value(f),
            Entity::Article(a) => serde_json::to_value(a),
            Entity::Document(d) => serde_json::to_value(d),
        }
    }

    /// Inverse of [`Entity::to_record`]; the kind comes from the collection.
    pub fn from_record(kind: EntityKind, record: serde_json::Value) -> serde_json::Result<Self> {
        Ok(match kind {
            EntityKind::Journal => Entity::Journal(serde_json::from_value(record)?),
            EntityKind::Feed => Entity::Feed(serde_json::from_value(record)?),
            EntityKind::Article => Entity::Article(serde_json::from_value(record)?),
            EntityKind::Document => Entity::Document(serde_json::from_value(record)?),
        })
    }
}

macro_rules! entity_conversions {
    ($record:ty, $variant:ident, $kind:expr) => {
        impl From<$record> for Entity {
            fn from(value: $record) -> Self {
                Entity::$variant(value)
            }
        }

        impl TryFrom<Entity> for $record {
            type Error = StoreError;

            fn try_from(value: Entity) -> StoreResult<Self> {
                match value {
                    Entity::$variant(inner) => Ok(inner),
                    other => Err(StoreError::Internal(format!(
                        "expected {} record, got {}",
                        $kind,
                        other.kind()
                    ))),
                }
            }
        }
    };
}

entity_conversions!(Journal, Journal, EntityKind::Journal);
entity_conversions!(FeedSubscription, Feed, EntityKind::Feed);
entity_conversions!(Article, Article, EntityKind::Article);
entity_conversions!(Document, Document, EntityKind::Document);

/// Filters applied by `Store::list`. Owner filtering is always implicit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    /// Only articles whose parent is this feed. Ignored for other kinds.
    pub feed_id: Option<String>,
}

impl ListFilter {
    pub fn for_feed(feed_id: impl Into<String>) -> Self {
        Self {
            feed_id: Some(feed_id.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_article() -> Article {
        Article {
            id: "article_1_abcdef01".to_string(),
            title: "Rust 2024".to_string(),
            source: "blog".to_string(),
            snippet: "edition notes".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 2, 20).unwrap(),
            kind: ArticleType::Rss,
            url: Some("https://example.com/a".to_string()),
            feed_id: Some("feed_1_abcdef01".to_string()),
            content: None,
            author: None,
            tags: ["rust".to_string()].into_iter().collect(),
            user_id: UserId::new("u1"),
        }
    }

    #[test]
    fn article_record_uses_column_names() {
        let record = Entity::from(sample_article()).to_record().unwrap();
        assert_eq!(record["type"], "rss");
        assert_eq!(record["feed_id"], "feed_1_abcdef01");
        assert_eq!(record["user_id"], "u1");
        assert_eq!(record["date"], "2025-02-20");
        assert!(record.get("kind").is_none());
    }

    #[test]
    fn from_record_uses_collection_kind() {
        let record = Entity::from(sample_article()).to_record().unwrap();
        let entity = Entity::from_record(EntityKind::Article, record.clone()).unwrap();
        assert_eq!(entity.kind(), EntityKind::Article);
        assert!(Entity::from_record(EntityKind::Document, record).is_err());
    }

    #[test]
    fn try_from_rejects_wrong_variant() {
        let err = Journal::try_from(Entity::from(sample_article())).unwrap_err();
        assert!(matches!(err, StoreError::Internal(_)));
    }

    #[test]
    fn optional_article_fields_default_when_missing() {
        let record = serde_json::json!({
            "id": "article_1_abcdef01",
            "title": "t",
            "date": "2025-01-01",
            "type": "pdf",
            "user_id": "u1"
        });
        let article: Article = serde_json::from_value(record).unwrap();
        assert_eq!(article.kind, ArticleType::Pdf);
        assert!(article.tags.is_empty());
        assert!(article.feed_id.is_none());
    }

    #[test]
    fn collections_match_table_names() {
        let names: Vec<_> = EntityKind::ALL.iter().map(|k| k.collection()).collect();
        assert_eq!(
            names,
            ["journals", "feed_subscriptions", "articles", "documents"]
        );
    }
}
