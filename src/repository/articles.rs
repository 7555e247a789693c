use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use std::collections::BTreeSet;

use readnest_core::models::{Article, ArticleType, EntityKind, ListFilter, UserId};
use readnest_core::text::{generate_id, require_text, validate_id};
use readnest_core::StoreResult;

use crate::hybrid::{HybridStore, Served, StoreStatus};
use crate::repository::FeedRepository;

const KIND: EntityKind = EntityKind::Article;

/// Fields a client supplies when saving an article. `date` defaults to
/// today and `type` to `rss`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewArticle {
    pub title: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(rename = "type", default = "default_type")]
    pub kind: ArticleType,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub feed_id: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

fn default_type() -> ArticleType {
    ArticleType::Rss
}

/// Partial update. `feed_id` cannot be changed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArticlePatch {
    pub title: Option<String>,
    pub source: Option<String>,
    pub snippet: Option<String>,
    pub date: Option<NaiveDate>,
    pub url: Option<String>,
    pub content: Option<String>,
    pub author: Option<String>,
    pub tags: Option<BTreeSet<String>>,
}

#[derive(Clone)]
pub struct ArticleRepository {
    store: HybridStore,
    feeds: FeedRepository,
}

impl ArticleRepository {
    pub fn new(store: HybridStore) -> Self {
        Self {
            feeds: FeedRepository::new(store.clone()),
            store,
        }
    }

    /// Saves an article. When `feed_id` is set the feed must exist and
    /// belong to `owner`.
    pub async fn create(&self, owner: &UserId, input: NewArticle) -> StoreResult<Served<Article>> {
        require_text("title", &input.title)?;
        let mut lookup = StoreStatus::Ok;
        if let Some(feed_id) = &input.feed_id {
            validate_id(feed_id)?;
            lookup = self.feeds.get(owner, feed_id).await?.status;
        }

        let now = Utc::now();
        let article = Article {
            id: generate_id(KIND, now),
            title: input.title,
            source: input.source,
            snippet: input.snippet,
            date: input.date.unwrap_or_else(|| now.date_naive()),
            kind: input.kind,
            url: input.url,
            feed_id: input.feed_id,
            content: input.content,
            author: input.author,
            tags: input.tags,
            user_id: owner.clone(),
        };
        Ok(super::insert(&self.store, owner, article)
            .await?
            .combine(lookup))
    }

    pub async fn get(&self, owner: &UserId, id: &str) -> StoreResult<Served<Article>> {
        super::fetch(&self.store, owner, KIND, id).await
    }

    pub async fn list(&self, owner: &UserId) -> StoreResult<Served<Vec<Article>>> {
        super::list(&self.store, owner, KIND, ListFilter::default()).await
    }

    /// Articles belonging to one feed subscription.
    pub async fn list_for_feed(
        &self,
        owner: &UserId,
        feed_id: &str,
    ) -> StoreResult<Served<Vec<Article>>> {
        validate_id(feed_id)?;
        super::list(&self.store, owner, KIND, ListFilter::for_feed(feed_id)).await
    }

    pub async fn update(
        &self,
        owner: &UserId,
        id: &str,
        patch: ArticlePatch,
    ) -> StoreResult<Served<Article>> {
        if let Some(title) = &patch.title {
            require_text("title", title)?;
        }

        let current = self.get(owner, id).await?;
        let status = current.status;
        let mut article = current.into_inner();

        if let Some(title) = patch.title {
            article.title = title;
        }
        if let Some(source) = patch.source {
            article.source = source;
        }
        if let Some(snippet) = patch.snippet {
            article.snippet = snippet;
        }
        if let Some(date) = patch.date {
            article.date = date;
        }
        if patch.url.is_some() {
            article.url = patch.url;
        }
        if patch.content.is_some() {
            article.content = patch.content;
        }
        if patch.author.is_some() {
            article.author = patch.author;
        }
        if let Some(tags) = patch.tags {
            article.tags = tags;
        }

        super::replace(&self.store, owner, status, article).await
    }

    pub async fn delete(&self, owner: &UserId, id: &str) -> StoreResult<Served<()>> {
        super::remove(&self.store, owner, KIND, id).await
    }

    /// Case-insensitive substring match over title and snippet.
    pub async fn search(&self, owner: &UserId, query: &str) -> StoreResult<Served<Vec<Article>>> {
        super::search(&self.store, owner, KIND, query).await
    }
}
