use chrono::Utc;
use serde::Deserialize;

use readnest_core::models::{EntityKind, FeedSubscription, ListFilter, UserId};
use readnest_core::text::{generate_id, require_text};
use readnest_core::StoreResult;

use crate::hybrid::{HybridStore, Served};

const KIND: EntityKind = EntityKind::Feed;

#[derive(Debug, Clone, Deserialize)]
pub struct NewFeed {
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "active_by_default")]
    pub is_active: bool,
}

fn active_by_default() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedPatch {
    pub url: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Clone)]
pub struct FeedRepository {
    store: HybridStore,
}

impl FeedRepository {
    pub fn new(store: HybridStore) -> Self {
        Self { store }
    }

    /// Subscribes `owner` to a feed. A url the owner already follows is a
    /// `Conflict`.
    pub async fn create(
        &self,
        owner: &UserId,
        input: NewFeed,
    ) -> StoreResult<Served<FeedSubscription>> {
        require_text("url", &input.url)?;
        require_text("title", &input.title)?;

        let now = Utc::now();
        let feed = FeedSubscription {
            id: generate_id(KIND, now),
            url: input.url.trim().to_string(),
            title: input.title,
            description: input.description,
            last_updated: now,
            is_active: input.is_active,
            user_id: owner.clone(),
        };
        super::insert(&self.store, owner, feed).await
    }

    pub async fn get(&self, owner: &UserId, id: &str) -> StoreResult<Served<FeedSubscription>> {
        super::fetch(&self.store, owner, KIND, id).await
    }

    pub async fn list(&self, owner: &UserId) -> StoreResult<Served<Vec<FeedSubscription>>> {
        super::list(&self.store, owner, KIND, ListFilter::default()).await
    }

    pub async fn update(
        &self,
        owner: &UserId,
        id: &str,
        patch: FeedPatch,
    ) -> StoreResult<Served<FeedSubscription>> {
        if let Some(url) = &patch.url {
            require_text("url", url)?;
        }
        if let Some(title) = &patch.title {
            require_text("title", title)?;
        }

        let current = self.get(owner, id).await?;
        let status = current.status;
        let mut feed = current.into_inner();

        if let Some(url) = patch.url {
            feed.url = url.trim().to_string();
        }
        if let Some(title) = patch.title {
            feed.title = title;
        }
        if let Some(description) = patch.description {
            feed.description = description;
        }
        if let Some(is_active) = patch.is_active {
            feed.is_active = is_active;
        }
        feed.last_updated = Utc::now();

        super::replace(&self.store, owner, status, feed).await
    }

    /// Unsubscribes and deletes every article of the feed.
    pub async fn delete(&self, owner: &UserId, id: &str) -> StoreResult<Served<()>> {
        super::remove(&self.store, owner, KIND, id).await
    }

    /// Case-insensitive substring match over title and description.
    pub async fn search(
        &self,
        owner: &UserId,
        query: &str,
    ) -> StoreResult<Served<Vec<FeedSubscription>>> {
        super::search(&self.store, owner, KIND, query).await
    }
}
