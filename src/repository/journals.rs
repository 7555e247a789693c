use chrono::Utc;
use serde::Deserialize;

use readnest_core::models::{EntityKind, Journal, ListFilter, UserId};
use readnest_core::text::{generate_id, keyword_frequencies, require_text, word_count};
use readnest_core::StoreResult;

use crate::hybrid::{HybridStore, Served};

const KIND: EntityKind = EntityKind::Journal;

/// Fields a client supplies when creating a journal entry.
#[derive(Debug, Clone, Deserialize)]
pub struct NewJournal {
    pub title: String,
    #[serde(default)]
    pub content: String,
}

/// Partial update. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JournalPatch {
    pub title: Option<String>,
    pub content: Option<String>,
}

#[derive(Clone)]
pub struct JournalRepository {
    store: HybridStore,
}

impl JournalRepository {
    pub fn new(store: HybridStore) -> Self {
        Self { store }
    }

    pub async fn create(&self, owner: &UserId, input: NewJournal) -> StoreResult<Served<Journal>> {
        require_text("title", &input.title)?;

        let now = Utc::now();
        let journal = Journal {
            id: generate_id(KIND, now),
            word_count: word_count(&input.content),
            keywords: keyword_frequencies(&input.content),
            title: input.title,
            content: input.content,
            created_at: now,
            updated_at: now,
            user_id: owner.clone(),
        };
        super::insert(&self.store, owner, journal).await
    }

    pub async fn get(&self, owner: &UserId, id: &str) -> StoreResult<Served<Journal>> {
        super::fetch(&self.store, owner, KIND, id).await
    }

    pub async fn list(&self, owner: &UserId) -> StoreResult<Served<Vec<Journal>>> {
        super::list(&self.store, owner, KIND, ListFilter::default()).await
    }

    /// Applies `patch`; `word_count` and `keywords` are recomputed whenever
    /// the content is replaced.
    pub async fn update(
        &self,
        owner: &UserId,
        id: &str,
        patch: JournalPatch,
    ) -> StoreResult<Served<Journal>> {
        if let Some(title) = &patch.title {
            require_text("title", title)?;
        }

        let current = self.get(owner, id).await?;
        let status = current.status;
        let mut journal = current.into_inner();

        if let Some(title) = patch.title {
            journal.title = title;
        }
        if let Some(content) = patch.content {
            journal.word_count = word_count(&content);
            journal.keywords = keyword_frequencies(&content);
            journal.content = content;
        }
        journal.updated_at = Utc::now();

        super::replace(&self.store, owner, status, journal).await
    }

    pub async fn delete(&self, owner: &UserId, id: &str) -> StoreResult<Served<()>> {
        super::remove(&self.store, owner, KIND, id).await
    }

    /// Case-insensitive substring match over title and content.
    pub async fn search(&self, owner: &UserId, query: &str) -> StoreResult<Served<Vec<Journal>>> {
        super::search(&self.store, owner, KIND, query).await
    }
}
