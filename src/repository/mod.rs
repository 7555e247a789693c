//! Entity repositories.
//!
//! One façade per entity kind, each exposing `create`, `get`, `list`,
//! `update`, `delete` and `search`. Repositories own everything the stores
//! must agree on: id generation, timestamps, derived fields and input
//! validation. A request that fails validation never reaches the
//! [`HybridStore`].
//!
//! Every method returns [`Served<T>`] so the caller can see whether the
//! fallback store answered.

mod articles;
mod documents;
mod feeds;
mod journals;

pub use articles::{ArticlePatch, ArticleRepository, NewArticle};
pub use documents::{DocumentPatch, DocumentRepository, NewDocument};
pub use feeds::{FeedPatch, FeedRepository, NewFeed};
pub use journals::{JournalPatch, JournalRepository, NewJournal};

use readnest_core::models::{Entity, EntityKind, ListFilter, UserId};
use readnest_core::search::normalize_query;
use readnest_core::store::{Operation, Output};
use readnest_core::text::validate_id;
use readnest_core::{StoreError, StoreResult};

use crate::hybrid::{HybridStore, Served, StoreStatus};

/// All four repositories over one coordinator.
#[derive(Clone)]
pub struct Repositories {
    pub journals: JournalRepository,
    pub feeds: FeedRepository,
    pub articles: ArticleRepository,
    pub documents: DocumentRepository,
}

impl Repositories {
    pub fn new(store: HybridStore) -> Self {
        Self {
            journals: JournalRepository::new(store.clone()),
            feeds: FeedRepository::new(store.clone()),
            articles: ArticleRepository::new(store.clone()),
            documents: DocumentRepository::new(store),
        }
    }
}

// Typed wrappers around `HybridStore::execute`, shared by the repositories.

async fn insert<T>(store: &HybridStore, owner: &UserId, record: T) -> StoreResult<Served<T>>
where
    T: Into<Entity> + TryFrom<Entity, Error = StoreError>,
{
    store
        .execute(owner, Operation::Insert(record.into()))
        .await?
        .try_map(|output| output.into_entity()?.try_into())
}

async fn fetch<T>(
    store: &HybridStore,
    owner: &UserId,
    kind: EntityKind,
    id: &str,
) -> StoreResult<Served<T>>
where
    T: TryFrom<Entity, Error = StoreError>,
{
    validate_id(id)?;
    store
        .execute(
            owner,
            Operation::Get {
                kind,
                id: id.to_string(),
            },
        )
        .await?
        .try_map(|output| output.into_entity()?.try_into())
}

async fn list<T>(
    store: &HybridStore,
    owner: &UserId,
    kind: EntityKind,
    filter: ListFilter,
) -> StoreResult<Served<Vec<T>>>
where
    T: TryFrom<Entity, Error = StoreError>,
{
    store
        .execute(owner, Operation::List { kind, filter })
        .await?
        .try_map(into_records)
}

/// Replaces a record read earlier in the same request. The result is
/// degraded if either the read or the write was.
async fn replace<T>(
    store: &HybridStore,
    owner: &UserId,
    read_status: StoreStatus,
    record: T,
) -> StoreResult<Served<T>>
where
    T: Into<Entity> + TryFrom<Entity, Error = StoreError>,
{
    Ok(store
        .execute(owner, Operation::Update(record.into()))
        .await?
        .try_map(|output| output.into_entity()?.try_into())?
        .combine(read_status))
}

async fn remove(
    store: &HybridStore,
    owner: &UserId,
    kind: EntityKind,
    id: &str,
) -> StoreResult<Served<()>> {
    validate_id(id)?;
    Ok(store
        .execute(
            owner,
            Operation::Delete {
                kind,
                id: id.to_string(),
            },
        )
        .await?
        .map(|_| ()))
}

async fn search<T>(
    store: &HybridStore,
    owner: &UserId,
    kind: EntityKind,
    query: &str,
) -> StoreResult<Served<Vec<T>>>
where
    T: TryFrom<Entity, Error = StoreError>,
{
    let query =
        normalize_query(query).ok_or_else(|| StoreError::invalid("query", "must not be empty"))?;
    store
        .execute(owner, Operation::Search { kind, query })
        .await?
        .try_map(into_records)
}

fn into_records<T>(output: Output) -> StoreResult<Vec<T>>
where
    T: TryFrom<Entity, Error = StoreError>,
{
    output
        .into_entities()?
        .into_iter()
        .map(T::try_from)
        .collect()
}
