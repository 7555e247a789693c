//! Storage abstraction for ReadNest.
//!
//! The [`Store`] trait defines every persistence operation the entity
//! repositories need. Two backends implement it in the `readnest` crate: a
//! relational store (the system of record) and a JSON-file store used when
//! the relational store is unreachable. The hybrid coordinator drives both
//! through [`Operation`] values so one logical operation can be replayed
//! against a second store verbatim.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};
use crate::models::{Entity, EntityKind, ListFilter, UserId};

/// Abstract storage backend.
///
/// Every method is scoped to `owner`: records belonging to another user are
/// never returned by `list`/`search`, and addressing one by id fails with
/// [`StoreError::AuthorizationDenied`].
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`insert`](Store::insert) | Persist a fully-populated new record |
/// | [`get`](Store::get) | Fetch one record by id |
/// | [`list`](Store::list) | All of the owner's records of a kind |
/// | [`update`](Store::update) | Replace a record by id |
/// | [`delete`](Store::delete) | Remove a record (feeds cascade to articles) |
/// | [`search`](Store::search) | Case-insensitive substring search |
#[async_trait]
pub trait Store: Send + Sync {
    /// Short label used in log events.
    fn name(&self) -> &'static str;

    /// Cheap reachability check. Used for health reporting only; it never
    /// influences how operations are routed.
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn insert(&self, owner: &UserId, entity: &Entity) -> StoreResult<Entity>;

    async fn get(&self, owner: &UserId, kind: EntityKind, id: &str) -> StoreResult<Entity>;

    async fn list(
        &self,
        owner: &UserId,
        kind: EntityKind,
        filter: &ListFilter,
    ) -> StoreResult<Vec<Entity>>;

    async fn update(&self, owner: &UserId, entity: &Entity) -> StoreResult<Entity>;

    /// Deleting a feed subscription also deletes the owner's articles whose
    /// `feed_id` references it.
    async fn delete(&self, owner: &UserId, kind: EntityKind, id: &str) -> StoreResult<()>;

    /// `query` is already normalized (trimmed, lowercased, non-empty).
    async fn search(
        &self,
        owner: &UserId,
        kind: EntityKind,
        query: &str,
    ) -> StoreResult<Vec<Entity>>;
}

/// One logical storage operation, replayable against any [`Store`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Insert(Entity),
    Get { kind: EntityKind, id: String },
    List { kind: EntityKind, filter: ListFilter },
    Update(Entity),
    Delete { kind: EntityKind, id: String },
    Search { kind: EntityKind, query: String },
}

impl Operation {
    pub fn kind(&self) -> EntityKind {
        match self {
            Operation::Insert(entity) | Operation::Update(entity) => entity.kind(),
            Operation::Get { kind, .. }
            | Operation::List { kind, .. }
            | Operation::Delete { kind, .. }
            | Operation::Search { kind, .. } => *kind,
        }
    }

    /// Verb used in log events.
    pub fn verb(&self) -> &'static str {
        match self {
            Operation::Insert(_) => "insert",
            Operation::Get { .. } => "get",
            Operation::List { .. } => "list",
            Operation::Update(_) => "update",
            Operation::Delete { .. } => "delete",
            Operation::Search { .. } => "search",
        }
    }
}

/// Result payload of an [`Operation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    Entity(Entity),
    Entities(Vec<Entity>),
    Deleted,
}

impl Output {
    pub fn into_entity(self) -> StoreResult<Entity> {
        match self {
            Output::Entity(entity) => Ok(entity),
            other => Err(StoreError::Internal(format!(
                "expected a single record, got {other:?}"
            ))),
        }
    }

    pub fn into_entities(self) -> StoreResult<Vec<Entity>> {
        match self {
            Output::Entities(entities) => Ok(entities),
            other => Err(StoreError::Internal(format!(
                "expected a record list, got {other:?}"
            ))),
        }
    }
}

/// Runs `op` against `store`.
pub async fn dispatch(store: &dyn Store, owner: &UserId, op: &Operation) -> StoreResult<Output> {
    match op {
        Operation::Insert(entity) => store.insert(owner, entity).await.map(Output::Entity),
        Operation::Get { kind, id } => store.get(owner, *kind, id).await.map(Output::Entity),
        Operation::List { kind, filter } => {
            store.list(owner, *kind, filter).await.map(Output::Entities)
        }
        Operation::Update(entity) => store.update(owner, entity).await.map(Output::Entity),
        Operation::Delete { kind, id } => {
            store.delete(owner, *kind, id).await.map(|()| Output::Deleted)
        }
        Operation::Search { kind, query } => {
            store.search(owner, *kind, query).await.map(Output::Entities)
        }
    }
}
