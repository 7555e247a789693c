//! JSON-file [`Store`] implementation (the fallback store).
//!
//! Keeps one file per entity kind inside a directory:
//!
//! ```text
//! <dir>/journals.json
//! <dir>/feed_subscriptions.json
//! <dir>/articles.json
//! <dir>/documents.json
//! ```
//!
//! Each file holds `{"items": [ ...records... ]}` in insertion order, with
//! record fields identical to the primary table columns.
//!
//! # Write discipline
//!
//! Every write loads the whole collection, applies the mutation by id,
//! writes the result to `<file>.tmp`, fsyncs it and renames it over the
//! original. Readers therefore see either the old or the new file, never a
//! partial one, and take no lock.
//!
//! Writers are serialized per file through an async mutex looked up in a
//! process-wide registry keyed by the file's canonical path, so separate
//! `JsonFileStore` values over the same directory share one lock per file
//! even when opened through `..` components or symlinks.
//! Deleting a feed locks the feeds file and then the articles file; no other
//! operation holds two locks.
//!
//! # Corruption
//!
//! A file that does not parse is reported as
//! [`StoreError::LocalStoreCorrupt`] by [`JsonFileStore::load`]. Store
//! operations log the loss and continue with an empty collection; the next
//! write replaces the corrupt file.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error};

use readnest_core::models::{Entity, EntityKind, ListFilter, UserId};
use readnest_core::search::matches_query;
use readnest_core::store::Store;
use readnest_core::{StoreError, StoreResult};

type WriteLock = Arc<tokio::sync::Mutex<()>>;

static WRITE_LOCKS: OnceLock<Mutex<HashMap<PathBuf, WriteLock>>> = OnceLock::new();

fn write_lock(path: &Path) -> WriteLock {
    let registry = WRITE_LOCKS.get_or_init(Default::default);
    let mut locks = registry.lock().unwrap_or_else(PoisonError::into_inner);
    locks.entry(path.to_path_buf()).or_default().clone()
}

/// On-disk shape of one collection file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CollectionFile {
    #[serde(default)]
    items: Vec<serde_json::Value>,
}

/// Fallback store over a directory of JSON files.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// The directory is created lazily on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let dir = std::path::absolute(&dir).unwrap_or(dir);
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn collection_path(&self, kind: EntityKind) -> PathBuf {
        self.dir.join(format!("{}.json", kind.collection()))
    }

    /// Reads a whole collection. A missing file is an empty collection; an
    /// unparsable one is `LocalStoreCorrupt`.
    pub async fn load(&self, kind: EntityKind) -> StoreResult<Vec<Entity>> {
        let path = self.collection_path(kind);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let file: CollectionFile =
            serde_json::from_slice(&bytes).map_err(|err| corrupt(&path, err))?;

        file.items
            .into_iter()
            .map(|record| Entity::from_record(kind, record).map_err(|err| corrupt(&path, err)))
            .collect()
    }

    async fn load_or_empty(&self, kind: EntityKind) -> StoreResult<Vec<Entity>> {
        match self.load(kind).await {
            Err(StoreError::LocalStoreCorrupt { path, reason }) => {
                error!(
                    path = %path.display(),
                    %reason,
                    "fallback collection is corrupt; treating it as empty, its records are lost"
                );
                Ok(Vec::new())
            }
            other => other,
        }
    }

    async fn save(&self, kind: EntityKind, entities: &[Entity]) -> StoreResult<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let items = entities
            .iter()
            .map(Entity::to_record)
            .collect::<serde_json::Result<Vec<_>>>()
            .map_err(|err| StoreError::Internal(err.to_string()))?;
        let bytes = serde_json::to_vec_pretty(&CollectionFile { items })
            .map_err(|err| StoreError::Internal(err.to_string()))?;

        let path = self.collection_path(kind);
        let tmp = path.with_extension("json.tmp");

        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        debug!(path = %path.display(), records = entities.len(), "fallback collection saved");
        Ok(())
    }

    /// Writer lock for one collection file. Creates the directory so it can
    /// be canonicalized.
    async fn writer_lock(&self, kind: EntityKind) -> StoreResult<WriteLock> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let dir = tokio::fs::canonicalize(&self.dir).await?;
        Ok(write_lock(&dir.join(format!("{}.json", kind.collection()))))
    }

    /// Load-modify-save under the file's writer lock.
    async fn mutate<T, F>(&self, kind: EntityKind, apply: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Vec<Entity>) -> StoreResult<T> + Send,
        T: Send,
    {
        let lock = self.writer_lock(kind).await?;
        let _guard = lock.lock().await;

        let mut entities = self.load_or_empty(kind).await?;
        let output = apply(&mut entities)?;
        self.save(kind, &entities).await?;
        Ok(output)
    }
}

fn corrupt(path: &Path, err: serde_json::Error) -> StoreError {
    StoreError::LocalStoreCorrupt {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}

/// Index of `id`, provided it belongs to `owner`.
fn position_owned(
    entities: &[Entity],
    owner: &UserId,
    kind: EntityKind,
    id: &str,
) -> StoreResult<usize> {
    let index = entities
        .iter()
        .position(|entity| entity.id() == id)
        .ok_or_else(|| StoreError::not_found(kind, id))?;
    if entities[index].owner() != owner {
        return Err(StoreError::denied(kind, id));
    }
    Ok(index)
}

/// Feed urls are unique per owner.
fn check_feed_url(entities: &[Entity], candidate: &Entity) -> StoreResult<()> {
    let Entity::Feed(feed) = candidate else {
        return Ok(());
    };
    let taken = entities.iter().any(|existing| match existing {
        Entity::Feed(other) => {
            other.id != feed.id && other.user_id == feed.user_id && other.url == feed.url
        }
        _ => false,
    });
    if taken {
        return Err(StoreError::Conflict(format!(
            "feed url already subscribed: {}",
            feed.url
        )));
    }
    Ok(())
}

fn in_feed(entity: &Entity, feed_id: &str) -> bool {
    matches!(entity, Entity::Article(article) if article.feed_id.as_deref() == Some(feed_id))
}

#[async_trait]
impl Store for JsonFileStore {
    fn name(&self) -> &'static str {
        "fallback"
    }

    /// Usable when the directory, or the nearest existing ancestor it would
    /// be created under, is a writable directory. Touches nothing on disk.
    async fn ping(&self) -> StoreResult<()> {
        let mut candidate = self.dir.as_path();
        loop {
            match tokio::fs::metadata(candidate).await {
                Ok(meta) if meta.is_dir() && !meta.permissions().readonly() => return Ok(()),
                Ok(_) => {
                    return Err(StoreError::Transient(format!(
                        "{} is not a writable directory",
                        candidate.display()
                    )))
                }
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    candidate = candidate.parent().ok_or_else(|| {
                        StoreError::Transient(format!(
                            "no existing ancestor of {}",
                            self.dir.display()
                        ))
                    })?;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn insert(&self, owner: &UserId, entity: &Entity) -> StoreResult<Entity> {
        let kind = entity.kind();
        if entity.owner() != owner {
            return Err(StoreError::denied(kind, entity.id()));
        }

        self.mutate(kind, |entities| {
            if entities.iter().any(|existing| existing.id() == entity.id()) {
                return Err(StoreError::Conflict(format!(
                    "{kind} id already exists: {}",
                    entity.id()
                )));
            }
            check_feed_url(entities, entity)?;
            entities.push(entity.clone());
            Ok(entity.clone())
        })
        .await
    }

    async fn get(&self, owner: &UserId, kind: EntityKind, id: &str) -> StoreResult<Entity> {
        let entities = self.load_or_empty(kind).await?;
        let index = position_owned(&entities, owner, kind, id)?;
        Ok(entities[index].clone())
    }

    async fn list(
        &self,
        owner: &UserId,
        kind: EntityKind,
        filter: &ListFilter,
    ) -> StoreResult<Vec<Entity>> {
        let entities = self.load_or_empty(kind).await?;
        Ok(entities
            .into_iter()
            .filter(|entity| entity.owner() == owner)
            .filter(|entity| match (kind, filter.feed_id.as_deref()) {
                (EntityKind::Article, Some(feed_id)) => in_feed(entity, feed_id),
                _ => true,
            })
            .collect())
    }

    async fn update(&self, owner: &UserId, entity: &Entity) -> StoreResult<Entity> {
        let kind = entity.kind();
        if entity.owner() != owner {
            return Err(StoreError::denied(kind, entity.id()));
        }

        self.mutate(kind, |entities| {
            let index = position_owned(entities, owner, kind, entity.id())?;
            check_feed_url(entities, entity)?;
            entities[index] = entity.clone();
            Ok(entity.clone())
        })
        .await
    }

    async fn delete(&self, owner: &UserId, kind: EntityKind, id: &str) -> StoreResult<()> {
        if kind != EntityKind::Feed {
            return self
                .mutate(kind, |entities| {
                    let index = position_owned(entities, owner, kind, id)?;
                    entities.remove(index);
                    Ok(())
                })
                .await;
        }

        let feeds_lock = self.writer_lock(EntityKind::Feed).await?;
        let _feeds_guard = feeds_lock.lock().await;

        let mut feeds = self.load_or_empty(EntityKind::Feed).await?;
        let index = position_owned(&feeds, owner, kind, id)?;
        feeds.remove(index);

        self.mutate(EntityKind::Article, |articles| {
            articles.retain(|article| !(article.owner() == owner && in_feed(article, id)));
            Ok(())
        })
        .await?;

        self.save(EntityKind::Feed, &feeds).await
    }

    async fn search(
        &self,
        owner: &UserId,
        kind: EntityKind,
        query: &str,
    ) -> StoreResult<Vec<Entity>> {
        let entities = self.load_or_empty(kind).await?;
        Ok(entities
            .into_iter()
            .filter(|entity| entity.owner() == owner && matches_query(entity, query))
            .collect())
    }
}
