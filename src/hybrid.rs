//! Hybrid storage coordinator.
//!
//! [`HybridStore`] runs every [`Operation`] against the primary store first,
//! bounded by a timeout. A transient failure (including the timeout) sends
//! the same operation to the fallback store, and the result is tagged
//! [`StoreStatus::Degraded`]. Primary answers such as `NotFound` or
//! `Conflict` are returned as they are.
//!
//! There is no process-wide mode flag: each call decides independently and
//! carries its own tag, so a recovered primary is used again on the very
//! next call. Records written to the fallback while the primary was down are
//! not copied back.

use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use tracing::{debug, error, warn};

use readnest_core::models::UserId;
use readnest_core::store::{dispatch, Operation, Output, Store};
use readnest_core::{StoreError, StoreResult};

use crate::config::Config;
use crate::json_store::JsonFileStore;
use crate::sql_store::SqlStore;

/// Which store produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreStatus {
    Ok,
    Degraded,
}

/// A value together with the status of the store that served it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Served<T> {
    pub value: T,
    pub status: StoreStatus,
}

impl<T> Served<T> {
    pub fn ok(value: T) -> Self {
        Self {
            value,
            status: StoreStatus::Ok,
        }
    }

    pub fn degraded(value: T) -> Self {
        Self {
            value,
            status: StoreStatus::Degraded,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.status == StoreStatus::Degraded
    }

    /// Marks the result degraded if an earlier step of the same request was.
    pub fn combine(mut self, earlier: StoreStatus) -> Self {
        if earlier == StoreStatus::Degraded {
            self.status = StoreStatus::Degraded;
        }
        self
    }

    pub fn into_inner(self) -> T {
        self.value
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Served<U> {
        Served {
            value: f(self.value),
            status: self.status,
        }
    }

    /// Like [`map`](Self::map) for conversions that can fail.
    pub fn try_map<U>(self, f: impl FnOnce(T) -> StoreResult<U>) -> StoreResult<Served<U>> {
        Ok(Served {
            value: f(self.value)?,
            status: self.status,
        })
    }
}

/// Primary-first store with a fallback for transient failures.
#[derive(Clone)]
pub struct HybridStore {
    primary: Arc<dyn Store>,
    fallback: Arc<dyn Store>,
    timeout: Duration,
}

impl HybridStore {
    pub fn new(primary: Arc<dyn Store>, fallback: Arc<dyn Store>, timeout: Duration) -> Self {
        Self {
            primary,
            fallback,
            timeout,
        }
    }

    /// Builds the configured pair: a [`SqlStore`] over `pool` and a
    /// [`JsonFileStore`] over `[fallback].dir`.
    pub fn from_config(config: &Config, pool: SqlitePool) -> Self {
        Self::new(
            Arc::new(SqlStore::new(pool)),
            Arc::new(JsonFileStore::new(&config.fallback.dir)),
            config.db.timeout(),
        )
    }

    /// Runs `op` for `owner`, falling back when the primary is unreachable.
    pub async fn execute(&self, owner: &UserId, op: Operation) -> StoreResult<Served<Output>> {
        let primary_err = match self.run_primary(owner, &op).await {
            Ok(output) => return Ok(Served::ok(output)),
            Err(err) if err.is_transient() => err,
            Err(err) => return Err(err),
        };

        warn!(
            op = op.verb(),
            kind = %op.kind(),
            user = %owner,
            error = %primary_err,
            "primary store unavailable; using fallback store"
        );

        match dispatch(self.fallback.as_ref(), owner, &op).await {
            Ok(output) => {
                debug!(op = op.verb(), kind = %op.kind(), "served in degraded mode");
                Ok(Served::degraded(output))
            }
            Err(err) if err.is_answer() => Err(err),
            Err(fallback_err) => {
                error!(
                    op = op.verb(),
                    kind = %op.kind(),
                    primary = %primary_err,
                    fallback = %fallback_err,
                    "both stores failed"
                );
                Err(StoreError::StorageUnavailable {
                    primary: primary_err.to_string(),
                    fallback: fallback_err.to_string(),
                })
            }
        }
    }

    async fn run_primary(&self, owner: &UserId, op: &Operation) -> StoreResult<Output> {
        match tokio::time::timeout(self.timeout, dispatch(self.primary.as_ref(), owner, op)).await
        {
            Ok(result) => result,
            Err(_) => Err(StoreError::Transient(format!(
                "{} {} timed out after {:?}",
                self.primary.name(),
                op.verb(),
                self.timeout
            ))),
        }
    }

    /// Whether the primary store currently answers. Routing is unaffected.
    pub async fn probe(&self) -> StoreResult<()> {
        match tokio::time::timeout(self.timeout, self.primary.ping()).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Transient(format!(
                "{} ping timed out after {:?}",
                self.primary.name(),
                self.timeout
            ))),
        }
    }

    /// Whether the fallback store could accept a write. Read-only.
    pub async fn probe_fallback(&self) -> StoreResult<()> {
        self.fallback.ping().await
    }
}
