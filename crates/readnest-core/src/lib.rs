//! # ReadNest Core
//!
//! Runtime-agnostic logic for ReadNest: entity models, derived journal
//! fields, the [`store::Store`] trait and in-memory search matching.
//!
//! This crate contains no tokio, sqlx, or filesystem I/O. Storage backends,
//! the hybrid coordinator and the HTTP surface live in the `readnest` crate.

pub mod error;
pub mod models;
pub mod search;
pub mod store;
pub mod text;

pub use error::{StoreError, StoreResult};
