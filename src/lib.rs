//! # ReadNest
//!
//! Storage backend for a reading and research assistant: journal entries,
//! RSS feed subscriptions, saved articles and uploaded documents.
//!
//! Every operation goes to a relational primary store first. When that store
//! is unreachable or too slow, the same operation runs against local JSON
//! files instead and the result is marked as degraded, so the service keeps
//! answering during an outage.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌─────────────┐   ┌──────────────┐
//! │   HTTP   │──▶│ Repositories │──▶│ HybridStore │──▶│  SqlStore    │ primary
//! │  (axum)  │   │ validation,  │   │  timeout +  │   └──────────────┘
//! └──────────┘   │ derived data │   │  fallback   │   ┌──────────────┐
//!                └──────────────┘   └─────────────┘──▶│ JsonFileStore│ fallback
//!                                                     └──────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Primary database connection |
//! | [`migrate`] | Primary schema migrations |
//! | [`sql_store`] | Primary store adapter |
//! | [`json_store`] | Fallback store adapter |
//! | [`hybrid`] | Primary-first coordinator with fallback |
//! | [`repository`] | Per-entity façades |
//! | [`auth`] | Bearer token authentication |
//! | [`server`] | HTTP API |
//! | [`check`] | Storage health report |
//!
//! Entity records, the `Store` trait and text helpers live in
//! [`readnest_core`].

pub mod auth;
pub mod check;
pub mod config;
pub mod db;
pub mod hybrid;
pub mod json_store;
pub mod migrate;
pub mod repository;
pub mod server;
pub mod sql_store;

pub use readnest_core;
