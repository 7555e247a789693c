//! In-memory search eligibility.
//!
//! Stores that cannot push search down to a database (the JSON fallback)
//! filter records with [`matches_query`]. The rule is a case-insensitive
//! substring match over the fields each kind exposes to search:
//!
//! | Kind | Fields |
//! |------|--------|
//! | Journal | title, content |
//! | Feed | title, description |
//! | Article | title, snippet |
//! | Document | name, content |
//!
//! Case folding is Unicode-aware and always done here, never in SQL. The
//! primary store persists [`folded_fields`] next to each row and matches the
//! query against those columns, so both paths agree on which records are
//! eligible. Ordering is not guaranteed to agree.

use crate::models::Entity;

/// Fields consulted by search for this record, in match order.
pub fn searchable_fields(entity: &Entity) -> [&str; 2] {
    match entity {
        Entity::Journal(j) => [j.title.as_str(), j.content.as_str()],
        Entity::Feed(f) => [f.title.as_str(), f.description.as_str()],
        Entity::Article(a) => [a.title.as_str(), a.snippet.as_str()],
        Entity::Document(d) => [d.name.as_str(), d.content.as_deref().unwrap_or("")],
    }
}

/// Lowercased copies of [`searchable_fields`], as the primary store persists
/// them for matching.
pub fn folded_fields(entity: &Entity) -> [String; 2] {
    searchable_fields(entity).map(str::to_lowercase)
}

/// Normalizes a raw query. Returns `None` for blank input.
pub fn normalize_query(query: &str) -> Option<String> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// `needle` must already be normalized with [`normalize_query`].
pub fn matches_query(entity: &Entity, needle: &str) -> bool {
    folded_fields(entity)
        .iter()
        .any(|field| field.contains(needle))
}
