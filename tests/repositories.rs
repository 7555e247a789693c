//! Entity repositories over the hybrid coordinator, on both storage paths.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use readnest::config::Config;
use readnest::hybrid::HybridStore;
use readnest::repository::{
    ArticlePatch, DocumentPatch, FeedPatch, JournalPatch, NewArticle, NewDocument, NewFeed,
    NewJournal, Repositories,
};
use readnest::json_store::JsonFileStore;
use readnest::sql_store::SqlStore;
use readnest::{db, migrate};
use readnest_core::models::{
    ArticleType, DocumentStatus, DocumentType, Entity, EntityKind, ListFilter, UserId,
};
use readnest_core::store::Store;
use readnest_core::{StoreError, StoreResult};

// ─── Helpers ────────────────────────────────────────────────────────

fn test_config(root: &Path) -> Config {
    let config_content = format!(
        r#"
[db]
path = "{}"
timeout_ms = 500

[fallback]
dir = "{}"

[server]
bind = "127.0.0.1:0"
"#,
        root.join("readnest.sqlite").display(),
        root.join("fallback").display()
    );
    toml::from_str(&config_content).unwrap()
}

/// Repositories over a working primary (`primary_up`) or a closed one.
async fn repos(tmp: &TempDir, primary_up: bool) -> Repositories {
    let cfg = test_config(tmp.path());
    let pool = db::connect(&cfg).await.unwrap();
    migrate::apply(&pool).await.unwrap();
    if !primary_up {
        pool.close().await;
    }
    Repositories::new(HybridStore::from_config(&cfg, pool))
}

/// Primary whose single-record reads always fail transiently; every other
/// operation reaches SQLite.
struct ReadsFail(SqlStore);

#[async_trait]
impl Store for ReadsFail {
    fn name(&self) -> &'static str {
        "reads-fail"
    }

    async fn insert(&self, owner: &UserId, entity: &Entity) -> StoreResult<Entity> {
        self.0.insert(owner, entity).await
    }

    async fn get(&self, _: &UserId, _: EntityKind, _: &str) -> StoreResult<Entity> {
        Err(StoreError::Transient("read refused".into()))
    }

    async fn list(
        &self,
        owner: &UserId,
        kind: EntityKind,
        filter: &ListFilter,
    ) -> StoreResult<Vec<Entity>> {
        self.0.list(owner, kind, filter).await
    }

    async fn update(&self, owner: &UserId, entity: &Entity) -> StoreResult<Entity> {
        self.0.update(owner, entity).await
    }

    async fn delete(&self, owner: &UserId, kind: EntityKind, id: &str) -> StoreResult<()> {
        self.0.delete(owner, kind, id).await
    }

    async fn search(
        &self,
        owner: &UserId,
        kind: EntityKind,
        query: &str,
    ) -> StoreResult<Vec<Entity>> {
        self.0.search(owner, kind, query).await
    }
}

fn new_journal(title: &str, content: &str) -> NewJournal {
    NewJournal {
        title: title.to_string(),
        content: content.to_string(),
    }
}

fn new_feed(url: &str) -> NewFeed {
    NewFeed {
        url: url.to_string(),
        title: "Example feed".to_string(),
        description: "news".to_string(),
        is_active: true,
    }
}

fn new_article(title: &str, feed_id: Option<&str>) -> NewArticle {
    NewArticle {
        title: title.to_string(),
        source: "Example".to_string(),
        snippet: "a short snippet".to_string(),
        date: None,
        kind: ArticleType::Rss,
        url: Some("https://example.com/a".to_string()),
        feed_id: feed_id.map(str::to_string),
        content: None,
        author: Some("Ada".to_string()),
        tags: ["rust".to_string()].into(),
    }
}

fn new_document(name: &str) -> NewDocument {
    NewDocument {
        name: name.to_string(),
        kind: DocumentType::Pdf,
        size: 2048,
        content: Some("extracted text about lifetimes".to_string()),
        status: DocumentStatus::Uploading,
    }
}

// ─── Journals ───────────────────────────────────────────────────────

#[tokio::test]
async fn journal_create_derives_word_count_and_keywords() {
    for primary_up in [true, false] {
        let tmp = TempDir::new().unwrap();
        let repos = repos(&tmp, primary_up).await;
        let owner = UserId::new("alice");

        let created = repos
            .journals
            .create(&owner, new_journal("Cats", "the cat sat on the mat"))
            .await
            .unwrap();
        assert_eq!(created.is_degraded(), !primary_up);

        let journal = created.into_inner();
        assert!(journal.id.starts_with("j_"));
        assert_eq!(journal.word_count, 6);
        assert_eq!(journal.keywords.len(), 3);
        for word in ["cat", "sat", "mat"] {
            assert_eq!(journal.keywords[word], 1);
        }

        let fetched = repos.journals.get(&owner, &journal.id).await.unwrap();
        assert_eq!(fetched.into_inner(), journal);
    }
}

#[tokio::test]
async fn journal_update_recomputes_derived_fields() {
    for primary_up in [true, false] {
        let tmp = TempDir::new().unwrap();
        let repos = repos(&tmp, primary_up).await;
        let owner = UserId::new("alice");

        let journal = repos
            .journals
            .create(&owner, new_journal("Day", "rain rain"))
            .await
            .unwrap()
            .into_inner();

        let retitled = repos
            .journals
            .update(
                &owner,
                &journal.id,
                JournalPatch {
                    title: Some("Rainy day".into()),
                    content: None,
                },
            )
            .await
            .unwrap()
            .into_inner();
        assert_eq!(retitled.word_count, 2);
        assert_eq!(retitled.keywords["rain"], 2);
        assert_eq!(retitled.created_at, journal.created_at);

        let rewritten = repos
            .journals
            .update(
                &owner,
                &journal.id,
                JournalPatch {
                    title: None,
                    content: Some("Sunshine and a long walk".into()),
                },
            )
            .await
            .unwrap()
            .into_inner();
        assert_eq!(rewritten.title, "Rainy day");
        assert_eq!(rewritten.word_count, 5);
        assert!(!rewritten.keywords.contains_key("rain"));
        assert_eq!(rewritten.keywords["sunshine"], 1);
        assert!(rewritten.updated_at >= retitled.updated_at);

        let stored = repos.journals.get(&owner, &journal.id).await.unwrap();
        assert_eq!(stored.into_inner(), rewritten);
    }
}

#[tokio::test]
async fn journal_search_and_delete() {
    for primary_up in [true, false] {
        let tmp = TempDir::new().unwrap();
        let repos = repos(&tmp, primary_up).await;
        let owner = UserId::new("alice");

        let rust = repos
            .journals
            .create(&owner, new_journal("Learning Rust", "borrowing"))
            .await
            .unwrap()
            .into_inner();
        repos
            .journals
            .create(&owner, new_journal("Cooking", "pasta"))
            .await
            .unwrap();

        let found = repos.journals.search(&owner, "  RUST ").await.unwrap();
        assert_eq!(found.into_inner(), vec![rust.clone()]);

        repos.journals.delete(&owner, &rust.id).await.unwrap();
        let err = repos.journals.get(&owner, &rust.id).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
        assert_eq!(repos.journals.list(&owner).await.unwrap().value.len(), 1);
    }
}

#[tokio::test]
async fn search_folds_case_beyond_ascii_on_both_paths() {
    for primary_up in [true, false] {
        let tmp = TempDir::new().unwrap();
        let repos = repos(&tmp, primary_up).await;
        let owner = UserId::new("alice");

        let journal = repos
            .journals
            .create(&owner, new_journal("Über Rust", "Élan vital"))
            .await
            .unwrap()
            .into_inner();

        for query in ["über", "ÜBER", "élan", "VITAL"] {
            let found = repos.journals.search(&owner, query).await.unwrap();
            assert_eq!(
                found.into_inner(),
                vec![journal.clone()],
                "query {query:?} with primary_up = {primary_up}"
            );
        }

        let updated = repos
            .journals
            .update(
                &owner,
                &journal.id,
                JournalPatch {
                    content: Some("Ärger im Straßenverkehr".into()),
                    ..JournalPatch::default()
                },
            )
            .await
            .unwrap()
            .into_inner();
        let found = repos.journals.search(&owner, "ärger").await.unwrap();
        assert_eq!(found.into_inner(), vec![updated]);
        let found = repos.journals.search(&owner, "élan").await.unwrap();
        assert!(found.into_inner().is_empty());
    }
}

#[tokio::test]
async fn migration_backfills_search_columns_on_existing_rows() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(tmp.path());
    let pool = db::connect(&cfg).await.unwrap();

    sqlx::query(
        r#"
        CREATE TABLE journals (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            word_count INTEGER NOT NULL DEFAULT 0,
            keywords TEXT NOT NULL DEFAULT '{}'
        )
        "#,
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO journals VALUES ('j_1700000000_0a1b2c3d', 'alice', 'Émile', \
         'notes', '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z', 1, '{}')",
    )
    .execute(&pool)
    .await
    .unwrap();

    migrate::apply(&pool).await.unwrap();
    migrate::apply(&pool).await.unwrap();

    let repos = Repositories::new(HybridStore::from_config(&cfg, pool));
    let found = repos
        .journals
        .search(&UserId::new("alice"), "émile")
        .await
        .unwrap();
    assert!(!found.is_degraded());
    let ids: Vec<_> = found.into_inner().into_iter().map(|j| j.id).collect();
    assert_eq!(ids, vec!["j_1700000000_0a1b2c3d".to_string()]);
}

#[tokio::test]
async fn validation_fails_before_any_store_is_touched() {
    let tmp = TempDir::new().unwrap();
    let repos = repos(&tmp, false).await;
    let owner = UserId::new("alice");

    let err = repos
        .journals
        .create(&owner, new_journal("   ", "body"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Invalid { field: "title", .. }));

    let err = repos.journals.search(&owner, "   ").await.unwrap_err();
    assert!(matches!(err, StoreError::Invalid { field: "query", .. }));

    let err = repos.journals.get(&owner, "../etc/passwd").await.unwrap_err();
    assert!(matches!(err, StoreError::Invalid { field: "id", .. }));

    let err = repos
        .feeds
        .create(&owner, new_feed(""))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Invalid { field: "url", .. }));

    // Nothing reached the fallback either.
    assert!(!tmp.path().join("fallback").exists());
}

#[tokio::test]
async fn cross_user_access_is_denied() {
    for primary_up in [true, false] {
        let tmp = TempDir::new().unwrap();
        let repos = repos(&tmp, primary_up).await;
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");

        let journal = repos
            .journals
            .create(&alice, new_journal("Mine", "secret"))
            .await
            .unwrap()
            .into_inner();

        let err = repos.journals.get(&bob, &journal.id).await.unwrap_err();
        assert!(matches!(err, StoreError::AuthorizationDenied { .. }));

        let err = repos
            .journals
            .update(&bob, &journal.id, JournalPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AuthorizationDenied { .. }));

        let err = repos.journals.delete(&bob, &journal.id).await.unwrap_err();
        assert!(matches!(err, StoreError::AuthorizationDenied { .. }));

        assert!(repos.journals.list(&bob).await.unwrap().value.is_empty());
        assert!(repos
            .journals
            .search(&bob, "secret")
            .await
            .unwrap()
            .value
            .is_empty());
    }
}

// ─── Feeds and articles ─────────────────────────────────────────────

#[tokio::test]
async fn feed_delete_cascades_to_articles() {
    for primary_up in [true, false] {
        let tmp = TempDir::new().unwrap();
        let repos = repos(&tmp, primary_up).await;
        let owner = UserId::new("alice");

        let feed = repos
            .feeds
            .create(&owner, new_feed("https://example.com/rss"))
            .await
            .unwrap()
            .into_inner();
        for title in ["one", "two"] {
            repos
                .articles
                .create(&owner, new_article(title, Some(&feed.id)))
                .await
                .unwrap();
        }
        let standalone = repos
            .articles
            .create(&owner, new_article("standalone", None))
            .await
            .unwrap()
            .into_inner();

        let in_feed = repos.articles.list_for_feed(&owner, &feed.id).await.unwrap();
        assert_eq!(in_feed.value.len(), 2);

        repos.feeds.delete(&owner, &feed.id).await.unwrap();

        let in_feed = repos.articles.list_for_feed(&owner, &feed.id).await.unwrap();
        assert!(in_feed.value.is_empty());
        assert_eq!(
            repos.articles.list(&owner).await.unwrap().into_inner(),
            vec![standalone]
        );
    }
}

#[tokio::test]
async fn feed_rules() {
    for primary_up in [true, false] {
        let tmp = TempDir::new().unwrap();
        let repos = repos(&tmp, primary_up).await;
        let owner = UserId::new("alice");

        let feed = repos
            .feeds
            .create(&owner, new_feed("https://example.com/rss"))
            .await
            .unwrap()
            .into_inner();
        assert!(feed.id.starts_with("feed_"));
        assert!(feed.is_active);

        let err = repos
            .feeds
            .create(&owner, new_feed("https://example.com/rss"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let paused = repos
            .feeds
            .update(
                &owner,
                &feed.id,
                FeedPatch {
                    is_active: Some(false),
                    ..FeedPatch::default()
                },
            )
            .await
            .unwrap()
            .into_inner();
        assert!(!paused.is_active);
        assert_eq!(paused.url, feed.url);

        let found = repos.feeds.search(&owner, "NEWS").await.unwrap();
        assert_eq!(found.into_inner(), vec![paused]);
    }
}

#[tokio::test]
async fn article_defaults_and_update() {
    for primary_up in [true, false] {
        let tmp = TempDir::new().unwrap();
        let repos = repos(&tmp, primary_up).await;
        let owner = UserId::new("alice");

        let article = repos
            .articles
            .create(&owner, new_article("Async Rust", None))
            .await
            .unwrap()
            .into_inner();
        assert!(article.id.starts_with("article_"));
        assert_eq!(article.date, chrono::Utc::now().date_naive());

        let updated = repos
            .articles
            .update(
                &owner,
                &article.id,
                ArticlePatch {
                    snippet: Some("executors and wakers".into()),
                    tags: Some(["async".to_string(), "rust".to_string()].into()),
                    ..ArticlePatch::default()
                },
            )
            .await
            .unwrap()
            .into_inner();
        assert_eq!(updated.title, "Async Rust");
        assert_eq!(updated.tags.len(), 2);

        let found = repos.articles.search(&owner, "wakers").await.unwrap();
        assert_eq!(found.into_inner(), vec![updated]);
    }
}

#[tokio::test]
async fn article_create_is_degraded_when_feed_lookup_fell_back() {
    let tmp = TempDir::new().unwrap();
    let owner = UserId::new("alice");

    // The feed only exists in the fallback files.
    let offline = repos(&tmp, false).await;
    let feed = offline
        .feeds
        .create(&owner, new_feed("https://example.com/rss"))
        .await
        .unwrap()
        .into_inner();

    let cfg = test_config(tmp.path());
    let pool = db::connect(&cfg).await.unwrap();
    let store = HybridStore::new(
        Arc::new(ReadsFail(SqlStore::new(pool.clone()))),
        Arc::new(JsonFileStore::new(&cfg.fallback.dir)),
        Duration::from_millis(500),
    );
    let repos = Repositories::new(store);

    let created = repos
        .articles
        .create(&owner, new_article("Linked", Some(&feed.id)))
        .await
        .unwrap();
    assert!(created.is_degraded());

    let in_primary: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles WHERE id = ?")
        .bind(&created.value.id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(in_primary, 1);

    let standalone = repos
        .articles
        .create(&owner, new_article("Unlinked", None))
        .await
        .unwrap();
    assert!(!standalone.is_degraded());
}

#[tokio::test]
async fn article_feed_must_belong_to_owner() {
    let tmp = TempDir::new().unwrap();
    let repos = repos(&tmp, true).await;
    let alice = UserId::new("alice");
    let bob = UserId::new("bob");

    let feed = repos
        .feeds
        .create(&alice, new_feed("https://example.com/rss"))
        .await
        .unwrap()
        .into_inner();

    let err = repos
        .articles
        .create(&bob, new_article("sneaky", Some(&feed.id)))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::AuthorizationDenied { .. }));

    let err = repos
        .articles
        .create(&alice, new_article("orphan", Some("feed_1_deadbeef")))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}

// ─── Documents ──────────────────────────────────────────────────────

#[tokio::test]
async fn document_status_lifecycle_and_search() {
    for primary_up in [true, false] {
        let tmp = TempDir::new().unwrap();
        let repos = repos(&tmp, primary_up).await;
        let owner = UserId::new("alice");

        let document = repos
            .documents
            .create(&owner, new_document("rustonomicon.pdf"))
            .await
            .unwrap()
            .into_inner();
        assert!(document.id.starts_with("doc_"));
        assert_eq!(document.status, DocumentStatus::Uploading);

        for status in [DocumentStatus::Processing, DocumentStatus::Ready] {
            let moved = repos
                .documents
                .set_status(&owner, &document.id, status)
                .await
                .unwrap()
                .into_inner();
            assert_eq!(moved.status, status);
        }

        let renamed = repos
            .documents
            .update(
                &owner,
                &document.id,
                DocumentPatch {
                    name: Some("nomicon.pdf".into()),
                    ..DocumentPatch::default()
                },
            )
            .await
            .unwrap()
            .into_inner();
        assert_eq!(renamed.status, DocumentStatus::Ready);
        assert_eq!(renamed.size, 2048);

        let by_content = repos.documents.search(&owner, "LIFETIMES").await.unwrap();
        assert_eq!(by_content.into_inner(), vec![renamed.clone()]);

        repos.documents.delete(&owner, &renamed.id).await.unwrap();
        assert!(repos.documents.list(&owner).await.unwrap().value.is_empty());
    }
}
