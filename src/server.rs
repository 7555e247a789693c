//! ReadNest HTTP server.
//!
//! Exposes the entity repositories as a JSON REST API. Every route except
//! `/health` requires an `Authorization: Bearer <token>` header, resolved to
//! a user id by the configured [`Authenticator`].
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Status, version and store reachability |
//! | `GET` `POST` | `/api/journals` | List / create journal entries |
//! | `GET`  | `/api/journals/search?q=` | Search journal entries |
//! | `GET` `PUT` `DELETE` | `/api/journals/{id}` | Read / update / delete |
//! | `GET` `POST` | `/api/feeds` | List / create feed subscriptions |
//! | `GET`  | `/api/feeds/search?q=` | Search feed subscriptions |
//! | `GET` `PUT` `DELETE` | `/api/feeds/{id}` | Read / update / delete (with articles) |
//! | `GET`  | `/api/feeds/{id}/articles` | Articles of one feed |
//! | `GET` `POST` | `/api/articles` | List / create articles |
//! | `GET`  | `/api/articles/search?q=` | Search articles |
//! | `GET` `PUT` `DELETE` | `/api/articles/{id}` | Read / update / delete |
//! | `GET` `POST` | `/api/documents` | List / create documents |
//! | `GET`  | `/api/documents/search?q=` | Search documents |
//! | `GET` `PUT` `DELETE` | `/api/documents/{id}` | Read / update / delete |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "journal not found: j_1712_0a1b2c3d" } }
//! ```
//!
//! Error codes: `bad_request` (400), `unauthenticated` (401), `forbidden` (403),
//! `not_found` (404), `conflict` (409), `storage_unavailable` (503),
//! `internal` (500).
//!
//! Responses look the same whether the primary or the fallback store served
//! them.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients.

use axum::{
    extract::{rejection::JsonRejection, FromRequestParts, Path, Query, State},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use readnest_core::models::{Article, Document, FeedSubscription, Journal, UserId};
use readnest_core::StoreError;

use crate::auth::{bearer_token, AuthError, Authenticator, StaticTokenAuthenticator};
use crate::config::Config;
use crate::db;
use crate::hybrid::HybridStore;
use crate::migrate;
use crate::repository::{
    ArticlePatch, DocumentPatch, FeedPatch, JournalPatch, NewArticle, NewDocument, NewFeed,
    NewJournal, Repositories,
};

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    repos: Repositories,
    store: HybridStore,
    auth: Arc<dyn Authenticator>,
}

/// Starts the HTTP server with the token table from `[auth.tokens]`.
///
/// Binds to the address configured in `[server].bind`. The primary schema is
/// applied at startup when the primary store is reachable; when it is not,
/// the server starts anyway and requests are served by the fallback store.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let auth = Arc::new(StaticTokenAuthenticator::from_config(&config.auth));
    run_server_with_auth(config, auth).await
}

/// Like [`run_server`], with a caller-supplied [`Authenticator`].
pub async fn run_server_with_auth(
    config: &Config,
    auth: Arc<dyn Authenticator>,
) -> anyhow::Result<()> {
    let pool = db::connect_lazy(config)?;
    if let Err(err) = migrate::apply(&pool).await {
        warn!(error = %err, "primary store not ready at startup; requests will use the fallback store");
    }
    let store = HybridStore::from_config(config, pool);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(addr = %listener.local_addr()?, "ReadNest server listening");

    axum::serve(listener, router(store, auth)).await?;

    Ok(())
}

/// Builds the application router over an existing coordinator.
pub fn router(store: HybridStore, auth: Arc<dyn Authenticator>) -> Router {
    let state = AppState {
        repos: Repositories::new(store.clone()),
        store,
        auth,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/journals", get(list_journals).post(create_journal))
        .route("/api/journals/search", get(search_journals))
        .route(
            "/api/journals/{id}",
            get(get_journal).put(update_journal).delete(delete_journal),
        )
        .route("/api/feeds", get(list_feeds).post(create_feed))
        .route("/api/feeds/search", get(search_feeds))
        .route(
            "/api/feeds/{id}",
            get(get_feed).put(update_feed).delete(delete_feed),
        )
        .route("/api/feeds/{id}/articles", get(list_feed_articles))
        .route("/api/articles", get(list_articles).post(create_article))
        .route("/api/articles/search", get(search_articles))
        .route(
            "/api/articles/{id}",
            get(get_article).put(update_article).delete(delete_article),
        )
        .route("/api/documents", get(list_documents).post(create_document))
        .route("/api/documents/search", get(search_documents))
        .route(
            "/api/documents/{id}",
            get(get_document).put(update_document).delete(delete_document),
        )
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

/// Inner error detail with a machine-readable code and human-readable message.
#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Invalid { .. } => {
                AppError::new(StatusCode::BAD_REQUEST, "bad_request", err.to_string())
            }
            StoreError::AuthorizationDenied { .. } => {
                AppError::new(StatusCode::FORBIDDEN, "forbidden", err.to_string())
            }
            StoreError::NotFound { .. } => {
                AppError::new(StatusCode::NOT_FOUND, "not_found", err.to_string())
            }
            StoreError::Conflict(_) => {
                AppError::new(StatusCode::CONFLICT, "conflict", err.to_string())
            }
            StoreError::StorageUnavailable { .. } => {
                error!(error = %err, "request failed: storage unavailable");
                AppError::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "storage_unavailable",
                    "storage is temporarily unavailable",
                )
            }
            other => {
                error!(error = %other, "request failed");
                AppError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    "internal error",
                )
            }
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::new(StatusCode::UNAUTHORIZED, "unauthenticated", err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::new(StatusCode::BAD_REQUEST, "bad_request", rejection.body_text())
    }
}

type ApiResult<T> = Result<T, AppError>;

// ============ Authentication ============

/// The user resolved from the request's bearer token.
struct CurrentUser(UserId);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(bearer_token)
            .ok_or(AuthError::Unauthenticated)?;

        Ok(CurrentUser(state.auth.authenticate(token).await?))
    }
}

/// Query string of the `/search` routes.
#[derive(Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
}

// ============ GET /health ============

/// JSON response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    /// Always `"ok"` when the server is running.
    status: String,
    /// The crate version from `Cargo.toml`.
    version: String,
    /// `"ok"` or `"unreachable"`.
    primary: String,
    /// `"ok"` or `"unavailable"`.
    fallback: String,
}

/// Handler for `GET /health`. Succeeds even when the primary store is down,
/// since requests are still served.
async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let primary = match state.store.probe().await {
        Ok(()) => "ok",
        Err(_) => "unreachable",
    };
    let fallback = match state.store.probe_fallback().await {
        Ok(()) => "ok",
        Err(_) => "unavailable",
    };
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        primary: primary.to_string(),
        fallback: fallback.to_string(),
    })
}

// ============ /api/journals ============

async fn list_journals(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<Vec<Journal>>> {
    Ok(Json(state.repos.journals.list(&user).await?.into_inner()))
}

async fn create_journal(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<NewJournal>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Journal>)> {
    let Json(input) = payload?;
    let journal = state.repos.journals.create(&user, input).await?;
    Ok((StatusCode::CREATED, Json(journal.into_inner())))
}

async fn search_journals(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Vec<Journal>>> {
    let found = state.repos.journals.search(&user, &params.q).await?;
    Ok(Json(found.into_inner()))
}

async fn get_journal(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Journal>> {
    Ok(Json(state.repos.journals.get(&user, &id).await?.into_inner()))
}

async fn update_journal(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    payload: Result<Json<JournalPatch>, JsonRejection>,
) -> ApiResult<Json<Journal>> {
    let Json(patch) = payload?;
    let journal = state.repos.journals.update(&user, &id, patch).await?;
    Ok(Json(journal.into_inner()))
}

async fn delete_journal(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.repos.journals.delete(&user, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============ /api/feeds ============

async fn list_feeds(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<Vec<FeedSubscription>>> {
    Ok(Json(state.repos.feeds.list(&user).await?.into_inner()))
}

async fn create_feed(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<NewFeed>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<FeedSubscription>)> {
    let Json(input) = payload?;
    let feed = state.repos.feeds.create(&user, input).await?;
    Ok((StatusCode::CREATED, Json(feed.into_inner())))
}

async fn search_feeds(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Vec<FeedSubscription>>> {
    let found = state.repos.feeds.search(&user, &params.q).await?;
    Ok(Json(found.into_inner()))
}

async fn get_feed(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<FeedSubscription>> {
    Ok(Json(state.repos.feeds.get(&user, &id).await?.into_inner()))
}

async fn update_feed(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    payload: Result<Json<FeedPatch>, JsonRejection>,
) -> ApiResult<Json<FeedSubscription>> {
    let Json(patch) = payload?;
    let feed = state.repos.feeds.update(&user, &id, patch).await?;
    Ok(Json(feed.into_inner()))
}

async fn delete_feed(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.repos.feeds.delete(&user, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_feed_articles(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Article>>> {
    // Resolve the feed first so a foreign or unknown feed is 403/404, not [].
    state.repos.feeds.get(&user, &id).await?;
    let articles = state.repos.articles.list_for_feed(&user, &id).await?;
    Ok(Json(articles.into_inner()))
}

// ============ /api/articles ============

async fn list_articles(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<Vec<Article>>> {
    Ok(Json(state.repos.articles.list(&user).await?.into_inner()))
}

async fn create_article(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<NewArticle>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Article>)> {
    let Json(input) = payload?;
    let article = state.repos.articles.create(&user, input).await?;
    Ok((StatusCode::CREATED, Json(article.into_inner())))
}

async fn search_articles(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Vec<Article>>> {
    let found = state.repos.articles.search(&user, &params.q).await?;
    Ok(Json(found.into_inner()))
}

async fn get_article(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Article>> {
    Ok(Json(state.repos.articles.get(&user, &id).await?.into_inner()))
}

async fn update_article(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    payload: Result<Json<ArticlePatch>, JsonRejection>,
) -> ApiResult<Json<Article>> {
    let Json(patch) = payload?;
    let article = state.repos.articles.update(&user, &id, patch).await?;
    Ok(Json(article.into_inner()))
}

async fn delete_article(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.repos.articles.delete(&user, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============ /api/documents ============

async fn list_documents(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<Vec<Document>>> {
    Ok(Json(state.repos.documents.list(&user).await?.into_inner()))
}

async fn create_document(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<NewDocument>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Document>)> {
    let Json(input) = payload?;
    let document = state.repos.documents.create(&user, input).await?;
    Ok((StatusCode::CREATED, Json(document.into_inner())))
}

async fn search_documents(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Vec<Document>>> {
    let found = state.repos.documents.search(&user, &params.q).await?;
    Ok(Json(found.into_inner()))
}

async fn get_document(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Document>> {
    Ok(Json(state.repos.documents.get(&user, &id).await?.into_inner()))
}

async fn update_document(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    payload: Result<Json<DocumentPatch>, JsonRejection>,
) -> ApiResult<Json<Document>> {
    let Json(patch) = payload?;
    let document = state.repos.documents.update(&user, &id, patch).await?;
    Ok(Json(document.into_inner()))
}

async fn delete_document(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.repos.documents.delete(&user, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
