use chrono::Utc;
use serde::Deserialize;

use readnest_core::models::{
    Document, DocumentStatus, DocumentType, EntityKind, ListFilter, UserId,
};
use readnest_core::text::{generate_id, require_text};
use readnest_core::StoreResult;

use crate::hybrid::{HybridStore, Served};

const KIND: EntityKind = EntityKind::Document;

/// Document metadata recorded at upload. Text extraction happens elsewhere;
/// `content` is whatever the caller already has.
#[derive(Debug, Clone, Deserialize)]
pub struct NewDocument {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DocumentType,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default = "default_status")]
    pub status: DocumentStatus,
}

fn default_status() -> DocumentStatus {
    DocumentStatus::Ready
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentPatch {
    pub name: Option<String>,
    pub content: Option<String>,
    pub status: Option<DocumentStatus>,
}

#[derive(Clone)]
pub struct DocumentRepository {
    store: HybridStore,
}

impl DocumentRepository {
    pub fn new(store: HybridStore) -> Self {
        Self { store }
    }

    pub async fn create(&self, owner: &UserId, input: NewDocument) -> StoreResult<Served<Document>> {
        require_text("name", &input.name)?;

        let now = Utc::now();
        let document = Document {
            id: generate_id(KIND, now),
            name: input.name,
            kind: input.kind,
            size: input.size,
            upload_date: now,
            content: input.content,
            status: input.status,
            user_id: owner.clone(),
        };
        super::insert(&self.store, owner, document).await
    }

    pub async fn get(&self, owner: &UserId, id: &str) -> StoreResult<Served<Document>> {
        super::fetch(&self.store, owner, KIND, id).await
    }

    pub async fn list(&self, owner: &UserId) -> StoreResult<Served<Vec<Document>>> {
        super::list(&self.store, owner, KIND, ListFilter::default()).await
    }

    pub async fn update(
        &self,
        owner: &UserId,
        id: &str,
        patch: DocumentPatch,
    ) -> StoreResult<Served<Document>> {
        if let Some(name) = &patch.name {
            require_text("name", name)?;
        }

        let current = self.get(owner, id).await?;
        let status = current.status;
        let mut document = current.into_inner();

        if let Some(name) = patch.name {
            document.name = name;
        }
        if patch.content.is_some() {
            document.content = patch.content;
        }
        if let Some(new_status) = patch.status {
            document.status = new_status;
        }

        super::replace(&self.store, owner, status, document).await
    }

    /// Moves a document through `uploading → processing → ready | error`.
    pub async fn set_status(
        &self,
        owner: &UserId,
        id: &str,
        status: DocumentStatus,
    ) -> StoreResult<Served<Document>> {
        self.update(
            owner,
            id,
            DocumentPatch {
                status: Some(status),
                ..DocumentPatch::default()
            },
        )
        .await
    }

    pub async fn delete(&self, owner: &UserId, id: &str) -> StoreResult<Served<()>> {
        super::remove(&self.store, owner, KIND, id).await
    }

    /// Case-insensitive substring match over name and content.
    pub async fn search(
        &self,
        owner: &UserId,
        query: &str,
    ) -> StoreResult<Served<Vec<Document>>> {
        super::search(&self.store, owner, KIND, query).await
    }
}
