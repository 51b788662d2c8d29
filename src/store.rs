use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Mutex;
use uuid::Uuid;

use crate::pipeline::SavedLinkDraft;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedLink {
    pub id: String,
    #[serde(skip_serializing)]
    pub owner_id: String,
    pub url: String,
    pub title: String,
    pub summary: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Per-owner link persistence. Links are created and deleted, never updated.
#[async_trait]
pub trait LinkStore: Send + Sync {
    async fn insert(&self, owner_id: &str, draft: SavedLinkDraft) -> Result<SavedLink, StoreError>;

    /// Newest first.
    async fn list(&self, owner_id: &str) -> Result<Vec<SavedLink>, StoreError>;

    /// Returns `false` when the link does not exist or belongs to someone else.
    async fn delete(&self, owner_id: &str, id: &str) -> Result<bool, StoreError>;
}

#[derive(Debug, Default)]
pub struct InMemoryLinkStore {
    links: Mutex<Vec<SavedLink>>,
}

impl InMemoryLinkStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<SavedLink>>, StoreError> {
        self.links
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl LinkStore for InMemoryLinkStore {
    async fn insert(&self, owner_id: &str, draft: SavedLinkDraft) -> Result<SavedLink, StoreError> {
        let link = SavedLink {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            url: draft.url,
            title: draft.title,
            summary: draft.summary,
            tags: draft.tags,
            created_at: Utc::now(),
        };
        self.lock()?.push(link.clone());
        Ok(link)
    }

    async fn list(&self, owner_id: &str) -> Result<Vec<SavedLink>, StoreError> {
        let links = self.lock()?;
        // Insertion order breaks timestamp ties so equal instants stay newest first.
        let mut owned: Vec<(usize, SavedLink)> = links
            .iter()
            .enumerate()
            .filter(|(_, link)| link.owner_id == owner_id)
            .map(|(idx, link)| (idx, link.clone()))
            .collect();
        owned.sort_by(|(ia, a), (ib, b)| b.created_at.cmp(&a.created_at).then(ib.cmp(ia)));
        Ok(owned.into_iter().map(|(_, link)| link).collect())
    }

    async fn delete(&self, owner_id: &str, id: &str) -> Result<bool, StoreError> {
        let mut links = self.lock()?;
        match links.iter().position(|l| l.id == id && l.owner_id == owner_id) {
            Some(idx) => {
                links.remove(idx);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
