use std::sync::Arc;

use core_types::{Document, DocumentId, KnowledgeApi, Stats};
use futures::future;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::ClientError;

#[derive(Debug, Clone, Default)]
pub struct CollectionSnapshot {
    pub documents: Vec<Document>,
    pub stats: Option<Stats>,
    pub pending_list_fetches: usize,
}

impl CollectionSnapshot {
    pub fn is_loading(&self) -> bool {
        self.pending_list_fetches > 0
    }
}

/// Outcome of the two fetches behind one refresh. Either side may fail alone.
#[derive(Debug)]
pub struct RefreshReport {
    pub documents: Result<usize, ClientError>,
    pub stats: Result<(), ClientError>,
}

impl RefreshReport {
    pub fn is_complete(&self) -> bool {
        self.documents.is_ok() && self.stats.is_ok()
    }
}

/// Proof that the user was asked before a delete. Only [`DocumentCollection::request_delete`]
/// creates one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteConfirmation {
    document_id: DocumentId,
    filename: String,
}

impl DeleteConfirmation {
    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn prompt(&self) -> String {
        format!("Are you sure you want to delete \"{}\"?", self.filename)
    }
}

/// Client-side view of the backend's knowledge base.
///
/// The shown list is whatever the most recently *completed* list fetch returned.
/// Overlapping refreshes are not deduplicated, so a slow early fetch may overwrite a
/// faster later one.
pub struct DocumentCollection {
    api: Arc<dyn KnowledgeApi>,
    state: watch::Sender<CollectionSnapshot>,
}

impl DocumentCollection {
    pub fn new(api: Arc<dyn KnowledgeApi>) -> Self {
        Self {
            api,
            state: watch::Sender::new(CollectionSnapshot::default()),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<CollectionSnapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> CollectionSnapshot {
        self.state.borrow().clone()
    }

    pub fn documents(&self) -> Vec<Document> {
        self.state.borrow().documents.clone()
    }

    pub fn stats(&self) -> Option<Stats> {
        self.state.borrow().stats.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading()
    }

    pub async fn refresh(&self) -> RefreshReport {
        let (documents, stats) =
            future::join(self.refresh_documents(), self.refresh_stats()).await;
        RefreshReport { documents, stats }
    }

    pub fn request_delete(&self, document: &Document) -> DeleteConfirmation {
        DeleteConfirmation {
            document_id: document.id.clone(),
            filename: document.filename.clone(),
        }
    }

    pub async fn delete_document(
        &self,
        confirmation: DeleteConfirmation,
    ) -> Result<RefreshReport, ClientError> {
        let id = confirmation.document_id;
        if let Err(err) = self.api.delete_document(&id).await {
            let err = ClientError::Delete(err);
            error!(document_id = %id, error = %err, "delete failed");
            return Err(err);
        }
        info!(document_id = %id, filename = %confirmation.filename, "document deleted");
        Ok(self.refresh().await)
    }

    async fn refresh_documents(&self) -> Result<usize, ClientError> {
        self.state.send_modify(|state| state.pending_list_fetches += 1);
        match self.api.list_documents().await {
            Ok(documents) => {
                let count = documents.len();
                self.state.send_modify(|state| {
                    state.pending_list_fetches = state.pending_list_fetches.saturating_sub(1);
                    state.documents = documents;
                });
                debug!(count, "document list refreshed");
                Ok(count)
            }
            Err(err) => {
                self.state.send_modify(|state| {
                    state.pending_list_fetches = state.pending_list_fetches.saturating_sub(1);
                });
                let err = ClientError::BackgroundRefresh(err);
                warn!(error = %err, "document list refresh failed");
                Err(err)
            }
        }
    }

    async fn refresh_stats(&self) -> Result<(), ClientError> {
        match self.api.stats().await {
            Ok(stats) => {
                self.state.send_modify(|state| state.stats = Some(stats));
                Ok(())
            }
            Err(err) => {
                let err = ClientError::BackgroundRefresh(err);
                warn!(error = %err, "stats refresh failed");
                Err(err)
            }
        }
    }
}
