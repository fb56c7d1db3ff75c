use std::future::Future;
use std::sync::Arc;

use core_types::KnowledgeApi;
use futures::future;
use tracing::{debug, info};

use crate::chat::{ChatSession, QueryOptions};
use crate::connection::{ConnectionMonitor, ConnectionStatus, ConnectivityState};
use crate::documents::{DocumentCollection, RefreshReport};
use crate::upload::UploadController;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Tab {
    #[default]
    Chat,
    Documents,
}

impl Tab {
    pub const ALL: [Tab; 2] = [Tab::Chat, Tab::Documents];

    pub fn id(self) -> &'static str {
        match self {
            Tab::Chat => "chat",
            Tab::Documents => "documents",
        }
    }

    pub fn label_key(self) -> &'static str {
        match self {
            Tab::Chat => "nav.chat",
            Tab::Documents => "nav.documents",
        }
    }
}

/// Top-level composition: owns the active tab and every component. Switching tabs never
/// touches component state.
pub struct Shell {
    active_tab: Tab,
    connection: Arc<ConnectionMonitor>,
    chat: Arc<ChatSession>,
    documents: Arc<DocumentCollection>,
    upload: Arc<UploadController>,
}

impl Shell {
    pub fn new(api: Arc<dyn KnowledgeApi>, options: QueryOptions) -> Self {
        let documents = Arc::new(DocumentCollection::new(Arc::clone(&api)));
        Self {
            active_tab: Tab::default(),
            connection: Arc::new(ConnectionMonitor::new(Arc::clone(&api))),
            chat: Arc::new(ChatSession::new(Arc::clone(&api)).with_options(options)),
            upload: Arc::new(UploadController::new(api, Arc::clone(&documents))),
            documents,
        }
    }

    pub fn active_tab(&self) -> Tab {
        self.active_tab
    }

    /// Returns whether the tab changed.
    pub fn select_tab(&mut self, tab: Tab) -> bool {
        if self.active_tab == tab {
            return false;
        }
        debug!(from = self.active_tab.id(), to = tab.id(), "tab selected");
        self.active_tab = tab;
        true
    }

    pub fn connectivity(&self) -> ConnectivityState {
        self.connection.connectivity()
    }

    pub fn connection(&self) -> &Arc<ConnectionMonitor> {
        &self.connection
    }

    pub fn chat(&self) -> &Arc<ChatSession> {
        &self.chat
    }

    pub fn documents(&self) -> &Arc<DocumentCollection> {
        &self.documents
    }

    pub fn upload(&self) -> &Arc<UploadController> {
        &self.upload
    }

    /// Initial health probe plus the first document refresh. The returned future owns
    /// its handles so it can be spawned.
    pub fn mount(
        &self,
    ) -> impl Future<Output = (ConnectionStatus, RefreshReport)> + Send + 'static {
        let connection = Arc::clone(&self.connection);
        let documents = Arc::clone(&self.documents);
        async move {
            info!("mounting shell");
            future::join(connection.probe(), documents.refresh()).await
        }
    }

    pub fn retry_connection(&self) -> impl Future<Output = ConnectionStatus> + Send + 'static {
        let connection = Arc::clone(&self.connection);
        async move { connection.retry().await }
    }
}
