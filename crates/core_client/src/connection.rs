use std::sync::Arc;

use core_types::{ApiVersion, KnowledgeApi};
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::ClientError;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Unknown,
    Connected,
    Disconnected {
        last_error: String,
    },
}

/// What the banner shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectivityState {
    pub connected: bool,
    pub last_error: Option<String>,
}

impl ConnectionStatus {
    /// `Unknown` counts as connected so no banner flashes before the first probe lands.
    pub fn connectivity(&self) -> ConnectivityState {
        match self {
            ConnectionStatus::Unknown | ConnectionStatus::Connected => ConnectivityState {
                connected: true,
                last_error: None,
            },
            ConnectionStatus::Disconnected { last_error } => ConnectivityState {
                connected: false,
                last_error: Some(last_error.clone()),
            },
        }
    }

    pub fn can_retry(&self) -> bool {
        matches!(self, ConnectionStatus::Disconnected { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionSnapshot {
    pub status: ConnectionStatus,
    pub backend_version: Option<ApiVersion>,
}

/// Passive health probe: runs on mount and on explicit retry, never on a timer.
pub struct ConnectionMonitor {
    api: Arc<dyn KnowledgeApi>,
    state: watch::Sender<ConnectionSnapshot>,
}

impl ConnectionMonitor {
    pub fn new(api: Arc<dyn KnowledgeApi>) -> Self {
        Self {
            api,
            state: watch::Sender::new(ConnectionSnapshot::default()),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionSnapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        self.state.borrow().clone()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.state.borrow().status.clone()
    }

    pub fn connectivity(&self) -> ConnectivityState {
        self.state.borrow().status.connectivity()
    }

    /// Health check, published as soon as it resolves. The backend version is fetched
    /// afterwards and only when the backend is reachable.
    pub async fn probe(&self) -> ConnectionStatus {
        let status = match self.api.health_check().await {
            Ok(()) => {
                info!("backend reachable");
                ConnectionStatus::Connected
            }
            Err(err) => {
                let err = ClientError::Connectivity(err);
                error!(error = %err, "health check failed");
                ConnectionStatus::Disconnected {
                    last_error: err.user_message(),
                }
            }
        };
        self.state.send_modify(|state| state.status = status.clone());

        if status == ConnectionStatus::Connected {
            match self.api.version().await {
                Ok(version) => {
                    debug!(version = %version.version, "backend version");
                    self.state
                        .send_modify(|state| state.backend_version = Some(version));
                }
                Err(err) => debug!(error = %err, "backend version unavailable"),
            }
        }
        status
    }

    /// Re-probe; ignored unless the last probe failed.
    pub async fn retry(&self) -> ConnectionStatus {
        let current = self.status();
        if !current.can_retry() {
            debug!(?current, "retry ignored");
            return current;
        }
        info!("retrying backend connection");
        self.probe().await
    }
}
