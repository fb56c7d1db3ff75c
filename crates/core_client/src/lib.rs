//! Client-side interaction model for the document question-answering backend.
//!
//! Every component owns its state in a `tokio::sync::watch` channel: writers replace or
//! append whole values, readers take cloned snapshots or subscribe for change
//! notifications. All backend traffic goes through [`core_types::KnowledgeApi`].

use std::path::PathBuf;

use core_types::ApiError;
use thiserror::Error;

pub mod chat;
pub mod connection;
pub mod documents;
pub mod format;
pub mod shell;
pub mod upload;

#[cfg(test)]
mod test_support;

pub use chat::{ChatLog, ChatSession, QueryOptions, SessionRequestState, SubmitOutcome};
pub use connection::{ConnectionMonitor, ConnectionSnapshot, ConnectionStatus, ConnectivityState};
pub use documents::{CollectionSnapshot, DeleteConfirmation, DocumentCollection, RefreshReport};
pub use shell::{Shell, Tab};
pub use upload::{UploadController, UploadState, UploadStatus};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("cannot reach backend: {0}")]
    Connectivity(#[source] ApiError),

    #[error("query failed: {0}")]
    Query(#[source] ApiError),

    #[error("upload failed: {0}")]
    Upload(#[source] ApiError),

    #[error("delete failed: {0}")]
    Delete(#[source] ApiError),

    #[error("background refresh failed: {0}")]
    BackgroundRefresh(#[source] ApiError),

    #[error("an upload is already in progress")]
    UploadInProgress,

    #[error("failed to read `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ClientError {
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            ClientError::Connectivity(err)
            | ClientError::Query(err)
            | ClientError::Upload(err)
            | ClientError::Delete(err)
            | ClientError::BackgroundRefresh(err) => Some(err),
            ClientError::UploadInProgress | ClientError::Io { .. } => None,
        }
    }

    /// Text shown to the user: the backend detail when there is one.
    pub fn user_message(&self) -> String {
        match self.api_error() {
            Some(err) => err.user_message().to_string(),
            None => self.to_string(),
        }
    }
}
