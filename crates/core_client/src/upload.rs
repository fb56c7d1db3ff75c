use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use core_types::{KnowledgeApi, UploadFile, UploadReceipt};
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::ClientError;
use crate::documents::DocumentCollection;

/// Extensions offered by the file picker. The backend decides what it accepts.
pub const PICKER_EXTENSIONS: [&str; 4] = ["pdf", "txt", "md", "docx"];

pub fn matches_picker_filter(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            PICKER_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
}

/// Read a dropped or picked file into an upload payload named after the file.
pub async fn read_upload(path: &Path) -> Result<UploadFile, ClientError> {
    let io_error = |source: io::Error| ClientError::Io {
        path: path.to_path_buf(),
        source,
    };
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| io_error(io::Error::new(io::ErrorKind::InvalidInput, "not a file")))?;
    let bytes = tokio::fs::read(path).await.map_err(io_error)?;
    Ok(UploadFile::new(filename, bytes))
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UploadState {
    #[default]
    Idle,
    Uploading {
        filename: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UploadStatus {
    pub state: UploadState,
    /// Message from the last failed attempt; cleared when the next one starts.
    pub last_error: Option<String>,
}

impl UploadStatus {
    pub fn is_uploading(&self) -> bool {
        matches!(self.state, UploadState::Uploading { .. })
    }
}

pub struct UploadController {
    api: Arc<dyn KnowledgeApi>,
    documents: Arc<DocumentCollection>,
    status: watch::Sender<UploadStatus>,
}

impl UploadController {
    pub fn new(api: Arc<dyn KnowledgeApi>, documents: Arc<DocumentCollection>) -> Self {
        Self {
            api,
            documents,
            status: watch::Sender::new(UploadStatus::default()),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<UploadStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> UploadStatus {
        self.status.borrow().clone()
    }

    pub async fn upload_path(&self, path: PathBuf) -> Result<UploadReceipt, ClientError> {
        if !matches_picker_filter(&path) {
            debug!(path = %path.display(), "file outside the picker filter, sending anyway");
        }
        match read_upload(&path).await {
            Ok(file) => self.submit_upload(file).await,
            Err(err) => {
                error!(error = %err, "could not read file for upload");
                let message = err.user_message();
                self.status.send_if_modified(|status| {
                    if status.is_uploading() {
                        return false;
                    }
                    status.last_error = Some(message);
                    true
                });
                Err(err)
            }
        }
    }

    pub async fn submit_upload(&self, file: UploadFile) -> Result<UploadReceipt, ClientError> {
        let accepted = self.status.send_if_modified(|status| {
            if status.is_uploading() {
                return false;
            }
            status.state = UploadState::Uploading {
                filename: file.filename.clone(),
            };
            status.last_error = None;
            true
        });
        if !accepted {
            debug!(filename = %file.filename, "upload rejected while another is in flight");
            return Err(ClientError::UploadInProgress);
        }

        info!(filename = %file.filename, size = file.bytes.len(), "upload started");
        let filename = file.filename.clone();
        match self.api.upload(file).await {
            Ok(receipt) => {
                info!(
                    document_id = %receipt.document_id,
                    chunks = receipt.chunk_count,
                    "upload processed"
                );
                self.documents.refresh().await;
                self.status.send_modify(|status| status.state = UploadState::Idle);
                Ok(receipt)
            }
            Err(err) => {
                let err = ClientError::Upload(err);
                error!(filename = %filename, error = %err, "upload failed");
                let message = err.user_message();
                self.status.send_modify(|status| {
                    status.state = UploadState::Idle;
                    status.last_error = Some(message);
                });
                Err(err)
            }
        }
    }
}
