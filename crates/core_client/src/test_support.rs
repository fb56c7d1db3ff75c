use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use core_types::{
    ApiError, ApiVersion, Document, KnowledgeApi, QueryAnswer, QueryRequest, Stats, UploadFile,
    UploadReceipt,
};
use indexmap::IndexSet;
use tokio::sync::oneshot;

pub fn document(id: &str, filename: &str, file_type: &str) -> Document {
    Document {
        id: id.to_string(),
        filename: filename.to_string(),
        original_filename: Some(filename.to_string()),
        file_type: file_type.to_string(),
        chunk_count: 4,
        size_bytes: 2048,
        uploaded_at: Utc::now(),
    }
}

#[derive(Default)]
struct State {
    documents: Vec<Document>,
    answers: VecDeque<Result<QueryAnswer, ApiError>>,
    failures: HashMap<&'static str, VecDeque<ApiError>>,
    calls: HashMap<&'static str, usize>,
    last_query: Option<QueryRequest>,
    last_upload: Option<UploadFile>,
    uploaded: usize,
    query_gate: Option<VecDeque<oneshot::Sender<()>>>,
    list_gates: VecDeque<bool>,
    held_lists: VecDeque<oneshot::Sender<()>>,
    upload_gate: Option<VecDeque<oneshot::Sender<()>>>,
    version_gate: Option<VecDeque<oneshot::Sender<()>>>,
}

/// In-memory backend with scripted failures and release gates for in-flight calls.
#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<State>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_documents(documents: Vec<Document>) -> Arc<Self> {
        let backend = Self::new();
        backend.lock().documents = documents;
        backend
    }

    pub fn api(self: &Arc<Self>) -> Arc<dyn KnowledgeApi> {
        Arc::clone(self) as Arc<dyn KnowledgeApi>
    }

    pub fn push_answer(&self, answer: Result<QueryAnswer, ApiError>) {
        self.lock().answers.push_back(answer);
    }

    /// The next call of `operation` fails with `error`.
    pub fn fail_next(&self, operation: &'static str, error: ApiError) {
        self.lock()
            .failures
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    pub fn set_documents(&self, documents: Vec<Document>) {
        self.lock().documents = documents;
    }

    pub fn calls(&self, operation: &str) -> usize {
        self.lock().calls.get(operation).copied().unwrap_or(0)
    }

    pub fn last_query(&self) -> Option<QueryRequest> {
        self.lock().last_query.clone()
    }

    pub fn last_upload(&self) -> Option<UploadFile> {
        self.lock().last_upload.clone()
    }

    /// Hold every later query until [`FakeBackend::release_query`] lets it through.
    pub fn gate_queries(&self) {
        self.lock().query_gate.get_or_insert_with(VecDeque::new);
    }

    /// Let the oldest held query resolve.
    pub fn release_query(&self) {
        let gate = self
            .lock()
            .query_gate
            .as_mut()
            .and_then(VecDeque::pop_front)
            .expect("no held query");
        let _ = gate.send(());
    }

    pub fn gate_uploads(&self) {
        self.lock().upload_gate.get_or_insert_with(VecDeque::new);
    }

    pub fn release_upload(&self) {
        let gate = self
            .lock()
            .upload_gate
            .as_mut()
            .and_then(VecDeque::pop_front)
            .expect("no held upload");
        let _ = gate.send(());
    }

    pub fn gate_versions(&self) {
        self.lock().version_gate.get_or_insert_with(VecDeque::new);
    }

    pub fn release_version(&self) {
        let gate = self
            .lock()
            .version_gate
            .as_mut()
            .and_then(VecDeque::pop_front)
            .expect("no held version call");
        let _ = gate.send(());
    }

    /// Plan gating for upcoming list calls in order; `true` holds that call until released.
    /// The held call answers with the documents present when it was issued.
    pub fn hold_lists(&self, plan: &[bool]) {
        self.lock().list_gates.extend(plan.iter().copied());
    }

    /// Let the oldest held list call resolve.
    pub fn release_list(&self) {
        let gate = self.lock().held_lists.pop_front().expect("no held list");
        let _ = gate.send(());
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("fake backend state")
    }

    fn begin(&self, operation: &'static str) -> Result<(), ApiError> {
        let mut state = self.lock();
        *state.calls.entry(operation).or_default() += 1;
        match state
            .failures
            .get_mut(operation)
            .and_then(VecDeque::pop_front)
        {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

async fn wait(gate: Option<oneshot::Receiver<()>>) {
    if let Some(gate) = gate {
        let _ = gate.await;
    }
}

fn register(queue: Option<&mut VecDeque<oneshot::Sender<()>>>) -> Option<oneshot::Receiver<()>> {
    queue.map(|queue| {
        let (tx, rx) = oneshot::channel();
        queue.push_back(tx);
        rx
    })
}

#[async_trait]
impl KnowledgeApi for FakeBackend {
    async fn upload(&self, file: UploadFile) -> Result<UploadReceipt, ApiError> {
        let gate = register(self.lock().upload_gate.as_mut());
        wait(gate).await;
        self.begin("upload")?;

        let mut state = self.lock();
        state.uploaded += 1;
        let id = format!("doc-{}", state.uploaded);
        let file_type = file
            .filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        let mut doc = document(&id, &file.filename, &file_type);
        doc.size_bytes = file.bytes.len() as u64;
        state.documents.push(doc);
        let receipt = UploadReceipt {
            document_id: id,
            filename: file.filename.clone(),
            chunk_count: 4,
            message: "Document uploaded and processed successfully".to_string(),
        };
        state.last_upload = Some(file);
        Ok(receipt)
    }

    async fn query(&self, request: QueryRequest) -> Result<QueryAnswer, ApiError> {
        let gate = {
            let mut state = self.lock();
            state.last_query = Some(request.clone());
            register(state.query_gate.as_mut())
        };
        wait(gate).await;
        self.begin("query")?;

        let scripted = self.lock().answers.pop_front();
        scripted.unwrap_or_else(|| {
            Ok(QueryAnswer {
                query: request.query.clone(),
                answer: format!("echo: {}", request.query),
                sources: Vec::new(),
                processing_time: 0.1,
            })
        })
    }

    async fn list_documents(&self) -> Result<Vec<Document>, ApiError> {
        let (documents, gate) = {
            let mut state = self.lock();
            let documents = state.documents.clone();
            let gate = if state.list_gates.pop_front().unwrap_or(false) {
                let (tx, rx) = oneshot::channel();
                state.held_lists.push_back(tx);
                Some(rx)
            } else {
                None
            };
            (documents, gate)
        };
        self.begin("list_documents")?;
        wait(gate).await;
        Ok(documents)
    }

    async fn delete_document(&self, id: &str) -> Result<(), ApiError> {
        self.begin("delete_document")?;
        let mut state = self.lock();
        let before = state.documents.len();
        state.documents.retain(|doc| doc.id != id);
        if state.documents.len() == before {
            return Err(ApiError::http(
                404,
                Some("Document not found".to_string()),
                "Request failed with status code 404",
            ));
        }
        Ok(())
    }

    async fn stats(&self) -> Result<Stats, ApiError> {
        self.begin("stats")?;
        let state = self.lock();
        Ok(Stats {
            total_documents: state.documents.len() as u64,
            total_chunks: state.documents.iter().map(|doc| doc.chunk_count).sum(),
            document_types: state
                .documents
                .iter()
                .map(|doc| doc.file_type.clone())
                .collect::<IndexSet<_>>(),
        })
    }

    async fn health_check(&self) -> Result<(), ApiError> {
        self.begin("health_check")
    }

    async fn version(&self) -> Result<ApiVersion, ApiError> {
        let gate = register(self.lock().version_gate.as_mut());
        wait(gate).await;
        self.begin("version")?;
        Ok(ApiVersion {
            version: "1.0.0".to_string(),
            api: "v1".to_string(),
        })
    }
}
