use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use indexmap::IndexSet;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub type MessageId = u64;
pub type DocumentId = String;

pub const DEFAULT_MAX_CHUNKS: usize = 5;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UiLanguage {
    ZhCn,
    EnUs,
}

/// Failure of a single backend call.
///
/// `detail` is the backend's structured `{"detail": ...}` text when the response carried
/// one; `raw` is always the transport or HTTP level description of the failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", self.user_message())]
pub struct ApiError {
    pub status: Option<u16>,
    pub detail: Option<String>,
    pub raw: String,
}

impl ApiError {
    pub fn transport(raw: impl Into<String>) -> Self {
        Self {
            status: None,
            detail: None,
            raw: raw.into(),
        }
    }

    pub fn http(status: u16, detail: Option<String>, raw: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            detail,
            raw: raw.into(),
        }
    }

    pub fn user_message(&self) -> &str {
        self.detail.as_deref().unwrap_or(&self.raw)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    User,
    Assistant,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SourceMetadata {
    #[serde(default)]
    pub filename: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A retrieved excerpt attached to an assistant answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Source {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(rename = "content")]
    pub excerpt: String,
    #[serde(default)]
    pub metadata: SourceMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<DocumentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub kind: MessageKind,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Source>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_seconds: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn user(id: MessageId, text: impl Into<String>) -> Self {
        Self::plain(id, MessageKind::User, text.into())
    }

    pub fn assistant(id: MessageId, answer: QueryAnswer) -> Self {
        Self {
            id,
            kind: MessageKind::Assistant,
            text: answer.answer,
            sources: answer.sources,
            latency_seconds: Some(answer.processing_time),
            created_at: Utc::now(),
        }
    }

    pub fn error(id: MessageId, error: &ApiError) -> Self {
        Self::plain(
            id,
            MessageKind::Error,
            format!("Error: {}", error.user_message()),
        )
    }

    fn plain(id: MessageId, kind: MessageKind, text: String) -> Self {
        Self {
            id,
            kind,
            text,
            sources: Vec::new(),
            latency_seconds: None,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_filename: Option<String>,
    pub file_type: String,
    pub chunk_count: u64,
    pub size_bytes: u64,
    #[serde(rename = "upload_date", deserialize_with = "timestamp")]
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Stats {
    pub total_documents: u64,
    pub total_chunks: u64,
    #[serde(default)]
    pub document_types: IndexSet<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadReceipt {
    pub document_id: DocumentId,
    pub filename: String,
    pub chunk_count: u64,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryRequest {
    pub query: String,
    pub max_chunks: usize,
    pub include_metadata: bool,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            max_chunks: DEFAULT_MAX_CHUNKS,
            include_metadata: true,
        }
    }

    pub fn with_max_chunks(mut self, max_chunks: usize) -> Self {
        self.max_chunks = max_chunks.max(1);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryAnswer {
    #[serde(default)]
    pub query: String,
    pub answer: String,
    #[serde(default)]
    pub sources: Vec<Source>,
    pub processing_time: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiVersion {
    pub version: String,
    #[serde(default)]
    pub api: String,
}

/// The bytes of a file chosen by the user, paired with the name the backend will see.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }
}

impl fmt::Debug for UploadFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadFile")
            .field("filename", &self.filename)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Typed boundary to the document question-answering backend.
///
/// Implementations never retry; callers decide what to do with an [`ApiError`].
#[async_trait]
pub trait KnowledgeApi: Send + Sync {
    async fn upload(&self, file: UploadFile) -> Result<UploadReceipt, ApiError>;
    async fn query(&self, request: QueryRequest) -> Result<QueryAnswer, ApiError>;
    async fn list_documents(&self) -> Result<Vec<Document>, ApiError>;
    async fn delete_document(&self, id: &str) -> Result<(), ApiError>;
    async fn stats(&self) -> Result<Stats, ApiError>;
    async fn health_check(&self) -> Result<(), ApiError>;
    async fn version(&self) -> Result<ApiVersion, ApiError>;
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(text) => Ok(text),
        Value::Number(number) => Ok(number.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

// The backend emits naive ISO-8601 timestamps; those are taken as UTC.
fn timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    raw.parse::<NaiveDateTime>()
        .map(|naive| naive.and_utc())
        .map_err(|err| serde::de::Error::custom(format!("invalid timestamp `{raw}`: {err}")))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn user_message_prefers_detail() {
        let err = ApiError::http(
            400,
            Some("File type 'exe' not supported".to_string()),
            "HTTP status client error (400 Bad Request)",
        );
        assert_eq!(err.user_message(), "File type 'exe' not supported");
        assert_eq!(err.to_string(), "File type 'exe' not supported");

        let err = ApiError::transport("Network Error");
        assert_eq!(err.user_message(), "Network Error");
        assert_eq!(err.status, None);
    }

    #[test]
    fn api_error_boxes_as_std_error() {
        let err: Box<dyn std::error::Error + Send + Sync> = Box::new(ApiError::http(
            404,
            Some("Document not found".to_string()),
            "Request failed with status code 404",
        ));
        assert_eq!(err.to_string(), "Document not found");
        assert!(err.source().is_none());
    }

    #[test]
    fn error_message_carries_prefix() {
        let message = Message::error(7, &ApiError::transport("Network Error"));
        assert_eq!(message.kind, MessageKind::Error);
        assert_eq!(message.text, "Error: Network Error");
        assert!(message.sources.is_empty());
        assert_eq!(message.latency_seconds, None);
    }

    #[test]
    fn parses_backend_document_with_naive_timestamp() {
        let doc: Document = serde_json::from_value(json!({
            "id": "doc-42",
            "filename": "policy.pdf",
            "original_filename": "policy.pdf",
            "file_type": "pdf",
            "upload_date": "2024-05-01T09:30:00.123456",
            "chunk_count": 12,
            "size_bytes": 20480
        }))
        .expect("document");
        assert_eq!(doc.id, "doc-42");
        assert_eq!(doc.uploaded_at.to_rfc3339(), "2024-05-01T09:30:00.123456+00:00");

        let doc: Document = serde_json::from_value(json!({
            "id": "doc-43",
            "filename": "notes.md",
            "file_type": "md",
            "upload_date": "2024-05-01T09:30:00Z",
            "chunk_count": 1,
            "size_bytes": 10
        }))
        .expect("document");
        assert_eq!(doc.original_filename, None);
    }

    #[test]
    fn source_accepts_numeric_id_and_keeps_metadata() {
        let source: Source = serde_json::from_value(json!({
            "id": 1,
            "content": "Refunds are accepted within 30 days.",
            "metadata": {"filename": "policy.pdf", "page": 3}
        }))
        .expect("source");
        assert_eq!(source.id, "1");
        assert_eq!(source.metadata.filename, "policy.pdf");
        assert_eq!(source.metadata.extra["page"], 3);
    }

    #[test]
    fn stats_document_types_deduplicate_in_order() {
        let stats: Stats = serde_json::from_value(json!({
            "total_documents": 3,
            "total_chunks": 40,
            "document_types": ["pdf", "md", "pdf"]
        }))
        .expect("stats");
        let types: Vec<_> = stats.document_types.iter().map(String::as_str).collect();
        assert_eq!(types, ["pdf", "md"]);
    }

    #[test]
    fn query_request_serializes_wire_names() {
        let request = QueryRequest::new("What is the refund policy?").with_max_chunks(0);
        let value = serde_json::to_value(&request).expect("json");
        assert_eq!(
            value,
            json!({
                "query": "What is the refund policy?",
                "max_chunks": 1,
                "include_metadata": true
            })
        );
    }
}
