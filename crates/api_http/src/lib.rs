use async_trait::async_trait;
use core_types::{
    ApiError, ApiVersion, Document, KnowledgeApi, QueryAnswer, QueryRequest, Stats, UploadFile,
    UploadReceipt,
};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use url::Url;

#[derive(Debug, Deserialize)]
struct DocumentList {
    documents: Vec<Document>,
    #[serde(default)]
    total_count: Option<usize>,
}

/// reqwest-backed [`KnowledgeApi`] rooted at a single base URL.
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpGateway {
    pub fn new(base_url: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ApiError::transport(format!("base url `{}` cannot carry a path", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, ApiError> {
        let url = self.endpoint(segments)?;
        debug!(%method, path = url.path(), "backend request");
        Ok(self.client.request(method, url))
    }

    async fn send(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<Response, ApiError> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        debug!(operation, status = status.as_u16(), "backend responded");
        if status.is_success() {
            return Ok(response);
        }
        let body = match response.text().await {
            Ok(body) => body,
            Err(err) => {
                debug!(operation, error = %err, "error body unreadable");
                String::new()
            }
        };
        Err(http_error(status, &body))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        segments: &[&str],
    ) -> Result<T, ApiError> {
        let response = self
            .send(operation, self.request(Method::GET, segments)?)
            .await?;
        decode(response).await
    }
}

#[async_trait]
impl KnowledgeApi for HttpGateway {
    async fn upload(&self, file: UploadFile) -> Result<UploadReceipt, ApiError> {
        let mime = mime_guess::from_path(&file.filename).first_or_octet_stream();
        let part = Part::bytes(file.bytes)
            .file_name(file.filename)
            .mime_str(mime.essence_str())
            .map_err(transport_error)?;
        let request = self
            .request(Method::POST, &["upload"])?
            .multipart(Form::new().part("file", part));
        let response = self.send("upload", request).await?;
        decode(response).await
    }

    async fn query(&self, request: QueryRequest) -> Result<QueryAnswer, ApiError> {
        let builder = self.request(Method::POST, &["query"])?.json(&request);
        let response = self.send("query", builder).await?;
        decode(response).await
    }

    async fn list_documents(&self) -> Result<Vec<Document>, ApiError> {
        let list: DocumentList = self.get_json("list_documents", &["documents"]).await?;
        if let Some(total) = list.total_count.filter(|total| *total != list.documents.len()) {
            debug!(total, received = list.documents.len(), "document count mismatch");
        }
        Ok(list.documents)
    }

    async fn delete_document(&self, id: &str) -> Result<(), ApiError> {
        let request = self.request(Method::DELETE, &["documents", id])?;
        self.send("delete_document", request).await?;
        Ok(())
    }

    async fn stats(&self) -> Result<Stats, ApiError> {
        self.get_json("stats", &["stats"]).await
    }

    async fn health_check(&self) -> Result<(), ApiError> {
        let request = self.request(Method::GET, &["health"])?;
        self.send("health_check", request).await?;
        Ok(())
    }

    async fn version(&self) -> Result<ApiVersion, ApiError> {
        self.get_json("version", &["version"]).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    response.json::<T>().await.map_err(|err| {
        ApiError::http(
            status.as_u16(),
            None,
            format!("invalid response body: {err}"),
        )
    })
}

fn transport_error(err: reqwest::Error) -> ApiError {
    match err.status() {
        Some(status) => ApiError::http(status.as_u16(), None, err.to_string()),
        None => ApiError::transport(err.to_string()),
    }
}

fn http_error(status: StatusCode, body: &str) -> ApiError {
    ApiError::http(
        status.as_u16(),
        extract_detail(body),
        format!("Request failed with status code {}", status.as_u16()),
    )
}

fn extract_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("detail")
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
}
