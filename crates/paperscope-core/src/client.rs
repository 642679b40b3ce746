//! HTTP implementation of [`PaperBackend`].

use serde::Deserialize;
use serde_json::{Value, json};

use crate::analysis::{AnalysisReport, AnalysisRequest, PaperAnswer, PaperQuestion};
use crate::backend::{
    ExportRequest, ExportedFile, Health, PaperBackend, PaperListing, filename_from_disposition,
};
use crate::extraction::{ExtractionKind, ExtractionPayload};
use crate::paper::{Paper, PaperId, PdfUpload};
use crate::ApiError;

/// Client for the paper analysis API.
///
/// No request timeout is configured: a hung backend call stays pending until
/// the server answers or the connection drops.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: Value,
}

#[derive(Deserialize)]
struct VisualizeResponse {
    html: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn paper_url(&self, paper_id: &PaperId, rest: &str) -> String {
        self.url(&format!(
            "/api/papers/{}{}",
            urlencoding::encode(paper_id.as_str()),
            rest
        ))
    }
}

/// Pass successful responses through; turn the rest into [`ApiError::Status`]
/// carrying the backend's `detail` message when there is one.
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .map(|e| match e.detail {
            Value::String(s) => s,
            other => other.to_string(),
        })
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                format!("HTTP {}", status.as_u16())
            } else {
                body
            }
        });
    Err(ApiError::Status {
        status: status.as_u16(),
        detail,
    })
}

impl PaperBackend for ApiClient {
    async fn upload(&self, file: &PdfUpload) -> Result<Paper, ApiError> {
        let part = reqwest::multipart::Part::bytes(file.bytes.clone())
            .file_name(file.filename.clone())
            .mime_str("application/pdf")?;
        let form = reqwest::multipart::Form::new().part("file", part);
        log::info!("uploading {} ({} bytes)", file.filename, file.bytes.len());

        let resp = self
            .http
            .post(self.url("/api/papers"))
            .multipart(form)
            .send()
            .await?;
        Ok(check_status(resp).await?.json().await?)
    }

    async fn list_papers(&self) -> Result<PaperListing, ApiError> {
        let resp = self.http.get(self.url("/api/papers")).send().await?;
        Ok(check_status(resp).await?.json().await?)
    }

    async fn get_paper(&self, paper_id: &PaperId) -> Result<Paper, ApiError> {
        let resp = self.http.get(self.paper_url(paper_id, "")).send().await?;
        Ok(check_status(resp).await?.json().await?)
    }

    async fn extract(
        &self,
        kind: ExtractionKind,
        paper_id: &PaperId,
    ) -> Result<ExtractionPayload, ApiError> {
        let url = self.paper_url(paper_id, &format!("/extract/{}", kind.descriptor().endpoint));
        let resp = self.http.post(url).send().await?;
        let body: Value = check_status(resp).await?.json().await?;
        ExtractionPayload::from_response(kind, &body)
    }

    async fn generate_visualization(
        &self,
        paper_ids: &[PaperId],
        query: &str,
    ) -> Result<String, ApiError> {
        let resp = self
            .http
            .post(self.url("/api/visualize"))
            .json(&json!({ "paper_ids": paper_ids, "query": query }))
            .send()
            .await?;
        let body: VisualizeResponse = check_status(resp).await?.json().await?;
        Ok(body.html)
    }

    async fn query_paper(&self, question: &PaperQuestion) -> Result<PaperAnswer, ApiError> {
        let resp = self
            .http
            .post(self.paper_url(&question.paper_id, "/query"))
            .json(&json!({ "query": question.query }))
            .send()
            .await?;
        Ok(check_status(resp).await?.json().await?)
    }

    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisReport, ApiError> {
        let resp = self
            .http
            .get(self.url(&format!("/api/analysis/{}", request.kind)))
            .query(&[("paper_ids", request.joined_ids())])
            .send()
            .await?;
        let body: Value = check_status(resp).await?.json().await?;
        AnalysisReport::from_response(request.kind, body)
    }

    async fn export(&self, request: &ExportRequest) -> Result<ExportedFile, ApiError> {
        let url = self.paper_url(&request.paper_id, &format!("/export/{}", request.target));
        let resp = self
            .http
            .get(url)
            .query(&[("format", request.format.as_str())])
            .send()
            .await?;
        let resp = check_status(resp).await?;

        let header = |name: reqwest::header::HeaderName| {
            resp.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let filename = header(reqwest::header::CONTENT_DISPOSITION)
            .as_deref()
            .and_then(filename_from_disposition)
            .unwrap_or_else(|| request.fallback_filename());
        let content_type = header(reqwest::header::CONTENT_TYPE);
        let bytes = resp.bytes().await?.to_vec();

        Ok(ExportedFile {
            filename,
            content_type,
            bytes,
        })
    }

    async fn health(&self) -> Result<Health, ApiError> {
        let resp = self.http.get(self.url("/health")).send().await?;
        Ok(check_status(resp).await?.json().await?)
    }
}
