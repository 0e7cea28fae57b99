use crate::error::Result;
use crate::generation::GenerationRequest;
use crate::http::{ApiRequest, HttpClient, Service};
use chrono::{DateTime, Utc};
use convert_case::{Case, Casing};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetStatus {
    Pending,
    Running,
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

impl DatasetStatus {
    pub fn is_finished(self) -> bool {
        matches!(self, DatasetStatus::Completed | DatasetStatus::Failed)
    }
}

/// One generation job and its output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: String,
    pub project_id: String,
    pub status: DatasetStatus,
    #[serde(default)]
    pub export_type: Option<String>,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error: Option<String>,
}

impl Dataset {
    /// Local file name for a download, e.g. `my_shop_<id>.csv`.
    ///
    /// A server-provided name is reduced to its last path component.
    pub fn download_file_name(&self, project_name: &str) -> String {
        let server_name = self
            .file_name
            .as_deref()
            .and_then(|name| Path::new(name).file_name())
            .and_then(|name| name.to_str())
            .filter(|name| !name.is_empty());
        if let Some(name) = server_name {
            return name.to_string();
        }
        let extension = self.export_type.as_deref().unwrap_or("bin");
        format!(
            "{}_{}.{}",
            project_name.to_case(Case::Snake),
            self.id,
            extension
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DatasetList {
    Wrapped { datasets: Vec<Dataset> },
    Bare(Vec<Dataset>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DatasetEnvelope {
    Wrapped { dataset: Dataset },
    Bare(Dataset),
}

impl From<DatasetEnvelope> for Dataset {
    fn from(envelope: DatasetEnvelope) -> Self {
        match envelope {
            DatasetEnvelope::Wrapped { dataset } | DatasetEnvelope::Bare(dataset) => dataset,
        }
    }
}

/// Jobs and artifacts on the generation service
#[derive(Debug, Clone)]
pub struct DatasetsApi {
    http: HttpClient,
}

impl DatasetsApi {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    pub async fn generate(&self, request: &GenerationRequest) -> Result<Dataset> {
        let api_request = ApiRequest::post(
            Service::Generation,
            "/datasets/generate",
            serde_json::to_value(request)?,
        );
        let envelope: DatasetEnvelope = self.http.request(&api_request).await?;
        let dataset: Dataset = envelope.into();
        info!(dataset = %dataset.id, status = ?dataset.status, "Generation job submitted");
        Ok(dataset)
    }

    pub async fn list(&self, project_id: &str) -> Result<Vec<Dataset>> {
        let request =
            ApiRequest::get(Service::Generation, "/datasets").with_query("project_id", project_id);
        let list: DatasetList = self.http.request(&request).await?;
        Ok(match list {
            DatasetList::Wrapped { datasets } | DatasetList::Bare(datasets) => datasets,
        })
    }

    pub async fn get(&self, project_id: &str, dataset_id: &str) -> Result<Dataset> {
        let request = ApiRequest::get(Service::Generation, format!("/datasets/{dataset_id}"))
            .with_query("project_id", project_id);
        let envelope: DatasetEnvelope = self.http.request(&request).await?;
        Ok(envelope.into())
    }

    /// Raw generated file
    pub async fn download(&self, project_id: &str, dataset_id: &str) -> Result<Vec<u8>> {
        let request = ApiRequest::get(
            Service::Generation,
            format!("/datasets/{dataset_id}/download"),
        )
        .with_query("project_id", project_id);
        self.http.fetch_bytes(&request).await
    }

    /// Local agent binary for the given platform
    pub async fn download_agent(&self, platform: &str) -> Result<Vec<u8>> {
        let request =
            ApiRequest::get(Service::Core, "/agent/download").with_query("platform", platform);
        self.http.fetch_bytes(&request).await
    }
}
