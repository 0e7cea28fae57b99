use crate::error::Result;
use crate::http::{ApiRequest, HttpClient, Service};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProjectUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ProjectList {
    Wrapped { projects: Vec<Project> },
    Bare(Vec<Project>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ProjectEnvelope {
    Wrapped { project: Project },
    Bare(Project),
}

impl From<ProjectEnvelope> for Project {
    fn from(envelope: ProjectEnvelope) -> Self {
        match envelope {
            ProjectEnvelope::Wrapped { project } | ProjectEnvelope::Bare(project) => project,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProjectsApi {
    http: HttpClient,
}

impl ProjectsApi {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    pub async fn list(&self) -> Result<Vec<Project>> {
        let list: ProjectList = self
            .http
            .request(&ApiRequest::get(Service::Core, "/projects"))
            .await?;
        Ok(match list {
            ProjectList::Wrapped { projects } | ProjectList::Bare(projects) => projects,
        })
    }

    pub async fn get(&self, project_id: &str) -> Result<Project> {
        let envelope: ProjectEnvelope = self
            .http
            .request(&ApiRequest::get(
                Service::Core,
                format!("/projects/{project_id}"),
            ))
            .await?;
        Ok(envelope.into())
    }

    pub async fn create(&self, name: &str, description: Option<&str>) -> Result<Project> {
        let request = ApiRequest::post(
            Service::Core,
            "/projects",
            json!({ "name": name, "description": description }),
        );
        let envelope: ProjectEnvelope = self.http.request(&request).await?;
        Ok(envelope.into())
    }

    pub async fn update(&self, project_id: &str, update: &ProjectUpdate) -> Result<Project> {
        let request = ApiRequest::patch(
            Service::Core,
            format!("/projects/{project_id}"),
            serde_json::to_value(update)?,
        );
        let envelope: ProjectEnvelope = self.http.request(&request).await?;
        Ok(envelope.into())
    }

    pub async fn delete(&self, project_id: &str) -> Result<()> {
        self.http
            .request_json(&ApiRequest::delete(
                Service::Core,
                format!("/projects/{project_id}"),
            ))
            .await
            .map(|_| ())
    }
}
