// Api - typed wrappers over the HTTP client, one per backend area
pub mod auth;
pub mod datasets;
pub mod projects;
pub mod schema;

pub use auth::{AuthApi, AuthTokens, Registration, User, UserUpdate};
pub use datasets::{Dataset, DatasetStatus, DatasetsApi};
pub use projects::{Project, ProjectUpdate, ProjectsApi};
pub use schema::{NewTable, SchemaApi};

use crate::http::HttpClient;

/// All service wrappers sharing one client (and so one token and cookie jar)
#[derive(Debug, Clone)]
pub struct Api {
    pub auth: AuthApi,
    pub projects: ProjectsApi,
    pub schema: SchemaApi,
    pub datasets: DatasetsApi,
}

impl Api {
    pub fn new(http: HttpClient) -> Self {
        Self {
            auth: AuthApi::new(http.clone()),
            projects: ProjectsApi::new(http.clone()),
            schema: SchemaApi::new(http.clone()),
            datasets: DatasetsApi::new(http),
        }
    }
}
