use crate::diagram::RelationDraft;
use crate::error::Result;
use crate::http::{ApiRequest, HttpClient, Service};
use crate::schema::{Field, Layout, Relation, RelationUpdate, SchemaSnapshot, Table, TableUpdate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

/// Table as sent for creation; the server assigns the id
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewTable {
    pub name: String,
    pub fields: Vec<Field>,
    pub layout: Layout,
}

#[derive(Debug, Deserialize)]
struct SchemaEnvelope {
    schema: SchemaSnapshot,
}

#[derive(Debug, Deserialize)]
struct TableEnvelope {
    table: Table,
}

#[derive(Debug, Deserialize)]
struct RelationEnvelope {
    relation: Relation,
}

/// Tables, relations and SQL import under /projects/{id} on the core service
#[derive(Debug, Clone)]
pub struct SchemaApi {
    http: HttpClient,
}

impl SchemaApi {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    pub async fn get_schema(&self, project_id: &str) -> Result<SchemaSnapshot> {
        let envelope: SchemaEnvelope = self
            .http
            .request(&ApiRequest::get(
                Service::Core,
                format!("/projects/{project_id}/schema"),
            ))
            .await?;
        debug!(
            project = %project_id,
            tables = envelope.schema.tables.len(),
            relations = envelope.schema.relations.len(),
            "Fetched schema"
        );
        Ok(envelope.schema)
    }

    pub async fn create_table(&self, project_id: &str, table: &NewTable) -> Result<Table> {
        let mut body = table.clone();
        body.layout = body.layout.rounded();
        let request = ApiRequest::post(
            Service::Core,
            format!("/projects/{project_id}/tables"),
            json!({ "table": body }),
        );
        let envelope: TableEnvelope = self.http.request(&request).await?;
        Ok(envelope.table)
    }

    pub async fn update_table(
        &self,
        project_id: &str,
        table_id: &str,
        update: &TableUpdate,
    ) -> Result<()> {
        let mut body = update.clone();
        body.layout = body.layout.map(Layout::rounded);
        let request = ApiRequest::patch(
            Service::Core,
            format!("/projects/{project_id}/tables/{table_id}"),
            json!({ "table": body }),
        );
        self.http.request_json(&request).await.map(|_| ())
    }

    pub async fn delete_table(&self, project_id: &str, table_id: &str) -> Result<()> {
        self.http
            .request_json(&ApiRequest::delete(
                Service::Core,
                format!("/projects/{project_id}/tables/{table_id}"),
            ))
            .await
            .map(|_| ())
    }

    pub async fn create_relation(
        &self,
        project_id: &str,
        draft: &RelationDraft,
    ) -> Result<Relation> {
        let request = ApiRequest::post(
            Service::Core,
            format!("/projects/{project_id}/relations"),
            json!({ "relation": draft }),
        );
        let envelope: RelationEnvelope = self.http.request(&request).await?;
        Ok(envelope.relation)
    }

    pub async fn update_relation(
        &self,
        project_id: &str,
        relation_id: &str,
        update: &RelationUpdate,
    ) -> Result<()> {
        let request = ApiRequest::patch(
            Service::Core,
            format!("/projects/{project_id}/relations/{relation_id}"),
            json!({ "relation": update }),
        );
        self.http.request_json(&request).await.map(|_| ())
    }

    pub async fn delete_relation(&self, project_id: &str, relation_id: &str) -> Result<()> {
        self.http
            .request_json(&ApiRequest::delete(
                Service::Core,
                format!("/projects/{project_id}/relations/{relation_id}"),
            ))
            .await
            .map(|_| ())
    }

    /// Parse SQL DDL server-side; returns the resulting full schema
    pub async fn import_sql(
        &self,
        project_id: &str,
        sql: &str,
        replace_existing: bool,
    ) -> Result<SchemaSnapshot> {
        let request = ApiRequest::post(
            Service::Core,
            format!("/projects/{project_id}/schema/import"),
            json!({ "replace_existing": replace_existing, "sql": sql }),
        );
        let envelope: SchemaEnvelope = self.http.request(&request).await?;
        Ok(envelope.schema)
    }
}
