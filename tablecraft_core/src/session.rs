//! Synchronization between the local stores of one project and the backend.
//!
//! Creation and deletion go to the server first and touch local state only
//! on success. Updates are applied locally first and sent afterwards; when the
//! server rejects one, the whole schema is refetched and local edits that were
//! not yet confirmed are lost.

use crate::api::{Api, Dataset, NewTable};
use crate::config::GenerationConfig;
use crate::diagram::RelationDraft;
use crate::error::{Result, TablecraftError};
use crate::generation::{
    GenerationOptions, GenerationRequest, GenerationSettingsStore, SettingsUpdate, TableSettings,
    build_generation_request,
};
use crate::schema::{
    Field, FieldUpdate, KeyType, Layout, Relation, RelationUpdate, SchemaSnapshot, SchemaStore,
    StoreError, Table, TableUpdate,
};
use crate::tablecraft_log;
use futures::future::try_join_all;
use std::collections::HashSet;
use tracing::{debug, error, info, warn};

#[derive(Debug)]
pub struct ProjectSession {
    api: Api,
    project_id: String,
    schema: SchemaStore,
    settings: GenerationSettingsStore,
    generation: GenerationConfig,
}

impl ProjectSession {
    /// Empty session; call `reload` to fetch the schema
    pub fn new(api: Api, project_id: impl Into<String>) -> Self {
        let generation = GenerationConfig::default();
        Self {
            api,
            project_id: project_id.into(),
            schema: SchemaStore::new(),
            settings: GenerationSettingsStore::new(generation.default_total_records),
            generation,
        }
    }

    pub fn with_generation_config(mut self, generation: GenerationConfig) -> Self {
        debug!(
            model = %generation.model,
            export_type = %generation.export_type,
            "Configuring session generation defaults"
        );
        self.settings = GenerationSettingsStore::new(generation.default_total_records);
        self.generation = generation;
        self
    }

    /// New session with the schema already loaded
    pub async fn open(api: Api, project_id: impl Into<String>) -> Result<Self> {
        let mut session = Self::new(api, project_id);
        session.reload().await?;
        Ok(session)
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn schema(&self) -> &SchemaStore {
        &self.schema
    }

    pub fn settings(&self) -> &GenerationSettingsStore {
        &self.settings
    }

    pub fn api(&self) -> &Api {
        &self.api
    }

    /// Replace local state with the server's schema
    pub async fn reload(&mut self) -> Result<()> {
        let snapshot = self.api.schema.get_schema(&self.project_id).await?;
        let dropped = self.adopt(snapshot);
        info!(
            project = %self.project_id,
            tables = self.schema.tables().len(),
            relations = self.schema.relations().len(),
            stale_settings = dropped,
            "Schema reloaded"
        );
        Ok(())
    }

    /// Replace the schema wholesale and drop settings of tables that vanished
    fn adopt(&mut self, snapshot: SchemaSnapshot) -> usize {
        self.schema.load_from_api(snapshot);
        let live: HashSet<&str> = self.schema.tables().keys().map(String::as_str).collect();
        self.settings.retain_tables(&live)
    }

    /// Refetch after a rejected optimistic update, then hand back the original error
    async fn rollback(&mut self, cause: TablecraftError) -> TablecraftError {
        warn!(error = %cause, "Server rejected update, reloading schema");
        if let Err(e) = self.reload().await {
            error!(error = %e, "Reload after failed update also failed");
        }
        cause
    }

    pub async fn create_table(&mut self, table: NewTable) -> Result<Table> {
        let created = self.api.schema.create_table(&self.project_id, &table).await?;
        info!(table = %created.id, name = %created.name, "Table created");
        self.schema.add_table(created.clone())?;
        Ok(created)
    }

    pub async fn update_table(&mut self, table_id: &str, update: TableUpdate) -> Result<()> {
        if update.is_empty() {
            return Ok(());
        }
        let orphaned = self.schema.update_table(table_id, update.clone())?;

        if let Err(e) = self
            .api
            .schema
            .update_table(&self.project_id, table_id, &update)
            .await
        {
            return Err(self.rollback(e).await);
        }
        self.delete_remote_relations(&orphaned).await
    }

    /// Persist a drop position; only the coordinates travel
    pub async fn move_table(&mut self, table_id: &str, layout: Layout) -> Result<()> {
        self.update_table(table_id, TableUpdate::move_to(layout.rounded()))
            .await
    }

    pub async fn rename_table(&mut self, table_id: &str, name: &str) -> Result<()> {
        self.update_table(table_id, TableUpdate::rename(name)).await
    }

    /// Remove the table on the server, then locally with its relations and settings
    pub async fn delete_table(&mut self, table_id: &str) -> Result<Vec<Relation>> {
        if self.schema.table(table_id).is_none() {
            return Err(StoreError::TableNotFound(table_id.to_string()).into());
        }
        self.api
            .schema
            .delete_table(&self.project_id, table_id)
            .await
            .inspect_err(|e| error!(table = %table_id, error = %e, "Failed to delete table"))?;

        let (_, cascaded) = self.schema.remove_table(table_id)?;
        self.settings.remove_table_settings(table_id);
        info!(
            table = %table_id,
            cascaded_relations = cascaded.len(),
            "Table deleted"
        );
        Ok(cascaded)
    }

    pub async fn add_field(&mut self, table_id: &str, field: Field) -> Result<()> {
        self.schema.add_field(table_id, field)?;
        self.push_fields(table_id).await
    }

    pub async fn update_field(
        &mut self,
        table_id: &str,
        field_id: &str,
        update: FieldUpdate,
    ) -> Result<()> {
        self.schema.update_field(table_id, field_id, update)?;
        self.push_fields(table_id).await
    }

    /// Remove a field and the relations that used it, locally and remotely
    pub async fn remove_field(&mut self, table_id: &str, field_id: &str) -> Result<Vec<Relation>> {
        let (_, cascaded) = self.schema.remove_field(table_id, field_id)?;
        self.push_fields(table_id).await?;
        self.delete_remote_relations(&cascaded).await?;
        Ok(cascaded)
    }

    async fn push_fields(&mut self, table_id: &str) -> Result<()> {
        let fields = self
            .schema
            .table(table_id)
            .map(|t| t.fields.clone())
            .ok_or_else(|| StoreError::TableNotFound(table_id.to_string()))?;
        let update = TableUpdate::with_fields(fields);
        if let Err(e) = self
            .api
            .schema
            .update_table(&self.project_id, table_id, &update)
            .await
        {
            return Err(self.rollback(e).await);
        }
        Ok(())
    }

    async fn delete_remote_relations(&mut self, relations: &[Relation]) -> Result<()> {
        if relations.is_empty() {
            return Ok(());
        }
        debug!(count = relations.len(), "Deleting orphaned relations on server");
        let api = &self.api.schema;
        let project_id = &self.project_id;
        let outcome = try_join_all(
            relations
                .iter()
                .map(|r| api.delete_relation(project_id, &r.id)),
        )
        .await;
        match outcome {
            Ok(_) => Ok(()),
            Err(e) => Err(self.rollback(e).await),
        }
    }

    /// Persist a relation drawn on the diagram
    pub async fn create_relation(&mut self, draft: RelationDraft) -> Result<Relation> {
        // Reject locally what the store would refuse after the server accepted it
        self.schema
            .table(&draft.from_table)
            .and_then(|t| t.field(&draft.from_field))
            .ok_or_else(|| StoreError::FieldNotFound {
                table_id: draft.from_table.clone(),
                field_id: draft.from_field.clone(),
            })?;
        if self.schema.field_key_type(&draft.to_table, &draft.to_field)? == KeyType::Primary {
            return Err(StoreError::KeyConflict {
                table_id: draft.to_table.clone(),
                field_id: draft.to_field.clone(),
            }
            .into());
        }

        let relation = self
            .api
            .schema
            .create_relation(&self.project_id, &draft)
            .await?;
        info!(relation = %relation.id, kind = %relation.relation_type, "Relation created");
        self.schema.add_relation(relation.clone())?;
        Ok(relation)
    }

    pub async fn update_relation(&mut self, relation_id: &str, update: RelationUpdate) -> Result<()> {
        self.schema.update_relation(relation_id, update.clone())?;
        if let Err(e) = self
            .api
            .schema
            .update_relation(&self.project_id, relation_id, &update)
            .await
        {
            return Err(self.rollback(e).await);
        }
        Ok(())
    }

    pub async fn delete_relation(&mut self, relation_id: &str) -> Result<Relation> {
        if self.schema.relation(relation_id).is_none() {
            return Err(StoreError::RelationNotFound(relation_id.to_string()).into());
        }
        self.api
            .schema
            .delete_relation(&self.project_id, relation_id)
            .await
            .inspect_err(|e| {
                error!(relation = %relation_id, error = %e, "Failed to delete relation")
            })?;
        Ok(self.schema.remove_relation(relation_id)?)
    }

    /// Import SQL DDL and adopt the schema the server returns
    pub async fn import_sql(&mut self, sql: &str, replace_existing: bool) -> Result<()> {
        let snapshot = self
            .api
            .schema
            .import_sql(&self.project_id, sql, replace_existing)
            .await?;
        let dropped = self.adopt(snapshot);
        info!(
            tables = self.schema.tables().len(),
            replace_existing,
            stale_settings = dropped,
            "Schema imported from SQL"
        );
        Ok(())
    }

    pub fn table_settings(&self, table_id: &str) -> Result<TableSettings> {
        let table = self
            .schema
            .table(table_id)
            .ok_or_else(|| StoreError::TableNotFound(table_id.to_string()))?;
        Ok(self.settings.table_settings(table_id, &table.name))
    }

    pub fn update_table_settings(
        &mut self,
        table_id: &str,
        update: SettingsUpdate,
    ) -> Result<TableSettings> {
        let name = self
            .schema
            .table(table_id)
            .map(|t| t.name.clone())
            .ok_or_else(|| StoreError::TableNotFound(table_id.to_string()))?;
        Ok(self.settings.update_table_settings(table_id, &name, update))
    }

    /// Configured defaults for model and export type
    pub fn default_generation_options(&self) -> GenerationOptions {
        GenerationOptions::builder()
            .model_name(self.generation.model.clone())
            .export_type(self.generation.export_type.clone())
            .build()
    }

    pub fn generation_request(&self, options: &GenerationOptions) -> Result<GenerationRequest> {
        Ok(build_generation_request(
            &self.project_id,
            &self.schema,
            &self.settings,
            options,
        )?)
    }

    /// Build the payload from both stores and submit it once
    pub async fn generate(&self, options: &GenerationOptions) -> Result<Dataset> {
        let request = self.generation_request(options)?;
        if request.tables.is_empty() {
            return Err(TablecraftError::config("project has no tables to generate"));
        }
        tablecraft_log!(
            serde_json::to_string_pretty(&request)?,
            "generation_request.json"
        );
        self.api.datasets.generate(&request).await
    }
}
