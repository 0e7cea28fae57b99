use super::dependency::sort_tables_by_dependencies;
use super::settings::GenerationSettingsStore;
use crate::schema::{KeyType, SchemaStore, StoreError, StoreResult};
use bon::Builder;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Builder)]
pub struct GenerationOptions {
    #[builder(into)]
    pub model_name: String,
    #[builder(into)]
    pub export_type: String,
    /// Restrict the job to these tables; all tables when absent
    pub table_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnReference {
    pub table: String,
    pub column: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
    pub is_primary_key: bool,
    pub is_foreign_key: bool,
    pub unique: bool,
    pub auto_increment: bool,
    pub via_faker: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub faker_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub references: Option<ColumnReference>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSpec {
    pub table_id: String,
    pub table_name: String,
    pub total_records: u32,
    pub query: String,
    pub examples: String,
    pub columns: Vec<ColumnSpec>,
}

/// Body of POST /datasets/generate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub project_id: String,
    pub model_name: String,
    pub export_type: String,
    /// Referenced tables first
    pub tables: Vec<TableSpec>,
}

/// Assemble one generation payload from the schema and the per-table settings
pub fn build_generation_request(
    project_id: &str,
    schema: &SchemaStore,
    settings: &GenerationSettingsStore,
    options: &GenerationOptions,
) -> StoreResult<GenerationRequest> {
    let table_ids: Vec<String> = match &options.table_ids {
        Some(ids) => {
            if let Some(missing) = ids.iter().find(|id| schema.table(id).is_none()) {
                return Err(StoreError::TableNotFound(missing.clone()));
            }
            ids.clone()
        }
        None => schema.tables().keys().cloned().collect(),
    };

    let mut tables = Vec::with_capacity(table_ids.len());
    for table_id in sort_tables_by_dependencies(schema, &table_ids) {
        let table = schema
            .table(&table_id)
            .ok_or_else(|| StoreError::TableNotFound(table_id.clone()))?;
        let table_settings = settings.table_settings(&table.id, &table.name);

        let mut columns = Vec::with_capacity(table.fields.len());
        for field in &table.fields {
            let key_type = schema.field_key_type(&table.id, &field.id)?;
            let references = schema
                .referenced_info(&table.id, &field.id)
                .and_then(|info| {
                    let source = schema.table(&info.referenced_table_id)?;
                    let column = source.field(&info.referenced_field_id)?;
                    Some(ColumnReference {
                        table: source.name.clone(),
                        column: column.name.clone(),
                    })
                });

            columns.push(ColumnSpec {
                name: field.name.clone(),
                column_type: field.field_type.clone(),
                is_primary_key: key_type == KeyType::Primary,
                is_foreign_key: key_type == KeyType::Foreign,
                unique: field.unique,
                auto_increment: field.auto_increment,
                via_faker: field.via_faker,
                faker_type: field.faker_type.clone().filter(|_| field.via_faker),
                locale: field.locale.clone(),
                references,
            });
        }

        tables.push(TableSpec {
            table_id: table.id.clone(),
            table_name: table.name.clone(),
            total_records: table_settings.total_records,
            query: table_settings.query,
            examples: table_settings.examples,
            columns,
        });
    }

    debug!(
        project = %project_id,
        tables = tables.len(),
        model = %options.model_name,
        "Built generation request"
    );

    Ok(GenerationRequest {
        project_id: project_id.to_string(),
        model_name: options.model_name.clone(),
        export_type: options.export_type.clone(),
        tables,
    })
}
