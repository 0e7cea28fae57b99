use crate::schema::{Relation, RelationType};
use serde::{Deserialize, Serialize};

const SOURCE_HANDLE_SUFFIX: &str = "-source";
const TARGET_HANDLE_SUFFIX: &str = "-target";

pub fn source_handle(field_id: &str) -> String {
    format!("{field_id}{SOURCE_HANDLE_SUFFIX}")
}

pub fn target_handle(field_id: &str) -> String {
    format!("{field_id}{TARGET_HANDLE_SUFFIX}")
}

/// Field id behind a handle id, with or without the side suffix
pub fn field_of_handle(handle: &str) -> &str {
    handle
        .strip_suffix(SOURCE_HANDLE_SUFFIX)
        .or_else(|| handle.strip_suffix(TARGET_HANDLE_SUFFIX))
        .unwrap_or(handle)
}

pub fn edge_id(from_table: &str, from_field: &str, to_table: &str, to_field: &str) -> String {
    format!("{from_table}-{from_field}-{to_table}-{to_field}")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub source_handle: String,
    pub target_handle: String,
    pub label: String,
    pub relation_type: RelationType,
    /// None while the edge was drawn locally and not yet persisted
    pub relation_id: Option<String>,
}

impl RelationEdge {
    pub fn is_pending(&self) -> bool {
        self.relation_id.is_none()
    }
}

impl From<&Relation> for RelationEdge {
    fn from(relation: &Relation) -> Self {
        Self {
            id: edge_id(
                &relation.from_table,
                &relation.from_field,
                &relation.to_table,
                &relation.to_field,
            ),
            source: relation.from_table.clone(),
            target: relation.to_table.clone(),
            source_handle: relation
                .from_handle
                .clone()
                .unwrap_or_else(|| source_handle(&relation.from_field)),
            target_handle: relation
                .to_handle
                .clone()
                .unwrap_or_else(|| target_handle(&relation.to_field)),
            label: relation.relation_type.label().to_string(),
            relation_type: relation.relation_type,
            relation_id: Some(relation.id.clone()),
        }
    }
}

/// A connection drawn by the user between two handles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub source: String,
    pub target: String,
    pub source_handle: Option<String>,
    pub target_handle: Option<String>,
}

/// Relation awaiting a server-issued id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationDraft {
    pub from_table: String,
    pub to_table: String,
    pub from_field: String,
    pub to_field: String,
    #[serde(rename = "type")]
    pub relation_type: RelationType,
    pub from_handle: String,
    pub to_handle: String,
}

impl RelationDraft {
    pub fn from_connection(connection: &Connection) -> Option<Self> {
        let from_handle = connection.source_handle.clone()?;
        let to_handle = connection.target_handle.clone()?;
        Some(Self {
            from_table: connection.source.clone(),
            to_table: connection.target.clone(),
            from_field: field_of_handle(&from_handle).to_string(),
            to_field: field_of_handle(&to_handle).to_string(),
            relation_type: RelationType::OneToMany,
            from_handle,
            to_handle,
        })
    }

    pub fn edge_id(&self) -> String {
        edge_id(
            &self.from_table,
            &self.from_field,
            &self.to_table,
            &self.to_field,
        )
    }

    pub fn into_relation(self, id: impl Into<String>) -> Relation {
        Relation {
            id: id.into(),
            from_table: self.from_table,
            to_table: self.to_table,
            from_field: self.from_field,
            to_field: self.to_field,
            relation_type: self.relation_type,
            from_handle: Some(self.from_handle),
            to_handle: Some(self.to_handle),
        }
    }

    pub(crate) fn pending_edge(&self) -> RelationEdge {
        RelationEdge {
            id: self.edge_id(),
            source: self.from_table.clone(),
            target: self.to_table.clone(),
            source_handle: self.from_handle.clone(),
            target_handle: self.to_handle.clone(),
            label: self.relation_type.label().to_string(),
            relation_type: self.relation_type,
            relation_id: None,
        }
    }
}
