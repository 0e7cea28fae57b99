use super::types::{
    Field, FieldUpdate, KeyType, ReferencedInfo, Relation, RelationUpdate, SchemaSnapshot, Table,
    TableUpdate,
};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Field {field_id} not found in table {table_id}")]
    FieldNotFound { table_id: String, field_id: String },

    #[error("Relation not found: {0}")]
    RelationNotFound(String),

    #[error("Table already exists: {0}")]
    DuplicateTable(String),

    #[error("Field {field_id} already exists in table {table_id}")]
    DuplicateField { table_id: String, field_id: String },

    #[error("Relation already exists: {0}")]
    DuplicateRelation(String),

    #[error("Field {field_id} of table {table_id} cannot be both primary and foreign key")]
    KeyConflict { table_id: String, field_id: String },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::TableNotFound(_)
                | StoreError::FieldNotFound { .. }
                | StoreError::RelationNotFound(_)
        )
    }

    fn field_not_found(table_id: &str, field_id: &str) -> Self {
        StoreError::FieldNotFound {
            table_id: table_id.to_string(),
            field_id: field_id.to_string(),
        }
    }

    fn key_conflict(table_id: &str, field_id: &str) -> Self {
        StoreError::KeyConflict {
            table_id: table_id.to_string(),
            field_id: field_id.to_string(),
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Canonical tables and relations of the active project.
///
/// Both collections carry a revision counter that moves whenever the
/// collection changes, so derived views know when to rebuild.
#[derive(Debug, Clone, Default)]
pub struct SchemaStore {
    tables: HashMap<String, Table>,
    relations: HashMap<String, Relation>,
    tables_revision: u64,
    relations_revision: u64,
}

impl SchemaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: SchemaSnapshot) -> Self {
        let mut store = Self::new();
        store.load_from_api(snapshot);
        store
    }

    pub fn tables(&self) -> &HashMap<String, Table> {
        &self.tables
    }

    pub fn relations(&self) -> &HashMap<String, Relation> {
        &self.relations
    }

    pub fn table(&self, id: &str) -> Option<&Table> {
        self.tables.get(id)
    }

    pub fn relation(&self, id: &str) -> Option<&Relation> {
        self.relations.get(id)
    }

    pub fn tables_revision(&self) -> u64 {
        self.tables_revision
    }

    pub fn relations_revision(&self) -> u64 {
        self.relations_revision
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.relations.is_empty()
    }

    /// Replace the whole schema with a server snapshot
    pub fn load_from_api(&mut self, snapshot: SchemaSnapshot) {
        debug!(
            tables = snapshot.tables.len(),
            relations = snapshot.relations.len(),
            "Loading schema snapshot"
        );
        self.tables = snapshot
            .tables
            .into_iter()
            .map(|t| (t.id.clone(), t))
            .collect();
        let tables = &self.tables;
        self.relations = snapshot
            .relations
            .into_iter()
            .filter(|r| {
                let onto_primary = tables
                    .get(&r.to_table)
                    .and_then(|t| t.field(&r.to_field))
                    .is_some_and(|f| f.is_primary_key);
                if onto_primary {
                    warn!(
                        relation = %r.id,
                        table = %r.to_table,
                        field = %r.to_field,
                        "Skipping relation onto a primary key"
                    );
                }
                !onto_primary
            })
            .map(|r| (r.id.clone(), r))
            .collect();

        let table_ids: Vec<String> = self.tables.keys().cloned().collect();
        for table_id in table_ids {
            self.sync_foreign_key_flags(&table_id);
        }
        self.bump_tables();
        self.bump_relations();
    }

    /// Current state as a snapshot, ordered by id
    pub fn snapshot(&self) -> SchemaSnapshot {
        let mut tables: Vec<Table> = self.tables.values().cloned().collect();
        tables.sort_by(|a, b| a.id.cmp(&b.id));
        let mut relations: Vec<Relation> = self.relations.values().cloned().collect();
        relations.sort_by(|a, b| a.id.cmp(&b.id));
        SchemaSnapshot { tables, relations }
    }

    pub fn add_table(&mut self, table: Table) -> StoreResult<()> {
        if self.tables.contains_key(&table.id) {
            return Err(StoreError::DuplicateTable(table.id));
        }
        trace!(table = %table.id, "Adding table");
        let table_id = table.id.clone();
        self.tables.insert(table_id.clone(), table);
        self.sync_foreign_key_flags(&table_id);
        self.bump_tables();
        Ok(())
    }

    /// Shallow merge. Replacing `fields` drops relations whose endpoint
    /// field disappeared; those relations are returned.
    pub fn update_table(&mut self, id: &str, update: TableUpdate) -> StoreResult<Vec<Relation>> {
        let table = self
            .tables
            .get(id)
            .ok_or_else(|| StoreError::TableNotFound(id.to_string()))?;

        if let Some(fields) = &update.fields {
            let kept: HashSet<&str> = fields.iter().map(|f| f.id.as_str()).collect();
            if kept.len() != fields.len() {
                let duplicate = fields
                    .iter()
                    .find(|f| fields.iter().filter(|o| o.id == f.id).count() > 1)
                    .map(|f| f.id.clone())
                    .unwrap_or_default();
                return Err(StoreError::DuplicateField {
                    table_id: id.to_string(),
                    field_id: duplicate,
                });
            }
            for field in fields.iter().filter(|f| f.is_primary_key) {
                if self.is_targeted(id, &field.id) {
                    return Err(StoreError::key_conflict(id, &field.id));
                }
            }
            trace!(table = %table.id, fields = fields.len(), "Replacing field list");
        }

        let table = self
            .tables
            .get_mut(id)
            .ok_or_else(|| StoreError::TableNotFound(id.to_string()))?;
        if let Some(name) = update.name {
            table.name = name;
        }
        if let Some(layout) = update.layout {
            table.layout = layout;
        }
        if let Some(meta) = update.meta {
            table.meta = Some(meta);
        }

        let mut orphaned = Vec::new();
        if let Some(fields) = update.fields {
            table.fields = fields;
            let remaining: HashSet<String> = table.fields.iter().map(|f| f.id.clone()).collect();
            let dangling: Vec<String> = self
                .relations
                .values()
                .filter(|r| {
                    (r.from_table == id && !remaining.contains(&r.from_field))
                        || (r.to_table == id && !remaining.contains(&r.to_field))
                })
                .map(|r| r.id.clone())
                .collect();
            orphaned = self.drop_relations(&dangling);
            self.sync_foreign_key_flags(id);
        }

        self.bump_tables();
        Ok(orphaned)
    }

    /// Remove a table together with every relation touching it
    pub fn remove_table(&mut self, id: &str) -> StoreResult<(Table, Vec<Relation>)> {
        let table = self
            .tables
            .remove(id)
            .ok_or_else(|| StoreError::TableNotFound(id.to_string()))?;

        let touching: Vec<String> = self
            .relations
            .values()
            .filter(|r| r.touches_table(id))
            .map(|r| r.id.clone())
            .collect();
        let removed = self.drop_relations(&touching);
        debug!(
            table = %id,
            cascaded_relations = removed.len(),
            "Removed table"
        );

        self.bump_tables();
        Ok((table, removed))
    }

    pub fn add_field(&mut self, table_id: &str, mut field: Field) -> StoreResult<()> {
        let table = self
            .tables
            .get_mut(table_id)
            .ok_or_else(|| StoreError::TableNotFound(table_id.to_string()))?;
        if table.has_field(&field.id) {
            return Err(StoreError::DuplicateField {
                table_id: table_id.to_string(),
                field_id: field.id,
            });
        }
        // Nothing can reference a field that did not exist yet
        field.is_foreign_key = false;
        table.fields.push(field);
        self.bump_tables();
        Ok(())
    }

    pub fn update_field(
        &mut self,
        table_id: &str,
        field_id: &str,
        update: FieldUpdate,
    ) -> StoreResult<()> {
        let targeted = self.is_targeted(table_id, field_id);
        let table = self
            .tables
            .get_mut(table_id)
            .ok_or_else(|| StoreError::TableNotFound(table_id.to_string()))?;
        let field = table
            .field_mut(field_id)
            .ok_or_else(|| StoreError::field_not_found(table_id, field_id))?;

        if update.is_primary_key == Some(true) && targeted {
            return Err(StoreError::key_conflict(table_id, field_id));
        }

        update.apply(field);
        self.bump_tables();
        Ok(())
    }

    /// Remove a field and every relation using it as an endpoint
    pub fn remove_field(
        &mut self,
        table_id: &str,
        field_id: &str,
    ) -> StoreResult<(Field, Vec<Relation>)> {
        let table = self
            .tables
            .get_mut(table_id)
            .ok_or_else(|| StoreError::TableNotFound(table_id.to_string()))?;
        let position = table
            .fields
            .iter()
            .position(|f| f.id == field_id)
            .ok_or_else(|| StoreError::field_not_found(table_id, field_id))?;
        let field = table.fields.remove(position);

        let touching: Vec<String> = self
            .relations
            .values()
            .filter(|r| r.touches_field(table_id, field_id))
            .map(|r| r.id.clone())
            .collect();
        let removed = self.drop_relations(&touching);

        self.bump_tables();
        Ok((field, removed))
    }

    pub fn add_relation(&mut self, relation: Relation) -> StoreResult<()> {
        if self.relations.contains_key(&relation.id) {
            return Err(StoreError::DuplicateRelation(relation.id));
        }
        self.require_field(&relation.from_table, &relation.from_field)?;
        let target = self.require_field(&relation.to_table, &relation.to_field)?;
        if target.is_primary_key {
            return Err(StoreError::key_conflict(
                &relation.to_table,
                &relation.to_field,
            ));
        }

        trace!(
            relation = %relation.id,
            from = %format!("{}.{}", relation.from_table, relation.from_field),
            to = %format!("{}.{}", relation.to_table, relation.to_field),
            "Adding relation"
        );
        let to_table = relation.to_table.clone();
        self.relations.insert(relation.id.clone(), relation);
        self.sync_foreign_key_flags(&to_table);
        self.bump_relations();
        self.bump_tables();
        Ok(())
    }

    pub fn update_relation(&mut self, id: &str, update: RelationUpdate) -> StoreResult<()> {
        let relation = self
            .relations
            .get_mut(id)
            .ok_or_else(|| StoreError::RelationNotFound(id.to_string()))?;
        if let Some(relation_type) = update.relation_type {
            relation.relation_type = relation_type;
        }
        if let Some(handle) = update.from_handle {
            relation.from_handle = Some(handle);
        }
        if let Some(handle) = update.to_handle {
            relation.to_handle = Some(handle);
        }
        self.bump_relations();
        Ok(())
    }

    pub fn remove_relation(&mut self, id: &str) -> StoreResult<Relation> {
        let mut removed = self.drop_relations(&[id.to_string()]);
        let relation = removed
            .pop()
            .ok_or_else(|| StoreError::RelationNotFound(id.to_string()))?;
        self.bump_tables();
        Ok(relation)
    }

    /// Primary if flagged, foreign if some relation targets the field,
    /// regular otherwise
    pub fn field_key_type(&self, table_id: &str, field_id: &str) -> StoreResult<KeyType> {
        let field = self.require_field(table_id, field_id)?;
        if field.is_primary_key {
            Ok(KeyType::Primary)
        } else if self.is_targeted(table_id, field_id) {
            Ok(KeyType::Foreign)
        } else {
            Ok(KeyType::Regular)
        }
    }

    /// Source endpoint of the relation targeting this field. Linear in the
    /// number of relations.
    pub fn referenced_info(&self, table_id: &str, field_id: &str) -> Option<ReferencedInfo> {
        self.relations
            .values()
            .find(|r| r.targets(table_id, field_id))
            .map(|r| ReferencedInfo {
                referenced_table_id: r.from_table.clone(),
                referenced_field_id: r.from_field.clone(),
            })
    }

    pub fn relations_for_table(&self, table_id: &str) -> Vec<&Relation> {
        let mut relations: Vec<&Relation> = self
            .relations
            .values()
            .filter(|r| r.touches_table(table_id))
            .collect();
        relations.sort_by(|a, b| a.id.cmp(&b.id));
        relations
    }

    fn require_field(&self, table_id: &str, field_id: &str) -> StoreResult<&Field> {
        self.tables
            .get(table_id)
            .ok_or_else(|| StoreError::TableNotFound(table_id.to_string()))?
            .field(field_id)
            .ok_or_else(|| StoreError::field_not_found(table_id, field_id))
    }

    fn is_targeted(&self, table_id: &str, field_id: &str) -> bool {
        self.relations.values().any(|r| r.targets(table_id, field_id))
    }

    /// Remove relations by id, fixing the foreign-key flags they leave behind
    fn drop_relations(&mut self, ids: &[String]) -> Vec<Relation> {
        let removed: Vec<Relation> = ids
            .iter()
            .filter_map(|id| self.relations.remove(id))
            .collect();
        if removed.is_empty() {
            return removed;
        }

        let affected: HashSet<String> = removed.iter().map(|r| r.to_table.clone()).collect();
        for table_id in affected {
            self.sync_foreign_key_flags(&table_id);
        }
        self.bump_relations();
        removed
    }

    fn sync_foreign_key_flags(&mut self, table_id: &str) {
        let targeted: HashSet<String> = self
            .relations
            .values()
            .filter(|r| r.to_table == table_id)
            .map(|r| r.to_field.clone())
            .collect();
        if let Some(table) = self.tables.get_mut(table_id) {
            for field in &mut table.fields {
                field.is_foreign_key = targeted.contains(&field.id);
            }
        }
    }

    fn bump_tables(&mut self) {
        self.tables_revision = self.tables_revision.wrapping_add(1);
    }

    fn bump_relations(&mut self) {
        self.relations_revision = self.relations_revision.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Layout, RelationType};
    use pretty_assertions::assert_eq;

    fn table(id: &str, fields: Vec<Field>) -> Table {
        Table {
            id: id.to_string(),
            name: id.to_string(),
            fields,
            layout: Layout::default(),
            meta: None,
        }
    }

    fn relation(id: &str, from: (&str, &str), to: (&str, &str)) -> Relation {
        Relation {
            id: id.to_string(),
            from_table: from.0.to_string(),
            from_field: from.1.to_string(),
            to_table: to.0.to_string(),
            to_field: to.1.to_string(),
            relation_type: RelationType::OneToMany,
            from_handle: None,
            to_handle: None,
        }
    }

    fn users_and_orders() -> SchemaStore {
        let mut store = SchemaStore::new();
        store
            .add_table(table(
                "users",
                vec![
                    Field::new("u_id", "id", "integer").primary(),
                    Field::new("u_email", "email", "varchar"),
                ],
            ))
            .unwrap();
        store
            .add_table(table(
                "orders",
                vec![
                    Field::new("o_id", "id", "integer").primary(),
                    Field::new("o_user", "user_id", "integer"),
                    Field::new("o_total", "total", "numeric"),
                ],
            ))
            .unwrap();
        store
    }

    #[test]
    fn fresh_fields_are_regular_unless_flagged() {
        let store = users_and_orders();
        assert_eq!(store.field_key_type("users", "u_email"), Ok(KeyType::Regular));
        assert_eq!(store.field_key_type("users", "u_id"), Ok(KeyType::Primary));
        assert_eq!(store.field_key_type("orders", "o_user"), Ok(KeyType::Regular));
    }

    #[test]
    fn relation_marks_target_as_foreign() {
        let mut store = users_and_orders();
        store
            .add_relation(relation("r1", ("users", "u_id"), ("orders", "o_user")))
            .unwrap();

        assert_eq!(store.field_key_type("orders", "o_user"), Ok(KeyType::Foreign));
        assert_eq!(
            store.referenced_info("orders", "o_user"),
            Some(ReferencedInfo {
                referenced_table_id: "users".to_string(),
                referenced_field_id: "u_id".to_string(),
            })
        );
        assert!(store.table("orders").unwrap().field("o_user").unwrap().is_foreign_key);
    }

    #[test]
    fn removing_relation_clears_flag() {
        let mut store = users_and_orders();
        store
            .add_relation(relation("r1", ("users", "u_id"), ("orders", "o_user")))
            .unwrap();
        store.remove_relation("r1").unwrap();

        assert_eq!(store.field_key_type("orders", "o_user"), Ok(KeyType::Regular));
        assert!(!store.table("orders").unwrap().field("o_user").unwrap().is_foreign_key);
        assert_eq!(store.referenced_info("orders", "o_user"), None);
    }

    #[test]
    fn snapshot_relations_onto_primary_keys_are_skipped() {
        let snapshot = SchemaSnapshot {
            tables: vec![
                table("a", vec![Field::new("a_id", "id", "int").primary()]),
                table("b", vec![Field::new("b_id", "id", "int").primary()]),
            ],
            relations: vec![relation("r1", ("a", "a_id"), ("b", "b_id"))],
        };

        let store = SchemaStore::from_snapshot(snapshot);

        assert!(store.relations().is_empty());
        let b_id = store.table("b").unwrap().field("b_id").unwrap();
        assert!(b_id.is_primary_key);
        assert!(!b_id.is_foreign_key);
        assert_eq!(store.field_key_type("b", "b_id").unwrap(), KeyType::Primary);
    }

    #[test]
    fn remove_table_cascades_relations() {
        let mut store = users_and_orders();
        store
            .add_relation(relation("r1", ("users", "u_id"), ("orders", "o_user")))
            .unwrap();

        let (removed_table, cascaded) = store.remove_table("users").unwrap();
        assert_eq!(removed_table.id, "users");
        assert_eq!(cascaded.len(), 1);
        assert!(store.relations().is_empty());
        assert!(!store.table("orders").unwrap().field("o_user").unwrap().is_foreign_key);
    }

    #[test]
    fn remove_field_cascades_relations() {
        let mut store = users_and_orders();
        store
            .add_relation(relation("r1", ("users", "u_id"), ("orders", "o_user")))
            .unwrap();

        let (field, cascaded) = store.remove_field("orders", "o_user").unwrap();
        assert_eq!(field.name, "user_id");
        assert_eq!(cascaded[0].id, "r1");
        assert!(store.relation("r1").is_none());
    }

    #[test]
    fn replacing_fields_drops_orphaned_relations() {
        let mut store = users_and_orders();
        store
            .add_relation(relation("r1", ("users", "u_id"), ("orders", "o_user")))
            .unwrap();

        let fields = vec![Field::new("o_id", "id", "integer").primary()];
        let orphaned = store
            .update_table("orders", TableUpdate::with_fields(fields))
            .unwrap();
        assert_eq!(orphaned.len(), 1);
        assert!(store.relations().is_empty());
    }

    #[test]
    fn primary_and_foreign_are_exclusive() {
        let mut store = users_and_orders();

        // Target already primary
        let err = store
            .add_relation(relation("r1", ("users", "u_id"), ("orders", "o_id")))
            .unwrap_err();
        assert!(matches!(err, StoreError::KeyConflict { .. }));

        store
            .add_relation(relation("r2", ("users", "u_id"), ("orders", "o_user")))
            .unwrap();
        let err = store
            .update_field(
                "orders",
                "o_user",
                FieldUpdate {
                    is_primary_key: Some(true),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::KeyConflict { .. }));
        assert_eq!(store.field_key_type("orders", "o_user"), Ok(KeyType::Foreign));
    }

    #[test]
    fn invalid_ids_are_reported() {
        let mut store = users_and_orders();
        assert_eq!(
            store.update_table("ghost", TableUpdate::rename("x")),
            Err(StoreError::TableNotFound("ghost".to_string()))
        );
        assert!(matches!(
            store.remove_field("users", "ghost"),
            Err(StoreError::FieldNotFound { .. })
        ));
        assert!(matches!(
            store.remove_relation("ghost"),
            Err(StoreError::RelationNotFound(_))
        ));
        assert!(matches!(
            store.add_relation(relation("r", ("users", "u_id"), ("ghost", "f"))),
            Err(StoreError::TableNotFound(_))
        ));
        assert!(store.field_key_type("users", "ghost").unwrap_err().is_not_found());
    }

    #[test]
    fn update_table_merges_shallowly() {
        let mut store = users_and_orders();
        let before_fields = store.table("users").unwrap().fields.clone();

        store
            .update_table("users", TableUpdate::move_to(Layout::new(120.0, 40.0)))
            .unwrap();
        store.update_table("users", TableUpdate::rename("customers")).unwrap();

        let users = store.table("users").unwrap();
        assert_eq!(users.name, "customers");
        assert_eq!(users.layout, Layout::new(120.0, 40.0));
        assert_eq!(users.fields, before_fields);
    }

    #[test]
    fn load_from_api_is_idempotent() {
        let mut source = users_and_orders();
        source
            .add_relation(relation("r1", ("users", "u_id"), ("orders", "o_user")))
            .unwrap();
        let snapshot = source.snapshot();

        let mut store = SchemaStore::new();
        store.load_from_api(snapshot.clone());
        let (tables, relations) = (store.tables().clone(), store.relations().clone());
        store.load_from_api(snapshot);

        assert_eq!(store.tables(), &tables);
        assert_eq!(store.relations(), &relations);
    }

    #[test]
    fn load_from_api_replaces_everything() {
        let mut store = users_and_orders();
        let tables_rev = store.tables_revision();
        let relations_rev = store.relations_revision();

        store.load_from_api(SchemaSnapshot {
            tables: vec![table("solo", vec![])],
            relations: vec![],
        });

        assert_eq!(store.tables().len(), 1);
        assert!(store.table("users").is_none());
        assert!(store.tables_revision() > tables_rev);
        assert!(store.relations_revision() > relations_rev);
    }

    #[test]
    fn revisions_track_collections_separately() {
        let mut store = users_and_orders();
        let relations_rev = store.relations_revision();
        store.update_table("users", TableUpdate::rename("people")).unwrap();
        assert_eq!(store.relations_revision(), relations_rev);

        let tables_rev = store.tables_revision();
        store
            .add_relation(relation("r1", ("users", "u_id"), ("orders", "o_user")))
            .unwrap();
        store
            .update_relation(
                "r1",
                RelationUpdate {
                    relation_type: Some(RelationType::OneToOne),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(store.relations_revision() > relations_rev);
        assert!(store.tables_revision() > tables_rev);
        assert_eq!(store.relation("r1").unwrap().relation_type, RelationType::OneToOne);
    }
}
