use super::edge::{Connection, RelationDraft, RelationEdge};
use super::node::{NameEditor, Position, TableNode};
use crate::schema::{Field, FieldUpdate, SchemaStore, TableUpdate};
use std::collections::HashMap;
use tracing::{debug, trace};

/// Derived node/edge view of a [`SchemaStore`].
///
/// Nodes and edges are disposable: `sync` rebuilds them whenever one of the
/// store's revisions moved. User gestures come back out as [`TableUpdate`]s
/// and [`RelationDraft`]s for the caller to apply and persist.
#[derive(Debug, Default)]
pub struct DiagramAdapter {
    nodes: Vec<TableNode>,
    edges: Vec<RelationEdge>,
    pending: Vec<RelationEdge>,
    seen_tables_revision: Option<u64>,
    seen_relations_revision: Option<u64>,
    name_editors: HashMap<String, NameEditor>,
    field_drafts: HashMap<(String, String), Field>,
}

impl DiagramAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_store(store: &SchemaStore) -> Self {
        let mut adapter = Self::new();
        adapter.sync(store);
        adapter
    }

    pub fn nodes(&self) -> &[TableNode] {
        &self.nodes
    }

    /// Persisted edges followed by locally drawn ones
    pub fn edges(&self) -> Vec<&RelationEdge> {
        self.edges.iter().chain(self.pending.iter()).collect()
    }

    pub fn node(&self, id: &str) -> Option<&TableNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Rebuild from the store if it changed since the last sync.
    /// Returns true when a rebuild happened.
    pub fn sync(&mut self, store: &SchemaStore) -> bool {
        let tables_changed = self.seen_tables_revision != Some(store.tables_revision());
        let relations_changed = self.seen_relations_revision != Some(store.relations_revision());
        if !tables_changed && !relations_changed {
            return false;
        }

        if tables_changed {
            self.rebuild_nodes(store);
            self.seen_tables_revision = Some(store.tables_revision());
        }
        if relations_changed {
            self.rebuild_edges(store);
            self.seen_relations_revision = Some(store.relations_revision());
        }
        debug!(
            nodes = self.nodes.len(),
            edges = self.edges.len(),
            pending = self.pending.len(),
            "Diagram resynchronized"
        );
        true
    }

    /// Rebuild unconditionally
    pub fn force_sync(&mut self, store: &SchemaStore) {
        self.seen_tables_revision = None;
        self.seen_relations_revision = None;
        self.sync(store);
    }

    fn rebuild_nodes(&mut self, store: &SchemaStore) {
        let mut tables: Vec<_> = store.tables().values().collect();
        tables.sort_by(|a, b| a.id.cmp(&b.id));
        self.nodes = tables.into_iter().map(TableNode::from).collect();

        self.name_editors.retain(|id, _| store.table(id).is_some());
        self.field_drafts.retain(|(table_id, field_id), _| {
            store
                .table(table_id)
                .is_some_and(|t| t.has_field(field_id))
        });
        self.pending
            .retain(|e| store.table(&e.source).is_some() && store.table(&e.target).is_some());

        for node in &mut self.nodes {
            let editor = self
                .name_editors
                .entry(node.id.clone())
                .or_insert_with(|| NameEditor::new(node.data.name.clone()));
            editor.sync(&node.data.name);
            node.data.name = editor.display().to_string();
        }
    }

    fn rebuild_edges(&mut self, store: &SchemaStore) {
        let mut relations: Vec<_> = store.relations().values().collect();
        relations.sort_by(|a, b| a.id.cmp(&b.id));
        self.edges = relations.into_iter().map(RelationEdge::from).collect();

        // A pending edge is resolved once the store holds the same endpoints
        let edges = &self.edges;
        self.pending.retain(|p| {
            let resolved = edges.iter().any(|e| e.id == p.id);
            if resolved {
                trace!(edge = %p.id, "Pending edge persisted");
            }
            !resolved
        });
    }

    /// Local position update while dragging
    pub fn drag_node(&mut self, node_id: &str, position: Position) {
        if let Some(node) = self.nodes.iter_mut().find(|n| n.id == node_id) {
            node.position = position;
        }
    }

    /// End of a drag: the layout change to persist
    pub fn drag_stop(&mut self, node_id: &str, position: Position) -> Option<TableUpdate> {
        let node = self.nodes.iter_mut().find(|n| n.id == node_id)?;
        node.position = position;
        trace!(node = %node_id, x = position.x, y = position.y, "Node dropped");
        Some(TableUpdate::move_to(position.into()))
    }

    /// Draw a new edge locally. The returned draft must be persisted by the caller.
    pub fn connect(&mut self, connection: &Connection) -> Option<RelationDraft> {
        if self.node(&connection.source).is_none() || self.node(&connection.target).is_none() {
            return None;
        }
        let draft = RelationDraft::from_connection(connection)?;
        let edge = draft.pending_edge();
        if self.edges().iter().any(|e| e.id == edge.id) {
            debug!(edge = %edge.id, "Connection already exists");
            return None;
        }
        self.pending.push(edge);
        Some(draft)
    }

    /// Drop a locally drawn edge, e.g. after persisting it failed
    pub fn discard_pending(&mut self, edge_id: &str) -> bool {
        let before = self.pending.len();
        self.pending.retain(|e| e.id != edge_id);
        before != self.pending.len()
    }

    pub fn name_editor(&self, node_id: &str) -> Option<&NameEditor> {
        self.name_editors.get(node_id)
    }

    /// Double-click on the table title
    pub fn begin_rename(&mut self, node_id: &str) -> bool {
        let Some(editor) = self.name_editors.get_mut(node_id) else {
            return false;
        };
        editor.begin();
        true
    }

    pub fn rename_input(&mut self, node_id: &str, text: &str) {
        if let Some(editor) = self.name_editors.get_mut(node_id) {
            editor.input(text);
            let shown = editor.display().to_string();
            self.set_node_name(node_id, shown);
        }
    }

    /// Blur or Enter
    pub fn commit_rename(&mut self, node_id: &str) -> Option<TableUpdate> {
        let editor = self.name_editors.get_mut(node_id)?;
        let committed = editor.commit();
        let shown = editor.display().to_string();
        self.set_node_name(node_id, shown);
        committed.map(TableUpdate::rename)
    }

    /// Escape
    pub fn cancel_rename(&mut self, node_id: &str) {
        if let Some(editor) = self.name_editors.get_mut(node_id) {
            editor.cancel();
            let shown = editor.display().to_string();
            self.set_node_name(node_id, shown);
        }
    }

    fn set_node_name(&mut self, node_id: &str, name: String) {
        if let Some(node) = self.nodes.iter_mut().find(|n| n.id == node_id) {
            node.data.name = name;
        }
    }

    /// Start buffering edits to one field of a node
    pub fn begin_field_edit(&mut self, node_id: &str, field_id: &str) -> bool {
        let Some(field) = self
            .node(node_id)
            .and_then(|n| n.data.fields.iter().find(|f| f.id == field_id))
            .cloned()
        else {
            return false;
        };
        self.field_drafts
            .entry((node_id.to_string(), field_id.to_string()))
            .or_insert(field);
        true
    }

    pub fn edit_field(&mut self, node_id: &str, field_id: &str, update: &FieldUpdate) -> bool {
        match self
            .field_drafts
            .get_mut(&(node_id.to_string(), field_id.to_string()))
        {
            Some(draft) => {
                update.apply(draft);
                true
            }
            None => false,
        }
    }

    pub fn field_draft(&self, node_id: &str, field_id: &str) -> Option<&Field> {
        self.field_drafts
            .get(&(node_id.to_string(), field_id.to_string()))
    }

    /// Blur or Enter on a field row: the node's full field list to persist
    pub fn commit_field_edit(&mut self, node_id: &str, field_id: &str) -> Option<TableUpdate> {
        let draft = self
            .field_drafts
            .remove(&(node_id.to_string(), field_id.to_string()))?;
        let node = self.nodes.iter_mut().find(|n| n.id == node_id)?;
        let slot = node.data.fields.iter_mut().find(|f| f.id == field_id)?;
        if *slot == draft {
            return None;
        }
        *slot = draft;
        Some(TableUpdate::with_fields(node.data.fields.clone()))
    }

    pub fn cancel_field_edit(&mut self, node_id: &str, field_id: &str) {
        self.field_drafts
            .remove(&(node_id.to_string(), field_id.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagram::edge::{source_handle, target_handle};
    use crate::schema::{Layout, Relation, RelationType, SchemaSnapshot, Table};
    use pretty_assertions::assert_eq;

    fn store() -> SchemaStore {
        SchemaStore::from_snapshot(SchemaSnapshot {
            tables: vec![
                Table {
                    id: "users".to_string(),
                    name: "users".to_string(),
                    fields: vec![Field::new("u_id", "id", "integer").primary()],
                    layout: Layout::new(10.0, 20.0),
                    meta: None,
                },
                Table {
                    id: "orders".to_string(),
                    name: "orders".to_string(),
                    fields: vec![
                        Field::new("o_id", "id", "integer").primary(),
                        Field::new("o_user", "user_id", "integer"),
                    ],
                    layout: Layout::new(300.0, 20.0),
                    meta: None,
                },
            ],
            relations: vec![],
        })
    }

    fn connection() -> Connection {
        Connection {
            source: "users".to_string(),
            target: "orders".to_string(),
            source_handle: Some(source_handle("u_id")),
            target_handle: Some(target_handle("o_user")),
        }
    }

    #[test]
    fn nodes_mirror_tables() {
        let adapter = DiagramAdapter::from_store(&store());
        let users = adapter.node("users").unwrap();
        assert_eq!(users.position, Position { x: 10.0, y: 20.0 });
        assert_eq!(users.data.fields.len(), 1);
        assert_eq!(users.node_type, "table");
        assert!(adapter.edges().is_empty());
    }

    #[test]
    fn sync_only_rebuilds_on_change() {
        let mut store = store();
        let mut adapter = DiagramAdapter::from_store(&store);
        assert!(!adapter.sync(&store));

        store.update_table("users", TableUpdate::rename("people")).unwrap();
        assert!(adapter.sync(&store));
        assert_eq!(adapter.node("users").unwrap().data.name, "people");
    }

    #[test]
    fn drag_stop_yields_layout_update() {
        let mut adapter = DiagramAdapter::from_store(&store());
        adapter.drag_node("users", Position { x: 50.0, y: 60.0 });
        let update = adapter
            .drag_stop("users", Position { x: 55.5, y: 61.0 })
            .unwrap();
        assert_eq!(update, TableUpdate::move_to(Layout::new(55.5, 61.0)));
        assert_eq!(adapter.node("users").unwrap().position.x, 55.5);
        assert!(adapter.drag_stop("ghost", Position::default()).is_none());
    }

    #[test]
    fn connect_adds_pending_edge_until_persisted() {
        let mut store = store();
        let mut adapter = DiagramAdapter::from_store(&store);

        let draft = adapter.connect(&connection()).unwrap();
        assert_eq!(adapter.edges().len(), 1);
        assert!(adapter.edges()[0].is_pending());
        assert_eq!(adapter.edges()[0].label, "1:N");

        // Same endpoints again: no duplicate
        assert!(adapter.connect(&connection()).is_none());

        store.add_relation(draft.into_relation("r1")).unwrap();
        adapter.sync(&store);
        let edges = adapter.edges();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].relation_id.as_deref(), Some("r1"));
        assert_eq!(edges[0].relation_type, RelationType::OneToMany);
    }

    #[test]
    fn discarded_pending_edge_disappears() {
        let mut adapter = DiagramAdapter::from_store(&store());
        let draft = adapter.connect(&connection()).unwrap();
        assert!(adapter.discard_pending(&draft.edge_id()));
        assert!(adapter.edges().is_empty());
    }

    #[test]
    fn rename_round_trip() {
        let mut adapter = DiagramAdapter::from_store(&store());
        assert!(adapter.begin_rename("users"));
        adapter.rename_input("users", "customers");
        assert_eq!(adapter.node("users").unwrap().data.name, "customers");

        let update = adapter.commit_rename("users").unwrap();
        assert_eq!(update, TableUpdate::rename("customers"));

        adapter.begin_rename("users");
        adapter.rename_input("users", "temp");
        adapter.cancel_rename("users");
        assert_eq!(adapter.node("users").unwrap().data.name, "customers");
    }

    #[test]
    fn rename_in_progress_survives_resync() {
        let mut store = store();
        let mut adapter = DiagramAdapter::from_store(&store);
        adapter.begin_rename("orders");
        adapter.rename_input("orders", "purchases");

        store
            .update_table("users", TableUpdate::move_to(Layout::new(0.0, 0.0)))
            .unwrap();
        adapter.sync(&store);
        assert_eq!(adapter.node("orders").unwrap().data.name, "purchases");
        assert!(adapter.name_editor("orders").unwrap().is_editing());
    }

    #[test]
    fn field_edits_are_buffered_until_commit() {
        let mut adapter = DiagramAdapter::from_store(&store());
        assert!(adapter.begin_field_edit("orders", "o_user"));
        adapter.edit_field(
            "orders",
            "o_user",
            &FieldUpdate {
                name: Some("customer_id".to_string()),
                ..Default::default()
            },
        );
        // Node untouched while buffering
        assert_eq!(adapter.node("orders").unwrap().data.fields[1].name, "user_id");
        assert_eq!(
            adapter.field_draft("orders", "o_user").unwrap().name,
            "customer_id"
        );

        let update = adapter.commit_field_edit("orders", "o_user").unwrap();
        let fields = update.fields.unwrap();
        assert_eq!(fields[1].name, "customer_id");
        assert_eq!(fields[0].name, "id");
        assert!(adapter.field_draft("orders", "o_user").is_none());
    }

    #[test]
    fn unchanged_field_commit_is_silent() {
        let mut adapter = DiagramAdapter::from_store(&store());
        adapter.begin_field_edit("orders", "o_id");
        assert!(adapter.commit_field_edit("orders", "o_id").is_none());

        adapter.begin_field_edit("orders", "o_id");
        adapter.cancel_field_edit("orders", "o_id");
        assert!(adapter.field_draft("orders", "o_id").is_none());
    }
}
