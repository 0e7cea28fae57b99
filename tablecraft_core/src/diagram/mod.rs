// Diagram - node/edge model for the schema canvas
pub mod adapter;
pub mod edge;
pub mod node;

pub use adapter::DiagramAdapter;
pub use edge::{Connection, RelationDraft, RelationEdge, edge_id, source_handle, target_handle};
pub use node::{NameEditState, NameEditor, Position, TableNode, TableNodeData};
