// Schema - normalized tables, fields and relations of the active project
pub mod store;
pub mod types;

pub use store::{SchemaStore, StoreError, StoreResult};
pub use types::{
    Field, FieldUpdate, KeyType, Layout, ReferencedInfo, Relation, RelationType, RelationUpdate,
    SchemaSnapshot, Table, TableUpdate,
};
