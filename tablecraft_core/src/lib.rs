pub mod api;
pub mod config;
pub mod diagram;
pub mod error;
pub mod generation;
pub mod http;
pub mod log;
pub mod polling;
pub mod schema;
pub mod session;
pub mod storage;
pub mod token;

pub use error::{Result, TablecraftError};
pub use polling::DatasetHistoryPoller;
pub use session::ProjectSession;

pub mod prelude {
    pub use crate::api::{Api, Dataset, DatasetStatus, NewTable, Project};
    pub use crate::config::TablecraftConfig;
    pub use crate::diagram::{Connection, DiagramAdapter, RelationDraft};
    pub use crate::generation::{GenerationOptions, SettingsUpdate};
    pub use crate::http::HttpClient;
    pub use crate::schema::{Field, Layout, RelationType, SchemaStore, Table, TableUpdate};
    pub use crate::storage::{FileStorage, KeyValueStorage, MemoryStorage};
    pub use crate::token::TokenStore;
    pub use crate::{DatasetHistoryPoller, ProjectSession, Result, TablecraftError};
}
