// Generation - per-table settings and the payload for synthetic-data jobs
pub mod dependency;
pub mod request;
pub mod settings;

pub use dependency::sort_tables_by_dependencies;
pub use request::{
    ColumnReference, ColumnSpec, GenerationOptions, GenerationRequest, TableSpec,
    build_generation_request,
};
pub use settings::{DEFAULT_TOTAL_RECORDS, GenerationSettingsStore, SettingsUpdate, TableSettings};
