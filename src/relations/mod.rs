pub mod stats;
pub mod store;
pub mod types;

pub use store::{LogEntry, LogOperation, RelationStore};
pub use types::{relation_id, DeclareMode, Properties, Relation, RelationType};
