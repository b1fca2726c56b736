pub mod memory_store;
pub mod pg_store;
pub mod store;

pub use memory_store::InMemoryScoringStore;
pub use pg_store::PgScoringStore;
pub use store::{with_timeout, ScoringStore};
