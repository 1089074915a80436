pub mod backend;
pub mod manager;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;
pub mod validation;

pub use backend::ResourceBackend;
pub use manager::{DatabaseError, DatabaseManager, Stores};
pub use memory::MemoryBackend;
pub use models::{Address, HasAsset, Profile, Resource, ResourceMeta};
pub use postgres::PgBackend;
pub use store::{GuardedStore, StoreError};
pub use validation::ValidationErrors;
