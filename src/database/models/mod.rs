pub mod address;
pub mod profile;

pub use address::Address;
pub use profile::Profile;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, FromRow};
use uuid::Uuid;

use super::validation::ValidationErrors;

/// Columns every resource table carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ResourceMeta {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub owner: Uuid,
    pub version: i32,
}

impl ResourceMeta {
    /// Metadata for a row that has not been inserted yet; the store assigns
    /// `id`, `created_at` and `version`.
    pub fn draft(owner: Uuid) -> Self {
        Self {
            id: Uuid::nil(),
            created_at: Utc::now(),
            owner,
            version: 0,
        }
    }
}

/// A versioned, owner-bound row.
///
/// `COLUMNS` lists the mutable columns in the same order `column_values`
/// returns them; both are fixed per type, never derived from input.
pub trait Resource:
    Clone + Send + Sync + Unpin + Serialize + for<'r> FromRow<'r, PgRow> + 'static
{
    const KIND: &'static str;
    const TABLE: &'static str;
    const COLUMNS: &'static [&'static str];

    fn meta(&self) -> &ResourceMeta;
    fn meta_mut(&mut self) -> &mut ResourceMeta;
    fn column_values(&self) -> Vec<Option<String>>;
    fn validate(&self) -> Result<(), ValidationErrors>;
}

/// A resource carrying a reference to one stored file.
pub trait HasAsset: Resource {
    fn asset_ref(&self) -> Option<&str>;
    fn set_asset_ref(&mut self, asset: Option<String>);
}
