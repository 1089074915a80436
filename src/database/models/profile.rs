use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::{HasAsset, Resource, ResourceMeta};
use crate::database::validation::ValidationErrors;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Profile {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub meta: ResourceMeta,
    pub profile_name: String,
    pub profile_picture: Option<String>,
}

impl Profile {
    pub fn new(owner: Uuid, profile_name: impl Into<String>) -> Self {
        Self {
            meta: ResourceMeta::draft(owner),
            profile_name: profile_name.into(),
            profile_picture: None,
        }
    }
}

impl Resource for Profile {
    const KIND: &'static str = "profile";
    const TABLE: &'static str = "profiles";
    const COLUMNS: &'static [&'static str] = &["profile_name", "profile_picture"];

    fn meta(&self) -> &ResourceMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ResourceMeta {
        &mut self.meta
    }

    fn column_values(&self) -> Vec<Option<String>> {
        vec![Some(self.profile_name.clone()), self.profile_picture.clone()]
    }

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = ValidationErrors::default();
        v.check(!self.profile_name.trim().is_empty(), "profile_name", "must be provided");
        v.check(
            self.profile_name.chars().count() <= 200,
            "profile_name",
            "must not be more than 200 characters long",
        );
        v.finish()
    }
}

impl HasAsset for Profile {
    fn asset_ref(&self) -> Option<&str> {
        self.profile_picture.as_deref()
    }

    fn set_asset_ref(&mut self, asset: Option<String>) {
        self.profile_picture = asset;
    }
}
