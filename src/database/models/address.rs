use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::{Resource, ResourceMeta};
use crate::database::validation::ValidationErrors;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Address {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub meta: ResourceMeta,
    pub street: String,
    pub post_code: String,
    pub city: String,
    pub country_code: String,
}

impl Address {
    pub fn new(
        owner: Uuid,
        street: impl Into<String>,
        post_code: impl Into<String>,
        city: impl Into<String>,
        country_code: impl Into<String>,
    ) -> Self {
        Self {
            meta: ResourceMeta::draft(owner),
            street: street.into(),
            post_code: post_code.into(),
            city: city.into(),
            country_code: country_code.into(),
        }
    }
}

impl Resource for Address {
    const KIND: &'static str = "address";
    const TABLE: &'static str = "addresses";
    const COLUMNS: &'static [&'static str] = &["street", "post_code", "city", "country_code"];

    fn meta(&self) -> &ResourceMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ResourceMeta {
        &mut self.meta
    }

    fn column_values(&self) -> Vec<Option<String>> {
        vec![
            Some(self.street.clone()),
            Some(self.post_code.clone()),
            Some(self.city.clone()),
            Some(self.country_code.clone()),
        ]
    }

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = ValidationErrors::default();
        v.check(!self.street.trim().is_empty(), "street", "must be provided");
        v.check(!self.post_code.trim().is_empty(), "post_code", "must be provided");
        v.check(!self.city.trim().is_empty(), "city", "must be provided");
        v.check(!self.country_code.trim().is_empty(), "country_code", "must be provided");
        v.finish()
    }
}
