//! Rows of the local replica tables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A row of `institutions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Institution {
    /// Equal to the Clarisa `code`.
    pub id: i64,
    pub name: String,
    pub acronym: Option<String>,
    pub website_link: Option<String>,
    pub program_id: Option<i64>,
    pub institution_type_id: i64,
    pub added: DateTime<Utc>,
    pub parent_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    /// Most recent value across the table is the sync watermark.
    pub updated_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_by: i64,
    pub updated_by: Option<i64>,
    pub modification_justification: Option<String>,
}

/// A row of `institution_locations` as read back from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstitutionLocation {
    pub id: i64,
    pub institution_id: i64,
    pub loc_element_id: Option<i64>,
    pub is_headquater: bool,
    pub city: Option<String>,
}

impl InstitutionLocation {
    /// Natural key used for deduplication.
    pub fn key(&self) -> (i64, Option<i64>) {
        (self.institution_id, self.loc_element_id)
    }
}

/// A location row that has not been persisted yet (no surrogate id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewInstitutionLocation {
    pub institution_id: i64,
    pub loc_element_id: Option<i64>,
    pub is_headquater: bool,
    pub city: Option<String>,
}

impl NewInstitutionLocation {
    pub fn key(&self) -> (i64, Option<i64>) {
        (self.institution_id, self.loc_element_id)
    }
}

/// A row of the `loc_elements` reference table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocElement {
    pub id: i64,
    pub name: String,
    pub iso_alpha_2: Option<String>,
    pub iso_alpha_3: Option<String>,
    pub iso_numeric: Option<i64>,
    pub parent_id: Option<i64>,
    pub element_type_id: Option<i64>,
    pub is_active: bool,
}

impl LocElement {
    /// Minimal country element, handy for seeding.
    pub fn country(id: i64, name: impl Into<String>, iso_alpha_2: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            iso_alpha_2: Some(iso_alpha_2.into()),
            iso_alpha_3: None,
            iso_numeric: None,
            parent_id: None,
            element_type_id: Some(2),
            is_active: true,
        }
    }
}
