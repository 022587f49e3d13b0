//! Wire shapes returned by the Clarisa `institutions` endpoint.
//!
//! Decoding is strict: required fields must be present with the right type,
//! so a changed upstream payload fails the fetch instead of leaking missing
//! values into the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// An institution as published by Clarisa.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClarisaInstitution {
    /// Stable natural key; becomes the local `institutions.id`.
    pub code: i64,
    pub name: String,
    #[serde(default)]
    pub acronym: Option<String>,
    #[serde(default)]
    pub website_link: Option<String>,
    /// Creation time on the Clarisa side.
    pub added: DateTime<Utc>,
    #[serde(default, rename = "is_active")]
    pub is_active: Option<i64>,
    #[serde(rename = "countryOfficeDTO")]
    pub country_offices: Vec<ClarisaCountryOffice>,
    pub institution_type: ClarisaInstitutionType,
}

/// One country office of an institution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClarisaCountryOffice {
    pub code: i64,
    #[serde(deserialize_with = "bool_from_flag")]
    pub is_headquarter: bool,
    #[serde(default)]
    pub iso_alpha2: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClarisaInstitutionType {
    pub code: i64,
    #[serde(default)]
    pub name: Option<String>,
}

/// Accepts `0`/`1` as well as JSON booleans.
fn bool_from_flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => Ok(b),
        Flag::Int(0) => Ok(false),
        Flag::Int(1) => Ok(true),
        Flag::Int(other) => Err(serde::de::Error::custom(format!(
            "expected 0 or 1, got {}",
            other
        ))),
    }
}
