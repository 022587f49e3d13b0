//! Mapping of Clarisa records to rows of the replica tables.

use super::diff::dedup_by_key;
use crate::models::{ClarisaInstitution, Institution, LocElement, NewInstitutionLocation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Build the row stored for a newly seen institution.
pub fn map_institution(
    remote: &ClarisaInstitution,
    system_user_id: i64,
    now: DateTime<Utc>,
) -> Institution {
    Institution {
        id: remote.code,
        name: remote.name.clone(),
        acronym: remote.acronym.clone(),
        website_link: remote.website_link.clone(),
        program_id: None,
        institution_type_id: remote.institution_type.code,
        added: remote.added,
        parent_id: None,
        created_at: now,
        updated_at: Some(now),
        is_active: true,
        created_by: system_user_id,
        updated_by: Some(system_user_id),
        modification_justification: None,
    }
}

/// A country office whose ISO code has no `loc_elements` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedOffice {
    pub institution_id: i64,
    pub office_code: i64,
    pub iso_alpha_2: Option<String>,
}

/// Location candidates derived from a remote snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationCandidates {
    pub candidates: Vec<NewInstitutionLocation>,
    /// Offices skipped because their ISO code did not resolve.
    pub unresolved: Vec<UnresolvedOffice>,
}

/// Flatten country offices into location rows.
///
/// `loc_element_id` is the first element whose `iso_alpha_2` equals the
/// office's `isoAlpha2` exactly. Offices that do not resolve are left out of
/// the candidates and reported in `unresolved`. Repeated
/// `(institution_id, loc_element_id)` pairs keep their first occurrence.
pub fn build_location_candidates(
    remote: &[ClarisaInstitution],
    elements: &[LocElement],
) -> LocationCandidates {
    let mut by_iso: HashMap<&str, i64> = HashMap::new();
    for el in elements {
        if let Some(iso) = el.iso_alpha_2.as_deref() {
            by_iso.entry(iso).or_insert(el.id);
        }
    }

    let mut candidates = Vec::new();
    let mut unresolved = Vec::new();

    for inst in remote {
        for office in &inst.country_offices {
            let resolved = office
                .iso_alpha2
                .as_deref()
                .and_then(|iso| by_iso.get(iso).copied());

            match resolved {
                Some(loc_element_id) => candidates.push(NewInstitutionLocation {
                    institution_id: inst.code,
                    loc_element_id: Some(loc_element_id),
                    is_headquater: office.is_headquarter,
                    city: None,
                }),
                None => unresolved.push(UnresolvedOffice {
                    institution_id: inst.code,
                    office_code: office.code,
                    iso_alpha_2: office.iso_alpha2.clone(),
                }),
            }
        }
    }

    LocationCandidates {
        candidates: dedup_by_key(&candidates, NewInstitutionLocation::key),
        unresolved,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClarisaCountryOffice, ClarisaInstitutionType};
    use chrono::TimeZone;

    fn office(code: i64, iso: Option<&str>, hq: bool) -> ClarisaCountryOffice {
        ClarisaCountryOffice {
            code,
            is_headquarter: hq,
            iso_alpha2: iso.map(String::from),
            name: None,
        }
    }

    fn remote(code: i64, offices: Vec<ClarisaCountryOffice>) -> ClarisaInstitution {
        ClarisaInstitution {
            code,
            name: "Consiglio Nazionale delle Ricerche (Cnr)".into(),
            acronym: Some("CNR".into()),
            website_link: Some("https://www.cnr.it/it".into()),
            added: Utc.with_ymd_and_hms(2020, 10, 8, 20, 5, 59).unwrap(),
            is_active: Some(0),
            country_offices: offices,
            institution_type: ClarisaInstitutionType {
                code: 60,
                name: None,
            },
        }
    }

    #[test]
    fn test_map_institution() {
        let now = Utc.with_ymd_and_hms(2024, 3, 18, 16, 2, 55).unwrap();
        let row = map_institution(&remote(4356, vec![]), 1082, now);

        assert_eq!(row.id, 4356);
        assert_eq!(row.name, "Consiglio Nazionale delle Ricerche (Cnr)");
        assert_eq!(row.acronym.as_deref(), Some("CNR"));
        assert_eq!(row.website_link.as_deref(), Some("https://www.cnr.it/it"));
        assert_eq!(row.institution_type_id, 60);
        assert_eq!(row.added, Utc.with_ymd_and_hms(2020, 10, 8, 20, 5, 59).unwrap());
        assert_eq!(row.created_at, now);
        assert_eq!(row.updated_at, Some(now));
        assert_eq!(row.created_by, 1082);
        assert_eq!(row.updated_by, Some(1082));
        // Remote is_active is ignored; new rows are always active
        assert!(row.is_active);
        assert!(row.program_id.is_none() && row.parent_id.is_none());
    }

    #[test]
    fn test_resolves_iso_code() {
        let elements = vec![
            LocElement::country(108, "Italy", "IT"),
            LocElement::country(112, "Japan", "JP"),
        ];
        let out = build_location_candidates(
            &[remote(95, vec![office(95, Some("IT"), true)])],
            &elements,
        );

        assert_eq!(
            out.candidates,
            vec![NewInstitutionLocation {
                institution_id: 95,
                loc_element_id: Some(108),
                is_headquater: true,
                city: None,
            }]
        );
        assert!(out.unresolved.is_empty());
    }

    #[test]
    fn test_unknown_iso_code_is_skipped_and_reported() {
        let elements = vec![LocElement::country(108, "Italy", "IT")];
        let out = build_location_candidates(
            &[remote(
                7,
                vec![office(1, Some("ZZ"), true), office(2, None, false)],
            )],
            &elements,
        );

        assert!(out.candidates.is_empty());
        assert_eq!(out.unresolved.len(), 2);
        assert_eq!(out.unresolved[0].iso_alpha_2.as_deref(), Some("ZZ"));
        assert_eq!(out.unresolved[1].office_code, 2);
    }

    #[test]
    fn test_iso_match_is_case_sensitive_and_first_wins() {
        let elements = vec![
            LocElement::country(108, "Italy", "IT"),
            LocElement::country(900, "Italy (legacy)", "IT"),
        ];
        let out = build_location_candidates(
            &[remote(
                5,
                vec![office(1, Some("it"), false), office(2, Some("IT"), false)],
            )],
            &elements,
        );

        assert_eq!(out.candidates.len(), 1);
        assert_eq!(out.candidates[0].loc_element_id, Some(108));
        assert_eq!(out.unresolved.len(), 1);
    }

    #[test]
    fn test_repeated_pair_is_kept_once() {
        let elements = vec![LocElement::country(108, "Italy", "IT")];
        let out = build_location_candidates(
            &[remote(
                5,
                vec![office(1, Some("IT"), true), office(2, Some("IT"), false)],
            )],
            &elements,
        );

        assert_eq!(out.candidates.len(), 1);
        assert!(out.candidates[0].is_headquater);
    }
}
