//! Secure case identifiers.
//!
//! A case carries two identifiers minted together:
//!
//! - a public display identifier `LC-{CODE}-{YEAR}-{12 HEX}` shown to users
//!   and accepted by every case-scoped endpoint;
//! - an internal correlation key (random v4 UUID) used for every foreign-key
//!   relationship and never rendered on a public surface.
//!
//! Uniqueness is enforced by the store's unique constraint, not here.
//! Callers treat a constraint violation on insert as a retry condition.

use std::fmt;
use std::sync::LazyLock;

use chrono::{Datelike, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::enterprise::types::PracticeArea;
use crate::error::EnterpriseError;

pub const CASE_ID_PREFIX: &str = "LC";

/// Number of random bytes behind the 12-hex-character suffix.
const SUFFIX_BYTES: usize = 6;

/// How many times an insert is retried after a display-id collision.
pub const MAX_MINT_ATTEMPTS: usize = 3;

static CASE_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^LC-[A-Z]+-(20[0-9]{2})-[A-F0-9]{12}$").expect("valid case id pattern")
});

/// Internal key linking a case to its messages, documents and audit entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationKey(Uuid);

impl CorrelationKey {
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw).ok().map(Self)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Freshly minted identifier pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseIdentifier {
    pub display_id: String,
    pub correlation_key: CorrelationKey,
}

/// Mint an identifier for `area` stamped with the current calendar year.
pub fn generate(area: PracticeArea) -> CaseIdentifier {
    generate_for_year(area, Utc::now().year())
}

/// Mint an identifier for a practice area given as its stored name
/// (e.g. `"REAL_ESTATE"`).
pub fn generate_from_str(raw: &str) -> Result<CaseIdentifier, EnterpriseError> {
    let area: PracticeArea = raw.parse()?;
    Ok(generate(area))
}

pub fn generate_for_year(area: PracticeArea, year: i32) -> CaseIdentifier {
    CaseIdentifier {
        display_id: format!(
            "{CASE_ID_PREFIX}-{}-{year}-{}",
            area.code(),
            random_suffix()
        ),
        correlation_key: CorrelationKey::new_random(),
    }
}

fn random_suffix() -> String {
    let mut bytes = [0u8; SUFFIX_BYTES];
    OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02X}")).collect()
}

/// Whether `display_id` matches the display identifier grammar exactly.
pub fn validate(display_id: &str) -> bool {
    CASE_ID_PATTERN.is_match(display_id)
}

/// Boundary check for identifier-accepting entry points.
pub fn ensure_valid(display_id: &str) -> Result<&str, EnterpriseError> {
    if validate(display_id) {
        Ok(display_id)
    } else {
        Err(EnterpriseError::InvalidIdentifierFormat(
            display_id.to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn every_practice_area_generates_a_valid_id() {
        for area in PracticeArea::ALL {
            let id = generate(area);
            assert!(validate(&id.display_id), "invalid id {}", id.display_id);
            assert!(id.display_id.starts_with(&format!("LC-{}-", area.code())));
        }
    }

    #[test]
    fn family_2025_matches_expected_shape() {
        let id = generate_for_year(PracticeArea::Family, 2025);
        let pattern = Regex::new(r"^LC-FAMILY-2025-[A-F0-9]{12}$").unwrap();
        assert!(pattern.is_match(&id.display_id), "{}", id.display_id);
        assert!(validate(&id.display_id));
    }

    #[test]
    fn generate_from_str_rejects_unknown_areas() {
        let err = generate_from_str("MARITIME").unwrap_err();
        assert_eq!(err.kind(), "invalid_practice_area");
        assert!(generate_from_str("PERSONAL_INJURY").is_ok());
    }

    #[test]
    fn validate_rejects_malformed_ids() {
        assert!(validate("LC-FAMILY-2025-AB12CD34EF56"));
        assert!(!validate("LC-FAMILY-25-ABCDEF123456"));
        assert!(!validate("LC-FAMILY-1999-ABCDEF123456"));
        assert!(!validate("LC-FAMILY-2025-abcdef123456"));
        assert!(!validate("LC-FAMILY-2025-ABCDEF12345"));
        assert!(!validate("LC-FAMILY-2025-ABCDEF1234567"));
        assert!(!validate("XX-FAMILY-2025-ABCDEF123456"));
        assert!(!validate("LC-REAL_ESTATE-2025-ABCDEF123456"));
        assert!(!validate(" LC-FAMILY-2025-ABCDEF123456"));
        assert!(!validate("LC-FAMILY-2025-ABCDEF123456\n"));
        assert!(!validate(""));
    }

    #[test]
    fn ensure_valid_reports_format_error() {
        let err = ensure_valid("case-42").unwrap_err();
        assert_eq!(err.kind(), "invalid_identifier_format");
    }

    #[test]
    fn suffixes_and_keys_do_not_repeat() {
        let mut ids = HashSet::new();
        let mut keys = HashSet::new();
        for _ in 0..500 {
            let id = generate(PracticeArea::Civil);
            assert!(ids.insert(id.display_id));
            assert!(keys.insert(id.correlation_key));
        }
    }
}
