//! Cross-clinic duplicate detection.
//!
//! Invoked when a push would land a record that a *different* clinic appears
//! to already describe. Detection is a narrow, collection-specific heuristic:
//! for patient-like entities, an identical national identity number, or an
//! identical normalized first+last name plus date of birth. Near-duplicates
//! (typos, partial matches) are intentionally not caught. Collections without
//! a heuristic never raise conflicts; their adapters are last-writer-wins.
//!
//! Detection only parks the change for manual adjudication. No winner is
//! ever chosen automatically.

use serde::{Deserialize, Serialize};

/// Classification attached to a parked change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictType {
    #[serde(rename = "cross-clinic-duplicate")]
    CrossClinicDuplicate,
}

/// Normalized name + date-of-birth signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameDob {
    pub first: String,
    pub last: String,
    pub dob: String,
}

/// Application-level identity signals extracted from a document payload.
///
/// Two documents are considered the same real-world entity if *any* present
/// signal matches exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentitySignals {
    pub national_id: Option<String>,
    pub name_dob: Option<NameDob>,
}

impl IdentitySignals {
    pub fn is_empty(&self) -> bool {
        self.national_id.is_none() && self.name_dob.is_none()
    }

    /// True if any signal present on both sides matches.
    pub fn matches(&self, other: &IdentitySignals) -> bool {
        if let (Some(a), Some(b)) = (&self.national_id, &other.national_id) {
            if a == b {
                return true;
            }
        }
        if let (Some(a), Some(b)) = (&self.name_dob, &other.name_dob) {
            if a == b {
                return true;
            }
        }
        false
    }
}

/// Extract identity signals for a collection, or `None` if the collection
/// has no duplicate heuristic.
pub fn signals_for(collection: &str, payload: &serde_json::Value) -> Option<IdentitySignals> {
    match collection {
        "patients" => {
            let signals = patient_signals(payload);
            if signals.is_empty() {
                None
            } else {
                Some(signals)
            }
        }
        _ => None,
    }
}

fn patient_signals(payload: &serde_json::Value) -> IdentitySignals {
    let national_id = nonempty_str(payload, "nationalId").map(|s| s.trim().to_string());

    let first = nonempty_str(payload, "firstName").map(normalize_name);
    let last = nonempty_str(payload, "lastName").map(normalize_name);
    let dob = nonempty_str(payload, "dateOfBirth").map(|s| s.trim().to_string());

    let name_dob = match (first, last, dob) {
        (Some(first), Some(last), Some(dob)) => Some(NameDob { first, last, dob }),
        _ => None,
    };

    IdentitySignals {
        national_id,
        name_dob,
    }
}

fn nonempty_str<'a>(payload: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    payload
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
}

fn normalize_name(raw: &str) -> String {
    raw.trim().to_lowercase()
}
