//! Student domain types and admission field constraints.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Highest educational year a student profile may carry.
pub const MAX_LEVEL: i32 = 9;
/// Number of programmes the school offers.
pub const MAX_PROGRAMME: i32 = 6;

pub const REG_NO_MAX_LEN: usize = 30;
pub const FIRST_NAME_MAX_LEN: usize = 20;
pub const SURNAME_MAX_LEN: usize = 20;
pub const OTHER_NAME_MAX_LEN: usize = 50;
pub const MOBILE_MAX_LEN: usize = 20;

/// Display label for a programme number (1..=MAX_PROGRAMME).
pub fn programme_label(programme: i32) -> Option<&'static str> {
    match programme {
        1 => Some("Undergraduate Studies"),
        2 => Some("Postgraduate Studies"),
        3 => Some("Matured Student Programme (MSP)"),
        4 => Some("Diploma"),
        5 => Some("Pre-Science"),
        6 => Some("Sandwich"),
        _ => None,
    }
}

/// Display label for a level number (1..=MAX_LEVEL).
pub fn level_label(level: i32) -> Option<String> {
    if (1..=MAX_LEVEL).contains(&level) {
        Some(format!("Year {}", level))
    } else {
        None
    }
}

/// A fully validated admission row, normalized and ready to persist.
///
/// `registration_number` is uppercased and `email` lowercased here, so
/// every consumer downstream of the validator sees canonical values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateStudent {
    pub registration_number: String,
    pub email: String,
    pub first_name: String,
    pub surname: String,
    pub other_name: String,
    pub mobile_number: String,
    pub department_id: Uuid,
    pub current_level: i32,
    pub programme: i32,
}

/// A student whose account was created (not updated) by a batch.
/// Handed to the notification collaborator after the report is written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedStudent {
    pub registration_number: String,
    pub email: String,
    pub first_name: String,
    pub surname: String,
    pub current_level: i32,
    pub programme: i32,
}

impl CreatedStudent {
    pub fn from_candidate(candidate: &CandidateStudent) -> Self {
        Self {
            registration_number: candidate.registration_number.clone(),
            email: candidate.email.clone(),
            first_name: candidate.first_name.clone(),
            surname: candidate.surname.clone(),
            current_level: candidate.current_level,
            programme: candidate.programme,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_programme_labels_cover_full_range() {
        for p in 1..=MAX_PROGRAMME {
            assert!(programme_label(p).is_some(), "missing label for programme {}", p);
        }
        assert!(programme_label(0).is_none());
        assert!(programme_label(MAX_PROGRAMME + 1).is_none());
    }

    #[test]
    fn test_level_labels() {
        assert_eq!(level_label(1).unwrap(), "Year 1");
        assert_eq!(level_label(MAX_LEVEL).unwrap(), "Year 9");
        assert!(level_label(0).is_none());
        assert!(level_label(MAX_LEVEL + 1).is_none());
    }
}
