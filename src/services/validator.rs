//! Per-row admission validation.
//!
//! One validator instance lives for exactly one batch: it owns the set of
//! registration numbers already seen in this file, so duplicate detection
//! never leaks across batches and concurrent batches cannot poison each
//! other. Violations are accumulated, not short-circuited, so an
//! administrator fixing a rejected file sees every problem with a row at
//! once.

use std::collections::HashSet;
use std::sync::Arc;

use validator::ValidateEmail;

use crate::db::store::{AdmissionStore, StoreError};
use crate::types::admission::AdmissionRow;
use crate::types::student::{
    CandidateStudent, FIRST_NAME_MAX_LEN, MAX_LEVEL, MAX_PROGRAMME, MOBILE_MAX_LEN,
    OTHER_NAME_MAX_LEN, REG_NO_MAX_LEN, SURNAME_MAX_LEN,
};

/// Verdict for one row.
#[derive(Debug)]
pub enum RowVerdict {
    /// Row passed every check; carries the normalized, persistable student.
    Valid(CandidateStudent),
    /// Row failed; carries every violation message in check order.
    Invalid(Vec<String>),
}

pub struct RowValidator {
    store: Arc<dyn AdmissionStore>,
    /// Registration numbers (uppercased) already seen in this file.
    seen: HashSet<String>,
}

impl RowValidator {
    pub fn new(store: Arc<dyn AdmissionStore>) -> Self {
        Self {
            store,
            seen: HashSet::new(),
        }
    }

    /// Validate one row against field rules, within-file state and the
    /// persisted store. Store lookups may fail on infrastructure errors;
    /// the caller treats those as a per-row failure and continues.
    pub async fn validate(&mut self, row: &AdmissionRow) -> Result<RowVerdict, StoreError> {
        let mut errors = Vec::new();
        let regno_key = row.regno.to_uppercase();

        let required = [&row.regno, &row.email, &row.firstname, &row.surname,
                        &row.departmentid, &row.programmeid, &row.levelid];
        if required.iter().any(|value| value.is_empty()) {
            errors.push("Please provide values for all required fields.".to_string());
        }

        if !row.regno.chars().all(|c| c.is_ascii_alphanumeric()) {
            errors.push("Registration number must contain only letters and digits.".to_string());
        }
        if row.regno.chars().count() > REG_NO_MAX_LEN {
            errors.push(format!(
                "Registration number is more than {} characters long.",
                REG_NO_MAX_LEN
            ));
        }
        if !row.regno.is_empty() && self.seen.contains(&regno_key) {
            errors.push(format!(
                "Registration number ({}) appears more than once in the file.",
                row.regno
            ));
        }

        if !row.email.is_empty() {
            if !row.email.validate_email() {
                errors.push(format!("Email address ({}) is not valid.", row.email));
            } else if let Some(owner) = self.store.username_for_email(&row.email).await? {
                if owner != regno_key {
                    errors.push(format!(
                        "Email address ({}) is already associated with another account.",
                        row.email
                    ));
                }
            }
        }

        check_name(&row.firstname, "First name", FIRST_NAME_MAX_LEN, &mut errors);
        check_name(&row.surname, "Surname", SURNAME_MAX_LEN, &mut errors);
        check_name(&row.othername, "Other name", OTHER_NAME_MAX_LEN, &mut errors);

        if row.mobile.chars().count() > MOBILE_MAX_LEN {
            errors.push(format!(
                "Mobile number is more than {} characters long.",
                MOBILE_MAX_LEN
            ));
        }

        let mut department = None;
        if !row.departmentid.is_empty() {
            match row.departmentid.parse::<i32>() {
                Ok(number) => match self.store.find_department(number).await? {
                    Some(found) => department = Some(found),
                    None => errors.push(format!(
                        "Department with number ({}) does not exist.",
                        number
                    )),
                },
                Err(_) => errors.push("Department ID is not an integer value.".to_string()),
            }
        }

        let level = parse_in_range(&row.levelid, "Level ID", MAX_LEVEL, &mut errors);
        let programme = parse_in_range(&row.programmeid, "Programme ID", MAX_PROGRAMME, &mut errors);

        // Record the regno even when the row is invalid: a later row with
        // the same number is a duplicate upload either way.
        if !row.regno.is_empty() {
            self.seen.insert(regno_key.clone());
        }

        if !errors.is_empty() {
            return Ok(RowVerdict::Invalid(errors));
        }

        // All checks passed, so the parses and the department resolved.
        let (department, level, programme) = match (department, level, programme) {
            (Some(d), Some(l), Some(p)) => (d, l, p),
            _ => return Ok(RowVerdict::Invalid(vec![
                "Please provide values for all required fields.".to_string(),
            ])),
        };

        Ok(RowVerdict::Valid(CandidateStudent {
            registration_number: regno_key,
            email: row.email.to_lowercase(),
            first_name: row.firstname.clone(),
            surname: row.surname.clone(),
            other_name: row.othername.clone(),
            mobile_number: row.mobile.clone(),
            department_id: department.id,
            current_level: level,
            programme,
        }))
    }
}

fn check_name(value: &str, label: &str, max_len: usize, errors: &mut Vec<String>) {
    if value.chars().count() > max_len {
        errors.push(format!("{} is more than {} characters long.", label, max_len));
    }
    if !value.chars().all(|c| c.is_alphanumeric() || c == ' ') {
        errors.push(format!("{} contains unsupported characters.", label));
    }
}

fn parse_in_range(value: &str, label: &str, max: i32, errors: &mut Vec<String>) -> Option<i32> {
    if value.is_empty() {
        return None;
    }
    match value.parse::<i32>() {
        Ok(parsed) if (1..=max).contains(&parsed) => Some(parsed),
        Ok(_) => {
            errors.push(format!(
                "{} must be greater than 0 and smaller than {}.",
                label,
                max + 1
            ));
            None
        }
        Err(_) => {
            errors.push(format!("{} is not an integer value.", label));
            None
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
