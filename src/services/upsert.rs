//! Applies one validated row to the store as a create-or-update.
//!
//! The coordinator owns what persistence must not know: the display name
//! is "first surname", and a brand-new account gets a freshly generated
//! opaque credential, hashed before it crosses the store seam. Whether the
//! row became a create or an update is decided atomically inside the
//! store's unit of work.

use std::sync::Arc;

use anyhow::Result;

use crate::auth;
use crate::db::store::{AdmissionStore, UpsertOutcome};
use crate::types::student::CandidateStudent;

pub struct UpsertCoordinator {
    store: Arc<dyn AdmissionStore>,
}

impl UpsertCoordinator {
    pub fn new(store: Arc<dyn AdmissionStore>) -> Self {
        Self { store }
    }

    /// Apply one validated row. Errors here are per-row: the caller marks
    /// the row Failed and moves on to the next one.
    pub async fn apply(&self, candidate: &CandidateStudent) -> Result<UpsertOutcome> {
        let full_name = format!("{} {}", candidate.first_name, candidate.surname);
        let password_hash = auth::hash_password(&auth::generate_password())?;

        let outcome = self
            .store
            .upsert_student(candidate, &full_name, &password_hash)
            .await?;

        Ok(outcome)
    }
}

// =============================================================================
// Tests
// =============================================================================
