//! Persistence seam for the admission pipeline.
//!
//! `AdmissionStore` is the narrow interface the pipeline talks to — swap in
//! `PgAdmissionStore` in production and `MemoryAdmissionStore` in tests.
//! The trait is object-safe so callers can hold `Arc<dyn AdmissionStore>`.
//!
//! `upsert_student` applies one row's account + display profile + student
//! profile as a single unit of work. A uniqueness violation raced in by a
//! concurrent batch surfaces as `StoreError::Conflict`, which the caller
//! turns into a per-row `Failed` status, never a batch abort.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::types::department::Department;
use crate::types::student::CandidateStudent;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness or integrity constraint rejected the row at commit time.
    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Outcome of a student upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

#[async_trait]
pub trait AdmissionStore: Send + Sync {
    /// Resolve a department by its unique number.
    async fn find_department(&self, number: i32) -> Result<Option<Department>, StoreError>;

    /// Username of the account currently holding this email, if any.
    /// Comparison is case-insensitive.
    async fn username_for_email(&self, email: &str) -> Result<Option<String>, StoreError>;

    /// Create or update the account, display profile and student profile
    /// for one validated row, keyed by username = registration number.
    /// `password_hash` is only used on the create path.
    async fn upsert_student(
        &self,
        student: &CandidateStudent,
        full_name: &str,
        password_hash: &str,
    ) -> Result<UpsertOutcome, StoreError>;
}

// =============================================================================
// PgAdmissionStore — PostgreSQL via sqlx
// =============================================================================

pub struct PgAdmissionStore {
    pool: PgPool,
}

impl PgAdmissionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Map unique/integrity violations (SQLSTATE 23xxx) to `Conflict` with the
/// database's own message; everything else stays a database error.
fn into_store_error(e: sqlx::Error) -> StoreError {
    if let Some(db) = e.as_database_error() {
        if db.code().map(|c| c.starts_with("23")).unwrap_or(false) {
            return StoreError::Conflict(db.message().to_string());
        }
    }
    StoreError::Database(e)
}

#[async_trait]
impl AdmissionStore for PgAdmissionStore {
    async fn find_department(&self, number: i32) -> Result<Option<Department>, StoreError> {
        let department = sqlx::query_as::<_, Department>(
            r#"SELECT id, number, name, created_at, updated_at FROM departments WHERE number = $1"#,
        )
        .bind(number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(department)
    }

    async fn username_for_email(&self, email: &str) -> Result<Option<String>, StoreError> {
        let username = sqlx::query_scalar::<_, String>(
            r#"SELECT username FROM accounts WHERE LOWER(email) = LOWER($1)"#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(username)
    }

    async fn upsert_student(
        &self,
        student: &CandidateStudent,
        full_name: &str,
        password_hash: &str,
    ) -> Result<UpsertOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Lock the account row so concurrent batches upserting the same
        // registration number serialize here instead of racing the inserts.
        let existing: Option<Uuid> = sqlx::query_scalar(
            r#"SELECT id FROM accounts WHERE username = $1 FOR UPDATE"#,
        )
        .bind(&student.registration_number)
        .fetch_optional(&mut *tx)
        .await?;

        let (account_id, outcome) = match existing {
            Some(account_id) => {
                sqlx::query(
                    r#"
                    UPDATE accounts
                    SET email = $2, first_name = $3, last_name = $4,
                        is_active = TRUE, updated_at = NOW()
                    WHERE id = $1
                    "#,
                )
                .bind(account_id)
                .bind(&student.email)
                .bind(&student.first_name)
                .bind(&student.surname)
                .execute(&mut *tx)
                .await
                .map_err(into_store_error)?;

                (account_id, UpsertOutcome::Updated)
            }
            None => {
                let account_id = Uuid::new_v4();
                sqlx::query(
                    r#"
                    INSERT INTO accounts (id, username, email, first_name, last_name,
                        is_active, password_hash, created_at, updated_at)
                    VALUES ($1, $2, $3, $4, $5, TRUE, $6, NOW(), NOW())
                    "#,
                )
                .bind(account_id)
                .bind(&student.registration_number)
                .bind(&student.email)
                .bind(&student.first_name)
                .bind(&student.surname)
                .bind(password_hash)
                .execute(&mut *tx)
                .await
                .map_err(into_store_error)?;

                (account_id, UpsertOutcome::Created)
            }
        };

        sqlx::query(
            r#"
            INSERT INTO account_profiles (id, account_id, full_name, created_at, updated_at)
            VALUES ($1, $2, $3, NOW(), NOW())
            ON CONFLICT (account_id)
            DO UPDATE SET full_name = EXCLUDED.full_name, updated_at = NOW()
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(account_id)
        .bind(full_name)
        .execute(&mut *tx)
        .await
        .map_err(into_store_error)?;

        sqlx::query(
            r#"
            INSERT INTO student_profiles (id, account_id, registration_number, department_id,
                current_level, programme, other_name, mobile_number, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), NOW())
            ON CONFLICT (account_id)
            DO UPDATE SET registration_number = EXCLUDED.registration_number,
                          department_id = EXCLUDED.department_id,
                          current_level = EXCLUDED.current_level,
                          programme = EXCLUDED.programme,
                          other_name = EXCLUDED.other_name,
                          mobile_number = EXCLUDED.mobile_number,
                          updated_at = NOW()
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(account_id)
        .bind(&student.registration_number)
        .bind(student.department_id)
        .bind(student.current_level)
        .bind(student.programme)
        .bind(&student.other_name)
        .bind(&student.mobile_number)
        .execute(&mut *tx)
        .await
        .map_err(into_store_error)?;

        tx.commit().await.map_err(into_store_error)?;

        Ok(outcome)
    }
}

// =============================================================================
// MemoryAdmissionStore — in-memory store for tests and local runs
// =============================================================================

/// A stored student as held by the in-memory store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredStudent {
    pub account_id: Uuid,
    pub email: String,
    pub first_name: String,
    pub surname: String,
    pub full_name: String,
    pub other_name: String,
    pub mobile_number: String,
    pub department_id: Option<Uuid>,
    pub current_level: i32,
    pub programme: i32,
    pub password_hash: String,
}

#[derive(Default)]
struct MemoryInner {
    departments: Vec<Department>,
    /// Keyed by registration number (uppercase).
    students: HashMap<String, StoredStudent>,
}

/// Enforces the same uniqueness rules as the relational schema: one account
/// per registration number, one account per email.
#[derive(Default)]
pub struct MemoryAdmissionStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryAdmissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_department(&self, number: i32, name: &str) -> Department {
        let now = Utc::now();
        let department = Department {
            id: Uuid::new_v4(),
            number,
            name: crate::types::department::title_case(name),
            created_at: now,
            updated_at: now,
        };
        self.inner.lock().departments.push(department.clone());
        department
    }

    pub fn student(&self, registration_number: &str) -> Option<StoredStudent> {
        self.inner
            .lock()
            .students
            .get(&registration_number.to_uppercase())
            .cloned()
    }

    pub fn student_count(&self) -> usize {
        self.inner.lock().students.len()
    }
}

#[async_trait]
impl AdmissionStore for MemoryAdmissionStore {
    async fn find_department(&self, number: i32) -> Result<Option<Department>, StoreError> {
        Ok(self
            .inner
            .lock()
            .departments
            .iter()
            .find(|d| d.number == number)
            .cloned())
    }

    async fn username_for_email(&self, email: &str) -> Result<Option<String>, StoreError> {
        let needle = email.to_lowercase();
        Ok(self
            .inner
            .lock()
            .students
            .iter()
            .find(|(_, s)| s.email.to_lowercase() == needle)
            .map(|(regno, _)| regno.clone()))
    }

    async fn upsert_student(
        &self,
        student: &CandidateStudent,
        full_name: &str,
        password_hash: &str,
    ) -> Result<UpsertOutcome, StoreError> {
        let mut inner = self.inner.lock();

        // Email uniqueness across accounts, like the relational constraint.
        let email_owner = inner
            .students
            .iter()
            .find(|(_, s)| s.email.to_lowercase() == student.email.to_lowercase())
            .map(|(regno, _)| regno.clone());
        if let Some(owner) = email_owner {
            if owner != student.registration_number {
                return Err(StoreError::Conflict(format!(
                    "duplicate key value violates unique constraint on accounts.email ({})",
                    student.email
                )));
            }
        }

        match inner.students.get_mut(&student.registration_number) {
            Some(existing) => {
                existing.email = student.email.clone();
                existing.first_name = student.first_name.clone();
                existing.surname = student.surname.clone();
                existing.full_name = full_name.to_string();
                existing.other_name = student.other_name.clone();
                existing.mobile_number = student.mobile_number.clone();
                existing.department_id = Some(student.department_id);
                existing.current_level = student.current_level;
                existing.programme = student.programme;
                Ok(UpsertOutcome::Updated)
            }
            None => {
                inner.students.insert(
                    student.registration_number.clone(),
                    StoredStudent {
                        account_id: Uuid::new_v4(),
                        email: student.email.clone(),
                        first_name: student.first_name.clone(),
                        surname: student.surname.clone(),
                        full_name: full_name.to_string(),
                        other_name: student.other_name.clone(),
                        mobile_number: student.mobile_number.clone(),
                        department_id: Some(student.department_id),
                        current_level: student.current_level,
                        programme: student.programme,
                        password_hash: password_hash.to_string(),
                    },
                );
                Ok(UpsertOutcome::Created)
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(regno: &str, email: &str, dept: Uuid) -> CandidateStudent {
        CandidateStudent {
            registration_number: regno.to_string(),
            email: email.to_string(),
            first_name: "Ann".to_string(),
            surname: "Lee".to_string(),
            other_name: String::new(),
            mobile_number: "0912345678".to_string(),
            department_id: dept,
            current_level: 3,
            programme: 2,
        }
    }

    #[tokio::test]
    async fn memory_store_creates_then_updates() {
        let store = MemoryAdmissionStore::new();
        let dept = store.add_department(1, "computer science");

        let student = candidate("A100", "a@x.com", dept.id);
        let outcome = store.upsert_student(&student, "Ann Lee", "$argon2-hash").await.unwrap();
        assert_eq!(outcome, UpsertOutcome::Created);

        let created = store.student("A100").unwrap();
        assert_eq!(created.department_id, Some(dept.id));
        assert_eq!(created.mobile_number, "0912345678");
        assert_eq!(created.other_name, "");
        assert_eq!((created.current_level, created.programme), (3, 2));

        let mut changed = student.clone();
        changed.surname = "Smith".to_string();
        let outcome = store.upsert_student(&changed, "Ann Smith", "$unused").await.unwrap();
        assert_eq!(outcome, UpsertOutcome::Updated);

        assert_eq!(store.student_count(), 1);
        let stored = store.student("A100").unwrap();
        assert_eq!(stored.surname, "Smith");
        assert_eq!(stored.full_name, "Ann Smith");
        // The credential from the create path is retained.
        assert_eq!(stored.password_hash, "$argon2-hash");
    }

    #[tokio::test]
    async fn memory_store_rejects_email_held_by_other_account() {
        let store = MemoryAdmissionStore::new();
        let dept = store.add_department(1, "physics");

        store
            .upsert_student(&candidate("A100", "a@x.com", dept.id), "Ann Lee", "h")
            .await
            .unwrap();
        let err = store
            .upsert_student(&candidate("B200", "a@x.com", dept.id), "Ann Lee", "h")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.student_count(), 1);
    }

    #[tokio::test]
    async fn memory_store_department_lookup() {
        let store = MemoryAdmissionStore::new();
        store.add_department(4, "law");

        let found = store.find_department(4).await.unwrap().unwrap();
        assert_eq!(found.name, "Law");
        assert!(store.find_department(5).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn memory_store_email_lookup_is_case_insensitive() {
        let store = MemoryAdmissionStore::new();
        let dept = store.add_department(1, "law");
        store
            .upsert_student(&candidate("A100", "ann@x.com", dept.id), "Ann Lee", "h")
            .await
            .unwrap();

        let owner = store.username_for_email("ANN@X.COM").await.unwrap();
        assert_eq!(owner.as_deref(), Some("A100"));
        assert!(store.username_for_email("other@x.com").await.unwrap().is_none());
    }
}
