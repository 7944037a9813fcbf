//! Department database queries

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use crate::types::department::{title_case, CreateDepartmentRequest, Department, UpdateDepartmentRequest};

/// Create a new department. The name is stored in title case.
pub async fn create_department(pool: &PgPool, req: &CreateDepartmentRequest) -> Result<Department> {
    let department = sqlx::query_as::<_, Department>(
        r#"
        INSERT INTO departments (id, number, name, created_at, updated_at)
        VALUES ($1, $2, $3, NOW(), NOW())
        RETURNING id, number, name, created_at, updated_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(req.number)
    .bind(title_case(&req.name))
    .fetch_one(pool)
    .await?;

    Ok(department)
}

/// List all departments ordered by number
pub async fn list_departments(pool: &PgPool) -> Result<Vec<Department>> {
    let departments = sqlx::query_as::<_, Department>(
        r#"SELECT id, number, name, created_at, updated_at FROM departments ORDER BY number"#,
    )
    .fetch_all(pool)
    .await?;

    Ok(departments)
}

/// Update a department. Unchanged fields are preserved via COALESCE.
pub async fn update_department(pool: &PgPool, req: &UpdateDepartmentRequest) -> Result<Option<Department>> {
    let department = sqlx::query_as::<_, Department>(
        r#"
        UPDATE departments
        SET number = COALESCE($2, number),
            name = COALESCE($3, name),
            updated_at = NOW()
        WHERE id = $1
        RETURNING id, number, name, created_at, updated_at
        "#,
    )
    .bind(req.id)
    .bind(req.number)
    .bind(req.name.as_deref().map(title_case))
    .fetch_optional(pool)
    .await?;

    Ok(department)
}

/// Delete a department. Student profiles referencing it keep their rows
/// with a null department (FK is ON DELETE SET NULL).
pub async fn delete_department(pool: &PgPool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM departments WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
