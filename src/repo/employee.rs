use serde_json::Value;
use sqlx::{Executor, MySql, MySqlPool};
use tracing::debug;

use crate::error::AppResult;
use crate::model::employee::{Employee, EmployeeStatus, NewEmployee};
use crate::utils::db_utils::{UpdateTarget, build_update_sql, execute_update};
use crate::utils::pagination::{Page, PageParams};
use crate::utils::query::Filters;

const EMPLOYEE_UPDATE: UpdateTarget = UpdateTarget {
    table: "employees",
    id_column: "id",
    columns: &[
        "employee_code",
        "first_name",
        "last_name",
        "email",
        "phone",
        "department_id",
        "job_title",
        "manager_id",
        "hire_date",
        "basic_salary",
        "status",
    ],
};

#[derive(Debug, Default)]
pub struct EmployeeFilter {
    pub status: Option<EmployeeStatus>,
    pub department_id: Option<u64>,
    pub search: Option<String>,
}

pub async fn insert(pool: &MySqlPool, employee: &NewEmployee) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO employees
        (employee_code, first_name, last_name, email, phone, department_id, job_title,
         manager_id, hire_date, basic_salary)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(employee.employee_code.trim())
    .bind(employee.first_name.trim())
    .bind(employee.last_name.trim())
    .bind(employee.email.trim())
    .bind(&employee.phone)
    .bind(employee.department_id)
    .bind(&employee.job_title)
    .bind(employee.manager_id)
    .bind(employee.hire_date)
    .bind(employee.basic_salary)
    .execute(pool)
    .await?;
    Ok(result.last_insert_id())
}

pub async fn find(pool: &MySqlPool, id: u64) -> AppResult<Option<Employee>> {
    Ok(
        sqlx::query_as::<_, Employee>("SELECT * FROM employees WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?,
    )
}

pub async fn list(
    pool: &MySqlPool,
    filter: &EmployeeFilter,
    params: PageParams,
) -> AppResult<Page<Employee>> {
    let mut filters = Filters::new();
    filters
        .push_opt("status = ?", filter.status.map(|s| s.to_string()))
        .push_opt("department_id = ?", filter.department_id);

    if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
        let like = format!("%{}%", search.trim());
        filters.push_many(
            "(first_name LIKE ? OR last_name LIKE ? OR email LIKE ?)",
            [like.clone(), like.clone(), like],
        );
    }

    let count_sql = format!("SELECT COUNT(*) FROM employees{}", filters.sql());
    let total = filters
        .bind_scalar(sqlx::query_scalar::<_, i64>(&count_sql))
        .fetch_one(pool)
        .await?;

    let data_sql = format!(
        "SELECT * FROM employees{} ORDER BY id DESC LIMIT ? OFFSET ?",
        filters.sql()
    );
    debug!(sql = %data_sql, page = params.page, "Fetching employees");
    let data = filters
        .bind_as(sqlx::query_as::<_, Employee>(&data_sql))
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await?;

    Ok(Page::new(data, params, total))
}

pub async fn update(pool: &MySqlPool, id: u64, payload: &Value) -> AppResult<u64> {
    let update = build_update_sql(&EMPLOYEE_UPDATE, payload, id)?;
    Ok(execute_update(pool, update).await?)
}

pub async fn set_status<'e, E>(executor: E, id: u64, status: EmployeeStatus) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    let result = sqlx::query("UPDATE employees SET status = ? WHERE id = ?")
        .bind(status)
        .bind(id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

/// Soft delete: the row stays for payroll and leave history.
pub async fn deactivate(pool: &MySqlPool, id: u64) -> AppResult<bool> {
    Ok(set_status(pool, id, EmployeeStatus::Inactive).await? > 0)
}

/// Ids of employees whose direct manager is `manager_id`.
pub async fn subordinate_ids(pool: &MySqlPool, manager_id: u64) -> AppResult<Vec<u64>> {
    Ok(
        sqlx::query_scalar::<_, u64>("SELECT id FROM employees WHERE manager_id = ?")
            .bind(manager_id)
            .fetch_all(pool)
            .await?,
    )
}

pub async fn active(pool: &MySqlPool) -> AppResult<Vec<Employee>> {
    Ok(
        sqlx::query_as::<_, Employee>("SELECT * FROM employees WHERE status = 'active' ORDER BY id")
            .fetch_all(pool)
            .await?,
    )
}

pub async fn count(pool: &MySqlPool) -> AppResult<i64> {
    Ok(sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM employees")
        .fetch_one(pool)
        .await?)
}
