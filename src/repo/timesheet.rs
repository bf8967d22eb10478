use chrono::NaiveDate;
use sqlx::MySqlPool;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::model::timesheet::{
    ApprovalStage, Timesheet, TimesheetInput, TimesheetStatus, month_bounds, week_bounds,
};
use crate::utils::pagination::{Page, PageParams};
use crate::utils::query::Filters;

#[derive(Debug, Default)]
pub struct TimesheetFilter {
    pub employee_id: Option<u64>,
    pub status: Option<TimesheetStatus>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

pub async fn insert(
    pool: &MySqlPool,
    employee_id: u64,
    input: &TimesheetInput,
    created_by: u64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO timesheets
        (employee_id, rental_id, date, hours_worked, overtime_hours, description, status, created_by)
        VALUES (?, ?, ?, ?, ?, ?, 'draft', ?)
        "#,
    )
    .bind(employee_id)
    .bind(input.rental_id)
    .bind(input.date)
    .bind(input.hours_worked)
    .bind(input.overtime_hours)
    .bind(&input.description)
    .bind(created_by)
    .execute(pool)
    .await?;
    Ok(result.last_insert_id())
}

pub async fn find(pool: &MySqlPool, id: u64) -> AppResult<Option<Timesheet>> {
    Ok(
        sqlx::query_as::<_, Timesheet>("SELECT * FROM timesheets WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?,
    )
}

pub async fn list(
    pool: &MySqlPool,
    filter: &TimesheetFilter,
    params: PageParams,
) -> AppResult<Page<Timesheet>> {
    let mut filters = Filters::new();
    filters
        .push_opt("employee_id = ?", filter.employee_id)
        .push_opt("status = ?", filter.status.map(|s| s.to_string()))
        .push_opt("date >= ?", filter.date_from)
        .push_opt("date <= ?", filter.date_to);

    let count_sql = format!("SELECT COUNT(*) FROM timesheets{}", filters.sql());
    let total = filters
        .bind_scalar(sqlx::query_scalar::<_, i64>(&count_sql))
        .fetch_one(pool)
        .await?;

    let data_sql = format!(
        "SELECT * FROM timesheets{} ORDER BY date DESC, id DESC LIMIT ? OFFSET ?",
        filters.sql()
    );
    let data = filters
        .bind_as(sqlx::query_as::<_, Timesheet>(&data_sql))
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await?;

    Ok(Page::new(data, params, total))
}

/// Rewrites a draft or rejected timesheet; the status is left for `submit`.
pub async fn update(pool: &MySqlPool, id: u64, input: &TimesheetInput) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE timesheets
        SET rental_id = ?, date = ?, hours_worked = ?, overtime_hours = ?, description = ?
        WHERE id = ? AND status IN ('draft', 'rejected')
        "#,
    )
    .bind(input.rental_id)
    .bind(input.date)
    .bind(input.hours_worked)
    .bind(input.overtime_hours)
    .bind(&input.description)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete(pool: &MySqlPool, id: u64) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM timesheets WHERE id = ? AND status = 'draft'")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Regular plus overtime hours in the Monday..Sunday week of `date`.
pub async fn week_hours(
    pool: &MySqlPool,
    employee_id: u64,
    date: NaiveDate,
    exclude_id: Option<u64>,
) -> AppResult<f64> {
    let (from, to) = week_bounds(date);
    Ok(sqlx::query_scalar::<_, f64>(
        r#"
        SELECT COALESCE(SUM(hours_worked + overtime_hours), 0e0)
        FROM timesheets
        WHERE employee_id = ? AND date BETWEEN ? AND ? AND id <> ?
        "#,
    )
    .bind(employee_id)
    .bind(from)
    .bind(to)
    .bind(exclude_id.unwrap_or(0))
    .fetch_one(pool)
    .await?)
}

pub async fn month_overtime(
    pool: &MySqlPool,
    employee_id: u64,
    date: NaiveDate,
    exclude_id: Option<u64>,
) -> AppResult<f64> {
    let (from, to) = month_bounds(date);
    Ok(sqlx::query_scalar::<_, f64>(
        r#"
        SELECT COALESCE(SUM(overtime_hours), 0e0)
        FROM timesheets
        WHERE employee_id = ? AND date BETWEEN ? AND ? AND id <> ?
        "#,
    )
    .bind(employee_id)
    .bind(from)
    .bind(to)
    .bind(exclude_id.unwrap_or(0))
    .fetch_one(pool)
    .await?)
}

/// Compare-and-set on status so concurrent approvals cannot both win.
async fn reload_if_changed(pool: &MySqlPool, id: u64, affected: u64) -> AppResult<Timesheet> {
    if affected == 0 {
        return Err(AppError::conflict("Timesheet status changed concurrently"));
    }
    find(pool, id)
        .await?
        .ok_or_else(|| AppError::not_found("Timesheet not found"))
}

pub async fn submit(pool: &MySqlPool, timesheet: &Timesheet) -> AppResult<Timesheet> {
    let to = timesheet.status.submit()?;
    let result = sqlx::query(
        r#"
        UPDATE timesheets
        SET status = ?, rejected_by = NULL, rejected_at = NULL, rejection_reason = NULL,
            rejection_stage = NULL
        WHERE id = ? AND status = ?
        "#,
    )
    .bind(to)
    .bind(timesheet.id)
    .bind(timesheet.status)
    .execute(pool)
    .await?;

    info!(timesheet_id = timesheet.id, from = %timesheet.status, "Timesheet submitted");
    reload_if_changed(pool, timesheet.id, result.rows_affected()).await
}

/// Records the approval of whichever stage the current status waits on.
pub async fn approve(
    pool: &MySqlPool,
    timesheet: &Timesheet,
    approved_by: u64,
    notes: Option<&str>,
) -> AppResult<Timesheet> {
    let (stage, to) = timesheet.status.approve()?;
    let prefix = stage.column_prefix();

    let sql = format!(
        r#"
        UPDATE timesheets
        SET status = ?, {prefix}_approval_by = ?, {prefix}_approval_at = NOW(),
            approval_notes = COALESCE(?, approval_notes)
        WHERE id = ? AND status = ?
        "#
    );
    let result = sqlx::query(&sql)
        .bind(to)
        .bind(approved_by)
        .bind(notes)
        .bind(timesheet.id)
        .bind(timesheet.status)
        .execute(pool)
        .await?;

    info!(timesheet_id = timesheet.id, stage = %stage, by = approved_by, "Timesheet approved");
    reload_if_changed(pool, timesheet.id, result.rows_affected()).await
}

pub async fn reject(
    pool: &MySqlPool,
    timesheet: &Timesheet,
    rejected_by: u64,
    reason: &str,
) -> AppResult<Timesheet> {
    let to = timesheet.status.reject()?;
    let stage = ApprovalStage::for_status(timesheet.status);

    let result = sqlx::query(
        r#"
        UPDATE timesheets
        SET status = ?, rejected_by = ?, rejected_at = NOW(), rejection_reason = ?,
            rejection_stage = ?
        WHERE id = ? AND status = ?
        "#,
    )
    .bind(to)
    .bind(rejected_by)
    .bind(reason)
    .bind(stage)
    .bind(timesheet.id)
    .bind(timesheet.status)
    .execute(pool)
    .await?;

    info!(timesheet_id = timesheet.id, stage = ?stage, by = rejected_by, "Timesheet rejected");
    reload_if_changed(pool, timesheet.id, result.rows_affected()).await
}
