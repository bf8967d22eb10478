use chrono::NaiveDate;
use serde::Serialize;
use sqlx::MySqlPool;
use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::model::employee::EmployeeStatus;
use crate::model::leave_request::{
    ApprovalScope, LeaveDraft, LeaveRequest, LeaveStatistics, LeaveStatus, LeaveType,
    month_window,
};
use crate::repo::employee;
use crate::utils::pagination::{Page, PageParams};
use crate::utils::query::Filters;

#[derive(Debug, Default)]
pub struct LeaveFilter {
    pub status: Option<LeaveStatus>,
    pub employee_id: Option<u64>,
    pub leave_type: Option<LeaveType>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl LeaveFilter {
    fn to_filters(&self) -> Filters {
        let mut filters = Filters::new();
        filters
            .push_opt("status = ?", self.status.map(|s| s.to_string()))
            .push_opt("employee_id = ?", self.employee_id)
            .push_opt("leave_type = ?", self.leave_type.map(|t| t.to_string()))
            .push_opt("start_date >= ?", self.date_from)
            .push_opt("end_date <= ?", self.date_to);
        filters
    }
}

/// Restricts a query to what the scope can see. `Nobody` matches no rows.
fn apply_scope(filters: &mut Filters, scope: &ApprovalScope) {
    match scope {
        ApprovalScope::All => {}
        ApprovalScope::Subordinates(ids) => {
            filters.push_in("employee_id", ids);
        }
        ApprovalScope::Nobody => {
            filters.push_in("employee_id", &[]);
        }
    }
}

pub async fn find(pool: &MySqlPool, id: u64) -> AppResult<Option<LeaveRequest>> {
    Ok(
        sqlx::query_as::<_, LeaveRequest>("SELECT * FROM leave_requests WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?,
    )
}

pub async fn insert(
    pool: &MySqlPool,
    employee_id: u64,
    draft: &LeaveDraft,
    requested_by: u64,
) -> AppResult<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO leave_requests
            (employee_id, leave_type, start_date, end_date, reason, status, requested_by)
        VALUES (?, ?, ?, ?, ?, 'pending', ?)
        "#,
    )
    .bind(employee_id)
    .bind(draft.leave_type)
    .bind(draft.start_date)
    .bind(draft.end_date)
    .bind(draft.reason.trim())
    .bind(requested_by)
    .execute(pool)
    .await?;
    Ok(result.last_insert_id())
}

/// Rewrites a pending request. Returns false if it is no longer pending.
pub async fn update(pool: &MySqlPool, id: u64, draft: &LeaveDraft) -> AppResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE leave_requests
        SET leave_type = ?, start_date = ?, end_date = ?, reason = ?
        WHERE id = ? AND status = 'pending'
        "#,
    )
    .bind(draft.leave_type)
    .bind(draft.start_date)
    .bind(draft.end_date)
    .bind(draft.reason.trim())
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Deletes the request. An approved request whose employee is still on
/// leave puts the employee back to `active`.
pub async fn delete(pool: &MySqlPool, leave: &LeaveRequest) -> AppResult<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM leave_requests WHERE id = ?")
        .bind(leave.id)
        .execute(&mut *tx)
        .await?;

    if leave.status == LeaveStatus::Approved {
        sqlx::query("UPDATE employees SET status = ? WHERE id = ? AND status = ?")
            .bind(EmployeeStatus::Active)
            .bind(leave.employee_id)
            .bind(EmployeeStatus::OnLeave)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(())
}

async fn page(
    pool: &MySqlPool,
    filters: &Filters,
    params: PageParams,
) -> AppResult<Page<LeaveRequest>> {
    let count_sql = format!("SELECT COUNT(*) FROM leave_requests{}", filters.sql());
    let total = filters
        .bind_scalar(sqlx::query_scalar::<_, i64>(&count_sql))
        .fetch_one(pool)
        .await?;

    let data_sql = format!(
        "SELECT * FROM leave_requests{} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        filters.sql()
    );
    debug!(sql = %data_sql, "Fetching leave requests");
    let data = filters
        .bind_as(sqlx::query_as::<_, LeaveRequest>(&data_sql))
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await?;

    Ok(Page::new(data, params, total))
}

/// `own_employee` restricts the list to one employee's requests.
pub async fn list(
    pool: &MySqlPool,
    filter: &LeaveFilter,
    own_employee: Option<u64>,
    params: PageParams,
) -> AppResult<Page<LeaveRequest>> {
    let mut filters = filter.to_filters();
    filters.push_opt("employee_id = ?", own_employee);
    page(pool, &filters, params).await
}

/// Pending requests the scope may act on.
pub async fn approval_queue(
    pool: &MySqlPool,
    filter: &LeaveFilter,
    scope: &ApprovalScope,
    params: PageParams,
) -> AppResult<Page<LeaveRequest>> {
    if *scope == ApprovalScope::Nobody {
        return Ok(Page::empty(params));
    }
    let mut filters = filter.to_filters();
    filters.push("status = ?", LeaveStatus::Pending.to_string());
    apply_scope(&mut filters, scope);
    page(pool, &filters, params).await
}

/// Locks the row, checks the transition, then writes the decision. The
/// approved employee goes `on_leave` in the same transaction.
pub async fn decide(
    pool: &MySqlPool,
    id: u64,
    to: LeaveStatus,
    decided_by: u64,
    note: Option<&str>,
) -> AppResult<LeaveRequest> {
    let mut tx = pool.begin().await?;

    let leave = sqlx::query_as::<_, LeaveRequest>(
        "SELECT * FROM leave_requests WHERE id = ? FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::not_found("Leave request not found"))?;

    leave.status.transition(to)?;

    match to {
        LeaveStatus::Approved => {
            sqlx::query(
                r#"
                UPDATE leave_requests
                SET status = 'approved', approved_by = ?, approved_at = NOW(), approval_notes = ?
                WHERE id = ?
                "#,
            )
            .bind(decided_by)
            .bind(note)
            .bind(id)
            .execute(&mut *tx)
            .await?;

            employee::set_status(&mut *tx, leave.employee_id, EmployeeStatus::OnLeave).await?;
        }
        _ => {
            sqlx::query(
                r#"
                UPDATE leave_requests
                SET status = 'rejected', approved_by = ?, approved_at = NOW(), rejection_reason = ?
                WHERE id = ?
                "#,
            )
            .bind(decided_by)
            .bind(note)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }
    }

    let updated = sqlx::query_as::<_, LeaveRequest>("SELECT * FROM leave_requests WHERE id = ?")
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;
    info!(leave_id = id, status = %to, by = decided_by, "Leave request decided");
    Ok(updated)
}

/// Approves every pending request in `ids` the scope permits. Others are
/// skipped. Returns the number approved.
pub async fn bulk_approve(
    pool: &MySqlPool,
    ids: &[u64],
    scope: &ApprovalScope,
    approved_by: u64,
    notes: Option<&str>,
) -> AppResult<u64> {
    let mut tx = pool.begin().await?;

    let mut filters = Filters::new();
    filters
        .push_in("id", ids)
        .push("status = ?", LeaveStatus::Pending.to_string());
    apply_scope(&mut filters, scope);

    let select_sql = format!("SELECT * FROM leave_requests{} FOR UPDATE", filters.sql());
    let pending = filters
        .bind_as(sqlx::query_as::<_, LeaveRequest>(&select_sql))
        .fetch_all(&mut *tx)
        .await?;

    let mut approved = 0u64;
    for leave in &pending {
        sqlx::query(
            r#"
            UPDATE leave_requests
            SET status = 'approved', approved_by = ?, approved_at = NOW(), approval_notes = ?
            WHERE id = ?
            "#,
        )
        .bind(approved_by)
        .bind(notes)
        .bind(leave.id)
        .execute(&mut *tx)
        .await?;

        employee::set_status(&mut *tx, leave.employee_id, EmployeeStatus::OnLeave).await?;
        approved += 1;
    }

    tx.commit().await?;
    info!(requested = ids.len(), approved, by = approved_by, "Bulk leave approval");
    Ok(approved)
}

pub async fn statistics(
    pool: &MySqlPool,
    scope: &ApprovalScope,
    today: NaiveDate,
) -> AppResult<LeaveStatistics> {
    if *scope == ApprovalScope::Nobody {
        return Ok(LeaveStatistics::default());
    }

    let (from, until) = month_window(today);

    let mut filters = Filters::new();
    apply_scope(&mut filters, scope);

    // Rejections stamp approved_at too.
    let sql = format!(
        r#"
        SELECT
            CAST(COALESCE(SUM(status = 'pending'), 0) AS SIGNED),
            CAST(COALESCE(SUM(status = 'approved' AND approved_at >= ? AND approved_at < ?), 0) AS SIGNED),
            CAST(COALESCE(SUM(status = 'rejected' AND approved_at >= ? AND approved_at < ?), 0) AS SIGNED),
            CAST(COALESCE(SUM(created_at >= ? AND created_at < ?), 0) AS SIGNED)
        FROM leave_requests{}
        "#,
        filters.sql()
    );

    let query = sqlx::query_as::<_, (i64, i64, i64, i64)>(&sql)
        .bind(from)
        .bind(until)
        .bind(from)
        .bind(until)
        .bind(from)
        .bind(until);
    let (pending_count, approved_this_month, rejected_this_month, total_this_month) =
        filters.bind_as(query).fetch_one(pool).await?;

    Ok(LeaveStatistics {
        pending_count,
        approved_this_month,
        rejected_this_month,
        total_this_month,
    })
}

/// Approved requests of the employee starting in `year`.
pub async fn approved_in_year(
    pool: &MySqlPool,
    employee_id: u64,
    year: i32,
) -> AppResult<Vec<(LeaveType, NaiveDate, NaiveDate)>> {
    Ok(sqlx::query_as::<_, (LeaveType, NaiveDate, NaiveDate)>(
        r#"
        SELECT leave_type, start_date, end_date
        FROM leave_requests
        WHERE employee_id = ? AND status = 'approved' AND YEAR(start_date) = ?
        "#,
    )
    .bind(employee_id)
    .bind(year)
    .fetch_all(pool)
    .await?)
}

pub async fn pending_count(pool: &MySqlPool) -> AppResult<i64> {
    Ok(
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM leave_requests WHERE status = 'pending'")
            .fetch_one(pool)
            .await?,
    )
}

/// Flat row of the leave report export.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct LeaveReportRow {
    pub id: u64,
    pub employee_code: String,
    pub employee_name: String,
    pub leave_type: LeaveType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: i64,
    pub status: LeaveStatus,
    pub reason: String,
}

pub async fn report_rows(
    pool: &MySqlPool,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> AppResult<Vec<LeaveReportRow>> {
    let mut filters = Filters::new();
    filters
        .push_opt("l.start_date >= ?", from)
        .push_opt("l.end_date <= ?", to);

    let sql = format!(
        r#"
        SELECT
            l.id,
            e.employee_code,
            CONCAT(e.first_name, ' ', e.last_name) AS employee_name,
            l.leave_type,
            l.start_date,
            l.end_date,
            CAST(DATEDIFF(l.end_date, l.start_date) + 1 AS SIGNED) AS days,
            l.status,
            l.reason
        FROM leave_requests l
        JOIN employees e ON e.id = l.employee_id
        {}
        ORDER BY l.start_date, l.id
        "#,
        filters.sql()
    );

    Ok(filters
        .bind_as(sqlx::query_as::<_, LeaveReportRow>(&sql))
        .fetch_all(pool)
        .await?)
}
