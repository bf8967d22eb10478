use chrono::NaiveDate;
use sqlx::MySqlPool;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::model::employee::Employee;
use crate::model::payroll::{
    MonthlyWork, Payroll, PayrollItem, PayrollItemType, PayrollStatus, compute_breakdown,
    manual_net, month_start,
};
use crate::model::timesheet::month_bounds;
use crate::utils::pagination::{Page, PageParams};
use crate::utils::query::Filters;

#[derive(Debug, Default)]
pub struct PayrollFilter {
    pub employee_id: Option<u64>,
    pub status: Option<PayrollStatus>,
    pub month: Option<NaiveDate>,
}

/// Amounts for the manual create and update paths.
#[derive(Debug, Clone, Copy)]
pub struct ManualAmounts {
    pub base_salary: f64,
    pub bonus: f64,
    pub deductions: f64,
}

pub async fn insert_manual(
    pool: &MySqlPool,
    employee_id: u64,
    month: NaiveDate,
    amounts: ManualAmounts,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO payroll
        (employee_id, month, base_salary, bonus, deductions, net_salary, status)
        VALUES (?, ?, ?, ?, ?, ?, 'pending')
        "#,
    )
    .bind(employee_id)
    .bind(month_start(month))
    .bind(amounts.base_salary)
    .bind(amounts.bonus)
    .bind(amounts.deductions)
    .bind(manual_net(amounts.base_salary, amounts.bonus, amounts.deductions))
    .execute(pool)
    .await?;
    Ok(result.last_insert_id())
}

pub async fn update_amounts(pool: &MySqlPool, id: u64, amounts: ManualAmounts) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE payroll
        SET base_salary = ?, bonus = ?, deductions = ?, net_salary = ?
        WHERE id = ?
        "#,
    )
    .bind(amounts.base_salary)
    .bind(amounts.bonus)
    .bind(amounts.deductions)
    .bind(manual_net(amounts.base_salary, amounts.bonus, amounts.deductions))
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn find(pool: &MySqlPool, id: u64) -> AppResult<Option<Payroll>> {
    Ok(
        sqlx::query_as::<_, Payroll>("SELECT * FROM payroll WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?,
    )
}

pub async fn items(pool: &MySqlPool, payroll_id: u64) -> AppResult<Vec<PayrollItem>> {
    Ok(sqlx::query_as::<_, PayrollItem>(
        "SELECT * FROM payroll_items WHERE payroll_id = ? ORDER BY id",
    )
    .bind(payroll_id)
    .fetch_all(pool)
    .await?)
}

pub async fn list(
    pool: &MySqlPool,
    filter: &PayrollFilter,
    params: PageParams,
) -> AppResult<Page<Payroll>> {
    let mut filters = Filters::new();
    filters
        .push_opt("employee_id = ?", filter.employee_id)
        .push_opt("status = ?", filter.status.map(|s| s.to_string()))
        .push_opt("month = ?", filter.month.map(month_start));

    let count_sql = format!("SELECT COUNT(*) FROM payroll{}", filters.sql());
    let total = filters
        .bind_scalar(sqlx::query_scalar::<_, i64>(&count_sql))
        .fetch_one(pool)
        .await?;

    let data_sql = format!(
        "SELECT * FROM payroll{} ORDER BY month DESC, id DESC LIMIT ? OFFSET ?",
        filters.sql()
    );
    let data = filters
        .bind_as(sqlx::query_as::<_, Payroll>(&data_sql))
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await?;

    Ok(Page::new(data, params, total))
}

/// Worked days and hours from fully approved timesheets, plus approved
/// unpaid leave starting in the month.
pub async fn monthly_work(
    pool: &MySqlPool,
    employee_id: u64,
    month: NaiveDate,
) -> AppResult<MonthlyWork> {
    let (first, last) = month_bounds(month);

    let (days_worked, regular_hours, overtime_hours) = sqlx::query_as::<_, (i64, f64, f64)>(
        r#"
        SELECT
            COUNT(CASE WHEN hours_worked + overtime_hours > 0 THEN 1 END),
            COALESCE(SUM(hours_worked), 0e0),
            COALESCE(SUM(overtime_hours), 0e0)
        FROM timesheets
        WHERE employee_id = ? AND status = 'manager_approved' AND date BETWEEN ? AND ?
        "#,
    )
    .bind(employee_id)
    .bind(first)
    .bind(last)
    .fetch_one(pool)
    .await?;

    let unpaid_leave_days = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT CAST(COALESCE(SUM(DATEDIFF(end_date, start_date) + 1), 0) AS SIGNED)
        FROM leave_requests
        WHERE employee_id = ? AND status = 'approved' AND leave_type = 'unpaid'
          AND start_date BETWEEN ? AND ?
        "#,
    )
    .bind(employee_id)
    .bind(first)
    .bind(last)
    .fetch_one(pool)
    .await?;

    Ok(MonthlyWork {
        days_worked: days_worked.max(0) as u32,
        regular_hours,
        overtime_hours,
        unpaid_leave_days,
    })
}

pub async fn exists_for_month(
    pool: &MySqlPool,
    employee_id: u64,
    month: NaiveDate,
) -> AppResult<bool> {
    Ok(sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM payroll WHERE employee_id = ? AND month = ?)",
    )
    .bind(employee_id)
    .bind(month_start(month))
    .fetch_one(pool)
    .await?)
}

#[derive(Debug)]
pub enum Generated {
    Created(u64),
    Skipped(String),
}

/// Builds one employee's payroll for `month` with its items in a single
/// transaction.
pub async fn generate_for_employee(
    pool: &MySqlPool,
    employee: &Employee,
    month: NaiveDate,
) -> AppResult<Generated> {
    let month = month_start(month);
    let name = employee.full_name();

    if employee.basic_salary <= 0.0 {
        return Ok(Generated::Skipped(format!("{name}: basic salary is not set")));
    }
    if exists_for_month(pool, employee.id, month).await? {
        return Ok(Generated::Skipped(format!(
            "{name}: payroll already exists for {}",
            month.format("%Y-%m")
        )));
    }

    let work = monthly_work(pool, employee.id, month).await?;
    if work.days_worked == 0 && work.regular_hours + work.overtime_hours <= 0.0 {
        return Ok(Generated::Skipped(format!(
            "{name}: no approved timesheets for {}",
            month.format("%Y-%m")
        )));
    }

    let breakdown = compute_breakdown(employee.basic_salary, month, &work);

    let mut tx = pool.begin().await?;

    let payroll_id = sqlx::query(
        r#"
        INSERT INTO payroll
        (employee_id, month, base_salary, overtime_hours, overtime_amount, bonus,
         deductions, net_salary, total_worked_hours, status)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 'pending')
        "#,
    )
    .bind(employee.id)
    .bind(month)
    .bind(breakdown.base_amount)
    .bind(work.overtime_hours)
    .bind(breakdown.overtime_amount)
    .bind(breakdown.bonus)
    .bind(breakdown.deductions)
    .bind(breakdown.net)
    .bind(work.regular_hours + work.overtime_hours)
    .execute(&mut *tx)
    .await?
    .last_insert_id();

    for (item_type, description, amount, is_taxable) in breakdown.items(&work) {
        sqlx::query(
            r#"
            INSERT INTO payroll_items (payroll_id, item_type, description, amount, is_taxable)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(payroll_id)
        .bind(item_type)
        .bind(description)
        .bind(amount)
        .bind(is_taxable)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    info!(payroll_id, employee_id = employee.id, net = breakdown.net, "Payroll generated");
    Ok(Generated::Created(payroll_id))
}

/// Payment details recorded when a payroll is paid.
#[derive(Debug, Clone)]
pub struct PayoutDetails {
    pub method: String,
    pub reference: Option<String>,
}

/// Moves a payroll along its status flow under a row lock.
pub async fn change_status(
    pool: &MySqlPool,
    id: u64,
    to: PayrollStatus,
    user_id: u64,
    payout: Option<&PayoutDetails>,
) -> AppResult<Payroll> {
    let mut tx = pool.begin().await?;

    let payroll = sqlx::query_as::<_, Payroll>("SELECT * FROM payroll WHERE id = ? FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("Payroll not found"))?;

    payroll.status.transition(to)?;

    match to {
        PayrollStatus::Approved => {
            sqlx::query(
                "UPDATE payroll SET status = ?, approved_by = ?, approved_at = NOW() WHERE id = ?",
            )
            .bind(to)
            .bind(user_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }
        PayrollStatus::Paid => {
            let payout = payout.ok_or_else(|| AppError::invalid("payment_method", "is required"))?;
            sqlx::query(
                r#"
                UPDATE payroll
                SET status = ?, payment_method = ?, payment_reference = ?, paid_at = NOW()
                WHERE id = ?
                "#,
            )
            .bind(to)
            .bind(&payout.method)
            .bind(&payout.reference)
            .bind(id)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                r#"
                INSERT INTO payroll_items (payroll_id, item_type, description, amount, is_taxable)
                VALUES (?, ?, ?, ?, 0)
                "#,
            )
            .bind(id)
            .bind(PayrollItemType::Payment)
            .bind(format!("Paid via {}", payout.method))
            .bind(payroll.net_salary)
            .execute(&mut *tx)
            .await?;
        }
        _ => {
            sqlx::query("UPDATE payroll SET status = ? WHERE id = ?")
                .bind(to)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
    }

    let updated = sqlx::query_as::<_, Payroll>("SELECT * FROM payroll WHERE id = ?")
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
    tx.commit().await?;

    if to == PayrollStatus::Cancelled {
        warn!(payroll_id = id, by = user_id, "Payroll cancelled");
    } else {
        info!(payroll_id = id, status = %to, by = user_id, "Payroll status changed");
    }
    Ok(updated)
}
