use std::collections::BTreeMap;

use chrono::{Datelike, Months, NaiveDate};
use serde::Serialize;
use sqlx::MySqlPool;
use utoipa::ToSchema;

use crate::error::AppResult;
use crate::model::invoice::InvoiceStatus;
use crate::repo::{customer, employee, equipment, leave, rental};

const REVENUE_MONTHS: u32 = 12;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct MonthlyRevenue {
    #[schema(example = "2026-03")]
    pub month: String,
    pub revenue: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardStats {
    pub customers: i64,
    pub equipment: i64,
    pub rentals: i64,
    pub invoices: i64,
    pub employees: i64,
    pub pending_leave_requests: i64,
    /// Sum of completed payments
    pub total_revenue: f64,
    /// Outstanding total of sent, overdue and partially paid invoices
    pub pending_invoice_amount: f64,
    pub equipment_by_status: BTreeMap<String, i64>,
    pub rentals_by_status: BTreeMap<String, i64>,
    pub monthly_revenue: Vec<MonthlyRevenue>,
}

/// First day of the oldest month in the revenue window ending at `today`.
fn window_start(today: NaiveDate) -> NaiveDate {
    let first = today.with_day(1).unwrap_or(today);
    first
        .checked_sub_months(Months::new(REVENUE_MONTHS - 1))
        .unwrap_or(first)
}

/// One entry per month of the window, oldest first; months without
/// payments report zero.
fn fill_months(today: NaiveDate, rows: Vec<(String, f64)>) -> Vec<MonthlyRevenue> {
    let found: BTreeMap<String, f64> = rows.into_iter().collect();
    let start = window_start(today);

    (0..REVENUE_MONTHS)
        .filter_map(|i| start.checked_add_months(Months::new(i)))
        .map(|month| {
            let key = month.format("%Y-%m").to_string();
            MonthlyRevenue {
                revenue: found.get(&key).copied().unwrap_or(0.0),
                month: key,
            }
        })
        .collect()
}

async fn invoice_totals(pool: &MySqlPool) -> AppResult<(i64, f64)> {
    let [a, b, c] = InvoiceStatus::PENDING;
    Ok(sqlx::query_as::<_, (i64, f64)>(
        r#"
        SELECT
            COUNT(*),
            COALESCE(SUM(CASE WHEN status IN (?, ?, ?) THEN total_amount END), 0e0)
        FROM invoices
        "#,
    )
    .bind(a)
    .bind(b)
    .bind(c)
    .fetch_one(pool)
    .await?)
}

pub async fn stats(pool: &MySqlPool, today: NaiveDate) -> AppResult<DashboardStats> {
    let (invoices, pending_invoice_amount) = invoice_totals(pool).await?;

    let total_revenue = sqlx::query_scalar::<_, f64>(
        "SELECT COALESCE(SUM(amount), 0e0) FROM payments WHERE status = 'completed'",
    )
    .fetch_one(pool)
    .await?;

    let revenue_rows = sqlx::query_as::<_, (String, f64)>(
        r#"
        SELECT DATE_FORMAT(payment_date, '%Y-%m') AS month, COALESCE(SUM(amount), 0e0)
        FROM payments
        WHERE status = 'completed' AND payment_date >= ?
        GROUP BY month
        ORDER BY month
        "#,
    )
    .bind(window_start(today))
    .fetch_all(pool)
    .await?;

    let equipment_by_status = equipment::count_by_status(pool)
        .await?
        .into_iter()
        .map(|(status, n)| (status.to_string(), n))
        .collect();
    let rentals_by_status = rental::count_by_status(pool)
        .await?
        .into_iter()
        .map(|(status, n)| (status.to_string(), n))
        .collect();

    Ok(DashboardStats {
        customers: customer::count(pool).await?,
        equipment: equipment::count(pool).await?,
        rentals: rental::count(pool).await?,
        invoices,
        employees: employee::count(pool).await?,
        pending_leave_requests: leave::pending_count(pool).await?,
        total_revenue,
        pending_invoice_amount,
        equipment_by_status,
        rentals_by_status,
        monthly_revenue: fill_months(today, revenue_rows),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_spans_twelve_months() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 18).unwrap();
        assert_eq!(window_start(today), NaiveDate::from_ymd_opt(2025, 4, 1).unwrap());
    }

    #[test]
    fn missing_months_are_zero() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 18).unwrap();
        let months = fill_months(
            today,
            vec![("2025-04".into(), 10.0), ("2026-03".into(), 25.5)],
        );
        assert_eq!(months.len(), 12);
        assert_eq!(months[0], MonthlyRevenue { month: "2025-04".into(), revenue: 10.0 });
        assert_eq!(months[1].revenue, 0.0);
        assert_eq!(months[11], MonthlyRevenue { month: "2026-03".into(), revenue: 25.5 });
    }
}
