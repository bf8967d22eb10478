use chrono::{Datelike, NaiveDate};
use sqlx::{MySqlConnection, MySqlPool};
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::model::numbering::{next_document_number, sequence_sql, year_pattern};
use crate::model::rental::{
    ExtensionRequest, ExtensionStatus, OverdueCheck, Rental, RentalExtension, RentalInput,
    RentalItem, RentalItemInput, RentalStatus, RentalStatusLog,
};
use crate::model::rental_workflow::{RentalWorkflow, TransitionContext};
use crate::repo::{equipment, with_numbering_retry};
use crate::utils::pagination::{Page, PageParams};
use crate::utils::query::Filters;

pub const RENTAL_PREFIX: &str = "RENT";

#[derive(Debug, Default)]
pub struct RentalFilter {
    pub status: Option<RentalStatus>,
    pub customer_id: Option<u64>,
    pub search: Option<String>,
}

/// Creates the rental under the next free number of its start year.
pub async fn insert(pool: &MySqlPool, input: &RentalInput, created_by: u64) -> AppResult<(u64, String)> {
    with_numbering_retry("rental", || try_insert(pool, input, created_by)).await
}

async fn try_insert(pool: &MySqlPool, input: &RentalInput, created_by: u64) -> AppResult<(u64, String)> {
    let mut tx = pool.begin().await?;

    let year = input.start_date.year();
    let sql = format!(
        "SELECT MAX({}) FROM rentals WHERE rental_number LIKE ? FOR UPDATE",
        sequence_sql("rental_number")
    );
    let last = sqlx::query_scalar::<_, Option<u64>>(&sql)
        .bind(year_pattern(RENTAL_PREFIX, year))
        .fetch_one(&mut *tx)
        .await?;
    let number = next_document_number(RENTAL_PREFIX, year, last);

    let id = sqlx::query(
        r#"
        INSERT INTO rentals
        (rental_number, customer_id, start_date, expected_end_date, status, deposit_amount,
         discount_percentage, tax_percentage, notes, created_by)
        VALUES (?, ?, ?, ?, 'pending', ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&number)
    .bind(input.customer_id)
    .bind(input.start_date)
    .bind(input.expected_end_date)
    .bind(input.deposit_amount)
    .bind(input.discount_percentage)
    .bind(input.tax_percentage)
    .bind(&input.notes)
    .bind(created_by)
    .execute(&mut *tx)
    .await?
    .last_insert_id();

    tx.commit().await?;
    info!(rental_id = id, rental_number = %number, by = created_by, "Rental created");
    Ok((id, number))
}

pub async fn find(pool: &MySqlPool, id: u64) -> AppResult<Option<Rental>> {
    Ok(
        sqlx::query_as::<_, Rental>("SELECT * FROM rentals WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?,
    )
}

async fn lock(conn: &mut MySqlConnection, id: u64) -> AppResult<Rental> {
    sqlx::query_as::<_, Rental>("SELECT * FROM rentals WHERE id = ? FOR UPDATE")
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::not_found("Rental not found"))
}

pub async fn list(
    pool: &MySqlPool,
    filter: &RentalFilter,
    params: PageParams,
) -> AppResult<Page<Rental>> {
    let mut filters = Filters::new();
    filters
        .push_opt("status = ?", filter.status.map(|s| s.to_string()))
        .push_opt("customer_id = ?", filter.customer_id);

    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        filters.push_many(
            "(rental_number LIKE ? OR notes LIKE ?)",
            [format!("%{search}%"), format!("%{search}%")],
        );
    }

    let count_sql = format!("SELECT COUNT(*) FROM rentals{}", filters.sql());
    let total = filters
        .bind_scalar(sqlx::query_scalar::<_, i64>(&count_sql))
        .fetch_one(pool)
        .await?;

    let data_sql = format!(
        "SELECT * FROM rentals{} ORDER BY start_date DESC, id DESC LIMIT ? OFFSET ?",
        filters.sql()
    );
    let data = filters
        .bind_as(sqlx::query_as::<_, Rental>(&data_sql))
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await?;

    Ok(Page::new(data, params, total))
}

/// Rewrites a pending rental. Returns false once it has left `pending`.
pub async fn update(pool: &MySqlPool, id: u64, input: &RentalInput) -> AppResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE rentals
        SET customer_id = ?, start_date = ?, expected_end_date = ?, deposit_amount = ?,
            discount_percentage = ?, tax_percentage = ?, notes = ?
        WHERE id = ? AND status = 'pending'
        "#,
    )
    .bind(input.customer_id)
    .bind(input.start_date)
    .bind(input.expected_end_date)
    .bind(input.deposit_amount)
    .bind(input.discount_percentage)
    .bind(input.tax_percentage)
    .bind(&input.notes)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete(pool: &MySqlPool, id: u64) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM rentals WHERE id = ? AND status = 'pending'")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Moves the start date. The new date must still precede the expected end.
pub async fn update_start_date(pool: &MySqlPool, id: u64, start_date: NaiveDate) -> AppResult<Rental> {
    let mut tx = pool.begin().await?;
    let rental = lock(&mut tx, id).await?;

    if matches!(
        rental.status,
        RentalStatus::Completed
            | RentalStatus::InvoicePrepared
            | RentalStatus::Closed
            | RentalStatus::Cancelled
    ) {
        return Err(AppError::conflict(
            "Start date cannot change once the rental is completed",
        ));
    }
    if start_date > rental.expected_end_date {
        return Err(AppError::invalid(
            "start_date",
            "must be on or before the expected end date",
        ));
    }

    sqlx::query("UPDATE rentals SET start_date = ? WHERE id = ?")
        .bind(start_date)
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let updated = lock(&mut tx, id).await?;
    tx.commit().await?;
    Ok(updated)
}

/* =========================
Items
========================= */

pub async fn items(pool: &MySqlPool, rental_id: u64) -> AppResult<Vec<RentalItem>> {
    Ok(
        sqlx::query_as::<_, RentalItem>("SELECT * FROM rental_items WHERE rental_id = ? ORDER BY id")
            .bind(rental_id)
            .fetch_all(pool)
            .await?,
    )
}

/// Items with their equipment names, for invoice lines.
pub async fn items_with_names(
    conn: &mut MySqlConnection,
    rental_id: u64,
) -> AppResult<Vec<(RentalItem, String)>> {
    #[derive(sqlx::FromRow)]
    struct Row {
        #[sqlx(flatten)]
        item: RentalItem,
        equipment_name: String,
    }

    let rows = sqlx::query_as::<_, Row>(
        r#"
        SELECT ri.*, e.name AS equipment_name
        FROM rental_items ri
        JOIN equipment e ON e.id = ri.equipment_id
        WHERE ri.rental_id = ?
        ORDER BY ri.id
        "#,
    )
    .bind(rental_id)
    .fetch_all(conn)
    .await?;

    Ok(rows.into_iter().map(|r| (r.item, r.equipment_name)).collect())
}

pub async fn add_item(
    pool: &MySqlPool,
    rental_id: u64,
    input: &RentalItemInput,
    rate: f64,
) -> AppResult<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO rental_items (rental_id, equipment_id, operator_id, quantity, rate, rate_type)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(rental_id)
    .bind(input.equipment_id)
    .bind(input.operator_id)
    .bind(input.quantity)
    .bind(rate)
    .bind(input.rate_type)
    .execute(pool)
    .await?;
    Ok(result.last_insert_id())
}

pub async fn remove_item(pool: &MySqlPool, rental_id: u64, item_id: u64) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM rental_items WHERE id = ? AND rental_id = ?")
        .bind(item_id)
        .bind(rental_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

async fn item_count(conn: &mut MySqlConnection, rental_id: u64) -> AppResult<usize> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM rental_items WHERE rental_id = ?")
        .bind(rental_id)
        .fetch_one(conn)
        .await?;
    Ok(count.max(0) as usize)
}

/// Live (not cancelled) invoice count and how many of them carry a balance.
async fn invoice_state(conn: &mut MySqlConnection, rental_id: u64) -> AppResult<(i64, i64)> {
    Ok(sqlx::query_as::<_, (i64, i64)>(
        r#"
        SELECT
            COUNT(*),
            CAST(COALESCE(SUM(total_amount - paid_amount > 0.005), 0) AS SIGNED)
        FROM invoices
        WHERE rental_id = ? AND status <> 'cancelled'
        "#,
    )
    .bind(rental_id)
    .fetch_one(conn)
    .await?)
}

/// True when the rental has invoices and every live one is settled.
pub async fn fully_paid(conn: &mut MySqlConnection, rental_id: u64) -> AppResult<bool> {
    let (invoices, unpaid) = invoice_state(conn, rental_id).await?;
    Ok(invoices > 0 && unpaid == 0)
}

/* =========================
Workflow
========================= */

/// Checks and applies one transition on a locked rental, with its equipment
/// side effect and a status log row. The caller owns the transaction.
pub async fn transition_locked(
    conn: &mut MySqlConnection,
    workflow: &dyn RentalWorkflow,
    rental: &Rental,
    to: RentalStatus,
    changed_by: u64,
    notes: Option<&str>,
) -> AppResult<()> {
    let (invoices, unpaid) = invoice_state(&mut *conn, rental.id).await?;
    let ctx = TransitionContext {
        item_count: item_count(&mut *conn, rental.id).await?,
        has_invoice: invoices > 0,
        fully_paid: invoices > 0 && unpaid == 0,
        holds_equipment: rental.holds_equipment(),
    };
    workflow.check_transition(rental.status, to, &ctx)?;

    if to == RentalStatus::Active {
        let busy = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM rental_items ri
            JOIN equipment e ON e.id = ri.equipment_id
            WHERE ri.rental_id = ? AND e.status <> 'available'
            "#,
        )
        .bind(rental.id)
        .fetch_one(&mut *conn)
        .await?;
        if busy > 0 && !ctx.holds_equipment {
            return Err(AppError::conflict(
                "Some equipment on this rental is not available",
            ));
        }
    }

    if to == RentalStatus::Completed {
        sqlx::query(
            r#"
            UPDATE rentals
            SET status = ?, actual_end_date = COALESCE(actual_end_date, CURDATE()),
                completed_by = ?, completed_at = NOW()
            WHERE id = ?
            "#,
        )
        .bind(to)
        .bind(changed_by)
        .bind(rental.id)
        .execute(&mut *conn)
        .await?;
    } else {
        sqlx::query("UPDATE rentals SET status = ? WHERE id = ?")
            .bind(to)
            .bind(rental.id)
            .execute(&mut *conn)
            .await?;
    }

    if let Some(effect) = workflow.equipment_effect(to, &ctx) {
        let touched = equipment::apply_effect(&mut *conn, rental.id, effect).await?;
        info!(rental_id = rental.id, ?effect, touched, "Equipment updated by rental workflow");
    }

    sqlx::query(
        r#"
        INSERT INTO rental_status_logs (rental_id, from_status, to_status, changed_by, notes)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(rental.id)
    .bind(rental.status)
    .bind(to)
    .bind(changed_by)
    .bind(notes)
    .execute(&mut *conn)
    .await?;

    info!(
        rental_id = rental.id,
        from = %rental.status,
        to = %to,
        by = changed_by,
        "Rental status changed"
    );
    Ok(())
}

pub async fn transition(
    pool: &MySqlPool,
    workflow: &dyn RentalWorkflow,
    id: u64,
    to: RentalStatus,
    changed_by: u64,
    notes: Option<&str>,
) -> AppResult<Rental> {
    let mut tx = pool.begin().await?;
    let rental = lock(&mut tx, id).await?;

    transition_locked(&mut tx, workflow, &rental, to, changed_by, notes).await?;

    let updated = lock(&mut tx, id).await?;
    tx.commit().await?;
    Ok(updated)
}

/// Re-evaluates the overdue state and moves the rental if it changed.
pub async fn check_overdue(
    pool: &MySqlPool,
    workflow: &dyn RentalWorkflow,
    id: u64,
    changed_by: u64,
    today: NaiveDate,
) -> AppResult<(OverdueCheck, Rental)> {
    let mut tx = pool.begin().await?;
    let rental = lock(&mut tx, id).await?;
    let paid = fully_paid(&mut tx, id).await?;

    let (outcome, target) = rental.overdue_target(today, paid);
    if let Some(to) = target {
        let note = match outcome {
            OverdueCheck::BecameOverdue => "Marked overdue by overdue check",
            _ => "Overdue cleared by overdue check",
        };
        transition_locked(&mut tx, workflow, &rental, to, changed_by, Some(note)).await?;
    }

    let updated = lock(&mut tx, id).await?;
    tx.commit().await?;
    Ok((outcome, updated))
}

pub async fn history(pool: &MySqlPool, rental_id: u64) -> AppResult<Vec<RentalStatusLog>> {
    Ok(sqlx::query_as::<_, RentalStatusLog>(
        "SELECT * FROM rental_status_logs WHERE rental_id = ? ORDER BY created_at, id",
    )
    .bind(rental_id)
    .fetch_all(pool)
    .await?)
}

pub async fn count(pool: &MySqlPool) -> AppResult<i64> {
    Ok(sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM rentals")
        .fetch_one(pool)
        .await?)
}

pub async fn count_by_status(pool: &MySqlPool) -> AppResult<Vec<(RentalStatus, i64)>> {
    Ok(sqlx::query_as::<_, (RentalStatus, i64)>(
        "SELECT status, COUNT(*) FROM rentals GROUP BY status ORDER BY status",
    )
    .fetch_all(pool)
    .await?)
}

/* =========================
Extensions
========================= */

pub async fn request_extension(
    pool: &MySqlPool,
    rental: &Rental,
    request: &ExtensionRequest,
    requested_by: u64,
) -> AppResult<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO rental_extensions
        (rental_id, previous_end_date, new_end_date, reason, status, requested_by)
        VALUES (?, ?, ?, ?, 'pending', ?)
        "#,
    )
    .bind(rental.id)
    .bind(rental.expected_end_date)
    .bind(request.new_end_date)
    .bind(request.reason.trim())
    .bind(requested_by)
    .execute(pool)
    .await?;
    Ok(result.last_insert_id())
}

pub async fn extensions(pool: &MySqlPool, rental_id: u64) -> AppResult<Vec<RentalExtension>> {
    Ok(sqlx::query_as::<_, RentalExtension>(
        "SELECT * FROM rental_extensions WHERE rental_id = ? ORDER BY created_at DESC, id DESC",
    )
    .bind(rental_id)
    .fetch_all(pool)
    .await?)
}

/// Approves or rejects a pending extension. Approval moves the expected end
/// date; an overdue rental whose new end lies ahead goes back to active.
pub async fn decide_extension(
    pool: &MySqlPool,
    workflow: &dyn RentalWorkflow,
    rental_id: u64,
    extension_id: u64,
    to: ExtensionStatus,
    decided_by: u64,
    today: NaiveDate,
) -> AppResult<RentalExtension> {
    let mut tx = pool.begin().await?;

    let extension = sqlx::query_as::<_, RentalExtension>(
        "SELECT * FROM rental_extensions WHERE id = ? AND rental_id = ? FOR UPDATE",
    )
    .bind(extension_id)
    .bind(rental_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::not_found("Extension request not found"))?;

    if extension.status != ExtensionStatus::Pending {
        return Err(AppError::conflict("Extension request was already decided"));
    }

    sqlx::query(
        "UPDATE rental_extensions SET status = ?, approved_by = ?, approved_at = NOW() WHERE id = ?",
    )
    .bind(to)
    .bind(decided_by)
    .bind(extension_id)
    .execute(&mut *tx)
    .await?;

    if to == ExtensionStatus::Approved {
        let rental = lock(&mut tx, rental_id).await?;
        sqlx::query("UPDATE rentals SET expected_end_date = ? WHERE id = ?")
            .bind(extension.new_end_date)
            .bind(rental_id)
            .execute(&mut *tx)
            .await?;

        if rental.status == RentalStatus::Overdue && extension.new_end_date > today {
            transition_locked(
                &mut tx,
                workflow,
                &rental,
                RentalStatus::Active,
                decided_by,
                Some("Extension approved"),
            )
            .await?;
        }
        info!(
            rental_id,
            extension_id,
            days = extension.duration_days(),
            "Rental extension approved"
        );
    } else {
        warn!(rental_id, extension_id, by = decided_by, "Rental extension rejected");
    }

    let updated = sqlx::query_as::<_, RentalExtension>("SELECT * FROM rental_extensions WHERE id = ?")
        .bind(extension_id)
        .fetch_one(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(updated)
}
