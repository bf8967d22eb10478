use chrono::{Datelike, Duration, NaiveDate};
use sqlx::{MySqlConnection, MySqlPool};
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::model::customer::Customer;
use crate::model::invoice::{
    Invoice, InvoiceItem, InvoiceStatus, InvoiceTotals, Payment, PaymentInput, rental_lines,
};
use crate::model::numbering::{next_document_number, sequence_sql, year_pattern};
use crate::model::rental::{PaymentSummary, Rental, RentalStatus};
use crate::model::rental_workflow::RentalWorkflow;
use crate::repo::{rental, with_numbering_retry};
use crate::utils::pagination::{Page, PageParams};
use crate::utils::query::Filters;

pub const INVOICE_PREFIX: &str = "INV";

/// Billing settings applied when a rental is invoiced.
#[derive(Debug, Clone, Copy)]
pub struct BillingDefaults {
    pub tax_percent: f64,
    pub operator_daily_rate: f64,
    pub payment_terms_days: i64,
}

#[derive(Debug, Default)]
pub struct InvoiceFilter {
    pub status: Option<InvoiceStatus>,
    pub customer_id: Option<u64>,
    pub rental_id: Option<u64>,
}

pub async fn find(pool: &MySqlPool, id: u64) -> AppResult<Option<Invoice>> {
    Ok(
        sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?,
    )
}

async fn lock(conn: &mut MySqlConnection, id: u64) -> AppResult<Invoice> {
    sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE id = ? FOR UPDATE")
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::not_found("Invoice not found"))
}

pub async fn items(pool: &MySqlPool, invoice_id: u64) -> AppResult<Vec<InvoiceItem>> {
    Ok(sqlx::query_as::<_, InvoiceItem>(
        "SELECT * FROM invoice_items WHERE invoice_id = ? ORDER BY id",
    )
    .bind(invoice_id)
    .fetch_all(pool)
    .await?)
}

pub async fn payments(pool: &MySqlPool, invoice_id: u64) -> AppResult<Vec<Payment>> {
    Ok(sqlx::query_as::<_, Payment>(
        "SELECT * FROM payments WHERE invoice_id = ? ORDER BY payment_date, id",
    )
    .bind(invoice_id)
    .fetch_all(pool)
    .await?)
}

pub async fn list(
    pool: &MySqlPool,
    filter: &InvoiceFilter,
    params: PageParams,
) -> AppResult<Page<Invoice>> {
    let mut filters = Filters::new();
    filters
        .push_opt("status = ?", filter.status.map(|s| s.to_string()))
        .push_opt("customer_id = ?", filter.customer_id)
        .push_opt("rental_id = ?", filter.rental_id);

    let count_sql = format!("SELECT COUNT(*) FROM invoices{}", filters.sql());
    let total = filters
        .bind_scalar(sqlx::query_scalar::<_, i64>(&count_sql))
        .fetch_one(pool)
        .await?;

    let data_sql = format!(
        "SELECT * FROM invoices{} ORDER BY invoice_date DESC, id DESC LIMIT ? OFFSET ?",
        filters.sql()
    );
    let data = filters
        .bind_as(sqlx::query_as::<_, Invoice>(&data_sql))
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await?;

    Ok(Page::new(data, params, total))
}

async fn existing_for_rental(conn: &mut MySqlConnection, rental_id: u64) -> AppResult<Option<Invoice>> {
    Ok(sqlx::query_as::<_, Invoice>(
        r#"
        SELECT * FROM invoices
        WHERE rental_id = ? AND status <> 'cancelled'
        ORDER BY id
        LIMIT 1
        "#,
    )
    .bind(rental_id)
    .fetch_optional(conn)
    .await?)
}

async fn next_number(conn: &mut MySqlConnection, year: i32) -> AppResult<String> {
    let sql = format!(
        "SELECT MAX({}) FROM invoices WHERE invoice_number LIKE ? FOR UPDATE",
        sequence_sql("invoice_number")
    );
    let last = sqlx::query_scalar::<_, Option<u64>>(&sql)
        .bind(year_pattern(INVOICE_PREFIX, year))
        .fetch_one(conn)
        .await?;
    Ok(next_document_number(INVOICE_PREFIX, year, last))
}

/// Invoices a rental in one transaction: invoice row, its lines, the
/// rental's billing dates and the move to `invoice_prepared`. A rental that
/// already has a live invoice gets that invoice back.
///
/// Returns the invoice and whether it was created by this call.
pub async fn create_from_rental(
    pool: &MySqlPool,
    workflow: &dyn RentalWorkflow,
    rental_id: u64,
    created_by: u64,
    billing: BillingDefaults,
    today: NaiveDate,
) -> AppResult<(Invoice, bool)> {
    with_numbering_retry("invoice", || {
        try_create_from_rental(pool, workflow, rental_id, created_by, billing, today)
    })
    .await
}

async fn try_create_from_rental(
    pool: &MySqlPool,
    workflow: &dyn RentalWorkflow,
    rental_id: u64,
    created_by: u64,
    billing: BillingDefaults,
    today: NaiveDate,
) -> AppResult<(Invoice, bool)> {
    let mut tx = pool.begin().await?;

    let rental = sqlx::query_as::<_, Rental>("SELECT * FROM rentals WHERE id = ? FOR UPDATE")
        .bind(rental_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("Rental not found"))?;

    if let Some(invoice) = existing_for_rental(&mut tx, rental_id).await? {
        if rental.status != RentalStatus::InvoicePrepared
            && workflow.can_transition(rental.status, RentalStatus::InvoicePrepared)
        {
            rental::transition_locked(
                &mut tx,
                workflow,
                &rental,
                RentalStatus::InvoicePrepared,
                created_by,
                Some("Existing invoice reused"),
            )
            .await?;
        }
        tx.commit().await?;
        return Ok((invoice, false));
    }

    if !matches!(rental.status, RentalStatus::Active | RentalStatus::Completed) {
        return Err(AppError::conflict(format!(
            "Only active or completed rentals can be invoiced (rental is {})",
            rental.status
        )));
    }

    let customer = sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = ?")
        .bind(rental.customer_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("Customer not found"))?;

    let items = rental::items_with_names(&mut tx, rental_id).await?;
    let lines = rental_lines(&rental, &items, billing.operator_daily_rate);
    let totals = InvoiceTotals::compute(
        &lines,
        rental.discount_percentage,
        rental.tax_percentage.unwrap_or(billing.tax_percent),
    );

    let number = next_number(&mut tx, today.year()).await?;
    let due_date = today + Duration::days(customer.payment_terms_days(billing.payment_terms_days));

    let invoice_id = sqlx::query(
        r#"
        INSERT INTO invoices
        (invoice_number, customer_id, rental_id, invoice_date, due_date, subtotal,
         discount_amount, tax_amount, total_amount, paid_amount, status, created_by)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0, 'draft', ?)
        "#,
    )
    .bind(&number)
    .bind(rental.customer_id)
    .bind(rental_id)
    .bind(today)
    .bind(due_date)
    .bind(totals.subtotal)
    .bind(totals.discount_amount)
    .bind(totals.tax_amount)
    .bind(totals.total_amount)
    .bind(created_by)
    .execute(&mut *tx)
    .await?
    .last_insert_id();

    for line in &lines {
        sqlx::query(
            r#"
            INSERT INTO invoice_items (invoice_id, description, quantity, unit_price, amount)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(invoice_id)
        .bind(&line.description)
        .bind(line.quantity)
        .bind(line.unit_price)
        .bind(line.amount)
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query("UPDATE rentals SET invoice_date = ?, payment_due_date = ? WHERE id = ?")
        .bind(today)
        .bind(due_date)
        .bind(rental_id)
        .execute(&mut *tx)
        .await?;

    rental::transition_locked(
        &mut tx,
        workflow,
        &rental,
        RentalStatus::InvoicePrepared,
        created_by,
        Some(&format!("Invoice {number} created")),
    )
    .await?;

    let invoice = lock(&mut tx, invoice_id).await?;
    tx.commit().await?;

    info!(
        invoice_id,
        invoice_number = %number,
        rental_id,
        total = totals.total_amount,
        "Invoice created from rental"
    );
    Ok((invoice, true))
}

/// `draft -> sent` or `-> cancelled`, checked under a row lock.
pub async fn change_status(pool: &MySqlPool, id: u64, to: InvoiceStatus) -> AppResult<Invoice> {
    let mut tx = pool.begin().await?;
    let invoice = lock(&mut tx, id).await?;

    let next = match to {
        InvoiceStatus::Sent => invoice.send()?,
        InvoiceStatus::Cancelled => invoice.cancel()?,
        other => {
            return Err(AppError::bad_request(format!(
                "Invoice status {other} is set by payments only"
            )));
        }
    };

    sqlx::query("UPDATE invoices SET status = ? WHERE id = ?")
        .bind(next)
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let updated = lock(&mut tx, id).await?;
    tx.commit().await?;
    info!(invoice_id = id, from = %invoice.status, to = %next, "Invoice status changed");
    Ok(updated)
}

#[derive(Debug)]
pub struct RecordedPayment {
    pub invoice: Invoice,
    pub payment_id: u64,
    pub rental_closed: bool,
}

/// Records a payment and settles the invoice. When the last open invoice
/// of a rental is paid, the rental closes in the same transaction.
pub async fn record_payment(
    pool: &MySqlPool,
    workflow: &dyn RentalWorkflow,
    invoice_id: u64,
    input: &PaymentInput,
    recorded_by: u64,
    today: NaiveDate,
) -> AppResult<RecordedPayment> {
    let mut tx = pool.begin().await?;
    let invoice = lock(&mut tx, invoice_id).await?;

    let (paid_amount, status) = invoice
        .apply_payment(input.amount)
        .map_err(AppError::Validation)?;

    let payment_id = sqlx::query(
        r#"
        INSERT INTO payments
        (invoice_id, rental_id, amount, payment_date, method, reference, status, recorded_by)
        VALUES (?, ?, ?, ?, ?, ?, 'completed', ?)
        "#,
    )
    .bind(invoice_id)
    .bind(invoice.rental_id)
    .bind(input.amount)
    .bind(input.payment_date.unwrap_or(today))
    .bind(input.method.trim())
    .bind(&input.reference)
    .bind(recorded_by)
    .execute(&mut *tx)
    .await?
    .last_insert_id();

    sqlx::query("UPDATE invoices SET paid_amount = ?, status = ? WHERE id = ?")
        .bind(paid_amount)
        .bind(status)
        .bind(invoice_id)
        .execute(&mut *tx)
        .await?;

    let mut rental_closed = false;
    if let Some(rental_id) = invoice.rental_id {
        let rental = sqlx::query_as::<_, Rental>("SELECT * FROM rentals WHERE id = ? FOR UPDATE")
            .bind(rental_id)
            .fetch_optional(&mut *tx)
            .await?;

        if let Some(rental) = rental.filter(|r| {
            matches!(r.status, RentalStatus::InvoicePrepared | RentalStatus::Overdue)
        }) {
            if rental::fully_paid(&mut tx, rental_id).await? {
                rental::transition_locked(
                    &mut tx,
                    workflow,
                    &rental,
                    RentalStatus::Closed,
                    recorded_by,
                    Some("All invoices paid"),
                )
                .await?;
                rental_closed = true;
            }
        }
    }

    let invoice = lock(&mut tx, invoice_id).await?;
    tx.commit().await?;

    info!(
        invoice_id,
        payment_id,
        amount = input.amount,
        status = %status,
        rental_closed,
        "Payment recorded"
    );
    Ok(RecordedPayment {
        invoice,
        payment_id,
        rental_closed,
    })
}

/// Money position of a rental over its live invoices.
pub async fn payment_summary(
    pool: &MySqlPool,
    rental: &Rental,
    today: NaiveDate,
) -> AppResult<PaymentSummary> {
    let (total_amount, total_paid) = sqlx::query_as::<_, (f64, f64)>(
        r#"
        SELECT COALESCE(SUM(total_amount), 0e0), COALESCE(SUM(paid_amount), 0e0)
        FROM invoices
        WHERE rental_id = ? AND status <> 'cancelled'
        "#,
    )
    .bind(rental.id)
    .fetch_one(pool)
    .await?;

    Ok(PaymentSummary::compute(
        total_amount,
        total_paid,
        rental.payment_due_date,
        today,
    ))
}
