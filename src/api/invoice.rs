use crate::{
    auth::auth::AuthUser,
    config::Config,
    error::AppError,
    model::{
        invoice::{Invoice, InvoiceItem, InvoiceStatus, InvoiceView, Payment, PaymentInput},
        rental::RentalStatus,
        rental_workflow::RentalWorkflow,
    },
    repo::{
        self,
        invoice::{BillingDefaults, InvoiceFilter},
    },
    utils::pagination::{InvoicePage, PageParams},
};
use actix_web::{HttpResponse, Responder, web};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct InvoiceQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<InvoiceStatus>,
    pub customer_id: Option<u64>,
    pub rental_id: Option<u64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InvoiceDetail {
    #[serde(flatten)]
    pub invoice: InvoiceView,
    pub items: Vec<InvoiceItem>,
    pub payments: Vec<Payment>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentReceipt {
    pub payment_id: u64,
    pub invoice: InvoiceView,
    /// True when this payment settled the rental and closed it
    pub rental_closed: bool,
}

impl From<&Config> for BillingDefaults {
    fn from(config: &Config) -> Self {
        Self {
            tax_percent: config.invoice_tax_percent,
            operator_daily_rate: config.operator_daily_rate,
            payment_terms_days: config.default_payment_terms_days,
        }
    }
}

async fn load_invoice(pool: &MySqlPool, id: u64) -> actix_web::Result<Invoice> {
    repo::invoice::find(pool, id)
        .await?
        .ok_or_else(|| AppError::not_found("Invoice not found").into())
}

#[utoipa::path(
    post,
    path = "/api/rentals/{rental_id}/invoice",
    params(
        ("rental_id", Path, description = "Rental ID")
    ),
    responses(
        (status = 201, description = "Invoice created", body = InvoiceView),
        (status = 200, description = "Rental was already invoiced", body = InvoiceView),
        (status = 409, description = "Rental is not active or completed")
    ),
    tag = "Invoice",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_from_rental(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    workflow: web::Data<dyn RentalWorkflow>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_staff()?;

    let (invoice, created) = repo::invoice::create_from_rental(
        pool.get_ref(),
        workflow.get_ref(),
        path.into_inner(),
        auth.user_id,
        BillingDefaults::from(config.get_ref()),
        Utc::now().date_naive(),
    )
    .await?;

    let view = InvoiceView::from(invoice);
    Ok(if created {
        HttpResponse::Created().json(view)
    } else {
        HttpResponse::Ok().json(view)
    })
}

#[utoipa::path(
    get,
    path = "/api/invoices",
    params(InvoiceQuery),
    responses(
        (status = 200, body = InvoicePage)
    ),
    tag = "Invoice",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_invoices(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<InvoiceQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_staff()?;

    let query = query.into_inner();
    let params = PageParams::new(query.page, query.per_page);
    let filter = InvoiceFilter {
        status: query.status,
        customer_id: query.customer_id,
        rental_id: query.rental_id,
    };

    let page = repo::invoice::list(pool.get_ref(), &filter, params)
        .await?
        .map(InvoiceView::from);
    Ok(HttpResponse::Ok().json(page))
}

#[utoipa::path(
    get,
    path = "/api/invoices/{invoice_id}",
    params(
        ("invoice_id", Path, description = "Invoice ID")
    ),
    responses(
        (status = 200, body = InvoiceDetail),
        (status = 404, description = "Invoice not found")
    ),
    tag = "Invoice",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_invoice(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_staff()?;
    let invoice = load_invoice(pool.get_ref(), path.into_inner()).await?;
    let items = repo::invoice::items(pool.get_ref(), invoice.id).await?;
    let payments = repo::invoice::payments(pool.get_ref(), invoice.id).await?;

    Ok(HttpResponse::Ok().json(InvoiceDetail {
        invoice: InvoiceView::from(invoice),
        items,
        payments,
    }))
}

#[utoipa::path(
    put,
    path = "/api/invoices/{invoice_id}/send",
    params(
        ("invoice_id", Path, description = "Invoice ID")
    ),
    responses(
        (status = 200, body = InvoiceView),
        (status = 409, description = "Only draft invoices can be sent")
    ),
    tag = "Invoice",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn send_invoice(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_staff()?;
    let invoice =
        repo::invoice::change_status(pool.get_ref(), path.into_inner(), InvoiceStatus::Sent).await?;
    Ok(HttpResponse::Ok().json(InvoiceView::from(invoice)))
}

#[utoipa::path(
    put,
    path = "/api/invoices/{invoice_id}/cancel",
    params(
        ("invoice_id", Path, description = "Invoice ID")
    ),
    responses(
        (status = 200, body = InvoiceView),
        (status = 409, description = "Invoice has payments or is closed")
    ),
    tag = "Invoice",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn cancel_invoice(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let invoice =
        repo::invoice::change_status(pool.get_ref(), path.into_inner(), InvoiceStatus::Cancelled)
            .await?;
    Ok(HttpResponse::Ok().json(InvoiceView::from(invoice)))
}

/* =========================
Payments
========================= */

#[utoipa::path(
    post,
    path = "/api/invoices/{invoice_id}/payments",
    params(
        ("invoice_id", Path, description = "Invoice ID")
    ),
    request_body = PaymentInput,
    responses(
        (status = 201, body = PaymentReceipt),
        (status = 422, description = "Amount is not positive or exceeds the balance", body = Object, example = json!({
            "message": "Validation failed",
            "errors": {"amount": ["cannot exceed the outstanding balance"]}
        }))
    ),
    tag = "Invoice",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn record_payment(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    workflow: web::Data<dyn RentalWorkflow>,
    path: web::Path<u64>,
    payload: web::Json<PaymentInput>,
) -> actix_web::Result<impl Responder> {
    auth.require_staff()?;
    if payload.method.trim().is_empty() {
        return Err(AppError::invalid("method", "is required").into());
    }

    let recorded = repo::invoice::record_payment(
        pool.get_ref(),
        workflow.get_ref(),
        path.into_inner(),
        &payload,
        auth.user_id,
        Utc::now().date_naive(),
    )
    .await?;

    if recorded.rental_closed {
        info!(
            invoice_id = recorded.invoice.id,
            rental_id = ?recorded.invoice.rental_id,
            to = %RentalStatus::Closed,
            "Rental settled by payment"
        );
    }

    Ok(HttpResponse::Created().json(PaymentReceipt {
        payment_id: recorded.payment_id,
        rental_closed: recorded.rental_closed,
        invoice: InvoiceView::from(recorded.invoice),
    }))
}

#[utoipa::path(
    get,
    path = "/api/invoices/{invoice_id}/payments",
    params(
        ("invoice_id", Path, description = "Invoice ID")
    ),
    responses(
        (status = 200, body = [Payment])
    ),
    tag = "Invoice",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_payments(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_staff()?;
    let invoice = load_invoice(pool.get_ref(), path.into_inner()).await?;
    let payments = repo::invoice::payments(pool.get_ref(), invoice.id).await?;
    Ok(HttpResponse::Ok().json(payments))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn billing_defaults_come_from_config() {
        let mut config = Config::for_tests();
        config.invoice_tax_percent = 5.0;
        config.default_payment_terms_days = 14;

        let billing = BillingDefaults::from(&config);
        assert_eq!(billing.tax_percent, 5.0);
        assert_eq!(billing.payment_terms_days, 14);
        assert_eq!(billing.operator_daily_rate, config.operator_daily_rate);
    }
}
