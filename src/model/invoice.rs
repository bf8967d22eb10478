use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::error::FieldErrors;
use crate::model::rental::{Rental, RentalItem};
use crate::model::transition::TransitionError;

/// Floating point slack when comparing money amounts.
const EPSILON: f64 = 0.005;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    PartiallyPaid,
    Paid,
    Overdue,
    Cancelled,
}

sql_text_enum!(InvoiceStatus);

impl InvoiceStatus {
    pub fn accepts_payment(self) -> bool {
        matches!(
            self,
            InvoiceStatus::Draft
                | InvoiceStatus::Sent
                | InvoiceStatus::PartiallyPaid
                | InvoiceStatus::Overdue
        )
    }

    /// Statuses counted as outstanding on the dashboard.
    pub const PENDING: [InvoiceStatus; 3] = [
        InvoiceStatus::Sent,
        InvoiceStatus::Overdue,
        InvoiceStatus::PartiallyPaid,
    ];
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Invoice {
    pub id: u64,
    #[schema(example = "INV-2026-00001")]
    pub invoice_number: String,
    pub customer_id: u64,
    pub rental_id: Option<u64>,
    #[schema(value_type = String, format = "date")]
    pub invoice_date: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub due_date: NaiveDate,
    pub subtotal: f64,
    pub discount_amount: f64,
    pub tax_amount: f64,
    pub total_amount: f64,
    pub paid_amount: f64,
    pub status: InvoiceStatus,
    pub notes: Option<String>,
    pub created_by: u64,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Invoice {
    pub fn balance(&self) -> f64 {
        (self.total_amount - self.paid_amount).max(0.0)
    }

    pub fn is_paid(&self) -> bool {
        self.balance() <= EPSILON
    }

    pub fn send(&self) -> Result<InvoiceStatus, TransitionError> {
        match self.status {
            InvoiceStatus::Draft => Ok(InvoiceStatus::Sent),
            from => Err(TransitionError::new(
                "invoice",
                from,
                InvoiceStatus::Sent,
                "Only draft invoices can be sent",
            )),
        }
    }

    pub fn cancel(&self) -> Result<InvoiceStatus, TransitionError> {
        let reason = if self.paid_amount > 0.0 {
            "Invoices with recorded payments cannot be cancelled"
        } else if matches!(self.status, InvoiceStatus::Paid | InvoiceStatus::Cancelled) {
            "Invoice is already closed"
        } else {
            return Ok(InvoiceStatus::Cancelled);
        };
        Err(TransitionError::new(
            "invoice",
            self.status,
            InvoiceStatus::Cancelled,
            reason,
        ))
    }

    /// New paid amount and status after a payment of `amount`.
    pub fn apply_payment(&self, amount: f64) -> Result<(f64, InvoiceStatus), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.check(amount > 0.0, "amount", "must be greater than 0");
        errors.check(
            amount <= self.balance() + EPSILON,
            "amount",
            "cannot exceed the outstanding balance",
        );
        errors.check(
            self.status.accepts_payment(),
            "invoice",
            "invoice does not accept payments",
        );
        if !errors.is_empty() {
            return Err(errors);
        }

        let paid = self.paid_amount + amount;
        let status = if self.total_amount - paid <= EPSILON {
            InvoiceStatus::Paid
        } else {
            InvoiceStatus::PartiallyPaid
        };
        Ok((paid, status))
    }
}

/// Invoice with its balance, as returned by the API.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InvoiceView {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub balance: f64,
    pub is_paid: bool,
}

impl From<Invoice> for InvoiceView {
    fn from(invoice: Invoice) -> Self {
        Self {
            balance: invoice.balance(),
            is_paid: invoice.is_paid(),
            invoice,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct InvoiceItem {
    pub id: u64,
    pub invoice_id: u64,
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub amount: f64,
}

/// Invoice line before it has an id.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct InvoiceLine {
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub amount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct InvoiceTotals {
    pub subtotal: f64,
    pub discount_amount: f64,
    pub tax_amount: f64,
    pub total_amount: f64,
}

impl InvoiceTotals {
    pub fn compute(lines: &[InvoiceLine], discount_pct: f64, tax_pct: f64) -> Self {
        let subtotal: f64 = lines.iter().map(|l| l.amount).sum();
        let discount_amount = subtotal * discount_pct / 100.0;
        let tax_amount = subtotal * tax_pct / 100.0;
        Self {
            subtotal,
            discount_amount,
            tax_amount,
            total_amount: subtotal - discount_amount + tax_amount,
        }
    }
}

/// Lines for every rental item, plus operator lines for items that carry one.
pub fn rental_lines(
    rental: &Rental,
    items: &[(RentalItem, String)],
    operator_daily_rate: f64,
) -> Vec<InvoiceLine> {
    let days = rental.billable_days();
    let mut lines = Vec::with_capacity(items.len());

    for (item, equipment_name) in items {
        let units = item.rate_type.multiplier(days) as f64;
        let quantity = item.quantity as f64 * units;
        lines.push(InvoiceLine {
            description: format!(
                "{equipment_name} ({} x {units} {})",
                item.quantity, item.rate_type
            ),
            quantity,
            unit_price: item.rate,
            amount: item.rate * quantity,
        });

        if item.operator_id.is_some() {
            lines.push(InvoiceLine {
                description: format!("Operator for {equipment_name} ({days} days)"),
                quantity: days as f64,
                unit_price: operator_daily_rate,
                amount: operator_daily_rate * days as f64,
            });
        }
    }

    lines
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct Payment {
    pub id: u64,
    pub invoice_id: u64,
    pub rental_id: Option<u64>,
    pub amount: f64,
    #[schema(value_type = String, format = "date")]
    pub payment_date: NaiveDate,
    pub method: String,
    pub reference: Option<String>,
    pub status: String,
    pub recorded_by: u64,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PaymentInput {
    #[schema(example = 500.0)]
    pub amount: f64,
    #[schema(example = "bank_transfer")]
    pub method: String,
    pub reference: Option<String>,
    #[schema(value_type = Option<String>, format = "date")]
    pub payment_date: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::rental::{RateType, RentalStatus};

    fn invoice(total: f64, paid: f64, status: InvoiceStatus) -> Invoice {
        Invoice {
            id: 1,
            invoice_number: "INV-2026-00001".to_string(),
            customer_id: 1,
            rental_id: Some(1),
            invoice_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2026, 3, 31).unwrap(),
            subtotal: total,
            discount_amount: 0.0,
            tax_amount: 0.0,
            total_amount: total,
            paid_amount: paid,
            status,
            notes: None,
            created_by: 1,
            created_at: None,
        }
    }

    #[test]
    fn partial_then_full_payment() {
        let inv = invoice(1_000.0, 0.0, InvoiceStatus::Sent);
        let (paid, status) = inv.apply_payment(400.0).unwrap();
        assert_eq!((paid, status), (400.0, InvoiceStatus::PartiallyPaid));

        let inv = invoice(1_000.0, 400.0, InvoiceStatus::PartiallyPaid);
        assert_eq!(inv.balance(), 600.0);
        let (paid, status) = inv.apply_payment(600.0).unwrap();
        assert_eq!((paid, status), (1_000.0, InvoiceStatus::Paid));
    }

    #[test]
    fn payment_bounds() {
        let inv = invoice(100.0, 0.0, InvoiceStatus::Sent);
        assert!(inv.apply_payment(0.0).unwrap_err().has("amount"));
        assert!(inv.apply_payment(100.5).unwrap_err().has("amount"));
        let cancelled = invoice(100.0, 0.0, InvoiceStatus::Cancelled);
        assert!(cancelled.apply_payment(10.0).unwrap_err().has("invoice"));
    }

    #[test]
    fn send_and_cancel_rules() {
        assert_eq!(invoice(10.0, 0.0, InvoiceStatus::Draft).send(), Ok(InvoiceStatus::Sent));
        assert!(invoice(10.0, 0.0, InvoiceStatus::Sent).send().is_err());
        assert!(invoice(10.0, 5.0, InvoiceStatus::PartiallyPaid).cancel().is_err());
        assert_eq!(
            invoice(10.0, 0.0, InvoiceStatus::Sent).cancel(),
            Ok(InvoiceStatus::Cancelled)
        );
    }

    #[test]
    fn totals_apply_discount_and_tax_on_subtotal() {
        let lines = vec![
            InvoiceLine {
                description: "a".to_string(),
                quantity: 1.0,
                unit_price: 600.0,
                amount: 600.0,
            },
            InvoiceLine {
                description: "b".to_string(),
                quantity: 1.0,
                unit_price: 400.0,
                amount: 400.0,
            },
        ];
        let t = InvoiceTotals::compute(&lines, 10.0, 15.0);
        assert_eq!(t.subtotal, 1_000.0);
        assert_eq!(t.discount_amount, 100.0);
        assert_eq!(t.tax_amount, 150.0);
        assert_eq!(t.total_amount, 1_050.0);
    }

    #[test]
    fn lines_use_rate_type_and_operator() {
        let start = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let rental = Rental {
            id: 1,
            rental_number: "RENT-2026-00001".to_string(),
            customer_id: 1,
            start_date: start,
            expected_end_date: start + chrono::Duration::days(10),
            actual_end_date: None,
            status: RentalStatus::Active,
            deposit_amount: 0.0,
            discount_percentage: 0.0,
            tax_percentage: None,
            notes: None,
            invoice_date: None,
            payment_due_date: None,
            completed_by: None,
            completed_at: None,
            created_by: 1,
            created_at: None,
        };
        let weekly = RentalItem {
            id: 1,
            rental_id: 1,
            equipment_id: 7,
            operator_id: Some(3),
            quantity: 2,
            rate: 1_000.0,
            rate_type: RateType::Weekly,
        };
        let lines = rental_lines(&rental, &[(weekly, "Crane".to_string())], 200.0);
        assert_eq!(lines.len(), 2);
        // 10 days bill as 2 weeks, for 2 units.
        assert_eq!(lines[0].amount, 4_000.0);
        assert_eq!(lines[1].amount, 2_000.0);
    }
}
