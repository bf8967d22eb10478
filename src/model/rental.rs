use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

use crate::error::FieldErrors;

pub const MIN_EXTENSION_REASON_LEN: usize = 10;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RentalStatus {
    Pending,
    Quotation,
    QuotationApproved,
    Mobilization,
    MobilizationCompleted,
    Active,
    Overdue,
    Completed,
    InvoicePrepared,
    Closed,
    Cancelled,
}

sql_text_enum!(RentalStatus);

impl RentalStatus {
    pub fn is_editable(self) -> bool {
        self == RentalStatus::Pending
    }

    /// Items can change until the quotation is approved.
    pub fn allows_item_changes(self) -> bool {
        matches!(self, RentalStatus::Pending | RentalStatus::Quotation)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RateType {
    Daily,
    Weekly,
    Monthly,
}

sql_text_enum!(RateType);

impl RateType {
    /// Billing units for a rental lasting `days`.
    pub fn multiplier(self, days: i64) -> i64 {
        match self {
            RateType::Daily => days,
            RateType::Weekly => (days + 6) / 7,
            RateType::Monthly => (days + 29) / 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Rental {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "RENT-2026-00001")]
    pub rental_number: String,
    pub customer_id: u64,
    #[schema(value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub expected_end_date: NaiveDate,
    #[schema(value_type = Option<String>, format = "date")]
    pub actual_end_date: Option<NaiveDate>,
    pub status: RentalStatus,
    pub deposit_amount: f64,
    pub discount_percentage: f64,
    pub tax_percentage: Option<f64>,
    pub notes: Option<String>,
    #[schema(value_type = Option<String>, format = "date")]
    pub invoice_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>, format = "date")]
    pub payment_due_date: Option<NaiveDate>,
    pub completed_by: Option<u64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub completed_at: Option<NaiveDateTime>,
    pub created_by: u64,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Outcome of re-evaluating a rental's overdue state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OverdueCheck {
    BecameOverdue,
    NoLongerOverdue,
    Unchanged,
}

impl Rental {
    pub fn end_date(&self) -> NaiveDate {
        self.actual_end_date.unwrap_or(self.expected_end_date)
    }

    pub fn duration_days(&self) -> i64 {
        (self.end_date() - self.start_date).num_days().max(0)
    }

    /// Equipment is out from activation until the rental completes. A rental
    /// invoiced while active keeps it until it closes.
    pub fn holds_equipment(&self) -> bool {
        matches!(
            self.status,
            RentalStatus::Active | RentalStatus::Overdue | RentalStatus::InvoicePrepared
        ) && self.completed_at.is_none()
    }

    /// Days billed on invoices; a same-day rental bills one day.
    pub fn billable_days(&self) -> i64 {
        self.duration_days().max(1)
    }

    /// Whether the rental is late on return or on payment as of `today`.
    pub fn is_overdue(&self, today: NaiveDate, invoices_fully_paid: bool) -> bool {
        match self.status {
            RentalStatus::Completed | RentalStatus::Closed | RentalStatus::Cancelled => {
                return false;
            }
            RentalStatus::Active | RentalStatus::Overdue
                if self.invoice_date.is_none()
                    && self.actual_end_date.is_none()
                    && self.expected_end_date < today =>
            {
                return true;
            }
            _ => {}
        }

        match (self.invoice_date, self.payment_due_date) {
            (Some(_), Some(due)) => due < today && !invoices_fully_paid,
            _ => false,
        }
    }

    /// Target status for an overdue check, if the status should change.
    pub fn overdue_target(
        &self,
        today: NaiveDate,
        invoices_fully_paid: bool,
    ) -> (OverdueCheck, Option<RentalStatus>) {
        let overdue = self.is_overdue(today, invoices_fully_paid);
        match self.status {
            RentalStatus::Active | RentalStatus::InvoicePrepared if overdue => {
                (OverdueCheck::BecameOverdue, Some(RentalStatus::Overdue))
            }
            RentalStatus::Overdue if !overdue => {
                let back = if self.invoice_date.is_some() {
                    RentalStatus::InvoicePrepared
                } else {
                    RentalStatus::Active
                };
                (OverdueCheck::NoLongerOverdue, Some(back))
            }
            _ => (OverdueCheck::Unchanged, None),
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RentalInput {
    pub customer_id: u64,
    #[schema(value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub expected_end_date: NaiveDate,
    #[serde(default)]
    pub deposit_amount: f64,
    #[serde(default)]
    pub discount_percentage: f64,
    pub tax_percentage: Option<f64>,
    pub notes: Option<String>,
}

impl RentalInput {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        errors.check(
            self.expected_end_date >= self.start_date,
            "expected_end_date",
            "must be on or after start_date",
        );
        errors.check(self.deposit_amount >= 0.0, "deposit_amount", "cannot be negative");
        errors.check(
            (0.0..=100.0).contains(&self.discount_percentage),
            "discount_percentage",
            "must be between 0 and 100",
        );
        if let Some(tax) = self.tax_percentage {
            errors.check((0.0..=100.0).contains(&tax), "tax_percentage", "must be between 0 and 100");
        }
        errors
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct RentalItem {
    pub id: u64,
    pub rental_id: u64,
    pub equipment_id: u64,
    /// Operator employee assigned with the equipment
    pub operator_id: Option<u64>,
    pub quantity: u32,
    pub rate: f64,
    pub rate_type: RateType,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RentalItemInput {
    pub equipment_id: u64,
    pub operator_id: Option<u64>,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    /// Defaults to the equipment's rate for `rate_type`
    pub rate: Option<f64>,
    pub rate_type: RateType,
}

fn default_quantity() -> u32 {
    1
}

impl RentalItemInput {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        errors.check(self.quantity > 0, "quantity", "must be at least 1");
        if let Some(rate) = self.rate {
            errors.check(rate >= 0.0, "rate", "cannot be negative");
        }
        errors
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct RentalStatusLog {
    pub id: u64,
    pub rental_id: u64,
    pub from_status: RentalStatus,
    pub to_status: RentalStatus,
    pub changed_by: u64,
    pub notes: Option<String>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExtensionStatus {
    Pending,
    Approved,
    Rejected,
}

sql_text_enum!(ExtensionStatus);

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct RentalExtension {
    pub id: u64,
    pub rental_id: u64,
    #[schema(value_type = String, format = "date")]
    pub previous_end_date: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub new_end_date: NaiveDate,
    pub reason: String,
    pub status: ExtensionStatus,
    pub requested_by: u64,
    pub approved_by: Option<u64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub approved_at: Option<NaiveDateTime>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub created_at: Option<DateTime<Utc>>,
}

impl RentalExtension {
    pub fn duration_days(&self) -> i64 {
        (self.new_end_date - self.previous_end_date).num_days()
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ExtensionRequest {
    #[schema(value_type = String, format = "date")]
    pub new_end_date: NaiveDate,
    #[schema(example = "Foundation work delayed by rain")]
    pub reason: String,
}

impl ExtensionRequest {
    pub fn validate(&self, rental: &Rental, today: NaiveDate) -> FieldErrors {
        let mut errors = FieldErrors::new();
        errors.check(self.new_end_date > today, "new_end_date", "must be after today");
        errors.check(
            self.new_end_date > rental.expected_end_date,
            "new_end_date",
            "must be after the current expected end date",
        );
        errors.check(
            self.reason.trim().chars().count() >= MIN_EXTENSION_REASON_LEN,
            "reason",
            "must be at least 10 characters",
        );
        errors.check(
            matches!(rental.status, RentalStatus::Active | RentalStatus::Overdue),
            "rental",
            "only active or overdue rentals can be extended",
        );
        errors
    }
}

/// Money position of a rental across its invoices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct PaymentSummary {
    pub total_amount: f64,
    pub total_paid: f64,
    pub remaining_balance: f64,
    pub payment_progress: i64,
    pub is_payment_overdue: bool,
    pub days_overdue: i64,
}

impl PaymentSummary {
    pub fn compute(
        total_amount: f64,
        total_paid: f64,
        payment_due_date: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Self {
        let remaining_balance = total_amount - total_paid;
        let payment_progress = if total_amount <= 0.0 {
            100
        } else {
            (total_paid / total_amount * 100.0).round() as i64
        };
        let is_payment_overdue =
            remaining_balance > 0.0 && payment_due_date.is_some_and(|due| today > due);
        let days_overdue = match payment_due_date {
            Some(due) if is_payment_overdue => (today - due).num_days(),
            _ => 0,
        };

        Self {
            total_amount,
            total_paid,
            remaining_balance,
            payment_progress,
            is_payment_overdue,
            days_overdue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, m, day).unwrap()
    }

    fn rental(status: RentalStatus) -> Rental {
        Rental {
            id: 1,
            rental_number: "RENT-2026-00001".to_string(),
            customer_id: 1,
            start_date: d(3, 1),
            expected_end_date: d(3, 15),
            actual_end_date: None,
            status,
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
        }
    }

    #[test]
    fn equipment_is_held_until_completion() {
        assert!(!rental(RentalStatus::Mobilization).holds_equipment());
        assert!(rental(RentalStatus::Active).holds_equipment());
        assert!(rental(RentalStatus::InvoicePrepared).holds_equipment());

        let mut completed_then_invoiced = rental(RentalStatus::InvoicePrepared);
        completed_then_invoiced.completed_at = NaiveDate::from_ymd_opt(2026, 3, 14)
            .and_then(|day| day.and_hms_opt(9, 0, 0));
        assert!(!completed_then_invoiced.holds_equipment());
        assert!(!rental(RentalStatus::Closed).holds_equipment());
    }

    #[test]
    fn duration_prefers_actual_end() {
        let mut r = rental(RentalStatus::Active);
        assert_eq!(r.duration_days(), 14);
        r.actual_end_date = Some(d(3, 11));
        assert_eq!(r.duration_days(), 10);
        r.actual_end_date = Some(d(2, 1));
        assert_eq!(r.duration_days(), 0);
        assert_eq!(r.billable_days(), 1);
    }

    #[test]
    fn rate_multipliers_round_up() {
        assert_eq!(RateType::Daily.multiplier(10), 10);
        assert_eq!(RateType::Weekly.multiplier(7), 1);
        assert_eq!(RateType::Weekly.multiplier(8), 2);
        assert_eq!(RateType::Monthly.multiplier(30), 1);
        assert_eq!(RateType::Monthly.multiplier(31), 2);
    }

    #[test]
    fn active_rental_past_expected_end_is_overdue() {
        let r = rental(RentalStatus::Active);
        assert!(!r.is_overdue(d(3, 15), true));
        assert!(r.is_overdue(d(3, 16), true));
        assert!(!rental(RentalStatus::Completed).is_overdue(d(5, 1), false));
    }

    #[test]
    fn invoiced_rental_is_overdue_only_while_unpaid() {
        let mut r = rental(RentalStatus::InvoicePrepared);
        r.invoice_date = Some(d(3, 15));
        r.payment_due_date = Some(d(4, 14));
        assert!(!r.is_overdue(d(4, 14), false));
        assert!(r.is_overdue(d(4, 20), false));
        assert!(!r.is_overdue(d(4, 20), true));
    }

    #[test]
    fn overdue_check_outcomes() {
        let r = rental(RentalStatus::Active);
        assert_eq!(
            r.overdue_target(d(3, 20), false),
            (OverdueCheck::BecameOverdue, Some(RentalStatus::Overdue))
        );

        let mut late = rental(RentalStatus::Overdue);
        late.expected_end_date = d(4, 30);
        assert_eq!(
            late.overdue_target(d(3, 20), false),
            (OverdueCheck::NoLongerOverdue, Some(RentalStatus::Active))
        );

        let mut paid = rental(RentalStatus::Overdue);
        paid.invoice_date = Some(d(3, 15));
        paid.payment_due_date = Some(d(3, 16));
        assert_eq!(
            paid.overdue_target(d(3, 20), true),
            (OverdueCheck::NoLongerOverdue, Some(RentalStatus::InvoicePrepared))
        );

        assert_eq!(
            rental(RentalStatus::Pending).overdue_target(d(9, 1), false),
            (OverdueCheck::Unchanged, None)
        );
    }

    #[test]
    fn extension_request_rules() {
        let r = rental(RentalStatus::Active);
        let ok = ExtensionRequest {
            new_end_date: d(3, 25),
            reason: "Concrete pour delayed".to_string(),
        };
        assert!(ok.validate(&r, d(3, 10)).is_empty());

        let bad = ExtensionRequest {
            new_end_date: d(3, 12),
            reason: "short".to_string(),
        };
        let errors = bad.validate(&rental(RentalStatus::Pending), d(3, 10));
        assert!(errors.has("new_end_date"));
        assert!(errors.has("reason"));
        assert!(errors.has("rental"));
    }

    #[test]
    fn payment_summary() {
        let s = PaymentSummary::compute(1_000.0, 333.0, Some(d(4, 1)), d(4, 11));
        assert_eq!(s.remaining_balance, 667.0);
        assert_eq!(s.payment_progress, 33);
        assert!(s.is_payment_overdue);
        assert_eq!(s.days_overdue, 10);

        let nothing_due = PaymentSummary::compute(0.0, 0.0, None, d(4, 11));
        assert_eq!(nothing_due.payment_progress, 100);
        assert!(!nothing_due.is_payment_overdue);
    }
}
