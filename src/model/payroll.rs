use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::model::transition::TransitionError;

const OVERTIME_MULTIPLIER: f64 = 1.5;
const HOURS_PER_DAY: f64 = 8.0;
const INSURANCE_RATE: f64 = 0.02;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PayrollStatus {
    Pending,
    Approved,
    Paid,
    Cancelled,
}

sql_text_enum!(PayrollStatus);

impl PayrollStatus {
    pub fn can_transition_to(self, to: PayrollStatus) -> bool {
        use PayrollStatus::*;
        matches!(
            (self, to),
            (Pending, Approved) | (Approved, Paid) | (Pending, Cancelled) | (Approved, Cancelled)
        )
    }

    pub fn transition(self, to: PayrollStatus) -> Result<PayrollStatus, TransitionError> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(TransitionError::new(
                "payroll",
                self,
                to,
                "Transition not allowed for this payroll",
            ))
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PayrollItemType {
    BaseSalary,
    Overtime,
    Bonus,
    UnpaidLeave,
    Tax,
    Insurance,
    Payment,
}

sql_text_enum!(PayrollItemType);

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Payroll {
    pub id: u64,
    pub employee_id: u64,
    #[schema(value_type = String, format = "date")]
    pub month: NaiveDate,
    pub base_salary: f64,
    pub overtime_hours: f64,
    pub overtime_amount: f64,
    pub bonus: f64,
    pub deductions: f64,
    pub net_salary: f64,
    pub total_worked_hours: f64,
    pub status: PayrollStatus,
    pub approved_by: Option<u64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub approved_at: Option<NaiveDateTime>,
    pub payment_method: Option<String>,
    pub payment_reference: Option<String>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub paid_at: Option<NaiveDateTime>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct PayrollItem {
    pub id: u64,
    pub payroll_id: u64,
    pub item_type: PayrollItemType,
    pub description: String,
    pub amount: f64,
    pub is_taxable: bool,
}

/// Net pay for the manual create/update path.
pub fn manual_net(base_salary: f64, bonus: f64, deductions: f64) -> f64 {
    base_salary + bonus - deductions
}

/// What one employee worked in a month, as read from approved timesheets and leave.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MonthlyWork {
    pub days_worked: u32,
    pub regular_hours: f64,
    pub overtime_hours: f64,
    pub unpaid_leave_days: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct PayrollBreakdown {
    pub daily_rate: f64,
    pub base_amount: f64,
    pub overtime_amount: f64,
    pub bonus: f64,
    pub gross: f64,
    pub unpaid_deduction: f64,
    pub tax: f64,
    pub insurance: f64,
    pub deductions: f64,
    pub net: f64,
}

impl PayrollBreakdown {
    /// Itemised lines stored next to the payroll row; deductions are negative.
    pub fn items(&self, work: &MonthlyWork) -> Vec<(PayrollItemType, String, f64, bool)> {
        let mut items = vec![(
            PayrollItemType::BaseSalary,
            format!("Base salary ({} days)", work.days_worked),
            self.base_amount,
            true,
        )];
        if self.overtime_amount > 0.0 {
            items.push((
                PayrollItemType::Overtime,
                format!("Overtime ({} hours)", work.overtime_hours),
                self.overtime_amount,
                true,
            ));
        }
        if self.unpaid_deduction > 0.0 {
            items.push((
                PayrollItemType::UnpaidLeave,
                format!("Unpaid leave ({} days)", work.unpaid_leave_days),
                -self.unpaid_deduction,
                false,
            ));
        }
        if self.tax > 0.0 {
            items.push((PayrollItemType::Tax, "Income tax".to_string(), -self.tax, false));
        }
        items.push((
            PayrollItemType::Insurance,
            "Social insurance".to_string(),
            -self.insurance,
            false,
        ));
        items
    }
}

pub fn days_in_month(month: NaiveDate) -> u32 {
    let (y, m) = (month.year(), month.month());
    let next = if m == 12 {
        NaiveDate::from_ymd_opt(y + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(y, m + 1, 1)
    };
    match (NaiveDate::from_ymd_opt(y, m, 1), next) {
        (Some(first), Some(next)) => (next - first).num_days() as u32,
        _ => 30,
    }
}

/// First day of the month containing `date`.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub fn income_tax(gross: f64) -> f64 {
    if gross > 10_000.0 {
        gross * 0.10
    } else if gross > 5_000.0 {
        gross * 0.05
    } else {
        0.0
    }
}

pub fn compute_breakdown(basic_salary: f64, month: NaiveDate, work: &MonthlyWork) -> PayrollBreakdown {
    let days = days_in_month(month) as f64;
    let daily_rate = basic_salary / days;
    let base_amount = daily_rate * work.days_worked as f64;

    let hourly_rate = basic_salary / (days * HOURS_PER_DAY);
    let overtime_amount = work.overtime_hours * hourly_rate * OVERTIME_MULTIPLIER;

    let bonus = 0.0;
    let gross = base_amount + overtime_amount + bonus;

    let unpaid_deduction = daily_rate * work.unpaid_leave_days as f64;
    let tax = income_tax(gross);
    let insurance = gross * INSURANCE_RATE;
    let deductions = unpaid_deduction + tax + insurance;

    PayrollBreakdown {
        daily_rate,
        base_amount,
        overtime_amount,
        bonus,
        gross,
        unpaid_deduction,
        tax,
        insurance,
        deductions,
        net: gross - deductions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn month_lengths() {
        assert_eq!(days_in_month(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()), 29);
        assert_eq!(days_in_month(NaiveDate::from_ymd_opt(2026, 2, 1).unwrap()), 28);
        assert_eq!(days_in_month(NaiveDate::from_ymd_opt(2026, 12, 1).unwrap()), 31);
        assert_eq!(days_in_month(NaiveDate::from_ymd_opt(2026, 4, 1).unwrap()), 30);
    }

    #[test]
    fn tax_brackets() {
        assert_eq!(income_tax(5_000.0), 0.0);
        assert!(close(income_tax(6_000.0), 300.0));
        assert!(close(income_tax(10_000.0), 500.0));
        assert!(close(income_tax(12_000.0), 1_200.0));
    }

    #[test]
    fn breakdown_for_partial_month_with_overtime() {
        // April has 30 days: daily 200, hourly 25.
        let month = NaiveDate::from_ymd_opt(2026, 4, 1).unwrap();
        let work = MonthlyWork {
            days_worked: 20,
            regular_hours: 160.0,
            overtime_hours: 10.0,
            unpaid_leave_days: 2,
        };
        let b = compute_breakdown(6_000.0, month, &work);
        assert!(close(b.daily_rate, 200.0));
        assert!(close(b.base_amount, 4_000.0));
        assert!(close(b.overtime_amount, 375.0));
        assert!(close(b.gross, 4_375.0));
        assert!(close(b.tax, 0.0));
        assert!(close(b.insurance, 87.5));
        assert!(close(b.unpaid_deduction, 400.0));
        assert!(close(b.net, 4_375.0 - 487.5));

        let items = b.items(&work);
        assert!(items.iter().any(|i| i.0 == PayrollItemType::UnpaidLeave && i.2 < 0.0));
        assert!(!items.iter().any(|i| i.0 == PayrollItemType::Tax));
    }

    #[test]
    fn status_flow() {
        use PayrollStatus::*;
        assert!(Pending.transition(Approved).is_ok());
        assert!(Approved.transition(Paid).is_ok());
        assert!(Approved.transition(Cancelled).is_ok());
        assert!(Pending.transition(Paid).is_err());
        assert!(Paid.transition(Cancelled).is_err());
        assert!(Cancelled.transition(Pending).is_err());
    }

    #[test]
    fn manual_net_adds_bonus_and_subtracts_deductions() {
        assert!(close(manual_net(50_000.0, 5_000.0, 2_000.0), 53_000.0));
    }
}
