use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

use crate::error::FieldErrors;
use crate::model::role::Role;
use crate::model::transition::TransitionError;

pub const MAX_NOTE_LEN: usize = 500;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    ToSchema,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveType {
    Annual,
    Vacation,
    Sick,
    Personal,
    Maternity,
    Hajj,
    Umrah,
    Unpaid,
    Other,
}

sql_text_enum!(LeaveType);

impl LeaveType {
    /// Yearly entitlement in days, for the types that carry one.
    pub fn entitlement(self) -> Option<i64> {
        match self {
            LeaveType::Annual => Some(21),
            LeaveType::Sick => Some(10),
            LeaveType::Personal => Some(5),
            _ => None,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
}

sql_text_enum!(LeaveStatus);

impl LeaveStatus {
    pub fn can_transition_to(self, to: LeaveStatus) -> bool {
        matches!(
            (self, to),
            (LeaveStatus::Pending, LeaveStatus::Approved)
                | (LeaveStatus::Pending, LeaveStatus::Rejected)
        )
    }

    pub fn transition(self, to: LeaveStatus) -> Result<LeaveStatus, TransitionError> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(TransitionError::new(
                "leave request",
                self,
                to,
                "This leave request has already been processed.",
            ))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct LeaveRequest {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 1000)]
    pub employee_id: u64,
    pub leave_type: LeaveType,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-03", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[schema(example = "Family event")]
    pub reason: String,
    pub status: LeaveStatus,
    pub requested_by: Option<u64>,
    pub approved_by: Option<u64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub approved_at: Option<NaiveDateTime>,
    pub approval_notes: Option<String>,
    pub rejection_reason: Option<String>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub created_at: Option<DateTime<Utc>>,
}

impl LeaveRequest {
    pub fn duration_days(&self) -> i64 {
        inclusive_days(self.start_date, self.end_date)
    }

    pub fn is_pending(&self) -> bool {
        self.status == LeaveStatus::Pending
    }
}

/// Day count with both ends included; an inverted range counts as zero.
pub fn inclusive_days(start: NaiveDate, end: NaiveDate) -> i64 {
    ((end - start).num_days() + 1).max(0)
}

/// Input shared by create and update.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LeaveDraft {
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-03", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    pub leave_type: LeaveType,
    #[schema(example = "Family event")]
    pub reason: String,
}

impl LeaveDraft {
    pub fn validate(&self, today: NaiveDate) -> FieldErrors {
        let mut errors = FieldErrors::new();
        errors.check(
            self.start_date >= today,
            "start_date",
            "must be today or later",
        );
        errors.check(
            self.end_date >= self.start_date,
            "end_date",
            "must be on or after start_date",
        );
        errors.check(!self.reason.trim().is_empty(), "reason", "is required");
        errors
    }
}

/// Who a caller may approve for, resolved from role and reporting line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalScope {
    All,
    Subordinates(Vec<u64>),
    Nobody,
}

impl ApprovalScope {
    pub fn resolve(role: Role, subordinate_ids: Vec<u64>) -> Self {
        match role {
            Role::Admin | Role::Hr => ApprovalScope::All,
            Role::Manager => ApprovalScope::Subordinates(subordinate_ids),
            _ => ApprovalScope::Nobody,
        }
    }

    pub fn permits(&self, employee_id: u64) -> bool {
        match self {
            ApprovalScope::All => true,
            ApprovalScope::Subordinates(ids) => ids.contains(&employee_id),
            ApprovalScope::Nobody => false,
        }
    }

    pub fn needs_subordinates(role: Role) -> bool {
        role == Role::Manager
    }
}

/// Remaining days per entitled leave type.
pub fn remaining_balance<I>(approved: I) -> BTreeMap<LeaveType, i64>
where
    I: IntoIterator<Item = (LeaveType, NaiveDate, NaiveDate)>,
{
    use strum::IntoEnumIterator;

    let mut balance: BTreeMap<LeaveType, i64> = LeaveType::iter()
        .filter_map(|t| t.entitlement().map(|days| (t, days)))
        .collect();

    for (leave_type, start, end) in approved {
        if let Some(left) = balance.get_mut(&leave_type) {
            *left -= inclusive_days(start, end);
        }
    }

    balance
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct LeaveStatistics {
    pub pending_count: i64,
    pub approved_this_month: i64,
    pub rejected_this_month: i64,
    pub total_this_month: i64,
}

/// Half-open calendar month `[first day, first day of next month)` around
/// `today`. Decisions count by when they were made, filings by when they
/// were created.
pub fn month_window(today: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let first = today.with_day(1).unwrap_or(today);
    let next = first.checked_add_months(Months::new(1)).unwrap_or(first);
    (first.and_time(NaiveTime::MIN), next.and_time(NaiveTime::MIN))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn decisions_count_in_the_month_they_were_made() {
        let (from, until) = month_window(d(2026, 10, 18));
        let in_window = |at: NaiveDateTime| from <= at && at < until;
        let at = |y, m, day| d(y, m, day).and_hms_opt(10, 0, 0).unwrap();

        // filed late September, approved in October
        assert!(!in_window(at(2026, 9, 28)));
        assert!(in_window(at(2026, 10, 2)));
        // decided after the month ends
        assert!(!in_window(at(2026, 11, 1)));
        assert!(in_window(d(2026, 10, 31).and_hms_opt(23, 59, 59).unwrap()));
    }

    #[test]
    fn december_window_rolls_into_next_year() {
        let (from, until) = month_window(d(2026, 12, 5));
        assert_eq!(from.date(), d(2026, 12, 1));
        assert_eq!(until.date(), d(2027, 1, 1));
    }

    #[test]
    fn only_pending_requests_can_move() {
        assert_eq!(
            LeaveStatus::Pending.transition(LeaveStatus::Approved),
            Ok(LeaveStatus::Approved)
        );
        assert_eq!(
            LeaveStatus::Pending.transition(LeaveStatus::Rejected),
            Ok(LeaveStatus::Rejected)
        );
        assert!(LeaveStatus::Approved.transition(LeaveStatus::Rejected).is_err());
        assert!(LeaveStatus::Rejected.transition(LeaveStatus::Approved).is_err());
        assert!(LeaveStatus::Pending.transition(LeaveStatus::Pending).is_err());
    }

    #[test]
    fn duration_counts_both_ends() {
        assert_eq!(inclusive_days(d(2026, 3, 1), d(2026, 3, 1)), 1);
        assert_eq!(inclusive_days(d(2026, 3, 1), d(2026, 3, 5)), 5);
        assert_eq!(inclusive_days(d(2026, 3, 5), d(2026, 3, 1)), 0);
    }

    #[test]
    fn draft_rejects_past_start_and_inverted_range() {
        let today = d(2026, 5, 10);
        let draft = LeaveDraft {
            start_date: d(2026, 5, 9),
            end_date: d(2026, 5, 8),
            leave_type: LeaveType::Annual,
            reason: "  ".to_string(),
        };
        let errors = draft.validate(today);
        assert!(errors.has("start_date"));
        assert!(errors.has("end_date"));
        assert!(errors.has("reason"));

        let ok = LeaveDraft {
            start_date: today,
            end_date: today,
            leave_type: LeaveType::Sick,
            reason: "flu".to_string(),
        };
        assert!(ok.validate(today).is_empty());
    }

    #[test]
    fn scope_follows_role() {
        assert!(ApprovalScope::resolve(Role::Hr, vec![]).permits(99));
        let manager = ApprovalScope::resolve(Role::Manager, vec![3, 4]);
        assert!(manager.permits(3));
        assert!(!manager.permits(5));
        assert!(!ApprovalScope::resolve(Role::Employee, vec![1]).permits(1));
    }

    #[test]
    fn balance_subtracts_approved_days_per_type() {
        let balance = remaining_balance(vec![
            (LeaveType::Annual, d(2026, 1, 5), d(2026, 1, 9)),
            (LeaveType::Sick, d(2026, 2, 1), d(2026, 2, 1)),
            (LeaveType::Unpaid, d(2026, 3, 1), d(2026, 3, 10)),
        ]);
        assert_eq!(balance[&LeaveType::Annual], 16);
        assert_eq!(balance[&LeaveType::Sick], 9);
        assert_eq!(balance[&LeaveType::Personal], 5);
        assert!(!balance.contains_key(&LeaveType::Unpaid));
    }

    #[test]
    fn leave_type_parses_from_text() {
        assert_eq!("umrah".parse::<LeaveType>().unwrap(), LeaveType::Umrah);
        assert!("holiday".parse::<LeaveType>().is_err());
    }
}
