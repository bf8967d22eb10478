use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::error::FieldErrors;
use crate::model::transition::TransitionError;

pub const WEEKLY_HOURS_LIMIT: f64 = 60.0;
pub const MONTHLY_OVERTIME_LIMIT: f64 = 40.0;
const MAX_DAILY_HOURS: f64 = 24.0;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TimesheetStatus {
    Draft,
    Submitted,
    ForemanApproved,
    InchargeApproved,
    CheckingApproved,
    ManagerApproved,
    Rejected,
}

sql_text_enum!(TimesheetStatus);

/// One level of the four-step approval chain.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ApprovalStage {
    Foreman,
    Incharge,
    Checking,
    Manager,
}

sql_text_enum!(ApprovalStage);

impl ApprovalStage {
    /// Stage that acts on a timesheet in `status`.
    pub fn for_status(status: TimesheetStatus) -> Option<Self> {
        match status {
            TimesheetStatus::Submitted => Some(ApprovalStage::Foreman),
            TimesheetStatus::ForemanApproved => Some(ApprovalStage::Incharge),
            TimesheetStatus::InchargeApproved => Some(ApprovalStage::Checking),
            TimesheetStatus::CheckingApproved => Some(ApprovalStage::Manager),
            _ => None,
        }
    }

    pub fn approved_status(self) -> TimesheetStatus {
        match self {
            ApprovalStage::Foreman => TimesheetStatus::ForemanApproved,
            ApprovalStage::Incharge => TimesheetStatus::InchargeApproved,
            ApprovalStage::Checking => TimesheetStatus::CheckingApproved,
            ApprovalStage::Manager => TimesheetStatus::ManagerApproved,
        }
    }

    /// Prefix of the `*_approval_by` / `*_approval_at` columns.
    pub fn column_prefix(self) -> &'static str {
        match self {
            ApprovalStage::Foreman => "foreman",
            ApprovalStage::Incharge => "incharge",
            ApprovalStage::Checking => "checking",
            ApprovalStage::Manager => "manager",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ApprovalStage::Foreman => "foreman",
            ApprovalStage::Incharge => "timesheet incharge",
            ApprovalStage::Checking => "checking incharge",
            ApprovalStage::Manager => "manager",
        }
    }
}

impl TimesheetStatus {
    pub fn is_editable(self) -> bool {
        matches!(self, TimesheetStatus::Draft | TimesheetStatus::Rejected)
    }

    pub fn approval_step(self) -> i8 {
        match self {
            TimesheetStatus::Draft | TimesheetStatus::Submitted => 0,
            TimesheetStatus::ForemanApproved => 1,
            TimesheetStatus::InchargeApproved => 2,
            TimesheetStatus::CheckingApproved => 3,
            TimesheetStatus::ManagerApproved => 4,
            TimesheetStatus::Rejected => -1,
        }
    }

    pub fn approval_progress(self) -> u8 {
        match self {
            TimesheetStatus::Draft | TimesheetStatus::Rejected => 0,
            TimesheetStatus::Submitted => 10,
            TimesheetStatus::ForemanApproved => 40,
            TimesheetStatus::InchargeApproved => 60,
            TimesheetStatus::CheckingApproved => 80,
            TimesheetStatus::ManagerApproved => 100,
        }
    }

    pub fn submit(self) -> Result<TimesheetStatus, TransitionError> {
        if self.is_editable() {
            Ok(TimesheetStatus::Submitted)
        } else {
            Err(TransitionError::new(
                "timesheet",
                self,
                TimesheetStatus::Submitted,
                "Only draft or rejected timesheets can be submitted",
            ))
        }
    }

    /// Next status and the stage that approved it.
    pub fn approve(self) -> Result<(ApprovalStage, TimesheetStatus), TransitionError> {
        match ApprovalStage::for_status(self) {
            Some(stage) => Ok((stage, stage.approved_status())),
            None => Err(TransitionError::new(
                "timesheet",
                self,
                "approved",
                "Timesheet is not awaiting approval",
            )),
        }
    }

    pub fn reject(self) -> Result<TimesheetStatus, TransitionError> {
        match self {
            TimesheetStatus::Rejected | TimesheetStatus::ManagerApproved => {
                Err(TransitionError::new(
                    "timesheet",
                    self,
                    TimesheetStatus::Rejected,
                    "Timesheet is already rejected or fully approved",
                ))
            }
            _ => Ok(TimesheetStatus::Rejected),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Timesheet {
    pub id: u64,
    pub employee_id: u64,
    pub rental_id: Option<u64>,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub hours_worked: f64,
    pub overtime_hours: f64,
    pub description: Option<String>,
    pub status: TimesheetStatus,
    pub foreman_approval_by: Option<u64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub foreman_approval_at: Option<NaiveDateTime>,
    pub incharge_approval_by: Option<u64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub incharge_approval_at: Option<NaiveDateTime>,
    pub checking_approval_by: Option<u64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub checking_approval_at: Option<NaiveDateTime>,
    pub manager_approval_by: Option<u64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub manager_approval_at: Option<NaiveDateTime>,
    pub approval_notes: Option<String>,
    pub rejected_by: Option<u64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub rejected_at: Option<NaiveDateTime>,
    pub rejection_reason: Option<String>,
    pub rejection_stage: Option<ApprovalStage>,
    pub created_by: Option<u64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Timesheet {
    pub fn total_hours(&self) -> f64 {
        self.hours_worked + self.overtime_hours
    }

    pub fn stage_description(&self) -> String {
        match self.status {
            TimesheetStatus::Draft => "Draft".to_string(),
            TimesheetStatus::Submitted => "Submitted, awaiting foreman approval".to_string(),
            TimesheetStatus::ForemanApproved => {
                "Approved by foreman, awaiting timesheet incharge approval".to_string()
            }
            TimesheetStatus::InchargeApproved => {
                "Approved by timesheet incharge, awaiting checking incharge approval".to_string()
            }
            TimesheetStatus::CheckingApproved => {
                "Approved by checking incharge, awaiting manager approval".to_string()
            }
            TimesheetStatus::ManagerApproved => "Fully approved".to_string(),
            TimesheetStatus::Rejected => format!(
                "Rejected by {}",
                self.rejection_stage.map_or("unknown", ApprovalStage::label)
            ),
        }
    }
}

/// Timesheet plus its derived approval fields, as returned by the API.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TimesheetView {
    #[serde(flatten)]
    pub timesheet: Timesheet,
    pub total_hours: f64,
    pub approval_step: i8,
    pub approval_progress: u8,
    pub stage_description: String,
}

impl From<Timesheet> for TimesheetView {
    fn from(timesheet: Timesheet) -> Self {
        Self {
            total_hours: timesheet.total_hours(),
            approval_step: timesheet.status.approval_step(),
            approval_progress: timesheet.status.approval_progress(),
            stage_description: timesheet.stage_description(),
            timesheet,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct TimesheetInput {
    pub employee_id: Option<u64>,
    pub rental_id: Option<u64>,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(example = 8.0)]
    pub hours_worked: f64,
    #[serde(default)]
    #[schema(example = 2.0)]
    pub overtime_hours: f64,
    pub description: Option<String>,
}

impl TimesheetInput {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        errors.check(
            (0.0..=MAX_DAILY_HOURS).contains(&self.hours_worked),
            "hours_worked",
            "must be between 0 and 24",
        );
        errors.check(
            (0.0..=MAX_DAILY_HOURS).contains(&self.overtime_hours),
            "overtime_hours",
            "must be between 0 and 24",
        );
        errors.check(
            self.hours_worked + self.overtime_hours <= MAX_DAILY_HOURS,
            "hours_worked",
            "regular plus overtime cannot exceed 24 hours",
        );
        errors
    }
}

/// Monday..=Sunday around `date`.
pub fn week_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let monday = date - Duration::days(date.weekday().num_days_from_monday() as i64);
    (monday, monday + Duration::days(6))
}

/// First..=last day of the month of `date`.
pub fn month_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = date.with_day(1).unwrap_or(date);
    let next = first
        .checked_add_months(chrono::Months::new(1))
        .unwrap_or(first + Duration::days(31));
    (first, next - Duration::days(1))
}

/// Workload limits checked on create and update. The sums exclude the
/// timesheet being edited.
pub fn check_limits(
    input: &TimesheetInput,
    week_hours_so_far: f64,
    month_overtime_so_far: f64,
) -> FieldErrors {
    let mut errors = FieldErrors::new();
    errors.check(
        week_hours_so_far + input.hours_worked + input.overtime_hours <= WEEKLY_HOURS_LIMIT,
        "hours_worked",
        "weekly limit of 60 hours would be exceeded",
    );
    errors.check(
        month_overtime_so_far + input.overtime_hours <= MONTHLY_OVERTIME_LIMIT,
        "overtime_hours",
        "monthly overtime limit of 40 hours would be exceeded",
    );
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use TimesheetStatus::*;

    fn input(hours: f64, overtime: f64) -> TimesheetInput {
        TimesheetInput {
            employee_id: None,
            rental_id: None,
            date: NaiveDate::from_ymd_opt(2026, 6, 10).unwrap(),
            hours_worked: hours,
            overtime_hours: overtime,
            description: None,
        }
    }

    #[test]
    fn approval_chain_walks_four_stages() {
        let mut status = Draft.submit().unwrap();
        let mut stages = Vec::new();
        while let Ok((stage, next)) = status.approve() {
            stages.push(stage);
            status = next;
        }
        assert_eq!(
            stages,
            vec![
                ApprovalStage::Foreman,
                ApprovalStage::Incharge,
                ApprovalStage::Checking,
                ApprovalStage::Manager
            ]
        );
        assert_eq!(status, ManagerApproved);
    }

    #[test]
    fn submit_and_reject_rules() {
        assert_eq!(Rejected.submit(), Ok(Submitted));
        assert!(Submitted.submit().is_err());
        assert!(ManagerApproved.reject().is_err());
        assert!(Rejected.reject().is_err());
        assert_eq!(InchargeApproved.reject(), Ok(Rejected));
        assert!(Draft.approve().is_err());
    }

    #[test]
    fn steps_and_progress() {
        let expected = [
            (Draft, 0, 0),
            (Submitted, 0, 10),
            (ForemanApproved, 1, 40),
            (InchargeApproved, 2, 60),
            (CheckingApproved, 3, 80),
            (ManagerApproved, 4, 100),
            (Rejected, -1, 0),
        ];
        for (status, step, progress) in expected {
            assert_eq!(status.approval_step(), step, "{status}");
            assert_eq!(status.approval_progress(), progress, "{status}");
        }
    }

    #[test]
    fn week_runs_monday_to_sunday() {
        // 2026-06-10 is a Wednesday.
        let (start, end) = week_bounds(NaiveDate::from_ymd_opt(2026, 6, 10).unwrap());
        assert_eq!(start, NaiveDate::from_ymd_opt(2026, 6, 8).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2026, 6, 14).unwrap());
    }

    #[test]
    fn month_bounds_handle_december() {
        let (start, end) = month_bounds(NaiveDate::from_ymd_opt(2026, 12, 17).unwrap());
        assert_eq!(start, NaiveDate::from_ymd_opt(2026, 12, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2026, 12, 31).unwrap());
    }

    #[test]
    fn limits() {
        assert!(check_limits(&input(8.0, 2.0), 50.0, 0.0).is_empty());
        assert!(check_limits(&input(8.0, 2.5), 50.0, 0.0).has("hours_worked"));
        assert!(check_limits(&input(8.0, 3.0), 0.0, 38.0).has("overtime_hours"));
        assert!(input(20.0, 5.0).validate().has("hours_worked"));
    }
}
