use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::error::FieldErrors;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EmployeeStatus {
    Active,
    OnLeave,
    Inactive,
    Terminated,
}

sql_text_enum!(EmployeeStatus);

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "employee_code": "EMP-001",
        "first_name": "John",
        "last_name": "Doe",
        "email": "john.doe@company.com",
        "phone": "+8801712345678",
        "department_id": 10,
        "job_title": "Site Engineer",
        "manager_id": 4,
        "hire_date": "2024-01-01",
        "basic_salary": 6000.0,
        "status": "active"
    })
)]
pub struct Employee {
    #[schema(example = 1)]
    pub id: u64,

    #[schema(example = "EMP-001")]
    pub employee_code: String,

    #[schema(example = "John")]
    pub first_name: String,

    #[schema(example = "Doe")]
    pub last_name: String,

    #[schema(example = "john.doe@company.com")]
    pub email: String,

    #[schema(example = "+8801712345678", nullable = true)]
    pub phone: Option<String>,

    #[schema(example = 10, nullable = true)]
    pub department_id: Option<u64>,

    #[schema(example = "Site Engineer", nullable = true)]
    pub job_title: Option<String>,

    /// Employee id of the direct manager
    #[schema(example = 4, nullable = true)]
    pub manager_id: Option<u64>,

    #[schema(example = "2024-01-01", value_type = String, format = "date")]
    pub hire_date: NaiveDate,

    #[schema(example = 6000.0)]
    pub basic_salary: f64,

    pub status: EmployeeStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, format = "date-time")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Employee {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewEmployee {
    #[schema(example = "EMP-001")]
    pub employee_code: String,
    #[schema(example = "John")]
    pub first_name: String,
    #[schema(example = "Doe")]
    pub last_name: String,
    #[schema(example = "john.doe@company.com", format = "email")]
    pub email: String,
    pub phone: Option<String>,
    #[schema(example = 1)]
    pub department_id: Option<u64>,
    #[schema(example = "Crane Operator")]
    pub job_title: Option<String>,
    pub manager_id: Option<u64>,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub hire_date: NaiveDate,
    #[serde(default)]
    #[schema(example = 4500.0)]
    pub basic_salary: f64,
}

impl NewEmployee {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        errors.check(!self.employee_code.trim().is_empty(), "employee_code", "is required");
        errors.check(!self.first_name.trim().is_empty(), "first_name", "is required");
        errors.check(!self.last_name.trim().is_empty(), "last_name", "is required");
        errors.check(self.email.contains('@'), "email", "must be a valid email");
        errors.check(
            self.basic_salary.is_finite() && self.basic_salary >= 0.0,
            "basic_salary",
            "must not be negative",
        );
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> NewEmployee {
        NewEmployee {
            employee_code: "EMP-9".into(),
            first_name: "Amal".into(),
            last_name: "Saleh".into(),
            email: "amal@example.com".into(),
            phone: None,
            department_id: None,
            job_title: None,
            manager_id: None,
            hire_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            basic_salary: 3000.0,
        }
    }

    #[test]
    fn valid_draft_has_no_errors() {
        assert!(draft().validate().is_empty());
    }

    #[test]
    fn flags_bad_email_and_negative_salary() {
        let mut d = draft();
        d.email = "nope".into();
        d.basic_salary = -1.0;
        let errors = d.validate();
        assert!(errors.has("email"));
        assert!(errors.has("basic_salary"));
    }

    #[test]
    fn status_text_is_snake_case() {
        assert_eq!(EmployeeStatus::OnLeave.to_string(), "on_leave");
        assert_eq!("on_leave".parse::<EmployeeStatus>().unwrap(), EmployeeStatus::OnLeave);
    }
}
