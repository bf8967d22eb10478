use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::FieldErrors;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Customer {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "Gulf Builders Ltd")]
    pub company_name: String,
    pub contact_person: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    /// `net_N`, `immediate` or a plain number of days
    #[schema(example = "net_30")]
    pub payment_terms: Option<String>,
    /// Segment matched by customer-type pricing rules
    #[schema(example = "corporate")]
    pub customer_type: Option<String>,
    pub is_active: bool,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Customer {
    pub fn payment_terms_days(&self, default_days: i64) -> i64 {
        parse_payment_terms(self.payment_terms.as_deref(), default_days)
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewCustomer {
    #[schema(example = "Gulf Builders Ltd")]
    pub company_name: String,
    pub contact_person: Option<String>,
    #[schema(example = "accounts@gulfbuilders.example")]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    #[schema(example = "net_30")]
    pub payment_terms: Option<String>,
    #[schema(example = "corporate")]
    pub customer_type: Option<String>,
}

impl NewCustomer {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        errors.check(!self.company_name.trim().is_empty(), "company_name", "is required");
        if let Some(email) = self.email.as_deref().filter(|e| !e.is_empty()) {
            errors.check(email.contains('@'), "email", "must be a valid email address");
        }
        errors
    }
}

pub fn parse_payment_terms(terms: Option<&str>, default_days: i64) -> i64 {
    let Some(terms) = terms.map(str::trim) else {
        return default_days;
    };

    if terms.eq_ignore_ascii_case("immediate") {
        return 0;
    }

    let digits = terms
        .strip_prefix("net_")
        .or_else(|| terms.strip_prefix("NET_"))
        .unwrap_or(terms);

    match digits.parse::<i64>() {
        Ok(days) if days >= 0 => days,
        _ => default_days,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_terms_forms() {
        assert_eq!(parse_payment_terms(Some("net_45"), 30), 45);
        assert_eq!(parse_payment_terms(Some("immediate"), 30), 0);
        assert_eq!(parse_payment_terms(Some("14"), 30), 14);
        assert_eq!(parse_payment_terms(Some("on delivery"), 30), 30);
        assert_eq!(parse_payment_terms(Some("net_-5"), 30), 30);
        assert_eq!(parse_payment_terms(None, 21), 21);
    }

    #[test]
    fn new_customer_needs_a_name() {
        let c = NewCustomer {
            company_name: "  ".into(),
            contact_person: None,
            email: Some("nobody".into()),
            phone: None,
            address: None,
            payment_terms: None,
            customer_type: None,
        };
        let errors = c.validate();
        assert!(errors.has("company_name"));
        assert!(errors.has("email"));
    }
}
