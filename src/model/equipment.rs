use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::error::FieldErrors;
use crate::model::rental::RateType;
use crate::model::transition::TransitionError;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EquipmentStatus {
    Available,
    Rented,
    Maintenance,
    Retired,
}

sql_text_enum!(EquipmentStatus);

impl EquipmentStatus {
    /// Status changes requested through the equipment endpoints. `rented` is
    /// owned by the rental workflow and a rented unit must be returned first.
    pub fn manual_change(self, to: EquipmentStatus) -> Result<EquipmentStatus, TransitionError> {
        let reason = match (self, to) {
            (_, EquipmentStatus::Rented) => "Only the rental workflow can mark equipment as rented",
            (EquipmentStatus::Rented, _) => "Rented equipment is released by its rental",
            (EquipmentStatus::Retired, _) => "Retired equipment cannot be reactivated",
            (from, to) if from == to => "Equipment already has this status",
            _ => return Ok(to),
        };
        Err(TransitionError::new("equipment", self, to, reason))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Equipment {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "Excavator CAT 320")]
    pub name: String,
    pub model: Option<String>,
    pub serial_number: Option<String>,
    pub status: EquipmentStatus,
    #[schema(example = 1500.0)]
    pub daily_rate: f64,
    #[schema(example = 9000.0)]
    pub weekly_rate: f64,
    #[schema(example = 32000.0)]
    pub monthly_rate: f64,
    pub purchase_price: Option<f64>,
    #[schema(value_type = Option<String>, format = "date")]
    pub purchase_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Equipment {
    /// List rate for one billing unit of `rate_type`.
    pub fn rate_for(&self, rate_type: RateType) -> f64 {
        match rate_type {
            RateType::Daily => self.daily_rate,
            RateType::Weekly => self.weekly_rate,
            RateType::Monthly => self.monthly_rate,
        }
    }

    pub fn is_rentable(&self) -> bool {
        self.status == EquipmentStatus::Available
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewEquipment {
    #[schema(example = "Excavator CAT 320")]
    pub name: String,
    pub model: Option<String>,
    pub serial_number: Option<String>,
    #[schema(example = 1500.0)]
    pub daily_rate: f64,
    #[serde(default)]
    pub weekly_rate: f64,
    #[serde(default)]
    pub monthly_rate: f64,
    pub purchase_price: Option<f64>,
    #[schema(value_type = Option<String>, format = "date")]
    pub purchase_date: Option<NaiveDate>,
}

impl NewEquipment {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        errors.check(!self.name.trim().is_empty(), "name", "is required");
        for (field, rate) in [
            ("daily_rate", self.daily_rate),
            ("weekly_rate", self.weekly_rate),
            ("monthly_rate", self.monthly_rate),
        ] {
            errors.check(rate >= 0.0, field, "cannot be negative");
        }
        if let Some(price) = self.purchase_price {
            errors.check(price >= 0.0, "purchase_price", "cannot be negative");
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use EquipmentStatus::*;

    #[test]
    fn rented_is_not_set_by_hand() {
        assert!(Available.manual_change(Rented).is_err());
        assert!(Maintenance.manual_change(Rented).is_err());
        assert!(Rented.manual_change(Available).is_err());
    }

    #[test]
    fn maintenance_round_trip() {
        assert_eq!(Available.manual_change(Maintenance), Ok(Maintenance));
        assert_eq!(Maintenance.manual_change(Available), Ok(Available));
        assert_eq!(Available.manual_change(Retired), Ok(Retired));
        assert!(Retired.manual_change(Available).is_err());
        assert!(Available.manual_change(Available).is_err());
    }

    #[test]
    fn rate_lookup_and_validation() {
        let eq = Equipment {
            id: 1,
            name: "Crane".into(),
            model: None,
            serial_number: None,
            status: Available,
            daily_rate: 100.0,
            weekly_rate: 600.0,
            monthly_rate: 2_000.0,
            purchase_price: None,
            purchase_date: None,
            created_at: None,
        };
        assert_eq!(eq.rate_for(RateType::Weekly), 600.0);
        assert!(eq.is_rentable());

        let bad = NewEquipment {
            name: "".into(),
            model: None,
            serial_number: None,
            daily_rate: -1.0,
            weekly_rate: 0.0,
            monthly_rate: 0.0,
            purchase_price: None,
            purchase_date: None,
        };
        let errors = bad.validate();
        assert!(errors.has("name"));
        assert!(errors.has("daily_rate"));
    }
}
