use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::error::FieldErrors;

const DAYS_PER_YEAR: f64 = 365.25;
pub const MAX_USEFUL_LIFE_YEARS: u32 = 100;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DepreciationMethod {
    StraightLine,
    DoubleDeclining,
    SumOfYears,
    UnitsOfProduction,
}

sql_text_enum!(DepreciationMethod);

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct EquipmentDepreciation {
    pub id: u64,
    pub equipment_id: u64,
    pub method: DepreciationMethod,
    #[schema(example = 120000.0)]
    pub initial_value: f64,
    #[schema(example = 20000.0)]
    pub residual_value: f64,
    #[schema(example = 5)]
    pub useful_life_years: u32,
    #[schema(value_type = String, format = "date")]
    pub start_date: NaiveDate,
    /// Last stored value; the only source for units-of-production.
    pub current_value: f64,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct DepreciationInput {
    pub method: DepreciationMethod,
    pub initial_value: f64,
    pub residual_value: f64,
    pub useful_life_years: u32,
    #[schema(value_type = String, format = "date")]
    pub start_date: NaiveDate,
}

impl DepreciationInput {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        errors.check(self.initial_value > 0.0, "initial_value", "must be positive");
        errors.check(
            self.residual_value >= 0.0 && self.residual_value <= self.initial_value,
            "residual_value",
            "must be between 0 and initial_value",
        );
        errors.check(
            (1..=MAX_USEFUL_LIFE_YEARS).contains(&self.useful_life_years),
            "useful_life_years",
            "must be between 1 and 100",
        );
        errors
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ScheduleYear {
    pub year: u32,
    #[schema(value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub end_date: NaiveDate,
    pub starting_value: f64,
    pub ending_value: f64,
    pub depreciation_amount: f64,
    pub accumulated_depreciation: f64,
    pub book_value: f64,
}

impl EquipmentDepreciation {
    fn depreciable(&self) -> f64 {
        self.initial_value - self.residual_value
    }

    /// Stored life, clamped so rows written before validation stay bounded.
    fn life_years(&self) -> u32 {
        self.useful_life_years.clamp(1, MAX_USEFUL_LIFE_YEARS)
    }

    fn life(&self) -> f64 {
        self.life_years() as f64
    }

    pub fn years_elapsed(&self, as_of: NaiveDate) -> f64 {
        (as_of - self.start_date).num_days() as f64 / DAYS_PER_YEAR
    }

    pub fn current_value(&self, as_of: NaiveDate) -> f64 {
        if as_of <= self.start_date {
            return self.initial_value;
        }

        let years = self.years_elapsed(as_of);
        let value = match self.method {
            DepreciationMethod::StraightLine => self.straight_line(years),
            DepreciationMethod::DoubleDeclining => self.double_declining(years),
            DepreciationMethod::SumOfYears => self.sum_of_years(years),
            DepreciationMethod::UnitsOfProduction => self.current_value,
        };

        value.max(self.residual_value)
    }

    fn straight_line(&self, years: f64) -> f64 {
        let annual = self.depreciable() / self.life();
        self.initial_value - annual * years.min(self.life())
    }

    /// Declining balance at `2 / life`, switching to straight line over the
    /// remaining life once that depreciates more.
    fn double_declining(&self, years: f64) -> f64 {
        let rate = 2.0 / self.life();
        let life = self.life_years();
        let full_years = years.floor() as u32;
        let mut value = self.initial_value;

        for year in 0..=full_years.min(life) {
            if value <= self.residual_value || year >= life {
                break;
            }
            let remaining = (life - year) as f64;
            let declining = value * rate;
            let straight = (value - self.residual_value) / remaining;
            let amount = declining.max(straight);

            let fraction = if year < full_years {
                1.0
            } else {
                years - full_years as f64
            };
            value -= amount * fraction;
        }

        value
    }

    fn sum_of_years(&self, years: f64) -> f64 {
        let n = self.life_years();
        let sum = self.life() * (self.life() + 1.0) / 2.0;
        let full_years = years.floor() as u32;
        let mut value = self.initial_value;

        for year in 0..=full_years.min(n) {
            if year >= n {
                break;
            }
            let factor = (n - year) as f64;
            let amount = self.depreciable() * factor / sum;
            let fraction = if year < full_years {
                1.0
            } else {
                years - full_years as f64
            };
            value -= amount * fraction;
        }

        value
    }

    pub fn schedule(&self) -> Vec<ScheduleYear> {
        let life = self.life_years();
        let mut rows = Vec::with_capacity(life as usize);
        let mut start = self.start_date;

        for year in 1..=life {
            let end = start
                .checked_add_months(Months::new(12))
                .unwrap_or(start + chrono::Duration::days(365));
            let starting_value = self.current_value(start);
            let ending_value = self.current_value(end);

            rows.push(ScheduleYear {
                year,
                start_date: start,
                end_date: end,
                starting_value,
                ending_value,
                depreciation_amount: starting_value - ending_value,
                accumulated_depreciation: self.initial_value - ending_value,
                book_value: ending_value,
            });

            start = end;
        }

        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(method: DepreciationMethod) -> EquipmentDepreciation {
        EquipmentDepreciation {
            id: 1,
            equipment_id: 1,
            method,
            initial_value: 10_000.0,
            residual_value: 1_000.0,
            useful_life_years: 5,
            start_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            current_value: 7_777.0,
        }
    }

    fn after_days(a: &EquipmentDepreciation, days: i64) -> f64 {
        a.current_value(a.start_date + chrono::Duration::days(days))
    }

    #[test]
    fn value_is_initial_on_or_before_start() {
        let a = asset(DepreciationMethod::StraightLine);
        assert_eq!(a.current_value(a.start_date), 10_000.0);
        assert_eq!(
            a.current_value(NaiveDate::from_ymd_opt(2019, 6, 1).unwrap()),
            10_000.0
        );
    }

    #[test]
    fn straight_line_is_linear_and_floored() {
        let a = asset(DepreciationMethod::StraightLine);
        // 1826.25 days is exactly 5 years of 365.25 days; halfway is 2.5 years.
        let half = after_days(&a, 913);
        assert!((half - 5_500.0).abs() < 10.0);
        assert_eq!(after_days(&a, 4_000), 1_000.0);
    }

    #[test]
    fn double_declining_front_loads() {
        let dd = asset(DepreciationMethod::DoubleDeclining);
        let sl = asset(DepreciationMethod::StraightLine);
        let one_year = 366;
        assert!(after_days(&dd, one_year) < after_days(&sl, one_year));
        assert_eq!(after_days(&dd, 10 * 366), 1_000.0);
    }

    #[test]
    fn double_declining_first_year_rate() {
        let dd = asset(DepreciationMethod::DoubleDeclining);
        // Just under one year: close to 10000 * (1 - 0.4).
        let v = after_days(&dd, 365);
        assert!(v > 6_000.0 && v < 6_010.0);
    }

    #[test]
    fn sum_of_years_first_full_year() {
        let a = asset(DepreciationMethod::SumOfYears);
        // Two full years take 9000 * (5 + 4) / 15 = 5400.
        let v = after_days(&a, 731);
        assert!((v - 4_600.0).abs() < 5.0);
        assert_eq!(after_days(&a, 3_000), 1_000.0);
    }

    #[test]
    fn units_of_production_uses_stored_value() {
        let a = asset(DepreciationMethod::UnitsOfProduction);
        assert_eq!(after_days(&a, 500), 7_777.0);
    }

    #[test]
    fn schedule_covers_useful_life() {
        let a = asset(DepreciationMethod::StraightLine);
        let rows = a.schedule();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0].starting_value, 10_000.0);
        assert_eq!(rows[1].start_date, rows[0].end_date);
        for row in &rows {
            assert!((row.starting_value - row.ending_value - row.depreciation_amount).abs() < 1e-9);
            assert_eq!(row.book_value, row.ending_value);
        }
    }

    #[test]
    fn input_validation() {
        let bad = DepreciationInput {
            method: DepreciationMethod::StraightLine,
            initial_value: 100.0,
            residual_value: 200.0,
            useful_life_years: 0,
            start_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        };
        let errors = bad.validate();
        assert!(errors.has("residual_value"));
        assert!(errors.has("useful_life_years"));
    }

    #[test]
    fn useful_life_is_bounded() {
        let mut input = DepreciationInput {
            method: DepreciationMethod::SumOfYears,
            initial_value: 10_000.0,
            residual_value: 0.0,
            useful_life_years: MAX_USEFUL_LIFE_YEARS,
            start_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
        };
        assert!(input.validate().is_empty());
        input.useful_life_years = MAX_USEFUL_LIFE_YEARS + 1;
        assert!(input.validate().has("useful_life_years"));
        input.useful_life_years = 70_000;
        assert!(input.validate().has("useful_life_years"));
    }

    #[test]
    fn oversized_stored_life_stays_finite() {
        for method in [DepreciationMethod::SumOfYears, DepreciationMethod::DoubleDeclining] {
            let mut a = asset(method);
            a.useful_life_years = 70_000;
            let v = a.current_value(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
            assert!(v.is_finite() && v >= a.residual_value && v <= a.initial_value);
            assert_eq!(a.schedule().len(), MAX_USEFUL_LIFE_YEARS as usize);
        }
        let mut huge = asset(DepreciationMethod::StraightLine);
        huge.useful_life_years = u32::MAX;
        assert_eq!(huge.schedule().len(), MAX_USEFUL_LIFE_YEARS as usize);
    }
}
