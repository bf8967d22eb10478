use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::error::FieldErrors;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RuleType {
    Seasonal,
    Demand,
    Duration,
    CustomerType,
    Bulk,
    Special,
}

sql_text_enum!(RuleType);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AdjustmentType {
    Percentage,
    Fixed,
    Multiplier,
}

sql_text_enum!(AdjustmentType);

/// Inclusive numeric bounds; a missing side is open.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Range {
    min: Option<f64>,
    max: Option<f64>,
}

impl Range {
    fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    fn contains(&self, value: f64) -> bool {
        self.min.is_none_or(|min| value >= min) && self.max.is_none_or(|max| value <= max)
    }
}

/// Stored as JSON in `pricing_rules.condition_json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PricingCondition {
    DateRange {
        #[schema(value_type = String, format = "date")]
        start: NaiveDate,
        #[schema(value_type = String, format = "date")]
        end: NaiveDate,
    },
    Utilization { min: Option<f64>, max: Option<f64> },
    RentalDays { min: Option<f64>, max: Option<f64> },
    Quantity { min: Option<f64>, max: Option<f64> },
    CustomerSegment { segments: Vec<String> },
    Always,
}

impl PricingCondition {
    pub fn matches(&self, ctx: &PricingContext) -> bool {
        match self {
            PricingCondition::DateRange { start, end } => {
                ctx.start_date >= *start && ctx.start_date <= *end
            }
            PricingCondition::Utilization { min, max } => ctx
                .utilization
                .is_some_and(|u| Range::new(*min, *max).contains(u)),
            PricingCondition::RentalDays { min, max } => {
                Range::new(*min, *max).contains(ctx.rental_days as f64)
            }
            PricingCondition::Quantity { min, max } => {
                Range::new(*min, *max).contains(ctx.quantity as f64)
            }
            PricingCondition::CustomerSegment { segments } => ctx
                .customer_segment
                .as_deref()
                .is_some_and(|seg| segments.iter().any(|s| s.eq_ignore_ascii_case(seg))),
            PricingCondition::Always => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PricingRule {
    pub id: u64,
    pub equipment_id: u64,
    pub rule_type: RuleType,
    pub condition: PricingCondition,
    pub adjustment_type: AdjustmentType,
    pub adjustment_value: f64,
    pub priority: i32,
    #[schema(value_type = Option<String>, format = "date")]
    pub start_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>, format = "date")]
    pub end_date: Option<NaiveDate>,
    pub is_active: bool,
}

/// Facts about a prospective rental that rules are matched against.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PricingContext {
    #[schema(value_type = String, format = "date")]
    pub start_date: NaiveDate,
    pub rental_days: u32,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    /// Fleet utilization in percent
    pub utilization: Option<f64>,
    pub customer_segment: Option<String>,
}

fn default_quantity() -> u32 {
    1
}

impl PricingRule {
    pub fn is_applicable(&self, ctx: &PricingContext) -> bool {
        if !self.is_active {
            return false;
        }
        if self.start_date.is_some_and(|from| ctx.start_date < from) {
            return false;
        }
        if self.end_date.is_some_and(|until| ctx.start_date > until) {
            return false;
        }
        self.condition.matches(ctx)
    }

    /// Signed delta applied to `price`.
    pub fn calculate_adjustment(&self, price: f64) -> f64 {
        match self.adjustment_type {
            AdjustmentType::Percentage => price * self.adjustment_value / 100.0,
            AdjustmentType::Fixed => self.adjustment_value,
            AdjustmentType::Multiplier => price * (self.adjustment_value - 1.0),
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PricingRuleInput {
    pub rule_type: RuleType,
    pub condition: PricingCondition,
    pub adjustment_type: AdjustmentType,
    pub adjustment_value: f64,
    #[serde(default)]
    pub priority: i32,
    #[schema(value_type = Option<String>, format = "date")]
    pub start_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>, format = "date")]
    pub end_date: Option<NaiveDate>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl PricingRuleInput {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            errors.check(end >= start, "end_date", "must be on or after start_date");
        }
        if let PricingCondition::DateRange { start, end } = &self.condition {
            errors.check(end >= start, "condition", "date range end precedes start");
        }
        if self.adjustment_type == AdjustmentType::Multiplier {
            errors.check(self.adjustment_value >= 0.0, "adjustment_value", "multiplier cannot be negative");
        }
        errors
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct AppliedRule {
    pub rule_id: u64,
    pub rule_type: RuleType,
    pub adjustment: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PriceQuote {
    pub base_price: f64,
    pub applied_rules: Vec<AppliedRule>,
    pub final_price: f64,
}

/// Applies every applicable rule to the running price, highest priority
/// first (ties by id), and floors the result at zero.
pub fn quote(base_price: f64, rules: &[PricingRule], ctx: &PricingContext) -> PriceQuote {
    let mut applicable: Vec<&PricingRule> = rules.iter().filter(|r| r.is_applicable(ctx)).collect();
    applicable.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.id.cmp(&b.id)));

    let mut price = base_price;
    let mut applied_rules = Vec::with_capacity(applicable.len());
    for rule in applicable {
        let adjustment = rule.calculate_adjustment(price);
        price += adjustment;
        applied_rules.push(AppliedRule {
            rule_id: rule.id,
            rule_type: rule.rule_type,
            adjustment,
        });
    }

    PriceQuote {
        base_price,
        applied_rules,
        final_price: price.max(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, m, day).unwrap()
    }

    fn ctx() -> PricingContext {
        PricingContext {
            start_date: d(7, 10),
            rental_days: 14,
            quantity: 3,
            utilization: Some(85.0),
            customer_segment: Some("Corporate".to_string()),
        }
    }

    fn rule(id: u64, priority: i32, condition: PricingCondition, kind: AdjustmentType, value: f64) -> PricingRule {
        PricingRule {
            id,
            equipment_id: 1,
            rule_type: RuleType::Special,
            condition,
            adjustment_type: kind,
            adjustment_value: value,
            priority,
            start_date: None,
            end_date: None,
            is_active: true,
        }
    }

    #[test]
    fn condition_kinds_match_context() {
        let c = ctx();
        assert!(PricingCondition::DateRange { start: d(6, 1), end: d(8, 31) }.matches(&c));
        assert!(!PricingCondition::DateRange { start: d(8, 1), end: d(8, 31) }.matches(&c));
        assert!(PricingCondition::Utilization { min: Some(80.0), max: None }.matches(&c));
        assert!(!PricingCondition::RentalDays { min: Some(30.0), max: None }.matches(&c));
        assert!(PricingCondition::Quantity { min: Some(2.0), max: Some(5.0) }.matches(&c));
        assert!(
            PricingCondition::CustomerSegment { segments: vec!["corporate".to_string()] }.matches(&c)
        );
    }

    #[test]
    fn inactive_or_out_of_window_rules_do_not_apply() {
        let mut r = rule(1, 0, PricingCondition::Always, AdjustmentType::Fixed, 10.0);
        assert!(r.is_applicable(&ctx()));
        r.is_active = false;
        assert!(!r.is_applicable(&ctx()));
        r.is_active = true;
        r.end_date = Some(d(7, 1));
        assert!(!r.is_applicable(&ctx()));
    }

    #[test]
    fn adjustment_kinds() {
        let pct = rule(1, 0, PricingCondition::Always, AdjustmentType::Percentage, -10.0);
        let fixed = rule(2, 0, PricingCondition::Always, AdjustmentType::Fixed, 25.0);
        let mult = rule(3, 0, PricingCondition::Always, AdjustmentType::Multiplier, 1.5);
        assert_eq!(pct.calculate_adjustment(200.0), -20.0);
        assert_eq!(fixed.calculate_adjustment(200.0), 25.0);
        assert_eq!(mult.calculate_adjustment(200.0), 100.0);
    }

    #[test]
    fn quote_applies_by_priority_then_id() {
        let rules = vec![
            rule(5, 1, PricingCondition::Always, AdjustmentType::Fixed, 50.0),
            rule(2, 10, PricingCondition::Always, AdjustmentType::Multiplier, 2.0),
            rule(1, 1, PricingCondition::Always, AdjustmentType::Percentage, -50.0),
        ];
        // 100 * 2 = 200, then id 1: -100 = 100, then id 5: +50 = 150.
        let q = quote(100.0, &rules, &ctx());
        let order: Vec<u64> = q.applied_rules.iter().map(|a| a.rule_id).collect();
        assert_eq!(order, vec![2, 1, 5]);
        assert_eq!(q.final_price, 150.0);
    }

    #[test]
    fn quote_never_goes_negative() {
        let rules = vec![rule(1, 0, PricingCondition::Always, AdjustmentType::Fixed, -500.0)];
        assert_eq!(quote(100.0, &rules, &ctx()).final_price, 0.0);
    }

    #[test]
    fn condition_json_shape() {
        let c: PricingCondition =
            serde_json::from_str(r#"{"kind":"rental_days","min":7,"max":null}"#).unwrap();
        assert_eq!(c, PricingCondition::RentalDays { min: Some(7.0), max: None });
    }
}
