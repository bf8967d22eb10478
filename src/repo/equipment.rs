use chrono::NaiveDate;
use serde_json::Value;
use sqlx::{Executor, MySql, MySqlPool};
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::model::depreciation::{DepreciationInput, DepreciationMethod, EquipmentDepreciation};
use crate::model::equipment::{Equipment, EquipmentStatus, NewEquipment};
use crate::model::pricing::{AdjustmentType, PricingRule, PricingRuleInput, RuleType};
use crate::model::rental_workflow::EquipmentEffect;
use crate::utils::db_utils::{UpdateTarget, build_update_sql, execute_update};
use crate::utils::pagination::{Page, PageParams};
use crate::utils::query::Filters;

/// `status` is deliberately absent: it moves through `set_status` or the
/// rental workflow only.
const EQUIPMENT_UPDATE: UpdateTarget = UpdateTarget {
    table: "equipment",
    id_column: "id",
    columns: &[
        "name",
        "model",
        "serial_number",
        "daily_rate",
        "weekly_rate",
        "monthly_rate",
        "purchase_price",
        "purchase_date",
    ],
};

#[derive(Debug, Default)]
pub struct EquipmentFilter {
    pub status: Option<EquipmentStatus>,
    pub search: Option<String>,
}

pub async fn insert(pool: &MySqlPool, equipment: &NewEquipment) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO equipment
        (name, model, serial_number, status, daily_rate, weekly_rate, monthly_rate,
         purchase_price, purchase_date)
        VALUES (?, ?, ?, 'available', ?, ?, ?, ?, ?)
        "#,
    )
    .bind(equipment.name.trim())
    .bind(&equipment.model)
    .bind(&equipment.serial_number)
    .bind(equipment.daily_rate)
    .bind(equipment.weekly_rate)
    .bind(equipment.monthly_rate)
    .bind(equipment.purchase_price)
    .bind(equipment.purchase_date)
    .execute(pool)
    .await?;
    Ok(result.last_insert_id())
}

pub async fn find(pool: &MySqlPool, id: u64) -> AppResult<Option<Equipment>> {
    Ok(
        sqlx::query_as::<_, Equipment>("SELECT * FROM equipment WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?,
    )
}

pub async fn list(
    pool: &MySqlPool,
    filter: &EquipmentFilter,
    params: PageParams,
) -> AppResult<Page<Equipment>> {
    let mut filters = Filters::new();
    filters.push_opt("status = ?", filter.status.map(|s| s.to_string()));

    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let like = format!("%{search}%");
        filters.push_many(
            "(name LIKE ? OR model LIKE ? OR serial_number LIKE ?)",
            [like.clone(), like.clone(), like],
        );
    }

    let count_sql = format!("SELECT COUNT(*) FROM equipment{}", filters.sql());
    let total = filters
        .bind_scalar(sqlx::query_scalar::<_, i64>(&count_sql))
        .fetch_one(pool)
        .await?;

    let data_sql = format!(
        "SELECT * FROM equipment{} ORDER BY name, id LIMIT ? OFFSET ?",
        filters.sql()
    );
    let data = filters
        .bind_as(sqlx::query_as::<_, Equipment>(&data_sql))
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await?;

    Ok(Page::new(data, params, total))
}

pub async fn update(pool: &MySqlPool, id: u64, payload: &Value) -> AppResult<u64> {
    let update = build_update_sql(&EQUIPMENT_UPDATE, payload, id)?;
    Ok(execute_update(pool, update).await?)
}

pub async fn set_status(pool: &MySqlPool, id: u64, status: EquipmentStatus) -> AppResult<()> {
    sqlx::query("UPDATE equipment SET status = ? WHERE id = ?")
        .bind(status)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Fails with an integrity error while rental items still reference the unit.
pub async fn delete(pool: &MySqlPool, id: u64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM equipment WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Applies a workflow side effect to every unit on the rental.
pub async fn apply_effect<'e, E>(
    executor: E,
    rental_id: u64,
    effect: EquipmentEffect,
) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    let result = match effect {
        EquipmentEffect::SetAll(status) => {
            sqlx::query(
                r#"
                UPDATE equipment e
                JOIN rental_items ri ON ri.equipment_id = e.id
                SET e.status = ?
                WHERE ri.rental_id = ?
                "#,
            )
            .bind(status)
            .bind(rental_id)
            .execute(executor)
            .await?
        }
        EquipmentEffect::Release { from, to } => {
            sqlx::query(
                r#"
                UPDATE equipment e
                JOIN rental_items ri ON ri.equipment_id = e.id
                SET e.status = ?
                WHERE ri.rental_id = ? AND e.status = ?
                "#,
            )
            .bind(to)
            .bind(rental_id)
            .bind(from)
            .execute(executor)
            .await?
        }
    };
    Ok(result.rows_affected())
}

/// Share of the non-retired fleet currently rented, in percent.
pub async fn fleet_utilization(pool: &MySqlPool) -> AppResult<Option<f64>> {
    let (rented, fleet) = sqlx::query_as::<_, (i64, i64)>(
        r#"
        SELECT
            CAST(COALESCE(SUM(status = 'rented'), 0) AS SIGNED),
            CAST(COALESCE(SUM(status <> 'retired'), 0) AS SIGNED)
        FROM equipment
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok((fleet > 0).then(|| rented as f64 * 100.0 / fleet as f64))
}

pub async fn count(pool: &MySqlPool) -> AppResult<i64> {
    Ok(sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM equipment")
        .fetch_one(pool)
        .await?)
}

pub async fn count_by_status(pool: &MySqlPool) -> AppResult<Vec<(EquipmentStatus, i64)>> {
    Ok(sqlx::query_as::<_, (EquipmentStatus, i64)>(
        "SELECT status, COUNT(*) FROM equipment GROUP BY status ORDER BY status",
    )
    .fetch_all(pool)
    .await?)
}

/* =========================
Depreciation
========================= */

pub async fn depreciation(
    pool: &MySqlPool,
    equipment_id: u64,
) -> AppResult<Option<EquipmentDepreciation>> {
    Ok(sqlx::query_as::<_, EquipmentDepreciation>(
        "SELECT * FROM equipment_depreciation WHERE equipment_id = ?",
    )
    .bind(equipment_id)
    .fetch_optional(pool)
    .await?)
}

/// One depreciation setup per unit; a second PUT replaces the first.
pub async fn upsert_depreciation(
    pool: &MySqlPool,
    equipment_id: u64,
    input: &DepreciationInput,
    current_value: f64,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO equipment_depreciation
        (equipment_id, method, initial_value, residual_value, useful_life_years, start_date,
         current_value)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON DUPLICATE KEY UPDATE
            method = VALUES(method),
            initial_value = VALUES(initial_value),
            residual_value = VALUES(residual_value),
            useful_life_years = VALUES(useful_life_years),
            start_date = VALUES(start_date),
            current_value = VALUES(current_value)
        "#,
    )
    .bind(equipment_id)
    .bind(input.method)
    .bind(input.initial_value)
    .bind(input.residual_value)
    .bind(input.useful_life_years)
    .bind(input.start_date)
    .bind(current_value)
    .execute(pool)
    .await?;

    info!(equipment_id, method = %input.method, "Depreciation saved");
    Ok(())
}

/// Value stored with a new setup. Usage-based assets keep a caller supplied
/// value; the others store their computed value as of `today`.
pub fn stored_value(input: &DepreciationInput, supplied: Option<f64>, today: NaiveDate) -> f64 {
    let probe = EquipmentDepreciation {
        id: 0,
        equipment_id: 0,
        method: input.method,
        initial_value: input.initial_value,
        residual_value: input.residual_value,
        useful_life_years: input.useful_life_years,
        start_date: input.start_date,
        current_value: supplied.unwrap_or(input.initial_value),
    };
    match input.method {
        DepreciationMethod::UnitsOfProduction => probe
            .current_value
            .clamp(input.residual_value, input.initial_value),
        _ => probe.current_value(today),
    }
}

/* =========================
Pricing rules
========================= */

#[derive(Debug, sqlx::FromRow)]
struct PricingRuleRow {
    id: u64,
    equipment_id: u64,
    rule_type: RuleType,
    condition_json: String,
    adjustment_type: AdjustmentType,
    adjustment_value: f64,
    priority: i32,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    is_active: bool,
}

impl TryFrom<PricingRuleRow> for PricingRule {
    type Error = serde_json::Error;

    fn try_from(row: PricingRuleRow) -> Result<Self, Self::Error> {
        Ok(PricingRule {
            id: row.id,
            equipment_id: row.equipment_id,
            rule_type: row.rule_type,
            condition: serde_json::from_str(&row.condition_json)?,
            adjustment_type: row.adjustment_type,
            adjustment_value: row.adjustment_value,
            priority: row.priority,
            start_date: row.start_date,
            end_date: row.end_date,
            is_active: row.is_active,
        })
    }
}

fn parse_rules(rows: Vec<PricingRuleRow>) -> Vec<PricingRule> {
    rows.into_iter()
        .filter_map(|row| {
            let id = row.id;
            PricingRule::try_from(row)
                .map_err(|e| warn!(error = %e, rule_id = id, "Skipping pricing rule with bad condition"))
                .ok()
        })
        .collect()
}

pub async fn pricing_rules(pool: &MySqlPool, equipment_id: u64) -> AppResult<Vec<PricingRule>> {
    let rows = sqlx::query_as::<_, PricingRuleRow>(
        "SELECT * FROM pricing_rules WHERE equipment_id = ? ORDER BY priority DESC, id",
    )
    .bind(equipment_id)
    .fetch_all(pool)
    .await?;
    Ok(parse_rules(rows))
}

pub async fn pricing_rule(
    pool: &MySqlPool,
    equipment_id: u64,
    rule_id: u64,
) -> AppResult<Option<PricingRule>> {
    let row = sqlx::query_as::<_, PricingRuleRow>(
        "SELECT * FROM pricing_rules WHERE id = ? AND equipment_id = ?",
    )
    .bind(rule_id)
    .bind(equipment_id)
    .fetch_optional(pool)
    .await?;

    row.map(PricingRule::try_from)
        .transpose()
        .map_err(|e| AppError::internal(format!("pricing rule {rule_id} has a bad condition: {e}")))
}

pub async fn insert_pricing_rule(
    pool: &MySqlPool,
    equipment_id: u64,
    input: &PricingRuleInput,
) -> AppResult<u64> {
    let condition = serde_json::to_string(&input.condition)
        .map_err(|e| AppError::internal(format!("condition encode failed: {e}")))?;

    let result = sqlx::query(
        r#"
        INSERT INTO pricing_rules
        (equipment_id, rule_type, condition_json, adjustment_type, adjustment_value, priority,
         start_date, end_date, is_active)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(equipment_id)
    .bind(input.rule_type)
    .bind(condition)
    .bind(input.adjustment_type)
    .bind(input.adjustment_value)
    .bind(input.priority)
    .bind(input.start_date)
    .bind(input.end_date)
    .bind(input.is_active)
    .execute(pool)
    .await?;
    Ok(result.last_insert_id())
}

pub async fn update_pricing_rule(
    pool: &MySqlPool,
    equipment_id: u64,
    rule_id: u64,
    input: &PricingRuleInput,
) -> AppResult<bool> {
    let condition = serde_json::to_string(&input.condition)
        .map_err(|e| AppError::internal(format!("condition encode failed: {e}")))?;

    let result = sqlx::query(
        r#"
        UPDATE pricing_rules
        SET rule_type = ?, condition_json = ?, adjustment_type = ?, adjustment_value = ?,
            priority = ?, start_date = ?, end_date = ?, is_active = ?
        WHERE id = ? AND equipment_id = ?
        "#,
    )
    .bind(input.rule_type)
    .bind(condition)
    .bind(input.adjustment_type)
    .bind(input.adjustment_value)
    .bind(input.priority)
    .bind(input.start_date)
    .bind(input.end_date)
    .bind(input.is_active)
    .bind(rule_id)
    .bind(equipment_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_pricing_rule(pool: &MySqlPool, equipment_id: u64, rule_id: u64) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM pricing_rules WHERE id = ? AND equipment_id = ?")
        .bind(rule_id)
        .bind(equipment_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(condition_json: &str) -> PricingRuleRow {
        PricingRuleRow {
            id: 4,
            equipment_id: 2,
            rule_type: RuleType::Duration,
            condition_json: condition_json.to_string(),
            adjustment_type: AdjustmentType::Percentage,
            adjustment_value: -10.0,
            priority: 3,
            start_date: None,
            end_date: None,
            is_active: true,
        }
    }

    #[test]
    fn rows_with_bad_conditions_are_skipped() {
        let rules = parse_rules(vec![
            row(r#"{"kind":"rental_days","min":7,"max":null}"#),
            row(r#"{"kind":"moon_phase"}"#),
        ]);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].priority, 3);
    }

    #[test]
    fn stored_value_by_method() {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let input = DepreciationInput {
            method: DepreciationMethod::StraightLine,
            initial_value: 10_000.0,
            residual_value: 1_000.0,
            useful_life_years: 5,
            start_date: start,
        };
        let later = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();
        assert_eq!(stored_value(&input, Some(123.0), later), 1_000.0);

        let usage = DepreciationInput {
            method: DepreciationMethod::UnitsOfProduction,
            ..input
        };
        assert_eq!(stored_value(&usage, Some(8_000.0), later), 8_000.0);
        assert_eq!(stored_value(&usage, Some(50.0), later), 1_000.0);
        assert_eq!(stored_value(&usage, None, later), 10_000.0);
    }
}
