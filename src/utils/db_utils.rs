use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;
use sqlx::MySqlPool;

use crate::error::{AppError, AppResult};

/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug, PartialEq)]
pub enum SqlValue {
    String(String),
    U64(u64),
    I64(i64),
    F64(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Null,
}

/// ===============================
/// SQL update container
/// ===============================
#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

/// Table plus the columns a partial update may touch.
pub struct UpdateTarget {
    pub table: &'static str,
    pub id_column: &'static str,
    pub columns: &'static [&'static str],
}

fn to_sql_value(field: &str, value: &Value) -> AppResult<SqlValue> {
    Ok(match value {
        Value::String(s) => {
            if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                SqlValue::Date(d)
            } else if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
                SqlValue::DateTime(dt)
            } else {
                SqlValue::String(s.clone())
            }
        }
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                SqlValue::U64(u)
            } else if let Some(i) = n.as_i64() {
                SqlValue::I64(i)
            } else if let Some(f) = n.as_f64() {
                SqlValue::F64(f)
            } else {
                return Err(AppError::invalid(field, "unsupported number"));
            }
        }
        Value::Bool(b) => SqlValue::Bool(*b),
        Value::Null => SqlValue::Null,
        _ => return Err(AppError::invalid(field, "unsupported value type")),
    })
}

/// ===============================
/// Build dynamic UPDATE SQL
/// ===============================
/// Only columns listed in `target.columns` are accepted, so JSON keys never
/// reach the SQL text unchecked.
pub fn build_update_sql(target: &UpdateTarget, payload: &Value, id_value: u64) -> AppResult<SqlUpdate> {
    let obj = payload
        .as_object()
        .ok_or_else(|| AppError::bad_request("Payload must be a JSON object"))?;

    if obj.is_empty() {
        return Err(AppError::bad_request("No fields provided for update"));
    }

    let mut set_parts = Vec::with_capacity(obj.len());
    let mut values = Vec::with_capacity(obj.len() + 1);

    for (key, value) in obj {
        let column = target
            .columns
            .iter()
            .find(|c| **c == key.as_str())
            .ok_or_else(|| AppError::invalid(key, "field cannot be updated"))?;
        set_parts.push(format!("{column} = ?"));
        values.push(to_sql_value(key, value)?);
    }

    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ?",
        target.table,
        set_parts.join(", "),
        target.id_column
    );

    // WHERE id = ?
    values.push(SqlValue::U64(id_value));

    Ok(SqlUpdate { sql, values })
}

/// ===============================
/// Execute the update
/// ===============================
pub async fn execute_update(pool: &MySqlPool, update: SqlUpdate) -> Result<u64, sqlx::Error> {
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::U64(v) => query.bind(v),
            SqlValue::I64(v) => query.bind(v),
            SqlValue::F64(v) => query.bind(v),
            SqlValue::Bool(v) => query.bind(v),
            SqlValue::Date(v) => query.bind(v),
            SqlValue::DateTime(v) => query.bind(v),
            SqlValue::Null => query.bind(None::<String>),
        };
    }

    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TARGET: UpdateTarget = UpdateTarget {
        table: "employees",
        id_column: "id",
        columns: &["first_name", "hire_date", "basic_salary", "manager_id"],
    };

    #[test]
    fn builds_set_clause_for_allowed_columns() {
        let update = build_update_sql(
            &TARGET,
            &json!({"first_name": "Sara", "hire_date": "2025-02-01", "basic_salary": 4500.5}),
            9,
        )
        .unwrap();
        // serde_json maps iterate in key order.
        assert_eq!(
            update.sql,
            "UPDATE employees SET basic_salary = ?, first_name = ?, hire_date = ? WHERE id = ?"
        );
        assert_eq!(update.values[0], SqlValue::F64(4500.5));
        assert_eq!(
            update.values[2],
            SqlValue::Date(NaiveDate::from_ymd_opt(2025, 2, 1).unwrap())
        );
        assert_eq!(update.values[3], SqlValue::U64(9));
    }

    #[test]
    fn rejects_unknown_columns() {
        let err = build_update_sql(&TARGET, &json!({"id = 1; --": 1}), 1).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn rejects_empty_and_non_object_payloads() {
        assert!(matches!(
            build_update_sql(&TARGET, &json!({}), 1),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            build_update_sql(&TARGET, &json!([1, 2]), 1),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn null_clears_column() {
        let update = build_update_sql(&TARGET, &json!({"manager_id": null}), 1).unwrap();
        assert_eq!(update.values[0], SqlValue::Null);
    }
}
