use serde_json::Value;
use sqlx::MySqlPool;

use crate::error::AppResult;
use crate::model::customer::{Customer, NewCustomer};
use crate::utils::db_utils::{UpdateTarget, build_update_sql, execute_update};
use crate::utils::pagination::{Page, PageParams};
use crate::utils::query::Filters;

const CUSTOMER_UPDATE: UpdateTarget = UpdateTarget {
    table: "customers",
    id_column: "id",
    columns: &[
        "company_name",
        "contact_person",
        "email",
        "phone",
        "address",
        "payment_terms",
        "customer_type",
        "is_active",
    ],
};

#[derive(Debug, Default)]
pub struct CustomerFilter {
    pub search: Option<String>,
    pub is_active: Option<bool>,
}

pub async fn insert(pool: &MySqlPool, customer: &NewCustomer) -> AppResult<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO customers
        (company_name, contact_person, email, phone, address, payment_terms, customer_type)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(customer.company_name.trim())
    .bind(&customer.contact_person)
    .bind(&customer.email)
    .bind(&customer.phone)
    .bind(&customer.address)
    .bind(&customer.payment_terms)
    .bind(&customer.customer_type)
    .execute(pool)
    .await?;
    Ok(result.last_insert_id())
}

pub async fn find(pool: &MySqlPool, id: u64) -> AppResult<Option<Customer>> {
    Ok(
        sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?,
    )
}

pub async fn list(
    pool: &MySqlPool,
    filter: &CustomerFilter,
    params: PageParams,
) -> AppResult<Page<Customer>> {
    let mut filters = Filters::new();
    filters.push_opt("is_active = ?", filter.is_active.map(u64::from));

    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let like = format!("%{search}%");
        filters.push_many(
            "(company_name LIKE ? OR contact_person LIKE ?)",
            [like.clone(), like],
        );
    }

    let count_sql = format!("SELECT COUNT(*) FROM customers{}", filters.sql());
    let total = filters
        .bind_scalar(sqlx::query_scalar::<_, i64>(&count_sql))
        .fetch_one(pool)
        .await?;

    let data_sql = format!(
        "SELECT * FROM customers{} ORDER BY company_name, id LIMIT ? OFFSET ?",
        filters.sql()
    );
    let data = filters
        .bind_as(sqlx::query_as::<_, Customer>(&data_sql))
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await?;

    Ok(Page::new(data, params, total))
}

pub async fn update(pool: &MySqlPool, id: u64, payload: &Value) -> AppResult<u64> {
    let update = build_update_sql(&CUSTOMER_UPDATE, payload, id)?;
    Ok(execute_update(pool, update).await?)
}

/// Customers are never hard-deleted; rentals and invoices keep pointing at them.
pub async fn deactivate(pool: &MySqlPool, id: u64) -> AppResult<bool> {
    let result = sqlx::query("UPDATE customers SET is_active = 0 WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn count(pool: &MySqlPool) -> AppResult<i64> {
    Ok(sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM customers")
        .fetch_one(pool)
        .await?)
}
