use crate::{
    auth::auth::AuthUser,
    error::AppError,
    model::customer::{Customer, NewCustomer},
    repo::{self, customer::CustomerFilter},
    utils::pagination::{CustomerPage, PageParams},
};
use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CustomerQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// Matches company name or contact person
    pub search: Option<String>,
    pub is_active: Option<bool>,
}

#[utoipa::path(
    post,
    path = "/api/customers",
    request_body = NewCustomer,
    responses(
        (status = 201, description = "Customer created", body = Object, example = json!({
            "message": "Customer created successfully",
            "id": 3
        })),
        (status = 422, description = "Validation failed")
    ),
    tag = "Customer",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_customer(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<NewCustomer>,
) -> actix_web::Result<impl Responder> {
    auth.require_staff()?;
    payload.validate().into_result()?;

    let id = repo::customer::insert(pool.get_ref(), &payload).await?;
    info!(customer_id = id, by = auth.user_id, "Customer created");

    Ok(HttpResponse::Created().json(json!({
        "message": "Customer created successfully",
        "id": id
    })))
}

#[utoipa::path(
    get,
    path = "/api/customers",
    params(CustomerQuery),
    responses(
        (status = 200, description = "Paginated customers", body = CustomerPage)
    ),
    tag = "Customer",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_customers(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<CustomerQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_staff()?;

    let query = query.into_inner();
    let params = PageParams::new(query.page, query.per_page);
    let filter = CustomerFilter {
        search: query.search,
        is_active: query.is_active,
    };

    let page = repo::customer::list(pool.get_ref(), &filter, params).await?;
    Ok(HttpResponse::Ok().json(page))
}

#[utoipa::path(
    get,
    path = "/api/customers/{customer_id}",
    params(
        ("customer_id", Path, description = "Customer ID")
    ),
    responses(
        (status = 200, description = "Customer found", body = Customer),
        (status = 404, description = "Customer not found")
    ),
    tag = "Customer",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_customer(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_staff()?;

    match repo::customer::find(pool.get_ref(), path.into_inner()).await? {
        Some(customer) => Ok(HttpResponse::Ok().json(customer)),
        None => Err(AppError::not_found("Customer not found").into()),
    }
}

/// Partial update of customer columns
#[utoipa::path(
    put,
    path = "/api/customers/{customer_id}",
    params(
        ("customer_id", Path, description = "Customer ID")
    ),
    request_body = Object,
    responses(
        (status = 200, description = "Customer updated", body = Object, example = json!({
            "message": "Customer updated successfully"
        })),
        (status = 404, description = "Customer not found"),
        (status = 422, description = "Unknown or invalid field")
    ),
    tag = "Customer",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_customer(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> actix_web::Result<impl Responder> {
    auth.require_staff()?;
    let customer_id = path.into_inner();

    if let Some(name) = body.get("company_name") {
        if name.as_str().is_none_or(|n| n.trim().is_empty()) {
            return Err(AppError::invalid("company_name", "cannot be empty").into());
        }
    }

    let affected = repo::customer::update(pool.get_ref(), customer_id, &body).await?;
    if affected == 0 && repo::customer::find(pool.get_ref(), customer_id).await?.is_none() {
        return Err(AppError::not_found("Customer not found").into());
    }

    Ok(HttpResponse::Ok().json(json!({
        "message": "Customer updated successfully"
    })))
}

/// Deactivate Customer
#[utoipa::path(
    delete,
    path = "/api/customers/{customer_id}",
    params(
        ("customer_id", Path, description = "Customer ID")
    ),
    responses(
        (status = 200, description = "Customer deactivated"),
        (status = 404, description = "Customer not found")
    ),
    tag = "Customer",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn deactivate_customer(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_staff()?;
    let customer_id = path.into_inner();

    if repo::customer::find(pool.get_ref(), customer_id).await?.is_none() {
        return Err(AppError::not_found("Customer not found").into());
    }
    repo::customer::deactivate(pool.get_ref(), customer_id).await?;
    info!(customer_id, by = auth.user_id, "Customer deactivated");

    Ok(HttpResponse::Ok().json(json!({
        "message": "Customer deactivated"
    })))
}
