use crate::{
    auth::auth::AuthUser,
    error::{AppError, is_unique_violation},
    model::employee::{Employee, EmployeeStatus, NewEmployee},
    repo::{self, employee::EmployeeFilter},
    utils::pagination::{EmployeePage, PageParams},
};
use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EmployeeQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub department_id: Option<u64>,
    pub status: Option<EmployeeStatus>,
    /// Matches first name, last name or email
    pub search: Option<String>,
}

/// Create Employee
#[utoipa::path(
    post,
    path = "/api/employees",
    request_body = NewEmployee,
    responses(
        (status = 201, description = "Employee created successfully", body = Object, example = json!({
            "message": "Employee created successfully",
            "id": 12
        })),
        (status = 409, description = "Employee code or email already in use"),
        (status = 422, description = "Validation failed")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<NewEmployee>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    payload.validate().into_result()?;

    match repo::employee::insert(pool.get_ref(), &payload).await {
        Ok(id) => {
            info!(employee_id = id, by = auth.user_id, "Employee created");
            Ok(HttpResponse::Created().json(json!({
                "message": "Employee created successfully",
                "id": id
            })))
        }
        Err(e) if is_unique_violation(&e) => {
            Err(AppError::conflict("Employee code or email already in use").into())
        }
        Err(e) => {
            error!(error = %e, "Failed to Create Employee");
            Err(AppError::from(e).into())
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/employees",
    params(EmployeeQuery),
    responses(
        (status = 200, description = "Paginated employee list", body = EmployeePage)
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_employees(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<EmployeeQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let query = query.into_inner();
    let params = PageParams::new(query.page, query.per_page);
    let filter = EmployeeFilter {
        status: query.status,
        department_id: query.department_id,
        search: query.search,
    };

    let page = repo::employee::list(pool.get_ref(), &filter, params).await?;
    Ok(HttpResponse::Ok().json(page))
}

/// Update Employee
///
/// Partial update: any subset of the employee columns.
#[utoipa::path(
    put,
    path = "/api/employees/{employee_id}",
    params(
        ("employee_id", Path, description = "Employee ID")
    ),
    request_body = Object,
    responses(
        (status = 200, description = "Employee updated successfully", body = Object, example = json!({
            "message": "Employee updated successfully"
        })),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "message": "Employee not found"
        })),
        (status = 422, description = "Unknown or invalid field")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let employee_id = path.into_inner();

    if let Some(status) = body.get("status").and_then(Value::as_str) {
        status
            .parse::<EmployeeStatus>()
            .map_err(|_| AppError::invalid("status", "unknown employee status"))?;
    }

    let affected = repo::employee::update(pool.get_ref(), employee_id, &body).await?;
    if affected == 0 && repo::employee::find(pool.get_ref(), employee_id).await?.is_none() {
        return Err(AppError::not_found("Employee not found").into());
    }

    Ok(HttpResponse::Ok().json(json!({
        "message": "Employee updated successfully"
    })))
}

/// Delete Employee
///
/// Soft delete: the status becomes `inactive`.
#[utoipa::path(
    delete,
    path = "/api/employees/{employee_id}",
    params(
        ("employee_id", Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Successfully deleted", body = Object, example = json!({
            "message": "Successfully deleted"
        })),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "message": "Employee not found"
        }))
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let employee_id = path.into_inner();

    if repo::employee::find(pool.get_ref(), employee_id).await?.is_none() {
        return Err(AppError::not_found("Employee not found").into());
    }
    repo::employee::deactivate(pool.get_ref(), employee_id).await?;
    info!(employee_id, by = auth.user_id, "Employee deactivated");

    Ok(HttpResponse::Ok().json(json!({
        "message": "Successfully deleted"
    })))
}

/// Get Employee by ID
#[utoipa::path(
    get,
    path = "/api/employees/{employee_id}",
    params(
        ("employee_id", Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Employee found", body = Employee),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "message": "Employee not found"
        }))
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let employee_id: u64 = path.into_inner();
    if !auth.owns(employee_id) {
        auth.require_hr_or_admin()?;
    }

    match repo::employee::find(pool.get_ref(), employee_id).await? {
        Some(emp) => Ok(HttpResponse::Ok().json(emp)),
        None => Err(AppError::not_found("Employee not found").into()),
    }
}
