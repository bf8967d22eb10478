use crate::{
    auth::auth::AuthUser,
    error::{AppError, is_unique_violation},
    model::{
        depreciation::{DepreciationInput, EquipmentDepreciation, ScheduleYear},
        equipment::{Equipment, EquipmentStatus, NewEquipment},
        pricing::{PriceQuote, PricingContext, PricingRule, PricingRuleInput, quote},
        rental::RateType,
    },
    repo::{self, equipment::EquipmentFilter},
    utils::pagination::{EquipmentPage, PageParams},
};
use actix_web::{HttpResponse, Responder, web};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EquipmentQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<EquipmentStatus>,
    /// Matches name, model or serial number
    pub search: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangeEquipmentStatus {
    pub status: EquipmentStatus,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetDepreciation {
    #[serde(flatten)]
    pub input: DepreciationInput,
    /// Only used by `units_of_production`
    pub current_value: Option<f64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DepreciationReport {
    pub depreciation: EquipmentDepreciation,
    pub current_value: f64,
    pub schedule: Vec<ScheduleYear>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct QuoteRequest {
    #[serde(flatten)]
    pub context: PricingContext,
    /// Billing unit used to derive the base price; defaults to daily
    pub rate_type: Option<RateType>,
    /// Overrides the derived base price
    pub base_price: Option<f64>,
}

async fn load_equipment(pool: &MySqlPool, id: u64) -> actix_web::Result<Equipment> {
    repo::equipment::find(pool, id)
        .await?
        .ok_or_else(|| AppError::not_found("Equipment not found").into())
}

#[utoipa::path(
    post,
    path = "/api/equipment",
    request_body = NewEquipment,
    responses(
        (status = 201, description = "Equipment created", body = Object, example = json!({
            "message": "Equipment created successfully",
            "id": 9
        })),
        (status = 409, description = "Serial number already registered"),
        (status = 422, description = "Validation failed")
    ),
    tag = "Equipment",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_equipment(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<NewEquipment>,
) -> actix_web::Result<impl Responder> {
    auth.require_staff()?;
    payload.validate().into_result()?;

    match repo::equipment::insert(pool.get_ref(), &payload).await {
        Ok(id) => {
            info!(equipment_id = id, by = auth.user_id, "Equipment created");
            Ok(HttpResponse::Created().json(json!({
                "message": "Equipment created successfully",
                "id": id
            })))
        }
        Err(e) if is_unique_violation(&e) => {
            Err(AppError::conflict("Serial number already registered").into())
        }
        Err(e) => {
            error!(error = %e, "Failed to create equipment");
            Err(AppError::from(e).into())
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/equipment",
    params(EquipmentQuery),
    responses(
        (status = 200, description = "Paginated equipment", body = EquipmentPage)
    ),
    tag = "Equipment",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_equipment(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<EquipmentQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_staff()?;

    let query = query.into_inner();
    let params = PageParams::new(query.page, query.per_page);
    let filter = EquipmentFilter {
        status: query.status,
        search: query.search,
    };

    let page = repo::equipment::list(pool.get_ref(), &filter, params).await?;
    Ok(HttpResponse::Ok().json(page))
}

#[utoipa::path(
    get,
    path = "/api/equipment/{equipment_id}",
    params(
        ("equipment_id", Path, description = "Equipment ID")
    ),
    responses(
        (status = 200, body = Equipment),
        (status = 404, description = "Equipment not found")
    ),
    tag = "Equipment",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_equipment(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_staff()?;
    let equipment = load_equipment(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(equipment))
}

/// Partial update; status has its own endpoint
#[utoipa::path(
    put,
    path = "/api/equipment/{equipment_id}",
    params(
        ("equipment_id", Path, description = "Equipment ID")
    ),
    request_body = Object,
    responses(
        (status = 200, description = "Equipment updated"),
        (status = 404, description = "Equipment not found"),
        (status = 422, description = "Unknown or invalid field")
    ),
    tag = "Equipment",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_equipment(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> actix_web::Result<impl Responder> {
    auth.require_staff()?;
    let equipment_id = path.into_inner();
    load_equipment(pool.get_ref(), equipment_id).await?;

    for rate in ["daily_rate", "weekly_rate", "monthly_rate", "purchase_price"] {
        if body.get(rate).and_then(Value::as_f64).is_some_and(|v| v < 0.0) {
            return Err(AppError::invalid(rate, "cannot be negative").into());
        }
    }

    repo::equipment::update(pool.get_ref(), equipment_id, &body).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Equipment updated successfully"
    })))
}

#[utoipa::path(
    delete,
    path = "/api/equipment/{equipment_id}",
    params(
        ("equipment_id", Path, description = "Equipment ID")
    ),
    responses(
        (status = 200, description = "Equipment deleted"),
        (status = 404, description = "Equipment not found"),
        (status = 409, description = "Equipment is referenced by rentals")
    ),
    tag = "Equipment",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_equipment(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let equipment_id = path.into_inner();

    match repo::equipment::delete(pool.get_ref(), equipment_id).await {
        Ok(true) => {
            info!(equipment_id, by = auth.user_id, "Equipment deleted");
            Ok(HttpResponse::Ok().json(json!({ "message": "Successfully deleted" })))
        }
        Ok(false) => Err(AppError::not_found("Equipment not found").into()),
        Err(e) if is_unique_violation(&e) => Err(AppError::conflict(
            "Equipment is referenced by rentals; retire it instead",
        )
        .into()),
        Err(e) => Err(AppError::from(e).into()),
    }
}

/// Manual status change
///
/// `rented` is reserved for the rental workflow.
#[utoipa::path(
    put,
    path = "/api/equipment/{equipment_id}/status",
    params(
        ("equipment_id", Path, description = "Equipment ID")
    ),
    request_body = ChangeEquipmentStatus,
    responses(
        (status = 200, description = "Status changed"),
        (status = 409, description = "Status change not allowed")
    ),
    tag = "Equipment",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn change_equipment_status(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<ChangeEquipmentStatus>,
) -> actix_web::Result<impl Responder> {
    auth.require_staff()?;
    let equipment = load_equipment(pool.get_ref(), path.into_inner()).await?;

    let to = equipment.status.manual_change(body.status).map_err(AppError::from)?;
    repo::equipment::set_status(pool.get_ref(), equipment.id, to).await?;
    info!(equipment_id = equipment.id, from = %equipment.status, to = %to, "Equipment status changed");

    Ok(HttpResponse::Ok().json(json!({
        "message": "Equipment status updated",
        "status": to
    })))
}

/* =========================
Depreciation
========================= */

#[utoipa::path(
    get,
    path = "/api/equipment/{equipment_id}/depreciation",
    params(
        ("equipment_id", Path, description = "Equipment ID")
    ),
    responses(
        (status = 200, body = DepreciationReport),
        (status = 404, description = "No depreciation set up for this equipment")
    ),
    tag = "Equipment",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_depreciation(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_staff()?;

    let depreciation = repo::equipment::depreciation(pool.get_ref(), path.into_inner())
        .await?
        .ok_or_else(|| AppError::not_found("No depreciation set up for this equipment"))?;

    let today = Utc::now().date_naive();
    Ok(HttpResponse::Ok().json(DepreciationReport {
        current_value: depreciation.current_value(today),
        schedule: depreciation.schedule(),
        depreciation,
    }))
}

#[utoipa::path(
    put,
    path = "/api/equipment/{equipment_id}/depreciation",
    params(
        ("equipment_id", Path, description = "Equipment ID")
    ),
    request_body = SetDepreciation,
    responses(
        (status = 200, description = "Depreciation saved"),
        (status = 404, description = "Equipment not found"),
        (status = 422, description = "Validation failed")
    ),
    tag = "Equipment",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn set_depreciation(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<SetDepreciation>,
) -> actix_web::Result<impl Responder> {
    auth.require_staff()?;
    let equipment = load_equipment(pool.get_ref(), path.into_inner()).await?;
    body.input.validate().into_result()?;

    let value = repo::equipment::stored_value(&body.input, body.current_value, Utc::now().date_naive());
    repo::equipment::upsert_depreciation(pool.get_ref(), equipment.id, &body.input, value).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Depreciation saved",
        "current_value": value
    })))
}

/* =========================
Pricing rules
========================= */

#[utoipa::path(
    get,
    path = "/api/equipment/{equipment_id}/pricing",
    params(
        ("equipment_id", Path, description = "Equipment ID")
    ),
    responses(
        (status = 200, body = [PricingRule])
    ),
    tag = "Equipment",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_pricing_rules(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_staff()?;
    let rules = repo::equipment::pricing_rules(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(rules))
}

#[utoipa::path(
    post,
    path = "/api/equipment/{equipment_id}/pricing",
    params(
        ("equipment_id", Path, description = "Equipment ID")
    ),
    request_body = PricingRuleInput,
    responses(
        (status = 201, description = "Rule created"),
        (status = 404, description = "Equipment not found"),
        (status = 422, description = "Validation failed")
    ),
    tag = "Equipment",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_pricing_rule(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<PricingRuleInput>,
) -> actix_web::Result<impl Responder> {
    auth.require_staff()?;
    let equipment = load_equipment(pool.get_ref(), path.into_inner()).await?;
    body.validate().into_result()?;

    let id = repo::equipment::insert_pricing_rule(pool.get_ref(), equipment.id, &body).await?;
    info!(rule_id = id, equipment_id = equipment.id, "Pricing rule created");

    Ok(HttpResponse::Created().json(json!({
        "message": "Pricing rule created",
        "id": id
    })))
}

#[utoipa::path(
    put,
    path = "/api/equipment/{equipment_id}/pricing/{rule_id}",
    params(
        ("equipment_id", Path, description = "Equipment ID"),
        ("rule_id", Path, description = "Pricing rule ID")
    ),
    request_body = PricingRuleInput,
    responses(
        (status = 200, description = "Rule updated"),
        (status = 404, description = "Rule not found")
    ),
    tag = "Equipment",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_pricing_rule(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<(u64, u64)>,
    body: web::Json<PricingRuleInput>,
) -> actix_web::Result<impl Responder> {
    auth.require_staff()?;
    let (equipment_id, rule_id) = path.into_inner();
    body.validate().into_result()?;

    if repo::equipment::pricing_rule(pool.get_ref(), equipment_id, rule_id)
        .await?
        .is_none()
    {
        return Err(AppError::not_found("Pricing rule not found").into());
    }
    repo::equipment::update_pricing_rule(pool.get_ref(), equipment_id, rule_id, &body).await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "Pricing rule updated" })))
}

#[utoipa::path(
    delete,
    path = "/api/equipment/{equipment_id}/pricing/{rule_id}",
    params(
        ("equipment_id", Path, description = "Equipment ID"),
        ("rule_id", Path, description = "Pricing rule ID")
    ),
    responses(
        (status = 200, description = "Rule deleted"),
        (status = 404, description = "Rule not found")
    ),
    tag = "Equipment",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_pricing_rule(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<(u64, u64)>,
) -> actix_web::Result<impl Responder> {
    auth.require_staff()?;
    let (equipment_id, rule_id) = path.into_inner();

    if !repo::equipment::delete_pricing_rule(pool.get_ref(), equipment_id, rule_id).await? {
        return Err(AppError::not_found("Pricing rule not found").into());
    }
    Ok(HttpResponse::Ok().json(json!({ "message": "Pricing rule deleted" })))
}

fn base_price(equipment: &Equipment, request: &QuoteRequest) -> f64 {
    if let Some(price) = request.base_price {
        return price;
    }
    let rate_type = request.rate_type.unwrap_or(RateType::Daily);
    let units = rate_type.multiplier(request.context.rental_days as i64) as f64;
    equipment.rate_for(rate_type) * units * request.context.quantity as f64
}

/// Price quote after dynamic pricing rules
///
/// Missing utilization is filled with the current fleet utilization.
#[utoipa::path(
    post,
    path = "/api/equipment/{equipment_id}/pricing/quote",
    params(
        ("equipment_id", Path, description = "Equipment ID")
    ),
    request_body = QuoteRequest,
    responses(
        (status = 200, body = PriceQuote),
        (status = 404, description = "Equipment not found")
    ),
    tag = "Equipment",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn quote_price(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<QuoteRequest>,
) -> actix_web::Result<impl Responder> {
    auth.require_staff()?;
    let equipment = load_equipment(pool.get_ref(), path.into_inner()).await?;
    let mut request = body.into_inner();

    if request.context.rental_days == 0 {
        return Err(AppError::invalid("rental_days", "must be at least 1").into());
    }
    if request.context.utilization.is_none() {
        request.context.utilization = repo::equipment::fleet_utilization(pool.get_ref()).await?;
    }

    let rules = repo::equipment::pricing_rules(pool.get_ref(), equipment.id).await?;
    let result = quote(base_price(&equipment, &request), &rules, &request.context);
    Ok(HttpResponse::Ok().json(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn crane() -> Equipment {
        Equipment {
            id: 1,
            name: "Crane".into(),
            model: None,
            serial_number: None,
            status: EquipmentStatus::Available,
            daily_rate: 100.0,
            weekly_rate: 500.0,
            monthly_rate: 1_800.0,
            purchase_price: None,
            purchase_date: None,
            created_at: None,
        }
    }

    #[test]
    fn base_price_from_rates() {
        let request: QuoteRequest = serde_json::from_value(json!({
            "start_date": "2026-07-01",
            "rental_days": 10,
            "quantity": 2,
            "rate_type": "weekly"
        }))
        .unwrap();
        assert_eq!(request.context.start_date, NaiveDate::from_ymd_opt(2026, 7, 1).unwrap());
        // 10 days bill as 2 weeks, for 2 units.
        assert_eq!(base_price(&crane(), &request), 2_000.0);

        let daily: QuoteRequest = serde_json::from_value(json!({
            "start_date": "2026-07-01",
            "rental_days": 3
        }))
        .unwrap();
        assert_eq!(base_price(&crane(), &daily), 300.0);
    }

    #[test]
    fn explicit_base_price_wins() {
        let request: QuoteRequest = serde_json::from_value(json!({
            "start_date": "2026-07-01",
            "rental_days": 3,
            "base_price": 42.0
        }))
        .unwrap();
        assert_eq!(base_price(&crane(), &request), 42.0);
    }
}
