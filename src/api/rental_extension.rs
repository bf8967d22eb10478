use crate::{
    api::rental::load_rental,
    auth::auth::AuthUser,
    model::{
        rental::{ExtensionRequest, ExtensionStatus, RentalExtension},
        rental_workflow::RentalWorkflow,
    },
    repo,
};
use actix_web::{HttpResponse, Responder, web};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct ExtensionView {
    #[serde(flatten)]
    pub extension: RentalExtension,
    pub duration_days: i64,
}

impl From<RentalExtension> for ExtensionView {
    fn from(extension: RentalExtension) -> Self {
        Self {
            duration_days: extension.duration_days(),
            extension,
        }
    }
}

/// Swagger doc for extension request endpoint
#[utoipa::path(
    post,
    path = "/api/rentals/{rental_id}/extensions",
    params(
        ("rental_id", Path, description = "Rental ID")
    ),
    request_body = ExtensionRequest,
    responses(
        (status = 201, description = "Extension requested", body = Object, example = json!({
            "message": "Extension requested",
            "id": 3
        })),
        (status = 422, description = "Validation failed", body = Object, example = json!({
            "message": "Validation failed",
            "errors": {"reason": ["must be at least 10 characters"]}
        }))
    ),
    tag = "Rental",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn request_extension(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<ExtensionRequest>,
) -> actix_web::Result<impl Responder> {
    auth.require_staff()?;
    let rental = load_rental(pool.get_ref(), path.into_inner()).await?;
    payload
        .validate(&rental, Utc::now().date_naive())
        .into_result()?;

    let id = repo::rental::request_extension(pool.get_ref(), &rental, &payload, auth.user_id).await?;
    info!(rental_id = rental.id, extension_id = id, "Rental extension requested");

    Ok(HttpResponse::Created().json(json!({
        "message": "Extension requested",
        "id": id
    })))
}

#[utoipa::path(
    get,
    path = "/api/rentals/{rental_id}/extensions",
    params(
        ("rental_id", Path, description = "Rental ID")
    ),
    responses(
        (status = 200, body = [ExtensionView])
    ),
    tag = "Rental",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_extensions(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_staff()?;
    let rental = load_rental(pool.get_ref(), path.into_inner()).await?;
    let extensions: Vec<ExtensionView> = repo::rental::extensions(pool.get_ref(), rental.id)
        .await?
        .into_iter()
        .map(ExtensionView::from)
        .collect();
    Ok(HttpResponse::Ok().json(extensions))
}

async fn decide(
    auth: AuthUser,
    pool: &MySqlPool,
    workflow: &dyn RentalWorkflow,
    (rental_id, extension_id): (u64, u64),
    to: ExtensionStatus,
) -> actix_web::Result<HttpResponse> {
    auth.require_approver()?;
    let extension = repo::rental::decide_extension(
        pool,
        workflow,
        rental_id,
        extension_id,
        to,
        auth.user_id,
        Utc::now().date_naive(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(ExtensionView::from(extension)))
}

#[utoipa::path(
    put,
    path = "/api/rentals/{rental_id}/extensions/{extension_id}/approve",
    params(
        ("rental_id", Path, description = "Rental ID"),
        ("extension_id", Path, description = "Extension request ID")
    ),
    responses(
        (status = 200, body = ExtensionView),
        (status = 404, description = "Extension request not found"),
        (status = 409, description = "Already decided")
    ),
    tag = "Rental",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn approve_extension(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    workflow: web::Data<dyn RentalWorkflow>,
    path: web::Path<(u64, u64)>,
) -> actix_web::Result<impl Responder> {
    decide(
        auth,
        pool.get_ref(),
        workflow.get_ref(),
        path.into_inner(),
        ExtensionStatus::Approved,
    )
    .await
}

#[utoipa::path(
    put,
    path = "/api/rentals/{rental_id}/extensions/{extension_id}/reject",
    params(
        ("rental_id", Path, description = "Rental ID"),
        ("extension_id", Path, description = "Extension request ID")
    ),
    responses(
        (status = 200, body = ExtensionView),
        (status = 404, description = "Extension request not found"),
        (status = 409, description = "Already decided")
    ),
    tag = "Rental",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn reject_extension(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    workflow: web::Data<dyn RentalWorkflow>,
    path: web::Path<(u64, u64)>,
) -> actix_web::Result<impl Responder> {
    decide(
        auth,
        pool.get_ref(),
        workflow.get_ref(),
        path.into_inner(),
        ExtensionStatus::Rejected,
    )
    .await
}
