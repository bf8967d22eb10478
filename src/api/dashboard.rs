use crate::{
    auth::auth::AuthUser,
    config::Config,
    repo::{self, dashboard::DashboardStats},
};
use actix_web::{HttpResponse, Responder, web};
use chrono::Utc;
use serde::Serialize;
use sqlx::MySqlPool;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ModuleStatus {
    #[schema(example = "Rental")]
    pub name: &'static str,
    pub enabled: bool,
    #[schema(example = "/api/rentals")]
    pub prefix: String,
}

/// Business modules and the route prefix each one is mounted under.
const MODULES: [(&str, &str); 7] = [
    ("Core", "/dashboard"),
    ("Leave", "/leave"),
    ("Payroll", "/payroll"),
    ("Rental", "/rentals"),
    ("Equipment", "/equipment"),
    ("Timesheet", "/timesheets"),
    ("Localization", "/locales"),
];

fn module_statuses(api_prefix: &str) -> Vec<ModuleStatus> {
    MODULES
        .iter()
        .map(|&(name, path)| ModuleStatus {
            name,
            enabled: true,
            prefix: format!("{api_prefix}{path}"),
        })
        .collect()
}

#[utoipa::path(
    get,
    path = "/api/dashboard/stats",
    responses(
        (status = 200, body = DashboardStats),
        (status = 403, description = "HR/Admin only")
    ),
    tag = "Dashboard",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn dashboard_stats(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let stats = repo::dashboard::stats(pool.get_ref(), Utc::now().date_naive()).await?;
    Ok(HttpResponse::Ok().json(stats))
}

#[utoipa::path(
    get,
    path = "/api/modules/status",
    responses(
        (status = 200, body = [ModuleStatus])
    ),
    tag = "Dashboard",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn modules_status(
    _auth: AuthUser,
    config: web::Data<Config>,
) -> actix_web::Result<impl Responder> {
    Ok(HttpResponse::Ok().json(module_statuses(&config.api_prefix)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_module_is_listed_under_the_api_prefix() {
        let modules = module_statuses("/api");
        assert_eq!(modules.len(), 7);
        assert!(modules.iter().all(|m| m.enabled));
        assert_eq!(modules[3].name, "Rental");
        assert_eq!(modules[3].prefix, "/api/rentals");
        assert_eq!(modules[6].prefix, "/api/locales");
    }
}
