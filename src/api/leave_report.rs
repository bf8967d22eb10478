use crate::{
    auth::auth::AuthUser,
    error::AppError,
    repo::{self, leave::LeaveReportRow},
};
use actix_web::{HttpResponse, Responder, web};
use chrono::{NaiveDate, Utc};
use csv::WriterBuilder;
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct ReportQuery {
    /// Only `csv` is supported
    #[schema(example = "csv")]
    pub format: Option<String>,
    #[schema(example = "2026-01-01", format = "date", value_type = Option<String>)]
    pub date_from: Option<NaiveDate>,
    #[schema(example = "2026-12-31", format = "date", value_type = Option<String>)]
    pub date_to: Option<NaiveDate>,
}

fn write_csv(rows: &[LeaveReportRow]) -> Result<Vec<u8>, AppError> {
    let mut writer = WriterBuilder::new().has_headers(true).from_writer(Vec::new());
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| AppError::internal(format!("csv write failed: {e}")))?;
    }
    writer
        .into_inner()
        .map_err(|e| AppError::internal(format!("csv flush failed: {e}")))
}

/// Leave report export
#[utoipa::path(
    get,
    path = "/api/leave/report/export",
    params(ReportQuery),
    responses(
        (status = 200, description = "CSV file", content_type = "text/csv"),
        (status = 400, description = "Unsupported format"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn export_report(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<ReportQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let format = query.format.as_deref().unwrap_or("csv");
    if !format.eq_ignore_ascii_case("csv") {
        return Err(AppError::bad_request(format!("Unsupported export format: {format}")).into());
    }

    let rows = repo::leave::report_rows(pool.get_ref(), query.date_from, query.date_to).await?;
    let count = rows.len();
    let body = web::block(move || write_csv(&rows)).await.map_err(AppError::from)??;

    let filename = format!("leave_report_{}.csv", Utc::now().format("%Y%m%d_%H%M%S"));
    info!(rows = count, by = auth.user_id, "Leave report exported");

    Ok(HttpResponse::Ok()
        .content_type("text/csv; charset=utf-8")
        .insert_header((
            "Content-Disposition",
            format!("attachment; filename=\"{filename}\""),
        ))
        .body(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::leave_request::{LeaveStatus, LeaveType};

    #[test]
    fn csv_has_header_and_snake_case_enums() {
        let rows = vec![LeaveReportRow {
            id: 7,
            employee_code: "EMP-7".into(),
            employee_name: "Lina Haddad".into(),
            leave_type: LeaveType::Annual,
            start_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 3, 3).unwrap(),
            days: 3,
            status: LeaveStatus::Approved,
            reason: "Family, travel".into(),
        }];
        let text = String::from_utf8(write_csv(&rows).unwrap()).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "id,employee_code,employee_name,leave_type,start_date,end_date,days,status,reason"
        );
        assert_eq!(
            lines.next().unwrap(),
            "7,EMP-7,Lina Haddad,annual,2026-03-01,2026-03-03,3,approved,\"Family, travel\""
        );
    }
}
