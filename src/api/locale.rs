use crate::{
    auth::auth::AuthUser,
    i18n::{LocaleStore, LocaleValidation},
};
use actix_web::{HttpResponse, Responder, web};
use serde::Serialize;
use serde_json::{Value, json};
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct LocaleList {
    #[schema(example = json!(["ar", "en"]))]
    pub locales: Vec<String>,
    #[schema(example = "en")]
    pub default: String,
}

#[utoipa::path(
    get,
    path = "/api/locales",
    responses(
        (status = 200, body = LocaleList)
    ),
    tag = "Localization"
)]
pub async fn list_locales(store: web::Data<LocaleStore>) -> actix_web::Result<impl Responder> {
    let locales = store.locales().await?;
    Ok(HttpResponse::Ok().json(LocaleList {
        locales,
        default: store.default_locale().to_string(),
    }))
}

/// All namespaces of a locale, keyed by namespace
#[utoipa::path(
    get,
    path = "/api/locales/{locale}",
    params(
        ("locale", Path, description = "Locale code, e.g. en")
    ),
    responses(
        (status = 200, body = Object, example = json!({
            "common": {"actions": {"save": "Save"}},
            "rental": {"title": "Rentals"}
        })),
        (status = 404, description = "Locale not found")
    ),
    tag = "Localization"
)]
pub async fn get_locale(
    store: web::Data<LocaleStore>,
    path: web::Path<String>,
) -> actix_web::Result<impl Responder> {
    let merged = store.all(&path).await?;
    Ok(HttpResponse::Ok().json(merged))
}

#[utoipa::path(
    get,
    path = "/api/locales/{locale}/missing-keys",
    params(
        ("locale", Path, description = "Locale code")
    ),
    responses(
        (status = 200, description = "Dotted keys missing per namespace", body = Object, example = json!({
            "common": ["app.welcome"]
        }))
    ),
    tag = "Localization"
)]
pub async fn missing_keys(
    store: web::Data<LocaleStore>,
    path: web::Path<String>,
) -> actix_web::Result<impl Responder> {
    let missing = store.missing_keys(&path).await?;
    Ok(HttpResponse::Ok().json(json!({
        "locale": path.as_str(),
        "reference": store.default_locale(),
        "missing": missing
    })))
}

#[utoipa::path(
    get,
    path = "/api/locales/{locale}/validate",
    params(
        ("locale", Path, description = "Locale code")
    ),
    responses(
        (status = 200, body = LocaleValidation)
    ),
    tag = "Localization"
)]
pub async fn validate_locale(
    store: web::Data<LocaleStore>,
    path: web::Path<String>,
) -> actix_web::Result<impl Responder> {
    let report = store.validate(&path).await?;
    Ok(HttpResponse::Ok().json(report))
}

#[utoipa::path(
    get,
    path = "/api/locales/{locale}/{namespace}",
    params(
        ("locale", Path, description = "Locale code"),
        ("namespace", Path, description = "Namespace file name without .json")
    ),
    responses(
        (status = 200, body = Object),
        (status = 404, description = "Namespace not found")
    ),
    tag = "Localization"
)]
pub async fn get_namespace(
    store: web::Data<LocaleStore>,
    path: web::Path<(String, String)>,
) -> actix_web::Result<impl Responder> {
    let (locale, namespace) = path.into_inner();
    let bundle = store.bundle(&locale, &namespace).await?;
    Ok(HttpResponse::Ok().json(bundle.as_ref()))
}

#[utoipa::path(
    put,
    path = "/api/locales/{locale}/{namespace}",
    params(
        ("locale", Path, description = "Locale code"),
        ("namespace", Path, description = "Namespace file name without .json")
    ),
    request_body = Object,
    responses(
        (status = 200, description = "Namespace replaced"),
        (status = 403, description = "Admin only"),
        (status = 422, description = "Body is not a JSON object or name is invalid")
    ),
    tag = "Localization",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn put_namespace(
    auth: AuthUser,
    store: web::Data<LocaleStore>,
    path: web::Path<(String, String)>,
    payload: web::Json<Value>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let (locale, namespace) = path.into_inner();
    store.write(&locale, &namespace, payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Locale updated successfully" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{TokenSubject, generate_access_token};
    use crate::config::Config;
    use actix_web::{App, http::StatusCode};
    use std::fs;

    #[actix_web::test]
    async fn reads_are_public_and_writes_need_admin() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("en")).unwrap();
        fs::write(dir.path().join("en").join("common.json"), r#"{"save": "Save"}"#).unwrap();

        let config = Config::for_tests();
        let hr = generate_access_token(
            &TokenSubject {
                user_id: 2,
                username: "hr",
                role: 2,
                employee_id: None,
            },
            &config.jwt_secret,
            60,
        )
        .unwrap();

        let app = actix_web::test::init_service(
            App::new()
                .app_data(web::Data::new(config))
                .app_data(web::Data::new(LocaleStore::new(dir.path(), "en")))
                .route("/api/locales/{locale}/{namespace}", web::get().to(get_namespace))
                .route("/api/locales/{locale}/{namespace}", web::put().to(put_namespace)),
        )
        .await;

        let req = actix_web::test::TestRequest::get()
            .uri("/api/locales/en/common")
            .to_request();
        let body: Value = actix_web::test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["save"], "Save");

        let req = actix_web::test::TestRequest::put()
            .uri("/api/locales/en/common")
            .insert_header(("Authorization", format!("Bearer {hr}")))
            .set_json(json!({"save": "Store"}))
            .to_request();
        let resp = actix_web::test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let req = actix_web::test::TestRequest::put()
            .uri("/api/locales/en/common")
            .set_json(json!({"save": "Store"}))
            .to_request();
        let resp = actix_web::test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
