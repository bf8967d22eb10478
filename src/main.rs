use std::sync::Arc;

use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use anyhow::Context;
use dotenvy::dotenv;

mod api;
mod auth;
mod config;
mod db;
mod docs;
mod error;
mod i18n;
mod model;
mod models;
mod repo;
mod routes;
mod utils;

use config::Config;
use db::init_db;

use crate::docs::ApiDoc;
use crate::i18n::LocaleStore;
use crate::model::rental_workflow::{RentalWorkflow, StandardRentalWorkflow};
use crate::routes::RateLimits;
use crate::utils::username_index;
use tracing::{error, info};
use tracing_appender::rolling;
use utoipa::OpenApi; // ← needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    "ERP server is running"
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!(addr = %config.server_addr, "Server starting...");

    let pool = init_db(&config).await?;
    let limits = RateLimits::from_config(&config)?;

    let locales = Data::new(LocaleStore::new(
        config.locales_dir.clone(),
        config.default_locale.clone(),
    ));
    match locales.warmup().await {
        Ok(loaded) => info!(loaded, dir = %config.locales_dir.display(), "Locale bundles loaded"),
        Err(e) => error!(error = %e, "Failed to load locale bundles"),
    }

    let workflow: Data<dyn RentalWorkflow> =
        Data::from(Arc::new(StandardRentalWorkflow) as Arc<dyn RentalWorkflow>);

    let pool_for_filter_warmup = pool.clone();
    let pool_for_cache_warmup = pool.clone();

    actix_web::rt::spawn(async move {
        if let Err(e) = username_index::warmup_filter(&pool_for_filter_warmup, 100).await {
            error!(error = ?e, "Failed to warmup username filter");
        }
    });

    actix_web::rt::spawn(async move {
        // Last 30 days of active users, in batches of 250
        if let Err(e) = username_index::warmup_cache(&pool_for_cache_warmup, 30, 250).await {
            error!(error = ?e, "Failed to warmup username cache");
        }
    });

    let server_addr = config.server_addr.clone();
    let pool_data = Data::new(pool);
    let config_data = Data::new(config);

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(pool_data.clone())
            .app_data(config_data.clone())
            .app_data(locales.clone())
            .app_data(workflow.clone())
            .service(index)
            // Configure auth + protected routes with rate limiting
            .configure(|cfg| routes::configure(cfg, &config_data, &limits))
    })
    .bind(&server_addr)
    .with_context(|| format!("Failed to bind {server_addr}"))?
    .run()
    .await?;

    Ok(())
}
