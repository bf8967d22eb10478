use crate::{
    api::{
        customer, dashboard, employee, equipment, invoice, leave_approval, leave_report,
        leave_request, locale, payroll, rental, rental_extension, timesheet,
    },
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfig, GovernorConfigBuilder, PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use anyhow::{Context, Result};

type LimiterConfig = GovernorConfig<PeerIpKeyExtractor, NoOpMiddleware>;

/// Per-route rate limits, validated once at startup.
#[derive(Clone)]
pub struct RateLimits {
    login: LimiterConfig,
    register: LimiterConfig,
    refresh: LimiterConfig,
    protected: LimiterConfig,
}

fn limiter_config(requests_per_min: u32) -> Result<LimiterConfig> {
    let per_ms = if requests_per_min == 0 {
        1
    } else {
        (60_000 / requests_per_min as u64).max(1)
    };
    GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min.max(1))
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .with_context(|| format!("invalid rate limit: {requests_per_min}/min"))
}

impl RateLimits {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            login: limiter_config(config.rate_login_per_min)?,
            register: limiter_config(config.rate_register_per_min)?,
            refresh: limiter_config(config.rate_refresh_per_min)?,
            protected: limiter_config(config.rate_protected_per_min)?,
        })
    }
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config, limits: &RateLimits) {
    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(Governor::new(&limits.login))
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/register")
                    .wrap(Governor::new(&limits.register))
                    .route(web::post().to(handlers::register)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(Governor::new(&limits.refresh))
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(Governor::new(&limits.login))
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Locale bundles are read by the client before login; writes check the
    // bearer token in the handler.
    cfg.service(
        web::scope(&format!("{}/locales", config.api_prefix))
            .wrap(Governor::new(&limits.protected))
            .service(web::resource("").route(web::get().to(locale::list_locales)))
            .service(
                web::resource("/{locale}/missing-keys").route(web::get().to(locale::missing_keys)),
            )
            .service(
                web::resource("/{locale}/validate").route(web::get().to(locale::validate_locale)),
            )
            .service(
                web::resource("/{locale}/{namespace}")
                    .route(web::get().to(locale::get_namespace))
                    .route(web::put().to(locale::put_namespace)),
            )
            .service(web::resource("/{locale}").route(web::get().to(locale::get_locale))),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(Governor::new(&limits.protected)) // rate limiting
            .route("/me", web::get().to(handlers::me))
            .route("/users/{user_id}/employee", web::put().to(handlers::link_employee))
            .route("/dashboard/stats", web::get().to(dashboard::dashboard_stats))
            .route("/modules/status", web::get().to(dashboard::modules_status))
            .service(
                web::scope("/employees")
                    .service(
                        web::resource("")
                            .route(web::post().to(employee::create_employee))
                            .route(web::get().to(employee::list_employees)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(employee::update_employee))
                            .route(web::get().to(employee::get_employee))
                            .route(web::delete().to(employee::delete_employee)),
                    ),
            )
            .service(
                web::scope("/leave")
                    .service(
                        web::resource("")
                            .route(web::get().to(leave_request::leave_list))
                            .route(web::post().to(leave_request::create_leave)),
                    )
                    // fixed paths before /{id}
                    .route("/approvals", web::get().to(leave_approval::approval_queue))
                    .route("/bulk-approve", web::post().to(leave_approval::bulk_approve))
                    .route("/statistics", web::get().to(leave_approval::leave_statistics))
                    .route("/report/export", web::get().to(leave_report::export_report))
                    .route("/balance/{employee_id}", web::get().to(leave_request::leave_balance))
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(leave_request::get_leave))
                            .route(web::put().to(leave_request::update_leave))
                            .route(web::delete().to(leave_request::delete_leave)),
                    )
                    .route("/{id}/approve", web::put().to(leave_approval::approve_leave))
                    .route("/{id}/reject", web::put().to(leave_approval::reject_leave)),
            )
            .service(
                web::scope("/payroll")
                    .service(
                        web::resource("")
                            .route(web::post().to(payroll::create_payroll))
                            .route(web::get().to(payroll::list_payrolls)),
                    )
                    .route("/generate", web::post().to(payroll::generate_payroll))
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(payroll::get_payroll))
                            .route(web::put().to(payroll::update_payroll)),
                    )
                    .route("/{id}/approve", web::put().to(payroll::approve_payroll))
                    .route("/{id}/pay", web::put().to(payroll::pay_payroll))
                    .route("/{id}/cancel", web::put().to(payroll::cancel_payroll)),
            )
            .service(
                web::scope("/customers")
                    .service(
                        web::resource("")
                            .route(web::post().to(customer::create_customer))
                            .route(web::get().to(customer::list_customers)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(customer::get_customer))
                            .route(web::put().to(customer::update_customer))
                            .route(web::delete().to(customer::deactivate_customer)),
                    ),
            )
            .service(
                web::scope("/equipment")
                    .service(
                        web::resource("")
                            .route(web::post().to(equipment::create_equipment))
                            .route(web::get().to(equipment::list_equipment)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(equipment::get_equipment))
                            .route(web::put().to(equipment::update_equipment))
                            .route(web::delete().to(equipment::delete_equipment)),
                    )
                    .route("/{id}/status", web::put().to(equipment::change_equipment_status))
                    .service(
                        web::resource("/{id}/depreciation")
                            .route(web::get().to(equipment::get_depreciation))
                            .route(web::put().to(equipment::set_depreciation)),
                    )
                    .service(
                        web::resource("/{id}/pricing")
                            .route(web::get().to(equipment::list_pricing_rules))
                            .route(web::post().to(equipment::create_pricing_rule)),
                    )
                    // before /pricing/{rule_id}
                    .route("/{id}/pricing/quote", web::post().to(equipment::quote_price))
                    .service(
                        web::resource("/{id}/pricing/{rule_id}")
                            .route(web::put().to(equipment::update_pricing_rule))
                            .route(web::delete().to(equipment::delete_pricing_rule)),
                    ),
            )
            .service(
                web::scope("/rentals")
                    .service(
                        web::resource("")
                            .route(web::post().to(rental::create_rental))
                            .route(web::get().to(rental::list_rentals)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(rental::get_rental))
                            .route(web::put().to(rental::update_rental))
                            .route(web::delete().to(rental::delete_rental)),
                    )
                    .route("/{id}/items", web::post().to(rental::add_item))
                    .route("/{id}/items/{item_id}", web::delete().to(rental::remove_item))
                    .route("/{id}/transition", web::post().to(rental::transition_rental))
                    .route("/{id}/actions/{action}", web::post().to(rental::rental_action))
                    .route("/{id}/check-overdue", web::post().to(rental::check_overdue))
                    .route("/{id}/next-states", web::get().to(rental::next_states))
                    .route("/{id}/history", web::get().to(rental::rental_history))
                    .route("/{id}/start-date", web::put().to(rental::update_start_date))
                    .route("/{id}/payment-summary", web::get().to(rental::payment_summary))
                    .route("/{id}/invoice", web::post().to(invoice::create_from_rental))
                    .service(
                        web::resource("/{id}/extensions")
                            .route(web::get().to(rental_extension::list_extensions))
                            .route(web::post().to(rental_extension::request_extension)),
                    )
                    .route(
                        "/{id}/extensions/{extension_id}/approve",
                        web::put().to(rental_extension::approve_extension),
                    )
                    .route(
                        "/{id}/extensions/{extension_id}/reject",
                        web::put().to(rental_extension::reject_extension),
                    ),
            )
            .service(
                web::scope("/invoices")
                    .route("", web::get().to(invoice::list_invoices))
                    .route("/{id}", web::get().to(invoice::get_invoice))
                    .route("/{id}/send", web::put().to(invoice::send_invoice))
                    .route("/{id}/cancel", web::put().to(invoice::cancel_invoice))
                    .service(
                        web::resource("/{id}/payments")
                            .route(web::get().to(invoice::list_payments))
                            .route(web::post().to(invoice::record_payment)),
                    ),
            )
            .service(
                web::scope("/timesheets")
                    .service(
                        web::resource("")
                            .route(web::post().to(timesheet::create_timesheet))
                            .route(web::get().to(timesheet::list_timesheets)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(timesheet::get_timesheet))
                            .route(web::put().to(timesheet::update_timesheet))
                            .route(web::delete().to(timesheet::delete_timesheet)),
                    )
                    .route("/{id}/submit", web::post().to(timesheet::submit_timesheet))
                    .route("/{id}/approve", web::post().to(timesheet::approve_timesheet))
                    .route("/{id}/reject", web::post().to(timesheet::reject_timesheet)),
            ),
    );
}

// LOGIN
//  ├─ access_token (15 min)
//  └─ refresh_token (7 days)

// API REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /refresh with refresh_token
//       └─ returns new access_token

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_build_from_config() {
        assert!(RateLimits::from_config(&Config::for_tests()).is_ok());
        assert!(limiter_config(0).is_ok());
        assert!(limiter_config(120_000).is_ok());
    }
}
