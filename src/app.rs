//! Route table shared by the server and the tests.
//!
//! `/` and `/health` are mounted at the root; everything else lives under
//! the configured API prefix.

use crate::error::{AppError, AppResult};
use crate::{handlers, health};
use actix_web::{web, HttpRequest, HttpResponse};

pub fn configure(cfg: &mut web::ServiceConfig, api_prefix: &str, json_limit: usize) {
    cfg.app_data(json_config(json_limit))
        .route("/", web::get().to(health::welcome))
        .route("/health", web::get().to(health::liveness))
        .service(
            web::scope(api_prefix)
                .route("/health", web::get().to(health::readiness))
                .route("/metrics", web::get().to(health::detailed_metrics))
                .route("/info", web::get().to(handlers::service_info))
                .service(
                    web::resource("/message")
                        .route(web::post().to(handlers::create_message))
                        .default_service(web::to(method_not_allowed)),
                ),
        )
        .default_service(web::to(not_found));
}

async fn not_found(req: HttpRequest) -> AppResult<HttpResponse> {
    Err(AppError::NotFound(format!(
        "No route for {} {}",
        req.method(),
        req.path()
    )))
}

async fn method_not_allowed(req: HttpRequest) -> AppResult<HttpResponse> {
    Err(AppError::MethodNotAllowed(format!(
        "{} is not allowed on {}",
        req.method(),
        req.path()
    )))
}

/// JSON extractor settings: body size limit and [`AppError`] rendering.
fn json_config(limit: usize) -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(limit)
        .error_handler(|err, _req| AppError::from(err).into())
}
