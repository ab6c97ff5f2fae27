use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;

/// Service metadata and runtime profile.
///
/// ## Endpoint: `GET {prefix}/info`
///
/// Values come from the live configuration, so in development a reloaded
/// config file shows up here without a restart.
pub async fn service_info(state: web::Data<AppState>) -> HttpResponse {
    let config = state.get_config();
    let environment = state.environment();

    HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "app": {
            "name": config.app.name,
            "description": config.app.description,
            "version": config.app.version,
            "api_prefix": config.app.api_prefix,
            "debug": config.app.debug
        },
        "runtime": {
            "environment": environment.as_str(),
            "workers": environment.workers(),
            "reload": environment.reload_enabled(),
            "uptime_seconds": state.get_uptime_seconds(),
            "upload_dir": state.storage().root().display().to_string(),
            "build_version": env!("CARGO_PKG_VERSION")
        }
    }))
}
