//! # Health Endpoints
//!
//! - `GET /` - welcome message
//! - `GET /health` - liveness; always `healthy`, never touches dependencies
//! - `GET {prefix}/health` - readiness; probes the cache and the upload volume
//! - `GET {prefix}/metrics` - request counters from the metrics middleware

use crate::error::AppResult;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error};

pub async fn welcome(state: web::Data<AppState>) -> HttpResponse {
    debug!("Root endpoint accessed");
    let name = state.get_config().app.name;
    HttpResponse::Ok().json(json!({
        "message": format!("Welcome to {} API", name)
    }))
}

pub async fn liveness() -> HttpResponse {
    debug!("Health check endpoint accessed");
    HttpResponse::Ok().json(json!({ "status": "healthy" }))
}

/// Outcome of probing one backing service.
#[derive(Debug, Serialize)]
pub struct ServiceCheck {
    pub status: &'static str,
    pub message: String,
}

impl ServiceCheck {
    fn from_probe(name: &str, result: AppResult<()>, ok_message: &str) -> Self {
        match result {
            Ok(()) => Self {
                status: "healthy",
                message: ok_message.to_string(),
            },
            Err(e) => {
                error!(service = name, error = %e, "Health probe failed");
                Self {
                    status: "unhealthy",
                    message: e.to_string(),
                }
            }
        }
    }

    fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// Probe every backing service; 200 if all are healthy, 503 otherwise.
///
/// ## Response:
/// ```json
/// {
///   "status": "healthy",
///   "timestamp": "2025-01-01T12:00:00Z",
///   "services": {
///     "redis": { "status": "healthy", "message": "Connected" },
///     "storage": { "status": "healthy", "message": "Accessible" }
///   }
/// }
/// ```
pub async fn readiness(state: web::Data<AppState>) -> HttpResponse {
    let (cache_result, storage_result) =
        tokio::join!(state.cache().ping(), state.storage().probe());

    let redis = ServiceCheck::from_probe("redis", cache_result, "Connected");
    let storage = ServiceCheck::from_probe("storage", storage_result, "Accessible");
    let healthy = redis.is_healthy() && storage.is_healthy();

    let body = json!({
        "status": if healthy { "healthy" } else { "unhealthy" },
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": state.get_uptime_seconds(),
        "services": {
            "redis": redis,
            "storage": storage
        }
    });

    if healthy {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}

pub async fn detailed_metrics(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let uptime_seconds = state.get_uptime_seconds();

    let mut endpoints: Vec<_> = metrics.endpoint_metrics.iter().collect();
    endpoints.sort_by(|a, b| a.0.cmp(b.0));
    let endpoint_stats: Vec<_> = endpoints
        .into_iter()
        .map(|(endpoint, metric)| {
            json!({
                "endpoint": endpoint,
                "request_count": metric.request_count,
                "error_count": metric.error_count,
                "error_rate": metric.error_rate(),
                "average_duration_ms": metric.average_duration_ms()
            })
        })
        .collect();

    HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds,
        "overall": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "error_rate": metrics.error_rate(),
            "requests_per_second": if uptime_seconds > 0 {
                metrics.request_count as f64 / uptime_seconds as f64
            } else {
                0.0
            }
        },
        "endpoints": endpoint_stats
    }))
}
