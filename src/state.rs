//! # Application State Management
//!
//! [`AppState`] is cloned into every actix worker. Each clone points at the
//! same data:
//! - `config`: behind a read-write lock so the development reloader can swap it
//! - `metrics`: request counters updated by the metrics middleware
//! - `cache` / `storage`: handles to the backing services probed by readiness
//!
//! Locks are `parking_lot` locks and are never held across an `.await`.

use crate::cache::CacheClient;
use crate::cli::Environment;
use crate::config::AppConfig;
use crate::storage::UploadStorage;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct AppState {
    config: Arc<RwLock<AppConfig>>,
    metrics: Arc<Mutex<AppMetrics>>,
    environment: Environment,
    cache: CacheClient,
    storage: UploadStorage,
    start_time: Instant,
}

/// Request metrics collected by the metrics middleware.
#[derive(Debug, Default, Clone)]
pub struct AppMetrics {
    pub request_count: u64,
    pub error_count: u64,
    /// Keyed by `"<METHOD> <route pattern>"`, e.g. `"POST /api/v1/message"`
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    pub request_count: u64,
    pub total_duration_ms: u64,
    pub error_count: u64,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        environment: Environment,
        cache: CacheClient,
        storage: UploadStorage,
    ) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            metrics: Arc::new(Mutex::new(AppMetrics::default())),
            environment,
            cache,
            storage,
            start_time: Instant::now(),
        }
    }

    /// A copy of the current configuration; the lock is released on return.
    pub fn get_config(&self) -> AppConfig {
        self.config.read().clone()
    }

    /// Swap in a new configuration if it validates. The old one stays otherwise.
    pub fn replace_config(&self, new_config: AppConfig) -> anyhow::Result<()> {
        new_config.validate()?;
        *self.config.write() = new_config;
        Ok(())
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn cache(&self) -> &CacheClient {
        &self.cache
    }

    pub fn storage(&self) -> &UploadStorage {
        &self.storage
    }

    /// Record one finished request against its endpoint.
    pub fn record_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.metrics.lock();
        metrics.request_count += 1;
        if is_error {
            metrics.error_count += 1;
        }

        let endpoint_metric = metrics.endpoint_metrics.entry(endpoint.to_string()).or_default();
        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;
        if is_error {
            endpoint_metric.error_count += 1;
        }
    }

    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        self.metrics.lock().clone()
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl AppMetrics {
    pub fn error_rate(&self) -> f64 {
        ratio(self.error_count, self.request_count)
    }
}

impl EndpointMetric {
    pub fn average_duration_ms(&self) -> f64 {
        ratio(self.total_duration_ms, self.request_count)
    }

    pub fn error_rate(&self) -> f64 {
        ratio(self.error_count, self.request_count)
    }
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator > 0 {
        numerator as f64 / denominator as f64
    } else {
        0.0
    }
}

/// State wired to a fresh temp upload directory and an unreachable cache.
#[cfg(test)]
pub(crate) async fn test_state(upload_dir: &std::path::Path) -> AppState {
    let mut config = AppConfig::default();
    config.redis.url = "redis://127.0.0.1:1/0".to_string();
    config.storage.upload_dir = upload_dir.to_path_buf();

    let cache = CacheClient::new(&config.redis).unwrap();
    let storage = UploadStorage::prepare(upload_dir).await.unwrap();
    AppState::new(config, Environment::Production, cache, storage)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_record_request() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path()).await;

        state.record_request("GET /health", 4, false);
        state.record_request("GET /health", 6, false);
        state.record_request("POST /api/v1/message", 2, true);

        let metrics = state.get_metrics_snapshot();
        assert_eq!(metrics.request_count, 3);
        assert_eq!(metrics.error_count, 1);

        let health = &metrics.endpoint_metrics["GET /health"];
        assert_eq!(health.request_count, 2);
        assert_eq!(health.average_duration_ms(), 5.0);
        assert_eq!(health.error_rate(), 0.0);
        assert_eq!(metrics.endpoint_metrics["POST /api/v1/message"].error_rate(), 1.0);
    }

    #[tokio::test]
    async fn test_replace_config_rejects_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path()).await;

        let mut bad = state.get_config();
        bad.server.port = 0;
        assert!(state.replace_config(bad).is_err());
        assert_eq!(state.get_config().server.port, 8000);

        let mut good = state.get_config();
        good.app.name = "Renamed".to_string();
        assert!(state.replace_config(good).is_ok());
        assert_eq!(state.get_config().app.name, "Renamed");
    }

    #[test]
    fn test_empty_metrics_rates() {
        assert_eq!(AppMetrics::default().error_rate(), 0.0);
        assert_eq!(EndpointMetric::default().average_duration_ms(), 0.0);
    }
}
