pub mod logging;
pub mod metrics;

pub use logging::{RequestLogging, RequestSpan};
pub use metrics::MetricsMiddleware;
