//! Geocoding call accounting
//!
//! Exported for scraping in the OpenMetrics text format at `GET /metrics`.

use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::registry::Registry;

/// Registered name; the encoder appends `_total` for counters
pub const GEOCODING_CALLS_METRIC: &str = "w3w_api_calls";
const GEOCODING_CALLS_HELP: &str = "total number of calls to the What 3 Words API";

/// Content type of [`GeocodingCallCounter::render`] output
pub const EXPOSITION_CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

/// Receives one `increment` per outbound geocoding request
pub trait MetricsSink: Send + Sync {
    fn increment(&self);
}

/// Process-wide monotonic counter, never reset
#[derive(Debug)]
pub struct GeocodingCallCounter {
    registry: Registry,
    calls: Counter,
}

impl GeocodingCallCounter {
    pub fn new() -> Self {
        let mut registry = Registry::default();
        let calls = Counter::default();
        registry.register(GEOCODING_CALLS_METRIC, GEOCODING_CALLS_HELP, calls.clone());
        Self { registry, calls }
    }

    pub fn value(&self) -> u64 {
        self.calls.get()
    }

    /// Encode the registry in the OpenMetrics text format
    pub fn render(&self) -> Result<String, std::fmt::Error> {
        let mut out = String::new();
        encode(&mut out, &self.registry)?;
        Ok(out)
    }
}

impl Default for GeocodingCallCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSink for GeocodingCallCounter {
    fn increment(&self) {
        self.calls.inc();
    }
}
