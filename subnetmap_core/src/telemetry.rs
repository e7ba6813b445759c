//! Minimal run‑time metrics sink.
//!
//! Prometheus export is intentionally left out; instead the host process may
//! register a callback that receives name/value pairs.

use metrics::{
    Counter, Gauge, Histogram, Key, KeyName, Recorder, SharedString, Unit,
};
use once_cell::sync::OnceCell;
use std::sync::Arc;

/// Signature for external collectors.
pub type StatsCallback = fn(name: &str, value: u64);

static CALLBACK: OnceCell<StatsCallback> = OnceCell::new();

/// Register the collector. Only the first registration sticks; returns
/// `false` if one was already in place.
pub fn register_stats_callback(cb: StatsCallback) -> bool {
    init();
    CALLBACK.set(cb).is_ok()
}

fn forward(key: &Key, value: u64) {
    if let Some(cb) = CALLBACK.get() {
        cb(key.name(), value);
    }
}

/// Forwarding recorder. Uses the callback **if** it was registered.
struct CallbackRecorder;

#[derive(Clone)]
struct CallbackMetric {
    key: Key,
}

impl Recorder for CallbackRecorder {
    fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn register_counter(&self, key: &Key, _metadata: &metrics::Metadata<'_>) -> Counter {
        Counter::from_arc(Arc::new(CallbackMetric { key: key.clone() }))
    }
    fn register_gauge(&self, key: &Key, _metadata: &metrics::Metadata<'_>) -> Gauge {
        Gauge::from_arc(Arc::new(CallbackMetric { key: key.clone() }))
    }
    fn register_histogram(&self, key: &Key, _metadata: &metrics::Metadata<'_>) -> Histogram {
        Histogram::from_arc(Arc::new(CallbackMetric { key: key.clone() }))
    }
}

impl metrics::CounterFn for CallbackMetric {
    fn increment(&self, value: u64) {
        forward(&self.key, value);
    }
    fn absolute(&self, value: u64) {
        forward(&self.key, value);
    }
}

// Gauges and histograms are truncated to whole numbers. Only absolute gauge
// values are forwarded: the callback has no way to carry a sign.
impl metrics::GaugeFn for CallbackMetric {
    fn set(&self, value: f64) {
        forward(&self.key, value as u64);
    }
    fn increment(&self, _value: f64) {}
    fn decrement(&self, _value: f64) {}
}

impl metrics::HistogramFn for CallbackMetric {
    fn record(&self, value: f64) {
        forward(&self.key, value as u64);
    }
}

/// Install the recorder exactly **once**. Does nothing if the host already
/// installed its own. Only [`register_stats_callback`] calls it, decoding
/// leaves the global recorder alone.
pub fn init() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = metrics::set_global_recorder(CallbackRecorder);
    });
}
