use std::sync::Mutex;

use serde_json::json;
use subnetmap_core::constants::{METRIC_DECLINED, METRIC_DECODES, METRIC_DECODE_FAILURES, METRIC_ENTRIES};
use subnetmap_core::telemetry::register_stats_callback;
use subnetmap_core::{init_logging, SubnetMap};

static SEEN: Mutex<Vec<(String, u64)>> = Mutex::new(Vec::new());

fn collect(name: &str, value: u64) {
    SEEN.lock().unwrap().push((name.to_string(), value));
}

fn seen(name: &str) -> Vec<u64> {
    SEEN.lock()
        .unwrap()
        .iter()
        .filter(|(n, _)| n == name)
        .map(|(_, v)| *v)
        .collect()
}

#[test]
fn decode_outcomes_reach_the_callback() {
    assert!(register_stats_callback(collect));
    assert!(!register_stats_callback(collect));

    SubnetMap::<String>::from_value(json!({"10.0.0.0/8": "a", "2001:db8::/32": "b"})).unwrap();
    SubnetMap::<String>::from_value(json!({"10.0.0.0/33": "a"})).unwrap_err();
    SubnetMap::<String>::from_value(json!([1])).unwrap_err();

    assert_eq!(seen(METRIC_DECODES), [1]);
    assert_eq!(seen(METRIC_ENTRIES), [2]);
    assert_eq!(seen(METRIC_DECODE_FAILURES), [1]);
    assert_eq!(seen(METRIC_DECLINED), [1]);

    let g = metrics::gauge!("test_relative_gauge");
    g.increment(3.0);
    g.decrement(3.0);
    assert!(seen("test_relative_gauge").is_empty());
    g.set(7.0);
    assert_eq!(seen("test_relative_gauge"), [7]);
}

#[test]
fn init_logging_only_installs_once() {
    assert!(init_logging());
    assert!(init_logging());
    assert!(env_logger::builder().is_test(true).try_init().is_err());
}
