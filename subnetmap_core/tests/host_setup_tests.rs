//! Runs as its own binary: it claims the process-wide logger and recorder.

use serde_json::json;
use subnetmap_core::{decode_hook, HookOutcome, SubnetMap};

#[test]
fn host_can_install_logger_and_recorder_after_decoding() {
    let map = SubnetMap::<String>::from_value(json!({"10.0.0.0/8": "a"})).unwrap();
    assert_eq!(map.len(), 1);
    let _: SubnetMap<String> = serde_json::from_str(r#"{"::/0": "b"}"#).unwrap();
    assert!(matches!(decode_hook::<String>(json!(null)), HookOutcome::Handled(_)));

    assert!(env_logger::builder().is_test(true).try_init().is_ok());
    assert!(metrics::set_global_recorder(metrics::NoopRecorder).is_ok());
}
