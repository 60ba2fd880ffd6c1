use crate::config::{KB, SimConfig};
use crate::error::SimError;

#[test]
fn empty_object_gives_defaults() {
    let cfg = SimConfig::from_json_str("{}").expect("parse");
    assert_eq!(cfg, SimConfig::default());
}

#[test]
fn partial_sections_keep_remaining_defaults() {
    let raw = r#"{
        "seed": 42,
        "striping": { "stripe_count": 2 },
        "storage": { "max_queue_len": 4 },
        "workload": { "ops_per_node": 3, "checkpoint_every": 2 }
    }"#;
    let cfg = SimConfig::from_json_str(raw).expect("parse");
    let defaults = SimConfig::default();

    assert_eq!(cfg.seed, 42);
    assert_eq!(cfg.striping.stripe_count, 2);
    assert_eq!(cfg.striping.stripe_size, 64 * KB);
    assert_eq!(cfg.storage.max_queue_len, 4);
    assert_eq!(cfg.storage.parallelism, defaults.storage.parallelism);
    assert_eq!(cfg.workload.ops_per_node, 3);
    assert_eq!(cfg.workload.checkpoint_every, 2);
    assert_eq!(cfg.workload.data_bytes, defaults.workload.data_bytes);
    assert_eq!(cfg.buffers, defaults.buffers);
    assert_eq!(cfg.routing, defaults.routing);
}

#[test]
fn buffer_class_overrides_replace_the_whole_class() {
    let raw = r#"{
        "buffers": { "switch": { "capacity_bytes": 1024, "read_gbps": 10.0, "write_gbps": 5.0 } }
    }"#;
    let cfg = SimConfig::from_json_str(raw).expect("parse");
    assert_eq!(cfg.buffers.switch.capacity_bytes, 1024);
    assert_eq!(cfg.buffers.switch.write_gbps, 5.0);
    assert_eq!(cfg.buffers.dram, SimConfig::default().buffers.dram);
}

#[test]
fn malformed_json_is_rejected() {
    let err = SimConfig::from_json_str("{ \"seed\": ").expect_err("parse error");
    assert!(matches!(err, SimError::InvalidConfig(_)));

    let err = SimConfig::from_json_str(r#"{ "seed": "one" }"#).expect_err("type error");
    assert!(matches!(err, SimError::InvalidConfig(_)));
}

#[test]
fn validation_rejects_degenerate_parameters() {
    let cases = [
        r#"{ "storage": { "parallelism": 0 } }"#,
        r#"{ "storage": { "max_queue_len": 0 } }"#,
        r#"{ "storage": { "read_gbps": 0.0 } }"#,
        r#"{ "striping": { "mtu": 0 } }"#,
        r#"{ "switches": { "core": { "latency_ns": 1, "parallelism": 0 } } }"#,
        r#"{ "routing": { "min_hops": 9, "max_hops": 5 } }"#,
        r#"{ "workload": { "read_probability": 1.5 } }"#,
        r#"{ "workload": { "ops_per_node": 1, "data_bytes": 0 } }"#,
        r#"{ "buffers": { "flash": { "capacity_bytes": 0, "read_gbps": 1.0, "write_gbps": 1.0 } } }"#,
    ];
    for raw in cases {
        let err = SimConfig::from_json_str(raw).expect_err(raw);
        assert!(err.is_configuration(), "{raw}: {err}");
        assert!(matches!(err, SimError::InvalidConfig(_)), "{raw}: {err}");
    }
}

#[test]
fn idle_workload_may_leave_data_bytes_at_zero() {
    let cfg = SimConfig::from_json_str(r#"{ "workload": { "ops_per_node": 0, "data_bytes": 0 } }"#)
        .expect("idle workload");
    assert_eq!(cfg.workload.data_bytes, 0);
}

#[test]
fn config_round_trips_through_serde() {
    let mut cfg = SimConfig::default();
    cfg.workload.read_probability = 0.25;
    let raw = serde_json::to_string(&cfg).expect("serialize");
    assert_eq!(SimConfig::from_json_str(&raw).expect("parse"), cfg);
}
