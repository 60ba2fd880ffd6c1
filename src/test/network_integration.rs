use super::{id, minimal_layout, request_between, world_for};
use crate::config::{KB, MB, SimConfig};
use crate::error::SimError;
use crate::net::{NetWorld, Request, RequestKind, Signal, SimContext, SinkReport};
use crate::sim::{SimTime, Simulator};
use crate::topo::fat_tree::{FatTreeOpts, build_fat_tree};
use crate::topo::layout::TopologyLayout;
use crate::workload::schedule_workload;

fn run_one(world: &mut NetWorld, req: Request) -> Simulator {
    let mut sim = Simulator::default();
    let source = req.source;
    world.net.deliver(source, req, &mut sim).expect("inject");
    sim.run(world).expect("run");
    sim
}

fn stay_count(world: &NetWorld, node: &str, stage: &'static str) -> u64 {
    world
        .net
        .stats
        .summary(node, stage, Signal::StayTime)
        .map_or(0, |s| s.count)
}

#[test]
fn write_is_segmented_striped_and_acknowledged() {
    let mut world = world_for(minimal_layout(1), SimConfig::default());
    let (cn, oss) = (id(&world, "cn0"), id(&world, "oss0"));
    let req = request_between(&mut world, cn, oss, RequestKind::Write, 256 * KB);
    let master = req.master_id;

    let sim = run_one(&mut world, req);

    assert!(world.net.sink.contains(cn, master));
    let report = world.net.sink.report();
    assert_eq!(report.completed, 1);
    assert_eq!(report.writes, 1);
    assert_eq!(report.write_bytes, 256 * KB);
    assert!(report.mean_latency_us > 0.0);
    assert!(sim.now() > SimTime::ZERO);

    // 5 个 MTU 分段去程，4 个条带，一个确认回程
    assert_eq!(stay_count(&world, "cn0", "nic_tx"), 5);
    assert_eq!(stay_count(&world, "oss0", "nic_rx"), 5);
    assert_eq!(stay_count(&world, "oss0", "hba_tx"), 4);
    assert_eq!(stay_count(&world, "ost0", "disk"), 4);
    assert_eq!(stay_count(&world, "oss0", "hba_rx"), 4);
    assert_eq!(stay_count(&world, "oss0", "nic_tx"), 1);
    assert_eq!(stay_count(&world, "cn0", "nic_rx"), 1);
    assert_eq!(stay_count(&world, "e0", "service"), 6);
    assert_eq!(stay_count(&world, "c0", "switch_buffer"), 6);
}

#[test]
fn read_returns_data_in_mtu_segments() {
    let mut world = world_for(minimal_layout(1), SimConfig::default());
    let (cn, oss) = (id(&world, "cn0"), id(&world, "oss0"));
    let req = request_between(&mut world, cn, oss, RequestKind::Read, 256 * KB);

    run_one(&mut world, req);

    let report = world.net.sink.report();
    assert_eq!((report.completed, report.reads), (1, 1));
    assert_eq!(report.read_bytes, 256 * KB);
    assert_eq!(stay_count(&world, "cn0", "nic_tx"), 1);
    assert_eq!(stay_count(&world, "oss0", "nic_rx"), 1);
    assert_eq!(stay_count(&world, "ost0", "disk"), 4);
    assert_eq!(stay_count(&world, "oss0", "nic_tx"), 5);
    assert_eq!(stay_count(&world, "cn0", "nic_rx"), 5);
    assert_eq!(stay_count(&world, "e0", "service"), 6);
}

#[test]
fn stripes_rotate_across_targets() {
    let mut world = world_for(minimal_layout(3), SimConfig::default());
    let (cn, oss) = (id(&world, "cn0"), id(&world, "oss0"));
    let mut req = request_between(&mut world, cn, oss, RequestKind::Write, 256 * KB);
    req.target_storage_index = 1;

    run_one(&mut world, req);

    assert_eq!(world.net.sink.completed(), 1);
    assert_eq!(stay_count(&world, "ost0", "disk"), 1);
    assert_eq!(stay_count(&world, "ost1", "disk"), 2);
    assert_eq!(stay_count(&world, "ost2", "disk"), 1);
}

#[test]
fn storage_requests_consult_metadata_on_the_way_out() {
    let (graph, _) = build_fat_tree(&FatTreeOpts::default()).expect("fat tree");
    let mut world = world_for(graph, SimConfig::default());
    let (cn, oss) = (id(&world, "cn0_0_0"), id(&world, "oss0_0_0"));
    let req = request_between(&mut world, cn, oss, RequestKind::Write, 128 * KB);

    run_one(&mut world, req);

    assert_eq!(world.net.sink.completed(), 1);
    // 3 个去程分段各查一次元数据，确认直接返回
    assert_eq!(stay_count(&world, "mds0_0", "lookup"), 3);
    let wait = world
        .net
        .stats
        .summary("mds0_0", "lookup", Signal::WaitingTime)
        .expect("lookup waits");
    assert_eq!(wait.max, 0);

    // 去程分段经 core 直达元数据服务，不进服务队列；查询后的 3 段与确认才排队
    assert_eq!(stay_count(&world, "c0_0", "switch_buffer"), 7);
    assert_eq!(stay_count(&world, "c0_0", "service"), 4);
}

#[test]
fn checkpoint_leg_is_acknowledged_by_the_peer() {
    let (graph, _) = build_fat_tree(&FatTreeOpts::default()).expect("fat tree");
    let mut world = world_for(graph, SimConfig::default());
    let (src, dst) = (id(&world, "cn0_0_0"), id(&world, "cn3_1_1"));
    let mut leg = request_between(&mut world, src, dst, RequestKind::Write, 256 * KB);
    leg.is_checkpoint_leg = true;
    let master = leg.master_id;

    run_one(&mut world, leg);

    assert!(world.net.sink.contains(src, master));
    assert_eq!(world.net.sink.report().write_bytes, 256 * KB);
    assert_eq!(stay_count(&world, "cn3_1_1", "nic_rx"), 5);
    assert_eq!(stay_count(&world, "cn3_1_1", "nic_tx"), 1);
    assert_eq!(stay_count(&world, "cn0_0_0", "nic_rx"), 1);
}

#[test]
fn disk_queue_never_exceeds_its_limit() {
    let mut cfg = SimConfig::default();
    cfg.storage.parallelism = 1;
    cfg.storage.max_queue_len = 1;
    let mut world = world_for(minimal_layout(1), cfg);
    let (cn, oss) = (id(&world, "cn0"), id(&world, "oss0"));
    let req = request_between(&mut world, cn, oss, RequestKind::Write, MB);

    run_one(&mut world, req);

    assert_eq!(world.net.sink.completed(), 1);
    let disk = world
        .net
        .stats
        .summary("ost0", "disk", Signal::QueueLength)
        .expect("disk signal");
    assert_eq!(disk.count, 16);
    assert_eq!(disk.max, 1);
    let flash = world
        .net
        .stats
        .summary("ost0", "flash", Signal::QueueLength)
        .expect("flash signal");
    assert!(flash.max > 1, "stripes must wait in flash");
}

#[test]
fn tight_switch_buffers_still_drain() {
    let mut cfg = SimConfig::default();
    cfg.buffers.switch.capacity_bytes = 70_000;
    cfg.buffers.switch.write_gbps = 10.0;
    let mut world = world_for(minimal_layout(1), cfg);
    let (cn, oss) = (id(&world, "cn0"), id(&world, "oss0"));
    let req = request_between(&mut world, cn, oss, RequestKind::Write, 512 * KB);

    run_one(&mut world, req);

    assert_eq!(world.net.sink.completed(), 1);
    let waits = world
        .net
        .stats
        .summary("e0", "switch_buffer", Signal::WaitingTime)
        .expect("edge buffer");
    assert!(waits.max > 0, "fragments must have queued at the edge");
}

#[test]
fn fragment_larger_than_a_buffer_is_fatal() {
    let mut cfg = SimConfig::default();
    cfg.buffers.switch.capacity_bytes = 1_000;
    let mut world = world_for(minimal_layout(1), cfg);
    let (cn, oss) = (id(&world, "cn0"), id(&world, "oss0"));
    let req = request_between(&mut world, cn, oss, RequestKind::Write, 256 * KB);

    let mut sim = Simulator::default();
    world.net.deliver(cn, req, &mut sim).expect("inject");
    let err = sim.run(&mut world).expect_err("must abort");
    assert!(matches!(err, SimError::Invariant { ref node, .. } if node == "e0"));
    assert_eq!(world.net.sink.completed(), 0);
}

#[test]
fn memory_buffer_hop_relays_both_ways() {
    let raw = r#"{
        "nodes": [
            { "name": "cn0", "kind": "compute_node" }, { "name": "l0", "kind": "link" },
            { "name": "e0", "kind": "edge_switch" }, { "name": "l1", "kind": "link" },
            { "name": "a0", "kind": "aggregation_switch" }, { "name": "l2", "kind": "link" },
            { "name": "c0", "kind": "core_switch" }, { "name": "l3", "kind": "link" },
            { "name": "oss0", "kind": "storage_server" },
            { "name": "m0", "kind": "memory_buffer" },
            { "name": "ost9", "kind": "storage_target" }
        ],
        "edges": [
            { "a": "cn0", "b": "l0", "latency_ns": 1000, "gbps": 100 }, { "a": "l0", "b": "e0" },
            { "a": "e0", "b": "l1", "latency_ns": 1000, "gbps": 100 }, { "a": "l1", "b": "a0" },
            { "a": "a0", "b": "l2", "latency_ns": 1000, "gbps": 100 }, { "a": "l2", "b": "c0" },
            { "a": "c0", "b": "l3", "latency_ns": 1000, "gbps": 100 }, { "a": "l3", "b": "oss0" },
            { "a": "oss0", "b": "m0", "latency_ns": 200, "gbps": 100 },
            { "a": "m0", "b": "ost9", "latency_ns": 200, "gbps": 100 }
        ]
    }"#;
    let graph = TopologyLayout::from_json_str(raw)
        .expect("parse")
        .build()
        .expect("build");
    let mut world = world_for(graph, SimConfig::default());
    let (cn, oss, m0, ost) = (
        id(&world, "cn0"),
        id(&world, "oss0"),
        id(&world, "m0"),
        id(&world, "ost9"),
    );

    let mut req = Request::new(1, 1, RequestKind::Write, 64 * KB, cn, oss, SimTime::ZERO)
        .with_paths(&[ost], &[]);
    req.last_hop = Some(oss);
    let mut sim = Simulator::default();
    world.net.deliver(m0, req, &mut sim).expect("inject");
    sim.run(&mut world).expect("run");

    assert_eq!(stay_count(&world, "m0", "memory"), 2);
    assert_eq!(stay_count(&world, "ost9", "disk"), 1);
    assert!(world.net.sink.contains(cn, 1));
}

#[test]
fn disconnected_storage_server_is_a_configuration_error() {
    let raw = r#"{
        "nodes": [
            { "name": "cn0", "kind": "compute_node" }, { "name": "l0", "kind": "link" },
            { "name": "e0", "kind": "edge_switch" },
            { "name": "oss0", "kind": "storage_server" }
        ],
        "edges": [ { "a": "cn0", "b": "l0" }, { "a": "l0", "b": "e0" } ]
    }"#;
    let graph = TopologyLayout::from_json_str(raw)
        .expect("parse")
        .build()
        .expect("build");
    let err = SimContext::build(graph, SimConfig::default()).expect_err("no route");
    assert!(matches!(err, SimError::NoRoute { .. }));
    assert!(err.is_configuration());
}

fn workload_config(ops: u64, checkpoint_every: u64) -> SimConfig {
    let mut cfg = SimConfig::default();
    cfg.workload.ops_per_node = ops;
    cfg.workload.checkpoint_every = checkpoint_every;
    cfg.workload.data_bytes = 128 * KB;
    cfg.workload.interval_us = 20;
    cfg
}

fn run_workload(k: usize, cfg: SimConfig) -> (NetWorld, Simulator) {
    let (graph, _) = build_fat_tree(&FatTreeOpts {
        k,
        ..FatTreeOpts::default()
    })
    .expect("fat tree");
    let mut world = world_for(graph, cfg);
    let mut sim = Simulator::default();
    schedule_workload(&mut sim, &world);
    sim.run(&mut world).expect("run");
    (world, sim)
}

#[test]
fn k2_workload_completes_every_operation() {
    let (world, _) = run_workload(2, workload_config(3, 0));
    let report = world.net.sink.report();
    assert_eq!(report.completed, 2 * 3);
    assert_eq!(report.read_bytes + report.write_bytes, 6 * 128 * KB);
    assert!(report.throughput_mbps > 0.0);
}

#[test]
fn k4_workload_with_checkpoints_completes() {
    let (world, _) = run_workload(4, workload_config(4, 2));
    let report = world.net.sink.report();
    assert_eq!(report.completed, 16 * 4);
    // 每个 checkpoint 写给 2 个对端
    assert!(report.write_bytes >= 16 * 2 * 2 * 128 * KB);
    assert!(world.net.stats.stage_total("lookup", Signal::StayTime).count > 0);
}

#[test]
fn same_seed_gives_the_same_run() {
    let run = || -> (SinkReport, SimTime, u64) {
        let (world, sim) = run_workload(2, workload_config(4, 3));
        (world.net.sink.report(), sim.now(), sim.executed())
    };
    assert_eq!(run(), run());
}

#[test]
fn zero_operations_schedule_nothing() {
    let (graph, _) = build_fat_tree(&FatTreeOpts {
        k: 2,
        ..FatTreeOpts::default()
    })
    .expect("fat tree");
    let world = world_for(graph, workload_config(0, 0));
    let mut sim = Simulator::default();
    assert_eq!(schedule_workload(&mut sim, &world), 0);
    assert_eq!(sim.pending(), 0);
}

#[test]
fn run_until_stops_before_completion() {
    let (graph, _) = build_fat_tree(&FatTreeOpts {
        k: 2,
        ..FatTreeOpts::default()
    })
    .expect("fat tree");
    let mut world = world_for(graph, workload_config(2, 0));
    let mut sim = Simulator::default();
    schedule_workload(&mut sim, &world);
    sim.run_until(SimTime::from_micros(1), &mut world)
        .expect("run");
    assert_eq!(world.net.sink.completed(), 0);
    assert!(sim.pending() > 0);
    assert_eq!(sim.now(), SimTime::from_micros(1));
}

#[test]
fn zero_byte_workload_is_refused_before_the_run() {
    let (graph, _) = build_fat_tree(&FatTreeOpts {
        k: 2,
        ..FatTreeOpts::default()
    })
    .expect("fat tree");
    let mut cfg = workload_config(1, 0);
    cfg.workload.data_bytes = 0;
    let err = SimContext::build(graph, cfg).expect_err("zero-byte transfers");
    assert!(matches!(err, SimError::InvalidConfig(_)), "{err}");
}
