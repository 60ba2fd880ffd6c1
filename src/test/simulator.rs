use super::{id, minimal_layout, world_for};
use crate::config::SimConfig;
use crate::error::{SimError, SimResult};
use crate::net::{DeliverRequest, NodeId, NodeWake, Request, RequestKind, Token, Wake};
use crate::sim::{Event, SimTime, Simulator, World};
use std::any::Any;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct DummyWorld {
    ticks: usize,
}

impl World for DummyWorld {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn on_tick(&mut self, _sim: &mut Simulator) {
        self.ticks = self.ticks.saturating_add(1);
    }
}

struct Push {
    id: u32,
    log: Arc<Mutex<Vec<u32>>>,
}

impl Event for Push {
    fn execute(self: Box<Self>, _sim: &mut Simulator, _world: &mut dyn World) -> SimResult {
        let Push { id, log } = *self;
        log.lock().expect("log lock").push(id);
        Ok(())
    }
}

struct PushThenScheduleNow {
    id: u32,
    next_id: u32,
    log: Arc<Mutex<Vec<u32>>>,
}

impl Event for PushThenScheduleNow {
    fn execute(self: Box<Self>, sim: &mut Simulator, _world: &mut dyn World) -> SimResult {
        let PushThenScheduleNow { id, next_id, log } = *self;
        log.lock().expect("log lock").push(id);
        sim.schedule(sim.now(), Push { id: next_id, log });
        Ok(())
    }
}

fn orphan_wake(node: NodeId, token: u64) -> NodeWake {
    NodeWake {
        node,
        wake: Wake::Service {
            token: Token(token),
        },
    }
}

#[test]
fn network_events_run_by_time_then_submission_order() {
    let mut world = world_for(minimal_layout(1), SimConfig::default());
    let (e0, c0) = (id(&world, "e0"), id(&world, "c0"));

    // 同一时刻：先提交的先执行
    let mut sim = Simulator::default();
    sim.schedule(SimTime(10), orphan_wake(e0, 900));
    sim.schedule(SimTime(10), orphan_wake(c0, 901));
    let err = sim.run(&mut world).expect_err("orphan wake");
    assert_eq!(
        err,
        SimError::OrphanCompletion {
            node: "e0".to_string(),
            token: 900
        }
    );
    assert_eq!(sim.pending(), 1);

    // 时间优先于提交顺序
    let mut sim = Simulator::default();
    sim.schedule(SimTime(20), orphan_wake(e0, 900));
    sim.schedule(SimTime(10), orphan_wake(c0, 901));
    let err = sim.run(&mut world).expect_err("orphan wake");
    assert_eq!(
        err,
        SimError::OrphanCompletion {
            node: "c0".to_string(),
            token: 901
        }
    );
    assert_eq!(sim.now(), SimTime(10));
}

#[test]
fn network_events_reject_a_foreign_world() {
    let req = Request::new(
        1,
        1,
        RequestKind::Write,
        4096,
        NodeId(0),
        NodeId(1),
        SimTime::ZERO,
    );
    let mut sim = Simulator::default();
    sim.schedule(SimTime(3), DeliverRequest { to: NodeId(1), req });

    let mut world = DummyWorld::default();
    let err = sim.run(&mut world).expect_err("not a network world");
    assert!(matches!(err, SimError::InvalidConfig(_)), "{err}");
    assert_eq!(world.ticks, 0);
}

#[test]
fn event_scheduled_at_same_time_inside_event_runs_after_current_event() {
    let log = Arc::new(Mutex::new(Vec::new()));

    let mut sim = Simulator::default();
    sim.schedule(
        SimTime::ZERO,
        PushThenScheduleNow {
            id: 1,
            next_id: 2,
            log: Arc::clone(&log),
        },
    );

    let mut world = DummyWorld::default();
    sim.run(&mut world).expect("run");

    assert_eq!(&*log.lock().expect("log lock"), &[1, 2]);
    assert_eq!(world.ticks, 2);
    assert_eq!(sim.now(), SimTime::ZERO);
}

#[test]
fn run_until_skips_events_after_until_and_advances_time() {
    let log = Arc::new(Mutex::new(Vec::new()));

    let mut sim = Simulator::default();
    sim.schedule(
        SimTime::ZERO,
        Push {
            id: 1,
            log: Arc::clone(&log),
        },
    );
    sim.schedule(
        SimTime(10),
        Push {
            id: 2,
            log: Arc::clone(&log),
        },
    );

    let mut world = DummyWorld::default();
    sim.run_until(SimTime(5), &mut world).expect("run_until");

    assert_eq!(&*log.lock().expect("log lock"), &[1]);
    assert_eq!(world.ticks, 1);
    assert_eq!(sim.now(), SimTime(5));

    sim.run(&mut world).expect("run");
    assert_eq!(&*log.lock().expect("log lock"), &[1, 2]);
    assert_eq!(world.ticks, 2);
    assert_eq!(sim.now(), SimTime(10));
}

#[test]
fn run_until_executes_events_scheduled_exactly_at_until() {
    let log = Arc::new(Mutex::new(Vec::new()));

    let mut sim = Simulator::default();
    sim.schedule(
        SimTime(5),
        Push {
            id: 1,
            log: Arc::clone(&log),
        },
    );

    let mut world = DummyWorld::default();
    sim.run_until(SimTime(5), &mut world).expect("run_until");

    assert_eq!(&*log.lock().expect("log lock"), &[1]);
    assert_eq!(world.ticks, 1);
    assert_eq!(sim.now(), SimTime(5));
}

#[test]
fn run_until_advances_time_even_if_there_are_no_events() {
    let mut sim = Simulator::default();
    let mut world = DummyWorld::default();

    sim.run_until(SimTime(7), &mut world).expect("run_until");
    assert_eq!(sim.now(), SimTime(7));
    assert_eq!(world.ticks, 0);
}

struct Fail;

impl Event for Fail {
    fn execute(self: Box<Self>, _sim: &mut Simulator, _world: &mut dyn World) -> SimResult {
        Err(SimError::OrphanCompletion {
            node: "n0".to_string(),
            token: 7,
        })
    }
}

#[test]
fn fatal_event_error_stops_the_run_and_is_returned() {
    let log = Arc::new(Mutex::new(Vec::new()));

    let mut sim = Simulator::default();
    sim.schedule(SimTime(1), Fail);
    sim.schedule(
        SimTime(2),
        Push {
            id: 1,
            log: Arc::clone(&log),
        },
    );

    let mut world = DummyWorld::default();
    let err = sim.run(&mut world).expect_err("run must fail");
    assert_eq!(
        err,
        SimError::OrphanCompletion {
            node: "n0".to_string(),
            token: 7
        }
    );
    assert!(log.lock().expect("log lock").is_empty());
    assert_eq!(sim.now(), SimTime(1));
    assert_eq!(sim.pending(), 1);
    assert_eq!(world.ticks, 0);
}

struct ScheduleInPast {
    log: Arc<Mutex<Vec<u32>>>,
}

impl Event for ScheduleInPast {
    fn execute(self: Box<Self>, sim: &mut Simulator, _world: &mut dyn World) -> SimResult {
        sim.schedule(SimTime(1), Push { id: 9, log: self.log });
        Ok(())
    }
}

#[test]
fn events_scheduled_in_the_past_are_clamped_to_now() {
    let log = Arc::new(Mutex::new(Vec::new()));

    let mut sim = Simulator::default();
    sim.schedule(
        SimTime(10),
        ScheduleInPast {
            log: Arc::clone(&log),
        },
    );

    let mut world = DummyWorld::default();
    sim.run(&mut world).expect("run");
    assert_eq!(&*log.lock().expect("log lock"), &[9]);
    assert_eq!(sim.now(), SimTime(10));
    assert_eq!(sim.executed(), 2);
}
