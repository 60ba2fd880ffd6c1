use crate::config::{BufferClassConfig, DeviceConfig, MB};
use crate::net::{NodeId, Request, RequestKind, Token};
use crate::queue::{
    Admission, BufferClass, CapacityBuffer, ServiceQueue, StorageDeviceQueue, service_time,
};
use crate::sim::SimTime;

fn req(id: u64, kind: RequestKind, bytes: u64) -> Request {
    Request::new(id, id, kind, bytes, NodeId(0), NodeId(1), SimTime::ZERO)
}

fn small_buffer(capacity_bytes: u64) -> CapacityBuffer {
    CapacityBuffer::new(
        BufferClass::Dram,
        BufferClassConfig {
            capacity_bytes,
            read_gbps: 8.0,
            write_gbps: 4.0,
        },
    )
}

#[test]
fn service_time_is_eight_times_megabytes_over_gbps() {
    assert_eq!(service_time(MB, 8.0), SimTime::from_secs(1));
    assert_eq!(service_time(MB / 2, 4.0), SimTime::from_secs(1));
    assert_eq!(service_time(0, 8.0), SimTime::ZERO);
    assert_eq!(service_time(MB, 0.0), SimTime::ZERO);
}

#[test]
fn capacity_buffer_admits_until_full_then_queues_fifo() {
    let mut buf = small_buffer(100);
    let now = SimTime::ZERO;

    let first = buf.admit(Token(1), req(1, RequestKind::Write, 60), now, true);
    assert!(matches!(first, Admission::Admitted { .. }));
    assert_eq!(buf.available(), 40);

    assert_eq!(
        buf.admit(Token(2), req(2, RequestKind::Write, 50), now, true),
        Admission::Queued
    );
    // 虽然放得下，但前面有人在等
    assert_eq!(
        buf.admit(Token(3), req(3, RequestKind::Write, 30), now, true),
        Admission::Queued
    );
    assert_eq!(buf.queue_len(), 2);
    assert!(buf.bytes_in_flight() <= buf.capacity());

    assert!(buf.drain(now, |_| true).is_empty());

    let released = buf.release(Token(1)).expect("in service");
    assert_eq!(released.id, 1);
    assert_eq!(buf.available(), 100);

    let started: Vec<Token> = buf.drain(now, |_| true).into_iter().map(|(t, _)| t).collect();
    assert_eq!(started, vec![Token(2), Token(3)]);
    assert_eq!(buf.available(), 20);
    assert_eq!(buf.queue_len(), 0);
    assert!(buf.bytes_in_flight() <= buf.capacity());

    assert!(buf.release(Token(1)).is_none(), "second release is an orphan");
}

#[test]
fn capacity_buffer_service_time_follows_kind_bandwidth() {
    let mut buf = small_buffer(4 * MB);
    let t0 = SimTime::from_secs(3);

    let Admission::Admitted { depart_at } = buf.admit(Token(1), req(1, RequestKind::Write, MB), t0, true)
    else {
        panic!("write must be admitted");
    };
    assert_eq!(depart_at, SimTime::from_secs(5));

    let mut read = req(2, RequestKind::Read, MB);
    read.fragment_bytes = MB;
    let Admission::Admitted { depart_at } = buf.admit(Token(2), read, t0, true) else {
        panic!("read must be admitted");
    };
    assert_eq!(depart_at, SimTime::from_secs(4));

    let control = req(3, RequestKind::Read, MB);
    assert!(control.is_control());
    assert_eq!(buf.service_time(&control), SimTime::ZERO);
}

#[test]
fn capacity_buffer_downstream_gate_holds_the_head() {
    let mut buf = small_buffer(100);
    let now = SimTime::ZERO;

    assert_eq!(
        buf.admit(Token(1), req(1, RequestKind::Write, 10), now, false),
        Admission::Queued
    );
    assert!(buf.drain(now, |_| false).is_empty());
    assert_eq!(buf.queue_len(), 1);
    assert_eq!(buf.available(), 100);

    let started = buf.drain(now, |_| true);
    assert_eq!(started.len(), 1);
    assert_eq!(buf.available(), 90);
}

#[test]
fn oversized_fragment_never_fits() {
    let buf = small_buffer(100);
    assert!(buf.fits_at_all(&req(1, RequestKind::Write, 100)));
    assert!(!buf.fits_at_all(&req(2, RequestKind::Write, 101)));
}

#[test]
fn service_queue_pipelines_beyond_parallelism() {
    let mut q: ServiceQueue<u32> = ServiceQueue::new(2);
    let now = SimTime::ZERO;
    let proc = SimTime(10);

    let first = q.push(Token(1), 1, now, proc);
    let second = q.push(Token(2), 2, now, proc);
    let third = q.push(Token(3), 3, now, SimTime(5));

    assert_eq!(first, SimTime(10));
    assert_eq!(second, SimTime(10));
    // 第 P+1 个：队尾的完成时间 + 自己的服务时间
    assert_eq!(third, first.saturating_add(SimTime(5)));
    assert_eq!(q.len(), 3);

    assert_eq!(q.complete(Token(2)), Some((2, SimTime(10))));
    assert_eq!(q.complete(Token(2)), None);
    assert_eq!(q.items().copied().collect::<Vec<_>>(), vec![1, 3]);
}

#[test]
fn service_queue_with_parallelism_one_serializes() {
    let mut q: ServiceQueue<&str> = ServiceQueue::new(1);
    let proc = SimTime(100);

    let a = q.push(Token(1), "a", SimTime(50), proc);
    let b = q.push(Token(2), "b", SimTime(50), proc);
    assert_eq!(a, SimTime(150));
    // 第二个恰好在第一个完成时开始
    assert_eq!(b, a.saturating_add(proc));

    q.complete(Token(1));
    q.complete(Token(2));
    assert!(q.is_empty());
    assert_eq!(q.push(Token(3), "c", SimTime(400), proc), SimTime(500));
}

fn device(parallelism: usize, max_queue_len: usize) -> StorageDeviceQueue {
    StorageDeviceQueue::new(&DeviceConfig {
        read_gbps: 8.0,
        write_gbps: 4.0,
        parallelism,
        max_queue_len,
    })
}

#[test]
fn device_queue_reads_return_data_and_writes_acknowledge_empty() {
    let mut disk = device(1, 2);
    assert!(disk.is_free());

    let read = req(1, RequestKind::Read, MB);
    let leave = disk.submit(Token(1), read, SimTime::ZERO).expect("room");
    assert_eq!(leave, SimTime::from_secs(1));

    let write = req(2, RequestKind::Write, MB);
    let leave = disk.submit(Token(2), write, SimTime::ZERO).expect("room");
    assert_eq!(leave, SimTime::from_secs(3));

    assert!(!disk.is_free());
    assert!(!disk.has_room(0));
    let rejected = disk
        .submit(Token(3), req(3, RequestKind::Write, MB), SimTime::ZERO)
        .expect_err("full");
    assert_eq!(rejected.id, 3);

    let done = disk.complete(Token(1)).expect("read done");
    assert!(done.is_return_leg);
    assert_eq!(done.fragment_bytes, MB);
    assert_eq!(done.depart_time, SimTime::from_secs(1));

    let done = disk.complete(Token(2)).expect("write done");
    assert!(done.is_return_leg);
    assert_eq!(done.fragment_bytes, 0);
    assert_eq!(done.extent_bytes, MB);
    assert!(disk.complete(Token(2)).is_none());
}

#[test]
fn device_queue_room_accounts_for_reservations() {
    let mut disk = device(4, 3);
    disk.submit(Token(1), req(1, RequestKind::Write, 10), SimTime::ZERO)
        .expect("room");
    assert!(disk.has_room(1));
    assert!(!disk.has_room(2));
    assert!(disk.is_free());
}
