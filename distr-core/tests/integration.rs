//! End-to-end tests driving real `manager::run` / `worker::run` over loopback TCP,
//! exercising the scenarios from the protocol design's testable-properties section.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use distr_core::adapter::{ManagerOps, WorkerOps};
use distr_core::{manager, worker, wire};

struct CountingManager {
    results: Arc<Mutex<Vec<(usize, f64)>>>,
}

impl ManagerOps for CountingManager {
    fn on_worker_hello(&mut self, _index: usize, _payload: &[u8]) -> Result<(), String> {
        Ok(())
    }
    fn build_task(&mut self, index: usize, out: &mut [u8]) -> Result<usize, String> {
        out[0] = index as u8;
        Ok(1)
    }
    fn on_worker_result(&mut self, index: usize, payload: &[u8]) -> Result<(), String> {
        self.results
            .lock()
            .unwrap()
            .push((index, payload[0] as f64));
        Ok(())
    }
}

struct DoublingWorker;
impl WorkerOps for DoublingWorker {
    fn build_hello(&mut self, out: &mut [u8]) -> Result<usize, String> {
        out[0] = 2;
        Ok(1)
    }
    fn execute_task(
        &mut self,
        task_payload: &[u8],
        out_result: &mut [u8],
        _out_error: &mut [u8],
    ) -> (i32, usize, usize) {
        out_result[0] = task_payload[0].wrapping_mul(2);
        (0, 1, 0)
    }
}

/// S1 — happy path: required workers connect, get tasks, reply, and everyone shuts
/// down cleanly.
#[test]
fn s1_happy_path_n_workers() {
    let listener = wire::listen("127.0.0.1", 0).unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let cfg = manager::ManagerConfig::new("127.0.0.1", port, 3, 10).unwrap();
    let results = Arc::new(Mutex::new(Vec::new()));
    let manager_results = Arc::clone(&results);
    let manager_thread = thread::spawn(move || {
        let mut ops = CountingManager {
            results: manager_results,
        };
        manager::run(&cfg, &mut ops)
    });

    thread::sleep(Duration::from_millis(50));
    let worker_threads: Vec<_> = (0..3)
        .map(|_| {
            thread::spawn(move || {
                let wcfg = worker::WorkerConfig::new("127.0.0.1", port, 2, 10).unwrap();
                let mut ops = DoublingWorker;
                worker::run(&wcfg, &mut ops)
            })
        })
        .collect();

    for w in worker_threads {
        assert_eq!(w.join().unwrap(), worker::EXIT_SUCCESS);
    }
    assert_eq!(manager_thread.join().unwrap(), manager::EXIT_SUCCESS);
    assert_eq!(results.lock().unwrap().len(), 3);
}

/// S2 — admission timeout: fewer than required_workers connect, manager fails and the
/// connected worker never receives a TASK.
#[test]
fn s2_admission_timeout_no_task_sent() {
    let listener = wire::listen("127.0.0.1", 0).unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let cfg = manager::ManagerConfig::new("127.0.0.1", port, 2, 1).unwrap();
    let manager_thread = thread::spawn(move || {
        let mut ops = CountingManager {
            results: Arc::new(Mutex::new(Vec::new())),
        };
        manager::run(&cfg, &mut ops)
    });

    thread::sleep(Duration::from_millis(50));
    let mut conn = wire::connect_with_deadline("127.0.0.1", port, Duration::from_secs(2)).unwrap();
    wire::send_packet(
        &mut conn,
        wire::PacketType::Hello,
        &[],
        Duration::from_secs(2),
    )
    .unwrap();

    // Never receives a TASK: the manager times out admission and the socket closes.
    let res = wire::recv_packet(&mut conn, Duration::from_secs(5), wire::DEFAULT_MAX_PAYLOAD);
    assert!(res.is_err());
    assert_eq!(manager_thread.join().unwrap(), manager::EXIT_PROTOCOL_FAILURE);
}

/// S4 — worker application error propagates to an ABORT broadcast and a failed run.
#[test]
fn s4_worker_application_error_aborts_run() {
    struct FailingWorker;
    impl WorkerOps for FailingWorker {
        fn build_hello(&mut self, _out: &mut [u8]) -> Result<usize, String> {
            Ok(0)
        }
        fn execute_task(
            &mut self,
            _task_payload: &[u8],
            _out_result: &mut [u8],
            out_error: &mut [u8],
        ) -> (i32, usize, usize) {
            let msg = b"bad_input";
            out_error[..msg.len()].copy_from_slice(msg);
            (1, 0, msg.len())
        }
    }

    let listener = wire::listen("127.0.0.1", 0).unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let cfg = manager::ManagerConfig::new("127.0.0.1", port, 1, 10).unwrap();
    let manager_thread = thread::spawn(move || {
        let mut ops = CountingManager {
            results: Arc::new(Mutex::new(Vec::new())),
        };
        manager::run(&cfg, &mut ops)
    });

    thread::sleep(Duration::from_millis(50));
    let wcfg = worker::WorkerConfig::new("127.0.0.1", port, 1, 10).unwrap();
    let mut ops = FailingWorker;
    let worker_rc = worker::run(&wcfg, &mut ops);

    assert_eq!(worker_rc, worker::EXIT_TASK_OR_ABORT);
    assert_eq!(manager_thread.join().unwrap(), manager::EXIT_PROTOCOL_FAILURE);
}

/// S5 — a declared payload length exceeding the receiver's capacity is a framing
/// error, which fails collection and triggers an ABORT broadcast.
#[test]
fn s5_oversized_length_is_framing_error() {
    let listener = wire::listen("127.0.0.1", 0).unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let cfg = manager::ManagerConfig::new("127.0.0.1", port, 1, 10).unwrap();
    let manager_thread = thread::spawn(move || {
        let mut ops = CountingManager {
            results: Arc::new(Mutex::new(Vec::new())),
        };
        manager::run(&cfg, &mut ops)
    });

    thread::sleep(Duration::from_millis(50));
    let mut conn = wire::connect_with_deadline("127.0.0.1", port, Duration::from_secs(2)).unwrap();
    wire::send_packet(
        &mut conn,
        wire::PacketType::Hello,
        &[],
        Duration::from_secs(2),
    )
    .unwrap();
    let (ty, _) =
        wire::recv_packet(&mut conn, Duration::from_secs(2), wire::DEFAULT_MAX_PAYLOAD).unwrap();
    assert_eq!(ty, wire::PacketType::Task);

    // Hand-craft a RESULT header declaring a length far beyond the manager's capacity.
    use std::io::Write;
    let mut header = [0u8; 5];
    header[0] = wire::PacketType::Result as u8;
    header[1..5].copy_from_slice(&10_000u32.to_be_bytes());
    conn.write_all(&header).unwrap();

    assert_eq!(manager_thread.join().unwrap(), manager::EXIT_PROTOCOL_FAILURE);
}
