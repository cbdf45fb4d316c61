//! The manager's lifecycle state machine: `Listening -> Admitting ->
//! Dispatching -> Collecting -> Succeeding | Failing`.

use std::net::TcpStream;
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::adapter::ManagerOps;
use crate::deadline::{self, Deadline};
use crate::error::{ConfigError, ManagerError, WireError};
use crate::wire::{self, PacketType};

const HELLO_DEADLINE: Duration = Duration::from_secs(5);
const TASK_SEND_DEADLINE: Duration = Duration::from_secs(5);
const BROADCAST_DEADLINE: Duration = Duration::from_secs(5);
const ADMIT_POLL_DEADLINE: Duration = Duration::from_secs(1);

/// Immutable manager configuration for one run.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub host: String,
    pub port: u16,
    pub required_workers: u32,
    pub max_time_sec: u32,
    pub max_payload: u32,
}

impl ManagerConfig {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        required_workers: u32,
        max_time_sec: u32,
    ) -> Result<Self, ConfigError> {
        if required_workers < 1 {
            return Err(ConfigError::RequiredWorkersZero(required_workers));
        }
        if max_time_sec < 1 {
            return Err(ConfigError::MaxTimeZero(max_time_sec));
        }
        Ok(ManagerConfig {
            host: host.into(),
            port,
            required_workers,
            max_time_sec,
            max_payload: wire::DEFAULT_MAX_PAYLOAD,
        })
    }
}

/// One admitted worker's manager-side state.
struct WorkerSlot {
    conn: TcpStream,
    alive: bool,
}

/// Process exit codes for the manager binary.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_CONFIG_OR_LISTENER: i32 = 2;
pub const EXIT_PROTOCOL_FAILURE: i32 = 3;

/// Drive one complete manager run against `ops`. Returns the process exit code to use
/// rather than panicking or calling `process::exit` itself, so callers can run this
/// inside tests.
pub fn run(cfg: &ManagerConfig, ops: &mut impl ManagerOps) -> i32 {
    match run_inner(cfg, ops) {
        Ok(()) => EXIT_SUCCESS,
        Err(ManagerError::Config(_) | ManagerError::Listen(_)) => EXIT_CONFIG_OR_LISTENER,
        Err(e) => {
            error!("[manager] run failed: {e}");
            EXIT_PROTOCOL_FAILURE
        }
    }
}

fn run_inner(cfg: &ManagerConfig, ops: &mut impl ManagerOps) -> Result<(), ManagerError> {
    if let Err(e) = deadline::install_interrupt_handler() {
        warn!("[manager] could not install SIGINT handler: {e}");
    }

    let listener = wire::listen(&cfg.host, cfg.port).map_err(|e| match e {
        WireError::Io(io) => ManagerError::Listen(io),
        other => ManagerError::Listen(std::io::Error::other(other.to_string())),
    })?;
    info!(
        "listening on {}:{}, need workers={}",
        cfg.host, cfg.port, cfg.required_workers
    );

    let run_deadline = Deadline::after(Duration::from_secs(cfg.max_time_sec as u64));
    let mut slots = admit(&listener, cfg, run_deadline, ops)?;

    let result = dispatch(&mut slots, cfg, ops)
        .and_then(|()| collect(&mut slots, cfg, run_deadline, ops));

    match result {
        Ok(()) => {
            broadcast(&mut slots, PacketType::Shutdown);
            Ok(())
        }
        Err(e) => {
            broadcast(&mut slots, PacketType::Abort);
            Err(e)
        }
    }
}

fn admit(
    listener: &std::net::TcpListener,
    cfg: &ManagerConfig,
    run_deadline: Deadline,
    ops: &mut impl ManagerOps,
) -> Result<Vec<WorkerSlot>, ManagerError> {
    let mut slots = Vec::with_capacity(cfg.required_workers as usize);
    while slots.len() < cfg.required_workers as usize {
        if deadline::interrupted() {
            warn!("[manager] interrupted");
            return Err(ManagerError::Interrupted);
        }
        if run_deadline.expired() {
            warn!("[manager] timeout waiting for workers");
            return Err(ManagerError::AdmissionTimeout {
                joined: slots.len(),
                required: cfg.required_workers as usize,
            });
        }

        let (mut stream, peer) = match wire::accept_with_deadline(listener, ADMIT_POLL_DEADLINE) {
            Ok(ok) => ok,
            Err(WireError::Timeout) => continue,
            Err(e) => {
                debug!("[manager] accept failed: {e}");
                continue;
            }
        };

        match wire::recv_packet(&mut stream, HELLO_DEADLINE, cfg.max_payload) {
            Ok((PacketType::Hello, payload)) => {
                let index = slots.len();
                match ops.on_worker_hello(index, &payload) {
                    Ok(()) => {
                        info!("worker#{index} joined ({peer})");
                        slots.push(WorkerSlot {
                            conn: stream,
                            alive: true,
                        });
                    }
                    Err(reason) => {
                        debug!("[manager] rejected HELLO from {peer}: {reason}");
                    }
                }
            }
            Ok((other, _)) => {
                debug!("[manager] expected HELLO from {peer}, got {other:?}");
            }
            Err(e) => {
                debug!("[manager] admission read from {peer} failed: {e}");
            }
        }
    }
    Ok(slots)
}

fn dispatch(
    slots: &mut [WorkerSlot],
    cfg: &ManagerConfig,
    ops: &mut impl ManagerOps,
) -> Result<(), ManagerError> {
    let mut buf = vec![0u8; cfg.max_payload as usize];
    for (index, slot) in slots.iter_mut().enumerate() {
        let len = ops
            .build_task(index, &mut buf)
            .map_err(|reason| ManagerError::ApplicationRejected { index, reason })?;
        wire::send_packet(&mut slot.conn, PacketType::Task, &buf[..len], TASK_SEND_DEADLINE)
            .map_err(|source| ManagerError::Wire { index, source })?;
    }
    Ok(())
}

fn collect(
    slots: &mut [WorkerSlot],
    cfg: &ManagerConfig,
    run_deadline: Deadline,
    ops: &mut impl ManagerOps,
) -> Result<(), ManagerError> {
    for (index, slot) in slots.iter_mut().enumerate() {
        if deadline::interrupted() || run_deadline.expired() {
            warn!("[manager] timeout or interrupted during collect");
            return Err(ManagerError::CollectTimeout);
        }
        let per_call_deadline = Duration::from_secs(cfg.max_time_sec as u64);
        match wire::recv_packet(&mut slot.conn, per_call_deadline, cfg.max_payload) {
            Ok((PacketType::Result, payload)) => {
                ops.on_worker_result(index, &payload)
                    .map_err(|reason| ManagerError::ApplicationRejected { index, reason })?;
            }
            Ok((PacketType::Error, payload)) => {
                let message = String::from_utf8_lossy(&payload).into_owned();
                error!("worker error: {message}");
                return Err(ManagerError::WorkerReportedError { index, message });
            }
            Ok((other, _)) => {
                return Err(ManagerError::UnexpectedPacket {
                    index,
                    got: other,
                    state: "Collecting",
                });
            }
            Err(source) => {
                warn!("worker#{index} disconnected/timeout");
                return Err(ManagerError::Wire { index, source });
            }
        }
    }
    Ok(())
}

fn broadcast(slots: &mut [WorkerSlot], ty: PacketType) {
    for slot in slots.iter_mut().filter(|s| s.alive) {
        let _ = wire::send_packet(&mut slot.conn, ty, &[], BROADCAST_DEADLINE);
        slot.alive = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::connect_with_deadline;
    use std::sync::{Arc, Mutex};
    use std::thread;

    #[derive(Default)]
    struct SumOps {
        hellos: Vec<Vec<u8>>,
        results: Arc<Mutex<Vec<(usize, u8)>>>,
    }

    impl ManagerOps for SumOps {
        fn on_worker_hello(&mut self, _i: usize, payload: &[u8]) -> Result<(), String> {
            self.hellos.push(payload.to_vec());
            Ok(())
        }
        fn build_task(&mut self, index: usize, out: &mut [u8]) -> Result<usize, String> {
            out[0] = index as u8;
            Ok(1)
        }
        fn on_worker_result(&mut self, index: usize, payload: &[u8]) -> Result<(), String> {
            self.results.lock().unwrap().push((index, payload[0]));
            Ok(())
        }
    }

    #[test]
    fn happy_path_two_workers() {
        let cfg = ManagerConfig::new("127.0.0.1", 0, 2, 5).unwrap();
        let listener = wire::listen(&cfg.host, cfg.port).unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener); // re-bound inside run_inner's own wire::listen call below

        let mut cfg = cfg;
        cfg.port = port;
        let results = Arc::new(Mutex::new(Vec::new()));

        let worker_results = Arc::clone(&results);
        let manager_thread = thread::spawn(move || {
            let mut ops = SumOps {
                hellos: Vec::new(),
                results: worker_results,
            };
            run(&cfg, &mut ops)
        });

        // Give the manager a moment to bind before workers connect.
        thread::sleep(Duration::from_millis(50));

        let mut workers = Vec::new();
        for _ in 0..2 {
            let port = port;
            workers.push(thread::spawn(move || {
                let mut conn =
                    connect_with_deadline("127.0.0.1", port, Duration::from_secs(2)).unwrap();
                wire::send_packet(&mut conn, PacketType::Hello, &[], Duration::from_secs(2))
                    .unwrap();
                let (ty, payload) =
                    wire::recv_packet(&mut conn, Duration::from_secs(2), wire::DEFAULT_MAX_PAYLOAD)
                        .unwrap();
                assert_eq!(ty, PacketType::Task);
                wire::send_packet(
                    &mut conn,
                    PacketType::Result,
                    &payload,
                    Duration::from_secs(2),
                )
                .unwrap();
                let (ty, _) =
                    wire::recv_packet(&mut conn, Duration::from_secs(2), wire::DEFAULT_MAX_PAYLOAD)
                        .unwrap();
                assert_eq!(ty, PacketType::Shutdown);
            }));
        }
        for w in workers {
            w.join().unwrap();
        }
        let rc = manager_thread.join().unwrap();
        assert_eq!(rc, EXIT_SUCCESS);
        assert_eq!(results.lock().unwrap().len(), 2);
    }

    #[test]
    fn admission_timeout_without_enough_workers() {
        let cfg = ManagerConfig::new("127.0.0.1", 0, 2, 1).unwrap();
        let listener = wire::listen(&cfg.host, cfg.port).unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let mut cfg = cfg;
        cfg.port = port;

        let mut ops = SumOps::default();
        let rc = run(&cfg, &mut ops);
        assert_eq!(rc, EXIT_PROTOCOL_FAILURE);
    }
}
