//! The worker's lifecycle state machine: `Connecting -> SentHello ->
//! AwaitingTask -> Executing -> SentReply -> AwaitingShutdown -> Done`.

use std::time::Duration;

use log::{error, info};

use crate::adapter::WorkerOps;
use crate::error::{ConfigError, WireError, WorkerError};
use crate::sandbox;
use crate::wire::{self, PacketType};

const CONNECT_DEADLINE: Duration = Duration::from_secs(5);
const HELLO_SEND_DEADLINE: Duration = Duration::from_secs(5);
const RESULT_SEND_DEADLINE: Duration = Duration::from_secs(5);
const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(5);

/// Immutable worker configuration for one run.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub host: String,
    pub port: u16,
    pub max_cores: u32,
    pub max_time_sec: u32,
    pub max_payload: u32,
}

impl WorkerConfig {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        max_cores: u32,
        max_time_sec: u32,
    ) -> Result<Self, ConfigError> {
        if max_cores < 1 {
            return Err(ConfigError::MaxCoresZero(max_cores));
        }
        if max_time_sec < 1 {
            return Err(ConfigError::MaxTimeZero(max_time_sec));
        }
        Ok(WorkerConfig {
            host: host.into(),
            port,
            max_cores,
            max_time_sec,
            max_payload: wire::DEFAULT_MAX_PAYLOAD,
        })
    }
}

/// Process exit codes for the worker binary.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_CONFIG_OR_CONNECTION: i32 = 2;
pub const EXIT_TASK_OR_ABORT: i32 = 3;

/// Drive one complete worker run against `ops`. Returns the process exit code to use.
pub fn run(cfg: &WorkerConfig, ops: &mut impl WorkerOps) -> i32 {
    match run_inner(cfg, ops) {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            error!("[worker] {e}");
            match e {
                WorkerError::Config(_)
                | WorkerError::Connect(_)
                | WorkerError::UnexpectedPacket(_) => EXIT_CONFIG_OR_CONNECTION,
                _ => EXIT_TASK_OR_ABORT,
            }
        }
    }
}

fn run_inner(cfg: &WorkerConfig, ops: &mut impl WorkerOps) -> Result<(), WorkerError> {
    let mut conn = wire::connect_with_deadline(&cfg.host, cfg.port, CONNECT_DEADLINE)
        .map_err(|e| match e {
            WireError::Io(io) => WorkerError::Connect(io),
            other => WorkerError::Connect(std::io::Error::other(other.to_string())),
        })?;

    let mut hello = vec![0u8; cfg.max_payload as usize];
    let hello_len = ops
        .build_hello(&mut hello)
        .map_err(WorkerError::TaskFailed)?;
    wire::send_packet(&mut conn, PacketType::Hello, &hello[..hello_len], HELLO_SEND_DEADLINE)?;
    info!("[worker] sent HELLO, awaiting task");

    let run_deadline = Duration::from_secs(cfg.max_time_sec as u64);
    let (ty, task_payload) = wire::recv_packet(&mut conn, run_deadline, cfg.max_payload)?;
    let task_payload = match ty {
        PacketType::Abort | PacketType::Shutdown => return Err(WorkerError::AbortedBeforeTask),
        PacketType::Task => task_payload,
        other => {
            let _ = wire::send_packet(
                &mut conn,
                PacketType::Error,
                b"bad_task_format",
                RESULT_SEND_DEADLINE,
            );
            return Err(WorkerError::UnexpectedPacket(other));
        }
    };

    info!("[worker] executing task ({} bytes)", task_payload.len());
    let outcome = sandbox::execute_with_timeout(
        ops,
        &task_payload,
        run_deadline,
        cfg.max_payload as usize,
        cfg.max_payload as usize,
    )
    .map_err(|e| WorkerError::TaskFailed(e.to_string()))?;

    if outcome.timed_out {
        let _ =
            wire::send_packet(&mut conn, PacketType::Error, b"timed_out", RESULT_SEND_DEADLINE);
        return Err(WorkerError::TaskTimedOut);
    }
    if outcome.rc != 0 {
        let payload = if outcome.error.is_empty() {
            b"task_failed".to_vec()
        } else {
            outcome.error.clone()
        };
        let _ = wire::send_packet(&mut conn, PacketType::Error, &payload, RESULT_SEND_DEADLINE);
        return Err(WorkerError::TaskFailed(
            String::from_utf8_lossy(&payload).into_owned(),
        ));
    }

    wire::send_packet(&mut conn, PacketType::Result, &outcome.result, RESULT_SEND_DEADLINE)?;
    info!("[worker] sent RESULT, awaiting SHUTDOWN");

    let (ty, _) = wire::recv_packet(&mut conn, SHUTDOWN_DEADLINE, cfg.max_payload)?;
    match ty {
        PacketType::Shutdown => Ok(()),
        _ => Err(WorkerError::NoShutdown),
    }
}
