//! Error taxonomy shared by the wire, manager, worker and sandbox modules.
//!
//! Mirrors the six classes from the protocol design: transport, framing, protocol,
//! timeout, application, and interrupt. Callers are expected to match on these only to
//! decide retry-vs-abort; the wire layer itself returns an opaque `WireError` per
//! message exchange, not a byte-exact cause.

use std::io;

use thiserror::Error;

/// Failures from the framing/socket layer.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("operation timed out")]
    Timeout,

    #[error("peer closed connection")]
    Eof,

    #[error("declared payload length {declared} exceeds receiver capacity {capacity}")]
    PayloadTooLarge { declared: u32, capacity: u32 },

    #[error("unknown packet type code {0}")]
    UnknownType(u8),

    #[error("address resolution failed for {host}:{port}")]
    Resolve { host: String, port: u16 },
}

/// Failures surfaced by the manager's lifecycle state machine.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("listener setup failed: {0}")]
    Listen(#[source] io::Error),

    #[error("admission deadline expired before {joined}/{required} workers connected")]
    AdmissionTimeout { joined: usize, required: usize },

    #[error("run deadline expired or interrupt observed while collecting results")]
    CollectTimeout,

    #[error("interrupted during admission")]
    Interrupted,

    #[error("wire error while talking to worker#{index}: {source}")]
    Wire {
        index: usize,
        #[source]
        source: WireError,
    },

    #[error("worker#{index} reported an application error: {message}")]
    WorkerReportedError { index: usize, message: String },

    #[error("worker#{index} sent an unexpected packet type {got:?} in state {state}")]
    UnexpectedPacket {
        index: usize,
        got: crate::wire::PacketType,
        state: &'static str,
    },

    #[error("application callback rejected worker#{index}: {reason}")]
    ApplicationRejected { index: usize, reason: String },
}

/// Failures surfaced by the worker's lifecycle state machine.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("could not connect to manager: {0}")]
    Connect(#[source] io::Error),

    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    #[error("received ABORT or SHUTDOWN before a task was assigned")]
    AbortedBeforeTask,

    #[error("manager sent a packet of unexpected type {0:?} while awaiting TASK")]
    UnexpectedPacket(crate::wire::PacketType),

    #[error("task exceeded its wall-clock timeout")]
    TaskTimedOut,

    #[error("task execution failed: {0}")]
    TaskFailed(String),

    #[error("manager did not send SHUTDOWN after RESULT")]
    NoShutdown,
}

/// Failures from the sandboxed execution primitive.
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("fork failed: {0}")]
    Fork(#[source] nix::Error),

    #[error("pipe setup failed: {0}")]
    Pipe(#[source] nix::Error),

    #[error("waitpid failed: {0}")]
    Wait(#[source] nix::Error),

    #[error("child produced a malformed reply record")]
    MalformedReply,

    #[error("result payload of {len} bytes exceeds capacity {capacity}")]
    ResultTooLarge { len: usize, capacity: usize },

    #[error("error payload of {len} bytes exceeds capacity {capacity}")]
    ErrorTooLarge { len: usize, capacity: usize },
}

/// Invalid manager/worker configuration (checked eagerly, at construction).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required_workers must be >= 1, got {0}")]
    RequiredWorkersZero(u32),

    #[error("max_time_sec must be >= 1, got {0}")]
    MaxTimeZero(u32),

    #[error("max_cores must be >= 1, got {0}")]
    MaxCoresZero(u32),
}
