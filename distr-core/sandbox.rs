//! Sandboxed task execution: the application's `execute_task` callback runs in
//! a forked child so a runaway or corrupting task cannot hang the worker's main flow
//! past `timeout` or corrupt its heap. The child reports back through an anonymous
//! pipe using a fixed-layout record; the parent reaps the child under a wall-clock
//! deadline and force-kills it if the deadline passes.
//!
//! Grounded in `polkadot-node-core-pvf-prepare-worker`'s `fork` + pipe pattern
//! (`nix::unistd::fork`, a pipe, `handle_child_process`/`handle_parent_process`,
//! `send_child_response` ending in `process::exit`).

use std::fs::File;
use std::io::{Read, Write};
use std::thread;
use std::time::{Duration, Instant};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{fork, pipe, ForkResult};

use crate::adapter::WorkerOps;
use crate::error::SandboxError;

/// How often the parent polls the child's liveness while waiting out the deadline.
const REAP_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// The result of running one task under sandbox isolation.
#[derive(Debug)]
pub struct ExecOutcome {
    pub timed_out: bool,
    pub rc: i32,
    pub result: Vec<u8>,
    pub error: Vec<u8>,
}

impl ExecOutcome {
    fn timed_out() -> Self {
        ExecOutcome {
            timed_out: true,
            rc: -1,
            result: Vec::new(),
            error: Vec::new(),
        }
    }
}

/// Run `ops.execute_task(task_payload, ..)` in an isolated child process, enforcing
/// `timeout` as a hard wall-clock budget.
///
/// # Safety / process model
/// This calls `fork(2)`. The child only ever writes to its end of the pipe and then
/// calls `std::process::exit`, so it never touches the parent's sockets or shares
/// mutable state with it beyond the copy-on-write snapshot taken at fork time.
pub fn execute_with_timeout<O: WorkerOps>(
    ops: &mut O,
    task_payload: &[u8],
    timeout: Duration,
    result_capacity: usize,
    error_capacity: usize,
) -> Result<ExecOutcome, SandboxError> {
    let (read_fd, write_fd) = pipe().map_err(SandboxError::Pipe)?;

    // SAFETY: the worker's main flow calls `execute_with_timeout` from a single thread
    // with no other threads yet spawned, which is the precondition `fork` needs to be
    // sound here.
    match unsafe { fork() }.map_err(SandboxError::Fork)? {
        ForkResult::Child => {
            drop(read_fd);
            run_child(ops, task_payload, write_fd, result_capacity, error_capacity)
        }
        ForkResult::Parent { child } => {
            drop(write_fd);
            let mut pipe_reader = File::from(read_fd);
            reap_with_deadline(child, timeout)?.map_or_else(
                || {
                    let _ = kill(child, Signal::SIGKILL);
                    let _ = waitpid(child, None);
                    Ok(ExecOutcome::timed_out())
                },
                |()| decode_reply(&mut pipe_reader, result_capacity, error_capacity),
            )
        }
    }
}

/// Runs entirely inside the forked child. Never returns: exits the process directly so
/// control never unwinds back into code shared with the parent.
fn run_child<O: WorkerOps>(
    ops: &mut O,
    task_payload: &[u8],
    write_fd: std::os::fd::OwnedFd,
    result_capacity: usize,
    error_capacity: usize,
) -> ! {
    let mut pipe_writer = File::from(write_fd);
    let mut result_buf = vec![0u8; result_capacity];
    let mut error_buf = vec![0u8; error_capacity];
    let (rc, result_len, error_len) =
        ops.execute_task(task_payload, &mut result_buf, &mut error_buf);
    let result_len = result_len.min(result_capacity);
    let error_len = error_len.min(error_capacity);

    let mut record = Vec::with_capacity(8 + result_len + error_len);
    let wrote = (|| -> std::io::Result<()> {
        record.write_i32::<BigEndian>(rc)?;
        record.write_u32::<BigEndian>(result_len as u32)?;
        record.extend_from_slice(&result_buf[..result_len]);
        record.write_u32::<BigEndian>(error_len as u32)?;
        record.extend_from_slice(&error_buf[..error_len]);
        pipe_writer.write_all(&record)
    })();

    match wrote {
        Ok(()) => std::process::exit(0),
        Err(_) => std::process::exit(1),
    }
}

/// Poll the child's status until it exits or `timeout` elapses. Returns `Some(())` if
/// the child exited on its own, `None` if the deadline passed first (caller is then
/// responsible for killing and reaping it).
fn reap_with_deadline(
    child: nix::unistd::Pid,
    timeout: Duration,
) -> Result<Option<()>, SandboxError> {
    let deadline = Instant::now() + timeout;
    loop {
        match waitpid(child, Some(WaitPidFlag::WNOHANG)).map_err(SandboxError::Wait)? {
            WaitStatus::StillAlive => {
                if Instant::now() >= deadline {
                    return Ok(None);
                }
                thread::sleep(REAP_POLL_INTERVAL);
            }
            _exited => return Ok(Some(())),
        }
    }
}

fn decode_reply(
    pipe_reader: &mut File,
    result_capacity: usize,
    error_capacity: usize,
) -> Result<ExecOutcome, SandboxError> {
    let mut raw = Vec::new();
    pipe_reader
        .read_to_end(&mut raw)
        .map_err(|_| SandboxError::MalformedReply)?;
    let mut cur = &raw[..];

    let rc = cur.read_i32::<BigEndian>().map_err(|_| SandboxError::MalformedReply)?;
    let result_len = cur.read_u32::<BigEndian>().map_err(|_| SandboxError::MalformedReply)? as usize;
    if result_len > result_capacity || result_len > cur.len() {
        return Err(SandboxError::ResultTooLarge {
            len: result_len,
            capacity: result_capacity,
        });
    }
    let (result, rest) = cur.split_at(result_len);
    cur = rest;

    let error_len = cur.read_u32::<BigEndian>().map_err(|_| SandboxError::MalformedReply)? as usize;
    if error_len > error_capacity || error_len > cur.len() {
        return Err(SandboxError::ErrorTooLarge {
            len: error_len,
            capacity: error_capacity,
        });
    }
    let (error, _rest) = cur.split_at(error_len);

    Ok(ExecOutcome {
        timed_out: false,
        rc,
        result: result.to_vec(),
        error: error.to_vec(),
    })
}
