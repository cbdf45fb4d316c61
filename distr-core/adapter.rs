//! The two application adapter capability bundles.
//!
//! The source passes these as a struct of function pointers plus an opaque context
//! pointer; here each becomes a trait implemented per side instead. The
//! opaque context pointer disappears entirely — it's just the implementing type's own
//! fields. The `(buffer, capacity) -> length` shape is kept so no allocation is
//! required on the hot path of dispatch/collect/execute.

/// Manager-side capabilities, consumed by `distr_core::manager::run`.
pub trait ManagerOps {
    /// Validate and record a worker's `HELLO` payload. An `Err` rejects the connection;
    /// admission continues with the next connector (the slot is never marked alive).
    fn on_worker_hello(&mut self, worker_index: usize, hello_payload: &[u8]) -> Result<(), String>;

    /// Produce the `TASK` payload for `worker_index` into `out`, returning the number
    /// of bytes written. Called once per slot, in slot order, after admission closes.
    fn build_task(&mut self, worker_index: usize, out: &mut [u8]) -> Result<usize, String>;

    /// Integrate a worker's `RESULT` payload into whatever the application is
    /// accumulating. An `Err` here fails the whole run.
    fn on_worker_result(&mut self, worker_index: usize, result_payload: &[u8]) -> Result<(), String>;
}

/// Worker-side capabilities, consumed by `distr_core::worker::run`.
pub trait WorkerOps {
    /// Produce this worker's `HELLO` payload into `out`, returning the number of bytes
    /// written.
    fn build_hello(&mut self, out: &mut [u8]) -> Result<usize, String>;

    /// Execute one task inside the sandboxed child. Must not perform any I/O other
    /// than pure computation — the sandbox closes everything but the reply pipe before
    /// calling this.
    ///
    /// Returns `(rc, result_len, error_len)`: `rc == 0` is success (`result_len` bytes
    /// of `out_result` are valid), `rc > 0` is an application-level failure
    /// (`error_len` bytes of `out_error` are valid), `rc < 0` is malformed input.
    fn execute_task(
        &mut self,
        task_payload: &[u8],
        out_result: &mut [u8],
        out_error: &mut [u8],
    ) -> (i32, usize, usize);
}
