/*! Trapezoidal-rule numerical integration, layered on top of `distr-core` as an
example application (`distr-core` itself deliberately knows nothing about it).

Wires the integration job's payload encoding ([`payload`]), the parallel integrator
([`trapz`]), and the two [`distr_core`] adapter traits together: [`IntegralManager`]
implements [`distr_core::ManagerOps`] (partitions `[a, b]` proportionally to each
worker's reported core count, via [`distr_core::partition::split_by_weight`]) and
[`IntegralWorker`] implements [`distr_core::WorkerOps`] (decodes a `TASK`, runs
[`trapz::integrate_trapz`], encodes the `RESULT`).
*/

pub mod payload;
pub mod trapz;

use distr_core::partition::{split_by_weight, Share};
use distr_core::{ManagerOps, WorkerOps};

/// The job handed to the manager: integrate `f(x) = 4 / (1 + x^2)` over `[a, b]` using
/// `n` trapezoids total, split across however many workers join.
#[derive(Debug, Clone, Copy)]
pub struct IntegrationJob {
    pub a: f64,
    pub b: f64,
    pub n: u64,
}

/// `ManagerOps` implementation for the integration example.
pub struct IntegralManager {
    job: IntegrationJob,
    required_workers: usize,
    worker_cores: Vec<u32>,
    shares: Option<Vec<Share>>,
    pub total: f64,
    pub total_cores: u32,
}

impl IntegralManager {
    pub fn new(job: IntegrationJob, required_workers: usize) -> Self {
        IntegralManager {
            job,
            required_workers,
            worker_cores: vec![1; required_workers],
            shares: None,
            total: 0.0,
            total_cores: 0,
        }
    }
}

impl ManagerOps for IntegralManager {
    fn on_worker_hello(&mut self, worker_index: usize, hello_payload: &[u8]) -> Result<(), String> {
        let cores = payload::decode_hello(hello_payload).map_err(|e| e.to_string())?;
        if cores == 0 {
            return Err("worker reported zero cores".to_string());
        }
        self.worker_cores[worker_index] = cores;
        Ok(())
    }

    fn build_task(&mut self, worker_index: usize, out: &mut [u8]) -> Result<usize, String> {
        if self.shares.is_none() {
            self.total_cores = self.worker_cores.iter().sum();
            self.shares = Some(split_by_weight(
                self.job.a,
                self.job.b,
                self.job.n,
                &self.worker_cores,
            ));
        }
        let share = self.shares.as_ref().unwrap()[worker_index];
        let task = payload::Task {
            id: worker_index as u32,
            a: share.left,
            b: share.right,
            n: share.units,
            threads: self.worker_cores[worker_index],
        };
        payload::encode_task(&task, out).map_err(|e| e.to_string())
    }

    fn on_worker_result(&mut self, _worker_index: usize, result_payload: &[u8]) -> Result<(), String> {
        let (_id, value) = payload::decode_result(result_payload).map_err(|e| e.to_string())?;
        self.total += value;
        Ok(())
    }
}

/// `WorkerOps` implementation for the integration example.
#[derive(Default)]
pub struct IntegralWorker {
    pub max_cores: u32,
}

impl IntegralWorker {
    pub fn new(max_cores: u32) -> Self {
        IntegralWorker { max_cores }
    }
}

impl WorkerOps for IntegralWorker {
    fn build_hello(&mut self, out: &mut [u8]) -> Result<usize, String> {
        payload::encode_hello(self.max_cores, out).map_err(|e| e.to_string())
    }

    fn execute_task(
        &mut self,
        task_payload: &[u8],
        out_result: &mut [u8],
        out_error: &mut [u8],
    ) -> (i32, usize, usize) {
        let task = match payload::decode_task(task_payload) {
            Ok(t) => t,
            Err(_) => {
                let msg = b"bad_task_format";
                let n = msg.len().min(out_error.len());
                out_error[..n].copy_from_slice(&msg[..n]);
                return (-1, 0, n);
            }
        };
        let threads = task.threads.clamp(1, self.max_cores.max(1));
        let cancel = trapz::CancellationToken::new();
        let (value, _cancelled) = trapz::integrate_trapz(task.a, task.b, task.n, threads, &cancel);
        match payload::encode_result(task.id, value, out_result) {
            Ok(n) => (0, n, 0),
            Err(_) => {
                let msg = b"result_encode_failed";
                let n = msg.len().min(out_error.len());
                out_error[..n].copy_from_slice(&msg[..n]);
                (1, 0, n)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manager_splits_proportionally_to_reported_cores() {
        let job = IntegrationJob {
            a: 0.0,
            b: 1.0,
            n: 100_000,
        };
        let mut mgr = IntegralManager::new(job, 2);
        let mut hello = [0u8; 4];
        payload::encode_hello(2, &mut hello).unwrap();
        mgr.on_worker_hello(0, &hello).unwrap();
        payload::encode_hello(4, &mut hello).unwrap();
        mgr.on_worker_hello(1, &hello).unwrap();

        let mut buf = [0u8; 28];
        let len0 = mgr.build_task(0, &mut buf).unwrap();
        let task0 = payload::decode_task(&buf[..len0]).unwrap();
        let len1 = mgr.build_task(1, &mut buf).unwrap();
        let task1 = payload::decode_task(&buf[..len1]).unwrap();

        assert_eq!(task0.a, 0.0);
        assert_eq!(task0.b, task1.a);
        assert_eq!(task1.b, 1.0);
        assert_eq!(task0.n + task1.n, 100_000);
        assert_eq!(mgr.total_cores, 6);
    }

    #[test]
    fn worker_executes_task_and_encodes_result() {
        let mut worker = IntegralWorker::new(4);
        let mut task_buf = [0u8; 28];
        payload::encode_task(
            &payload::Task {
                id: 1,
                a: 0.0,
                b: 1.0,
                n: 1_000_000,
                threads: 4,
            },
            &mut task_buf,
        )
        .unwrap();

        let mut result_buf = [0u8; 64];
        let mut error_buf = [0u8; 64];
        let (rc, result_len, _error_len) =
            worker.execute_task(&task_buf, &mut result_buf, &mut error_buf);
        assert_eq!(rc, 0);
        let (id, value) = payload::decode_result(&result_buf[..result_len]).unwrap();
        assert_eq!(id, 1);
        assert!((value - std::f64::consts::PI).abs() < 1e-6);
    }

    #[test]
    fn worker_rejects_malformed_task() {
        let mut worker = IntegralWorker::new(4);
        let mut result_buf = [0u8; 64];
        let mut error_buf = [0u8; 64];
        let (rc, _result_len, error_len) =
            worker.execute_task(b"too short", &mut result_buf, &mut error_buf);
        assert!(rc < 0);
        assert_eq!(&error_buf[..error_len], b"bad_task_format");
    }
}
