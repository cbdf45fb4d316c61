/*! Coordination core for a short-lived distributed computation across a fixed set of
worker processes connecting to a central manager.

The manager partitions an application-defined job across admitted workers, dispatches
sub-tasks, and aggregates results; workers execute their assigned sub-task under a hard
wall-clock timeout in an isolated child process. This crate is the protocol core only:
length-prefixed wire framing with per-call timeouts, the manager/worker lifecycle state
machines, and sandboxed task execution. It knows nothing about what a "task" or
"result" actually mean — that's the job of an application implementing [`ManagerOps`]
and [`WorkerOps`] (see the `distr-integral` crate for a worked example: a trapezoidal
numerical integrator).

```no_run
use distr_core::{manager, adapter::ManagerOps};

struct SumOps { total: f64 }

impl ManagerOps for SumOps {
    fn on_worker_hello(&mut self, _i: usize, _payload: &[u8]) -> Result<(), String> { Ok(()) }
    fn build_task(&mut self, index: usize, out: &mut [u8]) -> Result<usize, String> {
        out[0] = index as u8;
        Ok(1)
    }
    fn on_worker_result(&mut self, _i: usize, payload: &[u8]) -> Result<(), String> {
        self.total += payload[0] as f64;
        Ok(())
    }
}

let cfg = manager::ManagerConfig::new("0.0.0.0", 5555, 4, 30).unwrap();
let mut ops = SumOps { total: 0.0 };
std::process::exit(manager::run(&cfg, &mut ops));
```

Non-goals (binding; see the project's design notes for the full rationale): no dynamic
worker membership, no retry of failed sub-tasks, no persistence, no wire
authentication/encryption, no sharding beyond one TASK→RESULT round trip per worker, no
streaming partial results.
*/

pub mod adapter;
pub mod deadline;
pub mod error;
pub mod manager;
pub mod partition;
pub mod sandbox;
pub mod worker;
pub mod wire;

pub use adapter::{ManagerOps, WorkerOps};
