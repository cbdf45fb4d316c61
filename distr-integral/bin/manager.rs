//! `distr-manager <required-workers> <host> <port> --a <A> --b <B> --n <N> [--timeout
//! <sec>]` — admits `required-workers` workers, partitions `[a, b]` proportionally to
//! their reported core counts, and prints the summed integral on success, mirroring
//! `examples/original_source/examples/manager_main.c`'s stdout contract.

use std::time::Instant;

use clap::Parser;
use distr_core::manager::{self, ManagerConfig};
use distr_integral::{IntegralManager, IntegrationJob};

#[derive(Parser, Debug)]
#[command(name = "distr-manager", about = "Coordinate a trapezoidal integration run")]
struct Args {
    /// Number of workers to wait for before dispatching
    required_workers: u32,
    /// Address to listen on
    host: String,
    /// Port to listen on
    port: u16,
    #[arg(long, default_value_t = 0.0)]
    a: f64,
    #[arg(long, default_value_t = 1.0)]
    b: f64,
    #[arg(long, default_value_t = 100_000)]
    n: u64,
    #[arg(long, default_value_t = 30)]
    timeout: u32,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let cfg = match ManagerConfig::new(&args.host, args.port, args.required_workers, args.timeout) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("distr-manager: {e}");
            std::process::exit(2);
        }
    };

    let job = IntegrationJob {
        a: args.a,
        b: args.b,
        n: args.n,
    };
    let mut ops = IntegralManager::new(job, args.required_workers as usize);

    let t0 = Instant::now();
    let rc = manager::run(&cfg, &mut ops);
    let elapsed = t0.elapsed();

    if rc == manager::EXIT_SUCCESS {
        println!("INTEGRAL={:.12}", ops.total);
        println!("TOTAL_TIME_SEC={:.6}", elapsed.as_secs_f64());
        println!("TOTAL_CORES={}", ops.total_cores);
    }
    std::process::exit(rc);
}
