//! `distr-worker --host <H> --port <P> [--cores N] [--timeout S]` — connects to a
//! manager, advertises its core count, runs whatever task it's assigned inside the
//! sandbox, and reports the result, mirroring
//! `examples/original_source/examples/worker_main.c`'s default configuration.

use clap::Parser;
use distr_core::worker::{self, WorkerConfig};
use distr_integral::IntegralWorker;

#[derive(Parser, Debug)]
#[command(name = "distr-worker", about = "Join a distr-manager run and execute one task")]
struct Args {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,
    #[arg(long, default_value_t = 5555)]
    port: u16,
    #[arg(long, default_value_t = 1)]
    cores: u32,
    #[arg(long, default_value_t = 30)]
    timeout: u32,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let cfg = match WorkerConfig::new(&args.host, args.port, args.cores, args.timeout) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("distr-worker: {e}");
            std::process::exit(2);
        }
    };

    let mut ops = IntegralWorker::new(args.cores);
    let rc = worker::run(&cfg, &mut ops);
    std::process::exit(rc);
}
