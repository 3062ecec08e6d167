//! Store Credit Engine CLI
//!
//! Replays store-credit and discount operations from a CSV file and
//! prints the resulting balance summaries to stdout.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- operations.csv > balances.csv
//! cargo run -- --referral-reward 1000 --ip-daily-cap 1 operations.csv > balances.csv
//! ```
//!
//! Log verbosity follows `RUST_LOG`; rejected operations are logged and
//! skipped rather than aborting the run.
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Fatal error (missing arguments, file not found, output I/O)

use store_credit_engine::cli;
use store_credit_engine::core::CheckoutEngine;
use store_credit_engine::replay::Replayer;
use std::process;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = cli::parse_args();
    let engine = CheckoutEngine::new(args.to_policy());
    let mut replayer = Replayer::new(engine);

    let mut output = std::io::stdout();
    if let Err(e) = replayer.run(&args.input_file, &mut output) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
