//! Host CLI entry point: one command per input line over stdin/stdout.
//!
//! No flags, no required environment variables — the port is chosen at
//! runtime via the `connect` directive (§6). `RUST_LOG` controls log
//! verbosity through `tracing-subscriber`'s `EnvFilter` (unset ⇒ `info`).

use std::io::{self, BufRead, Write};

use stitchforth::driver::Driver;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(
            |_| tracing_subscriber::EnvFilter::new("info"),
        ))
        .init();

    let mut driver = Driver::new();
    let stdin = io::stdin();

    loop {
        if driver.should_exit {
            break;
        }
        print!("> ");
        if io::stdout().flush().is_err() {
            std::process::exit(1);
        }

        let mut line = String::new();
        let bytes_read = match stdin.lock().read_line(&mut line) {
            Ok(n) => n,
            Err(e) => {
                eprintln!("stdin read failed: {e}");
                std::process::exit(1);
            }
        };
        if bytes_read == 0 {
            // EOF: behave like an explicit `exit`.
            break;
        }

        let line = line.trim_end_matches(['\n', '\r']);
        if line.trim().is_empty() {
            continue;
        }

        if let Err(e) = driver.process_line(line) {
            eprintln!("error: {e}");
        }
    }

    std::process::exit(0);
}
