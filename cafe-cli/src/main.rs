//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

use std::io::Write;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    if let Err(err) = cafe_cli::run() {
        let _ = writeln!(std::io::stderr(), "cafe: {err}");
        std::process::exit(1);
    }
}
