//! Entry point for the `smartoutletd` binary.

use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser;
use smartoutletd::DaemonArgs;

fn main() -> ExitCode {
    let args = DaemonArgs::parse();
    match smartoutletd::run_daemon(&args) {
        Ok(_) => ExitCode::SUCCESS,
        Err(error) => {
            let _ = writeln!(io::stderr().lock(), "smartoutletd: {error}");
            ExitCode::FAILURE
        }
    }
}
