//! untrack-url entry point.
//!
//! Resolves one dirty link and either prints it or opens it in the default
//! browser. Logging goes to stderr so stdout carries only the clean URL.

use std::process::ExitCode;

mod cli;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    cli::run().await
}
