//! Chatbridge server binary.
//! Run with: cargo run --bin chatbridge-server

use std::process::ExitCode;

use chatbridge::start_chatbridge;

fn main() -> ExitCode {
    start_chatbridge::run()
}
