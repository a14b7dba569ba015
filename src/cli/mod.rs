//! CLI front end for the memo client.
//!
//! The CLI drives the same `AppController` any other front end would. Instead
//! of reacting to events as they arrive, it drains the controller's event
//! channel after every command and prints what happened.
//!
//! ```text
//! +-----------------+     +-------------+     +---------------+
//! | AppController   | --> | ChannelSink | --> | output.rs     |
//! | (operations)    |     | (emit())    |     | (print/JSON)  |
//! +-----------------+     +-------------+     +---------------+
//! ```
//!
//! # REPL Mode
//!
//! When no line is provided via `-e` or `-f`, the CLI enters interactive REPL
//! mode. See `repl.rs` for the command list.

mod args;
mod bootstrap;
mod output;
mod repl;
mod runner;

pub use args::Args;
pub use bootstrap::{initialize, CliContext};
pub use repl::{run_repl, ReplCommand};
pub use runner::{execute_batch, execute_once};
