//! Memo CLI - capture notes through the memo backend from a terminal
//!
//! # Usage
//!
//! ```bash
//! # Build the CLI binary
//! cargo build --bin memo-cli
//!
//! # List targets
//! ./target/debug/memo-cli -e "/targets"
//!
//! # Send one message to the last selected target
//! ./target/debug/memo-cli -e "buy milk"
//!
//! # JSON event output for scripting
//! ./target/debug/memo-cli -e "/select db1" --json | jq .
//!
//! # Run a script of commands
//! ./target/debug/memo-cli -f capture.txt
//!
//! # Interactive REPL mode (when no -e or -f provided)
//! ./target/debug/memo-cli
//! ```

use anyhow::Result;
use clap::Parser;

use memo_lib::cli::{execute_batch, execute_once, initialize, run_repl, Args, ReplCommand};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut ctx = initialize(&args).await?;

    if let Some(ref line) = args.execute {
        execute_once(&mut ctx, ReplCommand::parse(line)).await
    } else if let Some(ref file) = args.file {
        execute_batch(&mut ctx, file).await
    } else {
        run_repl(&mut ctx).await
    }
}
