//! Line-oriented command session

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::handler::{CommandHandler, Outcome};
use crate::reply::Reply;

/// Feed every input line to the handler and write one reply per command
///
/// Lines are read as raw bytes; a line that is not valid UTF-8 gets an
/// error reply and the session carries on.
pub fn run<R: BufRead, W: Write>(
    handler: &mut CommandHandler,
    mut input: R,
    out: &mut W,
) -> Result<()> {
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let n = input
            .read_until(b'\n', &mut buf)
            .context("failed to read command")?;
        if n == 0 {
            break;
        }

        let outcome = match std::str::from_utf8(&buf) {
            Ok(line) => handler.handle(line),
            Err(e) => {
                warn!("Rejected command: {}", e);
                Outcome::Reply(Reply::error("ERR invalid UTF-8"))
            }
        };

        match outcome {
            Outcome::Reply(reply) => {
                writeln!(out, "{}", reply)?;
                out.flush()?;
            }
            Outcome::Skip => {}
            Outcome::Quit => break,
        }
    }

    info!("Shell session closed");
    Ok(())
}
