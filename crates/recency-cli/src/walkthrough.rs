//! Scripted tour of the cache: fill it, overflow it, promote and update.

use std::io::Write;

use anyhow::Result;
use recency::LruCache;

use crate::handler::{CommandHandler, Outcome};

const SCRIPT: &[(&str, &str)] = &[
    ("SET a 1", "add an entry"),
    ("GET a", "read it back"),
    ("ITEMS", ""),
    ("SET b 2", ""),
    ("ITEMS", ""),
    ("SET c 3", ""),
    ("ITEMS", ""),
    ("SET d 4", "one entry too many"),
    ("ITEMS", "'a' falls off the LRU end"),
    ("GET b", "reading 'b' makes it most recently used"),
    ("ITEMS", ""),
    ("DETAIL c", "inspect without promoting"),
    ("SET c winning", "updating 'c' counts as an access"),
    ("DETAIL c", ""),
    ("ITEMS", ""),
    ("STATS", ""),
];

/// Run the script against a fresh cache, echoing each command and its reply
pub fn run<W: Write>(capacity: usize, out: &mut W) -> Result<()> {
    let cache = LruCache::new(capacity)?;
    let mut handler = CommandHandler::new(cache);

    writeln!(out, "# capacity {}", capacity)?;
    for (command, note) in SCRIPT {
        if !note.is_empty() {
            writeln!(out, "# {}", note)?;
        }
        writeln!(out, "> {}", command)?;
        if let Outcome::Reply(reply) = handler.handle(command) {
            writeln!(out, "{}", reply)?;
        }
    }

    Ok(())
}
