//! Command handler for the cache shell

use recency::LruCache;
use tracing::{debug, info};

use crate::reply::Reply;

/// What the shell should do after a line has been handled
#[derive(Debug, PartialEq)]
pub enum Outcome {
    /// Write this reply
    Reply(Reply),
    /// Blank line or comment, nothing to write
    Skip,
    /// End the session
    Quit,
}

pub struct CommandHandler {
    cache: LruCache<String, String>,
}

impl CommandHandler {
    pub fn new(cache: LruCache<String, String>) -> Self {
        Self { cache }
    }

    pub fn handle(&mut self, line: &str) -> Outcome {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Outcome::Skip;
        }

        let (command, rest) = split_word(line);
        let command = command.to_uppercase();
        let args: Vec<&str> = rest.split_whitespace().collect();
        debug!(command = %command, args = args.len(), "handling command");

        let reply = match command.as_str() {
            "QUIT" | "EXIT" => return Outcome::Quit,
            "PING" => self.handle_ping(&args),
            "SET" => self.handle_set(rest),
            "GET" => self.handle_get(&args),
            "PEEK" => self.handle_peek(&args),
            "DETAIL" => self.handle_detail(&args),
            "DEL" => self.handle_del(&args),
            "EXISTS" => self.handle_exists(&args),
            "KEYS" => self.handle_keys(&args),
            "VALUES" => self.handle_values(&args),
            "ITEMS" => self.handle_items(&args),
            "LEN" => self.handle_len(&args),
            "POP" => self.handle_pop(&args),
            "STATS" => self.handle_stats(&args),
            "CLEAR" => self.handle_clear(&args),
            _ => Reply::error(format!("ERR unknown command '{}'", command)),
        };

        Outcome::Reply(reply)
    }

    fn handle_ping(&self, args: &[&str]) -> Reply {
        match args {
            [] => Reply::Simple("PONG".to_string()),
            _ => Reply::bulk(args.join(" ")),
        }
    }

    fn handle_set(&mut self, rest: &str) -> Reply {
        // Everything after the key is the value, inner whitespace included
        let (key, value) = split_word(rest);
        if key.is_empty() || value.is_empty() {
            return wrong_arity("set");
        }

        if let Some((evicted, _)) = self.cache.set(key.to_string(), value.to_string()) {
            info!(key = %evicted, "cache full, evicted least recently used entry");
        }
        Reply::ok()
    }

    fn handle_get(&mut self, args: &[&str]) -> Reply {
        match args {
            [key] => Reply::Bulk(self.cache.get(*key).cloned()),
            _ => wrong_arity("get"),
        }
    }

    fn handle_peek(&self, args: &[&str]) -> Reply {
        match args {
            [key] => Reply::Bulk(self.cache.peek(*key).cloned()),
            _ => wrong_arity("peek"),
        }
    }

    fn handle_detail(&self, args: &[&str]) -> Reply {
        let key = match args {
            [key] => *key,
            _ => return wrong_arity("detail"),
        };

        match self.cache.detail(key) {
            Some(detail) => Reply::Array(vec![
                Reply::bulk(detail.key.as_str()),
                Reply::bulk(detail.value.as_str()),
                Reply::Bulk(detail.previous.cloned()),
                Reply::Bulk(detail.next.cloned()),
            ]),
            None => Reply::nil(),
        }
    }

    fn handle_del(&mut self, args: &[&str]) -> Reply {
        if args.is_empty() {
            return wrong_arity("del");
        }

        let deleted = args.iter().filter(|key| self.cache.delete(**key)).count();
        Reply::Integer(deleted as i64)
    }

    fn handle_exists(&self, args: &[&str]) -> Reply {
        if args.is_empty() {
            return wrong_arity("exists");
        }

        let count = args.iter().filter(|key| self.cache.contains(**key)).count();
        Reply::Integer(count as i64)
    }

    fn handle_keys(&self, args: &[&str]) -> Reply {
        if !args.is_empty() {
            return wrong_arity("keys");
        }
        Reply::Array(self.cache.keys().into_iter().map(Reply::bulk).collect())
    }

    fn handle_values(&self, args: &[&str]) -> Reply {
        if !args.is_empty() {
            return wrong_arity("values");
        }
        Reply::Array(self.cache.values().into_iter().map(Reply::bulk).collect())
    }

    fn handle_items(&self, args: &[&str]) -> Reply {
        if !args.is_empty() {
            return wrong_arity("items");
        }
        Reply::Array(
            self.cache
                .iter()
                .map(|(key, value)| Reply::pair(key, value))
                .collect(),
        )
    }

    fn handle_len(&self, args: &[&str]) -> Reply {
        if !args.is_empty() {
            return wrong_arity("len");
        }
        Reply::Integer(self.cache.len() as i64)
    }

    fn handle_pop(&mut self, args: &[&str]) -> Reply {
        if !args.is_empty() {
            return wrong_arity("pop");
        }
        match self.cache.pop_lru() {
            Some((key, value)) => Reply::pair(&key, &value),
            None => Reply::nil(),
        }
    }

    fn handle_stats(&self, args: &[&str]) -> Reply {
        if !args.is_empty() {
            return wrong_arity("stats");
        }

        let stats = self.cache.stats();
        Reply::Simple(format!(
            "len:{} capacity:{} hits:{} misses:{} inserts:{} updates:{} evictions:{} hit_ratio:{:.2}",
            self.cache.len(),
            self.cache.capacity(),
            stats.hits(),
            stats.misses(),
            stats.inserts(),
            stats.updates(),
            stats.evictions(),
            stats.hit_ratio(),
        ))
    }

    fn handle_clear(&mut self, args: &[&str]) -> Reply {
        if !args.is_empty() {
            return wrong_arity("clear");
        }
        self.cache.clear();
        self.cache.reset_stats();
        Reply::ok()
    }
}

/// Split off the first whitespace-delimited word, returning it and the rest
/// of the line with the separating whitespace removed.
fn split_word(line: &str) -> (&str, &str) {
    let line = line.trim_start();
    match line.find(char::is_whitespace) {
        Some(end) => (&line[..end], line[end..].trim_start()),
        None => (line, ""),
    }
}

fn wrong_arity(command: &str) -> Reply {
    Reply::error(format!(
        "ERR wrong number of arguments for '{}' command",
        command
    ))
}
