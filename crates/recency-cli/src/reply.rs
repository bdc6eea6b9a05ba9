//! Replies written back to the shell, one line each
//!
//! Rendering follows redis-cli's text conventions: `(nil)`, `(integer) n`,
//! `(error) ...`, quoted bulk strings. Arrays stay on one line.

use std::fmt;

/// Reply to a single shell command
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Status text: OK
    Simple(String),
    /// Error text: (error) ERR ...
    Error(String),
    /// Integer: (integer) 3
    Integer(i64),
    /// Possibly-absent string: "value" or (nil)
    Bulk(Option<String>),
    /// List of replies: ["a", "b"]
    Array(Vec<Reply>),
}

impl Reply {
    pub fn ok() -> Self {
        Reply::Simple("OK".to_string())
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Reply::Error(msg.into())
    }

    pub fn bulk(value: impl Into<String>) -> Self {
        Reply::Bulk(Some(value.into()))
    }

    pub fn nil() -> Self {
        Reply::Bulk(None)
    }

    pub fn pair(key: &str, value: &str) -> Self {
        Reply::Array(vec![Reply::bulk(key), Reply::bulk(value)])
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Simple(s) => write!(f, "{}", s),
            Reply::Error(e) => write!(f, "(error) {}", e),
            Reply::Integer(i) => write!(f, "(integer) {}", i),
            Reply::Bulk(None) => write!(f, "(nil)"),
            Reply::Bulk(Some(s)) => write!(f, "{:?}", s),
            Reply::Array(items) if items.is_empty() => write!(f, "(empty array)"),
            Reply::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}
