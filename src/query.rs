//! Query language for filtering tasks.
//!
//! A query is a whitespace-separated list of terms, all of which must match:
//! - `all` matches any status and lifts the snooze filter
//! - `key:value` is substring containment on a field
//! - `key:<value`, `key:>value`, `key:=value` compare the field as text
//! - any other word is a byte substring search over the task body
//!
//! Prefixing a term with `-` negates it. Unless lifted, tasks snoozed until
//! today or later are hidden.

use chrono::{Local, NaiveDate};

use crate::error::Error;
use crate::task::{Status, Task, STATUS_KEY};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Less,
    Greater,
    Equal,
}

/// What a substring term searches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Field(String),
    Body,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    MatchAll,
    Not(Box<Term>),
    Compare {
        key: String,
        op: CompareOp,
        value: String,
    },
    Contains {
        target: Target,
        value: String,
    },
}

impl Term {
    pub fn matches(&self, task: &Task) -> bool {
        match self {
            Term::MatchAll => true,
            Term::Not(inner) => !inner.matches(task),
            Term::Compare { key, op, value } => {
                let field = task.field(key);
                match op {
                    CompareOp::Less => field.is_some_and(|f| f < value.as_str()),
                    CompareOp::Greater => field.is_some_and(|f| f > value.as_str()),
                    CompareOp::Equal => field.unwrap_or("") == value,
                }
            }
            Term::Contains {
                target: Target::Field(key),
                value,
            } => task.field(key).unwrap_or("").contains(value.as_str()),
            Term::Contains {
                target: Target::Body,
                value,
            } => contains_bytes(task.body(), value.as_bytes()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryError {
    pub message: String,
    pub position: usize,
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}", self.message, self.position)
    }
}

impl std::error::Error for QueryError {}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::InvalidArgument(format!("query: {err}"))
    }
}

/// A compiled query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    terms: Vec<Term>,
    needs_done: bool,
    /// Snoozed tasks whose date is at or after this `YYYY-MM-DD` are hidden.
    snooze_cutoff: Option<String>,
}

impl Query {
    /// Compile `input` relative to the local date.
    pub fn parse(input: &str) -> Result<Self, QueryError> {
        Self::parse_at(input, Local::now().date_naive())
    }

    /// Compile `input` with the snooze filter evaluated against `today`.
    pub fn parse_at(input: &str, today: NaiveDate) -> Result<Self, QueryError> {
        let mut terms = Vec::new();
        let mut needs_done = false;
        let mut snooze_filter = true;

        for token in tokenize(input) {
            let (negated, text, pos) = match token.text.strip_prefix('-') {
                Some(rest) => (true, rest, token.pos + 1),
                None => (false, token.text, token.pos),
            };
            if text.is_empty() {
                return Err(QueryError {
                    message: "empty term after '-'".to_string(),
                    position: token.pos,
                });
            }

            let term = if text == "all" {
                if !negated {
                    needs_done = true;
                    snooze_filter = false;
                }
                Term::MatchAll
            } else if let Some((key, value)) = text.split_once(':') {
                if key.is_empty() {
                    return Err(QueryError {
                        message: format!("missing field name in '{text}'"),
                        position: pos,
                    });
                }
                let key = key.to_lowercase();
                if key == STATUS_KEY {
                    if value.contains("done") || value.contains("mute") {
                        needs_done = true;
                    }
                    if value.contains("snooze") {
                        snooze_filter = false;
                    }
                }
                field_term(key, value)
            } else {
                Term::Contains {
                    target: Target::Body,
                    value: text.to_string(),
                }
            };

            terms.push(if negated {
                Term::Not(Box::new(term))
            } else {
                term
            });
        }

        Ok(Self {
            terms,
            needs_done,
            snooze_cutoff: snooze_filter.then(|| today.format("%Y-%m-%d").to_string()),
        })
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    /// Whether done and muted tasks must be scanned to answer this query.
    pub fn needs_done(&self) -> bool {
        self.needs_done
    }

    pub fn matches(&self, task: &Task) -> bool {
        if !self.terms.iter().all(|term| term.matches(task)) {
            return false;
        }
        match (&self.snooze_cutoff, task.status()) {
            (Some(today), Status::Snoozed(until)) => until < *today,
            _ => true,
        }
    }
}

fn field_term(key: String, value: &str) -> Term {
    let (op, rest) = match value.chars().next() {
        Some('<') => (Some(CompareOp::Less), &value[1..]),
        Some('>') => (Some(CompareOp::Greater), &value[1..]),
        Some('=') => (Some(CompareOp::Equal), &value[1..]),
        _ => (None, value),
    };
    match op {
        Some(op) => Term::Compare {
            key,
            op,
            value: rest.to_string(),
        },
        None => Term::Contains {
            target: Target::Field(key),
            value: value.to_string(),
        },
    }
}

struct Token<'a> {
    text: &'a str,
    pos: usize,
}

fn tokenize(input: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut start = None;
    for (pos, ch) in input.char_indices() {
        match (ch.is_whitespace(), start) {
            (true, Some(begin)) => {
                tokens.push(Token {
                    text: &input[begin..pos],
                    pos: begin,
                });
                start = None;
            }
            (false, None) => start = Some(pos),
            _ => {}
        }
    }
    if let Some(begin) = start {
        tokens.push(Token {
            text: &input[begin..],
            pos: begin,
        });
    }
    tokens
}

fn contains_bytes(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|window| window == needle)
}
