//! todo - append-only personal task tracker
//!
//! This library provides the core of the `todo` CLI: task files, lists,
//! queries and the edit workflows built on them.
//!
//! # Core Concepts
//!
//! - **Task**: one file, `<id>.todo` while open and `<id>.done` once done or
//!   muted, holding a sequence of timestamped blocks
//! - **List**: a directory of tasks with a shared cache
//! - **Query**: a line of terms filtering a list
//! - **Bulk edit**: one document that edits every task in its manifest
//!
//! # Module Organization
//!
//! - `record`: block format on disk
//! - `task`: task state folded from its blocks
//! - `list`: reading, writing and creating tasks in a directory
//! - `registry`: shared lists under one root, path lookup
//! - `query`: query parsing and evaluation
//! - `document`: editable task documents
//! - `bulk`: multi-task edit documents
//! - `session`: interactive editing through a document host
//! - `editor`: external editor invocation
//! - `import`: git commit log importer
//! - `sort`: listing orders
//! - `config`: configuration loading from `.todo.toml`
//! - `output`: human and JSON output for the CLI
//! - `cli`: command-line interface using clap
//! - `error`: error types and result aliases

pub mod bulk;
pub mod cli;
pub mod config;
pub mod document;
pub mod editor;
pub mod error;
pub mod import;
pub mod list;
pub mod output;
pub mod query;
pub mod record;
pub mod registry;
pub mod session;
pub mod sort;
pub mod task;

pub use error::{Error, Result};
