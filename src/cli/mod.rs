//! Command-line interface for todo
//!
//! This module defines the CLI structure using clap derive macros.
//! Each group of subcommands lives in its own submodule.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::config::{self, Config};
use crate::error::{Error, Result};
use crate::list::{is_valid_id, List};
use crate::output::OutputOptions;
use crate::registry::Registry;
use crate::task::Task;

mod import;
mod lists;
mod status;
mod task;

/// todo - append-only personal task tracker
///
/// Tasks are plain files under a root directory. Every change appends a
/// timestamped block, so a task file is its own history.
#[derive(Parser, Debug)]
#[command(name = "todo")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Root directory of the todo tree (defaults to ~/todo)
    #[arg(long, global = true, env = "TODO_ROOT")]
    pub root: Option<PathBuf>,

    /// List to work on, relative to the root
    #[arg(short = 'd', long = "list", global = true)]
    pub list: Option<String>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the full history of a task
    Show {
        /// Task ID
        id: String,
    },

    /// List tasks matching a query (default: all)
    Search {
        /// Query terms, e.g. `prio:high fix`; put negated terms after `--`
        query: Vec<String>,

        /// Sort by title, id or any header key
        #[arg(long, default_value = "title")]
        sort: String,
    },

    /// Create a task
    New {
        /// Task title
        #[arg(long)]
        title: Option<String>,

        /// Explicit task ID (default: next free number)
        #[arg(long)]
        id: Option<String>,

        /// Extra header entries as key=value
        #[arg(long = "header", value_name = "KEY=VALUE")]
        headers: Vec<String>,

        /// Opening comment; without one and without --title an editor opens
        comment: Vec<String>,
    },

    /// Edit a task, or every task matching a query, in an editor
    Edit {
        /// Task ID or query terms
        #[arg(required = true)]
        targets: Vec<String>,
    },

    /// Mark tasks done
    Done {
        /// Task ID or query terms
        #[arg(required = true)]
        targets: Vec<String>,
    },

    /// Mute tasks
    Mute {
        /// Task ID or query terms
        #[arg(required = true)]
        targets: Vec<String>,
    },

    /// Hide tasks from default searches for a number of days
    Snooze {
        /// Days to snooze (default from config)
        #[arg(long)]
        days: Option<u32>,

        /// Task ID or query terms
        #[arg(required = true)]
        targets: Vec<String>,
    },

    /// Show the sublists of the current list
    Lists,

    /// Resolve a path like `/todo/work/12` and show what it names
    Look {
        /// Path to resolve
        path: String,
    },

    /// Import the commit log of a git repository as tasks
    Import {
        /// Path to the repository
        repo: PathBuf,
    },
}

/// Everything a command needs: the tree, its config and the current list.
pub(crate) struct Context {
    pub registry: Registry,
    pub config: Config,
    pub list: Arc<List>,
    pub output: OutputOptions,
}

impl Context {
    fn open(root: Option<PathBuf>, list: Option<String>, output: OutputOptions) -> Result<Self> {
        let root = config::resolve_root(root)?;
        let config = Config::load_from_root(&root);
        let registry = Registry::from_config(&root, &config);
        let name = list.unwrap_or_else(|| config.default_list.clone());
        let list = registry.list(&name)?;
        Ok(Self {
            registry,
            config,
            list,
            output,
        })
    }
}

/// What a list of command arguments picked out.
pub(crate) enum Selection {
    Single(Arc<Task>),
    Many(Vec<Arc<Task>>),
}

/// A lone argument naming an existing task selects it; anything else is a
/// query.
pub(crate) fn select(list: &List, targets: &[String]) -> Result<Selection> {
    if let [id] = targets {
        if is_valid_id(id) && list.exists(id) {
            return Ok(Selection::Single(list.read(id)?));
        }
    }
    let query = targets.join(" ");
    let tasks = list.search_str(&query)?;
    if tasks.is_empty() {
        return Err(Error::NotFound(query));
    }
    Ok(Selection::Many(tasks))
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let output = OutputOptions {
            json: self.json,
            quiet: self.quiet,
        };
        let ctx = Context::open(self.root, self.list, output)?;

        match self.command {
            Commands::Show { id } => task::run_show(&ctx, task::ShowOptions { id }),
            Commands::Search { query, sort } => {
                task::run_search(&ctx, task::SearchOptions { query, sort })
            }
            Commands::New {
                title,
                id,
                headers,
                comment,
            } => task::run_new(
                &ctx,
                task::NewOptions {
                    title,
                    id,
                    headers,
                    comment: comment.join(" "),
                },
            ),
            Commands::Edit { targets } => task::run_edit(&ctx, task::EditOptions { targets }),
            Commands::Done { targets } => status::run(
                &ctx,
                status::StatusOptions {
                    targets,
                    change: status::Change::Done,
                },
            ),
            Commands::Mute { targets } => status::run(
                &ctx,
                status::StatusOptions {
                    targets,
                    change: status::Change::Mute,
                },
            ),
            Commands::Snooze { days, targets } => status::run(
                &ctx,
                status::StatusOptions {
                    targets,
                    change: status::Change::Snooze(days.unwrap_or(ctx.config.snooze_days)),
                },
            ),
            Commands::Lists => lists::run_lists(&ctx),
            Commands::Look { path } => lists::run_look(&ctx, lists::LookOptions { path }),
            Commands::Import { repo } => import::run(&ctx, import::ImportOptions { repo }),
        }
    }
}
