use clap::{Args, Parser, Subcommand};

use crate::model::config::ChainStrategy;
use crate::model::order::{OrderId, Placement};

#[derive(Parser)]
#[command(name = "tch", about = concat!("tch v", env!("CARGO_PKG_VERSION"), " - todo lists kept in order by their links"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Run against a different project directory
    #[arg(short = 'C', long = "project-dir", global = true)]
    pub project_dir: Option<String>,

    /// Refuse to write unless the board is at this revision
    #[arg(long, global = true, value_name = "N")]
    pub if_revision: Option<u64>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new todo project in the current directory
    Init(InitArgs),
    /// List categories and their items in order
    List(ListArgs),
    /// Show one item or category, including its links
    Show(IdArg),
    /// Validate the board's links
    Check,
    /// Rebuild a chain from its stored links and print the order
    Sort(SortArgs),
    /// Add a category at the end of the board
    AddCategory(AddCategoryArgs),
    /// Add an item at the end of a category
    Add(AddArgs),
    /// Mark an item done (or not done with --undo)
    Done(DoneArgs),
    /// Change the title of an item or category
    Rename(RenameArgs),
    /// Add or remove an item's dependencies
    Dep(DepArgs),
    /// Move an item (reorder, or into another category with --to)
    Mv(MvArgs),
    /// Move (reorder) a category
    MvCategory(MvCategoryArgs),
    /// Delete an item
    Rm(IdArg),
    /// Delete a category and all its items
    RmCategory(IdArg),
    /// Read or change config.toml
    Config(ConfigCmd),
}

// ---------------------------------------------------------------------------
// Init args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct InitArgs {
    /// Board name (default: inferred from directory name)
    #[arg(long)]
    pub name: Option<String>,
    /// Create an initial category (repeatable, kept in the given order)
    #[arg(long = "category", value_name = "TITLE")]
    pub categories: Vec<String>,
    /// Reinitialize even if todo/ already exists
    #[arg(long)]
    pub force: bool,
}

// ---------------------------------------------------------------------------
// Read command args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ListArgs {
    /// Only this category
    #[arg(long)]
    pub category: Option<OrderId>,
    /// Filter items by tag
    #[arg(long)]
    pub tag: Option<String>,
    /// Hide done items
    #[arg(long)]
    pub open: bool,
}

#[derive(Args)]
pub struct IdArg {
    /// Item or category id
    pub id: OrderId,
}

#[derive(Args)]
pub struct SortArgs {
    /// Category whose items to order (default: the categories themselves)
    pub category: Option<OrderId>,
    /// Reconstruction strategy (default: from config)
    #[arg(long)]
    pub strategy: Option<ChainStrategy>,
}

// ---------------------------------------------------------------------------
// Write command args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct AddCategoryArgs {
    /// Category title
    pub title: String,
}

#[derive(Args)]
pub struct AddArgs {
    /// Category id
    pub category: OrderId,
    /// Item title; trailing #words become tags
    pub title: String,
    /// Depends on this item (repeatable)
    #[arg(long = "dep", value_name = "ID")]
    pub deps: Vec<OrderId>,
    /// Put the item at the top instead of the bottom
    #[arg(long)]
    pub top: bool,
}

#[derive(Args)]
pub struct DoneArgs {
    /// Item id
    pub id: OrderId,
    /// Mark as not done
    #[arg(long)]
    pub undo: bool,
}

#[derive(Args)]
pub struct RenameArgs {
    /// Item or category id
    pub id: OrderId,
    /// New title
    pub title: String,
}

#[derive(Args)]
pub struct DepArgs {
    /// Item id
    pub id: OrderId,
    /// Add these dependencies
    #[arg(long, value_name = "ID")]
    pub add: Vec<OrderId>,
    /// Remove these dependencies
    #[arg(long = "rm", value_name = "ID")]
    pub remove: Vec<OrderId>,
}

/// Where to put the moved element. Default: bottom.
#[derive(Args)]
#[group(multiple = false)]
pub struct PositionArgs {
    /// Move to the top
    #[arg(long)]
    pub top: bool,
    /// Move to the bottom
    #[arg(long)]
    pub bottom: bool,
    /// Move right after this id
    #[arg(long, value_name = "ID")]
    pub after: Option<OrderId>,
    /// Move right before this id
    #[arg(long, value_name = "ID")]
    pub before: Option<OrderId>,
}

impl PositionArgs {
    pub fn placement(&self) -> Placement {
        if self.top {
            Placement::Head
        } else if let Some(id) = self.after {
            Placement::After(id)
        } else if let Some(id) = self.before {
            Placement::Before(id)
        } else {
            Placement::Tail
        }
    }
}

#[derive(Args)]
pub struct MvArgs {
    /// Item id
    pub id: OrderId,
    /// Move into this category
    #[arg(long, value_name = "CATEGORY")]
    pub to: Option<OrderId>,
    #[command(flatten)]
    pub position: PositionArgs,
}

#[derive(Args)]
pub struct MvCategoryArgs {
    /// Category id
    pub id: OrderId,
    #[command(flatten)]
    pub position: PositionArgs,
}

// ---------------------------------------------------------------------------
// Config command
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ConfigCmd {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print a config value (e.g. order.strategy)
    Get(ConfigGetArgs),
    /// Set a config value
    Set(ConfigSetArgs),
}

#[derive(Args)]
pub struct ConfigGetArgs {
    /// Dotted key
    pub key: String,
}

#[derive(Args)]
pub struct ConfigSetArgs {
    /// Dotted key
    pub key: String,
    /// New value
    pub value: String,
}
