mod init;
pub use init::cmd_init;

use std::path::PathBuf;

use tracing::debug;

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::config_io;
use crate::io::lock::FileLock;
use crate::io::project_io::{self, ProjectError, TODO_DIR};
use crate::model::board::BoardFile;
use crate::model::config::{Config, OrderConfig};
use crate::model::order::{LinkChanges, OrderId, Orderable, Placement};
use crate::model::project::Project;
use crate::model::todo::{TodoCategory, TodoItem, parse_title_and_tags};
use crate::ops::chain::{OrderError, chain_order, join_ids};
use crate::ops::check::{self, CheckError, CheckWarning};

/// Settings shared by every command, taken from the global flags
pub struct Context {
    pub json: bool,
    /// Set by -C; otherwise the project is discovered from the working directory
    pub project_dir: Option<PathBuf>,
    /// Set by --if-revision
    pub if_revision: Option<u64>,
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let project_dir = match cli.project_dir {
        Some(ref dir) => Some(
            std::fs::canonicalize(dir)
                .map_err(|e| format!("cannot resolve -C path '{}': {}", dir, e))?,
        ),
        None => None,
    };
    let ctx = Context {
        json: cli.json,
        project_dir,
        if_revision: cli.if_revision,
    };

    match cli.command {
        Commands::Init(args) => cmd_init(args, &ctx),

        // Read commands
        Commands::List(args) => cmd_list(args, &ctx),
        Commands::Show(args) => cmd_show(args, &ctx),
        Commands::Check => cmd_check(&ctx),
        Commands::Sort(args) => cmd_sort(args, &ctx),

        // Write commands
        Commands::AddCategory(args) => cmd_add_category(args, &ctx),
        Commands::Add(args) => cmd_add(args, &ctx),
        Commands::Done(args) => cmd_done(args, &ctx),
        Commands::Rename(args) => cmd_rename(args, &ctx),
        Commands::Dep(args) => cmd_dep(args, &ctx),
        Commands::Mv(args) => cmd_mv(args, &ctx),
        Commands::MvCategory(args) => cmd_mv_category(args, &ctx),
        Commands::Rm(args) => cmd_rm(args, &ctx),
        Commands::RmCategory(args) => cmd_rm_category(args, &ctx),

        Commands::Config(args) => cmd_config(args, &ctx),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn project_root(ctx: &Context) -> Result<PathBuf, ProjectError> {
    let start = match ctx.project_dir {
        Some(ref dir) => dir.clone(),
        None => std::env::current_dir()?,
    };
    project_io::discover_project(&start)
}

fn load_project_ctx(ctx: &Context) -> Result<Project, ProjectError> {
    project_io::load_project(&project_root(ctx)?)
}

/// Lock the project, then load it. The lock must be held until the board
/// has been saved.
fn load_project_locked(ctx: &Context) -> Result<(Project, FileLock), ProjectError> {
    let root = project_root(ctx)?;
    let lock = FileLock::acquire_default(&root.join(TODO_DIR))?;
    let project = project_io::load_project(&root)?;
    Ok((project, lock))
}

/// Config and board as stored, without putting any chain in order. Used by
/// commands that must work on boards whose links are broken.
fn load_raw_board(ctx: &Context) -> Result<(Config, BoardFile), ProjectError> {
    let todo_dir = project_root(ctx)?.join(TODO_DIR);
    let (config, _) = config_io::read_config(&todo_dir)?;
    let file = project_io::read_board_file(&todo_dir)?
        .unwrap_or_else(|| BoardFile::new(&config.board.name));
    Ok((config, file))
}

/// Save the board and report what a write command did.
fn finish_write(
    ctx: &Context,
    project: &mut Project,
    id: Option<OrderId>,
    changes: LinkChanges,
    summary: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let revision = project_io::save_project(project, ctx.if_revision)?;
    debug!(revision, changed = changes.len(), "{}", summary);
    if ctx.json {
        let out = WriteJson {
            id,
            revision,
            changed: changes,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{}", summary);
        for line in format_changes(&changes) {
            println!("{}", line);
        }
    }
    Ok(())
}

fn find_item(project: &Project, id: OrderId) -> Result<TodoItem, String> {
    project
        .board
        .item(id)
        .cloned()
        .ok_or_else(|| format!("item not found: {}", id))
}

fn ordered_ids<T: Orderable>(elements: &[T], config: &OrderConfig) -> Result<Vec<OrderId>, OrderError> {
    Ok(chain_order(elements, config)?
        .into_iter()
        .map(|p| elements[p].id())
        .collect())
}

// ---------------------------------------------------------------------------
// Read command handlers
// ---------------------------------------------------------------------------

fn cmd_list(args: ListArgs, ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let project = load_project_ctx(ctx)?;

    if let Some(id) = args.category
        && project.board.category(id).is_none()
    {
        return Err(format!("category not found: {}", id).into());
    }
    let categories: Vec<&TodoCategory> = project
        .board
        .categories()
        .iter()
        .filter(|c| args.category.is_none_or(|id| c.id == id))
        .collect();
    let visible = |item: &&TodoItem| {
        (!args.open || !item.done)
            && args
                .tag
                .as_deref()
                .is_none_or(|tag| item.tags.iter().any(|t| t == tag))
    };

    if ctx.json {
        let out = BoardJson {
            name: project.name.clone(),
            revision: project.revision,
            categories: categories
                .iter()
                .map(|c| category_to_json(c, c.items.iter().filter(visible)))
                .collect(),
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else if categories.is_empty() {
        println!("no categories");
    } else {
        for (i, category) in categories.iter().enumerate() {
            if i > 0 {
                println!();
            }
            for line in format_category_listing(category, category.items.iter().filter(visible)) {
                println!("{}", line);
            }
        }
    }
    Ok(())
}

fn cmd_show(args: IdArg, ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let project = load_project_ctx(ctx)?;

    if let Some(item) = project.board.item(args.id) {
        let category = project
            .board
            .category(item.category_id)
            .ok_or_else(|| format!("category not found: {}", item.category_id))?;
        if ctx.json {
            println!("{}", serde_json::to_string_pretty(&item_to_json(item))?);
        } else {
            for line in format_item_detail(item, category) {
                println!("{}", line);
            }
        }
    } else if let Some(category) = project.board.category(args.id) {
        if ctx.json {
            let out = category_to_json(category, &category.items);
            println!("{}", serde_json::to_string_pretty(&out)?);
        } else {
            for line in format_category_detail(category) {
                println!("{}", line);
            }
        }
    } else {
        return Err(format!("no item or category with id {}", args.id).into());
    }
    Ok(())
}

fn cmd_check(ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let (_, file) = load_raw_board(ctx)?;
    let result = check::check_board(&file.categories);

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    if !result.errors.is_empty() {
        println!("Errors:");
        for err in &result.errors {
            let line = match err {
                CheckError::AsymmetricLink {
                    collection,
                    id,
                    neighbor,
                    side,
                } => format!(
                    "[{}] {} has {} neighbor {}, which does not link back",
                    collection,
                    id,
                    match side {
                        check::LinkSide::Left => "left",
                        check::LinkSide::Right => "right",
                    },
                    neighbor
                ),
                CheckError::SelfReference { collection, id } => {
                    format!("[{}] {} is its own neighbor", collection, id)
                }
                CheckError::DanglingReference {
                    collection,
                    id,
                    neighbor,
                } => format!("[{}] {} points at missing {}", collection, id, neighbor),
                CheckError::DuplicateId { id, collections } => {
                    format!("{} is used more than once: {}", id, collections.join(", "))
                }
                CheckError::MultipleHeads { collection, ids } => {
                    format!("[{}] more than one first element: {}", collection, join_ids(ids))
                }
                CheckError::MultipleTails { collection, ids } => {
                    format!("[{}] more than one last element: {}", collection, join_ids(ids))
                }
                CheckError::Cycle { collection } => format!("[{}] links form a cycle", collection),
                CheckError::Orphans { collection, ids } => {
                    format!("[{}] not reachable from the first element: {}", collection, join_ids(ids))
                }
                CheckError::CategoryMismatch {
                    item_id,
                    category_id,
                    owner,
                } => format!(
                    "item {} is stored in category {} but names category {}",
                    item_id, owner, category_id
                ),
            };
            println!("  {}", line);
        }
    }
    if !result.warnings.is_empty() {
        if !result.errors.is_empty() {
            println!();
        }
        println!("Warnings:");
        for warn in &result.warnings {
            match warn {
                CheckWarning::UnknownDependency {
                    item_id,
                    dependency,
                } => println!("  {} depends on unknown item {}", item_id, dependency),
                CheckWarning::MissingAddedDate { item_id } => {
                    println!("  {} missing added date", item_id)
                }
            }
        }
    }
    if result.valid {
        println!("✓ board is valid");
    } else {
        println!("✗ board has errors");
    }
    Ok(())
}

fn cmd_sort(args: SortArgs, ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let (config, file) = load_raw_board(ctx)?;
    let mut config = config.order;
    if let Some(strategy) = args.strategy {
        config.strategy = strategy;
    }

    let (order, titles): (Vec<OrderId>, Vec<(OrderId, String)>) = match args.category {
        None => (
            ordered_ids(&file.categories, &config)?,
            file.categories.iter().map(|c| (c.id, c.title.clone())).collect(),
        ),
        Some(id) => {
            let category = file
                .categories
                .iter()
                .find(|c| c.id == id)
                .ok_or_else(|| format!("category not found: {}", id))?;
            (
                ordered_ids(&category.items, &config)?,
                category.items.iter().map(|i| (i.id, i.title.clone())).collect(),
            )
        }
    };

    if ctx.json {
        let out = SortJson {
            category: args.category,
            strategy: config.strategy.to_string(),
            order,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        for id in order {
            let title = titles
                .iter()
                .find(|(tid, _)| *tid == id)
                .map(|(_, t)| t.as_str())
                .unwrap_or_default();
            println!("{} {}", id, title);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Write command handlers
// ---------------------------------------------------------------------------

fn cmd_add_category(args: AddCategoryArgs, ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let (mut project, _lock) = load_project_locked(ctx)?;
    let id = project.allocate_id();
    let changes = project
        .board
        .add_category(TodoCategory::new(id, &args.title))?;
    finish_write(ctx, &mut project, Some(id), changes, &id.to_string())
}

fn cmd_add(args: AddArgs, ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let (mut project, _lock) = load_project_locked(ctx)?;
    for dep in &args.deps {
        find_item(&project, *dep)?;
    }

    let id = project.allocate_id();
    let mut item = TodoItem::new(id, args.category, &args.title);
    item.dependencies = args.deps;
    let mut changes = project.board.add_item(item)?;
    if args.top {
        changes.merge(project.board.move_item(id, None, Placement::Head)?);
    }
    finish_write(ctx, &mut project, Some(id), changes, &id.to_string())
}

fn cmd_done(args: DoneArgs, ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let (mut project, _lock) = load_project_locked(ctx)?;
    let mut item = find_item(&project, args.id)?;
    item.done = !args.undo;
    project.board.update_item(item)?;
    let summary = if args.undo {
        format!("{} not done", args.id)
    } else {
        format!("{} done", args.id)
    };
    finish_write(ctx, &mut project, Some(args.id), LinkChanges::default(), &summary)
}

fn cmd_rename(args: RenameArgs, ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let (mut project, _lock) = load_project_locked(ctx)?;
    if let Some(item) = project.board.item(args.id) {
        let mut item = item.clone();
        let (title, tags) = parse_title_and_tags(&args.title);
        item.title = title;
        if !tags.is_empty() {
            item.tags = tags;
        }
        project.board.update_item(item)?;
    } else {
        project.board.update_category(args.id, &args.title)?;
    }
    let summary = format!("renamed {}", args.id);
    finish_write(ctx, &mut project, Some(args.id), LinkChanges::default(), &summary)
}

fn cmd_dep(args: DepArgs, ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let (mut project, _lock) = load_project_locked(ctx)?;
    let mut item = find_item(&project, args.id)?;
    for dep in &args.add {
        if *dep == args.id {
            return Err(format!("{} cannot depend on itself", args.id).into());
        }
        find_item(&project, *dep)?;
        if !item.dependencies.contains(dep) {
            item.dependencies.push(*dep);
        }
    }
    item.dependencies.retain(|d| !args.remove.contains(d));
    project.board.update_item(item)?;
    let summary = format!("updated dependencies of {}", args.id);
    finish_write(ctx, &mut project, Some(args.id), LinkChanges::default(), &summary)
}

fn cmd_mv(args: MvArgs, ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let (mut project, _lock) = load_project_locked(ctx)?;
    let changes = project
        .board
        .move_item(args.id, args.to, args.position.placement())?;
    let summary = match args.to {
        Some(category) => format!("moved {} to category {}", args.id, category),
        None => format!("moved {}", args.id),
    };
    finish_write(ctx, &mut project, Some(args.id), changes, &summary)
}

fn cmd_mv_category(args: MvCategoryArgs, ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let (mut project, _lock) = load_project_locked(ctx)?;
    let changes = project
        .board
        .move_category(args.id, args.position.placement())?;
    let summary = format!("moved category {}", args.id);
    finish_write(ctx, &mut project, Some(args.id), changes, &summary)
}

fn cmd_rm(args: IdArg, ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let (mut project, _lock) = load_project_locked(ctx)?;
    let (removed, changes) = project.board.remove_item(args.id)?;
    let summary = format!("removed {} {}", removed.id, removed.title);
    finish_write(ctx, &mut project, Some(args.id), changes, &summary)
}

fn cmd_rm_category(args: IdArg, ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let (mut project, _lock) = load_project_locked(ctx)?;
    let (removed, changes) = project.board.remove_category(args.id)?;
    let summary = format!(
        "removed category {} {} ({} items)",
        removed.id,
        removed.title,
        removed.items.len()
    );
    finish_write(ctx, &mut project, Some(args.id), changes, &summary)
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn cmd_config(args: ConfigCmd, ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let root = project_root(ctx)?;
    let todo_dir = root.join(TODO_DIR);

    match args.action {
        ConfigAction::Get(get) => {
            let (config, _) = config_io::read_config(&todo_dir)?;
            let value = config_io::get_value(&config, &get.key)?;
            if ctx.json {
                let out = serde_json::json!({ "key": get.key, "value": value });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!("{}", value.as_deref().unwrap_or("(unset)"));
            }
        }
        ConfigAction::Set(set) => {
            let _lock = FileLock::acquire_default(&todo_dir)?;
            let (_, mut doc) = config_io::read_config(&todo_dir)?;
            config_io::set_value(&mut doc, &set.key, &set.value)?;
            config_io::write_config(&todo_dir, &doc)?;
            debug!(key = %set.key, value = %set.value, "config updated");
            if ctx.json {
                let out = serde_json::json!({ "key": set.key, "value": set.value });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!("{} = {}", set.key, set.value);
            }
        }
    }
    Ok(())
}
