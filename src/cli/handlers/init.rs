use std::fs;

use super::Context;
use crate::cli::commands::InitArgs;
use crate::io::config_io;
use crate::io::lock::FileLock;
use crate::io::project_io::{self, CONFIG_FILE, TODO_DIR};
use crate::model::board::BoardFile;
use crate::model::config::Config;
use crate::model::todo::TodoCategory;

/// Infer a board name from a directory name: hyphens and underscores become
/// spaces, words are title-cased.
fn infer_name(dir_name: &str) -> String {
    dir_name
        .split(['-', '_'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(c) => c.to_uppercase().chain(chars).collect(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn cmd_init(args: InitArgs, ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let root = match ctx.project_dir {
        Some(ref dir) => dir.clone(),
        None => std::env::current_dir()?,
    };
    let todo_dir = root.join(TODO_DIR);

    if todo_dir.join(CONFIG_FILE).exists() && !args.force {
        return Err("todo project already exists in ./todo/ (use --force to reinitialize)".into());
    }

    if let Some(parent) = root.parent()
        && let Ok(parent_root) = project_io::discover_project(parent)
    {
        eprintln!(
            "Note: parent project found at {}/",
            parent_root.join(TODO_DIR).display()
        );
        eprintln!("Creating new project in ./todo/");
    }

    let name = args.name.unwrap_or_else(|| {
        root.file_name()
            .and_then(|n| n.to_str())
            .map(infer_name)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "Todos".to_string())
    });

    fs::create_dir_all(&todo_dir)?;
    let _lock = FileLock::acquire_default(&todo_dir)?;
    let config_text = config_io::render_config(&name);
    let config: Config = toml::from_str(&config_text)?;
    project_io::atomic_write(&todo_dir.join(CONFIG_FILE), config_text.as_bytes())?;

    // A forced reinit continues the revision sequence so stale tokens fail
    let previous = project_io::read_board_file(&todo_dir)?.map(|f| f.revision);

    let mut project = project_io::assemble_project(root, todo_dir, config, BoardFile::new(&name))?;
    project.revision = previous.unwrap_or(0);
    let mut created = Vec::new();
    for title in &args.categories {
        let id = project.allocate_id();
        project.board.add_category(TodoCategory::new(id, title))?;
        created.push((id, title.trim()));
    }
    let revision = project_io::save_project(&mut project, None)?;

    if ctx.json {
        let out = serde_json::json!({
            "name": name,
            "revision": revision,
            "categories": created
                .iter()
                .map(|(id, title)| serde_json::json!({ "id": id, "title": title }))
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("Initialized todo board: {}", name);
        for (id, title) in &created {
            println!("  category: {} ({})", title, id);
        }
    }
    Ok(())
}
