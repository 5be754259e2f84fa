use std::fs;
use std::path::Path;

use crate::io::project_io::{CONFIG_FILE, ProjectError, atomic_write};
use crate::model::config::{ChainStrategy, Config};

/// Keys accepted by `tch config get|set`
pub const CONFIG_KEYS: &[&str] = &[
    "board.name",
    "order.strategy",
    "order.iteration_limit",
    "order.verify_after_move",
];

const CONFIG_TEMPLATE: &str = r##"[board]
name = "{name}"

[order]
# How chains are rebuilt from their links: "traverse" or "relocate"
strategy = "traverse"
# Rebuild and verify the whole chain after every move
verify_after_move = true
# Iteration bound for the relocate strategy (default: N³, at least 64)
# iteration_limit = 10000
"##;

/// Render a fresh config.toml for a new project.
pub fn render_config(name: &str) -> String {
    CONFIG_TEMPLATE.replace("{name}", &name.replace('"', "\\\""))
}

/// Read the project config, returning both the parsed config and the raw
/// toml_edit Document for round-trip-safe editing.
pub fn read_config(todo_dir: &Path) -> Result<(Config, toml_edit::DocumentMut), ProjectError> {
    let config_path = todo_dir.join(CONFIG_FILE);
    let config_text = fs::read_to_string(&config_path).map_err(|e| ProjectError::ReadError {
        path: config_path.clone(),
        source: e,
    })?;
    let config: Config = toml::from_str(&config_text)?;
    let doc: toml_edit::DocumentMut = config_text.parse()?;
    Ok((config, doc))
}

/// Write the config document back to disk, preserving formatting.
pub fn write_config(todo_dir: &Path, doc: &toml_edit::DocumentMut) -> Result<(), ProjectError> {
    let config_path = todo_dir.join(CONFIG_FILE);
    atomic_write(&config_path, doc.to_string().as_bytes()).map_err(|e| {
        ProjectError::WriteError {
            path: config_path,
            source: e,
        }
    })?;
    Ok(())
}

/// Effective value of a config key, defaults included. `None` for an
/// unset optional key.
pub fn get_value(config: &Config, key: &str) -> Result<Option<String>, ProjectError> {
    let value = match key {
        "board.name" => Some(config.board.name.clone()),
        "order.strategy" => Some(config.order.strategy.to_string()),
        "order.iteration_limit" => config.order.iteration_limit.map(|n| n.to_string()),
        "order.verify_after_move" => Some(config.order.verify_after_move.to_string()),
        _ => return Err(unknown_key(key)),
    };
    Ok(value)
}

/// Set a config key in the document, validating the value for its key.
/// For `order.iteration_limit`, `none` removes the key.
pub fn set_value(
    doc: &mut toml_edit::DocumentMut,
    key: &str,
    value: &str,
) -> Result<(), ProjectError> {
    let (table, field) = key.split_once('.').ok_or_else(|| unknown_key(key))?;
    if !CONFIG_KEYS.contains(&key) {
        return Err(unknown_key(key));
    }

    let item = match key {
        "board.name" => toml_edit::value(value),
        "order.strategy" => {
            let strategy: ChainStrategy = value.parse().map_err(ProjectError::InvalidConfig)?;
            toml_edit::value(strategy.to_string())
        }
        "order.iteration_limit" => {
            if value == "none" {
                if let Some(order) = doc.get_mut(table).and_then(|t| t.as_table_like_mut()) {
                    order.remove(field);
                }
                return Ok(());
            }
            let limit: i64 = value.parse().map_err(|_| {
                ProjectError::InvalidConfig(format!(
                    "iteration_limit must be a positive number or \"none\", got \"{}\"",
                    value
                ))
            })?;
            if limit <= 0 {
                return Err(ProjectError::InvalidConfig(
                    "iteration_limit must be positive".to_string(),
                ));
            }
            toml_edit::value(limit)
        }
        _ => {
            let flag: bool = value.parse().map_err(|_| {
                ProjectError::InvalidConfig(format!("{} must be true or false", key))
            })?;
            toml_edit::value(flag)
        }
    };

    if !doc.contains_key(table) {
        doc[table] = toml_edit::Item::Table(toml_edit::Table::new());
    }
    doc[table][field] = item;
    Ok(())
}

fn unknown_key(key: &str) -> ProjectError {
    ProjectError::InvalidConfig(format!(
        "unknown key \"{}\" (expected one of: {})",
        key,
        CONFIG_KEYS.join(", ")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_config() -> &'static str {
        r#"# my board
[board]
name = "Home"

[order]
strategy = "traverse"   # fast path
verify_after_move = true
"#
    }

    #[test]
    fn test_round_trip_config() {
        let tmp = TempDir::new().unwrap();
        let todo_dir = tmp.path().join("todo");
        fs::create_dir_all(&todo_dir).unwrap();
        let config_path = todo_dir.join(CONFIG_FILE);

        let original = sample_config();
        fs::write(&config_path, original).unwrap();

        let (config, doc) = read_config(&todo_dir).unwrap();
        assert_eq!(config.board.name, "Home");
        write_config(&todo_dir, &doc).unwrap();

        let written = fs::read_to_string(&config_path).unwrap();
        assert_eq!(written, original);
    }

    #[test]
    fn test_set_strategy_keeps_comments() {
        let mut doc: toml_edit::DocumentMut = sample_config().parse().unwrap();
        set_value(&mut doc, "order.strategy", "relocate").unwrap();
        let result = doc.to_string();
        assert!(result.contains("# my board"));
        let config: Config = toml::from_str(&result).unwrap();
        assert_eq!(config.order.strategy, ChainStrategy::Relocate);
    }

    #[test]
    fn test_set_rejects_bad_values() {
        let mut doc: toml_edit::DocumentMut = sample_config().parse().unwrap();
        assert!(set_value(&mut doc, "order.strategy", "bubble").is_err());
        assert!(set_value(&mut doc, "order.iteration_limit", "-3").is_err());
        assert!(set_value(&mut doc, "order.verify_after_move", "maybe").is_err());
        assert!(set_value(&mut doc, "order.colour", "red").is_err());
        assert!(set_value(&mut doc, "nodot", "x").is_err());
        assert_eq!(doc.to_string(), sample_config());
    }

    #[test]
    fn test_set_and_clear_iteration_limit() {
        let mut doc: toml_edit::DocumentMut = sample_config().parse().unwrap();
        set_value(&mut doc, "order.iteration_limit", "500").unwrap();
        let config: Config = toml::from_str(&doc.to_string()).unwrap();
        assert_eq!(config.order.iteration_limit, Some(500));
        assert_eq!(
            get_value(&config, "order.iteration_limit").unwrap(),
            Some("500".to_string())
        );

        set_value(&mut doc, "order.iteration_limit", "none").unwrap();
        let config: Config = toml::from_str(&doc.to_string()).unwrap();
        assert_eq!(config.order.iteration_limit, None);
    }

    #[test]
    fn test_set_creates_missing_table() {
        let mut doc: toml_edit::DocumentMut = "[board]\nname = \"x\"\n".parse().unwrap();
        set_value(&mut doc, "order.verify_after_move", "false").unwrap();
        let config: Config = toml::from_str(&doc.to_string()).unwrap();
        assert!(!config.order.verify_after_move);
    }

    #[test]
    fn test_get_value_defaults() {
        let config = Config::default();
        assert_eq!(
            get_value(&config, "order.strategy").unwrap(),
            Some("traverse".to_string())
        );
        assert_eq!(get_value(&config, "order.iteration_limit").unwrap(), None);
        assert!(get_value(&config, "board.colour").is_err());
    }

    #[test]
    fn test_render_config_parses() {
        let config: Config = toml::from_str(&render_config("Chores \"2026\"")).unwrap();
        assert_eq!(config.board.name, "Chores \"2026\"");
        assert_eq!(config.order.strategy, ChainStrategy::Traverse);
    }
}
