use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::io::lock::LockError;
use crate::model::board::{Board, BoardFile};
use crate::model::config::Config;
use crate::model::project::Project;
use crate::ops::board_ops::BoardError;

pub const TODO_DIR: &str = "todo";
pub const CONFIG_FILE: &str = "config.toml";
pub const BOARD_FILE: &str = "board.json";

/// Error type for project I/O operations
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("not a todo project: no todo/ directory found")]
    NotAProject,
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse config.toml: {0}")]
    ConfigParseError(#[from] toml::de::Error),
    #[error("could not edit config.toml: {0}")]
    ConfigEditError(#[from] toml_edit::TomlError),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("could not parse {path}: {source}")]
    BoardParseError {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("could not serialize board: {0}")]
    BoardSerializeError(#[from] serde_json::Error),
    #[error("board changed on disk: expected revision {expected}, found {found}")]
    StaleRevision { expected: u64, found: u64 },
    #[error(transparent)]
    Board(#[from] BoardError),
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Discover the todo project by walking up from the given directory,
/// looking for a `todo/` subdirectory with a config file.
pub fn discover_project(start: &Path) -> Result<PathBuf, ProjectError> {
    let mut current = start.to_path_buf();
    loop {
        let todo_dir = current.join(TODO_DIR);
        if todo_dir.is_dir() && todo_dir.join(CONFIG_FILE).exists() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(ProjectError::NotAProject);
        }
    }
}

/// Load a complete project from the given root directory.
///
/// A missing board.json is an empty board at revision 0.
pub fn load_project(root: &Path) -> Result<Project, ProjectError> {
    let todo_dir = root.join(TODO_DIR);
    if !todo_dir.is_dir() {
        return Err(ProjectError::NotAProject);
    }

    let config_path = todo_dir.join(CONFIG_FILE);
    let config_text = fs::read_to_string(&config_path).map_err(|e| ProjectError::ReadError {
        path: config_path.clone(),
        source: e,
    })?;
    let config: Config = toml::from_str(&config_text)?;

    let file = read_board_file(&todo_dir)?.unwrap_or_else(|| BoardFile::new(&config.board.name));
    debug!(
        root = %root.display(),
        revision = file.revision,
        categories = file.categories.len(),
        "loading project"
    );
    assemble_project(root.to_path_buf(), todo_dir, config, file)
}

/// Build a project from a stored board file, putting every chain in order.
pub fn assemble_project(
    root: PathBuf,
    todo_dir: PathBuf,
    config: Config,
    file: BoardFile,
) -> Result<Project, ProjectError> {
    let board = Board::from_categories(file.categories, config.order)?;
    Ok(Project {
        root,
        todo_dir,
        config,
        name: file.name,
        revision: file.revision,
        next_id: file.next_id,
        board,
    })
}

/// Read `board.json`, or `None` if it does not exist yet.
pub fn read_board_file(todo_dir: &Path) -> Result<Option<BoardFile>, ProjectError> {
    let path = todo_dir.join(BOARD_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let text = fs::read_to_string(&path).map_err(|e| ProjectError::ReadError {
        path: path.clone(),
        source: e,
    })?;
    let file = serde_json::from_str(&text)
        .map_err(|e| ProjectError::BoardParseError { path, source: e })?;
    Ok(Some(file))
}

/// Write the project's board back to disk and return the new revision.
///
/// The write is refused when the revision on disk is not the one the
/// project was loaded from, or not `expected` when one is given. Callers
/// hold the project lock.
pub fn save_project(project: &mut Project, expected: Option<u64>) -> Result<u64, ProjectError> {
    let found = read_board_file(&project.todo_dir)?
        .map(|f| f.revision)
        .unwrap_or(0);
    let expected = expected.unwrap_or(project.revision);
    if found != expected || found != project.revision {
        return Err(ProjectError::StaleRevision { expected, found });
    }

    let revision = found + 1;
    let file = project.to_file(revision);
    let mut json = serde_json::to_string_pretty(&file)?;
    json.push('\n');

    let path = project.todo_dir.join(BOARD_FILE);
    atomic_write(&path, json.as_bytes()).map_err(|e| ProjectError::WriteError {
        path: path.clone(),
        source: e,
    })?;
    project.revision = revision;
    debug!(path = %path.display(), revision, "saved board");
    Ok(revision)
}

/// Write `content` to `path` atomically using a temp file + rename.
pub fn atomic_write(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::order::{Links, Placement};
    use crate::model::todo::{TodoCategory, TodoItem};
    use tempfile::TempDir;

    fn create_test_project(dir: &Path) {
        let todo_dir = dir.join(TODO_DIR);
        fs::create_dir_all(&todo_dir).unwrap();
        fs::write(
            todo_dir.join(CONFIG_FILE),
            "[board]\nname = \"Test\"\n\n[order]\nstrategy = \"traverse\"\n",
        )
        .unwrap();
        // Stored out of chain order on purpose
        fs::write(
            todo_dir.join(BOARD_FILE),
            r#"{
  "name": "Test",
  "revision": 3,
  "next_id": 5,
  "categories": [
    {"id": 2, "title": "Home", "order": {"left_id": 1, "right_id": null}, "items": []},
    {"id": 1, "title": "Work", "order": {"left_id": null, "right_id": 2}, "items": [
      {"id": 4, "category_id": 1, "title": "Second", "order": {"left_id": 3, "right_id": null}},
      {"id": 3, "category_id": 1, "title": "First", "order": {"left_id": null, "right_id": 4}}
    ]}
  ]
}
"#,
        )
        .unwrap();
    }

    #[test]
    fn test_discover_project() {
        let tmp = TempDir::new().unwrap();
        create_test_project(tmp.path());
        let nested = tmp.path().join("src").join("deep");
        fs::create_dir_all(&nested).unwrap();

        let root = discover_project(&nested).unwrap();
        assert_eq!(root, tmp.path());
    }

    #[test]
    fn test_discover_project_not_found() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            discover_project(tmp.path()),
            Err(ProjectError::NotAProject)
        ));
    }

    #[test]
    fn test_load_project_sorts_chains() {
        let tmp = TempDir::new().unwrap();
        create_test_project(tmp.path());
        let project = load_project(tmp.path()).unwrap();

        assert_eq!(project.name, "Test");
        assert_eq!(project.revision, 3);
        let ids: Vec<u64> = project.board.categories().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2]);
        let items: Vec<&str> = project.board.categories()[0]
            .items
            .iter()
            .map(|i| i.title.as_str())
            .collect();
        assert_eq!(items, vec!["First", "Second"]);
    }

    #[test]
    fn test_load_project_without_board_file() {
        let tmp = TempDir::new().unwrap();
        create_test_project(tmp.path());
        fs::remove_file(tmp.path().join(TODO_DIR).join(BOARD_FILE)).unwrap();
        let project = load_project(tmp.path()).unwrap();
        assert_eq!(project.revision, 0);
        assert!(project.board.is_empty());
    }

    #[test]
    fn test_load_project_bad_json() {
        let tmp = TempDir::new().unwrap();
        create_test_project(tmp.path());
        fs::write(tmp.path().join(TODO_DIR).join(BOARD_FILE), "{ not json").unwrap();
        assert!(matches!(
            load_project(tmp.path()),
            Err(ProjectError::BoardParseError { .. })
        ));
    }

    #[test]
    fn test_load_project_broken_links() {
        let tmp = TempDir::new().unwrap();
        create_test_project(tmp.path());
        let path = tmp.path().join(TODO_DIR).join(BOARD_FILE);
        let text = fs::read_to_string(&path)
            .unwrap()
            .replace("\"right_id\": 4", "\"right_id\": 40");
        fs::write(&path, text).unwrap();
        let err = load_project(tmp.path()).unwrap_err();
        assert!(matches!(err, ProjectError::Board(_)));
        assert!(err.to_string().contains("dangling reference"));
    }

    #[test]
    fn test_assemble_project_orders_stored_records() {
        let mut file = BoardFile::new("Chores");
        file.revision = 2;
        file.next_id = 8;
        let mut later = TodoCategory::new(7, "Later");
        later.order = Links::new(Some(6), None);
        let mut now = TodoCategory::new(6, "Now");
        now.order = Links::new(None, Some(7));
        file.categories = vec![later, now];

        let project = assemble_project(
            PathBuf::from("/tmp/chores"),
            PathBuf::from("/tmp/chores/todo"),
            Config::default(),
            file,
        )
        .unwrap();
        assert_eq!(project.name, "Chores");
        assert_eq!(project.revision, 2);
        assert_eq!(project.next_id, 8);
        let ids: Vec<u64> = project.board.categories().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![6, 7]);

        let mut broken = BoardFile::new("Chores");
        let mut lone = TodoCategory::new(1, "Lone");
        lone.order = Links::new(None, Some(1));
        broken.categories.push(lone);
        assert!(matches!(
            assemble_project(PathBuf::new(), PathBuf::new(), Config::default(), broken),
            Err(ProjectError::Board(_))
        ));
    }

    #[test]
    fn test_save_bumps_revision_and_round_trips() {
        let tmp = TempDir::new().unwrap();
        create_test_project(tmp.path());
        let mut project = load_project(tmp.path()).unwrap();

        let id = project.allocate_id();
        assert_eq!(id, 5);
        project.board.add_item(TodoItem::new(id, 2, "Dishes")).unwrap();
        project.board.move_item(4, Some(2), Placement::Head).unwrap();
        assert_eq!(save_project(&mut project, None).unwrap(), 4);
        assert_eq!(project.revision, 4);

        let reloaded = load_project(tmp.path()).unwrap();
        assert_eq!(reloaded.revision, 4);
        assert_eq!(reloaded.next_id, 6);
        let home: Vec<u64> = reloaded.board.category(2).unwrap().items.iter().map(|i| i.id).collect();
        assert_eq!(home, vec![4, 5]);
    }

    #[test]
    fn test_save_rejects_stale_revision() {
        let tmp = TempDir::new().unwrap();
        create_test_project(tmp.path());
        let mut first = load_project(tmp.path()).unwrap();
        let mut second = load_project(tmp.path()).unwrap();

        first.board.add_category(TodoCategory::new(7, "Errands")).unwrap();
        save_project(&mut first, None).unwrap();

        second.board.add_category(TodoCategory::new(8, "Garden")).unwrap();
        let err = save_project(&mut second, None).unwrap_err();
        assert!(matches!(
            err,
            ProjectError::StaleRevision {
                expected: 3,
                found: 4
            }
        ));
    }

    #[test]
    fn test_save_checks_expected_revision() {
        let tmp = TempDir::new().unwrap();
        create_test_project(tmp.path());
        let mut project = load_project(tmp.path()).unwrap();
        assert!(matches!(
            save_project(&mut project, Some(2)),
            Err(ProjectError::StaleRevision {
                expected: 2,
                found: 3
            })
        ));
        assert_eq!(save_project(&mut project, Some(3)).unwrap(), 4);
    }

    #[test]
    fn test_atomic_write_replaces_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.json");
        fs::write(&path, "old").unwrap();
        atomic_write(&path, b"new").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
    }
}
