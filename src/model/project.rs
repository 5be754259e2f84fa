use std::path::PathBuf;

use super::board::{Board, BoardFile};
use super::config::Config;
use super::order::OrderId;

/// A fully loaded todo project
#[derive(Debug)]
pub struct Project {
    /// Root directory of the project (parent of `todo/`)
    pub root: PathBuf,
    /// Path to the `todo/` directory
    pub todo_dir: PathBuf,
    /// Parsed config.toml
    pub config: Config,
    /// Board name, as stored in board.json
    pub name: String,
    /// Revision of board.json this project was loaded from
    pub revision: u64,
    /// Next id to hand out
    pub next_id: OrderId,
    /// Categories and items, in chain order
    pub board: Board,
}

impl Project {
    /// The board file to write back, at the given revision.
    pub fn to_file(&self, revision: u64) -> BoardFile {
        BoardFile {
            name: self.name.clone(),
            revision,
            next_id: self.next_id,
            categories: self.board.categories().to_vec(),
        }
    }

    /// Hand out a fresh id, never lower than any id already on the board.
    /// Ids only grow, so creation order matches id order.
    pub fn allocate_id(&mut self) -> OrderId {
        let max_used = self
            .board
            .categories()
            .iter()
            .flat_map(|c| std::iter::once(c.id).chain(c.items.iter().map(|i| i.id)))
            .max()
            .unwrap_or(0);
        let id = self.next_id.max(max_used + 1);
        self.next_id = id + 1;
        id
    }
}
