use serde::{Deserialize, Serialize};

use super::config::OrderConfig;
use super::order::OrderId;
use super::todo::{TodoCategory, TodoItem};

/// On-disk contents of `todo/board.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardFile {
    pub name: String,
    /// Bumped on every write; used as an optimistic concurrency token
    #[serde(default)]
    pub revision: u64,
    /// Next id to hand out. Ids only grow, so creation order matches id order.
    #[serde(default = "default_next_id")]
    pub next_id: OrderId,
    /// Categories as stored; order is defined by their links, not this list
    #[serde(default)]
    pub categories: Vec<TodoCategory>,
}

impl BoardFile {
    pub fn new(name: &str) -> Self {
        BoardFile {
            name: name.to_string(),
            revision: 0,
            next_id: default_next_id(),
            categories: Vec::new(),
        }
    }
}

fn default_next_id() -> OrderId {
    1
}

/// The categories of one board, each with its items, kept in chain order.
///
/// Mutations live in `ops::board_ops`. Every one of them either applies
/// completely or leaves the board as it was, and returns the records whose
/// links it changed.
#[derive(Debug, Clone, Default)]
pub struct Board {
    pub(crate) categories: Vec<TodoCategory>,
    pub(crate) config: OrderConfig,
}

impl Board {
    /// An empty board. Use `Board::from_categories` for stored records.
    pub fn new(config: OrderConfig) -> Self {
        Board {
            categories: Vec::new(),
            config,
        }
    }

    pub fn clear(&mut self) {
        self.categories.clear();
    }

    pub fn config(&self) -> &OrderConfig {
        &self.config
    }

    pub fn categories(&self) -> &[TodoCategory] {
        &self.categories
    }

    pub fn into_categories(self) -> Vec<TodoCategory> {
        self.categories
    }

    pub fn category(&self, id: OrderId) -> Option<&TodoCategory> {
        self.categories.iter().find(|c| c.id == id)
    }

    pub fn item(&self, id: OrderId) -> Option<&TodoItem> {
        self.categories
            .iter()
            .flat_map(|c| c.items.iter())
            .find(|i| i.id == id)
    }

    /// Number of categories
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Number of items across all categories
    pub fn item_count(&self) -> usize {
        self.categories.iter().map(|c| c.items.len()).sum()
    }
}
