use chrono::Local;
use serde::{Deserialize, Serialize};

use super::order::{Links, OrderId, Orderable};

/// A todo item. Ordered within its category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoItem {
    pub id: OrderId,
    /// Owning category
    pub category_id: OrderId,
    pub title: String,
    #[serde(default)]
    pub done: bool,
    /// Tags (without the `#` prefix)
    #[serde(default)]
    pub tags: Vec<String>,
    /// Ids of the items this one depends on
    #[serde(default)]
    pub dependencies: Vec<OrderId>,
    /// Creation date, `YYYY-MM-DD`
    #[serde(default)]
    pub added: Option<String>,
    #[serde(default)]
    pub order: Links,
}

impl TodoItem {
    /// Create a detached item. Trailing `#tag` words in `title` become tags.
    pub fn new(id: OrderId, category_id: OrderId, title: &str) -> Self {
        let (title, tags) = parse_title_and_tags(title);
        TodoItem {
            id,
            category_id,
            title,
            done: false,
            tags,
            dependencies: Vec::new(),
            added: Some(today_str()),
            order: Links::detached(),
        }
    }
}

impl Orderable for TodoItem {
    fn id(&self) -> OrderId {
        self.id
    }

    fn links(&self) -> Links {
        self.order
    }

    fn links_mut(&mut self) -> &mut Links {
        &mut self.order
    }
}

/// A todo category: an ordered element of the board, owning an ordered list
/// of items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoCategory {
    pub id: OrderId,
    pub title: String,
    #[serde(default)]
    pub order: Links,
    /// Items, kept in chain order by the board
    #[serde(default)]
    pub items: Vec<TodoItem>,
}

impl TodoCategory {
    pub fn new(id: OrderId, title: &str) -> Self {
        TodoCategory {
            id,
            title: title.trim().to_string(),
            order: Links::detached(),
            items: Vec::new(),
        }
    }
}

impl Orderable for TodoCategory {
    fn id(&self) -> OrderId {
        self.id
    }

    fn links(&self) -> Links {
        self.order
    }

    fn links_mut(&mut self) -> &mut Links {
        &mut self.order
    }
}

pub fn today_str() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

/// Split trailing `#tag` words off a title.
///
/// `"Fix parser #bug #ready"` → `("Fix parser", ["bug", "ready"])`
pub fn parse_title_and_tags(s: &str) -> (String, Vec<String>) {
    let mut tags = Vec::new();
    let mut remaining = s.trim();

    while let Some(word) = remaining.rsplit(' ').next() {
        let Some(tag) = word.strip_prefix('#') else {
            break;
        };
        if tag.is_empty() || tag.contains('#') {
            break;
        }
        tags.push(tag.to_string());
        remaining = remaining[..remaining.len() - word.len()].trim_end();
        if remaining.is_empty() {
            break;
        }
    }

    tags.reverse();
    (remaining.to_string(), tags)
}
