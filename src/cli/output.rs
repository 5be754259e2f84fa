use serde::Serialize;

use crate::model::order::{LinkChanges, Links, OrderId};
use crate::model::todo::{TodoCategory, TodoItem};

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct ItemJson {
    pub id: OrderId,
    pub category_id: OrderId,
    pub title: String,
    pub done: bool,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<OrderId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub added: Option<String>,
    pub left_id: Option<OrderId>,
    pub right_id: Option<OrderId>,
}

#[derive(Serialize)]
pub struct CategoryJson {
    pub id: OrderId,
    pub title: String,
    pub left_id: Option<OrderId>,
    pub right_id: Option<OrderId>,
    pub items: Vec<ItemJson>,
}

#[derive(Serialize)]
pub struct BoardJson {
    pub name: String,
    pub revision: u64,
    pub categories: Vec<CategoryJson>,
}

/// Result of a write command
#[derive(Serialize)]
pub struct WriteJson {
    /// The record the command created or acted on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<OrderId>,
    pub revision: u64,
    /// Records whose links changed
    pub changed: LinkChanges,
}

#[derive(Serialize)]
pub struct SortJson {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<OrderId>,
    pub strategy: String,
    pub order: Vec<OrderId>,
}

pub fn item_to_json(item: &TodoItem) -> ItemJson {
    ItemJson {
        id: item.id,
        category_id: item.category_id,
        title: item.title.clone(),
        done: item.done,
        tags: item.tags.clone(),
        dependencies: item.dependencies.clone(),
        added: item.added.clone(),
        left_id: item.order.left_id,
        right_id: item.order.right_id,
    }
}

/// `items` lets callers pass a filtered subset of the category's items
pub fn category_to_json<'a>(
    category: &TodoCategory,
    items: impl IntoIterator<Item = &'a TodoItem>,
) -> CategoryJson {
    CategoryJson {
        id: category.id,
        title: category.title.clone(),
        left_id: category.order.left_id,
        right_id: category.order.right_id,
        items: items.into_iter().map(item_to_json).collect(),
    }
}

// ---------------------------------------------------------------------------
// Human-readable formatting
// ---------------------------------------------------------------------------

fn format_tags(tags: &[String]) -> String {
    tags.iter()
        .map(|t| format!(" #{}", t))
        .collect::<String>()
}

fn format_id(id: Option<OrderId>) -> String {
    id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string())
}

/// `[x] 12 Buy milk #errand`
pub fn format_item_line(item: &TodoItem) -> String {
    let check = if item.done { 'x' } else { ' ' };
    format!("[{}] {} {}{}", check, item.id, item.title, format_tags(&item.tags))
}

pub fn format_category_header(category: &TodoCategory) -> String {
    format!("{} ({})", category.title, category.id)
}

/// A category header followed by its items, indented
pub fn format_category_listing<'a>(
    category: &TodoCategory,
    items: impl IntoIterator<Item = &'a TodoItem>,
) -> Vec<String> {
    let mut lines = vec![format_category_header(category)];
    lines.extend(items.into_iter().map(|i| format!("  {}", format_item_line(i))));
    lines
}

pub fn format_links(links: Links) -> String {
    format!("{} ← · → {}", format_id(links.left_id), format_id(links.right_id))
}

pub fn format_item_detail(item: &TodoItem, category: &TodoCategory) -> Vec<String> {
    let mut lines = vec![format_item_line(item)];
    lines.push(format!("  category: {}", format_category_header(category)));
    lines.push(format!("  links: {}", format_links(item.order)));
    if !item.dependencies.is_empty() {
        let deps: Vec<String> = item.dependencies.iter().map(|d| d.to_string()).collect();
        lines.push(format!("  dep: {}", deps.join(", ")));
    }
    if let Some(ref added) = item.added {
        lines.push(format!("  added: {}", added));
    }
    lines
}

pub fn format_category_detail(category: &TodoCategory) -> Vec<String> {
    let done = category.items.iter().filter(|i| i.done).count();
    vec![
        format_category_header(category),
        format!("  links: {}", format_links(category.order)),
        format!("  items: {} ({} done)", category.items.len(), done),
    ]
}

/// One line per changed record: `3: 1 ← · → 2  =>  - ← · → 2`
pub fn format_changes(changes: &LinkChanges) -> Vec<String> {
    changes
        .iter()
        .map(|c| {
            format!(
                "  {}: {}  =>  {}",
                c.id,
                format_links(c.before),
                format_links(c.after)
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::order::LinkChange;

    #[test]
    fn test_format_item_line() {
        let mut item = TodoItem::new(12, 1, "Buy milk #errand");
        assert_eq!(format_item_line(&item), "[ ] 12 Buy milk #errand");
        item.done = true;
        assert_eq!(format_item_line(&item), "[x] 12 Buy milk #errand");
    }

    #[test]
    fn test_format_changes() {
        let changes = LinkChanges(vec![LinkChange {
            id: 3,
            before: Links::new(Some(1), Some(2)),
            after: Links::new(None, Some(2)),
        }]);
        assert_eq!(format_changes(&changes), vec!["  3: 1 ← · → 2  =>  - ← · → 2"]);
    }

    #[test]
    fn test_item_json_skips_empty() {
        let mut item = TodoItem::new(5, 1, "Plain");
        item.added = None;
        let json = serde_json::to_value(item_to_json(&item)).unwrap();
        assert!(json.get("dependencies").is_none());
        assert!(json.get("added").is_none());
        assert_eq!(json["left_id"], serde_json::Value::Null);
    }
}
