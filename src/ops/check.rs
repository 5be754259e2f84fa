use std::collections::HashSet;

use indexmap::IndexMap;
use serde::Serialize;

use crate::model::order::{OrderId, Orderable};
use crate::model::todo::{TodoCategory, TodoItem};

/// Structured result from `tch check`, suitable for --json output.
#[derive(Debug, Default, Serialize)]
pub struct CheckResult {
    pub valid: bool,
    pub errors: Vec<CheckError>,
    pub warnings: Vec<CheckWarning>,
}

/// A validation error (the board's links or ownership are broken).
///
/// `collection` names the chain the problem was found in: `"categories"` for
/// the category chain, `"category N"` for the items of category N.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum CheckError {
    /// `id` points at `neighbor` on `side`, but `neighbor` does not point back
    #[serde(rename = "asymmetric_link")]
    AsymmetricLink {
        collection: String,
        id: OrderId,
        neighbor: OrderId,
        side: LinkSide,
    },
    #[serde(rename = "self_reference")]
    SelfReference { collection: String, id: OrderId },
    /// A neighbor id that is not in the same collection
    #[serde(rename = "dangling_reference")]
    DanglingReference {
        collection: String,
        id: OrderId,
        neighbor: OrderId,
    },
    /// The same id is used by more than one record on the board
    #[serde(rename = "duplicate_id")]
    DuplicateId { id: OrderId, collections: Vec<String> },
    #[serde(rename = "multiple_heads")]
    MultipleHeads { collection: String, ids: Vec<OrderId> },
    #[serde(rename = "multiple_tails")]
    MultipleTails { collection: String, ids: Vec<OrderId> },
    /// No element without a left neighbor, or the walk from the head loops
    #[serde(rename = "cycle")]
    Cycle { collection: String },
    /// Elements the walk from the head never reaches
    #[serde(rename = "orphans")]
    Orphans { collection: String, ids: Vec<OrderId> },
    /// Item stored under one category but naming another as its owner
    #[serde(rename = "category_mismatch")]
    CategoryMismatch {
        item_id: OrderId,
        category_id: OrderId,
        owner: OrderId,
    },
}

/// A validation warning (non-critical issue).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum CheckWarning {
    /// Item depends on an id that is not an item on the board
    #[serde(rename = "unknown_dependency")]
    UnknownDependency { item_id: OrderId, dependency: OrderId },
    /// Item has no `added` date
    #[serde(rename = "missing_added_date")]
    MissingAddedDate { item_id: OrderId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkSide {
    Left,
    Right,
}

// ---------------------------------------------------------------------------
// Main check entry point
// ---------------------------------------------------------------------------

/// Validate a board's links and return every problem found.
///
/// Unlike reconstruction, which stops at the first defect, this walks every
/// collection and keeps going. Read-only.
///
/// Checks performed:
/// 1. No id is used twice anywhere on the board
/// 2. Per collection: neighbor references resolve, are not self references,
///    and are mirrored by the neighbor
/// 3. Per collection: exactly one head and one tail, and every element is
///    reachable from the head
/// 4. Items name the category they are stored under
/// 5. Warnings for unknown dependencies and missing dates
pub fn check_board(categories: &[TodoCategory]) -> CheckResult {
    let mut result = CheckResult::default();

    for (id, collections) in find_duplicate_ids(categories) {
        result.errors.push(CheckError::DuplicateId { id, collections });
    }

    check_chain(categories, "categories", &mut result);

    let item_ids: HashSet<OrderId> = categories
        .iter()
        .flat_map(|c| c.items.iter().map(|i| i.id))
        .collect();

    for category in categories {
        check_chain(&category.items, &category_scope(category.id), &mut result);
        for item in &category.items {
            check_item(item, category.id, &item_ids, &mut result);
        }
    }

    result.valid = result.errors.is_empty();
    result
}

fn category_scope(id: OrderId) -> String {
    format!("category {}", id)
}

// ---------------------------------------------------------------------------
// Per-chain validation
// ---------------------------------------------------------------------------

fn check_chain<T: Orderable>(elements: &[T], scope: &str, result: &mut CheckResult) {
    if elements.is_empty() {
        return;
    }
    let by_id: IndexMap<OrderId, &T> = elements.iter().map(|e| (e.id(), e)).collect();

    for element in elements {
        let id = element.id();
        for (side, neighbor) in [
            (LinkSide::Left, element.left_id()),
            (LinkSide::Right, element.right_id()),
        ] {
            let Some(neighbor) = neighbor else {
                continue;
            };
            if neighbor == id {
                result.errors.push(CheckError::SelfReference {
                    collection: scope.to_string(),
                    id,
                });
                continue;
            }
            let Some(other) = by_id.get(&neighbor) else {
                result.errors.push(CheckError::DanglingReference {
                    collection: scope.to_string(),
                    id,
                    neighbor,
                });
                continue;
            };
            let mirrored = match side {
                LinkSide::Left => other.right_id(),
                LinkSide::Right => other.left_id(),
            };
            if mirrored != Some(id) {
                result.errors.push(CheckError::AsymmetricLink {
                    collection: scope.to_string(),
                    id,
                    neighbor,
                    side,
                });
            }
        }
    }

    let heads: Vec<OrderId> = elements
        .iter()
        .filter(|e| e.left_id().is_none())
        .map(|e| e.id())
        .collect();
    let tails: Vec<OrderId> = elements
        .iter()
        .filter(|e| e.right_id().is_none())
        .map(|e| e.id())
        .collect();

    if heads.len() > 1 {
        result.errors.push(CheckError::MultipleHeads {
            collection: scope.to_string(),
            ids: heads.clone(),
        });
    }
    if tails.len() > 1 {
        result.errors.push(CheckError::MultipleTails {
            collection: scope.to_string(),
            ids: tails,
        });
    }

    let Some(&head) = heads.first() else {
        result.errors.push(CheckError::Cycle {
            collection: scope.to_string(),
        });
        return;
    };

    // Walk right from the first head; multiple heads are already reported,
    // the other fragments then show up as orphans.
    let mut seen = HashSet::new();
    let mut current = Some(head);
    while let Some(id) = current {
        if !seen.insert(id) {
            result.errors.push(CheckError::Cycle {
                collection: scope.to_string(),
            });
            break;
        }
        current = by_id.get(&id).and_then(|e| e.right_id());
        if current.is_some_and(|next| !by_id.contains_key(&next)) {
            break;
        }
    }

    let mut orphans: Vec<OrderId> = by_id.keys().filter(|id| !seen.contains(*id)).copied().collect();
    if !orphans.is_empty() {
        orphans.sort_unstable();
        result.errors.push(CheckError::Orphans {
            collection: scope.to_string(),
            ids: orphans,
        });
    }
}

fn check_item(
    item: &TodoItem,
    owner: OrderId,
    item_ids: &HashSet<OrderId>,
    result: &mut CheckResult,
) {
    if item.category_id != owner {
        result.errors.push(CheckError::CategoryMismatch {
            item_id: item.id,
            category_id: item.category_id,
            owner,
        });
    }

    if item.added.is_none() {
        result
            .warnings
            .push(CheckWarning::MissingAddedDate { item_id: item.id });
    }

    for &dependency in &item.dependencies {
        if !item_ids.contains(&dependency) {
            result.warnings.push(CheckWarning::UnknownDependency {
                item_id: item.id,
                dependency,
            });
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Ids used more than once, with every collection they appear in.
fn find_duplicate_ids(categories: &[TodoCategory]) -> Vec<(OrderId, Vec<String>)> {
    let mut locations: IndexMap<OrderId, Vec<String>> = IndexMap::new();
    for category in categories {
        locations
            .entry(category.id)
            .or_default()
            .push("categories".to_string());
        for item in &category.items {
            locations
                .entry(item.id)
                .or_default()
                .push(category_scope(category.id));
        }
    }
    locations
        .into_iter()
        .filter(|(_, found)| found.len() > 1)
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
