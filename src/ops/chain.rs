use std::collections::HashSet;

use indexmap::IndexMap;

use crate::model::config::{ChainStrategy, OrderConfig};
use crate::model::order::{OrderId, Orderable};

/// Smallest iteration bound handed to the relocate strategy, so that tiny
/// collections are not cut off by the N³ rule.
pub const MIN_ITERATION_LIMIT: usize = 64;

/// Error type for ordering operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderError {
    #[error("dangling reference: {id} points at {neighbor}, which is not in the collection")]
    DanglingReference { id: OrderId, neighbor: OrderId },
    #[error("self reference: {0} is its own neighbor")]
    SelfReference(OrderId),
    #[error("{role} not found: {id}")]
    ElementNotFound { role: Role, id: OrderId },
    #[error("chain did not settle within {iterations} iterations")]
    NonConvergence { iterations: usize },
    #[error("malformed chain: {0}")]
    MalformedChain(ChainDefect),
    #[error("invalid position for {id}: {reason}")]
    InvalidPosition { id: OrderId, reason: String },
}

/// What an operation was looking for when an id was missing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Moving,
    Anchor,
    Removed,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Moving => write!(f, "moving element"),
            Role::Anchor => write!(f, "element with new order id"),
            Role::Removed => write!(f, "removed element"),
        }
    }
}

/// The way a collection's links fail to form a single chain
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainDefect {
    #[error("id {0} appears more than once")]
    DuplicateId(OrderId),
    #[error("{id} is followed by both {first} and {second}")]
    ConflictingSuccessor {
        id: OrderId,
        first: OrderId,
        second: OrderId,
    },
    #[error("{id} is preceded by both {first} and {second}")]
    ConflictingPredecessor {
        id: OrderId,
        first: OrderId,
        second: OrderId,
    },
    #[error("cycle: every element has a predecessor")]
    Cycle,
    #[error("disconnected fragments starting at {}", join_ids(.heads))]
    Fragments { heads: Vec<OrderId> },
    #[error("unreachable from the head: {}", join_ids(.ids))]
    Orphans { ids: Vec<OrderId> },
}

impl From<ChainDefect> for OrderError {
    fn from(defect: ChainDefect) -> Self {
        OrderError::MalformedChain(defect)
    }
}

/// `1, 2, 3`
pub fn join_ids(ids: &[OrderId]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

// ---------------------------------------------------------------------------
// Link analysis
// ---------------------------------------------------------------------------

/// The neighbor relation of one collection, merged from both link
/// directions. A missing `right_id` is filled in from the successor's
/// `left_id` and vice versa.
#[derive(Debug)]
pub(crate) struct ChainLinks {
    /// Position in the input slice, keyed by id, in ascending id order
    pub index: IndexMap<OrderId, usize>,
    pub successor: IndexMap<OrderId, OrderId>,
    pub predecessor: IndexMap<OrderId, OrderId>,
}

impl ChainLinks {
    /// Ids with no predecessor, ascending
    pub fn heads(&self) -> Vec<OrderId> {
        self.index
            .keys()
            .filter(|id| !self.predecessor.contains_key(*id))
            .copied()
            .collect()
    }
}

/// Validate every element's references and build the merged neighbor
/// relation. Elements are visited in id order so that the first defect
/// reported does not depend on input order.
pub(crate) fn analyze<T: Orderable>(elements: &[T]) -> Result<ChainLinks, OrderError> {
    let mut positions: Vec<usize> = (0..elements.len()).collect();
    positions.sort_by_key(|&p| elements[p].id());

    let mut index = IndexMap::with_capacity(elements.len());
    for &p in &positions {
        let id = elements[p].id();
        if index.insert(id, p).is_some() {
            return Err(ChainDefect::DuplicateId(id).into());
        }
    }

    for &p in &positions {
        let element = &elements[p];
        for neighbor in [element.left_id(), element.right_id()].into_iter().flatten() {
            if neighbor == element.id() {
                return Err(OrderError::SelfReference(element.id()));
            }
            if !index.contains_key(&neighbor) {
                return Err(OrderError::DanglingReference {
                    id: element.id(),
                    neighbor,
                });
            }
        }
    }

    let mut links = ChainLinks {
        index,
        successor: IndexMap::new(),
        predecessor: IndexMap::new(),
    };
    for &p in &positions {
        if let Some(right) = elements[p].right_id() {
            link(&mut links, elements[p].id(), right)?;
        }
    }
    for &p in &positions {
        if let Some(left) = elements[p].left_id() {
            link(&mut links, left, elements[p].id())?;
        }
    }
    Ok(links)
}

/// Record `from` → `to`, rejecting a second successor or predecessor.
fn link(links: &mut ChainLinks, from: OrderId, to: OrderId) -> Result<(), OrderError> {
    if let Some(&existing) = links.successor.get(&from) {
        if existing == to {
            return Ok(());
        }
        return Err(ChainDefect::ConflictingSuccessor {
            id: from,
            first: existing.min(to),
            second: existing.max(to),
        }
        .into());
    }
    if let Some(&existing) = links.predecessor.get(&to) {
        return Err(ChainDefect::ConflictingPredecessor {
            id: to,
            first: existing.min(from),
            second: existing.max(from),
        }
        .into());
    }
    links.successor.insert(from, to);
    links.predecessor.insert(to, from);
    Ok(())
}

// ---------------------------------------------------------------------------
// Reconstruction
// ---------------------------------------------------------------------------

/// Positions of `elements` in chain order (head first), using the configured
/// strategy. The elements themselves are not touched.
pub fn chain_order<T: Orderable>(
    elements: &[T],
    config: &OrderConfig,
) -> Result<Vec<usize>, OrderError> {
    match config.strategy {
        ChainStrategy::Traverse => traverse(elements),
        ChainStrategy::Relocate => relocate(elements, config.iteration_limit),
    }
}

/// References to `elements` in chain order.
pub fn sorted<'a, T: Orderable>(
    elements: &'a [T],
    config: &OrderConfig,
) -> Result<Vec<&'a T>, OrderError> {
    Ok(chain_order(elements, config)?
        .into_iter()
        .map(|p| &elements[p])
        .collect())
}

/// Reorder `elements` into chain order. Links are left as they are; on error
/// the vector is unchanged.
pub fn sort_in_place<T: Orderable>(
    elements: &mut Vec<T>,
    config: &OrderConfig,
) -> Result<(), OrderError> {
    let order = chain_order(elements, config)?;
    let mut slots: Vec<Option<T>> = std::mem::take(elements).into_iter().map(Some).collect();
    elements.extend(order.into_iter().filter_map(|p| slots[p].take()));
    Ok(())
}

/// Walk the chain from its single head.
pub fn traverse<T: Orderable>(elements: &[T]) -> Result<Vec<usize>, OrderError> {
    let links = analyze(elements)?;
    if elements.is_empty() {
        return Ok(Vec::new());
    }

    let head = single_head(&links)?;
    let mut order = Vec::with_capacity(elements.len());
    let mut seen = HashSet::with_capacity(elements.len());
    let mut current = Some(head);
    while let Some(id) = current {
        if !seen.insert(id) {
            return Err(ChainDefect::Cycle.into());
        }
        order.push(links.index[&id]);
        current = links.successor.get(&id).copied();
    }

    if order.len() < elements.len() {
        let ids = links
            .index
            .keys()
            .filter(|id| !seen.contains(*id))
            .copied()
            .collect();
        return Err(ChainDefect::Orphans { ids }.into());
    }
    Ok(order)
}

fn single_head(links: &ChainLinks) -> Result<OrderId, OrderError> {
    let heads = links.heads();
    match heads.as_slice() {
        [] => Err(ChainDefect::Cycle.into()),
        [head] => Ok(*head),
        _ => Err(ChainDefect::Fragments { heads }.into()),
    }
}

/// The iteration bound for `n` elements: the configured value, or N³.
pub fn iteration_limit(n: usize, configured: Option<usize>) -> usize {
    configured.unwrap_or_else(|| n.saturating_pow(3).max(MIN_ITERATION_LIMIT))
}

/// Repair-by-relocation: scan a working buffer left to right and splice each
/// element next to its successor until a full pass makes no change.
///
/// When the pair is out of place, the element with the larger id (or one that
/// has already been relocated) stays put and pulls its successor in behind
/// it; otherwise the current element is pushed in front of its successor.
/// This relies on ids growing with creation time, which holds for
/// backend-assigned ids. The buffer starts in id order, so the result does not
/// depend on input order.
pub fn relocate<T: Orderable>(
    elements: &[T],
    configured_limit: Option<usize>,
) -> Result<Vec<usize>, OrderError> {
    let links = analyze(elements)?;
    if elements.is_empty() {
        return Ok(Vec::new());
    }
    let max_iterations = iteration_limit(elements.len(), configured_limit);

    let mut buffer: Vec<OrderId> = links.index.keys().copied().collect();
    let mut moved: HashSet<OrderId> = HashSet::new();
    let mut index = 0;
    let mut mutations = 0;
    let mut iterations = 0;

    loop {
        if index >= buffer.len() {
            if mutations == 0 {
                break;
            }
            index = 0;
            mutations = 0;
            continue;
        }

        iterations += 1;
        if iterations > max_iterations {
            return Err(OrderError::NonConvergence {
                iterations: max_iterations,
            });
        }

        let current = buffer[index];
        let Some(&next) = links.successor.get(&current) else {
            index += 1;
            continue;
        };
        let next_pos = position_of(&buffer, next);
        if next_pos == index + 1 {
            index += 1;
            continue;
        }

        mutations += 1;
        if current > next || moved.contains(&current) {
            // Pull the successor in behind the current element, then visit it
            buffer.remove(next_pos);
            let current_pos = if next_pos < index { index - 1 } else { index };
            buffer.insert(current_pos + 1, next);
            moved.insert(next);
            index = current_pos + 1;
        } else {
            // Push the current element in front of its successor
            buffer.remove(index);
            let target = if next_pos > index { next_pos - 1 } else { next_pos };
            buffer.insert(target, current);
            moved.insert(current);
            if target < index {
                index += 1;
            }
        }
    }

    single_head(&links)?;
    Ok(buffer.iter().map(|id| links.index[id]).collect())
}

fn position_of(buffer: &[OrderId], id: OrderId) -> usize {
    buffer
        .iter()
        .position(|&b| b == id)
        .unwrap_or(buffer.len())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
