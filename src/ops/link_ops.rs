use crate::model::order::{LinkChange, LinkChanges, Links, NewPosition, OrderId, Orderable, Placement};
use crate::ops::chain::{ChainDefect, ChainLinks, OrderError, Role, analyze};

// ---------------------------------------------------------------------------
// Move
// ---------------------------------------------------------------------------

/// Move one element to a new place in its chain.
///
/// The target is checked against the chain as it will look once the element
/// is taken out of its current place, and nothing is mutated unless the whole
/// move is valid. Returns the records whose links changed. The slice is not
/// reordered; see [`reposition`] and [`crate::ops::chain::sort_in_place`].
pub fn move_element<T: Orderable>(
    elements: &mut [T],
    moving_id: OrderId,
    placement: Placement,
) -> Result<LinkChanges, OrderError> {
    let moving_idx = position(elements, moving_id).ok_or(OrderError::ElementNotFound {
        role: Role::Moving,
        id: moving_id,
    })?;
    let links = analyze(elements)?;
    let view = DetachedView::new(&links, moving_id);
    let target = view.resolve(elements, placement)?;
    view.validate(elements, target)?;

    if target.left_id == view.old_left && target.right_id == view.old_right {
        return Ok(LinkChanges::default());
    }

    let before = snapshot(elements);
    unlink(elements, moving_idx);
    attach(elements, moving_idx, target);
    Ok(diff(elements, &before))
}

/// Resolve a placement into concrete neighbors, without moving anything.
pub fn resolve_placement<T: Orderable>(
    elements: &[T],
    moving_id: OrderId,
    placement: Placement,
) -> Result<NewPosition, OrderError> {
    if position(elements, moving_id).is_none() {
        return Err(OrderError::ElementNotFound {
            role: Role::Moving,
            id: moving_id,
        });
    }
    let links = analyze(elements)?;
    let view = DetachedView::new(&links, moving_id);
    let target = view.resolve(elements, placement)?;
    view.validate(elements, target)?;
    Ok(target)
}

/// The neighbor relation as it will be once the moving element is unlinked.
struct DetachedView<'a> {
    links: &'a ChainLinks,
    moving: OrderId,
    old_left: Option<OrderId>,
    old_right: Option<OrderId>,
}

impl<'a> DetachedView<'a> {
    fn new(links: &'a ChainLinks, moving: OrderId) -> Self {
        DetachedView {
            links,
            moving,
            old_left: links.predecessor.get(&moving).copied(),
            old_right: links.successor.get(&moving).copied(),
        }
    }

    fn successor(&self, id: OrderId) -> Option<OrderId> {
        match self.links.successor.get(&id).copied() {
            Some(next) if next == self.moving => self.old_right,
            other => other,
        }
    }

    fn predecessor(&self, id: OrderId) -> Option<OrderId> {
        match self.links.predecessor.get(&id).copied() {
            Some(prev) if prev == self.moving => self.old_left,
            other => other,
        }
    }

    /// Ids other than the moving one, in ascending order
    fn others(&self) -> impl Iterator<Item = OrderId> + '_ {
        self.links
            .index
            .keys()
            .copied()
            .filter(move |&id| id != self.moving)
    }

    fn resolve<T: Orderable>(
        &self,
        elements: &[T],
        placement: Placement,
    ) -> Result<NewPosition, OrderError> {
        match placement {
            Placement::Between(target) => Ok(target),
            Placement::After(anchor) => {
                self.require_anchor(elements, anchor)?;
                Ok(NewPosition::between(Some(anchor), self.successor(anchor)))
            }
            Placement::Before(anchor) => {
                self.require_anchor(elements, anchor)?;
                Ok(NewPosition::between(self.predecessor(anchor), Some(anchor)))
            }
            Placement::Head => {
                let heads: Vec<OrderId> = self
                    .others()
                    .filter(|&id| self.predecessor(id).is_none())
                    .collect();
                Ok(NewPosition::between(None, self.single_end(heads)?))
            }
            Placement::Tail => {
                let tails: Vec<OrderId> = self
                    .others()
                    .filter(|&id| self.successor(id).is_none())
                    .collect();
                Ok(NewPosition::between(self.single_end(tails)?, None))
            }
        }
    }

    fn single_end(&self, ends: Vec<OrderId>) -> Result<Option<OrderId>, OrderError> {
        match ends.as_slice() {
            [] if self.others().next().is_none() => Ok(None),
            [] => Err(ChainDefect::Cycle.into()),
            [end] => Ok(Some(*end)),
            _ => Err(ChainDefect::Fragments {
                heads: self
                    .others()
                    .filter(|&id| self.predecessor(id).is_none())
                    .collect(),
            }
            .into()),
        }
    }

    fn require_anchor<T: Orderable>(&self, elements: &[T], anchor: OrderId) -> Result<(), OrderError> {
        if anchor == self.moving {
            return Err(OrderError::SelfReference(anchor));
        }
        if position(elements, anchor).is_none() {
            return Err(OrderError::ElementNotFound {
                role: Role::Anchor,
                id: anchor,
            });
        }
        Ok(())
    }

    fn validate<T: Orderable>(&self, elements: &[T], target: NewPosition) -> Result<(), OrderError> {
        for anchor in [target.left_id, target.right_id].into_iter().flatten() {
            self.require_anchor(elements, anchor)?;
        }
        let invalid = |reason: String| OrderError::InvalidPosition {
            id: self.moving,
            reason,
        };
        match (target.left_id, target.right_id) {
            (Some(left), Some(right)) if left == right => Err(invalid(format!(
                "{} cannot be both the left and the right neighbor",
                left
            ))),
            (Some(left), Some(right)) => {
                if self.successor(left) == Some(right) {
                    Ok(())
                } else {
                    Err(invalid(format!("{} and {} are not adjacent", left, right)))
                }
            }
            (Some(left), None) => match self.successor(left) {
                None => Ok(()),
                Some(_) => Err(invalid(format!("{} is not the tail", left))),
            },
            (None, Some(right)) => match self.predecessor(right) {
                None => Ok(()),
                Some(_) => Err(invalid(format!("{} is not the head", right))),
            },
            (None, None) => match self.others().next() {
                None => Ok(()),
                Some(_) => Err(invalid(
                    "no neighbors given but the collection has other elements".to_string(),
                )),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Detach / remove / append
// ---------------------------------------------------------------------------

/// Take an element out of its chain, linking its neighbors to each other.
/// The element stays in the slice with empty links. A collection whose links
/// contradict each other is rejected untouched.
pub fn detach_element<T: Orderable>(
    elements: &mut [T],
    id: OrderId,
) -> Result<LinkChanges, OrderError> {
    let idx = position(elements, id).ok_or(OrderError::ElementNotFound {
        role: Role::Removed,
        id,
    })?;
    analyze(elements)?;
    let before = snapshot(elements);
    unlink(elements, idx);
    Ok(diff(elements, &before))
}

/// Splice an element out of its chain and remove it from the collection.
/// Returns the removed element (with empty links) and the changes to the
/// elements that remain.
pub fn remove_element<T: Orderable>(
    elements: &mut Vec<T>,
    id: OrderId,
) -> Result<(T, LinkChanges), OrderError> {
    let mut changes = detach_element(elements, id)?;
    changes.0.retain(|c| c.id != id);
    let idx = position(elements, id).ok_or(OrderError::ElementNotFound {
        role: Role::Removed,
        id,
    })?;
    Ok((elements.remove(idx), changes))
}

/// Add a new element at the tail of the chain.
pub fn append_element<T: Orderable>(
    elements: &mut Vec<T>,
    mut element: T,
) -> Result<LinkChanges, OrderError> {
    if position(elements, element.id()).is_some() {
        return Err(ChainDefect::DuplicateId(element.id()).into());
    }
    let links = analyze(elements)?;
    let tails: Vec<OrderId> = links
        .index
        .keys()
        .filter(|id| !links.successor.contains_key(*id))
        .copied()
        .collect();
    let tail = match tails.as_slice() {
        [] if elements.is_empty() => None,
        [] => return Err(ChainDefect::Cycle.into()),
        [tail] => Some(*tail),
        _ => {
            return Err(ChainDefect::Fragments {
                heads: links.heads(),
            }
            .into());
        }
    };

    let mut changes = LinkChanges::default();
    let incoming = element.links();
    *element.links_mut() = Links::new(tail, None);
    if let Some(tail_id) = tail
        && let Some(tail_idx) = position(elements, tail_id)
    {
        let tail_before = elements[tail_idx].links();
        elements[tail_idx].set_right_id(Some(element.id()));
        changes.0.push(LinkChange {
            id: tail_id,
            before: tail_before,
            after: elements[tail_idx].links(),
        });
    }
    if incoming != element.links() {
        changes.0.push(LinkChange {
            id: element.id(),
            before: incoming,
            after: element.links(),
        });
    }
    elements.push(element);
    Ok(changes)
}

/// Move an element within the vector so it sits right after its left
/// neighbor (or first, if it is the head). A local splice that avoids
/// rebuilding the whole order after a single move.
pub fn reposition<T: Orderable>(elements: &mut Vec<T>, id: OrderId) {
    let Some(idx) = position(elements, id) else {
        return;
    };
    let element = elements.remove(idx);
    let target = match element.left_id() {
        None => 0,
        Some(left) => match position(elements, left) {
            Some(p) => p + 1,
            None => elements.len(),
        },
    };
    elements.insert(target, element);
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn position<T: Orderable>(elements: &[T], id: OrderId) -> Option<usize> {
    elements.iter().position(|e| e.id() == id)
}

/// Clear an element's links and point its neighbors at each other. Also
/// repairs stray one-sided references to the element.
fn unlink<T: Orderable>(elements: &mut [T], idx: usize) {
    let id = elements[idx].id();
    let left = elements[idx].left_id().or_else(|| {
        elements
            .iter()
            .find(|e| e.right_id() == Some(id))
            .map(|e| e.id())
    });
    let right = elements[idx].right_id().or_else(|| {
        elements
            .iter()
            .find(|e| e.left_id() == Some(id))
            .map(|e| e.id())
    });

    *elements[idx].links_mut() = Links::detached();
    for element in elements.iter_mut() {
        if element.id() == id {
            continue;
        }
        if element.right_id() == Some(id) || Some(element.id()) == left {
            element.set_right_id(right);
        }
        if element.left_id() == Some(id) || Some(element.id()) == right {
            element.set_left_id(left);
        }
    }
}

/// Link a detached element between the target neighbors.
fn attach<T: Orderable>(elements: &mut [T], idx: usize, target: NewPosition) {
    let id = elements[idx].id();
    *elements[idx].links_mut() = Links::new(target.left_id, target.right_id);
    for element in elements.iter_mut() {
        if Some(element.id()) == target.left_id {
            element.set_right_id(Some(id));
        }
        if Some(element.id()) == target.right_id {
            element.set_left_id(Some(id));
        }
    }
}

fn snapshot<T: Orderable>(elements: &[T]) -> Vec<(OrderId, Links)> {
    elements.iter().map(|e| (e.id(), e.links())).collect()
}

fn diff<T: Orderable>(elements: &[T], before: &[(OrderId, Links)]) -> LinkChanges {
    LinkChanges(
        elements
            .iter()
            .zip(before)
            .filter(|(e, (_, old))| e.links() != *old)
            .map(|(e, (id, old))| LinkChange {
                id: *id,
                before: *old,
                after: e.links(),
            })
            .collect(),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
