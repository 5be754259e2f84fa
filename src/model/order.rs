use serde::{Deserialize, Serialize};

/// Backend-assigned identity of an orderable record.
pub type OrderId = u64;

/// The pair of neighbor references stored on every orderable record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Links {
    /// The element immediately before this one, `None` for the head
    #[serde(default)]
    pub left_id: Option<OrderId>,
    /// The element immediately after this one, `None` for the tail
    #[serde(default)]
    pub right_id: Option<OrderId>,
}

impl Links {
    pub fn new(left_id: Option<OrderId>, right_id: Option<OrderId>) -> Self {
        Links { left_id, right_id }
    }

    /// Links of an element that is alone in its collection.
    pub fn detached() -> Self {
        Links::default()
    }

    pub fn is_detached(&self) -> bool {
        self.left_id.is_none() && self.right_id.is_none()
    }
}

/// Anything that takes part in a user-defined order through neighbor links.
///
/// Todo items and categories both implement this; the sequencer operations in
/// [`crate::ops::chain`] and [`crate::ops::link_ops`] are generic over it.
pub trait Orderable {
    fn id(&self) -> OrderId;
    fn links(&self) -> Links;
    fn links_mut(&mut self) -> &mut Links;

    fn left_id(&self) -> Option<OrderId> {
        self.links().left_id
    }

    fn right_id(&self) -> Option<OrderId> {
        self.links().right_id
    }

    fn set_left_id(&mut self, left_id: Option<OrderId>) {
        self.links_mut().left_id = left_id;
    }

    fn set_right_id(&mut self, right_id: Option<OrderId>) {
        self.links_mut().right_id = right_id;
    }
}

/// Desired neighbors of an element after a move.
///
/// `left_id: None` means "new head", `right_id: None` means "new tail".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPosition {
    pub left_id: Option<OrderId>,
    pub right_id: Option<OrderId>,
}

impl NewPosition {
    pub fn between(left_id: Option<OrderId>, right_id: Option<OrderId>) -> Self {
        NewPosition { left_id, right_id }
    }
}

impl From<Links> for NewPosition {
    fn from(links: Links) -> Self {
        NewPosition {
            left_id: links.left_id,
            right_id: links.right_id,
        }
    }
}

/// A position expressed relative to the current chain. Resolved into a
/// [`NewPosition`] against the links as they are when the move happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Become the head
    Head,
    /// Become the tail
    Tail,
    /// Sit immediately after this element
    After(OrderId),
    /// Sit immediately before this element
    Before(OrderId),
    /// Sit exactly between these neighbors
    Between(NewPosition),
}

/// One record whose links were changed by an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LinkChange {
    pub id: OrderId,
    pub before: Links,
    pub after: Links,
}

/// Records whose `left_id`/`right_id` an operation changed, in collection
/// order. The caller persists exactly these.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LinkChanges(pub Vec<LinkChange>);

impl LinkChanges {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LinkChange> {
        self.0.iter()
    }

    pub fn get(&self, id: OrderId) -> Option<&LinkChange> {
        self.0.iter().find(|c| c.id == id)
    }

    pub fn ids(&self) -> Vec<OrderId> {
        self.0.iter().map(|c| c.id).collect()
    }

    /// Fold a later change set into this one. A record touched by both keeps
    /// its earliest `before`; records that end where they started are dropped.
    pub fn merge(&mut self, later: LinkChanges) {
        for change in later.0 {
            match self.0.iter_mut().find(|c| c.id == change.id) {
                Some(existing) => existing.after = change.after,
                None => self.0.push(change),
            }
        }
        self.0.retain(|c| c.before != c.after);
    }
}

impl IntoIterator for LinkChanges {
    type Item = LinkChange;
    type IntoIter = std::vec::IntoIter<LinkChange>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_keeps_first_before_and_last_after() {
        let mut first = LinkChanges(vec![LinkChange {
            id: 1,
            before: Links::new(None, Some(2)),
            after: Links::new(None, Some(3)),
        }]);
        first.merge(LinkChanges(vec![
            LinkChange {
                id: 1,
                before: Links::new(None, Some(3)),
                after: Links::new(None, Some(4)),
            },
            LinkChange {
                id: 4,
                before: Links::new(Some(3), None),
                after: Links::new(Some(1), None),
            },
        ]));
        assert_eq!(first.len(), 2);
        let one = first.get(1).unwrap();
        assert_eq!(one.before, Links::new(None, Some(2)));
        assert_eq!(one.after, Links::new(None, Some(4)));
    }

    #[test]
    fn test_merge_drops_round_trips() {
        let mut first = LinkChanges(vec![LinkChange {
            id: 7,
            before: Links::new(Some(1), None),
            after: Links::new(Some(2), None),
        }]);
        first.merge(LinkChanges(vec![LinkChange {
            id: 7,
            before: Links::new(Some(2), None),
            after: Links::new(Some(1), None),
        }]));
        assert!(first.is_empty());
    }
}
