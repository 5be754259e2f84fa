use std::collections::HashSet;

use tracing::debug;

use crate::model::board::Board;
use crate::model::config::OrderConfig;
use crate::model::order::{LinkChange, LinkChanges, OrderId, Orderable, Placement};
use crate::model::todo::{TodoCategory, TodoItem};
use crate::ops::chain::{ChainDefect, OrderError, sort_in_place};
use crate::ops::link_ops::{append_element, move_element, remove_element, reposition};

/// Error type for board operations
#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error("category not found: {0}")]
    CategoryNotFound(OrderId),
    #[error("item not found: {0}")]
    ItemNotFound(OrderId),
    #[error(transparent)]
    Order(#[from] OrderError),
}

impl Board {
    /// Build a board from records as stored, putting every chain in order.
    pub fn from_categories(
        categories: Vec<TodoCategory>,
        config: OrderConfig,
    ) -> Result<Self, BoardError> {
        let mut board = Board::new(config);
        board.set_categories(categories)?;
        Ok(board)
    }

    /// Replace the board's contents. On error the board is unchanged.
    pub fn set_categories(&mut self, mut categories: Vec<TodoCategory>) -> Result<(), BoardError> {
        for category in &mut categories {
            sort_in_place(&mut category.items, &self.config)?;
        }
        sort_in_place(&mut categories, &self.config)?;
        debug!(
            categories = categories.len(),
            items = categories.iter().map(|c| c.items.len()).sum::<usize>(),
            strategy = %self.config.strategy,
            "board loaded"
        );
        self.categories = categories;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Categories
    // -----------------------------------------------------------------------

    /// Add a category at the end of the board.
    pub fn add_category(&mut self, mut category: TodoCategory) -> Result<LinkChanges, BoardError> {
        sort_in_place(&mut category.items, &self.config)?;
        let id = category.id;
        let changes = append_element(&mut self.categories, category)?;
        debug!(id, changed = changes.len(), "added category");
        Ok(changes)
    }

    /// Replace a category's title. Links and items are kept.
    pub fn update_category(&mut self, id: OrderId, title: &str) -> Result<(), BoardError> {
        let category = self.category_mut(id)?;
        category.title = title.trim().to_string();
        Ok(())
    }

    /// Remove a category with all its items. Dependencies on the removed
    /// items are dropped from the items that remain.
    pub fn remove_category(
        &mut self,
        id: OrderId,
    ) -> Result<(TodoCategory, LinkChanges), BoardError> {
        let (removed, changes) = match remove_element(&mut self.categories, id) {
            Ok(removed) => removed,
            Err(OrderError::ElementNotFound { .. }) => return Err(BoardError::CategoryNotFound(id)),
            Err(e) => return Err(e.into()),
        };
        let gone: HashSet<OrderId> = removed.items.iter().map(|i| i.id).collect();
        let pruned = self.prune_dependencies(&gone);
        debug!(id, items = removed.items.len(), pruned, "removed category");
        Ok((removed, changes))
    }

    pub fn move_category(
        &mut self,
        id: OrderId,
        placement: Placement,
    ) -> Result<LinkChanges, BoardError> {
        self.category_index(id)?;
        let mut categories = self.categories.clone();
        let changes = move_element(&mut categories, id, placement)?;
        settle(&mut categories, id, &self.config)?;
        self.categories = categories;
        debug!(id, ?placement, changed = changes.len(), "moved category");
        Ok(changes)
    }

    // -----------------------------------------------------------------------
    // Items
    // -----------------------------------------------------------------------

    /// Add an item at the end of the category named by its `category_id`.
    pub fn add_item(&mut self, item: TodoItem) -> Result<LinkChanges, BoardError> {
        if let Some(existing) = self.item(item.id) {
            return Err(OrderError::from(ChainDefect::DuplicateId(existing.id)).into());
        }
        let (id, category_id) = (item.id, item.category_id);
        let category = self.category_mut(category_id)?;
        let changes = append_element(&mut category.items, item)?;
        debug!(id, category_id, changed = changes.len(), "added item");
        Ok(changes)
    }

    /// Replace an item's payload (title, state, tags, dependencies, date).
    /// Its links and category are kept.
    pub fn update_item(&mut self, updated: TodoItem) -> Result<(), BoardError> {
        let (ci, ii) = self.item_position(updated.id)?;
        let item = &mut self.categories[ci].items[ii];
        item.title = updated.title;
        item.done = updated.done;
        item.tags = updated.tags;
        item.dependencies = updated.dependencies;
        item.added = updated.added;
        Ok(())
    }

    /// Remove an item. Dependencies on it are dropped from other items.
    pub fn remove_item(&mut self, id: OrderId) -> Result<(TodoItem, LinkChanges), BoardError> {
        let (ci, _) = self.item_position(id)?;
        let (removed, changes) = remove_element(&mut self.categories[ci].items, id)?;
        let pruned = self.prune_dependencies(&HashSet::from([id]));
        debug!(id, pruned, changed = changes.len(), "removed item");
        Ok((removed, changes))
    }

    /// Move an item within its category, or into another one.
    ///
    /// A move across categories takes the item out of its old chain, appends
    /// it to the target chain and then moves it to `placement` there.
    pub fn move_item(
        &mut self,
        id: OrderId,
        target_category: Option<OrderId>,
        placement: Placement,
    ) -> Result<LinkChanges, BoardError> {
        let (source, _) = self.item_position(id)?;
        let source_id = self.categories[source].id;
        let target_id = target_category.unwrap_or(source_id);
        let target = self.category_index(target_id)?;

        if target == source {
            let mut items = self.categories[source].items.clone();
            let changes = move_element(&mut items, id, placement)?;
            settle(&mut items, id, &self.config)?;
            self.categories[source].items = items;
            debug!(id, ?placement, changed = changes.len(), "moved item");
            return Ok(changes);
        }

        let mut source_items = self.categories[source].items.clone();
        let mut target_items = self.categories[target].items.clone();

        let (mut item, mut changes) = remove_element(&mut source_items, id)?;
        let original = self.categories[source]
            .items
            .iter()
            .find(|i| i.id == id)
            .map(|i| i.links())
            .unwrap_or_default();
        item.category_id = target_id;
        changes.merge(append_element(&mut target_items, item)?);
        changes.merge(move_element(&mut target_items, id, placement)?);
        settle(&mut target_items, id, &self.config)?;

        // The moved item's own change runs from where it started, not from
        // the detached state it passed through.
        let moved_links = target_items
            .iter()
            .find(|i| i.id == id)
            .map(|i| i.links())
            .unwrap_or_default();
        changes.0.retain(|c| c.id != id);
        if moved_links != original {
            changes.0.push(LinkChange {
                id,
                before: original,
                after: moved_links,
            });
        }

        self.categories[source].items = source_items;
        self.categories[target].items = target_items;
        debug!(
            id,
            from = source_id,
            to = target_id,
            ?placement,
            changed = changes.len(),
            "moved item across categories"
        );
        Ok(changes)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn category_index(&self, id: OrderId) -> Result<usize, BoardError> {
        self.categories
            .iter()
            .position(|c| c.id == id)
            .ok_or(BoardError::CategoryNotFound(id))
    }

    fn category_mut(&mut self, id: OrderId) -> Result<&mut TodoCategory, BoardError> {
        let idx = self.category_index(id)?;
        Ok(&mut self.categories[idx])
    }

    fn item_position(&self, id: OrderId) -> Result<(usize, usize), BoardError> {
        self.categories
            .iter()
            .enumerate()
            .find_map(|(ci, c)| c.items.iter().position(|i| i.id == id).map(|ii| (ci, ii)))
            .ok_or(BoardError::ItemNotFound(id))
    }

    /// Drop dependencies on `gone` from every item. Returns how many were
    /// dropped.
    fn prune_dependencies(&mut self, gone: &HashSet<OrderId>) -> usize {
        let mut pruned = 0;
        for item in self.categories.iter_mut().flat_map(|c| c.items.iter_mut()) {
            let before = item.dependencies.len();
            item.dependencies.retain(|d| !gone.contains(d));
            pruned += before - item.dependencies.len();
        }
        pruned
    }
}

/// Put a just-moved element at its new place in the vector, and rebuild the
/// whole order from links when verification is on.
fn settle<T: Orderable>(
    elements: &mut Vec<T>,
    id: OrderId,
    config: &OrderConfig,
) -> Result<(), OrderError> {
    reposition(elements, id);
    if config.verify_after_move {
        sort_in_place(elements, config)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::config::ChainStrategy;
    use crate::model::order::{Links, NewPosition};
    use crate::ops::check::check_board;
    use pretty_assertions::assert_eq;

    /// Board with categories 1 and 2; category 1 holds items 10, 11, 12
    fn sample_board(config: OrderConfig) -> Board {
        let mut board = Board::new(config);
        board.add_category(TodoCategory::new(1, "Work")).unwrap();
        board.add_category(TodoCategory::new(2, "Home")).unwrap();
        for id in [10, 11, 12] {
            board
                .add_item(TodoItem::new(id, 1, &format!("Task {}", id)))
                .unwrap();
        }
        board
    }

    fn item_ids(board: &Board, category: OrderId) -> Vec<OrderId> {
        board
            .category(category)
            .unwrap()
            .items
            .iter()
            .map(|i| i.id)
            .collect()
    }

    fn category_ids(board: &Board) -> Vec<OrderId> {
        board.categories().iter().map(|c| c.id).collect()
    }

    fn assert_consistent(board: &Board) {
        let result = check_board(board.categories());
        assert!(result.valid, "{:?}", result.errors);
    }

    #[test]
    fn test_add_keeps_chain_order() {
        let board = sample_board(OrderConfig::default());
        assert_eq!(category_ids(&board), vec![1, 2]);
        assert_eq!(item_ids(&board, 1), vec![10, 11, 12]);
        assert_eq!(board.len(), 2);
        assert_eq!(board.item_count(), 3);
        assert_consistent(&board);
    }

    #[test]
    fn test_add_item_to_missing_category() {
        let mut board = sample_board(OrderConfig::default());
        let err = board.add_item(TodoItem::new(20, 9, "x")).unwrap_err();
        assert!(matches!(err, BoardError::CategoryNotFound(9)));
    }

    #[test]
    fn test_add_item_duplicate_id() {
        let mut board = sample_board(OrderConfig::default());
        let err = board.add_item(TodoItem::new(10, 2, "x")).unwrap_err();
        assert!(matches!(err, BoardError::Order(OrderError::MalformedChain(_))));
        assert!(board.category(2).unwrap().items.is_empty());
    }

    #[test]
    fn test_move_item_within_category() {
        for strategy in [ChainStrategy::Traverse, ChainStrategy::Relocate] {
            let config = OrderConfig {
                strategy,
                ..OrderConfig::default()
            };
            let mut board = sample_board(config);
            let changes = board.move_item(12, None, Placement::Head).unwrap();
            assert_eq!(item_ids(&board, 1), vec![12, 10, 11]);
            assert_eq!(changes.ids(), vec![10, 11, 12]);
            assert_consistent(&board);
        }
    }

    #[test]
    fn test_move_without_verification_uses_local_splice() {
        let config = OrderConfig {
            verify_after_move: false,
            ..OrderConfig::default()
        };
        let mut board = sample_board(config);
        board.move_item(10, None, Placement::After(11)).unwrap();
        assert_eq!(item_ids(&board, 1), vec![11, 10, 12]);
        board.move_item(12, None, Placement::Before(11)).unwrap();
        assert_eq!(item_ids(&board, 1), vec![12, 11, 10]);
        assert_consistent(&board);
    }

    #[test]
    fn test_failed_move_leaves_board_unchanged() {
        let mut board = sample_board(OrderConfig::default());
        let before = board.categories().to_vec();
        let err = board
            .move_item(
                10,
                None,
                Placement::Between(NewPosition::between(Some(11), None)),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            BoardError::Order(OrderError::InvalidPosition { .. })
        ));
        assert_eq!(board.categories(), before.as_slice());
    }

    #[test]
    fn test_move_item_across_categories() {
        let mut board = sample_board(OrderConfig::default());
        board.add_item(TodoItem::new(20, 2, "Laundry")).unwrap();

        let changes = board.move_item(11, Some(2), Placement::Head).unwrap();

        assert_eq!(item_ids(&board, 1), vec![10, 12]);
        assert_eq!(item_ids(&board, 2), vec![11, 20]);
        assert_eq!(board.item(11).unwrap().category_id, 2);
        let moved = changes.get(11).unwrap();
        assert_eq!(moved.before, Links::new(Some(10), Some(12)));
        assert_eq!(moved.after, Links::new(None, Some(20)));
        assert_eq!(changes.ids().len(), 4);
        assert_consistent(&board);
    }

    #[test]
    fn test_move_item_into_empty_category() {
        let mut board = sample_board(OrderConfig::default());
        board.move_item(10, Some(2), Placement::Tail).unwrap();
        assert_eq!(item_ids(&board, 1), vec![11, 12]);
        assert_eq!(item_ids(&board, 2), vec![10]);
        assert!(board.item(10).unwrap().order.is_detached());
        assert_consistent(&board);
    }

    #[test]
    fn test_move_item_across_with_bad_anchor_is_atomic() {
        let mut board = sample_board(OrderConfig::default());
        let before = board.categories().to_vec();
        let err = board.move_item(11, Some(2), Placement::After(12)).unwrap_err();
        assert!(matches!(
            err,
            BoardError::Order(OrderError::ElementNotFound { .. })
        ));
        assert_eq!(board.categories(), before.as_slice());
    }

    #[test]
    fn test_move_category() {
        let mut board = sample_board(OrderConfig::default());
        board.add_category(TodoCategory::new(3, "Someday")).unwrap();
        board.move_category(3, Placement::After(1)).unwrap();
        assert_eq!(category_ids(&board), vec![1, 3, 2]);
        assert_eq!(item_ids(&board, 1), vec![10, 11, 12]);
        assert_consistent(&board);
    }

    #[test]
    fn test_move_missing_category() {
        let mut board = sample_board(OrderConfig::default());
        assert!(matches!(
            board.move_category(8, Placement::Head),
            Err(BoardError::CategoryNotFound(8))
        ));
    }

    #[test]
    fn test_remove_item_prunes_dependencies() {
        let mut board = sample_board(OrderConfig::default());
        let mut dependent = board.item(12).unwrap().clone();
        dependent.dependencies = vec![11, 10];
        board.update_item(dependent).unwrap();

        let (removed, changes) = board.remove_item(11).unwrap();
        assert_eq!(removed.id, 11);
        assert_eq!(changes.ids(), vec![10, 12]);
        assert_eq!(item_ids(&board, 1), vec![10, 12]);
        assert_eq!(board.item(12).unwrap().dependencies, vec![10]);
        assert_consistent(&board);
    }

    #[test]
    fn test_remove_category_prunes_dependencies() {
        let mut board = sample_board(OrderConfig::default());
        let mut home_item = TodoItem::new(20, 2, "Call plumber");
        home_item.dependencies = vec![10, 99];
        board.add_item(home_item).unwrap();

        let (removed, changes) = board.remove_category(1).unwrap();
        assert_eq!(removed.items.len(), 3);
        assert_eq!(changes.ids(), vec![2]);
        assert_eq!(category_ids(&board), vec![2]);
        assert_eq!(board.item(20).unwrap().dependencies, vec![99]);
        assert!(board.categories()[0].order.is_detached());
    }

    #[test]
    fn test_remove_missing_category() {
        let mut board = sample_board(OrderConfig::default());
        assert!(matches!(
            board.remove_category(5),
            Err(BoardError::CategoryNotFound(5))
        ));
    }

    #[test]
    fn test_update_keeps_links() {
        let mut board = sample_board(OrderConfig::default());
        let links = board.item(11).unwrap().order;
        let mut updated = TodoItem::new(11, 2, "Renamed #urgent");
        updated.done = true;
        board.update_item(updated).unwrap();
        let item = board.item(11).unwrap();
        assert_eq!(item.title, "Renamed");
        assert_eq!(item.tags, vec!["urgent"]);
        assert!(item.done);
        assert_eq!(item.category_id, 1);
        assert_eq!(item.order, links);

        board.update_category(2, " House ").unwrap();
        assert_eq!(board.category(2).unwrap().title, "House");
    }

    #[test]
    fn test_from_categories_sorts_stored_order() {
        let board = sample_board(OrderConfig::default());
        let mut stored = board.clone().into_categories();
        stored.reverse();
        stored[1].items.reverse();
        let loaded = Board::from_categories(stored, OrderConfig::default()).unwrap();
        assert_eq!(category_ids(&loaded), vec![1, 2]);
        assert_eq!(item_ids(&loaded, 1), vec![10, 11, 12]);
    }

    #[test]
    fn test_set_categories_error_keeps_board() {
        let mut board = sample_board(OrderConfig::default());
        let mut broken = board.categories().to_vec();
        broken[0].items[0].order.right_id = Some(404);
        assert!(board.set_categories(broken).is_err());
        assert_eq!(item_ids(&board, 1), vec![10, 11, 12]);
    }

    #[test]
    fn test_clear() {
        let mut board = sample_board(OrderConfig::default());
        board.clear();
        assert!(board.is_empty());
        assert_eq!(board.item_count(), 0);
    }
}
