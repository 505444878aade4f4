/// Position model shared by cards-within-column and columns-within-board.
///
/// Positions are a renumbering discipline rather than a stored rank: after
/// any insert, remove or reorder every element's position is its index in
/// the resulting list (`list[i].position == i`). Inserting at an occupied
/// position P shifts the occupant and everything after it forward by one.
///
/// The in-memory gateway runs these same functions for its batch renumber,
/// so client and store agree on every tie-break.
use crate::types::{Card, CardId, Column, ColumnId};

pub trait Positioned {
    fn position(&self) -> usize;
    fn set_position(&mut self, position: usize);
}

impl Positioned for Card {
    fn position(&self) -> usize {
        self.position
    }

    fn set_position(&mut self, position: usize) {
        self.position = position;
    }
}

impl Positioned for Column {
    fn position(&self) -> usize {
        self.position
    }

    fn set_position(&mut self, position: usize) {
        self.position = position;
    }
}

/// Reassign every element's position to its index.
pub fn renumber<T: Positioned>(items: &mut [T]) {
    for (index, item) in items.iter_mut().enumerate() {
        item.set_position(index);
    }
}

/// True when positions are exactly `0..n-1` in list order.
pub fn is_dense<T: Positioned>(items: &[T]) -> bool {
    items.iter().enumerate().all(|(i, item)| item.position() == i)
}

/// Order rows by stored position (ties broken by `tiebreak`) and close gaps.
/// Used when rebuilding a list from rows that may carry stale positions.
pub fn sort_and_renumber<T, K, F>(items: &mut [T], tiebreak: F)
where
    T: Positioned,
    K: Ord,
    F: Fn(&T) -> K,
{
    items.sort_by(|a, b| {
        a.position()
            .cmp(&b.position())
            .then_with(|| tiebreak(a).cmp(&tiebreak(b)))
    });
    renumber(items);
}

/// Clamp a requested insertion position to `0..=len`.
pub fn clamp_index(len: usize, position: usize) -> usize {
    position.min(len)
}

/// Insert at `position` (clamped to the end), shifting later elements.
/// Returns the index the item landed at.
pub fn insert_at<T: Positioned>(items: &mut Vec<T>, item: T, position: usize) -> usize {
    let index = clamp_index(items.len(), position);
    items.insert(index, item);
    renumber(items);
    index
}

/// Remove the element at `index` and close the gap.
pub fn remove_at<T: Positioned>(items: &mut Vec<T>, index: usize) -> Option<T> {
    if index >= items.len() {
        return None;
    }
    let removed = items.remove(index);
    renumber(items);
    Some(removed)
}

/// Move the element at `from` so it ends up at index `to` (clamped).
/// Returns false when nothing changed.
pub fn array_move<T: Positioned>(items: &mut Vec<T>, from: usize, to: usize) -> bool {
    if from >= items.len() {
        return false;
    }
    let to = to.min(items.len() - 1);
    if from == to {
        return false;
    }
    let item = items.remove(from);
    items.insert(to, item);
    renumber(items);
    true
}

/// Move card `card_id` to `position` in column `column_id`, renumbering
/// both the source and target columns. Returns false when the card or the
/// target column is missing.
pub fn move_card(
    columns: &mut [Column],
    card_id: CardId,
    column_id: ColumnId,
    position: usize,
) -> bool {
    let Some(target_idx) = columns.iter().position(|c| c.id == column_id) else {
        return false;
    };
    let Some((source_idx, card_idx)) = columns.iter().enumerate().find_map(|(ci, col)| {
        col.cards
            .iter()
            .position(|card| card.id == card_id)
            .map(|idx| (ci, idx))
    }) else {
        return false;
    };

    if source_idx == target_idx {
        let cards = &mut columns[target_idx].cards;
        array_move(cards, card_idx, position);
        return true;
    }

    let Some(mut card) = remove_at(&mut columns[source_idx].cards, card_idx) else {
        return false;
    };
    card.column_id = column_id;
    insert_at(&mut columns[target_idx].cards, card, position);
    true
}

/// Move column `column_id` to `position` among its siblings.
pub fn move_column(columns: &mut Vec<Column>, column_id: ColumnId, position: usize) -> bool {
    let Some(from) = columns.iter().position(|c| c.id == column_id) else {
        return false;
    };
    array_move(columns, from, position);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Slot {
        name: &'static str,
        position: usize,
    }

    impl Positioned for Slot {
        fn position(&self) -> usize {
            self.position
        }

        fn set_position(&mut self, position: usize) {
            self.position = position;
        }
    }

    fn slots(names: &[&'static str]) -> Vec<Slot> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| Slot { name: *name, position: i })
            .collect()
    }

    fn names(items: &[Slot]) -> Vec<&'static str> {
        items.iter().map(|s| s.name).collect()
    }

    #[test]
    fn test_insert_at_occupied_slot_shifts_forward() {
        let mut items = slots(&["a", "b", "c"]);
        let at = insert_at(&mut items, Slot { name: "x", position: 99 }, 1);
        assert_eq!(at, 1);
        assert_eq!(names(&items), vec!["a", "x", "b", "c"]);
        assert!(is_dense(&items));
    }

    #[test]
    fn test_insert_past_end_is_clamped() {
        let mut items = slots(&["a", "b"]);
        let at = insert_at(&mut items, Slot { name: "x", position: 0 }, 10);
        assert_eq!(at, 2);
        assert_eq!(names(&items), vec!["a", "b", "x"]);
        assert!(is_dense(&items));
    }

    #[test]
    fn test_remove_closes_gap() {
        let mut items = slots(&["a", "b", "c"]);
        let removed = remove_at(&mut items, 0).unwrap();
        assert_eq!(removed.name, "a");
        assert_eq!(names(&items), vec!["b", "c"]);
        assert!(is_dense(&items));
        assert!(remove_at(&mut items, 5).is_none());
    }

    #[test]
    fn test_array_move_down_and_up() {
        let mut items = slots(&["a", "b", "c"]);
        assert!(array_move(&mut items, 0, 2));
        assert_eq!(names(&items), vec!["b", "c", "a"]);
        assert!(array_move(&mut items, 2, 0));
        assert_eq!(names(&items), vec!["a", "b", "c"]);
        assert!(is_dense(&items));
        assert!(!array_move(&mut items, 1, 1));
    }

    #[test]
    fn test_sort_and_renumber_closes_gaps_with_tiebreak() {
        let mut items = vec![
            Slot { name: "c", position: 7 },
            Slot { name: "b", position: 2 },
            Slot { name: "a", position: 2 },
        ];
        sort_and_renumber(&mut items, |s| s.name);
        assert_eq!(names(&items), vec!["a", "b", "c"]);
        assert!(is_dense(&items));
    }

    #[test]
    fn test_is_dense_detects_gap() {
        let mut items = slots(&["a", "b"]);
        items[1].position = 2;
        assert!(!is_dense(&items));
    }
}
