/// Optimistic/confirmed deduplication.
///
/// Optimistic creation races the server round-trip. When the confirmed
/// entity lands in confirmed state while its optimistic placeholder is still
/// pending, both are present for a moment with matching content and
/// different ids. Matching is by semantic key (see `identity`):
/// - first occurrence of a key -> keep
/// - confirmed after optimistic -> replace the kept one in place
/// - optimistic after confirmed -> drop
/// - both optimistic or both confirmed -> keep the first, drop the later
///
/// The pass is pure and idempotent.
use std::collections::HashMap;
use std::hash::Hash;

use crate::identity::{board_key, card_key, column_key};
use crate::types::{Board, Card, Column};

/// Anything that may be an optimistic placeholder.
pub trait Provisional {
    fn is_optimistic(&self) -> bool;
}

impl Provisional for Card {
    fn is_optimistic(&self) -> bool {
        self.is_optimistic
    }
}

impl Provisional for Column {
    fn is_optimistic(&self) -> bool {
        self.is_optimistic
    }
}

impl Provisional for Board {
    fn is_optimistic(&self) -> bool {
        self.is_optimistic
    }
}

/// Keep at most one representative per key, preferring confirmed items.
pub fn deduplicate<T, K, F>(items: Vec<T>, key_of: F) -> Vec<T>
where
    T: Provisional,
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut seen: HashMap<K, usize> = HashMap::with_capacity(items.len());
    let mut result: Vec<T> = Vec::with_capacity(items.len());

    for item in items {
        let key = key_of(&item);
        if let Some(&index) = seen.get(&key) {
            if !item.is_optimistic() && result[index].is_optimistic() {
                // Placeholder promoted to its confirmed counterpart
                result[index] = item;
            }
        } else {
            seen.insert(key, result.len());
            result.push(item);
        }
    }

    result
}

pub fn dedup_cards(cards: Vec<Card>) -> Vec<Card> {
    deduplicate(cards, card_key)
}

/// Deduplicate columns, then the cards inside each surviving column.
pub fn dedup_columns(columns: Vec<Column>) -> Vec<Column> {
    let before: usize = columns.iter().map(|c| c.cards.len() + 1).sum();
    let result: Vec<Column> = deduplicate(columns, column_key)
        .into_iter()
        .map(|mut col| {
            col.cards = dedup_cards(std::mem::take(&mut col.cards));
            col
        })
        .collect();
    let after: usize = result.iter().map(|c| c.cards.len() + 1).sum();
    if after < before {
        log::debug!(
            "[cardflow.reconcile.dedup] Collapsed {} duplicate entries",
            before - after
        );
    }
    result
}

pub fn dedup_boards(boards: Vec<Board>) -> Vec<Board> {
    deduplicate(boards, board_key)
}
