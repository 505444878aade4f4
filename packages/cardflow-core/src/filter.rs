/// View-level filters. These never feed back into optimistic state or drag
/// handling, which always work on the unfiltered lists.
use unicode_normalization::UnicodeNormalization;

use crate::types::{Board, Column, Priority};

/// Keep only cards whose priority is in `priorities`. An empty set keeps
/// every card. Column order and card positions are left as they are.
pub fn filter_by_priority(columns: &[Column], priorities: &[Priority]) -> Vec<Column> {
    if priorities.is_empty() {
        return columns.to_vec();
    }
    columns
        .iter()
        .map(|column| Column {
            cards: column
                .cards
                .iter()
                .filter(|card| priorities.contains(&card.priority))
                .cloned()
                .collect(),
            ..column.clone()
        })
        .collect()
}

/// Lowercases, NFD-decomposes and strips combining marks, so "resume"
/// matches "Résumé".
fn normalize_for_search(value: &str) -> String {
    value
        .to_lowercase()
        .nfd()
        .filter(|c| !unicode_normalization::char::is_combining_mark(*c))
        .collect()
}

/// Non-archived boards whose title contains `query`, favorites first, then
/// newest created first.
pub fn active_boards(boards: &[Board], query: &str) -> Vec<Board> {
    let needle = normalize_for_search(query.trim());
    let mut active: Vec<Board> = boards
        .iter()
        .filter(|b| !b.is_archived)
        .filter(|b| needle.is_empty() || normalize_for_search(&b.title).contains(&needle))
        .cloned()
        .collect();
    active.sort_by(|a, b| {
        b.is_favorite
            .cmp(&a.is_favorite)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
    active
}

/// Archived boards, most recently updated first.
pub fn archived_boards(boards: &[Board]) -> Vec<Board> {
    let mut archived: Vec<Board> = boards.iter().filter(|b| b.is_archived).cloned().collect();
    archived.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    archived
}
