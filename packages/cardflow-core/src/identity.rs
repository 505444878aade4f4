/// Entity identity helpers.
///
/// Two kinds of identity live side by side on the client:
/// - temporary ids for optimistic entities, drawn from the negative range so
///   they can never collide with server ids (which are positive);
/// - semantic keys, content fingerprints that match an optimistic entity with
///   its server-confirmed counterpart even though their ids differ.
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::LazyLock;

use sha2::{Digest, Sha256};

use crate::types::{Board, BoardId, Card, CardId, Column, ColumnId};

/// Upper bound for the clock-derived base, leaving room for the sequence
/// so the negated id never leaves the negative range.
const TEMP_BASE_MAX: i64 = i64::MAX / 2;

static TEMP_BASE: LazyLock<i64> = LazyLock::new(|| {
    let millis = std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    temp_base_from_millis(millis)
});
static TEMP_SEQ: AtomicI64 = AtomicI64::new(0);

fn temp_base_from_millis(millis: u128) -> i64 {
    i64::try_from(millis).map_or(TEMP_BASE_MAX, |m| m.min(TEMP_BASE_MAX))
}

/// Next raw temporary id. Strictly decreasing within the process.
fn next_temp_raw() -> i64 {
    let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
    -(*TEMP_BASE + seq + 1)
}

pub fn temp_board_id() -> BoardId {
    BoardId(next_temp_raw())
}

pub fn temp_column_id() -> ColumnId {
    ColumnId(next_temp_raw())
}

pub fn temp_card_id() -> CardId {
    CardId(next_temp_raw())
}

/// Content fingerprint used as a deduplication key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SemanticKey(pub String);

impl SemanticKey {
    /// SHA-256 over length-prefixed fields, so `("a-b", "c")` and
    /// `("a", "b-c")` produce different keys.
    pub fn from_fields(fields: &[&str]) -> Self {
        let mut hasher = Sha256::new();
        for field in fields {
            hasher.update((field.len() as u64).to_le_bytes());
            hasher.update(field.as_bytes());
        }
        Self(hex::encode(hasher.finalize()))
    }
}

/// Card key: title, description, priority, parent column.
pub fn card_key(card: &Card) -> SemanticKey {
    let column = card.column_id.to_string();
    SemanticKey::from_fields(&[
        &card.title,
        card.description.as_deref().unwrap_or(""),
        card.priority.as_str(),
        &column,
    ])
}

/// Column key: title, parent board.
pub fn column_key(column: &Column) -> SemanticKey {
    let board = column.board_id.to_string();
    SemanticKey::from_fields(&[&column.title, &board])
}

/// Board key: title, display color.
pub fn board_key(board: &Board) -> SemanticKey {
    SemanticKey::from_fields(&[&board.title, &board.color])
}
