/// Drag session state and the values a session produces.
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::optimistic::Action;
use crate::types::{BoardId, CardId, Column, ColumnId};

/// The id of something that can be dragged or hovered.
///
/// Columns and cards come from separate id sequences, so the set an id
/// belongs to travels with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum DragId {
    Column(ColumnId),
    Card(CardId),
}

/// Where the dragged entity sits: its container and its index there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Slot {
    Column { board_id: BoardId, position: usize },
    Card { column_id: ColumnId, position: usize },
}

impl Slot {
    pub fn position(&self) -> usize {
        match self {
            Slot::Column { position, .. } | Slot::Card { position, .. } => *position,
        }
    }
}

/// The one move a settled gesture persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MoveRequest {
    MoveCard {
        card_id: CardId,
        column_id: ColumnId,
        position: usize,
    },
    MoveColumn {
        column_id: ColumnId,
        position: usize,
    },
}

impl MoveRequest {
    pub fn subject(&self) -> DragId {
        match self {
            MoveRequest::MoveCard { card_id, .. } => DragId::Card(*card_id),
            MoveRequest::MoveColumn { column_id, .. } => DragId::Column(*column_id),
        }
    }
}

impl From<MoveRequest> for Action {
    fn from(request: MoveRequest) -> Self {
        match request {
            MoveRequest::MoveCard {
                card_id,
                column_id,
                position,
            } => Action::MoveCard {
                card_id,
                column_id,
                position,
            },
            MoveRequest::MoveColumn {
                column_id,
                position,
            } => Action::MoveColumn {
                column_id,
                position,
            },
        }
    }
}

/// Direction of a committed reorder relative to the hovered item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    /// Moved into another container.
    Across,
}

impl Direction {
    pub fn between(from: usize, to: usize) -> Option<Direction> {
        match to.cmp(&from) {
            std::cmp::Ordering::Less => Some(Direction::Up),
            std::cmp::Ordering::Greater => Some(Direction::Down),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn reverses(self, other: Direction) -> bool {
        matches!(
            (self, other),
            (Direction::Up, Direction::Down) | (Direction::Down, Direction::Up)
        )
    }
}

/// State of one live drag gesture.
#[derive(Debug, Clone)]
pub struct DragSession {
    pub active: DragId,
    /// Snapshotted at drag-start; never recomputed.
    pub source: Slot,
    /// Recorded by the last hover that changed the working list.
    pub target: Option<Slot>,
    /// Last processed (active, over) pair, for duplicate suppression.
    pub last_pair: Option<(DragId, DragId)>,
    /// Hover target, direction and time of the last committed reorder.
    pub last_commit: Option<(DragId, Direction, Instant)>,
    /// Working copy of the list, mutated as the gesture progresses.
    pub working: Vec<Column>,
}

impl DragSession {
    /// The slot the gesture will settle into.
    pub fn settled_slot(&self) -> Slot {
        self.target.unwrap_or(self.source)
    }

    /// The move to persist, or `None` when the entity is back where it began.
    pub fn move_request(&self) -> Option<MoveRequest> {
        let settled = self.settled_slot();
        if settled == self.source {
            return None;
        }
        match (self.active, settled) {
            (DragId::Card(card_id), Slot::Card { column_id, position }) => Some(MoveRequest::MoveCard {
                card_id,
                column_id,
                position,
            }),
            (DragId::Column(column_id), Slot::Column { position, .. }) => {
                Some(MoveRequest::MoveColumn { column_id, position })
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum DragState {
    Idle,
    Dragging(DragSession),
    /// Drop resolved to a move whose persistence call has not returned.
    Reconciling(MoveRequest),
}

/// What a drag-end resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropOutcome {
    /// No session was active for this id.
    Ignored,
    /// Dropped outside any target; all session state discarded.
    Cancelled,
    /// Dropped back into its original slot; nothing to persist.
    Unchanged,
    /// Persist exactly this move.
    Persist(MoveRequest),
}
