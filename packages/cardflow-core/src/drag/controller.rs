/// Drag controller: Idle -> Dragging -> (Idle | Reconciling -> Idle).
///
/// Hover handling works on a working copy of the list taken at drag-start
/// and always locates the dragged entity and the hover target fresh in that
/// copy; no index is carried over from one event to the next. Two guards
/// keep the list from oscillating while the UI animates:
/// - an exact repeat of the last processed (active, over) pair is a no-op;
/// - a reorder against the same hover target as the last committed reorder,
///   in the opposite direction and within `SETTLE_WINDOW` of it, is treated
///   as a stale event and skipped. Past the window the same reversal is a
///   deliberate drag back and is applied.
///
/// Each committed hover records the authoritative target slot. The drop
/// persists that record; it is never re-derived from the mutated list.
use std::time::{Duration, Instant};

use crate::position::{array_move, insert_at, remove_at};
use crate::types::{CardId, Column, ColumnId};

use super::session::{Direction, DragId, DragSession, DragState, DropOutcome, MoveRequest, Slot};

/// How long after a committed reorder the list may still be animating
/// under the pointer.
pub const SETTLE_WINDOW: Duration = Duration::from_millis(250);

#[derive(Debug)]
pub struct DragController {
    state: DragState,
}

impl Default for DragController {
    fn default() -> Self {
        Self::new()
    }
}

impl DragController {
    pub fn new() -> Self {
        Self {
            state: DragState::Idle,
        }
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging(_))
    }

    pub fn session(&self) -> Option<&DragSession> {
        match &self.state {
            DragState::Dragging(session) => Some(session),
            _ => None,
        }
    }

    /// The list as the gesture currently shows it.
    pub fn working(&self) -> Option<&[Column]> {
        self.session().map(|s| s.working.as_slice())
    }

    /// Start a session over `view`. Returns false (and stays put) when `id`
    /// is not present in the list.
    pub fn on_drag_start(&mut self, id: DragId, view: Vec<Column>) -> bool {
        let source = match id {
            DragId::Card(card_id) => locate_card(&view, card_id).map(|(ci, idx)| Slot::Card {
                column_id: view[ci].id,
                position: idx,
            }),
            DragId::Column(column_id) => {
                view.iter()
                    .position(|c| c.id == column_id)
                    .map(|idx| Slot::Column {
                        board_id: view[idx].board_id,
                        position: idx,
                    })
            }
        };
        let Some(source) = source else {
            log::debug!("[cardflow.drag.start] {:?} not found, ignoring", id);
            return false;
        };

        if let DragState::Dragging(previous) = &self.state {
            log::warn!(
                "[cardflow.drag.start] {:?} replaces unfinished session for {:?}",
                id,
                previous.active
            );
        }

        log::debug!("[cardflow.drag.start] {:?} from {:?}", id, source);
        self.state = DragState::Dragging(DragSession {
            active: id,
            source,
            target: None,
            last_pair: None,
            last_commit: None,
            working: view,
        });
        true
    }

    /// Apply one hover event. Returns true when the working list changed.
    pub fn on_drag_over(&mut self, active: DragId, over: DragId) -> bool {
        self.on_drag_over_at(active, over, Instant::now())
    }

    pub(crate) fn on_drag_over_at(&mut self, active: DragId, over: DragId, now: Instant) -> bool {
        match &mut self.state {
            DragState::Dragging(session) => hover(session, active, over, now),
            _ => false,
        }
    }

    /// End the session. A `None` target cancels; otherwise the final hover is
    /// applied (idempotently) and the recorded target decides the outcome.
    pub fn on_drag_end(&mut self, active: DragId, over: Option<DragId>) -> DropOutcome {
        let state = std::mem::replace(&mut self.state, DragState::Idle);
        let mut session = match state {
            DragState::Dragging(session) => session,
            other => {
                self.state = other;
                return DropOutcome::Ignored;
            }
        };

        if session.active != active {
            log::warn!(
                "[cardflow.drag.end] end for {:?} during session for {:?}, cancelling",
                active,
                session.active
            );
            return DropOutcome::Cancelled;
        }

        let Some(over) = over else {
            log::debug!("[cardflow.drag.end] {:?} dropped outside any target", active);
            return DropOutcome::Cancelled;
        };

        hover(&mut session, active, over, Instant::now());

        match session.move_request() {
            None => {
                log::debug!("[cardflow.drag.end] {:?} settled in its original slot", active);
                DropOutcome::Unchanged
            }
            Some(request) => {
                log::info!("[cardflow.drag.end] {:?} settles as {:?}", active, request);
                self.state = DragState::Reconciling(request);
                DropOutcome::Persist(request)
            }
        }
    }

    /// Reconciling -> Idle once the persistence call for `request` returned.
    /// A newer session that started in the meantime is left alone.
    pub fn settle(&mut self, request: &MoveRequest) -> bool {
        match &self.state {
            DragState::Reconciling(pending) if pending == request => {
                self.state = DragState::Idle;
                true
            }
            _ => false,
        }
    }

    /// Abandon any session without side effects.
    pub fn cancel(&mut self) {
        if self.is_dragging() {
            log::debug!("[cardflow.drag] session cancelled");
            self.state = DragState::Idle;
        }
    }
}

/// (column index, card index) of `card_id` in `columns`.
fn locate_card(columns: &[Column], card_id: CardId) -> Option<(usize, usize)> {
    columns.iter().enumerate().find_map(|(ci, col)| {
        col.cards
            .iter()
            .position(|c| c.id == card_id)
            .map(|idx| (ci, idx))
    })
}

fn hover(session: &mut DragSession, active: DragId, over: DragId, now: Instant) -> bool {
    if active != session.active {
        log::debug!(
            "[cardflow.drag.over] {:?} is not the active entity {:?}",
            active,
            session.active
        );
        return false;
    }
    if session.last_pair == Some((active, over)) {
        return false;
    }
    session.last_pair = Some((active, over));
    if over == active {
        return false;
    }

    match active {
        DragId::Card(card_id) => hover_card(session, card_id, over, now),
        DragId::Column(column_id) => hover_column(session, column_id, over, now),
    }
}

fn is_stale_reversal(
    session: &DragSession,
    over: DragId,
    direction: Direction,
    now: Instant,
) -> bool {
    match session.last_commit {
        Some((prev_over, prev_direction, committed_at)) if prev_over == over => {
            direction.reverses(prev_direction)
                && now.saturating_duration_since(committed_at) < SETTLE_WINDOW
        }
        _ => false,
    }
}

/// Over a card: take that card's index (it shifts outward). Over a column
/// body: go to the end of that column.
fn hover_card(session: &mut DragSession, card_id: CardId, over: DragId, now: Instant) -> bool {
    let Some((from_col, from_idx)) = locate_card(&session.working, card_id) else {
        log::warn!("[cardflow.drag.over] dragged card {} vanished from the list", card_id);
        return false;
    };

    let resolved = match over {
        DragId::Card(over_id) => locate_card(&session.working, over_id),
        DragId::Column(column_id) => session
            .working
            .iter()
            .position(|c| c.id == column_id)
            .map(|ci| {
                let len = session.working[ci].cards.len();
                let end = if ci == from_col { len - 1 } else { len };
                (ci, end)
            }),
    };
    let Some((to_col, to_idx)) = resolved else {
        log::debug!("[cardflow.drag.over] hover target {:?} not found", over);
        return false;
    };

    let direction = if from_col == to_col {
        match Direction::between(from_idx, to_idx) {
            Some(direction) => direction,
            None => return false,
        }
    } else {
        Direction::Across
    };

    if is_stale_reversal(session, over, direction, now) {
        log::debug!(
            "[cardflow.drag.over] skipping reversed reorder of card {} against {:?}",
            card_id,
            over
        );
        return false;
    }

    let working = &mut session.working;
    if from_col == to_col {
        array_move(&mut working[from_col].cards, from_idx, to_idx);
    } else {
        let Some(mut card) = remove_at(&mut working[from_col].cards, from_idx) else {
            return false;
        };
        card.column_id = working[to_col].id;
        insert_at(&mut working[to_col].cards, card, to_idx);
    }

    let column_id: ColumnId = working[to_col].id;
    let position = working[to_col]
        .cards
        .iter()
        .position(|c| c.id == card_id)
        .unwrap_or(to_idx);

    session.target = Some(Slot::Card { column_id, position });
    session.last_commit = Some((over, direction, now));
    log::debug!(
        "[cardflow.drag.over] card {} -> column {} position {}",
        card_id,
        column_id,
        position
    );
    true
}

/// Hovering a card while dragging a column means hovering that card's column.
fn hover_column(
    session: &mut DragSession,
    column_id: ColumnId,
    over: DragId,
    now: Instant,
) -> bool {
    let Some(from) = session.working.iter().position(|c| c.id == column_id) else {
        log::warn!("[cardflow.drag.over] dragged column {} vanished from the list", column_id);
        return false;
    };
    let to = match over {
        DragId::Column(over_id) => session.working.iter().position(|c| c.id == over_id),
        DragId::Card(card_id) => locate_card(&session.working, card_id).map(|(ci, _)| ci),
    };
    let Some(to) = to else {
        log::debug!("[cardflow.drag.over] hover target {:?} not found", over);
        return false;
    };
    let Some(direction) = Direction::between(from, to) else {
        return false;
    };

    if is_stale_reversal(session, over, direction, now) {
        log::debug!(
            "[cardflow.drag.over] skipping reversed reorder of column {} against {:?}",
            column_id,
            over
        );
        return false;
    }

    array_move(&mut session.working, from, to);
    let board_id = session.working[to].board_id;
    session.target = Some(Slot::Column {
        board_id,
        position: to,
    });
    session.last_commit = Some((over, direction, now));
    log::debug!("[cardflow.drag.over] column {} -> position {}", column_id, to);
    true
}
