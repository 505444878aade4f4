/// Pure reducers applied on top of confirmed state.
///
/// Every action is handled; an action naming an entity that is not present
/// is a no-op (the provisional view is recomputed on every render and must
/// never fail). Each step renumbers the containers it touched, so positions
/// stay dense after any action.
use crate::position::{self, renumber};
use crate::types::{Board, Card, Column};

use super::action::{Action, BoardAction};

/// Apply `action` to a copy of `columns`.
pub fn reduce(columns: &[Column], action: &Action) -> Vec<Column> {
    apply(columns.to_vec(), action)
}

/// Owned form of [`reduce`], used when folding a pending log.
pub fn apply(mut columns: Vec<Column>, action: &Action) -> Vec<Column> {
    match action {
        Action::CreateCard { card } => {
            if columns.iter().any(|c| c.contains_card(card.id)) {
                log::debug!("[cardflow.reducer] createCard {} already present", card.id);
                return columns;
            }
            match columns.iter_mut().find(|c| c.id == card.column_id) {
                Some(col) => {
                    col.cards.push(card.clone());
                    renumber(&mut col.cards);
                }
                None => log::warn!(
                    "[cardflow.reducer] createCard for missing column {}",
                    card.column_id
                ),
            }
            columns
        }
        Action::UpdateCard { card } => update_card(columns, card),
        Action::DeleteCard { card_id } => {
            for col in columns.iter_mut() {
                let before = col.cards.len();
                col.cards.retain(|c| c.id != *card_id);
                if col.cards.len() != before {
                    renumber(&mut col.cards);
                }
            }
            columns
        }
        Action::CreateColumn { column } => {
            if columns.iter().any(|c| c.id == column.id) {
                log::debug!("[cardflow.reducer] createColumn {} already present", column.id);
                return columns;
            }
            let mut column = column.clone();
            column.cards.clear();
            columns.push(column);
            renumber(&mut columns);
            columns
        }
        Action::UpdateColumn { column } => columns
            .into_iter()
            .map(|col| {
                if col.id == column.id {
                    col.with_fields_of(column)
                } else {
                    col
                }
            })
            .collect(),
        Action::DeleteColumn { column_id } => {
            columns.retain(|c| c.id != *column_id);
            renumber(&mut columns);
            columns
        }
        Action::MoveCard {
            card_id,
            column_id,
            position,
        } => {
            if !position::move_card(&mut columns, *card_id, *column_id, *position) {
                log::debug!(
                    "[cardflow.reducer] moveCard {} -> {} ignored, card or column missing",
                    card_id,
                    column_id
                );
            }
            columns
        }
        Action::MoveColumn {
            column_id,
            position,
        } => {
            if !position::move_column(&mut columns, *column_id, *position) {
                log::debug!(
                    "[cardflow.reducer] moveColumn {} ignored, column missing",
                    column_id
                );
            }
            columns
        }
    }
}

/// Replace in place when the column is unchanged; otherwise filter the card
/// out of its old column and append it to the new one in the same pass, so
/// no returned state ever lists it twice.
fn update_card(columns: Vec<Column>, card: &Card) -> Vec<Column> {
    let Some(holder) = columns.iter().find(|c| c.contains_card(card.id)).map(|c| c.id) else {
        log::debug!("[cardflow.reducer] updateCard for unknown card {}", card.id);
        return columns;
    };

    if holder == card.column_id {
        return columns
            .into_iter()
            .map(|mut col| {
                if col.id == holder {
                    for existing in col.cards.iter_mut().filter(|c| c.id == card.id) {
                        let position = existing.position;
                        *existing = card.clone();
                        existing.position = position;
                    }
                }
                col
            })
            .collect();
    }

    if !columns.iter().any(|c| c.id == card.column_id) {
        log::warn!(
            "[cardflow.reducer] updateCard {} targets missing column {}",
            card.id,
            card.column_id
        );
        return columns;
    }

    columns
        .into_iter()
        .map(|mut col| {
            if col.id == holder {
                col.cards.retain(|c| c.id != card.id);
                renumber(&mut col.cards);
            } else if col.id == card.column_id {
                col.cards.push(card.clone());
                renumber(&mut col.cards);
            }
            col
        })
        .collect()
}

pub fn reduce_boards(boards: &[Board], action: &BoardAction) -> Vec<Board> {
    apply_boards(boards.to_vec(), action)
}

/// New boards are listed first (newest first). Creating an id that is
/// already listed is a no-op, as for cards and columns.
pub fn apply_boards(mut boards: Vec<Board>, action: &BoardAction) -> Vec<Board> {
    match action {
        BoardAction::CreateBoard { board } => {
            if !boards.iter().any(|b| b.id == board.id) {
                boards.insert(0, board.clone());
            }
        }
        BoardAction::UpdateBoard { board } => {
            if let Some(existing) = boards.iter_mut().find(|b| b.id == board.id) {
                *existing = board.clone();
            }
        }
        BoardAction::DeleteBoard { board_id } => {
            boards.retain(|b| b.id != *board_id);
        }
    }
    boards
}
