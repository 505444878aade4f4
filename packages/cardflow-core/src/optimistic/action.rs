/// Pending mutations the optimistic layer knows how to apply.
use serde::{Deserialize, Serialize};

use crate::types::{Board, BoardId, Card, CardId, Column, ColumnId};

/// Mutations of one board's columns and cards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Action {
    CreateCard {
        card: Card,
    },
    /// Replace a card's fields. A changed `column_id` moves the card to the
    /// end of that column.
    UpdateCard {
        card: Card,
    },
    DeleteCard {
        card_id: CardId,
    },
    CreateColumn {
        column: Column,
    },
    /// Replace a column's own fields, keeping its cards.
    UpdateColumn {
        column: Column,
    },
    /// Removes the column together with its cards.
    DeleteColumn {
        column_id: ColumnId,
    },
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

impl Action {
    /// Short name used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::CreateCard { .. } => "createCard",
            Action::UpdateCard { .. } => "updateCard",
            Action::DeleteCard { .. } => "deleteCard",
            Action::CreateColumn { .. } => "createColumn",
            Action::UpdateColumn { .. } => "updateColumn",
            Action::DeleteColumn { .. } => "deleteColumn",
            Action::MoveCard { .. } => "moveCard",
            Action::MoveColumn { .. } => "moveColumn",
        }
    }
}

/// Mutations of a user's board list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BoardAction {
    CreateBoard { board: Board },
    UpdateBoard { board: Board },
    DeleteBoard { board_id: BoardId },
}

impl BoardAction {
    pub fn kind(&self) -> &'static str {
        match self {
            BoardAction::CreateBoard { .. } => "createBoard",
            BoardAction::UpdateBoard { .. } => "updateBoard",
            BoardAction::DeleteBoard { .. } => "deleteBoard",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_tagged_serialization() {
        let action = Action::MoveCard {
            card_id: CardId(4),
            column_id: ColumnId(2),
            position: 1,
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["type"], "MoveCard");
        assert_eq!(json["card_id"], 4);

        let back: Action = serde_json::from_value(json).unwrap();
        assert_eq!(back, action);
        assert_eq!(back.kind(), "moveCard");
    }
}
