pub mod memory;
pub mod ratelimit;

pub use memory::InMemoryGateway;
pub use ratelimit::RateLimiter;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{
    Board, BoardId, BoardPatch, BoardSnapshot, Card, CardId, CardPatch, Column, ColumnId,
    ColumnPatch, NewBoard, NewCard, NewColumn,
};

/// Every persistence call the engine makes, used to key rate limits,
/// failure injection and call counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Operation {
    #[serde(rename = "board:list")]
    ListBoards,
    #[serde(rename = "board:load")]
    LoadBoard,
    #[serde(rename = "board:create")]
    CreateBoard,
    #[serde(rename = "board:update")]
    UpdateBoard,
    #[serde(rename = "board:delete")]
    DeleteBoard,
    #[serde(rename = "column:create")]
    CreateColumn,
    #[serde(rename = "column:update")]
    UpdateColumn,
    #[serde(rename = "column:delete")]
    DeleteColumn,
    #[serde(rename = "column:move")]
    MoveColumn,
    #[serde(rename = "card:create")]
    CreateCard,
    #[serde(rename = "card:update")]
    UpdateCard,
    #[serde(rename = "card:delete")]
    DeleteCard,
    #[serde(rename = "card:move")]
    MoveCard,
}

impl Operation {
    pub const ALL: [Operation; 13] = [
        Operation::ListBoards,
        Operation::LoadBoard,
        Operation::CreateBoard,
        Operation::UpdateBoard,
        Operation::DeleteBoard,
        Operation::CreateColumn,
        Operation::UpdateColumn,
        Operation::DeleteColumn,
        Operation::MoveColumn,
        Operation::CreateCard,
        Operation::UpdateCard,
        Operation::DeleteCard,
        Operation::MoveCard,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::ListBoards => "board:list",
            Operation::LoadBoard => "board:load",
            Operation::CreateBoard => "board:create",
            Operation::UpdateBoard => "board:update",
            Operation::DeleteBoard => "board:delete",
            Operation::CreateColumn => "column:create",
            Operation::UpdateColumn => "column:update",
            Operation::DeleteColumn => "column:delete",
            Operation::MoveColumn => "column:move",
            Operation::CreateCard => "card:create",
            Operation::UpdateCard => "card:update",
            Operation::DeleteCard => "card:delete",
            Operation::MoveCard => "card:move",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("Rate limit exceeded for {operation}, retry after {}s", .retry_after.as_secs().max(1))]
    RateLimited {
        operation: Operation,
        retry_after: Duration,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Persistence failed: {0}")]
    Failed(String),
}

impl GatewayError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, GatewayError::RateLimited { .. })
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            GatewayError::RateLimited { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Columns a new board gets when created with defaults, in order.
pub const DEFAULT_COLUMNS: [&str; 4] = ["To Do", "In Progress", "Review", "Done"];

/// Storage behind the engine.
///
/// `move_card` and `move_column` must be atomic: one transaction that
/// renumbers every affected sibling in the source and target containers.
/// Any call may fail with [`GatewayError::RateLimited`] before touching
/// stored state.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    async fn list_boards(&self, owner: &str) -> GatewayResult<Vec<Board>>;

    /// A board with its columns and cards, both ordered by position.
    async fn load_board(&self, board_id: BoardId) -> GatewayResult<BoardSnapshot>;

    async fn create_board(&self, fields: &NewBoard) -> GatewayResult<Board>;

    async fn update_board(&self, board_id: BoardId, patch: &BoardPatch) -> GatewayResult<Board>;

    async fn delete_board(&self, board_id: BoardId) -> GatewayResult<()>;

    /// Appends the column after the board's existing columns.
    async fn create_column(&self, board_id: BoardId, fields: &NewColumn) -> GatewayResult<Column>;

    async fn update_column(&self, column_id: ColumnId, patch: &ColumnPatch) -> GatewayResult<Column>;

    async fn delete_column(&self, column_id: ColumnId) -> GatewayResult<()>;

    async fn move_column(&self, column_id: ColumnId, position: usize) -> GatewayResult<()>;

    /// Appends the card to the end of the column.
    async fn create_card(&self, column_id: ColumnId, fields: &NewCard) -> GatewayResult<Card>;

    async fn update_card(&self, card_id: CardId, patch: &CardPatch) -> GatewayResult<Card>;

    async fn delete_card(&self, card_id: CardId) -> GatewayResult<()>;

    async fn move_card(
        &self,
        card_id: CardId,
        column_id: ColumnId,
        position: usize,
    ) -> GatewayResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_names_round_trip_through_serde() {
        for op in Operation::ALL {
            let json = serde_json::to_string(&op).unwrap();
            assert_eq!(json, format!("\"{}\"", op.as_str()));
        }
    }

    #[test]
    fn test_rate_limited_carries_retry_after() {
        let err = GatewayError::RateLimited {
            operation: Operation::MoveCard,
            retry_after: Duration::from_secs(12),
        };
        assert!(err.is_rate_limited());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(12)));
        assert_eq!(err.to_string(), "Rate limit exceeded for card:move, retry after 12s");

        let failed = GatewayError::Failed("network".to_string());
        assert!(!failed.is_rate_limited());
        assert_eq!(failed.retry_after(), None);
    }
}
