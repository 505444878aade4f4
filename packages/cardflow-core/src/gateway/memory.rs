/// In-memory persistence gateway.
///
/// One mutex guards every table, so each call is a single atomic batch with
/// respect to every other call. Moves and deletes renumber siblings with the
/// same position functions the client uses.
///
/// Tests drive it through failure injection (`fail_next`), per-operation
/// call counters (`calls`) and optional latency.
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::position::{self, insert_at, remove_at, renumber};
use crate::types::{
    Board, BoardId, BoardPatch, BoardSnapshot, Card, CardId, CardPatch, Column, ColumnId,
    ColumnPatch, NewBoard, NewCard, NewColumn,
};

use super::{
    GatewayError, GatewayResult, Operation, PersistenceGateway, RateLimiter, DEFAULT_COLUMNS,
};

#[derive(Debug, Clone)]
struct StoredBoard {
    board: Board,
    /// Ordered and dense, each with its ordered and dense cards.
    columns: Vec<Column>,
}

#[derive(Debug, Default)]
struct Db {
    boards: Vec<StoredBoard>,
    next_id: i64,
}

impl Db {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn board_index(&self, board_id: BoardId) -> GatewayResult<usize> {
        self.boards
            .iter()
            .position(|b| b.board.id == board_id)
            .ok_or_else(|| GatewayError::NotFound(format!("board {}", board_id)))
    }

    fn board_of_column(&self, column_id: ColumnId) -> GatewayResult<usize> {
        self.boards
            .iter()
            .position(|b| b.columns.iter().any(|c| c.id == column_id))
            .ok_or_else(|| GatewayError::NotFound(format!("column {}", column_id)))
    }

    fn board_of_card(&self, card_id: CardId) -> GatewayResult<usize> {
        self.boards
            .iter()
            .position(|b| b.columns.iter().any(|c| c.contains_card(card_id)))
            .ok_or_else(|| GatewayError::NotFound(format!("card {}", card_id)))
    }

    fn touch(&mut self, board_idx: usize) {
        self.boards[board_idx].board.updated_at = Utc::now();
    }

    fn new_column(&mut self, board_id: BoardId, title: &str, position: usize) -> Column {
        Column {
            id: ColumnId(self.allocate_id()),
            title: title.to_string(),
            position,
            board_id,
            created_at: Utc::now(),
            cards: Vec::new(),
            is_optimistic: false,
        }
    }
}

#[derive(Default)]
pub struct InMemoryGateway {
    db: Mutex<Db>,
    limiter: Option<RateLimiter>,
    latency: Option<Duration>,
    failures: Mutex<HashMap<Operation, VecDeque<GatewayError>>>,
    calls: Mutex<HashMap<Operation, usize>>,
}

impl std::fmt::Debug for InMemoryGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryGateway")
            .field("boards", &self.lock_db().boards.len())
            .field("rate_limited", &self.limiter.is_some())
            .finish_non_exhaustive()
    }
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Sleep this long before every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Store a board with the given columns and card titles, bypassing
    /// counters, limits and injected failures.
    pub fn seed(&self, owner: &str, title: &str, columns: &[(&str, &[&str])]) -> BoardSnapshot {
        let mut db = self.lock_db();
        let now = Utc::now();
        let board = Board {
            id: BoardId(db.allocate_id()),
            title: title.to_string(),
            owner: owner.to_string(),
            is_favorite: false,
            is_archived: false,
            color: "bg-blue-500".to_string(),
            created_at: now,
            updated_at: now,
            is_optimistic: false,
        };

        let mut stored = Vec::with_capacity(columns.len());
        for (col_pos, (col_title, cards)) in columns.iter().enumerate() {
            let mut column = db.new_column(board.id, col_title, col_pos);
            for (card_pos, card_title) in cards.iter().enumerate() {
                column.cards.push(Card {
                    id: CardId(db.allocate_id()),
                    title: card_title.to_string(),
                    description: None,
                    priority: Default::default(),
                    position: card_pos,
                    column_id: column.id,
                    created_at: now,
                    updated_at: now,
                    is_optimistic: false,
                });
            }
            stored.push(column);
        }

        let snapshot = BoardSnapshot {
            board: board.clone(),
            columns: stored.clone(),
        };
        db.boards.push(StoredBoard {
            board,
            columns: stored,
        });
        snapshot
    }

    /// Fail the next call of `operation` with `error`. Queued failures are
    /// consumed in order.
    pub fn fail_next(&self, operation: Operation, error: GatewayError) {
        let mut failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        failures.entry(operation).or_default().push_back(error);
    }

    /// How many times `operation` has been called, failed calls included.
    pub fn calls(&self, operation: Operation) -> usize {
        let calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
        calls.get(&operation).copied().unwrap_or(0)
    }

    /// Stored state of a board, without going through the gateway.
    pub fn stored(&self, board_id: BoardId) -> Option<BoardSnapshot> {
        let db = self.lock_db();
        db.boards
            .iter()
            .find(|b| b.board.id == board_id)
            .map(|b| BoardSnapshot {
                board: b.board.clone(),
                columns: b.columns.clone(),
            })
    }

    fn lock_db(&self) -> MutexGuard<'_, Db> {
        self.db.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Count the call, wait out any latency and surface an injected failure.
    async fn begin(&self, operation: Operation) -> GatewayResult<()> {
        {
            let mut calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
            *calls.entry(operation).or_insert(0) += 1;
        }
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let injected = {
            let mut failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
            failures.get_mut(&operation).and_then(VecDeque::pop_front)
        };
        match injected {
            Some(err) => {
                log::warn!("[cardflow.gateway.memory] {} failing with injected error: {}", operation, err);
                Err(err)
            }
            None => Ok(()),
        }
    }

    fn admit(&self, operation: Operation, owner: &str) -> GatewayResult<()> {
        match &self.limiter {
            Some(limiter) => limiter
                .check(operation, owner)
                .map_err(|retry_after| GatewayError::RateLimited {
                    operation,
                    retry_after,
                }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PersistenceGateway for InMemoryGateway {
    async fn list_boards(&self, owner: &str) -> GatewayResult<Vec<Board>> {
        self.begin(Operation::ListBoards).await?;
        self.admit(Operation::ListBoards, owner)?;
        let db = self.lock_db();
        let mut boards: Vec<Board> = db
            .boards
            .iter()
            .filter(|b| b.board.owner == owner)
            .map(|b| b.board.clone())
            .collect();
        boards.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(boards)
    }

    async fn load_board(&self, board_id: BoardId) -> GatewayResult<BoardSnapshot> {
        self.begin(Operation::LoadBoard).await?;
        let db = self.lock_db();
        let idx = db.board_index(board_id)?;
        let stored = &db.boards[idx];
        self.admit(Operation::LoadBoard, &stored.board.owner)?;
        Ok(BoardSnapshot {
            board: stored.board.clone(),
            columns: stored.columns.clone(),
        })
    }

    async fn create_board(&self, fields: &NewBoard) -> GatewayResult<Board> {
        self.begin(Operation::CreateBoard).await?;
        self.admit(Operation::CreateBoard, &fields.owner)?;
        let mut db = self.lock_db();
        let now = Utc::now();
        let board = Board {
            id: BoardId(db.allocate_id()),
            title: fields.title.clone(),
            owner: fields.owner.clone(),
            is_favorite: false,
            is_archived: false,
            color: fields.color.clone(),
            created_at: now,
            updated_at: now,
            is_optimistic: false,
        };
        let columns = if fields.with_default_columns {
            DEFAULT_COLUMNS
                .iter()
                .enumerate()
                .map(|(pos, title)| db.new_column(board.id, title, pos))
                .collect()
        } else {
            Vec::new()
        };
        log::debug!(
            "[cardflow.gateway.memory] created board {} with {} columns",
            board.id,
            columns.len()
        );
        db.boards.push(StoredBoard {
            board: board.clone(),
            columns,
        });
        Ok(board)
    }

    async fn update_board(&self, board_id: BoardId, patch: &BoardPatch) -> GatewayResult<Board> {
        self.begin(Operation::UpdateBoard).await?;
        let mut db = self.lock_db();
        let idx = db.board_index(board_id)?;
        self.admit(Operation::UpdateBoard, &db.boards[idx].board.owner)?;
        let mut next = patch.apply_to(&db.boards[idx].board);
        next.updated_at = Utc::now();
        db.boards[idx].board = next.clone();
        Ok(next)
    }

    async fn delete_board(&self, board_id: BoardId) -> GatewayResult<()> {
        self.begin(Operation::DeleteBoard).await?;
        let mut db = self.lock_db();
        let idx = db.board_index(board_id)?;
        self.admit(Operation::DeleteBoard, &db.boards[idx].board.owner)?;
        db.boards.remove(idx);
        Ok(())
    }

    async fn create_column(&self, board_id: BoardId, fields: &NewColumn) -> GatewayResult<Column> {
        self.begin(Operation::CreateColumn).await?;
        let mut db = self.lock_db();
        let idx = db.board_index(board_id)?;
        self.admit(Operation::CreateColumn, &db.boards[idx].board.owner)?;
        let position = db.boards[idx].columns.len();
        let column = db.new_column(board_id, &fields.title, position);
        db.boards[idx].columns.push(column.clone());
        db.touch(idx);
        Ok(column)
    }

    async fn update_column(&self, column_id: ColumnId, patch: &ColumnPatch) -> GatewayResult<Column> {
        self.begin(Operation::UpdateColumn).await?;
        let mut db = self.lock_db();
        let idx = db.board_of_column(column_id)?;
        self.admit(Operation::UpdateColumn, &db.boards[idx].board.owner)?;
        let column = db.boards[idx]
            .columns
            .iter_mut()
            .find(|c| c.id == column_id)
            .ok_or_else(|| GatewayError::NotFound(format!("column {}", column_id)))?;
        if let Some(title) = &patch.title {
            column.title = title.clone();
        }
        let updated = column.clone();
        db.touch(idx);
        Ok(updated)
    }

    async fn delete_column(&self, column_id: ColumnId) -> GatewayResult<()> {
        self.begin(Operation::DeleteColumn).await?;
        let mut db = self.lock_db();
        let idx = db.board_of_column(column_id)?;
        self.admit(Operation::DeleteColumn, &db.boards[idx].board.owner)?;
        let columns = &mut db.boards[idx].columns;
        columns.retain(|c| c.id != column_id);
        renumber(columns);
        db.touch(idx);
        Ok(())
    }

    async fn move_column(&self, column_id: ColumnId, position: usize) -> GatewayResult<()> {
        self.begin(Operation::MoveColumn).await?;
        let mut db = self.lock_db();
        let idx = db.board_of_column(column_id)?;
        self.admit(Operation::MoveColumn, &db.boards[idx].board.owner)?;
        position::move_column(&mut db.boards[idx].columns, column_id, position);
        db.touch(idx);
        Ok(())
    }

    async fn create_card(&self, column_id: ColumnId, fields: &NewCard) -> GatewayResult<Card> {
        self.begin(Operation::CreateCard).await?;
        let mut db = self.lock_db();
        let idx = db.board_of_column(column_id)?;
        self.admit(Operation::CreateCard, &db.boards[idx].board.owner)?;
        let now = Utc::now();
        let id = CardId(db.allocate_id());
        let column = db.boards[idx]
            .columns
            .iter_mut()
            .find(|c| c.id == column_id)
            .ok_or_else(|| GatewayError::NotFound(format!("column {}", column_id)))?;
        let card = Card {
            id,
            title: fields.title.clone(),
            description: fields.description.clone(),
            priority: fields.priority,
            position: column.cards.len(),
            column_id,
            created_at: now,
            updated_at: now,
            is_optimistic: false,
        };
        column.cards.push(card.clone());
        db.touch(idx);
        Ok(card)
    }

    async fn update_card(&self, card_id: CardId, patch: &CardPatch) -> GatewayResult<Card> {
        self.begin(Operation::UpdateCard).await?;
        let mut db = self.lock_db();
        let idx = db.board_of_card(card_id)?;
        self.admit(Operation::UpdateCard, &db.boards[idx].board.owner)?;

        let columns = &mut db.boards[idx].columns;
        let (col_idx, card_idx) = locate(columns, card_id)
            .ok_or_else(|| GatewayError::NotFound(format!("card {}", card_id)))?;
        let mut next = patch.apply_to(&columns[col_idx].cards[card_idx]);
        next.updated_at = Utc::now();

        if next.column_id == columns[col_idx].id {
            next.position = card_idx;
            columns[col_idx].cards[card_idx] = next.clone();
        } else {
            // A column change appends to the end of the new column.
            let target = columns
                .iter()
                .position(|c| c.id == next.column_id)
                .ok_or_else(|| GatewayError::NotFound(format!("column {}", next.column_id)))?;
            remove_at(&mut columns[col_idx].cards, card_idx);
            let end = columns[target].cards.len();
            next.position = insert_at(&mut columns[target].cards, next.clone(), end);
        }
        db.touch(idx);
        Ok(next)
    }

    async fn delete_card(&self, card_id: CardId) -> GatewayResult<()> {
        self.begin(Operation::DeleteCard).await?;
        let mut db = self.lock_db();
        let idx = db.board_of_card(card_id)?;
        self.admit(Operation::DeleteCard, &db.boards[idx].board.owner)?;
        for column in db.boards[idx].columns.iter_mut() {
            let before = column.cards.len();
            column.cards.retain(|c| c.id != card_id);
            if column.cards.len() != before {
                renumber(&mut column.cards);
            }
        }
        db.touch(idx);
        Ok(())
    }

    async fn move_card(
        &self,
        card_id: CardId,
        column_id: ColumnId,
        position: usize,
    ) -> GatewayResult<()> {
        self.begin(Operation::MoveCard).await?;
        let mut db = self.lock_db();
        let idx = db.board_of_card(card_id)?;
        self.admit(Operation::MoveCard, &db.boards[idx].board.owner)?;
        if !position::move_card(&mut db.boards[idx].columns, card_id, column_id, position) {
            return Err(GatewayError::NotFound(format!("column {}", column_id)));
        }
        log::debug!(
            "[cardflow.gateway.memory] moved card {} to column {} position {}",
            card_id,
            column_id,
            position
        );
        db.touch(idx);
        Ok(())
    }
}

fn locate(columns: &[Column], card_id: CardId) -> Option<(usize, usize)> {
    columns.iter().enumerate().find_map(|(ci, col)| {
        col.cards
            .iter()
            .position(|c| c.id == card_id)
            .map(|idx| (ci, idx))
    })
}
