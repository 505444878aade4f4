/// One board's columns and cards, as seen by the UI.
///
/// Every mutation follows the same path: validate, dispatch a pending
/// action (visible in the next `columns()` call), await the gateway, then
/// commit the confirmed result. When the gateway call fails the engine
/// reloads the board once, drops the pending action and returns the error.
/// The failed call is never retried.
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;

use crate::config::EngineConfig;
use crate::drag::{DragController, DragId, DropOutcome, MoveRequest};
use crate::filter::filter_by_priority;
use crate::gateway::{GatewayResult, PersistenceGateway};
use crate::identity::{temp_card_id, temp_column_id};
use crate::optimistic::{
    Action, BoardAction, BoardsReducer, ColumnsReducer, OptimisticStore, Ticket,
};
use crate::sequencer::{MoveSequencer, Sequenced};
use crate::types::{
    Board, BoardId, BoardPatch, Card, CardId, CardPatch, Column, ColumnId, ColumnPatch, NewCard,
    NewColumn, Priority,
};
use crate::validate;

use super::{ensure_saved, EngineError, EngineResult};

struct BoardState {
    /// Single-element list so board edits share the optimistic machinery.
    board: OptimisticStore<BoardsReducer>,
    /// Board as last returned by the gateway.
    loaded: Board,
    columns: OptimisticStore<ColumnsReducer>,
    drag: DragController,
}

/// A pending entry in one of the two stores.
#[derive(Debug, Clone, Copy)]
enum Pending {
    Columns(Ticket),
    Board(Ticket),
}

pub struct BoardEngine {
    board_id: BoardId,
    gateway: Arc<dyn PersistenceGateway>,
    config: EngineConfig,
    state: Mutex<BoardState>,
    moves: MoveSequencer<DragId>,
}

impl std::fmt::Debug for BoardEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoardEngine")
            .field("board_id", &self.board_id)
            .field("pending", &self.pending_len())
            .finish_non_exhaustive()
    }
}

impl BoardEngine {
    /// Load `board_id` through the gateway.
    pub async fn load(
        board_id: BoardId,
        gateway: Arc<dyn PersistenceGateway>,
        config: EngineConfig,
    ) -> EngineResult<Self> {
        let snapshot = gateway.load_board(board_id).await?;
        log::info!(
            "[cardflow.engine.board] loaded board {} ({} columns, {} cards)",
            board_id,
            snapshot.columns.len(),
            snapshot.card_count()
        );
        Ok(Self {
            board_id,
            gateway,
            config,
            state: Mutex::new(BoardState {
                board: OptimisticStore::new(vec![snapshot.board.clone()]),
                loaded: snapshot.board,
                columns: OptimisticStore::new(snapshot.columns),
                drag: DragController::new(),
            }),
            moves: MoveSequencer::new(),
        })
    }

    pub fn board_id(&self) -> BoardId {
        self.board_id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The board with pending edits applied.
    pub fn board(&self) -> Board {
        let state = self.lock();
        state
            .board
            .provisional()
            .into_iter()
            .find(|b| b.id == self.board_id)
            .unwrap_or_else(|| state.loaded.clone())
    }

    /// The provisional column list, or the drag working list while a drag
    /// session is active.
    pub fn columns(&self) -> Vec<Column> {
        let state = self.lock();
        match state.drag.working() {
            Some(working) => working.to_vec(),
            None => state.columns.provisional(),
        }
    }

    /// `columns()` narrowed to the given priorities for display.
    pub fn filtered_columns(&self, priorities: &[Priority]) -> Vec<Column> {
        filter_by_priority(&self.columns(), priorities)
    }

    /// Confirmed state only, without pending actions.
    pub fn confirmed_columns(&self) -> Vec<Column> {
        self.lock().columns.confirmed().clone()
    }

    pub fn pending_len(&self) -> usize {
        let state = self.lock();
        state.columns.pending_len() + state.board.pending_len()
    }

    pub fn is_dragging(&self) -> bool {
        self.lock().drag.is_dragging()
    }

    // ── Raw optimistic primitives ────────────────────────────────────────

    /// Record a pending action for a caller that persists on its own.
    pub fn dispatch(&self, action: Action) -> Ticket {
        log::debug!("[cardflow.engine.board] dispatch {}", action.kind());
        self.lock().columns.dispatch(action)
    }

    /// Retire `ticket` and apply the server-confirmed `action`.
    pub fn confirm(&self, ticket: Ticket, action: &Action) -> bool {
        self.lock().columns.commit(ticket, action)
    }

    pub fn discard(&self, ticket: Ticket) -> bool {
        self.lock().columns.discard(ticket)
    }

    /// Refetch confirmed state. Pending actions stay in place.
    pub async fn reload(&self) -> EngineResult<()> {
        let snapshot = self.gateway.load_board(self.board_id).await?;
        let mut state = self.lock();
        log::info!(
            "[cardflow.engine.reload] board {} reloaded, {} pending",
            self.board_id,
            state.columns.pending_len() + state.board.pending_len()
        );
        state.board.replace(vec![snapshot.board.clone()]);
        state.loaded = snapshot.board;
        state.columns.replace(snapshot.columns);
        Ok(())
    }

    // ── Cards ────────────────────────────────────────────────────────────

    pub async fn create_card(&self, column_id: ColumnId, fields: NewCard) -> EngineResult<Card> {
        let fields = NewCard {
            title: validate::title(&fields.title, &self.config.validation)?,
            description: validate::description(
                fields.description.as_deref(),
                &self.config.validation,
            )?,
            priority: fields.priority,
        };

        let position = self.find_column(column_id)?.cards.len();
        let now = Utc::now();
        let placeholder = Card {
            id: temp_card_id(),
            title: fields.title.clone(),
            description: fields.description.clone(),
            priority: fields.priority,
            position,
            column_id,
            created_at: now,
            updated_at: now,
            is_optimistic: true,
        };

        self.persist(
            Action::CreateCard { card: placeholder },
            self.gateway.create_card(column_id, &fields),
            |card: &Card| Action::CreateCard { card: card.clone() },
        )
        .await
    }

    /// Returns the current card unchanged, without any gateway call, when
    /// the normalized patch would not change it.
    pub async fn update_card(&self, card_id: CardId, patch: CardPatch) -> EngineResult<Card> {
        let current = self.find_card(card_id)?;
        ensure_saved(DragId::Card(card_id))?;

        let patch = CardPatch {
            title: patch
                .title
                .map(|t| validate::title(&t, &self.config.validation))
                .transpose()?,
            description: patch
                .description
                .map(|d| validate::description(d.as_deref(), &self.config.validation))
                .transpose()?,
            priority: patch.priority,
            column_id: patch.column_id,
        };
        if let Some(target) = patch.column_id {
            self.find_column(target)?;
        }
        if patch.is_empty() || patch.is_noop_for(&current) {
            log::debug!("[cardflow.engine.board] update of card {} changes nothing", card_id);
            return Ok(current);
        }

        let mut next = patch.apply_to(&current);
        next.updated_at = Utc::now();

        self.persist(
            Action::UpdateCard { card: next },
            self.gateway.update_card(card_id, &patch),
            |card: &Card| Action::UpdateCard { card: card.clone() },
        )
        .await
    }

    pub async fn delete_card(&self, card_id: CardId) -> EngineResult<()> {
        self.find_card(card_id)?;
        ensure_saved(DragId::Card(card_id))?;
        self.persist(
            Action::DeleteCard { card_id },
            self.gateway.delete_card(card_id),
            |_: &()| Action::DeleteCard { card_id },
        )
        .await
    }

    /// Move a card to `position` in `column_id`. Moves of the same card are
    /// serialized; a queued move overtaken by a newer one is never sent.
    pub async fn move_card(
        &self,
        card_id: CardId,
        column_id: ColumnId,
        position: usize,
    ) -> EngineResult<()> {
        self.find_card(card_id)?;
        self.find_column(column_id)?;
        self.persist_move(MoveRequest::MoveCard {
            card_id,
            column_id,
            position,
        })
        .await
    }

    // ── Columns ──────────────────────────────────────────────────────────

    pub async fn create_column(&self, title: &str) -> EngineResult<Column> {
        let title = validate::title(title, &self.config.validation)?;
        let position = self.lock().columns.provisional().len();
        let placeholder = Column {
            id: temp_column_id(),
            title: title.clone(),
            position,
            board_id: self.board_id,
            created_at: Utc::now(),
            cards: Vec::new(),
            is_optimistic: true,
        };
        let fields = NewColumn { title };

        self.persist(
            Action::CreateColumn { column: placeholder },
            self.gateway.create_column(self.board_id, &fields),
            |column: &Column| Action::CreateColumn {
                column: column.clone(),
            },
        )
        .await
    }

    pub async fn update_column(&self, column_id: ColumnId, patch: ColumnPatch) -> EngineResult<Column> {
        let current = self.find_column(column_id)?;
        ensure_saved(DragId::Column(column_id))?;
        let title = patch
            .title
            .map(|t| validate::title(&t, &self.config.validation))
            .transpose()?;
        let Some(title) = title.filter(|t| *t != current.title) else {
            log::debug!("[cardflow.engine.board] update of column {} changes nothing", column_id);
            return Ok(current);
        };

        let next = Column {
            title: title.clone(),
            ..current
        };
        let patch = ColumnPatch { title: Some(title) };
        self.persist(
            Action::UpdateColumn { column: next },
            self.gateway.update_column(column_id, &patch),
            |column: &Column| Action::UpdateColumn {
                column: column.clone(),
            },
        )
        .await
    }

    /// Deletes the column together with its cards.
    pub async fn delete_column(&self, column_id: ColumnId) -> EngineResult<()> {
        self.find_column(column_id)?;
        ensure_saved(DragId::Column(column_id))?;
        self.persist(
            Action::DeleteColumn { column_id },
            self.gateway.delete_column(column_id),
            |_: &()| Action::DeleteColumn { column_id },
        )
        .await
    }

    pub async fn move_column(&self, column_id: ColumnId, position: usize) -> EngineResult<()> {
        self.find_column(column_id)?;
        self.persist_move(MoveRequest::MoveColumn {
            column_id,
            position,
        })
        .await
    }

    // ── Board ────────────────────────────────────────────────────────────

    pub async fn update_board(&self, patch: BoardPatch) -> EngineResult<Board> {
        let current = self.board();
        let patch = BoardPatch {
            title: patch
                .title
                .map(|t| validate::title(&t, &self.config.validation))
                .transpose()?,
            color: patch.color.map(|c| validate::color(&c)).transpose()?,
            is_favorite: patch.is_favorite,
            is_archived: patch.is_archived,
        };
        if patch.is_empty() || patch.is_noop_for(&current) {
            log::debug!("[cardflow.engine.board] update of board {} changes nothing", self.board_id);
            return Ok(current);
        }

        let mut next = patch.apply_to(&current);
        next.updated_at = Utc::now();
        let ticket = self.lock().board.dispatch(BoardAction::UpdateBoard { board: next });

        match self.gateway.update_board(self.board_id, &patch).await {
            Ok(board) => {
                let mut state = self.lock();
                state.board.commit(
                    ticket,
                    &BoardAction::UpdateBoard {
                        board: board.clone(),
                    },
                );
                state.loaded = board.clone();
                Ok(board)
            }
            Err(err) => Err(self.recover("updateBoard", Pending::Board(ticket), err.into()).await),
        }
    }

    pub async fn toggle_favorite(&self) -> EngineResult<Board> {
        let is_favorite = self.board().is_favorite;
        self.update_board(BoardPatch {
            is_favorite: Some(!is_favorite),
            ..Default::default()
        })
        .await
    }

    // ── Drag and drop ────────────────────────────────────────────────────

    /// Start dragging `id` over the current provisional list.
    pub fn on_drag_start(&self, id: DragId) -> bool {
        let mut state = self.lock();
        let view = state.columns.provisional();
        state.drag.on_drag_start(id, view)
    }

    pub fn on_drag_over(&self, active: DragId, over: DragId) -> bool {
        self.lock().drag.on_drag_over(active, over)
    }

    /// Settle the gesture. A resolved move is persisted before returning;
    /// on failure the board is reloaded once and the error returned.
    pub async fn on_drag_end(&self, active: DragId, over: Option<DragId>) -> EngineResult<DropOutcome> {
        let outcome = self.lock().drag.on_drag_end(active, over);
        let DropOutcome::Persist(request) = outcome else {
            return Ok(outcome);
        };

        let result = self.persist_move(request).await;
        self.lock().drag.settle(&request);
        result.map(|()| outcome)
    }

    // ── Internals ────────────────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn find_column(&self, column_id: ColumnId) -> EngineResult<Column> {
        self.lock()
            .columns
            .provisional()
            .into_iter()
            .find(|c| c.id == column_id)
            .ok_or_else(|| EngineError::UnknownEntity(format!("column {}", column_id)))
    }

    fn find_card(&self, card_id: CardId) -> EngineResult<Card> {
        self.lock()
            .columns
            .provisional()
            .into_iter()
            .find_map(|c| c.card(card_id).cloned())
            .ok_or_else(|| EngineError::UnknownEntity(format!("card {}", card_id)))
    }

    /// Dispatch `optimistic`, await `call`, then commit what the gateway
    /// confirmed.
    async fn persist<T, F>(
        &self,
        optimistic: Action,
        call: F,
        confirmed: impl FnOnce(&T) -> Action,
    ) -> EngineResult<T>
    where
        F: std::future::Future<Output = GatewayResult<T>>,
    {
        let kind = optimistic.kind();
        let ticket = self.lock().columns.dispatch(optimistic);

        match call.await {
            Ok(value) => {
                self.lock().columns.commit(ticket, &confirmed(&value));
                log::debug!("[cardflow.engine.board] {} confirmed", kind);
                Ok(value)
            }
            Err(err) => Err(self.recover(kind, Pending::Columns(ticket), err.into()).await),
        }
    }

    async fn persist_move(&self, request: MoveRequest) -> EngineResult<()> {
        ensure_saved(request.subject())?;
        let action = Action::from(request);
        let gateway = &self.gateway;
        let call = async {
            let sent = self
                .moves
                .run(request.subject(), move || async move {
                    match request {
                        MoveRequest::MoveCard {
                            card_id,
                            column_id,
                            position,
                        } => gateway.move_card(card_id, column_id, position).await,
                        MoveRequest::MoveColumn {
                            column_id,
                            position,
                        } => gateway.move_column(column_id, position).await,
                    }
                })
                .await;
            match sent {
                Sequenced::Ran(result) => result,
                // A newer move of the same entity carries the final position.
                Sequenced::Superseded => Ok(()),
            }
        };

        log::info!("[cardflow.engine.board] persisting {:?}", request);
        self.persist(action.clone(), call, move |_: &()| action).await
    }

    /// Reload once, then drop the failed pending action. Returns the
    /// original error for the caller.
    async fn recover(&self, kind: &str, pending: Pending, err: EngineError) -> EngineError {
        if err.is_rate_limited() {
            log::warn!("[cardflow.engine.board] {} rate limited: {}", kind, err);
        } else {
            log::warn!("[cardflow.engine.board] {} failed: {}", kind, err);
        }

        if let Err(reload_err) = self.reload().await {
            log::warn!(
                "[cardflow.engine.reload] reload after failed {} also failed: {}",
                kind,
                reload_err
            );
        }

        let mut state = self.lock();
        match pending {
            Pending::Columns(ticket) => state.columns.discard(ticket),
            Pending::Board(ticket) => state.board.discard(ticket),
        };
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{GatewayError, InMemoryGateway, Operation, RateLimiter};
    use crate::config::{RateLimit, RateLimitTable};
    use crate::position::is_dense;
    use crate::types::BoardSnapshot;
    use crate::validate::ValidationError;
    use std::time::Duration;

    async fn setup_with(gw: InMemoryGateway) -> (Arc<InMemoryGateway>, BoardEngine, BoardSnapshot) {
        let gw = Arc::new(gw);
        let snap = gw.seed("user_1", "Work", &[("To Do", &["A", "B", "C"]), ("Done", &["D"])]);
        let engine = BoardEngine::load(snap.board.id, gw.clone(), EngineConfig::default())
            .await
            .unwrap();
        (gw, engine, snap)
    }

    async fn setup() -> (Arc<InMemoryGateway>, BoardEngine, BoardSnapshot) {
        setup_with(InMemoryGateway::new()).await
    }

    fn titles(columns: &[Column], idx: usize) -> Vec<String> {
        columns[idx].cards.iter().map(|c| c.title.clone()).collect()
    }

    fn new_card(title: &str) -> NewCard {
        NewCard {
            title: title.to_string(),
            description: None,
            priority: Priority::Default,
        }
    }

    #[tokio::test]
    async fn test_load_exposes_confirmed_columns() {
        let (gw, engine, snap) = setup().await;
        assert_eq!(engine.columns(), snap.columns);
        assert_eq!(engine.board().title, "Work");
        assert_eq!(gw.calls(Operation::LoadBoard), 1);
    }

    #[tokio::test]
    async fn test_create_card_shows_placeholder_then_confirmed_card() {
        let (_, engine, snap) = setup_with(InMemoryGateway::new().with_latency(Duration::from_millis(20))).await;
        let todo = snap.columns[0].id;

        let (created, during) = tokio::join!(engine.create_card(todo, new_card("  Fix bug ")), async {
            tokio::task::yield_now().await;
            engine.columns()
        });

        let placeholder = &during[0].cards[3];
        assert_eq!(placeholder.title, "Fix bug");
        assert!(placeholder.id.is_temporary());
        assert!(placeholder.is_optimistic);

        let created = created.unwrap();
        assert!(!created.id.is_temporary());
        let after = engine.columns();
        let matching: Vec<&Card> = after[0].cards.iter().filter(|c| c.title == "Fix bug").collect();
        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0].id, created.id);
        assert!(!matching[0].is_optimistic);
        assert_eq!(engine.pending_len(), 0);
    }

    #[tokio::test]
    async fn test_reload_during_pending_create_shows_one_card() {
        let (gw, engine, snap) = setup().await;
        let todo = snap.columns[0].id;

        let mut placeholder = snap.columns[0].cards[0].clone();
        placeholder.id = CardId(-123);
        placeholder.title = "Fix bug".to_string();
        placeholder.is_optimistic = true;
        let ticket = engine.dispatch(Action::CreateCard { card: placeholder });

        // The server saved it and a reload lands before the create returns
        let saved = gw.create_card(todo, &new_card("Fix bug")).await.unwrap();
        engine.reload().await.unwrap();

        let view = engine.columns();
        let fix: Vec<&Card> = view[0].cards.iter().filter(|c| c.title == "Fix bug").collect();
        assert_eq!(fix.len(), 1);
        assert_eq!(fix[0].id, saved.id);
        assert!(is_dense(&view[0].cards));

        assert!(engine.confirm(ticket, &Action::CreateCard { card: saved.clone() }));
        let view = engine.columns();
        assert_eq!(view[0].cards.iter().filter(|c| c.title == "Fix bug").count(), 1);
    }

    #[tokio::test]
    async fn test_validation_failure_touches_nothing() {
        let (gw, engine, snap) = setup().await;
        let err = engine
            .create_card(snap.columns[0].id, new_card("   "))
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::Validation(ValidationError::EmptyTitle));
        assert_eq!(gw.calls(Operation::CreateCard), 0);
        assert_eq!(engine.pending_len(), 0);
        assert_eq!(engine.columns(), snap.columns);
    }

    #[tokio::test]
    async fn test_unknown_column_is_rejected_before_dispatch() {
        let (gw, engine, _) = setup().await;
        let err = engine.create_card(ColumnId(9_999), new_card("X")).await.unwrap_err();
        assert!(matches!(err, EngineError::UnknownEntity(_)));
        assert_eq!(gw.calls(Operation::CreateCard), 0);
    }

    #[tokio::test]
    async fn test_failed_move_reloads_once_and_never_retries() {
        let (gw, engine, snap) = setup().await;
        let a = snap.columns[0].cards[0].id;
        gw.fail_next(Operation::MoveCard, GatewayError::Failed("network".to_string()));

        let err = engine.move_card(a, snap.columns[0].id, 2).await.unwrap_err();
        assert_eq!(err, EngineError::Gateway(GatewayError::Failed("network".to_string())));

        assert_eq!(gw.calls(Operation::MoveCard), 1);
        // initial load + exactly one reload
        assert_eq!(gw.calls(Operation::LoadBoard), 2);
        assert_eq!(engine.pending_len(), 0);
        assert_eq!(titles(&engine.columns(), 0), vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_failed_move_stays_visible_until_reload_completes() {
        let (gw, engine, snap) = setup_with(InMemoryGateway::new().with_latency(Duration::from_millis(20))).await;
        let a = snap.columns[0].cards[0].id;
        gw.fail_next(Operation::MoveCard, GatewayError::Failed("network".to_string()));

        let (result, during) = tokio::join!(engine.move_card(a, snap.columns[0].id, 2), async {
            tokio::task::yield_now().await;
            engine.columns()
        });
        assert!(result.is_err());
        assert_eq!(titles(&during, 0), vec!["B", "C", "A"]);
        assert_eq!(titles(&engine.columns(), 0), vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_rate_limited_move_recovers_like_any_failure() {
        let mut table = RateLimitTable::default();
        table.set(Operation::MoveCard, RateLimit { max_requests: 0, window_ms: 30_000 });
        let (gw, engine, snap) =
            setup_with(InMemoryGateway::new().with_rate_limiter(RateLimiter::new(table))).await;

        let a = snap.columns[0].cards[0].id;
        let err = engine.move_card(a, snap.columns[1].id, 0).await.unwrap_err();
        assert!(err.is_rate_limited());
        assert_eq!(gw.calls(Operation::LoadBoard), 2);
        assert_eq!(engine.columns(), snap.columns);
    }

    #[tokio::test]
    async fn test_drag_reorder_persists_recorded_target_once() {
        let (gw, engine, snap) = setup().await;
        let (a, c) = (snap.columns[0].cards[0].id, snap.columns[0].cards[2].id);

        assert!(engine.on_drag_start(DragId::Card(a)));
        assert!(engine.on_drag_over(DragId::Card(a), DragId::Card(c)));
        assert!(!engine.on_drag_over(DragId::Card(a), DragId::Card(c)));
        assert_eq!(titles(&engine.columns(), 0), vec!["B", "C", "A"]);

        let outcome = engine
            .on_drag_end(DragId::Card(a), Some(DragId::Card(c)))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            DropOutcome::Persist(MoveRequest::MoveCard {
                card_id: a,
                column_id: snap.columns[0].id,
                position: 2
            })
        );
        assert_eq!(gw.calls(Operation::MoveCard), 1);
        assert!(!engine.is_dragging());
        assert_eq!(engine.pending_len(), 0);

        let view = engine.columns();
        assert_eq!(titles(&view, 0), vec!["B", "C", "A"]);
        assert!(is_dense(&view[0].cards));
        let stored = gw.stored(snap.board.id).unwrap();
        assert_eq!(titles(&stored.columns, 0), vec!["B", "C", "A"]);
    }

    #[tokio::test]
    async fn test_failed_drop_reloads_and_returns_to_idle() {
        let (gw, engine, snap) = setup().await;
        let (a, c) = (
            DragId::Card(snap.columns[0].cards[0].id),
            DragId::Card(snap.columns[0].cards[2].id),
        );
        gw.fail_next(Operation::MoveCard, GatewayError::Failed("network".to_string()));

        assert!(engine.on_drag_start(a));
        assert!(engine.on_drag_over(a, c));
        let err = engine.on_drag_end(a, Some(c)).await.unwrap_err();

        assert_eq!(err, EngineError::Gateway(GatewayError::Failed("network".to_string())));
        assert_eq!(gw.calls(Operation::LoadBoard), 2);
        assert_eq!(gw.calls(Operation::MoveCard), 1);
        assert!(!engine.is_dragging());
        assert_eq!(engine.pending_len(), 0);
        assert_eq!(engine.columns(), snap.columns);
    }

    #[tokio::test]
    async fn test_drag_onto_other_column_appends() {
        let (gw, engine, snap) = setup().await;
        let a = DragId::Card(snap.columns[0].cards[0].id);
        let done = DragId::Column(snap.columns[1].id);

        engine.on_drag_start(a);
        engine.on_drag_over(a, done);
        engine.on_drag_end(a, Some(done)).await.unwrap();

        let stored = gw.stored(snap.board.id).unwrap();
        assert_eq!(titles(&stored.columns, 0), vec!["B", "C"]);
        assert_eq!(titles(&stored.columns, 1), vec!["D", "A"]);
        assert_eq!(engine.columns(), stored.columns);
    }

    #[tokio::test]
    async fn test_same_slot_drop_issues_no_call() {
        let (gw, engine, snap) = setup().await;
        let b = DragId::Card(snap.columns[0].cards[1].id);
        engine.on_drag_start(b);
        let outcome = engine.on_drag_end(b, Some(b)).await.unwrap();
        assert_eq!(outcome, DropOutcome::Unchanged);
        assert_eq!(gw.calls(Operation::MoveCard), 0);
    }

    #[tokio::test]
    async fn test_cancelled_drag_restores_view() {
        let (gw, engine, snap) = setup().await;
        let a = DragId::Card(snap.columns[0].cards[0].id);
        engine.on_drag_start(a);
        engine.on_drag_over(a, DragId::Column(snap.columns[1].id));
        assert_ne!(engine.columns(), snap.columns);

        assert_eq!(engine.on_drag_end(a, None).await.unwrap(), DropOutcome::Cancelled);
        assert_eq!(engine.columns(), snap.columns);
        assert_eq!(gw.calls(Operation::MoveCard), 0);
    }

    #[tokio::test]
    async fn test_column_drag_persists_move_column() {
        let (gw, engine, snap) = setup().await;
        let first = DragId::Column(snap.columns[0].id);
        let second = DragId::Column(snap.columns[1].id);
        engine.on_drag_start(first);
        engine.on_drag_over(first, second);
        engine.on_drag_end(first, Some(second)).await.unwrap();

        assert_eq!(gw.calls(Operation::MoveColumn), 1);
        let stored = gw.stored(snap.board.id).unwrap();
        assert_eq!(stored.columns[0].id, snap.columns[1].id);
        assert_eq!(engine.columns(), stored.columns);
    }

    #[tokio::test]
    async fn test_update_card_noop_short_circuits() {
        let (gw, engine, snap) = setup().await;
        let a = &snap.columns[0].cards[0];
        let unchanged = engine
            .update_card(
                a.id,
                CardPatch {
                    title: Some(" A ".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(&unchanged, a);
        assert_eq!(gw.calls(Operation::UpdateCard), 0);
    }

    #[tokio::test]
    async fn test_update_card_to_other_column_appends() {
        let (gw, engine, snap) = setup().await;
        let a = snap.columns[0].cards[0].id;
        let updated = engine
            .update_card(
                a,
                CardPatch {
                    column_id: Some(snap.columns[1].id),
                    priority: Some(Priority::High),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.position, 1);

        let view = engine.columns();
        assert_eq!(titles(&view, 0), vec!["B", "C"]);
        assert_eq!(titles(&view, 1), vec!["D", "A"]);
        assert_eq!(view[1].cards[1].priority, Priority::High);
        assert_eq!(view, gw.stored(snap.board.id).unwrap().columns);
    }

    #[tokio::test]
    async fn test_delete_card() {
        let (_, engine, snap) = setup().await;
        engine.delete_card(snap.columns[0].cards[1].id).await.unwrap();
        let view = engine.columns();
        assert_eq!(titles(&view, 0), vec!["A", "C"]);
        assert!(is_dense(&view[0].cards));
    }

    #[tokio::test]
    async fn test_column_lifecycle() {
        let (gw, engine, snap) = setup().await;
        let review = engine.create_column("Review").await.unwrap();
        assert_eq!(review.position, 2);
        assert_eq!(engine.columns().len(), 3);

        let renamed = engine
            .update_column(
                review.id,
                ColumnPatch {
                    title: Some("QA".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.title, "QA");
        assert_eq!(engine.columns()[2].title, "QA");

        engine.move_column(review.id, 0).await.unwrap();
        assert_eq!(engine.columns()[0].id, review.id);

        engine.delete_column(snap.columns[0].id).await.unwrap();
        let view = engine.columns();
        assert_eq!(view.len(), 2);
        assert!(is_dense(&view));
        assert_eq!(view, gw.stored(snap.board.id).unwrap().columns);
    }

    #[tokio::test]
    async fn test_board_update_and_favorite() {
        let (gw, engine, _) = setup().await;
        let board = engine
            .update_board(BoardPatch {
                title: Some("Office".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(board.title, "Office");
        assert!(engine.toggle_favorite().await.unwrap().is_favorite);
        assert!(engine.board().is_favorite);

        let err = engine
            .update_board(BoardPatch {
                color: Some("purple".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(ValidationError::InvalidColor(_))));
        assert_eq!(gw.calls(Operation::UpdateBoard), 2);
    }

    #[tokio::test]
    async fn test_unsaved_card_cannot_be_moved() {
        let (gw, engine, snap) = setup().await;
        let mut placeholder = snap.columns[0].cards[0].clone();
        placeholder.id = CardId(-7);
        placeholder.title = "Draft".to_string();
        placeholder.is_optimistic = true;
        engine.dispatch(Action::CreateCard { card: placeholder });

        let err = engine
            .move_card(CardId(-7), snap.columns[1].id, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownEntity(_)));
        assert_eq!(gw.calls(Operation::MoveCard), 0);
        assert_eq!(engine.pending_len(), 1);
    }

    #[tokio::test]
    async fn test_filtered_view_leaves_drag_unfiltered() {
        let (_, engine, snap) = setup().await;
        assert!(engine.filtered_columns(&[Priority::High])[0].cards.is_empty());

        let a = DragId::Card(snap.columns[0].cards[0].id);
        engine.on_drag_start(a);
        assert_eq!(engine.columns()[0].cards.len(), 3);
    }
}
