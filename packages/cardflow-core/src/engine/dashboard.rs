/// A user's board list: create, edit, archive and favorite boards with the
/// same optimistic flow as `BoardEngine`.
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;

use crate::config::EngineConfig;
use crate::filter;
use crate::gateway::{GatewayResult, PersistenceGateway};
use crate::identity::temp_board_id;
use crate::optimistic::{BoardAction, BoardsReducer, OptimisticStore};
use crate::types::{Board, BoardId, BoardPatch, NewBoard};
use crate::validate;

use super::{ensure_saved, EngineError, EngineResult, EntityRef};

pub struct DashboardEngine {
    owner: String,
    gateway: Arc<dyn PersistenceGateway>,
    config: EngineConfig,
    boards: Mutex<OptimisticStore<BoardsReducer>>,
}

impl std::fmt::Debug for DashboardEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardEngine")
            .field("owner", &self.owner)
            .field("pending", &self.lock().pending_len())
            .finish_non_exhaustive()
    }
}

impl DashboardEngine {
    pub async fn load(
        owner: &str,
        gateway: Arc<dyn PersistenceGateway>,
        config: EngineConfig,
    ) -> EngineResult<Self> {
        let boards = gateway.list_boards(owner).await?;
        log::info!("[cardflow.engine.dashboard] loaded {} boards for {}", boards.len(), owner);
        Ok(Self {
            owner: owner.to_string(),
            gateway,
            config,
            boards: Mutex::new(OptimisticStore::new(boards)),
        })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Every board, pending edits applied, newest first.
    pub fn boards(&self) -> Vec<Board> {
        self.lock().provisional()
    }

    pub fn active_boards(&self, query: &str) -> Vec<Board> {
        filter::active_boards(&self.boards(), query)
    }

    pub fn archived_boards(&self) -> Vec<Board> {
        filter::archived_boards(&self.boards())
    }

    pub fn pending_len(&self) -> usize {
        self.lock().pending_len()
    }

    pub async fn reload(&self) -> EngineResult<()> {
        let boards = self.gateway.list_boards(&self.owner).await?;
        let mut store = self.lock();
        log::info!(
            "[cardflow.engine.reload] {} boards reloaded for {}, {} pending",
            boards.len(),
            self.owner,
            store.pending_len()
        );
        store.replace(boards);
        Ok(())
    }

    /// Create a board, optionally with the default "To Do", "In Progress",
    /// "Review" and "Done" columns.
    pub async fn create_board(
        &self,
        title: &str,
        color: &str,
        with_default_columns: bool,
    ) -> EngineResult<Board> {
        let fields = NewBoard {
            title: validate::title(title, &self.config.validation)?,
            owner: self.owner.clone(),
            color: validate::color(color)?,
            with_default_columns,
        };
        let now = Utc::now();
        let placeholder = Board {
            id: temp_board_id(),
            title: fields.title.clone(),
            owner: self.owner.clone(),
            is_favorite: false,
            is_archived: false,
            color: fields.color.clone(),
            created_at: now,
            updated_at: now,
            is_optimistic: true,
        };

        self.persist(
            BoardAction::CreateBoard { board: placeholder },
            self.gateway.create_board(&fields),
            |board: &Board| BoardAction::CreateBoard {
                board: board.clone(),
            },
        )
        .await
    }

    pub async fn update_board(&self, board_id: BoardId, patch: BoardPatch) -> EngineResult<Board> {
        let current = self.find(board_id)?;
        ensure_saved(EntityRef::Board(board_id))?;
        let patch = BoardPatch {
            title: patch
                .title
                .map(|t| validate::title(&t, &self.config.validation))
                .transpose()?,
            color: patch.color.map(|c| validate::color(&c)).transpose()?,
            is_favorite: patch.is_favorite,
            is_archived: patch.is_archived,
        };
        if patch.is_noop_for(&current) {
            log::debug!("[cardflow.engine.dashboard] update of board {} changes nothing", board_id);
            return Ok(current);
        }

        let mut next = patch.apply_to(&current);
        next.updated_at = Utc::now();
        self.persist(
            BoardAction::UpdateBoard { board: next },
            self.gateway.update_board(board_id, &patch),
            |board: &Board| BoardAction::UpdateBoard {
                board: board.clone(),
            },
        )
        .await
    }

    pub async fn delete_board(&self, board_id: BoardId) -> EngineResult<()> {
        self.find(board_id)?;
        ensure_saved(EntityRef::Board(board_id))?;
        self.persist(
            BoardAction::DeleteBoard { board_id },
            self.gateway.delete_board(board_id),
            |_: &()| BoardAction::DeleteBoard { board_id },
        )
        .await
    }

    pub async fn archive_board(&self, board_id: BoardId) -> EngineResult<Board> {
        self.set_archived(board_id, true).await
    }

    pub async fn unarchive_board(&self, board_id: BoardId) -> EngineResult<Board> {
        self.set_archived(board_id, false).await
    }

    pub async fn toggle_favorite(&self, board_id: BoardId) -> EngineResult<Board> {
        let is_favorite = self.find(board_id)?.is_favorite;
        self.update_board(
            board_id,
            BoardPatch {
                is_favorite: Some(!is_favorite),
                ..Default::default()
            },
        )
        .await
    }

    async fn set_archived(&self, board_id: BoardId, archived: bool) -> EngineResult<Board> {
        self.update_board(
            board_id,
            BoardPatch {
                is_archived: Some(archived),
                ..Default::default()
            },
        )
        .await
    }

    fn lock(&self) -> MutexGuard<'_, OptimisticStore<BoardsReducer>> {
        self.boards.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn find(&self, board_id: BoardId) -> EngineResult<Board> {
        self.boards()
            .into_iter()
            .find(|b| b.id == board_id)
            .ok_or_else(|| EngineError::UnknownEntity(format!("board {}", board_id)))
    }

    async fn persist<T, F>(
        &self,
        optimistic: BoardAction,
        call: F,
        confirmed: impl FnOnce(&T) -> BoardAction,
    ) -> EngineResult<T>
    where
        F: std::future::Future<Output = GatewayResult<T>>,
    {
        let kind = optimistic.kind();
        let ticket = self.lock().dispatch(optimistic);

        match call.await {
            Ok(value) => {
                self.lock().commit(ticket, &confirmed(&value));
                Ok(value)
            }
            Err(err) => {
                let err = EngineError::from(err);
                log::warn!("[cardflow.engine.dashboard] {} failed: {}", kind, err);
                if let Err(reload_err) = self.reload().await {
                    log::warn!(
                        "[cardflow.engine.reload] reload after failed {} also failed: {}",
                        kind,
                        reload_err
                    );
                }
                self.lock().discard(ticket);
                Err(err)
            }
        }
    }
}
