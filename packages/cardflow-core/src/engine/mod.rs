pub mod board;
pub mod dashboard;

pub use board::BoardEngine;
pub use dashboard::DashboardEngine;

use crate::drag::DragId;
use crate::gateway::GatewayError;
use crate::types::{BoardId, CardId, ColumnId};
use crate::validate::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Unknown {0}")]
    UnknownEntity(String),
}

impl EngineError {
    /// Rate-limited failures get their own user-facing message; recovery is
    /// the same as for any other persistence failure.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, EngineError::Gateway(e) if e.is_rate_limited())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// An entity an engine operation names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EntityRef {
    Board(BoardId),
    Column(ColumnId),
    Card(CardId),
}

impl From<DragId> for EntityRef {
    fn from(id: DragId) -> Self {
        match id {
            DragId::Column(column_id) => EntityRef::Column(column_id),
            DragId::Card(card_id) => EntityRef::Card(card_id),
        }
    }
}

/// Entities still carrying a temporary id have no server counterpart yet.
pub(crate) fn ensure_saved(id: impl Into<EntityRef>) -> EngineResult<()> {
    let (kind, raw, temporary) = match id.into() {
        EntityRef::Board(id) => ("board", id.0, id.is_temporary()),
        EntityRef::Column(id) => ("column", id.0, id.is_temporary()),
        EntityRef::Card(id) => ("card", id.0, id.is_temporary()),
    };
    if temporary {
        log::warn!("[cardflow.engine] {} {} is not saved yet, nothing sent", kind, raw);
        return Err(EngineError::UnknownEntity(format!("{} {} (not saved yet)", kind, raw)));
    }
    Ok(())
}
