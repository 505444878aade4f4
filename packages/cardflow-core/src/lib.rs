//! Optimistic state reconciliation and drag-reorder engine for kanban boards.
//!
//! The UI reads a provisional view derived from confirmed state plus a log
//! of pending actions, and drives drag gestures through a controller that
//! persists exactly one move per settled gesture.

pub mod config;
pub mod drag;
pub mod engine;
pub mod filter;
pub mod gateway;
pub mod identity;
pub mod optimistic;
pub mod position;
pub mod reconcile;
pub mod sequencer;
pub mod types;
pub mod validate;

pub use config::{load_config, ConfigError, EngineConfig};
pub use drag::{DragController, DragId, DropOutcome, MoveRequest};
pub use engine::{BoardEngine, DashboardEngine, EngineError, EngineResult};
pub use gateway::{GatewayError, InMemoryGateway, Operation, PersistenceGateway};
pub use optimistic::{Action, BoardAction, OptimisticStore, Ticket};
pub use types::*;
