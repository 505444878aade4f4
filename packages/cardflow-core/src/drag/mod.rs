pub mod controller;
pub mod session;

pub use controller::DragController;
pub use session::{Direction, DragId, DragSession, DragState, DropOutcome, MoveRequest, Slot};
