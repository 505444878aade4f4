pub mod action;
pub mod reducer;
pub mod store;

pub use action::{Action, BoardAction};
pub use reducer::{apply, apply_boards, reduce, reduce_boards};
pub use store::{BoardsReducer, ColumnsReducer, OptimisticStore, Reducer, Ticket};
