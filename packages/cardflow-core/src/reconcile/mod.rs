pub mod dedup;

pub use dedup::{dedup_boards, dedup_cards, dedup_columns, deduplicate, Provisional};
