/// Two-layer optimistic state: confirmed store + pending action log.
///
/// The provisional view is never stored. It is derived on demand by folding
/// the pending log over the confirmed state and reconciling the result.
/// Confirmed state changes only through `commit` (a persistence call
/// succeeded) and `replace` (initial load or reload).
use std::fmt;

use crate::position::renumber;
use crate::reconcile::{dedup_boards, dedup_columns};
use crate::types::{Board, Column};

use super::action::{Action, BoardAction};
use super::reducer::{apply, apply_boards};

/// How a state type folds its actions and cleans up the folded result.
pub trait Reducer {
    type State: Clone;
    type Action: Clone + fmt::Debug;

    fn apply(state: Self::State, action: &Self::Action) -> Self::State;

    /// Runs once over the folded state before it is handed out.
    fn reconcile(state: Self::State) -> Self::State {
        state
    }
}

/// One board's columns and cards.
#[derive(Debug, Clone, Copy, Default)]
pub struct ColumnsReducer;

impl Reducer for ColumnsReducer {
    type State = Vec<Column>;
    type Action = Action;

    fn apply(state: Vec<Column>, action: &Action) -> Vec<Column> {
        apply(state, action)
    }

    fn reconcile(state: Vec<Column>) -> Vec<Column> {
        let mut columns = dedup_columns(state);
        renumber(&mut columns);
        for col in columns.iter_mut() {
            renumber(&mut col.cards);
        }
        columns
    }
}

/// A user's board list.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoardsReducer;

impl Reducer for BoardsReducer {
    type State = Vec<Board>;
    type Action = BoardAction;

    fn apply(state: Vec<Board>, action: &BoardAction) -> Vec<Board> {
        apply_boards(state, action)
    }

    fn reconcile(state: Vec<Board>) -> Vec<Board> {
        dedup_boards(state)
    }
}

/// Handle for one pending action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(u64);

struct PendingEntry<A> {
    ticket: Ticket,
    action: A,
}

pub struct OptimisticStore<R: Reducer> {
    confirmed: R::State,
    pending: Vec<PendingEntry<R::Action>>,
    next_ticket: u64,
}

impl<R: Reducer> fmt::Debug for OptimisticStore<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptimisticStore")
            .field("pending", &self.pending.len())
            .field("next_ticket", &self.next_ticket)
            .finish_non_exhaustive()
    }
}

impl<R: Reducer> OptimisticStore<R> {
    pub fn new(confirmed: R::State) -> Self {
        Self {
            confirmed,
            pending: Vec::new(),
            next_ticket: 1,
        }
    }

    pub fn confirmed(&self) -> &R::State {
        &self.confirmed
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn pending_actions(&self) -> impl Iterator<Item = &R::Action> {
        self.pending.iter().map(|p| &p.action)
    }

    pub fn is_pending(&self, ticket: Ticket) -> bool {
        self.pending.iter().any(|p| p.ticket == ticket)
    }

    /// Record a pending action; it shows up in the next provisional view.
    pub fn dispatch(&mut self, action: R::Action) -> Ticket {
        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;
        self.pending.push(PendingEntry { ticket, action });
        ticket
    }

    /// Retire `ticket` and fold the server-confirmed action into confirmed
    /// state in the same step. Returns false if the ticket was not pending
    /// (the confirmed action is applied either way).
    pub fn commit(&mut self, ticket: Ticket, confirmed: &R::Action) -> bool {
        let was_pending = self.remove(ticket);
        let state = self.confirmed.clone();
        self.confirmed = R::apply(state, confirmed);
        was_pending
    }

    /// Drop a pending action without touching confirmed state.
    pub fn discard(&mut self, ticket: Ticket) -> bool {
        self.remove(ticket)
    }

    /// Swap in freshly loaded confirmed state. Pending actions are kept.
    pub fn replace(&mut self, confirmed: R::State) {
        self.confirmed = confirmed;
    }

    /// Confirmed state with every pending action applied, reconciled.
    pub fn provisional(&self) -> R::State {
        let folded = self
            .pending
            .iter()
            .fold(self.confirmed.clone(), |state, p| R::apply(state, &p.action));
        R::reconcile(folded)
    }

    fn remove(&mut self, ticket: Ticket) -> bool {
        let before = self.pending.len();
        self.pending.retain(|p| p.ticket != ticket);
        before != self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BoardId, Card, CardId, ColumnId, Priority};
    use chrono::Utc;

    fn card(id: i64, title: &str, optimistic: bool) -> Card {
        let now = Utc::now();
        Card {
            id: CardId(id),
            title: title.to_string(),
            description: None,
            priority: Priority::Default,
            position: 0,
            column_id: ColumnId(1),
            created_at: now,
            updated_at: now,
            is_optimistic: optimistic,
        }
    }

    fn board(cards: Vec<Card>) -> Vec<Column> {
        let mut cards = cards;
        renumber(&mut cards);
        vec![Column {
            id: ColumnId(1),
            title: "To Do".to_string(),
            position: 0,
            board_id: BoardId(1),
            created_at: Utc::now(),
            cards,
            is_optimistic: false,
        }]
    }

    fn ids(columns: &[Column]) -> Vec<i64> {
        columns[0].cards.iter().map(|c| c.id.0).collect()
    }

    #[test]
    fn test_dispatch_shows_in_provisional_only() {
        let mut store: OptimisticStore<ColumnsReducer> = OptimisticStore::new(board(vec![card(1, "A", false)]));
        let ticket = store.dispatch(Action::CreateCard { card: card(-2, "B", true) });
        assert!(store.is_pending(ticket));
        assert_eq!(ids(&store.provisional()), vec![1, -2]);
        assert_eq!(ids(store.confirmed()), vec![1]);
    }

    #[test]
    fn test_commit_replaces_placeholder_in_one_step() {
        let mut store: OptimisticStore<ColumnsReducer> = OptimisticStore::new(board(vec![card(1, "A", false)]));
        let ticket = store.dispatch(Action::CreateCard { card: card(-123, "Fix bug", true) });

        assert!(store.commit(ticket, &Action::CreateCard { card: card(456, "Fix bug", false) }));
        assert_eq!(store.pending_len(), 0);
        let view = store.provisional();
        assert_eq!(ids(&view), vec![1, 456]);
        assert_eq!(view[0].cards[1].title, "Fix bug");
    }

    #[test]
    fn test_reload_while_create_pending_shows_one_card() {
        let mut store: OptimisticStore<ColumnsReducer> = OptimisticStore::new(board(vec![card(1, "A", false)]));
        store.dispatch(Action::CreateCard { card: card(-123, "Fix bug", true) });
        // Confirmed state refreshed before the create call returned
        store.replace(board(vec![card(1, "A", false), card(456, "Fix bug", false)]));

        let view = store.provisional();
        assert_eq!(ids(&view), vec![1, 456]);
        assert_eq!(view[0].cards[1].position, 1);
    }

    #[test]
    fn test_discard_restores_confirmed_view() {
        let mut store: OptimisticStore<ColumnsReducer> = OptimisticStore::new(board(vec![card(1, "A", false)]));
        let ticket = store.dispatch(Action::DeleteCard { card_id: CardId(1) });
        assert!(ids(&store.provisional()).is_empty());
        assert!(store.discard(ticket));
        assert!(!store.discard(ticket));
        assert_eq!(ids(&store.provisional()), vec![1]);
    }

    #[test]
    fn test_pending_log_applies_in_order() {
        let mut store: OptimisticStore<ColumnsReducer> =
            OptimisticStore::new(board(vec![card(1, "A", false), card(2, "B", false)]));
        store.dispatch(Action::MoveCard { card_id: CardId(1), column_id: ColumnId(1), position: 1 });
        store.dispatch(Action::DeleteCard { card_id: CardId(2) });
        assert_eq!(ids(&store.provisional()), vec![1]);
        assert_eq!(store.pending_actions().count(), 2);
    }
}
