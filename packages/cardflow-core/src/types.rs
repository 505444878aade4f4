use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Temporary ids are allocated client-side from the negative range.
            pub fn is_temporary(self) -> bool {
                self.0 < 0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }
    };
}

entity_id!(
    /// Identifier of a board.
    BoardId
);
entity_id!(
    /// Identifier of a column.
    ColumnId
);
entity_id!(
    /// Identifier of a card.
    CardId
);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Default,
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Default => "default",
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub id: BoardId,
    pub title: String,
    /// Opaque reference to the owning user, issued by the identity provider.
    pub owner: String,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub is_archived: bool,
    /// Palette class, e.g. `bg-blue-500`.
    pub color: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_optimistic: bool,
}

/// A column together with its ordered cards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub id: ColumnId,
    pub title: String,
    pub position: usize,
    pub board_id: BoardId,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub cards: Vec<Card>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_optimistic: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: CardId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    pub position: usize,
    pub column_id: ColumnId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_optimistic: bool,
}

impl Column {
    pub fn card(&self, id: CardId) -> Option<&Card> {
        self.cards.iter().find(|c| c.id == id)
    }

    pub fn contains_card(&self, id: CardId) -> bool {
        self.cards.iter().any(|c| c.id == id)
    }

    /// Copy the column's own fields from `other`, keeping this column's cards.
    pub fn with_fields_of(&self, other: &Column) -> Column {
        Column {
            id: other.id,
            title: other.title.clone(),
            position: self.position,
            board_id: other.board_id,
            created_at: other.created_at,
            cards: self.cards.clone(),
            is_optimistic: other.is_optimistic,
        }
    }
}

/// A board and its columns as loaded from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardSnapshot {
    pub board: Board,
    pub columns: Vec<Column>,
}

impl BoardSnapshot {
    pub fn card_count(&self) -> usize {
        self.columns.iter().map(|c| c.cards.len()).sum()
    }
}

// ── Field sets for create and update ─────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBoard {
    pub title: String,
    pub owner: String,
    pub color: String,
    #[serde(default)]
    pub with_default_columns: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_favorite: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_archived: Option<bool>,
}

impl BoardPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.color.is_none()
            && self.is_favorite.is_none()
            && self.is_archived.is_none()
    }

    pub fn apply_to(&self, board: &Board) -> Board {
        let mut next = board.clone();
        if let Some(title) = &self.title {
            next.title = title.clone();
        }
        if let Some(color) = &self.color {
            next.color = color.clone();
        }
        if let Some(fav) = self.is_favorite {
            next.is_favorite = fav;
        }
        if let Some(archived) = self.is_archived {
            next.is_archived = archived;
        }
        next
    }

    /// True when applying the patch would leave `board` unchanged.
    pub fn is_noop_for(&self, board: &Board) -> bool {
        let next = self.apply_to(board);
        next.title == board.title
            && next.color == board.color
            && next.is_favorite == board.is_favorite
            && next.is_archived == board.is_archived
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewColumn {
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCard {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Priority,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// `Some(None)` clears the description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    /// Moving to another column appends the card to the end of that column.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_id: Option<ColumnId>,
}

impl CardPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.priority.is_none()
            && self.column_id.is_none()
    }

    /// Apply the patch's fields; position is left for the reducer to renumber.
    pub fn apply_to(&self, card: &Card) -> Card {
        let mut next = card.clone();
        if let Some(title) = &self.title {
            next.title = title.clone();
        }
        if let Some(description) = &self.description {
            next.description = description.clone();
        }
        if let Some(priority) = self.priority {
            next.priority = priority;
        }
        if let Some(column_id) = self.column_id {
            next.column_id = column_id;
        }
        next
    }

    pub fn is_noop_for(&self, card: &Card) -> bool {
        let next = self.apply_to(card);
        next.title == card.title
            && next.description.as_deref().unwrap_or("") == card.description.as_deref().unwrap_or("")
            && next.priority == card.priority
            && next.column_id == card.column_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card() -> Card {
        let now = Utc::now();
        Card {
            id: CardId(7),
            title: "Fix bug".to_string(),
            description: None,
            priority: Priority::High,
            position: 0,
            column_id: ColumnId(1),
            created_at: now,
            updated_at: now,
            is_optimistic: false,
        }
    }

    #[test]
    fn test_priority_serializes_lowercase() {
        let json = serde_json::to_string(&Priority::Medium).unwrap();
        assert_eq!(json, "\"medium\"");
        let parsed: Priority = serde_json::from_str("\"high\"").unwrap();
        assert_eq!(parsed, Priority::High);
    }

    #[test]
    fn test_optimistic_flag_omitted_when_false() {
        let json = serde_json::to_value(card()).unwrap();
        assert!(json.get("isOptimistic").is_none());
        assert_eq!(json["columnId"], 1);

        let mut temp = card();
        temp.is_optimistic = true;
        let json = serde_json::to_value(temp).unwrap();
        assert_eq!(json["isOptimistic"], true);
    }

    #[test]
    fn test_temporary_ids_are_negative() {
        assert!(CardId(-123).is_temporary());
        assert!(!CardId(456).is_temporary());
    }

    #[test]
    fn test_card_patch_detects_noop() {
        let c = card();
        let same = CardPatch {
            title: Some("Fix bug".to_string()),
            description: Some(Some(String::new())),
            ..Default::default()
        };
        assert!(same.is_noop_for(&c));

        let moved = CardPatch {
            column_id: Some(ColumnId(2)),
            ..Default::default()
        };
        assert!(!moved.is_noop_for(&c));
        assert_eq!(moved.apply_to(&c).column_id, ColumnId(2));
    }

    #[test]
    fn test_column_with_fields_keeps_cards() {
        let now = Utc::now();
        let col = Column {
            id: ColumnId(1),
            title: "To Do".to_string(),
            position: 0,
            board_id: BoardId(1),
            created_at: now,
            cards: vec![card()],
            is_optimistic: false,
        };
        let mut renamed = col.clone();
        renamed.title = "Backlog".to_string();
        renamed.cards.clear();

        let merged = col.with_fields_of(&renamed);
        assert_eq!(merged.title, "Backlog");
        assert_eq!(merged.cards.len(), 1);
    }
}
