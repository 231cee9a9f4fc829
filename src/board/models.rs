use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DraftError;

/// Lifecycle bucket a card currently occupies.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum Column {
    InStock,
    RunningLow,
    OutOfStock,
    Restocked,
}

impl Column {
    /// Board order, left to right.
    pub const ALL: [Column; 4] = [
        Column::InStock,
        Column::RunningLow,
        Column::OutOfStock,
        Column::Restocked,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InStock => "inStock",
            Self::RunningLow => "runningLow",
            Self::OutOfStock => "outOfStock",
            Self::Restocked => "restocked",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::InStock => "In Stock",
            Self::RunningLow => "Running Low",
            Self::OutOfStock => "Out of Stock",
            Self::Restocked => "Restocked",
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            Self::InStock => 0,
            Self::RunningLow => 1,
            Self::OutOfStock => 2,
            Self::Restocked => 3,
        }
    }
}

impl std::fmt::Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Column {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inStock" | "in_stock" => Ok(Self::InStock),
            "runningLow" | "running_low" => Ok(Self::RunningLow),
            "outOfStock" | "out_of_stock" => Ok(Self::OutOfStock),
            "restocked" => Ok(Self::Restocked),
            _ => Err(format!("Invalid column: {}", s)),
        }
    }
}

/// Department tag used to scope the default (non-search) view.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Category {
    #[default]
    Kitchen,
    Bar,
    DonutStation,
    Counter,
    Bakery,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Kitchen,
        Category::Bar,
        Category::DonutStation,
        Category::Counter,
        Category::Bakery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kitchen => "Kitchen",
            Self::Bar => "Bar",
            Self::DonutStation => "DonutStation",
            Self::Counter => "Counter",
            Self::Bakery => "Bakery",
        }
    }

    /// Human label shown on tabs and forms.
    pub fn label(&self) -> &'static str {
        match self {
            Self::DonutStation => "Donut Station",
            other => other.as_str(),
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s) || c.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Invalid category: {}", s))
    }
}

/// Identity stamped onto a card when it is created or modified.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserStamp {
    pub uid: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub email: String,
}

impl UserStamp {
    pub fn new(uid: impl Into<String>, display_name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            display_name: display_name.into(),
            email: email.into(),
        }
    }

    /// Name to show for this user, falling back to the email.
    pub fn label(&self) -> &str {
        if !self.display_name.is_empty() {
            &self.display_name
        } else if !self.email.is_empty() {
            &self.email
        } else {
            "unknown"
        }
    }
}

/// A stock item on the board.
///
/// On the wire the two stamps are flattened into `uid`/`displayName`/`email`
/// and `lastModifiedUid`/`lastModifiedDisplayName`/`lastModifiedEmail`, the
/// layout existing board documents use.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(from = "CardRecord", into = "CardRecord")]
pub struct Card {
    pub id: String,
    pub title: String,
    pub price: f64,
    pub category: Category,
    pub column: Column,
    pub created_by: UserStamp,
    pub last_modified_by: UserStamp,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Card {
    /// Build a fresh card from a validated draft. Both stamps point at `actor`.
    pub fn create(draft: CardDraft, column: Column, actor: &UserStamp, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: draft.title,
            price: draft.price,
            category: draft.category,
            column,
            created_by: actor.clone(),
            last_modified_by: actor.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Record a modification by `actor`. `updated_at` always moves forward,
    /// even when the clock has not advanced since the last stamp.
    pub fn restamp(&mut self, actor: &UserStamp, now: DateTime<Utc>) {
        self.last_modified_by = actor.clone();
        self.updated_at = if now > self.updated_at {
            now
        } else {
            self.updated_at + Duration::milliseconds(1)
        };
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CardRecord {
    id: String,
    title: String,
    price: f64,
    category: Category,
    column: Column,
    #[serde(default)]
    uid: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    last_modified_uid: String,
    #[serde(default)]
    last_modified_display_name: String,
    #[serde(default)]
    last_modified_email: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CardRecord> for Card {
    fn from(r: CardRecord) -> Self {
        Self {
            id: r.id,
            title: r.title,
            price: r.price,
            category: r.category,
            column: r.column,
            created_by: UserStamp::new(r.uid, r.display_name, r.email),
            last_modified_by: UserStamp::new(
                r.last_modified_uid,
                r.last_modified_display_name,
                r.last_modified_email,
            ),
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

impl From<Card> for CardRecord {
    fn from(c: Card) -> Self {
        Self {
            id: c.id,
            title: c.title,
            price: c.price,
            category: c.category,
            column: c.column,
            uid: c.created_by.uid,
            display_name: c.created_by.display_name,
            email: c.created_by.email,
            last_modified_uid: c.last_modified_by.uid,
            last_modified_display_name: c.last_modified_by.display_name,
            last_modified_email: c.last_modified_by.email,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

/// Editable fields of a card, as entered in the add/edit forms.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CardDraft {
    pub title: String,
    pub price: f64,
    pub category: Category,
}

impl CardDraft {
    /// Parse form input. The title is trimmed; the price must be a finite,
    /// non-negative decimal number.
    pub fn parse(title: &str, price: &str, category: Category) -> Result<Self, DraftError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(DraftError::BlankTitle);
        }
        let price: f64 = price
            .trim()
            .parse()
            .map_err(|_| DraftError::InvalidPrice(price.to_string()))?;
        Self::new(title, price, category)
    }

    pub fn new(title: &str, price: f64, category: Category) -> Result<Self, DraftError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(DraftError::BlankTitle);
        }
        if !price.is_finite() || price < 0.0 {
            return Err(DraftError::InvalidPrice(price.to_string()));
        }
        Ok(Self {
            title: title.to_string(),
            price,
            category,
        })
    }
}

/// Persisted document shape: the whole board lives under `items`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BoardDocument {
    #[serde(default)]
    pub items: Vec<Card>,
}

// API view types
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardView {
    pub category: Category,
    pub search: Option<String>,
    pub columns: Vec<ColumnView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnView {
    pub name: Column,
    pub title: String,
    pub cards: Vec<Card>,
    /// Visible cards in this column belonging to the selected category.
    pub category_count: usize,
}
