//! Local mutations of the card collection.
//!
//! Every change a session makes before Save goes through [`reduce`]. The
//! reducer validates first and mutates second, so an action that cannot be
//! applied leaves the registry exactly as it was.

use chrono::{DateTime, Utc};
use tracing::debug;

use super::models::{Card, CardDraft, Column, UserStamp};
use super::registry::CardRegistry;

/// Where a moved card lands within its target column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertTarget {
    /// Directly before the card with this id.
    Before(String),
    /// After every card currently in the column.
    End,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRequest {
    pub card_id: String,
    pub column: Column,
    pub target: InsertTarget,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoardAction {
    Move(MoveRequest),
    Add { column: Column, draft: CardDraft },
    Edit { id: String, draft: CardDraft },
    Delete { id: String },
}

/// Result of applying one action.
#[derive(Debug, Clone, PartialEq)]
pub enum Reduction {
    /// The registry changed. Carries the id of the affected card.
    Applied { card_id: String },
    /// Nothing to do: a card dropped on itself, or an edit matching the card.
    Unchanged,
    /// The action referenced something that is not on the board; nothing changed.
    Ignored(IgnoredReason),
}

impl Reduction {
    pub fn is_applied(&self) -> bool {
        matches!(self, Reduction::Applied { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoredReason {
    CardMissing(String),
    TargetMissing(String),
    TargetInOtherColumn { target: String, column: Column },
}

pub fn reduce(
    registry: &mut CardRegistry,
    action: BoardAction,
    actor: &UserStamp,
    now: DateTime<Utc>,
) -> Reduction {
    match action {
        BoardAction::Move(request) => apply_move(registry, request, actor, now),
        BoardAction::Add { column, draft } => Reduction::Applied {
            card_id: add_card(registry, column, draft, actor, now),
        },
        BoardAction::Edit { id, draft } => match registry.get_mut(&id) {
            Some(card)
                if card.title == draft.title
                    && card.price == draft.price
                    && card.category == draft.category =>
            {
                Reduction::Unchanged
            }
            Some(card) => {
                card.title = draft.title;
                card.price = draft.price;
                card.category = draft.category;
                card.restamp(actor, now);
                Reduction::Applied { card_id: id }
            }
            None => ignored(IgnoredReason::CardMissing(id)),
        },
        BoardAction::Delete { id } => match registry.remove(&id) {
            Some(_) => Reduction::Applied { card_id: id },
            None => ignored(IgnoredReason::CardMissing(id)),
        },
    }
}

/// Append a new card built from `draft` to `column`. Returns its id.
pub fn add_card(
    registry: &mut CardRegistry,
    column: Column,
    draft: CardDraft,
    actor: &UserStamp,
    now: DateTime<Utc>,
) -> String {
    let card = Card::create(draft, column, actor, now);
    let card_id = card.id.clone();
    registry.push(card);
    card_id
}

/// Move a card to `request.column`, before `request.target`.
///
/// The moved card is restamped on every successful move, including a reorder
/// within the same column. No other card is touched.
pub fn apply_move(
    registry: &mut CardRegistry,
    request: MoveRequest,
    actor: &UserStamp,
    now: DateTime<Utc>,
) -> Reduction {
    let MoveRequest {
        card_id,
        column,
        target,
    } = request;

    if registry.locate(&card_id).is_none() {
        return ignored(IgnoredReason::CardMissing(card_id));
    }

    if let InsertTarget::Before(before) = &target {
        if *before == card_id {
            return Reduction::Unchanged;
        }
        match registry.locate(before) {
            None => return ignored(IgnoredReason::TargetMissing(before.clone())),
            Some((target_column, _)) if target_column != column => {
                return ignored(IgnoredReason::TargetInOtherColumn {
                    target: before.clone(),
                    column,
                });
            }
            Some(_) => {}
        }
    }

    let Some(mut card) = registry.remove(&card_id) else {
        return ignored(IgnoredReason::CardMissing(card_id));
    };
    card.column = column;
    card.restamp(actor, now);

    match target {
        InsertTarget::End => registry.push(card),
        InsertTarget::Before(before) => {
            // Index is taken after removal so a same-column move lands correctly.
            let index = registry
                .locate(&before)
                .map(|(_, idx)| idx)
                .unwrap_or_else(|| registry.column(column).len());
            registry.insert(column, index, card);
        }
    }

    Reduction::Applied { card_id }
}

fn ignored(reason: IgnoredReason) -> Reduction {
    debug!(?reason, "board action ignored");
    Reduction::Ignored(reason)
}
