//! Board session controller.
//!
//! Owns one session's card registry, filter and drag state, and mediates
//! between local edits and the shared document:
//!
//! ```text
//! Loading ──fetch ok──▶ Ready ◀──────────────┐
//!    │                   │ begin_save         │ finish_save (Saved / SaveFailed)
//!    └──fetch err──▶ LoadFailed            Saving
//! ```
//!
//! Edits are applied locally and are not durable until a save completes.
//! The session remains editable while a save is in flight.

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::gesture::{
    BoardLayout, DEFAULT_ROW_HEIGHT, DISTANCE_OFFSET, DragEvent, DragInterpreter, DropGeometry,
    GestureOutcome,
};
use super::models::{BoardView, Card, CardDraft, Category, Column, ColumnView, UserStamp};
use super::reducer::{self, BoardAction, MoveRequest, Reduction, reduce};
use super::registry::CardRegistry;
use super::sync::{CardSubscription, SyncGateway};
use crate::errors::{BoardError, DraftError, SyncError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardState {
    Loading,
    Ready,
    Saving,
    LoadFailed(String),
}

/// What to do with a pushed snapshot when the session has unsaved changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteUpdatePolicy {
    /// Reload wholesale, discarding local changes.
    #[default]
    Replace,
    /// Hold the snapshot until the user accepts it or saves over it.
    Warn,
}

impl std::str::FromStr for RemoteUpdatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "replace" => Ok(Self::Replace),
            "warn" => Ok(Self::Warn),
            _ => Err(format!("Invalid remote update policy: {}", s)),
        }
    }
}

/// User-visible notifications raised by the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Saved { count: usize },
    SaveFailed(String),
    InvalidCard(String),
    RemoteReplaced { discarded_local: bool },
    RemoteChangesPending,
    RemoteUnreadable(String),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Saved { count } => write!(f, "Saved {} cards", count),
            Notice::SaveFailed(msg) => write!(f, "Save failed: {}", msg),
            Notice::InvalidCard(msg) => f.write_str(msg),
            Notice::RemoteReplaced { discarded_local: true } => {
                f.write_str("Board updated remotely; unsaved local changes were discarded")
            }
            Notice::RemoteReplaced { discarded_local: false } => f.write_str("Board updated remotely"),
            Notice::RemoteChangesPending => {
                f.write_str("Board changed remotely; accept the update or save to overwrite it")
            }
            Notice::RemoteUnreadable(msg) => write!(f, "Ignored unreadable remote update: {}", msg),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub default_category: Category,
    pub remote_updates: RemoteUpdatePolicy,
    pub distance_offset: f64,
    pub row_height: f64,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            default_category: Category::default(),
            remote_updates: RemoteUpdatePolicy::default(),
            distance_offset: DISTANCE_OFFSET,
            row_height: DEFAULT_ROW_HEIGHT,
        }
    }
}

/// Snapshot captured by [`BoardController::begin_save`], written independently
/// of the session.
pub struct PendingSave {
    gateway: SyncGateway,
    cards: Vec<Card>,
    revision: u64,
}

impl PendingSave {
    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub async fn execute(self) -> SaveOutcome {
        let result = self.gateway.save_all(&self.cards).await;
        SaveOutcome {
            revision: self.revision,
            count: self.cards.len(),
            result,
        }
    }
}

pub struct SaveOutcome {
    revision: u64,
    count: usize,
    result: Result<(), SyncError>,
}

pub struct BoardController {
    gateway: SyncGateway,
    options: ControllerOptions,
    registry: CardRegistry,
    state: BoardState,
    category: Category,
    search: String,
    drag: DragInterpreter,
    subscription: Option<CardSubscription>,
    pending_remote: Option<Vec<Card>>,
    notices: Vec<Notice>,
    /// Bumped on every local change.
    revision: u64,
    /// Revision last known to match the remote document.
    synced_revision: u64,
    /// Revision and cards of the most recent save, to recognize its echo.
    last_written: Option<(u64, Vec<Card>)>,
}

impl BoardController {
    pub fn new(gateway: SyncGateway, options: ControllerOptions) -> Self {
        Self {
            gateway,
            category: options.default_category,
            drag: DragInterpreter::new(options.distance_offset),
            options,
            registry: CardRegistry::new(),
            state: BoardState::Loading,
            search: String::new(),
            subscription: None,
            pending_remote: None,
            notices: Vec::new(),
            revision: 0,
            synced_revision: 0,
            last_written: None,
        }
    }

    /// Subscribe to pushes and fetch the board. May be called again after a failure.
    pub async fn load(&mut self) -> Result<(), BoardError> {
        self.state = BoardState::Loading;
        if self.subscription.is_none() {
            // Subscribe first so no write between fetch and subscribe is missed.
            self.subscription = Some(self.gateway.subscribe());
        }
        match self.gateway.fetch_all().await {
            Ok(cards) => {
                info!(key = %self.gateway.key(), count = cards.len(), "board loaded");
                self.replace_all(cards);
                self.state = BoardState::Ready;
                Ok(())
            }
            Err(e) => {
                let msg = e.to_string();
                warn!(error = %msg, "board load failed");
                self.state = BoardState::LoadFailed(msg.clone());
                Err(BoardError::LoadFailed(msg))
            }
        }
    }

    pub fn state(&self) -> &BoardState {
        &self.state
    }

    pub fn registry(&self) -> &CardRegistry {
        &self.registry
    }

    pub fn is_dirty(&self) -> bool {
        self.revision != self.synced_revision
    }

    pub fn has_pending_remote(&self) -> bool {
        self.pending_remote.is_some()
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    // ── Filter ────────────────────────────────────────────────────────

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn set_category(&mut self, category: Category) {
        self.category = category;
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn set_search(&mut self, term: impl Into<String>) {
        self.search = term.into();
    }

    pub fn board_view(&self) -> BoardView {
        build_view(&self.registry, self.category, &self.search)
    }

    // ── Local edits ───────────────────────────────────────────────────

    /// Add a card from form input. Returns the new card's id.
    pub fn add_card(
        &mut self,
        column: Column,
        title: &str,
        price: &str,
        category: Category,
    ) -> Result<String, BoardError> {
        self.ensure_editable()?;
        let draft = self.validate(title, price, category)?;
        let actor = self.actor();
        let card_id = reducer::add_card(&mut self.registry, column, draft, &actor, Utc::now());
        self.revision += 1;
        Ok(card_id)
    }

    /// Edit a card from form input. Returns `false` when the input matches
    /// the card as it stands, in which case nothing is restamped.
    pub fn edit_card(&mut self, id: &str, title: &str, price: &str, category: Category) -> Result<bool, BoardError> {
        self.ensure_editable()?;
        if self.registry.get(id).is_none() {
            return Err(BoardError::CardNotFound { id: id.to_string() });
        }
        let draft = self.validate(title, price, category)?;
        let reduction = self.apply(BoardAction::Edit {
            id: id.to_string(),
            draft,
        });
        Ok(reduction.is_applied())
    }

    pub fn delete_card(&mut self, id: &str) -> Result<(), BoardError> {
        self.ensure_editable()?;
        match self.apply(BoardAction::Delete { id: id.to_string() }) {
            Reduction::Applied { .. } => Ok(()),
            _ => Err(BoardError::CardNotFound { id: id.to_string() }),
        }
    }

    /// Move a card directly, bypassing gesture interpretation.
    pub fn move_card(&mut self, request: MoveRequest) -> Result<Reduction, BoardError> {
        self.ensure_editable()?;
        Ok(self.apply(BoardAction::Move(request)))
    }

    /// Feed a drag event using the uniform-row layout of the current filter.
    pub fn handle_gesture(&mut self, event: DragEvent) -> Result<GestureOutcome, BoardError> {
        let layout = BoardLayout::for_filter(
            &self.registry,
            self.category,
            &self.search,
            0.0,
            self.options.row_height,
        );
        self.handle_gesture_with(event, &layout)
    }

    /// Feed a drag event with geometry measured by the caller.
    pub fn handle_gesture_with(
        &mut self,
        event: DragEvent,
        geometry: &dyn DropGeometry,
    ) -> Result<GestureOutcome, BoardError> {
        self.ensure_editable()?;
        let outcome = self.drag.handle(event, geometry);
        match &outcome {
            GestureOutcome::Move(request) => {
                self.apply(BoardAction::Move(request.clone()));
            }
            GestureOutcome::Delete { card_id } => {
                self.apply(BoardAction::Delete { id: card_id.clone() });
            }
            _ => {}
        }
        Ok(outcome)
    }

    pub fn drag(&self) -> &DragInterpreter {
        &self.drag
    }

    // ── Save ──────────────────────────────────────────────────────────

    /// Snapshot the board and enter `Saving`. Only one save may be in flight.
    pub fn begin_save(&mut self) -> Result<PendingSave, BoardError> {
        match &self.state {
            BoardState::Ready => {}
            BoardState::Saving => return Err(BoardError::SaveInProgress),
            BoardState::Loading => return Err(BoardError::NotReady),
            BoardState::LoadFailed(msg) => return Err(BoardError::LoadFailed(msg.clone())),
        }
        self.state = BoardState::Saving;
        let cards = self.registry.snapshot();
        self.last_written = Some((self.revision, cards.clone()));
        Ok(PendingSave {
            gateway: self.gateway.clone(),
            cards,
            revision: self.revision,
        })
    }

    pub fn finish_save(&mut self, outcome: SaveOutcome) -> Result<(), BoardError> {
        if self.state == BoardState::Saving {
            self.state = BoardState::Ready;
        }
        match outcome.result {
            Ok(()) => {
                // The echo may already have been applied, or edits made since.
                self.synced_revision = self.synced_revision.max(outcome.revision);
                self.pending_remote = None;
                self.notices.push(Notice::Saved { count: outcome.count });
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "board save failed");
                self.last_written = None;
                self.notices.push(Notice::SaveFailed(e.to_string()));
                Err(e.into())
            }
        }
    }

    pub async fn save(&mut self) -> Result<(), BoardError> {
        let pending = self.begin_save()?;
        let outcome = pending.execute().await;
        self.finish_save(outcome)
    }

    // ── Remote updates ────────────────────────────────────────────────

    /// Apply the newest pushed snapshot, if any, without waiting.
    pub fn poll_remote(&mut self) -> bool {
        let Some(update) = self.subscription.as_mut().and_then(|s| s.try_latest()) else {
            return false;
        };
        self.receive_remote(update);
        true
    }

    /// Wait for the next pushed snapshot and apply it. `false` once the feed is closed.
    pub async fn next_remote(&mut self) -> bool {
        let Some(sub) = self.subscription.as_mut() else {
            return false;
        };
        match sub.next().await {
            Some(update) => {
                self.receive_remote(update);
                true
            }
            None => false,
        }
    }

    fn receive_remote(&mut self, update: Result<Vec<Card>, SyncError>) {
        match update {
            Ok(cards) => self.apply_remote(cards),
            Err(e) => {
                warn!(error = %e, "ignoring unreadable remote update");
                self.notices.push(Notice::RemoteUnreadable(e.to_string()));
            }
        }
    }

    /// Handle a full card list pushed by the store.
    pub fn apply_remote(&mut self, cards: Vec<Card>) {
        if matches!(self.state, BoardState::Loading | BoardState::LoadFailed(_)) {
            debug!("remote snapshot received before load completed");
            self.replace_all(cards);
            self.state = BoardState::Ready;
            return;
        }
        if let Some((revision, written)) = &self.last_written
            && *written == cards
        {
            debug!(revision, "own save echoed back");
            self.synced_revision = self.synced_revision.max(*revision);
            return;
        }
        if cards == self.registry.snapshot() {
            // Someone wrote exactly what this session holds.
            self.synced_revision = self.revision;
            return;
        }
        let dirty = self.is_dirty();
        if dirty && self.options.remote_updates == RemoteUpdatePolicy::Warn {
            info!(count = cards.len(), "remote update held; session has unsaved changes");
            self.pending_remote = Some(cards);
            self.notices.push(Notice::RemoteChangesPending);
            return;
        }
        info!(count = cards.len(), discarded_local = dirty, "board replaced by remote update");
        self.replace_all(cards);
        self.notices.push(Notice::RemoteReplaced { discarded_local: dirty });
    }

    /// Take a held remote snapshot, discarding local changes.
    pub fn accept_remote(&mut self) -> bool {
        match self.pending_remote.take() {
            Some(cards) => {
                self.replace_all(cards);
                self.notices.push(Notice::RemoteReplaced { discarded_local: true });
                true
            }
            None => false,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    /// Tear down the session's live channel.
    pub fn close(&mut self) {
        if let Some(sub) = self.subscription.take() {
            sub.unsubscribe();
        }
        self.pending_remote = None;
    }

    // ── Internals ─────────────────────────────────────────────────────

    fn ensure_editable(&self) -> Result<(), BoardError> {
        match &self.state {
            BoardState::Ready | BoardState::Saving => Ok(()),
            BoardState::Loading => Err(BoardError::NotReady),
            BoardState::LoadFailed(msg) => Err(BoardError::LoadFailed(msg.clone())),
        }
    }

    fn validate(&mut self, title: &str, price: &str, category: Category) -> Result<CardDraft, BoardError> {
        CardDraft::parse(title, price, category).map_err(|e| {
            // Blank titles are dropped silently, like an empty form submit.
            if !matches!(e, DraftError::BlankTitle) {
                self.notices.push(Notice::InvalidCard(e.to_string()));
            }
            BoardError::InvalidCard(e)
        })
    }

    fn actor(&self) -> UserStamp {
        self.gateway
            .auth()
            .current_user()
            .unwrap_or_else(|| UserStamp::new("anonymous", "", ""))
    }

    fn apply(&mut self, action: BoardAction) -> Reduction {
        let actor = self.actor();
        let reduction = reduce(&mut self.registry, action, &actor, Utc::now());
        if reduction.is_applied() {
            self.revision += 1;
        }
        reduction
    }

    fn replace_all(&mut self, cards: Vec<Card>) {
        self.registry.load(cards);
        self.pending_remote = None;
        self.last_written = None;
        self.revision += 1;
        self.synced_revision = self.revision;
    }
}

impl Drop for BoardController {
    fn drop(&mut self) {
        self.close();
    }
}

/// Filtered four-column view of `registry`.
pub fn build_view(registry: &CardRegistry, category: Category, search: &str) -> BoardView {
    let columns = Column::ALL
        .into_iter()
        .map(|column| ColumnView {
            name: column,
            title: column.title().to_string(),
            cards: registry
                .filtered_view(column, category, search)
                .into_iter()
                .cloned()
                .collect(),
            category_count: registry.category_count(column, category, search),
        })
        .collect();
    let search = search.trim();
    BoardView {
        category,
        search: (!search.is_empty()).then(|| search.to_string()),
        columns,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::auth::SignedOut;
    use crate::board::gesture::PointerSample;
    use crate::board::reducer::InsertTarget;
    use crate::board::registry::tests::card;
    use crate::board::store::{DocumentKey, DocumentStore, MemoryDocumentStore};
    use crate::board::sync::tests::{FlakyStore, signed_in};
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    fn seeded_store() -> Arc<MemoryDocumentStore> {
        let cards = vec![
            card("1", "Milk", Column::InStock, Category::Kitchen),
            card("2", "Sugar", Column::InStock, Category::Kitchen),
            card("3", "Flour", Column::RunningLow, Category::Kitchen),
            card("4", "Rum", Column::InStock, Category::Bar),
        ];
        Arc::new(MemoryDocumentStore::with_document(
            DocumentKey::board(),
            serde_json::json!({ "items": cards }),
        ))
    }

    fn controller(store: Arc<dyn DocumentStore>, policy: RemoteUpdatePolicy) -> BoardController {
        let gateway = SyncGateway::new(store, signed_in());
        BoardController::new(
            gateway,
            ControllerOptions {
                remote_updates: policy,
                ..Default::default()
            },
        )
    }

    fn ids(view: &ColumnView) -> Vec<&str> {
        view.cards.iter().map(|c| c.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_load_then_view() -> anyhow::Result<()> {
        let mut board = controller(seeded_store(), RemoteUpdatePolicy::Replace);
        assert_eq!(board.state(), &BoardState::Loading);
        board.load().await?;
        assert_eq!(board.state(), &BoardState::Ready);
        assert!(!board.is_dirty());

        let view = board.board_view();
        assert_eq!(view.columns.len(), 4);
        assert_eq!(view.columns[0].title, "In Stock");
        assert_eq!(ids(&view.columns[0]), vec!["1", "2"]);
        assert_eq!(view.columns[0].category_count, 2);
        assert_eq!(ids(&view.columns[1]), vec!["3"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_search_spans_categories_but_counts_selected() -> anyhow::Result<()> {
        let mut board = controller(seeded_store(), RemoteUpdatePolicy::Replace);
        board.load().await?;
        board.set_search("u");
        let view = board.board_view();
        assert_eq!(view.search.as_deref(), Some("u"));
        assert_eq!(ids(&view.columns[0]), vec!["2", "4"]);
        assert_eq!(view.columns[0].category_count, 1);

        board.set_search("");
        board.set_category(Category::Bar);
        assert_eq!(ids(&board.board_view().columns[0]), vec!["4"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_load_failure_blocks_edits_until_reload() -> anyhow::Result<()> {
        let store = Arc::new(FlakyStore::default());
        store.fail_get.store(true, Ordering::SeqCst);
        let mut board = controller(store.clone(), RemoteUpdatePolicy::Replace);

        let err = board.load().await.unwrap_err();
        assert!(matches!(err, BoardError::LoadFailed(_)));
        assert!(matches!(board.state(), BoardState::LoadFailed(_)));
        assert!(matches!(
            board.add_card(Column::InStock, "Milk", "1", Category::Kitchen),
            Err(BoardError::LoadFailed(_))
        ));
        assert!(matches!(board.begin_save(), Err(BoardError::LoadFailed(_))));

        store.fail_get.store(false, Ordering::SeqCst);
        board.load().await?;
        assert_eq!(board.state(), &BoardState::Ready);
        Ok(())
    }

    #[tokio::test]
    async fn test_edits_stay_local_until_save() -> anyhow::Result<()> {
        let store = seeded_store();
        let mut board = controller(store.clone(), RemoteUpdatePolicy::Replace);
        board.load().await?;

        let id = board.add_card(Column::OutOfStock, " Yeast ", "4.25", Category::Bakery)?;
        assert!(board.is_dirty());
        let remote = SyncGateway::new(store.clone(), signed_in()).fetch_all().await?;
        assert!(remote.iter().all(|c| c.id != id));

        board.save().await?;
        assert!(!board.is_dirty());
        assert_eq!(board.take_notices(), vec![Notice::Saved { count: 5 }]);
        let remote = SyncGateway::new(store, signed_in()).fetch_all().await?;
        let saved = remote.iter().find(|c| c.id == id).unwrap();
        assert_eq!(saved.title, "Yeast");
        assert_eq!(saved.created_by.uid, "u-1");
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_price_raises_notice_blank_title_does_not() -> anyhow::Result<()> {
        let mut board = controller(seeded_store(), RemoteUpdatePolicy::Replace);
        board.load().await?;

        let err = board.add_card(Column::InStock, "Salt", "cheap", Category::Kitchen).unwrap_err();
        assert!(matches!(err, BoardError::InvalidCard(DraftError::InvalidPrice(_))));
        assert!(matches!(board.notices(), [Notice::InvalidCard(_)]));
        board.take_notices();

        assert!(board.add_card(Column::InStock, "  ", "1", Category::Kitchen).is_err());
        assert!(board.notices().is_empty());
        assert!(!board.is_dirty());
        Ok(())
    }

    #[tokio::test]
    async fn test_edit_and_delete_flows() -> anyhow::Result<()> {
        let mut board = controller(seeded_store(), RemoteUpdatePolicy::Replace);
        board.load().await?;

        board.edit_card("2", "Brown sugar", "3.5", Category::Bakery)?;
        let edited = board.registry().get("2").unwrap();
        assert_eq!(edited.title, "Brown sugar");
        assert_eq!(edited.category, Category::Bakery);
        assert_eq!(edited.column, Column::InStock);

        assert!(matches!(
            board.edit_card("nope", "x", "1", Category::Bar),
            Err(BoardError::CardNotFound { .. })
        ));

        board.delete_card("2")?;
        assert!(board.registry().get("2").is_none());
        assert!(matches!(board.delete_card("2"), Err(BoardError::CardNotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_drag_gesture_moves_card() -> anyhow::Result<()> {
        let mut board = controller(seeded_store(), RemoteUpdatePolicy::Replace);
        board.load().await?;

        board.handle_gesture(DragEvent::DragStart { card_id: "3".into() })?;
        let over = board.handle_gesture(DragEvent::DragOver {
            column: Column::InStock,
            pointer: PointerSample::touch(10.0, 150.0),
        })?;
        assert_eq!(
            over,
            GestureOutcome::Highlight {
                column: Column::InStock,
                target: InsertTarget::Before("2".into()),
            }
        );
        board.handle_gesture(DragEvent::Drop {
            column: Column::InStock,
            pointer: PointerSample::touch(10.0, 150.0),
        })?;

        let view = board.board_view();
        assert_eq!(ids(&view.columns[0]), vec!["1", "3", "2"]);
        assert!(view.columns[1].cards.is_empty());
        assert!(board.is_dirty());
        assert!(board.drag().highlighted().is_none());

        board.handle_gesture(DragEvent::DragStart { card_id: "1".into() })?;
        board.handle_gesture(DragEvent::DropOnTrash)?;
        assert!(board.registry().get("1").is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_save_failure_keeps_state_and_dirty_flag() -> anyhow::Result<()> {
        let store = Arc::new(FlakyStore::default());
        store.fail_set.store(true, Ordering::SeqCst);
        let mut board = controller(store.clone(), RemoteUpdatePolicy::Replace);
        board.load().await?;
        board.add_card(Column::InStock, "Milk", "2", Category::Kitchen)?;
        let before = board.registry().clone();

        let err = board.save().await.unwrap_err();
        assert!(matches!(err, BoardError::Sync(SyncError::Save { .. })));
        assert_eq!(board.state(), &BoardState::Ready);
        assert!(board.is_dirty());
        assert_eq!(board.registry(), &before);
        assert!(matches!(board.take_notices().as_slice(), [Notice::SaveFailed(_)]));

        store.fail_set.store(false, Ordering::SeqCst);
        board.save().await?;
        assert!(!board.is_dirty());
        Ok(())
    }

    #[tokio::test]
    async fn test_second_save_rejected_while_in_flight() -> anyhow::Result<()> {
        let mut board = controller(seeded_store(), RemoteUpdatePolicy::Replace);
        board.load().await?;
        board.delete_card("4")?;

        let pending = board.begin_save()?;
        assert_eq!(board.state(), &BoardState::Saving);
        assert!(matches!(board.begin_save(), Err(BoardError::SaveInProgress)));

        // Still editable while saving; this edit is not part of the snapshot.
        board.delete_card("1")?;
        assert_eq!(pending.cards().len(), 3);

        let outcome = pending.execute().await;
        board.finish_save(outcome)?;
        assert_eq!(board.state(), &BoardState::Ready);
        assert!(board.is_dirty());
        Ok(())
    }

    #[tokio::test]
    async fn test_signed_out_save_is_rejected() -> anyhow::Result<()> {
        let gateway = SyncGateway::new(seeded_store(), Arc::new(SignedOut));
        let mut board = BoardController::new(gateway, ControllerOptions::default());
        board.load().await?;
        board.add_card(Column::InStock, "Milk", "1", Category::Kitchen)?;
        let added = board.registry().column(Column::InStock).last().unwrap();
        assert_eq!(added.created_by.uid, "anonymous");

        let err = board.save().await.unwrap_err();
        assert!(matches!(err, BoardError::Sync(SyncError::Unauthenticated)));
        Ok(())
    }

    #[tokio::test]
    async fn test_remote_replace_discards_local_changes() -> anyhow::Result<()> {
        let store = seeded_store();
        let mut board = controller(store.clone(), RemoteUpdatePolicy::Replace);
        board.load().await?;
        board.delete_card("1")?;

        let other = SyncGateway::new(store, signed_in());
        other.save_all(&[card("9", "Ice", Column::Restocked, Category::Bar)]).await?;

        assert!(board.poll_remote());
        assert_eq!(board.registry().len(), 1);
        assert!(!board.is_dirty());
        assert_eq!(
            board.take_notices(),
            vec![Notice::RemoteReplaced { discarded_local: true }]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_remote_warn_holds_snapshot_until_accepted() -> anyhow::Result<()> {
        let store = seeded_store();
        let mut board = controller(store.clone(), RemoteUpdatePolicy::Warn);
        board.load().await?;
        board.delete_card("1")?;

        let other = SyncGateway::new(store, signed_in());
        other.save_all(&[card("9", "Ice", Column::Restocked, Category::Bar)]).await?;

        assert!(board.poll_remote());
        assert!(board.has_pending_remote());
        assert_eq!(board.registry().len(), 3);
        assert_eq!(board.take_notices(), vec![Notice::RemoteChangesPending]);

        assert!(board.accept_remote());
        assert_eq!(board.registry().len(), 1);
        assert!(!board.is_dirty());
        assert!(!board.accept_remote());
        Ok(())
    }

    #[tokio::test]
    async fn test_remote_warn_without_local_changes_replaces() -> anyhow::Result<()> {
        let store = seeded_store();
        let mut board = controller(store.clone(), RemoteUpdatePolicy::Warn);
        board.load().await?;

        let other = SyncGateway::new(store, signed_in());
        other.save_all(&[]).await?;
        assert!(board.next_remote().await);
        assert!(board.registry().is_empty());
        assert_eq!(
            board.take_notices(),
            vec![Notice::RemoteReplaced { discarded_local: false }]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_own_save_echo_is_silent() -> anyhow::Result<()> {
        let mut board = controller(seeded_store(), RemoteUpdatePolicy::Replace);
        board.load().await?;
        board.delete_card("4")?;
        board.save().await?;
        board.take_notices();

        assert!(board.poll_remote());
        assert!(board.notices().is_empty());
        assert_eq!(board.registry().len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_echo_of_older_save_keeps_later_edits_dirty() -> anyhow::Result<()> {
        let mut board = controller(seeded_store(), RemoteUpdatePolicy::Replace);
        board.load().await?;
        board.delete_card("4")?;

        let pending = board.begin_save()?;
        board.delete_card("1")?;
        let outcome = pending.execute().await;

        // The store pushes the saved snapshot before the save is acknowledged.
        assert!(board.poll_remote());
        assert!(board.registry().get("1").is_none());
        assert!(board.is_dirty());

        board.finish_save(outcome)?;
        assert!(board.is_dirty());
        assert_eq!(board.registry().len(), 2);
        assert_eq!(board.take_notices(), vec![Notice::Saved { count: 3 }]);

        board.save().await?;
        assert!(!board.is_dirty());
        Ok(())
    }

    #[tokio::test]
    async fn test_foreign_write_during_save_converges_on_stored_board() -> anyhow::Result<()> {
        let store = seeded_store();
        let mut board = controller(store.clone(), RemoteUpdatePolicy::Replace);
        board.load().await?;
        board.delete_card("4")?;

        let pending = board.begin_save()?;
        let other = SyncGateway::new(store, signed_in());
        other.save_all(&[card("9", "Ice", Column::Restocked, Category::Bar)]).await?;
        assert!(board.poll_remote());
        assert_eq!(board.registry().len(), 1);

        let outcome = pending.execute().await;
        board.finish_save(outcome)?;
        assert!(!board.is_dirty());
        board.take_notices();

        // Our write landed last, so its push wins.
        assert!(board.poll_remote());
        assert_eq!(board.registry().len(), 3);
        assert!(!board.is_dirty());
        assert_eq!(
            board.take_notices(),
            vec![Notice::RemoteReplaced { discarded_local: false }]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_identical_edit_is_not_a_change() -> anyhow::Result<()> {
        let mut board = controller(seeded_store(), RemoteUpdatePolicy::Replace);
        board.load().await?;
        let before = board.registry().get("2").cloned().unwrap();

        let changed = board.edit_card("2", &before.title, &before.price.to_string(), before.category)?;
        assert!(!changed);
        assert!(!board.is_dirty());
        assert_eq!(board.registry().get("2"), Some(&before));

        assert!(board.edit_card("2", "Cane sugar", &before.price.to_string(), before.category)?);
        assert!(board.is_dirty());
        Ok(())
    }

    #[tokio::test]
    async fn test_close_unsubscribes() -> anyhow::Result<()> {
        let store = seeded_store();
        let key = DocumentKey::board();
        let mut board = controller(store.clone(), RemoteUpdatePolicy::Replace);
        board.load().await?;
        assert_eq!(store.subscriber_count(&key), 1);

        board.close();
        assert!(!board.is_subscribed());
        assert_eq!(store.subscriber_count(&key), 0);
        assert!(!board.poll_remote());

        let mut other = controller(store.clone(), RemoteUpdatePolicy::Replace);
        other.load().await?;
        drop(other);
        assert_eq!(store.subscriber_count(&key), 0);
        Ok(())
    }
}
