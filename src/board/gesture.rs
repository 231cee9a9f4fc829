//! Input-agnostic drag interpreter.
//!
//! Mouse drag-and-drop and touch gestures are normalised into [`DragEvent`]s
//! before they reach this module. The interpreter tracks the card being
//! dragged, keeps at most one drop marker highlighted, and on drop resolves
//! the insertion target the reducer needs.

use super::models::{Category, Column};
use super::reducer::{InsertTarget, MoveRequest};
use super::registry::CardRegistry;

/// Vertical distance below a marker's top edge at which the pointer starts
/// selecting it.
pub const DISTANCE_OFFSET: f64 = 50.0;

/// Estimated card height used by the uniform-row layout.
pub const DEFAULT_ROW_HEIGHT: f64 = 120.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSource {
    Mouse,
    Touch,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerSample {
    pub x: f64,
    pub y: f64,
    pub source: InputSource,
}

impl PointerSample {
    pub fn mouse(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            source: InputSource::Mouse,
        }
    }

    pub fn touch(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            source: InputSource::Touch,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DragEvent {
    DragStart { card_id: String },
    DragOver { column: Column, pointer: PointerSample },
    DragLeave { column: Column },
    Drop { column: Column, pointer: PointerSample },
    DropOnTrash,
    DragCancel,
}

/// A drop position inside a column: before a card, or the trailing end slot.
#[derive(Debug, Clone, PartialEq)]
pub struct DropMarker {
    pub target: InsertTarget,
    /// Top edge in the same coordinate space as pointer samples.
    pub top: f64,
}

/// Source of drop marker positions for each column.
///
/// Markers are returned in visual order: one per visible card, followed by
/// the end marker.
pub trait DropGeometry {
    fn markers(&self, column: Column) -> Vec<DropMarker>;
}

/// Geometry for columns of equally tall rows starting at a common origin.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardLayout {
    origin_y: f64,
    row_height: f64,
    columns: [Vec<String>; 4],
}

impl BoardLayout {
    pub fn new(origin_y: f64, row_height: f64) -> Self {
        Self {
            origin_y,
            row_height,
            columns: Default::default(),
        }
    }

    /// Lay out the cards visible under the given filter.
    pub fn for_filter(
        registry: &CardRegistry,
        category: Category,
        search: &str,
        origin_y: f64,
        row_height: f64,
    ) -> Self {
        let mut layout = Self::new(origin_y, row_height);
        for column in Column::ALL {
            let ids = registry
                .filtered_view(column, category, search)
                .into_iter()
                .map(|c| c.id.clone())
                .collect();
            layout.set_column(column, ids);
        }
        layout
    }

    pub fn set_column(&mut self, column: Column, card_ids: Vec<String>) {
        self.columns[column.index()] = card_ids;
    }

    pub fn row_height(&self) -> f64 {
        self.row_height
    }
}

impl DropGeometry for BoardLayout {
    fn markers(&self, column: Column) -> Vec<DropMarker> {
        let ids = &self.columns[column.index()];
        ids.iter()
            .enumerate()
            .map(|(i, id)| DropMarker {
                target: InsertTarget::Before(id.clone()),
                top: self.origin_y + i as f64 * self.row_height,
            })
            .chain(std::iter::once(DropMarker {
                target: InsertTarget::End,
                top: self.origin_y + ids.len() as f64 * self.row_height,
            }))
            .collect()
    }
}

/// Pick the marker the pointer is over.
///
/// For each marker `offset = y - (top + distance_offset)`. The marker with
/// the negative offset closest to zero wins. With no negative offset the
/// last marker (the end slot) is returned. `None` only for an empty slice.
pub fn nearest_marker(markers: &[DropMarker], y: f64, distance_offset: f64) -> Option<&DropMarker> {
    let fallback = markers.last()?;
    let mut best = (f64::NEG_INFINITY, fallback);
    for marker in markers {
        let offset = y - (marker.top + distance_offset);
        if offset < 0.0 && offset > best.0 {
            best = (offset, marker);
        }
    }
    Some(best.1)
}

#[derive(Debug, Clone, PartialEq)]
pub enum GestureOutcome {
    /// The event needs a drag in progress and there was none.
    Idle,
    Started { card_id: String },
    /// Exactly this marker is highlighted now; any previous highlight is gone.
    Highlight { column: Column, target: InsertTarget },
    /// No marker is highlighted.
    Cleared,
    Move(MoveRequest),
    Delete { card_id: String },
    /// Dropped onto the card's own position.
    NoChange,
}

#[derive(Debug, Clone, PartialEq)]
struct ActiveHighlight {
    column: Column,
    target: InsertTarget,
}

#[derive(Debug, Clone)]
pub struct DragInterpreter {
    distance_offset: f64,
    dragging: Option<String>,
    highlight: Option<ActiveHighlight>,
}

impl Default for DragInterpreter {
    fn default() -> Self {
        Self::new(DISTANCE_OFFSET)
    }
}

impl DragInterpreter {
    pub fn new(distance_offset: f64) -> Self {
        Self {
            distance_offset,
            dragging: None,
            highlight: None,
        }
    }

    pub fn dragging(&self) -> Option<&str> {
        self.dragging.as_deref()
    }

    pub fn highlighted(&self) -> Option<(Column, &InsertTarget)> {
        self.highlight.as_ref().map(|h| (h.column, &h.target))
    }

    pub fn handle(&mut self, event: DragEvent, geometry: &dyn DropGeometry) -> GestureOutcome {
        match event {
            DragEvent::DragStart { card_id } => {
                self.highlight = None;
                self.dragging = Some(card_id.clone());
                GestureOutcome::Started { card_id }
            }
            DragEvent::DragOver { column, pointer } => {
                if self.dragging.is_none() {
                    return GestureOutcome::Idle;
                }
                let markers = geometry.markers(column);
                let target = nearest_marker(&markers, pointer.y, self.distance_offset)
                    .map(|m| m.target.clone())
                    .unwrap_or(InsertTarget::End);
                self.highlight = Some(ActiveHighlight {
                    column,
                    target: target.clone(),
                });
                GestureOutcome::Highlight { column, target }
            }
            DragEvent::DragLeave { column } => {
                if self.dragging.is_none() {
                    return GestureOutcome::Idle;
                }
                if self.highlight.as_ref().is_some_and(|h| h.column == column) {
                    self.highlight = None;
                }
                GestureOutcome::Cleared
            }
            DragEvent::Drop { column, pointer } => {
                self.highlight = None;
                let Some(card_id) = self.dragging.take() else {
                    return GestureOutcome::Idle;
                };
                let markers = geometry.markers(column);
                let target = nearest_marker(&markers, pointer.y, self.distance_offset)
                    .map(|m| m.target.clone())
                    .unwrap_or(InsertTarget::End);
                if matches!(&target, InsertTarget::Before(id) if *id == card_id) {
                    return GestureOutcome::NoChange;
                }
                GestureOutcome::Move(MoveRequest {
                    card_id,
                    column,
                    target,
                })
            }
            DragEvent::DropOnTrash => {
                self.highlight = None;
                match self.dragging.take() {
                    Some(card_id) => GestureOutcome::Delete { card_id },
                    None => GestureOutcome::Idle,
                }
            }
            DragEvent::DragCancel => {
                let was_active = self.dragging.take().is_some();
                self.highlight = None;
                if was_active {
                    GestureOutcome::Cleared
                } else {
                    GestureOutcome::Idle
                }
            }
        }
    }
}
