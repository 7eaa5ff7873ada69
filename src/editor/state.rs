use eframe::egui::Pos2;

use crate::geometry::Point;
use crate::model::{BubbleText, ShapeId};

/// What a press on empty canvas does.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Tool {
    #[default]
    Select,
    Polygon,
}

/// The one active interaction. Gesture variants carry the pointer's display
/// position at press time and the geometry as it was then; every move is
/// applied to that snapshot, never accumulated.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum InteractionState {
    #[default]
    Idle,
    DrawingPolygon {
        points: Vec<Point>,
    },
    DraggingShape {
        id: ShapeId,
        start: Pos2,
        snapshot: Vec<Point>,
    },
    DraggingVertex {
        id: ShapeId,
        vertex: usize,
        start: Pos2,
        snapshot: Vec<Point>,
    },
    DraggingDraft {
        start: Pos2,
        snapshot: Vec<Point>,
    },
    ResizingDraftVertex {
        vertex: usize,
        start: Pos2,
        snapshot: Vec<Point>,
    },
    EditingShapeText {
        id: ShapeId,
        buffer: BubbleText,
        original: BubbleText,
    },
    EditingDraftText,
}

impl InteractionState {
    pub fn name(&self) -> &'static str {
        match self {
            InteractionState::Idle => "idle",
            InteractionState::DrawingPolygon { .. } => "drawing-polygon",
            InteractionState::DraggingShape { .. } => "dragging-shape",
            InteractionState::DraggingVertex { .. } => "dragging-vertex",
            InteractionState::DraggingDraft { .. } => "dragging-draft",
            InteractionState::ResizingDraftVertex { .. } => "resizing-draft-vertex",
            InteractionState::EditingShapeText { .. } => "editing-shape-text",
            InteractionState::EditingDraftText => "editing-draft-text",
        }
    }

    /// Shape whose geometry the current gesture is changing.
    pub fn dragged_shape(&self) -> Option<ShapeId> {
        match self {
            InteractionState::DraggingShape { id, .. }
            | InteractionState::DraggingVertex { id, .. } => Some(*id),
            _ => None,
        }
    }

    pub fn editing_shape(&self) -> Option<ShapeId> {
        match self {
            InteractionState::EditingShapeText { id, .. } => Some(*id),
            _ => None,
        }
    }

    pub fn polygon_points(&self) -> &[Point] {
        match self {
            InteractionState::DrawingPolygon { points } => points,
            _ => &[],
        }
    }

    pub fn is_editing(&self) -> bool {
        matches!(
            self,
            InteractionState::EditingShapeText { .. } | InteractionState::EditingDraftText
        )
    }

    pub fn is_gesture(&self) -> bool {
        matches!(
            self,
            InteractionState::DraggingShape { .. }
                | InteractionState::DraggingVertex { .. }
                | InteractionState::DraggingDraft { .. }
                | InteractionState::ResizingDraftVertex { .. }
        )
    }

    /// Points a rekeyed shape's references at its new id.
    pub(crate) fn rekey(&mut self, from: ShapeId, to: ShapeId) {
        match self {
            InteractionState::DraggingShape { id, .. }
            | InteractionState::DraggingVertex { id, .. }
            | InteractionState::EditingShapeText { id, .. }
                if *id == from =>
            {
                *id = to;
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eframe::egui::pos2;

    #[test]
    fn test_rekey_only_touches_matching_id() {
        let mut state = InteractionState::DraggingShape {
            id: ShapeId::Local(1),
            start: pos2(0.0, 0.0),
            snapshot: Vec::new(),
        };
        state.rekey(ShapeId::Local(2), ShapeId::Persisted(5));
        assert_eq!(state.dragged_shape(), Some(ShapeId::Local(1)));
        state.rekey(ShapeId::Local(1), ShapeId::Persisted(5));
        assert_eq!(state.dragged_shape(), Some(ShapeId::Persisted(5)));
    }

    #[test]
    fn test_polygon_points_outside_drawing() {
        assert!(InteractionState::Idle.polygon_points().is_empty());
        assert!(InteractionState::EditingDraftText.is_editing());
        assert!(!InteractionState::EditingDraftText.is_gesture());
    }
}
