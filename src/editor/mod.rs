//! Pointer-driven editing of one page's bubbles.
//!
//! [`Editor`] owns the shape store, the sync layer and the single
//! [`InteractionState`]. The host forwards pointer and key events in display
//! coordinates, calls [`Editor::poll_sync`] once per frame, and renders
//! [`Editor::scene`].

mod state;

use std::collections::HashMap;
use std::sync::Arc;

use eframe::egui::{Key, Pos2, Rect};
use image::RgbaImage;

pub use state::{InteractionState, Tool};

use crate::backend::ShapeBackend;
use crate::error::{ApiError, ExportError, GeometryError, StoreError};
use crate::fonts::FontCatalog;
use crate::geometry::{
    hit_test_vertex, point_in_polygon, square_outline, translate, Point, Viewport,
};
use crate::model::{BubbleText, DraftShape, NewShape, PageRef, Shape, ShapeId, TextUpdate};
use crate::render::{export_composite, ExportComposite, Scene};
use crate::store::{Applied, ShapeStore, StoreMutation};
use crate::sync::{Dispatch, SyncLayer, SyncOutcome};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EditorSettings {
    /// Vertex grab radius in screen pixels.
    pub hit_radius_px: f32,
    /// Half the side of a new draft square, in native pixels.
    pub draft_half_extent: f32,
    pub text_padding: f32,
    pub default_font_size: f32,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            hit_radius_px: 8.0,
            draft_half_extent: 40.0,
            text_padding: 4.0,
            default_font_size: crate::model::DEFAULT_FONT_SIZE,
        }
    }
}

/// One frame of pointer input, in display coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PointerFrame {
    pub pos: Option<Pos2>,
    /// Pointer is over the canvas.
    pub hovered: bool,
    pub pressed: bool,
    pub released: bool,
    pub double_clicked: bool,
    pub secondary_clicked: bool,
}

/// Persistence milestones, drained by the host each frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EditorEvent {
    GeometryCommitted { id: u64 },
    ShapeCreated { id: u64, sequence_number: u32 },
    ShapeDeleted { id: u64 },
    TextSaved { id: u64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub id: u64,
    pub level: NotificationLevel,
    pub message: String,
}

#[derive(Debug, Default)]
struct PendingCreate {
    /// Removed locally before the backend answered.
    deleted: bool,
}

pub struct Editor {
    store: ShapeStore,
    sync: SyncLayer,
    viewport: Viewport,
    settings: EditorSettings,
    tool: Tool,
    state: InteractionState,
    selected: Option<ShapeId>,
    draft: Option<DraftShape>,
    hover: Option<Point>,
    pending_creates: HashMap<ShapeId, PendingCreate>,
    // last outline the backend is known to hold, while a write is outstanding
    confirmed_outlines: HashMap<u64, Vec<Point>>,
    // last text the backend is known to hold, while a write is outstanding
    confirmed_texts: HashMap<u64, BubbleText>,
    pending_deletes: HashMap<u64, (usize, Shape)>,
    delete_request: Option<ShapeId>,
    events: Vec<EditorEvent>,
    notifications: Vec<Notification>,
    next_local_id: u64,
    next_notification_id: u64,
}

impl Editor {
    pub fn new(
        backend: Arc<dyn ShapeBackend>,
        page: PageRef,
        settings: EditorSettings,
        dispatch: Dispatch,
    ) -> Self {
        Self::with_sync(SyncLayer::new(backend, page, dispatch), settings)
    }

    pub fn with_sync(sync: SyncLayer, settings: EditorSettings) -> Self {
        Self {
            store: ShapeStore::new(),
            sync,
            viewport: Viewport::default(),
            settings,
            tool: Tool::default(),
            state: InteractionState::Idle,
            selected: None,
            draft: None,
            hover: None,
            pending_creates: HashMap::new(),
            confirmed_outlines: HashMap::new(),
            confirmed_texts: HashMap::new(),
            pending_deletes: HashMap::new(),
            delete_request: None,
            events: Vec::new(),
            notifications: Vec::new(),
            next_local_id: 1,
            next_notification_id: 1,
        }
    }

    /// Replaces the page contents and drops any interaction in progress.
    pub fn reset_shapes(&mut self, shapes: Vec<Shape>) {
        tracing::debug!(count = shapes.len(), page = %self.sync.page(), "loading shapes");
        if let Err(e) = self.store.apply(StoreMutation::Reset(shapes)) {
            self.notify_error(format!("Could not load bubbles: {e}"));
        }
        self.state = InteractionState::Idle;
        self.selected = None;
        self.draft = None;
    }

    pub fn shapes(&self) -> &[Shape] {
        self.store.shapes()
    }

    pub fn shape(&self, id: ShapeId) -> Option<&Shape> {
        self.store.get(id)
    }

    pub fn revision(&self) -> u64 {
        self.store.revision()
    }

    pub fn page(&self) -> &PageRef {
        self.sync.page()
    }

    pub fn settings(&self) -> &EditorSettings {
        &self.settings
    }

    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    pub fn selected(&self) -> Option<ShapeId> {
        self.selected
    }

    pub fn draft(&self) -> Option<&DraftShape> {
        self.draft.as_ref()
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn set_tool(&mut self, tool: Tool) {
        if tool == self.tool {
            return;
        }
        if matches!(self.state, InteractionState::DrawingPolygon { .. }) {
            tracing::debug!("tool switched, dropping polygon in progress");
            self.state = InteractionState::Idle;
        }
        self.tool = tool;
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    /// True while backend calls are outstanding.
    pub fn is_syncing(&self) -> bool {
        !self.sync.is_idle()
    }

    pub fn pointer_pressed(&mut self, pos: Pos2) {
        let native = self.viewport.to_native(pos);
        if let InteractionState::DrawingPolygon { points } = &mut self.state {
            points.push(native);
            tracing::debug!(points = points.len(), "polygon point added");
            return;
        }
        if self.state.is_gesture() {
            return;
        }

        if let Some(draft) = &self.draft {
            let snapshot = draft.outline().to_vec();
            let next = match self.vertex_at(native, &snapshot) {
                Some(vertex) => Some(InteractionState::ResizingDraftVertex {
                    vertex,
                    start: pos,
                    snapshot,
                }),
                None if point_in_polygon(native, &snapshot) => {
                    Some(InteractionState::DraggingDraft {
                        start: pos,
                        snapshot,
                    })
                }
                None => None,
            };
            if let Some(next) = next {
                self.begin(next);
                return;
            }
        }

        // an open editor keeps the rest of the canvas inert
        if self.state.is_editing() {
            return;
        }

        if let Some(shape) = self.selected.and_then(|id| self.store.get(id)) {
            if let Some(vertex) = self.vertex_at(native, shape.outline()) {
                let next = InteractionState::DraggingVertex {
                    id: shape.id,
                    vertex,
                    start: pos,
                    snapshot: shape.outline().to_vec(),
                };
                self.begin(next);
                return;
            }
        }

        if let Some(id) = self.store.hit_test(native) {
            if let Some(shape) = self.store.get(id) {
                let next = InteractionState::DraggingShape {
                    id,
                    start: pos,
                    snapshot: shape.outline().to_vec(),
                };
                self.selected = Some(id);
                self.begin(next);
            }
            return;
        }

        self.selected = None;
        if self.tool == Tool::Polygon {
            self.begin(InteractionState::DrawingPolygon {
                points: vec![native],
            });
        }
    }

    /// Forwards a frame's pointer input. A press and its release can land in
    /// the same frame, so the release check sees the state the press left.
    pub fn pointer_frame(&mut self, input: PointerFrame) {
        let Some(pos) = input.pos else {
            return;
        };
        if input.hovered || self.state.is_gesture() {
            self.pointer_moved(pos);
        } else {
            self.pointer_left();
        }
        if input.pressed && input.hovered {
            self.pointer_pressed(pos);
        }
        if input.released && self.state.is_gesture() {
            self.pointer_released(pos);
        }
        if input.double_clicked {
            self.double_clicked(pos);
        }
        if input.secondary_clicked {
            // a rejected polygon is already reported as a notification
            let _ = self.secondary_clicked(pos);
        }
    }

    pub fn pointer_moved(&mut self, pos: Pos2) {
        self.hover = Some(self.viewport.to_native(pos));
        self.track_gesture(pos);
    }

    pub fn pointer_released(&mut self, pos: Pos2) {
        self.track_gesture(pos);
        match std::mem::take(&mut self.state) {
            InteractionState::DraggingShape { id, snapshot, .. }
            | InteractionState::DraggingVertex { id, snapshot, .. } => {
                self.finish_geometry(id, snapshot);
            }
            InteractionState::DraggingDraft { .. }
            | InteractionState::ResizingDraftVertex { .. } => {
                self.state = InteractionState::EditingDraftText;
            }
            other => self.state = other,
        }
    }

    pub fn pointer_left(&mut self) {
        self.hover = None;
    }

    pub fn double_clicked(&mut self, pos: Pos2) {
        if self.state != InteractionState::Idle {
            return;
        }
        let native = self.viewport.to_native(pos);
        if let Some(id) = self.store.hit_test(native) {
            if let Some(shape) = self.store.get(id) {
                let text = shape.text.clone();
                self.selected = None;
                self.begin(InteractionState::EditingShapeText {
                    id,
                    buffer: text.clone(),
                    original: text,
                });
            }
            return;
        }
        if self.tool != Tool::Select {
            return;
        }
        if self.draft.is_none() {
            let outline = square_outline(native, self.settings.draft_half_extent);
            let text = BubbleText {
                font_size: Some(self.settings.default_font_size),
                ..Default::default()
            };
            match DraftShape::new(outline, text) {
                Ok(draft) => self.draft = Some(draft),
                Err(e) => {
                    self.notify_error(format!("Could not start a bubble: {e}"));
                    return;
                }
            }
        }
        self.selected = None;
        self.begin(InteractionState::EditingDraftText);
    }

    /// Right-click closes the polygon in progress.
    pub fn secondary_clicked(&mut self, _pos: Pos2) -> Result<(), GeometryError> {
        let InteractionState::DrawingPolygon { points } = &self.state else {
            return Ok(());
        };
        if points.len() < 3 {
            let err = GeometryError::TooFewPoints(points.len());
            self.notify_error(err.to_string());
            return Err(err);
        }
        let InteractionState::DrawingPolygon { points } = std::mem::take(&mut self.state) else {
            return Ok(());
        };
        let text = BubbleText {
            font_size: Some(self.settings.default_font_size),
            ..Default::default()
        };
        self.commit_new_shape(points, text).map(|_| ())
    }

    pub fn key_pressed(&mut self, key: Key) {
        match key {
            Key::Escape => self.cancel(),
            Key::Delete => {
                if self.state == InteractionState::Idle {
                    if let Some(id) = self.selected {
                        self.request_delete(id);
                    }
                }
            }
            Key::Backspace => {
                if let InteractionState::DrawingPolygon { points } = &mut self.state {
                    points.pop();
                    if points.is_empty() {
                        self.state = InteractionState::Idle;
                    }
                }
            }
            _ => {}
        }
    }

    /// Abandons whatever is in progress, restoring pre-gesture geometry.
    pub fn cancel(&mut self) {
        match std::mem::take(&mut self.state) {
            InteractionState::Idle => self.selected = None,
            InteractionState::DrawingPolygon { .. } => {
                tracing::debug!("polygon discarded");
            }
            InteractionState::DraggingShape { id, snapshot, .. }
            | InteractionState::DraggingVertex { id, snapshot, .. } => {
                self.set_outline(id, snapshot);
            }
            InteractionState::DraggingDraft { snapshot, .. }
            | InteractionState::ResizingDraftVertex { snapshot, .. } => {
                if let Some(draft) = &mut self.draft {
                    let _ = draft.set_outline(snapshot);
                }
                self.state = InteractionState::EditingDraftText;
            }
            InteractionState::EditingShapeText { .. } => {}
            InteractionState::EditingDraftText => {
                self.draft = None;
            }
        }
    }

    /// The text being edited, shape buffer or draft.
    pub fn edit_buffer_mut(&mut self) -> Option<&mut BubbleText> {
        match &mut self.state {
            InteractionState::EditingShapeText { buffer, .. } => Some(buffer),
            InteractionState::EditingDraftText => self.draft.as_mut().map(|d| &mut d.text),
            _ => None,
        }
    }

    /// Display rectangle of whatever the open editor belongs to.
    pub fn editor_anchor(&self) -> Option<Rect> {
        let bounds = match &self.state {
            InteractionState::EditingShapeText { id, .. } => self.store.get(*id)?.bounding_box(),
            InteractionState::EditingDraftText => self.draft.as_ref()?.bounding_box(),
            _ => return None,
        };
        Some(self.viewport.rect_to_display(bounds))
    }

    pub fn save_text(&mut self) {
        match std::mem::take(&mut self.state) {
            InteractionState::EditingShapeText {
                id,
                buffer,
                original,
            } => {
                if buffer == original {
                    return;
                }
                let update = TextUpdate::from(&buffer);
                if let Err(e) = self.store.apply(StoreMutation::SetText { id, text: buffer }) {
                    self.notify_error(format!("Could not save text: {e}"));
                    return;
                }
                // local shapes send their text with the create
                if let Some(remote) = id.remote() {
                    self.confirmed_texts.entry(remote).or_insert(original);
                    self.sync.update_text(remote, update);
                }
            }
            InteractionState::EditingDraftText => {
                let Some(draft) = self.draft.take() else {
                    return;
                };
                if draft.text.translated_text.trim().is_empty() {
                    tracing::debug!("empty draft closed without saving");
                    return;
                }
                let (outline, text) = draft.into_parts();
                if let Err(e) = self.commit_new_shape(outline, text) {
                    tracing::warn!("draft rejected: {}", e);
                }
            }
            other => self.state = other,
        }
    }

    pub fn cancel_text(&mut self) {
        if self.state.is_editing() {
            self.cancel();
        }
    }

    pub fn request_delete(&mut self, id: ShapeId) {
        if self.store.contains(id) {
            self.delete_request = Some(id);
        }
    }

    /// Shape awaiting the host's delete confirmation.
    pub fn pending_delete_confirmation(&self) -> Option<ShapeId> {
        self.delete_request
    }

    pub fn confirm_delete(&mut self) {
        if let Some(id) = self.delete_request.take() {
            if let Err(e) = self.delete_shape(id) {
                self.notify_error(format!("Could not delete bubble: {e}"));
            }
        }
    }

    pub fn cancel_delete(&mut self) {
        self.delete_request = None;
    }

    /// Removes a shape immediately and persists the deletion.
    pub fn delete_shape(&mut self, id: ShapeId) -> Result<(), StoreError> {
        let Applied::Removed { index, shape } = self.store.apply(StoreMutation::Remove(id))? else {
            return Ok(());
        };
        if self.selected == Some(id) {
            self.selected = None;
        }
        if self.state.dragged_shape() == Some(id) || self.state.editing_shape() == Some(id) {
            self.state = InteractionState::Idle;
        }
        match id {
            ShapeId::Persisted(remote) => {
                tracing::debug!(id = remote, "deleting bubble");
                self.confirmed_outlines.remove(&remote);
                self.confirmed_texts.remove(&remote);
                self.pending_deletes.insert(remote, (index, shape));
                self.sync.delete(remote);
            }
            ShapeId::Local(_) => {
                if let Some(pending) = self.pending_creates.get_mut(&id) {
                    pending.deleted = true;
                }
            }
        }
        Ok(())
    }

    /// Applies finished backend calls. Returns true if anything changed.
    pub fn poll_sync(&mut self) -> bool {
        let outcomes = self.sync.poll();
        let changed = !outcomes.is_empty();
        for outcome in outcomes {
            match outcome {
                SyncOutcome::Created {
                    local_id,
                    sent,
                    result,
                } => self.on_created(local_id, sent, result),
                SyncOutcome::GeometryUpdated {
                    id,
                    outline,
                    superseded,
                    result,
                } => self.on_geometry_updated(id, outline, superseded, result),
                SyncOutcome::TextUpdated {
                    id,
                    update,
                    superseded,
                    result,
                } => self.on_text_updated(id, update, superseded, result),
                SyncOutcome::Deleted { id, result } => match result {
                    Ok(()) => {
                        self.pending_deletes.remove(&id);
                        tracing::info!(id, "bubble deleted");
                        self.events.push(EditorEvent::ShapeDeleted { id });
                    }
                    Err(e) => {
                        self.notify_error(format!("Could not delete bubble #{id}: {e}"));
                        if let Some((index, shape)) = self.pending_deletes.remove(&id) {
                            let restored = self.store.apply(StoreMutation::Insert {
                                index: Some(index),
                                shape,
                            });
                            if let Err(e) = restored {
                                tracing::warn!(id, "could not restore deleted bubble: {}", e);
                            }
                        }
                    }
                },
            }
        }
        changed
    }

    pub fn drain_events(&mut self) -> Vec<EditorEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn dismiss_notification(&mut self, id: u64) {
        self.notifications.retain(|n| n.id != id);
    }

    pub fn notify(&mut self, level: NotificationLevel, message: impl Into<String>) {
        let message = message.into();
        if level == NotificationLevel::Error {
            tracing::warn!("{}", message);
        }
        self.notifications.push(Notification {
            id: self.next_notification_id,
            level,
            message,
        });
        self.next_notification_id += 1;
    }

    /// Everything the next frame shows.
    pub fn scene(&self) -> Scene<'_> {
        let polygon = self.state.polygon_points();
        Scene {
            shapes: self.store.shapes(),
            selected: self.selected,
            editing: self.state.editing_shape(),
            dragging: self.state.dragged_shape(),
            draft: self.draft.as_ref(),
            polygon,
            hover: if polygon.is_empty() { None } else { self.hover },
        }
    }

    pub fn export_composite(
        &self,
        page: Option<&RgbaImage>,
        fonts: &FontCatalog,
    ) -> Result<ExportComposite, ExportError> {
        let page = page.ok_or(ExportError::NoImage)?;
        Ok(export_composite(
            page,
            self.store.shapes(),
            fonts,
            self.settings.text_padding,
        ))
    }

    fn begin(&mut self, next: InteractionState) {
        tracing::debug!(from = self.state.name(), to = next.name(), "interaction");
        self.state = next;
    }

    fn vertex_at(&self, native: Point, outline: &[Point]) -> Option<usize> {
        hit_test_vertex(
            native,
            outline,
            self.viewport.scale(),
            self.settings.hit_radius_px,
        )
    }

    /// Re-derives the dragged geometry from the gesture snapshot.
    fn track_gesture(&mut self, pos: Pos2) {
        let native_delta =
            |start: Pos2| self.viewport.to_native(pos) - self.viewport.to_native(start);
        match &self.state {
            InteractionState::DraggingShape {
                id,
                start,
                snapshot,
            } => {
                let outline = translate(snapshot, native_delta(*start));
                let id = *id;
                self.set_outline(id, outline);
            }
            InteractionState::DraggingVertex {
                id,
                vertex,
                start,
                snapshot,
            } => {
                let mut outline = snapshot.clone();
                if let Some(p) = outline.get_mut(*vertex) {
                    *p += native_delta(*start);
                }
                let id = *id;
                self.set_outline(id, outline);
            }
            InteractionState::DraggingDraft { start, snapshot } => {
                let outline = translate(snapshot, native_delta(*start));
                self.set_draft_outline(outline);
            }
            InteractionState::ResizingDraftVertex {
                vertex,
                start,
                snapshot,
            } => {
                let mut outline = snapshot.clone();
                if let Some(p) = outline.get_mut(*vertex) {
                    *p += native_delta(*start);
                }
                self.set_draft_outline(outline);
            }
            _ => {}
        }
    }

    fn set_outline(&mut self, id: ShapeId, outline: Vec<Point>) {
        if let Err(e) = self.store.apply(StoreMutation::SetOutline { id, outline }) {
            tracing::warn!(%id, "outline update rejected: {}", e);
        }
    }

    fn set_draft_outline(&mut self, outline: Vec<Point>) {
        if let Some(draft) = &mut self.draft {
            if let Err(e) = draft.set_outline(outline) {
                tracing::warn!("draft outline rejected: {}", e);
            }
        }
    }

    fn finish_geometry(&mut self, id: ShapeId, snapshot: Vec<Point>) {
        let Some(shape) = self.store.get(id) else {
            return;
        };
        if shape.outline() == snapshot.as_slice() {
            return;
        }
        let Some(remote) = id.remote() else {
            tracing::debug!(%id, "geometry will follow the pending create");
            return;
        };
        let (outline, bounding_box) = (shape.outline().to_vec(), shape.bounding_box());
        self.confirmed_outlines.entry(remote).or_insert(snapshot);
        self.sync.update_geometry(remote, outline, bounding_box);
    }

    fn commit_new_shape(
        &mut self,
        outline: Vec<Point>,
        text: BubbleText,
    ) -> Result<ShapeId, GeometryError> {
        let local_id = ShapeId::Local(self.next_local_id);
        let sequence_number = self.next_sequence_number();
        let shape = Shape::new(local_id, sequence_number, outline, text)?;
        let new_shape = NewShape::from_shape(&shape);
        if let Err(e) = self.store.apply(StoreMutation::Insert { index: None, shape }) {
            self.notify_error(format!("Could not add bubble: {e}"));
            return Ok(local_id);
        }
        self.next_local_id += 1;
        self.pending_creates.insert(local_id, PendingCreate::default());
        tracing::debug!(%local_id, sequence_number, "creating bubble");
        self.sync.create(local_id, new_shape);
        Ok(local_id)
    }

    fn on_created(&mut self, local_id: ShapeId, sent: NewShape, result: Result<Shape, ApiError>) {
        let Some(pending) = self.pending_creates.remove(&local_id) else {
            tracing::warn!(%local_id, "result for an unknown create ignored");
            return;
        };
        match result {
            Ok(created) => {
                let Some(remote) = created.id.remote() else {
                    self.notify_error("Backend returned a bubble without an id".to_string());
                    return;
                };
                if pending.deleted {
                    tracing::debug!(id = remote, "bubble deleted before its create finished");
                    self.sync.delete(remote);
                    return;
                }
                if !self.rekey(local_id, created.id, created.sequence_number) {
                    return;
                }
                tracing::info!(
                    id = remote,
                    sequence_number = created.sequence_number,
                    "bubble created"
                );
                self.events.push(EditorEvent::ShapeCreated {
                    id: remote,
                    sequence_number: created.sequence_number,
                });

                // edits made while the create was in flight
                let Some(current) = self.store.get(created.id) else {
                    return;
                };
                if current.outline() != sent.outline.as_slice() {
                    let (outline, bounding_box) =
                        (current.outline().to_vec(), current.bounding_box());
                    self.confirmed_outlines
                        .entry(remote)
                        .or_insert_with(|| created.outline().to_vec());
                    self.sync.update_geometry(remote, outline, bounding_box);
                }
                if current.text != sent.text {
                    let update = TextUpdate::from(&current.text);
                    self.confirmed_texts.entry(remote).or_insert(sent.text);
                    self.sync.update_text(remote, update);
                }
            }
            Err(e) => {
                self.notify_error(format!("Could not create bubble: {e}"));
                if pending.deleted {
                    return;
                }
                let removed = self.store.apply(StoreMutation::Remove(local_id));
                let Ok(Applied::Removed { shape, .. }) = removed else {
                    return;
                };
                if self.selected == Some(local_id) {
                    self.selected = None;
                }
                if self.state.dragged_shape() == Some(local_id)
                    || self.state.editing_shape() == Some(local_id)
                {
                    self.state = InteractionState::Idle;
                }
                if self.draft.is_some() {
                    tracing::warn!(%local_id, "draft slot taken, failed bubble discarded");
                    return;
                }
                self.draft = Some(DraftShape::from(shape));
                if self.state == InteractionState::Idle {
                    self.begin(InteractionState::EditingDraftText);
                }
            }
        }
    }

    fn on_geometry_updated(
        &mut self,
        id: u64,
        outline: Vec<Point>,
        superseded: bool,
        result: Result<(), ApiError>,
    ) {
        match result {
            Ok(()) => {
                if superseded {
                    self.confirmed_outlines.insert(id, outline);
                } else {
                    self.confirmed_outlines.remove(&id);
                }
                tracing::info!(id, "bubble geometry saved");
                self.events.push(EditorEvent::GeometryCommitted { id });
            }
            // a newer write is already on its way
            Err(e) if superseded => {
                tracing::warn!(id, "superseded geometry write failed: {}", e);
            }
            Err(e) => {
                self.notify_error(format!("Could not save bubble #{id}: {e}"));
                let Some(previous) = self.confirmed_outlines.remove(&id) else {
                    return;
                };
                let shape_id = ShapeId::Persisted(id);
                if self.state.dragged_shape() == Some(shape_id) {
                    self.state = InteractionState::Idle;
                }
                if self.store.contains(shape_id) {
                    self.set_outline(shape_id, previous);
                }
            }
        }
    }

    fn on_text_updated(
        &mut self,
        id: u64,
        update: TextUpdate,
        superseded: bool,
        result: Result<(), ApiError>,
    ) {
        match result {
            Ok(()) => {
                if superseded {
                    if let Some(confirmed) = self.confirmed_texts.get_mut(&id) {
                        update.apply_to(confirmed);
                    }
                } else {
                    self.confirmed_texts.remove(&id);
                }
                tracing::info!(id, "bubble text saved");
                self.events.push(EditorEvent::TextSaved { id });
            }
            Err(e) if superseded => {
                tracing::warn!(id, "superseded text write failed: {}", e);
            }
            Err(e) => {
                self.notify_error(format!("Could not save text of #{id}: {e}"));
                let Some(previous) = self.confirmed_texts.remove(&id) else {
                    return;
                };
                let restored = self.store.apply(StoreMutation::SetText {
                    id: ShapeId::Persisted(id),
                    text: previous,
                });
                if let Err(e) = restored {
                    tracing::warn!(id, "could not restore bubble text: {}", e);
                }
            }
        }
    }

    /// Next free sequence number. Bubbles awaiting a delete keep theirs in
    /// case the delete fails and they come back.
    fn next_sequence_number(&self) -> u32 {
        let reserved = self
            .pending_deletes
            .values()
            .map(|(_, shape)| shape.sequence_number + 1)
            .max()
            .unwrap_or(1);
        self.store.next_sequence_number().max(reserved)
    }

    /// Swaps a local id for the persisted one. False if the store refused.
    fn rekey(&mut self, from: ShapeId, to: ShapeId, sequence_number: u32) -> bool {
        let mut rekeyed = self.store.apply(StoreMutation::Rekey {
            from,
            to,
            sequence_number,
        });
        if let Err(StoreError::DuplicateSequence(_)) = rekeyed {
            // keep the local label rather than show two bubbles with one number
            if let Some(seq) = self.store.get(from).map(|s| s.sequence_number) {
                tracing::warn!(
                    %to,
                    sequence_number,
                    "sequence number taken locally, keeping {}",
                    seq
                );
                rekeyed = self.store.apply(StoreMutation::Rekey {
                    from,
                    to,
                    sequence_number: seq,
                });
            }
        }
        if let Err(e) = rekeyed {
            self.notify_error(format!("Bubble {to} was saved but is not linked locally: {e}"));
            return false;
        }
        if self.selected == Some(from) {
            self.selected = Some(to);
        }
        if self.delete_request == Some(from) {
            self.delete_request = Some(to);
        }
        self.state.rekey(from, to);
        true
    }

    fn notify_error(&mut self, message: String) {
        self.notify(NotificationLevel::Error, message);
    }
}

#[cfg(test)]
mod tests;
