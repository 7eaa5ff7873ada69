//! In-process backend for offline sessions and tests.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::ShapeBackend;
use crate::error::ApiError;
use crate::fonts::FontInfo;
use crate::geometry::{BoundingBox, Point};
use crate::model::{NewShape, PageRef, Shape, ShapeId, TextUpdate};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    UpdateGeometry,
    UpdateText,
    Delete,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub list_shapes: usize,
    pub create: usize,
    pub update_geometry: usize,
    pub update_text: usize,
    pub delete: usize,
    pub list_fonts: usize,
    pub fetch_font: usize,
}

#[derive(Default)]
struct MemoryState {
    pages: HashMap<PageRef, Vec<Shape>>,
    fonts: Vec<FontInfo>,
    font_bytes: HashMap<String, Vec<u8>>,
    next_id: u64,
    calls: CallCounts,
    failures: HashMap<Operation, usize>,
    geometry_writes: Vec<(u64, Vec<Point>)>,
}

impl MemoryState {
    fn take_failure(&mut self, op: Operation) -> Result<(), ApiError> {
        match self.failures.get_mut(&op) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(ApiError::Rejected(format!("{op:?} failed (injected)")))
            }
            _ => Ok(()),
        }
    }

    fn find_mut(&mut self, id: u64) -> Result<&mut Shape, ApiError> {
        self.pages
            .values_mut()
            .flat_map(|shapes| shapes.iter_mut())
            .find(|s| s.id == ShapeId::Persisted(id))
            .ok_or(ApiError::NotFound(ShapeId::Persisted(id)))
    }
}

#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a page. Shapes keep their ids; local ids are replaced.
    pub fn with_page(self, page: PageRef, shapes: Vec<Shape>) -> Self {
        {
            let mut state = self.lock();
            let mut seeded = Vec::with_capacity(shapes.len());
            for mut shape in shapes {
                match shape.id {
                    ShapeId::Persisted(id) => state.next_id = state.next_id.max(id),
                    ShapeId::Local(_) => {
                        state.next_id += 1;
                        shape.id = ShapeId::Persisted(state.next_id);
                    }
                }
                seeded.push(shape);
            }
            state.pages.insert(page, seeded);
        }
        self
    }

    pub fn with_fonts(self, fonts: Vec<FontInfo>) -> Self {
        self.lock().fonts = fonts;
        self
    }

    pub fn with_font_bytes(self, id: &str, bytes: Vec<u8>) -> Self {
        self.lock().font_bytes.insert(id.to_string(), bytes);
        self
    }

    /// Makes the next call of `op` fail.
    pub fn fail_next(&self, op: Operation) {
        *self.lock().failures.entry(op).or_default() += 1;
    }

    pub fn calls(&self) -> CallCounts {
        self.lock().calls
    }

    pub fn shapes(&self, page: &PageRef) -> Vec<Shape> {
        self.lock().pages.get(page).cloned().unwrap_or_default()
    }

    /// Every accepted geometry update, in arrival order.
    pub fn geometry_writes(&self) -> Vec<(u64, Vec<Point>)> {
        self.lock().geometry_writes.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ShapeBackend for MemoryBackend {
    fn list_shapes(&self, page: &PageRef) -> Result<Vec<Shape>, ApiError> {
        let mut state = self.lock();
        state.calls.list_shapes += 1;
        Ok(state.pages.get(page).cloned().unwrap_or_default())
    }

    fn create_shape(&self, page: &PageRef, shape: &NewShape) -> Result<Shape, ApiError> {
        let mut state = self.lock();
        state.calls.create += 1;
        state.take_failure(Operation::Create)?;

        state.next_id += 1;
        let id = state.next_id;
        let shapes = state.pages.entry(page.clone()).or_default();
        let taken = shapes
            .iter()
            .any(|s| s.sequence_number == shape.sequence_number);
        let sequence_number = if shape.sequence_number == 0 || taken {
            shapes.iter().map(|s| s.sequence_number).max().unwrap_or(0) + 1
        } else {
            shape.sequence_number
        };
        let created = Shape::new(
            ShapeId::Persisted(id),
            sequence_number,
            shape.outline.clone(),
            shape.text.clone(),
        )
        .map_err(|e| ApiError::Rejected(e.to_string()))?;
        shapes.push(created.clone());
        Ok(created)
    }

    fn update_shape_geometry(
        &self,
        id: u64,
        outline: &[Point],
        _bounding_box: BoundingBox,
    ) -> Result<(), ApiError> {
        let mut state = self.lock();
        state.calls.update_geometry += 1;
        state.take_failure(Operation::UpdateGeometry)?;
        state
            .find_mut(id)?
            .set_outline(outline.to_vec())
            .map_err(|e| ApiError::Rejected(e.to_string()))?;
        state.geometry_writes.push((id, outline.to_vec()));
        Ok(())
    }

    fn update_shape_text(&self, id: u64, update: &TextUpdate) -> Result<(), ApiError> {
        let mut state = self.lock();
        state.calls.update_text += 1;
        state.take_failure(Operation::UpdateText)?;
        let shape = state.find_mut(id)?;
        update.apply_to(&mut shape.text);
        Ok(())
    }

    fn delete_shape(&self, id: u64) -> Result<(), ApiError> {
        let mut state = self.lock();
        state.calls.delete += 1;
        state.take_failure(Operation::Delete)?;
        for shapes in state.pages.values_mut() {
            if let Some(index) = shapes.iter().position(|s| s.id == ShapeId::Persisted(id)) {
                shapes.remove(index);
                return Ok(());
            }
        }
        Err(ApiError::NotFound(ShapeId::Persisted(id)))
    }

    fn list_fonts(&self) -> Result<Vec<FontInfo>, ApiError> {
        let mut state = self.lock();
        state.calls.list_fonts += 1;
        Ok(state.fonts.clone())
    }

    fn fetch_font(&self, font: &FontInfo) -> Result<Vec<u8>, ApiError> {
        let mut state = self.lock();
        state.calls.fetch_font += 1;
        state
            .font_bytes
            .get(&font.id)
            .cloned()
            .ok_or_else(|| ApiError::Transport(format!("no bytes for font {}", font.id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BubbleText;
    use eframe::egui::pos2;

    fn page() -> PageRef {
        PageRef("p1".into())
    }

    fn new_shape(seq: u32) -> NewShape {
        let outline = vec![pos2(0.0, 0.0), pos2(4.0, 0.0), pos2(4.0, 4.0)];
        NewShape {
            sequence_number: seq,
            bounding_box: crate::geometry::bounding_box_of(&outline).unwrap(),
            outline,
            text: BubbleText::default(),
        }
    }

    #[test]
    fn test_create_assigns_ids_and_resolves_sequence_clash() {
        let backend = MemoryBackend::new();
        let a = backend.create_shape(&page(), &new_shape(1)).unwrap();
        let b = backend.create_shape(&page(), &new_shape(1)).unwrap();
        assert_eq!(a.id, ShapeId::Persisted(1));
        assert_eq!(b.id, ShapeId::Persisted(2));
        assert_eq!(b.sequence_number, 2);
        assert_eq!(backend.shapes(&page()).len(), 2);
    }

    #[test]
    fn test_injected_failure_is_one_shot() {
        let backend = MemoryBackend::new();
        backend.fail_next(Operation::Create);
        assert!(backend.create_shape(&page(), &new_shape(1)).is_err());
        assert!(backend.create_shape(&page(), &new_shape(1)).is_ok());
        assert_eq!(backend.calls().create, 2);
    }

    #[test]
    fn test_update_and_delete_unknown_shape() {
        let backend = MemoryBackend::new();
        assert!(matches!(backend.delete_shape(5), Err(ApiError::NotFound(_))));
        let update = TextUpdate {
            translation: "x".into(),
            font_size: None,
            font_color: None,
            font_id: None,
        };
        assert!(matches!(
            backend.update_shape_text(5, &update),
            Err(ApiError::NotFound(_))
        ));
    }

    #[test]
    fn test_seeded_page_keeps_persisted_ids() {
        let outline = vec![pos2(0.0, 0.0), pos2(4.0, 0.0), pos2(4.0, 4.0)];
        let seeded = Shape::new(ShapeId::Persisted(10), 1, outline, BubbleText::default()).unwrap();
        let backend = MemoryBackend::new().with_page(page(), vec![seeded]);
        let created = backend.create_shape(&page(), &new_shape(2)).unwrap();
        assert_eq!(created.id, ShapeId::Persisted(11));
        assert_eq!(backend.list_shapes(&page()).unwrap().len(), 2);
    }
}
