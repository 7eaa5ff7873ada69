//! The in-memory shape list for the displayed page.
//!
//! Insertion order is z-order: shapes are drawn first to last and hit-tested
//! first to last, so the earliest shape wins where shapes overlap.

use crate::error::StoreError;
use crate::geometry::{point_in_polygon, Point};
use crate::model::{BubbleText, Shape, ShapeId};

#[derive(Debug)]
pub enum StoreMutation {
    /// Replace the whole page, e.g. after loading.
    Reset(Vec<Shape>),
    /// Insert at `index`, or append when `None` or out of range.
    Insert { index: Option<usize>, shape: Shape },
    Remove(ShapeId),
    SetOutline { id: ShapeId, outline: Vec<Point> },
    SetText { id: ShapeId, text: BubbleText },
    /// A local shape was persisted and received its real identity.
    Rekey {
        from: ShapeId,
        to: ShapeId,
        sequence_number: u32,
    },
}

#[derive(Debug)]
pub enum Applied {
    Changed,
    Removed { index: usize, shape: Shape },
}

#[derive(Debug, Default)]
pub struct ShapeStore {
    shapes: Vec<Shape>,
    revision: u64,
}

impl ShapeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Bumped on every successful mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn get(&self, id: ShapeId) -> Option<&Shape> {
        self.shapes.iter().find(|s| s.id == id)
    }

    pub fn contains(&self, id: ShapeId) -> bool {
        self.get(id).is_some()
    }

    pub fn next_sequence_number(&self) -> u32 {
        self.shapes
            .iter()
            .map(|s| s.sequence_number)
            .max()
            .unwrap_or(0)
            + 1
    }

    /// First shape, in insertion order, whose polygon contains `point`.
    pub fn hit_test(&self, point: Point) -> Option<ShapeId> {
        self.shapes
            .iter()
            .find(|s| point_in_polygon(point, s.outline()))
            .map(|s| s.id)
    }

    /// The single mutation entry point.
    pub fn apply(&mut self, mutation: StoreMutation) -> Result<Applied, StoreError> {
        let applied = match mutation {
            StoreMutation::Reset(shapes) => {
                self.shapes = shapes;
                Applied::Changed
            }
            StoreMutation::Insert { index, shape } => {
                if self
                    .shapes
                    .iter()
                    .any(|s| s.sequence_number == shape.sequence_number)
                {
                    return Err(StoreError::DuplicateSequence(shape.sequence_number));
                }
                match index {
                    Some(i) if i <= self.shapes.len() => self.shapes.insert(i, shape),
                    _ => self.shapes.push(shape),
                }
                Applied::Changed
            }
            StoreMutation::Remove(id) => {
                let index = self.index_of(id)?;
                let shape = self.shapes.remove(index);
                Applied::Removed { index, shape }
            }
            StoreMutation::SetOutline { id, outline } => {
                let index = self.index_of(id)?;
                self.shapes[index].set_outline(outline)?;
                Applied::Changed
            }
            StoreMutation::SetText { id, text } => {
                let index = self.index_of(id)?;
                self.shapes[index].text = text;
                Applied::Changed
            }
            StoreMutation::Rekey {
                from,
                to,
                sequence_number,
            } => {
                let index = self.index_of(from)?;
                let clash = self
                    .shapes
                    .iter()
                    .enumerate()
                    .any(|(i, s)| i != index && s.sequence_number == sequence_number);
                if clash {
                    return Err(StoreError::DuplicateSequence(sequence_number));
                }
                let shape = &mut self.shapes[index];
                shape.id = to;
                shape.sequence_number = sequence_number;
                Applied::Changed
            }
        };
        self.revision += 1;
        Ok(applied)
    }

    fn index_of(&self, id: ShapeId) -> Result<usize, StoreError> {
        self.shapes
            .iter()
            .position(|s| s.id == id)
            .ok_or(StoreError::UnknownShape(id))
    }
}
