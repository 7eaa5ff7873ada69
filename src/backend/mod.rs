//! Persistence collaborator seam.
//!
//! Calls are blocking; [`crate::sync::SyncLayer`] runs them off the UI
//! thread. Ids passed here are always persisted ids.

mod http;
mod memory;

pub use http::HttpBackend;
pub use memory::{CallCounts, MemoryBackend, Operation};

use crate::error::ApiError;
use crate::fonts::FontInfo;
use crate::geometry::{BoundingBox, Point};
use crate::model::{NewShape, PageRef, Shape, TextUpdate};

pub trait ShapeBackend: Send + Sync {
    fn list_shapes(&self, page: &PageRef) -> Result<Vec<Shape>, ApiError>;

    /// Persists a new shape; the returned shape carries the assigned id and
    /// sequence number.
    fn create_shape(&self, page: &PageRef, shape: &NewShape) -> Result<Shape, ApiError>;

    fn update_shape_geometry(
        &self,
        id: u64,
        outline: &[Point],
        bounding_box: BoundingBox,
    ) -> Result<(), ApiError>;

    fn update_shape_text(&self, id: u64, update: &TextUpdate) -> Result<(), ApiError>;

    fn delete_shape(&self, id: u64) -> Result<(), ApiError>;

    fn list_fonts(&self) -> Result<Vec<FontInfo>, ApiError>;

    fn fetch_font(&self, font: &FontInfo) -> Result<Vec<u8>, ApiError>;
}
