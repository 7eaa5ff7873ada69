//! Speech-bubble data model. All coordinates are native image pixels.

use std::fmt;

use eframe::egui;
use serde::{Deserialize, Serialize};

use crate::error::GeometryError;
use crate::geometry::{bounding_box_of, BoundingBox, Point};

pub const DEFAULT_FONT_SIZE: f32 = 14.0;

/// Reference to the page a set of shapes belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageRef(pub String);

impl fmt::Display for PageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a shape. `Local` ids are handed out for shapes that exist
/// only in this session until the backend assigns a `Persisted` one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeId {
    Persisted(u64),
    Local(u64),
}

impl ShapeId {
    pub fn remote(self) -> Option<u64> {
        match self {
            ShapeId::Persisted(id) => Some(id),
            ShapeId::Local(_) => None,
        }
    }

    pub fn is_local(self) -> bool {
        matches!(self, ShapeId::Local(_))
    }
}

impl fmt::Display for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShapeId::Persisted(id) => write!(f, "#{id}"),
            ShapeId::Local(id) => write!(f, "local-{id}"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FontColor(pub [u8; 3]);

impl FontColor {
    pub const BLACK: FontColor = FontColor([0, 0, 0]);

    pub fn to_egui(self) -> egui::Color32 {
        let [r, g, b] = self.0;
        egui::Color32::from_rgb(r, g, b)
    }

    pub fn from_egui(c: egui::Color32) -> Self {
        Self([c.r(), c.g(), c.b()])
    }
}

/// Text attached to a bubble plus its optional styling.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BubbleText {
    #[serde(default)]
    pub source_text: String,
    #[serde(default)]
    pub translated_text: String,
    #[serde(default)]
    pub font_size: Option<f32>,
    #[serde(default)]
    pub font_color: Option<FontColor>,
    #[serde(default)]
    pub font_id: Option<String>,
}

impl BubbleText {
    pub fn font_size_or_default(&self) -> f32 {
        self.font_size.unwrap_or(DEFAULT_FONT_SIZE)
    }

    pub fn color_or_default(&self) -> FontColor {
        self.font_color.unwrap_or(FontColor::BLACK)
    }

    pub fn has_translation(&self) -> bool {
        !self.translated_text.trim().is_empty()
    }
}

/// A committed (or committing) speech bubble.
#[derive(Clone, Debug, PartialEq)]
pub struct Shape {
    pub id: ShapeId,
    pub sequence_number: u32,
    bounding_box: BoundingBox,
    outline: Vec<Point>,
    pub text: BubbleText,
}

impl Shape {
    pub fn new(
        id: ShapeId,
        sequence_number: u32,
        outline: Vec<Point>,
        text: BubbleText,
    ) -> Result<Self, GeometryError> {
        let bounding_box = validated_bounds(&outline)?;
        Ok(Self {
            id,
            sequence_number,
            bounding_box,
            outline,
            text,
        })
    }

    pub fn outline(&self) -> &[Point] {
        &self.outline
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.bounding_box
    }

    /// Replaces the outline and recomputes the bounding box from scratch.
    pub fn set_outline(&mut self, outline: Vec<Point>) -> Result<(), GeometryError> {
        self.bounding_box = validated_bounds(&outline)?;
        self.outline = outline;
        Ok(())
    }
}

/// A bubble under construction. Never carries a persisted id.
#[derive(Clone, Debug, PartialEq)]
pub struct DraftShape {
    bounding_box: BoundingBox,
    outline: Vec<Point>,
    pub text: BubbleText,
}

impl DraftShape {
    pub fn new(outline: Vec<Point>, text: BubbleText) -> Result<Self, GeometryError> {
        let bounding_box = validated_bounds(&outline)?;
        Ok(Self {
            bounding_box,
            outline,
            text,
        })
    }

    pub fn outline(&self) -> &[Point] {
        &self.outline
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.bounding_box
    }

    pub fn set_outline(&mut self, outline: Vec<Point>) -> Result<(), GeometryError> {
        self.bounding_box = validated_bounds(&outline)?;
        self.outline = outline;
        Ok(())
    }

    pub fn into_parts(self) -> (Vec<Point>, BubbleText) {
        (self.outline, self.text)
    }
}

impl From<Shape> for DraftShape {
    fn from(shape: Shape) -> Self {
        Self {
            bounding_box: shape.bounding_box,
            outline: shape.outline,
            text: shape.text,
        }
    }
}

/// Payload for the create-shape call.
#[derive(Clone, Debug, PartialEq)]
pub struct NewShape {
    pub sequence_number: u32,
    pub outline: Vec<Point>,
    pub bounding_box: BoundingBox,
    pub text: BubbleText,
}

impl NewShape {
    pub fn from_shape(shape: &Shape) -> Self {
        Self {
            sequence_number: shape.sequence_number,
            outline: shape.outline.clone(),
            bounding_box: shape.bounding_box,
            text: shape.text.clone(),
        }
    }
}

/// Payload for the update-text call.
#[derive(Clone, Debug, PartialEq)]
pub struct TextUpdate {
    pub translation: String,
    pub font_size: Option<f32>,
    pub font_color: Option<FontColor>,
    pub font_id: Option<String>,
}

impl From<&BubbleText> for TextUpdate {
    fn from(text: &BubbleText) -> Self {
        Self {
            translation: text.translated_text.clone(),
            font_size: text.font_size,
            font_color: text.font_color,
            font_id: text.font_id.clone(),
        }
    }
}

impl TextUpdate {
    /// Writes the update over `text`, keeping its source text.
    pub fn apply_to(&self, text: &mut BubbleText) {
        text.translated_text = self.translation.clone();
        text.font_size = self.font_size;
        text.font_color = self.font_color;
        text.font_id = self.font_id.clone();
    }
}

fn validated_bounds(outline: &[Point]) -> Result<BoundingBox, GeometryError> {
    if outline.len() < 3 {
        return Err(GeometryError::TooFewPoints(outline.len()));
    }
    if outline.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
        return Err(GeometryError::NonFinite);
    }
    bounding_box_of(outline).ok_or(GeometryError::TooFewPoints(0))
}
