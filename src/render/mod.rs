//! Frame rendering.
//!
//! One routine, [`render_scene`], draws every target. With `decorate` it
//! produces the interactive view (selection colours, handles, labels, the
//! draft and the in-progress polygon); without it, a flat composite with
//! opaque bubble backgrounds for export. Every call repaints from scratch.

mod painter;
mod raster;

use std::path::Path;

use eframe::egui::{vec2, Align2, Color32, Pos2, Rect, Stroke};
use image::{DynamicImage, RgbaImage};

pub use painter::PainterSurface;
pub use raster::RasterSurface;

use crate::error::ExportError;
use crate::fonts::FontCatalog;
use crate::geometry::{BoundingBox, Point, Viewport};
use crate::layout::{effective_font_size, layout_text, FontSpec, TextMeasure};
use crate::model::{BubbleText, DraftShape, Shape, ShapeId};

/// Drawing primitives, in the surface's own pixel space.
pub trait Surface: TextMeasure {
    fn fill_polygon(&mut self, points: &[Pos2], color: Color32);
    /// Closed outline.
    fn stroke_polygon(&mut self, points: &[Pos2], stroke: Stroke);
    /// Open path.
    fn stroke_polyline(&mut self, points: &[Pos2], stroke: Stroke);
    fn dashed_rect(&mut self, rect: Rect, stroke: Stroke);
    fn fill_circle(&mut self, center: Pos2, radius: f32, color: Color32);
    fn text(&mut self, anchor: Pos2, align: Align2, text: &str, font: &FontSpec, color: Color32);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShapeVisual {
    Default,
    Selected,
    Editing,
    Dragging,
}

struct Style {
    outline: Stroke,
    fill: Color32,
    bounds: Stroke,
}

impl ShapeVisual {
    fn style(self) -> Style {
        let (rgb, width) = match self {
            ShapeVisual::Default => ([30, 144, 255], 2.0),
            ShapeVisual::Selected => ([255, 140, 0], 3.0),
            ShapeVisual::Editing => ([46, 204, 113], 3.0),
            ShapeVisual::Dragging => ([231, 76, 60], 2.5),
        };
        let [r, g, b] = rgb;
        Style {
            outline: Stroke::new(width, Color32::from_rgb(r, g, b)),
            fill: Color32::from_rgba_unmultiplied(r, g, b, 40),
            bounds: Stroke::new(1.0, Color32::from_rgba_unmultiplied(r, g, b, 160)),
        }
    }
}

const DRAFT_COLOR: Color32 = Color32::from_rgb(155, 89, 182);
const HANDLE_RADIUS: f32 = 5.0;
const LABEL_FONT_SIZE: f32 = 12.0;

/// Immutable view of everything a frame shows.
#[derive(Clone, Copy, Debug)]
pub struct Scene<'a> {
    pub shapes: &'a [Shape],
    pub selected: Option<ShapeId>,
    pub editing: Option<ShapeId>,
    pub dragging: Option<ShapeId>,
    pub draft: Option<&'a DraftShape>,
    pub polygon: &'a [Point],
    pub hover: Option<Point>,
}

impl<'a> Scene<'a> {
    pub fn shapes_only(shapes: &'a [Shape]) -> Self {
        Self {
            shapes,
            selected: None,
            editing: None,
            dragging: None,
            draft: None,
            polygon: &[],
            hover: None,
        }
    }

    pub fn visual(&self, id: ShapeId) -> ShapeVisual {
        if self.editing == Some(id) {
            ShapeVisual::Editing
        } else if self.dragging == Some(id) {
            ShapeVisual::Dragging
        } else if self.selected == Some(id) {
            ShapeVisual::Selected
        } else {
            ShapeVisual::Default
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderOptions {
    pub decorate: bool,
    /// Inset between a bubble's bounds and its text, in surface pixels.
    pub text_padding: f32,
    /// Bubble background in the undecorated composite.
    pub background: Color32,
}

impl RenderOptions {
    pub fn interactive(text_padding: f32) -> Self {
        Self {
            decorate: true,
            text_padding,
            background: Color32::WHITE,
        }
    }

    pub fn export(text_padding: f32) -> Self {
        Self {
            decorate: false,
            text_padding,
            background: Color32::WHITE,
        }
    }
}

pub fn render_scene<S: Surface>(
    surface: &mut S,
    scene: &Scene<'_>,
    viewport: &Viewport,
    options: &RenderOptions,
) {
    for shape in scene.shapes {
        let points = viewport.outline_to_display(shape.outline());
        if options.decorate {
            let visual = scene.visual(shape.id);
            let style = visual.style();
            surface.fill_polygon(&points, style.fill);
            surface.dashed_rect(viewport.rect_to_display(shape.bounding_box()), style.bounds);
            surface.stroke_polygon(&points, style.outline);
            if visual == ShapeVisual::Selected || visual == ShapeVisual::Dragging {
                draw_handles(surface, &points, style.outline.color);
            }
        } else {
            surface.fill_polygon(&points, options.background);
        }

        // the inline editor overlays this shape's text while it is open
        if scene.editing != Some(shape.id) {
            draw_text_block(surface, &shape.text, shape.bounding_box(), viewport, options);
        }

        if options.decorate {
            draw_label(
                surface,
                viewport.to_display(shape.bounding_box().min()),
                shape.sequence_number,
                scene.visual(shape.id).style().outline.color,
            );
        }
    }

    if !options.decorate {
        return;
    }
    draw_polygon_in_progress(surface, scene, viewport);
    if let Some(draft) = scene.draft {
        draw_draft(surface, draft, viewport, options);
    }
}

fn draw_handles<S: Surface>(surface: &mut S, points: &[Pos2], color: Color32) {
    for p in points {
        surface.fill_circle(*p, HANDLE_RADIUS, color);
        surface.fill_circle(*p, HANDLE_RADIUS - 2.0, Color32::WHITE);
    }
}

fn draw_label<S: Surface>(surface: &mut S, corner: Pos2, sequence_number: u32, color: Color32) {
    let font = FontSpec::new(LABEL_FONT_SIZE, None);
    let text = sequence_number.to_string();
    let size = vec2(
        surface.text_width(&text, &font) + 6.0,
        surface.line_height(&font) + 2.0,
    );
    let rect = Rect::from_min_size(corner - size, size);
    let corners = [
        rect.left_top(),
        rect.right_top(),
        rect.right_bottom(),
        rect.left_bottom(),
    ];
    surface.fill_polygon(&corners, color);
    surface.text(rect.center(), Align2::CENTER_CENTER, &text, &font, Color32::WHITE);
}

fn draw_text_block<S: Surface>(
    surface: &mut S,
    text: &BubbleText,
    bounds: BoundingBox,
    viewport: &Viewport,
    options: &RenderOptions,
) {
    if !text.has_translation() {
        return;
    }
    let outer = viewport.rect_to_display(bounds);
    let inner = outer.shrink(options.text_padding);
    let area = if inner.width() > 0.0 && inner.height() > 0.0 {
        inner
    } else {
        outer
    };
    let size = effective_font_size(text.font_size_or_default(), bounds.height());
    let font = FontSpec::new(size * viewport.scale().y, text.font_id.clone());
    let layout = layout_text(&text.translated_text, area, &font, &*surface);
    let color = text.color_or_default().to_egui();
    for (origin, line) in layout.line_origins() {
        surface.text(origin, Align2::CENTER_TOP, line, &font, color);
    }
}

fn draw_polygon_in_progress<S: Surface>(surface: &mut S, scene: &Scene<'_>, viewport: &Viewport) {
    if scene.polygon.is_empty() {
        return;
    }
    let stroke = Stroke::new(2.0, Color32::from_rgb(231, 76, 60));
    let mut points = viewport.outline_to_display(scene.polygon);
    if let Some(hover) = scene.hover {
        points.push(viewport.to_display(hover));
    }
    surface.stroke_polyline(&points, stroke);
    for (i, p) in points.iter().take(scene.polygon.len()).enumerate() {
        // the first vertex is where the loop will close
        let radius = if i == 0 { HANDLE_RADIUS } else { HANDLE_RADIUS - 1.5 };
        surface.fill_circle(*p, radius, stroke.color);
    }
}

fn draw_draft<S: Surface>(
    surface: &mut S,
    draft: &DraftShape,
    viewport: &Viewport,
    options: &RenderOptions,
) {
    let points = viewport.outline_to_display(draft.outline());
    let [r, g, b, _] = DRAFT_COLOR.to_array();
    surface.fill_polygon(&points, Color32::from_rgba_unmultiplied(r, g, b, 50));
    surface.dashed_rect(
        viewport.rect_to_display(draft.bounding_box()),
        Stroke::new(1.5, DRAFT_COLOR),
    );
    surface.stroke_polygon(&points, Stroke::new(2.0, DRAFT_COLOR));
    draw_handles(surface, &points, DRAFT_COLOR);
    draw_text_block(surface, &draft.text, draft.bounding_box(), viewport, options);
}

/// A decoration-free render of a page at native resolution.
pub struct ExportComposite {
    pub image: RgbaImage,
    pub width: u32,
    pub height: u32,
}

impl ExportComposite {
    /// Writes the composite; the format follows the file extension.
    pub fn save(&self, path: &Path) -> Result<(), ExportError> {
        let is_jpeg = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"))
            .unwrap_or(false);
        if is_jpeg {
            // JPEG has no alpha channel
            DynamicImage::ImageRgba8(self.image.clone())
                .to_rgb8()
                .save(path)?;
        } else {
            self.image.save(path)?;
        }
        tracing::info!("exported {}x{} composite to {}", self.width, self.height, path.display());
        Ok(())
    }
}

/// Flattens `shapes` onto a copy of `page`. Reads only; the caller's state is
/// untouched.
pub fn export_composite(
    page: &RgbaImage,
    shapes: &[Shape],
    fonts: &FontCatalog,
    text_padding: f32,
) -> ExportComposite {
    let (width, height) = page.dimensions();
    let mut image = page.clone();
    let viewport = Viewport::identity(vec2(width as f32, height as f32));
    {
        let mut surface = RasterSurface::new(&mut image, fonts);
        render_scene(
            &mut surface,
            &Scene::shapes_only(shapes),
            &viewport,
            &RenderOptions::export(text_padding),
        );
    }
    ExportComposite {
        image,
        width,
        height,
    }
}
