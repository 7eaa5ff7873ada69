use eframe::egui::{self, epaint::Mesh, Align2, Color32, FontId, Pos2, Rect, Stroke};

use super::Surface;
use crate::fonts::FontCatalog;
use crate::geometry::triangulate;
use crate::layout::{FontSpec, TextMeasure};

/// Interactive target: draws into an egui layer in screen coordinates.
pub struct PainterSurface<'a> {
    painter: &'a egui::Painter,
    fonts: &'a FontCatalog,
}

impl<'a> PainterSurface<'a> {
    pub fn new(painter: &'a egui::Painter, fonts: &'a FontCatalog) -> Self {
        Self { painter, fonts }
    }

    fn font_id(&self, font: &FontSpec) -> FontId {
        FontId::new(font.size, self.fonts.egui_family(font.font_id.as_deref()))
    }
}

impl TextMeasure for PainterSurface<'_> {
    fn text_width(&self, text: &str, font: &FontSpec) -> f32 {
        self.painter
            .layout_no_wrap(text.to_owned(), self.font_id(font), Color32::WHITE)
            .size()
            .x
    }

    fn line_height(&self, font: &FontSpec) -> f32 {
        let font_id = self.font_id(font);
        self.painter.ctx().fonts(|f| f.row_height(&font_id))
    }
}

impl Surface for PainterSurface<'_> {
    fn fill_polygon(&mut self, points: &[Pos2], color: Color32) {
        // egui only fills convex paths itself; bubbles are often concave
        let triangles = triangulate(points);
        if triangles.is_empty() {
            return;
        }
        let mut mesh = Mesh::default();
        for p in points {
            mesh.colored_vertex(*p, color);
        }
        for [a, b, c] in triangles {
            mesh.add_triangle(a as u32, b as u32, c as u32);
        }
        self.painter.add(egui::Shape::mesh(mesh));
    }

    fn stroke_polygon(&mut self, points: &[Pos2], stroke: Stroke) {
        self.painter
            .add(egui::Shape::closed_line(points.to_vec(), stroke));
    }

    fn stroke_polyline(&mut self, points: &[Pos2], stroke: Stroke) {
        if points.len() < 2 {
            return;
        }
        self.painter.add(egui::Shape::line(points.to_vec(), stroke));
    }

    fn dashed_rect(&mut self, rect: Rect, stroke: Stroke) {
        let path = [
            rect.left_top(),
            rect.right_top(),
            rect.right_bottom(),
            rect.left_bottom(),
            rect.left_top(),
        ];
        self.painter
            .extend(egui::Shape::dashed_line(&path, stroke, 6.0, 4.0));
    }

    fn fill_circle(&mut self, center: Pos2, radius: f32, color: Color32) {
        self.painter.circle_filled(center, radius, color);
    }

    fn text(&mut self, anchor: Pos2, align: Align2, text: &str, font: &FontSpec, color: Color32) {
        self.painter
            .text(anchor, align, text, self.font_id(font), color);
    }
}
