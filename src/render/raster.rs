use ab_glyph::{point, Font, FontArc, PxScale, ScaleFont};
use eframe::egui::{vec2, Align2, Color32, Pos2, Rect, Stroke};
use image::RgbaImage;

use super::Surface;
use crate::fonts::FontCatalog;
use crate::layout::{FontSpec, TextMeasure};

/// Export target: draws straight into an RGBA buffer at native resolution.
pub struct RasterSurface<'a> {
    image: &'a mut RgbaImage,
    fonts: &'a FontCatalog,
}

impl<'a> RasterSurface<'a> {
    pub fn new(image: &'a mut RgbaImage, fonts: &'a FontCatalog) -> Self {
        Self { image, fonts }
    }

    fn glyphs(&self, font: &FontSpec) -> Option<&'a FontArc> {
        let fonts: &'a FontCatalog = self.fonts;
        fonts.glyph_font(font.font_id.as_deref())
    }

    /// Source-over blend of `color` scaled by `coverage`.
    fn blend(&mut self, x: i32, y: i32, color: Color32, coverage: f32) {
        if x < 0 || y < 0 || x >= self.image.width() as i32 || y >= self.image.height() as i32 {
            return;
        }
        let [r, g, b, a] = color.to_srgba_unmultiplied();
        let alpha = (a as f32 / 255.0) * coverage.clamp(0.0, 1.0);
        if alpha <= 0.0 {
            return;
        }
        let px = self.image.get_pixel_mut(x as u32, y as u32);
        let mix =
            |src: u8, dst: u8| (src as f32 * alpha + dst as f32 * (1.0 - alpha)).round() as u8;
        px.0 = [
            mix(r, px.0[0]),
            mix(g, px.0[1]),
            mix(b, px.0[2]),
            (255.0 * alpha + px.0[3] as f32 * (1.0 - alpha)).round() as u8,
        ];
    }

    fn draw_line(&mut self, from: Pos2, to: Pos2, stroke: Stroke) {
        let d = to - from;
        let steps = (d.length() * 2.0) as i32;
        let half_t = (stroke.width / 2.0).max(0.5) as i32;
        for i in 0..=steps {
            let t = i as f32 / steps.max(1) as f32;
            let cx = (from.x + d.x * t) as i32;
            let cy = (from.y + d.y * t) as i32;
            for oy in -half_t..=half_t {
                for ox in -half_t..=half_t {
                    self.set_pixel(cx + ox, cy + oy, stroke.color);
                }
            }
        }
    }

    // stroke pixels overwrite so that overlapping stamps don't darken
    fn set_pixel(&mut self, x: i32, y: i32, color: Color32) {
        if color.a() == 255 {
            if x >= 0 && y >= 0 && x < self.image.width() as i32 && y < self.image.height() as i32 {
                self.image
                    .put_pixel(x as u32, y as u32, image::Rgba(color.to_array()));
            }
        } else {
            self.blend(x, y, color, 1.0);
        }
    }
}

impl TextMeasure for RasterSurface<'_> {
    fn text_width(&self, text: &str, font: &FontSpec) -> f32 {
        let Some(glyphs) = self.glyphs(font) else {
            return text.chars().count() as f32 * font.size * 0.5;
        };
        let scaled = glyphs.as_scaled(PxScale::from(font.size));
        let mut width = 0.0;
        let mut prev = None;
        for ch in text.chars() {
            let id = glyphs.glyph_id(ch);
            if let Some(p) = prev {
                width += scaled.kern(p, id);
            }
            width += scaled.h_advance(id);
            prev = Some(id);
        }
        width
    }

    fn line_height(&self, font: &FontSpec) -> f32 {
        match self.glyphs(font) {
            Some(glyphs) => {
                let scaled = glyphs.as_scaled(PxScale::from(font.size));
                scaled.height() + scaled.line_gap()
            }
            None => font.size * 1.2,
        }
    }
}

impl Surface for RasterSurface<'_> {
    /// Even-odd scanline fill sampled at pixel centres.
    fn fill_polygon(&mut self, points: &[Pos2], color: Color32) {
        if points.len() < 3 {
            return;
        }
        let (min_y, max_y) = points
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), p| (lo.min(p.y), hi.max(p.y)));
        let y_start = min_y.floor().max(0.0) as i32;
        let y_end = max_y.ceil().min(self.image.height() as f32) as i32;

        let mut crossings = Vec::new();
        for y in y_start..y_end {
            let sy = y as f32 + 0.5;
            crossings.clear();
            let mut j = points.len() - 1;
            for i in 0..points.len() {
                let (a, b) = (points[i], points[j]);
                if (a.y > sy) != (b.y > sy) {
                    crossings.push(a.x + (sy - a.y) * (b.x - a.x) / (b.y - a.y));
                }
                j = i;
            }
            crossings.sort_by(f32::total_cmp);
            for span in crossings.chunks_exact(2) {
                let mut x = (span[0] - 0.5).ceil() as i32;
                while (x as f32 + 0.5) < span[1] {
                    self.blend(x, y, color, 1.0);
                    x += 1;
                }
            }
        }
    }

    fn stroke_polygon(&mut self, points: &[Pos2], stroke: Stroke) {
        for (i, a) in points.iter().enumerate() {
            let b = points[(i + 1) % points.len()];
            self.draw_line(*a, b, stroke);
        }
    }

    fn stroke_polyline(&mut self, points: &[Pos2], stroke: Stroke) {
        for pair in points.windows(2) {
            self.draw_line(pair[0], pair[1], stroke);
        }
    }

    fn dashed_rect(&mut self, rect: Rect, stroke: Stroke) {
        let corners = [
            rect.left_top(),
            rect.right_top(),
            rect.right_bottom(),
            rect.left_bottom(),
        ];
        for i in 0..4 {
            let (a, b) = (corners[i], corners[(i + 1) % 4]);
            let len = (b - a).length();
            let dir = (b - a) / len.max(f32::EPSILON);
            let mut t = 0.0;
            while t < len {
                let end = (t + 6.0).min(len);
                self.draw_line(a + dir * t, a + dir * end, stroke);
                t += 10.0;
            }
        }
    }

    fn fill_circle(&mut self, center: Pos2, radius: f32, color: Color32) {
        let r = radius.ceil() as i32;
        for oy in -r..=r {
            for ox in -r..=r {
                if ((ox * ox + oy * oy) as f32) <= radius * radius {
                    self.blend(center.x as i32 + ox, center.y as i32 + oy, color, 1.0);
                }
            }
        }
    }

    fn text(&mut self, anchor: Pos2, align: Align2, text: &str, font: &FontSpec, color: Color32) {
        let Some(glyphs) = self.glyphs(font) else {
            return;
        };
        let size = vec2(self.text_width(text, font), self.line_height(font));
        let origin = align.anchor_size(anchor, size).min;

        let scale = PxScale::from(font.size);
        let scaled = glyphs.as_scaled(scale);
        let baseline = origin.y + scaled.ascent();
        let mut caret = origin.x;
        let mut prev = None;
        for ch in text.chars() {
            let id = glyphs.glyph_id(ch);
            if let Some(p) = prev {
                caret += scaled.kern(p, id);
            }
            let glyph = id.with_scale_and_position(scale, point(caret, baseline));
            caret += scaled.h_advance(id);
            prev = Some(id);

            if let Some(outlined) = glyphs.outline_glyph(glyph) {
                let bounds = outlined.px_bounds();
                outlined.draw(|gx, gy, coverage| {
                    self.blend(
                        bounds.min.x as i32 + gx as i32,
                        bounds.min.y as i32 + gy as i32,
                        color,
                        coverage,
                    );
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eframe::egui::pos2;
    use image::Rgba;

    fn canvas() -> RgbaImage {
        RgbaImage::from_pixel(40, 40, Rgba([0, 0, 0, 255]))
    }

    #[test]
    fn test_fill_concave_polygon() {
        let mut image = canvas();
        let fonts = FontCatalog::new();
        // an L shape; the notch at top-right must stay empty
        let outline = [
            pos2(0.0, 0.0),
            pos2(10.0, 0.0),
            pos2(10.0, 10.0),
            pos2(20.0, 10.0),
            pos2(20.0, 20.0),
            pos2(0.0, 20.0),
        ];
        RasterSurface::new(&mut image, &fonts).fill_polygon(&outline, Color32::WHITE);
        assert_eq!(image.get_pixel(5, 5).0, [255, 255, 255, 255]);
        assert_eq!(image.get_pixel(15, 15).0, [255, 255, 255, 255]);
        assert_eq!(image.get_pixel(15, 5).0, [0, 0, 0, 255]);
        assert_eq!(image.get_pixel(25, 25).0, [0, 0, 0, 255]);
    }

    #[test]
    fn test_translucent_fill_blends() {
        let mut image = canvas();
        let fonts = FontCatalog::new();
        let square = [pos2(0.0, 0.0), pos2(4.0, 0.0), pos2(4.0, 4.0), pos2(0.0, 4.0)];
        let half_white = Color32::from_rgba_unmultiplied(255, 255, 255, 128);
        RasterSurface::new(&mut image, &fonts).fill_polygon(&square, half_white);
        let [r, _, _, a] = image.get_pixel(1, 1).0;
        assert!((126..=130).contains(&r), "got {r}");
        assert_eq!(a, 255);
    }

    #[test]
    fn test_drawing_off_canvas_is_clipped() {
        let mut image = canvas();
        let fonts = FontCatalog::new();
        let mut surface = RasterSurface::new(&mut image, &fonts);
        let line = [pos2(-50.0, 20.0), pos2(100.0, 20.0)];
        surface.stroke_polyline(&line, Stroke::new(2.0, Color32::RED));
        surface.fill_circle(pos2(-10.0, -10.0), 5.0, Color32::RED);
        assert_eq!(image.get_pixel(20, 20).0, [255, 0, 0, 255]);
    }

    #[test]
    fn test_text_marks_pixels_near_anchor() {
        let mut image = canvas();
        let fonts = FontCatalog::new();
        let font = FontSpec::new(16.0, None);
        let mut surface = RasterSurface::new(&mut image, &fonts);
        assert!(surface.text_width("W", &font) > 0.0);
        surface.text(pos2(20.0, 20.0), Align2::CENTER_CENTER, "W", &font, Color32::WHITE);
        let lit = image.pixels().filter(|p| p.0[0] > 0).count();
        assert!(lit > 0);
    }
}
