//! Pure geometry: hit testing, bounds, and native/display coordinate mapping.
//!
//! Shapes are stored in native image space. Display space only exists while
//! rendering and while translating pointer events, through [`Viewport`].

use eframe::egui::{self, pos2, vec2, Pos2, Rect, Vec2};

/// A point in native image space.
pub type Point = Pos2;

/// Axis-aligned bounds `[min_x, min_y, max_x, max_y]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl BoundingBox {
    pub const fn new(min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }

    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }

    pub fn min(&self) -> Point {
        pos2(self.min_x, self.min_y)
    }

    pub fn center(&self) -> Point {
        pos2(
            (self.min_x + self.max_x) * 0.5,
            (self.min_y + self.max_y) * 0.5,
        )
    }

    /// Corners clockwise from the top-left.
    pub fn corners(&self) -> [Point; 4] {
        [
            pos2(self.min_x, self.min_y),
            pos2(self.max_x, self.min_y),
            pos2(self.max_x, self.max_y),
            pos2(self.min_x, self.max_y),
        ]
    }
}

/// Ray-casting parity test. The outline is treated as a closed simple loop;
/// points exactly on an edge may land either way.
pub fn point_in_polygon(point: Point, outline: &[Point]) -> bool {
    if outline.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = outline.len() - 1;
    for i in 0..outline.len() {
        let pi = outline[i];
        let pj = outline[j];
        let crosses = (pi.y > point.y) != (pj.y > point.y)
            && point.x < (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x;
        if crosses {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Tight bounds of an outline, `None` when it is empty.
pub fn bounding_box_of(outline: &[Point]) -> Option<BoundingBox> {
    let first = outline.first()?;
    let mut bounds = BoundingBox::new(first.x, first.y, first.x, first.y);
    for p in &outline[1..] {
        bounds.min_x = bounds.min_x.min(p.x);
        bounds.min_y = bounds.min_y.min(p.y);
        bounds.max_x = bounds.max_x.max(p.x);
        bounds.max_y = bounds.max_y.max(p.y);
    }
    Some(bounds)
}

/// Index of the first vertex within `pixel_radius` screen pixels of `point`.
///
/// `point` and `outline` are native; `scale` is the native→display factor per
/// axis, so the radius stays constant on screen whatever the zoom. Ties go to
/// the earliest vertex in outline order.
pub fn hit_test_vertex(
    point: Point,
    outline: &[Point],
    scale: Vec2,
    pixel_radius: f32,
) -> Option<usize> {
    let radius_sq = pixel_radius * pixel_radius;
    outline.iter().position(|vertex| {
        let dx = (vertex.x - point.x) * scale.x;
        let dy = (vertex.y - point.y) * scale.y;
        dx * dx + dy * dy <= radius_sq
    })
}

pub fn translate(outline: &[Point], delta: Vec2) -> Vec<Point> {
    outline.iter().map(|p| *p + delta).collect()
}

/// Axis-aligned square outline, clockwise from the top-left.
pub fn square_outline(center: Point, half_extent: f32) -> Vec<Point> {
    let h = vec2(half_extent, half_extent);
    BoundingBox::new(
        center.x - h.x,
        center.y - h.y,
        center.x + h.x,
        center.y + h.y,
    )
    .corners()
    .to_vec()
}

/// Ear-clipping triangulation, so concave outlines can be filled.
pub fn triangulate(points: &[Pos2]) -> Vec<[usize; 3]> {
    if points.len() < 3 {
        return Vec::new();
    }
    let mut flat: Vec<f64> = Vec::with_capacity(points.len() * 2);
    for p in points {
        flat.push(p.x as f64);
        flat.push(p.y as f64);
    }
    let indices = earcutr::earcut(&flat, &[], 2).unwrap_or_default();
    indices
        .chunks_exact(3)
        .filter(|t| t.iter().all(|&i| i < points.len()))
        .map(|t| [t[0], t[1], t[2]])
        .collect()
}

/// Mapping between native image space and a display rectangle. Each axis
/// scales independently, so a stretched surface is fine.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    native_size: Vec2,
    display: Rect,
}

impl Viewport {
    pub fn new(native_size: Vec2, display: Rect) -> Self {
        Self {
            native_size,
            display,
        }
    }

    /// Native resolution drawn at the origin, used for export.
    pub fn identity(native_size: Vec2) -> Self {
        Self::new(native_size, Rect::from_min_size(Pos2::ZERO, native_size))
    }

    /// Largest aspect-preserving rectangle centred in `available`, never
    /// scaled above `max_scale`.
    pub fn fit(native_size: Vec2, available: Rect, max_scale: f32) -> Self {
        if native_size.x <= 0.0 || native_size.y <= 0.0 {
            return Self::new(native_size, available);
        }
        let scale = (available.width() / native_size.x)
            .min(available.height() / native_size.y)
            .min(max_scale)
            .max(f32::EPSILON);
        let display = Rect::from_center_size(available.center(), native_size * scale);
        Self::new(native_size, display)
    }

    pub fn native_size(&self) -> Vec2 {
        self.native_size
    }

    pub fn display_rect(&self) -> Rect {
        self.display
    }

    /// native→display factor per axis.
    pub fn scale(&self) -> Vec2 {
        let axis = |display: f32, native: f32| {
            if native > 0.0 {
                display / native
            } else {
                1.0
            }
        };
        vec2(
            axis(self.display.width(), self.native_size.x),
            axis(self.display.height(), self.native_size.y),
        )
    }

    pub fn to_display(&self, p: Point) -> Pos2 {
        let s = self.scale();
        self.display.min + vec2(p.x * s.x, p.y * s.y)
    }

    pub fn to_native(&self, p: Pos2) -> Point {
        let s = self.scale();
        let rel = p - self.display.min;
        pos2(rel.x / s.x, rel.y / s.y)
    }

    pub fn outline_to_display(&self, outline: &[Point]) -> Vec<Pos2> {
        outline.iter().map(|p| self.to_display(*p)).collect()
    }

    pub fn rect_to_display(&self, bounds: BoundingBox) -> Rect {
        Rect::from_min_max(
            self.to_display(bounds.min()),
            self.to_display(pos2(bounds.max_x, bounds.max_y)),
        )
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::identity(egui::Vec2::splat(1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn unit_square() -> Vec<Point> {
        vec![
            pos2(0.0, 0.0),
            pos2(1.0, 0.0),
            pos2(1.0, 1.0),
            pos2(0.0, 1.0),
        ]
    }

    #[test]
    fn test_point_in_unit_square() {
        assert!(point_in_polygon(pos2(0.5, 0.5), &unit_square()));
        assert!(!point_in_polygon(pos2(10.0, 10.0), &unit_square()));
        assert!(!point_in_polygon(pos2(-0.5, 0.5), &unit_square()));
    }

    #[test]
    fn test_point_in_concave_polygon() {
        // U shape opening upwards
        let u = vec![
            pos2(0.0, 0.0),
            pos2(1.0, 0.0),
            pos2(1.0, 2.0),
            pos2(2.0, 2.0),
            pos2(2.0, 0.0),
            pos2(3.0, 0.0),
            pos2(3.0, 3.0),
            pos2(0.0, 3.0),
        ];
        assert!(point_in_polygon(pos2(0.5, 1.0), &u));
        assert!(!point_in_polygon(pos2(1.5, 1.0), &u));
        assert!(point_in_polygon(pos2(1.5, 2.5), &u));
    }

    #[test]
    fn test_degenerate_polygon_contains_nothing() {
        assert!(!point_in_polygon(pos2(0.0, 0.0), &[]));
        assert!(!point_in_polygon(pos2(0.5, 0.0), &[pos2(0.0, 0.0), pos2(1.0, 0.0)]));
    }

    #[test]
    fn test_bounding_box_of_empty() {
        assert_eq!(bounding_box_of(&[]), None);
    }

    #[test]
    fn test_bounding_box_idempotent() {
        let outline = vec![pos2(3.0, 9.0), pos2(-2.0, 4.0), pos2(7.5, 1.0)];
        let bounds = bounding_box_of(&outline).unwrap();
        let again = bounding_box_of(&bounds.corners()).unwrap();
        assert_eq!(bounds, again);
        assert_eq!(bounds, BoundingBox::new(-2.0, 1.0, 7.5, 9.0));
    }

    #[test]
    fn test_hit_test_vertex_uses_screen_radius() {
        let outline = unit_square().iter().map(|p| *p * 100.0).collect::<Vec<_>>();
        // display is half the native size: 8 screen px == 16 native px
        let scale = vec2(0.5, 0.5);
        assert_eq!(hit_test_vertex(pos2(110.0, 0.0), &outline, scale, 8.0), Some(1));
        assert_eq!(hit_test_vertex(pos2(120.0, 0.0), &outline, scale, 8.0), None);
    }

    #[test]
    fn test_hit_test_vertex_first_match_wins() {
        let outline = vec![pos2(0.0, 0.0), pos2(1.0, 0.0), pos2(0.0, 1.0)];
        assert_eq!(
            hit_test_vertex(pos2(0.5, 0.0), &outline, vec2(1.0, 1.0), 1.0),
            Some(0)
        );
    }

    #[test]
    fn test_viewport_non_uniform_round_trip() {
        let vp = Viewport::new(
            vec2(1000.0, 500.0),
            Rect::from_min_size(pos2(20.0, 10.0), vec2(500.0, 500.0)),
        );
        assert_eq!(vp.scale(), vec2(0.5, 1.0));
        let native = pos2(400.0, 250.0);
        let display = vp.to_display(native);
        assert_eq!(display, pos2(220.0, 260.0));
        assert_eq!(vp.to_native(display), native);
    }

    #[test]
    fn test_viewport_fit_preserves_aspect() {
        let vp = Viewport::fit(
            vec2(2000.0, 1000.0),
            Rect::from_min_size(Pos2::ZERO, vec2(800.0, 800.0)),
            1.0,
        );
        assert_eq!(vp.scale(), vec2(0.4, 0.4));
        assert_eq!(vp.display_rect().center(), pos2(400.0, 400.0));
    }

    #[test]
    fn test_triangulate_concave() {
        let l_shape = vec![
            pos2(0.0, 0.0),
            pos2(2.0, 0.0),
            pos2(2.0, 1.0),
            pos2(1.0, 1.0),
            pos2(1.0, 2.0),
            pos2(0.0, 2.0),
        ];
        let triangles = triangulate(&l_shape);
        assert_eq!(triangles.len(), l_shape.len() - 2);
    }

    #[test]
    fn test_square_outline() {
        let square = square_outline(pos2(10.0, 10.0), 5.0);
        assert_eq!(
            bounding_box_of(&square),
            Some(BoundingBox::new(5.0, 5.0, 15.0, 15.0))
        );
        assert!(point_in_polygon(pos2(10.0, 10.0), &square));
    }

    proptest! {
        #[test]
        fn prop_translate_preserves_relative_shape(
            dx in -500.0f32..500.0,
            dy in -500.0f32..500.0,
        ) {
            let outline = vec![pos2(10.0, 20.0), pos2(60.0, 25.0), pos2(35.0, 80.0)];
            let moved = translate(&outline, vec2(dx, dy));
            for (before, after) in outline.iter().zip(&moved) {
                prop_assert!((after.x - before.x - dx).abs() < 1e-3);
                prop_assert!((after.y - before.y - dy).abs() < 1e-3);
            }
            let a = bounding_box_of(&outline).unwrap();
            let b = bounding_box_of(&moved).unwrap();
            prop_assert!((a.width() - b.width()).abs() < 1e-3);
            prop_assert!((a.height() - b.height()).abs() < 1e-3);
        }

        #[test]
        fn prop_square_center_is_inside(
            cx in -1000.0f32..1000.0,
            cy in -1000.0f32..1000.0,
            half in 1.0f32..200.0,
        ) {
            let square = square_outline(pos2(cx, cy), half);
            prop_assert!(point_in_polygon(pos2(cx, cy), &square));
            prop_assert!(!point_in_polygon(pos2(cx + half * 3.0, cy), &square));
        }

        #[test]
        fn prop_bounding_box_contains_all_points(
            pts in proptest::collection::vec((-1e4f32..1e4, -1e4f32..1e4), 1..32)
        ) {
            let outline: Vec<Point> = pts.iter().map(|(x, y)| pos2(*x, *y)).collect();
            let b = bounding_box_of(&outline).unwrap();
            for p in &outline {
                prop_assert!(p.x >= b.min_x && p.x <= b.max_x);
                prop_assert!(p.y >= b.min_y && p.y <= b.max_y);
            }
            prop_assert_eq!(bounding_box_of(&b.corners()).unwrap(), b);
        }
    }
}
