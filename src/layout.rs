//! Word wrapping and centring of bubble text.

use eframe::egui::{pos2, Pos2, Rect};

/// Font request handed to a [`TextMeasure`]. `font_id` is resolved by the
/// measuring backend; unknown ids fall back to its default family.
#[derive(Clone, Debug, PartialEq)]
pub struct FontSpec {
    pub size: f32,
    pub font_id: Option<String>,
}

impl FontSpec {
    pub fn new(size: f32, font_id: Option<String>) -> Self {
        Self { size, font_id }
    }
}

/// Source of text metrics for one rendering backend.
pub trait TextMeasure {
    fn text_width(&self, text: &str, font: &FontSpec) -> f32;

    fn line_height(&self, font: &FontSpec) -> f32 {
        font.size * 1.2
    }
}

/// A laid-out text block. Lines are drawn centred on `center_x`, the first
/// one with its top at `start_y`.
#[derive(Clone, Debug, PartialEq)]
pub struct TextLayout {
    pub lines: Vec<String>,
    pub line_height: f32,
    pub start_y: f32,
    pub center_x: f32,
}

impl TextLayout {
    pub fn line_origins(&self) -> impl Iterator<Item = (Pos2, &str)> + '_ {
        self.lines.iter().enumerate().map(move |(i, line)| {
            (
                pos2(self.center_x, self.start_y + i as f32 * self.line_height),
                line.as_str(),
            )
        })
    }

    pub fn block_height(&self) -> f32 {
        self.lines.len() as f32 * self.line_height
    }
}

/// Clamps a stored font size into `[1, available_height / 4]`.
pub fn effective_font_size(stored: f32, available_height: f32) -> f32 {
    stored.min(available_height / 4.0).max(1.0)
}

/// Greedy word wrap. Explicit newlines are hard breaks; a single word wider
/// than `max_width` gets a line of its own rather than being split.
pub fn wrap_words(
    text: &str,
    max_width: f32,
    font: &FontSpec,
    measure: &dyn TextMeasure,
) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            if current.is_empty() {
                current.push_str(word);
                continue;
            }
            let candidate = format!("{current} {word}");
            if measure.text_width(&candidate, font) > max_width {
                lines.push(std::mem::replace(&mut current, word.to_string()));
            } else {
                current = candidate;
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }
    lines
}

/// Wraps `text` to the width of `bounds` and centres the block inside it.
/// Content taller than `bounds` overflows symmetrically; nothing is dropped.
pub fn layout_text(
    text: &str,
    bounds: Rect,
    font: &FontSpec,
    measure: &dyn TextMeasure,
) -> TextLayout {
    let lines = wrap_words(text, bounds.width().max(1.0), font, measure);
    let line_height = measure.line_height(font);
    let block_height = lines.len() as f32 * line_height;
    let center = bounds.center();
    TextLayout {
        lines,
        line_height,
        start_y: center.y - block_height / 2.0,
        center_x: center.x,
    }
}
