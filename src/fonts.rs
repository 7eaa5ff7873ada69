//! Font catalog: resolves a shape's `font_id` to something both render
//! targets can measure and draw, falling back to egui's default family.

use std::collections::{HashMap, HashSet};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use ab_glyph::FontArc;
use eframe::egui;
use serde::{Deserialize, Serialize};

use crate::backend::ShapeBackend;
use crate::error::{ApiError, FontError};
use crate::sync::RepaintHook;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub source_url: Option<String>,
}

type FontDownload = (String, Result<Vec<u8>, ApiError>);

pub struct FontCatalog {
    available: Vec<FontInfo>,
    default_font: Option<FontArc>,
    loaded: HashMap<String, FontArc>,
    bytes: HashMap<String, Vec<u8>>,
    // handed to egui this frame, usable from the next one
    staged: HashSet<String>,
    registered: HashSet<String>,
    downloads: (Sender<FontDownload>, Receiver<FontDownload>),
    in_flight: usize,
}

impl Default for FontCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl FontCatalog {
    pub fn new() -> Self {
        let default_font = egui_default_font();
        if default_font.is_none() {
            tracing::warn!("default font unavailable, exported text will be skipped");
        }
        Self {
            available: Vec::new(),
            default_font,
            loaded: HashMap::new(),
            bytes: HashMap::new(),
            staged: HashSet::new(),
            registered: HashSet::new(),
            downloads: mpsc::channel(),
            in_flight: 0,
        }
    }

    pub fn available(&self) -> &[FontInfo] {
        &self.available
    }

    pub fn set_available(&mut self, fonts: Vec<FontInfo>) {
        tracing::debug!(count = fonts.len(), "font list updated");
        self.available = fonts;
    }

    pub fn display_name(&self, font_id: Option<&str>) -> &str {
        font_id
            .and_then(|id| self.available.iter().find(|f| f.id == id))
            .map(|f| f.name.as_str())
            .unwrap_or("Default")
    }

    pub fn is_loaded(&self, font_id: &str) -> bool {
        self.loaded.contains_key(font_id)
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight > 0
    }

    pub fn insert_font_bytes(&mut self, id: &str, bytes: Vec<u8>) -> Result<(), FontError> {
        let font = FontArc::try_from_vec(bytes.clone())
            .map_err(|_| FontError::Invalid(id.to_string()))?;
        self.loaded.insert(id.to_string(), font);
        self.bytes.insert(id.to_string(), bytes);
        Ok(())
    }

    /// Downloads every listed font that has a source and is not loaded yet.
    pub fn start_loading(&mut self, backend: Arc<dyn ShapeBackend>, repaint: Option<RepaintHook>) {
        let pending: Vec<FontInfo> = self
            .available
            .iter()
            .filter(|f| f.source_url.is_some() && !self.loaded.contains_key(&f.id))
            .cloned()
            .collect();
        for font in pending {
            let tx = self.downloads.0.clone();
            let backend = Arc::clone(&backend);
            let repaint = repaint.clone();
            let spawned = std::thread::Builder::new()
                .name(format!("font-{}", font.id))
                .spawn(move || {
                    let result = backend.fetch_font(&font);
                    let _ = tx.send((font.id, result));
                    if let Some(repaint) = repaint {
                        repaint();
                    }
                });
            match spawned {
                Ok(_) => self.in_flight += 1,
                Err(e) => tracing::warn!("could not spawn font download: {}", e),
            }
        }
    }

    /// Collects finished downloads. Returns how many fonts became available.
    pub fn poll(&mut self) -> usize {
        let mut loaded = 0;
        while let Ok((id, result)) = self.downloads.1.try_recv() {
            self.in_flight = self.in_flight.saturating_sub(1);
            let outcome = result
                .map_err(|source| FontError::Fetch {
                    id: id.clone(),
                    source,
                })
                .and_then(|bytes| self.insert_font_bytes(&id, bytes));
            match outcome {
                Ok(()) => {
                    tracing::info!(font = %id, "font loaded");
                    loaded += 1;
                }
                Err(e) => tracing::warn!("{}; using default family", e),
            }
        }
        loaded
    }

    /// Registers loaded fonts with egui. Call once at the start of every
    /// frame: egui applies new font definitions from the following pass, so
    /// a font only resolves to its own family one frame after registration.
    pub fn sync_with_egui(&mut self, ctx: &egui::Context) {
        self.registered.extend(self.staged.drain());
        let fresh: Vec<String> = self
            .bytes
            .keys()
            .filter(|id| !self.registered.contains(*id))
            .cloned()
            .collect();
        if fresh.is_empty() {
            return;
        }

        let mut defs = egui::FontDefinitions::default();
        let fallback = defs
            .families
            .get(&egui::FontFamily::Proportional)
            .cloned()
            .unwrap_or_default();
        for (id, bytes) in &self.bytes {
            defs.font_data
                .insert(id.clone(), egui::FontData::from_owned(bytes.clone()).into());
            let mut chain = vec![id.clone()];
            chain.extend(fallback.iter().cloned());
            defs.families
                .insert(egui::FontFamily::Name(id.as_str().into()), chain);
        }
        ctx.set_fonts(defs);
        self.staged.extend(fresh);
    }

    /// Family to use on the interactive surface.
    pub fn egui_family(&self, font_id: Option<&str>) -> egui::FontFamily {
        match font_id {
            Some(id) if self.registered.contains(id) => egui::FontFamily::Name(id.into()),
            _ => egui::FontFamily::Proportional,
        }
    }

    /// Outline font to use on the raster surface.
    pub fn glyph_font(&self, font_id: Option<&str>) -> Option<&FontArc> {
        font_id
            .and_then(|id| self.loaded.get(id))
            .or(self.default_font.as_ref())
    }
}

fn egui_default_font() -> Option<FontArc> {
    let defs = egui::FontDefinitions::default();
    let name = defs.families.get(&egui::FontFamily::Proportional)?.first()?;
    let data = defs.font_data.get(name)?;
    FontArc::try_from_vec(data.font.to_vec()).ok()
}
