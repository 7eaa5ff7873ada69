//! The eframe host: toolbar, canvas, inline editor, confirmations and the
//! notification strip around one [`Editor`].

use std::path::PathBuf;
use std::sync::Arc;

use eframe::egui;
use image::RgbaImage;

use crate::backend::ShapeBackend;
use crate::config::AppConfig;
use crate::editor::{Editor, InteractionState, NotificationLevel, PointerFrame, Tool};
use crate::fonts::FontCatalog;
use crate::geometry::Viewport;
use crate::model::{FontColor, PageRef};
use crate::render::{render_scene, PainterSurface, RenderOptions};
use crate::sync::{Dispatch, RepaintHook, SyncLayer};

/// Everything `main` prepares before the window opens.
pub struct Startup {
    pub config: AppConfig,
    pub backend: Arc<dyn ShapeBackend>,
    pub page: PageRef,
    pub image_path: PathBuf,
    pub page_image: Option<RgbaImage>,
    /// Problems found during startup, shown once the window is up.
    pub notices: Vec<String>,
}

enum EditorAction {
    Save,
    Cancel,
    Delete,
}

pub struct BubbleApp {
    editor: Editor,
    fonts: FontCatalog,
    config: AppConfig,
    image_path: PathBuf,
    page_image: Option<RgbaImage>,
    texture: Option<egui::TextureHandle>,
    fit_to_window: bool,
}

impl BubbleApp {
    pub fn new(cc: &eframe::CreationContext<'_>, startup: Startup) -> Self {
        let ctx = cc.egui_ctx.clone();
        let repaint: RepaintHook = Arc::new(move || ctx.request_repaint());

        let Startup {
            config,
            backend,
            page,
            image_path,
            page_image,
            notices,
        } = startup;

        let sync = SyncLayer::new(Arc::clone(&backend), page.clone(), Dispatch::Threaded)
            .with_repaint(Arc::clone(&repaint));
        let mut editor = Editor::with_sync(sync, config.editor_settings());
        for notice in notices {
            editor.notify(NotificationLevel::Error, notice);
        }

        match backend.list_shapes(&page) {
            Ok(shapes) => {
                tracing::info!(page = %page, count = shapes.len(), "bubbles loaded");
                editor.reset_shapes(shapes);
            }
            Err(e) => editor.notify(
                NotificationLevel::Error,
                format!("Could not load bubbles for {page}: {e}"),
            ),
        }

        let mut fonts = FontCatalog::new();
        match backend.list_fonts() {
            Ok(list) => {
                fonts.set_available(list);
                fonts.start_loading(backend, Some(repaint));
            }
            Err(e) => {
                tracing::warn!("font list unavailable: {}", e);
                editor.notify(
                    NotificationLevel::Info,
                    format!("Fonts unavailable, using the default: {e}"),
                );
            }
        }

        Self {
            editor,
            fonts,
            config,
            image_path,
            page_image,
            texture: None,
            fit_to_window: true,
        }
    }

    fn ensure_texture(&mut self, ctx: &egui::Context) {
        if self.texture.is_some() {
            return;
        }
        if let Some(ref rgba) = self.page_image {
            let size = [rgba.width() as usize, rgba.height() as usize];
            let pixels = rgba.as_flat_samples();
            let color_image = egui::ColorImage::from_rgba_unmultiplied(size, pixels.as_slice());
            self.texture =
                Some(ctx.load_texture("page", color_image, egui::TextureOptions::LINEAR));
        }
    }

    fn viewport_for(&self, available: egui::Rect) -> Option<Viewport> {
        let image = self.page_image.as_ref()?;
        let native = egui::vec2(image.width() as f32, image.height() as f32);
        if !self.fit_to_window {
            return Some(Viewport::new(
                native,
                egui::Rect::from_min_size(available.min, native),
            ));
        }
        let max_scale = self
            .config
            .max_display_width
            .map(|w| w / native.x)
            .unwrap_or(f32::INFINITY);
        Some(Viewport::fit(native, available, max_scale))
    }

    fn export(&mut self) {
        let default_name = format!(
            "{}_translated.png",
            self.image_path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("page")
        );
        let Some(path) = rfd::FileDialog::new()
            .add_filter("PNG", &["png"])
            .add_filter("JPEG", &["jpg", "jpeg"])
            .set_file_name(default_name)
            .save_file()
        else {
            return;
        };
        let result = self
            .editor
            .export_composite(self.page_image.as_ref(), &self.fonts)
            .and_then(|composite| composite.save(&path));
        match result {
            Ok(()) => self.editor.notify(
                NotificationLevel::Info,
                format!("Exported to {}", path.display()),
            ),
            Err(e) => self
                .editor
                .notify(NotificationLevel::Error, format!("Export failed: {e}")),
        }
    }

    fn toolbar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                let mut tool = self.editor.tool();
                ui.selectable_value(&mut tool, Tool::Select, "Select");
                ui.selectable_value(&mut tool, Tool::Polygon, "Polygon");
                self.editor.set_tool(tool);
                ui.separator();
                ui.checkbox(&mut self.fit_to_window, "Fit to window");
                ui.separator();
                let can_export = self.page_image.is_some();
                if ui
                    .add_enabled(can_export, egui::Button::new("Export…"))
                    .clicked()
                {
                    self.export();
                }
                ui.separator();
                ui.label(format!(
                    "{} | {} bubbles",
                    self.editor.page(),
                    self.editor.shapes().len()
                ));
                if self.editor.is_syncing() || self.fonts.is_loading() {
                    ui.spinner();
                }
            });
        });
    }

    fn notification_strip(&mut self, ctx: &egui::Context) {
        if self.editor.notifications().is_empty() {
            return;
        }
        let mut dismissed = Vec::new();
        egui::TopBottomPanel::bottom("notifications").show(ctx, |ui| {
            for note in self.editor.notifications() {
                ui.horizontal(|ui| {
                    let color = match note.level {
                        NotificationLevel::Error => ui.visuals().error_fg_color,
                        NotificationLevel::Info => ui.visuals().text_color(),
                    };
                    ui.colored_label(color, &note.message);
                    if ui.small_button("✕").clicked() {
                        dismissed.push(note.id);
                    }
                });
            }
        });
        for id in dismissed {
            self.editor.dismiss_notification(id);
        }
    }

    fn canvas(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let (response, painter) =
                ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());
            let canvas_rect = response.rect;
            painter.rect_filled(canvas_rect, 0.0, egui::Color32::from_gray(40));

            let Some(viewport) = self.viewport_for(canvas_rect) else {
                let panel = canvas_rect.shrink(24.0);
                painter.rect_filled(panel, 4.0, egui::Color32::from_gray(90));
                painter.text(
                    panel.center(),
                    egui::Align2::CENTER_CENTER,
                    format!("Page image unavailable: {}", self.image_path.display()),
                    egui::FontId::proportional(16.0),
                    egui::Color32::WHITE,
                );
                return;
            };
            self.editor.set_viewport(viewport);

            if let Some(ref tex) = self.texture {
                painter.image(
                    tex.id(),
                    viewport.display_rect(),
                    egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                    egui::Color32::WHITE,
                );
            }

            self.handle_pointer(ui, &response);

            let mut surface = PainterSurface::new(&painter, &self.fonts);
            render_scene(
                &mut surface,
                &self.editor.scene(),
                &viewport,
                &RenderOptions::interactive(self.config.text_padding),
            );
        });
    }

    fn handle_pointer(&mut self, ui: &egui::Ui, response: &egui::Response) {
        let frame = ui.input(|i| PointerFrame {
            pos: i.pointer.interact_pos(),
            hovered: response.hovered(),
            pressed: i.pointer.primary_pressed(),
            released: i.pointer.primary_released(),
            double_clicked: response.double_clicked(),
            secondary_clicked: response.secondary_clicked(),
        });
        self.editor.pointer_frame(frame);
    }

    fn bubble_editor(&mut self, ctx: &egui::Context) {
        let Some(anchor) = self.editor.editor_anchor() else {
            return;
        };
        let editing_shape = self.editor.state().editing_shape();
        let fonts = &self.fonts;
        let editor = &mut self.editor;
        let mut action = None;

        egui::Area::new(egui::Id::new("bubble_editor"))
            .fixed_pos(anchor.right_top() + egui::vec2(8.0, 0.0))
            .order(egui::Order::Foreground)
            .show(ctx, |ui| {
                egui::Frame::popup(ui.style()).show(ui, |ui| {
                    ui.set_max_width(280.0);
                    if let Some(text) = editor.edit_buffer_mut() {
                        if !text.source_text.is_empty() {
                            ui.label(egui::RichText::new(&text.source_text).weak());
                        }
                        ui.add(
                            egui::TextEdit::multiline(&mut text.translated_text)
                                .desired_rows(4)
                                .hint_text("Translation"),
                        );

                        let mut size = text.font_size_or_default();
                        if ui
                            .add(egui::Slider::new(&mut size, 6.0..=96.0).text("Size"))
                            .changed()
                        {
                            text.font_size = Some(size);
                        }

                        let mut color = text.color_or_default().to_egui();
                        ui.horizontal(|ui| {
                            ui.label("Colour");
                            if ui.color_edit_button_srgba(&mut color).changed() {
                                text.font_color = Some(FontColor::from_egui(color));
                            }
                        });

                        egui::ComboBox::from_label("Font")
                            .selected_text(fonts.display_name(text.font_id.as_deref()))
                            .show_ui(ui, |ui| {
                                ui.selectable_value(&mut text.font_id, None, "Default");
                                for font in fonts.available() {
                                    ui.selectable_value(
                                        &mut text.font_id,
                                        Some(font.id.clone()),
                                        font.name.as_str(),
                                    );
                                }
                            });
                    }

                    ui.horizontal(|ui| {
                        if ui.button("Save").clicked() {
                            action = Some(EditorAction::Save);
                        }
                        if ui.button("Cancel").clicked() {
                            action = Some(EditorAction::Cancel);
                        }
                        if editing_shape.is_some() && ui.button("Delete").clicked() {
                            action = Some(EditorAction::Delete);
                        }
                    });
                });
            });

        match action {
            Some(EditorAction::Save) => self.editor.save_text(),
            Some(EditorAction::Cancel) => self.editor.cancel_text(),
            Some(EditorAction::Delete) => {
                self.editor.cancel_text();
                if let Some(id) = editing_shape {
                    self.editor.request_delete(id);
                }
            }
            None => {}
        }
    }

    fn delete_confirmation(&mut self, ctx: &egui::Context) {
        let Some(id) = self.editor.pending_delete_confirmation() else {
            return;
        };
        let label = self
            .editor
            .shape(id)
            .map(|s| s.sequence_number.to_string())
            .unwrap_or_else(|| id.to_string());
        let mut confirmed = None;
        egui::Window::new("Delete bubble?")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
            .show(ctx, |ui| {
                ui.label(format!("Bubble {label} and its translation will be removed."));
                ui.horizontal(|ui| {
                    if ui.button("Delete").clicked() {
                        confirmed = Some(true);
                    }
                    if ui.button("Cancel").clicked() {
                        confirmed = Some(false);
                    }
                });
            });
        match confirmed {
            Some(true) => self.editor.confirm_delete(),
            Some(false) => self.editor.cancel_delete(),
            None => {}
        }
    }

    fn shortcuts(&mut self, ctx: &egui::Context) {
        // keys belong to the text field while one has focus
        if ctx.wants_keyboard_input() {
            return;
        }
        let keys = [egui::Key::Escape, egui::Key::Delete, egui::Key::Backspace];
        let pressed: Vec<egui::Key> =
            ctx.input(|i| keys.into_iter().filter(|k| i.key_pressed(*k)).collect());
        for key in pressed {
            self.editor.key_pressed(key);
        }
    }
}

impl eframe::App for BubbleApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.fonts.sync_with_egui(ctx);
        if self.fonts.poll() > 0 {
            ctx.request_repaint();
        }
        if self.editor.poll_sync() {
            ctx.request_repaint();
        }
        for event in self.editor.drain_events() {
            tracing::debug!(?event, "editor event");
        }
        self.ensure_texture(ctx);

        self.shortcuts(ctx);
        self.toolbar(ctx);
        self.notification_strip(ctx);
        self.canvas(ctx);
        self.bubble_editor(ctx);
        self.delete_confirmation(ctx);

        if matches!(self.editor.state(), InteractionState::DrawingPolygon { .. }) {
            // keep the rubber band following the pointer
            ctx.request_repaint();
        }
    }
}
