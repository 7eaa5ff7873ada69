use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use bubble_annotate::app::{BubbleApp, Startup};
use bubble_annotate::backend::{HttpBackend, MemoryBackend, ShapeBackend};
use bubble_annotate::config;
use bubble_annotate::model::PageRef;
use clap::Parser;
use eframe::egui;

/// Edit translated speech bubbles on a comic page.
#[derive(Parser, Debug)]
#[command(name = "bubble-annotate", version, about)]
struct Args {
    /// Page identifier on the translation API
    #[arg(long)]
    page: String,

    /// Page image (PNG or JPEG)
    #[arg(long)]
    image: PathBuf,

    /// API base URL, overrides the config file
    #[arg(long)]
    api: Option<String>,

    /// Keep everything in memory; nothing is persisted
    #[arg(long)]
    offline: bool,

    /// Config file to use instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,
}

fn setup_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::prelude::*;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,bubble_annotate=debug"));

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .with_target(true);

    // debug builds also keep a log file
    let (file_layer, guard) = if cfg!(debug_assertions) {
        let logs_dir = config::logs_dir();
        match std::fs::create_dir_all(&logs_dir) {
            Ok(()) => {
                let appender = tracing_appender::rolling::never(&logs_dir, "bubble-annotate.log");
                let (non_blocking, guard) = tracing_appender::non_blocking(appender);
                let layer = tracing_subscriber::fmt::layer()
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .with_target(true);
                (Some(layer), Some(guard))
            }
            Err(e) => {
                eprintln!("Failed to create logs directory: {e}");
                (None, None)
            }
        }
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    guard
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    // keep the guard alive for the duration of the program
    let _log_guard = setup_logging();

    let config_path = args.config.clone().unwrap_or_else(config::config_file);
    let loaded = config::load_config(&config_path);
    let mut notices = Vec::new();
    if let Some(reason) = loaded.reset_reason {
        notices.push(format!("{reason}. Defaults are in use."));
    }
    if !loaded.path.exists() {
        if let Err(e) = config::save_config(&loaded.config, &loaded.path) {
            tracing::warn!("Failed to write default config: {}", e);
        }
    }
    let mut app_config = loaded.config;
    if let Some(api) = args.api {
        app_config.api_base_url = api;
    }
    app_config.offline |= args.offline;

    let page_image = match image::open(&args.image) {
        Ok(img) => Some(img.to_rgba8()),
        Err(e) => {
            tracing::warn!("could not open {}: {}", args.image.display(), e);
            notices.push(format!(
                "Could not open page image {}: {e}",
                args.image.display()
            ));
            None
        }
    };

    let backend: Arc<dyn ShapeBackend> = if app_config.offline {
        tracing::info!("offline mode, changes are kept in memory");
        Arc::new(MemoryBackend::new())
    } else {
        Arc::new(HttpBackend::new(
            app_config.api_base_url.clone(),
            app_config.api_token.clone(),
        ))
    };

    let page = PageRef(args.page);
    let title = format!("bubble-annotate | {page}");
    let startup = Startup {
        config: app_config,
        backend,
        page,
        image_path: args.image,
        page_image,
        notices,
    };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_title(&title),
        ..Default::default()
    };

    eframe::run_native(
        &title,
        options,
        Box::new(move |cc| Ok(Box::new(BubbleApp::new(cc, startup)))),
    )
    .map_err(|e| anyhow::anyhow!("{e}"))
    .context("failed to run the editor window")
}
