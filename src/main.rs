#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod clipboard;
mod config;
mod controller;
mod languages;
mod speech;
mod translator;
mod ui;

use std::sync::{Arc, OnceLock};

use anyhow::Result;
use eframe::egui;
use tokio::sync::{mpsc, watch};

use controller::{Command, Session};
use tracing_appender::non_blocking::WorkerGuard;

fn setup_logging() -> Option<WorkerGuard> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let log_dir = config::Config::app_dir();
    let _ = std::fs::create_dir_all(&log_dir);
    let log_path = log_dir.join("debug.log");

    // Truncate to keep log file manageable (overwrite each launch)
    let file = std::fs::File::create(&log_path).ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stdout);

    if let Some(file) = file {
        let (writer, guard) = tracing_appender::non_blocking(file);
        let file_layer = fmt::layer()
            .with_target(false)
            .with_ansi(false)
            .with_writer(writer);

        tracing_subscriber::registry()
            .with(filter)
            .with(stdout_layer)
            .with(file_layer)
            .init();
        Some(guard)
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(stdout_layer)
            .init();
        None
    }
}

fn main() -> Result<()> {
    let _log_guard = setup_logging();

    std::panic::set_hook(Box::new(|info| {
        tracing::error!("PANIC: {}", info);
    }));

    tracing::info!("Quick Translate starting");

    let config = config::Config::load().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}, using defaults", e);
        config::Config::default()
    });

    let (command_tx, command_rx) = mpsc::unbounded_channel::<Command>();
    let (view_tx, view_rx) = watch::channel(Session::new(&config.source_lang, &config.target_lang));

    // filled in once the window exists
    let egui_ctx: Arc<OnceLock<egui::Context>> = Arc::new(OnceLock::new());
    let repaint_ctx = egui_ctx.clone();
    // detached: exits on its own once the window drops the command sender
    let _controller = controller::spawn_controller_thread(config.clone(), command_rx, view_tx, move || {
        if let Some(ctx) = repaint_ctx.get() {
            ctx.request_repaint();
        }
    })?;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Quick Translate")
            .with_inner_size([480.0, 520.0]),
        ..Default::default()
    };
    let font_path = config.font_path.clone();

    eframe::run_native(
        "Quick Translate",
        options,
        Box::new(move |cc| {
            let _ = egui_ctx.set(cc.egui_ctx.clone());
            if let Some(path) = &font_path {
                if let Err(e) = ui::install_font(&cc.egui_ctx, path) {
                    tracing::warn!("{:#}", e);
                }
            }
            Box::new(ui::TranslateApp::new(command_tx, view_rx))
        }),
    )
    .map_err(|err| anyhow::anyhow!("failed to open window: {err}"))?;

    tracing::info!("Quick Translate exiting");
    Ok(())
}
