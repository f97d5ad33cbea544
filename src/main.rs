// src/main.rs
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]
mod bindings;
mod config;
mod debounce;
mod emotiv;
mod engine;
mod error;
mod gui;
mod headset;
mod recorder;
mod screens;
mod status;
mod types;
mod world;
use eframe::egui;

fn main() -> eframe::Result<()> {
    env_logger::init();

    let config = match config::AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            log::error!("{e:#}; falling back to defaults");
            config::AppConfig::default()
        }
    };
    log::info!("window capacity {}, tick {} ms", config.window_capacity, config.tick_ms);

    let viewport = egui::ViewportBuilder::default()
        .with_inner_size([1280.0, 800.0])
        .with_min_inner_size([1000.0, 640.0])
        .with_title("Mindchair");
    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };
    eframe::run_native(
        "Mindchair",
        options,
        Box::new(|_cc| Box::new(gui::MindchairApp::new(config))),
    )
}
