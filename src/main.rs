mod app;
mod color;
mod config;
mod data;
mod error;
mod pipeline;
mod state;
mod ui;

use anyhow::{anyhow, Context, Result};
use app::CommunityDropsApp;
use clap::Parser;
use eframe::egui;

use config::{Args, Config};
use pipeline::Session;

fn main() -> Result<()> {
    env_logger::init();

    let config = Config::from_args(Args::parse())?;
    log::info!(
        "Datasets available in {:?}: {:?}",
        config.source,
        config.datasets
    );

    let runtime = tokio::runtime::Runtime::new().context("starting tokio runtime")?;
    let session = Session::new(runtime.handle().clone(), config.source.fetcher());

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([600.0, 400.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Community Drops – Timeline Viewer",
        options,
        Box::new(move |cc| Ok(Box::new(CommunityDropsApp::new(&cc.egui_ctx, &config, session)))),
    )
    .map_err(|e| anyhow!("running viewer: {e}"))
}
