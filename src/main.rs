// src/main.rs
#![cfg(not(target_arch = "wasm32"))]

use log::{info, LevelFilter};

fn main() -> anyhow::Result<()> {
    let default_level = if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(default_level)
        .filter_module("wgpu_core", LevelFilter::Warn)
        .filter_module("wgpu_hal", LevelFilter::Warn)
        .filter_module("naga", LevelFilter::Warn)
        .init();

    info!("starting forward-plus renderer");
    forward_plus::run_native()?;
    Ok(())
}
