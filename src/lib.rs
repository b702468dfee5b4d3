#![warn(clippy::all)]

//! mvt-web - browser front-end for the MVT device-check service.
//!
//! Binds the API key form and the ADB check button to the backend, renders
//! the findings, and caches them in IndexedDB. Page scripts can reach the
//! cache through the exported `ResultCache` class.

pub mod api;
pub mod config;
pub mod handlers;
pub mod storage;
pub mod ui;

#[cfg(target_arch = "wasm32")]
mod app;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

/// Entry point for the WASM module.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub async fn start() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    tracing_wasm::set_as_global_default();

    app::run().await
}
