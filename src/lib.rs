#![cfg_attr(target_arch = "wasm32", allow(dead_code))]

//! Adaptive WebGL2 black hole background.
//!
//! The frame pacing, quality profiles and detail slider logic live in plain
//! modules so they can be tested on the host. Browser glue is only compiled
//! when targeting wasm32.

pub mod adaptive;
pub mod camera;
pub mod config;
pub mod detail;
pub mod error;
pub mod profile;
pub mod shader;
pub mod uniforms;

#[cfg(target_arch = "wasm32")]
mod wasm {
    use wasm_bindgen::prelude::*;

    use crate::config::BackgroundConfig;

    mod assets;
    mod controls;
    mod gl;
    mod overlay;
    mod pause;
    mod programs;
    mod render;
    mod timer;

    #[wasm_bindgen(start)]
    pub fn main() -> Result<(), JsValue> {
        console_error_panic_hook::set_once();
        console_log::init_with_level(log::Level::Info).ok();

        let window = web_sys::window().ok_or("no window")?;
        let document = window.document().ok_or("no document")?;

        let mut config = BackgroundConfig::default();
        // Pages without the canvas simply get no background.
        let Some(element) = document.get_element_by_id(&config.canvas_id) else {
            log::info!("no #{} canvas; background disabled", config.canvas_id);
            return Ok(());
        };
        let canvas = element.dyn_into::<web_sys::HtmlCanvasElement>()?;
        config.apply_overrides(|name| canvas.get_attribute(name));

        render::start(canvas, config)?;
        Ok(())
    }
}
