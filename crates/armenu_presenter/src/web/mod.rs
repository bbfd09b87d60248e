//! Browser integration
//!
//! ```text
//! container element
//! +-- <video>   camera feed, full-bleed backdrop        (camera)
//! +-- <canvas>  transparent wgpu surface on top         (presenter, input)
//! +-- <div>     horizontally scrolling card strip       (menu)
//!
//! requestAnimationFrame ──► App::frame ──► touch drain ─► session tick ─► render
//! scroll ──► on_scroll + timeout ──► settle ──► spawn_local(load) ──► finish
//!                                                     └─► fetch + draco decode
//! ```

mod app;
mod camera;
mod draco;
mod fetch;
mod input;
mod menu;
mod presenter;
mod scheduler;

pub use app::{mount, ArMenuHandle};
pub use camera::CameraLayer;
pub use draco::DracoDecoder;
pub use fetch::FetchFetcher;
pub use input::{TouchInput, TouchRecord};
pub use menu::MenuStrip;
pub use presenter::{WebFrame, WebPresenter};
pub use scheduler::FrameScheduler;

use armenu_core::ConfigError;
use thiserror::Error;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use crate::PresenterError;

#[derive(Debug, Error)]
pub enum WebError {
    #[error("No window")]
    NoWindow,
    #[error("Element not found: {0}")]
    ElementNotFound(String),
    #[error("JavaScript error: {0}")]
    Js(String),
    #[error(transparent)]
    Presenter(#[from] PresenterError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<JsValue> for WebError {
    fn from(value: JsValue) -> Self {
        WebError::Js(js_error_message(&value))
    }
}

impl From<WebError> for JsValue {
    fn from(err: WebError) -> Self {
        js_sys::Error::new(&err.to_string()).into()
    }
}

/// Best-effort readable text for a thrown JS value
pub(crate) fn js_error_message(value: &JsValue) -> String {
    if let Some(err) = value.dyn_ref::<js_sys::Error>() {
        return String::from(err.message());
    }
    value.as_string().unwrap_or_else(|| format!("{:?}", value))
}

pub(crate) fn window() -> Result<web_sys::Window, WebError> {
    web_sys::window().ok_or(WebError::NoWindow)
}

/// Milliseconds since page load, as the session's clock
pub(crate) fn now() -> std::time::Duration {
    let millis = web_sys::window()
        .and_then(|w| w.performance())
        .map(|p| p.now())
        .unwrap_or(0.0);
    std::time::Duration::from_secs_f64(millis.max(0.0) / 1000.0)
}

/// Route `log` to the browser console and panics to `console.error`
pub fn init_logging(level: log::Level) {
    console_error_panic_hook::set_once();
    // Already initialised by an earlier mount
    console_log::init_with_level(level).ok();
}
