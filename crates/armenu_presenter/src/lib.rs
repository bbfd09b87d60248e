//! # AR Menu Presenter
//!
//! GPU rendering and browser integration for the AR menu viewer.
//!
//! - [`renderer`]: wgpu scene renderer, the [`armenu_core::Stage`] the
//!   session attaches models to
//! - [`surface`]: canvas sizing and surface format choices
//! - `web` (wasm32 only): canvas, camera feed, card strip, touch input,
//!   frame loop and the `mount` entry point exported to JavaScript

pub mod renderer;
pub mod surface;

#[cfg(target_arch = "wasm32")]
pub mod web;

pub use renderer::{FrameUniforms, MaterialUniforms, RenderStats, SceneRenderer};
pub use surface::{choose_alpha_mode, choose_format, needs_gamma_encode, SurfaceSize};

use thiserror::Error;

/// GPU setup and frame acquisition failures
#[derive(Debug, Error)]
pub enum PresenterError {
    #[error("Failed to create surface: {0}")]
    SurfaceCreation(String),
    #[error("No suitable GPU adapter found")]
    AdapterNotFound,
    #[error("Failed to create device: {0}")]
    DeviceCreation(String),
    #[error("Surface reports no usable format")]
    NoSurfaceFormat,
    #[error("Failed to acquire frame: {0}")]
    FrameAcquisition(String),
    #[error("Surface lost")]
    SurfaceLost,
}
