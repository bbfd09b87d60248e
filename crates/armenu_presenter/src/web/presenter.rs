//! Canvas surface over the camera feed
//!
//! Owns the canvas, the wgpu device and the surface. Size changes arrive
//! through a `ResizeObserver` and are applied at the start of the next frame.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlCanvasElement};

use armenu_core::{PixelRatioMode, PowerPreference, ViewerConfig};

use super::{window, WebError};
use crate::surface::{choose_alpha_mode, choose_format, SurfaceSize};
use crate::PresenterError;

const CANVAS_STYLE: &str = "position:absolute;inset:0;width:100%;height:100%;\
     display:block;z-index:1;background:transparent;touch-action:none;";

/// Sizes written by the resize observer, read on the next frame
struct PresenterState {
    size: RwLock<SurfaceSize>,
    needs_reconfigure: AtomicBool,
}

/// One acquired swapchain image
pub struct WebFrame {
    pub texture: wgpu::SurfaceTexture,
    pub view: wgpu::TextureView,
    pub size: (u32, u32),
}

pub struct WebPresenter {
    canvas: HtmlCanvasElement,
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    backend: wgpu::Backend,
    state: Arc<PresenterState>,
    resize_observer: Option<web_sys::ResizeObserver>,
    _resize_callback: Option<Closure<dyn FnMut(js_sys::Array)>>,
    torn_down: bool,
}

impl WebPresenter {
    /// Create a canvas inside `container` and bring up a device for it.
    /// The canvas is removed again if any step fails.
    pub async fn new(
        document: &Document,
        container: &Element,
        config: &ViewerConfig,
    ) -> Result<Self, WebError> {
        let canvas: HtmlCanvasElement = document
            .create_element("canvas")?
            .dyn_into()
            .map_err(|_| WebError::Js("created element is not a canvas".into()))?;
        canvas.set_attribute("style", CANVAS_STYLE)?;
        container.append_child(&canvas)?;

        match Self::with_canvas(canvas.clone(), config).await {
            Ok(presenter) => Ok(presenter),
            Err(err) => {
                canvas.remove();
                Err(err)
            }
        }
    }

    async fn with_canvas(canvas: HtmlCanvasElement, config: &ViewerConfig) -> Result<Self, WebError> {
        let window = window()?;
        let user_agent = window.navigator().user_agent().unwrap_or_default();
        let pixel_ratio = config.pixel_ratio;

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::BROWSER_WEBGPU | wgpu::Backends::GL,
            ..Default::default()
        });

        let surface = instance
            .create_surface(wgpu::SurfaceTarget::Canvas(canvas.clone()))
            .map_err(|e| PresenterError::SurfaceCreation(e.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: match config.power_preference {
                    PowerPreference::LowPower => wgpu::PowerPreference::LowPower,
                    PowerPreference::HighPerformance => wgpu::PowerPreference::HighPerformance,
                },
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(PresenterError::AdapterNotFound)?;

        let info = adapter.get_info();
        log::info!("Using adapter {:?} ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("armenu_device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_webgl2_defaults()
                        .using_resolution(adapter.limits()),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .map_err(|e| PresenterError::DeviceCreation(e.to_string()))?;
        let max_dimension = device.limits().max_texture_dimension_2d;

        let size = SurfaceSize::for_mode(
            canvas.client_width() as f64,
            canvas.client_height() as f64,
            pixel_ratio,
            window.device_pixel_ratio(),
            &user_agent,
            max_dimension,
        );
        canvas.set_width(size.physical.0);
        canvas.set_height(size.physical.1);
        log::info!(
            "Canvas {}x{}, physical {}x{}, ratio {:.2}",
            size.css.0,
            size.css.1,
            size.physical.0,
            size.physical.1,
            size.pixel_ratio
        );

        let caps = surface.get_capabilities(&adapter);
        let format = choose_format(&caps.formats).ok_or(PresenterError::NoSurfaceFormat)?;
        let alpha_mode = choose_alpha_mode(&caps.alpha_modes);
        if alpha_mode == wgpu::CompositeAlphaMode::Opaque {
            log::warn!("Surface cannot composite alpha; the camera feed will be hidden");
        }

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.physical.0,
            height: size.physical.1,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let state = Arc::new(PresenterState {
            size: RwLock::new(size),
            needs_reconfigure: AtomicBool::new(false),
        });

        let mut presenter = Self {
            canvas,
            device: Arc::new(device),
            queue: Arc::new(queue),
            surface,
            surface_config,
            backend: info.backend,
            state,
            resize_observer: None,
            _resize_callback: None,
            torn_down: false,
        };
        presenter.observe_resize(pixel_ratio, user_agent, max_dimension)?;
        Ok(presenter)
    }

    fn observe_resize(
        &mut self,
        pixel_ratio: PixelRatioMode,
        user_agent: String,
        max_dimension: u32,
    ) -> Result<(), WebError> {
        let window = window()?;
        let state = Arc::clone(&self.state);

        let callback = Closure::<dyn FnMut(js_sys::Array)>::new(move |entries: js_sys::Array| {
            for entry in entries.iter() {
                let Ok(entry) = entry.dyn_into::<web_sys::ResizeObserverEntry>() else {
                    continue;
                };
                let rect = entry.content_rect();
                let size = SurfaceSize::for_mode(
                    rect.width(),
                    rect.height(),
                    pixel_ratio,
                    window.device_pixel_ratio(),
                    &user_agent,
                    max_dimension,
                );
                let mut current = state.size.write();
                if *current != size {
                    log::debug!(
                        "Resize: CSS {}x{}, physical {}x{}",
                        size.css.0,
                        size.css.1,
                        size.physical.0,
                        size.physical.1
                    );
                    *current = size;
                    state.needs_reconfigure.store(true, Ordering::SeqCst);
                }
            }
        });

        let observer = web_sys::ResizeObserver::new(callback.as_ref().unchecked_ref())?;
        observer.observe(&self.canvas);
        self.resize_observer = Some(observer);
        self._resize_callback = Some(callback);
        Ok(())
    }

    pub fn device(&self) -> &Arc<wgpu::Device> {
        &self.device
    }

    pub fn queue(&self) -> &Arc<wgpu::Queue> {
        &self.queue
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.surface_config.format
    }

    pub fn size(&self) -> (u32, u32) {
        (self.surface_config.width, self.surface_config.height)
    }

    pub fn canvas(&self) -> &HtmlCanvasElement {
        &self.canvas
    }

    fn handle_reconfigure(&mut self) {
        if !self.state.needs_reconfigure.swap(false, Ordering::SeqCst) {
            return;
        }
        let (width, height) = self.state.size.read().physical;

        self.canvas.set_width(width);
        self.canvas.set_height(height);
        self.surface_config.width = width;
        self.surface_config.height = height;
        self.surface.configure(&self.device, &self.surface_config);

        log::debug!("Surface reconfigured to {}x{}", width, height);
    }

    /// Acquire the next frame, applying any pending resize first
    pub fn begin_frame(&mut self) -> Result<WebFrame, PresenterError> {
        if self.torn_down {
            return Err(PresenterError::SurfaceLost);
        }
        self.handle_reconfigure();

        let texture = self.surface.get_current_texture().map_err(|e| match e {
            wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
                self.state.needs_reconfigure.store(true, Ordering::SeqCst);
                PresenterError::SurfaceLost
            }
            other => PresenterError::FrameAcquisition(other.to_string()),
        })?;
        let view = texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        Ok(WebFrame {
            texture,
            view,
            size: self.size(),
        })
    }

    pub fn present(&self, frame: WebFrame) {
        frame.texture.present();
    }

    /// Release the GPU context and remove the canvas. Safe to call twice.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        if let Some(observer) = self.resize_observer.take() {
            observer.disconnect();
        }
        self._resize_callback = None;

        self.device.destroy();
        if self.backend == wgpu::Backend::Gl {
            self.lose_webgl_context();
        }
        self.canvas.remove();
        log::info!("Presenter torn down");
    }

    /// WebGL contexts are a scarce per-page resource; give ours back eagerly
    fn lose_webgl_context(&self) {
        let Ok(Some(context)) = self.canvas.get_context("webgl2") else {
            return;
        };
        let Ok(context) = context.dyn_into::<web_sys::WebGl2RenderingContext>() else {
            return;
        };
        if let Ok(Some(extension)) = context.get_extension("WEBGL_lose_context") {
            extension
                .unchecked_into::<web_sys::WebglLoseContext>()
                .lose_context();
        }
    }
}

impl Drop for WebPresenter {
    fn drop(&mut self) {
        self.teardown();
    }
}
