//! `mount` entry point and the per-viewer state behind it

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use wasm_bindgen::prelude::*;

use armenu_asset::{GltfModelLoader, ModelData};
use armenu_core::{LoadError, MenuSession, PendingModel, Ticket, ViewerConfig};

use super::{
    init_logging, now, window, CameraLayer, DracoDecoder, FetchFetcher, FrameScheduler, MenuStrip, TouchInput, WebError,
    WebPresenter,
};
use crate::renderer::SceneRenderer;

type Loader = GltfModelLoader<FetchFetcher, DracoDecoder>;
type Pending = PendingModel<ModelData>;

/// Everything one mounted viewer owns
///
/// Field order is drop order: the renderer releases its GPU resources
/// before the presenter destroys the device.
struct App {
    scheduler: FrameScheduler,
    input: TouchInput,
    menu: MenuStrip,
    session: MenuSession<Loader>,
    renderer: SceneRenderer,
    camera: CameraLayer,
    presenter: WebPresenter,
    torn_down: bool,
}

impl App {
    async fn new(container_id: &str, config: ViewerConfig) -> Result<Self, WebError> {
        let document = window()?
            .document()
            .ok_or_else(|| WebError::ElementNotFound("document".into()))?;
        let container = document
            .get_element_by_id(container_id)
            .ok_or_else(|| WebError::ElementNotFound(container_id.to_string()))?;

        // The camera prompt runs alongside GPU setup
        let camera = CameraLayer::new(&document, &container, config.facing_mode)?;
        camera.start();

        let presenter = WebPresenter::new(&document, &container, &config).await?;
        let renderer = SceneRenderer::new(
            Arc::clone(presenter.device()),
            Arc::clone(presenter.queue()),
            presenter.format(),
            presenter.size(),
            config.camera,
        );
        let input = TouchInput::attach(presenter.canvas())?;

        let loader =
            GltfModelLoader::new(FetchFetcher).with_decompressor(DracoDecoder::new(&config.decoder_path));
        let session = MenuSession::new(config, loader);
        let menu = MenuStrip::new(&document, &container, session.catalog())?;

        log::info!("Mounted into #{} with {} menu items", container_id, session.catalog().len());

        Ok(Self {
            scheduler: FrameScheduler::new(),
            input,
            menu,
            session,
            renderer,
            camera,
            presenter,
            torn_down: false,
        })
    }

    /// Install listeners that need a handle back to the app, then show item 0
    fn start(app: &Rc<RefCell<App>>) -> Result<(), WebError> {
        let weak = Rc::downgrade(app);
        let on_scroll = Closure::<dyn FnMut(web_sys::Event)>::new({
            let weak = weak.clone();
            move |_: web_sys::Event| {
                with_app(&weak, App::on_scroll);
            }
        });
        let on_timer = Closure::<dyn FnMut()>::new({
            let weak = weak.clone();
            move || {
                if let Some(pending) = with_app(&weak, App::on_quiet).flatten() {
                    spawn_load(&weak, pending);
                }
            }
        });

        let pending = {
            let mut guard = app.borrow_mut();
            let this = &mut *guard;
            this.menu.on_scroll(on_scroll)?;
            this.menu.on_timer(on_timer);
            this.menu.mark_active(0);
            this.session.mount(&mut this.renderer)
        };
        if let Some(pending) = pending {
            spawn_load(&weak, pending);
        }

        app.borrow().scheduler.start(move |timestamp| match weak.upgrade() {
            Some(app) => match app.try_borrow_mut() {
                Ok(mut app) => app.frame(timestamp),
                // Busy with an event handler; try again next frame
                Err(_) => true,
            },
            None => false,
        })
    }

    fn on_scroll(&mut self) {
        let sample = self.menu.sample();
        self.session.on_scroll(now(), sample);
        if let Err(err) = self.menu.arm_timer(self.session.config().quiet_period()) {
            log::error!("Could not arm scroll timer: {}", err);
        }
    }

    fn on_quiet(&mut self) -> Option<Pending> {
        self.menu.timer_fired();
        let now = now();
        let pending = self.session.settle(now, &mut self.renderer);

        // Timers may fire a hair early relative to performance.now()
        if let Some(deadline) = self.session.settle_deadline() {
            let remaining = deadline.saturating_sub(now).max(std::time::Duration::from_millis(1));
            if let Err(err) = self.menu.arm_timer(remaining) {
                log::error!("Could not re-arm scroll timer: {}", err);
            }
        }
        if let Some(index) = self.session.controller().selected() {
            self.menu.mark_active(index);
        }
        pending
    }

    fn finish_load(&mut self, ticket: Ticket, result: Result<Rc<ModelData>, LoadError>) {
        if self.session.finish(ticket, result, &mut self.renderer) {
            self.menu.mark_active(ticket.index());
        }
    }

    /// One animation frame; false ends the loop
    fn frame(&mut self, _timestamp: f64) -> bool {
        if self.torn_down {
            return false;
        }
        for record in self.input.drain() {
            self.session.on_touch(record.phase, &record.touches);
        }
        let transform = self.session.tick();

        match self.presenter.begin_frame() {
            Ok(frame) => {
                self.renderer.render(&frame.view, frame.size, transform.as_ref());
                self.presenter.present(frame);
            }
            Err(err) => log::debug!("Skipping frame: {}", err),
        }
        true
    }

    fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        self.scheduler.stop();
        self.input.detach();
        self.menu.teardown();
        self.session.teardown(&mut self.renderer);
        self.camera.close();
        log::info!(
            "Unmounted after {} frames ({} uploads, {} releases)",
            self.scheduler.frames(),
            self.renderer.stats().uploads,
            self.renderer.stats().releases
        );
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Run `f` against the app if it is still mounted and not already borrowed
fn with_app<R>(weak: &Weak<RefCell<App>>, f: impl FnOnce(&mut App) -> R) -> Option<R> {
    let app = weak.upgrade()?;
    let mut guard = match app.try_borrow_mut() {
        Ok(guard) => guard,
        Err(_) => {
            log::warn!("Viewer busy, dropping re-entrant callback");
            return None;
        }
    };
    if guard.torn_down {
        return None;
    }
    Some(f(&mut *guard))
}

/// Drive a model load to completion on the browser event loop
fn spawn_load(weak: &Weak<RefCell<App>>, pending: Pending) {
    let weak = weak.clone();
    wasm_bindgen_futures::spawn_local(async move {
        let (ticket, result) = pending.resolve().await;
        if with_app(&weak, |app| app.finish_load(ticket, result)).is_none() {
            log::debug!("Load for item {} finished after unmount", ticket.index());
        }
    });
}

/// Handle returned to JavaScript by [`mount`]
#[wasm_bindgen]
pub struct ArMenuHandle {
    app: Option<Rc<RefCell<App>>>,
}

#[wasm_bindgen]
impl ArMenuHandle {
    /// Stop rendering, release the camera and GPU, and remove all elements
    pub fn unmount(&mut self) {
        if let Some(app) = self.app.take() {
            app.borrow_mut().teardown();
        }
    }

    #[wasm_bindgen(getter, js_name = selectedIndex)]
    pub fn selected_index(&self) -> Option<usize> {
        let app = self.app.as_ref()?;
        let app = app.try_borrow().ok()?;
        app.session.controller().selected()
    }

    #[wasm_bindgen(getter, js_name = isMounted)]
    pub fn is_mounted(&self) -> bool {
        self.app.is_some()
    }
}

/// Mount the viewer into the element with id `container_id`.
///
/// `config_json` overrides [`ViewerConfig`] defaults. Rejects when the
/// container is missing, the config is invalid or no GPU context can be
/// created; camera denial and model failures are only logged.
#[wasm_bindgen]
pub async fn mount(container_id: String, config_json: Option<String>) -> Result<ArMenuHandle, JsValue> {
    let config = match config_json.as_deref().map(str::trim) {
        Some(json) if !json.is_empty() => ViewerConfig::from_json(json).map_err(WebError::from)?,
        _ => ViewerConfig::default(),
    };
    init_logging(config.log_level());

    let app = Rc::new(RefCell::new(App::new(&container_id, config).await?));
    if let Err(err) = App::start(&app) {
        app.borrow_mut().teardown();
        return Err(err.into());
    }

    Ok(ArMenuHandle { app: Some(app) })
}
