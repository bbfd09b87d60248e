//! Menu session: wires scroll, gestures, cache and controller together
//!
//! All methods are synchronous. Loads that can not be served from the cache
//! come back as a [`PendingModel`]; the host runs it on its executor and
//! reports the outcome through [`MenuSession::finish`].

use std::rc::Rc;
use std::time::Duration;

use crate::cache::{Lookup, ModelCache, ModelLoader, SharedLoad};
use crate::catalog::{Catalog, MenuItem};
use crate::config::ViewerConfig;
use crate::controller::{ActiveModelController, Stage, Ticket};
use crate::error::LoadError;
use crate::gesture::{GestureMapper, GestureState, TouchPhase, TouchPoint};
use crate::scene::ModelTransform;
use crate::selection::{ScrollSample, ScrollTracker};

/// A load the host has to drive to completion
pub struct PendingModel<M> {
    pub ticket: Ticket,
    pub load: SharedLoad<M>,
}

impl<M> PendingModel<M> {
    /// Await the load, pairing the result with its ticket
    pub async fn resolve(self) -> (Ticket, Result<Rc<M>, LoadError>) {
        let result = self.load.await;
        (self.ticket, result)
    }
}

pub struct MenuSession<L: ModelLoader> {
    config: ViewerConfig,
    catalog: Catalog,
    scroll: ScrollTracker,
    gestures: GestureMapper,
    cache: ModelCache<L>,
    controller: ActiveModelController<L::Model>,
}

impl<L: ModelLoader> MenuSession<L> {
    /// Session over the built-in catalog
    pub fn new(config: ViewerConfig, loader: L) -> Self {
        Self::with_catalog(config, Catalog::builtin(), loader)
    }

    pub fn with_catalog(config: ViewerConfig, catalog: Catalog, loader: L) -> Self {
        Self {
            scroll: ScrollTracker::new(catalog.len(), config.quiet_period()),
            gestures: GestureMapper::new(config.gesture),
            cache: ModelCache::new(loader),
            controller: ActiveModelController::new(config.anchor(), config.motion),
            catalog,
            config,
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn cache(&self) -> &ModelCache<L> {
        &self.cache
    }

    pub fn controller(&self) -> &ActiveModelController<L::Model> {
        &self.controller
    }

    pub fn gesture_state(&self) -> &GestureState {
        self.gestures.state()
    }

    /// Active selection index
    pub fn current_index(&self) -> usize {
        self.scroll.current()
    }

    pub fn current_item(&self) -> Option<&MenuItem> {
        self.catalog.get(self.scroll.current())
    }

    /// When the pending scroll settle is due
    pub fn settle_deadline(&self) -> Option<Duration> {
        self.scroll.settle_deadline()
    }

    /// Show the first item
    pub fn mount(&mut self, stage: &mut impl Stage<L::Model>) -> Option<PendingModel<L::Model>> {
        log::info!("Menu session mounted with {} items", self.catalog.len());
        self.select(0, stage)
    }

    pub fn on_scroll(&mut self, now: Duration, sample: ScrollSample) {
        self.scroll.on_scroll(now, sample);
    }

    /// Apply a settled scroll position, if its quiet period has elapsed
    pub fn settle(
        &mut self,
        now: Duration,
        stage: &mut impl Stage<L::Model>,
    ) -> Option<PendingModel<L::Model>> {
        let change = self.scroll.settle(now)?;
        self.activate(change.current, stage)
    }

    /// Jump straight to an item
    pub fn select(
        &mut self,
        index: usize,
        stage: &mut impl Stage<L::Model>,
    ) -> Option<PendingModel<L::Model>> {
        if index >= self.catalog.len() {
            log::warn!("Ignoring selection {} outside menu of {}", index, self.catalog.len());
            return None;
        }
        if self.controller.selected() == Some(index) {
            return None;
        }
        self.scroll.set_current(index);
        self.activate(index, stage)
    }

    /// Report a finished load; true when the model went on stage
    pub fn finish(
        &mut self,
        ticket: Ticket,
        result: Result<Rc<L::Model>, LoadError>,
        stage: &mut impl Stage<L::Model>,
    ) -> bool {
        match result {
            Ok(model) => self.controller.attach(ticket, model, stage),
            Err(err) => {
                self.controller.load_failed(ticket, &err);
                false
            }
        }
    }

    pub fn on_touch(&mut self, phase: TouchPhase, touches: &[TouchPoint]) {
        self.gestures.handle(phase, touches);
    }

    /// Per-frame step; `None` while nothing is attached
    pub fn tick(&mut self) -> Option<ModelTransform> {
        self.controller.tick(self.gestures.state_mut())
    }

    /// Take the active model off stage
    pub fn teardown(&mut self, stage: &mut impl Stage<L::Model>) {
        self.controller.clear(stage);
    }

    fn activate(
        &mut self,
        index: usize,
        stage: &mut impl Stage<L::Model>,
    ) -> Option<PendingModel<L::Model>> {
        let item = self.catalog.get(index)?;
        let ticket = self.controller.select(index, stage);
        log::info!("Selected {} ({})", item.name, item.asset_key);

        let path = self.config.asset_url(item.asset_path);
        match self.cache.get_or_load(item.asset_key, &path) {
            Lookup::Ready(model) => {
                self.controller.attach(ticket, model, stage);
                None
            }
            Lookup::Pending(load) => Some(PendingModel { ticket, load }),
        }
    }
}
