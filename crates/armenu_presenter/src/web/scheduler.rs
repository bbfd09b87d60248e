//! requestAnimationFrame loop
//!
//! Starts at most once and stops at most once. Stopping cancels the pending
//! request and drops the callback, so nothing outlives the viewer.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use armenu_core::{LoopLifecycle, LoopState};

use super::{window, WebError};

type FrameCallback = Closure<dyn FnMut(f64)>;

pub struct FrameScheduler {
    lifecycle: Rc<RefCell<LoopLifecycle>>,
    request_id: Rc<Cell<Option<i32>>>,
    callback: Rc<RefCell<Option<FrameCallback>>>,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self {
            lifecycle: Rc::new(RefCell::new(LoopLifecycle::new())),
            request_id: Rc::new(Cell::new(None)),
            callback: Rc::new(RefCell::new(None)),
        }
    }

    pub fn state(&self) -> LoopState {
        self.lifecycle.borrow().state()
    }

    pub fn frames(&self) -> u64 {
        self.lifecycle.borrow().frames()
    }

    /// Call `tick(timestamp)` once per display frame until it returns false
    /// or [`stop`](Self::stop) is called. A second start is ignored.
    pub fn start<F>(&self, mut tick: F) -> Result<(), WebError>
    where
        F: FnMut(f64) -> bool + 'static,
    {
        if !self.lifecycle.borrow_mut().start() {
            log::debug!("Frame loop already started");
            return Ok(());
        }

        let lifecycle = Rc::clone(&self.lifecycle);
        let request_id = Rc::clone(&self.request_id);
        let slot = Rc::downgrade(&self.callback);

        let callback = Closure::<dyn FnMut(f64)>::new(move |timestamp: f64| {
            request_id.set(None);
            if !lifecycle.borrow_mut().frame() {
                return;
            }
            if !tick(timestamp) {
                lifecycle.borrow_mut().stop();
                return;
            }
            let Some(slot) = slot.upgrade() else {
                return;
            };
            let slot = slot.borrow();
            if let Some(callback) = slot.as_ref() {
                match request_frame(callback) {
                    Ok(id) => request_id.set(Some(id)),
                    Err(err) => log::error!("requestAnimationFrame failed: {}", err),
                }
            }
        });

        let id = match request_frame(&callback) {
            Ok(id) => id,
            Err(err) => {
                self.lifecycle.borrow_mut().stop();
                return Err(err);
            }
        };
        self.request_id.set(Some(id));
        *self.callback.borrow_mut() = Some(callback);
        Ok(())
    }

    /// Cancel the loop; true only for the call that actually stopped it
    pub fn stop(&self) -> bool {
        let stopped = self.lifecycle.borrow_mut().stop();
        if let Some(id) = self.request_id.take() {
            if let Ok(window) = window() {
                window.cancel_animation_frame(id).ok();
            }
        }
        self.callback.borrow_mut().take();
        if stopped {
            log::debug!("Frame loop stopped after {} frames", self.frames());
        }
        stopped
    }
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for FrameScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn request_frame(callback: &FrameCallback) -> Result<i32, WebError> {
    Ok(window()?.request_animation_frame(callback.as_ref().unchecked_ref())?)
}
