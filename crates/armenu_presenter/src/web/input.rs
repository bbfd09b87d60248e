//! Touch input on the canvas
//!
//! Listeners are registered non-passive so `preventDefault` can stop the
//! page from scrolling or zooming while the model is being handled. Events
//! are queued and drained once per frame.

use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{AddEventListenerOptions, EventTarget, TouchEvent};

use armenu_core::{TouchPhase, TouchPoint};

use super::WebError;

/// One touch event: its phase and the touches still on the surface
#[derive(Debug, Clone, PartialEq)]
pub struct TouchRecord {
    pub phase: TouchPhase,
    pub touches: Vec<TouchPoint>,
}

pub struct TouchInput {
    target: EventTarget,
    events: Rc<RefCell<Vec<TouchRecord>>>,
    listeners: Vec<(&'static str, Closure<dyn FnMut(web_sys::Event)>)>,
}

impl TouchInput {
    pub fn attach(target: &EventTarget) -> Result<Self, WebError> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let mut input = Self {
            target: target.clone(),
            events,
            listeners: Vec::with_capacity(4),
        };

        let options = AddEventListenerOptions::new();
        options.set_passive(false);

        for (event_name, phase) in [
            ("touchstart", TouchPhase::Start),
            ("touchmove", TouchPhase::Move),
            ("touchend", TouchPhase::End),
            ("touchcancel", TouchPhase::Cancel),
        ] {
            let events = Rc::clone(&input.events);
            let closure = Closure::<dyn FnMut(_)>::new(move |e: web_sys::Event| {
                let Ok(e) = e.dyn_into::<TouchEvent>() else {
                    return;
                };
                e.prevent_default();
                let list = e.touches();
                let touches = (0..list.length())
                    .filter_map(|i| list.get(i))
                    .map(|t| TouchPoint::new(t.client_x() as f32, t.client_y() as f32))
                    .collect();
                events.borrow_mut().push(TouchRecord { phase, touches });
            });
            input
                .target
                .add_event_listener_with_callback_and_add_event_listener_options(
                    event_name,
                    closure.as_ref().unchecked_ref(),
                    &options,
                )?;
            input.listeners.push((event_name, closure));
        }

        Ok(input)
    }

    /// Everything queued since the last drain, oldest first
    pub fn drain(&self) -> Vec<TouchRecord> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    pub fn detach(&mut self) {
        for (event_name, closure) in self.listeners.drain(..) {
            self.target
                .remove_event_listener_with_callback(event_name, closure.as_ref().unchecked_ref())
                .ok();
        }
        self.events.borrow_mut().clear();
    }
}

impl Drop for TouchInput {
    fn drop(&mut self) {
        self.detach();
    }
}
