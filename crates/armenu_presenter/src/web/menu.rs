//! Card strip
//!
//! Presentation only: one snap-scrolling card per catalog item along the
//! bottom of the viewer. Its scroll position is what drives selection; the
//! listener and the quiet-period timer are installed by the app.

use std::time::Duration;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlElement};

use armenu_core::{Catalog, MenuItem, ScrollSample};

use super::{window, WebError};

const STRIP_STYLE: &str = "position:absolute;left:0;right:0;bottom:0;z-index:2;\
     display:flex;overflow-x:auto;overflow-y:hidden;scroll-snap-type:x mandatory;\
     -webkit-overflow-scrolling:touch;scrollbar-width:none;";
const CARD_STYLE: &str = "flex:0 0 100%;box-sizing:border-box;scroll-snap-align:center;\
     padding:12px 16px;margin:0;background:rgba(255,255,255,0.92);color:#222;\
     font-family:system-ui,sans-serif;border-radius:16px 16px 0 0;";
const BUTTON_STYLE: &str = "margin-left:12px;padding:6px 14px;border:none;border-radius:8px;\
     background:#e23744;color:#fff;font-weight:600;";

pub struct MenuStrip {
    strip: HtmlElement,
    scroll_listener: Option<Closure<dyn FnMut(web_sys::Event)>>,
    timer: Option<Closure<dyn FnMut()>>,
    timer_id: Option<i32>,
}

impl MenuStrip {
    pub fn new(document: &Document, container: &Element, catalog: &Catalog) -> Result<Self, WebError> {
        let strip: HtmlElement = create(document, "div")?
            .dyn_into()
            .map_err(|_| WebError::Js("created element is not an HtmlElement".into()))?;
        strip.set_attribute("style", STRIP_STYLE)?;
        strip.set_attribute("data-menu-strip", "")?;

        for (index, item) in catalog.items().iter().enumerate() {
            let card = build_card(document, catalog, index, item)?;
            strip.append_child(&card)?;
        }
        container.append_child(&strip)?;

        Ok(Self {
            strip,
            scroll_listener: None,
            timer: None,
            timer_id: None,
        })
    }

    pub fn element(&self) -> &HtmlElement {
        &self.strip
    }

    /// Current scroll position and card geometry
    pub fn sample(&self) -> ScrollSample {
        let card_width = self
            .strip
            .first_element_child()
            .and_then(|card| card.dyn_into::<HtmlElement>().ok())
            .map(|card| card.offset_width() as f64)
            .unwrap_or(0.0);

        ScrollSample {
            offset: self.strip.scroll_left() as f64,
            card_width,
            viewport_width: self.strip.client_width() as f64,
        }
    }

    pub fn on_scroll(&mut self, listener: Closure<dyn FnMut(web_sys::Event)>) -> Result<(), WebError> {
        self.remove_scroll_listener();
        self.strip
            .add_event_listener_with_callback("scroll", listener.as_ref().unchecked_ref())?;
        self.scroll_listener = Some(listener);
        Ok(())
    }

    pub fn on_timer(&mut self, callback: Closure<dyn FnMut()>) {
        self.cancel_timer();
        self.timer = Some(callback);
    }

    /// (Re)start the single quiet-period timeout
    pub fn arm_timer(&mut self, delay: Duration) -> Result<(), WebError> {
        self.cancel_timer();
        let Some(callback) = self.timer.as_ref() else {
            return Ok(());
        };
        let millis = delay.as_millis().min(i32::MAX as u128) as i32;
        let id = window()?.set_timeout_with_callback_and_timeout_and_arguments_0(
            callback.as_ref().unchecked_ref(),
            millis,
        )?;
        self.timer_id = Some(id);
        Ok(())
    }

    /// Forget the timeout id once it has fired
    pub fn timer_fired(&mut self) {
        self.timer_id = None;
    }

    fn cancel_timer(&mut self) {
        if let Some(id) = self.timer_id.take() {
            if let Ok(window) = window() {
                window.clear_timeout_with_handle(id);
            }
        }
    }

    /// Flag the card whose model is on stage
    pub fn mark_active(&self, index: usize) {
        let cards = self.strip.children();
        for i in 0..cards.length() {
            if let Some(card) = cards.item(i) {
                let result = if i as usize == index {
                    card.set_attribute("data-active", "")
                } else {
                    card.remove_attribute("data-active")
                };
                result.ok();
            }
        }
    }

    fn remove_scroll_listener(&mut self) {
        if let Some(listener) = self.scroll_listener.take() {
            self.strip
                .remove_event_listener_with_callback("scroll", listener.as_ref().unchecked_ref())
                .ok();
        }
    }

    pub fn teardown(&mut self) {
        self.remove_scroll_listener();
        self.cancel_timer();
        self.timer = None;
        self.strip.remove();
    }
}

impl Drop for MenuStrip {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn create(document: &Document, tag: &str) -> Result<Element, WebError> {
    Ok(document.create_element(tag)?)
}

fn text(document: &Document, tag: &str, content: &str, style: &str) -> Result<Element, WebError> {
    let element = create(document, tag)?;
    element.set_text_content(Some(content));
    if !style.is_empty() {
        element.set_attribute("style", style)?;
    }
    Ok(element)
}

fn build_card(document: &Document, catalog: &Catalog, index: usize, item: &MenuItem) -> Result<Element, WebError> {
    let card = create(document, "article")?;
    card.set_attribute("style", CARD_STYLE)?;
    card.set_attribute("data-menu-card", &index.to_string())?;
    card.set_attribute("data-asset-key", item.asset_key)?;

    if let Some(category) = catalog.category_of(item) {
        let label = format!("{} {}", category.icon, category.name);
        card.append_child(&text(document, "div", &label, "font-size:12px;opacity:0.7;")?)?;
    }
    card.append_child(&text(document, "h3", item.name, "margin:4px 0;font-size:18px;")?)?;
    card.append_child(&text(
        document,
        "p",
        item.description,
        "margin:0 0 8px;font-size:13px;line-height:1.3;",
    )?)?;

    let footer = create(document, "div")?;
    footer.set_attribute("style", "display:flex;align-items:center;justify-content:space-between;")?;
    footer.append_child(&text(
        document,
        "span",
        &format!("₹{}", item.price),
        "font-weight:700;font-size:16px;",
    )?)?;
    // Inert: ordering is out of scope for the viewer
    let button = text(document, "button", "Add to Cart", BUTTON_STYLE)?;
    button.set_attribute("type", "button")?;
    footer.append_child(&button)?;
    card.append_child(&footer)?;

    Ok(card)
}
