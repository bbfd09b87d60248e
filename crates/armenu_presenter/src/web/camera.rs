//! Camera feed backdrop
//!
//! A muted inline `<video>` behind the canvas. The stream is requested once;
//! if it is refused the video element is removed and the model renders over
//! the page background instead.

use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Document, Element, HtmlVideoElement, MediaStream, MediaStreamConstraints, MediaStreamTrack};

use armenu_core::{CameraError, CameraFeed, CameraRequest, CameraStatus, FacingMode};

use super::{js_error_message, window, WebError};

const VIDEO_STYLE: &str = "position:absolute;inset:0;width:100%;height:100%;\
     object-fit:cover;z-index:0;pointer-events:none;";

pub struct CameraLayer {
    video: HtmlVideoElement,
    feed: Rc<RefCell<CameraFeed>>,
    stream: Rc<RefCell<Option<MediaStream>>>,
}

impl CameraLayer {
    pub fn new(document: &Document, container: &Element, facing_mode: FacingMode) -> Result<Self, WebError> {
        let video: HtmlVideoElement = document
            .create_element("video")?
            .dyn_into()
            .map_err(|_| WebError::Js("created element is not a video".into()))?;
        video.set_attribute("style", VIDEO_STYLE)?;
        video.set_attribute("playsinline", "")?;
        video.set_autoplay(true);
        video.set_muted(true);
        container.append_child(&video)?;

        Ok(Self {
            video,
            feed: Rc::new(RefCell::new(CameraFeed::new(facing_mode))),
            stream: Rc::new(RefCell::new(None)),
        })
    }

    pub fn status(&self) -> CameraStatus {
        self.feed.borrow().status().clone()
    }

    /// Ask for the camera in the background; the viewer does not wait on it
    pub fn start(&self) {
        let request = match self.feed.borrow_mut().begin() {
            Ok(request) => request,
            Err(err) => {
                log::warn!("Camera not requested: {}", err);
                return;
            }
        };

        let video = self.video.clone();
        let feed = Rc::clone(&self.feed);
        let slot = Rc::clone(&self.stream);
        wasm_bindgen_futures::spawn_local(async move {
            match request_stream(&request).await {
                Ok(stream) => {
                    // Closed while the prompt was up
                    if !feed.borrow_mut().started() {
                        stop_tracks(&stream);
                        return;
                    }
                    video.set_src_object(Some(&stream));
                    if let Err(err) = video.play() {
                        log::warn!("Camera video did not start: {}", js_error_message(&err));
                    }
                    *slot.borrow_mut() = Some(stream);
                    log::info!("Camera streaming ({})", request.facing_mode);
                }
                Err(err) => {
                    log::warn!("{}", err);
                    feed.borrow_mut().failed(&err);
                    video.remove();
                }
            }
        });
    }

    /// Stop every track and remove the video element
    pub fn close(&self) {
        self.feed.borrow_mut().close();
        if let Some(stream) = self.stream.borrow_mut().take() {
            stop_tracks(&stream);
        }
        self.video.set_src_object(None);
        self.video.remove();
    }
}

impl Drop for CameraLayer {
    fn drop(&mut self) {
        self.close();
    }
}

async fn request_stream(request: &CameraRequest) -> Result<MediaStream, CameraError> {
    let unavailable = |e: wasm_bindgen::JsValue| CameraError::NotAvailable(js_error_message(&e));

    let window = window().map_err(|e| CameraError::NotAvailable(e.to_string()))?;
    let devices = window.navigator().media_devices().map_err(unavailable)?;
    let constraints: MediaStreamConstraints = js_sys::JSON::parse(&request.constraints().to_string())
        .map_err(unavailable)?
        .unchecked_into();
    let promise = devices
        .get_user_media_with_constraints(&constraints)
        .map_err(unavailable)?;

    let stream = JsFuture::from(promise)
        .await
        .map_err(|e| CameraError::Denied(js_error_message(&e)))?;
    stream
        .dyn_into::<MediaStream>()
        .map_err(|_| CameraError::NotAvailable("getUserMedia did not return a stream".into()))
}

fn stop_tracks(stream: &MediaStream) {
    for track in stream.get_tracks().iter() {
        track.unchecked_into::<MediaStreamTrack>().stop();
    }
}
