//! [`ResourceFetcher`] over `window.fetch`

use futures_util::future::{FutureExt, LocalBoxFuture};
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::Response;

use armenu_asset::ResourceFetcher;
use armenu_core::LoadError;

use super::js_error_message;

#[derive(Debug, Default, Clone, Copy)]
pub struct FetchFetcher;

impl ResourceFetcher for FetchFetcher {
    fn fetch(&self, url: &str) -> LocalBoxFuture<'static, Result<Vec<u8>, LoadError>> {
        let url = url.to_string();
        async move { fetch_bytes(&url).await }.boxed_local()
    }
}

async fn fetch_bytes(url: &str) -> Result<Vec<u8>, LoadError> {
    let window = web_sys::window().ok_or_else(|| LoadError::fetch(url, "no window"))?;

    let response = JsFuture::from(window.fetch_with_str(url))
        .await
        .map_err(|e| LoadError::fetch(url, js_error_message(&e)))?;
    let response: Response = response
        .dyn_into()
        .map_err(|_| LoadError::fetch(url, "fetch did not return a Response"))?;
    if !response.ok() {
        return Err(LoadError::fetch(
            url,
            format!("HTTP {} {}", response.status(), response.status_text()),
        ));
    }

    let body = response
        .array_buffer()
        .map_err(|e| LoadError::fetch(url, js_error_message(&e)))?;
    let buffer = JsFuture::from(body)
        .await
        .map_err(|e| LoadError::fetch(url, js_error_message(&e)))?;
    Ok(js_sys::Uint8Array::new(&buffer).to_vec())
}
