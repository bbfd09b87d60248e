//! [`MeshDecompressor`] over the Draco decoder bundle
//!
//! `draco_wasm_wrapper.js` and `draco_decoder.wasm` are served from the
//! configured decoder path. The wrapper script is injected on the first
//! compressed mesh and the decoder module is shared by every load after it.

use std::cell::RefCell;
use std::rc::Rc;

use futures_util::future::{FutureExt, LocalBoxFuture, Shared};
use js_sys::{Array, Float32Array, Function, Int8Array, Object, Promise, Reflect, Uint32Array, Uint8Array};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::HtmlScriptElement;

use armenu_asset::{CompressedMesh, DecodedMesh, MeshDecompressor};
use armenu_core::LoadError;

use super::{js_error_message, window};

const WRAPPER_SCRIPT: &str = "draco_wasm_wrapper.js";
const FACTORY: &str = "DracoDecoderModule";

type ModuleLoad = Shared<LocalBoxFuture<'static, Result<JsValue, LoadError>>>;

pub struct DracoDecoder {
    decoder_path: String,
    module: Rc<RefCell<Option<ModuleLoad>>>,
}

impl DracoDecoder {
    pub fn new(decoder_path: &str) -> Self {
        let mut decoder_path = decoder_path.to_string();
        if !decoder_path.ends_with('/') {
            decoder_path.push('/');
        }
        Self {
            decoder_path,
            module: Rc::new(RefCell::new(None)),
        }
    }

    fn module(&self) -> ModuleLoad {
        self.module
            .borrow_mut()
            .get_or_insert_with(|| load_module(self.decoder_path.clone()).boxed_local().shared())
            .clone()
    }
}

impl MeshDecompressor for DracoDecoder {
    fn decompress(&self, mesh: CompressedMesh) -> LocalBoxFuture<'static, Result<DecodedMesh, LoadError>> {
        let module = self.module();
        let slot = Rc::clone(&self.module);
        async move {
            let draco = match module.await {
                Ok(draco) => draco,
                Err(err) => {
                    // Let the next compressed mesh try the bundle again
                    slot.borrow_mut().take();
                    return Err(err);
                }
            };
            decode_mesh(&draco, &mesh).map_err(|reason| LoadError::decode(&mesh.source, reason))
        }
        .boxed_local()
    }
}

async fn load_module(decoder_path: String) -> Result<JsValue, LoadError> {
    let script_url = format!("{}{}", decoder_path, WRAPPER_SCRIPT);
    let fetch_error = |e: JsValue| LoadError::fetch(&script_url, js_error_message(&e));

    let window = window().map_err(|e| LoadError::fetch(&script_url, e))?;
    if !Reflect::get(&window, &FACTORY.into()).map_err(fetch_error)?.is_function() {
        inject_script(&script_url).await.map_err(fetch_error)?;
    }
    let factory: Function = Reflect::get(&window, &FACTORY.into())
        .map_err(fetch_error)?
        .dyn_into()
        .map_err(|_| LoadError::fetch(&script_url, format!("{} did not define {}", WRAPPER_SCRIPT, FACTORY)))?;

    // The wasm binary sits next to the wrapper
    let locate = Closure::<dyn Fn(String) -> String>::new(move |file: String| format!("{}{}", decoder_path, file));
    let config = Object::new();
    Reflect::set(&config, &"locateFile".into(), locate.as_ref()).map_err(fetch_error)?;

    let pending = factory.call1(&JsValue::NULL, &config).map_err(fetch_error)?;
    let module = JsFuture::from(module_ready(pending)).await.map_err(fetch_error)?;
    let module = Reflect::get(&module, &"module".into()).map_err(fetch_error)?;
    drop(locate);

    log::info!("Draco decoder ready from {}", script_url);
    Ok(module)
}

async fn inject_script(src: &str) -> Result<(), JsValue> {
    let document = window()?
        .document()
        .ok_or_else(|| JsValue::from_str("no document"))?;
    let script: HtmlScriptElement = document.create_element("script")?.dyn_into()?;
    script.set_src(src);

    let loaded = Promise::new(&mut |resolve, reject| {
        script.set_onload(Some(&resolve));
        script.set_onerror(Some(&reject));
    });
    document
        .head()
        .ok_or_else(|| JsValue::from_str("no document head"))?
        .append_child(&script)?;

    let result = JsFuture::from(loaded).await;
    script.set_onload(None);
    script.set_onerror(None);
    result
        .map(|_| ())
        .map_err(|_| JsValue::from_str(&format!("failed to load {}", src)))
}

/// Promise for the module, wrapped in `{ module }`.
///
/// Older Emscripten builds return a module that is itself thenable, which a
/// plain `Promise.resolve` would chase forever.
fn module_ready(pending: JsValue) -> Promise {
    Promise::new(&mut |resolve, reject| {
        let wrap = |resolve: Function| {
            move |module: JsValue| {
                let holder = Object::new();
                if Reflect::set(&holder, &"module".into(), &module).is_ok() {
                    resolve.call1(&JsValue::NULL, &holder).ok();
                }
            }
        };

        let then = Reflect::get(&pending, &"then".into())
            .ok()
            .and_then(|then| then.dyn_into::<Function>().ok());
        match then {
            Some(then) => {
                let on_ready = Closure::once_into_js(wrap(resolve));
                let on_error = Closure::once_into_js({
                    let reject = reject.clone();
                    move |err: JsValue| {
                        reject.call1(&JsValue::NULL, &err).ok();
                    }
                });
                if let Err(err) = then.call2(&pending, &on_ready, &on_error) {
                    reject.call1(&JsValue::NULL, &err).ok();
                }
            }
            None => wrap(resolve)(pending.clone()),
        }
    })
}

fn get(target: &JsValue, name: &str) -> Result<JsValue, String> {
    Reflect::get(target, &name.into()).map_err(|e| js_error_message(&e))
}

fn call(target: &JsValue, name: &str, args: &[&JsValue]) -> Result<JsValue, String> {
    let method: Function = get(target, name)?
        .dyn_into()
        .map_err(|_| format!("Draco decoder has no {}()", name))?;
    let args: Array = args.iter().copied().collect();
    Reflect::apply(&method, target, &args).map_err(|e| js_error_message(&e))
}

fn construct(draco: &JsValue, class: &str) -> Result<JsValue, String> {
    let constructor: Function = get(draco, class)?
        .dyn_into()
        .map_err(|_| format!("Draco decoder has no {} class", class))?;
    Reflect::construct(&constructor, &Array::new()).map_err(|e| js_error_message(&e))
}

fn number(value: JsValue, what: &str) -> Result<usize, String> {
    value
        .as_f64()
        .filter(|n| n.is_finite() && *n >= 0.0)
        .map(|n| n as usize)
        .ok_or_else(|| format!("Draco returned a non-numeric {}", what))
}

fn destroy(draco: &JsValue, object: &JsValue) {
    call(draco, "destroy", &[object]).ok();
}

fn decode_mesh(draco: &JsValue, mesh: &CompressedMesh) -> Result<DecodedMesh, String> {
    let decoder = construct(draco, "Decoder")?;
    let result = construct(draco, "Mesh").and_then(|target| {
        let result = decode_into(draco, &decoder, &target, mesh);
        destroy(draco, &target);
        result
    });
    destroy(draco, &decoder);
    result
}

fn decode_into(
    draco: &JsValue,
    decoder: &JsValue,
    target: &JsValue,
    mesh: &CompressedMesh,
) -> Result<DecodedMesh, String> {
    let bytes: JsValue = Int8Array::new(&Uint8Array::from(mesh.data.as_slice()).buffer()).into();
    let status = call(
        decoder,
        "DecodeArrayToMesh",
        &[&bytes, &JsValue::from(mesh.data.len() as u32), target],
    )?;
    if !call(&status, "ok", &[])?.is_truthy() {
        let message = call(&status, "error_msg", &[])?.as_string().unwrap_or_default();
        return Err(format!("Draco decode failed: {}", message));
    }

    let points = number(call(target, "num_points", &[])?, "point count")?;
    let positions = read_attribute(draco, decoder, target, mesh.position, points, 3)?;
    let normals = match mesh.normal {
        Some(id) => Some(read_attribute(draco, decoder, target, id, points, 3)?),
        None => None,
    };
    let tex_coords = match mesh.tex_coord {
        Some(id) => Some(read_attribute(draco, decoder, target, id, points, 2)?),
        None => None,
    };
    let indices = read_indices(draco, decoder, target)?;

    DecodedMesh::from_flat(&positions, normals.as_deref(), tex_coords.as_deref(), indices)
}

fn read_attribute(
    draco: &JsValue,
    decoder: &JsValue,
    target: &JsValue,
    id: u32,
    points: usize,
    components: usize,
) -> Result<Vec<f32>, String> {
    let attribute = call(decoder, "GetAttributeByUniqueId", &[target, &JsValue::from(id)])?;
    let found = number(call(&attribute, "num_components", &[])?, "component count")?;
    if found != components {
        return Err(format!("attribute {} has {} components, expected {}", id, found, components));
    }

    let values = points * components;
    let byte_length = JsValue::from((values * 4) as u32);
    let ptr = call(draco, "_malloc", &[&byte_length])?;
    let read = call(
        decoder,
        "GetAttributeDataArrayForAllPoints",
        &[target, &attribute, &get(draco, "DT_FLOAT32")?, &byte_length, &ptr],
    )
    .and_then(|_| {
        let heap: Float32Array = get(draco, "HEAPF32")?
            .dyn_into()
            .map_err(|_| "Draco decoder has no HEAPF32".to_string())?;
        let offset = number(ptr.clone(), "pointer")? as u32;
        Ok(Float32Array::new_with_byte_offset_and_length(&heap.buffer(), offset, values as u32).to_vec())
    });
    call(draco, "_free", &[&ptr]).ok();
    read
}

fn read_indices(draco: &JsValue, decoder: &JsValue, target: &JsValue) -> Result<Vec<u32>, String> {
    let faces = number(call(target, "num_faces", &[])?, "face count")?;
    let count = faces * 3;
    let byte_length = JsValue::from((count * 4) as u32);
    let ptr = call(draco, "_malloc", &[&byte_length])?;
    let read = call(decoder, "GetTrianglesUInt32Array", &[target, &byte_length, &ptr]).and_then(|_| {
        let heap: Float32Array = get(draco, "HEAPF32")?
            .dyn_into()
            .map_err(|_| "Draco decoder has no HEAPF32".to_string())?;
        let offset = number(ptr.clone(), "pointer")? as u32;
        Ok(Uint32Array::new_with_byte_offset_and_length(&heap.buffer(), offset, count as u32).to_vec())
    });
    call(draco, "_free", &[&ptr]).ok();
    read
}
