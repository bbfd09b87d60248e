//! Integration tests for armenu_asset

use std::cell::RefCell;
use std::collections::HashMap;

use armenu_asset::*;
use armenu_core::{LoadError, Lookup, ModelCache, ModelLoader};
use base64::Engine;
use futures::executor::block_on;
use futures::future::{self, FutureExt, LocalBoxFuture};
use serde_json::{json, Value};

/// Serves files from memory and records every URL asked for
#[derive(Default)]
struct MemoryFetcher {
    files: HashMap<String, Vec<u8>>,
    requests: RefCell<Vec<String>>,
}

impl MemoryFetcher {
    fn with(mut self, url: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.files.insert(url.to_string(), bytes.into());
        self
    }
}

impl ResourceFetcher for MemoryFetcher {
    fn fetch(&self, url: &str) -> LocalBoxFuture<'static, Result<Vec<u8>, LoadError>> {
        self.requests.borrow_mut().push(url.to_string());
        let result = self
            .files
            .get(url)
            .cloned()
            .ok_or_else(|| LoadError::fetch(url, "404 Not Found"));
        future::ready(result).boxed_local()
    }
}

const SCENE: &str = "/models/pzza/scene.gltf";

/// Three positions followed by three u16 indices, padded to 4 bytes
fn triangle_bytes(indices: [u16; 3]) -> Vec<u8> {
    let mut bytes = Vec::new();
    for p in [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] {
        for c in p {
            bytes.extend_from_slice(&c.to_le_bytes());
        }
    }
    for i in indices {
        bytes.extend_from_slice(&i.to_le_bytes());
    }
    bytes.extend_from_slice(&[0, 0]);
    bytes
}

fn data_uri(mime: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime,
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// One triangle under a node moved 1 unit down -Z
fn triangle_document(buffer_uri: Option<&str>) -> Value {
    let mut buffer = json!({ "byteLength": 44 });
    if let Some(uri) = buffer_uri {
        buffer["uri"] = json!(uri);
    }
    json!({
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "mesh": 0, "translation": [0.0, 0.0, -1.0] }],
        "meshes": [{
            "primitives": [{ "attributes": { "POSITION": 0 }, "indices": 1, "material": 0 }]
        }],
        "materials": [{
            "name": "crust",
            "pbrMetallicRoughness": { "baseColorFactor": [1.0, 0.5, 0.25, 1.0] }
        }],
        "buffers": [buffer],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
            { "buffer": 0, "byteOffset": 36, "byteLength": 6 }
        ],
        "accessors": [
            {
                "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]
            },
            { "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }
        ]
    })
}

fn glb(json: &Value, bin: &[u8]) -> Vec<u8> {
    let mut json = json.to_string().into_bytes();
    while json.len() % 4 != 0 {
        json.push(b' ');
    }
    let mut bin = bin.to_vec();
    while bin.len() % 4 != 0 {
        bin.push(0);
    }

    let total = 12 + 8 + json.len() + 8 + bin.len();
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(b"glTF");
    out.extend_from_slice(&2u32.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());
    out.extend_from_slice(&(json.len() as u32).to_le_bytes());
    out.extend_from_slice(b"JSON");
    out.extend_from_slice(&json);
    out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
    out.extend_from_slice(b"BIN\0");
    out.extend_from_slice(&bin);
    out
}

fn embedded_triangle() -> Value {
    triangle_document(Some(&data_uri("application/octet-stream", &triangle_bytes([0, 1, 2]))))
}

#[test]
fn test_decode_embedded_triangle() {
    let _ = env_logger::builder().is_test(true).try_init();
    let fetcher = MemoryFetcher::default();
    let bytes = embedded_triangle().to_string();

    let model = block_on(decode_model(SCENE, bytes.as_bytes(), &fetcher, &NoDecompressor)).unwrap();

    assert!(fetcher.requests.borrow().is_empty());
    assert_eq!(model.source, SCENE);
    assert_eq!(model.primitives.len(), 1);
    assert_eq!(model.vertex_count(), 3);
    assert_eq!(model.triangle_count(), 1);

    let primitive = &model.primitives[0];
    assert_eq!(primitive.indices, vec![0, 1, 2]);
    assert_eq!(primitive.vertices[1].position, [1.0, 0.0, -1.0]);
    // No NORMAL attribute: computed from the winding
    assert_eq!(primitive.vertices[0].normal, [0.0, 0.0, 1.0]);

    let material = model.material_of(primitive).unwrap();
    assert_eq!(material.name, "crust");
    assert_eq!(material.base_color_factor, [1.0, 0.5, 0.25, 1.0]);
    assert_eq!(material.base_color_texture, None);
    assert_eq!(material.base_color_uv, UvTransform::IDENTITY);
    assert!(!material.unlit);

    assert_eq!(model.bounds.min.to_array(), [0.0, 0.0, -1.0]);
    assert_eq!(model.bounds.max.to_array(), [1.0, 1.0, -1.0]);
}

#[test]
fn test_external_buffer_resolved_next_to_document() {
    let document = triangle_document(Some("scene.bin")).to_string();
    let fetcher = MemoryFetcher::default()
        .with(SCENE, document)
        .with("/models/pzza/scene.bin", triangle_bytes([0, 1, 2]));
    let loader = GltfModelLoader::new(fetcher);

    let model = block_on(loader.load(SCENE)).unwrap();
    assert_eq!(model.triangle_count(), 1);
    assert_eq!(
        *loader.fetcher().requests.borrow(),
        vec![SCENE.to_string(), "/models/pzza/scene.bin".to_string()]
    );
}

#[test]
fn test_missing_external_buffer_is_a_fetch_error() {
    let fetcher = MemoryFetcher::default().with(SCENE, triangle_document(Some("scene.bin")).to_string());
    let loader = GltfModelLoader::new(fetcher);

    match block_on(loader.load(SCENE)) {
        Err(LoadError::Fetch { path, .. }) => assert_eq!(path, "/models/pzza/scene.bin"),
        other => panic!("expected fetch error, got {:?}", other.map(|m| m.source)),
    }
}

#[test]
fn test_decode_glb() {
    let path = "/models/platter-resized.glb";
    let bytes = glb(&triangle_document(None), &triangle_bytes([0, 1, 2]));
    let fetcher = MemoryFetcher::default();

    let model = block_on(decode_model(path, &bytes, &fetcher, &NoDecompressor)).unwrap();
    assert_eq!(model.triangle_count(), 1);
    assert_eq!(model.primitives[0].vertices[2].position, [0.0, 1.0, -1.0]);
}

/// Decompressor that returns a fixed triangle and records what it was given
#[derive(Default)]
struct TriangleDecompressor {
    requests: RefCell<Vec<CompressedMesh>>,
}

impl MeshDecompressor for TriangleDecompressor {
    fn decompress(&self, mesh: CompressedMesh) -> LocalBoxFuture<'static, Result<DecodedMesh, LoadError>> {
        self.requests.borrow_mut().push(mesh);
        let decoded = DecodedMesh::from_flat(
            &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            None,
            Some(&[0.0, 0.0, 1.0, 0.0, 0.0, 1.0]),
            vec![0, 1, 2],
        )
        .map_err(|reason| LoadError::decode("draco", reason));
        future::ready(decoded).boxed_local()
    }
}

const DRACO_STREAM: &[u8] = b"DRACO\x02\x02\x01";

/// One Draco-compressed triangle under a node moved 1 unit down -Z
fn draco_document() -> Value {
    json!({
        "asset": { "version": "2.0" },
        "extensionsUsed": ["KHR_draco_mesh_compression"],
        "extensionsRequired": ["KHR_draco_mesh_compression"],
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "mesh": 0, "translation": [0.0, 0.0, -1.0] }],
        "meshes": [{
            "primitives": [{
                "attributes": { "POSITION": 0, "TEXCOORD_0": 1 },
                "indices": 2,
                "extensions": {
                    "KHR_draco_mesh_compression": {
                        "bufferView": 0,
                        "attributes": { "POSITION": 0, "TEXCOORD_0": 1 }
                    }
                }
            }]
        }],
        "buffers": [{
            "byteLength": DRACO_STREAM.len(),
            "uri": data_uri("application/octet-stream", DRACO_STREAM)
        }],
        "bufferViews": [{ "buffer": 0, "byteOffset": 0, "byteLength": DRACO_STREAM.len() }],
        "accessors": [
            {
                "componentType": 5126, "count": 3, "type": "VEC3",
                "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]
            },
            { "componentType": 5126, "count": 3, "type": "VEC2" },
            { "componentType": 5123, "count": 3, "type": "SCALAR" }
        ]
    })
}

#[test]
fn test_draco_primitive_goes_through_decompressor() {
    let fetcher = MemoryFetcher::default();
    let decompressor = TriangleDecompressor::default();
    let bytes = draco_document().to_string();

    let model = block_on(decode_model(SCENE, bytes.as_bytes(), &fetcher, &decompressor)).unwrap();

    let requests = decompressor.requests.borrow();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].source, SCENE);
    assert_eq!(requests[0].data, DRACO_STREAM);
    assert_eq!(requests[0].position, 0);
    assert_eq!(requests[0].tex_coord, Some(1));
    assert_eq!(requests[0].normal, None);

    assert_eq!(model.triangle_count(), 1);
    let primitive = &model.primitives[0];
    assert_eq!(primitive.vertices[1].position, [1.0, 0.0, -1.0]);
    assert_eq!(primitive.vertices[1].uv, [1.0, 0.0]);
    assert_eq!(primitive.vertices[2].normal, [0.0, 0.0, 1.0]);
    assert!(fetcher.requests.borrow().is_empty());
}

#[test]
fn test_draco_loader_uses_configured_decompressor() {
    let path = "/models/beer/scene.gltf";
    let fetcher = MemoryFetcher::default().with(path, draco_document().to_string());
    let loader = GltfModelLoader::new(fetcher).with_decompressor(TriangleDecompressor::default());

    let model = block_on(loader.load(path)).unwrap();
    assert_eq!(model.vertex_count(), 3);
    assert_eq!(loader.decompressor().requests.borrow().len(), 1);
}

#[test]
fn test_draco_without_decompressor_fails_and_is_retried() {
    let path = "/models/beer/scene.gltf";
    let fetcher = MemoryFetcher::default().with(path, draco_document().to_string());

    let cache = ModelCache::new(GltfModelLoader::new(fetcher));
    let load = match cache.get_or_load("beer", path) {
        Lookup::Pending(load) => load,
        Lookup::Ready(_) => panic!("nothing cached yet"),
    };
    assert_eq!(
        block_on(load).err(),
        Some(LoadError::Unsupported {
            path: path.into(),
            extension: "KHR_draco_mesh_compression".into(),
        })
    );
    assert!(!cache.contains("beer"));

    // The next request decodes again rather than replaying the failure
    assert!(!cache.get_or_load("beer", path).is_ready());
    assert_eq!(cache.decode_count(), 2);
}

#[test]
fn test_unknown_required_extension_rejected() {
    let mut document = embedded_triangle();
    document["extensionsRequired"] = json!(["EXT_meshopt_compression"]);
    let fetcher = MemoryFetcher::default();

    let bytes = document.to_string();

    let err = block_on(decode_model(SCENE, bytes.as_bytes(), &fetcher, &NoDecompressor)).unwrap_err();
    assert_eq!(
        err,
        LoadError::Unsupported {
            path: SCENE.into(),
            extension: "EXT_meshopt_compression".into(),
        }
    );
}

#[test]
fn test_out_of_range_index_rejected() {
    let document = triangle_document(Some(&data_uri(
        "application/octet-stream",
        &triangle_bytes([0, 1, 7]),
    )))
    .to_string();
    let fetcher = MemoryFetcher::default();

    let err = block_on(decode_model(SCENE, document.as_bytes(), &fetcher, &NoDecompressor)).unwrap_err();
    assert!(matches!(err, LoadError::Decode { .. }), "{}", err);
}

#[test]
fn test_base_color_texture_decoded() {
    let image = image::RgbaImage::from_pixel(2, 2, image::Rgba([200, 10, 10, 255]));
    let mut png = Vec::new();
    image
        .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        .unwrap();

    let mut document = embedded_triangle();
    document["materials"][0]["pbrMetallicRoughness"]["baseColorTexture"] = json!({ "index": 0 });
    document["textures"] = json!([{ "source": 0 }]);
    document["images"] = json!([
        { "uri": data_uri("image/png", &png) },
        { "uri": "textures/missing.png" }
    ]);
    let fetcher = MemoryFetcher::default();

    let model = block_on(decode_model(SCENE, document.to_string().as_bytes(), &fetcher, &NoDecompressor)).unwrap();

    assert_eq!(model.materials[0].base_color_texture, Some(0));
    assert_eq!(model.textures.len(), 2);
    let texture = &model.textures[0];
    assert_eq!((texture.width, texture.height), (2, 2));
    assert_eq!(&texture.pixels[..4], &[200, 10, 10, 255]);

    // Unreachable image falls back to white instead of failing the model
    assert_eq!(model.textures[1], Texture::white());
    assert_eq!(
        *fetcher.requests.borrow(),
        vec!["/models/pzza/textures/missing.png".to_string()]
    );
}

#[test]
fn test_unlit_material_with_texture_transform() {
    let mut document = embedded_triangle();
    document["extensionsUsed"] = json!(["KHR_materials_unlit", "KHR_texture_transform"]);
    document["extensionsRequired"] = json!(["KHR_materials_unlit", "KHR_texture_transform"]);
    document["materials"][0]["extensions"] = json!({ "KHR_materials_unlit": {} });
    document["materials"][0]["pbrMetallicRoughness"]["baseColorTexture"] = json!({
        "index": 0,
        "extensions": {
            "KHR_texture_transform": { "offset": [0.5, 0.0], "rotation": 0.0, "scale": [0.5, 0.5] }
        }
    });
    document["textures"] = json!([{ "source": 0 }]);
    document["images"] = json!([{ "uri": "textures/label.png" }]);
    let fetcher = MemoryFetcher::default();
    let bytes = document.to_string();

    let model = block_on(decode_model(SCENE, bytes.as_bytes(), &fetcher, &NoDecompressor)).unwrap();

    let material = &model.materials[0];
    assert!(material.unlit);
    assert_eq!(material.base_color_texture, Some(0));
    assert_eq!(
        material.base_color_uv,
        UvTransform {
            offset: [0.5, 0.0],
            rotation: 0.0,
            scale: [0.5, 0.5],
        }
    );
    assert_eq!(material.base_color_uv.apply([1.0, 1.0]), [1.0, 0.5]);
}
