//! glTF/GLB decoding into [`ModelData`]
//!
//! Supports:
//! - glTF 2.0 JSON (.gltf) with external or `data:` buffers and images
//! - GLB (.glb) with the binary chunk
//! - Node hierarchies, baked into world-space vertices
//! - Base color factor and texture, `KHR_texture_transform`, `KHR_materials_unlit`
//! - `KHR_draco_mesh_compression` through a [`MeshDecompressor`]

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};

use glam::{Mat3, Mat4, Vec3};
use serde::Deserialize;

use armenu_core::LoadError;

use crate::draco::{self, CompressedMesh, DecodedMesh, DracoPrimitive, MeshDecompressor};
use crate::model::{AlphaMode, Bounds, Material, MeshVertex, ModelData, Primitive, Texture, UvTransform};
use crate::resolve::{decode_data_uri, resolve_uri, ResourceFetcher};

/// Extensions that may be listed as required
const SUPPORTED_EXTENSIONS: &[&str] = &[
    "KHR_materials_unlit",
    "KHR_texture_transform",
    draco::EXTENSION,
];

/// Guard against malformed (cyclic) node graphs
const MAX_NODE_DEPTH: usize = 64;

type DecodedMeshes = HashMap<(usize, usize), DecodedMesh>;

#[derive(Deserialize, Default)]
struct ExtensionHeader {
    #[serde(default, rename = "extensionsRequired")]
    extensions_required: Vec<String>,
}

/// Decode a glTF or GLB document.
///
/// External resources go through `fetcher`, Draco streams through
/// `decompressor`.
pub async fn decode_model<F, D>(
    path: &str,
    bytes: &[u8],
    fetcher: &F,
    decompressor: &D,
) -> Result<ModelData, LoadError>
where
    F: ResourceFetcher + ?Sized,
    D: MeshDecompressor + ?Sized,
{
    check_required_extensions(path, bytes)?;

    let Parsed {
        document,
        blob,
        compressed,
    } = parse(path, bytes)?;
    let buffers = load_buffers(path, &document, blob, fetcher).await?;
    let decoded = decompress_meshes(path, &document, &buffers, compressed, decompressor).await?;
    let textures = load_textures(path, &document, &buffers, fetcher).await;
    let materials = read_materials(&document);
    let (primitives, bounds) = bake_scene(path, &document, &buffers, &decoded)?;

    let model = ModelData {
        source: path.to_string(),
        primitives,
        materials,
        textures,
        bounds,
    };
    log::info!(
        "Decoded {}: {} primitives ({} compressed), {} vertices, {} triangles, {} textures",
        path,
        model.primitives.len(),
        decoded.len(),
        model.vertex_count(),
        model.triangle_count(),
        model.textures.len()
    );
    Ok(model)
}

/// Reject documents whose required extensions we can not honour
pub fn check_required_extensions(path: &str, bytes: &[u8]) -> Result<(), LoadError> {
    let Some(json) = json_chunk(bytes) else {
        // Leave malformed containers to the full parser
        return Ok(());
    };
    let header: ExtensionHeader = serde_json::from_slice(json).unwrap_or_default();

    match header
        .extensions_required
        .into_iter()
        .find(|ext| !SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
    {
        Some(extension) => Err(LoadError::Unsupported {
            path: path.to_string(),
            extension,
        }),
        None => Ok(()),
    }
}

/// JSON portion of a .gltf or .glb file
fn json_chunk(bytes: &[u8]) -> Option<&[u8]> {
    if !bytes.starts_with(b"glTF") {
        return Some(bytes);
    }
    let length = u32::from_le_bytes(bytes.get(12..16)?.try_into().ok()?) as usize;
    if bytes.get(16..20)? != b"JSON" {
        return None;
    }
    bytes.get(20..20usize.checked_add(length)?)
}

struct Parsed {
    document: gltf::Document,
    blob: Option<Vec<u8>>,
    compressed: BTreeMap<(usize, usize), DracoPrimitive>,
}

/// Validate the document and locate its Draco-compressed primitives
fn parse(path: &str, bytes: &[u8]) -> Result<Parsed, LoadError> {
    let (json, blob) = if bytes.starts_with(b"glTF") {
        let glb = gltf::Glb::from_slice(bytes).map_err(|e| LoadError::decode(path, e))?;
        (glb.json, glb.bin.map(Cow::into_owned))
    } else {
        (Cow::Borrowed(bytes), None)
    };

    let mut root: gltf::json::Root = serde_json::from_slice(&json).map_err(|e| LoadError::decode(path, e))?;
    // Draco primitives are decoded here, not by the gltf crate
    root.extensions_required.retain(|ext| ext != draco::EXTENSION);
    let document = gltf::Document::from_json(root).map_err(|e| LoadError::decode(path, e))?;
    let compressed = draco::scan(&json).map_err(|e| LoadError::decode(path, e))?;

    Ok(Parsed {
        document,
        blob,
        compressed,
    })
}

/// Bytes covered by a buffer view
fn view_bytes(buffers: &[Vec<u8>], view: &gltf::buffer::View) -> Option<Vec<u8>> {
    let start = view.offset();
    let end = start.checked_add(view.length())?;
    buffers.get(view.buffer().index())?.get(start..end).map(<[u8]>::to_vec)
}

async fn decompress_meshes<D: MeshDecompressor + ?Sized>(
    path: &str,
    document: &gltf::Document,
    buffers: &[Vec<u8>],
    compressed: BTreeMap<(usize, usize), DracoPrimitive>,
    decompressor: &D,
) -> Result<DecodedMeshes, LoadError> {
    let mut decoded = HashMap::new();
    for (key, primitive) in compressed {
        let data = document
            .views()
            .nth(primitive.buffer_view)
            .and_then(|view| view_bytes(buffers, &view))
            .ok_or_else(|| LoadError::decode(path, "compressed buffer view out of range"))?;
        let position = *primitive
            .attributes
            .get("POSITION")
            .ok_or_else(|| LoadError::decode(path, "compressed primitive without POSITION"))?;

        let mesh = CompressedMesh {
            source: path.to_string(),
            data,
            position,
            normal: primitive.attributes.get("NORMAL").copied(),
            tex_coord: primitive.attributes.get("TEXCOORD_0").copied(),
        };
        log::debug!(
            "Decompressing mesh {} primitive {} of {} ({} bytes)",
            key.0,
            key.1,
            path,
            mesh.data.len()
        );
        decoded.insert(key, decompressor.decompress(mesh).await?);
    }
    Ok(decoded)
}

async fn load_buffers<F: ResourceFetcher + ?Sized>(
    path: &str,
    document: &gltf::Document,
    mut blob: Option<Vec<u8>>,
    fetcher: &F,
) -> Result<Vec<Vec<u8>>, LoadError> {
    let mut buffers = Vec::new();
    for buffer in document.buffers() {
        let data = match buffer.source() {
            gltf::buffer::Source::Bin => blob
                .take()
                .ok_or_else(|| LoadError::decode(path, "missing GLB binary chunk"))?,
            gltf::buffer::Source::Uri(uri) => load_uri(path, uri, fetcher).await?,
        };
        if data.len() < buffer.length() {
            return Err(LoadError::decode(
                path,
                format!(
                    "buffer {} holds {} bytes, expected {}",
                    buffer.index(),
                    data.len(),
                    buffer.length()
                ),
            ));
        }
        buffers.push(data);
    }
    Ok(buffers)
}

async fn load_uri<F: ResourceFetcher + ?Sized>(
    path: &str,
    uri: &str,
    fetcher: &F,
) -> Result<Vec<u8>, LoadError> {
    match decode_data_uri(uri) {
        Some(result) => result.map_err(|reason| LoadError::decode(path, reason)),
        None => {
            let url = resolve_uri(path, uri);
            log::debug!("Fetching {} for {}", url, path);
            fetcher.fetch(&url).await
        }
    }
}

/// Images that fail to load or decode fall back to white so the mesh still shows
async fn load_textures<F: ResourceFetcher + ?Sized>(
    path: &str,
    document: &gltf::Document,
    buffers: &[Vec<u8>],
    fetcher: &F,
) -> Vec<Texture> {
    let mut textures = Vec::new();
    for image in document.images() {
        let bytes = match image.source() {
            gltf::image::Source::View { view, .. } => view_bytes(buffers, &view)
                .ok_or_else(|| LoadError::decode(path, "image view out of range")),
            gltf::image::Source::Uri { uri, .. } => load_uri(path, uri, fetcher).await,
        };

        let texture = bytes.and_then(|bytes| {
            image::load_from_memory(&bytes).map_err(|e| LoadError::decode(path, e))
        });
        match texture {
            Ok(decoded) => {
                let rgba = decoded.to_rgba8();
                textures.push(Texture {
                    width: rgba.width(),
                    height: rgba.height(),
                    pixels: rgba.into_raw(),
                });
            }
            Err(err) => {
                log::warn!("Image {} unavailable, using white: {}", image.index(), err);
                textures.push(Texture::white());
            }
        }
    }
    textures
}

fn read_materials(document: &gltf::Document) -> Vec<Material> {
    document
        .materials()
        .map(|mat| {
            let pbr = mat.pbr_metallic_roughness();
            let base_color = pbr.base_color_texture();
            let base_color_uv = base_color
                .as_ref()
                .and_then(|info| info.texture_transform())
                .map(|t| UvTransform {
                    offset: t.offset(),
                    rotation: t.rotation(),
                    scale: t.scale(),
                })
                .unwrap_or_default();
            Material {
                name: mat.name().unwrap_or("").to_string(),
                base_color_factor: pbr.base_color_factor(),
                base_color_texture: base_color.map(|info| info.texture().source().index()),
                base_color_uv,
                alpha_mode: match mat.alpha_mode() {
                    gltf::material::AlphaMode::Opaque => AlphaMode::Opaque,
                    gltf::material::AlphaMode::Mask => AlphaMode::Mask,
                    gltf::material::AlphaMode::Blend => AlphaMode::Blend,
                },
                alpha_cutoff: mat.alpha_cutoff().unwrap_or(0.5),
                double_sided: mat.double_sided(),
                unlit: mat.unlit(),
            }
        })
        .collect()
}

fn bake_scene(
    path: &str,
    document: &gltf::Document,
    buffers: &[Vec<u8>],
    decoded: &DecodedMeshes,
) -> Result<(Vec<Primitive>, Bounds), LoadError> {
    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or_else(|| LoadError::decode(path, "document has no scene"))?;

    let mut primitives = Vec::new();
    let mut bounds = Bounds::empty();
    let mut stack: Vec<_> = scene.nodes().map(|node| (node, Mat4::IDENTITY, 0)).collect();

    while let Some((node, parent, depth)) = stack.pop() {
        if depth > MAX_NODE_DEPTH {
            return Err(LoadError::decode(path, "node hierarchy too deep"));
        }
        let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());

        if let Some(mesh) = node.mesh() {
            for primitive in mesh.primitives() {
                let compressed = decoded.get(&(mesh.index(), primitive.index()));
                if let Some(baked) = bake_primitive(path, &primitive, world, buffers, compressed)? {
                    bounds.union(&baked.bounds);
                    primitives.push(baked);
                }
            }
        }
        stack.extend(node.children().map(|child| (child, world, depth + 1)));
    }

    if primitives.is_empty() {
        return Err(LoadError::decode(path, "no triangle geometry in scene"));
    }
    Ok((primitives, bounds))
}

/// Untransformed attributes of one primitive
struct Geometry {
    positions: Vec<[f32; 3]>,
    normals: Option<Vec<[f32; 3]>>,
    uvs: Vec<[f32; 2]>,
    indices: Vec<u32>,
}

impl Geometry {
    fn read(path: &str, primitive: &gltf::Primitive, buffers: &[Vec<u8>]) -> Result<Self, LoadError> {
        let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));

        let positions: Vec<[f32; 3]> = reader
            .read_positions()
            .ok_or_else(|| LoadError::decode(path, "primitive without positions"))?
            .collect();
        let normals = reader.read_normals().map(|n| n.collect());
        let uvs = reader
            .read_tex_coords(0)
            .map(|t| t.into_f32().collect())
            .unwrap_or_default();
        let indices = reader
            .read_indices()
            .map(|i| i.into_u32().collect())
            .unwrap_or_else(|| (0..positions.len() as u32).collect());

        Ok(Self {
            positions,
            normals,
            uvs,
            indices,
        })
    }

    fn decompressed(mesh: &DecodedMesh) -> Self {
        Self {
            positions: mesh.positions.clone(),
            normals: mesh.normals.clone(),
            uvs: mesh.tex_coords.clone().unwrap_or_default(),
            indices: mesh.indices.clone(),
        }
    }
}

fn bake_primitive(
    path: &str,
    primitive: &gltf::Primitive,
    world: Mat4,
    buffers: &[Vec<u8>],
    compressed: Option<&DecodedMesh>,
) -> Result<Option<Primitive>, LoadError> {
    if primitive.mode() != gltf::mesh::Mode::Triangles {
        log::debug!("Skipping {:?} primitive in {}", primitive.mode(), path);
        return Ok(None);
    }

    let Geometry {
        positions,
        normals,
        uvs,
        mut indices,
    } = match compressed {
        Some(mesh) => Geometry::decompressed(mesh),
        None => Geometry::read(path, primitive, buffers)?,
    };

    if let Some(bad) = indices.iter().find(|&&i| i as usize >= positions.len()) {
        return Err(LoadError::decode(
            path,
            format!("index {} exceeds {} vertices", bad, positions.len()),
        ));
    }
    indices.truncate(indices.len() / 3 * 3);

    // Mirroring transforms flip the triangle winding
    if world.determinant() < 0.0 {
        for tri in indices.chunks_exact_mut(3) {
            tri.swap(1, 2);
        }
    }

    let linear = Mat3::from_mat4(world);
    let normal_matrix = if linear.determinant().abs() > f32::EPSILON {
        linear.inverse().transpose()
    } else {
        Mat3::IDENTITY
    };

    let mut bounds = Bounds::empty();
    let mut vertices: Vec<MeshVertex> = positions
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let position = world.transform_point3(Vec3::from(*p));
            bounds.extend(position);
            let normal = normals
                .as_ref()
                .and_then(|n| n.get(i))
                .map(|n| (normal_matrix * Vec3::from(*n)).normalize_or_zero())
                .unwrap_or(Vec3::ZERO);
            MeshVertex {
                position: position.to_array(),
                normal: normal.to_array(),
                uv: uvs.get(i).copied().unwrap_or([0.0, 0.0]),
            }
        })
        .collect();

    if normals.is_none() {
        compute_normals(&mut vertices, &indices);
    }

    Ok(Some(Primitive {
        vertices,
        indices,
        material: primitive.material().index(),
        bounds,
    }))
}

/// Area-weighted vertex normals for primitives that ship none
fn compute_normals(vertices: &mut [MeshVertex], indices: &[u32]) {
    let mut sums = vec![Vec3::ZERO; vertices.len()];
    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        let pa = Vec3::from(vertices[a].position);
        let face = (Vec3::from(vertices[b].position) - pa).cross(Vec3::from(vertices[c].position) - pa);
        sums[a] += face;
        sums[b] += face;
        sums[c] += face;
    }
    for (vertex, sum) in vertices.iter_mut().zip(sums) {
        vertex.normal = sum.normalize_or_zero().to_array();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_chunk_of_glb() {
        let json = br#"{"asset":{"version":"2.0"}}"#;
        let mut glb = Vec::new();
        glb.extend_from_slice(b"glTF");
        glb.extend_from_slice(&2u32.to_le_bytes());
        glb.extend_from_slice(&((20 + json.len()) as u32).to_le_bytes());
        glb.extend_from_slice(&(json.len() as u32).to_le_bytes());
        glb.extend_from_slice(b"JSON");
        glb.extend_from_slice(json);

        assert_eq!(json_chunk(&glb), Some(&json[..]));

        // A chunk length near u32::MAX must not wrap the range end
        let mut huge = glb[..16].to_vec();
        huge[12..16].copy_from_slice(&u32::MAX.to_le_bytes());
        huge.extend_from_slice(b"JSON{}");
        assert_eq!(json_chunk(&huge), None);
        assert_eq!(json_chunk(b"glTF\x02\x00"), None);
        assert_eq!(json_chunk(b"{}"), Some(&b"{}"[..]));
    }

    #[test]
    fn test_required_extension_check() {
        let meshopt = br#"{"asset":{"version":"2.0"},"extensionsRequired":["EXT_meshopt_compression"]}"#;
        assert_eq!(
            check_required_extensions("/models/a.gltf", meshopt),
            Err(LoadError::Unsupported {
                path: "/models/a.gltf".into(),
                extension: "EXT_meshopt_compression".into(),
            })
        );

        let supported = br#"{"asset":{"version":"2.0"},"extensionsRequired":["KHR_materials_unlit","KHR_draco_mesh_compression"]}"#;
        assert_eq!(check_required_extensions("/models/a.gltf", supported), Ok(()));
        assert_eq!(check_required_extensions("/models/a.gltf", b"not json"), Ok(()));
    }

    #[test]
    fn test_computed_normals_face_outward() {
        let mut vertices = vec![
            MeshVertex { position: [0.0, 0.0, 0.0], ..Default::default() },
            MeshVertex { position: [1.0, 0.0, 0.0], ..Default::default() },
            MeshVertex { position: [0.0, 1.0, 0.0], ..Default::default() },
        ];
        compute_normals(&mut vertices, &[0, 1, 2]);
        for v in &vertices {
            assert_eq!(v.normal, [0.0, 0.0, 1.0]);
        }
    }
}
