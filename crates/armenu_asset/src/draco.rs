//! `KHR_draco_mesh_compression` primitives
//!
//! The glTF crate does not decode Draco streams. Compressed primitives are
//! located here, their bytes handed to a [`MeshDecompressor`], and the
//! decoded attributes baked like any other primitive. The browser build
//! drives the Draco decoder bundle; [`NoDecompressor`] rejects such assets.

use std::collections::{BTreeMap, HashMap};

use futures_util::future::{self, FutureExt, LocalBoxFuture};
use serde::Deserialize;

use armenu_core::LoadError;

pub const EXTENSION: &str = "KHR_draco_mesh_compression";

/// One compressed primitive, ready for a decoder
#[derive(Clone, Debug, PartialEq)]
pub struct CompressedMesh {
    /// Asset the primitive belongs to
    pub source: String,
    /// Contents of the extension's buffer view
    pub data: Vec<u8>,
    /// Draco attribute ids
    pub position: u32,
    pub normal: Option<u32>,
    pub tex_coord: Option<u32>,
}

/// Attributes of a decoded primitive, not yet transformed
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DecodedMesh {
    pub positions: Vec<[f32; 3]>,
    pub normals: Option<Vec<[f32; 3]>>,
    pub tex_coords: Option<Vec<[f32; 2]>>,
    pub indices: Vec<u32>,
}

impl DecodedMesh {
    /// Assemble from the flat float arrays a decoder hands out
    pub fn from_flat(
        positions: &[f32],
        normals: Option<&[f32]>,
        tex_coords: Option<&[f32]>,
        indices: Vec<u32>,
    ) -> Result<Self, String> {
        if positions.len() % 3 != 0 {
            return Err(format!("{} position floats is not a multiple of 3", positions.len()));
        }
        let points = positions.len() / 3;
        if let Some(normals) = normals {
            if normals.len() != points * 3 {
                return Err(format!("{} normal floats for {} points", normals.len(), points));
            }
        }
        if let Some(tex_coords) = tex_coords {
            if tex_coords.len() != points * 2 {
                return Err(format!("{} texcoord floats for {} points", tex_coords.len(), points));
            }
        }

        Ok(Self {
            positions: positions.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect(),
            normals: normals.map(|n| n.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect()),
            tex_coords: tex_coords.map(|t| t.chunks_exact(2).map(|c| [c[0], c[1]]).collect()),
            indices,
        })
    }
}

/// Decodes Draco mesh streams, the way [`ResourceFetcher`](crate::ResourceFetcher)
/// fetches bytes
pub trait MeshDecompressor {
    fn decompress(&self, mesh: CompressedMesh) -> LocalBoxFuture<'static, Result<DecodedMesh, LoadError>>;
}

/// Decompressor for builds without a Draco decoder
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDecompressor;

impl MeshDecompressor for NoDecompressor {
    fn decompress(&self, mesh: CompressedMesh) -> LocalBoxFuture<'static, Result<DecodedMesh, LoadError>> {
        future::ready(Err(LoadError::Unsupported {
            path: mesh.source,
            extension: EXTENSION.to_string(),
        }))
        .boxed_local()
    }
}

/// The extension object on a mesh primitive
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub(crate) struct DracoPrimitive {
    #[serde(rename = "bufferView")]
    pub buffer_view: usize,
    pub attributes: HashMap<String, u32>,
}

#[derive(Deserialize)]
struct Scan {
    #[serde(default)]
    meshes: Vec<ScanMesh>,
}

#[derive(Deserialize)]
struct ScanMesh {
    #[serde(default)]
    primitives: Vec<ScanPrimitive>,
}

#[derive(Deserialize)]
struct ScanPrimitive {
    #[serde(default)]
    extensions: ScanExtensions,
}

#[derive(Deserialize, Default)]
struct ScanExtensions {
    #[serde(rename = "KHR_draco_mesh_compression")]
    draco: Option<DracoPrimitive>,
}

/// Compressed primitives keyed by (mesh index, primitive index)
pub(crate) fn scan(json: &[u8]) -> Result<BTreeMap<(usize, usize), DracoPrimitive>, serde_json::Error> {
    let scan: Scan = serde_json::from_slice(json)?;
    let mut found = BTreeMap::new();
    for (m, mesh) in scan.meshes.into_iter().enumerate() {
        for (p, primitive) in mesh.primitives.into_iter().enumerate() {
            if let Some(draco) = primitive.extensions.draco {
                found.insert((m, p), draco);
            }
        }
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_finds_compressed_primitives() {
        let json = br#"{
            "meshes": [
                { "primitives": [{ "attributes": { "POSITION": 0 } }] },
                { "primitives": [
                    { "attributes": { "POSITION": 1 } },
                    { "attributes": { "POSITION": 2 }, "extensions": {
                        "KHR_draco_mesh_compression": {
                            "bufferView": 3, "attributes": { "POSITION": 0, "TEXCOORD_0": 1 }
                        }
                    } }
                ] }
            ]
        }"#;

        let found = scan(json).unwrap();
        assert_eq!(found.len(), 1);
        let draco = &found[&(1, 1)];
        assert_eq!(draco.buffer_view, 3);
        assert_eq!(draco.attributes["TEXCOORD_0"], 1);

        assert!(scan(br#"{"asset":{"version":"2.0"}}"#).unwrap().is_empty());
    }

    #[test]
    fn test_from_flat_checks_lengths() {
        let positions = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let uvs = [0.0, 0.0, 1.0, 0.0, 0.0, 1.0];

        let mesh = DecodedMesh::from_flat(&positions, None, Some(&uvs), vec![0, 1, 2]).unwrap();
        assert_eq!(mesh.positions[2], [0.0, 1.0, 0.0]);
        assert_eq!(mesh.tex_coords.as_ref().unwrap()[1], [1.0, 0.0]);
        assert_eq!(mesh.normals, None);

        assert!(DecodedMesh::from_flat(&positions[..8], None, None, vec![]).is_err());
        assert!(DecodedMesh::from_flat(&positions, Some(&uvs), None, vec![]).is_err());
        assert!(DecodedMesh::from_flat(&positions, None, Some(&uvs[..4]), vec![]).is_err());
    }
}
