//! # AR Menu Asset
//!
//! Turns menu model files (glTF / GLB) into [`ModelData`]: world-space
//! triangle lists, base-color materials and RGBA textures, ready for upload.
//!
//! Network access is abstracted behind [`ResourceFetcher`] and Draco mesh
//! decoding behind [`MeshDecompressor`], so decoding runs the same in the
//! browser and in host tests.

pub mod draco;
pub mod gltf;
pub mod loader;
pub mod model;
pub mod resolve;

pub use crate::draco::{CompressedMesh, DecodedMesh, MeshDecompressor, NoDecompressor};
pub use crate::gltf::{check_required_extensions, decode_model};
pub use crate::loader::GltfModelLoader;
pub use crate::model::{AlphaMode, Bounds, Material, MeshVertex, ModelData, Primitive, Texture, UvTransform};
pub use crate::resolve::{decode_data_uri, resolve_uri, ResourceFetcher};
