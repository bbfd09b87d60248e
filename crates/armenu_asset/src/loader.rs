//! [`ModelLoader`] backed by glTF decoding

use std::rc::Rc;

use armenu_core::{LoadError, ModelLoader};
use futures_util::future::{FutureExt, LocalBoxFuture};

use crate::draco::{MeshDecompressor, NoDecompressor};
use crate::gltf::decode_model;
use crate::model::ModelData;
use crate::resolve::ResourceFetcher;

/// Fetches a document, then decodes it together with its external resources
pub struct GltfModelLoader<F, D = NoDecompressor> {
    fetcher: Rc<F>,
    decompressor: Rc<D>,
}

impl<F: ResourceFetcher + 'static> GltfModelLoader<F> {
    /// Loader that rejects Draco-compressed meshes
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher: Rc::new(fetcher),
            decompressor: Rc::new(NoDecompressor),
        }
    }
}

impl<F: ResourceFetcher + 'static, D: MeshDecompressor + 'static> GltfModelLoader<F, D> {
    pub fn with_decompressor<E: MeshDecompressor + 'static>(self, decompressor: E) -> GltfModelLoader<F, E> {
        GltfModelLoader {
            fetcher: self.fetcher,
            decompressor: Rc::new(decompressor),
        }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn decompressor(&self) -> &D {
        &self.decompressor
    }
}

impl<F: ResourceFetcher + 'static, D: MeshDecompressor + 'static> ModelLoader for GltfModelLoader<F, D> {
    type Model = ModelData;

    fn load(&self, path: &str) -> LocalBoxFuture<'static, Result<ModelData, LoadError>> {
        let fetcher = Rc::clone(&self.fetcher);
        let decompressor = Rc::clone(&self.decompressor);
        let path = path.to_string();
        async move {
            let bytes = fetcher.fetch(&path).await?;
            log::debug!("Fetched {} ({} bytes)", path, bytes.len());
            decode_model(&path, &bytes, fetcher.as_ref(), decompressor.as_ref()).await
        }
        .boxed_local()
    }
}
