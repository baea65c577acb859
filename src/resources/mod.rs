use std::{future::Future, sync::Arc};

use anyhow::Context;
use cgmath::Vector3;

use crate::data_structures::{
    model::Material,
    scene_graph::{NodeKind, SceneNode},
    texture::{EnvironmentMapping, EnvironmentTexture},
};

/**
 * This module contains all logic for loading models and environment maps from external files.
 */
pub mod gltf_scene;
pub mod texture;

/// Resolves asset names against a root and loads them.
///
/// Natively the root is a directory. On the web it is a base URL; an empty root means
/// `<page origin>/assets`.
#[derive(Clone, Debug)]
pub struct AssetLoader {
    root: String,
}

impl AssetLoader {
    /// Overrides the native asset directory.
    pub const ENV_VAR: &'static str = "MANNEQUIN_ASSETS";

    pub fn new(root: impl Into<String>) -> Self {
        Self { root: root.into() }
    }

    /// `$MANNEQUIN_ASSETS`, or `./assets` natively; the page's `/assets` on the web.
    pub fn from_env() -> Self {
        #[cfg(not(target_arch = "wasm32"))]
        let root = std::env::var(Self::ENV_VAR).unwrap_or_else(|_| String::from("./assets"));
        #[cfg(target_arch = "wasm32")]
        let root = String::new();
        Self { root }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub async fn load_binary(&self, name: &str) -> anyhow::Result<Vec<u8>> {
        texture::load_binary(&self.root, name).await
    }

    /**
     * Loads a `.gltf` or `.glb` file. External buffers and images are fetched
     * relative to the model file.
     */
    pub async fn load_model(&self, name: &str) -> anyhow::Result<SceneNode> {
        let bytes = self.load_binary(name).await?;
        let gltf = gltf::Gltf::from_slice(&bytes).with_context(|| format!("parsing {name}"))?;

        let buffer_futures = gltf_scene::buffer_sources(&gltf)
            .into_iter()
            .enumerate()
            .map(|(idx, source)| {
                let blob = gltf.blob.as_deref();
                async move {
                    match source {
                        gltf_scene::BufferSource::Bin => blob
                            .map(<[u8]>::to_vec)
                            .with_context(|| format!("buffer {idx} refers to a missing binary chunk")),
                        gltf_scene::BufferSource::Uri(uri) => {
                            if uri.starts_with("data:") {
                                anyhow::bail!("buffer {idx} uses an embedded data uri");
                            }
                            self.load_binary(&gltf_scene::sibling_path(name, uri)).await
                        }
                    }
                }
            });
        let buffers = futures::future::try_join_all(buffer_futures).await?;

        let image_futures = gltf_scene::image_uris(&gltf).into_iter().map(|uri| async move {
            let uri = uri?;
            match self.load_binary(&gltf_scene::sibling_path(name, uri)).await {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    log::warn!("texture {uri} of {name} could not be loaded: {e:#}");
                    None
                }
            }
        });
        let external_images = futures::future::join_all(image_futures).await;
        let maps = gltf_scene::decode_images(&gltf, &buffers, &external_images);

        let node = gltf_scene::scene_from_gltf(&gltf, &buffers, &maps, name)?;
        log::info!("loaded {name} with {} nodes", node.node_count());
        Ok(node)
    }

    pub async fn load_environment(
        &self,
        name: &str,
        mapping: EnvironmentMapping,
    ) -> anyhow::Result<EnvironmentTexture> {
        let bytes = self.load_binary(name).await?;
        let environment = texture::decode_environment(&bytes, name, mapping)?;
        log::info!(
            "loaded {name} ({}x{})",
            environment.width(),
            environment.height()
        );
        Ok(environment)
    }
}

/// Awaits a load and logs a failure instead of returning it.
pub async fn load_or_warn<T>(what: &str, load: impl Future<Output = anyhow::Result<T>>) -> Option<T> {
    match load.await {
        Ok(value) => Some(value),
        Err(e) => {
            log::warn!("{what} could not be loaded: {e:#}");
            None
        }
    }
}

/// Placement and look of a freshly loaded model.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelSetup {
    pub scale: f32,
    pub position: Vector3<f32>,
    /// Replaces the material of every mesh when set.
    pub material: Option<Arc<Material>>,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
    /// Anisotropic filtering level for color maps.
    pub anisotropy: u16,
}

impl Default for ModelSetup {
    fn default() -> Self {
        Self {
            scale: 1.0,
            position: Vector3::new(0.0, 0.0, 0.0),
            material: None,
            cast_shadow: false,
            receive_shadow: false,
            anisotropy: 1,
        }
    }
}

impl ModelSetup {
    /// Overwrites the local scale and position of `root` and restyles every mesh below it.
    /// Loaded models come wrapped in an identity group, so their own node transforms survive.
    pub fn apply(&self, root: &mut SceneNode) {
        root.local.scale = Vector3::new(self.scale, self.scale, self.scale);
        root.local.position = self.position;
        root.traverse_mut(&mut |node| {
            let NodeKind::Mesh(mesh) = &mut node.kind else {
                return;
            };
            mesh.cast_shadow = self.cast_shadow;
            mesh.receive_shadow = self.receive_shadow;
            if let Some(material) = &self.material {
                mesh.material = material.clone();
            }
            let needs_update = mesh
                .material
                .map
                .as_ref()
                .is_some_and(|map| map.anisotropy != self.anisotropy);
            if needs_update {
                if let Some(map) = Arc::make_mut(&mut mesh.material).map.as_mut() {
                    map.anisotropy = self.anisotropy;
                }
            }
        });
    }
}
