pub mod geom;
pub mod mesh;
pub mod bvh;
pub mod optics;
pub mod env;
pub mod tonemap;
pub mod params;
pub mod scene;
pub mod tracer;
pub mod render;
pub mod shaders;
pub mod state;

use std::{fs, path};

use anyhow::Context as _;

// Config declaration
#[derive(Clone)]
#[derive(serde::Deserialize, serde::Serialize)]
#[derive(Debug)]
#[serde(default)]
pub struct Config {
    pub params: params::GemParams,
    pub camera: scene::camera::Camera,
    pub transform: params::Transform,
    pub bvh: bvh::BvhConfig,
    pub output: tonemap::Output,
    pub assets: scene::Assets,
}

impl Default for Config {
    fn default() -> Self { Self::new() }
}

impl Config {
    pub fn new() -> Self {
        Self {
            params: params::GemParams::new(),
            camera: scene::camera::Camera::new(),
            transform: params::Transform::new(),
            bvh: bvh::BvhConfig::new(),
            output: tonemap::Output::new(),
            assets: scene::Assets::new(),
        }
    }

    // Reads a JSON config. Asset paths inside it are relative to the file
    pub fn load<P: AsRef<path::Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();

        let serialized = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;

        let mut config = serde_json::from_str::<Self>(&serialized)
            .with_context(|| format!("Malformed config {}", path.display()))?;

        if let Some(base) = path.parent() {
            config.assets.resolve(base);
        }

        log::info!("Loaded config from {}", path.display());

        Ok(config)
    }

    pub fn view(&self) -> render::View {
        let Self { params, camera, transform, output, .. } = self;

        render::View {
            params: *params,
            camera: *camera,
            transform: *transform,
            output: *output,
        }
    }

    pub fn scene(&self) -> anyhow::Result<scene::Scene> {
        scene::Scene::load(&self.assets, self.bvh)
    }
}
