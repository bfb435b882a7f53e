pub mod camera;

use std::{fs, io, path};

use anyhow::Context as _;

use crate::{bvh, env, mesh};

// Where the stone's geometry comes from
#[derive(Clone)]
#[derive(serde::Deserialize, serde::Serialize)]
#[derive(Debug)]
pub enum MeshSource {
    Obj(path::PathBuf),
    Cube { edge: f32 },
    Brilliant(mesh::BrilliantCut),
}

#[derive(Clone)]
#[derive(serde::Deserialize, serde::Serialize)]
#[derive(Debug)]
pub enum EnvSource {
    // Radiance HDR, PNG or JPEG
    Image(path::PathBuf),
    Gradient { width: u32, height: u32 },
    Uniform([f32; 3]),
}

#[derive(Clone)]
#[derive(serde::Deserialize, serde::Serialize)]
#[derive(Debug)]
#[serde(default)]
pub struct Assets {
    pub mesh: MeshSource,
    pub environment: EnvSource,
    // Precomputed `BvhData`, as written by the `precompute` tool
    pub bvh: Option<path::PathBuf>,
}

impl Assets {
    pub fn new() -> Self {
        Self {
            mesh: MeshSource::Brilliant(mesh::BrilliantCut::new()),
            environment: EnvSource::Gradient { width: 512, height: 256 },
            bvh: None,
        }
    }

    // Relative asset paths are taken relative to `base`
    pub fn resolve(&mut self, base: &path::Path) {
        let join = |path: &mut path::PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };

        if let MeshSource::Obj(path) = &mut self.mesh {
            join(path);
        }

        if let EnvSource::Image(path) = &mut self.environment {
            join(path);
        }

        if let Some(path) = &mut self.bvh {
            join(path);
        }
    }
}

impl Default for Assets {
    fn default() -> Self { Self::new() }
}

impl EnvSource {
    pub fn load(&self) -> anyhow::Result<env::Environment> {
        Ok(match self {
            Self::Image(path) => env::Environment::load(path)?,
            Self::Gradient { width, height } => {
                env::Environment::gradient(*width, *height)
            },
            Self::Uniform(color) => env::Environment::uniform(*color),
        })
    }
}

impl MeshSource {
    pub fn load(&self) -> anyhow::Result<mesh::Mesh> {
        Ok(match self {
            Self::Obj(path) => mesh::Mesh::load(path)?,
            Self::Cube { edge } => mesh::Mesh::cube(*edge),
            Self::Brilliant(cut) => mesh::Mesh::brilliant(*cut),
        })
    }
}

// A mesh together with the hierarchy built over it
#[derive(Clone)]
#[derive(Debug)]
pub struct Gem {
    pub mesh: mesh::Mesh,
    pub bvh: bvh::Bvh,
}

impl Gem {
    pub fn new(mesh: mesh::Mesh, config: bvh::BvhConfig) -> Result<Self, bvh::BvhError> {
        let bvh = bvh::Bvh::build(&mesh, config)?;

        Ok(Self { mesh, bvh })
    }

    pub fn load(assets: &Assets, config: bvh::BvhConfig) -> anyhow::Result<Self> {
        let mesh = assets.mesh.load()?;

        let Some(path) = &assets.bvh else {
            return Ok(Self::new(mesh, config)?);
        };

        let reader = io::BufReader::new({
            fs::File::open(path)
                .with_context(|| format!("Failed to open BVH {}", path.display()))?
        });

        let data: bvh::BvhData = serde_json::from_reader(reader)
            .with_context(|| format!("Failed to parse BVH {}", path.display()))?;

        let bvh = bvh::Bvh::from_data(&mesh, data, config.eps)?;

        log::info!("Loaded precomputed BVH {} ({} nodes)", path.display(), bvh.nodes());

        Ok(Self { mesh, bvh })
    }
}

// The gem only becomes visible once both the environment
// and its geometry have resolved
#[derive(Default)]
#[derive(Debug)]
pub enum Scene {
    #[default]
    Unloaded,
    Pending {
        env: Option<env::Environment>,
        gem: Option<Gem>,
    },
    Active {
        env: env::Environment,
        gem: Gem,
    },
}

impl Scene {
    fn resolve(env: Option<env::Environment>, gem: Option<Gem>) -> Self {
        match (env, gem) {
            (Some(env), Some(gem)) => {
                log::info!("Scene active: {} triangles", gem.mesh.len());

                Self::Active { env, gem }
            },
            (None, None) => Self::Unloaded,
            (env, gem) => Self::Pending { env, gem },
        }
    }

    fn into_parts(self) -> (Option<env::Environment>, Option<Gem>) {
        match self {
            Self::Unloaded => (None, None),
            Self::Pending { env, gem } => (env, gem),
            Self::Active { env, gem } => (Some(env), Some(gem)),
        }
    }

    pub fn with_environment(self, env: env::Environment) -> Self {
        let (_, gem) = self.into_parts();

        Self::resolve(Some(env), gem)
    }

    pub fn with_gem(self, gem: Gem) -> Self {
        let (env, _) = self.into_parts();

        Self::resolve(env, Some(gem))
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }

    // Both halves, but only once nothing is missing
    pub fn active(&self) -> Option<(&env::Environment, &Gem)> {
        match self {
            Self::Active { env, gem } => Some((env, gem)),
            _ => None,
        }
    }

    // Environment first, then the gem. A failed load is returned
    // to the caller and nothing is added to the scene
    pub fn load(assets: &Assets, config: bvh::BvhConfig) -> anyhow::Result<Self> {
        let env = assets.environment.load()?;

        let scene = Self::Unloaded.with_environment(env);

        let gem = Gem::load(assets, config)?;

        Ok(scene.with_gem(gem))
    }
}
