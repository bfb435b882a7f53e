mod aabb;
mod traverse;

pub use aabb::{Aabb, Bounds};
pub use traverse::{first_hit_brute, intersect_triangle, Hit, T_MIN};

use crate::mesh;

#[derive(Clone, Copy, Default)]
#[derive(serde::Deserialize, serde::Serialize)]
#[derive(Debug, PartialEq, Eq)]
pub enum SplitStrategy {
    // Midpoint of the longest axis
    Center,
    // Mean centroid along the longest axis
    Average,
    #[default]
    Sah,
}

// This stores all configuration options
// for construction of the BVH and its intersection logic
#[derive(Clone, Copy)]
#[derive(serde::Deserialize, serde::Serialize)]
#[derive(Debug)]
#[serde(default)]
pub struct BvhConfig {
    pub strategy: SplitStrategy,
    pub max_leaf_tris: usize,
    // Bounds are inflated by this much during traversal
    pub eps: f32,
}

impl BvhConfig {
    pub const fn new() -> Self {
        Self {
            strategy: SplitStrategy::Sah,
            max_leaf_tris: 1,
            eps: 0.00001,
        }
    }
}

impl Default for BvhConfig {
    fn default() -> Self { Self::new() }
}

#[derive(thiserror::Error)]
#[derive(Debug)]
pub enum BvhError {
    #[error("Invalid mesh: {0}")]
    InvalidMesh(&'static str),
    #[error("BVH data does not match the mesh: {0}")]
    Mismatch(String),
}

// The Aabb tree gets rendered down into an array of AabbUniform structs.
// A node with `item_count > 0` is a leaf, otherwise `fst` and `snd`
// index its children. Index 0 is the root, so it never names a child
#[repr(C)]
#[derive(Clone, Copy)]
#[derive(serde::Deserialize, serde::Serialize)]
#[derive(bytemuck::Pod, bytemuck::Zeroable)]
#[derive(Debug)]
pub struct AabbUniform {
    pub fst: u32,
    pub snd: u32,
    pub item_idx: u32,
    pub item_count: u32,
    pub bounds: Bounds,
}

impl AabbUniform {
    pub fn is_leaf(&self) -> bool {
        self.item_count > 0
    }
}

// I've factored out the process of making the Aabb tree compute-friendly
// for simplicity's sake
#[derive(Clone)]
#[derive(serde::Deserialize, serde::Serialize)]
#[derive(Default)]
#[derive(Debug)]
pub struct BvhData {
    pub uniforms: Vec<AabbUniform>,
    pub indices: Vec<u32>,
    #[serde(default)]
    pub depth: u32,
}

impl BvhData {
    // Construct the shader data from the root node of the tree
    pub fn new(aabb: &aabb::Aabb) -> Self {
        let mut data = Self {
            depth: aabb.depth() as u32,
            ..Default::default()
        };

        fn into_aabb_uniform(
            data: &mut BvhData,
            aabb: &aabb::Aabb
        ) -> u32 {
            let uniform = data.uniforms.len();

            data.uniforms.push(AabbUniform {
                fst: 0,
                snd: 0,
                bounds: aabb.bounds,
                item_idx: data.indices.len() as u32,
                item_count: aabb.items.len() as u32,
            });

            data.indices.extend(aabb.items.iter().map(|&i| i as u32));

            if let Some(fst) = aabb.fst.get() {
                data.uniforms[uniform].fst = into_aabb_uniform(data, fst);
            }

            if let Some(snd) = aabb.snd.get() {
                data.uniforms[uniform].snd = into_aabb_uniform(data, snd);
            }

            uniform as u32
        }

        into_aabb_uniform(&mut data, aabb);

        data
    }

    // Size of the traversal stack a shader needs for this tree
    pub fn stack_size(&self) -> u32 {
        self.depth.max(1) + 1
    }
}

// A built (or loaded) hierarchy over a mesh's triangles, in model space
#[derive(Clone)]
#[derive(Debug)]
pub struct Bvh {
    pub data: BvhData,
    pub eps: f32,
}

impl Bvh {
    pub fn build(mesh: &mesh::Mesh, config: BvhConfig) -> Result<Self, BvhError> {
        validate(mesh)?;

        if config.max_leaf_tris == 0 {
            log::warn!("BvhConfig::max_leaf_tris of 0 treated as 1");
        }

        let root = aabb::Aabb::from_mesh(&config, mesh);
        let data = BvhData::new(&root);

        log::info!(
            "Built {:?} BVH over {} triangles: {} nodes, depth {}",
            config.strategy,
            mesh.len(),
            data.uniforms.len(),
            data.depth,
        );

        log::debug!("{:?}", root);

        Ok(Self { data, eps: config.eps })
    }

    // Adopts precomputed data, checking it covers exactly this mesh
    pub fn from_data(
        mesh: &mesh::Mesh,
        data: BvhData,
        eps: f32,
    ) -> Result<Self, BvhError> {
        validate(mesh)?;

        let BvhData { uniforms, indices, .. } = &data;

        if uniforms.is_empty() {
            return Err(BvhError::Mismatch("no nodes".into()));
        }

        let mut parented = vec![false; uniforms.len()];

        for (idx, node) in uniforms.iter().enumerate() {
            let end = node.item_idx
                .checked_add(node.item_count)
                .filter(|&end| end as usize <= indices.len());

            if end.is_none() {
                return Err(BvhError::Mismatch(format!("node {idx} overruns indices")));
            }

            if node.is_leaf() {
                continue;
            }

            let children = [node.fst as usize, node.snd as usize];

            // Flattening is pre-order, so children always follow their parent
            if children.iter().any(|&c| c <= idx || c >= uniforms.len()) {
                return Err(BvhError::Mismatch(format!("node {idx} has invalid children")));
            }

            for child in children {
                if std::mem::replace(&mut parented[child], true) {
                    return Err(BvhError::Mismatch(format!("node {child} has two parents")));
                }
            }
        }

        let mut seen = vec![false; mesh.len()];
        for &prim in indices.iter() {
            match seen.get_mut(prim as usize) {
                Some(seen) => *seen = true,
                None => {
                    return Err(BvhError::Mismatch(format!("triangle {prim} out of range")));
                },
            }
        }

        if seen.iter().any(|seen| !seen) {
            return Err(BvhError::Mismatch("not every triangle is referenced".into()));
        }

        // The stored depth sizes the GPU stack, so it is never trusted.
        // Every node has at most one parent, which precedes it
        let mut levels = vec![1u32; uniforms.len()];
        for (idx, node) in uniforms.iter().enumerate() {
            if !node.is_leaf() {
                levels[node.fst as usize] = levels[idx] + 1;
                levels[node.snd as usize] = levels[idx] + 1;
            }
        }

        let depth = levels.into_iter().max().unwrap_or(1);

        Ok(Self { data: BvhData { depth, ..data }, eps })
    }

    pub fn nodes(&self) -> usize {
        self.data.uniforms.len()
    }

    pub fn depth(&self) -> u32 {
        self.data.depth
    }
}

fn validate(mesh: &mesh::Mesh) -> Result<(), BvhError> {
    if mesh.is_empty() {
        return Err(BvhError::InvalidMesh("no triangles"));
    }

    let count = mesh.vertices.len() as u32;

    if mesh.prims.iter().any(|prim| prim.indices.iter().any(|&i| i >= count)) {
        return Err(BvhError::InvalidMesh("vertex index out of range"));
    }

    if mesh.vertices.iter().any(|v| v.pos.iter().any(|c| !c.is_finite())) {
        return Err(BvhError::InvalidMesh("non-finite vertex position"));
    }

    Ok(())
}
