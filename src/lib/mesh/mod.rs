mod procedural;

pub use procedural::BrilliantCut;

use std::{io, path};

use anyhow::Context as _;

use crate::geom;
use crate::geom::V3Ops as _;

// Triangle soup in model space. Vertices are stored per corner,
// so facets keep their own normals along shared edges
#[derive(Clone, Default)]
#[derive(Debug)]
pub struct Mesh {
    pub vertices: Vec<geom::PrimVertex>,
    pub prims: Vec<geom::Prim>,
}

impl Mesh {
    pub fn len(&self) -> usize {
        self.prims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prims.is_empty()
    }

    pub fn triangle(&self, prim: usize) -> [[f32; 3]; 3] {
        let [a, b, c] = self.prims[prim].indices;

        [
            self.vertices[a as usize].pos,
            self.vertices[b as usize].pos,
            self.vertices[c as usize].pos,
        ]
    }

    pub fn normals(&self, prim: usize) -> [[f32; 3]; 3] {
        let [a, b, c] = self.prims[prim].indices;

        [
            self.vertices[a as usize].normal,
            self.vertices[b as usize].normal,
            self.vertices[c as usize].normal,
        ]
    }

    pub fn centroid(&self, prim: usize) -> [f32; 3] {
        let [a, b, c] = self.triangle(prim);

        a.add(b).add(c).scale(1. / 3.)
    }

    // Pushes a flat-shaded triangle
    pub fn push_facet(&mut self, a: [f32; 3], b: [f32; 3], c: [f32; 3]) {
        let normal = b.sub(a).cross(c.sub(a)).normalize();

        self.push_triangle([a, b, c], [normal; 3]);
    }

    pub fn push_triangle(&mut self, pos: [[f32; 3]; 3], normals: [[f32; 3]; 3]) {
        let base = self.vertices.len() as u32;

        for (pos, normal) in pos.into_iter().zip(normals) {
            self.vertices.push(geom::PrimVertex::new(pos, normal));
        }

        self.prims.push(geom::Prim::new([base, base + 1, base + 2]));
    }

    pub fn add_obj(&mut self, obj: &wavefront::Obj) {
        for [a, b, c] in obj.triangles() {
            let pa = a.position();
            let pb = b.position();
            let pc = c.position();

            // Files without normals get flat facets,
            // smoothing would blur the cut of the stone
            let face = pb.sub(pa).cross(pc.sub(pa)).normalize();

            let normals = [
                a.normal().map(|n| n.normalize()).unwrap_or(face),
                b.normal().map(|n| n.normalize()).unwrap_or(face),
                c.normal().map(|n| n.normalize()).unwrap_or(face),
            ];

            self.push_triangle([pa, pb, pc], normals);
        }
    }

    pub fn from_obj(obj: &wavefront::Obj) -> Self {
        let mut mesh = Self::default();
            mesh.add_obj(obj);
        mesh
    }

    pub fn from_reader<R: io::Read>(reader: R) -> anyhow::Result<Self> {
        let obj = wavefront::Obj::from_reader(reader)?;

        Ok(Self::from_obj(&obj))
    }

    pub fn load<P: AsRef<path::Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();

        let obj = wavefront::Obj::from_file(path)
            .with_context(|| format!("Failed to load mesh {}", path.display()))?;

        let mesh = Self::from_obj(&obj);

        log::info!(
            "Loaded {} ({} triangles)",
            path.display(),
            mesh.len()
        );

        Ok(mesh)
    }

    pub fn bounds(&self) -> ([f32; 3], [f32; 3]) {
        self.vertices.iter().fold(
            ([f32::INFINITY; 3], [f32::NEG_INFINITY; 3]),
            |(min, max), vertex| (min.least(vertex.pos), max.greatest(vertex.pos))
        )
    }

    // Closed cube of the given edge length centred on the origin,
    // wound counter-clockwise when seen from outside
    pub fn cube(edge: f32) -> Self {
        let h = edge * 0.5;

        let mut mesh = Self::default();

        let p = |x: f32, y: f32, z: f32| [x * h, y * h, z * h];

        // +x, -x, +y, -y, +z, -z
        let quads = [
            [p(1., -1., -1.), p(1., 1., -1.), p(1., 1., 1.), p(1., -1., 1.)],
            [p(-1., -1., 1.), p(-1., 1., 1.), p(-1., 1., -1.), p(-1., -1., -1.)],
            [p(-1., 1., -1.), p(-1., 1., 1.), p(1., 1., 1.), p(1., 1., -1.)],
            [p(-1., -1., 1.), p(-1., -1., -1.), p(1., -1., -1.), p(1., -1., 1.)],
            [p(-1., -1., 1.), p(1., -1., 1.), p(1., 1., 1.), p(-1., 1., 1.)],
            [p(1., -1., -1.), p(-1., -1., -1.), p(-1., 1., -1.), p(1., 1., -1.)],
        ];

        for [a, b, c, d] in quads {
            mesh.push_facet(a, b, c);
            mesh.push_facet(a, c, d);
        }

        mesh
    }
}
