use crate::geom::{self, V3Ops as _};
use crate::mesh;

// Hits closer than this are ignored
pub const T_MIN: f32 = 0.000001;

#[derive(Clone, Copy)]
#[derive(Debug, PartialEq)]
pub struct Hit {
    pub prim: usize,
    pub t: f32,
    pub barycentric: [f32; 3],
    // Geometric normal following the triangle's winding, not oriented
    // towards the ray
    pub face_normal: [f32; 3],
}

impl Hit {
    // Vertex normals blended at the hit point
    pub fn shading_normal(&self, mesh: &mesh::Mesh) -> [f32; 3] {
        let [na, nb, nc] = mesh.normals(self.prim);
        let [w, u, v] = self.barycentric;

        let normal = na.scale(w).add(nb.scale(u)).add(nc.scale(v)).normalize();

        if normal.mag() == 0. { self.face_normal } else { normal }
    }
}

// Two-sided Moller-Trumbore. Returns (t, u, v)
pub fn intersect_triangle(
    ray: &geom::Ray,
    [a, b, c]: [[f32; 3]; 3],
) -> Option<(f32, f32, f32)> {
    let e1 = b.sub(a);
    let e2 = c.sub(a);

    let p = ray.dir.cross(e2);
    let det = e1.dot(p);

    if det.abs() < f32::MIN_POSITIVE {
        return None;
    }

    let inv = 1. / det;

    let s = ray.origin.sub(a);
    let u = s.dot(p) * inv;

    if !(0. ..=1.).contains(&u) {
        return None;
    }

    let q = s.cross(e1);
    let v = ray.dir.dot(q) * inv;

    if v < 0. || u + v > 1. {
        return None;
    }

    let t = e2.dot(q) * inv;

    (t > T_MIN).then_some((t, u, v))
}

fn hit(mesh: &mesh::Mesh, ray: &geom::Ray, prim: usize, t_max: f32) -> Option<Hit> {
    let tri = mesh.triangle(prim);

    let (t, u, v) = intersect_triangle(ray, tri)?;

    if t >= t_max {
        return None;
    }

    let [a, b, c] = tri;

    Some(Hit {
        prim,
        t,
        barycentric: [1. - u - v, u, v],
        face_normal: b.sub(a).cross(c.sub(a)).normalize(),
    })
}

impl super::Bvh {
    // Nearest hit along the ray. Only leaves whose bounds the ray
    // crosses before the current best hit are tested
    pub fn first_hit(&self, mesh: &mesh::Mesh, ray: &geom::Ray) -> Option<Hit> {
        let super::BvhData { uniforms, indices, .. } = &self.data;

        let inv_dir = [1. / ray.dir[0], 1. / ray.dir[1], 1. / ray.dir[2]];

        let mut stack = Vec::with_capacity(self.data.stack_size() as usize);
            stack.push(0u32);

        let mut best: Option<Hit> = None;

        while let Some(idx) = stack.pop() {
            let node = &uniforms[idx as usize];

            let t_max = best.map(|hit| hit.t).unwrap_or(f32::INFINITY);

            if !node.bounds.collides(ray.origin, inv_dir, self.eps, t_max) {
                continue;
            }

            if node.is_leaf() {
                let items = node.item_idx..(node.item_idx + node.item_count);

                for item in items {
                    let t_max = best.map(|hit| hit.t).unwrap_or(f32::INFINITY);

                    if let Some(hit) = hit(mesh, ray, indices[item as usize] as usize, t_max) {
                        best = Some(hit);
                    }
                }
            } else {
                stack.push(node.snd);
                stack.push(node.fst);
            }
        }

        best
    }
}

// Exhaustive scan over every triangle, the reference for traversal
pub fn first_hit_brute(mesh: &mesh::Mesh, ray: &geom::Ray) -> Option<Hit> {
    let mut best: Option<Hit> = None;

    for prim in 0..mesh.len() {
        let t_max = best.map(|hit| hit.t).unwrap_or(f32::INFINITY);

        if let Some(hit) = hit(mesh, ray, prim, t_max) {
            best = Some(hit);
        }
    }

    best
}
