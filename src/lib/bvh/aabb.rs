use std::{cmp, fmt};

use once_cell::unsync::OnceCell;

use crate::geom::{self, V3Ops as _};
use crate::mesh;

#[repr(C)]
#[derive(Clone, Copy)]
#[derive(bytemuck::Pod, bytemuck::Zeroable)]
#[derive(serde::Serialize)]
#[derive(Debug, PartialEq)]
pub struct Bounds {
    pub min: [f32; 3],
    #[serde(skip)]
    _p0: u32,
    pub max: [f32; 3],
    #[serde(skip)]
    _p1: u32,
}

impl<'de> serde::Deserialize<'de> for Bounds {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where D: serde::Deserializer<'de> {

        #[derive(serde::Deserialize)]
        struct Intermediate {
            min: Vec<f32>,
            max: Vec<f32>,
        }

        let Intermediate { min, max } = Intermediate::deserialize(deserializer)?;

        Ok(Self::new(geom::v3_from_vec(min)?, geom::v3_from_vec(max)?))
    }
}

impl Bounds {
    // Growing the empty box by anything yields that thing's bounds
    pub const EMPTY: Self = Self::new([f32::MAX; 3], [f32::MIN; 3]);

    pub const fn new(min: [f32; 3], max: [f32; 3]) -> Self {
        Self { min, _p0: 0, max, _p1: 0 }
    }

    pub fn from_prims<P>(prims: P, mesh: &mesh::Mesh) -> Self
        where P: Iterator<Item = usize> {

        let mut bounds = Self::EMPTY;

        for prim in prims {
            for vertex in mesh.triangle(prim) {
                bounds.grow_point(vertex);
            }
        }

        bounds
    }

    pub fn grow_point(&mut self, point: [f32; 3]) {
        self.min = self.min.least(point);
        self.max = self.max.greatest(point);
    }

    pub fn grow(&mut self, other: &Self) {
        self.min = self.min.least(other.min);
        self.max = self.max.greatest(other.max);
    }

    pub fn is_empty(&self) -> bool {
        (0..3).any(|axis| self.min[axis] > self.max[axis])
    }

    pub fn extent(&self) -> [f32; 3] {
        if self.is_empty() { [0.; 3] } else { self.max.sub(self.min) }
    }

    // Surface area, the SAH cost weight
    pub fn area(&self) -> f32 {
        let [dx, dy, dz] = self.extent();

        2. * (dx * dy + dy * dz + dz * dx)
    }

    pub fn longest_axis(&self) -> usize {
        let d = self.extent();

        if d[0] >= d[1] && d[0] >= d[2] {
            0
        } else if d[1] >= d[2] {
            1
        } else {
            2
        }
    }

    pub fn contains(&self, point: [f32; 3]) -> bool {
        point[0] >= self.min[0] &&
        point[0] <= self.max[0] &&
        point[1] >= self.min[1] &&
        point[1] <= self.max[1] &&
        point[2] >= self.min[2] &&
        point[2] <= self.max[2]
    }

    // Slab test against the box inflated by `eps`.
    // `inv_dir` holds the reciprocal ray direction, infinities included
    pub fn collides(
        &self,
        origin: [f32; 3],
        inv_dir: [f32; 3],
        eps: f32,
        t_max: f32,
    ) -> bool {
        let mut t_near = 0f32;
        let mut t_far = t_max;

        for axis in 0..3 {
            let t0 = (self.min[axis] - eps - origin[axis]) * inv_dir[axis];
            let t1 = (self.max[axis] + eps - origin[axis]) * inv_dir[axis];

            t_near = t_near.max(t0.min(t1));
            t_far = t_far.min(t0.max(t1));
        }

        t_near <= t_far
    }
}

// Build-time node. The tree gets flattened into `BvhData` for upload
pub struct Aabb {
    pub fst: OnceCell<Box<Aabb>>,
    pub snd: OnceCell<Box<Aabb>>,
    pub bounds: Bounds,
    pub items: Vec<usize>,
}

impl fmt::Debug for Aabb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fst.get().is_none() && self.snd.get().is_none()
            && !self.items.is_empty() {

            return write!(f, "{:?}", self.items);
        }

        let mut out = f.debug_list();

        if let Some(fst) = self.fst.get() {
            out.entry(fst);
        }

        if let Some(snd) = self.snd.get() {
            out.entry(snd);
        }

        out.finish()
    }
}

impl Aabb {
    fn leaf(items: Vec<usize>, mesh: &mesh::Mesh) -> Self {
        Self {
            fst: OnceCell::new(),
            snd: OnceCell::new(),
            bounds: Bounds::from_prims(items.iter().copied(), mesh),
            items,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.fst.get().is_none() && self.snd.get().is_none()
    }

    pub fn depth(&self) -> usize {
        let fst = self.fst.get().map(|fst| fst.depth()).unwrap_or(0);
        let snd = self.snd.get().map(|snd| snd.depth()).unwrap_or(0);

        1 + fst.max(snd)
    }

    fn split(
        &mut self,
        config: &super::BvhConfig,
        mesh: &mesh::Mesh,
        centroids: &[[f32; 3]],
    ) {
        if self.items.len() <= config.max_leaf_tris.max(1) {
            return;
        }

        let mut items = std::mem::take(&mut self.items);

        let mid = match config.strategy {
            super::SplitStrategy::Sah => sah(&mut items, mesh, centroids),
            super::SplitStrategy::Center => {
                let axis = self.bounds.longest_axis();
                let pos = self.bounds.min[axis] + self.bounds.extent()[axis] * 0.5;

                partition(&mut items, centroids, axis, pos)
            },
            super::SplitStrategy::Average => {
                let axis = self.bounds.longest_axis();
                let pos = items
                    .iter()
                    .map(|&i| centroids[i][axis])
                    .sum::<f32>() / items.len() as f32;

                partition(&mut items, centroids, axis, pos)
            },
        };

        let snd_items = items.split_off(mid);
        let fst_items = items;

        let mut fst = Self::leaf(fst_items, mesh);
        let mut snd = Self::leaf(snd_items, mesh);

        fst.split(config, mesh, centroids);
        snd.split(config, mesh, centroids);

        // Both cells are fresh, so neither set can fail
        let _ = self.fst.set(Box::new(fst));
        let _ = self.snd.set(Box::new(snd));
    }

    pub fn from_mesh(config: &super::BvhConfig, mesh: &mesh::Mesh) -> Self {
        let centroids = (0..mesh.len())
            .map(|prim| mesh.centroid(prim))
            .collect::<Vec<_>>();

        let mut root = Self::leaf((0..mesh.len()).collect(), mesh);
            root.split(config, mesh, &centroids);
        root
    }
}

fn sort_on_axis(items: &mut [usize], centroids: &[[f32; 3]], axis: usize) {
    // Index order settles ties, keeping the build deterministic
    items.sort_by(|&a, &b| {
        centroids[a][axis]
            .partial_cmp(&centroids[b][axis])
            .unwrap_or(cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });
}

// Sorts `items` on the cheapest axis and returns the split index.
// Cost of a split is area(left) * |left| + area(right) * |right|
fn sah(items: &mut [usize], mesh: &mesh::Mesh, centroids: &[[f32; 3]]) -> usize {
    let count = items.len();

    let mut best = (f32::INFINITY, 0, count / 2);

    let mut right_area = vec![0f32; count];

    for axis in 0..3 {
        sort_on_axis(items, centroids, axis);

        let mut sweep = Bounds::EMPTY;
        for idx in (1..count).rev() {
            sweep.grow(&Bounds::from_prims(std::iter::once(items[idx]), mesh));

            right_area[idx] = sweep.area();
        }

        let mut sweep = Bounds::EMPTY;
        for idx in 1..count {
            sweep.grow(&Bounds::from_prims(std::iter::once(items[idx - 1]), mesh));

            let cost = sweep.area() * idx as f32
                + right_area[idx] * (count - idx) as f32;

            // Equal costs prefer the more balanced split
            let balanced = idx.abs_diff(count / 2) < best.2.abs_diff(count / 2);

            if cost < best.0 || (cost == best.0 && balanced) {
                best = (cost, axis, idx);
            }
        }
    }

    let (_, axis, mid) = best;

    sort_on_axis(items, centroids, axis);

    mid
}

// Splits on a plane, falling back to the median when a side ends up empty
fn partition(
    items: &mut [usize],
    centroids: &[[f32; 3]],
    axis: usize,
    pos: f32,
) -> usize {
    sort_on_axis(items, centroids, axis);

    let mid = items.partition_point(|&i| centroids[i][axis] < pos);

    if mid == 0 || mid == items.len() {
        items.len() / 2
    } else {
        mid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bvh::{BvhConfig, SplitStrategy};

    fn row(count: usize) -> mesh::Mesh {
        let mut mesh = mesh::Mesh::default();

        for i in 0..count {
            let x = i as f32 * 2.;

            mesh.push_facet([x, 0., 0.], [x + 1., 0., 0.], [x, 1., 0.]);
        }

        mesh
    }

    fn leaves(node: &Aabb, out: &mut Vec<Vec<usize>>) {
        if node.is_leaf() {
            out.push(node.items.clone());
        } else {
            leaves(node.fst.get().unwrap(), out);
            leaves(node.snd.get().unwrap(), out);
        }
    }

    fn check(node: &Aabb, mesh: &mesh::Mesh) {
        for &prim in node.items.iter() {
            for vertex in mesh.triangle(prim) {
                assert!(node.bounds.contains(vertex));
            }
        }

        for child in [node.fst.get(), node.snd.get()].into_iter().flatten() {
            assert!(node.bounds.contains(child.bounds.min));
            assert!(node.bounds.contains(child.bounds.max));

            check(child, mesh);
        }
    }

    #[test]
    fn every_strategy_partitions_all_items() {
        let mesh = row(37);

        for strategy in [SplitStrategy::Sah, SplitStrategy::Center, SplitStrategy::Average] {
            let config = BvhConfig { strategy, ..BvhConfig::new() };
            let root = Aabb::from_mesh(&config, &mesh);

            let mut found = Vec::new();
            leaves(&root, &mut found);

            assert!(found.iter().all(|leaf| leaf.len() == 1));

            let mut items = found.concat();
                items.sort();

            assert_eq!(items, (0..37).collect::<Vec<_>>());

            check(&root, &mesh);
        }
    }

    #[test]
    fn leaf_cap_is_respected() {
        let mesh = row(50);

        let config = BvhConfig { max_leaf_tris: 4, ..BvhConfig::new() };
        let root = Aabb::from_mesh(&config, &mesh);

        let mut found = Vec::new();
        leaves(&root, &mut found);

        assert!(found.iter().all(|leaf| !leaf.is_empty() && leaf.len() <= 4));
        assert_eq!(found.iter().map(Vec::len).sum::<usize>(), 50);
    }

    #[test]
    fn identical_centroids_still_split() {
        let mut mesh = mesh::Mesh::default();

        for _ in 0..8 {
            mesh.push_facet([0., 0., 0.], [1., 0., 0.], [0., 1., 0.]);
        }

        for strategy in [SplitStrategy::Sah, SplitStrategy::Center, SplitStrategy::Average] {
            let config = BvhConfig { strategy, ..BvhConfig::new() };
            let root = Aabb::from_mesh(&config, &mesh);

            assert_eq!(root.depth(), 4);
        }
    }

    #[test]
    fn sah_ties_go_to_the_middle() {
        let mut mesh = mesh::Mesh::default();

        for _ in 0..7 {
            mesh.push_facet([0., 0., 0.], [1., 0., 0.], [0., 1., 0.]);
        }

        let centroids = (0..mesh.len())
            .map(|prim| mesh.centroid(prim))
            .collect::<Vec<_>>();

        // Every split costs the same
        let mut items = (0..7).collect::<Vec<_>>();

        assert_eq!(sah(&mut items, &mesh, &centroids), 3);
        assert_eq!(items, (0..7).collect::<Vec<_>>());
    }

    #[test]
    fn sah_separates_clusters() {
        let mut mesh = mesh::Mesh::default();

        // Two tight clusters far apart, interleaved in index order
        for i in 0..8 {
            let x = if i % 2 == 0 { 0. } else { 100. };
            let y = i as f32 * 0.01;

            mesh.push_facet([x, y, 0.], [x + 0.1, y, 0.], [x, y + 0.1, 0.]);
        }

        let root = Aabb::from_mesh(&BvhConfig::new(), &mesh);

        let fst = root.fst.get().unwrap();
        let snd = root.snd.get().unwrap();

        assert!(fst.bounds.max[0] < 1.);
        assert!(snd.bounds.min[0] > 99.);
    }

    #[test]
    fn degenerate_triangle_has_flat_bounds() {
        let mut mesh = mesh::Mesh::default();
            mesh.push_facet([0., 0., 0.], [1., 1., 1.], [2., 2., 2.]);

        let bounds = Bounds::from_prims(0..1, &mesh);

        assert_eq!(bounds.min, [0.; 3]);
        assert_eq!(bounds.max, [2.; 3]);
        assert_eq!(bounds.area(), 24.);
    }

    #[test]
    fn slab_test_handles_axis_parallel_rays() {
        let bounds = Bounds::new([-1.; 3], [1.; 3]);

        let inv = |d: [f32; 3]| [1. / d[0], 1. / d[1], 1. / d[2]];

        assert!(bounds.collides([0., 0., -5.], inv([0., 0., 1.]), 0., f32::INFINITY));
        assert!(!bounds.collides([2., 0., -5.], inv([0., 0., 1.]), 0., f32::INFINITY));
        assert!(!bounds.collides([0., 0., -5.], inv([0., 0., -1.]), 0., f32::INFINITY));
        assert!(!bounds.collides([0., 0., -5.], inv([0., 0., 1.]), 0., 3.));
    }
}
