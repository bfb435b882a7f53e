use std::f32::consts;

use crate::geom::V3Ops as _;

// Proportions of a round brilliant-style stone, relative to its diameter
#[derive(Clone, Copy)]
#[derive(serde::Deserialize, serde::Serialize)]
#[derive(Debug)]
#[serde(default)]
pub struct BrilliantCut {
    pub diameter: f32,
    pub facets: u32,
    pub table: f32,
    pub crown: f32,
    pub girdle: f32,
    pub pavilion: f32,
}

impl BrilliantCut {
    pub const fn new() -> Self {
        Self {
            diameter: 2.,
            facets: 16,
            table: 0.56,
            crown: 0.16,
            girdle: 0.03,
            pavilion: 0.43,
        }
    }
}

impl Default for BrilliantCut {
    fn default() -> Self { Self::new() }
}

impl super::Mesh {
    // Table, crown, girdle and pavilion around a single culet point.
    // The stone is convex and contains the origin, which is what
    // the facet winding check below relies on
    pub fn brilliant(cut: BrilliantCut) -> Self {
        let BrilliantCut {
            diameter,
            facets,
            table,
            crown,
            girdle,
            pavilion,
        } = cut;

        let n = facets.max(3) as usize;

        let radius = diameter * 0.5;
        let table_radius = radius * table.clamp(0.05, 0.95);

        let girdle_top = diameter * girdle * 0.5;
        let girdle_bottom = -girdle_top;

        let top = girdle_top + diameter * crown;
        let culet = [0., girdle_bottom - diameter * pavilion, 0.];

        let ring = |r: f32, y: f32, offset: f32| -> Vec<[f32; 3]> {
            (0..n).map(|i| {
                let theta = consts::TAU * (i as f32 + offset) / n as f32;

                [r * theta.cos(), y, r * theta.sin()]
            }).collect()
        };

        // Rotate the table half a step so the crown forms kites
        let table_ring = ring(table_radius, top, 0.5);
        let upper = ring(radius, girdle_top, 0.);
        let lower = ring(radius, girdle_bottom, 0.);

        let mut mesh = Self::default();

        let mut facet = |a: [f32; 3], b: [f32; 3], c: [f32; 3]| {
            let normal = b.sub(a).cross(c.sub(a));
            let centroid = a.add(b).add(c);

            if normal.dot(centroid) >= 0. {
                mesh.push_facet(a, b, c);
            } else {
                mesh.push_facet(a, c, b);
            }
        };

        let table_center = [0., top, 0.];

        for i in 0..n {
            let j = (i + 1) % n;

            facet(table_center, table_ring[i], table_ring[j]);

            facet(upper[i], upper[j], table_ring[i]);
            facet(table_ring[i], upper[j], table_ring[j]);

            if girdle > 0. {
                facet(upper[i], lower[i], lower[j]);
                facet(upper[i], lower[j], upper[j]);
            }

            facet(lower[i], culet, lower[j]);
        }

        mesh
    }
}
