pub mod v3;

pub use v3::{V3, V3Ops};

// A triangle, referencing three entries in the vertex buffer.
// Padded to 16 bytes so it can be read as a WGSL struct
#[repr(C)]
#[derive(bytemuck::Pod, bytemuck::Zeroable)]
#[derive(Clone, Copy)]
#[derive(Debug, PartialEq)]
pub struct Prim {
    pub indices: [u32; 3],
    _p0: u32,
}

impl Prim {
    pub const fn new(indices: [u32; 3]) -> Self {
        Self { indices, _p0: 0 }
    }
}

#[repr(C)]
#[derive(bytemuck::Pod, bytemuck::Zeroable)]
#[derive(Clone, Copy)]
#[derive(Debug, PartialEq)]
pub struct PrimVertex {
    pub pos: [f32; 3],
    _p0: u32,
    pub normal: [f32; 3],
    _p1: u32,
}

impl PrimVertex {
    pub const fn new(pos: [f32; 3], normal: [f32; 3]) -> Self {
        Self {
            pos,
            _p0: 0,
            normal,
            _p1: 0,
        }
    }
}

#[derive(Clone, Copy)]
#[derive(Debug)]
pub struct Ray {
    pub origin: V3<f32>,
    pub dir: V3<f32>,
}

impl Ray {
    pub const fn new(origin: V3<f32>, dir: V3<f32>) -> Self {
        Self { origin, dir }
    }

    pub fn at(&self, t: f32) -> V3<f32> {
        self.origin.add(self.dir.scale(t))
    }
}

// Several serde impls accept `[f32; 3]` as a JSON list of any length,
// then report the length mismatch themselves
pub fn v3_from_vec<E: serde::de::Error>(values: Vec<f32>) -> Result<V3<f32>, E> {
    match values.len() {
        3 => {
            let mut out = [0.; 3];

            out.copy_from_slice(&values);
            Ok(out)
        },
        len => Err(E::invalid_length(len, &"an array of len 3")),
    }
}
