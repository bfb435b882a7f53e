use std::{f32::consts, path};

use anyhow::Context as _;

use crate::geom::V3Ops as _;

// Equirectangular environment in linear RGB.
// Row 0 is the zenith, columns wrap around the vertical axis
#[derive(Clone)]
#[derive(Debug)]
pub struct Environment {
    pub width: u32,
    pub height: u32,
    pub texels: Vec<[f32; 3]>,
}

// Direction to texture coordinates. `v` grows upwards
pub fn equirect_uv(dir: [f32; 3]) -> [f32; 2] {
    let [x, y, z] = dir.normalize();

    let u = z.atan2(x) / consts::TAU + 0.5;
    let v = y.clamp(-1., 1.).asin() / consts::PI + 0.5;

    [u, v]
}

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

impl Environment {
    pub fn new(width: u32, height: u32, texels: Vec<[f32; 3]>) -> anyhow::Result<Self> {
        anyhow::ensure!(width > 0 && height > 0, "Environment has no texels");
        anyhow::ensure!(
            texels.len() == (width * height) as usize,
            "Expected {} texels, got {}", width * height, texels.len()
        );

        Ok(Self { width, height, texels })
    }

    // A single color in every direction
    pub fn uniform(color: [f32; 3]) -> Self {
        Self { width: 1, height: 1, texels: vec![color] }
    }

    pub fn from_image(image: image::DynamicImage) -> Self {
        // Float images (Radiance HDR, OpenEXR) already hold linear radiance
        let linear = matches!(
            image.color(),
            image::ColorType::Rgb32F | image::ColorType::Rgba32F
        );

        let image = image.into_rgb32f();

        let texels = image.pixels().map(|pixel| {
            let image::Rgb(rgb) = *pixel;

            if linear { rgb } else { rgb.map(srgb_to_linear) }
        }).collect();

        Self {
            width: image.width(),
            height: image.height(),
            texels,
        }
    }

    pub fn load<P: AsRef<path::Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();

        let image = image::open(path)
            .with_context(|| format!("Failed to load environment {}", path.display()))?;

        let env = Self::from_image(image);

        anyhow::ensure!(env.width > 0 && env.height > 0, "{} is empty", path.display());

        log::info!("Loaded {} ({}x{})", path.display(), env.width, env.height);

        Ok(env)
    }

    // Sky above the horizon, ground below and a bright band of sun
    // that gives the stone something to disperse
    pub fn gradient(width: u32, height: u32) -> Self {
        let width = width.max(2);
        let height = height.max(2);

        const ZENITH: [f32; 3] = [0.25, 0.45, 0.9];
        const HORIZON: [f32; 3] = [0.9, 0.92, 0.95];
        const GROUND: [f32; 3] = [0.18, 0.16, 0.14];

        let sun = [0.4f32, 0.7, 0.6].normalize();

        let mut texels = Vec::with_capacity((width * height) as usize);

        for row in 0..height {
            let v = 1. - (row as f32 + 0.5) / height as f32;
            let elevation = (v - 0.5) * consts::PI;

            for col in 0..width {
                let u = (col as f32 + 0.5) / width as f32;
                let phi = (u - 0.5) * consts::TAU;

                let dir = [
                    elevation.cos() * phi.cos(),
                    elevation.sin(),
                    elevation.cos() * phi.sin(),
                ];

                let mut color = if dir[1] >= 0. {
                    HORIZON.lerp(ZENITH, dir[1].sqrt())
                } else {
                    HORIZON.lerp(GROUND, (-dir[1] * 4.).min(1.))
                };

                let focus = dir.dot(sun).max(0.).powi(256);
                color = color.add([40f32; 3].scale(focus));

                texels.push(color);
            }
        }

        Self { width, height, texels }
    }

    fn texel(&self, col: i64, row: i64) -> [f32; 3] {
        let width = self.width as i64;
        let height = self.height as i64;

        let col = col.rem_euclid(width);
        let row = row.clamp(0, height - 1);

        self.texels[(row * width + col) as usize]
    }

    // Bilinear lookup, repeating horizontally and clamping vertically
    pub fn sample_uv(&self, [u, v]: [f32; 2]) -> [f32; 3] {
        let x = u * self.width as f32 - 0.5;
        let y = (1. - v) * self.height as f32 - 0.5;

        let x0 = x.floor();
        let y0 = y.floor();

        let fx = x - x0;
        let fy = y - y0;

        let (col, row) = (x0 as i64, y0 as i64);

        let top = self.texel(col, row).lerp(self.texel(col + 1, row), fx);
        let bottom = self.texel(col, row + 1).lerp(self.texel(col + 1, row + 1), fx);

        top.lerp(bottom, fy)
    }

    pub fn sample(&self, dir: [f32; 3]) -> [f32; 3] {
        self.sample_uv(equirect_uv(dir))
    }

    // Texel data for an Rgba16Float texture
    pub fn rgba16f(&self) -> Vec<half::f16> {
        self.texels.iter().flat_map(|&[r, g, b]| {
            [r, g, b, 1.].map(half::f16::from_f32)
        }).collect()
    }
}
