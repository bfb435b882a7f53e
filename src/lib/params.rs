use crate::tonemap;
use crate::scene::camera;

// Offset applied along a ray before tracing from a surface
pub const RAY_OFFSET: f32 = 0.001;

// Upper bound on internal bounces, also the shader's loop bound
pub const MAX_BOUNCES: u32 = 16;

#[derive(Clone, Copy, Default)]
#[derive(serde::Deserialize, serde::Serialize)]
#[derive(Debug, PartialEq, Eq)]
pub enum ChromaMode {
    // Red and blue are offsets from the green trace
    #[default]
    Aberration,
    // Cauchy IOR per channel with Beer-Lambert absorption
    Dispersion,
}

impl ChromaMode {
    pub fn as_u32(self) -> u32 {
        match self {
            Self::Aberration => 0,
            Self::Dispersion => 1,
        }
    }
}

// Material parameters. These change between frames,
// the BVH never has to be rebuilt for them
#[derive(Clone, Copy)]
#[derive(serde::Deserialize, serde::Serialize)]
#[derive(Debug, PartialEq)]
#[serde(default)]
pub struct GemParams {
    pub bounces: u32,
    pub ior: f32,
    // Cauchy coefficients A and B (nm^2)
    pub cauchy: [f32; 2],
    pub absorption: [f32; 3],
    pub fresnel_strength: f32,
    pub aberration_strength: f32,
    pub fast_chroma: bool,
    pub mode: ChromaMode,
    pub fire_threshold: f32,
    pub fire_spread: f32,
    pub color: [f32; 3],
    pub resolution: [u32; 2],
}

impl GemParams {
    pub const fn new() -> Self {
        Self {
            bounces: 3,
            ior: 2.4,
            cauchy: [2.378, 13544.],
            absorption: [0.; 3],
            fresnel_strength: 1.,
            aberration_strength: 0.01,
            fast_chroma: false,
            mode: ChromaMode::Aberration,
            fire_threshold: 0.6,
            fire_spread: 0.3,
            color: [1.; 3],
            resolution: [800, 600],
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.resolution = [width.max(1), height.max(1)];
    }

    pub fn aspect(&self) -> f32 {
        let [width, height] = self.resolution;

        width as f32 / height.max(1) as f32
    }

    // Brings out-of-range values back in before they reach a kernel
    pub fn sanitized(mut self) -> Self {
        if self.bounces > MAX_BOUNCES {
            log::warn!("{} bounces clamped to {MAX_BOUNCES}", self.bounces);

            self.bounces = MAX_BOUNCES;
        }

        if self.absorption.iter().any(|&a| a < 0.) {
            log::warn!("Negative absorption {:?} clamped to 0", self.absorption);

            self.absorption = self.absorption.map(|a| a.max(0.));
        }

        if self.ior < 1. {
            log::warn!("IOR {} is below 1 and will be treated as 1", self.ior);
        }

        self.fire_spread = self.fire_spread.max(0.);
        self.resize(self.resolution[0], self.resolution[1]);

        self
    }
}

impl Default for GemParams {
    fn default() -> Self { Self::new() }
}

// Places the gem in the world. Rotation is XYZ euler, in degrees
#[derive(Clone, Copy)]
#[derive(serde::Deserialize, serde::Serialize)]
#[derive(Debug, PartialEq)]
#[serde(default)]
pub struct Transform {
    pub translation: [f32; 3],
    pub rotation: [f32; 3],
    pub scale: f32,
}

impl Transform {
    pub const fn new() -> Self {
        Self {
            translation: [0.; 3],
            rotation: [0.; 3],
            scale: 1.,
        }
    }

    pub fn model(&self) -> glam::Mat4 {
        let [x, y, z] = self.rotation.map(f32::to_radians);

        glam::Mat4::from_scale_rotation_translation(
            glam::Vec3::splat(self.scale),
            glam::Quat::from_euler(glam::EulerRot::XYZ, x, y, z),
            self.translation.into(),
        )
    }

    pub fn model_inv(&self) -> glam::Mat4 {
        self.model().inverse()
    }

    // Inverse transpose, for normals
    pub fn normal_matrix(&self) -> glam::Mat4 {
        self.model_inv().transpose()
    }
}

impl Default for Transform {
    fn default() -> Self { Self::new() }
}

// Everything the compute shader reads per frame, laid out for WGSL
#[repr(C)]
#[derive(Clone, Copy)]
#[derive(bytemuck::Pod, bytemuck::Zeroable)]
#[derive(Debug)]
pub struct GemUniform {
    pub inv_projection: [[f32; 4]; 4],
    pub inv_view: [[f32; 4]; 4],
    pub model: [[f32; 4]; 4],
    pub model_inv: [[f32; 4]; 4],
    pub normal_matrix: [[f32; 4]; 4],
    pub color: [f32; 3],
    pub ior: f32,
    pub absorption: [f32; 3],
    pub fresnel_strength: f32,
    pub background: [f32; 3],
    pub aberration_strength: f32,
    pub cauchy: [f32; 2],
    pub fire_threshold: f32,
    pub fire_spread: f32,
    pub resolution: [u32; 2],
    pub env_size: [u32; 2],
    pub bounces: u32,
    pub fast_chroma: u32,
    pub mode: u32,
    pub tone_mapping: u32,
    pub exposure: f32,
    _p0: [u32; 3],
}

impl GemUniform {
    pub fn new(
        params: &GemParams,
        camera: &camera::Camera,
        transform: &Transform,
        output: &tonemap::Output,
        env_size: [u32; 2],
    ) -> Self {
        let params = params.sanitized();

        Self {
            inv_projection: camera.inv_projection(params.aspect()).to_cols_array_2d(),
            inv_view: camera.inv_view().to_cols_array_2d(),
            model: transform.model().to_cols_array_2d(),
            model_inv: transform.model_inv().to_cols_array_2d(),
            normal_matrix: transform.normal_matrix().to_cols_array_2d(),
            color: params.color,
            ior: params.ior,
            absorption: params.absorption,
            fresnel_strength: params.fresnel_strength,
            background: output.background,
            aberration_strength: params.aberration_strength,
            cauchy: params.cauchy,
            fire_threshold: params.fire_threshold,
            fire_spread: params.fire_spread,
            resolution: params.resolution,
            env_size,
            bounces: params.bounces,
            fast_chroma: params.fast_chroma as u32,
            mode: params.mode.as_u32(),
            tone_mapping: output.tone_mapping.as_u32(),
            exposure: output.exposure,
            _p0: [0; 3],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_matches_the_shader_layout() {
        assert_eq!(std::mem::size_of::<GemUniform>(), 432);
        assert_eq!(std::mem::size_of::<GemUniform>() % 16, 0);
    }

    #[test]
    fn out_of_range_params_are_clamped() {
        let params = GemParams {
            bounces: 100,
            absorption: [-1., 0.5, 0.],
            ..GemParams::new()
        }.sanitized();

        assert_eq!(params.bounces, MAX_BOUNCES);
        assert_eq!(params.absorption, [0., 0.5, 0.]);
    }

    #[test]
    fn resize_updates_resolution() {
        let mut params = GemParams::new();
            params.resize(1920, 1080);

        assert_eq!(params.resolution, [1920, 1080]);
        assert!((params.aspect() - 16. / 9.).abs() < 1e-6);

        params.resize(0, 0);
        assert_eq!(params.resolution, [1, 1]);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let params: GemParams = serde_json::from_str(r#"{
            "ior": 1.5,
            "mode": "Dispersion"
        }"#).unwrap();

        assert_eq!(params.ior, 1.5);
        assert_eq!(params.mode, ChromaMode::Dispersion);
        assert_eq!(params.bounces, 3);
    }

    #[test]
    fn transform_round_trips_points() {
        let transform = Transform {
            translation: [1., -2., 0.5],
            rotation: [30., 45., 10.],
            scale: 2.,
        };

        let p = glam::Vec3::new(0.3, 0.1, -0.7);
        let back = transform.model_inv().transform_point3(transform.model().transform_point3(p));

        assert!(back.abs_diff_eq(p, 1e-5));
    }
}
