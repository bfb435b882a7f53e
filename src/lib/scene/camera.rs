use crate::geom;

// A perspective camera looking at a fixed target.
// Angles are in degrees, like the rest of the config
#[derive(Clone, Copy)]
#[derive(serde::Deserialize, serde::Serialize)]
#[derive(Debug, PartialEq)]
#[serde(default)]
pub struct Camera {
    pub pos: [f32; 3],
    pub at: [f32; 3],
    pub up: [f32; 3],
    pub fov: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub const fn new() -> Self {
        Self {
            pos: [2., 3., 2.],
            at: [0.; 3],
            up: [0., 1., 0.],
            fov: 75.,
            near: 0.1,
            far: 100.,
        }
    }

    pub fn view(&self) -> glam::Mat4 {
        glam::Mat4::look_at_rh(self.pos.into(), self.at.into(), self.up.into())
    }

    // The camera's world matrix
    pub fn inv_view(&self) -> glam::Mat4 {
        self.view().inverse()
    }

    pub fn projection(&self, aspect: f32) -> glam::Mat4 {
        glam::Mat4::perspective_rh_gl(
            self.fov.clamp(1., 179.).to_radians(),
            aspect.max(f32::EPSILON),
            self.near,
            self.far,
        )
    }

    pub fn inv_projection(&self, aspect: f32) -> glam::Mat4 {
        self.projection(aspect).inverse()
    }

    // The eye ray through the centre of pixel (x, y), rows counted from the top
    pub fn pixel_ray(&self, x: u32, y: u32, [width, height]: [u32; 2]) -> geom::Ray {
        let aspect = width as f32 / height.max(1) as f32;

        pixel_ray(
            &self.inv_projection(aspect),
            &self.inv_view(),
            x, y,
            [width, height],
        )
    }
}

impl Default for Camera {
    fn default() -> Self { Self::new() }
}

// Unprojects a pixel onto the near plane. The compute shader does the same
pub fn pixel_ray(
    inv_projection: &glam::Mat4,
    inv_view: &glam::Mat4,
    x: u32,
    y: u32,
    [width, height]: [u32; 2],
) -> geom::Ray {
    let ndc = glam::Vec2::new(
        (x as f32 + 0.5) / width.max(1) as f32 * 2. - 1.,
        1. - (y as f32 + 0.5) / height.max(1) as f32 * 2.,
    );

    let target = inv_projection.project_point3(ndc.extend(-1.));

    let origin = inv_view.w_axis.truncate();
    let dir = inv_view.transform_vector3(target).normalize();

    geom::Ray::new(origin.into(), dir.into())
}
