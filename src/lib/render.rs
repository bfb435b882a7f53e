use std::path;

use anyhow::Context as _;
use rayon::prelude::*;

use crate::{params, scene, tonemap, tracer};

// Display-referred RGBA, rows from the top
#[derive(Clone)]
#[derive(Debug)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<[f32; 4]>,
}

impl Frame {
    pub fn new(width: u32, height: u32, fill: [f32; 4]) -> Self {
        Self {
            width,
            height,
            pixels: vec![fill; (width * height) as usize],
        }
    }

    pub fn get(&self, x: u32, y: u32) -> [f32; 4] {
        self.pixels[(y * self.width + x) as usize]
    }

    pub fn to_rgba8(&self) -> image::RgbaImage {
        let bytes = self.pixels.iter()
            .flat_map(|pixel| pixel.map(|c| (c.clamp(0., 1.) * 255. + 0.5) as u8))
            .collect();

        // The buffer always matches the dimensions
        image::RgbaImage::from_raw(self.width, self.height, bytes)
            .unwrap_or_else(|| image::RgbaImage::new(self.width, self.height))
    }

    pub fn from_rgba8(width: u32, height: u32, bytes: &[u8]) -> Self {
        let pixels = bytes
            .chunks_exact(4)
            .map(|px| [0, 1, 2, 3].map(|c| px[c] as f32 / 255.))
            .collect();

        Self { width, height, pixels }
    }

    pub fn save<P: AsRef<path::Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();

        self.to_rgba8()
            .save_with_format(path, image::ImageFormat::Png)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        log::info!("Wrote {}x{} frame to {}", self.width, self.height, path.display());

        Ok(())
    }
}

// Everything a frame needs besides the scene itself
#[derive(Clone, Copy)]
#[derive(Debug, Default)]
pub struct View {
    pub params: params::GemParams,
    pub camera: scene::camera::Camera,
    pub transform: params::Transform,
    pub output: tonemap::Output,
}

// Runs the kernel on the CPU, one row per rayon task
pub struct CpuRenderer;

impl CpuRenderer {
    pub fn render(scene: &scene::Scene, view: &View) -> anyhow::Result<Frame> {
        let Some((env, gem)) = scene.active() else {
            anyhow::bail!("Unable to render a scene that has not finished loading");
        };

        let View { params, camera, transform, output } = view;

        let [width, height] = params.sanitized().resolution;

        let tracer = tracer::Tracer::new(&gem.mesh, &gem.bvh, env, *params, transform);

        let inv_projection = camera.inv_projection(params.aspect());
        let inv_view = camera.inv_view();

        let background = output.background();

        let start = std::time::Instant::now();

        let pixels = (0..height).into_par_iter().flat_map_iter(|y| {
            let tracer = &tracer;

            (0..width).map(move |x| {
                let ray = scene::camera::pixel_ray(
                    &inv_projection,
                    &inv_view,
                    x, y,
                    [width, height],
                );

                match tracer.shade_ray(&ray) {
                    Some(color) => output.display(color),
                    None => background,
                }
            })
        }).collect::<Vec<_>>();

        log::info!(
            "Rendered {width}x{height} on the CPU in {:.2?}",
            start.elapsed()
        );

        Ok(Frame { width, height, pixels })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bvh, env, mesh};

    fn scene() -> scene::Scene {
        let gem = scene::Gem::new(
            mesh::Mesh::brilliant(mesh::BrilliantCut::new()),
            bvh::BvhConfig::new(),
        ).unwrap();

        scene::Scene::Unloaded
            .with_environment(env::Environment::gradient(64, 32))
            .with_gem(gem)
    }

    #[test]
    fn unloaded_scene_is_refused() {
        assert!(CpuRenderer::render(&scene::Scene::Unloaded, &View::default()).is_err());
    }

    #[test]
    fn frame_has_background_and_gem() {
        let mut view = View::default();
            view.params.resize(32, 24);

        let frame = CpuRenderer::render(&scene(), &view).unwrap();

        assert_eq!(frame.pixels.len(), 32 * 24);

        // Corners miss the stone, the centre looks straight at it
        assert_eq!(frame.get(0, 0), view.output.background());
        assert_ne!(frame.get(16, 12), view.output.background());

        assert!(frame.pixels.iter().all(|px| px[3] == 1.));
    }

    #[test]
    fn frames_survive_png() {
        let mut view = View::default();
            view.params.resize(8, 6);

        let frame = CpuRenderer::render(&scene(), &view).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");

        frame.save(&path).unwrap();

        let image = image::open(&path).unwrap().into_rgba8();

        assert_eq!(image.dimensions(), (8, 6));
        assert_eq!(image.as_raw(), frame.to_rgba8().as_raw());
    }
}
