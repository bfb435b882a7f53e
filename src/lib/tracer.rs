use crate::{bvh, env, geom, mesh, optics, params};
use crate::geom::V3Ops as _;

// Where a ray ends up after travelling through the stone
#[derive(Clone, Copy)]
#[derive(Debug, PartialEq)]
pub struct Exit {
    // World space, normalized
    pub dir: [f32; 3],
    // World space length of the path inside the stone
    pub distance: f32,
    // False when the bounce budget ran out (or the mesh leaked)
    // before a face let the ray out
    pub exited: bool,
    pub bounces: u32,
}

// The per-pixel kernel, evaluated on the CPU.
// Every call is independent, so a Tracer can be shared across threads
pub struct Tracer<'a> {
    pub mesh: &'a mesh::Mesh,
    pub bvh: &'a bvh::Bvh,
    pub env: &'a env::Environment,
    pub params: params::GemParams,
    model: glam::Mat4,
    model_inv: glam::Mat4,
    normal_matrix: glam::Mat4,
}

impl<'a> Tracer<'a> {
    pub fn new(
        mesh: &'a mesh::Mesh,
        bvh: &'a bvh::Bvh,
        env: &'a env::Environment,
        params: params::GemParams,
        transform: &params::Transform,
    ) -> Self {
        Self {
            mesh,
            bvh,
            env,
            params: params.sanitized(),
            model: transform.model(),
            model_inv: transform.model_inv(),
            normal_matrix: transform.normal_matrix(),
        }
    }

    fn to_world(&self, v: [f32; 3]) -> [f32; 3] {
        self.model.transform_vector3(v.into()).into()
    }

    fn world_len(&self, v: [f32; 3]) -> f32 {
        self.model.transform_vector3(v.into()).length()
    }

    // Refracts `dir` into the stone at `point` (world space, `normal`
    // facing against `dir`) and follows it until it leaves
    pub fn trace_internal(
        &self,
        point: [f32; 3],
        dir: [f32; 3],
        normal: [f32; 3],
        ior: f32,
    ) -> Exit {
        use params::RAY_OFFSET;

        let ior = optics::clamp_ior(ior);

        let entry = dir.refract(normal, 1. / ior).normalize();

        let origin = point.add(entry.scale(RAY_OFFSET));

        let mut ray = geom::Ray::new(
            self.model_inv.transform_point3(origin.into()).into(),
            self.model_inv.transform_vector3(entry.into()).normalize().into(),
        );

        let mut exit = Exit {
            dir: entry,
            distance: RAY_OFFSET,
            exited: false,
            bounces: 0,
        };

        for _ in 0..self.params.bounces {
            let Some(hit) = self.bvh.first_hit(self.mesh, &ray) else {
                log::trace!("Internal ray escaped without a hit: {ray:?}");

                break;
            };

            exit.bounces += 1;
            exit.distance += self.world_len(ray.dir.scale(hit.t));

            let point = ray.at(hit.t);

            let normal = if hit.face_normal.dot(ray.dir) > 0. {
                hit.face_normal.neg()
            } else {
                hit.face_normal
            };

            let out = ray.dir.refract(normal, ior);

            if out.mag() > 0. {
                ray.dir = out.normalize();
                exit.exited = true;

                break;
            }

            ray.dir = ray.dir.reflect(normal).normalize();
            ray.origin = point.add(ray.dir.scale(RAY_OFFSET));

            exit.distance += self.world_len(ray.dir.scale(RAY_OFFSET));
        }

        exit.dir = self.to_world(ray.dir).normalize();

        exit
    }

    // Red, green and blue exits for a view ray meeting the surface
    pub fn channel_exits(
        &self,
        point: [f32; 3],
        view: [f32; 3],
        normal: [f32; 3],
    ) -> [Exit; 3] {
        let params::GemParams {
            ior,
            aberration_strength: strength,
            fast_chroma,
            mode,
            cauchy: [a, b],
            ..
        } = self.params;

        match mode {
            params::ChromaMode::Aberration => {
                let green = self.trace_internal(point, view, normal, ior);

                if strength == 0. {
                    return [green; 3];
                }

                if fast_chroma {
                    let shift = |sign: f32| Exit {
                        dir: green.dir.add([sign * strength * 0.5; 3]).normalize(),
                        ..green
                    };

                    [shift(1.), green, shift(-1.)]
                } else {
                    [
                        self.trace_internal(point, view, normal, ior * (1. - strength)),
                        green,
                        self.trace_internal(point, view, normal, ior * (1. + strength)),
                    ]
                }
            },
            params::ChromaMode::Dispersion => {
                let [r, g, b] = optics::cauchy_rgb(a, b);

                let green = self.trace_internal(point, view, normal, g);

                let trace = |ior: f32| if ior == g {
                    green
                } else {
                    self.trace_internal(point, view, normal, ior)
                };

                [trace(r), green, trace(b)]
            },
        }
    }

    // Linear radiance leaving the surface at `point` towards the eye.
    // `view` travels from the eye to the surface
    pub fn shade(&self, point: [f32; 3], view: [f32; 3], normal: [f32; 3]) -> [f32; 3] {
        let params::GemParams {
            ior,
            absorption,
            fresnel_strength,
            mode,
            fire_threshold,
            fire_spread,
            color,
            ..
        } = self.params;

        let view = view.normalize();

        let normal = normal.normalize();
        let normal = if normal.dot(view) > 0. { normal.neg() } else { normal };

        let [r, g, b] = self.channel_exits(point, view, normal);

        match mode {
            // Plain channel select, no surface reflection
            params::ChromaMode::Aberration => [
                self.env.sample(r.dir)[0],
                self.env.sample(g.dir)[1],
                self.env.sample(b.dir)[2],
            ].mul(color),
            params::ChromaMode::Dispersion => {
                let attenuated = |exit: Exit| self.env
                    .sample(exit.dir)
                    .mul(optics::transmittance(absorption, exit.distance));

                let base = attenuated(g);

                let dispersed = [
                    attenuated(r)[0],
                    base[1],
                    attenuated(b)[2],
                ];

                let fire = optics::smoothstep(
                    fire_threshold,
                    fire_threshold + fire_spread,
                    optics::luminance(base),
                );

                let refracted = optics::mix(base, dispersed, fire).mul(color);

                let fresnel = optics::schlick(
                    optics::r0_from_ior(optics::clamp_ior(ior)),
                    view.neg().dot(normal),
                );

                let reflected = self.env.sample(view.reflect(normal));

                optics::mix(refracted, reflected, fresnel * fresnel_strength)
            },
        }
    }

    // Shades the front surface under a world space eye ray,
    // `None` when the ray misses the stone
    pub fn shade_ray(&self, ray: &geom::Ray) -> Option<[f32; 3]> {
        // Leaving the direction unnormalized keeps `t` in world units
        let local = geom::Ray::new(
            self.model_inv.transform_point3(ray.origin.into()).into(),
            self.model_inv.transform_vector3(ray.dir.into()).into(),
        );

        let hit = self.bvh.first_hit(self.mesh, &local)?;

        let point = ray.at(hit.t);
        let normal = self.normal_matrix
            .transform_vector3(hit.shading_normal(self.mesh).into())
            .normalize()
            .into();

        Some(self.shade(point, ray.dir, normal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube() -> (mesh::Mesh, bvh::Bvh) {
        let mesh = mesh::Mesh::cube(1.);
        let bvh = bvh::Bvh::build(&mesh, bvh::BvhConfig::new()).unwrap();

        (mesh, bvh)
    }

    fn close(a: [f32; 3], b: [f32; 3], eps: f32) -> bool {
        a.sub(b).mag() < eps
    }

    #[test]
    fn unit_ior_passes_straight_through() {
        let (mesh, bvh) = cube();
        let env = env::Environment::uniform([1.; 3]);

        let params = params::GemParams { ior: 1., ..params::GemParams::new() };
        let tracer = Tracer::new(&mesh, &bvh, &env, params, &params::Transform::new());

        let exit = tracer.trace_internal([0.1, 0.2, 0.5], [0., 0., -1.], [0., 0., 1.], 1.);

        assert!(exit.exited);
        assert_eq!(exit.bounces, 1);
        assert!(close(exit.dir, [0., 0., -1.], 1e-5));
        assert!((exit.distance - 1.).abs() < 1e-4);
    }

    #[test]
    fn scaled_stone_reports_world_distance() {
        let (mesh, bvh) = cube();
        let env = env::Environment::uniform([1.; 3]);

        let transform = params::Transform { scale: 3., ..params::Transform::new() };
        let tracer = Tracer::new(&mesh, &bvh, &env, params::GemParams::new(), &transform);

        let exit = tracer.trace_internal([0.3, -0.6, 1.5], [0., 0., -1.], [0., 0., 1.], 1.);

        assert!((exit.distance - 3.).abs() < 1e-3);
    }

    #[test]
    fn trapped_ray_keeps_its_last_reflection() {
        let (mesh, bvh) = cube();
        let env = env::Environment::uniform([1.; 3]);

        let params = params::GemParams { bounces: 1, ..params::GemParams::new() };
        let tracer = Tracer::new(&mesh, &bvh, &env, params, &params::Transform::new());

        // Entering near an edge, so the side face reflects totally
        let view = [0.8f32, -0.6, 0.].normalize();
        let exit = tracer.trace_internal([0.4, 0.5, -0.1], view, [0., 1., 0.], 2.4);

        assert!(!exit.exited);
        assert_eq!(exit.bounces, 1);

        // Mirrored off the +x face, whose normal faces back into the stone
        let entry = view.refract([0., 1., 0.], 1. / 2.4).normalize();

        assert!(close(exit.dir, entry.reflect([-1., 0., 0.]), 1e-5));
        assert!(exit.dir[0] < 0.);
    }

    #[test]
    fn zero_bounces_keep_the_entry_direction() {
        let (mesh, bvh) = cube();
        let env = env::Environment::uniform([1.; 3]);

        let params = params::GemParams { bounces: 0, ..params::GemParams::new() };
        let tracer = Tracer::new(&mesh, &bvh, &env, params, &params::Transform::new());

        let view = [0.6f32, -0.8, 0.].normalize();
        let exit = tracer.trace_internal([0.1, 0.5, 0.2], view, [0., 1., 0.], 2.);

        let entry = view.refract([0., 1., 0.], 0.5).normalize();

        assert!(close(exit.dir, entry, 1e-5));
        assert!(!exit.exited);
    }

    #[test]
    fn zero_aberration_is_achromatic() {
        let (mesh, bvh) = cube();
        let env = env::Environment::gradient(64, 32);

        let view = [0.3f32, -0.9, 0.2].normalize();

        for fast_chroma in [false, true] {
            let params = params::GemParams {
                aberration_strength: 0.,
                fast_chroma,
                ..params::GemParams::new()
            };

            let tracer = Tracer::new(&mesh, &bvh, &env, params, &params::Transform::new());

            let [r, g, b] = tracer.channel_exits([0.1, 0.5, -0.2], view, [0., 1., 0.]);

            assert_eq!(r.dir, g.dir);
            assert_eq!(b.dir, g.dir);
        }

        let params = params::GemParams {
            mode: params::ChromaMode::Dispersion,
            cauchy: [2.4, 0.],
            ..params::GemParams::new()
        };

        let tracer = Tracer::new(&mesh, &bvh, &env, params, &params::Transform::new());

        let [r, g, b] = tracer.channel_exits([0.1, 0.5, -0.2], view, [0., 1., 0.]);

        assert_eq!(r.dir, g.dir);
        assert_eq!(b.dir, g.dir);
    }

    #[test]
    fn aberration_splits_channels() {
        let mesh = mesh::Mesh::brilliant(mesh::BrilliantCut::new());
        let bvh = bvh::Bvh::build(&mesh, bvh::BvhConfig::new()).unwrap();
        let env = env::Environment::gradient(64, 32);

        let params = params::GemParams {
            aberration_strength: 0.05,
            ..params::GemParams::new()
        };

        let tracer = Tracer::new(&mesh, &bvh, &env, params, &params::Transform::new());

        // Oblique through the table
        let ray = geom::Ray::new([-1., 2.35, 0.1], [0.5f32, -1., 0.].normalize());
        let local = bvh.first_hit(&mesh, &ray).unwrap();

        let [r, g, b] = tracer.channel_exits(ray.at(local.t), ray.dir, local.face_normal);

        assert!(r.dir != g.dir || b.dir != g.dir);
    }

    #[test]
    fn absorption_darkens_only_in_dispersion_mode() {
        let (mesh, bvh) = cube();
        let env = env::Environment::uniform([1.; 3]);

        let params = params::GemParams {
            ior: 1.,
            cauchy: [1., 0.],
            absorption: [1., 0., 0.],
            fresnel_strength: 0.,
            mode: params::ChromaMode::Dispersion,
            ..params::GemParams::new()
        };

        let tracer = Tracer::new(&mesh, &bvh, &env, params, &params::Transform::new());
        let [r, g, b] = tracer.shade([0.1, 0.2, 0.5], [0., 0., -1.], [0., 0., 1.]);

        assert!((r - (-1f32).exp()).abs() < 1e-3);
        assert!((g - 1.).abs() < 1e-5);
        assert!((b - 1.).abs() < 1e-5);

        let tracer = Tracer::new(&mesh, &bvh, &env, params::GemParams {
            mode: params::ChromaMode::Aberration,
            ..params
        }, &params::Transform::new());

        let [r, ..] = tracer.shade([0.1, 0.2, 0.5], [0., 0., -1.], [0., 0., 1.]);

        assert!((r - 1.).abs() < 1e-5);
    }

    #[test]
    fn fresnel_blends_towards_the_reflection() {
        let (mesh, bvh) = cube();

        // Bright above the horizon, dark below
        let texels = (0..64).map(|row| if row < 32 { [1.; 3] } else { [0.; 3] }).collect();
        let env = env::Environment::new(1, 64, texels).unwrap();

        let params = params::GemParams {
            ior: 1.,
            mode: params::ChromaMode::Dispersion,
            ..params::GemParams::new()
        };
        let tracer = Tracer::new(&mesh, &bvh, &env, params, &params::Transform::new());

        // With no index contrast there is nothing to reflect
        let color = tracer.shade([0.1, 0.5, 0.2], [0., -1., 0.], [0., 1., 0.]);
        assert!(color[1] < 1e-3);

        let params = params::GemParams { ior: 2.4, ..params };
        let tracer = Tracer::new(&mesh, &bvh, &env, params, &params::Transform::new());

        let grazing = [1f32, -0.05, 0.].normalize();
        let color = tracer.shade([0., 0.5, 0.], grazing, [0., 1., 0.]);

        assert!(color[1] > 0.5);
    }

    #[test]
    fn aberration_selects_channels_without_reflection() {
        let (mesh, bvh) = cube();

        // Bright above the horizon, dark below
        let texels = (0..64).map(|row| if row < 32 { [1.; 3] } else { [0.; 3] }).collect();
        let env = env::Environment::new(1, 64, texels).unwrap();

        let tracer = Tracer::new(&mesh, &bvh, &env, params::GemParams::new(), &params::Transform::new());

        // Straight down and out through the bottom, into the dark half
        assert_eq!(tracer.shade([0.1, 0.5, 0.2], [0., -1., 0.], [0., 1., 0.]), [0.; 3]);

        let env = env::Environment::gradient(64, 32);

        let params = params::GemParams {
            aberration_strength: 0.05,
            color: [0.9, 0.8, 0.7],
            ..params::GemParams::new()
        };

        let tracer = Tracer::new(&mesh, &bvh, &env, params, &params::Transform::new());

        let point = [0.1, 0.5, -0.2];
        let view = [0.3f32, -0.9, 0.2].normalize();

        let [r, g, b] = tracer.channel_exits(point, view, [0., 1., 0.]);

        let selected = [
            env.sample(r.dir)[0],
            env.sample(g.dir)[1],
            env.sample(b.dir)[2],
        ].mul(params.color);

        assert!(close(tracer.shade(point, view, [0., 1., 0.]), selected, 1e-6));
    }

    #[test]
    fn eye_rays_miss_outside_the_stone() {
        let (mesh, bvh) = cube();
        let env = env::Environment::uniform([1.; 3]);

        let tracer = Tracer::new(&mesh, &bvh, &env, params::GemParams::new(), &params::Transform::new());

        let miss = geom::Ray::new([5., 5., 5.], [0., 1., 0.]);
        assert!(tracer.shade_ray(&miss).is_none());

        let hit = geom::Ray::new([0.1, 0.2, 5.], [0., 0., -1.]);
        assert!(tracer.shade_ray(&hit).is_some());
    }
}
