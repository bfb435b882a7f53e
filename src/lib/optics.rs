// Fraunhofer C, d and F lines in nanometres
pub const LAMBDA_RED: f32 = 656.3;
pub const LAMBDA_GREEN: f32 = 587.6;
pub const LAMBDA_BLUE: f32 = 486.1;

pub const WAVELENGTHS: [f32; 3] = [LAMBDA_RED, LAMBDA_GREEN, LAMBDA_BLUE];

// Rec. 709 luma weights
const LUMA: [f32; 3] = [0.2126, 0.7152, 0.0722];

// Every index of refraction passes through here before it bends a ray
pub fn clamp_ior(ior: f32) -> f32 {
    if ior.is_nan() { 1. } else { ior.max(1.) }
}

// Cauchy's equation, `lambda` in nanometres and `b` in nm^2
pub fn cauchy_ior(a: f32, b: f32, lambda: f32) -> f32 {
    a + b / (lambda * lambda)
}

// Per-channel indices for the red, green and blue reference lines
pub fn cauchy_rgb(a: f32, b: f32) -> [f32; 3] {
    WAVELENGTHS.map(|lambda| clamp_ior(cauchy_ior(a, b, lambda)))
}

// Reflectance at normal incidence between air and a medium of `ior`
pub fn r0_from_ior(ior: f32) -> f32 {
    let r = (ior - 1.) / (ior + 1.);

    r * r
}

// Schlick's approximation. `cos_theta` is the cosine between the
// view direction and the surface normal
pub fn schlick(r0: f32, cos_theta: f32) -> f32 {
    let m = (1. - cos_theta.clamp(0., 1.)).powi(5);

    r0 + (1. - r0) * m
}

// Beer-Lambert transmittance through `distance` units of medium
pub fn transmittance(absorption: [f32; 3], distance: f32) -> [f32; 3] {
    absorption.map(|a| (-a.max(0.) * distance.max(0.)).exp())
}

pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    if edge1 <= edge0 {
        return if x < edge0 { 0. } else { 1. };
    }

    let t = ((x - edge0) / (edge1 - edge0)).clamp(0., 1.);

    t * t * (3. - 2. * t)
}

pub fn luminance(color: [f32; 3]) -> f32 {
    color[0] * LUMA[0] + color[1] * LUMA[1] + color[2] * LUMA[2]
}

pub fn mix(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
    ]
}
