#[derive(Clone, Copy, Default)]
#[derive(serde::Deserialize, serde::Serialize)]
#[derive(Debug, PartialEq, Eq)]
pub enum ToneMapping {
    None,
    #[default]
    AcesFilmic,
}

impl ToneMapping {
    // Matches the `tone_mapping` switch in the compute shader
    pub fn as_u32(self) -> u32 {
        match self {
            Self::None => 0,
            Self::AcesFilmic => 1,
        }
    }
}

// How linear radiance becomes a displayable pixel
#[derive(Clone, Copy)]
#[derive(serde::Deserialize, serde::Serialize)]
#[derive(Debug)]
#[serde(default)]
pub struct Output {
    pub tone_mapping: ToneMapping,
    pub exposure: f32,
    // Display-referred, written as-is wherever the gem isn't
    pub background: [f32; 3],
}

impl Output {
    pub const fn new() -> Self {
        Self {
            tone_mapping: ToneMapping::AcesFilmic,
            exposure: 1.,
            // #efefef
            background: [0.9372549; 3],
        }
    }

    pub fn display(&self, linear: [f32; 3]) -> [f32; 4] {
        let mapped = match self.tone_mapping {
            ToneMapping::None => linear.map(|c| c.clamp(0., 1.)),
            ToneMapping::AcesFilmic => aces_filmic(linear, self.exposure),
        };

        let [r, g, b] = mapped.map(linear_to_srgb);

        [r, g, b, 1.]
    }

    pub fn background(&self) -> [f32; 4] {
        let [r, g, b] = self.background;

        [r, g, b, 1.]
    }
}

impl Default for Output {
    fn default() -> Self { Self::new() }
}

// Column-major, so each inner array is a column
const ACES_INPUT: glam::Mat3 = glam::Mat3::from_cols_array_2d(&[
    [0.59719, 0.07600, 0.02840],
    [0.35458, 0.90834, 0.13383],
    [0.04823, 0.01566, 0.83777],
]);

const ACES_OUTPUT: glam::Mat3 = glam::Mat3::from_cols_array_2d(&[
    [1.60475, -0.10208, -0.00327],
    [-0.53108, 1.10813, -0.07276],
    [-0.07367, -0.00605, 1.07602],
]);

fn rrt_and_odt_fit(v: f32) -> f32 {
    let a = v * (v + 0.0245786) - 0.000090537;
    let b = v * (0.983729 * v + 0.432951) + 0.238081;

    a / b
}

// Stephen Hill's fit of the ACES reference rendering transform
pub fn aces_filmic(color: [f32; 3], exposure: f32) -> [f32; 3] {
    let color = color.map(|c| c.max(0.) * exposure / 0.6);

    let color = (ACES_INPUT * glam::Vec3::from(color))
        .to_array()
        .map(rrt_and_odt_fit);

    (ACES_OUTPUT * glam::Vec3::from(color))
        .to_array()
        .map(|c| c.clamp(0., 1.))
}

pub fn linear_to_srgb(c: f32) -> f32 {
    if c <= 0.0031308 {
        c * 12.92
    } else {
        1.055 * c.powf(1. / 2.4) - 0.055
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aces_maps_black_to_black() {
        let [r, g, b] = aces_filmic([0.; 3], 1.);

        assert!(r.abs() < 1e-3 && g.abs() < 1e-3 && b.abs() < 1e-3);
    }

    #[test]
    fn aces_compresses_highlights() {
        let bright = aces_filmic([100.; 3], 1.);

        for c in bright {
            assert!(c > 0.95 && c <= 1.);
        }

        let mid = aces_filmic([0.18; 3], 1.);
        let brighter = aces_filmic([0.18; 3], 2.);

        assert!(brighter[1] > mid[1]);
    }

    #[test]
    fn aces_keeps_grays_neutral() {
        // Rows of both matrices sum to one, columns don't
        for gray in [0.05, 0.18, 0.7, 3.] {
            let [r, g, b] = aces_filmic([gray; 3], 1.);

            assert!((r - g).abs() < 1e-4 && (b - g).abs() < 1e-4);
        }

        let [r, g, b] = aces_filmic([1., 0., 0.], 1.);
        assert!(r > g && r > b);
    }

    #[test]
    fn srgb_encoding() {
        assert_eq!(linear_to_srgb(0.), 0.);
        assert!((linear_to_srgb(1.) - 1.).abs() < 1e-6);
        assert!((linear_to_srgb(0.214) - 0.5).abs() < 0.01);
    }

    #[test]
    fn output_is_opaque() {
        let output = Output::new();

        assert_eq!(output.display([0.5; 3])[3], 1.);
        assert_eq!(output.background(), [0.9372549, 0.9372549, 0.9372549, 1.]);

        let plain = Output { tone_mapping: ToneMapping::None, ..Output::new() };
        assert!((plain.display([1.; 3])[0] - 1.).abs() < 1e-6);
    }
}
