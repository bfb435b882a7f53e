// Opting to use a type alias instead of a new-type.
// This means that we don't need to include V3Ops unless
// its methods are absolutely necessary.
// Plus, no need to worry about deref or accessors.
pub type V3<T> = [T; 3];

pub trait V3Ops {
    type Ty: Default + num_traits::real::Real;

    fn add(self, b: Self) -> Self;
    fn sub(self, b: Self) -> Self;
    fn mul(self, b: Self) -> Self;
    fn neg(self) -> Self;
    fn cross(self, b: Self) -> Self;
    fn dot(self, b: Self) -> Self::Ty;
    fn scale(self, s: Self::Ty) -> Self;
    fn mag(self) -> Self::Ty;
    fn normalize(self) -> Self;
    fn lerp(self, b: Self, t: Self::Ty) -> Self;
    fn least(self, b: Self) -> Self;
    fn greatest(self, b: Self) -> Self;
    fn reflect(self, n: Self) -> Self;
    fn refract(self, n: Self, eta: Self::Ty) -> Self;
}

impl<T: Default + num_traits::real::Real> V3Ops for V3<T> {
    type Ty = T;

    fn add(mut self, b: Self) -> Self {
        self[0] = self[0] + b[0];
        self[1] = self[1] + b[1];
        self[2] = self[2] + b[2];
        self
    }

    fn sub(mut self, b: Self) -> Self {
        self[0] = self[0] - b[0];
        self[1] = self[1] - b[1];
        self[2] = self[2] - b[2];
        self
    }

    // Component-wise product, used for colors
    fn mul(mut self, b: Self) -> Self {
        self[0] = self[0] * b[0];
        self[1] = self[1] * b[1];
        self[2] = self[2] * b[2];
        self
    }

    fn neg(self) -> Self {
        [-self[0], -self[1], -self[2]]
    }

    fn cross(self, b: Self) -> Self {
        [
            self[1] * b[2] - self[2] * b[1],
            self[2] * b[0] - self[0] * b[2],
            self[0] * b[1] - self[1] * b[0],
        ]
    }

    fn dot(self, b: Self) -> Self::Ty {
        self.into_iter()
            .zip(b)
            .fold(Self::Ty::default(), |dot, (a, b)| dot + a * b)

    }

    fn scale(mut self, s: Self::Ty) -> Self {
        self[0] = self[0] * s;
        self[1] = self[1] * s;
        self[2] = self[2] * s;
        self
    }

    fn mag(self) -> Self::Ty {
        self.iter()
            .fold(Self::Ty::default(), |mag, elem| mag + *elem * *elem).sqrt()
    }

    // A zero vector stays zero, refract() relies on this to signal
    // total internal reflection
    fn normalize(mut self) -> Self {
        let mag = self.mag();

        if mag == Self::Ty::default() {
            return self;
        }

        self[0] = self[0] / mag;
        self[1] = self[1] / mag;
        self[2] = self[2] / mag;
        self
    }

    fn lerp(self, b: Self, t: Self::Ty) -> Self {
        self.add(b.sub(self).scale(t))
    }

    fn least(self, b: Self) -> Self {
        [self[0].min(b[0]), self[1].min(b[1]), self[2].min(b[2])]
    }

    fn greatest(self, b: Self) -> Self {
        [self[0].max(b[0]), self[1].max(b[1]), self[2].max(b[2])]
    }

    // Incident direction `self` about normal `n`
    fn reflect(self, n: Self) -> Self {
        let d = self.dot(n);

        self.sub(n.scale(d + d))
    }

    // Matches the shading-language builtin: `n` faces against `self`,
    // `eta` is the ratio of indices (incident over transmitted),
    // and the zero vector is returned on total internal reflection
    fn refract(self, n: Self, eta: Self::Ty) -> Self {
        let one = Self::Ty::one();
        let zero = Self::Ty::default();

        let d = n.dot(self);
        let k = one - eta * eta * (one - d * d);

        if k < zero {
            return [zero; 3];
        }

        self.scale(eta).sub(n.scale(eta * d + k.sqrt()))
    }
}

#[cfg(test)]
mod tests {
    use super::V3Ops as _;

    fn close(a: [f32; 3], b: [f32; 3]) -> bool {
        a.sub(b).mag() < 1e-5
    }

    #[test]
    fn refract_with_unit_eta_is_identity() {
        let dir = [0.3f32, -0.8, 0.2].normalize();
        let n = [0., 1., 0.];

        assert!(close(dir.refract(n, 1.), dir));
    }

    #[test]
    fn refract_signals_total_internal_reflection() {
        // 60 degrees from the normal, leaving a medium of index 2.4
        let dir = [60f32.to_radians().sin(), 60f32.to_radians().cos(), 0.];
        let n = [0., -1., 0.];

        assert_eq!(dir.refract(n, 2.4), [0.; 3]);
        assert_eq!(dir.refract(n, 2.4).mag(), 0.);
    }

    #[test]
    fn refract_obeys_snell() {
        let theta_i = 40f32.to_radians();
        let dir = [theta_i.sin(), -theta_i.cos(), 0.];
        let n = [0., 1., 0.];

        let eta = 1. / 1.5;
        let out = dir.refract(n, eta);

        let sin_t = out[0] / out.mag();
        assert!((sin_t - eta * theta_i.sin()).abs() < 1e-5);
        assert!(out[1] < 0.);
    }

    #[test]
    fn reflect_mirrors_about_normal() {
        let dir = [1f32, -1., 0.].normalize();
        let out = dir.reflect([0., 1., 0.]);

        assert!(close(out, [1f32, 1., 0.].normalize()));
    }

    #[test]
    fn normalize_keeps_zero() {
        assert_eq!([0f32; 3].normalize(), [0.; 3]);
    }
}
