// Copyright 2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the GPL version 3.

/*! The kappa velocity distribution.

We use the form `f(v) ∝ (1 + v^2 / (kappa theta^2))^-(kappa + 1)` with
`theta^2 = (2 kappa - 3) v_th^2 / kappa`, which has the same mean energy as
a Maxwellian with thermal speed `v_th`. Its characteristic functions are
normalized modified Bessel functions of `z = sqrt(kappa) theta p`:

- fluctuation: order `kappa - 1/2`;
- response: order `kappa + 1/2`;

and the reference speed obeys `v_ref^2 = v_th^2 (2 kappa - 3) / (2 kappa - 1)`,
the square of the usual kappa Debye-length correction. As `kappa` grows
everything tends to the Maxwellian.

The factor `(z^2)^nu` hidden in `z^nu K_nu(z)` makes the kernels branch at
`s = 0`, so wherever the orbit has `p^2(y) = 0` away from the origin the
integrand is singular.

*/

use num_complex::Complex64;

use crate::distribution::{KernelPair, Singularity, VelocityKernel};
use crate::errors::Result;
use crate::plasma::OrbitGeometry;
use crate::special::normalized_bessel_k;


/// A kappa distribution.
#[derive(Clone,Copy,Debug,PartialEq)]
pub struct KappaKernel {
    kappa: f64,
    thermal_speed: f64,
    /// `z / p`
    scale: f64,
}

impl KappaKernel {
    /// A kappa distribution with index `kappa > 3/2` and the mean energy of a
    /// Maxwellian with thermal speed `thermal_speed`.
    pub fn new(kappa: f64, thermal_speed: f64) -> Self {
        KappaKernel {
            kappa,
            thermal_speed,
            scale: (2. * kappa - 3.).sqrt() * thermal_speed,
        }
    }

    /// The kappa index.
    pub fn kappa(&self) -> f64 {
        self.kappa
    }

    #[inline]
    fn argument(&self, s: Complex64) -> Complex64 {
        s.sqrt() * self.scale
    }
}

impl VelocityKernel for KappaKernel {
    fn evaluate(&self, s: Complex64) -> KernelPair {
        let z = self.argument(s);
        KernelPair {
            fluctuation: normalized_bessel_k(self.kappa - 0.5, z),
            response: normalized_bessel_k(self.kappa + 0.5, z),
        }
    }

    fn envelope(&self, s: f64) -> f64 {
        // Both kernels are positive and decreasing on the real axis.
        let v = self.evaluate(Complex64::new(s.max(0.), 0.));
        v.fluctuation.re.max(v.response.re).min(1.)
    }

    fn characteristic_speed(&self) -> f64 {
        self.thermal_speed
    }

    fn reference_speed(&self) -> f64 {
        self.thermal_speed * ((2. * self.kappa - 3.) / (2. * self.kappa - 1.)).sqrt()
    }

    fn singularities(&self, geometry: &OrbitGeometry, horizon: f64,
                     limit: usize) -> Result<Vec<Singularity>> {
        Ok(geometry.displacement_zeros(horizon, limit)?
            .into_iter()
            .map(|location| Singularity { location, owner: 0 })
            .collect())
    }
}


#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;
    use super::*;
    use crate::maxwellian::MaxwellianKernel;
    use crate::PI;

    #[test]
    fn kappa_two_closed_form() {
        let v = 1.3;
        let k = KappaKernel::new(2., v);

        for &p in &[0.05, 0.4, 1., 3., 10.] {
            let z: f64 = p * v; // sqrt(2 kappa - 3) = 1
            let got = k.evaluate(Complex64::new(p * p, 0.));
            let fluct = (1. + z) * (-z).exp();
            let resp = (z * z + 3. * z + 3.) * (-z).exp() / 3.;
            assert_approx_eq!(got.fluctuation.re, fluct, 1e-9);
            assert_approx_eq!(got.response.re, resp, 1e-9);
        }
    }

    #[test]
    fn reference_speed() {
        let k = KappaKernel::new(2., 1.);
        assert_approx_eq!(k.reference_speed(), (1f64 / 3.).sqrt(), 1e-15);
    }

    #[test]
    fn second_moment_matches_maxwellian() {
        // K_f = 1 - s v^2 / 2 + O(s^2) for any kappa.
        let k = KappaKernel::new(3.5, 2.);
        let s = 1e-4;
        let got = k.evaluate(Complex64::new(s, 0.)).fluctuation.re;
        assert_approx_eq!((1. - got) / s, 2., 1e-3);
    }

    #[test]
    fn large_kappa_approaches_maxwellian() {
        let k = KappaKernel::new(200., 1.);
        let m = MaxwellianKernel::new(1.);

        for &s in &[0.1, 1., 4.] {
            let a = k.evaluate(Complex64::new(s, 0.));
            let b = m.evaluate(Complex64::new(s, 0.));
            assert_approx_eq!(a.fluctuation.re, b.fluctuation.re, 2e-2);
            assert_approx_eq!(a.response.re, b.response.re, 2e-2);
        }
    }

    #[test]
    fn envelope_bounds_kernels() {
        let k = KappaKernel::new(2.5, 1.);
        let mut last = 1.;

        for i in 0..20 {
            let s = 0.5 * i as f64;
            let env = k.envelope(s);
            let v = k.evaluate(Complex64::new(s, 0.));
            assert!(env >= v.fluctuation.norm() && env >= v.response.norm());
            assert!(env <= last);
            last = env;
        }
    }

    #[test]
    fn singularities_come_in_pairs() {
        let g = OrbitGeometry::new(1., 0.45 * PI, 1.);
        let s = KappaKernel::new(3., 1.).singularities(&g, 30., 100).unwrap();
        assert_eq!(s.len(), 8);
        assert!(s.iter().all(|x| x.owner == 0));
        assert_approx_eq!(s[0].location.im, -s[1].location.im, 1e-15);
    }
}
