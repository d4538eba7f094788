// Copyright 2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the GPL version 3.

//! The Maxwellian velocity distribution.

use num_complex::Complex64;

use crate::distribution::{KernelPair, VelocityKernel};
use crate::special::dawson;
use crate::PI;


/// A Maxwellian with one-dimensional thermal speed `v`.
///
/// Both kernels are `exp(-s v^2 / 2)`, an entire function, so the natural
/// contour needs no detours.
#[derive(Clone,Copy,Debug,PartialEq)]
pub struct MaxwellianKernel {
    thermal_speed: f64,
}

impl MaxwellianKernel {
    /// A kernel with the given thermal speed, in m/s.
    pub fn new(thermal_speed: f64) -> Self {
        MaxwellianKernel { thermal_speed }
    }
}

impl VelocityKernel for MaxwellianKernel {
    #[inline]
    fn evaluate(&self, s: Complex64) -> KernelPair {
        KernelPair::both((-0.5 * self.thermal_speed * self.thermal_speed * s).exp())
    }

    fn envelope(&self, s: f64) -> f64 {
        (-0.5 * self.thermal_speed * self.thermal_speed * s).exp()
    }

    fn characteristic_speed(&self) -> f64 {
        self.thermal_speed
    }

    fn reference_speed(&self) -> f64 {
        self.thermal_speed
    }
}


/// The Gordeyev integral of a Maxwellian without magnetic field or
/// collisions, in closed form:
///
/// `G(omega) = sqrt(pi/2) exp(-x^2) / (k v) - i sqrt(2) D(x) / (k v)`
///
/// where `x = omega / (sqrt(2) k v)` and `D` is Dawson's integral.
pub fn unmagnetized_gordeyev(wavenumber: f64, thermal_speed: f64, omega: f64) -> Complex64 {
    let kv = wavenumber * thermal_speed;
    let x = omega / (2f64.sqrt() * kv);
    Complex64::new((0.5 * PI).sqrt() * (-x * x).exp(), -(2f64.sqrt()) * dawson(x)) / kv
}


#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;
    use super::*;
    use crate::quadrature::IntegrationWorkspace;

    #[test]
    fn kernel_is_gaussian() {
        let k = MaxwellianKernel::new(2.);
        let v = k.evaluate(Complex64::new(0.5, 0.));
        assert_approx_eq!(v.fluctuation.re, (-1f64).exp(), 1e-15);
        assert_eq!(v.fluctuation, v.response);
        assert_approx_eq!(k.envelope(0.5), (-1f64).exp(), 1e-15);
    }

    #[test]
    fn closed_form_matches_direct_integration() {
        let (k, v) = (3., 2.);
        let mut ws = IntegrationWorkspace::new(500);

        for &omega in &[0., 2., 7.5, -11., 30.] {
            let integrand = |t: f64| {
                Complex64::new(0., -omega * t).exp() * (-0.5 * (k * v * t).powi(2)).exp()
            };
            let direct = ws.qag(integrand, 0., 10. / (k * v))
                .tolerance(0., 1e-12)
                .compute()
                .unwrap()
                .value;
            let closed = unmagnetized_gordeyev(k, v, omega);
            assert_approx_eq!(direct.re, closed.re, 1e-6 / (k * v));
            assert_approx_eq!(direct.im, closed.im, 1e-6 / (k * v));
        }
    }
}
