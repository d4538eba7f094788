// Copyright 2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the GPL version 3.

/*! A Gaussian shell in speed.

The distribution is `f(v) ∝ exp(-(v - v0)^2 / 2 sigma^2) + exp(-(v + v0)^2 / 2 sigma^2)`,
the even extension of a Gaussian ring of radius `v0` and width `sigma`. The
mirror term is negligible once `v0` is a few widths, and keeps both kernels
entire:

- `K_f = exp(-s sigma^2 / 2) [v0^2 sinc(p v0) + sigma^2 cos(p v0)] / (v0^2 + sigma^2)`
- `K_g = exp(-s sigma^2 / 2) cos(p v0)`

with `v_ref^2 = v0^2 + sigma^2`. At `v0 = 0` this is the Maxwellian.

*/

use num_complex::Complex64;

use crate::distribution::{KernelPair, VelocityKernel};
use crate::special::sinc;


/// A Gaussian shell distribution.
#[derive(Clone,Copy,Debug,PartialEq)]
pub struct ShellKernel {
    shell_speed: f64,
    spread: f64,
}

impl ShellKernel {
    /// A shell of radius `shell_speed` and width `spread`, both in m/s.
    pub fn new(shell_speed: f64, spread: f64) -> Self {
        ShellKernel { shell_speed, spread }
    }
}

impl VelocityKernel for ShellKernel {
    fn evaluate(&self, s: Complex64) -> KernelPair {
        let v0 = self.shell_speed;
        let sig2 = self.spread * self.spread;
        let gauss = (-0.5 * sig2 * s).exp();
        let phase = s.sqrt() * v0;
        let cos = phase.cos();

        KernelPair {
            fluctuation: gauss * (sinc(phase) * v0 * v0 + cos * sig2) / (v0 * v0 + sig2),
            response: gauss * cos,
        }
    }

    fn envelope(&self, s: f64) -> f64 {
        (-0.5 * self.spread * self.spread * s).exp()
    }

    fn characteristic_speed(&self) -> f64 {
        // sqrt(<v^2> / 3)
        let v02 = self.shell_speed * self.shell_speed;
        let sig2 = self.spread * self.spread;
        (sig2 + (v02 * v02 / 3. + sig2 * v02) / (v02 + sig2)).sqrt()
    }

    fn reference_speed(&self) -> f64 {
        self.shell_speed.hypot(self.spread)
    }
}
