// Copyright 2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the GPL version 3.

/*! Velocity distributions given by samples.

The distribution is the piecewise-linear interpolant of the samples and
vanishes outside of them. On each piece `f = alpha + beta v`, so the kernel
integrals have elementary antiderivatives and are computed exactly. For
small arguments those antiderivatives cancel badly, and a power series in
the moments of the distribution is used instead.

Sharp edges of the table give the kernels algebraic tails, so the integrand
envelope only falls off like `1/p`. Tables that end at a nonzero value may
therefore need long contours.

*/

use num_complex::Complex64;

use crate::distribution::{KernelPair, VelocityKernel};
use crate::errors::Result;
use crate::{ELECTRON_CHARGE, PI};

/// The kernels switch from the moment series to the exact antiderivatives
/// at `|p| v_max` of this size.
const SERIES_LIMIT: f64 = 2.;

/// Number of series terms; `2^(2n) / (2n)!` is far below roundoff by then.
const SERIES_TERMS: usize = 20;


/// Samples of an isotropic velocity distribution.
#[derive(Clone,Debug,PartialEq)]
pub struct TabulatedDistribution {
    speeds: Vec<f64>,
    values: Vec<f64>,
}

impl TabulatedDistribution {
    /// Samples `values` of the phase-space density at `speeds` (m/s), which
    /// must be nonnegative and strictly increasing. The overall scale of the
    /// values does not matter.
    pub fn new(speeds: Vec<f64>, values: Vec<f64>) -> Result<Self> {
        ensure_config!(speeds.len() == values.len(),
                       "got {} speeds but {} values", speeds.len(), values.len());
        ensure_config!(speeds.len() >= 2, "a tabulated distribution needs at least two samples");
        ensure_config!(speeds.iter().all(|v| v.is_finite()) && speeds[0] >= 0.,
                       "tabulated speeds must be finite and nonnegative");
        ensure_config!(speeds.windows(2).all(|w| w[1] > w[0]),
                       "tabulated speeds must be strictly increasing");
        ensure_config!(values.iter().all(|f| f.is_finite() && *f >= 0.),
                       "tabulated values must be finite and nonnegative");

        let table = TabulatedDistribution { speeds, values };
        ensure_config!(table.raw_moment(2) > 0., "tabulated distribution has no particles");
        Ok(table)
    }

    /// Samples given on an energy axis in eV for particles of mass `mass`
    /// (kg), as produced by photo-electron models. The values are
    /// phase-space densities at the corresponding speeds.
    pub fn from_energies(energies_ev: &[f64], values: Vec<f64>, mass: f64) -> Result<Self> {
        ensure_config!(mass.is_finite() && mass > 0., "particle mass must be positive, got {}", mass);
        ensure_config!(energies_ev.iter().all(|e| e.is_finite() && *e >= 0.),
                       "tabulated energies must be finite and nonnegative");

        let speeds = energies_ev.iter()
            .map(|e| (2. * e * ELECTRON_CHARGE / mass).sqrt())
            .collect();
        TabulatedDistribution::new(speeds, values)
    }

    /// The sample speeds.
    pub fn speeds(&self) -> &[f64] {
        &self.speeds
    }

    /// The sample values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// `\int v^n f dv` of the unnormalized interpolant.
    fn raw_moment(&self, n: i32) -> f64 {
        pieces(&self.speeds, &self.values)
            .map(|p| p.moment(n))
            .sum()
    }
}


/// One linear piece `f = alpha + beta v` on `[a, b]`.
#[derive(Clone,Copy,Debug)]
struct Piece {
    a: f64,
    b: f64,
    alpha: f64,
    beta: f64,
}

impl Piece {
    fn moment(&self, n: i32) -> f64 {
        let m = |k: i32| (self.b.powi(k) - self.a.powi(k)) / k as f64;
        self.alpha * m(n + 1) + self.beta * m(n + 2)
    }
}

fn pieces<'a>(speeds: &'a [f64], values: &'a [f64]) -> impl Iterator<Item = Piece> + 'a {
    speeds.windows(2).zip(values.windows(2)).map(|(v, f)| {
        let beta = (f[1] - f[0]) / (v[1] - v[0]);
        Piece { a: v[0], b: v[1], alpha: f[0] - beta * v[0], beta }
    })
}


/// A tabulated distribution, normalized and ready for evaluation.
#[derive(Clone,Debug,PartialEq)]
pub struct TabulatedKernel {
    speeds: Vec<f64>,
    /// Coefficients of the pieces, normalized so that `4 pi \int v^2 f = 1`.
    alphas: Vec<f64>,
    betas: Vec<f64>,
    v_max: f64,
    /// `\int f dv`
    m0: f64,
    /// `\int (v / v_max)^n f dv`
    scaled_moments: Vec<f64>,
    characteristic_speed: f64,
    /// Coefficients of the algebraic envelope bounds.
    g_bound: [f64; 2],
    f_bound: [f64; 2],
}

impl TabulatedKernel {
    /// Prepare a table for evaluation.
    pub fn new(table: &TabulatedDistribution) -> Self {
        let scale = 1. / (4. * PI * table.raw_moment(2));
        let speeds = table.speeds.clone();
        let values: Vec<f64> = table.values.iter().map(|f| f * scale).collect();
        let v_max = speeds[speeds.len() - 1];

        let (alphas, betas): (Vec<f64>, Vec<f64>) = pieces(&speeds, &values)
            .map(|p| (p.alpha, p.beta))
            .unzip();

        let m0: f64 = pieces(&speeds, &values).map(|p| p.moment(0)).sum();
        let m4: f64 = pieces(&speeds, &values).map(|p| p.moment(4)).sum();

        let scaled_speeds: Vec<f64> = speeds.iter().map(|v| v / v_max).collect();
        let scaled_moments = (0..2 * SERIES_TERMS + 2)
            .map(|n| pieces(&scaled_speeds, &values).map(|p| p.moment(n as i32)).sum::<f64>() * v_max)
            .collect();

        // Bounds from integrating by parts: the boundary values of f and
        // v f, and the total variation of their derivatives.
        let n = values.len();
        let h: Vec<f64> = speeds.windows(2).map(|w| w[1] - w[0]).collect();
        let kinks: Vec<(f64, f64)> = betas.windows(2)
            .zip(speeds[1..].iter())
            .map(|(b, v)| (*v, (b[1] - b[0]).abs()))
            .collect();
        let edge_lo = if speeds[0] > 0. { values[0].abs() } else { 0. };
        let beta_lo = betas[0];
        let beta_hi = betas[betas.len() - 1];

        let g_bound = [
            (edge_lo + values[n - 1].abs()) / m0,
            (beta_lo.abs() + beta_hi.abs() + kinks.iter().map(|k| k.1).sum::<f64>()) / m0,
        ];

        let dg_lo = values[0] + beta_lo * speeds[0];
        let dg_hi = values[n - 1] + beta_hi * v_max;
        let f_bound = [
            4. * PI * ((speeds[0] * values[0]).abs() + (v_max * values[n - 1]).abs()),
            4. * PI * (dg_lo.abs() + dg_hi.abs() +
                       betas.iter().zip(&h).map(|(b, h)| 2. * b.abs() * h).sum::<f64>() +
                       kinks.iter().map(|&(v, d)| v * d).sum::<f64>()),
        ];

        TabulatedKernel {
            speeds,
            alphas,
            betas,
            v_max,
            m0,
            scaled_moments,
            characteristic_speed: (4. * PI * m4 / 3.).sqrt(),
            g_bound,
            f_bound,
        }
    }

    fn series(&self, s: Complex64) -> KernelPair {
        // cos(pv) and sinc(pv) are power series in s v^2.
        let x = -s * self.v_max * self.v_max;
        let mut term = Complex64::new(1., 0.);
        let mut g = Complex64::new(0., 0.);
        let mut f = Complex64::new(0., 0.);

        for n in 0..SERIES_TERMS {
            let two_n = 2. * n as f64;
            // term = (-s v_max^2)^n / (2n)!
            g += term * self.scaled_moments[2 * n];
            f += term * self.scaled_moments[2 * n + 2] / (two_n + 1.);
            term *= x / ((two_n + 1.) * (two_n + 2.));
        }

        KernelPair {
            fluctuation: f * 4. * PI * self.v_max * self.v_max,
            response: g / self.m0,
        }
    }

    fn exact(&self, s: Complex64) -> KernelPair {
        let p = s.sqrt();
        let p2 = p * p;
        let mut g = Complex64::new(0., 0.);
        let mut f = Complex64::new(0., 0.);

        let trig: Vec<(Complex64, Complex64)> = self.speeds.iter()
            .map(|v| { let x = p * *v; (x.sin(), x.cos()) })
            .collect();

        for i in 0..self.alphas.len() {
            let (alpha, beta) = (self.alphas[i], self.betas[i]);
            let ends = [(self.speeds[i], trig[i]), (self.speeds[i + 1], trig[i + 1])];
            let mut prim = [KernelPair::both(Complex64::new(0., 0.)); 2];

            for (j, &(v, (sn, cs))) in ends.iter().enumerate() {
                // \int (alpha + beta v) cos(pv) dv
                let g_prim = sn * (alpha + beta * v) / p + cs * beta / p2;
                // \int v sin(pv) dv and \int v^2 sin(pv) dv
                let v1 = sn / p2 - cs * v / p;
                let v2 = sn * 2. * v / p2 + cs * (2. / (p2 * p) - v * v / p);
                prim[j] = KernelPair { fluctuation: v1 * alpha + v2 * beta, response: g_prim };
            }

            let d = prim[1] - prim[0];
            g += d.response;
            f += d.fluctuation;
        }

        KernelPair { fluctuation: f * 4. * PI / p, response: g / self.m0 }
    }
}

impl VelocityKernel for TabulatedKernel {
    fn evaluate(&self, s: Complex64) -> KernelPair {
        if s.norm() * self.v_max * self.v_max <= SERIES_LIMIT * SERIES_LIMIT {
            self.series(s)
        } else {
            self.exact(s)
        }
    }

    fn envelope(&self, s: f64) -> f64 {
        let p = s.max(0.).sqrt();

        if p * self.v_max <= SERIES_LIMIT {
            return 1.;
        }

        let g = self.g_bound[0] / p + self.g_bound[1] / (p * p);
        let f = self.f_bound[0] / (p * p) + self.f_bound[1] / (p * p * p);
        g.max(f).min(1.)
    }

    fn characteristic_speed(&self) -> f64 {
        self.characteristic_speed
    }

    fn reference_speed(&self) -> f64 {
        (1. / (4. * PI * self.m0)).sqrt()
    }
}


#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;
    use super::*;
    use crate::errors::Error;
    use crate::maxwellian::MaxwellianKernel;
    use crate::MASS_ELECTRON;

    fn sampled_maxwellian(v: f64, n: usize) -> TabulatedDistribution {
        let vmax = 9. * v;
        let speeds: Vec<f64> = (0..n).map(|i| vmax * i as f64 / (n - 1) as f64).collect();
        let values = speeds.iter().map(|u| (-0.5 * (u / v).powi(2)).exp()).collect();
        TabulatedDistribution::new(speeds, values).unwrap()
    }

    #[test]
    fn rejects_bad_tables() {
        let bad = [
            TabulatedDistribution::new(vec![0., 1.], vec![1.]),
            TabulatedDistribution::new(vec![1.], vec![1.]),
            TabulatedDistribution::new(vec![0., 2., 1.], vec![1., 1., 1.]),
            TabulatedDistribution::new(vec![-1., 1.], vec![1., 1.]),
            TabulatedDistribution::new(vec![0., 1.], vec![1., -1.]),
            TabulatedDistribution::new(vec![0., 1.], vec![0., 0.]),
        ];

        for r in bad.iter() {
            assert!(match r { Err(Error::Configuration(_)) => true, _ => false });
        }
    }

    #[test]
    fn sampled_maxwellian_matches_analytic() {
        let v = 2.;
        let table = TabulatedKernel::new(&sampled_maxwellian(v, 600));
        let exact = MaxwellianKernel::new(v);

        assert_approx_eq!(table.reference_speed(), v, 1e-3);
        assert_approx_eq!(table.characteristic_speed(), v, 1e-3);

        // These straddle the switch between series and antiderivatives.
        for &p in &[0.01, 0.05, 0.1, 0.2, 0.5, 1.] {
            let s = Complex64::new(p * p, 0.);
            let a = table.evaluate(s);
            let b = exact.evaluate(s);
            assert_approx_eq!(a.fluctuation.re, b.fluctuation.re, 1e-4);
            assert_approx_eq!(a.response.re, b.response.re, 1e-4);
        }
    }

    #[test]
    fn series_and_exact_agree_at_switch() {
        let table = TabulatedKernel::new(&sampled_maxwellian(1., 50));
        let s = Complex64::new((SERIES_LIMIT / table.v_max).powi(2), 0.);
        let a = table.series(s);
        let b = table.exact(s);
        assert_approx_eq!(a.fluctuation.re, b.fluctuation.re, 1e-10);
        assert_approx_eq!(a.response.re, b.response.re, 1e-10);
    }

    #[test]
    fn envelope_bounds_box_distribution() {
        // A uniformly filled sphere of radius 1 has K_g = sinc(p), with
        // a 1/p envelope.
        let d = TabulatedDistribution::new(vec![0., 1.], vec![1., 1.]).unwrap();
        let k = TabulatedKernel::new(&d);

        for &p in &[0.5, 3., 10., 40., 200.] {
            let s = p * p;
            let v = k.evaluate(Complex64::new(s, 0.));
            assert_approx_eq!(v.response.re, p.sin() / p, 1e-9);
            let env = k.envelope(s);
            assert!(env >= v.response.norm());
            assert!(env >= v.fluctuation.norm());
        }
    }

    #[test]
    fn energies_become_speeds() {
        let d = TabulatedDistribution::from_energies(&[0., 1., 4.], vec![3., 2., 1.],
                                                     MASS_ELECTRON).unwrap();
        let v1 = (2. * ELECTRON_CHARGE / MASS_ELECTRON).sqrt();
        assert_approx_eq!(d.speeds()[1], v1, 1e-6 * v1);
        assert_approx_eq!(d.speeds()[2], 2. * v1, 1e-6 * v1);
    }
}
