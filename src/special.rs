// Copyright 2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the GPL version 3.

//! Special functions needed by the velocity kernels.

use num_complex::Complex64;
use statrs::function::gamma::ln_gamma;

use crate::quadrature::{IntegrationWorkspace, Rule};
use crate::PI;


/// `sin(z) / z`, with the removable singularity at zero filled in.
pub fn sinc(z: Complex64) -> Complex64 {
    if z.norm_sqr() < 1e-6 {
        let z2 = z * z;
        Complex64::new(1., 0.) - z2 / 6. + z2 * z2 / 120.
    } else {
        z.sin() / z
    }
}


/// Dawson's integral `D(x) = exp(-x^2) \int_0^x exp(t^2) dt`.
///
/// Uses Rybicki's method, accurate to about 2e-7.
pub fn dawson(x: f64) -> f64 {
    const H: f64 = 0.4;
    const A1: f64 = 2. / 3.;
    const A2: f64 = 0.4;
    const A3: f64 = 2. / 7.;
    const NMAX: usize = 6;

    if x.abs() < 0.2 {
        let x2 = x * x;
        return x * (1. - A1 * x2 * (1. - A2 * x2 * (1. - A3 * x2)));
    }

    let xx = x.abs();
    let n0 = 2. * (0.5 * xx / H).round();
    let xp = xx - n0 * H;
    let mut e1 = (2. * xp * H).exp();
    let e2 = e1 * e1;
    let mut d1 = n0 + 1.;
    let mut d2 = d1 - 2.;
    let mut sum = 0.;

    for i in 0..NMAX {
        let c = (-((2 * i + 1) as f64 * H).powi(2)).exp();
        sum += c * (e1 / d1 + 1. / (d2 * e1));
        d1 += 2.;
        d2 -= 2.;
        e1 *= e2;
    }

    x.signum() * (-xp * xp).exp() * sum / PI.sqrt()
}


const BESSEL_SERIES_LIMIT: f64 = 1e-8;

/// Where the integrand of the Bessel representation is dropped, in e-folds
/// below its peak.
const BESSEL_TAIL_EFOLDS: f64 = 46.;


/// `ln cosh(x)` without overflow.
fn ln_cosh(x: f64) -> f64 {
    let a = x.abs();
    a + (-2. * a).exp().ln_1p() - std::f64::consts::LN_2
}


/// The normalized modified Bessel function
/// `z^nu K_nu(z) / (2^(nu - 1) Gamma(nu))` for `nu > 1`.
///
/// This equals one at `z = 0` and is the characteristic function of kappa
/// velocity distributions. It is computed from
/// `exp(z) K_nu(z) = \int_0^\infty exp(-z (cosh t - 1)) cosh(nu t) dt`,
/// scaled by the peak of the integrand so that large orders and small
/// arguments don't overflow. The representation needs `Re z > 0`; elsewhere
/// the result is NaN.
pub fn normalized_bessel_k(nu: f64, z: Complex64) -> Complex64 {
    if z.norm() < BESSEL_SERIES_LIMIT {
        return Complex64::new(1., 0.) + z * z / (4. * (1. - nu));
    }

    if !(z.re > 0.) || !z.im.is_finite() {
        return Complex64::new(std::f64::NAN, std::f64::NAN);
    }

    let a = z.re;
    let log_magnitude = |t: f64| -2. * a * (0.5 * t).sinh().powi(2) + ln_cosh(nu * t);
    let t_peak = (nu / a).asinh();
    let peak = log_magnitude(t_peak);

    let mut reach = 1.;

    while log_magnitude(t_peak + reach) - peak > -BESSEL_TAIL_EFOLDS {
        reach *= 2.;
    }

    let integrand = |t: f64| {
        let s = (0.5 * t).sinh();
        (-2. * z * s * s + ln_cosh(nu * t) - peak).exp()
    };

    let mut ws = IntegrationWorkspace::new(256);
    let integral = match ws.qag(integrand, 0., t_peak + reach)
        .tolerance(0., 1e-11)
        .rule(Rule::GaussKronrod21)
        .compute()
    {
        Ok(r) => r.value,
        Err(_) => return Complex64::new(std::f64::NAN, std::f64::NAN),
    };

    let ln_norm = (nu - 1.) * std::f64::consts::LN_2 + ln_gamma(nu);
    (nu * z.ln() - z + peak + integral.ln() - ln_norm).exp()
}
