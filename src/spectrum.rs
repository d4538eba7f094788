// Copyright 2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the GPL version 3.

/*! Assembly of the incoherent scatter spectrum.

Given the Gordeyev integrals of both species at one frequency, the
susceptibility of species `s` is

```text
chi_s = omega_ps^2 / (k^2 v_ref,s^2) [1 - (i omega + nu_s) G_g,s]
```

and the power spectral density of the electron density fluctuations is

```text
S(omega) = (n_e / pi) [ |1 + chi_i|^2 Re G_f,e + |chi_e|^2 Re G_f,i ] / |1 + chi_e + chi_i|^2
```

normalized so that its integral over angular frequency is `n_e S(k)`, the
static structure factor.

*/

use num_complex::Complex64;

use crate::gordeyev::GordeyevResult;
use crate::plasma::{PlasmaParameters, SpeciesKind};
use crate::{PI, TWO_PI};


/// What one species contributes to the spectrum at one frequency.
#[derive(Clone,Copy,Debug,PartialEq)]
pub struct SpeciesResponse {
    /// The electric susceptibility.
    pub susceptibility: Complex64,

    /// `Re G_f`, the thermal fluctuation level, in s.
    pub fluctuation: f64,
}

impl SpeciesResponse {
    /// Combine a Gordeyev result for one species with the plasma
    /// parameters. `reference_speed` is that of the species' distribution.
    pub fn new(params: &PlasmaParameters, kind: SpeciesKind, reference_speed: f64,
               gordeyev: &GordeyevResult) -> Self {
        let species = params.species(kind);
        let omega = TWO_PI * gordeyev.frequency;
        let chi = susceptibility(species.plasma_frequency(params.electron_density),
                                 params.radar_wavenumber, reference_speed, omega,
                                 species.collision_frequency, gordeyev.value);

        SpeciesResponse { susceptibility: chi, fluctuation: gordeyev.fluctuation.re }
    }
}


/// The susceptibility of a species with plasma frequency `omega_p` and
/// reference speed `v_ref`, given its response Gordeyev integral `g` at
/// angular frequency `omega`.
pub fn susceptibility(omega_p: f64, wavenumber: f64, v_ref: f64, omega: f64,
                      collision_frequency: f64, g: Complex64) -> Complex64 {
    let debye = omega_p * omega_p / (wavenumber * wavenumber * v_ref * v_ref);
    (Complex64::new(1., 0.) - Complex64::new(collision_frequency, omega) * g) * debye
}


/// `num / den`, scaled so that neither factor overflows when `den` is huge.
fn ratio(num: Complex64, den: Complex64) -> Complex64 {
    let scale = den.re.abs().max(den.im.abs());

    if scale > 0. && scale.is_finite() {
        (num / scale) / (den / scale)
    } else {
        num / den
    }
}


/// The spectral density at one frequency, in s/m^3 per unit angular
/// frequency.
pub fn spectral_density(electron_density: f64, electron: &SpeciesResponse,
                        ion: &SpeciesResponse) -> f64 {
    let one = Complex64::new(1., 0.);
    let epsilon = one + electron.susceptibility + ion.susceptibility;
    let screen_e = ratio(one + ion.susceptibility, epsilon).norm_sqr();
    let screen_i = ratio(electron.susceptibility, epsilon).norm_sqr();
    electron_density / PI * (screen_e * electron.fluctuation + screen_i * ion.fluctuation)
}


/// The integral of the spectrum over angular frequency divided by the
/// electron density, for Maxwellian species (Salpeter 1960). `alpha` is
/// `1 / (k lambda_D)`.
pub fn salpeter_total_power(alpha: f64, te_over_ti: f64) -> f64 {
    let a2 = alpha * alpha;
    1. / (1. + a2) + a2 * a2 / ((1. + a2) * (1. + a2 * (1. + te_over_ti)))
}


/// An estimate of the frequency of the plasma line, in Hz, from the
/// Bohm-Gross dispersion relation with the upper hybrid correction.
pub fn plasma_line_frequency(params: &PlasmaParameters) -> f64 {
    let e = &params.electron;
    let fp = e.plasma_frequency(params.electron_density) / TWO_PI;
    let fc = e.gyrofrequency(params.magnetic_field) / TWO_PI;
    let kl = params.radar_wavenumber * params.debye_length();
    let sin = params.aspect_angle.sin();
    (fp * fp * (1. + 3. * kl * kl) + fc * fc * sin * sin).sqrt()
}


#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;
    use super::*;
    use crate::plasma::Species;

    fn params() -> PlasmaParameters {
        PlasmaParameters::from_radar_frequency(
            933e6, 5e-5, 0.3, 2e10, Species::electron(1500.), Species::ion(1500., 16.))
    }

    #[test]
    fn static_susceptibility_is_debye_screening() {
        // At zero frequency without collisions, chi = 1 / (k lambda)^2.
        let p = params();
        let e = &p.electron;
        let chi = susceptibility(e.plasma_frequency(p.electron_density), p.radar_wavenumber,
                                 e.thermal_speed(), 0., 0., Complex64::new(1e-9, 0.));
        assert_approx_eq!(chi.re, p.alpha().powi(2), 1e-9 * p.alpha().powi(2));
        assert_eq!(chi.im, 0.);
    }

    #[test]
    fn salpeter_limits() {
        assert_approx_eq!(salpeter_total_power(1., 1.), 2. / 3., 1e-15);
        assert_approx_eq!(salpeter_total_power(0., 1.), 1., 1e-15);
        // For large alpha, 1 / (1 + Te/Ti) of the electrons scatter.
        assert_approx_eq!(salpeter_total_power(1e4, 1.), 0.5, 1e-6);
    }

    #[test]
    fn density_matches_direct_formula() {
        let e = SpeciesResponse { susceptibility: Complex64::new(2., -0.5), fluctuation: 3e-7 };
        let i = SpeciesResponse { susceptibility: Complex64::new(1.5, 0.25), fluctuation: 2e-5 };
        let eps = Complex64::new(4.5, -0.25);
        let expect = 1e11 / PI * (Complex64::new(2.5, 0.25).norm_sqr() * 3e-7 +
                                  Complex64::new(2., -0.5).norm_sqr() * 2e-5) / eps.norm_sqr();
        assert_approx_eq!(spectral_density(1e11, &e, &i), expect, 1e-12 * expect);
    }

    #[test]
    fn huge_susceptibilities_stay_finite() {
        let e = SpeciesResponse { susceptibility: Complex64::new(1e160, 1e159), fluctuation: 1e-7 };
        let i = SpeciesResponse { susceptibility: Complex64::new(1e160, -1e158), fluctuation: 1e-5 };
        let s = spectral_density(1e12, &e, &i);
        assert!(s.is_finite() && s > 0.);
    }

    #[test]
    fn plasma_line_above_plasma_frequency() {
        let p = params();
        let fp = p.electron.plasma_frequency(p.electron_density) / TWO_PI;
        let fl = plasma_line_frequency(&p);
        assert!(fl > fp);
        assert!(fl < 2. * fp);
    }
}
