// Copyright 2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the GPL version 3.

/// Tightening the tolerance should never make the spectrum worse.

extern crate isr_spectrum;
extern crate isr_test_support;

use isr_spectrum::{DistributionSpec, NumericalConfig, PlasmaParameters, Species, SpectrumCurve,
                   SweepDriver, PI};
use isr_spectrum::sweep::cubic_frequency_grid;
use isr_test_support::default_log;

fn spectrum(driver: &mut SweepDriver, epsrel: f64) -> SpectrumCurve {
    let params = PlasmaParameters::from_radar_frequency(
        500e6, 4e-5, 0.25 * PI, 1e11, Species::electron(3000.), Species::ion(1200., 16.));
    let config = NumericalConfig::default().tolerance(0., epsrel);

    driver.prepare(&params, &DistributionSpec::Maxwellian, &DistributionSpec::Maxwellian, &config)
        .unwrap()
        .sweep(&cubic_frequency_grid(3e6, 41))
        .unwrap()
}

fn max_error(curve: &SpectrumCurve, reference: &SpectrumCurve) -> f64 {
    curve.densities()
        .into_iter()
        .zip(reference.densities())
        .map(|(a, b)| (a - b).abs())
        .fold(0., f64::max)
}


#[test]
fn errors_shrink_with_tolerance() {
    let mut driver = SweepDriver::new(default_log());
    let reference = spectrum(&mut driver, 1e-12);
    let peak = reference.densities().into_iter().fold(0., f64::max);
    let floor = 1e-9 * peak;

    let errors: Vec<f64> = [1e-2, 1e-5, 1e-8]
        .iter()
        .map(|&eps| max_error(&spectrum(&mut driver, eps), &reference))
        .collect();

    for w in errors.windows(2) {
        assert!(w[1] <= w[0].max(floor), "errors do not shrink: {:?}", errors);
    }

    assert!(errors[2] <= 1e-6 * peak, "errors at the tightest tolerance: {:?}", errors);
}

