// Copyright 2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the GPL version 3.

/// Check the contours that the driver builds for real plasmas.

extern crate isr_spectrum;
extern crate isr_test_support;

use isr_spectrum::{DistributionSpec, Error, MixtureComponent, NumericalConfig, PlasmaParameters,
                   Species, SpeciesKind, SweepDriver, TabulatedDistribution, PI};
use isr_spectrum::contour::{ContourPath, Segment};
use isr_test_support::{default_log, Sampler};

fn params(theta: f64) -> PlasmaParameters {
    PlasmaParameters::from_radar_frequency(230e6, 5e-5, theta, 5e11,
                                           Species::electron(2500.), Species::ion(1000., 16.))
}

fn check_path(path: &ContourPath) {
    let segs = path.segments();
    assert!(!segs.is_empty());
    assert!(segs[0].point(0.).norm() == 0.);

    for w in segs.windows(2) {
        let gap = (w[0].point(1.) - w[1].point(0.)).norm();
        assert!(gap <= 1e-12 * path.end_time(), "segments are disconnected by {:e}", gap);
    }

    let last = segs[segs.len() - 1].point(1.);
    assert!((last.re - path.end_time()).abs() <= 1e-12 * path.end_time());
    assert!(last.im.abs() <= 1e-12 * path.end_time());

    assert!(path.min_distance() >= path.clearance() * (1. - 1e-9),
            "contour comes within {:e} of a singularity; clearance is {:e}",
            path.min_distance(), path.clearance());
}


#[test]
fn kappa_contours_are_valid() {
    let theta = Sampler::uniform(0.05, 0.5 * PI - 0.05);
    let config = NumericalConfig::default();
    let mut driver = SweepDriver::new(default_log());

    for &kappa in &[1.7, 3., 20.] {
        let t = theta.get();
        let calc = driver.prepare(&params(t), &DistributionSpec::kappa(kappa),
                                  &DistributionSpec::kappa(kappa), &config).unwrap();

        assert!(!calc.contour(SpeciesKind::Electron).singularities().is_empty());

        for &kind in &[SpeciesKind::Electron, SpeciesKind::Ion] {
            check_path(calc.contour(kind));
        }
    }
}


#[test]
fn mixture_contours_avoid_every_component() {
    let spec = DistributionSpec::mixture(vec![
        MixtureComponent::new(0.8, DistributionSpec::Maxwellian),
        MixtureComponent::new(0.2, DistributionSpec::kappa(2.)).temperature(2e4),
    ]);

    let mut driver = SweepDriver::new(default_log());
    let calc = driver.prepare(&params(1.2), &spec, &DistributionSpec::Maxwellian,
                              &NumericalConfig::default()).unwrap();

    let path = calc.contour(SpeciesKind::Electron);
    assert!(path.singularities().iter().all(|s| s.owner == 1));
    check_path(path);
}


#[test]
fn sharp_edged_tables_truncate_with_tolerance() {
    // A flat-topped table has a kernel that decays only like 1/p. A small
    // admixture of it should not force the contour out to its maximum
    // length at everyday tolerances.
    let p = params(0.);
    let v = p.electron.thermal_speed();
    let flat = TabulatedDistribution::new(vec![0., 5. * v], vec![1., 1.]).unwrap();
    let spec = DistributionSpec::mixture(vec![
        MixtureComponent::new(1., DistributionSpec::Maxwellian),
        MixtureComponent::new(1e-6, DistributionSpec::Tabulated(flat)),
    ]);

    let mut driver = SweepDriver::new(default_log());
    let end_time = |epsrel: f64, driver: &mut SweepDriver| {
        let config = NumericalConfig::default().tolerance(0., epsrel);
        let calc = driver.prepare(&p, &spec, &DistributionSpec::Maxwellian, &config).unwrap();
        let path = calc.contour(SpeciesKind::Electron);
        check_path(path);
        path.end_time()
    };

    let loose = end_time(1e-6, &mut driver);
    let tight = end_time(1e-11, &mut driver);
    assert!(loose < 0.05 * tight, "loose contour ends at {:e} s, tight at {:e} s", loose, tight);
    assert_eq!(driver.cached_contours(), 4);
}


#[test]
fn clearance_decides_near_perpendicular_contours() {
    // The displacement zeros come in conjugate pairs that approach the axis
    // as k_par / k_perp shrinks. Once a pair is inside the clearance there is
    // no side to pass it on.
    let p = params(0.5 * PI - 0.02);
    let spec = DistributionSpec::kappa(3.);
    let mut driver = SweepDriver::new(default_log());

    let calc = driver.prepare(&p, &spec, &DistributionSpec::Maxwellian,
                              &NumericalConfig::default()).unwrap();
    let path = calc.contour(SpeciesKind::Electron);
    check_path(path);
    assert!(path.segments().iter().all(|s| match *s { Segment::Line { .. } => true, _ => false }));

    match driver.prepare(&p, &spec, &DistributionSpec::Maxwellian,
                         &NumericalConfig::default().clearance(0.05)) {
        Err(Error::ContourConstruction(_)) => {},
        Err(e) => panic!("expected a contour construction error, got {}", e),
        Ok(_) => panic!("expected a contour construction error"),
    }
}


#[test]
fn near_perpendicular_kappa_is_rejected() {
    let mut driver = SweepDriver::new(default_log());

    match driver.prepare(&params(0.5 * PI - 1e-5), &DistributionSpec::kappa(3.),
                         &DistributionSpec::Maxwellian, &NumericalConfig::default()) {
        Err(Error::ContourConstruction(_)) => {},
        Err(e) => panic!("expected a contour construction error, got {}", e),
        Ok(_) => panic!("expected a contour construction error"),
    }
}


#[test]
fn low_kappa_is_a_configuration_error() {
    let mut driver = SweepDriver::new(default_log());

    match driver.prepare(&params(0.3), &DistributionSpec::kappa(1.), &DistributionSpec::Maxwellian,
                         &NumericalConfig::default()) {
        Err(Error::Configuration(_)) => {},
        Err(e) => panic!("expected a configuration error, got {}", e),
        Ok(_) => panic!("expected a configuration error"),
    }
}
