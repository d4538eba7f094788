// Copyright 2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the GPL version 3.

/// Compute an incoherent scatter spectrum and print it as a table.
///
/// Each output row gives the Doppler frequency, the spectral density, the
/// density normalized to unit total power, and whether the underlying
/// integrals met their tolerances. Progress and warnings go to the terminal
/// logger.

#[macro_use]
extern crate clap;
extern crate isr_spectrum;
extern crate isr_test_support;
#[macro_use]
extern crate slog;

use clap::{Arg, ArgAction, Command};
use isr_spectrum::{DistributionSpec, NumericalConfig, PlasmaParameters, Species, SweepDriver};
use isr_spectrum::spectrum::{plasma_line_frequency, salpeter_total_power};
use isr_spectrum::sweep::cubic_frequency_grid;
use std::process;
use std::time::Instant;

fn number(name: &'static str, help: &'static str, default: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .help(help)
        .default_value(default)
        .value_parser(value_parser!(f64))
}

fn main() {
    let matches = Command::new(crate_name!())
        .version(crate_version!())
        .about("Compute an incoherent scatter spectrum")
        .arg(number("radar-frequency", "The radar transmitter frequency, in Hz", "933e6"))
        .arg(number("field", "The magnetic field strength, in T", "5e-5"))
        .arg(number("angle", "The aspect angle to the magnetic field, in degrees", "45"))
        .arg(number("density", "The electron density, in 1/m^3", "2e11"))
        .arg(number("te", "The electron temperature, in K", "2000"))
        .arg(number("ti", "The ion temperature, in K", "1500"))
        .arg(number("ion-mass", "The ion mass, in amu", "16"))
        .arg(number("kappa", "Use a kappa distribution for the electrons with this index", "0"))
        .arg(number("f-max", "The largest Doppler frequency, in Hz", "6e6"))
        .arg(number("epsrel", "The relative tolerance of the Gordeyev integrals", "1e-6"))
        .arg(
            Arg::new("points")
                .long("points")
                .help("The number of frequencies in the grid")
                .default_value("801")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("strict")
                .long("strict")
                .help("Fail on the first integral that misses its tolerance")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let get = |name: &str| *matches.get_one::<f64>(name).unwrap();
    let log = isr_test_support::default_log();

    let params = PlasmaParameters::from_radar_frequency(
        get("radar-frequency"),
        get("field"),
        get("angle").to_radians(),
        get("density"),
        Species::electron(get("te")),
        Species::ion(get("ti"), get("ion-mass")),
    );

    let electron = match get("kappa") {
        k if k > 0. => DistributionSpec::kappa(k),
        _ => DistributionSpec::Maxwellian,
    };

    let config = NumericalConfig::default()
        .tolerance(0., get("epsrel"))
        .strict(matches.get_flag("strict"));

    let freqs = cubic_frequency_grid(get("f-max"), *matches.get_one::<usize>("points").unwrap());

    info!(log, "computing spectrum";
          "alpha" => params.alpha(),
          "plasma_line" => plasma_line_frequency(&params),
          "n_freq" => freqs.len());

    let t0 = Instant::now();
    let mut driver = SweepDriver::new(log.clone());

    let curve = match driver.prepare(&params, &electron, &DistributionSpec::Maxwellian, &config)
        .and_then(|calc| calc.sweep(&freqs)) {
        Ok(c) => c,
        Err(e) => {
            crit!(log, "spectrum calculation failed"; "error" => %e);
            process::exit(1);
        }
    };

    let elapsed = t0.elapsed();
    let n_bad = curve.warnings().count();

    info!(log, "done";
          "time_ms" => elapsed.as_secs_f64() * 1000.,
          "unclean" => n_bad,
          "total_power" => curve.total_power() / params.electron_density,
          "maxwellian_power" => salpeter_total_power(params.alpha(),
                                                     params.electron.temperature / params.ion.temperature));

    let normalized = curve.normalized();

    println!("freq\tdensity\tnormalized\tclean");

    for (pt, norm) in curve.points().iter().zip(normalized.points()) {
        println!("{:.16e}\t{:.16e}\t{:.16e}\t{}", pt.frequency, pt.density, norm.density,
                 pt.diagnostic.is_clean() as u8);
    }
}
