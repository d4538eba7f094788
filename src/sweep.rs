// Copyright 2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the GPL version 3.

/*! Spectra over grids of frequencies.

A [`SweepDriver`] turns plasma parameters and distributions into a
[`SpectrumCalculator`], doing all of the work that does not depend on the
frequency up front: resolving the kernels, building the contours (which it
caches for later calculations), and sampling the kernels along them. The
calculator then evaluates spectra at arbitrary frequencies, either over a
whole grid at once or one frequency at a time.

Bulk sweeps may run on the rayon thread pool. Every frequency is evaluated
independently, so the results do not depend on how a grid is split up.

*/

use rayon::prelude::*;
use slog::Logger;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::config::NumericalConfig;
use crate::contour::{ContourBuilder, ContourPath};
use crate::distribution::{DistributionSpec, KernelVisitor, ResolvedKernel, VelocityKernel};
use crate::errors::{Error, Result};
use crate::gordeyev::{GordeyevResult, SampledPath};
use crate::plasma::{OrbitGeometry, PlasmaParameters, SpeciesKind};
use crate::spectrum::{spectral_density, SpeciesResponse};
use crate::TWO_PI;


/// How trustworthy a spectrum sample is.
#[derive(Clone,Debug,PartialEq)]
pub enum Diagnostic {
    /// Both Gordeyev integrals met their tolerances.
    Clean,

    /// A Gordeyev integral did not meet its tolerance. The density is still
    /// the best available estimate.
    Inaccurate {
        /// The species whose integral is affected.
        species: SpeciesKind,

        /// The estimated absolute error.
        abserr: f64,

        /// The tolerance that was requested.
        tolerance: f64,
    },

    /// A Gordeyev integral could not be evaluated. The density is NaN.
    Failed {
        /// The species whose integral failed.
        species: SpeciesKind,

        /// What went wrong.
        error: Error,
    },
}

impl Diagnostic {
    /// Whether this is `Diagnostic::Clean`.
    pub fn is_clean(&self) -> bool {
        *self == Diagnostic::Clean
    }

    fn to_error(&self, frequency: f64) -> Option<Error> {
        match *self {
            Diagnostic::Clean => None,
            Diagnostic::Inaccurate { abserr, tolerance, .. } =>
                Some(Error::NumericalAccuracy { frequency, abserr, tolerance }),
            Diagnostic::Failed { ref error, .. } => Some(error.clone()),
        }
    }
}


/// The spectrum at one frequency.
#[derive(Clone,Debug,PartialEq)]
pub struct SpectrumPoint {
    /// The frequency offset from the transmitter, in Hz.
    pub frequency: f64,

    /// The spectral density per unit angular frequency, in s/m^3.
    pub density: f64,

    /// How the sample came out.
    pub diagnostic: Diagnostic,
}


/// A spectrum sampled on a caller-supplied grid, in the caller's order.
#[derive(Clone,Debug,PartialEq)]
pub struct SpectrumCurve {
    points: Vec<SpectrumPoint>,
}

impl SpectrumCurve {
    /// The samples.
    pub fn points(&self) -> &[SpectrumPoint] {
        &self.points
    }

    /// The sample frequencies, in Hz.
    pub fn frequencies(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.frequency).collect()
    }

    /// The spectral densities.
    pub fn densities(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.density).collect()
    }

    /// The trapezoidal integral of the density over angular frequency,
    /// taken over the grid in increasing order.
    pub fn total_power(&self) -> f64 {
        let mut sorted: Vec<(f64, f64)> = self.points.iter()
            .map(|p| (TWO_PI * p.frequency, p.density))
            .collect();
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

        sorted.windows(2)
            .map(|w| 0.5 * (w[1].0 - w[0].0) * (w[1].1 + w[0].1))
            .sum()
    }

    /// The same curve scaled to unit total power.
    pub fn normalized(&self) -> SpectrumCurve {
        let total = self.total_power();

        SpectrumCurve {
            points: self.points.iter()
                .map(|p| SpectrumPoint { density: p.density / total, ..p.clone() })
                .collect(),
        }
    }

    /// The samples that are not clean.
    pub fn warnings(&self) -> impl Iterator<Item = &SpectrumPoint> {
        self.points.iter().filter(|p| !p.diagnostic.is_clean())
    }

    /// Whether every sample is clean.
    pub fn is_clean(&self) -> bool {
        self.warnings().next().is_none()
    }
}


/// Everything that identifies a contour.
#[derive(Clone,Debug,Eq,Hash,PartialEq)]
struct ContourKey {
    fingerprint: u64,
    kind: SpeciesKind,
    temperature: u64,
    mass: u64,
    collision_frequency: u64,
    k_parallel: u64,
    k_perpendicular: u64,
    gyrofrequency: u64,
    clearance: u64,
    truncation_level: u64,
    max_time_factor: u64,
    max_intervals: usize,
}


/// Prepares spectrum calculations and keeps their contours around.
pub struct SweepDriver {
    logger: Logger,
    contours: HashMap<ContourKey, Arc<ContourPath>>,
}

impl SweepDriver {
    /// A driver that logs to `logger`.
    pub fn new(logger: Logger) -> Self {
        SweepDriver { logger, contours: HashMap::new() }
    }

    /// The number of contours in the cache.
    pub fn cached_contours(&self) -> usize {
        self.contours.len()
    }

    /// Forget all cached contours.
    pub fn clear_cache(&mut self) {
        self.contours.clear();
    }

    /// Validate the inputs and do all frequency-independent work.
    pub fn prepare(&mut self, params: &PlasmaParameters, electron: &DistributionSpec,
                   ion: &DistributionSpec, config: &NumericalConfig) -> Result<SpectrumCalculator> {
        params.validate()?;
        config.validate()?;

        debug!(self.logger, "preparing spectrum calculation";
               "alpha" => params.alpha(), "aspect_angle" => params.aspect_angle,
               "electron_kernel" => spec_name(electron), "ion_kernel" => spec_name(ion));

        let electron = self.model(params, SpeciesKind::Electron, electron, config)?;
        let ion = self.model(params, SpeciesKind::Ion, ion, config)?;

        Ok(SpectrumCalculator {
            logger: self.logger.new(o!("alpha" => params.alpha())),
            params: *params,
            config: *config,
            electron,
            ion,
        })
    }

    fn model(&mut self, params: &PlasmaParameters, kind: SpeciesKind, spec: &DistributionSpec,
             config: &NumericalConfig) -> Result<SpeciesModel> {
        let species = params.species(kind);
        let kernel = spec.resolve(species)?;
        let geometry = params.geometry(kind);

        let key = ContourKey {
            fingerprint: spec.fingerprint(),
            kind,
            temperature: species.temperature.to_bits(),
            mass: species.mass.to_bits(),
            collision_frequency: species.collision_frequency.to_bits(),
            k_parallel: geometry.k_parallel.to_bits(),
            k_perpendicular: geometry.k_perpendicular.to_bits(),
            gyrofrequency: geometry.gyrofrequency.to_bits(),
            clearance: config.clearance.to_bits(),
            truncation_level: config.truncation_level().to_bits(),
            max_time_factor: config.max_time_factor.to_bits(),
            max_intervals: config.max_intervals,
        };

        let path = match self.contours.get(&key) {
            Some(path) => {
                debug!(self.logger, "reusing cached contour"; "species" => ?kind);
                path.clone()
            },

            None => {
                let path = ContourBuilder::new(geometry, config)
                    .collision_frequency(species.collision_frequency)
                    .build(&kernel)?;

                debug!(self.logger, "built contour";
                       "species" => ?kind,
                       "kernel" => kernel.name(),
                       "segments" => path.segments().len(),
                       "singularities" => path.singularities().len(),
                       "end_time" => path.end_time(),
                       "truncation_bound" => path.truncation_bound());

                let path = Arc::new(path);
                self.contours.insert(key, path.clone());
                path
            },
        };

        let sampled = kernel.visit(Sample {
            geometry,
            path,
            collision_frequency: species.collision_frequency,
            config,
        })?;

        trace!(self.logger, "sampled contour"; "species" => ?kind, "panels" => sampled.panels());

        Ok(SpeciesModel {
            kind,
            reference_speed: kernel.reference_speed(),
            kernel,
            sampled,
        })
    }
}

fn spec_name(spec: &DistributionSpec) -> &'static str {
    match *spec {
        DistributionSpec::Maxwellian => "maxwellian",
        DistributionSpec::Kappa { .. } => "kappa",
        DistributionSpec::GaussianShell { .. } => "shell",
        DistributionSpec::Tabulated(_) => "tabulated",
        DistributionSpec::Mixture(_) => "mixture",
    }
}


struct Sample<'a> {
    geometry: OrbitGeometry,
    path: Arc<ContourPath>,
    collision_frequency: f64,
    config: &'a NumericalConfig,
}

impl<'a> KernelVisitor for Sample<'a> {
    type Output = Result<SampledPath>;

    fn visit<K: VelocityKernel>(self, kernel: &K) -> Self::Output {
        SampledPath::new(kernel, self.geometry, self.path, self.collision_frequency, self.config)
    }
}


struct Evaluate<'a> {
    sampled: &'a SampledPath,
    frequency: f64,
}

impl<'a> KernelVisitor for Evaluate<'a> {
    type Output = Result<GordeyevResult>;

    fn visit<K: VelocityKernel>(self, kernel: &K) -> Self::Output {
        self.sampled.evaluate(kernel, self.frequency)
    }
}


/// One species, ready for evaluation.
#[derive(Clone,Debug)]
struct SpeciesModel {
    kind: SpeciesKind,
    kernel: ResolvedKernel,
    reference_speed: f64,
    sampled: SampledPath,
}

impl SpeciesModel {
    fn gordeyev(&self, frequency: f64) -> Result<GordeyevResult> {
        self.kernel.visit(Evaluate { sampled: &self.sampled, frequency })
    }
}


/// Evaluates spectra for fixed plasma parameters and distributions.
#[derive(Clone)]
pub struct SpectrumCalculator {
    logger: Logger,
    params: PlasmaParameters,
    config: NumericalConfig,
    electron: SpeciesModel,
    ion: SpeciesModel,
}

impl SpectrumCalculator {
    /// The plasma parameters.
    pub fn params(&self) -> &PlasmaParameters {
        &self.params
    }

    /// The contour used for one of the species.
    pub fn contour(&self, kind: SpeciesKind) -> &ContourPath {
        self.model(kind).sampled.path()
    }

    fn model(&self, kind: SpeciesKind) -> &SpeciesModel {
        match kind {
            SpeciesKind::Electron => &self.electron,
            SpeciesKind::Ion => &self.ion,
        }
    }

    /// The Gordeyev integrals of one species at `frequency` (Hz).
    pub fn gordeyev(&self, kind: SpeciesKind, frequency: f64) -> Result<GordeyevResult> {
        self.model(kind).gordeyev(frequency)
    }

    /// The spectrum at a single frequency (Hz). In strict mode an
    /// inaccurate or failed sample is an error.
    pub fn spectral_density(&self, frequency: f64) -> Result<SpectrumPoint> {
        let point = self.point(frequency);

        if self.config.strict {
            if let Some(e) = point.diagnostic.to_error(frequency) {
                return Err(e);
            }
        }

        Ok(point)
    }

    /// The spectrum over a grid of frequencies (Hz), in the given order. In
    /// strict mode the first inaccurate or failed sample in grid order is
    /// an error, and frequencies after it are not evaluated.
    pub fn sweep(&self, frequencies: &[f64]) -> Result<SpectrumCurve> {
        debug!(self.logger, "starting sweep";
               "points" => frequencies.len(), "parallel" => self.config.parallel);

        // Index of the first unclean sample seen so far in strict mode.
        let first_bad = AtomicUsize::new(usize::MAX);

        let sample = |(i, &f): (usize, &f64)| {
            if i > first_bad.load(Ordering::Relaxed) {
                return None;
            }

            let point = self.point(f);

            if self.config.strict && !point.diagnostic.is_clean() {
                first_bad.fetch_min(i, Ordering::Relaxed);
            }

            Some(point)
        };

        let points: Vec<Option<SpectrumPoint>> = if self.config.parallel {
            frequencies.par_iter().enumerate().map(sample).collect()
        } else {
            let mut points = Vec::with_capacity(frequencies.len());

            for item in frequencies.iter().enumerate() {
                points.push(sample(item));

                if first_bad.load(Ordering::Relaxed) != usize::MAX {
                    break;
                }
            }

            points
        };

        let bad = first_bad.into_inner();

        if let Some(Some(p)) = points.get(bad) {
            if let Some(e) = p.diagnostic.to_error(p.frequency) {
                let evaluated = points.iter().filter(|p| p.is_some()).count();
                debug!(self.logger, "strict sweep stopped";
                       "index" => bad, "skipped" => frequencies.len() - evaluated);
                return Err(e);
            }
        }

        let curve = SpectrumCurve { points: points.into_iter().flatten().collect() };
        let n_warn = curve.warnings().count();

        if n_warn > 0 {
            warn!(self.logger, "sweep finished with unclean samples";
                  "unclean" => n_warn, "points" => frequencies.len());
        }

        Ok(curve)
    }

    fn point(&self, frequency: f64) -> SpectrumPoint {
        let ge = match self.electron.gordeyev(frequency) {
            Ok(g) => g,
            Err(e) => return self.failed(frequency, SpeciesKind::Electron, e),
        };

        let gi = match self.ion.gordeyev(frequency) {
            Ok(g) => g,
            Err(e) => return self.failed(frequency, SpeciesKind::Ion, e),
        };

        let e = SpeciesResponse::new(&self.params, self.electron.kind,
                                     self.electron.reference_speed, &ge);
        let i = SpeciesResponse::new(&self.params, self.ion.kind, self.ion.reference_speed, &gi);
        let density = spectral_density(self.params.electron_density, &e, &i);

        let diagnostic = if !ge.accurate {
            Diagnostic::Inaccurate { species: SpeciesKind::Electron, abserr: ge.abserr,
                                     tolerance: ge.tolerance }
        } else if !gi.accurate {
            Diagnostic::Inaccurate { species: SpeciesKind::Ion, abserr: gi.abserr,
                                     tolerance: gi.tolerance }
        } else {
            Diagnostic::Clean
        };

        trace!(self.logger, "sample";
               "frequency" => frequency, "density" => density,
               "electron_intervals" => ge.intervals, "ion_intervals" => gi.intervals);

        if !diagnostic.is_clean() {
            warn!(self.logger, "inaccurate Gordeyev integral";
                  "frequency" => frequency, "diagnostic" => ?diagnostic);
        }

        SpectrumPoint { frequency, density, diagnostic }
    }

    fn failed(&self, frequency: f64, species: SpeciesKind, error: Error) -> SpectrumPoint {
        warn!(self.logger, "failed to evaluate Gordeyev integral";
              "frequency" => frequency, "species" => ?species, "error" => %error);

        SpectrumPoint {
            frequency,
            density: f64::NAN,
            diagnostic: Diagnostic::Failed { species, error },
        }
    }
}


/// The spectrum for electrons with distribution `electron` and Maxwellian
/// ions over `frequencies` (Hz).
pub fn isr_spectrum(params: &PlasmaParameters, electron: &DistributionSpec, frequencies: &[f64],
                    config: &NumericalConfig) -> Result<SpectrumCurve> {
    let mut driver = SweepDriver::new(Logger::root(slog::Discard, o!()));
    driver.prepare(params, electron, &DistributionSpec::Maxwellian, config)?
        .sweep(frequencies)
}


/// The Gordeyev integrals of one species at a single frequency (Hz).
pub fn gordeyev_integral(params: &PlasmaParameters, kind: SpeciesKind, spec: &DistributionSpec,
                         frequency: f64, config: &NumericalConfig) -> Result<GordeyevResult> {
    params.validate()?;
    config.validate()?;
    let mut driver = SweepDriver::new(Logger::root(slog::Discard, o!()));
    driver.model(params, kind, spec, config)?.gordeyev(frequency)
}


/// `n` frequencies between `-f_max` and `f_max` (Hz), spaced as cubes of a
/// uniform grid so that they crowd around zero where the ion line is.
pub fn cubic_frequency_grid(f_max: f64, n: usize) -> Vec<f64> {
    if n < 2 {
        return vec![0.; n];
    }

    (0..n)
        .map(|i| {
            let x = -1. + 2. * i as f64 / (n - 1) as f64;
            x * x * x * f_max
        })
        .collect()
}
