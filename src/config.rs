// Copyright 2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the GPL version 3.

/*! Numerical settings for the spectrum engine.

A `NumericalConfig` is a plain value: callers construct it with `default()`
and adjust it with the builder-style methods, then hand it to the sweep
driver, which validates it before doing any work.

*/

use crate::errors::Result;
use crate::quadrature::Rule;

/// The fraction of the error budget of a Gordeyev integral that goes to the
/// truncated tail of its contour.
const TAIL_SHARE: f64 = 0.1;


/// Tolerances and limits that govern the Gordeyev integration.
#[derive(Clone,Copy,Debug,PartialEq)]
pub struct NumericalConfig {
    /// Absolute error target of each Gordeyev integral, in seconds.
    pub epsabs: f64,

    /// Relative error target of each Gordeyev integral.
    pub epsrel: f64,

    /// The lowest integrand envelope level at which contours are
    /// truncated. Looser relative tolerances truncate sooner; see
    /// `truncation_level`.
    pub truncation_tolerance: f64,

    /// Minimum distance between the contour and any singularity, in units
    /// of the characteristic time `1 / (k v)` of the species.
    pub clearance: f64,

    /// Maximum number of quadrature panels per integral.
    pub max_intervals: usize,

    /// The contour never extends beyond this many characteristic times.
    pub max_time_factor: f64,

    /// The Gauss-Kronrod rule used on each panel.
    pub rule: Rule,

    /// If set, the first inaccurate or failed sample aborts a sweep.
    pub strict: bool,

    /// If set, bulk sweeps spread frequencies over the rayon thread pool.
    pub parallel: bool,
}

impl Default for NumericalConfig {
    fn default() -> Self {
        NumericalConfig {
            epsabs: 0.,
            epsrel: 1e-6,
            truncation_tolerance: 1e-12,
            clearance: 1e-3,
            max_intervals: 20_000,
            max_time_factor: 5e3,
            rule: Rule::GaussKronrod15,
            strict: false,
            parallel: true,
        }
    }
}

impl NumericalConfig {
    /// Set the absolute and relative error targets.
    pub fn tolerance(mut self, epsabs: f64, epsrel: f64) -> Self {
        self.epsabs = epsabs;
        self.epsrel = epsrel;
        self
    }

    /// Set the lowest truncation level of the integrand envelope.
    pub fn truncation_tolerance(mut self, tol: f64) -> Self {
        self.truncation_tolerance = tol;
        self
    }

    /// The envelope level at which contours are actually truncated. At high
    /// frequencies the neglected tail is about this fraction of the
    /// integral, so it is kept well below the relative tolerance.
    pub fn truncation_level(&self) -> f64 {
        self.truncation_tolerance.max(TAIL_SHARE * self.epsrel)
    }

    /// The absolute and relative tolerances left for the quadrature once the
    /// tail has taken its share.
    pub fn quadrature_tolerance(&self) -> (f64, f64) {
        let share = 1. - TAIL_SHARE;
        (share * self.epsabs, share * self.epsrel)
    }

    /// Set the singularity clearance, in characteristic times.
    pub fn clearance(mut self, clearance: f64) -> Self {
        self.clearance = clearance;
        self
    }

    /// Set the panel limit of each integral.
    pub fn max_intervals(mut self, n: usize) -> Self {
        self.max_intervals = n;
        self
    }

    /// Set the longest allowed contour, in characteristic times.
    pub fn max_time_factor(mut self, factor: f64) -> Self {
        self.max_time_factor = factor;
        self
    }

    /// Set the panel quadrature rule.
    pub fn rule(mut self, rule: Rule) -> Self {
        self.rule = rule;
        self
    }

    /// Turn strict mode on or off.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Turn parallel bulk sweeps on or off.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Check that every setting is usable.
    pub fn validate(&self) -> Result<()> {
        ensure_config!(self.epsabs.is_finite() && self.epsabs >= 0.,
                       "absolute tolerance must be finite and nonnegative, got {}", self.epsabs);
        ensure_config!(self.epsrel.is_finite() && self.epsrel >= 0.,
                       "relative tolerance must be finite and nonnegative, got {}", self.epsrel);
        ensure_config!(self.epsabs > 0. || self.epsrel > 0.,
                       "at least one of the absolute and relative tolerances must be positive");
        ensure_config!(self.truncation_tolerance > 0. && self.truncation_tolerance < 1.,
                       "truncation tolerance must lie in (0, 1), got {}", self.truncation_tolerance);
        ensure_config!(self.truncation_level() < 1.,
                       "relative tolerance {} leaves no contour to integrate", self.epsrel);
        ensure_config!(self.clearance > 0. && self.clearance < 0.5,
                       "singularity clearance must lie in (0, 0.5), got {}", self.clearance);
        ensure_config!(self.max_intervals >= 4,
                       "need at least 4 quadrature intervals, got {}", self.max_intervals);
        ensure_config!(self.max_time_factor.is_finite() && self.max_time_factor > 1.,
                       "maximum contour length must exceed one characteristic time, got {}",
                       self.max_time_factor);
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(NumericalConfig::default().validate(), Ok(()));
    }

    #[test]
    fn builder_sets_fields() {
        let c = NumericalConfig::default()
            .tolerance(1e-20, 1e-9)
            .clearance(0.01)
            .strict(true)
            .parallel(false)
            .rule(Rule::GaussKronrod21);
        assert_eq!(c.epsabs, 1e-20);
        assert_eq!(c.epsrel, 1e-9);
        assert_eq!(c.clearance, 0.01);
        assert!(c.strict);
        assert!(!c.parallel);
        assert_eq!(c.rule, Rule::GaussKronrod21);
    }

    #[test]
    fn truncation_follows_relative_tolerance() {
        let c = NumericalConfig::default().tolerance(0., 1e-6);
        assert_eq!(c.truncation_level(), 0.1 * 1e-6);
        assert_eq!(c.tolerance(0., 1e-13).truncation_level(), 1e-12);
        assert_eq!(c.truncation_tolerance(1e-5).truncation_level(), 1e-5);

        let (epsabs, epsrel) = c.tolerance(1e-20, 1e-6).quadrature_tolerance();
        assert!(epsabs < 1e-20 && epsrel < 1e-6);
    }

    #[test]
    fn rejects_bad_settings() {
        let bad = [
            NumericalConfig::default().tolerance(0., 0.),
            NumericalConfig::default().tolerance(-1., 1e-6),
            NumericalConfig::default().truncation_tolerance(2.),
            NumericalConfig::default().tolerance(0., 20.),
            NumericalConfig::default().clearance(0.),
            NumericalConfig::default().max_intervals(1),
            NumericalConfig::default().max_time_factor(f64::NAN),
        ];

        for c in &bad {
            match c.validate() {
                Err(Error::Configuration(_)) => {},
                other => panic!("expected configuration error for {:?}, got {:?}", c, other),
            }
        }
    }
}
