// Copyright 2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the GPL version 3.

//! Error types for spectrum calculations.

use thiserror::Error;


/// Everything that can go wrong while building or evaluating a spectrum.
#[derive(Clone,Debug,Error,PartialEq)]
pub enum Error {
    /// A distribution, a set of plasma parameters, or a numerical setting is
    /// outside of its valid domain. Raised before any integration happens.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// No integration contour could be found that keeps the required
    /// clearance from the singularities of the integrand.
    #[error("cannot construct integration contour: {0}")]
    ContourConstruction(String),

    /// The estimated error of a Gordeyev integral exceeds the requested
    /// tolerance. Only surfaced as an error in strict mode; otherwise it is
    /// attached to the affected sample.
    #[error("integral at {frequency} Hz has estimated error {abserr:e}, above tolerance {tolerance:e}")]
    NumericalAccuracy {
        /// The frequency of the affected sample, in Hz.
        frequency: f64,

        /// The estimated absolute error.
        abserr: f64,

        /// The tolerance that was requested.
        tolerance: f64,
    },

    /// A kernel or integrand produced a non-finite value.
    #[error("numerical failure at {frequency} Hz: {detail}")]
    NumericalFailure {
        /// The frequency of the affected sample, in Hz.
        frequency: f64,

        /// What went wrong.
        detail: String,
    },
}


/// A `Result` whose error type is our [`Error`].
pub type Result<T> = std::result::Result<T, Error>;


/// Build a configuration error from a format string.
macro_rules! config_err {
    ($($arg:tt)*) => {
        $crate::errors::Error::Configuration(format!($($arg)*))
    }
}


/// Return a configuration error from the current function unless the
/// condition holds.
macro_rules! ensure_config {
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err(config_err!($($arg)*));
        }
    }
}
