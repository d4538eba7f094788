// Copyright 2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the GPL version 3.

/*! Compute incoherent scatter radar spectra for non-Maxwellian plasmas.

The incoherent scatter spectrum is the power spectral density of the
electron density fluctuations of a magnetized plasma, as seen by a radar at
a given Bragg wavenumber and aspect angle to the magnetic field. Everything
that depends on the velocity distribution of a species enters through its
*Gordeyev integral*, a one-sided Fourier transform over the time that a
particle has been following its gyro-orbit.

For a Maxwellian the integrand is a Gaussian, but for other isotropic
distributions it is a characteristic function of the speed distribution
evaluated at the particle displacement, and it may be singular at complex
times near the real axis. The integral is therefore taken along a contour
in complex time that avoids those points. The crate is organized around
that computation:

- [`distribution`] and its submodules describe the velocity distributions;
- [`contour`] builds the integration paths;
- [`gordeyev`] evaluates the integrals along them;
- [`spectrum`] assembles the spectral density;
- [`sweep`] drives all of this over frequency grids.

The basic calculation is available through [`sweep::isr_spectrum`]; see
[`sweep::SweepDriver`] for the fuller interface. All quantities are in SI
units, and frequencies are in Hz unless named otherwise.

*/

#![deny(missing_docs)]

#[macro_use] extern crate slog;

#[macro_use] pub mod errors;

pub mod config;
pub mod contour;
pub mod distribution;
pub mod gordeyev;
pub mod kappa;
pub mod maxwellian;
pub mod mixture;
pub mod plasma;
pub mod quadrature;
pub mod shell;
pub mod special;
pub mod spectrum;
pub mod sweep;
pub mod tabulated;

pub use std::f64::consts::PI;

pub use config::NumericalConfig;
pub use distribution::{DistributionSpec, MixtureComponent};
pub use errors::{Error, Result};
pub use plasma::{PlasmaParameters, Species, SpeciesKind};
pub use sweep::{isr_spectrum, gordeyev_integral, SpectrumCalculator, SpectrumCurve, SweepDriver};
pub use tabulated::TabulatedDistribution;

/// Two times pi, as an `f64`.
pub const TWO_PI: f64 = 2. * PI;

/// The mass of the electron, in kg.
pub const MASS_ELECTRON: f64 = 9.1093837015e-31;

/// The mass of the proton, in kg.
pub const MASS_PROTON: f64 = 1.67262192369e-27;

/// The atomic mass unit, in kg.
pub const ATOMIC_MASS_UNIT: f64 = 1.66053906660e-27;

/// The elementary charge, in C.
pub const ELECTRON_CHARGE: f64 = 1.602176634e-19;

/// The Boltzmann constant, in J/K.
pub const BOLTZMANN: f64 = 1.380649e-23;

/// The vacuum permittivity, in F/m.
pub const VACUUM_PERMITTIVITY: f64 = 8.8541878128e-12;

/// The speed of light, in m/s.
pub const SPEED_LIGHT: f64 = 2.99792458e8;
