// Copyright 2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the GPL version 3.

/*! Physical parameters of the scattering plasma.

Everything here is in SI units. The plasma consists of electrons and one
species of singly charged ions, with equal densities.

*/

use num_complex::Complex64;

use crate::errors::{Error, Result};
use crate::special::sinc;
use crate::{ATOMIC_MASS_UNIT, BOLTZMANN, ELECTRON_CHARGE, MASS_ELECTRON, PI, SPEED_LIGHT,
            TWO_PI, VACUUM_PERMITTIVITY};

/// Aspect angles this close to 0 or pi/2 are snapped onto them.
const ANGLE_SNAP: f64 = 1e-12;


/// Which of the two plasma species a calculation refers to.
#[derive(Copy,Clone,Debug,Eq,Hash,PartialEq)]
pub enum SpeciesKind {
    /// The electrons.
    Electron,

    /// The ions.
    Ion,
}


/// Temperature, mass, and collision rate of one particle species.
#[derive(Copy,Clone,Debug,PartialEq)]
pub struct Species {
    /// The temperature, in K.
    pub temperature: f64,

    /// The particle mass, in kg.
    pub mass: f64,

    /// The collision frequency of the BGK approximation, in 1/s.
    pub collision_frequency: f64,
}

impl Species {
    /// Collisionless electrons at temperature `temperature` (K).
    pub fn electron(temperature: f64) -> Self {
        Species { temperature, mass: MASS_ELECTRON, collision_frequency: 0. }
    }

    /// Collisionless ions at temperature `temperature` (K) with a mass of
    /// `mass_amu` atomic mass units.
    pub fn ion(temperature: f64, mass_amu: f64) -> Self {
        Species { temperature, mass: mass_amu * ATOMIC_MASS_UNIT, collision_frequency: 0. }
    }

    /// Set the collision frequency.
    pub fn collision_frequency(mut self, nu: f64) -> Self {
        self.collision_frequency = nu;
        self
    }

    /// The one-dimensional thermal speed `sqrt(k T / m)`, in m/s.
    pub fn thermal_speed(&self) -> f64 {
        (BOLTZMANN * self.temperature / self.mass).sqrt()
    }

    /// The angular gyrofrequency in a field of `b` tesla, in rad/s.
    pub fn gyrofrequency(&self, b: f64) -> f64 {
        ELECTRON_CHARGE * b / self.mass
    }

    /// The angular plasma frequency at density `n` (1/m^3), in rad/s.
    pub fn plasma_frequency(&self, n: f64) -> f64 {
        (n * ELECTRON_CHARGE * ELECTRON_CHARGE / (VACUUM_PERMITTIVITY * self.mass)).sqrt()
    }

    fn validate(&self, name: &str) -> Result<()> {
        ensure_config!(self.temperature.is_finite() && self.temperature > 0.,
                       "{} temperature must be positive, got {}", name, self.temperature);
        ensure_config!(self.mass.is_finite() && self.mass > 0.,
                       "{} mass must be positive, got {}", name, self.mass);
        ensure_config!(self.collision_frequency.is_finite() && self.collision_frequency >= 0.,
                       "{} collision frequency must be nonnegative, got {}", name,
                       self.collision_frequency);
        Ok(())
    }
}


/// The full set of physical inputs to a spectrum calculation.
#[derive(Copy,Clone,Debug,PartialEq)]
pub struct PlasmaParameters {
    /// The Bragg wavenumber of the scattering, in rad/m.
    pub radar_wavenumber: f64,

    /// The magnetic field strength, in T.
    pub magnetic_field: f64,

    /// The angle between the wave vector and the magnetic field, in radians,
    /// between 0 and pi.
    pub aspect_angle: f64,

    /// The electron density, in 1/m^3.
    pub electron_density: f64,

    /// The electrons.
    pub electron: Species,

    /// The ions.
    pub ion: Species,
}

impl PlasmaParameters {
    /// Parameters with an explicit Bragg wavenumber.
    pub fn new(radar_wavenumber: f64, magnetic_field: f64, aspect_angle: f64,
               electron_density: f64, electron: Species, ion: Species) -> Self {
        PlasmaParameters {
            radar_wavenumber,
            magnetic_field,
            aspect_angle,
            electron_density,
            electron,
            ion,
        }
    }

    /// Parameters for a monostatic radar transmitting at `radar_frequency` Hz,
    /// whose backscatter wavenumber is `4 pi f / c`.
    pub fn from_radar_frequency(radar_frequency: f64, magnetic_field: f64, aspect_angle: f64,
                                electron_density: f64, electron: Species, ion: Species) -> Self {
        let k = 2. * TWO_PI * radar_frequency / SPEED_LIGHT;
        PlasmaParameters::new(k, magnetic_field, aspect_angle, electron_density, electron, ion)
    }

    /// Check that the parameters describe a physical plasma.
    pub fn validate(&self) -> Result<()> {
        ensure_config!(self.radar_wavenumber.is_finite() && self.radar_wavenumber > 0.,
                       "radar wavenumber must be positive, got {}", self.radar_wavenumber);
        ensure_config!(self.magnetic_field.is_finite() && self.magnetic_field >= 0.,
                       "magnetic field must be nonnegative, got {}", self.magnetic_field);
        ensure_config!(self.aspect_angle >= 0. && self.aspect_angle <= PI,
                       "aspect angle must lie in [0, pi], got {}", self.aspect_angle);
        ensure_config!(self.electron_density.is_finite() && self.electron_density > 0.,
                       "electron density must be positive, got {}", self.electron_density);
        self.electron.validate("electron")?;
        self.ion.validate("ion")?;
        Ok(())
    }

    /// One of the two species.
    pub fn species(&self, kind: SpeciesKind) -> &Species {
        match kind {
            SpeciesKind::Electron => &self.electron,
            SpeciesKind::Ion => &self.ion,
        }
    }

    /// The electron Debye length, in m.
    pub fn debye_length(&self) -> f64 {
        (VACUUM_PERMITTIVITY * BOLTZMANN * self.electron.temperature /
         (self.electron_density * ELECTRON_CHARGE * ELECTRON_CHARGE)).sqrt()
    }

    /// The scattering parameter `1 / (k lambda_D)`.
    pub fn alpha(&self) -> f64 {
        1. / (self.radar_wavenumber * self.debye_length())
    }

    /// The orbit geometry seen by one of the species.
    pub fn geometry(&self, kind: SpeciesKind) -> OrbitGeometry {
        OrbitGeometry::new(self.radar_wavenumber, self.aspect_angle,
                           self.species(kind).gyrofrequency(self.magnetic_field))
    }
}


/// The projection of a gyrating particle's orbit onto the wave vector.
///
/// A particle moving through a time `y` is displaced along the field by
/// `v_par y` and across it by a chord of its gyro-circle. The relevant
/// combination is the squared "displacement wavenumber" `p^2(y)`, which the
/// velocity kernels take as their argument.
#[derive(Copy,Clone,Debug,PartialEq)]
pub struct OrbitGeometry {
    /// The wavenumber along the field, in rad/m.
    pub k_parallel: f64,

    /// The wavenumber across the field, in rad/m.
    pub k_perpendicular: f64,

    /// The angular gyrofrequency, in rad/s.
    pub gyrofrequency: f64,
}

impl OrbitGeometry {
    /// The geometry for wavenumber `k` at aspect angle `theta`. Angles `theta`
    /// and `pi - theta` give identical results.
    pub fn new(k: f64, theta: f64, gyrofrequency: f64) -> Self {
        let folded = if theta > 0.5 * PI { PI - theta } else { theta };

        let (k_parallel, k_perpendicular) = if folded <= ANGLE_SNAP {
            (k, 0.)
        } else if (0.5 * PI - folded).abs() <= ANGLE_SNAP {
            (0., k)
        } else {
            (k * folded.cos(), k * folded.sin())
        };

        OrbitGeometry { k_parallel, k_perpendicular, gyrofrequency: gyrofrequency.abs() }
    }

    /// The total wavenumber.
    pub fn wavenumber(&self) -> f64 {
        self.k_parallel.hypot(self.k_perpendicular)
    }

    /// `p^2(y) = k_perp^2 y^2 sinc^2(Omega y / 2) + k_par^2 y^2`, which
    /// equals `2 k_perp^2 (1 - cos Omega y) / Omega^2 + k_par^2 y^2` without
    /// its cancellation at small `Omega y`.
    pub fn p_squared(&self, y: Complex64) -> Complex64 {
        let y2 = y * y;
        let perp = sinc(0.5 * self.gyrofrequency * y);
        y2 * (perp * perp * self.k_perpendicular.powi(2) + self.k_parallel.powi(2))
    }

    fn p_squared_derivative(&self, y: Complex64) -> Complex64 {
        let kpar2 = self.k_parallel.powi(2);
        let kperp2 = self.k_perpendicular.powi(2);

        if self.gyrofrequency == 0. {
            2. * (kpar2 + kperp2) * y
        } else {
            2. * kperp2 / self.gyrofrequency * (self.gyrofrequency * y).sin() + 2. * kpar2 * y
        }
    }

    /// The resonance times `2 pi n / Omega` up to `horizon`, at most `limit`
    /// of them. Empty if there is no perpendicular motion.
    pub fn resonance_times(&self, horizon: f64, limit: usize) -> Vec<f64> {
        if self.k_perpendicular == 0. || self.gyrofrequency == 0. {
            return Vec::new();
        }

        let period = TWO_PI / self.gyrofrequency;
        (1..=limit)
            .map(|n| n as f64 * period)
            .take_while(|&y| y < horizon)
            .collect()
    }

    /// The complex zeros of `p^2(y)` near the resonance times up to
    /// `horizon`, in conjugate pairs.
    ///
    /// Away from perpendicular incidence the zeros sit next to
    /// `Y_n = 2 pi n / Omega` at an imaginary offset of about
    /// `Y_n k_par / k_perp`. At exactly perpendicular incidence they lie on
    /// the real axis, where `p^2` touches zero without changing sign, and are
    /// not reported. At zero aspect angle or without a field there are none.
    /// A zero that cannot be located is an error.
    pub fn displacement_zeros(&self, horizon: f64, limit: usize) -> Result<Vec<Complex64>> {
        let mut zeros = Vec::new();

        if self.k_parallel == 0. {
            return Ok(zeros);
        }

        let ratio = self.k_parallel / self.k_perpendicular;

        for y_n in self.resonance_times(horizon, limit) {
            let root = self.zero_near(Complex64::new(y_n, y_n * ratio))?;
            zeros.push(root);
            zeros.push(root.conj());
        }

        Ok(zeros)
    }

    fn zero_near(&self, guess: Complex64) -> Result<Complex64> {
        self.newton_zero(guess).ok_or_else(|| Error::ContourConstruction(format!(
            "cannot locate the displacement zero near t = {} s", guess)))
    }

    fn newton_zero(&self, guess: Complex64) -> Option<Complex64> {
        let mut y = guess;

        for _ in 0..60 {
            let step = self.p_squared(y) / self.p_squared_derivative(y);

            if !(step.re.is_finite() && step.im.is_finite()) {
                return None;
            }

            y -= step;

            if step.norm() <= 1e-13 * y.norm() {
                return if y.im > 0. { Some(y) } else { None };
            }
        }

        None
    }
}


#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;
    use super::*;
    use crate::errors::Error;

    fn reference() -> PlasmaParameters {
        PlasmaParameters::from_radar_frequency(
            933e6, 5e-5, 0.5, 1e11, Species::electron(2000.), Species::ion(1000., 16.))
    }

    #[test]
    fn wavenumber_from_radar_frequency() {
        assert_approx_eq!(reference().radar_wavenumber, 39.1085, 1e-3);
    }

    #[test]
    fn debye_length_and_alpha() {
        let p = reference();
        // sqrt(eps0 k T / (n e^2)) for 2000 K and 1e11 m^-3
        assert_approx_eq!(p.debye_length(), 9.759344e-3, 1e-8);
        assert_approx_eq!(p.alpha(), 1. / (p.radar_wavenumber * p.debye_length()), 1e-12);
    }

    #[test]
    fn validation() {
        assert_eq!(reference().validate(), Ok(()));

        let mut p = reference();
        p.electron.temperature = -1.;
        assert!(match p.validate() { Err(Error::Configuration(_)) => true, _ => false });

        let mut p = reference();
        p.aspect_angle = 4.;
        assert!(p.validate().is_err());

        let mut p = reference();
        p.ion = p.ion.collision_frequency(-2.);
        assert!(p.validate().is_err());
    }

    #[test]
    fn geometry_is_symmetric_about_perpendicular() {
        let a = OrbitGeometry::new(10., 0.3, 1e6);
        let b = OrbitGeometry::new(10., PI - 0.3, 1e6);
        assert_approx_eq!(a.k_parallel, b.k_parallel, 1e-12);
        assert_approx_eq!(a.k_perpendicular, b.k_perpendicular, 1e-12);
    }

    #[test]
    fn geometry_snaps_special_angles() {
        let g = OrbitGeometry::new(10., 0.5 * PI + 1e-13, 1e6);
        assert_eq!(g.k_parallel, 0.);
        assert_eq!(g.k_perpendicular, 10.);
        let g = OrbitGeometry::new(10., PI, 1e6);
        assert_eq!(g.k_perpendicular, 0.);
    }

    #[test]
    fn p_squared_closed_form() {
        let g = OrbitGeometry::new(3., 0.7, 2.);
        for &t in &[0.3f64, 1.7, 12.] {
            let direct = 2. * g.k_perpendicular.powi(2) * (1. - (2. * t).cos()) / 4. +
                g.k_parallel.powi(2) * t * t;
            assert_approx_eq!(g.p_squared(Complex64::new(t, 0.)).re, direct, 1e-9 * direct.max(1e-9));
        }

        // Without a field the particle moves in a straight line.
        let g = OrbitGeometry::new(3., 0.7, 0.);
        assert_approx_eq!(g.p_squared(Complex64::new(2., 0.)).re, 36., 1e-12);
    }

    #[test]
    fn zeros_are_zeros() {
        let g = OrbitGeometry::new(3., 1.55, 2.);
        let zeros = g.displacement_zeros(20., 100).unwrap();
        assert_eq!(zeros.len(), 12);

        for z in &zeros {
            assert!(g.p_squared(*z).norm() < 1e-10);
        }

        assert!(zeros[0].im > 0.);
        assert_approx_eq!(zeros[1].im, -zeros[0].im, 1e-15);
    }

    #[test]
    fn no_zeros_without_perpendicular_motion() {
        assert!(OrbitGeometry::new(3., 0., 2.).displacement_zeros(20., 100).unwrap().is_empty());
        assert!(OrbitGeometry::new(3., 0.5 * PI, 2.).displacement_zeros(20., 100).unwrap().is_empty());
        assert!(OrbitGeometry::new(3., 1., 0.).displacement_zeros(20., 100).unwrap().is_empty());
    }

    #[test]
    fn lost_zero_is_an_error() {
        // Newton's method never leaves the real axis, where the only zero is
        // the one at the origin.
        let g = OrbitGeometry::new(3., 1.2, 2.);

        match g.zero_near(Complex64::new(PI, 0.)) {
            Err(Error::ContourConstruction(_)) => {},
            other => panic!("expected a contour construction error, got {:?}", other),
        }
    }
}
