// Copyright 2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the GPL version 3.

/*! Velocity distributions and their Gordeyev kernels.

For an isotropic velocity distribution `f(v)`, normalized so that
`4 pi \int v^2 f dv = 1`, the Gordeyev integrand involves two
characteristic functions of the squared displacement wavenumber `s = p^2`:

- the *fluctuation* kernel `K_f(p) = 4 pi \int v^2 f(v) sinc(p v) dv`, the
  characteristic function of the particle displacement, which sets the
  thermal fluctuation level;
- the *response* kernel `K_g(p) = \int f(v) cos(p v) dv / \int f(v) dv`, the
  characteristic function of the effective distribution
  `g = -(v_ref^2 / v) f'(v)`, which sets the susceptibility.

Both are one at `s = 0`. The *reference speed*
`v_ref^2 = 1 / (4 pi \int f dv)` normalizes `g` and plays the role of the
thermal speed in the Debye length. For a Maxwellian the two kernels coincide
and `v_ref` is the thermal speed.

A [`DistributionSpec`] describes a distribution in terms of plain values.
Resolving it against a [`Species`] yields a [`ResolvedKernel`], a closed enum
of concrete kernels. Hot loops are written against the [`VelocityKernel`]
trait and reached through [`ResolvedKernel::visit`], so that each variant
gets its own monomorphized copy.

*/

use num_complex::Complex64;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::ops::{Add, Mul, Sub};

use crate::errors::Result;
use crate::kappa::KappaKernel;
use crate::maxwellian::MaxwellianKernel;
use crate::mixture::MixtureKernel;
use crate::plasma::{OrbitGeometry, Species};
use crate::quadrature::Quantity;
use crate::shell::ShellKernel;
use crate::tabulated::{TabulatedDistribution, TabulatedKernel};


/// The fluctuation and response kernels at one point, or any quantity that
/// is linear in them.
#[derive(Copy,Clone,Debug,PartialEq)]
pub struct KernelPair {
    /// The characteristic function of the distribution itself.
    pub fluctuation: Complex64,

    /// The characteristic function of the effective distribution.
    pub response: Complex64,
}

impl KernelPair {
    /// The same value for both kernels.
    pub fn both(value: Complex64) -> Self {
        KernelPair { fluctuation: value, response: value }
    }
}

impl Add for KernelPair {
    type Output = KernelPair;

    fn add(self, other: KernelPair) -> KernelPair {
        KernelPair {
            fluctuation: self.fluctuation + other.fluctuation,
            response: self.response + other.response,
        }
    }
}

impl Sub for KernelPair {
    type Output = KernelPair;

    fn sub(self, other: KernelPair) -> KernelPair {
        KernelPair {
            fluctuation: self.fluctuation - other.fluctuation,
            response: self.response - other.response,
        }
    }
}

impl Mul<f64> for KernelPair {
    type Output = KernelPair;

    fn mul(self, w: f64) -> KernelPair {
        KernelPair { fluctuation: self.fluctuation * w, response: self.response * w }
    }
}

impl Mul<Complex64> for KernelPair {
    type Output = KernelPair;

    fn mul(self, w: Complex64) -> KernelPair {
        KernelPair { fluctuation: self.fluctuation * w, response: self.response * w }
    }
}

impl Quantity for KernelPair {
    fn zero() -> Self {
        KernelPair::both(Complex64::new(0., 0.))
    }

    fn magnitude(&self) -> f64 {
        self.fluctuation.norm().max(self.response.norm())
    }

    fn is_finite(&self) -> bool {
        Quantity::is_finite(&self.fluctuation) && Quantity::is_finite(&self.response)
    }
}


/// A point in complex time where a kernel stops being analytic.
#[derive(Copy,Clone,Debug,PartialEq)]
pub struct Singularity {
    /// The location, in seconds.
    pub location: Complex64,

    /// Which mixture component the singularity comes from, or zero for a
    /// plain distribution.
    pub owner: usize,
}


/// A velocity distribution that can be used inside a Gordeyev integral.
pub trait VelocityKernel: Sync {
    /// The fluctuation and response kernels at squared displacement
    /// wavenumber `s = p^2`.
    fn evaluate(&self, s: Complex64) -> KernelPair;

    /// An upper bound on the magnitude of both kernels at real `s >= 0`.
    /// It must not increase with `s`.
    fn envelope(&self, s: f64) -> f64;

    /// The speed `v_c` that sets the natural time scale `1 / (k v_c)`.
    fn characteristic_speed(&self) -> f64;

    /// The speed `v_ref` that normalizes the effective distribution.
    fn reference_speed(&self) -> f64;

    /// The non-analytic points of `t -> K(p^2(t))` in complex time with real
    /// part up to `horizon`, at most `limit` of them. Kernels that are
    /// entire functions of `s` have none.
    fn singularities(&self, _geometry: &OrbitGeometry, _horizon: f64,
                     _limit: usize) -> Result<Vec<Singularity>> {
        Ok(Vec::new())
    }
}


/// Something that wants to run generic code against a concrete kernel.
pub trait KernelVisitor {
    /// What the visit produces.
    type Output;

    /// Called once with the concrete kernel.
    fn visit<K: VelocityKernel>(self, kernel: &K) -> Self::Output;
}


/// One weighted constituent of a mixture distribution.
#[derive(Clone,Debug,PartialEq)]
pub struct MixtureComponent {
    /// The relative weight. Weights are normalized to sum to one.
    pub weight: f64,

    /// The component's shape.
    pub spec: DistributionSpec,

    /// A temperature that replaces the species temperature for this
    /// component, in K.
    pub temperature: Option<f64>,
}

impl MixtureComponent {
    /// A component at the species temperature.
    pub fn new(weight: f64, spec: DistributionSpec) -> Self {
        MixtureComponent { weight, spec, temperature: None }
    }

    /// Give this component its own temperature.
    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }
}


/// A description of a velocity distribution.
#[derive(Clone,Debug,PartialEq)]
pub enum DistributionSpec {
    /// A Maxwellian at the species temperature.
    Maxwellian,

    /// A kappa distribution with the same mean energy as the Maxwellian at
    /// the species temperature.
    Kappa {
        /// The kappa index, which must exceed 3/2.
        kappa: f64,
    },

    /// A Gaussian shell of radius `shell_speed` (m/s) whose width is the
    /// species thermal speed.
    GaussianShell {
        /// The shell radius, in m/s.
        shell_speed: f64,
    },

    /// A distribution given by samples.
    Tabulated(TabulatedDistribution),

    /// A weighted sum of other distributions.
    Mixture(Vec<MixtureComponent>),
}

impl DistributionSpec {
    /// A kappa distribution.
    pub fn kappa(kappa: f64) -> Self {
        DistributionSpec::Kappa { kappa }
    }

    /// A Gaussian shell distribution.
    pub fn shell(shell_speed: f64) -> Self {
        DistributionSpec::GaussianShell { shell_speed }
    }

    /// A mixture distribution.
    pub fn mixture(components: Vec<MixtureComponent>) -> Self {
        DistributionSpec::Mixture(components)
    }

    /// Check that the shape parameters lie inside their valid domain.
    pub fn validate(&self) -> Result<()> {
        match *self {
            DistributionSpec::Maxwellian => Ok(()),

            DistributionSpec::Kappa { kappa } => {
                ensure_config!(kappa.is_finite() && kappa > 1.5,
                               "kappa index must be finite and exceed 3/2, got {}", kappa);
                Ok(())
            },

            DistributionSpec::GaussianShell { shell_speed } => {
                ensure_config!(shell_speed.is_finite() && shell_speed >= 0.,
                               "shell speed must be finite and nonnegative, got {}", shell_speed);
                Ok(())
            },

            // Samples are checked when the table is built.
            DistributionSpec::Tabulated(_) => Ok(()),

            DistributionSpec::Mixture(ref components) => {
                ensure_config!(!components.is_empty(), "a mixture needs at least one component");

                for c in components {
                    ensure_config!(c.weight.is_finite() && c.weight > 0.,
                                   "mixture weights must be finite and positive, got {}", c.weight);

                    if let Some(t) = c.temperature {
                        ensure_config!(t.is_finite() && t > 0.,
                                       "component temperature must be positive, got {}", t);
                    }

                    c.spec.validate()?;
                }

                Ok(())
            },
        }
    }

    /// Build the concrete kernel for particles of the given species.
    pub fn resolve(&self, species: &Species) -> Result<ResolvedKernel> {
        self.validate()?;
        let v = species.thermal_speed();

        Ok(match *self {
            DistributionSpec::Maxwellian => ResolvedKernel::Maxwellian(MaxwellianKernel::new(v)),
            DistributionSpec::Kappa { kappa } => ResolvedKernel::Kappa(KappaKernel::new(kappa, v)),
            DistributionSpec::GaussianShell { shell_speed } =>
                ResolvedKernel::Shell(ShellKernel::new(shell_speed, v)),
            DistributionSpec::Tabulated(ref table) =>
                ResolvedKernel::Tabulated(TabulatedKernel::new(table)),
            DistributionSpec::Mixture(ref components) =>
                ResolvedKernel::Mixture(MixtureKernel::new(components, species)?),
        })
    }

    /// A hash of the complete specification, for use in cache keys.
    pub fn fingerprint(&self) -> u64 {
        let mut h = DefaultHasher::new();
        self.hash_into(&mut h);
        h.finish()
    }

    fn hash_into<H: Hasher>(&self, h: &mut H) {
        match *self {
            DistributionSpec::Maxwellian => 0u8.hash(h),

            DistributionSpec::Kappa { kappa } => {
                1u8.hash(h);
                kappa.to_bits().hash(h);
            },

            DistributionSpec::GaussianShell { shell_speed } => {
                2u8.hash(h);
                shell_speed.to_bits().hash(h);
            },

            DistributionSpec::Tabulated(ref table) => {
                3u8.hash(h);

                for (v, f) in table.speeds().iter().zip(table.values()) {
                    v.to_bits().hash(h);
                    f.to_bits().hash(h);
                }
            },

            DistributionSpec::Mixture(ref components) => {
                4u8.hash(h);
                components.len().hash(h);

                for c in components {
                    c.weight.to_bits().hash(h);
                    c.temperature.map(f64::to_bits).hash(h);
                    c.spec.hash_into(h);
                }
            },
        }
    }
}


/// A distribution bound to a species, ready for evaluation.
#[derive(Clone,Debug)]
pub enum ResolvedKernel {
    /// See [`MaxwellianKernel`].
    Maxwellian(MaxwellianKernel),

    /// See [`KappaKernel`].
    Kappa(KappaKernel),

    /// See [`ShellKernel`].
    Shell(ShellKernel),

    /// See [`TabulatedKernel`].
    Tabulated(TabulatedKernel),

    /// See [`MixtureKernel`].
    Mixture(MixtureKernel),
}

impl ResolvedKernel {
    /// Run `visitor` against the concrete kernel.
    pub fn visit<V: KernelVisitor>(&self, visitor: V) -> V::Output {
        match *self {
            ResolvedKernel::Maxwellian(ref k) => visitor.visit(k),
            ResolvedKernel::Kappa(ref k) => visitor.visit(k),
            ResolvedKernel::Shell(ref k) => visitor.visit(k),
            ResolvedKernel::Tabulated(ref k) => visitor.visit(k),
            ResolvedKernel::Mixture(ref k) => visitor.visit(k),
        }
    }

    /// A short name for log messages.
    pub fn name(&self) -> &'static str {
        match *self {
            ResolvedKernel::Maxwellian(_) => "maxwellian",
            ResolvedKernel::Kappa(_) => "kappa",
            ResolvedKernel::Shell(_) => "shell",
            ResolvedKernel::Tabulated(_) => "tabulated",
            ResolvedKernel::Mixture(_) => "mixture",
        }
    }
}

/// Read-only queries on a resolved kernel.
///
/// These dispatch on every call. They are meant for setup work such as
/// contour construction; hot loops should go through
/// [`ResolvedKernel::visit`].
struct Query<F>(F);

impl<T, F> KernelVisitor for Query<F> where F: FnOnce(&dyn VelocityKernel) -> T {
    type Output = T;

    fn visit<K: VelocityKernel>(self, kernel: &K) -> T {
        let kernel: &dyn VelocityKernel = kernel;
        (self.0)(kernel)
    }
}

impl VelocityKernel for ResolvedKernel {
    fn evaluate(&self, s: Complex64) -> KernelPair {
        self.visit(Query(|k: &dyn VelocityKernel| k.evaluate(s)))
    }

    fn envelope(&self, s: f64) -> f64 {
        self.visit(Query(|k: &dyn VelocityKernel| k.envelope(s)))
    }

    fn characteristic_speed(&self) -> f64 {
        self.visit(Query(|k: &dyn VelocityKernel| k.characteristic_speed()))
    }

    fn reference_speed(&self) -> f64 {
        self.visit(Query(|k: &dyn VelocityKernel| k.reference_speed()))
    }

    fn singularities(&self, geometry: &OrbitGeometry, horizon: f64,
                     limit: usize) -> Result<Vec<Singularity>> {
        self.visit(Query(|k: &dyn VelocityKernel| k.singularities(geometry, horizon, limit)))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;

    fn is_config_error(r: Result<ResolvedKernel>) -> bool {
        match r {
            Err(Error::Configuration(_)) => true,
            _ => false,
        }
    }

    #[test]
    fn kappa_domain() {
        let e = Species::electron(1000.);
        assert!(is_config_error(DistributionSpec::kappa(1.0).resolve(&e)));
        assert!(is_config_error(DistributionSpec::kappa(1.5).resolve(&e)));
        assert!(is_config_error(DistributionSpec::kappa(f64::INFINITY).resolve(&e)));
        assert!(DistributionSpec::kappa(1.6).resolve(&e).is_ok());
    }

    #[test]
    fn mixture_domain() {
        let e = Species::electron(1000.);
        assert!(is_config_error(DistributionSpec::mixture(vec![]).resolve(&e)));

        let bad_weight = DistributionSpec::mixture(vec![
            MixtureComponent::new(-1., DistributionSpec::Maxwellian),
        ]);
        assert!(is_config_error(bad_weight.resolve(&e)));

        let bad_inner = DistributionSpec::mixture(vec![
            MixtureComponent::new(1., DistributionSpec::Maxwellian),
            MixtureComponent::new(1., DistributionSpec::kappa(0.5)),
        ]);
        assert!(is_config_error(bad_inner.resolve(&e)));

        let bad_temp = DistributionSpec::mixture(vec![
            MixtureComponent::new(1., DistributionSpec::Maxwellian).temperature(0.),
        ]);
        assert!(is_config_error(bad_temp.resolve(&e)));
    }

    #[test]
    fn shell_domain() {
        let e = Species::electron(1000.);
        assert!(is_config_error(DistributionSpec::shell(-1.).resolve(&e)));
        assert!(DistributionSpec::shell(0.).resolve(&e).is_ok());
    }

    #[test]
    fn fingerprints_distinguish_parameters() {
        let a = DistributionSpec::kappa(3.).fingerprint();
        let b = DistributionSpec::kappa(3.).fingerprint();
        let c = DistributionSpec::kappa(4.).fingerprint();
        let d = DistributionSpec::shell(3.).fingerprint();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn dispatch_agrees_with_concrete_kernel() {
        let e = Species::electron(1500.);
        let resolved = DistributionSpec::kappa(4.).resolve(&e).unwrap();
        let concrete = KappaKernel::new(4., e.thermal_speed());
        let s = Complex64::new(2., 0.) / concrete.characteristic_speed().powi(2);
        assert_eq!(resolved.evaluate(s), concrete.evaluate(s));
        assert_eq!(resolved.name(), "kappa");
    }
}
