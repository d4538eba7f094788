// Copyright 2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the GPL version 3.

/*! Weighted sums of velocity distributions.

A mixture `f = sum_i w_i f_i` of normalized components has the fluctuation
kernel `sum_i w_i K_f,i`. The effective distribution is weighted by the
inverse squared reference speeds instead, giving

- `1 / v_ref^2 = sum_i w_i / v_ref,i^2`,
- `K_g = sum_i r_i K_g,i` with `r_i = w_i v_ref^2 / v_ref,i^2`.

The `r_i` sum to one, like the `w_i`.

*/

use num_complex::Complex64;

use crate::distribution::{DistributionSpec, KernelPair, MixtureComponent, Singularity,
                          VelocityKernel};
use crate::errors::Result;
use crate::kappa::KappaKernel;
use crate::maxwellian::MaxwellianKernel;
use crate::plasma::{OrbitGeometry, Species};
use crate::shell::ShellKernel;
use crate::tabulated::TabulatedKernel;


/// A kernel that can appear inside a mixture.
#[derive(Clone,Debug)]
pub enum ComponentKernel {
    /// See [`MaxwellianKernel`].
    Maxwellian(MaxwellianKernel),

    /// See [`KappaKernel`].
    Kappa(KappaKernel),

    /// See [`ShellKernel`].
    Shell(ShellKernel),

    /// See [`TabulatedKernel`].
    Tabulated(TabulatedKernel),
}

macro_rules! each_component {
    ($self:expr, $k:ident => $body:expr) => {
        match *$self {
            ComponentKernel::Maxwellian(ref $k) => $body,
            ComponentKernel::Kappa(ref $k) => $body,
            ComponentKernel::Shell(ref $k) => $body,
            ComponentKernel::Tabulated(ref $k) => $body,
        }
    }
}

impl VelocityKernel for ComponentKernel {
    #[inline]
    fn evaluate(&self, s: Complex64) -> KernelPair {
        each_component!(self, k => k.evaluate(s))
    }

    fn envelope(&self, s: f64) -> f64 {
        each_component!(self, k => k.envelope(s))
    }

    fn characteristic_speed(&self) -> f64 {
        each_component!(self, k => k.characteristic_speed())
    }

    fn reference_speed(&self) -> f64 {
        each_component!(self, k => k.reference_speed())
    }

    fn singularities(&self, geometry: &OrbitGeometry, horizon: f64,
                     limit: usize) -> Result<Vec<Singularity>> {
        each_component!(self, k => k.singularities(geometry, horizon, limit))
    }
}


#[derive(Clone,Debug)]
struct Weighted {
    weight: f64,
    response_weight: f64,
    kernel: ComponentKernel,
}


/// A mixture of distributions, flattened and normalized.
#[derive(Clone,Debug)]
pub struct MixtureKernel {
    components: Vec<Weighted>,
    reference_speed: f64,
    characteristic_speed: f64,
}

impl MixtureKernel {
    /// Resolve `components` for particles of `species`. Nested mixtures are
    /// flattened, with outer weights multiplied in and outer temperatures
    /// applied to inner components that do not set their own.
    pub fn new(components: &[MixtureComponent], species: &Species) -> Result<Self> {
        let mut flat = Vec::new();
        flatten(components, 1., None, species, &mut flat)?;

        let total: f64 = flat.iter().map(|c| c.0).sum();
        ensure_config!(total.is_finite() && total > 0., "mixture weights must have a positive sum");

        let inv_vref2: f64 = flat.iter()
            .map(|(w, k)| w / total / k.reference_speed().powi(2))
            .sum();
        let vref2 = 1. / inv_vref2;

        let characteristic_speed = flat.iter()
            .map(|c| c.1.characteristic_speed())
            .fold(f64::INFINITY, f64::min);

        let components = flat.into_iter()
            .map(|(w, kernel)| {
                let weight = w / total;
                let response_weight = weight * vref2 / kernel.reference_speed().powi(2);
                Weighted { weight, response_weight, kernel }
            })
            .collect();

        Ok(MixtureKernel {
            components,
            reference_speed: vref2.sqrt(),
            characteristic_speed,
        })
    }

    /// The number of components after flattening.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// The normalized weight of component `i`.
    pub fn weight(&self, i: usize) -> f64 {
        self.components[i].weight
    }

    /// The normalized weight of component `i` in the response kernel.
    pub fn response_weight(&self, i: usize) -> f64 {
        self.components[i].response_weight
    }
}

fn flatten(components: &[MixtureComponent], scale: f64, temperature: Option<f64>,
           species: &Species, out: &mut Vec<(f64, ComponentKernel)>) -> Result<()> {
    ensure_config!(!components.is_empty(), "a mixture needs at least one component");

    for c in components {
        ensure_config!(c.weight.is_finite() && c.weight > 0.,
                       "mixture weights must be finite and positive, got {}", c.weight);

        let weight = scale * c.weight;
        let temperature = c.temperature.or(temperature);

        if let Some(t) = temperature {
            ensure_config!(t.is_finite() && t > 0.,
                           "component temperature must be positive, got {}", t);
        }

        let v = match temperature {
            Some(t) => Species { temperature: t, ..*species }.thermal_speed(),
            None => species.thermal_speed(),
        };

        let kernel = match c.spec {
            DistributionSpec::Mixture(ref inner) => {
                flatten(inner, weight, temperature, species, out)?;
                continue;
            },
            DistributionSpec::Maxwellian => ComponentKernel::Maxwellian(MaxwellianKernel::new(v)),
            DistributionSpec::Kappa { kappa } => {
                c.spec.validate()?;
                ComponentKernel::Kappa(KappaKernel::new(kappa, v))
            },
            DistributionSpec::GaussianShell { shell_speed } => {
                c.spec.validate()?;
                ComponentKernel::Shell(ShellKernel::new(shell_speed, v))
            },
            DistributionSpec::Tabulated(ref table) =>
                ComponentKernel::Tabulated(TabulatedKernel::new(table)),
        };

        out.push((weight, kernel));
    }

    Ok(())
}

impl VelocityKernel for MixtureKernel {
    fn evaluate(&self, s: Complex64) -> KernelPair {
        let mut fluctuation = Complex64::new(0., 0.);
        let mut response = Complex64::new(0., 0.);

        for c in &self.components {
            let v = c.kernel.evaluate(s);
            fluctuation += v.fluctuation * c.weight;
            response += v.response * c.response_weight;
        }

        KernelPair { fluctuation, response }
    }

    fn envelope(&self, s: f64) -> f64 {
        let (f, g) = self.components.iter().fold((0., 0.), |(f, g), c| {
            let e = c.kernel.envelope(s);
            (f + c.weight * e, g + c.response_weight * e)
        });
        f64::max(f, g).min(1.)
    }

    /// The slowest component sets the time scale.
    fn characteristic_speed(&self) -> f64 {
        self.characteristic_speed
    }

    fn reference_speed(&self) -> f64 {
        self.reference_speed
    }

    fn singularities(&self, geometry: &OrbitGeometry, horizon: f64,
                     limit: usize) -> Result<Vec<Singularity>> {
        let mut all = Vec::new();

        for (i, c) in self.components.iter().enumerate() {
            all.extend(c.kernel.singularities(geometry, horizon, limit)?
                       .into_iter()
                       .map(|s| Singularity { location: s.location, owner: i }));
        }

        Ok(all)
    }
}
