// Copyright 2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the GPL version 3.

/*! Evaluation of Gordeyev integrals along a contour.

The Gordeyev integral of a species is

```text
G(omega) = \int_C exp(-(i omega + nu) y) K(p^2(y)) dy
```

along a contour `C` from the origin. The kernel values do not depend on the
frequency, so a sweep samples the contour once, adaptively at zero
frequency, and keeps the kernel values at every quadrature node. Each
frequency then only needs the phase factors on panels that are short
compared to its oscillation period. Longer panels are split and sampled
afresh, and the combined partition is refined adaptively as usual.

The integrand is integrated over the global contour parameter `u`, which
runs over `[i, i + 1]` on segment `i`.

*/

use num_complex::Complex64;
use std::sync::Arc;

use crate::config::NumericalConfig;
use crate::contour::ContourPath;
use crate::distribution::{KernelPair, VelocityKernel};
use crate::errors::{Error, Result};
use crate::plasma::OrbitGeometry;
use crate::quadrature::{refine, Interval, NonFiniteIntegrand, Quantity, Rule};
use crate::TWO_PI;

/// Cached panels are reused while the phase `omega y` changes by at most
/// this much across them, in radians.
const PHASE_LIMIT: f64 = 1.;

/// Contour times carry about this relative rounding error, which limits how
/// well the phase `omega y` is known at the end of the contour.
const TIME_PRECISION: f64 = 4. * f64::EPSILON;


/// The Gordeyev integrals of one species at one frequency.
#[derive(Clone,Copy,Debug,PartialEq)]
pub struct GordeyevResult {
    /// The frequency, in Hz.
    pub frequency: f64,

    /// The response integral, which enters the susceptibility, in s.
    pub value: Complex64,

    /// The fluctuation integral, which sets the thermal fluctuation level,
    /// in s.
    pub fluctuation: Complex64,

    /// The estimated absolute error of both integrals, including the
    /// truncated tail at this frequency.
    pub abserr: f64,

    /// The error that was aimed for.
    pub tolerance: f64,

    /// The number of panels of the final partition.
    pub intervals: usize,

    /// Whether the error estimate meets the tolerance.
    pub accurate: bool,
}


#[derive(Clone,Debug)]
struct Panel {
    lo: f64,
    hi: f64,
    /// `|dy/du| (hi - lo)`
    extent: f64,
    /// Contour points and the kernel values there, already multiplied by
    /// the collisional damping and the jacobian.
    nodes: Vec<(Complex64, KernelPair)>,
}


/// A contour with kernel values cached at the nodes of an adaptive
/// partition.
#[derive(Clone,Debug)]
pub struct SampledPath {
    geometry: OrbitGeometry,
    path: Arc<ContourPath>,
    collision_frequency: f64,
    rule: Rule,
    epsabs: f64,
    epsrel: f64,
    quadrature_tolerance: (f64, f64),
    max_intervals: usize,
    panels: Vec<Panel>,
}

impl SampledPath {
    /// Sample `kernel` along `path` for a species with the given orbit
    /// geometry and collision frequency.
    pub fn new<K: VelocityKernel>(kernel: &K, geometry: OrbitGeometry, path: Arc<ContourPath>,
                                  collision_frequency: f64, config: &NumericalConfig) -> Result<Self> {
        let rule = config.rule;
        let nu = Complex64::new(collision_frequency, 0.);
        let mut f = integrand(kernel, &geometry, &path, nu);

        let seed = (0..path.segments().len())
            .map(|i| {
                let (lo, hi) = (i as f64, (i + 1) as f64);
                Interval::new(lo, hi, rule.evaluate(&mut f, lo, hi))
            })
            .collect();

        let limit = config.max_intervals.max(path.segments().len());
        let (epsabs, epsrel) = config.quadrature_tolerance();
        let (_, intervals) = refine(&mut f, rule, seed, epsabs, epsrel, limit)
            .map_err(|e| failure(&path, 0., e))?;
        drop(f);

        let panels = intervals.iter()
            .map(|iv| {
                let nodes = rule.nodes(iv.lo, iv.hi)
                    .map(|u| {
                        let (i, frac) = path.locate(u);
                        let seg = &path.segments()[i];
                        let y = seg.point(frac);
                        let w = (-nu * y).exp() * seg.jacobian(frac);
                        (y, kernel.evaluate(geometry.p_squared(y)) * w)
                    })
                    .collect();

                let (i, _) = path.locate(0.5 * (iv.lo + iv.hi));

                Panel {
                    lo: iv.lo,
                    hi: iv.hi,
                    extent: path.segments()[i].length() * (iv.hi - iv.lo),
                    nodes,
                }
            })
            .collect();

        Ok(SampledPath {
            geometry,
            path,
            collision_frequency,
            rule,
            epsabs: config.epsabs,
            epsrel: config.epsrel,
            quadrature_tolerance: (epsabs, epsrel),
            max_intervals: config.max_intervals,
            panels,
        })
    }

    /// The contour.
    pub fn path(&self) -> &ContourPath {
        &self.path
    }

    /// The number of panels sampled at zero frequency.
    pub fn panels(&self) -> usize {
        self.panels.len()
    }

    /// Evaluate the integrals at `frequency` (Hz). `kernel` must be the one
    /// that the path was sampled with. Frequencies so high that the phase
    /// along the contour is lost to rounding are a numerical failure.
    pub fn evaluate<K: VelocityKernel>(&self, kernel: &K, frequency: f64) -> Result<GordeyevResult> {
        let omega = TWO_PI * frequency;

        if !omega.is_finite() || omega.abs() * self.path.end_time() * TIME_PRECISION > PHASE_LIMIT {
            return Err(Error::NumericalFailure {
                frequency,
                detail: format!("the phase over a contour of {:e} s cannot be resolved",
                                self.path.end_time()),
            });
        }

        let coeff = Complex64::new(self.collision_frequency, omega);
        let mut f = integrand(kernel, &self.geometry, &self.path, coeff);

        // How finely each panel must be split to keep the phase in check.
        let cap = self.max_intervals as f64;
        let splits: Vec<usize> = self.panels.iter()
            .map(|p| (omega.abs() * p.extent / PHASE_LIMIT).ceil().max(1.).min(cap) as usize)
            .collect();
        let wanted = splits.iter().fold(0usize, |acc, &n| acc.saturating_add(n));
        let thinning = if wanted > self.max_intervals {
            self.max_intervals as f64 / wanted as f64
        } else {
            1.
        };

        let mut seed = Vec::with_capacity(wanted.min(self.max_intervals) + self.panels.len());
        let mut values = Vec::with_capacity(self.rule.points());

        for (panel, &n) in self.panels.iter().zip(&splits) {
            if n == 1 {
                values.clear();
                values.extend(panel.nodes.iter().map(|&(y, k)| {
                    k * Complex64::new(0., -omega * y.re).exp() * (omega * y.im).exp()
                }));
                let est = self.rule.combine(0.5 * (panel.hi - panel.lo), &values);
                seed.push(Interval::new(panel.lo, panel.hi, est));
                continue;
            }

            let n = ((n as f64 * thinning).floor() as usize).max(1);
            let width = (panel.hi - panel.lo) / n as f64;

            for j in 0..n {
                let lo = panel.lo + j as f64 * width;
                let hi = if j + 1 == n { panel.hi } else { lo + width };
                seed.push(Interval::new(lo, hi, self.rule.evaluate(&mut f, lo, hi)));
            }
        }

        let limit = self.max_intervals.max(seed.len());
        let (epsabs, epsrel) = self.quadrature_tolerance;
        let (result, _) = refine(&mut f, self.rule, seed, epsabs, epsrel, limit)
            .map_err(|e| failure(&self.path, frequency, e))?;

        let tolerance = self.epsabs.max(self.epsrel * result.value.magnitude());
        let abserr = result.abserr + self.path.tail().bound(omega);

        Ok(GordeyevResult {
            frequency,
            value: result.value.response,
            fluctuation: result.value.fluctuation,
            abserr,
            tolerance,
            intervals: result.intervals,
            accurate: result.converged && abserr <= tolerance,
        })
    }
}


/// `exp(-coeff y) K(p^2(y)) dy/du` as a function of the global parameter.
fn integrand<'a, K: VelocityKernel>(
    kernel: &'a K, geometry: &'a OrbitGeometry, path: &'a ContourPath, coeff: Complex64
) -> impl FnMut(f64) -> KernelPair + 'a {
    move |u| {
        let (i, frac) = path.locate(u);
        let seg = &path.segments()[i];
        let y = seg.point(frac);
        kernel.evaluate(geometry.p_squared(y)) * ((-coeff * y).exp() * seg.jacobian(frac))
    }
}


fn failure(path: &ContourPath, frequency: f64, e: NonFiniteIntegrand) -> Error {
    Error::NumericalFailure {
        frequency,
        detail: format!("kernel is not finite near t = {} s", path.point(e.abscissa)),
    }
}
