// Copyright 2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the GPL version 3.

/*! Integration contours in complex time.

The Gordeyev integral runs along the positive real time axis. Kernels that
are not entire functions of `p^2` have branch points at complex times, and
when these come close to the axis the integrand varies too sharply to be
integrated. The contour is then bent around them: each group of nearby
singularities gets a semicircular detour, drawn on the side of the axis away
from them, so that the value of the integral does not change.

A contour is a list of segments, each parametrized over `u` in `[0, 1]`.
Straight runs are split at the cyclotron resonance times, where magnetized
integrands have their sharpest features, and at doubling multiples of the
characteristic time, so that the quadrature sees the peak at the origin
however long the contour is. The contour ends once the integrand envelope
has decayed below the truncation level, which follows the relative
tolerance of the integrals.

*/

use num_complex::Complex64;

use crate::config::NumericalConfig;
use crate::distribution::{Singularity, VelocityKernel};
use crate::errors::{Error, Result};
use crate::plasma::OrbitGeometry;
use crate::PI;

/// Relative slack allowed in the final clearance check.
const CLEARANCE_SLACK: f64 = 1e-9;


/// One piece of a contour.
#[derive(Copy,Clone,Debug,PartialEq)]
pub enum Segment {
    /// A straight run from `start` to `end`.
    Line {
        /// Where the run starts.
        start: Complex64,

        /// Where the run ends.
        end: Complex64,
    },

    /// A circular arc `center + radius exp(i (start_angle + sweep u))`.
    Arc {
        /// The center of the circle, on the real axis.
        center: Complex64,

        /// The radius of the circle.
        radius: f64,

        /// The angle at `u = 0`.
        start_angle: f64,

        /// The angle swept out at `u = 1`; positive is counterclockwise.
        sweep: f64,
    },
}

impl Segment {
    /// The point at parameter `u`.
    #[inline]
    pub fn point(&self, u: f64) -> Complex64 {
        match *self {
            Segment::Line { start, end } => start + (end - start) * u,
            Segment::Arc { center, radius, start_angle, sweep } =>
                center + Complex64::from_polar(radius, start_angle + sweep * u),
        }
    }

    /// The derivative `dy / du` at parameter `u`.
    #[inline]
    pub fn jacobian(&self, u: f64) -> Complex64 {
        match *self {
            Segment::Line { start, end } => end - start,
            Segment::Arc { radius, start_angle, sweep, .. } =>
                Complex64::new(0., radius * sweep) * Complex64::from_polar(1., start_angle + sweep * u),
        }
    }

    /// The length of the segment. `|dy / du|` is constant and equal to it.
    pub fn length(&self) -> f64 {
        match *self {
            Segment::Line { start, end } => (end - start).norm(),
            Segment::Arc { radius, sweep, .. } => radius * sweep.abs(),
        }
    }

    /// The distance from `z` to the nearest point of the segment.
    pub fn distance_to(&self, z: Complex64) -> f64 {
        match *self {
            Segment::Line { start, end } => {
                let d = end - start;
                let len2 = d.norm_sqr();
                let t = if len2 > 0. {
                    ((z - start) * d.conj()).re / len2
                } else {
                    0.
                };
                (z - (start + d * t.max(0.).min(1.))).norm()
            },

            Segment::Arc { center, radius, start_angle, sweep } => {
                let rel = z - center;
                let (lo, hi) = if sweep >= 0. {
                    (start_angle, start_angle + sweep)
                } else {
                    (start_angle + sweep, start_angle)
                };

                let mut angle = rel.arg();
                while angle < lo {
                    angle += 2. * PI;
                }

                if angle <= hi && rel.norm() > 0. {
                    (rel.norm() - radius).abs()
                } else {
                    (z - self.point(0.)).norm().min((z - self.point(1.)).norm())
                }
            },
        }
    }
}


/// A semicircular detour around a group of singularities.
#[derive(Clone,Debug,PartialEq)]
struct Detour {
    center: f64,
    radius: f64,
    /// Whether the arc runs through the upper half plane.
    upper: bool,
    members: Vec<Complex64>,
}

impl Detour {
    fn around(members: Vec<Complex64>, clearance: f64) -> Result<Self> {
        let lo = members.iter().map(|z| z.re).fold(f64::INFINITY, f64::min);
        let hi = members.iter().map(|z| z.re).fold(f64::NEG_INFINITY, f64::max);
        let center = 0.5 * (lo + hi);
        let c = Complex64::new(center, 0.);
        let radius = members.iter().map(|z| (z - c).norm()).fold(0., f64::max) + clearance;

        let above = members.iter().any(|z| z.im > 0.);
        let below = members.iter().any(|z| z.im < 0.);

        if above && below {
            return Err(Error::ContourConstruction(format!(
                "singularities near t = {:e} s lie on both sides of the real axis, closer \
                 than the clearance of {:e} s", center, clearance)));
        }

        Ok(Detour { center, radius, upper: below, members })
    }

    fn start(&self) -> f64 {
        self.center - self.radius
    }

    fn end(&self) -> f64 {
        self.center + self.radius
    }

    fn arcs(&self) -> [Segment; 2] {
        let center = Complex64::new(self.center, 0.);
        let quarter = if self.upper { -0.5 * PI } else { 0.5 * PI };
        let mid_angle = if self.upper { 0.5 * PI } else { 1.5 * PI };

        [
            Segment::Arc { center, radius: self.radius, start_angle: PI, sweep: quarter },
            Segment::Arc { center, radius: self.radius, start_angle: mid_angle, sweep: quarter },
        ]
    }

    /// Whether `z` lies inside the half disk that the detour cuts off.
    fn encloses(&self, z: Complex64) -> bool {
        let on_side = if self.upper { z.im > 0. } else { z.im < 0. };
        on_side && (z - Complex64::new(self.center, 0.)).norm() < self.radius
    }
}


/// The integrand envelope where a contour is cut off.
#[derive(Copy,Clone,Debug,PartialEq)]
pub struct Tail {
    /// The envelope level at the end of the contour.
    pub level: f64,

    /// The local decay rate of the envelope there, in 1/s.
    pub rate: f64,
}

impl Tail {
    /// A tail that contributes nothing.
    pub fn none() -> Self {
        Tail { level: 0., rate: 1. }
    }

    /// A bound on the part of the integral beyond the end of the contour at
    /// angular frequency `omega`, in s. The oscillation of the phase factor
    /// shortens the effective decay length.
    pub fn bound(&self, omega: f64) -> f64 {
        if self.level == 0. {
            0.
        } else if self.rate > 0. {
            self.level / self.rate.hypot(omega)
        } else {
            f64::INFINITY
        }
    }
}


/// A contour for the Gordeyev integral.
#[derive(Clone,Debug,PartialEq)]
pub struct ContourPath {
    segments: Vec<Segment>,
    singularities: Vec<Singularity>,
    end_time: f64,
    tail: Tail,
    clearance: f64,
}

impl ContourPath {
    /// The segments, in order from the origin.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// The singularities the contour was routed around.
    pub fn singularities(&self) -> &[Singularity] {
        &self.singularities
    }

    /// Where the contour ends on the real axis, in s.
    pub fn end_time(&self) -> f64 {
        self.end_time
    }

    /// An estimate of the magnitude of the integral beyond the end of the
    /// contour, in s. Infinite if the integrand does not decay.
    pub fn truncation_bound(&self) -> f64 {
        self.tail.bound(0.)
    }

    /// The envelope where the contour is cut off.
    pub fn tail(&self) -> Tail {
        self.tail
    }

    /// The guaranteed minimum distance to every singularity, in s.
    pub fn clearance(&self) -> f64 {
        self.clearance
    }

    /// The point at global parameter `u` in `[0, n]`, where `n` is the number
    /// of segments.
    pub fn point(&self, u: f64) -> Complex64 {
        let (i, frac) = self.locate(u);
        self.segments[i].point(frac)
    }

    /// The segment index and local parameter of global parameter `u`.
    #[inline]
    pub fn locate(&self, u: f64) -> (usize, f64) {
        let n = self.segments.len();
        let i = (u.max(0.).floor() as usize).min(n - 1);
        (i, u - i as f64)
    }

    /// The smallest distance between the contour and any singularity.
    pub fn min_distance(&self) -> f64 {
        self.singularities.iter()
            .flat_map(|s| self.segments.iter().map(move |seg| seg.distance_to(s.location)))
            .fold(f64::INFINITY, f64::min)
    }

    /// The total length of the contour.
    pub fn length(&self) -> f64 {
        self.segments.iter().map(|s| s.length()).sum()
    }
}


/// Builds contours for one species.
#[derive(Clone,Debug)]
pub struct ContourBuilder {
    geometry: OrbitGeometry,
    collision_frequency: f64,
    clearance: f64,
    truncation_level: f64,
    max_time_factor: f64,
    max_knots: usize,
}

impl ContourBuilder {
    /// A builder for a species with the given orbit geometry, taking its
    /// tolerances from `config`.
    pub fn new(geometry: OrbitGeometry, config: &NumericalConfig) -> Self {
        ContourBuilder {
            geometry,
            collision_frequency: 0.,
            clearance: config.clearance,
            truncation_level: config.truncation_level(),
            max_time_factor: config.max_time_factor,
            max_knots: (config.max_intervals / 4).max(1),
        }
    }

    /// Set the collision frequency, which damps the integrand.
    pub fn collision_frequency(mut self, nu: f64) -> Self {
        self.collision_frequency = nu;
        self
    }

    /// Build the contour for `kernel`.
    pub fn build<K: VelocityKernel>(&self, kernel: &K) -> Result<ContourPath> {
        let v_c = kernel.characteristic_speed();
        let tau = 1. / (self.geometry.wavenumber() * v_c);

        if !(tau.is_finite() && tau > 0.) {
            return Err(Error::ContourConstruction(format!(
                "characteristic time {:e} s is not usable", tau)));
        }

        let (end_time, tail) = self.truncation(|s| kernel.envelope(s), v_c, tau);
        let singularities = kernel.singularities(&self.geometry, 2. * end_time, 2 * self.max_knots)?;
        self.route(singularities, end_time, tail, tau)
    }

    /// The end time of the contour and the envelope there.
    fn truncation<E: Fn(f64) -> f64>(&self, envelope: E, v_c: f64, tau: f64) -> (f64, Tail) {
        let nu = self.collision_frequency;
        let kpar2 = self.geometry.k_parallel.powi(2);
        let decay = |t: f64| (-nu * t).exp() * envelope(kpar2 * t * t);
        let cap = self.max_time_factor * tau;

        let mut hi = tau;

        if decay(hi) <= self.truncation_level {
            // Strong damping; come back down towards the origin.
            for _ in 0..1100 {
                let half = 0.5 * hi;

                if half <= 0. || decay(half) > self.truncation_level {
                    break;
                }

                hi = half;
            }
        }

        while decay(hi) > self.truncation_level && hi < cap {
            hi *= 2.;
        }

        let end = if hi >= cap && decay(cap) > self.truncation_level {
            cap
        } else {
            let mut lo = 0.5 * hi;
            let mut hi = hi.min(cap);

            for _ in 0..60 {
                if hi - lo <= 1e-6 * hi {
                    break;
                }

                let mid = 0.5 * (lo + hi);

                if decay(mid) > self.truncation_level {
                    lo = mid;
                } else {
                    hi = mid;
                }
            }

            hi
        };

        let tail = Tail {
            level: decay(end),
            rate: nu + kpar2 * v_c * v_c * end,
        };
        (end, tail)
    }

    /// Route a contour from the origin to `end_time` around `singularities`
    /// for a species with characteristic time `tau`.
    pub fn route(&self, singularities: Vec<Singularity>, end_time: f64, tail: Tail,
                 tau: f64) -> Result<ContourPath> {
        let clearance = self.clearance * tau;

        for s in &singularities {
            if s.location.norm() < clearance {
                return Err(Error::ContourConstruction(format!(
                    "singularity at {} s is within the clearance of the origin", s.location)));
            }
        }

        let mut near: Vec<Complex64> = singularities.iter()
            .map(|s| s.location)
            .filter(|z| z.im.abs() < clearance && z.re < end_time + clearance)
            .collect();
        near.sort_by(|a, b| a.re.total_cmp(&b.re));

        let mut groups: Vec<Vec<Complex64>> = Vec::new();

        for z in near {
            match groups.last_mut() {
                Some(g) if z.re - g[g.len() - 1].re < 2. * clearance => g.push(z),
                _ => groups.push(vec![z]),
            }
        }

        let mut detours = groups.into_iter()
            .map(|g| Detour::around(g, clearance))
            .collect::<Result<Vec<_>>>()?;

        // Neighboring detours must leave room for the straight run between
        // them; otherwise they become one.
        loop {
            let mut merged = false;
            let mut out: Vec<Detour> = Vec::with_capacity(detours.len());

            for d in detours {
                match out.last_mut() {
                    Some(prev) if d.start() - prev.end() < clearance => {
                        let mut members = std::mem::replace(&mut prev.members, Vec::new());
                        members.extend(d.members);
                        *prev = Detour::around(members, clearance)?;
                        merged = true;
                    },
                    _ => out.push(d),
                }
            }

            detours = out;

            if !merged {
                break;
            }
        }

        let mut end_time = end_time;

        for d in &detours {
            if d.start() <= 0. {
                return Err(Error::ContourConstruction(format!(
                    "detour around t = {:e} s would pass behind the origin", d.center)));
            }

            for s in &singularities {
                if !d.members.contains(&s.location) && d.encloses(s.location) {
                    return Err(Error::ContourConstruction(format!(
                        "detour around t = {:e} s would sweep over the singularity at {} s",
                        d.center, s.location)));
                }
            }

            if d.end() + clearance > end_time {
                end_time = d.end() + clearance;
            }
        }

        let segments = self.segments(&detours, end_time, tau);
        let path = ContourPath {
            segments,
            singularities,
            end_time,
            tail,
            clearance,
        };

        let closest = path.min_distance();

        if closest < clearance * (1. - CLEARANCE_SLACK) {
            return Err(Error::ContourConstruction(format!(
                "contour passes {:e} s from a singularity, inside the clearance of {:e} s",
                closest, clearance)));
        }

        Ok(path)
    }

    fn segments(&self, detours: &[Detour], end_time: f64, tau: f64) -> Vec<Segment> {
        let doublings = (0..64)
            .map(|n| tau * 2f64.powi(n))
            .take_while(|t| *t < end_time);

        let knots: Vec<f64> = self.geometry.resonance_times(end_time, self.max_knots)
            .into_iter()
            .chain(doublings)
            .filter(|t| !detours.iter().any(|d| *t >= d.start() && *t <= d.end()))
            .collect();

        let mut stops: Vec<(f64, Option<&Detour>)> = knots.into_iter().map(|t| (t, None)).collect();
        stops.extend(detours.iter().map(|d| (d.start(), Some(d))));
        stops.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut segments = Vec::with_capacity(stops.len() + detours.len() + 1);
        let mut here = 0.;

        for (t, detour) in stops {
            if t > here {
                segments.push(Segment::Line {
                    start: Complex64::new(here, 0.),
                    end: Complex64::new(t, 0.),
                });
                here = t;
            }

            if let Some(d) = detour {
                segments.extend(d.arcs().iter().cloned());
                here = d.end();
            }
        }

        if end_time > here {
            segments.push(Segment::Line {
                start: Complex64::new(here, 0.),
                end: Complex64::new(end_time, 0.),
            });
        }

        segments
    }
}


#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;
    use super::*;
    use crate::kappa::KappaKernel;
    use crate::maxwellian::MaxwellianKernel;

    fn builder(geometry: OrbitGeometry) -> ContourBuilder {
        // Tight enough that the truncation level is the 1e-12 floor.
        ContourBuilder::new(geometry, &NumericalConfig::default().tolerance(0., 1e-12))
    }

    fn at(re: f64, im: f64) -> Singularity {
        Singularity { location: Complex64::new(re, im), owner: 0 }
    }

    fn is_construction_error(r: Result<ContourPath>) -> bool {
        match r {
            Err(Error::ContourConstruction(_)) => true,
            _ => false,
        }
    }

    fn assert_connected(path: &ContourPath) {
        let segs = path.segments();
        assert_approx_eq!(segs[0].point(0.).norm(), 0., 1e-15);

        for w in segs.windows(2) {
            assert_approx_eq!((w[0].point(1.) - w[1].point(0.)).norm(), 0., 1e-12);
        }

        let last = segs[segs.len() - 1].point(1.);
        assert_approx_eq!(last.re, path.end_time(), 1e-12);
        assert_approx_eq!(last.im, 0., 1e-12);
    }

    #[test]
    fn straight_without_singularities() {
        let b = builder(OrbitGeometry::new(1., 0., 0.));
        let path = b.route(vec![], 10., Tail::none(), 10.).unwrap();
        assert_eq!(path.segments().len(), 1);
        assert_eq!(path.length(), 10.);
        assert_connected(&path);
    }

    #[test]
    fn knots_split_straight_runs() {
        let b = builder(OrbitGeometry::new(1., 1., 2. * PI));
        let path = b.route(vec![], 3.5, Tail::none(), 10.).unwrap();
        assert_eq!(path.segments().len(), 4);
        assert_approx_eq!(path.segments()[1].point(0.).re, 1., 1e-12);
        assert_connected(&path);
    }

    #[test]
    fn detour_avoids_singularity() {
        let b = builder(OrbitGeometry::new(1., 0., 0.));
        let path = b.route(vec![at(5., 0.004)], 10., Tail::none(), 10.).unwrap();
        assert_eq!(path.segments().len(), 4);
        assert!(path.min_distance() >= 0.01 * (1. - 1e-9));
        assert_connected(&path);

        // The detour dips below the axis, away from the singularity.
        assert!(path.point(1.5).im < 0.);
        assert_approx_eq!(path.segments()[1].length(), 0.5 * PI * (0.004 + 0.01), 1e-12);
    }

    #[test]
    fn detour_goes_above_singularities_below() {
        let b = builder(OrbitGeometry::new(1., 0., 0.));
        let path = b.route(vec![at(5., -0.002), at(5.003, -0.001)], 10., Tail::none(), 10.).unwrap();
        assert_eq!(path.segments().len(), 4);
        assert!(path.point(1.5).im > 0.);
        assert!(path.min_distance() >= 0.01 * (1. - 1e-9));
    }

    #[test]
    fn close_detours_merge() {
        let b = builder(OrbitGeometry::new(1., 0., 0.));
        let sing = vec![at(5., 0.001), at(5.025, 0.001), at(5.05, 0.001)];
        let path = b.route(sing, 10., Tail::none(), 10.).unwrap();
        // One detour: line, two arcs, line.
        assert_eq!(path.segments().len(), 4);
        assert!(path.min_distance() >= 0.01 * (1. - 1e-9));
        assert_connected(&path);
    }

    #[test]
    fn distant_detours_stay_separate() {
        let b = builder(OrbitGeometry::new(1., 0., 0.));
        let path = b.route(vec![at(3., 0.001), at(6., -0.001)], 10., Tail::none(), 10.).unwrap();
        assert_eq!(path.segments().len(), 7);
        assert!(path.point(1.5).im < 0.);
        assert!(path.point(4.5).im > 0.);
        assert_connected(&path);
    }

    #[test]
    fn straddling_pair_is_an_error() {
        let b = builder(OrbitGeometry::new(1., 0., 0.));
        assert!(is_construction_error(b.route(vec![at(5., 0.003), at(5., -0.003)], 10., Tail::none(), 10.)));
    }

    #[test]
    fn singularity_at_origin_is_an_error() {
        let b = builder(OrbitGeometry::new(1., 0., 0.));
        assert!(is_construction_error(b.route(vec![at(0.003, 0.004)], 10., Tail::none(), 10.)));
    }

    #[test]
    fn sweeping_over_singularity_is_an_error() {
        // The detour around the first point (radius 0.015 below) would
        // enclose the second.
        let b = builder(OrbitGeometry::new(1., 0., 0.));
        let sing = vec![at(5., 0.005), at(5., -0.012)];
        assert!(is_construction_error(b.route(sing, 10., Tail::none(), 10.)));
    }

    #[test]
    fn detour_near_end_extends_contour() {
        let b = builder(OrbitGeometry::new(1., 0., 0.));
        let path = b.route(vec![at(9.995, 0.001)], 10., Tail::none(), 10.).unwrap();
        assert!(path.end_time() > 10.);
        assert_connected(&path);
    }

    #[test]
    fn maxwellian_truncation() {
        // exp(-T^2 / 2) = 1e-12 at T = 7.43 characteristic times.
        let b = builder(OrbitGeometry::new(2., 0., 0.));
        let path = b.build(&MaxwellianKernel::new(0.5)).unwrap();
        assert_approx_eq!(path.end_time(), (24. * 10f64.ln()).sqrt(), 1e-5);
        assert!(path.truncation_bound() <= 1e-12);
    }

    #[test]
    fn looser_tolerance_truncates_sooner() {
        // exp(-T^2 / 2) = 1e-7 at T = 5.68 characteristic times.
        let geometry = OrbitGeometry::new(2., 0., 0.);
        let config = NumericalConfig::default().tolerance(0., 1e-6);
        let path = ContourBuilder::new(geometry, &config).build(&MaxwellianKernel::new(0.5)).unwrap();
        assert_approx_eq!(path.end_time(), (14. * 10f64.ln()).sqrt(), 1e-5);
        assert!(path.tail().level <= 1e-7);
        assert_approx_eq!(path.tail().level, 1e-7, 1e-10);
        assert!(path.truncation_bound() <= 1e-7 / 5.);
    }

    #[test]
    fn tail_bound_falls_with_frequency() {
        let tail = Tail { level: 1e-6, rate: 2. };
        assert_eq!(tail.bound(0.), 5e-7);
        assert_approx_eq!(tail.bound(1e3), 1e-9, 1e-14);
        assert_eq!(Tail::none().bound(3.), 0.);
        assert!(Tail { level: 1e-6, rate: 0. }.bound(10.).is_infinite());
    }

    #[test]
    fn undamped_perpendicular_hits_cap() {
        let b = builder(OrbitGeometry::new(2., 0.5 * PI, 1.));
        let path = b.build(&MaxwellianKernel::new(0.5)).unwrap();
        assert_approx_eq!(path.end_time(), 5e3, 1e-9);
        assert!(path.truncation_bound().is_infinite());
    }

    #[test]
    fn collisions_truncate_perpendicular() {
        let b = builder(OrbitGeometry::new(2., 0.5 * PI, 1.)).collision_frequency(0.1);
        let path = b.build(&MaxwellianKernel::new(0.5)).unwrap();
        assert_approx_eq!(path.end_time(), 120. * 10f64.ln(), 1e-3);
        assert!(path.truncation_bound() <= 1e-10);
    }

    #[test]
    fn kappa_off_perpendicular_needs_no_detours() {
        let b = builder(OrbitGeometry::new(1., 0.45 * PI, 1.));
        let path = b.build(&KappaKernel::new(3., 1.)).unwrap();
        assert!(!path.singularities().is_empty());
        assert!(path.segments().iter().all(|s| match *s { Segment::Line { .. } => true, _ => false }));
        assert!(path.min_distance() >= path.clearance());
    }

    #[test]
    fn kappa_near_perpendicular_is_an_error() {
        let b = builder(OrbitGeometry::new(1., 0.5 * PI - 1e-5, 1.));
        assert!(is_construction_error(b.build(&KappaKernel::new(3., 1.))));
    }
}
