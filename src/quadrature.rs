// Copyright 2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the GPL version 3.

/*! Gauss-Kronrod quadrature with global adaptive refinement.

This follows the QUADPACK `qag` scheme: each interval is integrated with a
Kronrod rule and its embedded Gauss rule, the difference gives an error
estimate, and the interval with the largest estimate is bisected until the
total error drops below the requested tolerance. Integrands may be real,
complex, or anything else implementing [`Quantity`].

Besides the usual one-shot builder interface, the refinement loop can be
seeded with an arbitrary list of already-evaluated intervals. The Gordeyev
evaluator uses that to start from panels whose kernel values it cached.

*/

use num_complex::Complex64;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::ops::{Add, Mul, Sub};
use thiserror::Error;


/// A value that can be integrated.
pub trait Quantity: Copy + Add<Output = Self> + Sub<Output = Self> + Mul<f64, Output = Self> {
    /// The additive identity.
    fn zero() -> Self;

    /// A nonnegative size used for error control. For compound values this
    /// is the largest size of any component.
    fn magnitude(&self) -> f64;

    /// Whether every component is finite.
    fn is_finite(&self) -> bool;
}

impl Quantity for f64 {
    fn zero() -> Self { 0. }
    fn magnitude(&self) -> f64 { self.abs() }
    fn is_finite(&self) -> bool { f64::is_finite(*self) }
}

impl Quantity for Complex64 {
    fn zero() -> Self { Complex64::new(0., 0.) }
    fn magnitude(&self) -> f64 { self.norm() }
    fn is_finite(&self) -> bool { self.re.is_finite() && self.im.is_finite() }
}


/// The integrand evaluated to something that is not a finite number.
#[derive(Clone,Copy,Debug,Error,PartialEq)]
#[error("integrand is not finite near x = {abscissa:e}")]
pub struct NonFiniteIntegrand {
    /// Where the trouble showed up.
    pub abscissa: f64,
}


/// Which Gauss-Kronrod pair to use on each interval.
#[derive(Clone,Copy,Debug,Eq,Hash,PartialEq)]
pub enum Rule {
    /// The 15-point Kronrod rule with its embedded 7-point Gauss rule.
    GaussKronrod15,

    /// The 21-point Kronrod rule with its embedded 10-point Gauss rule.
    GaussKronrod21,
}

const XGK15: [f64; 8] = [
    0.991455371120812639206854697526329,
    0.949107912342758524526189684047851,
    0.864864423359769072789712788640926,
    0.741531185599394439863864773280788,
    0.586087235467691130294144845693013,
    0.405845151377397166906606412076961,
    0.207784955007898467600689403773245,
    0.000000000000000000000000000000000,
];

const WGK15: [f64; 8] = [
    0.022935322010529224963732008058970,
    0.063092092629978553290700663189204,
    0.104790010322250183839876322541518,
    0.140653259715525918745189590510238,
    0.169004726639267902826583426598550,
    0.190350578064785409913256402421014,
    0.204432940075298892414161999234649,
    0.209482141084727828012999174891714,
];

const WG7: [f64; 4] = [
    0.129484966168869693270611432679082,
    0.279705391489276667901467771423780,
    0.381830050505118944950369775488975,
    0.417959183673469387755102040816327,
];

const XGK21: [f64; 11] = [
    0.995657163025808080735527280689003,
    0.973906528517171720077964012084452,
    0.930157491355708226001207180059508,
    0.865063366688984510732096688423493,
    0.780817726586416897063717578345042,
    0.679409568299024406234327365114874,
    0.562757134668604683339000099272694,
    0.433395394129247190799265943165784,
    0.294392862701460198131126603103866,
    0.148874338981631210884826001129720,
    0.000000000000000000000000000000000,
];

const WGK21: [f64; 11] = [
    0.011694638867371874278064396062192,
    0.032558162307964727478818972459390,
    0.054755896574351996031381300244580,
    0.075039674810919952767043140916190,
    0.093125454583697605535065465083366,
    0.109387158802297641899210590325805,
    0.123491976262065851077208980880808,
    0.134709217311473325928054001771707,
    0.142775938577060080797094273138717,
    0.147739104901338491374841515972068,
    0.149445554002916905664936468389821,
];

const WG10: [f64; 5] = [
    0.066671344308688137593568809893332,
    0.149451349150580593145776339657697,
    0.219086362515982043995534934228163,
    0.269266719309996355091226921569469,
    0.295524224714752870173892994651338,
];

impl Rule {
    /// The Kronrod abscissae on `[0, 1]`, largest first, ending with zero.
    fn abscissae(self) -> &'static [f64] {
        match self {
            Rule::GaussKronrod15 => &XGK15,
            Rule::GaussKronrod21 => &XGK21,
        }
    }

    fn kronrod_weights(self) -> &'static [f64] {
        match self {
            Rule::GaussKronrod15 => &WGK15,
            Rule::GaussKronrod21 => &WGK21,
        }
    }

    fn gauss_weights(self) -> &'static [f64] {
        match self {
            Rule::GaussKronrod15 => &WG7,
            Rule::GaussKronrod21 => &WG10,
        }
    }

    /// The number of function evaluations per interval.
    pub fn points(self) -> usize {
        2 * self.abscissae().len() - 1
    }

    /// The evaluation points for the interval `[a, b]`, in the order that
    /// [`Rule::combine`] expects: pairs of points mirrored about the center,
    /// then the center itself.
    pub fn nodes(self, a: f64, b: f64) -> impl Iterator<Item = f64> {
        let center = 0.5 * (a + b);
        let half = 0.5 * (b - a);
        let xgk = self.abscissae();
        let n = xgk.len();

        xgk[..n - 1].iter()
            .flat_map(move |x| {
                let dx = half * x;
                [center - dx, center + dx]
            })
            .chain(std::iter::once(center))
    }

    /// Combine integrand values taken at [`Rule::nodes`] into an estimate
    /// for an interval of the given half-length.
    pub fn combine<Q: Quantity>(self, half_length: f64, values: &[Q]) -> Estimate<Q> {
        let xgk = self.abscissae();
        let wgk = self.kronrod_weights();
        let wg = self.gauss_weights();
        let n = xgk.len();
        debug_assert_eq!(values.len(), 2 * n - 1);

        let f_center = values[2 * (n - 1)];
        let mut result_kronrod = f_center * wgk[n - 1];
        let mut result_abs = f_center.magnitude() * wgk[n - 1];

        // With an even number of abscissae the center is also a Gauss node.
        let mut result_gauss = if n % 2 == 0 {
            f_center * wg[n / 2 - 1]
        } else {
            Q::zero()
        };

        for j in 0..n - 1 {
            let f1 = values[2 * j];
            let f2 = values[2 * j + 1];
            let sum = f1 + f2;
            result_kronrod = result_kronrod + sum * wgk[j];
            result_abs += wgk[j] * (f1.magnitude() + f2.magnitude());

            if j % 2 == 1 {
                result_gauss = result_gauss + sum * wg[j / 2];
            }
        }

        let mean = result_kronrod * 0.5;
        let mut result_asc = wgk[n - 1] * (f_center - mean).magnitude();

        for j in 0..n - 1 {
            result_asc += wgk[j] * ((values[2 * j] - mean).magnitude() +
                                    (values[2 * j + 1] - mean).magnitude());
        }

        let h = half_length.abs();
        let raw_error = ((result_kronrod - result_gauss) * half_length).magnitude();

        Estimate {
            value: result_kronrod * half_length,
            error: rescale_error(raw_error, result_abs * h, result_asc * h),
        }
    }

    /// Integrate `f` over `[a, b]` with a single application of the rule.
    pub fn evaluate<Q, F>(self, f: &mut F, a: f64, b: f64) -> Estimate<Q>
        where Q: Quantity, F: FnMut(f64) -> Q
    {
        let values: Vec<Q> = self.nodes(a, b).map(|x| f(x)).collect();
        self.combine(0.5 * (b - a), &values)
    }
}


/// QUADPACK's error heuristic: a raw Kronrod-minus-Gauss difference is
/// usually pessimistic for smooth integrands, and never better than the
/// roundoff of the summation.
fn rescale_error(err: f64, result_abs: f64, result_asc: f64) -> f64 {
    let mut err = err;

    if result_asc != 0. && err != 0. {
        let scale = (200. * err / result_asc).powf(1.5);

        err = if scale < 1. {
            result_asc * scale
        } else {
            result_asc
        };
    }

    if result_abs > f64::MIN_POSITIVE / (50. * f64::EPSILON) {
        let min_err = 50. * f64::EPSILON * result_abs;

        if min_err > err {
            err = min_err;
        }
    }

    err
}


/// The result of applying a rule to one interval.
#[derive(Clone,Copy,Debug,PartialEq)]
pub struct Estimate<Q> {
    /// The Kronrod estimate of the integral.
    pub value: Q,

    /// The estimated absolute error.
    pub error: f64,
}


/// An interval of the integration variable together with its estimate.
#[derive(Clone,Copy,Debug)]
pub struct Interval<Q> {
    /// Lower bound.
    pub lo: f64,

    /// Upper bound.
    pub hi: f64,

    /// The integral over the interval.
    pub value: Q,

    /// The estimated absolute error.
    pub error: f64,
}

impl<Q> Interval<Q> {
    /// Bundle an estimate with its bounds.
    pub fn new(lo: f64, hi: f64, estimate: Estimate<Q>) -> Self {
        Interval { lo, hi, value: estimate.value, error: estimate.error }
    }
}

// The heap keeps the interval with the largest error on top.

impl<Q> PartialEq for Interval<Q> {
    fn eq(&self, other: &Self) -> bool {
        self.error.total_cmp(&other.error) == Ordering::Equal
    }
}

impl<Q> Eq for Interval<Q> {}

impl<Q> PartialOrd for Interval<Q> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<Q> Ord for Interval<Q> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.error.total_cmp(&other.error)
    }
}


/// The outcome of an adaptive integration.
#[derive(Clone,Copy,Debug,PartialEq)]
pub struct IntegrationResult<Q> {
    /// The estimated integral.
    pub value: Q,

    /// The estimated absolute error.
    pub abserr: f64,

    /// How many intervals the final partition has.
    pub intervals: usize,

    /// Whether the tolerance was met. If not, the interval limit was reached
    /// or an interval could not be bisected any further.
    pub converged: bool,
}


fn totals<Q: Quantity>(heap: &BinaryHeap<Interval<Q>>) -> (Q, f64) {
    heap.iter().fold((Q::zero(), 0.), |(v, e), iv| (v + iv.value, e + iv.error))
}


/// Refine a partition until the summed error meets
/// `max(epsabs, epsrel * |value|)` or there are `limit` intervals.
///
/// The seed intervals must already carry estimates made with `rule`. The
/// final partition is returned sorted by lower bound.
pub fn refine<Q, F>(
    f: &mut F, rule: Rule, seed: Vec<Interval<Q>>, epsabs: f64, epsrel: f64, limit: usize
) -> Result<(IntegrationResult<Q>, Vec<Interval<Q>>), NonFiniteIntegrand>
    where Q: Quantity, F: FnMut(f64) -> Q
{
    for iv in &seed {
        if !iv.value.is_finite() || !iv.error.is_finite() {
            return Err(NonFiniteIntegrand { abscissa: 0.5 * (iv.lo + iv.hi) });
        }
    }

    let mut heap = BinaryHeap::from(seed);
    let (mut value, mut abserr) = totals(&heap);
    let mut converged = false;

    loop {
        let tol = epsabs.max(epsrel * value.magnitude());

        if abserr <= tol {
            // The running error sum drifts; check against a fresh one.
            let (v, e) = totals(&heap);
            value = v;
            abserr = e;

            if abserr <= epsabs.max(epsrel * value.magnitude()) {
                converged = true;
                break;
            }
        }

        if heap.len() >= limit {
            break;
        }

        let worst = match heap.pop() {
            Some(iv) => iv,
            None => {
                converged = true;
                break;
            }
        };

        let mid = 0.5 * (worst.lo + worst.hi);

        if !(mid > worst.lo && mid < worst.hi) {
            heap.push(worst);
            break;
        }

        let left = Interval::new(worst.lo, mid, rule.evaluate(f, worst.lo, mid));
        let right = Interval::new(mid, worst.hi, rule.evaluate(f, mid, worst.hi));

        for iv in &[left, right] {
            if !iv.value.is_finite() || !iv.error.is_finite() {
                return Err(NonFiniteIntegrand { abscissa: 0.5 * (iv.lo + iv.hi) });
            }
        }

        value = value - worst.value + left.value + right.value;
        abserr = abserr - worst.error + left.error + right.error;
        heap.push(left);
        heap.push(right);
    }

    let (value, abserr) = totals(&heap);
    let mut intervals = heap.into_vec();
    intervals.sort_by(|a, b| a.lo.total_cmp(&b.lo));

    Ok((IntegrationResult { value, abserr, intervals: intervals.len(), converged }, intervals))
}


/// Bounds the number of subintervals an adaptive integration may use.
#[derive(Clone,Copy,Debug)]
pub struct IntegrationWorkspace {
    limit: usize,
}

impl IntegrationWorkspace {
    /// A workspace for integrations with at most `limit` subintervals.
    pub fn new(limit: usize) -> Self {
        IntegrationWorkspace { limit: limit.max(1) }
    }

    /// Set up a global adaptive integration of `f` over `[lower, upper]`.
    pub fn qag<Q, F>(&mut self, f: F, lower: f64, upper: f64) -> IntegrationBuilder<'_, Q, F>
        where Q: Quantity, F: FnMut(f64) -> Q
    {
        IntegrationBuilder {
            workspace: self,
            function: f,
            rule: Rule::GaussKronrod21,
            lower_bound: lower,
            upper_bound: upper,
            epsabs: 0.,
            epsrel: 1e-10,
            _quantity: std::marker::PhantomData,
        }
    }
}


/// Builder for a single adaptive integration.
pub struct IntegrationBuilder<'a, Q, F> {
    workspace: &'a mut IntegrationWorkspace,
    function: F,
    rule: Rule,
    lower_bound: f64,
    upper_bound: f64,
    epsabs: f64,
    epsrel: f64,
    _quantity: std::marker::PhantomData<Q>,
}

impl<'a, Q, F> IntegrationBuilder<'a, Q, F> where Q: Quantity, F: FnMut(f64) -> Q {
    /// Set the absolute and relative error targets.
    pub fn tolerance(mut self, epsabs: f64, epsrel: f64) -> Self {
        self.epsabs = epsabs;
        self.epsrel = epsrel;
        self
    }

    /// Set the rule applied to each subinterval.
    pub fn rule(mut self, rule: Rule) -> Self {
        self.rule = rule;
        self
    }

    /// Run the integration.
    pub fn compute(mut self) -> Result<IntegrationResult<Q>, NonFiniteIntegrand> {
        let a = self.lower_bound;
        let b = self.upper_bound;
        let first = Interval::new(a, b, self.rule.evaluate(&mut self.function, a, b));
        let (result, _) = refine(&mut self.function, self.rule, vec![first],
                                 self.epsabs, self.epsrel, self.workspace.limit)?;
        Ok(result)
    }
}
