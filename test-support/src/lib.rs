// Copyright 2017-2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the GPL version 3.

//! Shared helpers for the spectrum tests, benches, and demo programs.

#[macro_use] extern crate slog;

use slog::Drain;

/// Create a terminal `slog` logger for use in test programs.
///
/// Messages go through an asynchronous drain that blocks rather than drops
/// when it overflows, so trace output from a long sweep is not lost.
pub fn default_log() -> slog::Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain)
        .overflow_strategy(slog_async::OverflowStrategy::Block)
        .build().fuse();
    slog::Logger::root(drain, o!("program" => "isr-spectrum"))
}


/// Draws random parameter values from a uniform or log-uniform range.
#[derive(Clone,Copy,Debug)]
pub struct Sampler {
    is_log: bool,
    low: f64,
    range: f64
}

impl Sampler {
    /// A sampler uniform in the value itself.
    pub fn uniform(low: f64, high: f64) -> Self {
        let (low, high) = if low > high { (high, low) } else { (low, high) };
        Sampler { is_log: false, low, range: high - low }
    }

    /// A sampler uniform in the logarithm of the value. Both bounds must be
    /// positive.
    pub fn log_uniform(low: f64, high: f64) -> Self {
        let mut s = Sampler::uniform(low.ln(), high.ln());
        s.is_log = true;
        s
    }

    /// Sample a number from the distribution.
    pub fn get(&self) -> f64 {
        let n = self.low + rand::random::<f64>() * self.range;

        if self.is_log {
            n.exp()
        } else {
            n
        }
    }
}


/// The relative difference between two values, using the larger magnitude as
/// the reference. Two zeros are identical.
pub fn relative_difference(a: f64, b: f64) -> f64 {
    let scale = a.abs().max(b.abs());

    if scale == 0. {
        0.
    } else {
        (a - b).abs() / scale
    }
}


/// The trapezoid-rule integral of `y` over the sample points `x`, which must
/// be sorted.
pub fn trapezoid(x: &[f64], y: &[f64]) -> f64 {
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xw, yw)| 0.5 * (xw[1] - xw[0]) * (yw[0] + yw[1]))
        .sum()
}
