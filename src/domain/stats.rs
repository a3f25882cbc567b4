//! Significance tests of net exposure against forward returns.
//!
//! Four independent views of the same paired sample:
//! - Pearson and Spearman correlation with two-sided t-test p-values
//! - OLS of `return = alpha + beta * exposure` with a t-test on beta
//! - directional hit rate with a one-sided exact binomial test against 0.5
//!
//! Each view carries its own result, so a constant series or a sample too
//! short for regression leaves the other views intact. All results are
//! order-independent in the pairs.

use crate::domain::alignment::AlignedObservation;
use crate::domain::error::StatsError;
use crate::domain::special::{binomial_upper_tail, student_t_two_sided};

const NULL_HIT_PROBABILITY: f64 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct Correlation {
    pub r: f64,
    pub p_value: f64,
    pub n: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Regression {
    pub alpha: f64,
    pub beta: f64,
    pub t_stat: f64,
    pub p_value: f64,
    pub r_squared: f64,
    pub n: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Directional {
    pub hits: usize,
    pub n: usize,
    pub hit_rate: f64,
    pub p_value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatsReport {
    /// Number of paired observations.
    pub n: usize,
    pub pearson: Result<Correlation, StatsError>,
    pub spearman: Result<Correlation, StatsError>,
    pub regression: Result<Regression, StatsError>,
    pub directional: Result<Directional, StatsError>,
}

fn check_sample(x: &[f64], y: &[f64], needed: usize) -> Result<(), StatsError> {
    if x.len() != y.len() {
        return Err(StatsError::LengthMismatch {
            left: x.len(),
            right: y.len(),
        });
    }
    if x.len() < needed {
        return Err(StatsError::InsufficientSample {
            needed,
            got: x.len(),
        });
    }
    Ok(())
}

fn check_variance(x: &[f64], y: &[f64]) -> Result<(), StatsError> {
    let constant = |v: &[f64]| v.iter().all(|&a| a == v[0]);
    if constant(x) {
        return Err(StatsError::ZeroVariance { series: "exposure" });
    }
    if constant(y) {
        return Err(StatsError::ZeroVariance { series: "return" });
    }
    Ok(())
}

fn mean(v: &[f64]) -> f64 {
    v.iter().sum::<f64>() / v.len() as f64
}

/// (Sxx, Syy, Sxy) about the means.
fn centered_sums(x: &[f64], y: &[f64]) -> (f64, f64, f64) {
    let (mx, my) = (mean(x), mean(y));
    x.iter()
        .zip(y)
        .fold((0.0, 0.0, 0.0), |(sxx, syy, sxy), (&xi, &yi)| {
            let (dx, dy) = (xi - mx, yi - my);
            (sxx + dx * dx, syy + dy * dy, sxy + dx * dy)
        })
}

fn correlation_p_value(r: f64, n: usize) -> f64 {
    if n <= 2 {
        return 1.0;
    }
    if r.abs() >= 1.0 {
        return 0.0;
    }
    let df = (n - 2) as f64;
    let t = r * (df / (1.0 - r * r)).sqrt();
    student_t_two_sided(t, df)
}

pub fn pearson(x: &[f64], y: &[f64]) -> Result<Correlation, StatsError> {
    check_sample(x, y, 2)?;
    check_variance(x, y)?;
    let (sxx, syy, sxy) = centered_sums(x, y);
    let r = (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0);
    Ok(Correlation {
        r,
        p_value: correlation_p_value(r, x.len()),
        n: x.len(),
    })
}

/// 1-based ranks, ties share their average rank.
fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start;
        while end + 1 < order.len() && values[order[end + 1]] == values[order[start]] {
            end += 1;
        }
        let rank = (start + end) as f64 / 2.0 + 1.0;
        for &i in &order[start..=end] {
            ranks[i] = rank;
        }
        start = end + 1;
    }
    ranks
}

pub fn spearman(x: &[f64], y: &[f64]) -> Result<Correlation, StatsError> {
    check_sample(x, y, 2)?;
    check_variance(x, y)?;
    pearson(&average_ranks(x), &average_ranks(y))
}

/// Ordinary least squares of `y` on `x` with an intercept.
///
/// Needs three points so the residual variance has a degree of freedom.
pub fn ols(x: &[f64], y: &[f64]) -> Result<Regression, StatsError> {
    check_sample(x, y, 3)?;
    check_variance(x, y)?;

    let n = x.len();
    let (sxx, syy, sxy) = centered_sums(x, y);
    let beta = sxy / sxx;
    let alpha = mean(y) - beta * mean(x);

    let ssr: f64 = x
        .iter()
        .zip(y)
        .map(|(&xi, &yi)| (yi - alpha - beta * xi).powi(2))
        .sum();
    let r_squared = (1.0 - ssr / syy).clamp(0.0, 1.0);

    let df = (n - 2) as f64;
    let std_err = (ssr / df / sxx).sqrt();
    let (t_stat, p_value) = if std_err > 0.0 {
        let t = beta / std_err;
        (t, student_t_two_sided(t, df))
    } else {
        // Exact fit: every residual is zero.
        (f64::INFINITY.copysign(beta), 0.0)
    };

    Ok(Regression {
        alpha,
        beta,
        t_stat,
        p_value,
        r_squared,
        n,
    })
}

fn sign(v: f64) -> i8 {
    if v > 0.0 {
        1
    } else if v < 0.0 {
        -1
    } else {
        0
    }
}

/// Share of pairs whose signs agree; zero only agrees with zero.
pub fn directional_accuracy(x: &[f64], y: &[f64]) -> Result<Directional, StatsError> {
    check_sample(x, y, 1)?;
    let hits = x
        .iter()
        .zip(y)
        .filter(|&(&a, &b)| sign(a) == sign(b))
        .count();
    let n = x.len();
    Ok(Directional {
        hits,
        n,
        hit_rate: hits as f64 / n as f64,
        p_value: binomial_upper_tail(hits, n, NULL_HIT_PROBABILITY),
    })
}

/// Run every test over the pairs.
///
/// Fails as a whole only when fewer than two pairs exist; otherwise each
/// view succeeds or fails on its own.
pub fn evaluate(exposure: &[f64], returns: &[f64]) -> Result<StatsReport, StatsError> {
    check_sample(exposure, returns, 2)?;
    let report = StatsReport {
        n: exposure.len(),
        pearson: pearson(exposure, returns),
        spearman: spearman(exposure, returns),
        regression: ols(exposure, returns),
        directional: directional_accuracy(exposure, returns),
    };
    tracing::debug!(
        n = report.n,
        pearson_r = ?report.pearson.as_ref().map(|c| c.r).ok(),
        hit_rate = ?report.directional.as_ref().map(|d| d.hit_rate).ok(),
        "evaluated exposure against forward returns"
    );
    Ok(report)
}

pub fn evaluate_observations(observations: &[AlignedObservation]) -> Result<StatsReport, StatsError> {
    let (exposure, returns): (Vec<f64>, Vec<f64>) = observations
        .iter()
        .map(|o| (o.net_exposure_change, o.forward_return))
        .unzip();
    evaluate(&exposure, &returns)
}
