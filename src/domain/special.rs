//! Special functions backing the significance tests.

use std::f64::consts::PI;

const LANCZOS_G: f64 = 7.0;
const LANCZOS_COEF: [f64; 9] = [
    0.999_999_999_999_809_93,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_13,
    -176.615_029_162_140_59,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_571_6e-6,
    1.505_632_735_149_311_6e-7,
];

const BETACF_MAX_ITER: usize = 300;
const BETACF_EPS: f64 = 1e-15;
const FPMIN: f64 = 1e-300;

/// Natural log of the gamma function (Lanczos approximation).
pub fn ln_gamma(x: f64) -> f64 {
    if x < 0.5 {
        // Reflection: Γ(x)Γ(1-x) = π / sin(πx)
        return (PI / (PI * x).sin()).abs().ln() - ln_gamma(1.0 - x);
    }
    let x = x - 1.0;
    let t = x + LANCZOS_G + 0.5;
    let series = LANCZOS_COEF
        .iter()
        .enumerate()
        .skip(1)
        .fold(LANCZOS_COEF[0], |acc, (i, &c)| acc + c / (x + i as f64));
    0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + series.ln()
}

fn ln_choose(n: usize, k: usize) -> f64 {
    ln_gamma(n as f64 + 1.0) - ln_gamma(k as f64 + 1.0) - ln_gamma((n - k) as f64 + 1.0)
}

/// Continued fraction for the incomplete beta function (modified Lentz).
fn beta_continued_fraction(a: f64, b: f64, x: f64) -> f64 {
    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;
    let guard = |v: f64| if v.abs() < FPMIN { FPMIN } else { v };

    let mut c = 1.0;
    let mut d = 1.0 / guard(1.0 - qab * x / qap);
    let mut h = d;

    for m in 1..=BETACF_MAX_ITER {
        let m = m as f64;
        let m2 = 2.0 * m;

        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 / guard(1.0 + aa * d);
        c = guard(1.0 + aa / c);
        h *= d * c;

        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 / guard(1.0 + aa * d);
        c = guard(1.0 + aa / c);
        let step = d * c;
        h *= step;

        if (step - 1.0).abs() < BETACF_EPS {
            break;
        }
    }
    h
}

/// Regularized incomplete beta function I_x(a, b).
pub fn regularized_incomplete_beta(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    let ln_front =
        ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln();
    let front = ln_front.exp();

    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_continued_fraction(a, b, x) / a
    } else {
        1.0 - front * beta_continued_fraction(b, a, 1.0 - x) / b
    }
}

/// Two-sided p-value of a Student-t statistic with `df` degrees of freedom.
pub fn student_t_two_sided(t: f64, df: f64) -> f64 {
    if t.is_nan() || df <= 0.0 {
        return f64::NAN;
    }
    if t.is_infinite() {
        return 0.0;
    }
    let x = df / (df + t * t);
    regularized_incomplete_beta(df / 2.0, 0.5, x).clamp(0.0, 1.0)
}

/// P(X >= k) for X ~ Binomial(n, p), summed exactly term by term.
pub fn binomial_upper_tail(k: usize, n: usize, p: f64) -> f64 {
    if k == 0 {
        return 1.0;
    }
    if k > n {
        return 0.0;
    }
    if p <= 0.0 {
        return 0.0;
    }
    if p >= 1.0 {
        return 1.0;
    }
    let (ln_p, ln_q) = (p.ln(), (1.0 - p).ln());
    let tail: f64 = (k..=n)
        .map(|i| (ln_choose(n, i) + i as f64 * ln_p + (n - i) as f64 * ln_q).exp())
        .sum();
    tail.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn ln_gamma_known_values() {
        assert_abs_diff_eq!(ln_gamma(1.0), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(ln_gamma(2.0), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(ln_gamma(5.0), 24.0_f64.ln(), epsilon = 1e-12);
        assert_abs_diff_eq!(ln_gamma(0.5), PI.sqrt().ln(), epsilon = 1e-12);
        assert_abs_diff_eq!(ln_gamma(0.25), 3.625_609_908_221_908_f64.ln(), epsilon = 1e-10);
    }

    #[test]
    fn incomplete_beta_closed_forms() {
        // I_x(1, 1) = x, I_x(2, 1) = x^2
        for &x in &[0.1, 0.35, 0.5, 0.9] {
            assert_abs_diff_eq!(regularized_incomplete_beta(1.0, 1.0, x), x, epsilon = 1e-12);
            assert_abs_diff_eq!(
                regularized_incomplete_beta(2.0, 1.0, x),
                x * x,
                epsilon = 1e-12
            );
        }
        assert_eq!(regularized_incomplete_beta(2.0, 3.0, 0.0), 0.0);
        assert_eq!(regularized_incomplete_beta(2.0, 3.0, 1.0), 1.0);
    }

    #[test]
    fn incomplete_beta_symmetry() {
        let (a, b, x) = (2.5, 0.5, 0.3);
        let lhs = regularized_incomplete_beta(a, b, x);
        let rhs = 1.0 - regularized_incomplete_beta(b, a, 1.0 - x);
        assert_abs_diff_eq!(lhs, rhs, epsilon = 1e-12);
    }

    #[test]
    fn student_t_matches_closed_forms() {
        // df = 1 is Cauchy: P(|T| > 1) = 0.5
        assert_abs_diff_eq!(student_t_two_sided(1.0, 1.0), 0.5, epsilon = 1e-10);
        // df = 2: p = 1 - |t| / sqrt(2 + t^2)
        assert_abs_diff_eq!(
            student_t_two_sided(2.0, 2.0),
            1.0 - 2.0 / 6.0_f64.sqrt(),
            epsilon = 1e-10
        );
        assert_abs_diff_eq!(
            student_t_two_sided(-2.0, 2.0),
            1.0 - 2.0 / 6.0_f64.sqrt(),
            epsilon = 1e-10
        );
        // df = 3: p = 1 - (2/pi)(atan(a) + a / (1 + a^2)), a = t / sqrt(3)
        let t = 2.121_320_343_559_643;
        let a = t / 3.0_f64.sqrt();
        let expected = 1.0 - (2.0 / PI) * (a.atan() + a / (1.0 + a * a));
        assert_abs_diff_eq!(student_t_two_sided(t, 3.0), expected, epsilon = 1e-10);
    }

    #[test]
    fn student_t_edges() {
        assert_abs_diff_eq!(student_t_two_sided(0.0, 5.0), 1.0, epsilon = 1e-12);
        assert_eq!(student_t_two_sided(f64::INFINITY, 5.0), 0.0);
        assert!(student_t_two_sided(1.0, 0.0).is_nan());
    }

    #[test]
    fn binomial_tail_exact_values() {
        assert_abs_diff_eq!(binomial_upper_tail(4, 4, 0.5), 0.0625, epsilon = 1e-12);
        assert_abs_diff_eq!(binomial_upper_tail(3, 4, 0.5), 0.3125, epsilon = 1e-12);
        assert_abs_diff_eq!(
            binomial_upper_tail(8, 10, 0.5),
            56.0 / 1024.0,
            epsilon = 1e-12
        );
        assert_eq!(binomial_upper_tail(0, 7, 0.5), 1.0);
        assert_eq!(binomial_upper_tail(8, 7, 0.5), 0.0);
    }
}
