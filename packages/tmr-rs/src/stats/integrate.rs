//! Numerical integration.

const MAX_DEPTH: usize = 48;

/// Adaptive Simpson quadrature of `f` over `[a, b]` to absolute tolerance `eps`.
pub fn adaptive_simpson<F: Fn(f64) -> f64>(f: F, a: f64, b: f64, eps: f64) -> f64 {
    let fa = f(a);
    let fb = f(b);
    let m = 0.5 * (a + b);
    let fm = f(m);
    let whole = simpson(a, b, fa, fm, fb);
    refine(&f, a, b, fa, fm, fb, whole, eps, MAX_DEPTH)
}

fn simpson(a: f64, b: f64, fa: f64, fm: f64, fb: f64) -> f64 {
    (b - a) / 6.0 * (fa + 4.0 * fm + fb)
}

#[allow(clippy::too_many_arguments)]
fn refine<F: Fn(f64) -> f64>(
    f: &F,
    a: f64,
    b: f64,
    fa: f64,
    fm: f64,
    fb: f64,
    whole: f64,
    eps: f64,
    depth: usize,
) -> f64 {
    let m = 0.5 * (a + b);
    let lm = 0.5 * (a + m);
    let rm = 0.5 * (m + b);
    let flm = f(lm);
    let frm = f(rm);
    let left = simpson(a, m, fa, flm, fm);
    let right = simpson(m, b, fm, frm, fb);
    let delta = left + right - whole;

    if depth == 0 || delta.abs() <= 15.0 * eps {
        return left + right + delta / 15.0;
    }
    refine(f, a, m, fa, flm, fm, left, eps / 2.0, depth - 1)
        + refine(f, m, b, fm, frm, fb, right, eps / 2.0, depth - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polynomial_is_exact() {
        let v = adaptive_simpson(|x| 3.0 * x * x, 0.0, 2.0, 1e-12);
        assert!((v - 8.0).abs() < 1e-12);
    }

    #[test]
    fn test_gaussian_density_integrates_to_one() {
        // Gaussian density over an interval holding nearly all of its mass.
        let s: f64 = 0.3;
        let v = adaptive_simpson(
            |x| (-(x * x) / (2.0 * s * s)).exp() / (s * (2.0 * std::f64::consts::PI).sqrt()),
            -3.0,
            3.5,
            1e-10,
        );
        assert!((v - 1.0).abs() < 1e-7);
    }
}
