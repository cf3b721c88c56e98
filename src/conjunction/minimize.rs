/// Outcome of a bounded scalar minimization.
#[derive(Debug, Clone, Copy)]
pub struct ScalarMinimum {
    pub x: f64,
    pub value: f64,
    pub evaluations: usize,
    pub converged: bool,
}

/// Brent's bounded minimization on `[lower, upper]` (golden section with
/// parabolic interpolation). Derivative free; stops once the bracket is
/// narrower than `xatol` or after `max_evaluations` calls.
pub fn minimize_bounded<F>(
    mut f: F,
    lower: f64,
    upper: f64,
    xatol: f64,
    max_evaluations: usize,
) -> ScalarMinimum
where
    F: FnMut(f64) -> f64,
{
    let sqrt_eps = f64::EPSILON.sqrt();
    let golden_mean = 0.5 * (3.0 - 5.0f64.sqrt());

    let (mut a, mut b) = (lower, upper);
    let mut fulc = a + golden_mean * (b - a);
    let mut nfc = fulc;
    let mut xf = fulc;
    let mut rat: f64 = 0.0;
    let mut e: f64 = 0.0;

    let mut fx = f(xf);
    let mut evaluations = 1;
    let mut ffulc = fx;
    let mut fnfc = fx;

    let mut xm = 0.5 * (a + b);
    let mut tol1 = sqrt_eps * xf.abs() + xatol / 3.0;
    let mut tol2 = 2.0 * tol1;

    while (xf - xm).abs() > tol2 - 0.5 * (b - a) {
        if evaluations >= max_evaluations {
            return ScalarMinimum {
                x: xf,
                value: fx,
                evaluations,
                converged: false,
            };
        }

        let mut golden = true;

        if e.abs() > tol1 {
            golden = false;
            let mut r = (xf - nfc) * (fx - ffulc);
            let mut q = (xf - fulc) * (fx - fnfc);
            let mut p = (xf - fulc) * q - (xf - nfc) * r;
            q = 2.0 * (q - r);
            if q > 0.0 {
                p = -p;
            }
            q = q.abs();
            r = e;
            e = rat;

            if p.abs() < (0.5 * q * r).abs() && p > q * (a - xf) && p < q * (b - xf) {
                rat = p / q;
                let x = xf + rat;
                if (x - a) < tol2 || (b - x) < tol2 {
                    rat = tol1 * sign_or_one(xm - xf);
                }
            } else {
                golden = true;
            }
        }

        if golden {
            e = if xf >= xm { a - xf } else { b - xf };
            rat = golden_mean * e;
        }

        let x = xf + sign_or_one(rat) * rat.abs().max(tol1);
        let fu = f(x);
        evaluations += 1;

        if fu <= fx {
            if x >= xf {
                a = xf;
            } else {
                b = xf;
            }
            fulc = nfc;
            ffulc = fnfc;
            nfc = xf;
            fnfc = fx;
            xf = x;
            fx = fu;
        } else {
            if x < xf {
                a = x;
            } else {
                b = x;
            }
            if fu <= fnfc || nfc == xf {
                fulc = nfc;
                ffulc = fnfc;
                nfc = x;
                fnfc = fu;
            } else if fu <= ffulc || fulc == xf || fulc == nfc {
                fulc = x;
                ffulc = fu;
            }
        }

        xm = 0.5 * (a + b);
        tol1 = sqrt_eps * xf.abs() + xatol / 3.0;
        tol2 = 2.0 * tol1;
    }

    ScalarMinimum {
        x: xf,
        value: fx,
        evaluations,
        converged: true,
    }
}

fn sign_or_one(v: f64) -> f64 {
    if v < 0.0 {
        -1.0
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn finds_parabola_minimum() {
        let m = minimize_bounded(|x| (x - 123.4).powi(2) + 5.0, -600.0, 600.0, 0.01, 500);
        assert!(m.converged);
        assert_abs_diff_eq!(m.x, 123.4, epsilon = 0.01);
        assert_abs_diff_eq!(m.value, 5.0, epsilon = 1e-3);
    }

    #[test]
    fn minimum_at_bound() {
        let m = minimize_bounded(|x| x, -10.0, 10.0, 0.01, 500);
        assert!(m.x < -9.9);
    }

    #[test]
    fn sentinel_regions_are_avoided() {
        let m = minimize_bounded(
            |x| if x > 0.0 { 1e9 } else { (x + 50.0).powi(2) },
            -600.0,
            600.0,
            0.01,
            500,
        );
        assert_abs_diff_eq!(m.x, -50.0, epsilon = 0.05);
    }

    #[test]
    fn evaluation_cap_is_honoured() {
        let mut calls = 0;
        let m = minimize_bounded(
            |x| {
                calls += 1;
                (x - 1.0).powi(2)
            },
            -600.0,
            600.0,
            1e-12,
            5,
        );
        assert!(!m.converged);
        assert!(calls <= 5);
    }
}
