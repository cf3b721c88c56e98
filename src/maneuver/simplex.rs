use crate::propagation::vector::Vec3;

const REFLECTION: f64 = 1.0;
const EXPANSION: f64 = 2.0;
const CONTRACTION: f64 = 0.5;
const SHRINK: f64 = 0.5;

#[derive(Debug, Clone, Copy)]
pub struct SimplexOptions {
    /// Edge length of the starting simplex along each axis.
    pub initial_step: f64,
    pub xatol: f64,
    /// Relative to the best value once that exceeds 1.
    pub fatol: f64,
    /// Iteration cap for each run.
    pub max_iterations: usize,
    /// Fresh simplices started from the best point after the first run.
    pub restarts: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct SimplexResult {
    pub x: Vec3,
    pub value: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Nelder-Mead over the box `[-bound, bound]³`. Every trial point is clamped
/// into the box; non-finite objective values rank worst.
pub fn minimize_in_box<F>(mut f: F, x0: Vec3, bound: f64, options: &SimplexOptions) -> SimplexResult
where
    F: FnMut(Vec3) -> f64,
{
    let mut eval = |x: Vec3| {
        let v = f(x);
        if v.is_finite() {
            v
        } else {
            f64::INFINITY
        }
    };

    let mut step = options.initial_step;
    let mut best = run(&mut eval, clamp(x0, bound), bound, step, options);
    let mut iterations = best.iterations;
    let mut converged = best.converged;

    for _ in 0..options.restarts {
        step *= 0.1;
        let next = run(&mut eval, best.x, bound, step, options);
        iterations += next.iterations;
        converged |= next.converged;

        let improvement = best.value - next.value;
        if next.value <= best.value {
            best = SimplexResult {
                iterations,
                ..next
            };
        }
        if next.converged && improvement <= options.fatol {
            break;
        }
    }

    SimplexResult {
        iterations,
        converged,
        ..best
    }
}

fn run<F>(f: &mut F, x0: Vec3, bound: f64, step: f64, options: &SimplexOptions) -> SimplexResult
where
    F: FnMut(Vec3) -> f64,
{
    let mut vertices = [x0; 4];
    for (axis, vertex) in vertices.iter_mut().skip(1).enumerate() {
        vertex[axis] = if x0[axis] + step <= bound {
            x0[axis] + step
        } else {
            x0[axis] - step
        };
    }
    let mut values = vertices.map(&mut *f);

    let mut iterations = 0;
    loop {
        sort(&mut vertices, &mut values);

        if has_converged(&vertices, &values, options) {
            return SimplexResult {
                x: vertices[0],
                value: values[0],
                iterations,
                converged: true,
            };
        }
        if iterations >= options.max_iterations {
            return SimplexResult {
                x: vertices[0],
                value: values[0],
                iterations,
                converged: false,
            };
        }
        iterations += 1;

        let centroid = centroid(&vertices[..3]);
        let worst = vertices[3];

        let reflected = clamp(towards(centroid, worst, -REFLECTION), bound);
        let f_reflected = f(reflected);

        if f_reflected < values[0] {
            let expanded = clamp(towards(centroid, reflected, EXPANSION), bound);
            let f_expanded = f(expanded);
            if f_expanded < f_reflected {
                vertices[3] = expanded;
                values[3] = f_expanded;
            } else {
                vertices[3] = reflected;
                values[3] = f_reflected;
            }
            continue;
        }

        if f_reflected < values[2] {
            vertices[3] = reflected;
            values[3] = f_reflected;
            continue;
        }

        let (contracted, f_contracted, accepted) = if f_reflected < values[3] {
            let x = clamp(towards(centroid, reflected, CONTRACTION), bound);
            let v = f(x);
            (x, v, v <= f_reflected)
        } else {
            let x = clamp(towards(centroid, worst, CONTRACTION), bound);
            let v = f(x);
            (x, v, v < values[3])
        };

        if accepted {
            vertices[3] = contracted;
            values[3] = f_contracted;
        } else {
            for i in 1..4 {
                vertices[i] = towards(vertices[0], vertices[i], SHRINK);
                values[i] = f(vertices[i]);
            }
        }
    }
}

/// `from + t * (to - from)`.
fn towards(from: Vec3, to: Vec3, t: f64) -> Vec3 {
    [
        from[0] + t * (to[0] - from[0]),
        from[1] + t * (to[1] - from[1]),
        from[2] + t * (to[2] - from[2]),
    ]
}

fn centroid(points: &[Vec3]) -> Vec3 {
    let n = points.len() as f64;
    let mut c = [0.0; 3];
    for p in points {
        for axis in 0..3 {
            c[axis] += p[axis] / n;
        }
    }
    c
}

fn clamp(x: Vec3, bound: f64) -> Vec3 {
    x.map(|v| v.clamp(-bound, bound))
}

fn sort(vertices: &mut [Vec3; 4], values: &mut [f64; 4]) {
    let mut order = [0, 1, 2, 3];
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    *vertices = order.map(|i| vertices[i]);
    *values = order.map(|i| values[i]);
}

fn has_converged(vertices: &[Vec3; 4], values: &[f64; 4], options: &SimplexOptions) -> bool {
    let x_spread = vertices[1..]
        .iter()
        .flat_map(|v| (0..3).map(move |axis| (v[axis] - vertices[0][axis]).abs()))
        .fold(0.0, f64::max);
    let f_spread = values[1..]
        .iter()
        .map(|v| (v - values[0]).abs())
        .fold(0.0, f64::max);

    x_spread <= options.xatol && f_spread <= options.fatol * values[0].abs().max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn options() -> SimplexOptions {
        SimplexOptions {
            initial_step: 0.5,
            xatol: 1e-9,
            fatol: 1e-12,
            max_iterations: 1000,
            restarts: 3,
        }
    }

    #[test]
    fn finds_interior_minimum() {
        let target = [0.3, -0.2, 0.55];
        let r = minimize_in_box(
            |x| (0..3).map(|i| (x[i] - target[i]).powi(2)).sum(),
            [0.0; 3],
            1.0,
            &options(),
        );
        assert!(r.converged);
        for axis in 0..3 {
            assert_abs_diff_eq!(r.x[axis], target[axis], epsilon = 1e-6);
        }
    }

    #[test]
    fn stays_inside_box() {
        let r = minimize_in_box(|x| -(x[0] + x[1] + x[2]), [0.0; 3], 1.0, &options());
        for axis in 0..3 {
            assert!(r.x[axis] <= 1.0);
            assert_abs_diff_eq!(r.x[axis], 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn non_finite_values_rank_worst() {
        let r = minimize_in_box(
            |x| if x[0] > 0.0 { f64::NAN } else { (x[0] + 0.4).powi(2) + x[1] * x[1] + x[2] * x[2] },
            [0.0; 3],
            1.0,
            &options(),
        );
        assert_abs_diff_eq!(r.x[0], -0.4, epsilon = 1e-6);
    }

    #[test]
    fn iteration_cap_reported() {
        let opts = SimplexOptions {
            max_iterations: 3,
            restarts: 0,
            ..options()
        };
        let r = minimize_in_box(|x| (x[0] - 0.9).powi(2), [0.0; 3], 1.0, &opts);
        assert!(!r.converged);
        assert!(r.iterations <= 3);
    }
}
