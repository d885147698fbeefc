/// Iteration cap for [`bisect`]. Radius solves start from a bracket of at most `0.21 * pitch` and
/// finish in about 50 halvings.
pub const MAX_BISECTIONS: usize = 200;

/// Finds a root of `f` in `[lo, hi]` by bisection.
///
/// `f(lo)` and `f(hi)` should have opposite signs (or one of them be zero). The search stops once
/// the bracket is narrower than machine epsilon relative to the midpoint. Returns `None` if that
/// has not happened within [`MAX_BISECTIONS`] steps.
pub fn bisect(f: impl Fn(f64) -> f64, lo: f64, hi: f64) -> Option<f64> {
    bisect_with(f, lo, hi, MAX_BISECTIONS)
}

/// Like [`bisect`], with an explicit iteration cap.
pub fn bisect_with(
    f: impl Fn(f64) -> f64,
    mut lo: f64,
    mut hi: f64,
    max_iterations: usize,
) -> Option<f64> {
    const EPSILON: f64 = f64::EPSILON;

    let mut f_lo = f(lo);
    for _ in 0..max_iterations {
        let x = (lo + hi) / 2.0;
        if (lo - hi).abs() <= EPSILON + EPSILON * x.abs() {
            return Some(x);
        }
        let y = f(x);
        if f_lo * y > 0.0 {
            lo = x;
            f_lo = y;
        } else {
            hi = x;
        }
    }
    None
}

/// Mirrors `x` into `[0, k]`, treating the line as tiled by alternating copies of `[0, k]`.
///
/// Non-finite inputs and degenerate extents map to `0.0`.
pub fn reflect(x: f64, k: f64) -> f64 {
    if !x.is_finite() || !(k > 0.0) {
        return 0.0;
    }
    let period = 2.0 * k;
    let mut x = x.abs();
    if x > period {
        x %= period;
    }
    if x <= k {
        x
    } else {
        period - x
    }
}

/// Rotates `(x, y)` by the angle whose `sin_cos()` is given. With `y` pointing down, positive
/// angles turn counter-clockwise on screen.
#[inline]
pub fn rotate((x, y): (f64, f64), (sin, cos): (f64, f64)) -> (f64, f64) {
    (x * cos + y * sin, y * cos - x * sin)
}
