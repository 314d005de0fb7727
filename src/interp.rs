//! One-dimensional gap filling used by [`Band::interpolate`](crate::band::Band::interpolate).
//!
//! A line is a row or column of a band. NaN entries between finite samples are
//! interpolated; NaN runs at either end take the nearest finite value.

/// How NaN gaps are filled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GapMethod {
    /// Nearest finite sample (ties go to the lower index)
    Nearest,
    /// Piecewise linear between bracketing samples
    Linear,
    /// Natural cubic spline through all finite samples
    #[default]
    CubicSpline,
}

impl GapMethod {
    pub fn name(&self) -> &'static str {
        match self {
            GapMethod::Nearest => "nearest",
            GapMethod::Linear => "linear",
            GapMethod::CubicSpline => "cubic spline",
        }
    }
}

/// Fill NaN entries of `values` in place. Returns the number of entries filled.
///
/// Only finite samples serve as knots. Infinite samples are neither knots
/// nor gaps and are left as they are.
pub fn fill_gaps_1d(values: &mut [f64], method: GapMethod) -> usize {
    let knots: Vec<usize> = values
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .map(|(i, _)| i)
        .collect();

    if knots.is_empty() || !values.iter().any(|v| v.is_nan()) {
        return 0;
    }

    let xs: Vec<f64> = knots.iter().map(|&i| i as f64).collect();
    let ys: Vec<f64> = knots.iter().map(|&i| values[i]).collect();

    let spline = match method {
        GapMethod::CubicSpline if knots.len() > 2 => Some(NaturalSpline::fit(&xs, &ys)),
        _ => None,
    };

    let first = knots[0];
    let last = knots[knots.len() - 1];
    let mut filled = 0;

    for i in 0..values.len() {
        if !values[i].is_nan() {
            continue;
        }

        values[i] = if i < first {
            ys[0]
        } else if i > last {
            ys[ys.len() - 1]
        } else {
            // `i` lies strictly between two knots
            let seg = knots.partition_point(|&k| k < i) - 1;
            let x = i as f64;
            match (method, &spline) {
                (GapMethod::Nearest, _) => {
                    if x - xs[seg] <= xs[seg + 1] - x {
                        ys[seg]
                    } else {
                        ys[seg + 1]
                    }
                }
                (GapMethod::CubicSpline, Some(s)) => s.eval_segment(seg, x),
                _ => lerp(xs[seg], ys[seg], xs[seg + 1], ys[seg + 1], x),
            }
        };
        filled += 1;
    }

    filled
}

fn lerp(x0: f64, y0: f64, x1: f64, y1: f64, x: f64) -> f64 {
    let t = (x - x0) / (x1 - x0);
    y0 + t * (y1 - y0)
}

/// Natural cubic spline (zero second derivative at both ends)
struct NaturalSpline<'a> {
    xs: &'a [f64],
    ys: &'a [f64],
    m: Vec<f64>, // second derivatives at the knots
}

impl<'a> NaturalSpline<'a> {
    /// Requires at least 3 strictly increasing knots
    fn fit(xs: &'a [f64], ys: &'a [f64]) -> Self {
        let n = xs.len();
        let mut m = vec![0.0; n];

        // Tridiagonal system for the interior second derivatives,
        // solved with the Thomas algorithm
        let interior = n - 2;
        let mut diag = vec![0.0; interior];
        let mut upper = vec![0.0; interior];
        let mut rhs = vec![0.0; interior];

        for k in 0..interior {
            let i = k + 1;
            let h0 = xs[i] - xs[i - 1];
            let h1 = xs[i + 1] - xs[i];
            diag[k] = 2.0 * (h0 + h1);
            upper[k] = h1;
            rhs[k] = 6.0 * ((ys[i + 1] - ys[i]) / h1 - (ys[i] - ys[i - 1]) / h0);
        }

        for k in 1..interior {
            let lower = xs[k + 1] - xs[k];
            let w = lower / diag[k - 1];
            diag[k] -= w * upper[k - 1];
            rhs[k] -= w * rhs[k - 1];
        }

        for k in (0..interior).rev() {
            let next = if k + 1 < interior { m[k + 2] } else { 0.0 };
            m[k + 1] = (rhs[k] - upper[k] * next) / diag[k];
        }

        Self { xs, ys, m }
    }

    fn eval_segment(&self, seg: usize, x: f64) -> f64 {
        let (x0, x1) = (self.xs[seg], self.xs[seg + 1]);
        let (y0, y1) = (self.ys[seg], self.ys[seg + 1]);
        let (m0, m1) = (self.m[seg], self.m[seg + 1]);
        let h = x1 - x0;
        let a = (x1 - x) / h;
        let b = (x - x0) / h;

        a * y0 + b * y1 + ((a.powi(3) - a) * m0 + (b.powi(3) - b) * m1) * h * h / 6.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_interior_gap() {
        let mut v = [0.0, f64::NAN, f64::NAN, 3.0];
        let n = fill_gaps_1d(&mut v, GapMethod::Linear);
        assert_eq!(n, 2);
        assert!((v[1] - 1.0).abs() < 1e-12);
        assert!((v[2] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_edges_take_nearest_value() {
        let mut v = [f64::NAN, 2.0, 4.0, f64::NAN, f64::NAN];
        fill_gaps_1d(&mut v, GapMethod::CubicSpline);
        assert_eq!(v[0], 2.0);
        assert_eq!(v[3], 4.0);
        assert_eq!(v[4], 4.0);
    }

    #[test]
    fn test_nearest() {
        let mut v = [1.0, f64::NAN, f64::NAN, f64::NAN, 5.0];
        fill_gaps_1d(&mut v, GapMethod::Nearest);
        assert_eq!(v, [1.0, 1.0, 1.0, 5.0, 5.0]);
    }

    #[test]
    fn test_all_nan_untouched() {
        let mut v = [f64::NAN; 4];
        assert_eq!(fill_gaps_1d(&mut v, GapMethod::Linear), 0);
        assert!(v.iter().all(|x| x.is_nan()));
    }

    #[test]
    fn test_spline_reproduces_line() {
        // A natural spline through collinear points is that line
        let mut v = [0.0, 2.0, f64::NAN, 6.0, f64::NAN, 10.0];
        fill_gaps_1d(&mut v, GapMethod::CubicSpline);
        assert!((v[2] - 4.0).abs() < 1e-9);
        assert!((v[4] - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_spline_is_smooth_over_parabola() {
        // Samples of x^2; the spline gap value should sit much closer to 4
        // than the linear estimate of 5
        let mut v = [0.0, 1.0, f64::NAN, 9.0, 16.0, 25.0];
        fill_gaps_1d(&mut v, GapMethod::CubicSpline);
        assert!((v[2] - 4.0).abs() < 0.5);
    }

    #[test]
    fn test_infinite_samples_are_not_gaps() {
        let mut v = [1.0, f64::INFINITY, f64::NAN, 4.0, f64::NEG_INFINITY];
        let n = fill_gaps_1d(&mut v, GapMethod::Linear);
        assert_eq!(n, 1);
        assert_eq!(v[1], f64::INFINITY);
        assert_eq!(v[4], f64::NEG_INFINITY);
        // bracketed by the finite knots at 0 and 3
        assert!((v[2] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_line_without_nan_is_untouched() {
        let mut v = [1.0, f64::INFINITY, 3.0];
        assert_eq!(fill_gaps_1d(&mut v, GapMethod::CubicSpline), 0);
        assert_eq!(v[1], f64::INFINITY);
    }

    #[test]
    fn test_spline_with_two_knots_is_linear() {
        let mut v = [2.0, f64::NAN, 4.0];
        fill_gaps_1d(&mut v, GapMethod::CubicSpline);
        assert!((v[1] - 3.0).abs() < 1e-12);
    }
}
