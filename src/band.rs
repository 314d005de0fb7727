use crate::interp::{fill_gaps_1d, GapMethod};
use log::{debug, warn};
use ndarray::{s, Array2, ArrayView1, ArrayViewMut1};
use std::ops::{Deref, DerefMut, Range};

/// One layer of raster samples.
///
/// Samples are always `f64` so missing data can be held as NaN. A `Band`
/// dereferences to its `Array2<f64>`, so indexing, assignment and slicing
/// behave like the underlying array. Fill and interpolation return a new
/// band and leave `self` untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct Band(Array2<f64>);

impl Band {
    pub fn new(data: Array2<f64>) -> Self {
        Self(data)
    }

    /// Band of `rows` x `cols` NaN samples
    pub fn empty(rows: usize, cols: usize) -> Self {
        Self(Array2::from_elem((rows, cols), f64::NAN))
    }

    pub fn into_inner(self) -> Array2<f64> {
        self.0
    }

    pub fn shape2(&self) -> (usize, usize) {
        self.0.dim()
    }

    pub fn nan_count(&self) -> usize {
        self.0.iter().filter(|v| v.is_nan()).count()
    }

    /// Min and max over finite samples, `None` if there are none
    pub fn finite_range(&self) -> Option<(f64, f64)> {
        self.0
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// Copy of the sub-grid `rows` x `cols`
    pub fn window(&self, rows: Range<usize>, cols: Range<usize>) -> Band {
        Band(self.0.slice(s![rows, cols]).to_owned())
    }

    /// Copy with every sample matching `pred` replaced by `value`
    pub fn fill_where<F>(&self, pred: F, value: f64) -> Band
    where
        F: Fn(f64) -> bool,
    {
        Band(self.0.mapv(|v| if pred(v) { value } else { v }))
    }

    pub fn fill_nans(&self, value: f64) -> Band {
        self.fill_where(f64::is_nan, value)
    }

    pub fn fill_negs(&self, value: f64) -> Band {
        self.fill_where(|v| v < 0.0, value)
    }

    /// Copy with NaN gaps filled along rows, then along columns
    pub fn interpolate(&self, method: GapMethod) -> Band {
        let mut out = self.0.clone();

        let mut filled = 0;
        for mut row in out.rows_mut() {
            filled += fill_lane(&mut row, method);
        }
        // rows that were entirely NaN are filled from above and below
        for mut col in out.columns_mut() {
            filled += fill_lane(&mut col, method);
        }

        let remaining = out.iter().filter(|v| v.is_nan()).count();
        if remaining > 0 {
            warn!("{} samples left as NaN after {} interpolation", remaining, method.name());
        }
        debug!("Filled {} samples using {} interpolation", filled, method.name());

        Band(out)
    }
}

impl Deref for Band {
    type Target = Array2<f64>;

    fn deref(&self) -> &Array2<f64> {
        &self.0
    }
}

impl DerefMut for Band {
    fn deref_mut(&mut self) -> &mut Array2<f64> {
        &mut self.0
    }
}

fn fill_lane(lane: &mut ArrayViewMut1<f64>, method: GapMethod) -> usize {
    let mut line = lane.to_vec();
    let n = fill_gaps_1d(&mut line, method);
    if n > 0 {
        lane.assign(&ArrayView1::from(&line[..]));
    }
    n
}

impl<T> From<Array2<T>> for Band
where
    T: Copy + Into<f64>,
{
    fn from(data: Array2<T>) -> Self {
        Band(data.mapv(Into::into))
    }
}
