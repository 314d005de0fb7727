use crate::band::Band;
use crate::error::{ImageryError, Result};
use ndarray::{Array3, Axis};
use std::fmt;
use std::ops::{Bound, Index, IndexMut, RangeBounds};

/// Key of a band within [`Bands`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BandLabel {
    Name(String),
    Index(i64),
}

impl fmt::Display for BandLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BandLabel::Name(name) => f.write_str(name),
            BandLabel::Index(i) => write!(f, "{}", i),
        }
    }
}

impl From<&str> for BandLabel {
    fn from(s: &str) -> Self {
        BandLabel::Name(s.to_string())
    }
}

impl From<String> for BandLabel {
    fn from(s: String) -> Self {
        BandLabel::Name(s)
    }
}

impl From<i64> for BandLabel {
    fn from(i: i64) -> Self {
        BandLabel::Index(i)
    }
}

impl From<i32> for BandLabel {
    fn from(i: i32) -> Self {
        BandLabel::Index(i as i64)
    }
}

impl From<usize> for BandLabel {
    fn from(i: usize) -> Self {
        BandLabel::Index(i as i64)
    }
}

/// Ordered label -> band mapping.
///
/// Bands are looked up by label with [`get`](Bands::get) or by insertion
/// position with [`nth`](Bands::nth) and the slicing helpers. Integer labels
/// are labels, not positions: `get(&2.into())` finds the band labelled `2`,
/// `nth(2)` finds the third band inserted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bands {
    entries: Vec<(BandLabel, Band)>,
}

impl Bands {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert or replace. A replaced band keeps its original position.
    pub fn insert(&mut self, label: impl Into<BandLabel>, band: impl Into<Band>) -> Option<Band> {
        let label = label.into();
        let band = band.into();
        match self.position(&label) {
            Some(i) => Some(std::mem::replace(&mut self.entries[i].1, band)),
            None => {
                self.entries.push((label, band));
                None
            }
        }
    }

    pub fn position(&self, label: &BandLabel) -> Option<usize> {
        self.entries.iter().position(|(l, _)| l == label)
    }

    pub fn contains(&self, label: &BandLabel) -> bool {
        self.position(label).is_some()
    }

    pub fn get(&self, label: &BandLabel) -> Option<&Band> {
        self.entries.iter().find(|(l, _)| l == label).map(|(_, b)| b)
    }

    pub fn get_mut(&mut self, label: &BandLabel) -> Option<&mut Band> {
        self.entries
            .iter_mut()
            .find(|(l, _)| l == label)
            .map(|(_, b)| b)
    }

    /// Label lookup that reports the missing label
    pub fn require(&self, label: &BandLabel) -> Result<&Band> {
        self.get(label)
            .ok_or_else(|| ImageryError::BandNotFound(label.to_string()))
    }

    /// Band at insertion position `i`
    pub fn nth(&self, i: usize) -> Option<&Band> {
        self.entries.get(i).map(|(_, b)| b)
    }

    pub fn nth_mut(&mut self, i: usize) -> Option<&mut Band> {
        self.entries.get_mut(i).map(|(_, b)| b)
    }

    /// Bands at the positions in `range`; the end is clipped to `len()`
    pub fn slice<R: RangeBounds<usize>>(&self, range: R) -> Vec<&Band> {
        self.slice_step(range, 1)
    }

    /// Every `step`-th band in `range`; the end is clipped to `len()`
    pub fn slice_step<R: RangeBounds<usize>>(&self, range: R, step: usize) -> Vec<&Band> {
        let (start, end) = self.clip(range);
        self.entries[start..end]
            .iter()
            .step_by(step.max(1))
            .map(|(_, b)| b)
            .collect()
    }

    /// Bands in `range` stacked into a `(n, rows, cols)` array
    pub fn stack<R: RangeBounds<usize>>(&self, range: R) -> Result<Array3<f64>> {
        let selected = self.slice(range);
        if selected.is_empty() {
            return Err(ImageryError::NoBands);
        }
        let views: Vec<_> = selected.iter().map(|b| b.view()).collect();
        ndarray::stack(Axis(0), &views).map_err(|_| {
            ImageryError::InconsistentBandDims(selected.iter().map(|b| b.shape2()).collect())
        })
    }

    pub fn labels(&self) -> impl Iterator<Item = &BandLabel> {
        self.entries.iter().map(|(l, _)| l)
    }

    pub fn values(&self) -> impl Iterator<Item = &Band> {
        self.entries.iter().map(|(_, b)| b)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BandLabel, &Band)> {
        self.entries.iter().map(|(l, b)| (l, b))
    }

    /// Common `(rows, cols)` of all bands, `None` when empty
    pub fn shape(&self) -> Result<Option<(usize, usize)>> {
        let mut dims: Vec<(usize, usize)> = Vec::new();
        for band in self.values() {
            let d = band.shape2();
            if !dims.contains(&d) {
                dims.push(d);
            }
        }
        match dims.len() {
            0 => Ok(None),
            1 => Ok(Some(dims[0])),
            _ => Err(ImageryError::InconsistentBandDims(dims)),
        }
    }

    /// Replace labels in order; extra labels are ignored, missing ones keep
    /// the old label
    pub fn relabel<I, L>(self, labels: I) -> Bands
    where
        I: IntoIterator<Item = L>,
        L: Into<BandLabel>,
    {
        let mut labels = labels.into_iter();
        self.entries
            .into_iter()
            .map(|(old, band)| (labels.next().map(Into::into).unwrap_or(old), band))
            .collect()
    }

    pub(crate) fn entries_mut(&mut self) -> &mut [(BandLabel, Band)] {
        &mut self.entries
    }

    fn clip<R: RangeBounds<usize>>(&self, range: R) -> (usize, usize) {
        let len = self.entries.len();
        let start = match range.start_bound() {
            Bound::Included(&s) => s,
            Bound::Excluded(&s) => s + 1,
            Bound::Unbounded => 0,
        };
        let end = match range.end_bound() {
            Bound::Included(&e) => e + 1,
            Bound::Excluded(&e) => e,
            Bound::Unbounded => len,
        };
        let end = end.min(len);
        (start.min(end), end)
    }
}

impl<L: Into<BandLabel>, B: Into<Band>> FromIterator<(L, B)> for Bands {
    fn from_iter<T: IntoIterator<Item = (L, B)>>(iter: T) -> Self {
        let mut bands = Bands::new();
        for (label, band) in iter {
            bands.insert(label, band);
        }
        bands
    }
}

impl IntoIterator for Bands {
    type Item = (BandLabel, Band);
    type IntoIter = std::vec::IntoIter<(BandLabel, Band)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl Index<usize> for Bands {
    type Output = Band;

    fn index(&self, i: usize) -> &Band {
        &self.entries[i].1
    }
}

impl IndexMut<usize> for Bands {
    fn index_mut(&mut self, i: usize) -> &mut Band {
        &mut self.entries[i].1
    }
}

impl Index<&str> for Bands {
    type Output = Band;

    fn index(&self, name: &str) -> &Band {
        match self.require(&BandLabel::from(name)) {
            Ok(band) => band,
            Err(e) => panic!("{}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr2, Array2};

    fn constant(v: f64) -> Band {
        Band::new(Array2::from_elem((2, 2), v))
    }

    fn abc() -> Bands {
        [("a", constant(1.0)), ("b", constant(2.0)), ("c", constant(3.0))]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_lookup_by_label_and_position() {
        let bands = abc();
        assert_eq!(bands["a"][[0, 0]], 1.0);
        assert_eq!(bands["b"][[0, 0]], 2.0);
        assert_eq!(bands[0][[0, 0]], 1.0);
        assert_eq!(bands[2][[0, 0]], 3.0);
        assert!(bands.get(&"z".into()).is_none());
        assert!(bands.nth(3).is_none());
    }

    #[test]
    fn test_require_reports_missing_label() {
        let bands = abc();
        assert_eq!(bands.require(&"c".into()).unwrap()[[0, 0]], 3.0);
        match bands.require(&BandLabel::Index(7)) {
            Err(ImageryError::BandNotFound(label)) => assert_eq!(label, "7"),
            other => panic!("expected BandNotFound, got {:?}", other),
        }
    }

    #[test]
    #[should_panic(expected = "Band not found: z")]
    fn test_index_by_missing_name_panics() {
        let _ = &abc()["z"];
    }

    #[test]
    fn test_slice_preserves_order() {
        let bands = abc();
        let first_two: Vec<f64> = bands.slice(..2).iter().map(|b| b[[0, 0]]).collect();
        assert_eq!(first_two, vec![1.0, 2.0]);
    }

    #[test]
    fn test_slice_past_end_is_clipped() {
        let bands = abc();
        assert_eq!(bands.slice(1..10).len(), 2);
        assert!(bands.slice(5..).is_empty());
    }

    #[test]
    fn test_slice_step() {
        let bands = abc();
        let picked: Vec<f64> = bands.slice_step(.., 2).iter().map(|b| b[[0, 0]]).collect();
        assert_eq!(picked, vec![1.0, 3.0]);
    }

    #[test]
    fn test_integer_labels_are_not_positions() {
        let bands: Bands = [(1i64, constant(10.0)), (2i64, constant(20.0))].into_iter().collect();
        assert_eq!(bands.get(&BandLabel::Index(1)).unwrap()[[0, 0]], 10.0);
        assert_eq!(bands[1][[0, 0]], 20.0);
        assert!(bands.get(&BandLabel::Index(0)).is_none());
    }

    #[test]
    fn test_reinsert_keeps_position() {
        let mut bands = abc();
        let old = bands.insert("a", constant(9.0));
        assert_eq!(old.unwrap()[[0, 0]], 1.0);
        assert_eq!(bands.len(), 3);
        assert_eq!(bands[0][[0, 0]], 9.0);
    }

    #[test]
    fn test_stack() {
        let stacked = abc().stack(..2).unwrap();
        assert_eq!(stacked.dim(), (2, 2, 2));
        assert_eq!(stacked[[1, 0, 0]], 2.0);
    }

    #[test]
    fn test_shape_detects_mismatch() {
        let mut bands = abc();
        assert_eq!(bands.shape().unwrap(), Some((2, 2)));
        bands.insert("d", arr2(&[[1.0, 2.0, 3.0]]));
        assert!(matches!(
            bands.shape(),
            Err(ImageryError::InconsistentBandDims(_))
        ));
        assert_eq!(Bands::new().shape().unwrap(), None);
    }

    #[test]
    fn test_relabel() {
        let bands = abc().relabel(["r", "g"]);
        let labels: Vec<String> = bands.labels().map(|l| l.to_string()).collect();
        assert_eq!(labels, vec!["r", "g", "c"]);
    }
}
