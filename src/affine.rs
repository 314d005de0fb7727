use crate::error::{ImageryError, Result};
use std::fmt;
use std::ops::Mul;

/// 2-D affine transform from pixel `(col, row)` to geographic `(x, y)`:
///
/// ```text
/// x = a * col + b * row + c
/// y = d * col + e * row + f
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Affine {
    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0)
    }

    pub fn translation(x: f64, y: f64) -> Self {
        Self::new(1.0, 0.0, x, 0.0, 1.0, y)
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        Self::new(sx, 0.0, 0.0, 0.0, sy, 0.0)
    }

    /// Build from a GDAL geotransform `[c, a, b, f, d, e]`
    pub fn from_gdal(gt: [f64; 6]) -> Self {
        let [c, a, b, f, d, e] = gt;
        Self::new(a, b, c, d, e, f)
    }

    /// GDAL geotransform order `[c, a, b, f, d, e]`
    pub fn to_gdal(&self) -> [f64; 6] {
        [self.c, self.a, self.b, self.f, self.d, self.e]
    }

    /// Map pixel `(col, row)` to geographic `(x, y)`
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.a * col + self.b * row + self.c,
            self.d * col + self.e * row + self.f,
        )
    }

    pub fn determinant(&self) -> f64 {
        self.a * self.e - self.b * self.d
    }

    /// True when there is no rotation or shear term
    pub fn is_rectilinear(&self) -> bool {
        self.b == 0.0 && self.d == 0.0
    }

    pub fn inverse(&self) -> Result<Affine> {
        let det = self.determinant();
        if det == 0.0 || !det.is_finite() {
            return Err(ImageryError::SingularTransform(det));
        }

        let ia = self.e / det;
        let ib = -self.b / det;
        let id = -self.d / det;
        let ie = self.a / det;

        Ok(Affine::new(
            ia,
            ib,
            -self.c * ia - self.f * ib,
            id,
            ie,
            -self.c * id - self.f * ie,
        ))
    }

    /// `self * other`: apply `other` first, then `self`
    pub fn compose(&self, other: &Affine) -> Affine {
        Affine::new(
            self.a * other.a + self.b * other.d,
            self.a * other.b + self.b * other.e,
            self.a * other.c + self.b * other.f + self.c,
            self.d * other.a + self.e * other.d,
            self.d * other.b + self.e * other.e,
            self.d * other.c + self.e * other.f + self.f,
        )
    }
}

/// Integer pixel index containing fractional pixel coordinate `v`.
///
/// Values within a relative 1e-9 below an integer count as that integer, so
/// `v` that should be exactly 7 but came out of the inverse as 6.9999999
/// lands on pixel 7.
pub fn pixel_floor(v: f64) -> i64 {
    (v + 1e-9 * v.abs().max(1.0)).floor() as i64
}

impl Default for Affine {
    fn default() -> Self {
        Self::identity()
    }
}

impl Mul for Affine {
    type Output = Affine;

    fn mul(self, rhs: Affine) -> Affine {
        self.compose(&rhs)
    }
}

impl fmt::Display for Affine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "| {:.6}, {:.6}, {:.6}|\n| {:.6}, {:.6}, {:.6}|",
            self.a, self.b, self.c, self.d, self.e, self.f
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn north_up() -> Affine {
        Affine::new(1.0, 0.0, 10.0, 0.0, -1.0, 20.0)
    }

    #[test]
    fn test_apply_north_up() {
        let aff = north_up();
        assert_eq!(aff.apply(0.0, 0.0), (10.0, 20.0));
        assert_eq!(aff.apply(4.0, 3.0), (14.0, 17.0));
    }

    #[test]
    fn test_gdal_order_roundtrip() {
        let gt = [500000.0, 30.0, 0.0, 4100000.0, 0.0, -30.0];
        let aff = Affine::from_gdal(gt);
        assert_eq!(aff.a, 30.0);
        assert_eq!(aff.c, 500000.0);
        assert_eq!(aff.e, -30.0);
        assert_eq!(aff.f, 4100000.0);
        assert_eq!(aff.to_gdal(), gt);
    }

    #[test]
    fn test_inverse_undoes_apply() {
        let aff = Affine::new(2.0, 0.5, 100.0, 0.25, -3.0, 50.0);
        let inv = aff.inverse().unwrap();
        let (x, y) = aff.apply(7.0, 11.0);
        let (col, row) = inv.apply(x, y);
        assert!((col - 7.0).abs() < 1e-9);
        assert!((row - 11.0).abs() < 1e-9);
    }

    #[test]
    fn test_singular_inverse_fails() {
        let aff = Affine::new(1.0, 2.0, 0.0, 2.0, 4.0, 0.0);
        assert!(matches!(
            aff.inverse(),
            Err(ImageryError::SingularTransform(_))
        ));
    }

    #[test]
    fn test_compose_with_inverse_is_identity() {
        let aff = north_up();
        let id = aff * aff.inverse().unwrap();
        let expected = Affine::identity();
        for (got, want) in id.to_gdal().iter().zip(expected.to_gdal().iter()) {
            assert!((got - want).abs() < 1e-12);
        }
    }

    #[test]
    fn test_pixel_floor_snaps_rounding_error() {
        assert_eq!(pixel_floor(6.999999999999999), 7);
        assert_eq!(pixel_floor(7.0), 7);
        assert_eq!(pixel_floor(7.5), 7);
        assert_eq!(pixel_floor(6.99), 6);
        assert_eq!(pixel_floor(-0.5), -1);
        assert_eq!(pixel_floor(-1.0000000000000002), -1);
    }

    #[test]
    fn test_translation_then_scale() {
        let aff = Affine::translation(10.0, 20.0) * Affine::scale(2.0, -2.0);
        assert_eq!(aff.apply(1.0, 1.0), (12.0, 18.0));
        assert!(aff.is_rectilinear());
    }
}
