//! Quick-look rendering of bands to RGBA images.

use crate::affine::{pixel_floor, Affine};
use crate::error::Result;
use image::{Rgba, RgbaImage};
use log::{debug, info};
use ndarray::Array2;
use std::path::Path;

/// Colour ramps, sampled by linear interpolation between control points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Colormap {
    Gray,
    #[default]
    GistEarth,
    Viridis,
    Terrain,
}

impl Colormap {
    fn stops(&self) -> &'static [(f64, [u8; 3])] {
        match self {
            Colormap::Gray => &[(0.0, [0, 0, 0]), (1.0, [255, 255, 255])],
            Colormap::GistEarth => &[
                (0.0, [0, 0, 0]),
                (0.15, [24, 52, 117]),
                (0.3, [45, 111, 137]),
                (0.45, [68, 140, 84]),
                (0.6, [128, 161, 82]),
                (0.75, [181, 169, 105]),
                (0.9, [205, 178, 163]),
                (1.0, [253, 250, 250]),
            ],
            Colormap::Viridis => &[
                (0.0, [68, 1, 84]),
                (0.25, [59, 82, 139]),
                (0.5, [33, 145, 140]),
                (0.75, [94, 201, 98]),
                (1.0, [253, 231, 37]),
            ],
            Colormap::Terrain => &[
                (0.0, [51, 51, 153]),
                (0.15, [0, 153, 255]),
                (0.25, [0, 204, 102]),
                (0.5, [255, 255, 153]),
                (0.75, [128, 92, 84]),
                (1.0, [255, 255, 255]),
            ],
        }
    }

    /// Colour at `t` in `[0, 1]`; values outside are clamped
    pub fn sample(&self, t: f64) -> [u8; 3] {
        let stops = self.stops();
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };

        let upper = stops
            .iter()
            .position(|(pos, _)| *pos >= t)
            .unwrap_or(stops.len() - 1);
        if upper == 0 {
            return stops[0].1;
        }

        let (p0, c0) = stops[upper - 1];
        let (p1, c1) = stops[upper];
        let w = (t - p0) / (p1 - p0);
        let mut out = [0u8; 3];
        for i in 0..3 {
            let v = c0[i] as f64 + w * (c1[i] as f64 - c0[i] as f64);
            out[i] = v.round().clamp(0.0, 255.0) as u8;
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct PlotOptions {
    pub cmap: Colormap,
    /// Value mapped to the bottom of the colormap (default: band minimum)
    pub vmin: Option<f64>,
    /// Value mapped to the top of the colormap (default: band maximum)
    pub vmax: Option<f64>,
    pub hillshade: bool,
    /// Light source azimuth, degrees clockwise from north
    pub azimuth: f64,
    /// Light source altitude, degrees above the horizon
    pub altitude: f64,
    pub nan_color: [u8; 4],
}

impl Default for PlotOptions {
    fn default() -> Self {
        Self {
            cmap: Colormap::GistEarth,
            vmin: None,
            vmax: None,
            hillshade: false,
            azimuth: 315.0,
            altitude: 45.0,
            nan_color: [0, 0, 0, 0],
        }
    }
}

#[derive(Debug, Clone)]
pub struct RgbPlotOptions {
    /// Per-channel min-max stretch instead of the fixed 0-1 / 0-255 scale
    pub stretch: bool,
    pub nan_color: [u8; 4],
}

impl Default for RgbPlotOptions {
    fn default() -> Self {
        Self {
            stretch: false,
            nan_color: [0, 0, 0, 0],
        }
    }
}

/// Illumination of a surface in `[0, 1]` using Horn's slope estimate.
///
/// `dx`, `dy` are cell sizes in the units of `grid`. Edge cells reuse their
/// nearest neighbour. NaN cells stay NaN.
pub fn hillshade(
    grid: &Array2<f64>,
    dx: f64,
    dy: f64,
    azimuth: f64,
    altitude: f64,
    z_factor: f64,
) -> Array2<f64> {
    let (nrows, ncols) = grid.dim();
    let dx = if dx == 0.0 { 1.0 } else { dx.abs() };
    let dy = if dy == 0.0 { 1.0 } else { dy.abs() };

    let zenith = (90.0 - altitude).to_radians();
    // compass azimuth to math angle
    let az = (360.0 - azimuth + 90.0).rem_euclid(360.0).to_radians();

    let at = |r: isize, c: isize| -> f64 {
        let r = r.clamp(0, nrows as isize - 1) as usize;
        let c = c.clamp(0, ncols as isize - 1) as usize;
        grid[[r, c]]
    };

    Array2::from_shape_fn((nrows, ncols), |(row, col)| {
        if grid[[row, col]].is_nan() {
            return f64::NAN;
        }
        let (r, c) = (row as isize, col as isize);
        let (a, b, cc) = (at(r - 1, c - 1), at(r - 1, c), at(r - 1, c + 1));
        let (d, f) = (at(r, c - 1), at(r, c + 1));
        let (g, h, i) = (at(r + 1, c - 1), at(r + 1, c), at(r + 1, c + 1));

        let dzdx = ((cc + 2.0 * f + i) - (a + 2.0 * d + g)) / (8.0 * dx);
        let dzdy = ((g + 2.0 * h + i) - (a + 2.0 * b + cc)) / (8.0 * dy);
        if dzdx.is_nan() || dzdy.is_nan() {
            return f64::NAN;
        }

        let slope = (z_factor * dzdx.hypot(dzdy)).atan();
        let aspect = dzdy.atan2(-dzdx);
        let shade = zenith.cos() * slope.cos() + zenith.sin() * slope.sin() * (az - aspect).cos();
        shade.clamp(0.0, 1.0)
    })
}

fn overlay(base: f64, light: f64) -> f64 {
    if base <= 0.5 {
        2.0 * base * light
    } else {
        1.0 - 2.0 * (1.0 - base) * (1.0 - light)
    }
}

/// Render a band through a colormap; `cell` is `(dx, dy)` for hillshading
pub fn render_band(band: &Array2<f64>, cell: (f64, f64), opts: &PlotOptions) -> RgbaImage {
    let (nrows, ncols) = band.dim();

    let (lo, hi) = value_range(band);
    let vmin = opts.vmin.unwrap_or(lo);
    let vmax = opts.vmax.unwrap_or(hi);
    let span = if vmax > vmin { vmax - vmin } else { 1.0 };
    debug!("Rendering {}x{} band, range [{}, {}]", ncols, nrows, vmin, vmax);

    let shade = if opts.hillshade {
        Some(hillshade(band, cell.0, cell.1, opts.azimuth, opts.altitude, 1.0))
    } else {
        None
    };

    let mut img = RgbaImage::new(ncols as u32, nrows as u32);
    for ((row, col), &v) in band.indexed_iter() {
        let px = if v.is_nan() {
            Rgba(opts.nan_color)
        } else {
            let [r, g, b] = opts.cmap.sample((v - vmin) / span);
            match shade.as_ref().map(|s| s[[row, col]]).filter(|s| !s.is_nan()) {
                Some(light) => {
                    let blend = |c: u8| (overlay(c as f64 / 255.0, light) * 255.0).round() as u8;
                    Rgba([blend(r), blend(g), blend(b), 255])
                }
                None => Rgba([r, g, b, 255]),
            }
        };
        img.put_pixel(col as u32, row as u32, px);
    }
    img
}

/// Compose three channels. Without stretching the whole image is read as
/// 8-bit counts when any channel exceeds 1, else as 0-1 reflectance.
pub fn render_rgb(
    red: &Array2<f64>,
    green: &Array2<f64>,
    blue: &Array2<f64>,
    opts: &RgbPlotOptions,
) -> RgbaImage {
    let (nrows, ncols) = red.dim();
    let ranges = [value_range(red), value_range(green), value_range(blue)];

    let scales: [(f64, f64); 3] = if opts.stretch {
        ranges.map(|(lo, hi)| (lo, if hi > lo { hi - lo } else { 1.0 }))
    } else {
        let max = ranges.iter().map(|&(_, hi)| hi).fold(f64::MIN, f64::max);
        let full = if max > 1.0 { 255.0 } else { 1.0 };
        [(0.0, full); 3]
    };

    let mut img = RgbaImage::new(ncols as u32, nrows as u32);
    for row in 0..nrows {
        for col in 0..ncols {
            let vals = [red[[row, col]], green[[row, col]], blue[[row, col]]];
            let px = if vals.iter().any(|v| v.is_nan()) {
                Rgba(opts.nan_color)
            } else {
                let mut rgba = [0u8, 0, 0, 255];
                for (i, v) in vals.iter().enumerate() {
                    let (offset, span) = scales[i];
                    rgba[i] = (((v - offset) / span).clamp(0.0, 1.0) * 255.0).round() as u8;
                }
                Rgba(rgba)
            };
            img.put_pixel(col as u32, row as u32, px);
        }
    }
    img
}

/// Draw geographic polylines onto an image rendered from a raster with
/// transform `aff`. Segments outside the image are clipped per pixel.
pub fn draw_geoms(
    img: &mut RgbaImage,
    aff: &Affine,
    lines: &[Vec<(f64, f64)>],
    color: Rgba<u8>,
) -> Result<()> {
    let inv = aff.inverse()?;
    for line in lines {
        let pixels: Vec<(i64, i64)> = line
            .iter()
            .map(|&(x, y)| {
                let (col, row) = inv.apply(x, y);
                (pixel_floor(col), pixel_floor(row))
            })
            .collect();
        for pair in pixels.windows(2) {
            draw_segment(img, pair[0], pair[1], color);
        }
        if let [only] = pixels.as_slice() {
            draw_segment(img, *only, *only, color);
        }
    }
    Ok(())
}

/// Bresenham line; points are `(col, row)`
fn draw_segment(img: &mut RgbaImage, from: (i64, i64), to: (i64, i64), color: Rgba<u8>) {
    let (w, h) = (img.width() as i64, img.height() as i64);
    // endpoints on the far edge of the raster land one pixel outside
    let snap = |(c, r): (i64, i64)| (c.min(w - 1).max(0), r.min(h - 1).max(0));
    let (mut x0, mut y0) = if from.0 == w || from.1 == h { snap(from) } else { from };
    let (x1, y1) = if to.0 == w || to.1 == h { snap(to) } else { to };

    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if (0..w).contains(&x0) && (0..h).contains(&y0) {
            img.put_pixel(x0 as u32, y0 as u32, color);
        }
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

pub fn save_png<P: AsRef<Path>>(img: &RgbaImage, path: P) -> Result<()> {
    let path = path.as_ref();
    img.save_with_format(path, image::ImageFormat::Png)?;
    info!("Wrote {}x{} image to {}", img.width(), img.height(), path.display());
    Ok(())
}

fn value_range(grid: &Array2<f64>) -> (f64, f64) {
    grid.iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc: Option<(f64, f64)>, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
        .unwrap_or((0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_colormap_endpoints() {
        assert_eq!(Colormap::Gray.sample(0.0), [0, 0, 0]);
        assert_eq!(Colormap::Gray.sample(1.0), [255, 255, 255]);
        assert_eq!(Colormap::Gray.sample(2.0), [255, 255, 255]);
        assert_eq!(Colormap::Gray.sample(0.5), [128, 128, 128]);
    }

    #[test]
    fn test_flat_surface_hillshade() {
        let flat = Array2::from_elem((3, 3), 10.0);
        let hs = hillshade(&flat, 1.0, 1.0, 315.0, 45.0, 1.0);
        let expected = 45f64.to_radians().cos();
        assert!(hs.iter().all(|v| (v - expected).abs() < 1e-9));
    }

    #[test]
    fn test_slope_facing_light_is_brighter() {
        // Surface rising toward the east; light from the west faces it
        let ramp = Array2::from_shape_fn((5, 5), |(_, c)| c as f64);
        let from_west = hillshade(&ramp, 1.0, 1.0, 270.0, 45.0, 1.0);
        let from_east = hillshade(&ramp, 1.0, 1.0, 90.0, 45.0, 1.0);
        assert!(from_west[[2, 2]] > from_east[[2, 2]]);
    }

    #[test]
    fn test_hillshade_keeps_nan() {
        let grid = arr2(&[[1.0, f64::NAN], [1.0, 1.0]]);
        let hs = hillshade(&grid, 1.0, 1.0, 315.0, 45.0, 1.0);
        assert!(hs[[0, 1]].is_nan());
    }

    #[test]
    fn test_render_band_nan_is_transparent() {
        let band = arr2(&[[0.0, 1.0], [f64::NAN, 0.5]]);
        let img = render_band(&band, (1.0, 1.0), &PlotOptions::default());
        assert_eq!(img.dimensions(), (2, 2));
        assert_eq!(img.get_pixel(0, 1)[3], 0);
        assert_eq!(img.get_pixel(1, 0)[3], 255);
    }

    #[test]
    fn test_render_rgb_8bit_scaling() {
        let r = arr2(&[[255.0]]);
        let g = arr2(&[[0.0]]);
        let b = arr2(&[[128.0]]);
        let img = render_rgb(&r, &g, &b, &RgbPlotOptions::default());
        assert_eq!(img.get_pixel(0, 0).0, [255, 0, 128, 255]);
    }

    #[test]
    fn test_render_rgb_dark_channel_keeps_8bit_scale() {
        let r = arr2(&[[200.0, 10.0]]);
        let g = arr2(&[[100.0, 10.0]]);
        let b = arr2(&[[1.0, 0.0]]);
        let img = render_rgb(&r, &g, &b, &RgbPlotOptions::default());
        assert_eq!(img.get_pixel(0, 0).0, [200, 100, 1, 255]);
        assert_eq!(img.get_pixel(1, 0).0, [10, 10, 0, 255]);
    }

    #[test]
    fn test_render_rgb_reflectance() {
        let r = arr2(&[[1.0]]);
        let g = arr2(&[[0.5]]);
        let b = arr2(&[[0.0]]);
        let img = render_rgb(&r, &g, &b, &RgbPlotOptions::default());
        assert_eq!(img.get_pixel(0, 0).0, [255, 128, 0, 255]);
    }

    #[test]
    fn test_draw_geoms_outlines_raster() {
        let aff = Affine::new(1.0, 0.0, 10.0, 0.0, -1.0, 20.0);
        let mut img = RgbaImage::new(4, 3);
        let ring = vec![(10.0, 20.0), (14.0, 20.0), (14.0, 17.0), (10.0, 17.0), (10.0, 20.0)];
        let red = Rgba([255, 0, 0, 255]);
        draw_geoms(&mut img, &aff, &[ring], red).unwrap();

        assert_eq!(*img.get_pixel(0, 0), red);
        assert_eq!(*img.get_pixel(3, 2), red);
        assert_eq!(*img.get_pixel(1, 1), Rgba([0, 0, 0, 0]));
    }
}
