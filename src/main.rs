use clap::Parser;
use env_logger::Env;
use image::Rgba;
use log::{info, warn};
use std::path::Path;

mod cli;

use cli::{Args, Command};
use imagery::plot::{draw_geoms, save_png, PlotOptions, RgbPlotOptions};
use imagery::{AnyRaster, GapMethod, MultiBand, Result, Rgb};

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    if let Some(n_threads) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n_threads)
            .build_global()?;
        info!("Using {} threads", n_threads);
    }

    match args.command {
        Command::Info { input } => info_cmd(&input),
        Command::Fill {
            input,
            output,
            nan,
            neg,
            interpolate,
        } => fill_cmd(&input, &output, nan, neg, interpolate.map(GapMethod::from)),
        Command::Plot {
            input,
            output,
            band,
            rgb,
            stretch,
            cmap,
            hillshade,
            azimuth,
            altitude,
            bbox,
        } => {
            let opts = PlotOptions {
                cmap: cmap.into(),
                hillshade,
                azimuth,
                altitude,
                ..PlotOptions::default()
            };
            plot_cmd(&input, &output, band, rgb.then_some(stretch), &opts, bbox)
        }
        Command::Stack { output, inputs } => {
            let stacked = MultiBand::from_paths(&inputs)?;
            stacked.write(&output)
        }
    }
}

fn info_cmd(input: &Path) -> Result<()> {
    let raster = AnyRaster::from_path(input)?.into_raster();

    if let Some((rows, cols)) = raster.shape() {
        println!("Shape: {} rows x {} cols", rows, cols);
    }
    println!("Bands: {}", raster.n_bands());
    for (label, band) in raster.bands().iter() {
        match band.finite_range() {
            Some((lo, hi)) => println!(
                "  {}: range [{}, {}], {} NaN",
                label,
                lo,
                hi,
                band.nan_count()
            ),
            None => println!("  {}: no finite samples", label),
        }
    }
    if let Some(aff) = raster.aff() {
        println!("Transform: {}", aff);
    }
    match raster.crs() {
        Some(crs) => println!("CRS: {}", crs),
        None => println!("CRS: none"),
    }
    if let Ok(b) = raster.bounds() {
        println!(
            "Bounds: x [{}, {}], y [{}, {}]",
            b.x_min, b.x_max, b.y_min, b.y_max
        );
    }
    Ok(())
}

fn fill_cmd(
    input: &Path,
    output: &Path,
    nan: Option<f64>,
    neg: Option<f64>,
    method: Option<GapMethod>,
) -> Result<()> {
    let mut raster = AnyRaster::from_path(input)?.into_raster();

    if nan.is_none() && neg.is_none() && method.is_none() {
        warn!("No fill requested; output will be a copy of the input");
    }
    if let Some(method) = method {
        info!("Interpolating gaps ({})", method.name());
        raster.interpolate_gaps(method);
    }
    if let Some(v) = nan {
        info!("Filling NaN samples with {}", v);
        raster.fill_nans(v);
    }
    if let Some(v) = neg {
        info!("Filling negative samples with {}", v);
        raster.fill_negs(v);
    }

    raster.write(output)
}

/// `rgb` is `Some(stretch)` when compositing RGB
fn plot_cmd(
    input: &Path,
    output: &Path,
    band: usize,
    rgb: Option<bool>,
    opts: &PlotOptions,
    bbox: bool,
) -> Result<()> {
    let (mut img, raster) = match rgb {
        Some(stretch) => {
            let rgb = Rgb::from_path(input)?;
            let rgb_opts = RgbPlotOptions {
                stretch,
                ..RgbPlotOptions::default()
            };
            (rgb.plot(&rgb_opts), rgb.into_raster())
        }
        None => match AnyRaster::from_path(input)? {
            AnyRaster::Single(sb) => {
                if band > 0 {
                    warn!("Raster has a single band; ignoring --band {}", band);
                }
                (sb.plot(opts), sb.into_raster())
            }
            AnyRaster::Multi(mb) => (mb.plot_band(band, opts)?, mb.into_raster()),
        },
    };

    if bbox {
        if let Some(aff) = raster.aff() {
            let ring = raster.bounding_box()?;
            draw_geoms(&mut img, aff, &[ring], Rgba([255, 0, 0, 255]))?;
        }
    }

    save_png(&img, output)
}
