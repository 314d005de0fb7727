use clap::{Parser, Subcommand, ValueEnum};
use imagery::interp::GapMethod;
use imagery::plot::Colormap;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "imagery")]
#[command(about = "Inspect, clean, stack and render georeferenced rasters")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Number of threads (default: all available)
    #[arg(short, long, global = true, value_name = "N")]
    pub threads: Option<usize>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print shape, bands, transform, CRS and bounds
    Info {
        /// Input raster path
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Replace NaN or negative samples and interpolate gaps
    Fill {
        /// Input raster path
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output GeoTIFF path
        #[arg(value_name = "FILE")]
        output: PathBuf,

        /// Replace NaN samples with this value
        #[arg(long, value_name = "VALUE")]
        nan: Option<f64>,

        /// Replace negative samples with this value
        #[arg(long, value_name = "VALUE")]
        neg: Option<f64>,

        /// Interpolate NaN gaps before any NaN fill
        #[arg(long, value_enum, value_name = "METHOD")]
        interpolate: Option<Method>,
    },

    /// Render a raster to PNG
    Plot {
        /// Input raster path
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output PNG path
        #[arg(value_name = "FILE")]
        output: PathBuf,

        /// Band position to render (0-based)
        #[arg(short, long, default_value_t = 0)]
        band: usize,

        /// Compose the first three bands as RGB
        #[arg(long, conflicts_with_all = ["band", "hillshade"])]
        rgb: bool,

        /// Stretch each RGB channel to its own range
        #[arg(long, requires = "rgb")]
        stretch: bool,

        /// Colormap for single-band rendering
        #[arg(long, value_enum, default_value_t = Cmap::GistEarth)]
        cmap: Cmap,

        /// Blend the colormap with a hillshade
        #[arg(long)]
        hillshade: bool,

        /// Light azimuth in degrees clockwise from north
        #[arg(long, default_value_t = 315.0)]
        azimuth: f64,

        /// Light altitude in degrees above the horizon
        #[arg(long, default_value_t = 45.0)]
        altitude: f64,

        /// Outline the raster bounds
        #[arg(long)]
        bbox: bool,
    },

    /// Stack rasters sharing one grid into a multi-band GeoTIFF
    Stack {
        /// Output GeoTIFF path
        #[arg(value_name = "FILE")]
        output: PathBuf,

        /// Input rasters, in band order
        #[arg(value_name = "FILE", required = true, num_args = 1..)]
        inputs: Vec<PathBuf>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum Method {
    Nearest,
    Linear,
    Spline,
}

impl From<Method> for GapMethod {
    fn from(m: Method) -> Self {
        match m {
            Method::Nearest => GapMethod::Nearest,
            Method::Linear => GapMethod::Linear,
            Method::Spline => GapMethod::CubicSpline,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum Cmap {
    Gray,
    GistEarth,
    Viridis,
    Terrain,
}

impl From<Cmap> for Colormap {
    fn from(c: Cmap) -> Self {
        match c {
            Cmap::Gray => Colormap::Gray,
            Cmap::GistEarth => Colormap::GistEarth,
            Cmap::Viridis => Colormap::Viridis,
            Cmap::Terrain => Colormap::Terrain,
        }
    }
}
