use imagery::{
    read_raster, Affine, AnyRaster, Band, BandLabel, Bands, Crs, GapMethod, ImageryError,
    MultiBand, Raster, Rgb, SingleBand,
};
use ndarray::{arr2, Array2};
use tempfile::TempDir;

fn aff() -> Affine {
    Affine::new(30.0, 0.0, 500_000.0, 0.0, -30.0, 4_100_000.0)
}

fn dem() -> Array2<f64> {
    arr2(&[
        [100.0, 101.0, 102.0, 103.0],
        [101.0, f64::NAN, 103.0, 104.0],
        [102.0, 103.0, -9.0, 105.0],
    ])
}

fn write_single(dir: &TempDir, name: &str, data: Array2<f64>, aff: Affine) -> std::path::PathBuf {
    let path = dir.path().join(name);
    SingleBand::new(data)
        .with_aff(aff)
        .with_crs(Crs::from_epsg(26911))
        .write(&path)
        .unwrap();
    path
}

#[test]
fn test_open_fill_write_reopen() {
    let dir = TempDir::new().unwrap();
    let src = write_single(&dir, "dem.tif", dem(), aff());

    let mut sb = SingleBand::from_path(&src).unwrap();
    assert_eq!(sb.shape(), Some((3, 4)));
    assert_eq!(sb.aff(), Some(&aff()));
    assert_eq!(sb.crs().and_then(|c| c.epsg()), Some(26911));
    assert!(sb.arr()[[1, 1]].is_nan());

    sb.interpolate_gaps(GapMethod::Linear);
    sb.fill_negs(0.0);
    assert!((sb.arr()[[1, 1]] - 102.0).abs() < 1e-9);
    assert_eq!(sb.arr()[[2, 2]], 0.0);

    let out = dir.path().join("filled.tif");
    sb.write(&out).unwrap();

    let reopened = SingleBand::from_path(&out).unwrap();
    assert_eq!(reopened.arr().nan_count(), 0);
    assert_eq!(reopened.arr()[[2, 2]], 0.0);
    assert_eq!(reopened.bounds().unwrap(), sb.bounds().unwrap());
}

#[test]
fn test_any_raster_dispatches_on_band_count() {
    let dir = TempDir::new().unwrap();
    let single = write_single(&dir, "one.tif", dem(), aff());
    assert!(matches!(
        AnyRaster::from_path(&single).unwrap(),
        AnyRaster::Single(_)
    ));

    let multi_path = dir.path().join("two.tif");
    let bands: Bands = [("x", Band::new(dem())), ("y", Band::new(dem()))]
        .into_iter()
        .collect();
    Raster::new()
        .with_bands(bands)
        .unwrap()
        .with_aff(aff())
        .write(&multi_path)
        .unwrap();

    let opened = AnyRaster::from_path(&multi_path).unwrap();
    let raster = opened.raster();
    assert_eq!(raster.n_bands(), 2);
    let labels: Vec<&BandLabel> = raster.bands().labels().collect();
    assert_eq!(labels, vec![&BandLabel::from("0"), &BandLabel::from("1")]);
    assert!(raster.crs().is_none());

    assert!(matches!(
        SingleBand::from_path(&multi_path),
        Err(ImageryError::WrongBandCount { found: 2, .. })
    ));
}

#[test]
fn test_rgb_from_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rgba.tif");
    let channel = |v: f64| Band::new(Array2::from_elem((2, 3), v));
    let bands: Bands = [
        (1i64, channel(10.0)),
        (2i64, channel(20.0)),
        (3i64, channel(30.0)),
        (4i64, channel(255.0)),
    ]
    .into_iter()
    .collect();
    MultiBand::from_bands(bands)
        .unwrap()
        .with_aff(aff())
        .write(&path)
        .unwrap();

    let rgb = Rgb::from_path(&path).unwrap();
    let labels: Vec<String> = rgb.bands().labels().map(|l| l.to_string()).collect();
    assert_eq!(labels, vec!["r", "g", "b", "a"]);
    assert_eq!(rgb.green()[[1, 2]], 20.0);
    assert_eq!(rgb.arr().unwrap().dim(), (2, 3, 4));
}

#[test]
fn test_stack_from_paths() {
    let dir = TempDir::new().unwrap();
    let a = write_single(&dir, "a.tif", dem(), aff());
    let b = write_single(&dir, "b.tif", dem().mapv(|v| v * 2.0), aff());

    let mb = MultiBand::from_paths(&[&a, &b]).unwrap();
    assert_eq!(mb.n_bands(), 2);
    assert_eq!(mb.bands()["1"][[0, 0]], 200.0);
    assert_eq!(mb.aff(), Some(&aff()));

    let out = dir.path().join("stack.tif");
    mb.write(&out).unwrap();
    let data = read_raster(&out).unwrap();
    assert_eq!(data.metadata.band_count, 2);
    assert_eq!(data.metadata.geotransform, aff().to_gdal());
}

#[test]
fn test_stack_rejects_mismatched_transform() {
    let dir = TempDir::new().unwrap();
    let a = write_single(&dir, "a.tif", dem(), aff());
    let shifted = aff() * Affine::translation(1.0, 0.0);
    let b = write_single(&dir, "b.tif", dem(), shifted);

    assert!(matches!(
        MultiBand::from_paths(&[&a, &b]),
        Err(ImageryError::MismatchedGeoreference(_))
    ));
}
