use crate::error::{BenchmarkError, Result};
use crate::tiling::Window;
use gdal::{Dataset, DriverManager};
use log::{debug, info};
use ndarray::Array2;
use std::path::Path;

/// Format profile inherited by every tile cut from a source image.
/// Tile writes override height, width and transform per window.
#[derive(Debug, Clone)]
pub struct RasterProfile {
    pub width: usize,
    pub height: usize,
    pub band_count: usize,
    pub geotransform: [f64; 6],
    pub projection: String,
}

/// Map `s3://bucket/key` onto GDAL's S3 virtual filesystem; local paths
/// pass through unchanged.
pub fn gdal_path(uri: &str) -> String {
    match uri.strip_prefix("s3://") {
        Some(rest) => format!("/vsis3/{}", rest),
        None => uri.to_string(),
    }
}

pub fn open_raster(uri: &str) -> Result<Dataset> {
    let path = gdal_path(uri);
    info!("Opening raster: {}", path);
    Ok(Dataset::open(Path::new(&path))?)
}

/// Read the source profile without touching pixel data.
pub fn read_profile(dataset: &Dataset, uri: &str) -> Result<RasterProfile> {
    let (width, height) = dataset.raster_size();
    if width == 0 || height == 0 {
        return Err(BenchmarkError::InvalidDimensions(width, height));
    }

    let band_count = dataset.raster_count();
    if band_count == 0 {
        return Err(BenchmarkError::NoBands(uri.to_string()));
    }

    let geotransform = dataset.geo_transform()?;

    debug!(
        "Profile for {}: {}x{}, {} bands, origin=({:.6}, {:.6})",
        uri, width, height, band_count, geotransform[0], geotransform[3]
    );

    Ok(RasterProfile {
        width,
        height,
        band_count,
        geotransform,
        projection: dataset.projection(),
    })
}

/// Read one window of every band into row-major arrays.
pub fn read_window_bands(
    dataset: &Dataset,
    profile: &RasterProfile,
    window: &Window,
) -> Result<Vec<Array2<u8>>> {
    let mut bands = Vec::with_capacity(profile.band_count);

    for band_index in 1..=profile.band_count {
        let rasterband = dataset.rasterband(band_index)?;
        let buffer = rasterband.read_as::<u8>(
            (window.col_off as isize, window.row_off as isize),
            (window.width, window.height),
            (window.width, window.height),
            None,
        )?;
        let data_vec: Vec<u8> = buffer.into_iter().collect();
        bands.push(Array2::from_shape_vec(
            (window.height, window.width),
            data_vec,
        )?);
    }

    Ok(bands)
}

/// Write a tile carrying the source profile with the window's own
/// dimensions and geotransform.
pub fn write_tile(
    path: &Path,
    bands: &[Array2<u8>],
    profile: &RasterProfile,
    transform: &[f64; 6],
) -> Result<()> {
    let (height, width) = bands
        .first()
        .map(|b| b.dim())
        .ok_or_else(|| BenchmarkError::NoBands(path.display().to_string()))?;

    debug!(
        "Writing tile {} ({}x{}, {} bands)",
        path.display(),
        width,
        height,
        bands.len()
    );

    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let mut dataset =
        driver.create_with_band_type::<u8, _>(path, width, height, bands.len())?;

    dataset.set_geo_transform(transform)?;
    dataset.set_projection(&profile.projection)?;

    for (i, band_data) in bands.iter().enumerate() {
        let mut raster_band = dataset.rasterband(i + 1)?;
        let band_slice = band_data.as_slice().expect("Array must be contiguous");
        let mut buffer = gdal::raster::Buffer::new((width, height), band_slice.to_vec());
        raster_band.write((0, 0), (width, height), &mut buffer)?;
    }

    Ok(())
}

/// Read every band of a whole raster, for the postprocess remap.
pub fn read_all_bands(dataset: &Dataset, profile: &RasterProfile) -> Result<Vec<Array2<u8>>> {
    let full = Window {
        col_off: 0,
        row_off: 0,
        width: profile.width,
        height: profile.height,
    };
    read_window_bands(dataset, profile, &full)
}
