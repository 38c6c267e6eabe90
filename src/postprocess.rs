use crate::constants::BACKGROUND_CLASS_ID;
use crate::error::Result;
use crate::raster::{open_raster, read_all_bands, read_profile, write_tile};
use crate::storage::{basename, join_uri, storage_for, StorageIo};
use log::{debug, info};
use ndarray::Array2;
use std::fs;
use std::path::Path;

/// Replace the reserved background value with zero across all bands.
/// The rasterizer emits it for pixels outside any label polygon, but the
/// submission format expects 0 there.
pub fn remap_background(bands: &mut [Array2<u8>]) {
    for band in bands.iter_mut() {
        band.mapv_inplace(|v| if v == BACKGROUND_CLASS_ID { 0 } else { v });
    }
}

/// Destination for a postprocessed prediction:
/// `{root_uri}/postprocess/{experiment_id}/{file_name}`.
pub fn postprocess_uri(root_uri: &str, experiment_id: &str, file_name: &str) -> String {
    join_uri(
        root_uri,
        &format!("postprocess/{}/{}", experiment_id, file_name),
    )
}

/// Remap one predicted raster and upload it under the experiment's
/// postprocess prefix. The write profile (dimensions, transform,
/// projection, band count) is carried over unchanged.
pub fn postprocess_prediction(
    uri: &str,
    root_uri: &str,
    experiment_id: &str,
    work_dir: &Path,
    storage: &dyn StorageIo,
) -> Result<String> {
    debug!("Postprocessing {}", uri);

    let dataset = open_raster(uri)?;
    let profile = read_profile(&dataset, uri)?;
    let mut bands = read_all_bands(&dataset, &profile)?;
    remap_background(&mut bands);

    let tmp = work_dir.join(basename(uri));
    write_tile(&tmp, &bands, &profile, &profile.geotransform)?;

    let out_uri = postprocess_uri(root_uri, experiment_id, basename(uri));
    if let Err(e) = storage.upload(&tmp, &out_uri) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(out_uri)
}

/// Postprocess a batch of predicted rasters sequentially.
pub fn run_postprocess(
    uris: &[String],
    root_uri: &str,
    experiment_id: &str,
    work_dir: &Path,
) -> Result<()> {
    fs::create_dir_all(work_dir)?;
    let storage = storage_for(root_uri);

    for uri in uris {
        let out_uri =
            postprocess_prediction(uri, root_uri, experiment_id, work_dir, storage.as_ref())?;
        info!("Postprocessed {} -> {}", uri, out_uri);
    }
    Ok(())
}
