use crate::compress::{compress_tile, CompressOptions};
use crate::constants::{DEFAULT_TILE_SIZE, TRAIN_IDS, VALID_IDS};
use crate::error::Result;
use crate::raster::{open_raster, read_profile, read_window_bands, write_tile};
use crate::storage::{area_and_image_id, join_uri, parent_uri, storage_for, StorageIo};
use crate::tiling::{is_fully_opaque, partition, window_geotransform, TileNamer};
use log::{debug, info, warn};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct SplitOptions {
    pub tile_size: usize,
    pub work_dir: PathBuf,
    pub compress: CompressOptions,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            work_dir: std::env::temp_dir(),
            compress: CompressOptions::default(),
        }
    }
}

fn remove_quietly(path: &Path) {
    if path.exists() {
        if let Err(e) = fs::remove_file(path) {
            warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}

/// Split one source image into coverage-filtered, compressed tiles and
/// move each to the output location. Returns the number of tiles kept.
///
/// Windows are processed strictly in enumeration order; each one is read,
/// filtered, written, compressed and uploaded before the next starts, and
/// temporary artifacts are removed on success and failure alike.
pub fn split_image(
    image_uri: &str,
    output_dir: &str,
    options: &SplitOptions,
    storage: &dyn StorageIo,
) -> Result<usize> {
    let (area, image_id) = area_and_image_id(image_uri)?;

    let dataset = open_raster(image_uri)?;
    let profile = read_profile(&dataset, image_uri)?;
    let windows = partition(profile.width, profile.height, options.tile_size)?;

    info!(
        "Splitting {} ({}x{}, {} bands) into up to {} tiles",
        image_uri,
        profile.width,
        profile.height,
        profile.band_count,
        windows.len()
    );

    let mut namer = TileNamer::new(&area, &image_id);
    for window in &windows {
        let bands = read_window_bands(&dataset, &profile, window)?;

        if !is_fully_opaque(&bands) {
            debug!(
                "Skipping window at ({}, {}): incomplete coverage",
                window.col_off, window.row_off
            );
            continue;
        }

        let tile_name = namer.claim();
        let transform = window_geotransform(&profile.geotransform, window);

        let tmp = options.work_dir.join(&tile_name);
        let tmp_compressed = options.work_dir.join(tile_name.replace(".tif", "_jpg.tif"));

        write_tile(&tmp, &bands, &profile, &transform)?;

        if let Err(e) = compress_tile(&tmp, &tmp_compressed, &options.compress) {
            remove_quietly(&tmp);
            remove_quietly(&tmp_compressed);
            return Err(e);
        }
        remove_quietly(&tmp);

        let dest = join_uri(
            output_dir,
            &format!("{}/{}/{}", area, image_id, tile_name),
        );
        if let Err(e) = storage.upload(&tmp_compressed, &dest) {
            remove_quietly(&tmp_compressed);
            return Err(e);
        }
    }

    info!(
        "{}: kept {} of {} windows",
        image_uri,
        namer.count(),
        windows.len()
    );
    Ok(namer.count())
}

/// Split a batch of source images. The unit of parallelism is one whole
/// image; windows within an image stay sequential so tile numbering and
/// remainder handling remain self-contained.
pub fn split_images(image_uris: &[String], output_dir: &str, options: &SplitOptions) -> Result<usize> {
    fs::create_dir_all(&options.work_dir)?;

    let counts: Result<Vec<usize>> = image_uris
        .par_iter()
        .map(|uri| {
            let storage = storage_for(output_dir);
            split_image(uri, output_dir, options, storage.as_ref())
        })
        .collect();

    let total = counts?.iter().sum();
    info!(
        "Uploaded {} tiles from {} source images",
        total,
        image_uris.len()
    );
    Ok(total)
}

/// Image URIs for every scene in the train + validation rosters, laid out
/// as `{catalog_dir}/{area}/{id}/{id}.tif`.
pub fn roster_image_uris(stac_uri: &str) -> Vec<String> {
    let stac_dir = parent_uri(stac_uri);
    TRAIN_IDS
        .iter()
        .chain(VALID_IDS.iter())
        .map(|(area, id)| join_uri(&stac_dir, &format!("{}/{}/{}.tif", area, id, id)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roster_image_uris_follow_catalog_layout() {
        let uris = roster_image_uris("s3://bench/train/catalog.json");
        assert_eq!(uris.len(), TRAIN_IDS.len() + VALID_IDS.len());
        assert_eq!(uris[0], "s3://bench/train/acc/665946/665946.tif");
        assert!(uris.iter().all(|u| u.starts_with("s3://bench/train/")));
    }

    #[test]
    fn test_default_options() {
        let options = SplitOptions::default();
        assert_eq!(options.tile_size, DEFAULT_TILE_SIZE);
        assert_eq!(options.compress.jpeg_quality, 100);
    }

    #[test]
    fn test_remove_quietly_tolerates_missing_files() {
        remove_quietly(Path::new("/nonexistent/segbench/tile.tif"));
    }
}
