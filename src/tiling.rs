use crate::error::{BenchmarkError, Result};
use log::debug;
use ndarray::Array2;

/// Pixel value of the alpha band marking full data coverage.
pub const OPAQUE: u8 = 255;

/// A rectangular pixel-coordinate sub-region of a source image.
///
/// Invariant: the window never extends past the source image, so
/// `col_off + width <= image width` and `row_off + height <= image height`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    pub col_off: usize,
    pub row_off: usize,
    pub width: usize,
    pub height: usize,
}

impl Window {
    pub fn area(&self) -> usize {
        self.width * self.height
    }

    /// Whether the pixel at (col, row) in source coordinates falls inside
    /// this window.
    pub fn contains(&self, col: usize, row: usize) -> bool {
        col >= self.col_off
            && col < self.col_off + self.width
            && row >= self.row_off
            && row < self.row_off + self.height
    }
}

/// Partition an image into tile windows.
///
/// Column offsets advance by `tile_size` while strictly less than `width`
/// (rows likewise), so an exact multiple never emits a degenerate window.
/// The last column/row band shrinks to the true remainder instead of
/// reading past the image bound.
///
/// Enumeration is column-major (all row offsets for the first column
/// offset, then the next column offset); that order fixes the tile index
/// assigned to each window.
pub fn partition(width: usize, height: usize, tile_size: usize) -> Result<Vec<Window>> {
    if tile_size == 0 {
        return Err(BenchmarkError::InvalidTileSize(tile_size));
    }
    if width == 0 || height == 0 {
        return Err(BenchmarkError::InvalidDimensions(width, height));
    }

    let mut windows = Vec::new();
    for col_off in (0..width).step_by(tile_size) {
        let win_width = tile_size.min(width - col_off);

        for row_off in (0..height).step_by(tile_size) {
            let win_height = tile_size.min(height - row_off);

            windows.push(Window {
                col_off,
                row_off,
                width: win_width,
                height: win_height,
            });
        }
    }

    debug!(
        "Partitioned {}x{} raster into {} windows (tile_size={})",
        width,
        height,
        windows.len(),
        tile_size
    );

    Ok(windows)
}

/// Translate a base geotransform to a window's own pixel-(0,0) origin.
///
/// Only the origin terms move; pixel size and rotation are unchanged.
pub fn window_geotransform(base: &[f64; 6], window: &Window) -> [f64; 6] {
    let col = window.col_off as f64;
    let row = window.row_off as f64;
    [
        base[0] + col * base[1] + row * base[2],
        base[1],
        base[2],
        base[3] + col * base[4] + row * base[5],
        base[4],
        base[5],
    ]
}

/// Coverage filter: keep a window only when its alpha band (by convention
/// the last band) reaches the fully-opaque sentinel somewhere. Windows
/// that are partially or fully transparent are dropped entirely.
pub fn is_fully_opaque(bands: &[Array2<u8>]) -> bool {
    match bands.last() {
        Some(alpha) => alpha.iter().copied().max() == Some(OPAQUE),
        None => false,
    }
}

/// Names output tiles for one source image.
///
/// Indices are claimed only for windows that survive the coverage filter,
/// so retained tiles are numbered consecutively from zero. Downstream
/// scene assembly probes consecutive indices and treats the first missing
/// one as the end of the image's tiles, so the sequence must not have
/// interior gaps.
#[derive(Debug)]
pub struct TileNamer {
    area: String,
    image_id: String,
    next_index: usize,
}

impl TileNamer {
    pub fn new(area: &str, image_id: &str) -> Self {
        Self {
            area: area.to_string(),
            image_id: image_id.to_string(),
            next_index: 0,
        }
    }

    /// Claim the next tile index and return the output file name.
    pub fn claim(&mut self) -> String {
        let name = tile_file_name(&self.area, &self.image_id, self.next_index);
        self.next_index += 1;
        name
    }

    /// Number of tiles named so far.
    pub fn count(&self) -> usize {
        self.next_index
    }
}

/// File name for the tile at `index`: `{area}_{image_id}_{index}.tif`.
pub fn tile_file_name(area: &str, image_id: &str, index: usize) -> String {
    format!("{}_{}_{}.tif", area, image_id, index)
}
