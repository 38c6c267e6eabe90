use thiserror::Error;

#[derive(Error, Debug)]
pub enum BenchmarkError {
    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Array shape error: {0}")]
    ShapeError(#[from] ndarray::ShapeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid tile size: {0} (must be positive)")]
    InvalidTileSize(usize),

    #[error("Raster has invalid dimensions: {0}x{1}")]
    InvalidDimensions(usize, usize),

    #[error("Raster has no bands: {0}")]
    NoBands(String),

    #[error("Compression failed for {path}: {reason}")]
    CompressionFailed { path: String, reason: String },

    #[error("Storage operation failed for {uri}: {reason}")]
    StorageFailed { uri: String, reason: String },

    #[error("Catalog error at {uri}: {reason}")]
    Catalog { uri: String, reason: String },

    #[error("Cannot derive area and image id from URI: {0}")]
    MalformedImageUri(String),

    #[error("No scenes found for experiment {0}")]
    EmptyDataset(String),
}

pub type Result<T> = std::result::Result<T, BenchmarkError>;
