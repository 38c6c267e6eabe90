use crate::error::{BenchmarkError, Result};
use log::{debug, info};
use std::path::Path;
use std::process::Command;

/// Creation options handed to `gdal_translate` for tile compression.
#[derive(Debug, Clone)]
pub struct CompressOptions {
    pub jpeg_quality: u8,
    pub block_size: usize,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            jpeg_quality: 100,
            block_size: 512,
        }
    }
}

/// Argument list for the conversion, separated out so it can be checked
/// without running the external tool.
pub fn translate_args(input: &Path, output: &Path, options: &CompressOptions) -> Vec<String> {
    vec![
        "-co".to_string(),
        "COMPRESS=JPEG".to_string(),
        "-co".to_string(),
        format!("JPEG_QUALITY={}", options.jpeg_quality),
        "-co".to_string(),
        "TILED=YES".to_string(),
        "-co".to_string(),
        "COPY_SRC_OVERVIEWS=YES".to_string(),
        "-co".to_string(),
        format!("BLOCKXSIZE={}", options.block_size),
        "-co".to_string(),
        format!("BLOCKYSIZE={}", options.block_size),
        "--config".to_string(),
        "COMPRESS_OVERVIEW".to_string(),
        "JPEG".to_string(),
        input.display().to_string(),
        output.display().to_string(),
    ]
}

/// Convert an uncompressed tile to JPEG-in-TIFF using `gdal_translate`.
///
/// A non-zero exit is fatal for the tile: the caller must not let a
/// partial or uncompressed artifact reach the final destination.
pub fn compress_tile(input: &Path, output: &Path, options: &CompressOptions) -> Result<()> {
    debug!(
        "Compressing {} -> {} (JPEG quality {})",
        input.display(),
        output.display(),
        options.jpeg_quality
    );

    let output_result = Command::new("gdal_translate")
        .args(translate_args(input, output, options))
        .output()
        .map_err(|e| BenchmarkError::CompressionFailed {
            path: input.display().to_string(),
            reason: format!("failed to run gdal_translate: {}", e),
        })?;

    if !output_result.status.success() {
        let stderr = String::from_utf8_lossy(&output_result.stderr);
        return Err(BenchmarkError::CompressionFailed {
            path: input.display().to_string(),
            reason: format!("gdal_translate failed: {}", stderr.trim()),
        });
    }

    info!("Compressed {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_translate_args_carry_creation_options() {
        let args = translate_args(
            &PathBuf::from("/tmp/a.tif"),
            &PathBuf::from("/tmp/a_jpg.tif"),
            &CompressOptions::default(),
        );
        assert!(args.contains(&"COMPRESS=JPEG".to_string()));
        assert!(args.contains(&"JPEG_QUALITY=100".to_string()));
        assert!(args.contains(&"TILED=YES".to_string()));
        assert!(args.contains(&"COPY_SRC_OVERVIEWS=YES".to_string()));
        assert!(args.contains(&"BLOCKXSIZE=512".to_string()));
        assert!(args.contains(&"BLOCKYSIZE=512".to_string()));
        // source before destination
        let src = args.iter().position(|a| a == "/tmp/a.tif").unwrap();
        let dst = args.iter().position(|a| a == "/tmp/a_jpg.tif").unwrap();
        assert!(src < dst);
    }

    #[test]
    fn test_translate_args_honor_overrides() {
        let opts = CompressOptions {
            jpeg_quality: 85,
            block_size: 256,
        };
        let args = translate_args(
            &PathBuf::from("in.tif"),
            &PathBuf::from("out.tif"),
            &opts,
        );
        assert!(args.contains(&"JPEG_QUALITY=85".to_string()));
        assert!(args.contains(&"BLOCKXSIZE=256".to_string()));
    }
}
