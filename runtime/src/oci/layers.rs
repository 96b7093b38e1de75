//! Layer archive extraction.
//!
//! Layers are applied on top of each other in place: files from a later
//! archive overwrite earlier ones at the same path. Whiteout entries
//! (`.wh.*`) are not interpreted and land on disk as ordinary files.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use burrow_core::error::{BurrowError, Result};
use flate2::read::GzDecoder;
use tar::Archive;

/// Gzip magic bytes.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Extracts a downloaded layer archive into a directory.
pub trait LayerExtractor: Send + Sync {
    /// Unpack `archive` into `target_dir`, then delete `archive`.
    fn extract_and_remove(&self, archive: &Path, target_dir: &Path) -> Result<()>;
}

/// Extractor for plain or gzip-compressed tar layers.
#[derive(Debug, Default, Clone, Copy)]
pub struct TarExtractor;

impl LayerExtractor for TarExtractor {
    fn extract_and_remove(&self, archive: &Path, target_dir: &Path) -> Result<()> {
        extract_layer(archive, target_dir)?;

        std::fs::remove_file(archive).map_err(|e| {
            BurrowError::Filesystem(format!(
                "Failed to remove layer archive {}: {}",
                archive.display(),
                e
            ))
        })?;

        Ok(())
    }
}

/// Extract a single layer (tar or tar.gz) into `target_dir`.
///
/// # Errors
///
/// Returns error if:
/// - Layer file doesn't exist
/// - Decompression fails
/// - Extraction fails
pub fn extract_layer(layer_path: &Path, target_dir: &Path) -> Result<()> {
    let mut file = File::open(layer_path).map_err(|e| {
        BurrowError::Filesystem(format!(
            "Failed to open layer file {}: {}",
            layer_path.display(),
            e
        ))
    })?;

    let gzipped = is_gzip(&mut file).map_err(|e| {
        BurrowError::Filesystem(format!(
            "Failed to read layer file {}: {}",
            layer_path.display(),
            e
        ))
    })?;

    let reader = BufReader::new(file);
    let result = if gzipped {
        unpack(Archive::new(GzDecoder::new(reader)), target_dir)
    } else {
        unpack(Archive::new(reader), target_dir)
    };

    result.map_err(|e| {
        BurrowError::Filesystem(format!(
            "Failed to extract layer {} to {}: {}",
            layer_path.display(),
            target_dir.display(),
            e
        ))
    })?;

    tracing::debug!(
        layer = %layer_path.display(),
        target = %target_dir.display(),
        gzipped,
        "Extracted layer"
    );

    Ok(())
}

fn is_gzip(file: &mut File) -> std::io::Result<bool> {
    let mut magic = [0u8; 2];
    let n = file.read(&mut magic)?;
    file.seek(SeekFrom::Start(0))?;
    Ok(n == magic.len() && magic == GZIP_MAGIC)
}

fn unpack<R: Read>(mut archive: Archive<R>, target_dir: &Path) -> std::io::Result<()> {
    archive.set_preserve_permissions(true);
    archive.set_overwrite(true);
    archive.unpack(target_dir)
}
