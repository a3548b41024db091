//! SF-006: Bundle packager.
//!
//! Writes a jar-style archive: a version-only manifest followed by one entry
//! per resolved resource, in input order. Entry paths always use `/`.
//! A failed write leaves a partial file; removing it is the caller's job.

use super::error::ProvisionError;
use crate::resources::ResolvedResource;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";
pub const MANIFEST_CONTENT: &str = "Manifest-Version: 1.0\r\n\r\n";

/// A closed bundle on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedBundle {
    pub path: PathBuf,
    pub bytes: u64,
    /// Content entries, excluding the manifest
    pub entries: usize,
}

/// Normalize an entry path to forward slashes.
pub fn entry_name(path: &str) -> String {
    path.replace('\\', "/")
}

/// Package `resources` into `dest`, creating or overwriting it.
///
/// Each reader is dropped as soon as its entry is written, and on any error.
pub fn write_bundle(
    dest: &Path,
    resources: Vec<ResolvedResource<'_>>,
) -> Result<SealedBundle, ProvisionError> {
    let archive_err = |source: zip::result::ZipError| ProvisionError::Archive {
        path: dest.to_path_buf(),
        source,
    };

    let file = File::create(dest).map_err(|e| ProvisionError::io(dest, e))?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file(MANIFEST_PATH, options).map_err(archive_err)?;
    std::io::Write::write_all(&mut zip, MANIFEST_CONTENT.as_bytes())
        .map_err(|e| ProvisionError::io(dest, e))?;

    let mut entries = 0;
    for ResolvedResource {
        entry_path,
        mut reader,
    } in resources
    {
        let name = entry_name(&entry_path);
        tracing::debug!("adding {} to {}", name, dest.display());
        zip.start_file(name, options).map_err(archive_err)?;
        std::io::copy(&mut reader, &mut zip).map_err(|e| ProvisionError::io(dest, e))?;
        entries += 1;
    }

    let writer = zip.finish().map_err(archive_err)?;
    writer
        .into_inner()
        .map_err(|e| ProvisionError::io(dest, e.into_error()))?
        .sync_all()
        .map_err(|e| ProvisionError::io(dest, e))?;

    let bytes = std::fs::metadata(dest)
        .map_err(|e| ProvisionError::io(dest, e))?
        .len();

    Ok(SealedBundle {
        path: dest.to_path_buf(),
        bytes,
        entries,
    })
}
