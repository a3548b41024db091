//! SF-004: Resources read from a directory tree (a compiled class-path root).

use super::ResourceSpace;
use std::fs::File;
use std::io::{self, BufReader, ErrorKind, Read};
use std::path::{Component, Path, PathBuf};

/// Resource space rooted at a directory; names map to relative paths.
#[derive(Debug, Clone)]
pub struct DirectoryResources {
    root: PathBuf,
}

impl DirectoryResources {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a logical name to a regular file under the root.
    ///
    /// Names that would escape the root, and paths that are absent or not
    /// regular files, resolve to `Ok(None)`. Other stat failures are errors.
    fn locate(&self, name: &str) -> io::Result<Option<PathBuf>> {
        let rel = Path::new(name);
        if rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Ok(None);
        }
        let path = self.root.join(rel);
        match std::fs::metadata(&path) {
            Ok(meta) if meta.is_file() => Ok(Some(path)),
            Ok(_) => Ok(None),
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl ResourceSpace for DirectoryResources {
    fn open(&self, name: &str) -> io::Result<Option<Box<dyn Read + '_>>> {
        let Some(path) = self.locate(name)? else {
            return Ok(None);
        };
        tracing::debug!("opening {}", path.display());
        let file = File::open(&path)?;
        Ok(Some(Box::new(BufReader::new(file))))
    }

    fn contains(&self, name: &str) -> io::Result<bool> {
        Ok(self.locate(name)?.is_some())
    }
}
