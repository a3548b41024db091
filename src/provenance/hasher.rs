//! SF-014: BLAKE3 fingerprints for bundles.

use std::fs::File;
use std::path::Path;

/// Fingerprint a sealed bundle as `"blake3:{hex}"`, streaming the file.
pub fn hash_file(path: &Path) -> Result<String, String> {
    let file = File::open(path).map_err(|e| format!("cannot open {}: {}", path.display(), e))?;
    let digest = blake3::Hasher::new()
        .update_reader(file)
        .map_err(|e| format!("read error {}: {}", path.display(), e))?
        .finalize();
    Ok(format!("blake3:{}", digest.to_hex()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sf014_hash_file_streams() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.jar");
        let data = vec![0x5Au8; 3 * 65536 + 17];
        std::fs::write(&path, &data).unwrap();
        let h = hash_file(&path).unwrap();
        assert_eq!(h, format!("blake3:{}", blake3::hash(&data).to_hex()));
        assert_eq!(h.len(), "blake3:".len() + 64);
    }

    #[test]
    fn test_sf014_hash_file_distinguishes() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        std::fs::write(&a, "a").unwrap();
        std::fs::write(&b, "b").unwrap();
        assert_ne!(hash_file(&a).unwrap(), hash_file(&b).unwrap());
        assert_eq!(hash_file(&a).unwrap(), hash_file(&a).unwrap());
    }

    #[test]
    fn test_sf014_hash_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.jar");
        std::fs::write(&path, b"").unwrap();
        assert_eq!(
            hash_file(&path).unwrap(),
            format!("blake3:{}", blake3::hash(b"").to_hex())
        );
    }

    #[test]
    fn test_sf014_hash_file_missing() {
        let err = hash_file(Path::new("/nonexistent/b.jar")).unwrap_err();
        assert!(err.contains("cannot open"));
    }
}
