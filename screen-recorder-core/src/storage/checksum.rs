use std::fs::File;
use std::io;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::models::error::WriterError;

/// Compute SHA-256 hex digest of a file, streaming its contents.
pub fn sha256_file(path: &Path) -> Result<String, WriterError> {
    let mut file = File::open(path)
        .map_err(|e| WriterError::FinishFailed(format!("failed to open {} for checksum: {}", path.display(), e)))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)
        .map_err(|e| WriterError::FinishFailed(format!("failed to read {} for checksum: {}", path.display(), e)))?;
    Ok(hex_encode(&hasher.finalize()))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn digest_of_known_content() {
        let path = std::env::temp_dir().join(format!("screen_recorder_checksum_{}", uuid::Uuid::new_v4()));
        fs::write(&path, b"abc").unwrap();

        assert_eq!(
            sha256_file(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );

        fs::remove_file(&path).ok();
    }

    #[test]
    fn missing_file_is_finish_error() {
        let path = std::env::temp_dir().join("screen_recorder_checksum_missing_file");
        assert!(matches!(sha256_file(&path), Err(WriterError::FinishFailed(_))));
    }
}
