//! Content digests for chart archives.

use std::io;

use sha2::{Digest, Sha256};

/// Computes a deterministic fingerprint of archive bytes
pub trait ContentDigester {
    fn digest(&self, content: &[u8]) -> io::Result<String>;
}

/// Lowercase hex SHA-256, the format of the index `digest` field
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Digester;

impl ContentDigester for Sha256Digester {
    fn digest(&self, mut content: &[u8]) -> io::Result<String> {
        let mut hasher = Sha256::new();
        io::copy(&mut content, &mut hasher)?;
        Ok(hex::encode(hasher.finalize()))
    }
}
