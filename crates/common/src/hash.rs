//! Digests for captured probe output.

use sha2::{Digest, Sha256};

/// Compute the hex SHA256 of bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Digest recorded next to a probe's raw stdout, in `sha256:<hex>` form.
pub fn output_digest(output: &str) -> String {
    format!("sha256:{}", sha256_hex(output.as_bytes()))
}
