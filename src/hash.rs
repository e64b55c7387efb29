//! SHA-256 content digests for duplicate detection.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// Buffer size for reading files (64KB)
const BUFFER_SIZE: usize = 64 * 1024;

/// Computes the hex SHA-256 digest of a file's bytes.
pub fn file_digest(path: &Path) -> io::Result<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::with_capacity(BUFFER_SIZE, file);
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Whether two files hold the same bytes.
///
/// Sizes are compared first; digests are only computed when they match. Any
/// read error counts as "not identical" so callers never elide a move they
/// could not verify.
pub fn files_identical(a: &Path, b: &Path) -> bool {
    let (Ok(meta_a), Ok(meta_b)) = (a.metadata(), b.metadata()) else {
        return false;
    };
    if !meta_a.is_file() || !meta_b.is_file() || meta_a.len() != meta_b.len() {
        return false;
    }

    match (file_digest(a), file_digest(b)) {
        (Ok(da), Ok(db)) => da == db,
        (Err(e), _) | (_, Err(e)) => {
            tracing::debug!(error = %e, "could not hash files for comparison");
            false
        }
    }
}
