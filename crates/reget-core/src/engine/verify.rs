//! Integrity check of a finished file against the server's checksum

use crate::error::FetchError;
use reget_types::{ChecksumAlgorithm, ExpectedChecksum};
use sha2::{Digest, Sha256};
use std::io;
use std::path::Path;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

enum FileHasher {
    Md5(md5::Context),
    Sha256(Sha256),
}

impl FileHasher {
    fn new(algorithm: ChecksumAlgorithm) -> Self {
        match algorithm {
            ChecksumAlgorithm::Md5 => FileHasher::Md5(md5::Context::new()),
            ChecksumAlgorithm::Sha256 => FileHasher::Sha256(Sha256::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            FileHasher::Md5(ctx) => ctx.consume(data),
            FileHasher::Sha256(hasher) => hasher.update(data),
        }
    }

    fn finalize(self) -> Vec<u8> {
        match self {
            FileHasher::Md5(ctx) => ctx.compute().0.to_vec(),
            FileHasher::Sha256(hasher) => hasher.finalize().to_vec(),
        }
    }
}

/// Digest of the file at `path`, read through a `buffer_size` buffer
pub async fn file_digest(
    path: &Path,
    algorithm: ChecksumAlgorithm,
    buffer_size: usize,
    cancel: &CancellationToken,
) -> Result<Vec<u8>, FetchError> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = FileHasher::new(algorithm);
    let mut buffer = vec![0u8; buffer_size.max(1)];

    loop {
        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            read = file.read(&mut buffer) => read?,
        };
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(hasher.finalize())
}

/// Check `path` against `expected`.
///
/// No checksum means nothing to check. A missing file fails. On mismatch
/// the file is deleted so the next attempt starts from scratch.
pub(crate) async fn verify_file(
    path: &Path,
    expected: Option<&ExpectedChecksum>,
    buffer_size: usize,
    cancel: &CancellationToken,
) -> Result<bool, FetchError> {
    let Some(expected) = expected else {
        debug!(path = %path.display(), "No checksum available, skipping verification");
        return Ok(true);
    };

    let actual = match file_digest(path, expected.algorithm, buffer_size, cancel).await {
        Ok(digest) => digest,
        Err(FetchError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
            error!(path = %path.display(), "File to verify does not exist");
            return Ok(false);
        }
        Err(FetchError::Io(e)) => {
            error!(path = %path.display(), error = %e, "Failed to read file for verification");
            return Ok(false);
        }
        Err(e) => return Err(e),
    };

    if actual == expected.digest {
        debug!(path = %path.display(), algorithm = %expected.algorithm, "Checksum verified");
        return Ok(true);
    }

    error!(
        path = %path.display(),
        algorithm = %expected.algorithm,
        expected = %hex::encode(&expected.digest),
        actual = %hex::encode(&actual),
        "Checksum mismatch, deleting file"
    );
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!(path = %path.display(), error = %e, "Failed to delete corrupt file");
    }
    Ok(false)
}
