//! Content fingerprints.
//!
//! Files up to [`HashPolicy::large_threshold_bytes`] are hashed in full. Larger
//! files are sampled: the head, one block at every stride position through the
//! middle, and the tail. A sampled fingerprint is approximate: two large
//! files that differ only in bytes between sampled blocks produce the same
//! digest. It bounds the I/O spent on huge files and must not be treated as
//! an exact equality test.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use blake3::Hasher;

use crate::{Error, Result};

/// Sampling parameters for large-file fingerprints.
#[derive(Debug, Clone, PartialEq)]
pub struct HashPolicy {
    /// Files larger than this are sampled.
    pub large_threshold_bytes: u64,
    /// Bytes hashed from the start of a sampled file.
    pub head_bytes: u64,
    /// Bytes hashed from the end of a sampled file.
    pub tail_bytes: u64,
    /// Distance between middle samples as a fraction of the file size.
    pub stride_fraction: f64,
    /// Bytes hashed at each middle sample, and the full-hash read size.
    pub block_bytes: u64,
}

impl Default for HashPolicy {
    fn default() -> Self {
        Self {
            large_threshold_bytes: 64 * 1024 * 1024,
            head_bytes: 1024 * 1024,
            tail_bytes: 1024 * 1024,
            stride_fraction: 0.01,
            block_bytes: 64 * 1024,
        }
    }
}

impl HashPolicy {
    /// Validate sampling parameters.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the parameters are inconsistent.
    pub fn validate(&self) -> Result<()> {
        if self.block_bytes == 0 {
            return Err(Error::config("hash block size cannot be 0"));
        }

        if self.head_bytes.saturating_add(self.tail_bytes) > self.large_threshold_bytes {
            return Err(Error::config(
                "hash head and tail must fit within the large-file threshold",
            ));
        }

        if !(self.stride_fraction > 0.0 && self.stride_fraction <= 1.0) {
            return Err(Error::config("hash stride fraction must be in (0, 1]"));
        }

        Ok(())
    }

    /// Distance between middle samples for a file of `size` bytes.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn stride(&self, size: u64) -> u64 {
        ((size as f64 * self.stride_fraction).floor() as u64).max(1)
    }
}

/// Digest a file's contents as lowercase hex.
///
/// `size` is the size observed when the file was stat'ed. Sampling applies
/// only when `sample` is set and `size` exceeds the policy threshold.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be opened or read.
pub fn digest_file(path: &Path, size: u64, sample: bool, policy: &HashPolicy) -> Result<String> {
    let file = File::open(path)?;
    let mut hasher = Hasher::new();

    if sample && size > policy.large_threshold_bytes {
        hash_sampled(file, size, policy, &mut hasher)?;
        tracing::trace!(path = %path.display(), size, "Sampled digest");
    } else {
        let block = usize::try_from(policy.block_bytes).unwrap_or(usize::MAX);
        io::copy(&mut BufReader::with_capacity(block, file), &mut hasher)?;
    }

    Ok(hasher.finalize().to_hex().to_string())
}

fn hash_sampled(mut file: File, size: u64, policy: &HashPolicy, hasher: &mut Hasher) -> io::Result<()> {
    io::copy(&mut (&mut file).take(policy.head_bytes), hasher)?;

    let middle_end = size.saturating_sub(policy.tail_bytes);
    let stride = policy.stride(size);
    let mut offset = policy.head_bytes;
    while offset < middle_end {
        let len = policy.block_bytes.min(middle_end - offset);
        file.seek(SeekFrom::Start(offset))?;
        io::copy(&mut (&mut file).take(len), hasher)?;
        offset = offset.saturating_add(stride);
    }

    file.seek(SeekFrom::Start(middle_end))?;
    io::copy(&mut file.take(policy.tail_bytes), hasher)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn small_policy() -> HashPolicy {
        HashPolicy {
            large_threshold_bytes: 1024,
            head_bytes: 128,
            tail_bytes: 128,
            stride_fraction: 0.1,
            block_bytes: 16,
        }
    }

    fn write_bytes(dir: &TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, bytes).unwrap();
        path
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| u8::try_from(i % 251).unwrap()).collect()
    }

    #[test]
    fn test_full_digest_matches_blake3() {
        let tmp = TempDir::new().unwrap();
        let path = write_bytes(&tmp, "a.txt", b"hello");

        let digest = digest_file(&path, 5, true, &HashPolicy::default()).unwrap();
        assert_eq!(digest, blake3::hash(b"hello").to_hex().to_string());
        assert_eq!(digest.len(), 64);
    }

    #[test]
    fn test_full_digest_detects_any_change() {
        let tmp = TempDir::new().unwrap();
        let a = write_bytes(&tmp, "a.bin", &pattern(500));
        let mut changed = pattern(500);
        changed[250] ^= 0xff;
        let b = write_bytes(&tmp, "b.bin", &changed);

        let policy = small_policy();
        assert_ne!(
            digest_file(&a, 500, true, &policy).unwrap(),
            digest_file(&b, 500, true, &policy).unwrap()
        );
    }

    #[test]
    fn test_sampled_digest_is_deterministic() {
        let tmp = TempDir::new().unwrap();
        let path = write_bytes(&tmp, "big.bin", &pattern(10_000));
        let policy = small_policy();

        let first = digest_file(&path, 10_000, true, &policy).unwrap();
        let second = digest_file(&path, 10_000, true, &policy).unwrap();
        assert_eq!(first, second);
        assert_ne!(first, digest_file(&path, 10_000, false, &policy).unwrap());
    }

    #[test]
    fn test_sampled_digest_sees_head_tail_and_stride_blocks() {
        let tmp = TempDir::new().unwrap();
        let policy = small_policy();
        let original = pattern(10_000);
        let base = digest_file(&write_bytes(&tmp, "base.bin", &original), 10_000, true, &policy)
            .unwrap();

        // head, first stride block (offset 128), last stride block region, tail
        for offset in [5, 130, 9_128 + 3, 9_950] {
            let mut changed = original.clone();
            changed[offset] ^= 0xff;
            let path = write_bytes(&tmp, &format!("c{offset}.bin"), &changed);
            assert_ne!(
                digest_file(&path, 10_000, true, &policy).unwrap(),
                base,
                "change at {offset} should be sampled"
            );
        }
    }

    #[test]
    fn test_sampled_digest_misses_unsampled_middle() {
        let tmp = TempDir::new().unwrap();
        let policy = small_policy();
        let original = pattern(10_000);
        let mut changed = original.clone();
        // stride is 1000: samples at 128..144, 1128..1144, ...
        changed[500] ^= 0xff;

        let a = write_bytes(&tmp, "a.bin", &original);
        let b = write_bytes(&tmp, "b.bin", &changed);

        assert_eq!(
            digest_file(&a, 10_000, true, &policy).unwrap(),
            digest_file(&b, 10_000, true, &policy).unwrap()
        );
        assert_ne!(
            digest_file(&a, 10_000, false, &policy).unwrap(),
            digest_file(&b, 10_000, false, &policy).unwrap()
        );
    }

    #[test]
    fn test_stride_is_at_least_one() {
        let policy = HashPolicy {
            stride_fraction: 0.000_001,
            ..HashPolicy::default()
        };
        assert_eq!(policy.stride(10), 1);
        assert_eq!(small_policy().stride(10_000), 1000);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let err = digest_file(&tmp.path().join("absent"), 0, true, &HashPolicy::default())
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn test_policy_validation() {
        assert!(HashPolicy::default().validate().is_ok());
        assert!(HashPolicy {
            block_bytes: 0,
            ..HashPolicy::default()
        }
        .validate()
        .is_err());
        assert!(HashPolicy {
            stride_fraction: 0.0,
            ..HashPolicy::default()
        }
        .validate()
        .is_err());
    }
}
