//! Content-addressed cache keys.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::types::FetchDepth;

/// Identifies one cached report: `(video_id, pipeline_version, depth)`.
///
/// `digest` is the lowercase hex SHA-256 of the three components joined by
/// the ASCII unit separator, so equal inputs always land on the same record
/// and a pipeline version bump lands on a different one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    video_id: String,
    pipeline_version: u32,
    depth: FetchDepth,
    digest: String,
}

impl CacheKey {
    #[must_use]
    pub fn new(video_id: &str, pipeline_version: u32, depth: FetchDepth) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(video_id.as_bytes());
        hasher.update([0x1f]);
        hasher.update(pipeline_version.to_string().as_bytes());
        hasher.update([0x1f]);
        hasher.update(depth.as_str().as_bytes());
        let digest = hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect();

        Self {
            video_id: video_id.to_string(),
            pipeline_version,
            depth,
            digest,
        }
    }

    #[must_use]
    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    #[must_use]
    pub fn pipeline_version(&self) -> u32 {
        self.pipeline_version
    }

    #[must_use]
    pub fn depth(&self) -> FetchDepth {
        self.depth
    }

    #[must_use]
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@v{}/{} ({})",
            self.video_id,
            self.pipeline_version,
            self.depth,
            &self.digest[..12]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_deterministic() {
        let a = CacheKey::new("abc123", 1, FetchDepth::Full);
        let b = CacheKey::new("abc123", 1, FetchDepth::Full);
        assert_eq!(a, b);
        assert_eq!(a.digest().len(), 64);
    }

    #[test]
    fn version_bump_changes_digest() {
        let v1 = CacheKey::new("abc123", 1, FetchDepth::Full);
        let v2 = CacheKey::new("abc123", 2, FetchDepth::Full);
        assert_ne!(v1.digest(), v2.digest());
    }

    #[test]
    fn depth_changes_digest() {
        let meta = CacheKey::new("abc123", 1, FetchDepth::MetadataOnly);
        let full = CacheKey::new("abc123", 1, FetchDepth::Full);
        assert_ne!(meta.digest(), full.digest());
    }

    #[test]
    fn separator_prevents_component_bleed() {
        // Without a separator "vid1"+"12" and "vid11"+"2" hash identical bytes.
        let a = CacheKey::new("vid1", 12, FetchDepth::Full);
        let b = CacheKey::new("vid11", 2, FetchDepth::Full);
        assert_ne!(a.digest(), b.digest());
    }
}
