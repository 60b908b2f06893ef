//! String table configuration parameters.

use crate::claim::CLAIM_CHUNK_SIZE;

/// Configuration for the interned-string table.
#[derive(Debug, Clone)]
pub struct StringTableConfig {
    /// Number of hash buckets.
    ///
    /// Fixed for the life of the table except across a rehash, which
    /// rebuilds the bucket array wholesale. A prime count spreads
    /// modulo-reduced hashes more evenly.
    ///
    /// Default: 60013
    pub bucket_count: usize,

    /// Chain length beyond which a lookup requests a rehash.
    ///
    /// A chain this long under the default hash is strong evidence of
    /// either gross undersizing or a hash-flood attempt; the next
    /// safepoint rebuilds the table with a freshly seeded hash.
    ///
    /// Default: 100
    pub rehash_threshold: usize,

    /// Allow switching to seeded alternate hashing on rehash.
    ///
    /// When disabled, rehash requests are ignored: rebuilding with the
    /// same unseeded hash would reproduce the same chains.
    ///
    /// Default: true
    pub use_alternate_hashing: bool,

    /// Buckets claimed per atomic fetch-add during parallel sweeping.
    ///
    /// Default: 32
    pub claim_chunk_size: usize,
}

impl Default for StringTableConfig {
    fn default() -> Self {
        Self {
            bucket_count: 60013,
            rehash_threshold: 100,
            use_alternate_hashing: true,
            claim_chunk_size: CLAIM_CHUNK_SIZE,
        }
    }
}

impl StringTableConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), TableConfigError> {
        if self.bucket_count == 0 {
            return Err(TableConfigError::ZeroBuckets);
        }
        if self.rehash_threshold == 0 {
            return Err(TableConfigError::ZeroRehashThreshold);
        }
        if self.claim_chunk_size == 0 {
            return Err(TableConfigError::ZeroClaimChunk);
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableConfigError {
    /// The table needs at least one bucket.
    ZeroBuckets,
    /// The rehash threshold must be non-zero.
    ZeroRehashThreshold,
    /// The claim chunk size must be non-zero.
    ZeroClaimChunk,
}

impl std::fmt::Display for TableConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableConfigError::ZeroBuckets => write!(f, "bucket count must be non-zero"),
            TableConfigError::ZeroRehashThreshold => {
                write!(f, "rehash threshold must be non-zero")
            }
            TableConfigError::ZeroClaimChunk => write!(f, "claim chunk size must be non-zero"),
        }
    }
}

impl std::error::Error for TableConfigError {}
