//! String hashing for the table.
//!
//! Two hash functions exist. The default is the classic 31-polynomial
//! over UTF-16 code units: fast, stable across processes, and exposed
//! to guest code, which also makes its collisions computable by an
//! attacker. The alternate is a keyed hash seeded with per-process
//! entropy; the table switches to it when a rehash is triggered, after
//! which chain lengths no longer depend on attacker-chosen contents.

use std::hash::{BuildHasher, Hasher};

/// The hash function currently installed in a table generation.
#[derive(Clone)]
pub(crate) enum TableHasher {
    /// Unseeded 31-polynomial over UTF-16 code units.
    Default,
    /// Seeded keyed hash; collisions are not computable without the seed.
    Alternate(ahash::RandomState),
}

impl TableHasher {
    /// Hash a string under this generation's function.
    pub fn hash(&self, s: &str) -> u32 {
        match self {
            TableHasher::Default => polynomial_hash(s),
            TableHasher::Alternate(state) => {
                let mut hasher = state.build_hasher();
                hasher.write(s.as_bytes());
                fold(hasher.finish())
            }
        }
    }

    /// Whether this is the seeded alternate function.
    pub fn is_alternate(&self) -> bool {
        matches!(self, TableHasher::Alternate(_))
    }

    /// The hash function for the next table generation: the alternate
    /// function under a fresh seed.
    pub fn rotated(&self) -> TableHasher {
        let [k0, k1, k2, k3] = fresh_seeds();
        TableHasher::Alternate(ahash::RandomState::with_seeds(k0, k1, k2, k3))
    }
}

/// The default 31-polynomial over UTF-16 code units.
pub(crate) fn polynomial_hash(s: &str) -> u32 {
    let mut h: u32 = 0;
    for unit in s.encode_utf16() {
        h = h.wrapping_mul(31).wrapping_add(unit as u32);
    }
    h
}

/// Fold a 64-bit hash onto 32 bits without discarding entropy.
#[inline]
fn fold(h: u64) -> u32 {
    (h ^ (h >> 32)) as u32
}

/// Per-process seed material: wall-clock nanoseconds mixed with ASLR'd
/// stack and code addresses, whitened through splitmix64.
fn fresh_seeds() -> [u64; 4] {
    let clock = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0x9E37_79B9_7F4A_7C15);
    let local = 0u8;
    let mut state = clock ^ (&local as *const u8 as u64) ^ ((fresh_seeds as usize as u64) << 17);
    [
        splitmix64(&mut state),
        splitmix64(&mut state),
        splitmix64(&mut state),
        splitmix64(&mut state),
    ]
}

fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polynomial_hash_known_values() {
        // 31-polynomial over UTF-16 code units.
        assert_eq!(polynomial_hash(""), 0);
        assert_eq!(polynomial_hash("a"), 97);
        assert_eq!(polynomial_hash("ab"), 31 * 97 + 98);
    }

    #[test]
    fn test_default_hash_is_deterministic() {
        let hasher = TableHasher::Default;
        assert_eq!(hasher.hash("hello"), hasher.hash("hello"));
        assert!(!hasher.is_alternate());
    }

    #[test]
    fn test_alternate_hash_is_self_consistent() {
        let hasher = TableHasher::Default.rotated();
        assert!(hasher.is_alternate());
        assert_eq!(hasher.hash("hello"), hasher.hash("hello"));
        assert_ne!(hasher.hash("hello"), hasher.hash("world"));
    }

    #[test]
    fn test_rotation_changes_the_seed() {
        let a = TableHasher::Default.rotated();
        let b = a.rotated();
        // With independent seeds, agreeing on many inputs is implausible.
        let collisions = (0..64)
            .filter(|i| a.hash(&format!("key-{i}")) == b.hash(&format!("key-{i}")))
            .count();
        assert!(collisions < 8);
    }
}
