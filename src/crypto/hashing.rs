//! Domain separated Blake2b hashing

use blake2::{Blake2b, Blake2b512};
use digest::{
    consts::{U20, U32},
    Digest,
};

type Blake2b160 = Blake2b<U20>;
type Blake2b256 = Blake2b<U32>;

/// 64 byte hash of `parts` under `domain`. Each part is length prefixed so
/// that concatenation boundaries cannot be shifted.
pub fn domain_hash_wide(domain: &str, parts: &[&[u8]]) -> [u8; 64] {
    let mut hasher = Blake2b512::new();
    hasher.update((domain.len() as u64).to_le_bytes());
    hasher.update(domain.as_bytes());
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// 32 byte hash of `parts` under `domain`
pub fn domain_hash(domain: &str, parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update((domain.len() as u64).to_le_bytes());
    hasher.update(domain.as_bytes());
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// 20 byte public key hash used by pay-to-public-key-hash scripts
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let mut hasher = Blake2b160::new();
    hasher.update(data);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_separation() {
        let a = domain_hash("one", &[b"payload"]);
        let b = domain_hash("two", &[b"payload"]);
        assert_ne!(a, b);
        assert_eq!(a, domain_hash("one", &[b"payload"]));
    }

    #[test]
    fn test_part_boundaries_matter() {
        let a = domain_hash("d", &[b"ab", b"c"]);
        let b = domain_hash("d", &[b"a", b"bc"]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash160_length() {
        assert_eq!(hash160(b"key").len(), 20);
        assert_ne!(hash160(b"key"), hash160(b"kez"));
    }
}
