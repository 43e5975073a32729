//! Cryptographic helpers for Sealed Compare
//!
//! Domain-separated SHA-256 hashing used to derive ciphertext handles,
//! input proofs and attestation messages, plus Keccak-256 for the
//! EIP-712-style authorization digests.

use constant_time_eq::constant_time_eq;
use sha2::{Digest, Sha256};
use sha3::Keccak256;

/// Create a domain-separated secure hash using SHA-256
///
/// # Arguments
///
/// * `domain` - Domain prefix (e.g., "SEALED_HANDLE")
/// * `data` - Data to hash
///
/// # Returns
///
/// A 32-byte secure hash with domain separation
pub fn secure_hash(domain: &str, data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();

    hasher.update(domain.as_bytes());
    // Domain length byte keeps variable-length domains unambiguous
    hasher.update([domain.len() as u8]);
    hasher.update(data);

    hasher.finalize().into()
}

/// Create a domain-separated secure hash of multiple inputs
///
/// Every element is length-prefixed, so `["ab", "c"]` and `["a", "bc"]`
/// hash differently.
pub fn secure_hash_multiple(domain: &str, data: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();

    hasher.update(domain.as_bytes());
    hasher.update([domain.len() as u8]);
    hasher.update([data.len() as u8]);

    for element in data {
        hasher.update((element.len() as u32).to_be_bytes());
        hasher.update(element);
    }

    hasher.finalize().into()
}

/// Verify a 32-byte tag in constant time
pub fn verify_hash(expected: &[u8; 32], actual: &[u8]) -> bool {
    actual.len() == 32 && constant_time_eq(expected, actual)
}

/// Keccak-256 of the concatenation of `parts`
pub fn keccak256(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Left-pad a big-endian integer into a 32-byte ABI word
pub fn abi_word_u64(value: u64) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Left-pad a 20-byte address into a 32-byte ABI word
pub fn abi_word_address(address: &[u8; 20]) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address);
    word
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secure_hash() {
        let data = b"test data";
        let hash = secure_hash("TEST", data);

        assert_eq!(hash, secure_hash("TEST", data));
        assert_ne!(hash, secure_hash("DIFFERENT", data));
        assert_ne!(hash, secure_hash("TEST", b"different data"));
    }

    #[test]
    fn test_secure_hash_multiple() {
        let data1 = b"data1";
        let data2 = b"data2";

        let hash = secure_hash_multiple("TEST", &[data1, data2]);

        assert_eq!(hash, secure_hash_multiple("TEST", &[data1, data2]));
        assert_ne!(hash, secure_hash_multiple("DIFFERENT", &[data1, data2]));
        assert_ne!(hash, secure_hash_multiple("TEST", &[data2, data1]));

        // Concatenation should not collide
        let mut concatenated = Vec::new();
        concatenated.extend_from_slice(data1);
        concatenated.extend_from_slice(data2);
        assert_ne!(hash, secure_hash("TEST", &concatenated));
    }

    #[test]
    fn test_verify_hash() {
        let hash = secure_hash("TEST", b"test data");

        assert!(verify_hash(&hash, &hash));
        assert!(!verify_hash(&hash, &secure_hash("TEST", b"other")));
        assert!(!verify_hash(&hash, &hash[..31]));
    }

    #[test]
    fn test_keccak256_known_vector() {
        // keccak256("") from the Ethereum yellow paper
        assert_eq!(
            hex::encode(keccak256(&[])),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
        assert_eq!(keccak256(&[b"ab", b"c"]), keccak256(&[b"abc"]));
    }

    #[test]
    fn test_abi_words() {
        let word = abi_word_u64(1);
        assert_eq!(word[31], 1);
        assert!(word[..31].iter().all(|b| *b == 0));

        let word = abi_word_address(&[0xff; 20]);
        assert!(word[..12].iter().all(|b| *b == 0));
        assert!(word[12..].iter().all(|b| *b == 0xff));
    }
}
