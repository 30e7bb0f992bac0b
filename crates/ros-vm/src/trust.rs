//! Content hashing for the standard-library trust check.

use sha2::{Digest, Sha512};

/// Hex SHA-512 over `filename`, a newline, then the text.
///
/// The embedded stdlib is hashed with an empty filename; a buffer earns the
/// trusted flag only when its registration-time hash equals the configured
/// stdlib hash. The same digest labels the faulting buffer in state dumps.
pub fn stable_hash(text: &str, filename: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(filename.as_bytes());
    hasher.update(b"\n");
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(stable_hash("print hi", ""), stable_hash("print hi", ""));
    }

    #[test]
    fn hash_is_128_hex_chars() {
        let h = stable_hash("print hi", "");
        assert_eq!(h.len(), 128);
        assert!(h.bytes().all(|b| b.is_ascii_hexdigit()));
    }

    #[test]
    fn text_changes_the_hash() {
        assert_ne!(stable_hash("print hi", ""), stable_hash("print ho", ""));
    }

    #[test]
    fn filename_is_part_of_the_hash() {
        assert_ne!(stable_hash("print hi", "a.ros"), stable_hash("print hi", "b.ros"));
        assert_ne!(stable_hash("print hi", "a.ros"), stable_hash("print hi", ""));
    }
}
