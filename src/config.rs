//! Crate-wide constants for the vault's encryption layer and path syntax.

/// Size of a per-file encryption key in bytes (256 bits for AES-256-GCM).
pub const KEY_LEN: usize = 32;

/// AES-GCM standard nonce size (96 bits / 12 bytes).
pub const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag size (128 bits / 16 bytes).
pub const TAG_LEN: usize = 16;

/// Fixed number of bytes by which a sealed body exceeds its plaintext.
///
/// Ciphertext layout is `nonce || body || tag`, so a non-empty sealed file
/// always satisfies `plaintext_len = ciphertext_len - OVERHEAD`.
pub const OVERHEAD: usize = NONCE_LEN + TAG_LEN;

/// Path separator inside the vault. Always a forward slash, on every OS.
pub const PATH_SEPARATOR: char = '/';

/// List separator for vault path lists.
pub const PATH_LIST_SEPARATOR: char = ':';

/// Reserved temporary-directory path inside the vault.
pub const TEMP_DIR: &str = "/tmp";

/// Prefix that routes a path to the encrypted vault instead of the host OS.
pub const VAULT_PREFIX: &str = "vfs://";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overhead_matches_layout() {
        assert_eq!(OVERHEAD, NONCE_LEN + TAG_LEN);
        assert_eq!(OVERHEAD, 28);
    }
}
