use sha2::{Digest, Sha256};

/// Content fingerprint of a page write: SHA-256 over path, title, and
/// content with null-byte separators so adjacent fields cannot alias
/// (`"ab" + "c"` vs `"a" + "bc"`). Full lowercase hex.
pub fn derive_idempotency_key(path: &str, title: &str, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.as_bytes());
    hasher.update(b"\x00");
    hasher.update(title.as_bytes());
    hasher.update(b"\x00");
    hasher.update(content.as_bytes());
    let digest = hasher.finalize();

    let mut output = String::with_capacity(digest.len() * 2);
    for byte in digest.iter() {
        output.push_str(&format!("{byte:02x}"));
    }
    output
}
