use sha2::{Digest, Sha256};

/// Deterministic content-addressed hash of a sequence of string parts, joined by
/// a separator byte that cannot appear in the parts themselves. Used to key the
/// classification, rerank, theme/intro, and scene-director caches (spec §3, §4.9).
pub fn fingerprint(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}
