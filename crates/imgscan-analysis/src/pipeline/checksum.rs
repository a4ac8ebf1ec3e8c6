//! Stage checksums: xxh3 over the definition followed by sorted parameters.

use std::collections::BTreeMap;

use xxhash_rust::xxh3::Xxh3;

/// Checksum deciding whether a stage may be skipped on re-analysis.
///
/// Parameters are fed in key order with separators, so changing any value
/// (or adding a key) changes the checksum.
pub fn stage_checksum(definition: &[u8], params: &BTreeMap<String, String>) -> String {
    let mut hasher = Xxh3::new();
    hasher.update(definition);
    for (key, value) in params {
        hasher.update(b"\0");
        hasher.update(key.as_bytes());
        hasher.update(b"=");
        hasher.update(value.as_bytes());
    }
    format!("{:016x}", hasher.digest())
}
