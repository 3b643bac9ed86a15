use std::sync::LazyLock;

use md5::{Digest, Md5};
use regex::Regex;

use crate::normalize::clean;

static PLAIN_KEY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\w-]+$").unwrap());

const MAX_PLAIN_KEY: usize = 20;
const HASH_LEN: usize = 10;

/// Stable record id: `{SOURCE}-{KEY}`.
///
/// References of at most 20 word characters or hyphens are used verbatim;
/// anything else (including a missing reference, keyed as `"unknown"`) is
/// hashed to the first 10 hex digits of its MD5.
pub fn make_id(source_code: &str, reference: Option<&str>) -> String {
    let prefix = source_code.to_uppercase();
    match reference.map(clean).filter(|k| !k.is_empty()) {
        Some(key) if key.chars().count() <= MAX_PLAIN_KEY && PLAIN_KEY_RE.is_match(&key) => {
            format!("{prefix}-{key}")
        }
        Some(key) => format!("{prefix}-{}", short_hash(&key)),
        None => format!("{prefix}-{}", short_hash("unknown")),
    }
}

pub(crate) fn short_hash(key: &str) -> String {
    let digest = Md5::digest(key.as_bytes());
    let mut hex = String::with_capacity(HASH_LEN);
    for byte in digest.iter().take(HASH_LEN / 2) {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_reference_kept() {
        assert_eq!(make_id("polyu", Some("2501001")), "POLYU-2501001");
        assert_eq!(make_id("HKU", Some(" AB_12-x ")), "HKU-AB_12-x");
    }

    #[test]
    fn deterministic() {
        let a = make_id("EDUHK", Some("Lecturer in English_Department of"));
        let b = make_id("EDUHK", Some("Lecturer in English_Department of"));
        assert_eq!(a, b);
        // pinned to the ids of the existing dataset
        assert_eq!(short_hash("unknown"), "ad921d6048");
        assert_eq!(
            make_id("EDUHK", Some("Visiting Scholar_Faculty of Educatio")),
            "EDUHK-2687ace8b0"
        );
    }

    #[test]
    fn long_or_odd_references_are_hashed() {
        let long = make_id("CUHK", Some("123456789012345678901"));
        assert!(long.starts_with("CUHK-"));
        assert_eq!(long.len(), "CUHK-".len() + 10);
        assert!(long[5..].chars().all(|c| c.is_ascii_hexdigit()));

        let spaced = make_id("CUHK", Some("Lecturer|Dept"));
        assert_ne!(spaced, "CUHK-Lecturer|Dept");
        assert_eq!(spaced.len(), "CUHK-".len() + 10);

        // exactly 20 characters is still plain
        assert_eq!(make_id("HKU", Some("12345678901234567890")), "HKU-12345678901234567890");
    }

    #[test]
    fn missing_reference_hashes_unknown() {
        assert_eq!(make_id("LU", None), "LU-ad921d6048");
        assert_eq!(make_id("lu", Some("   ")), "LU-ad921d6048");
    }

    #[test]
    fn source_prefix_separates_equal_references() {
        assert_ne!(make_id("HKU", Some("42")), make_id("CUHK", Some("42")));
        assert_ne!(make_id("HKU", Some("x y")), make_id("CUHK", Some("x y")));
    }

    #[test]
    fn distinct_references_do_not_collide() {
        let ids: std::collections::HashSet<_> = (0..2000)
            .map(|i| make_id("HKBU", Some(&format!("reference number {i}"))))
            .collect();
        assert_eq!(ids.len(), 2000);
    }
}
