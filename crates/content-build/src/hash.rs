//! The target-path hash, `spec.md` §3 / §9 "Hash function".
//!
//! Defined over UTF-16 code units (not UTF-8 bytes) so that the on-disk
//! target path mapping stays bit-compatible with implementations in
//! languages whose native string representation is UTF-16. This is a
//! compatibility constraint, not a property of a good hash: do not
//! "improve" it.

/// Hashes `resource_name`'s UTF-16 code units with a rotating 32-bit
/// accumulator: `h = (h << 7) + (h >>> 25) + ch`, arithmetic on signed
/// 32-bit integers with wraparound, starting from `h = 0`.
pub fn hash_resource_name(resource_name: &str) -> i32 {
    let mut h: i32 = 0;
    for unit in resource_name.encode_utf16() {
        let ch = i32::from(unit);
        let left = h.wrapping_shl(7);
        let right = ((h as u32) >> 25) as i32;
        h = left.wrapping_add(right).wrapping_add(ch);
    }
    h
}

/// Formats the hash of `resource_name` as lowercase hex, matching the
/// stem convention used for target paths.
pub fn target_stem(resource_name: &str) -> String {
    format!("{:x}", hash_resource_name(resource_name) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_deterministic() {
        assert_eq!(target_stem("hello"), target_stem("hello"));
    }

    #[test]
    fn depends_only_on_name() {
        // Two different but equal-content strings hash identically;
        // distinct names (almost certainly) do not collide.
        assert_ne!(target_stem("hello"), target_stem("world"));
    }

    #[test]
    fn empty_name_hashes_to_zero() {
        assert_eq!(target_stem(""), "0");
    }

    #[test]
    fn matches_reference_accumulator_for_short_ascii_name() {
        // h starts at 0; for "ab": h = (0<<7 + 0>>>25 + 'a') = 97;
        // then h = (97<<7 + 97>>>25 + 'b') = 12416 + 0 + 98 = 12514.
        let mut h: i32 = 0;
        for ch in ['a', 'b'] {
            h = h.wrapping_shl(7).wrapping_add(((h as u32) >> 25) as i32) + (ch as i32);
        }
        assert_eq!(hash_resource_name("ab"), h);
    }
}
