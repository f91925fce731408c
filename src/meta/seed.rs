//! Pure string hashing used to derive stable pseudo-random display values.
//!
//! Values depend only on the input string, so every view that derives the
//! metadata of a post independently lands on the same numbers.

/// `acc * 31 + unit` over the string with 32-bit wrapping arithmetic.
///
/// Each code point contributes the first UTF-16 unit of its encoding, so
/// keys hash to the same values the browser front end computes.
pub fn hash(key: &str) -> i32 {
    let mut units = [0u16; 2];
    key.chars().fold(0i32, |acc, ch| {
        let unit = ch.encode_utf16(&mut units)[0];
        acc.wrapping_shl(5).wrapping_sub(acc).wrapping_add(unit as i32)
    })
}

/// Bucket of `hash(key)` in `0..buckets`, used to pick from fixed tables.
pub fn bucket(key: &str, buckets: usize) -> usize {
    if buckets == 0 {
        return 0;
    }
    ((hash(key) as i64).unsigned_abs() % buckets as u64) as usize
}

/// Fraction in `[0, 1)` with a 1/10000 resolution, seeded by `key` and `salt`.
pub fn seed01(key: &str, salt: &str) -> f64 {
    let seeded = format!("{}::{}", key, salt);
    bucket(&seeded, 10_000) as f64 / 10_000.0
}
