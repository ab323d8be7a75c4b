//! Byte-threshold strings (`"4096"`, `"64K"`, `"2MB"`).

use regex::Regex;
use std::sync::LazyLock;

static BYTES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(\d+)\s*([kmg])?b?\s*$").unwrap()
});

/// Parse a byte count with an optional binary K/M/G suffix.
///
/// Returns `None` for zero, malformed input, or values above `u32::MAX`.
pub fn parse_byte_threshold(text: &str) -> Option<u32> {
    let caps = BYTES.captures(text)?;
    let value: u64 = caps[1].parse().ok()?;
    let scale: u64 = match caps.get(2).map(|m| m.as_str().to_ascii_lowercase()) {
        None => 1,
        Some(unit) => match unit.as_str() {
            "k" => 1 << 10,
            "m" => 1 << 20,
            _ => 1 << 30,
        },
    };
    let bytes = value.checked_mul(scale)?;
    if bytes == 0 {
        return None;
    }
    u32::try_from(bytes).ok()
}
