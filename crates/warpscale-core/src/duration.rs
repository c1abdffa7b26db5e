//! Duration strings like "60s", "5m", "7d", "1w".

/// Parse a duration string into seconds.
///
/// Accepts a non-negative integer with an optional unit suffix
/// (`s`, `m`, `h`, `d`, `w`); a bare number is seconds. Returns `None`
/// for anything else.
pub fn parse_duration_secs(s: &str) -> Option<u64> {
    let s = s.trim();
    let (digits, multiplier) = match s.char_indices().last()? {
        (i, 's') => (&s[..i], 1),
        (i, 'm') => (&s[..i], 60),
        (i, 'h') => (&s[..i], 60 * 60),
        (i, 'd') => (&s[..i], 24 * 60 * 60),
        (i, 'w') => (&s[..i], 7 * 24 * 60 * 60),
        _ => (s, 1),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u64>().ok()?.checked_mul(multiplier)
}
