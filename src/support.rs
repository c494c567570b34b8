//! Endianness, timestamp and string helpers shared by the parser and
//! transport layers.

/// `true` when the host CPU is little-endian.
pub fn is_little_endian() -> bool {
    cfg!(target_endian = "little")
}

/// Parse a 4-byte big-endian timestamp off the wire into a host-ordered
/// value. `from_be_bytes` already performs the swap only when the host
/// is little-endian, so the result is endian-independent by construction.
pub fn parse_timestamp(bytes: [u8; 4]) -> u32 {
    u32::from_be_bytes(bytes)
}

/// Find the first occurrence of `needle` in `haystack`, or `None`.
pub fn pattern_search(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Parse the last whitespace-separated decimal token of an ASCII reply
/// line, after verifying it begins with `prefix`. Covers the `arg <param>
/// <value>`, `arr <pin> <mV>`, `ary <len>` and `arf <id>` reply shapes of
/// spec §6, all of which carry their payload as the final token.
pub fn parse_trailing_u32(line: &[u8], prefix: &[u8]) -> Option<u32> {
    if !line.starts_with(prefix) {
        return None;
    }
    let text = std::str::from_utf8(line).ok()?;
    let trimmed = text.trim_end_matches(['\r', '\n', '\0']);
    trimmed.trim().rsplit(' ').next()?.parse().ok()
}

/// Parse an `ari <text>` identification reply into the firmware string:
/// the token after the last `:` in the line, matching the device's
/// `vendor:model:version`-shaped identification string.
pub fn parse_after_last_colon(line: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(line).ok()?;
    let trimmed = text.trim_end_matches(['\r', '\n', '\0']);
    let (_, after) = trimmed.rsplit_once(':')?;
    Some(after.trim().to_string())
}

/// Truncate (by byte length, not char boundary split) a string to at most
/// `max` bytes, used to bound the session's last-error string to 80
/// characters.
pub fn truncate_to(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_round_trip_is_endian_independent() {
        assert_eq!(parse_timestamp([0x00, 0x00, 0x01, 0x00]), 256);
    }

    #[test]
    fn pattern_search_finds_anywhere_in_chunk() {
        let hay = b"junk\x61\x72\x6f\r\nmore";
        assert_eq!(pattern_search(hay, b"aro\r\n"), Some(4));
        assert_eq!(pattern_search(hay, b"nope"), None);
    }

    #[test]
    fn pattern_search_empty_needle_is_none() {
        assert_eq!(pattern_search(b"abc", b""), None);
    }

    #[test]
    fn truncate_to_bounds_last_error_length() {
        let long = "x".repeat(200);
        assert_eq!(truncate_to(&long, 80).len(), 80);
        assert_eq!(truncate_to("short", 80), "short");
    }

    #[test]
    fn parse_trailing_u32_reads_final_token() {
        assert_eq!(parse_trailing_u32(b"arr 16 12345\r\n", b"arr"), Some(12345));
        assert_eq!(parse_trailing_u32(b"arg 1 500000\r\n", b"arg"), Some(500000));
        assert_eq!(parse_trailing_u32(b"arf 7\r\n", b"arf"), Some(7));
        assert_eq!(parse_trailing_u32(b"ae 9\r\n", b"arf"), None);
    }

    #[test]
    fn parse_after_last_colon_extracts_firmware_token() {
        assert_eq!(
            parse_after_last_colon(b"ari openport:2.0:v1.4\r\n"),
            Some("v1.4".to_string())
        );
    }
}
