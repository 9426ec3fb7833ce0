//! Compression Module
//!
//! Run-length encoding for long text payloads.
//!
//! Each run is written as `<count>:<char>`. The character after the colon is
//! taken verbatim, so digits and colons in the input need no escaping.

use crate::cache::Payload;

/// Text payloads longer than this many characters are candidates.
pub const COMPRESSION_THRESHOLD: usize = 1000;

/// Largest output [`decompress`] will produce, in characters.
pub const MAX_DECOMPRESSED_CHARS: usize = 64 * 1024 * 1024;

// == Compress ==
/// Run-length encodes `input`.
pub fn compress(input: &str) -> String {
    let mut out = String::with_capacity(input.len() / 2);
    let mut chars = input.chars().peekable();

    while let Some(current) = chars.next() {
        let mut count = 1usize;
        while chars.peek() == Some(&current) {
            chars.next();
            count += 1;
        }
        out.push_str(&count.to_string());
        out.push(':');
        out.push(current);
    }

    out
}

// == Decompress ==
/// Reverses [`compress`]. Returns `None` on malformed input or when the
/// output would exceed [`MAX_DECOMPRESSED_CHARS`].
pub fn decompress(input: &str) -> Option<String> {
    let mut out = String::with_capacity(input.len() * 2);
    let mut chars = input.chars();
    let mut total = 0usize;

    loop {
        let mut count = 0usize;
        let mut digits = 0;
        loop {
            match chars.next() {
                None if digits == 0 => return Some(out),
                None => return None,
                Some(':') if digits > 0 => break,
                Some(c) => {
                    let digit = c.to_digit(10)? as usize;
                    count = count.checked_mul(10)?.checked_add(digit)?;
                    digits += 1;
                }
            }
        }
        let ch = chars.next()?;
        total = total.checked_add(count)?;
        if total > MAX_DECOMPRESSED_CHARS {
            return None;
        }
        out.extend(std::iter::repeat(ch).take(count));
    }
}

// == Payload Encoding ==
/// Compresses a payload for storage when enabled and worthwhile.
///
/// Returns the payload to store and whether it was compressed. Only text
/// above [`COMPRESSION_THRESHOLD`] whose encoding is actually shorter gets
/// compressed.
pub fn encode(payload: Payload, enabled: bool) -> (Payload, bool) {
    match payload {
        Payload::Text(text) if enabled && text.chars().count() > COMPRESSION_THRESHOLD => {
            let encoded = compress(&text);
            if encoded.len() < text.len() {
                (Payload::Text(encoded), true)
            } else {
                (Payload::Text(text), false)
            }
        }
        other => (other, false),
    }
}

/// Restores a stored payload to its logical form.
pub fn decode(payload: Payload, compressed: bool) -> Option<Payload> {
    match payload {
        Payload::Text(text) if compressed => decompress(&text).map(Payload::Text),
        other => Some(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compress_runs() {
        assert_eq!(compress("aaabcc"), "3:a1:b2:c");
        assert_eq!(decompress("3:a1:b2:c").as_deref(), Some("aaabcc"));
    }

    #[test]
    fn test_roundtrip_edge_cases() {
        let long_run = "x".repeat(5000);
        let cases = ["", "a", "1:2:3", "::::", "112233", long_run.as_str(), "héllo wörld ✓✓✓"];
        for case in cases {
            assert_eq!(decompress(&compress(case)).as_deref(), Some(case));
        }
    }

    #[test]
    fn test_decompress_rejects_malformed() {
        assert!(decompress("3").is_none());
        assert!(decompress("3:").is_none());
        assert!(decompress(":a").is_none());
        assert!(decompress("x:a").is_none());
    }

    #[test]
    fn test_decompress_rejects_oversized_runs() {
        assert!(decompress("1000000000000000000:a").is_none());
        assert!(decompress(&format!("{}:a", MAX_DECOMPRESSED_CHARS + 1)).is_none());

        let half = MAX_DECOMPRESSED_CHARS / 2 + 1;
        assert!(decompress(&format!("{}:a{}:b", half, half)).is_none());
    }

    #[test]
    fn test_encode_skips_short_text() {
        let (payload, compressed) = encode(Payload::Text("a".repeat(10)), true);
        assert!(!compressed);
        assert_eq!(payload, Payload::Text("a".repeat(10)));
    }

    #[test]
    fn test_encode_compresses_long_repetitive_text() {
        let text = "a".repeat(2000);
        let (payload, compressed) = encode(Payload::Text(text.clone()), true);
        assert!(compressed);
        assert_eq!(payload, Payload::Text("2000:a".to_string()));
        assert_eq!(decode(payload, compressed), Some(Payload::Text(text)));
    }

    #[test]
    fn test_encode_keeps_varied_text_raw() {
        let text: String = (0..2000).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let (payload, compressed) = encode(Payload::Text(text.clone()), true);
        assert!(!compressed);
        assert_eq!(payload, Payload::Text(text));
    }

    #[test]
    fn test_encode_disabled_passes_through() {
        let text = "b".repeat(2000);
        let (payload, compressed) = encode(Payload::Text(text.clone()), false);
        assert!(!compressed);
        assert_eq!(payload, Payload::Text(text));
    }
}
