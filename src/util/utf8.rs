/*!
Utilities for dealing with UTF-8 as a sequence of packed codepoints.

Throughout this crate, a "codepoint" is the 1-4 bytes of a UTF-8 encoded
Unicode scalar value packed little-endian into a `u32`: byte 0 of the
encoding lives in bits 0-7, byte 1 in bits 8-15 and so on. This packing is
cheap to build while scanning a haystack, cheap to compare against the
`data` payload of a `Char` instruction and cheap to split back into the
tier indices used by [`CodepointSet`](crate::util::classes::CodepointSet).
*/

use crate::error::Error;

/// Given a UTF-8 leading byte, returns the total number of bytes in the
/// encoded codepoint.
///
/// This uses a fixed partition of the byte space and never fails: bytes
/// that cannot start a valid encoding (continuation bytes, `0xF8..=0xFF`)
/// are rejected by [`decode`], not here.
#[inline(always)]
pub(crate) fn len(lead: u8) -> usize {
    if lead < 0xC0 {
        1
    } else if lead < 0xE0 {
        2
    } else if lead < 0xF0 {
        3
    } else {
        4
    }
}

/// Decodes the codepoint starting at `at` in `bytes`.
///
/// Returns the packed little-endian codepoint and its width in bytes. If
/// the bytes at `at` are not a well formed UTF-8 sequence (a continuation
/// byte in leading position, a `>= 0xF8` lead, a truncated sequence or a
/// wrong continuation byte), this returns an invalid UTF-8 error carrying
/// the offending offset. There is no replacement-character substitution.
///
/// Panics if `at >= bytes.len()`.
#[inline(always)]
pub(crate) fn decode(bytes: &[u8], at: usize) -> Result<(u32, usize), Error> {
    let lead = bytes[at];
    if (0x80..0xC0).contains(&lead) || lead >= 0xF8 {
        return Err(Error::invalid_utf8(at));
    }
    let width = len(lead);
    if at + width > bytes.len() {
        return Err(Error::invalid_utf8(at));
    }
    let mut cp = u32::from(lead);
    for k in 1..width {
        let b = bytes[at + k];
        if b & 0b1100_0000 != 0b1000_0000 {
            return Err(Error::invalid_utf8(at + k));
        }
        cp |= u32::from(b) << (8 * k);
    }
    Ok((cp, width))
}

/// Unpacks a packed codepoint back into its UTF-8 bytes.
///
/// Writes into `buf` and returns the number of bytes written. The inverse
/// of [`decode`] for any value produced by it.
#[inline]
pub(crate) fn encode(cp: u32, buf: &mut [u8; 4]) -> usize {
    let width = len(cp as u8);
    for (k, slot) in buf.iter_mut().enumerate().take(width) {
        *slot = (cp >> (8 * k)) as u8;
    }
    width
}

/// Returns the leading byte of a packed codepoint.
#[inline(always)]
pub(crate) fn lead(cp: u32) -> u8 {
    cp as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn len_partition() {
        assert_eq!(1, len(0x00));
        assert_eq!(1, len(b'a'));
        assert_eq!(1, len(0x7F));
        assert_eq!(1, len(0xBF));
        assert_eq!(2, len(0xC2));
        assert_eq!(2, len(0xDF));
        assert_eq!(3, len(0xE0));
        assert_eq!(3, len(0xEF));
        assert_eq!(4, len(0xF0));
        assert_eq!(4, len(0xF4));
    }

    #[test]
    fn decode_ascii() {
        let (cp, w) = decode(b"abc", 1).unwrap();
        assert_eq!(u32::from(b'b'), cp);
        assert_eq!(1, w);
    }

    #[test]
    fn decode_multibyte() {
        // U+00E9 'é' is C3 A9.
        let (cp, w) = decode("é".as_bytes(), 0).unwrap();
        assert_eq!(0xA9C3, cp);
        assert_eq!(2, w);
        // U+1F60A '😊' is F0 9F 98 8A.
        let (cp, w) = decode("😊".as_bytes(), 0).unwrap();
        assert_eq!(0x8A989FF0, cp);
        assert_eq!(4, w);
    }

    #[test]
    fn decode_rejects_continuation_lead() {
        let err = decode(&[0x98, b'a'], 0).unwrap_err();
        assert!(err.is_invalid_utf8());
    }

    #[test]
    fn decode_rejects_truncation() {
        let err = decode(&[0xF0, 0x9F], 0).unwrap_err();
        assert!(err.is_invalid_utf8());
    }

    #[test]
    fn decode_rejects_bad_continuation() {
        let err = decode(&[0xC3, b'a'], 0).unwrap_err();
        assert!(err.is_invalid_utf8());
    }

    #[test]
    fn decode_rejects_invalid_lead() {
        let err = decode(&[0xF8, 0x80, 0x80, 0x80], 0).unwrap_err();
        assert!(err.is_invalid_utf8());
    }

    #[test]
    fn encode_round_trips() {
        let mut buf = [0u8; 4];
        for s in ["a", "é", "ह", "😊"] {
            let (cp, w) = decode(s.as_bytes(), 0).unwrap();
            assert_eq!(w, encode(cp, &mut buf));
            assert_eq!(s.as_bytes(), &buf[..w]);
        }
    }
}
