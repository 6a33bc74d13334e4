/*!
Tiered membership sets and transition maps keyed by UTF-8 codepoints.

Both structures in this module exploit the bit layout of UTF-8: the
leading byte selects a tier (one tier per encoded length) and the payload
bits of the sequence form a perfect hash within that tier. Single-byte
codepoints land in a dense 256-bit map, so the common ASCII path is a
single indexed bit test, while the larger tiers are only allocated once a
multi-byte codepoint is actually inserted.

Tier hash layout, for a sequence of bytes `a b c d`:

- 1 byte: `a` indexes 256 bits.
- 2 bytes: `((a & 0x1F) << 6) | (b & 0x3F)` indexes 2048 bits.
- 3 bytes: `((a & 0x0F) << 12) | ((b & 0x3F) << 6) | (c & 0x3F)` indexes
  65536 bits.
- 4 bytes: `((a & 7) << 6) | (b & 0x1F)` selects one of 512 optional
  4096-bit inner maps, indexed by `((c & 0x1F) << 6) | (d & 0x1F)`.
*/

use core::fmt;

use alloc::boxed::Box;

use crate::error::Error;
use crate::util::bitmap::Bitmap;
use crate::util::utf8;

const FOUR_NONE_SET: Option<Box<Bitmap<64>>> = None;
const FOUR_NONE_MAP: Option<Box<[u32]>> = None;

#[derive(Clone, Copy, Debug)]
enum Tier {
    One(usize),
    Two(usize),
    Three(usize),
    Four(usize, usize),
}

/// Splits a packed codepoint into its tier and in-tier index.
#[inline(always)]
fn tier_of(cp: u32) -> Tier {
    let a = cp as u8;
    match utf8::len(a) {
        1 => Tier::One(a as usize),
        2 => {
            let b = (cp >> 8) as u8;
            Tier::Two((((a & 0x1F) as usize) << 6) | ((b & 0x3F) as usize))
        }
        3 => {
            let b = (cp >> 8) as u8;
            let c = (cp >> 16) as u8;
            Tier::Three(
                (((a & 0x0F) as usize) << 12)
                    | (((b & 0x3F) as usize) << 6)
                    | ((c & 0x3F) as usize),
            )
        }
        _ => {
            let b = (cp >> 8) as u8;
            let c = (cp >> 16) as u8;
            let d = (cp >> 24) as u8;
            let outer = (((a & 7) as usize) << 6) | ((b & 0x1F) as usize);
            let inner = (((c & 0x1F) as usize) << 6) | ((d & 0x1F) as usize);
            Tier::Four(outer, inner)
        }
    }
}

/// A membership set over the entire Unicode range.
///
/// This is the representation of a compiled character class. Tiers beyond
/// the single-byte one stay unallocated until a codepoint of that width is
/// inserted, so an ASCII-only class costs 32 bytes of bitmap.
#[derive(Clone)]
pub(crate) struct CodepointSet {
    one: Bitmap<4>,
    two: Option<Box<Bitmap<32>>>,
    three: Option<Box<Bitmap<1024>>>,
    four: Option<Box<[Option<Box<Bitmap<64>>>; 512]>>,
}

impl CodepointSet {
    pub(crate) fn new() -> CodepointSet {
        CodepointSet { one: Bitmap::new(), two: None, three: None, four: None }
    }

    /// Inserts a packed codepoint, allocating its tier if needed.
    pub(crate) fn insert(&mut self, cp: u32) {
        match tier_of(cp) {
            Tier::One(i) => self.one.set(i),
            Tier::Two(i) => {
                self.two.get_or_insert_with(|| Box::new(Bitmap::new())).set(i)
            }
            Tier::Three(i) => {
                self.three.get_or_insert_with(|| Box::new(Bitmap::new())).set(i)
            }
            Tier::Four(outer, inner) => {
                let maps =
                    self.four.get_or_insert_with(|| Box::new([FOUR_NONE_SET; 512]));
                maps[outer]
                    .get_or_insert_with(|| Box::new(Bitmap::new()))
                    .set(inner)
            }
        }
    }

    /// Tests a packed codepoint. Unallocated tiers report absence.
    #[inline(always)]
    pub(crate) fn contains(&self, cp: u32) -> bool {
        match tier_of(cp) {
            Tier::One(i) => self.one.test(i),
            Tier::Two(i) => self.two.as_ref().map_or(false, |m| m.test(i)),
            Tier::Three(i) => self.three.as_ref().map_or(false, |m| m.test(i)),
            Tier::Four(outer, inner) => self
                .four
                .as_ref()
                .and_then(|maps| maps[outer].as_ref())
                .map_or(false, |m| m.test(inner)),
        }
    }

    /// Inserts the inclusive range of single-byte codepoints `lo..=hi`.
    pub(crate) fn insert_byte_range(&mut self, lo: u8, hi: u8) {
        for b in lo..=hi {
            self.one.set(b as usize);
        }
    }

    /// Inserts every codepoint of a UTF-8 string.
    ///
    /// Fails with an invalid UTF-8 error if the string truncates in the
    /// middle of a multi-byte sequence or is otherwise ill-formed.
    pub(crate) fn insert_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let mut at = 0;
        while at < bytes.len() {
            let (cp, width) = utf8::decode(bytes, at)?;
            self.insert(cp);
            at += width;
        }
        Ok(())
    }

    /// The total number of member codepoints across all tiers.
    pub(crate) fn count(&self) -> u32 {
        let mut total = self.one.count();
        if let Some(ref m) = self.two {
            total += m.count();
        }
        if let Some(ref m) = self.three {
            total += m.count();
        }
        if let Some(ref maps) = self.four {
            for m in maps.iter().flatten() {
                total += m.count();
            }
        }
        total
    }

    /// Removes every member and releases the multi-byte tiers.
    pub(crate) fn clear(&mut self) {
        self.one.clear();
        self.two = None;
        self.three = None;
        self.four = None;
    }

    /// Adds every member of `other`, allocating tiers in `self` as needed.
    pub(crate) fn union_with(&mut self, other: &CodepointSet) {
        self.one.union_with(&other.one);
        if let Some(ref src) = other.two {
            match self.two {
                Some(ref mut dst) => dst.union_with(src),
                None => self.two = Some(src.clone()),
            }
        }
        if let Some(ref src) = other.three {
            match self.three {
                Some(ref mut dst) => dst.union_with(src),
                None => self.three = Some(src.clone()),
            }
        }
        if let Some(ref srcs) = other.four {
            let dsts = self.four.get_or_insert_with(|| Box::new([FOUR_NONE_SET; 512]));
            for (dst, src) in dsts.iter_mut().zip(srcs.iter()) {
                if let Some(src) = src {
                    match dst {
                        Some(dst) => dst.union_with(src),
                        None => *dst = Some(src.clone()),
                    }
                }
            }
        }
    }

    /// Keeps only members also present in `other`. Tiers absent from
    /// `other` are dropped entirely, since their intersection is empty.
    pub(crate) fn intersect_with(&mut self, other: &CodepointSet) {
        self.one.intersect_with(&other.one);
        match (&mut self.two, &other.two) {
            (Some(dst), Some(src)) => dst.intersect_with(src),
            (dst @ Some(_), None) => *dst = None,
            _ => {}
        }
        match (&mut self.three, &other.three) {
            (Some(dst), Some(src)) => dst.intersect_with(src),
            (dst @ Some(_), None) => *dst = None,
            _ => {}
        }
        match (&mut self.four, &other.four) {
            (Some(dsts), Some(srcs)) => {
                for (dst, src) in dsts.iter_mut().zip(srcs.iter()) {
                    match (dst, src) {
                        (Some(d), Some(s)) => d.intersect_with(s),
                        (dst @ Some(_), None) => *dst = None,
                        _ => {}
                    }
                }
            }
            (four @ Some(_), None) => *four = None,
            _ => {}
        }
    }
}

impl PartialEq for CodepointSet {
    fn eq(&self, other: &CodepointSet) -> bool {
        fn tier_eq<const W: usize>(
            a: &Option<Box<Bitmap<W>>>,
            b: &Option<Box<Bitmap<W>>>,
        ) -> bool {
            match (a, b) {
                (Some(a), Some(b)) => a == b,
                (Some(m), None) | (None, Some(m)) => m.is_empty(),
                (None, None) => true,
            }
        }

        if self.one != other.one
            || !tier_eq(&self.two, &other.two)
            || !tier_eq(&self.three, &other.three)
        {
            return false;
        }
        match (&self.four, &other.four) {
            (Some(a), Some(b)) => {
                a.iter().zip(b.iter()).all(|(x, y)| tier_eq(x, y))
            }
            (Some(maps), None) | (None, Some(maps)) => {
                maps.iter().flatten().all(|m| m.is_empty())
            }
            (None, None) => true,
        }
    }
}

impl Eq for CodepointSet {}

impl fmt::Debug for CodepointSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "CodepointSet({} codepoints: [{}])", self.count(), self)
    }
}

/// Emits the member codepoints as UTF-8 text, tier by tier.
impl fmt::Display for CodepointSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut buf = [0u8; 4];
        let emit = |f: &mut fmt::Formatter, bytes: &[u8]| -> fmt::Result {
            match core::str::from_utf8(bytes) {
                Ok(s) => f.write_str(s),
                Err(_) => Ok(()),
            }
        };
        for i in self.one.iter() {
            buf[0] = i as u8;
            emit(f, &buf[..1])?;
        }
        if let Some(ref m) = self.two {
            for i in m.iter() {
                buf[0] = 0xC0 | (i >> 6) as u8;
                buf[1] = 0x80 | (i & 0x3F) as u8;
                emit(f, &buf[..2])?;
            }
        }
        if let Some(ref m) = self.three {
            for i in m.iter() {
                buf[0] = 0xE0 | (i >> 12) as u8;
                buf[1] = 0x80 | ((i >> 6) & 0x3F) as u8;
                buf[2] = 0x80 | (i & 0x3F) as u8;
                emit(f, &buf[..3])?;
            }
        }
        if let Some(ref maps) = self.four {
            for (outer, m) in maps.iter().enumerate() {
                let Some(m) = m else { continue };
                for inner in m.iter() {
                    buf[0] = 0xF0 | (outer >> 6) as u8;
                    buf[1] = 0x80 | (outer & 0x1F) as u8;
                    buf[2] = 0x80 | ((inner >> 6) & 0x1F) as u8;
                    buf[3] = 0x80 | (inner & 0x1F) as u8;
                    emit(f, &buf[..4])?;
                }
            }
        }
        Ok(())
    }
}

/// A sparse map from codepoints to 32-bit state ids, with the same tier
/// structure as [`CodepointSet`].
///
/// Tier-1 slot 255 can never be a valid UTF-8 leading byte, so it is
/// reserved for the wildcard fallback transition of a DFA state. Absent
/// entries read as [`CodepointMap::NONE`].
#[derive(Clone)]
pub(crate) struct CodepointMap {
    one: Box<[u32; 256]>,
    two: Option<Box<[u32]>>,
    three: Option<Box<[u32]>>,
    four: Option<Box<[Option<Box<[u32]>>; 512]>>,
}

impl CodepointMap {
    /// The "no entry" sentinel.
    pub(crate) const NONE: u32 = u32::MAX;

    const FALLBACK_SLOT: usize = 255;

    pub(crate) fn new() -> CodepointMap {
        CodepointMap {
            one: Box::new([Self::NONE; 256]),
            two: None,
            three: None,
            four: None,
        }
    }

    #[inline(always)]
    pub(crate) fn get(&self, cp: u32) -> u32 {
        match tier_of(cp) {
            Tier::One(i) => self.one[i],
            Tier::Two(i) => self.two.as_ref().map_or(Self::NONE, |m| m[i]),
            Tier::Three(i) => self.three.as_ref().map_or(Self::NONE, |m| m[i]),
            Tier::Four(outer, inner) => self
                .four
                .as_ref()
                .and_then(|maps| maps[outer].as_ref())
                .map_or(Self::NONE, |m| m[inner]),
        }
    }

    pub(crate) fn set(&mut self, cp: u32, value: u32) {
        fn alloc_tier(len: usize) -> Box<[u32]> {
            alloc::vec![CodepointMap::NONE; len].into_boxed_slice()
        }
        match tier_of(cp) {
            Tier::One(i) => self.one[i] = value,
            Tier::Two(i) => {
                self.two.get_or_insert_with(|| alloc_tier(2048))[i] = value
            }
            Tier::Three(i) => {
                self.three.get_or_insert_with(|| alloc_tier(65536))[i] = value
            }
            Tier::Four(outer, inner) => {
                let maps =
                    self.four.get_or_insert_with(|| Box::new([FOUR_NONE_MAP; 512]));
                maps[outer].get_or_insert_with(|| alloc_tier(4096))[inner] = value
            }
        }
    }

    /// The wildcard fallback transition, used when a codepoint has no
    /// specific entry and the owning state's filter excludes it.
    #[inline(always)]
    pub(crate) fn fallback(&self) -> u32 {
        self.one[Self::FALLBACK_SLOT]
    }

    pub(crate) fn set_fallback(&mut self, value: u32) {
        self.one[Self::FALLBACK_SLOT] = value;
    }

    /// Drops every entry but keeps tier allocations for reuse.
    pub(crate) fn clear(&mut self) {
        self.one.fill(Self::NONE);
        if let Some(ref mut m) = self.two {
            m.fill(Self::NONE);
        }
        if let Some(ref mut m) = self.three {
            m.fill(Self::NONE);
        }
        if let Some(ref mut maps) = self.four {
            for m in maps.iter_mut().flatten() {
                m.fill(Self::NONE);
            }
        }
    }
}

impl fmt::Debug for CodepointMap {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let entries: usize = self.one.iter().filter(|&&v| v != Self::NONE).count()
            + self
                .two
                .iter()
                .chain(self.three.iter())
                .flat_map(|m| m.iter())
                .filter(|&&v| v != Self::NONE)
                .count();
        write!(f, "CodepointMap({}+ entries)", entries)
    }
}
