/*!
A candidate-byte prefilter for unanchored existence tests.

When every consuming instruction in the stripped program's start closure
is a `Char`, an unanchored search can only begin at one of their UTF-8
lead bytes. Scanning for those bytes with `memchr` skips the positions
that cannot possibly start a match, which is where unanchored searches
spend most of their time on non-matching text. Lead bytes are always
codepoint boundaries, so a jump never lands inside a multi-byte sequence.
*/

use alloc::vec::Vec;

use memchr::{memchr, memchr2, memchr3};

use crate::nfa::program::{Kind, Ruin};
use crate::util::sparse::StateSet;
use crate::util::utf8;

/// A set of up to three candidate lead bytes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Prefilter {
    One(u8),
    Two(u8, u8),
    Three(u8, u8, u8),
}

impl Prefilter {
    /// Derives a prefilter from the start closure, if one applies.
    ///
    /// Returns `None` when the closure contains `Any`, a class, the
    /// match instruction (the pattern can match without consuming) or
    /// more than three distinct candidate bytes.
    pub(crate) fn build(ruin: &Ruin, start: &StateSet) -> Option<Prefilter> {
        let mut bytes: Vec<u8> = Vec::new();
        for ip in start.iter() {
            let inst = ruin.insts[ip as usize];
            match inst.kind {
                Kind::Split => {}
                Kind::Char => {
                    let lead = utf8::lead(inst.data);
                    if !bytes.contains(&lead) {
                        bytes.push(lead);
                    }
                }
                _ => return None,
            }
        }
        match *bytes.as_slice() {
            [a] => Some(Prefilter::One(a)),
            [a, b] => Some(Prefilter::Two(a, b)),
            [a, b, c] => Some(Prefilter::Three(a, b, c)),
            _ => None,
        }
    }

    /// The offset of the next candidate byte in `haystack`, if any.
    #[inline]
    pub(crate) fn find(&self, haystack: &[u8]) -> Option<usize> {
        match *self {
            Prefilter::One(a) => memchr(a, haystack),
            Prefilter::Two(a, b) => memchr2(a, b, haystack),
            Prefilter::Three(a, b, c) => memchr3(a, b, c, haystack),
        }
    }
}
