/*!
The public engine type tying the compiler, the Pike VM and the lazy DFA
together.
*/

use core::fmt;

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;

use crate::error::Error;
use crate::hybrid;
use crate::hybrid::dfa::LazyDfa;
use crate::nfa::compiler;
use crate::nfa::parser;
use crate::nfa::pikevm::PikeVm;
use crate::nfa::program::{Program, Ruin};
use crate::util::prefilter::Prefilter;
use crate::util::sparse::StateSet;

/// A half-open byte-offset range into the searched text.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    /// This span as a standard range, usable for slicing.
    pub fn range(&self) -> core::ops::Range<usize> {
        self.start..self.end
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// One accepting path: a flat vector of capture-slot offsets.
///
/// Slots 0 and 1 hold the whole-match span; slots `2k` and `2k + 1` hold
/// the open and close offsets of the k-th group, counted by its `(` from
/// the left. A slot a group never wrote reads as offset 0.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Match {
    slots: Box<[usize]>,
}

impl Match {
    pub(crate) fn new(slots: Box<[usize]>) -> Match {
        Match { slots }
    }

    /// The whole-match span.
    pub fn span(&self) -> Span {
        Span { start: self.slots[0], end: self.slots[1] }
    }

    /// The span of a capture group. Group 0 is the whole match.
    pub fn group(&self, index: usize) -> Option<Span> {
        let i = index.checked_mul(2)?;
        match (self.slots.get(i), self.slots.get(i + 1)) {
            (Some(&start), Some(&end)) => Some(Span { start, end }),
            _ => None,
        }
    }

    /// The number of groups, including the whole match.
    pub fn group_len(&self) -> usize {
        self.slots.len() / 2
    }

    /// The raw slot vector.
    pub fn slots(&self) -> &[usize] {
        &self.slots
    }
}

/// A builder for a [`Regex`].
///
/// The only tunables live in the lazy DFA cache; see
/// [`hybrid::Config`](crate::hybrid::Config).
#[derive(Clone, Debug, Default)]
pub struct Builder {
    hybrid: hybrid::Config,
}

impl Builder {
    pub fn new() -> Builder {
        Builder { hybrid: hybrid::Config::new() }
    }

    /// Overrides lazy DFA cache settings.
    pub fn hybrid(&mut self, config: hybrid::Config) -> &mut Builder {
        self.hybrid = self.hybrid.overwrite(config);
        self
    }

    /// Compiles `pattern` into a ready-to-use engine.
    pub fn build(&self, pattern: &[u8]) -> Result<Regex, Error> {
        let compiled = Compiled::new(pattern)?;
        debug!(
            "compiled pattern {:?}: {} instructions ({} stripped), \
             {} classes, prefilter: {:?}",
            String::from_utf8_lossy(pattern),
            compiled.prog.insts.len(),
            compiled.ruin.insts.len(),
            compiled.prog.classes.len(),
            compiled.prefilter,
        );
        Ok(Regex {
            pattern: pattern.to_vec(),
            prog: compiled.prog,
            ruin: compiled.ruin,
            start: compiled.start,
            prefilter: compiled.prefilter,
            vm: PikeVm::new(),
            dfa: LazyDfa::new(self.hybrid),
            matches: Vec::new(),
            released: false,
        })
    }
}

/// Everything derived from a pattern at compile time.
struct Compiled {
    prog: Program,
    ruin: Ruin,
    start: StateSet,
    prefilter: Option<Prefilter>,
}

impl Compiled {
    fn new(pattern: &[u8]) -> Result<Compiled, Error> {
        let tokens = parser::tokenize(pattern)?;
        let postfix = parser::reorder(&tokens)?;
        let prog = compiler::compile(&postfix)?;
        let ruin = prog.strip()?;
        let mut start = StateSet::new(ruin.insts.len());
        let mut stack = Vec::new();
        ruin.closure_into(&mut stack, &mut start, ruin.start);
        let prefilter = Prefilter::build(&ruin, &start);
        Ok(Compiled { prog, ruin, start, prefilter })
    }
}

/// A compiled regular expression engine.
///
/// An engine owns its compiled program together with the scratch state of
/// both matchers, so searching takes `&mut self` and a single engine is
/// not meant to be shared across threads. Independent clones search
/// independently.
///
/// The supported syntax is a small subset: literal codepoints, `.`, `|`,
/// `*`, `+`, `?`, `(...)` capture groups, `[...]` classes with the range
/// forms `a-z`, `A-Z` and `0-9`, and `\x` literal escapes. Matching is
/// POSIX-flavored: every accepting path is reported, with longer matches
/// of a repetition appearing later in the list.
///
/// # Example
///
/// ```
/// use regex_hybrid::Regex;
///
/// let mut re = Regex::new(b"(a|b)*c")?;
/// assert!(re.test_unanchored(b"zzabaczz")?);
/// let matches = re.match_anchored(b"abac")?;
/// assert_eq!(0..4, matches.last().unwrap().span().range());
/// # Ok::<(), regex_hybrid::Error>(())
/// ```
#[derive(Clone)]
pub struct Regex {
    pattern: Vec<u8>,
    prog: Program,
    ruin: Ruin,
    start: StateSet,
    prefilter: Option<Prefilter>,
    vm: PikeVm,
    dfa: LazyDfa,
    matches: Vec<Match>,
    released: bool,
}

impl Regex {
    /// Compiles a pattern with the default configuration.
    ///
    /// Both the pattern and any searched text must be valid UTF-8.
    pub fn new(pattern: &[u8]) -> Result<Regex, Error> {
        Regex::builder().build(pattern)
    }

    /// Returns a builder for configuring an engine.
    pub fn builder() -> Builder {
        Builder::new()
    }

    /// Returns a default lazy DFA configuration to pass to
    /// [`Builder::hybrid`].
    pub fn config() -> hybrid::Config {
        hybrid::Config::new()
    }

    /// The pattern this engine was compiled from.
    pub fn pattern(&self) -> &[u8] {
        &self.pattern
    }

    /// Replaces the compiled pattern.
    ///
    /// On error the previously compiled program is left untouched. On
    /// success all cached DFA states and previous match results are
    /// dropped.
    pub fn recompile(&mut self, pattern: &[u8]) -> Result<(), Error> {
        let compiled = Compiled::new(pattern)?;
        self.pattern = pattern.to_vec();
        self.prog = compiled.prog;
        self.ruin = compiled.ruin;
        self.start = compiled.start;
        self.prefilter = compiled.prefilter;
        self.dfa.free();
        self.matches.clear();
        self.released = false;
        Ok(())
    }

    /// Tests whether the whole input, starting at offset 0, can begin a
    /// match. Runs on the lazy DFA.
    pub fn test_anchored(&mut self, text: &[u8]) -> Result<bool, Error> {
        self.test(text, false)
    }

    /// Tests whether a match exists anywhere in the input. Runs on the
    /// lazy DFA.
    pub fn test_unanchored(&mut self, text: &[u8]) -> Result<bool, Error> {
        self.test(text, true)
    }

    /// Runs the capture-tracking simulation anchored at offset 0 and
    /// returns every accepting path observed.
    pub fn match_anchored(&mut self, text: &[u8]) -> Result<&[Match], Error> {
        self.find(text, false)
    }

    /// Runs the capture-tracking simulation with a fresh start thread
    /// seeded at every position and returns every accepting path
    /// observed.
    pub fn match_unanchored(&mut self, text: &[u8]) -> Result<&[Match], Error> {
        self.find(text, true)
    }

    /// The capture vectors recorded by the most recent `match_anchored`
    /// or `match_unanchored` call.
    pub fn match_indices(&self) -> &[Match] {
        &self.matches
    }

    /// Releases scratch buffers: thread lists, the DFA cache and stored
    /// match results. With `keep_program == false` the compiled program
    /// is dropped as well, and the engine refuses to match until
    /// [`recompile`](Regex::recompile) is called.
    pub fn free_memory(&mut self, keep_program: bool) {
        self.vm.free();
        self.dfa.free();
        self.matches = Vec::new();
        if !keep_program {
            self.prog = Program { insts: Vec::new(), classes: Vec::new(), slots: 0 };
            self.ruin = Ruin { insts: Vec::new(), start: 0 };
            self.start = StateSet::new(0);
            self.prefilter = None;
            self.released = true;
        }
    }

    fn test(&mut self, text: &[u8], unanchored: bool) -> Result<bool, Error> {
        if self.released {
            return Err(Error::released());
        }
        self.dfa.test(
            &self.ruin,
            &self.prog.classes,
            &self.start,
            self.prefilter.as_ref(),
            text,
            unanchored,
        )
    }

    fn find(&mut self, text: &[u8], unanchored: bool) -> Result<&[Match], Error> {
        if self.released {
            return Err(Error::released());
        }
        self.matches.clear();
        self.vm.find(
            &mut self.prog.insts,
            &self.prog.classes,
            self.prog.slots,
            text,
            unanchored,
            false,
            &mut self.matches,
        )?;
        Ok(&self.matches)
    }
}

impl fmt::Debug for Regex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Regex({:?}", String::from_utf8_lossy(&self.pattern))?;
        write!(f, "{:?}", self.prog)?;
        write!(f, ")")
    }
}
