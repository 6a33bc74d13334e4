/*!
The lazily built DFA used for existence tests.

A DFA state is the epsilon closure of a subset of stripped-program
instructions. States are built on first demand, one transition at a time,
and memoized in a fixed-size ring buffer: the cache holds the most
recently created states, deduplicated through an ordered index keyed by
the subset's bit-vector. When the ring fills, the oldest state is evicted;
too many evictions reset the whole cache; too many resets make the search
surrender and finish with plain subset simulation.

Capture slots cannot survive subset construction (the stripped program
has no `Save` ops), so this engine only ever answers "is there a match",
never where the groups are.
*/

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::error::Error;
use crate::hybrid::id::LazyStateID;
use crate::nfa::program::{Kind, Ruin};
use crate::util::classes::{CodepointMap, CodepointSet};
use crate::util::prefilter::Prefilter;
use crate::util::sparse::StateSet;
use crate::util::utf8;

/// The configuration of a lazy DFA cache.
#[derive(Clone, Copy, Debug, Default)]
pub struct Config {
    cache_capacity: Option<usize>,
    overflow_limit: Option<u32>,
    rebuild_limit: Option<u32>,
}

impl Config {
    /// Returns a new default configuration.
    pub fn new() -> Config {
        Config::default()
    }

    /// Sets the number of states the cache can hold. The value is rounded
    /// up to a power of two, with a minimum of 2. Defaults to 32.
    pub fn cache_capacity(mut self, slots: usize) -> Config {
        self.cache_capacity = Some(slots);
        self
    }

    /// Sets how many evictions are tolerated before the whole cache is
    /// reset. Defaults to 5.
    pub fn overflow_limit(mut self, limit: u32) -> Config {
        self.overflow_limit = Some(limit);
        self
    }

    /// Sets how many cache resets are tolerated within one search before
    /// the search falls back to subset simulation. Defaults to 5.
    pub fn rebuild_limit(mut self, limit: u32) -> Config {
        self.rebuild_limit = Some(limit);
        self
    }

    /// The effective cache capacity, rounded to a power of two.
    pub fn get_cache_capacity(&self) -> usize {
        self.cache_capacity.unwrap_or(32).max(2).next_power_of_two()
    }

    /// The effective eviction tolerance.
    pub fn get_overflow_limit(&self) -> u32 {
        self.overflow_limit.unwrap_or(5)
    }

    /// The effective reset tolerance.
    pub fn get_rebuild_limit(&self) -> u32 {
        self.rebuild_limit.unwrap_or(5)
    }

    pub(crate) fn overwrite(self, o: Config) -> Config {
        Config {
            cache_capacity: o.cache_capacity.or(self.cache_capacity),
            overflow_limit: o.overflow_limit.or(self.overflow_limit),
            rebuild_limit: o.rebuild_limit.or(self.rebuild_limit),
        }
    }
}

/// One cached DFA state.
///
/// `filter` holds every concrete `Char`/`Class` codepoint of the subset
/// once the state has been explored. A codepoint inside the filter has a
/// specific transition (resolved lazily into `next`); a codepoint outside
/// it can only take the wildcard fallback stored in the map's reserved
/// slot 255.
#[derive(Clone, Debug)]
struct CachedState {
    ops: StateSet,
    filter: CodepointSet,
    next: CodepointMap,
    explored: bool,
}

/// The ring-buffer cache of DFA states.
#[derive(Clone, Debug)]
struct Cache {
    config: Config,
    slots: Vec<CachedState>,
    index: BTreeMap<crate::util::bitmap::BitVec, LazyStateID>,
    next_id: u32,
    len: usize,
    overflow_count: u32,
    rebuild_count: u32,
    gave_up: bool,
}

impl Cache {
    fn new(config: Config) -> Cache {
        Cache {
            config,
            slots: Vec::new(),
            index: BTreeMap::new(),
            next_id: 0,
            len: 0,
            overflow_count: 0,
            rebuild_count: 0,
            gave_up: false,
        }
    }

    /// Preallocates the ring for a program of `prog_len` instructions and
    /// drops every cached state.
    fn configure(&mut self, prog_len: usize) {
        let capacity = self.config.get_cache_capacity();
        self.slots.clear();
        self.slots.extend((0..capacity).map(|_| CachedState {
            ops: StateSet::new(prog_len),
            filter: CodepointSet::new(),
            next: CodepointMap::new(),
            explored: false,
        }));
        self.index.clear();
        self.next_id = 0;
        self.len = 0;
        self.overflow_count = 0;
        self.rebuild_count = 0;
        self.gave_up = false;
    }

    fn free(&mut self) {
        self.slots = Vec::new();
        self.index = BTreeMap::new();
        self.next_id = 0;
        self.len = 0;
    }

    /// Resets the pressure counters at the start of a search.
    fn begin_search(&mut self) {
        self.overflow_count = 0;
        self.rebuild_count = 0;
        self.gave_up = false;
    }

    fn slot_of(&self, id: LazyStateID) -> usize {
        (id.as_u32() as usize) & (self.slots.len() - 1)
    }

    /// True if `id` refers to a state still present in the ring.
    fn is_live(&self, id: LazyStateID) -> bool {
        !id.is_unknown()
            && id.as_u32() < self.next_id
            && (self.next_id - id.as_u32()) as usize <= self.len
    }

    fn state(&self, id: LazyStateID) -> &CachedState {
        &self.slots[self.slot_of(id)]
    }

    fn state_mut(&mut self, id: LazyStateID) -> &mut CachedState {
        let slot = self.slot_of(id);
        &mut self.slots[slot]
    }

    /// Returns the id of the cached state for `set`, creating (and
    /// possibly evicting) as needed.
    fn intern(&mut self, set: &StateSet) -> LazyStateID {
        if let Some(&id) = self.index.get(set.bits()) {
            return id;
        }
        // Ids are never reused; renumber before the counter wraps.
        if self.next_id == u32::MAX {
            self.index.clear();
            self.len = 0;
            self.next_id = 0;
        }
        if self.len == self.slots.len() {
            self.evict_oldest();
        }
        let id = LazyStateID::new(self.next_id);
        self.next_id += 1;
        let slot = self.slot_of(id);
        let state = &mut self.slots[slot];
        state.ops.copy_from(set);
        state.filter.clear();
        state.next.clear();
        state.explored = false;
        self.index.insert(set.bits().clone(), id);
        self.len += 1;
        id
    }

    fn evict_oldest(&mut self) {
        let oldest = LazyStateID::new(self.next_id - self.len as u32);
        let slot = self.slot_of(oldest);
        self.index.remove(self.slots[slot].ops.bits());
        self.len -= 1;
        self.overflow_count += 1;
        trace!(
            "lazy DFA cache is full, evicted state {} (overflow {} of {})",
            oldest.as_u32(),
            self.overflow_count,
            self.config.get_overflow_limit(),
        );
        if self.overflow_count >= self.config.get_overflow_limit() {
            self.clear_all();
        }
    }

    fn clear_all(&mut self) {
        self.index.clear();
        self.len = 0;
        self.overflow_count = 0;
        self.rebuild_count += 1;
        trace!(
            "lazy DFA cache has been cleared (count: {})",
            self.rebuild_count,
        );
        if self.rebuild_count >= self.config.get_rebuild_limit() {
            self.gave_up = true;
            trace!("lazy DFA cache cleared too often, giving up on caching");
        }
    }
}

/// The existence-test engine: the cache plus the scratch subsets of the
/// search loop.
#[derive(Clone, Debug)]
pub(crate) struct LazyDfa {
    cache: Cache,
    cur: StateSet,
    target: StateSet,
    stack: Vec<u32>,
    prog_len: usize,
}

impl LazyDfa {
    pub(crate) fn new(config: Config) -> LazyDfa {
        LazyDfa {
            cache: Cache::new(config),
            cur: StateSet::new(0),
            target: StateSet::new(0),
            stack: Vec::new(),
            prog_len: 0,
        }
    }

    /// Drops all cached states and scratch storage. The next search
    /// reallocates on demand.
    pub(crate) fn free(&mut self) {
        self.cache.free();
        self.cur = StateSet::new(0);
        self.target = StateSet::new(0);
        self.stack = Vec::new();
        self.prog_len = 0;
    }

    fn ensure(&mut self, prog_len: usize) {
        if self.prog_len == prog_len && !self.cache.slots.is_empty() {
            return;
        }
        self.prog_len = prog_len;
        self.cache.configure(prog_len);
        self.cur = StateSet::new(prog_len);
        self.target = StateSet::new(prog_len);
    }

    /// Reports whether `text` matches, reading transitions out of the
    /// cache and computing missing ones on demand.
    ///
    /// The search succeeds as soon as the match instruction enters the
    /// current subset. In unanchored mode the start subset is re-unioned
    /// into the current subset before every step, and the prefilter (when
    /// one exists) skips ahead whenever no partial match is in flight.
    pub(crate) fn test(
        &mut self,
        ruin: &Ruin,
        classes: &[CodepointSet],
        start: &StateSet,
        prefilter: Option<&Prefilter>,
        text: &[u8],
        unanchored: bool,
    ) -> Result<bool, Error> {
        self.ensure(ruin.insts.len());
        self.cache.begin_search();
        let match_idx = ruin.match_index();
        self.cur.copy_from(start);
        let mut sid = self.cache.intern(&self.cur);
        let mut at = 0;
        loop {
            if self.cur.contains(match_idx) {
                return Ok(true);
            }
            if at >= text.len() {
                return Ok(false);
            }
            if unanchored {
                if let Some(pf) = prefilter {
                    if self.cur.bits() == start.bits() {
                        match pf.find(&text[at..]) {
                            None => return Ok(false),
                            Some(offset) => at += offset,
                        }
                    }
                }
                let before = self.cur.len();
                self.cur.union_with(start);
                if self.cur.len() != before {
                    sid = self.cache.intern(&self.cur);
                }
            } else if self.cur.is_empty() {
                return Ok(false);
            }
            if self.cache.gave_up {
                return self.finish_subsets(
                    ruin, classes, start, text, at, unanchored, match_idx,
                );
            }
            let (cp, width) = utf8::decode(text, at)?;
            sid = self.step(ruin, classes, sid, cp);
            at += width;
            if self.cache.gave_up {
                return self.finish_subsets(
                    ruin, classes, start, text, at, unanchored, match_idx,
                );
            }
        }
    }

    /// Takes one transition out of the current subset on `cp`, updating
    /// both the scratch subset and the cache.
    fn step(
        &mut self,
        ruin: &Ruin,
        classes: &[CodepointSet],
        sid: LazyStateID,
        cp: u32,
    ) -> LazyStateID {
        if self.cache.is_live(sid) {
            let state = self.cache.state(sid);
            if state.explored {
                let raw = if state.filter.contains(cp) {
                    state.next.get(cp)
                } else {
                    state.next.fallback()
                };
                let tid = LazyStateID::new(raw);
                if self.cache.is_live(tid) {
                    self.cur.copy_from(&self.cache.state(tid).ops);
                    return tid;
                }
            }
        }
        // Cache miss: intern the source subset (it may have been evicted
        // or orphaned by a reset), fill its filter on first exploration,
        // then derive the target subset.
        let sid = if self.cache.is_live(sid) {
            sid
        } else {
            self.cache.intern(&self.cur)
        };
        if !self.cache.state(sid).explored {
            for ip in self.cur.iter() {
                let inst = ruin.insts[ip as usize];
                match inst.kind {
                    Kind::Char => {
                        self.cache.state_mut(sid).filter.insert(inst.data)
                    }
                    Kind::Class => self
                        .cache
                        .state_mut(sid)
                        .filter
                        .union_with(&classes[inst.data as usize]),
                    _ => {}
                }
            }
            self.cache.state_mut(sid).explored = true;
        }
        let wildcard = !self.cache.state(sid).filter.contains(cp);
        self.flow_into_target(ruin, classes, cp);
        let tid = self.cache.intern(&self.target);
        // Interning the target may have evicted the source; only a still
        // live source can memoize the transition.
        if self.cache.is_live(sid) {
            let state = self.cache.state_mut(sid);
            if wildcard {
                state.next.set_fallback(tid.as_u32());
            } else {
                state.next.set(cp, tid.as_u32());
            }
        }
        core::mem::swap(&mut self.cur, &mut self.target);
        tid
    }

    /// Computes into `target` the closure of everything the current
    /// subset can reach by consuming `cp`.
    fn flow_into_target(&mut self, ruin: &Ruin, classes: &[CodepointSet], cp: u32) {
        self.target.clear();
        for ip in self.cur.iter() {
            let inst = ruin.insts[ip as usize];
            let follows = match inst.kind {
                Kind::Char => inst.data == cp,
                Kind::Class => classes[inst.data as usize].contains(cp),
                Kind::Any => true,
                _ => false,
            };
            if follows {
                ruin.closure_into(&mut self.stack, &mut self.target, inst.lb);
            }
        }
    }

    /// The surrendered path: plain subset iteration from the current
    /// subset to the end of the input, with no caching at all.
    #[allow(clippy::too_many_arguments)]
    fn finish_subsets(
        &mut self,
        ruin: &Ruin,
        classes: &[CodepointSet],
        start: &StateSet,
        text: &[u8],
        mut at: usize,
        unanchored: bool,
        match_idx: u32,
    ) -> Result<bool, Error> {
        trace!("continuing with subset simulation at offset {}", at);
        loop {
            if self.cur.contains(match_idx) {
                return Ok(true);
            }
            if at >= text.len() {
                return Ok(false);
            }
            if unanchored {
                self.cur.union_with(start);
            } else if self.cur.is_empty() {
                return Ok(false);
            }
            let (cp, width) = utf8::decode(text, at)?;
            self.flow_into_target(ruin, classes, cp);
            core::mem::swap(&mut self.cur, &mut self.target);
            at += width;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nfa::compiler::compile;
    use crate::nfa::parser::{reorder, tokenize};
    use crate::nfa::program::Program;

    struct Harness {
        classes: Vec<CodepointSet>,
        ruin: Ruin,
        start: StateSet,
        prefilter: Option<Prefilter>,
        dfa: LazyDfa,
    }

    fn harness(pattern: &str, config: Config) -> Harness {
        let prog: Program =
            compile(&reorder(&tokenize(pattern.as_bytes()).unwrap()).unwrap())
                .unwrap();
        let ruin = prog.strip().unwrap();
        let mut start = StateSet::new(ruin.insts.len());
        let mut stack = Vec::new();
        ruin.closure_into(&mut stack, &mut start, ruin.start);
        let prefilter = Prefilter::build(&ruin, &start);
        Harness {
            classes: prog.classes,
            ruin,
            start,
            prefilter,
            dfa: LazyDfa::new(config),
        }
    }

    impl Harness {
        fn test(&mut self, text: &str, unanchored: bool) -> bool {
            self.dfa
                .test(
                    &self.ruin,
                    &self.classes,
                    &self.start,
                    self.prefilter.as_ref(),
                    text.as_bytes(),
                    unanchored,
                )
                .unwrap()
        }
    }

    #[test]
    fn anchored_basics() {
        let mut h = harness("ab*c", Config::new());
        assert!(h.test("ac", false));
        assert!(h.test("abbbc", false));
        assert!(!h.test("abbb", false));
        assert!(!h.test("xac", false));
        // A match is found even when trailing input remains.
        assert!(h.test("aczzz", false));
    }

    #[test]
    fn unanchored_basics() {
        let mut h = harness("f.*l ", Config::new());
        assert!(h.test("...full ...fall ...", true));
        assert!(!h.test("definitely not", true));
        assert!(!h.test("", true));
    }

    #[test]
    fn unanchored_with_class() {
        let mut h = harness("[a-z]+", Config::new());
        assert!(h.test("AbC", true));
        assert!(!h.test("ABC", true));
    }

    #[test]
    fn empty_pattern_matches_everything() {
        let mut h = harness("", Config::new());
        assert!(h.test("", false));
        assert!(h.test("xyz", false));
        assert!(h.test("xyz", true));
    }

    #[test]
    fn four_byte_codepoints() {
        let mut h = harness("(c|😊)d", Config::new());
        assert!(h.test("😊d", false));
        assert!(h.test("x😊d!", true));
        assert!(!h.test("😀d", false));
    }

    #[test]
    fn repeated_searches_reuse_the_cache() {
        let mut h = harness("ab*c", Config::new());
        for _ in 0..4 {
            assert!(h.test("abbc", false));
            assert!(!h.test("abbx", false));
        }
        // The second round of searches must not have created new states.
        let created = h.dfa.cache.next_id;
        assert!(h.test("abbc", false));
        assert_eq!(created, h.dfa.cache.next_id);
    }

    #[test]
    fn cached_transitions_match_rederived_ones() {
        let mut uncached = harness("(a|b)*abb", Config::new());
        let mut cached = harness("(a|b)*abb", Config::new());
        let text = "abbababbababab".repeat(3);
        // Warm the cache, then compare every answer against a fresh run.
        for _ in 0..2 {
            assert_eq!(
                uncached.test(&text, false),
                cached.test(&text, false),
            );
            assert_eq!(uncached.test("abb", false), cached.test("abb", false));
        }
    }

    #[test]
    fn tiny_cache_degrades_but_stays_correct() {
        let config =
            Config::new().cache_capacity(2).overflow_limit(1).rebuild_limit(1);
        let mut h = harness("(a|b)+c", config);
        assert!(h.test("abababc", false));
        assert!(!h.test("abababx", false));
        assert!(h.test("zzzabababczzz", true));
        assert!(h.dfa.cache.gave_up);
    }

    #[test]
    fn pressure_counters_reset_between_searches() {
        let config =
            Config::new().cache_capacity(2).overflow_limit(1).rebuild_limit(1);
        let mut h = harness("(a|b)+c", config);
        assert!(h.test("abababc", false));
        assert!(h.dfa.cache.gave_up);
        // A fresh search starts with a clean slate.
        assert!(h.test("abc", false));
        assert!(!h.test("x", false));
    }

    #[test]
    fn invalid_utf8_in_text_is_an_error() {
        let mut h = harness("a+", Config::new());
        let err = h
            .dfa
            .test(
                &h.ruin,
                &h.classes,
                &h.start,
                None,
                &[b'a', 0x80],
                false,
            )
            .unwrap_err();
        assert!(err.is_invalid_utf8());
    }
}
