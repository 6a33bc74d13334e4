/*!
Identifiers for lazily built DFA states.

Ids are handed out monotonically and never reused, even across cache
resets. Combined with the FIFO eviction order this gives a cheap liveness
rule: an id is live iff it lies inside the window of the most recently
created `len` states. A stale id (evicted, or orphaned by a cache reset)
simply fails the window test and the transition that produced it is
recomputed, so no back-pointer fixups are ever needed.
*/

/// The identifier of a cached DFA state.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub(crate) struct LazyStateID(u32);

impl LazyStateID {
    /// A placeholder for a transition that has not been computed.
    pub(crate) const UNKNOWN: LazyStateID = LazyStateID(u32::MAX);

    pub(crate) fn new(id: u32) -> LazyStateID {
        LazyStateID(id)
    }

    pub(crate) fn as_u32(&self) -> u32 {
        self.0
    }

    pub(crate) fn is_unknown(&self) -> bool {
        *self == LazyStateID::UNKNOWN
    }
}
