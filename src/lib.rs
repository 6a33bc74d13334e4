/*!
A regex engine built on Thompson's construction, with capture groups,
UTF-8 character classes and a lazily cached subset construction for fast
existence tests.

A pattern compiles to a linear program of NFA instructions. Two matchers
run that program:

- The **Pike VM** ([`Regex::match_anchored`],
  [`Regex::match_unanchored`]) simulates the NFA with one capture-slot
  vector per thread, in time linear in the input, and reports every
  accepting path it observes.
- The **lazy DFA** ([`Regex::test_anchored`], [`Regex::test_unanchored`])
  answers pure existence queries by building DFA states (epsilon closures
  of NFA subsets) on demand and memoizing them in a bounded ring-buffer
  cache. Under cache pressure it degrades gracefully: first by evicting
  old states, then by resetting the cache, and finally by falling back to
  plain subset simulation for the remainder of the input.

Supported syntax: literal codepoints, `.`, `|`, `*`, `+`, `?`, `(...)`
capture groups, `[...]` classes (with the range forms `a-z`, `A-Z`,
`0-9`; everything else in brackets is literal and `]` always terminates
the class) and `\x` literal escapes. There are no anchors, backreferences,
lookaround or case folding. Both patterns and searched text must be valid
UTF-8; ill-formed input surfaces as an error rather than being replaced.

# Example

```
use regex_hybrid::Regex;

let mut re = Regex::new("(a(b))(c|😊)(p|[😊d])".as_bytes())?;
assert!(re.test_anchored("ab😊d".as_bytes())?);

let matches = re.match_anchored("ab😊d".as_bytes())?;
let m = matches.last().unwrap();
assert_eq!(Some(0..2), m.group(1).map(|s| s.range()));
assert_eq!(Some(1..2), m.group(2).map(|s| s.range()));
assert_eq!(Some(2..6), m.group(3).map(|s| s.range()));
assert_eq!(Some(6..7), m.group(4).map(|s| s.range()));
# Ok::<(), regex_hybrid::Error>(())
```

# Crate features

- **std** (default) - implements `std::error::Error` for [`Error`].
  Disabling it makes the crate `no_std` (alloc is still required).
- **logging** - emits compile and cache diagnostics through the `log`
  crate at the `debug!` and `trace!` levels.
*/

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub use crate::error::Error;
pub use crate::regex::{Builder, Match, Regex, Span};

#[macro_use]
mod macros;

mod error;
pub mod hybrid;
mod nfa;
mod regex;
mod util;
