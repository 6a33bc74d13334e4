/*!
The capture-tracking NFA simulation.

This is Pike's algorithm: two thread lists are stepped across the input,
one codepoint at a time. Each thread carries an instruction pointer and
its own capture-slot vector. Within one input position, threads are
deduplicated through the `gen` marker on each instruction, which also
bounds the work per position by the program length and keeps the whole
search linear in the input.

Epsilon closure (following `Split` and `Save` edges) runs over an explicit
work-list stack rather than by recursion, so deeply nested alternations
cannot overflow the call stack. A `Split` pushes its right branch first
and its left branch second, which makes the left branch come off the
stack first: earlier-spawned threads stay ahead of later ones, and that
order is what resolves ties between accepting paths.
*/

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::error::Error;
use crate::nfa::program::{Inst, Kind, GEN_NEVER};
use crate::regex::Match;
use crate::util::classes::CodepointSet;
use crate::util::utf8;

/// One simulation thread: an instruction pointer and its capture slots.
#[derive(Clone, Debug)]
struct Thread {
    ip: u32,
    slots: Box<[usize]>,
}

/// The simulator's reusable scratch state.
#[derive(Clone, Debug)]
pub(crate) struct PikeVm {
    cur: Vec<Thread>,
    nxt: Vec<Thread>,
    stack: Vec<(u32, Box<[usize]>)>,
    gen: u64,
}

impl PikeVm {
    pub(crate) fn new() -> PikeVm {
        PikeVm { cur: Vec::new(), nxt: Vec::new(), stack: Vec::new(), gen: 0 }
    }

    /// Drops all scratch allocations.
    pub(crate) fn free(&mut self) {
        self.cur = Vec::new();
        self.nxt = Vec::new();
        self.stack = Vec::new();
    }

    /// Runs the simulation over `text`, appending one capture vector to
    /// `matches` per accepting path observed.
    ///
    /// With `earliest`, the search returns as soon as any accepting path
    /// completes at the end of an input position. Unanchored mode seeds a
    /// fresh start thread at every position.
    pub(crate) fn find(
        &mut self,
        prog: &mut [Inst],
        classes: &[CodepointSet],
        slot_len: usize,
        text: &[u8],
        unanchored: bool,
        earliest: bool,
        matches: &mut Vec<Match>,
    ) -> Result<bool, Error> {
        for inst in prog.iter_mut() {
            inst.gen = GEN_NEVER;
        }
        self.gen = 0;
        self.cur.clear();
        self.nxt.clear();
        self.stack.clear();

        let fresh = |slot_len: usize| -> Box<[usize]> {
            alloc::vec![0; slot_len].into_boxed_slice()
        };
        let mut matched = false;
        epsilon(prog, &mut self.stack, &mut self.cur, 0, fresh(slot_len), 0, self.gen);

        let mut at = 0;
        while at < text.len() {
            let (cp, width) = utf8::decode(text, at)?;
            self.gen += 1;
            if unanchored && at > 0 {
                epsilon(
                    prog,
                    &mut self.stack,
                    &mut self.cur,
                    0,
                    fresh(slot_len),
                    at,
                    self.gen,
                );
            }
            let mut cur = core::mem::take(&mut self.cur);
            for thread in cur.drain(..) {
                let inst = prog[thread.ip as usize];
                match inst.kind {
                    Kind::Char => {
                        if inst.data == cp {
                            epsilon(
                                prog,
                                &mut self.stack,
                                &mut self.nxt,
                                inst.lb,
                                thread.slots,
                                at + width,
                                self.gen,
                            );
                        }
                    }
                    Kind::Class => {
                        if classes[inst.data as usize].contains(cp) {
                            epsilon(
                                prog,
                                &mut self.stack,
                                &mut self.nxt,
                                inst.lb,
                                thread.slots,
                                at + width,
                                self.gen,
                            );
                        }
                    }
                    Kind::Any => {
                        epsilon(
                            prog,
                            &mut self.stack,
                            &mut self.nxt,
                            inst.lb,
                            thread.slots,
                            at + width,
                            self.gen,
                        );
                    }
                    Kind::Match => {
                        matches.push(Match::new(thread.slots));
                        matched = true;
                    }
                    // Epsilon instructions never appear in a thread list.
                    Kind::Split | Kind::Save => {}
                }
            }
            self.cur = cur;
            core::mem::swap(&mut self.cur, &mut self.nxt);
            at += width;
            if earliest && matched {
                return Ok(true);
            }
        }
        for thread in self.cur.drain(..) {
            if prog[thread.ip as usize].kind == Kind::Match {
                matches.push(Match::new(thread.slots));
                matched = true;
            }
        }
        Ok(matched)
    }
}

/// Expands the epsilon closure of `ip` into `list`.
///
/// `Save` records `at` into its capture slot along the way; `Split`
/// explores `lb` before `rb`. Instructions already visited in generation
/// `gen` are skipped, so each instruction joins a thread list at most once
/// per input position.
fn epsilon(
    prog: &mut [Inst],
    stack: &mut Vec<(u32, Box<[usize]>)>,
    list: &mut Vec<Thread>,
    ip: u32,
    slots: Box<[usize]>,
    at: usize,
    gen: u64,
) {
    stack.push((ip, slots));
    while let Some((ip, mut slots)) = stack.pop() {
        let inst = prog[ip as usize];
        if inst.gen == gen {
            continue;
        }
        prog[ip as usize].gen = gen;
        match inst.kind {
            Kind::Split => {
                stack.push((inst.rb, slots.clone()));
                stack.push((inst.lb, slots));
            }
            Kind::Save => {
                slots[inst.data as usize] = at;
                stack.push((inst.lb, slots));
            }
            _ => list.push(Thread { ip, slots }),
        }
    }
}
