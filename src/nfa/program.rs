/*!
The compiled NFA program: a linear sequence of instructions.

Instructions reference each other by index into the program vector, never
by pointer. Two renditions of every pattern coexist: the full program with
`Save` instructions driving capture slots, and a stripped program (the
"ruin") with every `Save` removed and all edges retargeted past them,
which is what the lazy DFA subsets are built over.
*/

use core::fmt;

use alloc::vec::Vec;

use crate::error::Error;
use crate::util::classes::CodepointSet;
use crate::util::utf8;

/// The opcode of an NFA instruction.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Kind {
    /// Consumes one codepoint equal to `data`.
    Char,
    /// The accepting instruction. Always last, always unique.
    Match,
    /// Forks execution to both `lb` and `rb` without consuming input.
    Split,
    /// Consumes any single codepoint.
    Any,
    /// Records the current input offset into capture slot `data`.
    Save,
    /// Consumes one codepoint contained in class table entry `data`.
    Class,
}

/// Sentinel for an instruction that has never been visited.
pub(crate) const GEN_NEVER: u64 = u64::MAX;

/// A single NFA instruction.
///
/// `lb` is the primary successor; `rb` is used only by `Split` for the
/// alternate branch. `gen` is the visitation marker the Pike VM uses to
/// deduplicate threads within one input position.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct Inst {
    pub(crate) kind: Kind,
    pub(crate) data: u32,
    pub(crate) lb: u32,
    pub(crate) rb: u32,
    pub(crate) gen: u64,
}

impl Inst {
    pub(crate) fn new(kind: Kind, data: u32) -> Inst {
        Inst { kind, data, lb: 0, rb: 0, gen: GEN_NEVER }
    }
}

/// A compiled pattern: instructions, the character-class table and the
/// number of capture slots.
#[derive(Clone, Eq, PartialEq)]
pub(crate) struct Program {
    pub(crate) insts: Vec<Inst>,
    pub(crate) classes: Vec<CodepointSet>,
    /// Total capture slots: 2 for the whole match plus 2 per group.
    pub(crate) slots: usize,
}

impl Program {
    /// Derives the SAVE-free program used by the lazy DFA.
    ///
    /// Every surviving instruction keeps its meaning; every edge that
    /// pointed at a `Save` chain is retargeted to the first non-`Save`
    /// successor and re-indexed into the dense stripped vector.
    pub(crate) fn strip(&self) -> Result<Ruin, Error> {
        let mut remap = alloc::vec![0u32; self.insts.len()];
        let mut kept = 0u32;
        for (i, inst) in self.insts.iter().enumerate() {
            if inst.kind != Kind::Save {
                remap[i] = kept;
                kept += 1;
            }
        }
        let resolve = |mut idx: u32| -> Result<u32, Error> {
            for _ in 0..self.insts.len() {
                if self.insts[idx as usize].kind != Kind::Save {
                    return Ok(remap[idx as usize]);
                }
                idx = self.insts[idx as usize].lb;
            }
            Err(Error::internal("save chain does not terminate"))
        };
        let mut insts = Vec::with_capacity(kept as usize);
        for inst in self.insts.iter() {
            if inst.kind == Kind::Save {
                continue;
            }
            let mut out = *inst;
            out.gen = GEN_NEVER;
            match out.kind {
                Kind::Match => {}
                Kind::Split => {
                    out.lb = resolve(inst.lb)?;
                    out.rb = resolve(inst.rb)?;
                }
                _ => out.lb = resolve(inst.lb)?,
            }
            insts.push(out);
        }
        let start = resolve(0)?;
        Ok(Ruin { insts, start })
    }
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Program(")?;
        for (i, inst) in self.insts.iter().enumerate() {
            write_inst(f, i, inst)?;
        }
        for (i, class) in self.classes.iter().enumerate() {
            writeln!(f, "class {}: [{}]", i, class)?;
        }
        write!(f, ")")
    }
}

/// The SAVE-free rendition of a program.
#[derive(Clone, Eq, PartialEq)]
pub(crate) struct Ruin {
    pub(crate) insts: Vec<Inst>,
    /// The first non-`Save` instruction after the leading `Save(0)`.
    pub(crate) start: u32,
}

impl Ruin {
    /// The index of the unique `Match` instruction.
    pub(crate) fn match_index(&self) -> u32 {
        (self.insts.len() - 1) as u32
    }

    /// Expands the epsilon closure of `ip` into `set`, using `stack` as
    /// the work list. The stripped program has no `Save` ops, so the only
    /// epsilon edges to follow are `Split` branches.
    pub(crate) fn closure_into(
        &self,
        stack: &mut Vec<u32>,
        set: &mut crate::util::sparse::StateSet,
        ip: u32,
    ) {
        stack.push(ip);
        while let Some(ip) = stack.pop() {
            if !set.insert(ip) {
                continue;
            }
            let inst = self.insts[ip as usize];
            if inst.kind == Kind::Split {
                stack.push(inst.rb);
                stack.push(inst.lb);
            }
        }
    }
}

impl fmt::Debug for Ruin {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Ruin(start: {:03},", self.start)?;
        for (i, inst) in self.insts.iter().enumerate() {
            write_inst(f, i, inst)?;
        }
        write!(f, ")")
    }
}

fn write_inst(f: &mut fmt::Formatter, i: usize, inst: &Inst) -> fmt::Result {
    match inst.kind {
        Kind::Char => {
            let mut buf = [0u8; 4];
            let width = utf8::encode(inst.data, &mut buf);
            let lit = core::str::from_utf8(&buf[..width]).unwrap_or("?");
            writeln!(f, "{:03}: char {:?} => {}", i, lit, inst.lb)
        }
        Kind::Match => writeln!(f, "{:03}: match", i),
        Kind::Split => {
            writeln!(f, "{:03}: split {}, {}", i, inst.lb, inst.rb)
        }
        Kind::Any => writeln!(f, "{:03}: any => {}", i, inst.lb),
        Kind::Save => {
            writeln!(f, "{:03}: save {} => {}", i, inst.data, inst.lb)
        }
        Kind::Class => {
            writeln!(f, "{:03}: class {} => {}", i, inst.data, inst.lb)
        }
    }
}
