/*!
Thompson construction over the postfix token stream.

The compiler runs the reordered pattern as a stack machine: every atom
pushes a fragment, every operator combines the fragments on top of the
stack. A fragment is an entry instruction plus the list of its dangling
outgoing edges, kept as `(instruction, lb|rb)` pairs in a side buffer.
"Patching" a fragment plants a now-known target into every dangling slot;
"fusing" two fragments concatenates their dangling lists.
*/

use alloc::vec::Vec;

use crate::error::Error;
use crate::nfa::parser::CONCAT;
use crate::nfa::program::{Inst, Kind, Program};
use crate::util::classes::CodepointSet;
use crate::util::utf8;

/// Which forward-reference slot of an instruction dangles.
#[derive(Clone, Copy, Debug)]
enum Slot {
    Lb,
    Rb,
}

/// One unresolved outgoing edge.
#[derive(Clone, Copy, Debug)]
struct Hole {
    inst: u32,
    slot: Slot,
}

/// A partially built NFA subgraph.
#[derive(Debug)]
struct Frag {
    start: u32,
    dangling: Vec<Hole>,
}

impl Frag {
    fn of(inst: u32) -> Frag {
        Frag { start: inst, dangling: alloc::vec![Hole { inst, slot: Slot::Lb }] }
    }
}

/// An open capture group: its open slot index and the position of its
/// open-SAVE fragment on the fragment stack.
#[derive(Debug)]
struct OpenGroup {
    slot: u32,
    depth: usize,
}

/// Compiles a postfix token stream into a program.
pub(crate) fn compile(postfix: &[u8]) -> Result<Program, Error> {
    Compiler::new().compile(postfix)
}

struct Compiler {
    insts: Vec<Inst>,
    classes: Vec<CodepointSet>,
    stack: Vec<Frag>,
    groups: Vec<OpenGroup>,
    next_slot: u32,
}

impl Compiler {
    fn new() -> Compiler {
        Compiler {
            insts: Vec::new(),
            classes: Vec::new(),
            stack: Vec::new(),
            groups: Vec::new(),
            next_slot: 2,
        }
    }

    fn compile(mut self, postfix: &[u8]) -> Result<Program, Error> {
        self.insts.reserve(postfix.len() + 4);
        let save0 = self.emit(Inst::new(Kind::Save, 0));
        self.stack.push(Frag::of(save0));
        let mut i = 0;
        while i < postfix.len() {
            match postfix[i] {
                b'\\' => {
                    i += 1;
                    if i >= postfix.len() {
                        return Err(Error::dangling_escape());
                    }
                    let (cp, width) = utf8::decode(postfix, i)?;
                    self.push_char(cp);
                    i += width;
                }
                b'(' => {
                    let open = self.emit(Inst::new(Kind::Save, self.next_slot));
                    self.groups.push(OpenGroup {
                        slot: self.next_slot,
                        depth: self.stack.len(),
                    });
                    self.next_slot += 2;
                    self.stack.push(Frag::of(open));
                    i += 1;
                }
                b')' => {
                    self.close_group()?;
                    i += 1;
                }
                b'[' => {
                    i = self.push_class(postfix, i + 1)?;
                }
                b']' => return Err(Error::stray_class_close()),
                b'?' => {
                    self.zero_or_one()?;
                    i += 1;
                }
                b'*' => {
                    self.zero_or_more()?;
                    i += 1;
                }
                b'+' => {
                    self.one_or_more()?;
                    i += 1;
                }
                CONCAT => {
                    self.concat()?;
                    i += 1;
                }
                b'|' => {
                    self.alternate()?;
                    i += 1;
                }
                _ => {
                    let (cp, width) = utf8::decode(postfix, i)?;
                    self.push_char(cp);
                    i += width;
                }
            }
        }
        self.finish()
    }

    fn emit(&mut self, inst: Inst) -> u32 {
        let idx = self.insts.len() as u32;
        self.insts.push(inst);
        idx
    }

    fn patch(&mut self, holes: &[Hole], target: u32) {
        for hole in holes {
            match hole.slot {
                Slot::Lb => self.insts[hole.inst as usize].lb = target,
                Slot::Rb => self.insts[hole.inst as usize].rb = target,
            }
        }
    }

    fn push_char(&mut self, cp: u32) {
        let inst = if cp == u32::from(b'.') {
            Inst::new(Kind::Any, 0)
        } else {
            Inst::new(Kind::Char, cp)
        };
        let idx = self.emit(inst);
        self.stack.push(Frag::of(idx));
    }

    fn push_class(&mut self, postfix: &[u8], at: usize) -> Result<usize, Error> {
        let (set, after) = parse_class(postfix, at)?;
        let data = self.classes.len() as u32;
        self.classes.push(set);
        let idx = self.emit(Inst::new(Kind::Class, data));
        self.stack.push(Frag::of(idx));
        Ok(after)
    }

    /// True if the top of the fragment stack is a complete operand, i.e.
    /// neither the program's start fragment nor a still-open group.
    fn top_is_operand(&self) -> bool {
        self.stack.len() >= 2
            && self.groups.last().map_or(true, |g| g.depth != self.stack.len() - 1)
    }

    /// True if the top two fragments are both complete operands.
    fn top_two_are_operands(&self) -> bool {
        self.stack.len() >= 3
            && self.groups.last().map_or(true, |g| g.depth < self.stack.len() - 2)
    }

    fn close_group(&mut self) -> Result<(), Error> {
        let group = self.groups.pop().ok_or_else(Error::unopened_group)?;
        let close = self.emit(Inst::new(Kind::Save, group.slot + 1));
        match self.stack.len() - group.depth - 1 {
            0 => {
                // Empty group: open save flows straight into the close.
                let open = self.stack.last_mut().expect("open fragment");
                let holes = core::mem::take(&mut open.dangling);
                self.patch(&holes, close);
                let open = self.stack.last_mut().expect("open fragment");
                open.dangling = alloc::vec![Hole { inst: close, slot: Slot::Lb }];
            }
            1 => {
                let content = self.stack.pop().expect("content fragment");
                self.patch(&content.dangling, close);
                let open = self.stack.last_mut().expect("open fragment");
                let holes = core::mem::take(&mut open.dangling);
                let start = content.start;
                self.patch(&holes, start);
                let open = self.stack.last_mut().expect("open fragment");
                open.dangling = alloc::vec![Hole { inst: close, slot: Slot::Lb }];
            }
            _ => {
                return Err(Error::internal(
                    "group did not reduce to a single fragment",
                ))
            }
        }
        Ok(())
    }

    fn zero_or_one(&mut self) -> Result<(), Error> {
        if !self.top_is_operand() {
            return Err(Error::missing_operand('?'));
        }
        let top = self.stack.last().expect("operand");
        let mut split = Inst::new(Kind::Split, 0);
        split.lb = top.start;
        let idx = self.emit(split);
        let top = self.stack.last_mut().expect("operand");
        top.start = idx;
        top.dangling.push(Hole { inst: idx, slot: Slot::Rb });
        Ok(())
    }

    fn zero_or_more(&mut self) -> Result<(), Error> {
        if !self.top_is_operand() {
            return Err(Error::missing_operand('*'));
        }
        let top = self.stack.last().expect("operand");
        let mut split = Inst::new(Kind::Split, 0);
        split.lb = top.start;
        let idx = self.emit(split);
        let top = self.stack.last_mut().expect("operand");
        let holes = core::mem::take(&mut top.dangling);
        self.patch(&holes, idx);
        let top = self.stack.last_mut().expect("operand");
        top.start = idx;
        top.dangling = alloc::vec![Hole { inst: idx, slot: Slot::Rb }];
        Ok(())
    }

    fn one_or_more(&mut self) -> Result<(), Error> {
        if !self.top_is_operand() {
            return Err(Error::missing_operand('+'));
        }
        let top = self.stack.last().expect("operand");
        let mut split = Inst::new(Kind::Split, 0);
        split.lb = top.start;
        let idx = self.emit(split);
        let top = self.stack.last_mut().expect("operand");
        let holes = core::mem::take(&mut top.dangling);
        self.patch(&holes, idx);
        let top = self.stack.last_mut().expect("operand");
        top.dangling = alloc::vec![Hole { inst: idx, slot: Slot::Rb }];
        Ok(())
    }

    fn concat(&mut self) -> Result<(), Error> {
        if !self.top_two_are_operands() {
            return Err(Error::missing_operand('\u{2400}'));
        }
        let second = self.stack.pop().expect("operand");
        let first = self.stack.last_mut().expect("operand");
        let holes = core::mem::take(&mut first.dangling);
        self.patch(&holes, second.start);
        let first = self.stack.last_mut().expect("operand");
        first.dangling = second.dangling;
        Ok(())
    }

    fn alternate(&mut self) -> Result<(), Error> {
        if !self.top_two_are_operands() {
            return Err(Error::missing_operand('|'));
        }
        let second = self.stack.pop().expect("operand");
        let first = self.stack.last().expect("operand");
        let mut split = Inst::new(Kind::Split, 0);
        split.lb = first.start;
        split.rb = second.start;
        let idx = self.emit(split);
        let first = self.stack.last_mut().expect("operand");
        first.start = idx;
        first.dangling.extend_from_slice(&second.dangling);
        Ok(())
    }

    fn finish(mut self) -> Result<Program, Error> {
        if !self.groups.is_empty() {
            return Err(Error::unclosed_group());
        }
        match self.stack.len() {
            1 => {
                // Empty pattern: save 0 flows straight into save 1.
                let save1 = self.emit(Inst::new(Kind::Save, 1));
                let frag = self.stack.pop().expect("start fragment");
                self.patch(&frag.dangling, save1);
                let mat = self.emit(Inst::new(Kind::Match, 0));
                self.insts[save1 as usize].lb = mat;
            }
            2 => {
                let body = self.stack.pop().expect("body fragment");
                let start = self.stack.pop().expect("start fragment");
                self.patch(&start.dangling, body.start);
                let save1 = self.emit(Inst::new(Kind::Save, 1));
                self.patch(&body.dangling, save1);
                let mat = self.emit(Inst::new(Kind::Match, 0));
                self.insts[save1 as usize].lb = mat;
            }
            n => return Err(Error::extra_fragments(n - 1)),
        }
        trace!(
            "compiled {} instructions, {} classes, {} capture slots",
            self.insts.len(),
            self.classes.len(),
            self.next_slot,
        );
        Ok(Program {
            insts: self.insts,
            classes: self.classes,
            slots: self.next_slot as usize,
        })
    }
}

/// Parses the body of a character class, starting just past the `[`.
///
/// Exactly the range forms `a-z`, `A-Z` and `0-9` are recognized; all
/// other content is taken as literal codepoints. `]` always terminates
/// the class (there is no `\]` escape inside brackets). Returns the class
/// and the index just past the closing `]`.
fn parse_class(postfix: &[u8], mut at: usize) -> Result<(CodepointSet, usize), Error> {
    let mut set = CodepointSet::new();
    loop {
        let Some(&byte) = postfix.get(at) else {
            return Err(Error::unclosed_class());
        };
        if byte == b']' {
            return Ok((set, at + 1));
        }
        if matches!(byte, b'a' | b'A' | b'0') && postfix.get(at + 1) == Some(&b'-') {
            let hi = match byte {
                b'a' => b'z',
                b'A' => b'Z',
                _ => b'9',
            };
            if postfix.get(at + 2) == Some(&hi) {
                set.insert_byte_range(byte, hi);
                at += 3;
                continue;
            }
        }
        let (cp, width) = utf8::decode(postfix, at)?;
        set.insert(cp);
        at += width;
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::nfa::parser::{reorder, tokenize};
    use crate::nfa::program::GEN_NEVER;

    fn compiled(pattern: &str) -> Program {
        let tokens = tokenize(pattern.as_bytes()).unwrap();
        compile(&reorder(&tokens).unwrap()).unwrap()
    }

    fn inst(kind: Kind, data: u32, lb: u32, rb: u32) -> Inst {
        Inst { kind, data, lb, rb, gen: GEN_NEVER }
    }

    #[test]
    fn literal() {
        let prog = compiled("a");
        assert_eq!(
            alloc::vec![
                inst(Kind::Save, 0, 1, 0),
                inst(Kind::Char, u32::from(b'a'), 2, 0),
                inst(Kind::Save, 1, 3, 0),
                inst(Kind::Match, 0, 0, 0),
            ],
            prog.insts,
        );
        assert_eq!(2, prog.slots);
    }

    #[test]
    fn concatenation() {
        let prog = compiled("ab");
        assert_eq!(
            alloc::vec![
                inst(Kind::Save, 0, 1, 0),
                inst(Kind::Char, u32::from(b'a'), 2, 0),
                inst(Kind::Char, u32::from(b'b'), 3, 0),
                inst(Kind::Save, 1, 4, 0),
                inst(Kind::Match, 0, 0, 0),
            ],
            prog.insts,
        );
    }

    #[test]
    fn alternation() {
        let prog = compiled("a|b");
        assert_eq!(
            alloc::vec![
                inst(Kind::Save, 0, 3, 0),
                inst(Kind::Char, u32::from(b'a'), 4, 0),
                inst(Kind::Char, u32::from(b'b'), 4, 0),
                inst(Kind::Split, 0, 1, 2),
                inst(Kind::Save, 1, 5, 0),
                inst(Kind::Match, 0, 0, 0),
            ],
            prog.insts,
        );
    }

    #[test]
    fn zero_or_more() {
        let prog = compiled("a*");
        assert_eq!(
            alloc::vec![
                inst(Kind::Save, 0, 2, 0),
                inst(Kind::Char, u32::from(b'a'), 2, 0),
                inst(Kind::Split, 0, 1, 3),
                inst(Kind::Save, 1, 4, 0),
                inst(Kind::Match, 0, 0, 0),
            ],
            prog.insts,
        );
    }

    #[test]
    fn one_or_more() {
        let prog = compiled("a+");
        assert_eq!(
            alloc::vec![
                inst(Kind::Save, 0, 1, 0),
                inst(Kind::Char, u32::from(b'a'), 2, 0),
                inst(Kind::Split, 0, 1, 3),
                inst(Kind::Save, 1, 4, 0),
                inst(Kind::Match, 0, 0, 0),
            ],
            prog.insts,
        );
    }

    #[test]
    fn zero_or_one() {
        let prog = compiled("a?");
        assert_eq!(
            alloc::vec![
                inst(Kind::Save, 0, 2, 0),
                inst(Kind::Char, u32::from(b'a'), 3, 0),
                inst(Kind::Split, 0, 1, 3),
                inst(Kind::Save, 1, 4, 0),
                inst(Kind::Match, 0, 0, 0),
            ],
            prog.insts,
        );
    }

    #[test]
    fn group_records_both_slots() {
        let prog = compiled("(a)");
        assert_eq!(
            alloc::vec![
                inst(Kind::Save, 0, 1, 0),
                inst(Kind::Save, 2, 2, 0),
                inst(Kind::Char, u32::from(b'a'), 3, 0),
                inst(Kind::Save, 3, 4, 0),
                inst(Kind::Save, 1, 5, 0),
                inst(Kind::Match, 0, 0, 0),
            ],
            prog.insts,
        );
        assert_eq!(4, prog.slots);
    }

    #[test]
    fn starred_group_loops_through_its_open_save() {
        let prog = compiled("(a|b)*c");
        // The loop split must target the group's open save so that the
        // slot is re-recorded on every iteration.
        let open = prog
            .insts
            .iter()
            .filter(|i| i.kind == Kind::Split)
            .map(|i| prog.insts[i.lb as usize])
            .find(|t| t.kind == Kind::Save)
            .expect("loop split targeting the open save");
        assert_eq!(2, open.data);
    }

    #[test]
    fn empty_pattern_compiles_to_save_save_match() {
        let prog = compiled("");
        assert_eq!(
            alloc::vec![
                inst(Kind::Save, 0, 1, 0),
                inst(Kind::Save, 1, 2, 0),
                inst(Kind::Match, 0, 0, 0),
            ],
            prog.insts,
        );
    }

    #[test]
    fn match_is_unique_and_last() {
        for pattern in ["", "a", "ab|cd", "(a(b))(c|d)(p|[xd])", "a+b*c?"] {
            let prog = compiled(pattern);
            let matches =
                prog.insts.iter().filter(|i| i.kind == Kind::Match).count();
            assert_eq!(1, matches, "pattern {:?}", pattern);
            assert_eq!(
                Kind::Match,
                prog.insts.last().unwrap().kind,
                "pattern {:?}",
                pattern,
            );
        }
    }

    #[test]
    fn only_split_uses_rb() {
        let prog = compiled("(a|b)*c?d+[ef]");
        for inst in prog.insts.iter() {
            if inst.kind != Kind::Split {
                assert_eq!(0, inst.rb, "{:?}", inst);
            }
        }
    }

    #[test]
    fn slot_count_is_two_plus_two_per_group() {
        assert_eq!(2, compiled("abc").slots);
        assert_eq!(4, compiled("(a)").slots);
        assert_eq!(8, compiled("(a(b))(c)").slots);
    }

    #[test]
    fn nested_groups_pair_their_own_parens() {
        let prog = compiled("(a(b)c)");
        // Outer group owns slots 2/3, inner group slots 4/5. The close
        // saves must appear in inner-first order.
        let saves: Vec<u32> = prog
            .insts
            .iter()
            .filter(|i| i.kind == Kind::Save)
            .map(|i| i.data)
            .collect();
        assert_eq!(alloc::vec![0, 2, 4, 5, 3, 1], saves);
    }

    #[test]
    fn class_ranges_and_literals() {
        let prog = compiled("[a-z0-9é-]");
        assert_eq!(1, prog.classes.len());
        let class = &prog.classes[0];
        assert!(class.contains(u32::from(b'a')));
        assert!(class.contains(u32::from(b'm')));
        assert!(class.contains(u32::from(b'z')));
        assert!(class.contains(u32::from(b'7')));
        // The trailing '-' has no range partner: a literal.
        assert!(class.contains(u32::from(b'-')));
        let eacute = utf8::decode("é".as_bytes(), 0).unwrap().0;
        assert!(class.contains(eacute));
        assert!(!class.contains(u32::from(b'A')));
        assert_eq!(26 + 10 + 2, class.count());
    }

    #[test]
    fn false_range_is_literal() {
        // "a-c" is not one of the recognized range forms.
        let prog = compiled("[a-c]");
        let class = &prog.classes[0];
        assert!(class.contains(u32::from(b'a')));
        assert!(class.contains(u32::from(b'-')));
        assert!(class.contains(u32::from(b'c')));
        assert!(!class.contains(u32::from(b'b')));
    }

    #[test]
    fn empty_class_matches_nothing() {
        let prog = compiled("[]");
        assert_eq!(0, prog.classes[0].count());
    }

    #[test]
    fn leading_quantifier_is_rejected() {
        for pattern in ["*", "+a", "?", "(*)", "|a"] {
            let tokens = tokenize(pattern.as_bytes()).unwrap();
            let err = compile(&reorder(&tokens).unwrap()).unwrap_err();
            assert!(err.is_invalid_pattern(), "pattern {:?}", pattern);
        }
    }

    #[test]
    fn missing_alternation_arm_is_rejected() {
        let tokens = tokenize(b"a|").unwrap();
        let err = compile(&reorder(&tokens).unwrap()).unwrap_err();
        assert!(err.is_invalid_pattern());
    }

    #[test]
    fn recompiling_is_deterministic() {
        for pattern in ["(a|b)*c", "[a-z]+", "f.*l "] {
            assert_eq!(compiled(pattern).insts, compiled(pattern).insts);
        }
    }
}
