/*!
Compiling patterns into NFA programs and simulating them.

The pipeline is `parser::tokenize` -> `parser::reorder` ->
`compiler::compile`, producing a [`program::Program`]. The
[`pikevm::PikeVm`] runs the program with capture tracking; the stripped
[`program::Ruin`] feeds the lazy DFA in [`crate::hybrid`].
*/

pub(crate) mod compiler;
pub(crate) mod parser;
pub(crate) mod pikevm;
pub(crate) mod program;
