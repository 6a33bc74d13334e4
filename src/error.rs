use core::fmt;

/// An error that can occur when compiling a pattern or running a search.
///
/// This does not provide much introspection. Callers can obtain a human
/// readable message via its `Display` impl and classify the error with
/// [`Error::is_invalid_pattern`] and [`Error::is_invalid_utf8`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Error {
    kind: ErrorKind,
}

#[derive(Clone, Debug, Eq, PartialEq)]
enum ErrorKind {
    /// A group was opened with `(` but never closed.
    UnclosedGroup,
    /// A `)` without a matching `(`.
    UnopenedGroup,
    /// A character class was opened with `[` but never closed.
    UnclosedClass,
    /// A `]` outside of any character class.
    StrayClassClose,
    /// A `\` at the very end of the pattern.
    DanglingEscape,
    /// An operator with nothing to apply to, e.g. a leading `*` or an
    /// alternation with a missing arm.
    MissingOperand(char),
    /// The compile stack did not reduce to a single fragment.
    ExtraFragments { got: usize },
    /// A byte that is not a known operator reached the precedence table.
    UnknownOperator(u8),
    /// The pattern or the searched text is not valid UTF-8.
    InvalidUtf8 { offset: usize },
    /// The compiled program has been released with
    /// [`free_memory`](crate::Regex::free_memory); the engine must be
    /// recompiled before matching again.
    Released,
    /// An internal invariant was broken. This is a bug.
    Internal(&'static str),
}

impl Error {
    fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub(crate) fn unclosed_group() -> Error {
        Error { kind: ErrorKind::UnclosedGroup }
    }

    pub(crate) fn unopened_group() -> Error {
        Error { kind: ErrorKind::UnopenedGroup }
    }

    pub(crate) fn unclosed_class() -> Error {
        Error { kind: ErrorKind::UnclosedClass }
    }

    pub(crate) fn stray_class_close() -> Error {
        Error { kind: ErrorKind::StrayClassClose }
    }

    pub(crate) fn dangling_escape() -> Error {
        Error { kind: ErrorKind::DanglingEscape }
    }

    pub(crate) fn missing_operand(operator: char) -> Error {
        Error { kind: ErrorKind::MissingOperand(operator) }
    }

    pub(crate) fn extra_fragments(got: usize) -> Error {
        Error { kind: ErrorKind::ExtraFragments { got } }
    }

    pub(crate) fn unknown_operator(byte: u8) -> Error {
        Error { kind: ErrorKind::UnknownOperator(byte) }
    }

    pub(crate) fn invalid_utf8(offset: usize) -> Error {
        Error { kind: ErrorKind::InvalidUtf8 { offset } }
    }

    pub(crate) fn released() -> Error {
        Error { kind: ErrorKind::Released }
    }

    pub(crate) fn internal(msg: &'static str) -> Error {
        Error { kind: ErrorKind::Internal(msg) }
    }

    /// Returns true if this error was caused by a malformed pattern.
    pub fn is_invalid_pattern(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::UnclosedGroup
                | ErrorKind::UnopenedGroup
                | ErrorKind::UnclosedClass
                | ErrorKind::StrayClassClose
                | ErrorKind::DanglingEscape
                | ErrorKind::MissingOperand(_)
                | ErrorKind::ExtraFragments { .. }
                | ErrorKind::UnknownOperator(_)
        )
    }

    /// Returns true if this error was caused by ill-formed UTF-8 in the
    /// pattern or in the searched text.
    pub fn is_invalid_utf8(&self) -> bool {
        matches!(self.kind(), ErrorKind::InvalidUtf8 { .. })
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind() {
            ErrorKind::UnclosedGroup => {
                write!(f, "unclosed group: a '(' has no matching ')'")
            }
            ErrorKind::UnopenedGroup => {
                write!(f, "unopened group: a ')' has no matching '('")
            }
            ErrorKind::UnclosedClass => {
                write!(f, "unclosed character class: a '[' has no matching ']'")
            }
            ErrorKind::StrayClassClose => {
                write!(f, "stray ']' outside of any character class")
            }
            ErrorKind::DanglingEscape => {
                write!(f, "dangling '\\' at the end of the pattern")
            }
            ErrorKind::MissingOperand(op) => {
                write!(f, "operator '{}' has nothing to apply to", op)
            }
            ErrorKind::ExtraFragments { got } => write!(
                f,
                "pattern did not reduce to a single expression \
                 ({} fragments left after compiling)",
                got,
            ),
            ErrorKind::UnknownOperator(byte) => {
                write!(f, "unknown operator byte 0x{:02X}", byte)
            }
            ErrorKind::InvalidUtf8 { offset } => {
                write!(f, "invalid UTF-8 sequence at byte offset {}", offset)
            }
            ErrorKind::Released => write!(
                f,
                "the compiled program has been released; \
                 recompile before matching",
            ),
            ErrorKind::Internal(msg) => {
                write!(f, "internal error (this is a bug): {}", msg)
            }
        }
    }
}
