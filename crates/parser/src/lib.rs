//! `asm6809-parser` turns 6809 assembly source text into value trees.
//!
//! The parser knows nothing about opcodes or directives: every line becomes a
//! [`Line`] holding up to three [`Node`]s — label, mnemonic and argument
//! list — plus the original text for listings. What a mnemonic *means* is the
//! engine's business; the parser's job is the classic column discipline,
//! expression grammar, operand decorations (`#`, `<`, `>`, `<<`,
//! increment/decrement markers) and macro positional references.

mod expr;
mod line;
mod node;
mod register;

use asm6809_errors::{EventList, Location, Severity};

pub use node::{Attr, BinaryOp, Node, NodeKind, UnaryOp};
pub use register::{Isa, Reg};

/// Whether a [`Program`] came from a source file or a `macro` definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramKind {
    /// Parsed from a source file.
    File,
    /// Captured from a `macro` … `endm` body.
    Macro,
}

/// One source line: the three parsed fields plus the original text.
#[derive(Debug, Clone, Default)]
pub struct Line {
    /// Label field, when present. A [`NodeKind::Int`] label defines a local
    /// label.
    pub label: Option<Node>,
    /// Mnemonic or directive, when present.
    pub opcode: Option<Node>,
    /// Argument list (always a [`NodeKind::Array`]), when present.
    pub args: Option<Node>,
    /// The unparsed source text, for listings and macro export.
    pub text: String,
}

/// An ordered sequence of [`Line`]s: a parsed file, or a macro body.
#[derive(Debug, Clone)]
pub struct Program {
    /// File or macro.
    pub kind: ProgramKind,
    /// File name, or macro name.
    pub name: String,
    /// The lines, in source order.
    pub lines: Vec<Line>,
}

impl Program {
    /// Creates an empty program.
    pub fn new(kind: ProgramKind, name: impl Into<String>) -> Self {
        Self { kind, name: name.into(), lines: Vec::new() }
    }
}

/// Parses a whole source file.
///
/// Lines that fail to parse are reported into `events` as syntax errors
/// (located at `name`:line) and yield an empty [`Line`] so that listings and
/// line numbering stay intact.
pub fn parse_source(name: &str, text: &str, isa: Isa, events: &mut EventList) -> Program {
    let mut program = Program::new(ProgramKind::File, name);
    for (index, raw) in text.lines().enumerate() {
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        let mut parsed = match line::parse_line(raw, isa) {
            Ok(parsed) => parsed,
            Err(message) => {
                events.report_at(
                    Severity::Syntax,
                    Location { name: name.to_string(), line: index as u32 + 1 },
                    message,
                );
                line::ParsedLine::default()
            }
        };
        program.lines.push(Line {
            label: parsed.label.take(),
            opcode: parsed.opcode.take(),
            args: parsed.args.take(),
            text: raw.to_string(),
        });
    }
    program
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_source_keeps_line_count() {
        let mut events = EventList::new();
        let source = "; header\n org $4000\nstart lda #$10\n rts\n";
        let program = parse_source("t.s", source, Isa::Mc6809, &mut events);
        assert!(events.is_empty());
        assert_eq!(program.lines.len(), 4);
        assert!(program.lines[0].opcode.is_none());
        assert_eq!(program.lines[2].label, Some(Node::id(vec![Node::str("start")])));
    }

    #[test]
    fn test_parse_error_is_located() {
        let mut events = EventList::new();
        let source = " lda #$10\n fcc \"oops\n";
        let program = parse_source("t.s", source, Isa::Mc6809, &mut events);
        assert_eq!(program.lines.len(), 2);
        assert_eq!(events.level(), Some(Severity::Syntax));
        let event = &events.events()[0];
        assert_eq!(event.location.as_ref().map(|l| l.line), Some(2));
    }
}
