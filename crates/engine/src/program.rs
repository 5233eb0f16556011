//! Program registry and activation contexts.
//!
//! Files are parsed exactly once and cached by name; macros live in their
//! own namespace. Activations — one per file being assembled, include being
//! processed or macro being expanded — form a stack whose top provides the
//! source location for error reporting. The stack depth is limited by
//! configuration to catch recursive includes and macros.

use std::collections::HashMap;
use std::rc::Rc;

use asm6809_errors::{Event, EventList, Location};
use asm6809_parser::{parse_source, Isa, Program};

/// A parsed file plus the diagnostics its parse produced. The diagnostics
/// are replayed into the event list each time the file is assembled, so they
/// survive the per-pass clearing of that list.
#[derive(Debug, Clone)]
pub(crate) struct ParsedFile {
    pub(crate) program: Rc<Program>,
    pub(crate) diagnostics: Vec<Event>,
}

/// File cache and macro namespace.
#[derive(Debug, Default)]
pub(crate) struct Programs {
    files: HashMap<String, ParsedFile>,
    macros: HashMap<String, Rc<Program>>,
}

impl Programs {
    /// Returns the cached parse of `name`, parsing `text` on first sight.
    pub(crate) fn file_from_source(&mut self, name: &str, text: &str, isa: Isa) -> ParsedFile {
        if let Some(parsed) = self.files.get(name) {
            return parsed.clone();
        }
        let mut events = EventList::new();
        let program = parse_source(name, text, isa, &mut events);
        let parsed = ParsedFile {
            program: Rc::new(program),
            diagnostics: events.events().to_vec(),
        };
        self.files.insert(name.to_string(), parsed.clone());
        parsed
    }

    /// The cached parse of `name`, if the file has been seen.
    pub(crate) fn file(&self, name: &str) -> Option<ParsedFile> {
        self.files.get(name).cloned()
    }

    pub(crate) fn macro_by_name(&self, name: &str) -> Option<Rc<Program>> {
        self.macros.get(name).cloned()
    }

    /// Registers a macro. Returns false when the name is taken.
    pub(crate) fn define_macro(&mut self, name: &str, body: Program) -> bool {
        if self.macros.contains_key(name) {
            return false;
        }
        self.macros.insert(name.to_string(), Rc::new(body));
        true
    }

    /// All macro names, sorted — for the exports file.
    pub(crate) fn macro_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.macros.keys().cloned().collect();
        names.sort();
        names
    }
}

/// One activation: a program plus the 1-based number of the line being
/// assembled.
#[derive(Debug)]
pub(crate) struct Context {
    pub(crate) name: String,
    pub(crate) line_number: u32,
}

impl Context {
    pub(crate) fn location(&self) -> Location {
        Location { name: self.name.clone(), line: self.line_number }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_files_parse_once() {
        let mut programs = Programs::default();
        let first = programs.file_from_source("a.s", " nop\n", Isa::Mc6809);
        let second = programs.file_from_source("a.s", " this text is ignored\n", Isa::Mc6809);
        assert!(Rc::ptr_eq(&first.program, &second.program));
    }

    #[test]
    fn test_macro_namespace() {
        let mut programs = Programs::default();
        let body = Program::new(asm6809_parser::ProgramKind::Macro, "twice");
        assert!(programs.define_macro("twice", body.clone()));
        assert!(!programs.define_macro("twice", body));
        assert!(programs.macro_by_name("twice").is_some());
        assert!(programs.macro_by_name("thrice").is_none());
    }
}
