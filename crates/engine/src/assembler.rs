//! The assembler engine: all state, the pass driver, and the output surface.
//!
//! One [`Assembler`] owns everything a run touches — symbol table, section
//! map, positional stack, context stack, event list, listing. The driver
//! re-assembles the whole program until nothing reports an inconsistency,
//! bounded by [`MAX_PASSES`]. Anything below `Inconsistent` at the end of a
//! pass is convergence; `Inconsistent` or `Syntax` buys another pass;
//! `Fatal` stops on the spot.

use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};

use asm6809_errors::{Error, EventList, Location, Severity};
use asm6809_object::{parse_exec_address, Image};
use asm6809_parser::{Isa, Node, NodeKind, Program};
use tracing::debug;

use crate::eval::to_int;
use crate::interp::InterpStack;
use crate::listing::Listing;
use crate::program::{Context, Programs};
use crate::section::{Emit, Sections};
use crate::symbol::SymbolTable;

/// Upper bound on assembly passes before giving up on convergence.
pub const MAX_PASSES: u32 = 10;

/// Configuration for an [`Assembler`].
#[derive(Debug, Clone)]
pub struct Options {
    /// Target instruction set.
    pub isa: Isa,
    /// Maximum nesting of includes and macro expansions.
    pub max_program_depth: usize,
    /// Collect a listing while assembling.
    pub listing: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self { isa: Isa::default(), max_program_depth: 8, listing: false }
    }
}

/// One conditional-assembly frame (`if` … `endif`).
#[derive(Debug)]
pub(crate) struct Cond {
    /// Whether lines in the current arm assemble.
    pub(crate) active: bool,
    /// Whether any arm has been taken yet.
    pub(crate) taken: bool,
    /// Whether `else` has been seen.
    pub(crate) seen_else: bool,
}

/// The engine. See the crate docs for the overall shape.
pub struct Assembler {
    pub(crate) options: Options,
    pub(crate) events: EventList,
    pub(crate) symbols: SymbolTable,
    pub(crate) sections: Sections,
    pub(crate) interp: InterpStack,
    pub(crate) contexts: Vec<Context>,
    pub(crate) programs: Programs,
    pub(crate) exports: BTreeSet<String>,
    pub(crate) listing: Listing,
    pub(crate) ignore_undefined: bool,
    pub(crate) pass: u32,
    pub(crate) exec_default: Option<u16>,
    pub(crate) capture_macro: Option<(String, Program)>,
    pub(crate) skip_to_endm: bool,
    pub(crate) conds: Vec<Cond>,
    pub(crate) end_requested: bool,
    inputs: Vec<String>,
}

impl Assembler {
    /// Creates an idle engine.
    pub fn new(options: Options) -> Self {
        Self {
            options,
            events: EventList::new(),
            symbols: SymbolTable::new(),
            sections: Sections::new(),
            interp: InterpStack::default(),
            contexts: Vec::new(),
            programs: Programs::default(),
            exports: BTreeSet::new(),
            listing: Listing::default(),
            ignore_undefined: false,
            pass: 0,
            exec_default: None,
            capture_macro: None,
            skip_to_endm: false,
            conds: Vec::new(),
            end_requested: false,
            inputs: Vec::new(),
        }
    }

    /// Queues a source file, reading and parsing it now. Files are parsed
    /// once even if queued or included repeatedly.
    pub fn add_file(&mut self, path: &str) -> Result<(), Error> {
        let text = fs::read_to_string(path)
            .map_err(|source| Error::Io { path: path.to_string(), source })?;
        self.add_source(path, &text);
        Ok(())
    }

    /// Queues a source held in memory under `name` (the test and include
    /// entry point).
    pub fn add_source(&mut self, name: &str, text: &str) {
        let parsed = self.programs.file_from_source(name, text, self.options.isa);
        // Surface parse problems immediately; they are replayed per pass.
        for event in &parsed.diagnostics {
            self.events.record(event.clone());
        }
        self.inputs.push(name.to_string());
    }

    /// Parses and caches a source under `name` without queueing it for
    /// assembly — it becomes reachable via `include "name"`.
    pub fn preload_source(&mut self, name: &str, text: &str) {
        self.programs.file_from_source(name, text, self.options.isa);
    }

    /// Runs assembly passes over the queued files until convergence,
    /// failure, or the pass budget runs out.
    pub fn run(&mut self) -> Result<(), Error> {
        if self.inputs.is_empty() {
            return Err(Error::NoInputFiles);
        }
        if self.events.at_least(Severity::Syntax) {
            return Err(Error::AssemblyFailed(self.events.events().len()));
        }

        for pass in 0..MAX_PASSES {
            self.pass = pass;
            self.events.clear();
            self.listing.clear();
            self.exec_default = None;
            self.capture_macro = None;
            self.skip_to_endm = false;
            self.conds.clear();
            self.end_requested = false;
            self.sections.set_current("", pass);
            debug!(pass, "starting pass");

            for name in self.inputs.clone() {
                let parsed = self.programs.file(&name).expect("queued file is parsed");
                self.assemble_parsed(&parsed);
            }

            if self.capture_macro.take().is_some() {
                self.report(Severity::Syntax, "macro definition not terminated");
            }
            if !self.conds.is_empty() {
                self.report(Severity::Syntax, "conditional not terminated");
                self.conds.clear();
            }

            self.sections.finish_pass(pass, &mut self.events);
            let level = self.events.level();
            debug!(pass, ?level, "finished pass");

            match level {
                Some(level) if level >= Severity::Fatal => break,
                // Inconsistencies buy another pass; so do syntax errors,
                // which cannot converge but should keep reporting.
                Some(level) if level >= Severity::Inconsistent => continue,
                _ => break,
            }
        }

        if self.events.at_least(Severity::Inconsistent) {
            return Err(Error::AssemblyFailed(self.events.events().len()));
        }
        Ok(())
    }

    /// Everything reported during the final pass.
    pub fn events(&self) -> &EventList {
        &self.events
    }

    /// The assembled output, all sections coalesced. `pad` zero-fills gaps
    /// (single-blob formats want that).
    pub fn image(&mut self, pad: bool) -> Image {
        let mut events = EventList::new();
        let image = self.sections.image(pad, &mut events);
        for event in events.events() {
            self.events.record(event.clone());
        }
        image
    }

    /// Resolves an `--exec` option: a numeric address, or a global symbol.
    pub fn exec_address(&mut self, text: &str) -> Option<u16> {
        if let Some(addr) = parse_exec_address(text) {
            return Some(addr);
        }
        let stored = self.symbols.try_get(text).cloned();
        let value = stored.as_ref().and_then(to_int).and_then(|node| node.as_int());
        match value {
            Some(addr) => Some((addr & 0xffff) as u16),
            None => {
                self.events
                    .report(Severity::Fatal, format!("exec symbol '{text}' not defined"));
                None
            }
        }
    }

    /// The exec address a bare `end <addr>` recorded, if any.
    pub fn default_exec(&self) -> Option<u16> {
        self.exec_default
    }

    /// Writes the listing collected on the final pass.
    pub fn write_listing<W: Write>(&self, out: &mut W) -> io::Result<()> {
        self.listing.write(out)
    }

    /// Writes exported macros and symbols.
    pub fn write_exports<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        for name in self.exports.clone() {
            if let Some(body) = self.programs.macro_by_name(&name) {
                writeln!(out, "{name}\tmacro")?;
                for line in &body.lines {
                    let label = line.label.as_ref().map(Node::to_string).unwrap_or_default();
                    let opcode = line.opcode.as_ref().map(Node::to_string).unwrap_or_default();
                    writeln!(out, "{label}\t{opcode}\t{}", render_args(&line.args))?;
                }
                writeln!(out, "\tendm")?;
                continue;
            }
            let Some(value) = self.symbols.try_get(&name).cloned() else {
                self.events
                    .report(Severity::Syntax, format!("exported symbol '{name}' not defined"));
                continue;
            };
            match &value.kind {
                NodeKind::Int(_) | NodeKind::Float(_) | NodeKind::Reg(_) => {
                    writeln!(out, "{name}\tequ\t{value}")?
                }
                NodeKind::Str(_) => writeln!(out, "{name}\tequ\t/{value}/")?,
                _ => {
                    self.events.report(
                        Severity::Syntax,
                        format!("can't export symbol '{name}' of this type"),
                    );
                }
            }
        }
        Ok(())
    }

    /// Source location of the line being assembled.
    pub(crate) fn location(&self) -> Location {
        self.contexts
            .last()
            .map(Context::location)
            .unwrap_or_else(|| Location { name: String::new(), line: 0 })
    }

    /// Records an event against the current source location.
    pub(crate) fn report(&mut self, severity: Severity, message: impl Into<String>) {
        let location = self.location();
        if location.name.is_empty() {
            self.events.report(severity, message);
        } else {
            self.events.report_at(severity, location, message);
        }
    }

    /// Emits into the current section at the current source location.
    pub(crate) fn emit(&mut self, emit: Emit) {
        let location = self.location();
        self.sections.emit(emit, &location, &mut self.events);
    }
}

/// Formats an argument array the way it would be written in source:
/// comma-separated, no brackets.
fn render_args(args: &Option<Node>) -> String {
    let Some(node) = args else {
        return String::new();
    };
    match &node.kind {
        NodeKind::Array(elements) => {
            let parts: Vec<String> = elements.iter().map(Node::to_string).collect();
            parts.join(",")
        }
        _ => node.to_string(),
    }
}
