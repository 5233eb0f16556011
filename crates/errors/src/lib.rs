//! `asm6809_errors` provides the error model shared by the assembler crates.
//!
//! The assembler does not propagate most failures as `Result`s: assembly of a
//! line must carry on after a bad operand so that later lines still get
//! addresses, and an undefined symbol is only an error if it is *still*
//! undefined on the final pass. Instead, errors are recorded into an
//! [`EventList`] as [`Event`]s, each carrying a [`Severity`] and, when known,
//! the source [`Location`] being assembled. The list tracks the maximum
//! severity seen; the pass driver consults that level to decide between
//! convergence, another pass, and failure.
//!
//! Severities are ordered. Everything below [`Severity::Inconsistent`] is
//! reportable but harmless to convergence; `Inconsistent` forces another
//! pass; [`Severity::Syntax`] and above mean the run has failed even if
//! assembly limps on to report more problems.

#![deny(unused)]
#![deny(warnings)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![deny(rustdoc::missing_crate_level_docs)]
#![deny(rustdoc::invalid_codeblock_attributes)]
#![deny(rustdoc::invalid_rust_codeblocks)]

use std::fmt;

use miette::Diagnostic;
use thiserror::Error as ThisError;

pub use miette::Result;

/// Top-level failures surfaced on the command line, as opposed to the
/// accumulated per-line [`Event`]s.
#[derive(Debug, ThisError, Diagnostic)]
pub enum Error {
    /// The command line named no source files at all.
    #[error("no input files")]
    #[diagnostic(
        code(asm6809::no_input),
        help("pass at least one source file: `asm6809 [OPTION]... SOURCE-FILE...`")
    )]
    NoInputFiles,

    /// Assembly finished but problems remain; they have already been printed.
    #[error("assembly failed with {0} problem(s)")]
    #[diagnostic(code(asm6809::failed))]
    AssemblyFailed(usize),

    /// A file could not be read or written.
    #[error("{path}: {source}")]
    #[diagnostic(code(asm6809::io))]
    Io {
        /// The offending path.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// How bad an [`Event`] is.
///
/// The ordering is meaningful and relied upon by the pass driver: an
/// `EventList`'s level is the maximum severity recorded so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Suspicious but legal, e.g. a long branch that would fit in 8 bits.
    Warning,
    /// An addressing form the hardware accepts but documents as illegal.
    Illegal,
    /// Accepted for compatibility, scheduled for removal.
    Deprecated,
    /// Bad output data, e.g. two spans overlapping the same address.
    Data,
    /// A displacement or address outside its representable range.
    OutOfRange,
    /// A value changed between passes, or a symbol is not (yet) defined.
    /// Forces another pass while the pass budget allows.
    Inconsistent,
    /// Malformed input. Assembly continues but the run has failed.
    Syntax,
    /// Internal invariant violation or I/O failure. Assembly stops.
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Warning => "warning",
            Severity::Illegal => "illegal",
            Severity::Deprecated => "deprecated",
            Severity::Data => "data",
            Severity::OutOfRange => "out of range",
            Severity::Inconsistent => "inconsistent",
            Severity::Syntax => "syntax error",
            Severity::Fatal => "fatal",
        })
    }
}

/// A source position: the file (or macro) being assembled and a 1-based line
/// number within it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Name of the file or macro the line came from.
    pub name: String,
    /// 1-based line number within `name`.
    pub line: u32,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.line)
    }
}

/// One recorded problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// How bad it is.
    pub severity: Severity,
    /// Where it happened, when a source line was being assembled.
    pub location: Option<Location>,
    /// Human-readable description.
    pub message: String,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{}: {}: {}", location, self.severity, self.message),
            None => write!(f, "{}: {}", self.severity, self.message),
        }
    }
}

/// Accumulator for [`Event`]s, tracking the maximum [`Severity`] seen.
///
/// The pass driver clears the list at the start of each pass; events
/// surviving in the list after the final pass are what the user gets to see.
#[derive(Debug, Default)]
pub struct EventList {
    events: Vec<Event>,
    level: Option<Severity>,
}

impl EventList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an event with no source location.
    pub fn report(&mut self, severity: Severity, message: impl Into<String>) {
        self.push(Event { severity, location: None, message: message.into() });
    }

    /// Records an event against a source location.
    pub fn report_at(
        &mut self,
        severity: Severity,
        location: Location,
        message: impl Into<String>,
    ) {
        self.push(Event { severity, location: Some(location), message: message.into() });
    }

    /// Records an already-built event, e.g. one replayed from a cache.
    pub fn record(&mut self, event: Event) {
        self.push(event);
    }

    fn push(&mut self, event: Event) {
        self.level = Some(match self.level {
            Some(level) => level.max(event.severity),
            None => event.severity,
        });
        self.events.push(event);
    }

    /// The maximum severity recorded since the last [`clear`](Self::clear),
    /// or `None` if nothing has been recorded.
    pub fn level(&self) -> Option<Severity> {
        self.level
    }

    /// Whether the recorded level reaches `severity`.
    pub fn at_least(&self, severity: Severity) -> bool {
        self.level.is_some_and(|level| level >= severity)
    }

    /// Forgets all events. Called between passes.
    pub fn clear(&mut self) {
        self.events.clear();
        self.level = None;
    }

    /// All events recorded since the last clear, in order.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Whether no event has been recorded since the last clear.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl fmt::Display for EventList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for event in &self.events {
            writeln!(f, "{event}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Warning < Severity::Illegal);
        assert!(Severity::Illegal < Severity::Deprecated);
        assert!(Severity::Deprecated < Severity::Data);
        assert!(Severity::Data < Severity::OutOfRange);
        assert!(Severity::OutOfRange < Severity::Inconsistent);
        assert!(Severity::Inconsistent < Severity::Syntax);
        assert!(Severity::Syntax < Severity::Fatal);
    }

    #[test]
    fn test_level_is_maximum() {
        let mut events = EventList::new();
        assert_eq!(events.level(), None);

        events.report(Severity::Warning, "first");
        assert_eq!(events.level(), Some(Severity::Warning));

        events.report(Severity::Syntax, "second");
        events.report(Severity::Data, "third");
        assert_eq!(events.level(), Some(Severity::Syntax));
        assert!(events.at_least(Severity::Inconsistent));
    }

    #[test]
    fn test_clear_resets_level() {
        let mut events = EventList::new();
        events.report(Severity::Fatal, "boom");
        events.clear();

        assert_eq!(events.level(), None);
        assert!(events.is_empty());
        assert!(!events.at_least(Severity::Warning));
    }

    #[test]
    fn test_event_display() {
        let located = Event {
            severity: Severity::OutOfRange,
            location: Some(Location { name: "main.s".to_string(), line: 42 }),
            message: "8-bit relative value out of range".to_string(),
        };
        assert_eq!(
            located.to_string(),
            "main.s:42: out of range: 8-bit relative value out of range"
        );

        let bare = Event {
            severity: Severity::Fatal,
            location: None,
            message: "no input files".to_string(),
        };
        assert_eq!(bare.to_string(), "fatal: no input files");
    }
}
