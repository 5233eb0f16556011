//! Sections, spans and byte emission.
//!
//! A [`Section`] is a named bucket of emitted code with its own program
//! counter (`pc`), load counter (`put`) and direct-page state. Bytes land in
//! [`Span`]s: maximal contiguous runs. Whenever `pc` or `put` jumps — an
//! `org`, a `put`, an `rmb` — the open span is closed and the next emission
//! opens a fresh one. At the end of a run the spans of all sections are
//! coalesced into the output image.
//!
//! Sections are rebuilt from scratch every pass; their end addresses are
//! compared against the previous pass to decide convergence.

use std::collections::BTreeMap;

use asm6809_errors::{EventList, Location, Severity};
use asm6809_object::{Image, Segment};

use crate::symbol::LocalTable;

const MAX_ADDRESS: i32 = 0xffff;

/// One emission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Emit {
    /// `n` zero bytes, used where an operand is not yet known so that span
    /// sizes stay stable between passes.
    Pad(usize),
    /// An opcode word: two bytes when it carries a page prefix, else one.
    Op(u16),
    /// Low byte of the value.
    Imm8(i64),
    /// Low two bytes, big-endian.
    Imm16(i64),
    /// Low four bytes, big-endian.
    Imm32(i64),
    /// 8-bit PC-relative displacement to the target address; out of range
    /// when the displacement does not fit.
    Rel8(i64),
    /// 16-bit PC-relative displacement. Warns when the displacement would
    /// have fit in 8 bits, unless the operand explicitly asked for 16.
    Rel16 {
        /// Target address.
        value: i64,
        /// Suppress the could-be-short warning.
        nowarn: bool,
    },
}

/// A contiguous run of emitted bytes.
#[derive(Debug, Clone)]
pub(crate) struct Span {
    /// Creation order, the tiebreak when two spans load at the same address.
    pub(crate) sequence: u64,
    /// pc of the first byte.
    pub(crate) org: i32,
    /// put (load address) of the first byte.
    pub(crate) put: i32,
    /// The bytes.
    pub(crate) data: Vec<u8>,
}

/// A named section.
#[derive(Debug)]
pub(crate) struct Section {
    /// Pass in which the section was last activated.
    pub(crate) pass: Option<u32>,
    /// Current program counter.
    pub(crate) pc: i32,
    /// Current load address.
    pub(crate) put: i32,
    /// Direct-page base, or -1 when unknown.
    pub(crate) dp: i32,
    /// Statement counter, the ordering key for local labels.
    pub(crate) line_number: u32,
    /// End-of-pass pc remembered from the previous pass.
    pub(crate) last_pc: i32,
    /// End-of-pass put remembered from the previous pass.
    pub(crate) last_put: i32,
    /// Numbered local labels. These survive pass resets so that values can
    /// be compared across passes.
    pub(crate) locals: LocalTable,
    pub(crate) spans: Vec<Span>,
    open: Option<usize>,
}

impl Section {
    fn new() -> Self {
        Self {
            pass: None,
            pc: 0,
            put: 0,
            dp: -1,
            line_number: 0,
            last_pc: 0,
            last_put: 0,
            locals: LocalTable::default(),
            spans: Vec::new(),
            open: None,
        }
    }
}

/// The section map plus the notion of a current section.
#[derive(Debug)]
pub(crate) struct Sections {
    map: BTreeMap<String, Section>,
    current: String,
    sequence: u64,
    /// When listing, every emitted byte is mirrored here for the line being
    /// assembled.
    pub(crate) capture: Option<Vec<u8>>,
}

impl Sections {
    pub(crate) fn new() -> Self {
        let mut map = BTreeMap::new();
        map.insert(String::new(), Section::new());
        Self { map, current: String::new(), sequence: 0, capture: None }
    }

    /// Switches to (or creates) section `name` for `pass`. A section entered
    /// for the first time in a pass drops last pass's spans and seeds its
    /// counters: from the previous section's remembered end addresses when
    /// one was active this pass, from zero otherwise.
    pub(crate) fn set_current(&mut self, name: &str, pass: u32) {
        let seed = self
            .map
            .get(&self.current)
            .filter(|current| current.pass == Some(pass))
            .map(|current| (current.last_pc, current.last_put));

        let section = self.map.entry(name.to_string()).or_insert_with(Section::new);
        if section.pass != Some(pass) {
            section.spans.clear();
            section.open = None;
            let (pc, put) = seed.unwrap_or((0, 0));
            section.pc = pc;
            section.put = put;
            section.pass = Some(pass);
            section.dp = -1;
            section.line_number = 0;
        }
        self.current = name.to_string();
    }

    pub(crate) fn current(&self) -> &Section {
        self.map.get(&self.current).expect("current section exists")
    }

    pub(crate) fn current_mut(&mut self) -> &mut Section {
        self.map.get_mut(&self.current).expect("current section exists")
    }

    /// Emits bytes into the current section, opening a new span if `pc` or
    /// `put` has moved since the last emission.
    pub(crate) fn emit(&mut self, emit: Emit, location: &Location, events: &mut EventList) {
        let Self { map, current, sequence, capture } = self;
        let section = map.get_mut(current.as_str()).expect("current section exists");

        let continuous = section.open.is_some_and(|index| {
            let span = &section.spans[index];
            let len = span.data.len() as i32;
            section.put == span.put + len && section.pc == span.org + len
        });
        if !continuous {
            match section.open {
                Some(index) if section.spans[index].data.is_empty() => {
                    section.spans[index].put = section.put;
                    section.spans[index].org = section.pc;
                }
                _ => {
                    section.spans.push(Span {
                        sequence: *sequence,
                        org: section.pc,
                        put: section.put,
                        data: Vec::new(),
                    });
                    *sequence += 1;
                    section.open = Some(section.spans.len() - 1);
                }
            }
        }

        if section.pc < 0 {
            events.report_at(
                Severity::OutOfRange,
                location.clone(),
                "assembling to negative address",
            );
        }

        let nbytes = match emit {
            Emit::Pad(n) => n,
            Emit::Op(word) => crate::opcode::Opcode::word_size(word),
            Emit::Imm8(_) | Emit::Rel8(_) => 1,
            Emit::Imm16(_) | Emit::Rel16 { .. } => 2,
            Emit::Imm32(_) => 4,
        };
        section.put += nbytes as i32;
        section.pc += nbytes as i32;

        let mut bytes = [0u8; 4];
        let bytes: &[u8] = match emit {
            Emit::Pad(_) => &[],
            Emit::Op(word) => {
                if nbytes == 2 {
                    bytes[0] = (word >> 8) as u8;
                    bytes[1] = word as u8;
                } else {
                    bytes[0] = word as u8;
                }
                &bytes[..nbytes]
            }
            Emit::Imm8(value) => {
                bytes[0] = value as u8;
                &bytes[..1]
            }
            Emit::Imm16(value) => {
                bytes[0] = (value >> 8) as u8;
                bytes[1] = value as u8;
                &bytes[..2]
            }
            Emit::Imm32(value) => {
                bytes[0] = (value >> 24) as u8;
                bytes[1] = (value >> 16) as u8;
                bytes[2] = (value >> 8) as u8;
                bytes[3] = value as u8;
                &bytes[..4]
            }
            Emit::Rel8(value) => {
                let disp = value.wrapping_sub(section.pc as i64);
                if !(-128..=127).contains(&disp) {
                    events.report_at(
                        Severity::OutOfRange,
                        location.clone(),
                        "8-bit relative value out of range",
                    );
                }
                bytes[0] = disp as u8;
                &bytes[..1]
            }
            Emit::Rel16 { value, nowarn } => {
                let disp = value.wrapping_sub(section.pc as i64);
                if !nowarn && (-128..=127).contains(&disp) {
                    events.report_at(
                        Severity::Warning,
                        location.clone(),
                        "16-bit relative value would fit in 8 bits",
                    );
                }
                bytes[0] = (disp >> 8) as u8;
                bytes[1] = disp as u8;
                &bytes[..2]
            }
        };

        let index = section.open.expect("span open after continuity check");
        let span = &mut section.spans[index];
        if matches!(emit, Emit::Pad(_)) {
            span.data.resize(span.data.len() + nbytes, 0);
            if let Some(capture) = capture {
                capture.resize(capture.len() + nbytes, 0);
            }
        } else {
            span.data.extend_from_slice(bytes);
            if let Some(capture) = capture {
                capture.extend_from_slice(bytes);
            }
        }

        if section.pc > MAX_ADDRESS {
            events.report_at(
                Severity::OutOfRange,
                location.clone(),
                "assembling beyond addressable memory",
            );
        }
    }

    /// Advances `pc` and `put` without producing bytes (`rmb`). Closes the
    /// open span.
    pub(crate) fn skip(&mut self, nbytes: i32) {
        let section = self.current_mut();
        section.pc += nbytes;
        section.put += nbytes;
        section.open = None;
    }

    /// Compares every section's end addresses against the previous pass,
    /// remembering the new ones. Reports an inconsistency for every section
    /// on pass 0 — nothing can be known stable until a second pass has run.
    pub(crate) fn finish_pass(&mut self, pass: u32, events: &mut EventList) {
        for (name, section) in self.map.iter_mut() {
            let changed = section.last_pc != section.pc || section.last_put != section.put;
            if pass == 0 || changed {
                section.last_pc = section.pc;
                section.last_put = section.put;
                events.report(
                    Severity::Inconsistent,
                    format!("section '{name}' addresses not yet stable"),
                );
            }
        }
    }

    /// Deep-copies every section's spans into one list, sorts and coalesces
    /// it, and returns the result as an output image.
    pub(crate) fn image(&self, pad: bool, events: &mut EventList) -> Image {
        let mut spans: Vec<Span> = self
            .map
            .values()
            .flat_map(|section| section.spans.iter().cloned())
            .collect();
        coalesce_spans(&mut spans, true, pad, events);
        Image {
            segments: spans
                .into_iter()
                .filter(|span| !span.data.is_empty())
                .map(|span| Segment { put: span.put as u16, data: span.data })
                .collect(),
        }
    }
}

/// Cleans a span list: optionally sorts by (put, sequence), truncates
/// overlaps (reporting them), optionally zero-fills gaps, and concatenates
/// abutting spans.
pub(crate) fn coalesce_spans(
    spans: &mut Vec<Span>,
    sort: bool,
    pad: bool,
    events: &mut EventList,
) {
    if sort {
        spans.sort_by_key(|span| (span.put, span.sequence));
    }
    let mut index = 0;
    while index + 1 < spans.len() {
        let next_put = spans[index + 1].put;
        let span = &mut spans[index];
        let mut span_end = span.put + span.data.len() as i32;

        if span_end > next_put {
            events.report(
                Severity::Data,
                format!(
                    "data at ${:04X} overlaps data at ${:04X}",
                    span.put & 0xffff,
                    next_put & 0xffff
                ),
            );
            let keep = span.data.len().saturating_sub((span_end - next_put) as usize);
            span.data.truncate(keep);
            span_end = span.put + span.data.len() as i32;
        } else if pad && span_end < next_put {
            let fill = (next_put - span_end) as usize;
            span.data.resize(span.data.len() + fill, 0);
            span_end = next_put;
        }

        if span_end == next_put {
            let next = spans.remove(index + 1);
            spans[index].data.extend_from_slice(&next.data);
        } else {
            index += 1;
        }
    }
}
