//! Line-by-line assembly: label binding, directives, macro machinery and
//! the dispatch into the instruction encoder.

use std::rc::Rc;

use asm6809_errors::Severity;
use asm6809_parser::{Attr, Line, Node, NodeKind, Program, ProgramKind, Reg};

use crate::assembler::{Assembler, Cond};
use crate::eval::to_int;
use crate::listing::ListingLine;
use crate::opcode::{opcode_by_name, Family};
use crate::program::{Context, ParsedFile};
use crate::section::Emit;
use crate::symbol::SetOutcome;

fn raw_args(line: &Line) -> &[Node] {
    line.args.as_ref().and_then(Node::as_array).unwrap_or(&[])
}

/// The mnemonic as plain text, when it is one — no interpolation involved.
fn shallow_opcode(node: &Node) -> Option<String> {
    if let NodeKind::Id(parts) = &node.kind {
        if let [only] = parts.as_slice() {
            if let NodeKind::Str(text) = &only.kind {
                return Some(text.to_string().to_lowercase());
            }
        }
    }
    None
}

impl Assembler {
    /// Assembles a cached file, replaying its parse diagnostics first so
    /// they survive the per-pass event clearing.
    pub(crate) fn assemble_parsed(&mut self, parsed: &ParsedFile) {
        for event in &parsed.diagnostics {
            self.events.record(event.clone());
        }
        self.assemble_program(parsed.program.clone());
    }

    /// Runs one program (file or macro body) under a new context.
    pub(crate) fn assemble_program(&mut self, program: Rc<Program>) {
        if self.contexts.len() >= self.options.max_program_depth {
            self.report(Severity::Fatal, "maximum program nesting depth exceeded");
            return;
        }
        self.contexts.push(Context { name: program.name.clone(), line_number: 0 });
        for index in 0..program.lines.len() {
            if let Some(context) = self.contexts.last_mut() {
                context.line_number = index as u32 + 1;
            }
            let line = program.lines[index].clone();
            self.assemble_line(&line);
            if self.end_requested {
                self.end_requested = false;
                break;
            }
            if self.events.at_least(Severity::Fatal) {
                break;
            }
        }
        self.contexts.pop();
    }

    fn assemble_line(&mut self, line: &Line) {
        let pc_before = self.sections.current().pc;
        if self.options.listing {
            self.sections.capture = Some(Vec::new());
        }

        self.assemble_line_inner(line);

        if self.options.listing {
            let bytes = self.sections.capture.take().unwrap_or_default();
            let pc = (line.label.is_some() || line.opcode.is_some())
                .then_some((pc_before & 0xffff) as u16);
            self.listing.add(ListingLine { pc, bytes, text: line.text.clone() });
        }
    }

    fn assemble_line_inner(&mut self, line: &Line) {
        // Statement counter: the ordering key for local label references.
        self.sections.current_mut().line_number += 1;

        let shallow = line.opcode.as_ref().and_then(shallow_opcode);

        // Macro capture swallows everything up to `endm`.
        if self.capture_macro.is_some() || self.skip_to_endm {
            match shallow.as_deref() {
                Some("endm") => self.finish_macro(),
                Some("macro") => self.report(Severity::Syntax, "macro definitions cannot nest"),
                _ => {
                    if let Some((_, body)) = self.capture_macro.as_mut() {
                        body.lines.push(line.clone());
                    }
                }
            }
            return;
        }

        // Falsified conditionals skip everything but conditional structure.
        if !self.conds_active() {
            match shallow.as_deref() {
                Some("if") | Some("ifdef") | Some("ifndef") => {
                    self.conds.push(Cond { active: false, taken: true, seen_else: false });
                }
                Some("elsif") => self.directive_elsif(line),
                Some("else") => self.directive_else(),
                Some("endif") => self.directive_endif(),
                _ => {}
            }
            return;
        }

        let Some(opcode) = &line.opcode else {
            // Label-only line.
            if let Some(label) = &line.label {
                let pc = self.sections.current().pc as i64;
                self.bind_label(label, Node::int(pc), false);
            }
            return;
        };

        let directive = match shallow {
            Some(name) => name,
            // Pasted mnemonics (`op\1`) evaluate through the string path.
            None => match self.eval_string(opcode) {
                Some(node) => match &node.kind {
                    NodeKind::Str(text) => text.to_string().to_lowercase(),
                    _ => {
                        self.report(Severity::Syntax, "bad mnemonic");
                        return;
                    }
                },
                None => {
                    self.report(Severity::Syntax, "bad mnemonic");
                    return;
                }
            },
        };

        // Labels bind to the current pc except where the directive gives
        // them a different meaning.
        let special = matches!(
            directive.as_str(),
            "equ" | "set"
                | "macro"
                | "org"
                | "put"
                | "if"
                | "ifdef"
                | "ifndef"
                | "elsif"
                | "else"
                | "endif"
                | "endm"
        );
        if !special {
            if let Some(label) = &line.label {
                let pc = self.sections.current().pc as i64;
                self.bind_label(label, Node::int(pc), false);
            }
        }

        match directive.as_str() {
            "equ" => self.directive_equ(line, false),
            "set" => self.directive_equ(line, true),
            "org" => self.directive_org(line, true),
            "put" => self.directive_org(line, false),
            "setdp" => self.directive_setdp(line),
            "rmb" => self.directive_rmb(line),
            "rzb" => self.directive_rzb(line),
            "fill" => self.directive_fill(line),
            "fcb" => self.directive_fcb(line, 1),
            "fdb" => self.directive_fcb(line, 2),
            "fqb" => self.directive_fcb(line, 4),
            "fcc" => self.directive_fcc(line),
            "include" => self.directive_include(line),
            "export" => self.directive_export(line),
            "section" => self.directive_section(line),
            "end" => self.directive_end(line),
            "macro" => self.directive_macro(line),
            "endm" => self.report(Severity::Syntax, "endm without macro"),
            "if" => self.directive_if(line),
            "ifdef" => self.directive_ifdef(line, false),
            "ifndef" => self.directive_ifdef(line, true),
            "elsif" => self.directive_elsif(line),
            "else" => self.directive_else(),
            "endif" => self.directive_endif(),
            _ => self.assemble_instruction(&directive, line),
        }
    }

    fn conds_active(&self) -> bool {
        self.conds.iter().all(|cond| cond.active)
    }

    /// Binds `label` to `value`: numbered labels go to the current
    /// section's local table, names to the global symbol table.
    fn bind_label(&mut self, label: &Node, value: Node, changeable: bool) {
        match &label.kind {
            NodeKind::Int(number) => {
                let number = *number;
                let section = self.sections.current_mut();
                let line = section.line_number;
                if section.locals.set(number, line, value) {
                    self.report(
                        Severity::Inconsistent,
                        format!("value of local label '{number}' unstable"),
                    );
                }
            }
            NodeKind::Id(_) => {
                let Some(name) = self.eval_string(label) else {
                    self.report(Severity::Syntax, "bad label");
                    return;
                };
                let name = match &name.kind {
                    NodeKind::Str(text) => text.to_string(),
                    _ => {
                        self.report(Severity::Syntax, "bad label");
                        return;
                    }
                };
                match self.symbols.force_set(&name, value, changeable, self.pass) {
                    SetOutcome::Ok => {}
                    SetOutcome::Redefined => {
                        self.report(Severity::Syntax, format!("symbol '{name}' redefined"));
                    }
                    SetOutcome::Unstable => {
                        self.report(
                            Severity::Inconsistent,
                            format!("value of '{name}' unstable"),
                        );
                    }
                }
            }
            _ => self.report(Severity::Syntax, "bad label"),
        }
    }

    /// Evaluates the argument list to base values, arity preserved.
    fn eval_args(&mut self, line: &Line) -> Vec<Node> {
        let Some(args) = &line.args else {
            return Vec::new();
        };
        match self.eval(args).map(|node| node.kind) {
            Some(NodeKind::Array(elements)) => elements,
            _ => Vec::new(),
        }
    }

    /// Evaluates the first argument to an integer. Reports arity problems;
    /// unresolved values have already been reported by evaluation.
    fn eval_int_arg(&mut self, line: &Line) -> Option<i64> {
        let Some(arg) = raw_args(line).first() else {
            self.report(Severity::Syntax, "invalid number of arguments");
            return None;
        };
        let arg = arg.clone();
        let value = self.eval(&arg)?;
        to_int(&value)?.as_int()
    }

    fn string_of(&mut self, node: &Node) -> Option<String> {
        let value = self.eval_string(node)?;
        match value.kind {
            NodeKind::Str(text) => Some(text.to_string()),
            _ => None,
        }
    }

    fn directive_equ(&mut self, line: &Line, changeable: bool) {
        let Some(label) = &line.label else {
            self.report(Severity::Syntax, "missing label");
            return;
        };
        let Some(arg) = raw_args(line).first() else {
            self.report(Severity::Syntax, "invalid number of arguments");
            return;
        };
        let arg = arg.clone();
        let value = self.eval(&arg).unwrap_or_else(Node::undef);
        self.bind_label(&label.clone(), value, changeable);
    }

    fn directive_org(&mut self, line: &Line, also_pc: bool) {
        if let Some(value) = self.eval_int_arg(line) {
            if !(0..=0xffff).contains(&value) {
                self.report(Severity::OutOfRange, "origin address out of range");
            }
            let value = (value & 0xffff) as i32;
            let section = self.sections.current_mut();
            if also_pc {
                section.pc = value;
            }
            section.put = value;
        }
        // The label takes the *new* address.
        if let Some(label) = &line.label {
            let pc = self.sections.current().pc as i64;
            self.bind_label(&label.clone(), Node::int(pc), false);
        }
    }

    fn directive_setdp(&mut self, line: &Line) {
        let value = match raw_args(line).first() {
            Some(arg) => {
                let arg = arg.clone();
                self.eval(&arg).as_ref().and_then(to_int).and_then(|node| node.as_int())
            }
            None => None,
        };
        self.sections.current_mut().dp = value.map(|v| v as i32).unwrap_or(-1);
    }

    fn directive_rmb(&mut self, line: &Line) {
        match self.eval_int_arg(line) {
            Some(count) if count >= 0 => self.sections.skip(count as i32),
            Some(_) => self.report(Severity::OutOfRange, "negative reserve size"),
            None => {}
        }
    }

    fn directive_rzb(&mut self, line: &Line) {
        match self.eval_int_arg(line) {
            Some(count) if count >= 0 => self.emit(Emit::Pad(count as usize)),
            Some(_) => self.report(Severity::OutOfRange, "negative fill size"),
            None => {}
        }
    }

    fn directive_fill(&mut self, line: &Line) {
        let args = self.eval_args(line);
        if args.len() != 2 {
            self.report(Severity::Syntax, "invalid number of arguments");
            return;
        }
        let count = match to_int(&args[1]).and_then(|node| node.as_int()) {
            Some(count) if count >= 0 => count as usize,
            Some(_) => {
                self.report(Severity::OutOfRange, "negative fill size");
                return;
            }
            None => return,
        };
        match to_int(&args[0]).and_then(|node| node.as_int()) {
            Some(value) => {
                for _ in 0..count {
                    self.emit(Emit::Imm8(value));
                }
            }
            None => self.emit(Emit::Pad(count)),
        }
    }

    fn directive_fcb(&mut self, line: &Line, width: usize) {
        for arg in self.eval_args(line) {
            match to_int(&arg).and_then(|node| node.as_int()) {
                Some(value) => match width {
                    1 => self.emit(Emit::Imm8(value)),
                    2 => self.emit(Emit::Imm16(value)),
                    _ => self.emit(Emit::Imm32(value)),
                },
                None => self.emit(Emit::Pad(width)),
            }
        }
    }

    fn directive_fcc(&mut self, line: &Line) {
        for arg in self.eval_args(line) {
            match &arg.kind {
                NodeKind::Str(text) => {
                    for byte in text.iter() {
                        self.emit(Emit::Imm8(*byte as i64));
                    }
                }
                NodeKind::Int(value) => self.emit(Emit::Imm8(*value)),
                NodeKind::Undef | NodeKind::Empty => self.emit(Emit::Pad(1)),
                _ => self.report(Severity::Syntax, "bad character data"),
            }
        }
    }

    fn directive_include(&mut self, line: &Line) {
        let Some(arg) = raw_args(line).first() else {
            self.report(Severity::Syntax, "invalid number of arguments");
            return;
        };
        let Some(name) = self.string_of(&arg.clone()) else {
            self.report(Severity::Syntax, "bad include filename");
            return;
        };
        let parsed = match self.programs.file(&name) {
            Some(parsed) => parsed,
            None => match std::fs::read_to_string(&name) {
                Ok(text) => self.programs.file_from_source(&name, &text, self.options.isa),
                Err(error) => {
                    self.report(Severity::Fatal, format!("{name}: {error}"));
                    return;
                }
            },
        };
        self.assemble_parsed(&parsed);
    }

    fn directive_export(&mut self, line: &Line) {
        for arg in raw_args(line).to_vec() {
            match self.string_of(&arg) {
                Some(name) => {
                    self.exports.insert(name);
                }
                None => self.report(Severity::Syntax, "bad export name"),
            }
        }
    }

    fn directive_section(&mut self, line: &Line) {
        let Some(arg) = raw_args(line).first() else {
            self.report(Severity::Syntax, "invalid number of arguments");
            return;
        };
        match self.string_of(&arg.clone()) {
            Some(name) => {
                let pass = self.pass;
                self.sections.set_current(&name, pass);
            }
            None => self.report(Severity::Syntax, "bad section name"),
        }
    }

    fn directive_end(&mut self, line: &Line) {
        if raw_args(line).first().is_some() {
            if let Some(value) = self.eval_int_arg(line) {
                self.exec_default = Some((value & 0xffff) as u16);
            }
        }
        self.end_requested = true;
    }

    fn directive_macro(&mut self, line: &Line) {
        let Some(label) = &line.label else {
            self.report(Severity::Syntax, "macro definition needs a label");
            self.skip_to_endm = true;
            return;
        };
        let Some(name) = self.string_of(&label.clone()) else {
            self.report(Severity::Syntax, "bad macro name");
            self.skip_to_endm = true;
            return;
        };
        if self.programs.macro_by_name(&name).is_some() {
            // Defined on an earlier pass, or a genuine redefinition.
            if self.pass == 0 {
                self.report(Severity::Syntax, format!("attempt to redefine macro '{name}'"));
            }
            self.skip_to_endm = true;
            return;
        }
        self.capture_macro = Some((name.clone(), Program::new(ProgramKind::Macro, name)));
    }

    fn finish_macro(&mut self) {
        if let Some((name, body)) = self.capture_macro.take() {
            self.programs.define_macro(&name, body);
        }
        self.skip_to_endm = false;
    }

    fn directive_if(&mut self, line: &Line) {
        let value = self.eval_int_arg(line);
        let active = matches!(value, Some(v) if v != 0);
        self.conds.push(Cond { active, taken: active, seen_else: false });
    }

    fn directive_ifdef(&mut self, line: &Line, negate: bool) {
        let Some(arg) = raw_args(line).first() else {
            self.report(Severity::Syntax, "invalid number of arguments");
            self.conds.push(Cond { active: false, taken: true, seen_else: false });
            return;
        };
        // Probing must not record an inconsistency for a missing symbol.
        let arg = arg.clone();
        self.ignore_undefined = true;
        let name = self.string_of(&arg);
        self.ignore_undefined = false;
        let defined = match name {
            Some(name) => self.symbols.try_get(&name).is_some(),
            None => false,
        };
        let active = defined != negate;
        self.conds.push(Cond { active, taken: active, seen_else: false });
    }

    fn directive_elsif(&mut self, line: &Line) {
        if self.conds.is_empty() {
            self.report(Severity::Syntax, "elsif without if");
            return;
        }
        let parent_active =
            self.conds[..self.conds.len() - 1].iter().all(|cond| cond.active);
        let (taken, seen_else) = {
            let top = self.conds.last().expect("checked non-empty");
            (top.taken, top.seen_else)
        };
        if seen_else {
            self.report(Severity::Syntax, "elsif after else");
            return;
        }
        if taken || !parent_active {
            self.conds.last_mut().expect("checked non-empty").active = false;
            return;
        }
        let value = self.eval_int_arg(line);
        let active = matches!(value, Some(v) if v != 0);
        let top = self.conds.last_mut().expect("checked non-empty");
        top.active = active;
        top.taken = active;
    }

    fn directive_else(&mut self) {
        if self.conds.is_empty() {
            self.report(Severity::Syntax, "else without if");
            return;
        }
        let parent_active =
            self.conds[..self.conds.len() - 1].iter().all(|cond| cond.active);
        let top = self.conds.last_mut().expect("checked non-empty");
        if top.seen_else {
            let message = "multiple else in conditional";
            self.report(Severity::Syntax, message);
            return;
        }
        top.active = parent_active && !top.taken;
        top.taken = true;
        top.seen_else = true;
    }

    fn directive_endif(&mut self) {
        if self.conds.pop().is_none() {
            self.report(Severity::Syntax, "endif without if");
        }
    }

    /// A real mnemonic (or macro invocation): evaluate operands and encode.
    fn assemble_instruction(&mut self, name: &str, line: &Line) {
        if let Some(body) = self.programs.macro_by_name(name) {
            let frame = match &line.args {
                Some(args) => {
                    let args = args.clone();
                    self.eval(&args).unwrap_or_else(Node::undef)
                }
                None => Node::array(Vec::new()),
            };
            self.interp.push(frame);
            self.assemble_program(body);
            self.interp.pop();
            return;
        }

        let Some(op) = opcode_by_name(name, self.options.isa) else {
            self.report(Severity::Syntax, format!("unrecognised mnemonic '{name}'"));
            return;
        };

        let args = self.eval_args(line);
        let immediate_first =
            args.first().map(|arg| arg.attr == Attr::Immediate).unwrap_or(false);

        match op.family {
            Family::Inherent => self.instr_inherent(op, &args),
            Family::Imm8 | Family::Imm16 | Family::Imm32 => {
                if op.modes.is_empty() || immediate_first {
                    self.instr_immediate(op, &args);
                } else {
                    self.instr_address(op, &args, None);
                }
            }
            Family::Rel8 | Family::Rel16 => self.instr_rel(op, &args),
            Family::Pair => self.instr_pair(op, &args),
            Family::StackS => self.instr_stack(op, &args, Reg::S),
            Family::StackU => self.instr_stack(op, &args, Reg::U),
            Family::Imm8Mem => self.instr_imm8_mem(op, &args),
            Family::RegMem => self.instr_reg_mem(op, &args),
            Family::Tfm => self.instr_tfm(op, &args),
            Family::Mem => {
                if immediate_first {
                    self.report(Severity::Syntax, "immediate operand not allowed");
                    return;
                }
                self.instr_address(op, &args, None);
            }
        }
    }
}
