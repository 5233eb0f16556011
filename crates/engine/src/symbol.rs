//! Global symbols and per-section numbered local labels.
//!
//! Symbols remember the pass they were last written in, which is how
//! redefinition inside one pass is told apart from the perfectly normal
//! redefinition on the *next* pass. Values changing between passes are the
//! engine's convergence signal, so the store reports them rather than
//! hiding them.

use std::collections::HashMap;

use asm6809_parser::Node;

/// What a symbol write did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SetOutcome {
    /// Stored without complaint.
    Ok,
    /// The symbol was already defined this pass and is not changeable; the
    /// old value stands.
    Redefined,
    /// Stored, but the value differs from the previous pass — another pass
    /// is needed.
    Unstable,
}

#[derive(Debug)]
struct Symbol {
    pass: u32,
    changeable: bool,
    node: Node,
}

/// The global name→value table.
#[derive(Debug, Default)]
pub(crate) struct SymbolTable {
    map: HashMap<String, Symbol>,
}

impl SymbolTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Stores `value`, reporting what happened instead of raising. `value`
    /// must already be evaluated to a base type.
    pub(crate) fn force_set(
        &mut self,
        name: &str,
        value: Node,
        changeable: bool,
        pass: u32,
    ) -> SetOutcome {
        if let Some(existing) = self.map.get_mut(name) {
            if existing.pass == pass && !existing.changeable {
                return SetOutcome::Redefined;
            }
            // `set` symbols are expected to drift; only fixed symbols
            // feed the convergence check.
            let unstable = !changeable && existing.node != value;
            existing.pass = pass;
            existing.changeable = changeable;
            existing.node = value;
            if unstable {
                return SetOutcome::Unstable;
            }
            return SetOutcome::Ok;
        }
        self.map.insert(name.to_string(), Symbol { pass, changeable, node: value });
        SetOutcome::Ok
    }

    /// The stored value, if any.
    pub(crate) fn try_get(&self, name: &str) -> Option<&Node> {
        self.map.get(name).map(|symbol| &symbol.node)
    }
}

#[derive(Debug)]
struct LocalSym {
    line: u32,
    node: Node,
}

/// Numbered local labels for one section. Each number maps to every line
/// that defined it; references select by line proximity.
#[derive(Debug, Default)]
pub(crate) struct LocalTable {
    map: HashMap<i64, Vec<LocalSym>>,
}

impl LocalTable {
    /// Records a definition of local label `number` at `line`. Returns true
    /// when this line already defined it with a different value (an
    /// inconsistency for the caller to report).
    pub(crate) fn set(&mut self, number: i64, line: u32, value: Node) -> bool {
        let list = self.map.entry(number).or_default();
        if let Some(sym) = list.iter_mut().find(|sym| sym.line == line) {
            let unstable = sym.node != value;
            sym.node = value;
            unstable
        } else {
            list.push(LocalSym { line, node: value });
            false
        }
    }

    /// The definition of `number` on the nearest line at or before `line`.
    pub(crate) fn backref(&self, number: i64, line: u32) -> Option<&Node> {
        self.map
            .get(&number)?
            .iter()
            .filter(|sym| sym.line <= line)
            .max_by_key(|sym| sym.line)
            .map(|sym| &sym.node)
    }

    /// The definition of `number` on the nearest line strictly after `line`.
    pub(crate) fn fwdref(&self, number: i64, line: u32) -> Option<&Node> {
        self.map
            .get(&number)?
            .iter()
            .filter(|sym| sym.line > line)
            .min_by_key(|sym| sym.line)
            .map(|sym| &sym.node)
    }
}
