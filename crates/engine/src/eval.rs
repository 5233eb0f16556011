//! Expression evaluation.
//!
//! [`Assembler::eval`] reduces a value tree to a base value. Base values
//! come back as clones; everything else — pc references, local label
//! references, positional variables, symbol lookups, operator trees —
//! resolves against the assembler's current state. Failure returns `None`
//! after reporting; callers that need size stability substitute `Undef`.

use asm6809_errors::Severity;
use asm6809_parser::{Attr, BinaryOp, Node, NodeKind, UnaryOp};
use bstr::BString;

use crate::assembler::Assembler;
use crate::interp::InterpError;

/// Casts a base value to an integer node: floats truncate toward zero.
pub(crate) fn to_int(node: &Node) -> Option<Node> {
    match node.kind {
        NodeKind::Int(_) => Some(node.clone()),
        NodeKind::Float(value) => Some(Node::int(value as i64).with_attr(node.attr)),
        _ => None,
    }
}

/// Casts a base value to a float node.
pub(crate) fn to_float(node: &Node) -> Option<Node> {
    match node.kind {
        NodeKind::Float(_) => Some(node.clone()),
        NodeKind::Int(value) => Some(Node::float(value as f64).with_attr(node.attr)),
        _ => None,
    }
}

impl Assembler {
    /// Evaluates a node to a base value.
    pub(crate) fn eval(&mut self, node: &Node) -> Option<Node> {
        let attr = node.attr;
        match &node.kind {
            // Base types evaluate to themselves.
            NodeKind::Empty
            | NodeKind::Undef
            | NodeKind::Int(_)
            | NodeKind::Float(_)
            | NodeKind::Str(_)
            | NodeKind::Reg(_) => Some(node.clone()),

            NodeKind::Pc => {
                Some(Node::int(self.sections.current().pc as i64).with_attr(attr))
            }

            NodeKind::Backref(number) => {
                let section = self.sections.current();
                let found = section.locals.backref(*number, section.line_number).cloned();
                match found {
                    Some(value) => Some(value.with_attr(attr)),
                    None => {
                        self.report(
                            Severity::Inconsistent,
                            format!("backref '{number}' not defined"),
                        );
                        None
                    }
                }
            }
            NodeKind::Fwdref(number) => {
                let section = self.sections.current();
                let found = section.locals.fwdref(*number, section.line_number).cloned();
                match found {
                    Some(value) => Some(value.with_attr(attr)),
                    None => {
                        self.report(
                            Severity::Inconsistent,
                            format!("fwdref '{number}' not defined"),
                        );
                        None
                    }
                }
            }

            NodeKind::Interp(index) => match self.interp.get(*index) {
                Ok(value) => Some(value),
                Err(InterpError::EmptyStack) => {
                    self.report(Severity::Syntax, "no positional variables on stack");
                    None
                }
                Err(InterpError::BadIndex(index)) => {
                    self.report(
                        Severity::Syntax,
                        format!("invalid positional variable: {index}"),
                    );
                    None
                }
            },

            // An identifier is either one positional variable looked up
            // directly, or a name pasted together and fetched as a symbol.
            NodeKind::Id(parts) => {
                if let [only] = parts.as_slice() {
                    if matches!(only.kind, NodeKind::Interp(_)) {
                        return self.eval(only).map(|value| value.with_attr_if(attr));
                    }
                }
                let name = self.eval_string(node)?;
                let name = match &name.kind {
                    NodeKind::Str(text) => text.to_string(),
                    _ => return None,
                };
                let stored = self.symbol_get(&name)?;
                let value = self.eval(&stored)?;
                Some(value.with_attr_if(attr))
            }

            NodeKind::Text(_) => self.eval_string(node).map(|value| value.with_attr(attr)),

            NodeKind::Oper1(op, arg) => {
                self.eval_oper1(*op, arg).map(|value| value.with_attr(attr))
            }
            NodeKind::Oper2(op, args) => self
                .eval_oper2(*op, &args.0, &args.1)
                .map(|value| value.with_attr(attr)),

            // Evaluating an array evaluates each element; elements that
            // fail become undef so arity is preserved.
            NodeKind::Array(elements) => {
                let evaluated = elements
                    .iter()
                    .map(|element| self.eval(element).unwrap_or_else(Node::undef))
                    .collect();
                Some(Node::array(evaluated).with_attr(attr))
            }
        }
    }

    /// Fetches a symbol's stored value. Under the ignore-undefined flag a
    /// missing symbol quietly reads as zero; otherwise it is an
    /// inconsistency for a later pass to resolve.
    pub(crate) fn symbol_get(&mut self, name: &str) -> Option<Node> {
        if let Some(node) = self.symbols.try_get(name) {
            return Some(node.clone());
        }
        if self.ignore_undefined {
            return Some(Node::int(0));
        }
        self.report(Severity::Inconsistent, format!("symbol '{name}' not defined"));
        None
    }

    /// Evaluates a string, identifier or text paste list to a string node.
    /// Child values append as text: strings as-is, integers in decimal,
    /// undecorated registers by name.
    pub(crate) fn eval_string(&mut self, node: &Node) -> Option<Node> {
        let attr = node.attr;
        let parts = match &node.kind {
            NodeKind::Str(_) => return Some(node.clone()),
            NodeKind::Id(parts) | NodeKind::Text(parts) => parts,
            _ => return None,
        };
        let mut out = BString::from("");
        for part in parts {
            let value = self.eval(part)?;
            match &value.kind {
                NodeKind::Str(text) => out.extend_from_slice(text),
                NodeKind::Int(number) => out.extend_from_slice(number.to_string().as_bytes()),
                NodeKind::Reg(reg) if value.attr == Attr::None => {
                    out.extend_from_slice(reg.name().as_bytes())
                }
                _ => return None,
            }
        }
        Some(Node::str(out).with_attr(attr))
    }

    fn eval_oper1(&mut self, op: UnaryOp, arg: &Node) -> Option<Node> {
        let value = self.eval(arg)?;
        match op {
            UnaryOp::Negate => match value.kind {
                NodeKind::Int(v) => Some(Node::int(v.wrapping_neg())),
                NodeKind::Float(v) => Some(Node::float(-v)),
                _ => None,
            },
            UnaryOp::Identity => match value.kind {
                NodeKind::Int(_) | NodeKind::Float(_) => Some(value),
                _ => None,
            },
            UnaryOp::Complement => {
                let value = to_int(&value)?;
                Some(Node::int(!value.as_int().expect("cast to int")))
            }
        }
    }

    fn eval_oper2(&mut self, op: BinaryOp, left: &Node, right: &Node) -> Option<Node> {
        let left = self.eval(left)?;
        let right = self.eval(right)?;

        let int_only = matches!((&left.kind, &right.kind), (NodeKind::Int(_), NodeKind::Int(_)));

        match op {
            BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Add | BinaryOp::Subtract => {
                if int_only && op != BinaryOp::Divide {
                    let a = left.as_int().expect("int");
                    let b = right.as_int().expect("int");
                    return Some(Node::int(match op {
                        BinaryOp::Multiply => a.wrapping_mul(b),
                        BinaryOp::Add => a.wrapping_add(b),
                        _ => a.wrapping_sub(b),
                    }));
                }
                let a = match to_float(&left)?.kind {
                    NodeKind::Float(v) => v,
                    _ => return None,
                };
                let b = match to_float(&right)?.kind {
                    NodeKind::Float(v) => v,
                    _ => return None,
                };
                Some(Node::float(match op {
                    BinaryOp::Multiply => a * b,
                    BinaryOp::Divide => a / b,
                    BinaryOp::Add => a + b,
                    _ => a - b,
                }))
            }

            BinaryOp::Modulo
            | BinaryOp::ShiftLeft
            | BinaryOp::ShiftRight
            | BinaryOp::BitAnd
            | BinaryOp::BitXor
            | BinaryOp::BitOr => {
                let a = to_int(&left)?.as_int().expect("cast to int");
                let b = to_int(&right)?.as_int().expect("cast to int");
                let result = match op {
                    BinaryOp::Modulo => {
                        if b == 0 {
                            self.report(Severity::OutOfRange, "division by zero in expression");
                            return None;
                        }
                        a.wrapping_rem(b)
                    }
                    BinaryOp::ShiftLeft => self.shift(a, b, false)?,
                    BinaryOp::ShiftRight => self.shift(a, b, true)?,
                    BinaryOp::BitAnd => a & b,
                    BinaryOp::BitXor => a ^ b,
                    _ => a | b,
                };
                Some(Node::int(result))
            }
        }
    }

    // Shift semantics have to be pinned down somewhere: negative counts are
    // an error, counts past the width saturate the way an arithmetic shift
    // repeated 64 times would.
    fn shift(&mut self, value: i64, count: i64, right: bool) -> Option<i64> {
        if count < 0 {
            self.report(Severity::Syntax, "negative shift count");
            return None;
        }
        if count >= 64 {
            return Some(if right { value >> 63 } else { 0 });
        }
        Some(if right { value >> (count as u32) } else { value.wrapping_shl(count as u32) })
    }
}
