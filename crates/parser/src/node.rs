//! The tagged value tree shared between the parser and the assembler engine.
//!
//! Everything the parser produces and everything expression evaluation
//! returns is a [`Node`]: a [`NodeKind`] plus an [`Attr`]. The attribute
//! records the operand decorations that matter to instruction encoding — the
//! `<`/`>`/`<<` size forcing, the `#` immediate marker, and the
//! increment/decrement markers on index registers.

use std::fmt;

use bstr::BString;

use crate::register::Reg;

/// A size or mode hint attached to a [`Node`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Attr {
    /// No hint.
    #[default]
    None,
    /// `<<` — force a 5-bit indexed offset.
    FiveBit,
    /// `<` — force 8-bit (direct addressing or an 8-bit offset).
    EightBit,
    /// `>` — force 16-bit (extended addressing or a 16-bit offset).
    SixteenBit,
    /// `,r+` — post-increment by one.
    PostInc,
    /// `,r++` — post-increment by two.
    PostInc2,
    /// `,-r` — pre-decrement by one.
    PreDec,
    /// `,--r` — pre-decrement by two.
    PreDec2,
    /// `r-` — post-decrement, only meaningful to `TFM`.
    PostDec,
    /// `#` — immediate operand marker.
    Immediate,
}

/// A one-operand expression operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `-a`
    Negate,
    /// `+a`
    Identity,
    /// `~a`
    Complement,
}

/// A two-operand expression operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `a*b`
    Multiply,
    /// `a/b` — always evaluates as floating point.
    Divide,
    /// `a%b`
    Modulo,
    /// `a+b`
    Add,
    /// `a-b`
    Subtract,
    /// `a<<b`
    ShiftLeft,
    /// `a>>b`
    ShiftRight,
    /// `a&b`
    BitAnd,
    /// `a^b`
    BitXor,
    /// `a|b`
    BitOr,
}

/// The payload of a [`Node`].
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Placeholder, e.g. the missing offset in `,x`.
    Empty,
    /// The result of evaluating something not (yet) defined.
    Undef,
    /// Integer literal or computed integer.
    Int(i64),
    /// Float literal or computed float.
    Float(f64),
    /// String literal or pasted text.
    Str(BString),
    /// A named CPU register.
    Reg(Reg),
    /// `*` — the current program counter.
    Pc,
    /// `Nb` — nearest prior local label numbered N.
    Backref(i64),
    /// `Nf` — nearest following local label numbered N.
    Fwdref(i64),
    /// `\N` — macro positional argument N.
    Interp(i64),
    /// An identifier assembled by pasting the child values into a name,
    /// which is then looked up as a symbol.
    Id(Vec<Node>),
    /// A string assembled by pasting the child values together.
    Text(Vec<Node>),
    /// A unary operator application.
    Oper1(UnaryOp, Box<Node>),
    /// A binary operator application.
    Oper2(BinaryOp, Box<(Node, Node)>),
    /// An argument list, or a bracketed (indirect) operand.
    Array(Vec<Node>),
}

/// One value in the tree: a [`NodeKind`] with an [`Attr`].
///
/// Equality compares the payload only, and floats bitwise — two nodes that
/// print the same but were produced by different spellings of an attribute
/// still compare equal, which is what pass-to-pass stability checks want.
#[derive(Debug, Clone, Default)]
pub struct Node {
    /// The attached size/mode hint.
    pub attr: Attr,
    /// The payload.
    pub kind: NodeKind,
}

impl Default for NodeKind {
    fn default() -> Self {
        NodeKind::Empty
    }
}

impl Node {
    /// Wraps a [`NodeKind`] with no attribute.
    pub fn new(kind: NodeKind) -> Self {
        Self { attr: Attr::None, kind }
    }

    /// An [`NodeKind::Empty`] node.
    pub fn empty() -> Self {
        Self::new(NodeKind::Empty)
    }

    /// An [`NodeKind::Undef`] node.
    pub fn undef() -> Self {
        Self::new(NodeKind::Undef)
    }

    /// An integer node.
    pub fn int(value: i64) -> Self {
        Self::new(NodeKind::Int(value))
    }

    /// A float node.
    pub fn float(value: f64) -> Self {
        Self::new(NodeKind::Float(value))
    }

    /// A string node.
    pub fn str(value: impl Into<BString>) -> Self {
        Self::new(NodeKind::Str(value.into()))
    }

    /// A register node.
    pub fn reg(reg: Reg) -> Self {
        Self::new(NodeKind::Reg(reg))
    }

    /// A program-counter reference.
    pub fn pc() -> Self {
        Self::new(NodeKind::Pc)
    }

    /// A local back reference.
    pub fn backref(number: i64) -> Self {
        Self::new(NodeKind::Backref(number))
    }

    /// A local forward reference.
    pub fn fwdref(number: i64) -> Self {
        Self::new(NodeKind::Fwdref(number))
    }

    /// A macro positional reference.
    pub fn interp(number: i64) -> Self {
        Self::new(NodeKind::Interp(number))
    }

    /// An identifier paste list.
    pub fn id(parts: Vec<Node>) -> Self {
        Self::new(NodeKind::Id(parts))
    }

    /// A text paste list.
    pub fn text(parts: Vec<Node>) -> Self {
        Self::new(NodeKind::Text(parts))
    }

    /// A unary operator node.
    pub fn oper1(op: UnaryOp, arg: Node) -> Self {
        Self::new(NodeKind::Oper1(op, Box::new(arg)))
    }

    /// A binary operator node.
    pub fn oper2(op: BinaryOp, left: Node, right: Node) -> Self {
        Self::new(NodeKind::Oper2(op, Box::new((left, right))))
    }

    /// An array node.
    pub fn array(elements: Vec<Node>) -> Self {
        Self::new(NodeKind::Array(elements))
    }

    /// Returns `self` tagged with `attr`.
    pub fn with_attr(mut self, attr: Attr) -> Self {
        self.attr = attr;
        self
    }

    /// Returns `self` tagged with `attr` unless `attr` is [`Attr::None`],
    /// in which case any existing attribute is preserved.
    pub fn with_attr_if(self, attr: Attr) -> Self {
        if attr == Attr::None {
            self
        } else {
            self.with_attr(attr)
        }
    }

    /// Whether the payload is [`NodeKind::Undef`].
    pub fn is_undef(&self) -> bool {
        matches!(self.kind, NodeKind::Undef)
    }

    /// The integer payload, if this is an [`NodeKind::Int`].
    pub fn as_int(&self) -> Option<i64> {
        match self.kind {
            NodeKind::Int(value) => Some(value),
            _ => None,
        }
    }

    /// The register payload, if this is a [`NodeKind::Reg`].
    pub fn as_reg(&self) -> Option<Reg> {
        match self.kind {
            NodeKind::Reg(reg) => Some(reg),
            _ => None,
        }
    }

    /// The elements, if this is an [`NodeKind::Array`].
    pub fn as_array(&self) -> Option<&[Node]> {
        match &self.kind {
            NodeKind::Array(elements) => Some(elements),
            _ => None,
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl PartialEq for NodeKind {
    fn eq(&self, other: &Self) -> bool {
        use NodeKind::*;
        match (self, other) {
            (Empty, Empty) | (Undef, Undef) | (Pc, Pc) => true,
            (Int(a), Int(b)) => a == b,
            // Bitwise, so that NaN-valued expressions still compare stable.
            (Float(a), Float(b)) => a.to_bits() == b.to_bits(),
            (Str(a), Str(b)) => a == b,
            (Reg(a), Reg(b)) => a == b,
            (Backref(a), Backref(b)) => a == b,
            (Fwdref(a), Fwdref(b)) => a == b,
            (Interp(a), Interp(b)) => a == b,
            (Id(a), Id(b)) => a == b,
            (Text(a), Text(b)) => a == b,
            (Oper1(op_a, a), Oper1(op_b, b)) => op_a == op_b && a == b,
            (Oper2(op_a, a), Oper2(op_b, b)) => op_a == op_b && a == b,
            (Array(a), Array(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UnaryOp::Negate => "-",
            UnaryOp::Identity => "+",
            UnaryOp::Complement => "~",
        })
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::ShiftLeft => "<<",
            BinaryOp::ShiftRight => ">>",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitXor => "^",
            BinaryOp::BitOr => "|",
        })
    }
}

/// Prints the node back in source form. Used when exporting macros and
/// symbols; binary operators are parenthesised rather than re-deriving
/// precedence.
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.attr {
            Attr::Immediate => write!(f, "#")?,
            Attr::FiveBit => write!(f, "<<")?,
            Attr::EightBit => write!(f, "<")?,
            Attr::SixteenBit => write!(f, ">")?,
            Attr::PreDec => write!(f, "-")?,
            Attr::PreDec2 => write!(f, "--")?,
            _ => {}
        }
        match &self.kind {
            NodeKind::Empty => {}
            NodeKind::Undef => write!(f, "?")?,
            NodeKind::Int(value) => write!(f, "{value}")?,
            NodeKind::Float(value) => write!(f, "{value}")?,
            NodeKind::Str(value) => write!(f, "{value}")?,
            NodeKind::Reg(reg) => write!(f, "{reg}")?,
            NodeKind::Pc => write!(f, "*")?,
            NodeKind::Backref(number) => write!(f, "{number}b")?,
            NodeKind::Fwdref(number) => write!(f, "{number}f")?,
            NodeKind::Interp(number) => write!(f, "\\{number}")?,
            NodeKind::Id(parts) | NodeKind::Text(parts) => {
                for part in parts {
                    write!(f, "{part}")?;
                }
            }
            NodeKind::Oper1(op, arg) => write!(f, "{op}{arg}")?,
            NodeKind::Oper2(op, args) => write!(f, "({}{op}{})", args.0, args.1)?,
            NodeKind::Array(elements) => {
                write!(f, "[")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{element}")?;
                }
                write!(f, "]")?;
            }
        }
        match self.attr {
            Attr::PostInc => write!(f, "+")?,
            Attr::PostInc2 => write!(f, "++")?,
            Attr::PostDec => write!(f, "-")?,
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_ignores_attr() {
        let plain = Node::int(16);
        let forced = Node::int(16).with_attr(Attr::EightBit);
        assert_eq!(plain, forced);
        assert_ne!(Node::int(16), Node::int(17));
    }

    #[test]
    fn test_float_equality_is_bitwise() {
        assert_eq!(Node::float(f64::NAN), Node::float(f64::NAN));
        assert_ne!(Node::float(0.0), Node::float(-0.0));
    }

    #[test]
    fn test_with_attr_if_preserves_existing() {
        let node = Node::int(1).with_attr(Attr::SixteenBit);
        assert_eq!(node.with_attr_if(Attr::None).attr, Attr::SixteenBit);
        let node = Node::int(1).with_attr(Attr::SixteenBit);
        assert_eq!(node.with_attr_if(Attr::EightBit).attr, Attr::EightBit);
    }

    #[test]
    fn test_display_source_form() {
        let indexed = Node::array(vec![
            Node::int(5),
            Node::reg(Reg::X).with_attr(Attr::PostInc2),
        ]);
        assert_eq!(indexed.to_string(), "[5,x++]");

        let sum = Node::oper2(BinaryOp::Add, Node::id(vec![Node::str("loop")]), Node::int(2));
        assert_eq!(sum.to_string(), "(loop+2)");

        assert_eq!(Node::int(16).with_attr(Attr::Immediate).to_string(), "#16");
        assert_eq!(Node::interp(2).to_string(), "\\2");
    }
}
