//! Expression parsing.
//!
//! Expressions follow C precedence: unary `- + ~` bind tightest, then
//! `* / %`, `+ -`, `<< >>`, `&`, `^` and finally `|`. No whitespace is
//! permitted inside an expression — the operand field of a line ends at the
//! first blank, anything after it being commentary.

use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_while, take_while1},
    character::complete::{anychar, char as nomchar, digit1, one_of, satisfy},
    combinator::map,
    error::{Error, ErrorKind},
    multi::many0,
    sequence::{delimited, pair, preceded},
    Err, IResult,
};

use crate::{
    node::{BinaryOp, Node, UnaryOp},
    register::{Isa, Reg},
};

type Res<'a, O> = IResult<&'a str, O>;

fn fail<O>(input: &str) -> Res<'_, O> {
    Err(Err::Error(Error::new(input, ErrorKind::Verify)))
}

fn ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '.'
}

fn ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

/// A plain identifier: letter, `_` or `.` followed by the same plus digits.
pub(crate) fn identifier(input: &str) -> Res<'_, &str> {
    nom::combinator::recognize(pair(satisfy(ident_start), take_while(ident_continue)))(input)
}

fn radix_int(radix: u32) -> impl Fn(&str) -> Res<'_, i64> {
    move |input| {
        let (rest, digits) = take_while1(|c: char| c.is_digit(radix))(input)?;
        match u64::from_str_radix(digits, radix) {
            Ok(value) => Ok((rest, value as i64)),
            Err(_) => fail(input),
        }
    }
}

fn decimal_or_float(input: &str) -> Res<'_, Node> {
    let (rest, whole) = digit1(input)?;
    // A fraction part turns the literal into a float.
    if let Some(after_dot) = rest.strip_prefix('.') {
        if let Ok((rest, frac)) = digit1::<_, Error<&str>>(after_dot) {
            return match format!("{whole}.{frac}").parse::<f64>() {
                Ok(value) => Ok((rest, Node::float(value))),
                Err(_) => fail(input),
            };
        }
    }
    match whole.parse::<i64>() {
        Ok(value) => Ok((rest, Node::int(value))),
        Err(_) => fail(input),
    }
}

fn number(input: &str) -> Res<'_, Node> {
    alt((
        map(preceded(nomchar('$'), radix_int(16)), Node::int),
        map(preceded(tag_no_case("0x"), radix_int(16)), Node::int),
        map(preceded(tag_no_case("0b"), radix_int(2)), Node::int),
        map(preceded(nomchar('@'), radix_int(8)), Node::int),
        map(preceded(nomchar('%'), radix_int(2)), Node::int),
        decimal_or_float,
    ))(input)
}

/// `1b` / `1f` — reference to the nearest local label 1 backwards/forwards.
fn local_ref(input: &str) -> Res<'_, Node> {
    let (rest, digits) = digit1(input)?;
    let (rest, direction) = one_of("bBfF")(rest)?;
    if rest.chars().next().is_some_and(ident_continue) {
        return fail(input);
    }
    let Ok(number) = digits.parse::<i64>() else {
        return fail(input);
    };
    let node = match direction {
        'b' | 'B' => Node::backref(number),
        _ => Node::fwdref(number),
    };
    Ok((rest, node))
}

/// `'c` — character constant.
fn char_const(input: &str) -> Res<'_, Node> {
    let (rest, c) = preceded(nomchar('\''), anychar)(input)?;
    Ok((rest, Node::int(c as i64)))
}

/// `\N` — macro positional reference.
fn interp(input: &str) -> Res<'_, Node> {
    let (rest, digits) = preceded(nomchar('\\'), digit1)(input)?;
    match digits.parse::<i64>() {
        Ok(number) => Ok((rest, Node::interp(number))),
        Err(_) => fail(input),
    }
}

/// The body of a string literal up to `delim`, honouring `\N` interpolation
/// and backslash escapes. Returns a plain string node, or a text paste list
/// when interpolations are present.
pub(crate) fn string_body(input: &str, delim: char) -> Res<'_, Node> {
    let mut parts: Vec<Node> = Vec::new();
    let mut current = String::new();
    let mut rest = input;
    loop {
        // Running off the end means the string was never terminated.
        let Some(c) = rest.chars().next() else {
            return fail(input);
        };
        if c == delim {
            rest = &rest[c.len_utf8()..];
            if !current.is_empty() || parts.is_empty() {
                parts.push(Node::str(current.as_str()));
            }
            let node = if parts.len() == 1 && matches!(parts[0].kind, crate::NodeKind::Str(_)) {
                parts.pop().expect("one part")
            } else {
                Node::text(parts)
            };
            return Ok((rest, node));
        }
        if c == '\\' {
            if rest[1..].starts_with(|ch: char| ch.is_ascii_digit()) {
                // Interpolation splits the literal into a paste list.
                if !current.is_empty() {
                    parts.push(Node::str(current.as_str()));
                    current.clear();
                }
                let (after, node) = interp(rest)?;
                parts.push(node);
                rest = after;
                continue;
            }
            let mut chars = rest[1..].chars();
            match chars.next() {
                Some('n') => current.push('\n'),
                Some('t') => current.push('\t'),
                Some(escaped) => current.push(escaped),
                None => return fail(input),
            }
            rest = chars.as_str();
            continue;
        }
        current.push(c);
        rest = &rest[c.len_utf8()..];
    }
}

/// A double-quoted string literal.
fn string_literal(input: &str) -> Res<'_, Node> {
    let (rest, _) = nomchar('"')(input)?;
    string_body(rest, '"')
}

/// A pasted name without register mapping — used for labels and mnemonics.
pub(crate) fn paste_name(input: &str) -> Res<'_, Node> {
    let (rest, first) = alt((map(identifier, Node::str), interp))(input)?;
    let (rest, more) = many0(alt((
        map(take_while1(ident_continue), Node::str),
        interp,
    )))(rest)?;
    let mut parts = vec![first];
    parts.extend(more);
    Ok((rest, Node::id(parts)))
}

/// An identifier in expression position: a register name if it is one under
/// the current ISA, otherwise a symbol reference (possibly a paste list).
fn name_node(input: &str, isa: Isa) -> Res<'_, Node> {
    let (rest, node) = paste_name(input)?;
    if let crate::NodeKind::Id(parts) = &node.kind {
        if let [only] = parts.as_slice() {
            if let crate::NodeKind::Str(name) = &only.kind {
                if let Some(reg) = Reg::by_name(&name.to_string(), isa) {
                    return Ok((rest, Node::reg(reg)));
                }
            }
        }
    }
    Ok((rest, node))
}

fn primary(input: &str, isa: Isa) -> Res<'_, Node> {
    alt((
        local_ref,
        number,
        char_const,
        string_literal,
        map(nomchar('*'), |_| Node::pc()),
        delimited(nomchar('('), |i| expression(i, isa), nomchar(')')),
        |i| name_node(i, isa),
    ))(input)
}

fn unary(input: &str, isa: Isa) -> Res<'_, Node> {
    alt((
        map(preceded(nomchar('-'), |i| unary(i, isa)), |n| {
            Node::oper1(UnaryOp::Negate, n)
        }),
        map(preceded(nomchar('+'), |i| unary(i, isa)), |n| {
            Node::oper1(UnaryOp::Identity, n)
        }),
        map(preceded(nomchar('~'), |i| unary(i, isa)), |n| {
            Node::oper1(UnaryOp::Complement, n)
        }),
        |i| primary(i, isa),
    ))(input)
}

/// Folds a left-associative level: `next (op next)*`. The operator list maps
/// textual operators to [`BinaryOp`]s; longer operators must come first.
fn binary_level<'a>(
    input: &'a str,
    isa: Isa,
    operators: &[(&str, BinaryOp)],
    next: fn(&'a str, Isa) -> Res<'a, Node>,
) -> Res<'a, Node> {
    let (mut rest, mut node) = next(input, isa)?;
    'outer: loop {
        for (text, op) in operators {
            if let Some(after_op) = rest.strip_prefix(text) {
                match next(after_op, isa) {
                    Ok((after_rhs, rhs)) => {
                        node = Node::oper2(*op, node, rhs);
                        rest = after_rhs;
                        continue 'outer;
                    }
                    Err(_) => break 'outer,
                }
            }
        }
        break;
    }
    Ok((rest, node))
}

fn muldiv(input: &str, isa: Isa) -> Res<'_, Node> {
    binary_level(
        input,
        isa,
        &[
            ("*", BinaryOp::Multiply),
            ("/", BinaryOp::Divide),
            ("%", BinaryOp::Modulo),
        ],
        unary,
    )
}

fn addsub(input: &str, isa: Isa) -> Res<'_, Node> {
    binary_level(
        input,
        isa,
        &[("+", BinaryOp::Add), ("-", BinaryOp::Subtract)],
        muldiv,
    )
}

fn shift(input: &str, isa: Isa) -> Res<'_, Node> {
    binary_level(
        input,
        isa,
        &[("<<", BinaryOp::ShiftLeft), (">>", BinaryOp::ShiftRight)],
        addsub,
    )
}

fn bitand(input: &str, isa: Isa) -> Res<'_, Node> {
    binary_level(input, isa, &[("&", BinaryOp::BitAnd)], shift)
}

fn bitxor(input: &str, isa: Isa) -> Res<'_, Node> {
    binary_level(input, isa, &[("^", BinaryOp::BitXor)], bitand)
}

/// Parses a full expression.
pub(crate) fn expression(input: &str, isa: Isa) -> Res<'_, Node> {
    binary_level(input, isa, &[("|", BinaryOp::BitOr)], bitxor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NodeKind;

    fn parse(input: &str) -> Node {
        let (rest, node) = expression(input, Isa::Mc6809).expect("parses");
        assert_eq!(rest, "", "whole input consumed");
        node
    }

    #[test]
    fn test_number_bases() {
        assert_eq!(parse("$ff"), Node::int(255));
        assert_eq!(parse("0xFF"), Node::int(255));
        assert_eq!(parse("@17"), Node::int(15));
        assert_eq!(parse("%1010"), Node::int(10));
        assert_eq!(parse("0b1010"), Node::int(10));
        assert_eq!(parse("42"), Node::int(42));
        assert_eq!(parse("1.5"), Node::float(1.5));
        assert_eq!(parse("'A"), Node::int(65));
    }

    #[test]
    fn test_precedence() {
        // 2+3*4 groups the multiplication first.
        assert_eq!(
            parse("2+3*4"),
            Node::oper2(
                BinaryOp::Add,
                Node::int(2),
                Node::oper2(BinaryOp::Multiply, Node::int(3), Node::int(4)),
            )
        );
        // Shifts bind looser than addition.
        assert_eq!(
            parse("1<<2+3"),
            Node::oper2(
                BinaryOp::ShiftLeft,
                Node::int(1),
                Node::oper2(BinaryOp::Add, Node::int(2), Node::int(3)),
            )
        );
    }

    #[test]
    fn test_unary_and_parens() {
        assert_eq!(
            parse("-(1+2)"),
            Node::oper1(
                UnaryOp::Negate,
                Node::oper2(BinaryOp::Add, Node::int(1), Node::int(2)),
            )
        );
        assert_eq!(parse("~0"), Node::oper1(UnaryOp::Complement, Node::int(0)));
    }

    #[test]
    fn test_registers_win_over_symbols() {
        assert_eq!(parse("x"), Node::reg(Reg::X));
        assert!(matches!(parse("w").kind, NodeKind::Id(_)));
        let (_, node) = expression("w", Isa::Hd6309).expect("parses");
        assert_eq!(node, Node::reg(Reg::W));
    }

    #[test]
    fn test_local_refs() {
        assert_eq!(parse("1b"), Node::backref(1));
        assert_eq!(parse("12F"), Node::fwdref(12));
        // `1b2` is not a local reference (and not anything else either).
        assert!(expression("1b2", Isa::Mc6809)
            .map(|(rest, _)| rest)
            .map(|rest| !rest.is_empty())
            .unwrap_or(true));
    }

    #[test]
    fn test_pc_reference() {
        assert_eq!(parse("*"), Node::pc());
        assert_eq!(
            parse("*+2"),
            Node::oper2(BinaryOp::Add, Node::pc(), Node::int(2))
        );
    }

    #[test]
    fn test_interp_and_paste() {
        assert_eq!(parse("\\1"), Node::id(vec![Node::interp(1)]));
        let node = parse("var\\2");
        assert_eq!(
            node,
            Node::id(vec![Node::str("var"), Node::interp(2)])
        );
    }

    #[test]
    fn test_string_with_interpolation() {
        let (_, node) = string_body("ab\\1cd\"", '"').expect("parses");
        assert_eq!(
            node,
            Node::text(vec![
                Node::str("ab"),
                Node::interp(1),
                Node::str("cd"),
            ])
        );
    }
}
