//! Splitting a source line into label, mnemonic and argument list.
//!
//! The classic column rules apply: a label starts in column one, the operand
//! field ends at the first whitespace outside a string, and everything after
//! it (or after `;`) is commentary. `*` in column one comments the whole
//! line.

use nom::IResult;

use crate::{
    expr::{expression, paste_name, string_body},
    node::{Attr, Node},
    register::{Isa, Reg},
};

/// The three fields of one parsed line.
#[derive(Debug, Default)]
pub(crate) struct ParsedLine {
    pub(crate) label: Option<Node>,
    pub(crate) opcode: Option<Node>,
    pub(crate) args: Option<Node>,
}

fn is_field_end(c: char) -> bool {
    c == ';' || c.is_ascii_whitespace()
}

fn at_field_end(input: &str) -> bool {
    input.chars().next().map(is_field_end).unwrap_or(true)
}

fn skip_blank(input: &str) -> &str {
    input.trim_start_matches([' ', '\t'])
}

/// Parses one line of source. `Err` carries a description of the problem.
pub(crate) fn parse_line(text: &str, isa: Isa) -> Result<ParsedLine, String> {
    let mut parsed = ParsedLine::default();
    let mut rest = text.trim_end();

    if rest.starts_with('*') || rest.starts_with(';') || rest.is_empty() {
        return Ok(parsed);
    }

    // Label field, only if something sits in column one.
    if !rest.starts_with([' ', '\t']) {
        let (after, label) = parse_label(rest)?;
        parsed.label = Some(label);
        rest = after;
        if !at_field_end(rest) && !rest.is_empty() {
            return Err(format!("bad label near `{rest}`"));
        }
    }

    rest = skip_blank(rest);
    if rest.is_empty() || rest.starts_with(';') {
        return Ok(parsed);
    }

    // Mnemonic or directive.
    let (after, opcode) = paste_name(rest).map_err(|_| format!("bad mnemonic near `{rest}`"))?;
    parsed.opcode = Some(opcode);
    rest = after;
    if !at_field_end(rest) {
        return Err(format!("bad mnemonic near `{rest}`"));
    }

    rest = skip_blank(rest);
    if rest.is_empty() || rest.starts_with(';') {
        return Ok(parsed);
    }

    // Argument list.
    let (after, args) = arguments(rest, isa, None)?;
    parsed.args = Some(Node::array(args));
    rest = after;
    if !rest.is_empty() && !rest.starts_with([' ', '\t']) && !rest.starts_with(';') {
        return Err(format!("bad operand near `{rest}`"));
    }

    Ok(parsed)
}

fn parse_label(input: &str) -> Result<(&str, Node), String> {
    // A bare number defines a local label.
    if input.starts_with(|c: char| c.is_ascii_digit()) {
        let digits: String = input.chars().take_while(char::is_ascii_digit).collect();
        let rest = &input[digits.len()..];
        if rest.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_' || c == '.') {
            return Err(format!("bad label near `{input}`"));
        }
        let number = digits.parse::<i64>().map_err(|_| "bad local label".to_string())?;
        let rest = rest.strip_prefix(':').unwrap_or(rest);
        return Ok((rest, Node::int(number)));
    }
    let (rest, label) = paste_name(input).map_err(|_| format!("bad label near `{input}`"))?;
    let rest = rest.strip_prefix(':').unwrap_or(rest);
    Ok((rest, label))
}

/// Parses a comma-separated argument list. `close` is `Some(']')` inside an
/// indirect operand, where the list ends at the bracket instead of at
/// whitespace.
fn arguments<'a>(
    input: &'a str,
    isa: Isa,
    close: Option<char>,
) -> Result<(&'a str, Vec<Node>), String> {
    let mut args = Vec::new();
    let mut rest = input;
    loop {
        let at_close = close.is_some_and(|c| rest.starts_with(c));
        if rest.starts_with(',') || at_close || at_field_end(rest) {
            args.push(Node::empty());
        } else {
            let (after, arg) = argument(rest, isa)?;
            args.push(arg);
            rest = after;
        }
        if let Some(after) = rest.strip_prefix(',') {
            rest = skip_blank(after);
            continue;
        }
        break;
    }
    if let Some(c) = close {
        rest = rest
            .strip_prefix(c)
            .ok_or_else(|| format!("missing `{c}` near `{rest}`"))?;
    }
    Ok((rest, args))
}

fn argument<'a>(input: &'a str, isa: Isa) -> Result<(&'a str, Node), String> {
    // Indirect operand.
    if let Some(inner) = input.strip_prefix('[') {
        let (rest, elements) = arguments(skip_blank(inner), isa, Some(']'))?;
        return Ok((rest, Node::array(elements)));
    }
    // Immediate marker.
    if let Some(after) = input.strip_prefix('#') {
        let (rest, node) = expr_arg(after, isa)?;
        return Ok((rest, node.with_attr(Attr::Immediate)));
    }
    // Size forcing. `<<` before `<`.
    if let Some(after) = input.strip_prefix("<<") {
        let (rest, node) = expr_arg(after, isa)?;
        return Ok((rest, node.with_attr(Attr::FiveBit)));
    }
    if let Some(after) = input.strip_prefix('<') {
        let (rest, node) = expr_arg(after, isa)?;
        return Ok((rest, node.with_attr(Attr::EightBit)));
    }
    if let Some(after) = input.strip_prefix('>') {
        let (rest, node) = expr_arg(after, isa)?;
        return Ok((rest, node.with_attr(Attr::SixteenBit)));
    }
    // `/delimited string/` (the `fcc` form).
    if let Some(after) = input.strip_prefix('/') {
        return match string_body(after, '/') {
            Ok((rest, node)) => Ok((rest, node)),
            Err(_) => Err(format!("unterminated string near `{input}`")),
        };
    }
    // Index register with increment/decrement decoration.
    if let Some(result) = reg_incdec(input, isa) {
        return Ok(result);
    }
    match expression(input, isa) {
        Ok((rest, node)) => Ok((rest, node)),
        Err(_) => Err(format!("bad expression near `{input}`")),
    }
}

fn expr_arg(input: &str, isa: Isa) -> Result<(&str, Node), String> {
    match expression(input, isa) {
        Ok((rest, node)) => Ok((rest, node)),
        Err(_) => Err(format!("bad expression near `{input}`")),
    }
}

/// `x+ x++ x- ,-x ,--x` and friends: a register argument whose decoration
/// becomes an increment/decrement attribute. Returns `None` when the
/// argument is not of this shape, letting expression parsing have it.
fn reg_incdec<'a>(input: &'a str, isa: Isa) -> Option<(&'a str, Node)> {
    let (pre, after_pre) = if let Some(after) = input.strip_prefix("--") {
        (Some(Attr::PreDec2), after)
    } else if let Some(after) = input.strip_prefix('-') {
        (Some(Attr::PreDec), after)
    } else {
        (None, input)
    };

    let (rest, name): (&str, &str) = match ident(after_pre) {
        Ok(pair) => pair,
        Err(_) => return None,
    };
    let reg = Reg::by_name(name, isa)?;

    let (post, rest) = if let Some(after) = rest.strip_prefix("++") {
        (Some(Attr::PostInc2), after)
    } else if let Some(after) = rest.strip_prefix('+') {
        (Some(Attr::PostInc), after)
    } else if let Some(after) = rest.strip_prefix('-') {
        (Some(Attr::PostDec), after)
    } else {
        (None, rest)
    };

    // The decorated register must be a whole argument on its own.
    if !(rest.is_empty() || rest.starts_with([',', ']']) || at_field_end(rest)) {
        return None;
    }

    let attr = match (pre, post) {
        (Some(attr), None) => attr,
        (None, Some(attr)) => attr,
        (None, None) => return None,
        // `-x+` makes no sense; let the expression parser reject it.
        (Some(_), Some(_)) => return None,
    };
    Some((rest, Node::reg(reg).with_attr(attr)))
}

fn ident(input: &str) -> IResult<&str, &str> {
    crate::expr::identifier(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NodeKind;

    fn line(text: &str) -> ParsedLine {
        parse_line(text, Isa::Mc6809).expect("parses")
    }

    fn args(text: &str) -> Vec<Node> {
        line(text).args.expect("has args").as_array().expect("array").to_vec()
    }

    #[test]
    fn test_comment_and_blank_lines() {
        assert!(line("* whole line comment").opcode.is_none());
        assert!(line("; also a comment").opcode.is_none());
        assert!(line("").opcode.is_none());
    }

    #[test]
    fn test_label_only() {
        let parsed = line("loop:");
        assert!(parsed.opcode.is_none());
        assert_eq!(parsed.label, Some(Node::id(vec![Node::str("loop")])));
    }

    #[test]
    fn test_numeric_label() {
        let parsed = line("1 bra 1b");
        assert_eq!(parsed.label, Some(Node::int(1)));
        assert!(parsed.opcode.is_some());
    }

    #[test]
    fn test_immediate_argument() {
        let parsed = line(" lda #$10");
        let args = parsed.args.unwrap();
        let args = args.as_array().unwrap();
        assert_eq!(args.len(), 1);
        assert_eq!(args[0].attr, Attr::Immediate);
        assert_eq!(args[0].as_int(), Some(0x10));
    }

    #[test]
    fn test_indexed_arguments() {
        let args = args(" ldx 5,x");
        assert_eq!(args.len(), 2);
        assert_eq!(args[0].as_int(), Some(5));
        assert_eq!(args[1].as_reg(), Some(Reg::X));

        let args = self::args(" ldx ,x+");
        assert_eq!(args.len(), 2);
        assert!(matches!(args[0].kind, NodeKind::Empty));
        assert_eq!(args[1].attr, Attr::PostInc);

        let args = self::args(" lda ,-y");
        assert_eq!(args[1].attr, Attr::PreDec);
    }

    #[test]
    fn test_indirect_argument() {
        let args = args(" ldx [,x++]");
        assert_eq!(args.len(), 1);
        let inner = args[0].as_array().expect("indirect array");
        assert_eq!(inner.len(), 2);
        assert_eq!(inner[1].attr, Attr::PostInc2);
    }

    #[test]
    fn test_size_forcing() {
        let args = args(" jmp >$0020");
        assert_eq!(args[0].attr, Attr::SixteenBit);
        let args = self::args(" jmp <$20");
        assert_eq!(args[0].attr, Attr::EightBit);
        let args = self::args(" leax <<15,x");
        assert_eq!(args[0].attr, Attr::FiveBit);
    }

    #[test]
    fn test_fcc_delimited_string() {
        let args = args(" fcc /HELLO/,13");
        assert_eq!(args.len(), 2);
        assert_eq!(args[0], Node::str("HELLO"));
        assert_eq!(args[1].as_int(), Some(13));
    }

    #[test]
    fn test_trailing_comment_after_operand() {
        let args = args(" lda #4 load the constant");
        assert_eq!(args.len(), 1);
    }

    #[test]
    fn test_tfm_decorations() {
        let parsed = parse_line(" tfm x+,y+", Isa::Hd6309).expect("parses");
        let args = parsed.args.unwrap();
        let args = args.as_array().unwrap();
        assert_eq!(args[0].attr, Attr::PostInc);
        assert_eq!(args[1].attr, Attr::PostInc);

        let parsed = parse_line(" tfm x-,y-", Isa::Hd6309).expect("parses");
        let args = parsed.args.unwrap();
        let args = args.as_array().unwrap();
        assert_eq!(args[0].attr, Attr::PostDec);
    }

    #[test]
    fn test_register_pair() {
        let args = args(" tfr x,y");
        assert_eq!(args[0].as_reg(), Some(Reg::X));
        assert_eq!(args[1].as_reg(), Some(Reg::Y));
    }

    #[test]
    fn test_bad_operand_reports() {
        assert!(parse_line(" lda #\"unterminated", Isa::Mc6809).is_err());
    }
}
