use winnow::combinator::{alt, cut_err, delimited, opt, preceded, repeat, separated};
use winnow::error::{ModalResult, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::{take_till, take_while};

use super::ast::{AttrOp, Attribute, Combinator, PseudoClass, SelectorAst};

// -- Whitespace & identifiers -----------------------------------------------

fn ws(input: &mut &str) -> ModalResult<()> {
    take_while(0.., |c: char| c.is_ascii_whitespace())
        .void()
        .parse_next(input)
}

fn ident<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    (
        take_while(1, |c: char| c.is_ascii_alphabetic() || c == '_' || c == '-'),
        take_while(0.., |c: char| {
            c.is_ascii_alphanumeric() || c == '_' || c == '-'
        }),
    )
        .take()
        .parse_next(input)
}

fn path_segment<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-').parse_next(input)
}

fn starts_compound(input: &str) -> bool {
    input
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || matches!(c, '_' | '-' | '*' | '[' | ':'))
}

// -- Simple selectors -------------------------------------------------------

fn type_selector(input: &mut &str) -> ModalResult<SelectorAst> {
    alt((
        '*'.value(SelectorAst::Type(None)),
        ident.map(|name: &str| SelectorAst::Type(Some(name.to_owned()))),
    ))
    .parse_next(input)
}

fn attribute_path<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    (ident, repeat::<_, _, (), _, _>(0.., ('.', path_segment)))
        .take()
        .parse_next(input)
}

fn attr_op(input: &mut &str) -> ModalResult<AttrOp> {
    alt((
        ">=".value(AttrOp::Gte),
        ">".value(AttrOp::Gt),
        "<=".value(AttrOp::Lte),
        "<".value(AttrOp::Lt),
        alt(("!=", "~=", "|=", "^=", "$=", "*="))
            .map(|op: &str| AttrOp::Unsupported(op.to_owned())),
        "=".value(AttrOp::Eq),
    ))
    .parse_next(input)
}

fn double_quoted<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    delimited('"', take_till(0.., '"'), '"').parse_next(input)
}

fn single_quoted<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    delimited('\'', take_till(0.., '\''), '\'').parse_next(input)
}

fn bare_value<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    take_till(1.., |c: char| c == ']' || c.is_ascii_whitespace()).parse_next(input)
}

fn attr_value(input: &mut &str) -> ModalResult<String> {
    alt((double_quoted, single_quoted, bare_value))
        .map(|value: &str| value.to_owned())
        .context(StrContext::Expected(StrContextValue::Description(
            "attribute value",
        )))
        .parse_next(input)
}

fn attribute(input: &mut &str) -> ModalResult<SelectorAst> {
    '['.parse_next(input)?;
    ws.parse_next(input)?;

    let path = cut_err(attribute_path)
        .context(StrContext::Expected(StrContextValue::Description(
            "attribute path",
        )))
        .parse_next(input)?;

    ws.parse_next(input)?;
    let test = opt((attr_op, preceded(ws, cut_err(attr_value)))).parse_next(input)?;
    ws.parse_next(input)?;
    cut_err(']').parse_next(input)?;

    Ok(SelectorAst::Attribute(Attribute {
        path: path.to_owned(),
        test,
    }))
}

fn pseudo_class(input: &mut &str) -> ModalResult<SelectorAst> {
    ':'.parse_next(input)?;
    let name = cut_err(ident)
        .context(StrContext::Expected(StrContextValue::Description(
            "pseudo-class name",
        )))
        .parse_next(input)?;

    let class = match name.to_ascii_lowercase().as_str() {
        "is" => PseudoClass::Is,
        "where" => PseudoClass::Where,
        "not" => PseudoClass::Not,
        "has" => PseudoClass::Has,
        _ => PseudoClass::Other(name.to_owned()),
    };

    if let PseudoClass::Other(_) = class {
        return Ok(SelectorAst::Pseudo {
            class,
            args: Vec::new(),
        });
    }

    let args = cut_err(delimited(('(', ws), selector_list, (ws, ')')))
        .context(StrContext::Expected(StrContextValue::Description(
            "parenthesized selector list",
        )))
        .parse_next(input)?;

    Ok(SelectorAst::Pseudo { class, args })
}

fn simple_selector(input: &mut &str) -> ModalResult<SelectorAst> {
    alt((attribute, pseudo_class, type_selector)).parse_next(input)
}

// -- Compound, complex & lists ----------------------------------------------

fn compound_selector(input: &mut &str) -> ModalResult<SelectorAst> {
    let mut parts: Vec<SelectorAst> = repeat(1.., simple_selector).parse_next(input)?;
    if parts.len() == 1 {
        Ok(parts.remove(0))
    } else {
        Ok(SelectorAst::Compound(parts))
    }
}

fn combinator_symbol(input: &mut &str) -> ModalResult<Combinator> {
    alt((
        '>'.value(Combinator::Child),
        '+'.value(Combinator::Adjacent),
        '~'.value(Combinator::Sibling),
    ))
    .parse_next(input)
}

/// Compound selectors joined by combinators, folded left so that
/// `A > B C` reads as `(A > B) C`.
fn complex_selector(input: &mut &str) -> ModalResult<SelectorAst> {
    let mut left = compound_selector.parse_next(input)?;
    loop {
        let checkpoint = input.checkpoint();
        let spacing: &str = take_while(0.., |c: char| c.is_ascii_whitespace()).parse_next(input)?;

        let combinator = if let Some(explicit) = opt(combinator_symbol).parse_next(input)? {
            ws.parse_next(input)?;
            explicit
        } else if !spacing.is_empty() && starts_compound(input) {
            Combinator::Descendant
        } else {
            input.reset(&checkpoint);
            return Ok(left);
        };

        let right = cut_err(compound_selector)
            .context(StrContext::Expected(StrContextValue::Description(
                "compound selector",
            )))
            .parse_next(input)?;

        left = SelectorAst::Complex {
            left: Box::new(left),
            combinator,
            right: Box::new(right),
        };
    }
}

fn selector_list(input: &mut &str) -> ModalResult<Vec<SelectorAst>> {
    separated(1.., complex_selector, (ws, ',', ws)).parse_next(input)
}

// -- Top-level parser -------------------------------------------------------

pub(crate) fn selector(input: &mut &str) -> ModalResult<SelectorAst> {
    delimited(ws, complex_selector, ws).parse_next(input)
}
