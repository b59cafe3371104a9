use std::iter::Peekable;
use std::str::Chars;

use tracing::debug;
use winnow::ascii::{digit1, multispace0};
use winnow::combinator::{alt, cut_err, opt, preceded, repeat, terminated};
use winnow::error::{ContextError, ErrMode, StrContext, StrContextValue};
use winnow::token::{any, literal, take_while};
use winnow::{ModalResult, Parser};

use sluice_types::{Result, SluiceError};

use crate::ast::*;
use crate::value::Value;

fn make_cut_error(desc: &'static str) -> ErrMode<ContextError> {
    let mut e = ContextError::new();
    e.push(StrContext::Expected(StrContextValue::Description(desc)));
    ErrMode::Cut(e)
}

fn expected(desc: &'static str) -> StrContext {
    StrContext::Expected(StrContextValue::Description(desc))
}

/// Strip `//`, `#` line comments and `/* */` block comments from the input.
/// Newlines inside block comments are kept so line numbers stay correct.
pub(crate) fn strip_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => copy_string(&mut chars, &mut out),
            '#' => skip_line(&mut chars),
            '/' if chars.peek() == Some(&'/') => skip_line(&mut chars),
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for s in chars.by_ref() {
                    if prev == '*' && s == '/' {
                        break;
                    }
                    if s == '\n' {
                        out.push('\n');
                    }
                    prev = s;
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Copy a string literal verbatim, opening quote already consumed. Quotes
/// inside `${ ... }` belong to nested strings and do not close this one.
fn copy_string(chars: &mut Peekable<Chars<'_>>, out: &mut String) {
    out.push('"');
    while let Some(c) = chars.next() {
        out.push(c);
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            }
            // `$${` is a literal `${`
            '$' if starts_with(chars, "${") => {
                out.extend(chars.by_ref().take(2));
            }
            '$' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
                copy_interpolation(chars, out);
            }
            '"' => return,
            _ => {}
        }
    }
}

/// Copy the body of a `${ ... }` up to and including its closing brace.
fn copy_interpolation(chars: &mut Peekable<Chars<'_>>, out: &mut String) {
    let mut depth = 1usize;
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                copy_string(chars, out);
                continue;
            }
            '{' => depth += 1,
            '}' => depth -= 1,
            _ => {}
        }
        out.push(c);
        if depth == 0 {
            return;
        }
    }
}

fn starts_with(chars: &Peekable<Chars<'_>>, prefix: &str) -> bool {
    let mut ahead = chars.clone();
    prefix.chars().all(|p| ahead.next() == Some(p))
}

fn skip_line(chars: &mut Peekable<Chars<'_>>) {
    while let Some(&c) = chars.peek() {
        if c == '\n' {
            break;
        }
        chars.next();
    }
}

/// Whitespace consumer (including newlines).
fn ws<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    multispace0.parse_next(input)
}

fn next_char(input: &mut &str) -> ModalResult<char> {
    any.parse_next(input)
}

/// Parse an identifier: [A-Za-z_][A-Za-z0-9_-]*
fn identifier<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    (
        take_while(1, |c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., |c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-'),
    )
        .take()
        .parse_next(input)
}

/// Parse a double-quoted string. Produces a literal unless the string contains
/// a `${...}` interpolation, in which case it produces a template.
fn string_expr(input: &mut &str) -> ModalResult<Expression> {
    let _ = '"'.parse_next(input)?;
    let mut parts = Vec::new();
    let mut buf = String::new();

    loop {
        let c = cut_err(next_char)
            .context(StrContext::Expected(StrContextValue::CharLiteral('"')))
            .parse_next(input)?;
        match c {
            '"' => break,
            '\\' => {
                let esc = cut_err(next_char).parse_next(input)?;
                match esc {
                    'n' => buf.push('\n'),
                    't' => buf.push('\t'),
                    'r' => buf.push('\r'),
                    '\\' => buf.push('\\'),
                    '"' => buf.push('"'),
                    other => {
                        buf.push('\\');
                        buf.push(other);
                    }
                }
            }
            // `$${` is a literal `${`
            '$' if input.starts_with("${") => {
                let _ = literal("${").parse_next(input)?;
                buf.push_str("${");
            }
            '$' if input.starts_with('{') => {
                let _ = '{'.parse_next(input)?;
                if !buf.is_empty() {
                    parts.push(TemplatePart::Literal(std::mem::take(&mut buf)));
                }
                let _ = ws.parse_next(input)?;
                let expr = cut_err(expression)
                    .context(expected("interpolated expression"))
                    .parse_next(input)?;
                let _ = ws.parse_next(input)?;
                let _ = cut_err('}')
                    .context(StrContext::Expected(StrContextValue::CharLiteral('}')))
                    .parse_next(input)?;
                parts.push(TemplatePart::Interpolation(expr));
            }
            other => buf.push(other),
        }
    }

    if parts.is_empty() {
        return Ok(Expression::Literal(Value::String(buf)));
    }
    if !buf.is_empty() {
        parts.push(TemplatePart::Literal(buf));
    }
    Ok(Expression::Template(parts))
}

/// Parse a float: optional sign, digits, '.', digits.
fn float_value(input: &mut &str) -> ModalResult<f64> {
    let s: &str = (opt(alt(('-', '+'))), digit1, '.', digit1)
        .take()
        .parse_next(input)?;
    s.parse()
        .map_err(|_| ErrMode::Backtrack(ContextError::new()))
}

/// Parse an integer: optional sign + digits.
fn integer_value(input: &mut &str) -> ModalResult<i64> {
    let s: &str = (opt(alt(('-', '+'))), digit1).take().parse_next(input)?;
    s.parse()
        .map_err(|_| ErrMode::Backtrack(ContextError::new()))
}

/// Parse comma-separated expressions up to and including `close`.
fn expression_list(input: &mut &str, close: char) -> ModalResult<Vec<Expression>> {
    let mut items = Vec::new();
    loop {
        let _ = ws.parse_next(input)?;
        if opt(close).parse_next(input)?.is_some() {
            return Ok(items);
        }
        let item = cut_err(expression)
            .context(expected("expression"))
            .parse_next(input)?;
        items.push(item);
        let _ = ws.parse_next(input)?;
        if opt(',').parse_next(input)?.is_none() {
            let _ = ws.parse_next(input)?;
            let _ = cut_err(close)
                .context(StrContext::Expected(StrContextValue::CharLiteral(close)))
                .parse_next(input)?;
            return Ok(items);
        }
    }
}

/// Parse '[' expression (',' expression)* ','? ']'
fn array_expr(input: &mut &str) -> ModalResult<Expression> {
    let _ = '['.parse_next(input)?;
    expression_list(input, ']').map(Expression::Array)
}

/// Parse '{' (key ('=' | ':') expression ','?)* '}'
fn object_expr(input: &mut &str) -> ModalResult<Expression> {
    let _ = '{'.parse_next(input)?;
    let mut entries = Vec::new();
    loop {
        let _ = ws.parse_next(input)?;
        if opt('}').parse_next(input)?.is_some() {
            return Ok(Expression::Object(entries));
        }
        let key = cut_err(label)
            .context(expected("object key"))
            .parse_next(input)?;
        let _ = ws.parse_next(input)?;
        let _ = cut_err(alt(('=', ':')))
            .context(expected("'=' or ':' after object key"))
            .parse_next(input)?;
        let _ = ws.parse_next(input)?;
        let value = cut_err(expression)
            .context(expected("object value"))
            .parse_next(input)?;
        entries.push((key, value));
        let _ = ws.parse_next(input)?;
        let _ = opt(',').parse_next(input)?;
    }
}

/// Parse an expression that starts with an identifier: a keyword literal,
/// a function call, or a variable traversal.
fn ident_expr(input: &mut &str) -> ModalResult<Expression> {
    let name = identifier.parse_next(input)?;
    match name {
        "true" => return Ok(Expression::Literal(Value::Bool(true))),
        "false" => return Ok(Expression::Literal(Value::Bool(false))),
        "null" => return Ok(Expression::Literal(Value::Null)),
        _ => {}
    }

    if opt('(').parse_next(input)?.is_some() {
        let args = expression_list(input, ')')?;
        return Ok(Expression::Call {
            name: name.to_string(),
            args,
        });
    }

    let rest: Vec<&str> =
        repeat(0.., preceded('.', alt((identifier, digit1)))).parse_next(input)?;
    let mut path = Vec::with_capacity(rest.len() + 1);
    path.push(name.to_string());
    path.extend(rest.into_iter().map(String::from));
    Ok(Expression::Traversal(path))
}

fn expression(input: &mut &str) -> ModalResult<Expression> {
    alt((
        string_expr,
        array_expr,
        object_expr,
        float_value.map(|f| Expression::Literal(Value::Float(f))),
        integer_value.map(|i| Expression::Literal(Value::Integer(i))),
        ident_expr,
    ))
    .parse_next(input)
}

/// A quoted string without interpolation.
fn quoted_label(input: &mut &str) -> ModalResult<String> {
    match string_expr.parse_next(input)? {
        Expression::Literal(Value::String(s)) => Ok(s),
        _ => Err(make_cut_error("label without ${...} interpolation")),
    }
}

/// Block labels and object keys: a quoted string or a bare identifier.
fn label(input: &mut &str) -> ModalResult<String> {
    alt((quoted_label, identifier.map(String::from))).parse_next(input)
}

enum Item {
    Attribute(Attribute),
    Block(Block),
}

/// Parse `key = expression` or `ident label* { body }`.
fn body_item(input: &mut &str) -> ModalResult<Item> {
    let key = identifier
        .context(expected("attribute or block"))
        .parse_next(input)?;
    let _ = ws.parse_next(input)?;

    if opt('=').parse_next(input)?.is_some() {
        let _ = ws.parse_next(input)?;
        let expr = cut_err(expression)
            .context(expected("attribute value"))
            .parse_next(input)?;
        return Ok(Item::Attribute(Attribute {
            key: key.to_string(),
            expr,
        }));
    }

    let labels: Vec<String> = repeat(0.., terminated(label, ws)).parse_next(input)?;
    let _ = cut_err('{')
        .context(expected("'=' or block body"))
        .parse_next(input)?;
    let inner = body.parse_next(input)?;
    let _ = ws.parse_next(input)?;
    let _ = cut_err('}')
        .context(StrContext::Expected(StrContextValue::CharLiteral('}')))
        .parse_next(input)?;

    Ok(Item::Block(Block {
        ident: key.to_string(),
        labels,
        body: inner,
    }))
}

/// Parse items until end of input or a closing brace. Semicolons are optional
/// separators.
fn body(input: &mut &str) -> ModalResult<Body> {
    let mut body = Body::default();
    loop {
        let _ = ws.parse_next(input)?;
        if opt(';').parse_next(input)?.is_some() {
            continue;
        }
        if input.is_empty() || input.starts_with('}') {
            break;
        }
        match cut_err(body_item).parse_next(input)? {
            Item::Attribute(a) => body.attributes.push(a),
            Item::Block(b) => body.blocks.push(b),
        }
    }
    Ok(body)
}

fn file_body(input: &mut &str) -> ModalResult<Body> {
    let parsed = body.parse_next(input)?;
    let _ = ws.parse_next(input)?;
    if !input.is_empty() {
        return Err(make_cut_error("attribute or block (found unmatched '}')"));
    }
    Ok(parsed)
}

/// Compute (line, col) for a byte offset. Comment stripping preserves
/// newlines, so line numbers match the original text.
fn offset_to_line_col(text: &str, consumed: usize) -> (usize, usize) {
    let prefix = &text[..consumed.min(text.len())];
    let line = prefix.matches('\n').count() + 1;
    let col = match prefix.rfind('\n') {
        Some(pos) => prefix[pos + 1..].chars().count() + 1,
        None => prefix.chars().count() + 1,
    };
    (line, col)
}

/// Parse a source fragment into its top-level [`Body`].
///
/// `file` is only used to annotate parse errors.
pub fn parse(file: &str, input: &str) -> Result<Body> {
    let stripped = strip_comments(input);
    let mut remaining = stripped.as_str();

    let body = file_body.parse_next(&mut remaining).map_err(|e| {
        let (line, col) = offset_to_line_col(&stripped, stripped.len() - remaining.len());
        let snippet = remaining.chars().take(40).collect::<String>();
        let source_snippet = if snippet.is_empty() {
            None
        } else {
            Some(snippet)
        };

        SluiceError::ParseError {
            file: file.to_string(),
            line,
            col,
            message: e.to_string(),
            source_snippet,
        }
    })?;

    debug!(
        file,
        attributes = body.attributes.len(),
        blocks = body.blocks.len(),
        "parsed"
    );
    Ok(body)
}
