//! PDF lexer (tokenizer).
//!
//! PDF Spec: ISO 32000-1:2008, Section 7.2 - Lexical Conventions
//!
//! Turns raw bytes into tokens: numbers, literal and hex strings, names,
//! keywords and delimiters. Whitespace (space, \t, \r, \n, \0, \f) and
//! comments (% to EOL) are skipped before every token.

use crate::names::Name;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_till, take_while, take_while1},
    character::complete::{char, digit1, one_of},
    combinator::{map, opt, recognize, value},
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};

/// Token types recognized by the PDF lexer.
#[derive(Debug, PartialEq, Clone)]
pub enum Token<'a> {
    /// Integer number (e.g., 42, -123)
    Integer(i64),
    /// Real number (e.g., 3.14, -.5)
    Real(f64),
    /// Literal string bytes between the parentheses, escapes not yet decoded
    LiteralString(&'a [u8]),
    /// Hex string digits between the angle brackets, whitespace preserved
    HexString(&'a [u8]),
    /// Name with `#xx` escapes decoded
    Name(Name),
    /// `true`
    True,
    /// `false`
    False,
    /// `null`
    Null,
    /// `[`
    ArrayStart,
    /// `]`
    ArrayEnd,
    /// `<<`
    DictStart,
    /// `>>`
    DictEnd,
    /// `obj`
    ObjStart,
    /// `endobj`
    ObjEnd,
    /// `stream`
    StreamStart,
    /// `endstream`
    StreamEnd,
    /// `R` (used in "10 0 R")
    R,
}

/// Whether a byte is PDF whitespace (Table 1).
pub fn is_whitespace(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\r' | b'\n' | 0x00 | 0x0C)
}

/// Whether a byte is a PDF delimiter (Table 2).
pub fn is_delimiter(c: u8) -> bool {
    matches!(c, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

fn comment(input: &[u8]) -> IResult<&[u8], &[u8]> {
    preceded(char('%'), take_till(|c| c == b'\r' || c == b'\n'))(input)
}

/// Skip all whitespace and comments.
pub fn skip_ws(input: &[u8]) -> IResult<&[u8], ()> {
    let mut remaining = input;
    loop {
        let (rest, _) = take_while(is_whitespace)(remaining)?;
        match comment(rest) {
            Ok((after, _)) => remaining = after,
            Err(_) => return Ok((rest, ())),
        }
    }
}

fn parse_number(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (rest, text) = recognize(tuple((
        opt(one_of("+-")),
        alt((
            recognize(pair(digit1, opt(pair(char('.'), opt(digit1))))),
            recognize(pair(char('.'), digit1)),
        )),
    )))(input)?;

    let invalid = || nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit));
    let text = std::str::from_utf8(text).map_err(|_| invalid())?;

    if text.contains('.') {
        // "5." and "-.5" are valid PDF reals but not valid Rust floats
        let normalized = text.replace("-.", "-0.").replace("+.", "0.");
        let normalized = if normalized.starts_with('.') {
            format!("0{}", normalized)
        } else if normalized.ends_with('.') {
            format!("{}0", normalized)
        } else {
            normalized
        };
        normalized
            .parse::<f64>()
            .map(|r| (rest, Token::Real(r)))
            .map_err(|_| invalid())
    } else {
        match text.parse::<i64>() {
            Ok(i) => Ok((rest, Token::Integer(i))),
            // Out-of-range integers degrade to reals
            Err(_) => text
                .parse::<f64>()
                .map(|r| (rest, Token::Real(r)))
                .map_err(|_| invalid()),
        }
    }
}

/// Literal string with balanced parentheses; backslash escapes are skipped, not decoded.
fn parse_literal_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (body, _) = char('(')(input)?;
    let mut depth = 1usize;
    let mut pos = 0;

    while pos < body.len() {
        match body[pos] {
            b'\\' => pos += 2,
            b'(' => {
                depth += 1;
                pos += 1;
            },
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok((&body[pos + 1..], Token::LiteralString(&body[..pos])));
                }
                pos += 1;
            },
            _ => pos += 1,
        }
    }

    Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)))
}

fn parse_hex_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    if input.starts_with(b"<<") {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)));
    }
    delimited(
        char('<'),
        map(
            take_while(|c: u8| c.is_ascii_hexdigit() || is_whitespace(c)),
            Token::HexString,
        ),
        char('>'),
    )(input)
}

fn parse_name(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    preceded(
        char('/'),
        map(
            take_while(|c: u8| !is_whitespace(c) && !is_delimiter(c)),
            |raw: &[u8]| Token::Name(Name::from_escaped(raw)),
        ),
    )(input)
}

fn parse_keyword(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (rest, word) = alt((
        take_while1(|c: u8| c.is_ascii_alphabetic()),
        tag(b"<<"),
        tag(b">>"),
        tag(b"["),
        tag(b"]"),
    ))(input)?;

    let token = match word {
        b"true" => Token::True,
        b"false" => Token::False,
        b"null" => Token::Null,
        b"obj" => Token::ObjStart,
        b"endobj" => Token::ObjEnd,
        b"stream" => Token::StreamStart,
        b"endstream" => Token::StreamEnd,
        b"R" => Token::R,
        b"<<" => Token::DictStart,
        b">>" => Token::DictEnd,
        b"[" => Token::ArrayStart,
        b"]" => Token::ArrayEnd,
        _ => {
            return Err(nom::Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Tag,
            )))
        },
    };
    Ok((rest, token))
}

/// Parse a single PDF token after skipping whitespace and comments.
pub fn token(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (input, _) = skip_ws(input)?;
    alt((
        parse_keyword,
        parse_name,
        parse_number,
        parse_literal_string,
        parse_hex_string,
    ))(input)
}

/// Parse an unsigned integer keyword argument such as the numbers in `12 0 obj`.
pub fn unsigned(input: &[u8]) -> IResult<&[u8], u64> {
    let (input, _) = skip_ws(input)?;
    let (rest, digits) = digit1(input)?;
    std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse().ok())
        .map(|n| (rest, n))
        .ok_or_else(|| nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit)))
}

/// Match a keyword after optional whitespace.
pub fn keyword<'a>(word: &'static [u8]) -> impl FnMut(&'a [u8]) -> IResult<&'a [u8], ()> {
    move |input: &'a [u8]| {
        let (input, _) = skip_ws(input)?;
        value((), tag(word))(input)
    }
}
