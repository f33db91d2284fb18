//! PDF object parser.
//!
//! PDF Spec: ISO 32000-1:2008, Section 7.3 - Objects
//!
//! Builds [`Object`] values from lexer tokens: arrays, dictionaries,
//! indirect references (`10 0 R` lookahead after an integer), streams and
//! whole indirect object definitions (`10 0 obj ... endobj`).

use crate::lexer::{keyword, skip_ws, token, unsigned, Token};
use crate::object::{Dictionary, Object, ObjectRef, PdfString};
use bytes::Bytes;
use nom::IResult;

/// Maximum nesting of arrays and dictionaries (ISO 32000-1, Annex C).
const MAX_NESTING: usize = 256;

fn fail(input: &[u8], kind: nom::error::ErrorKind) -> nom::Err<nom::error::Error<&[u8]>> {
    nom::Err::Error(nom::error::Error::new(input, kind))
}

/// Parse a single direct object.
pub fn parse_object(input: &[u8]) -> IResult<&[u8], Object> {
    parse_object_at_depth(input, 0)
}

fn parse_object_at_depth(input: &[u8], depth: usize) -> IResult<&[u8], Object> {
    if depth > MAX_NESTING {
        return Err(nom::Err::Failure(nom::error::Error::new(
            input,
            nom::error::ErrorKind::TooLarge,
        )));
    }

    let (rest, tok) = token(input)?;
    match tok {
        Token::Null => Ok((rest, Object::Null)),
        Token::True => Ok((rest, Object::Boolean(true))),
        Token::False => Ok((rest, Object::Boolean(false))),
        Token::Real(r) => Ok((rest, Object::Real(r))),
        Token::Integer(i) => {
            // "id gen R" lookahead
            if i >= 0 {
                if let Ok((after_gen, gen)) = unsigned(rest) {
                    if let Ok((after_r, Token::R)) = token(after_gen) {
                        let r = ObjectRef::new(i as u32, gen as u16);
                        return Ok((after_r, Object::Reference(r)));
                    }
                }
            }
            Ok((rest, Object::Integer(i)))
        },
        Token::LiteralString(raw) => {
            Ok((rest, Object::String(PdfString::literal(decode_literal_string_escapes(raw)))))
        },
        Token::HexString(raw) => Ok((rest, Object::String(PdfString::hex(decode_hex(raw))))),
        Token::Name(n) => Ok((rest, Object::Name(n))),
        Token::ArrayStart => parse_array_body(rest, depth),
        Token::DictStart => {
            let (rest, dict) = parse_dictionary_body(rest, depth)?;
            Ok((rest, Object::Dictionary(dict)))
        },
        _ => Err(fail(input, nom::error::ErrorKind::Alt)),
    }
}

fn parse_array_body(mut input: &[u8], depth: usize) -> IResult<&[u8], Object> {
    let mut items = Vec::new();
    loop {
        if let Ok((rest, Token::ArrayEnd)) = token(input) {
            return Ok((rest, Object::Array(items)));
        }
        let (rest, item) = parse_object_at_depth(input, depth + 1)?;
        items.push(item);
        input = rest;
    }
}

fn parse_dictionary_body(mut input: &[u8], depth: usize) -> IResult<&[u8], Dictionary> {
    let mut dict = Dictionary::new();
    loop {
        let (rest, tok) = token(input)?;
        match tok {
            Token::DictEnd => return Ok((rest, dict)),
            Token::Name(key) => {
                let (rest, value) = parse_object_at_depth(rest, depth + 1)?;
                // A null value is equivalent to an absent key
                if !value.is_null() {
                    dict.insert(key, value);
                }
                input = rest;
            },
            _ => return Err(fail(input, nom::error::ErrorKind::Tag)),
        }
    }
}

/// Parse an indirect object definition: `id gen obj <object> endobj`.
///
/// A dictionary followed by `stream` becomes an [`Object::Stream`]. The data
/// length comes from a direct `/Length`; when it is indirect or wrong the
/// data is delimited by scanning for `endstream`.
pub fn parse_indirect_object(input: &[u8]) -> IResult<&[u8], (ObjectRef, Object)> {
    let (input, id) = unsigned(input)?;
    let (input, gen) = unsigned(input)?;
    let (input, _) = keyword(b"obj")(input)?;
    let (input, object) = parse_object(input)?;
    let reference = ObjectRef::new(id as u32, gen as u16);

    let (input, object) = match object {
        Object::Dictionary(dict) => match token(input) {
            Ok((after, Token::StreamStart)) => {
                let (after, data) = parse_stream_data(after, &dict)?;
                (
                    after,
                    Object::Stream {
                        dict,
                        data: Bytes::from(data),
                    },
                )
            },
            _ => (input, Object::Dictionary(dict)),
        },
        other => (input, other),
    };

    // Missing "endobj" is tolerated
    let input = match keyword(b"endobj")(input) {
        Ok((rest, _)) => rest,
        Err(_) => {
            log::debug!("Object {} has no endobj keyword", reference);
            input
        },
    };

    Ok((input, (reference, object)))
}

fn parse_stream_data<'a>(input: &'a [u8], dict: &Dictionary) -> IResult<&'a [u8], Vec<u8>> {
    // "stream" must be followed by CRLF or LF; CR alone is accepted
    let input = if input.starts_with(b"\r\n") {
        &input[2..]
    } else if input.starts_with(b"\n") || input.starts_with(b"\r") {
        &input[1..]
    } else {
        input
    };

    if let Some(length) = dict.get_integer("Length") {
        let length = length.max(0) as usize;
        if length <= input.len() {
            let (data, remaining) = input.split_at(length);
            if let Ok((rest, _)) = keyword(b"endstream")(remaining) {
                return Ok((rest, data.to_vec()));
            }
            log::warn!("Stream /Length {} does not end at endstream, scanning", length);
        }
    }

    match find_endstream(input) {
        Some(pos) => {
            let mut data = &input[..pos];
            // Drop the EOL that precedes "endstream"
            if data.ends_with(b"\r\n") {
                data = &data[..data.len() - 2];
            } else if data.ends_with(b"\n") || data.ends_with(b"\r") {
                data = &data[..data.len() - 1];
            }
            Ok((&input[pos + b"endstream".len()..], data.to_vec()))
        },
        None => Err(fail(input, nom::error::ErrorKind::Eof)),
    }
}

fn find_endstream(input: &[u8]) -> Option<usize> {
    input.windows(b"endstream".len()).position(|w| w == b"endstream")
}

/// Decode the escape sequences of a literal string body.
///
/// Handles `\n \r \t \b \f \( \) \\`, octal `\ddd` (1-3 digits), line
/// continuations, and normalizes unescaped CR/CRLF line ends to LF.
pub fn decode_literal_string_escapes(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        let c = raw[i];
        if c == b'\\' && i + 1 < raw.len() {
            i += 1;
            match raw[i] {
                b'n' => out.push(b'\n'),
                b'r' => out.push(b'\r'),
                b't' => out.push(b'\t'),
                b'b' => out.push(0x08),
                b'f' => out.push(0x0C),
                b'0'..=b'7' => {
                    let mut value: u32 = 0;
                    let mut digits = 0;
                    while digits < 3 && i < raw.len() && (b'0'..=b'7').contains(&raw[i]) {
                        value = value * 8 + (raw[i] - b'0') as u32;
                        i += 1;
                        digits += 1;
                    }
                    out.push((value & 0xFF) as u8);
                    continue;
                },
                b'\r' => {
                    if raw.get(i + 1) == Some(&b'\n') {
                        i += 1;
                    }
                },
                b'\n' => {},
                other => out.push(other),
            }
            i += 1;
        } else if c == b'\r' {
            out.push(b'\n');
            if raw.get(i + 1) == Some(&b'\n') {
                i += 1;
            }
            i += 1;
        } else {
            out.push(c);
            i += 1;
        }
    }
    out
}

/// Decode hex string digits, ignoring whitespace and padding an odd digit with 0.
pub fn decode_hex(raw: &[u8]) -> Vec<u8> {
    let digits: Vec<u8> = raw
        .iter()
        .filter_map(|&c| (c as char).to_digit(16).map(|d| d as u8))
        .collect();
    digits
        .chunks(2)
        .map(|pair| (pair[0] << 4) | pair.get(1).copied().unwrap_or(0))
        .collect()
}

/// Skip whitespace and comments, returning the remaining input.
pub fn skip_whitespace(input: &[u8]) -> &[u8] {
    match skip_ws(input) {
        Ok((rest, _)) => rest,
        Err(_) => input,
    }
}
