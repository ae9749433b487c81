// Lexer for address state strings (`key=value&key=value`)

use nom::{
    branch::alt,
    bytes::complete::{is_not, take_till, take_till1, take_while_m_n},
    character::complete::char,
    combinator::{all_consuming, map, map_res, value},
    multi::many0,
    sequence::{preceded, separated_pair},
    IResult,
};

/// Pair delimiter
pub const DELIMITER: char = '&';

/// Characters stripped from the front of an address before lexing
const LEADING_MARKERS: [char; 2] = ['?', '#'];

/// Split an address into its raw `key=value` bits, dropping a single leading `?`/`#`
pub fn split_bits(address: &str) -> impl Iterator<Item = &str> {
    let body = address
        .strip_prefix(&LEADING_MARKERS[..])
        .unwrap_or(address);
    body.split(DELIMITER).filter(|bit| !bit.is_empty())
}

/// Parse one raw bit into its still-encoded key and value
pub fn raw_pair(input: &str) -> IResult<&str, (&str, &str)> {
    all_consuming(separated_pair(
        take_till1(|c: char| c == '=' || c == DELIMITER),
        char('='),
        take_till(|c: char| c == DELIMITER),
    ))(input)
}

#[derive(Clone)]
enum Piece<'a> {
    Byte(u8),
    Text(&'a str),
}

fn escaped_byte(input: &str) -> IResult<&str, u8> {
    preceded(
        char('%'),
        map_res(
            take_while_m_n(2, 2, |c: char| c.is_ascii_hexdigit()),
            |hex| u8::from_str_radix(hex, 16),
        ),
    )(input)
}

fn piece(input: &str) -> IResult<&str, Piece<'_>> {
    alt((
        map(escaped_byte, Piece::Byte),
        value(Piece::Byte(b' '), char('+')),
        map(is_not("%+"), Piece::Text),
    ))(input)
}

/// Decode `%XX` escapes and `+`; `None` for a dangling `%` or non UTF-8 output
pub fn percent_decode(input: &str) -> Option<String> {
    let (_, pieces) = all_consuming(many0(piece))(input).ok()?;
    let mut bytes = Vec::with_capacity(input.len());
    for piece in pieces {
        match piece {
            Piece::Byte(b) => bytes.push(b),
            Piece::Text(text) => bytes.extend_from_slice(text.as_bytes()),
        }
    }
    String::from_utf8(bytes).ok()
}

/// Percent-encode a value for inclusion in an address
pub fn percent_encode(input: &str) -> String {
    url::form_urlencoded::byte_serialize(input.as_bytes()).collect()
}

/// Lex and decode one bit; `None` when malformed
pub fn decode_pair(bit: &str) -> Option<(String, String)> {
    let (_, (key, value)) = raw_pair(bit).ok()?;
    Some((percent_decode(key)?, percent_decode(value)?))
}
