use std::str::{self, FromStr};

use nom::branch::alt;
use nom::bytes::complete::{tag, take, take_while, take_while1, take_while_m_n};
use nom::character::complete::{digit0, digit1, one_of};
use nom::combinator::{eof, map, map_opt, opt, recognize, verify};
use nom::multi::{fold_many0, many0};
use nom::sequence::{delimited, pair, preceded, terminated};
use nom::{IResult, Input, Parser};
use nom_locate::LocatedSpan;

use crate::error::ParseError;
use crate::{Result, StringFormat};

pub(crate) type ParserInput<'a> = LocatedSpan<&'a [u8], &'a str>;
pub(crate) type NomResult<'a, O> = IResult<ParserInput<'a>, O>;

/// Maximum allowed embedding of literal strings.
pub const MAX_BRACKET: usize = 100;

/// A lexical unit of the PDF file syntax.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Integer(i64),
    Real(f64),
    Name(Vec<u8>),
    String(Vec<u8>, StringFormat),
    Keyword(Keyword),
    DictStart,
    DictEnd,
    ArrayStart,
    ArrayEnd,
}

/// Bare words. The ones the object grammar cares about get their own variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyword {
    True,
    False,
    Null,
    /// The `R` that closes an indirect reference.
    R,
    Obj,
    EndObj,
    /// The `stream` marker; raw payload bytes follow the next end-of-line.
    Stream,
    EndStream,
    Xref,
    Trailer,
    StartXref,
    Other(Vec<u8>),
}

impl Keyword {
    fn from_bytes(word: &[u8]) -> Keyword {
        match word {
            b"true" => Keyword::True,
            b"false" => Keyword::False,
            b"null" => Keyword::Null,
            b"R" => Keyword::R,
            b"obj" => Keyword::Obj,
            b"endobj" => Keyword::EndObj,
            b"stream" => Keyword::Stream,
            b"endstream" => Keyword::EndStream,
            b"xref" => Keyword::Xref,
            b"trailer" => Keyword::Trailer,
            b"startxref" => Keyword::StartXref,
            other => Keyword::Other(other.to_vec()),
        }
    }
}

/// Scans tokens out of a byte buffer by absolute offset.
///
/// The tokenizer holds no cursor; callers pass the offset to read from and
/// get back the offset just past the token, so object bodies at disjoint
/// offsets can be scanned independently.
#[derive(Clone, Copy)]
pub struct Tokenizer<'a> {
    input: ParserInput<'a>,
}

impl<'a> Tokenizer<'a> {
    pub fn new(buffer: &'a [u8]) -> Tokenizer<'a> {
        Tokenizer {
            input: ParserInput::new_extra(buffer, "tokenizer"),
        }
    }

    pub fn buffer(&self) -> &'a [u8] {
        *self.input.fragment()
    }

    pub fn len(&self) -> usize {
        self.input.fragment().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Offset of the first byte at or after `offset` that is not white-space or comment.
    pub fn skip_space(&self, offset: usize) -> usize {
        if offset >= self.len() {
            return self.len();
        }
        match space(self.input.take_from(offset)) {
            Ok((rest, _)) => rest.location_offset(),
            Err(_) => offset,
        }
    }

    /// Read the token starting at or after `offset`.
    pub fn next_token(&self, offset: usize) -> Result<(Token, usize)> {
        let start = self.skip_space(offset);
        if start >= self.len() {
            return Err(ParseError::EndOfInput { offset: start }.into());
        }
        token(self.input.take_from(start))
            .map(|(rest, token)| (token, rest.location_offset()))
            .map_err(|_| ParseError::InvalidToken { offset: start }.into())
    }

    /// Offset just past an end-of-line marker at `offset`, if there is one.
    pub fn eol_at(&self, offset: usize) -> Option<usize> {
        if offset >= self.len() {
            return None;
        }
        eol(self.input.take_from(offset)).ok().map(|(rest, _)| rest.location_offset())
    }
}

pub(crate) fn eol(input: ParserInput) -> NomResult<ParserInput> {
    alt((tag(&b"\r\n"[..]), tag(&b"\n"[..]), tag(&b"\r"[..]))).parse(input)
}

fn comment(input: ParserInput) -> NomResult<()> {
    map(
        (tag(&b"%"[..]), take_while(|c: u8| !b"\r\n".contains(&c)), alt((eol, eof))),
        |_| (),
    )
    .parse(input)
}

#[inline]
pub(crate) fn is_whitespace(c: u8) -> bool {
    b" \t\n\r\0\x0C".contains(&c)
}

#[inline]
fn is_delimiter(c: u8) -> bool {
    b"()<>[]{}/%".contains(&c)
}

#[inline]
fn is_regular(c: u8) -> bool {
    !is_whitespace(c) && !is_delimiter(c)
}

#[inline]
fn is_direct_literal_string(c: u8) -> bool {
    !b"()\\\r\n".contains(&c)
}

#[inline]
fn hex_value(c: u8) -> Option<u8> {
    (c as char).to_digit(16).map(|d| d as u8)
}

fn white_space(input: ParserInput) -> NomResult<()> {
    map(take_while(is_whitespace), |_| ()).parse(input)
}

pub(crate) fn space(input: ParserInput) -> NomResult<()> {
    fold_many0(
        alt((map(take_while1(is_whitespace), |_| ()), comment)),
        || {},
        |_, _| (),
    )
    .parse(input)
}

fn parse_ascii<T: FromStr>(digits: ParserInput) -> Option<T> {
    str::from_utf8(&digits).ok().and_then(|s| T::from_str(s).ok())
}

fn integer(input: ParserInput) -> NomResult<i64> {
    map_opt(recognize(pair(opt(one_of("+-")), digit1)), parse_ascii::<i64>).parse(input)
}

fn real(input: ParserInput) -> NomResult<f64> {
    map_opt(
        recognize(pair(
            opt(one_of("+-")),
            alt((
                map((digit1, tag(&b"."[..]), digit0), |_| ()),
                map(pair(tag(&b"."[..]), digit1), |_| ()),
            )),
        )),
        parse_ascii::<f64>,
    )
    .parse(input)
}

fn hex_char(input: ParserInput) -> NomResult<u8> {
    map_opt(take(2usize), |h: ParserInput| Some(hex_value(h[0])? << 4 | hex_value(h[1])?)).parse(input)
}

fn oct_char(input: ParserInput) -> NomResult<u8> {
    map(
        take_while_m_n(1, 3, |c: u8| (b'0'..=b'7').contains(&c)),
        // Overflow of a three digit octal escape is ignored.
        |digits: ParserInput| {
            digits
                .iter()
                .fold(0_u16, |value, digit| value * 8 + u16::from(digit - b'0')) as u8
        },
    )
    .parse(input)
}

fn name(input: ParserInput) -> NomResult<Vec<u8>> {
    preceded(
        tag(&b"/"[..]),
        many0(alt((
            preceded(tag(&b"#"[..]), hex_char),
            map_opt(take(1usize), |c: ParserInput| {
                if c[0] != b'#' && is_regular(c[0]) {
                    Some(c[0])
                } else {
                    None
                }
            }),
        ))),
    )
    .parse(input)
}

fn escape_sequence(input: ParserInput) -> NomResult<Option<u8>> {
    preceded(
        tag(&b"\\"[..]),
        alt((
            map(oct_char, Some),
            map(eol, |_| None),
            map(tag(&b"n"[..]), |_| Some(b'\n')),
            map(tag(&b"r"[..]), |_| Some(b'\r')),
            map(tag(&b"t"[..]), |_| Some(b'\t')),
            map(tag(&b"b"[..]), |_| Some(b'\x08')),
            map(tag(&b"f"[..]), |_| Some(b'\x0C')),
            map(take(1usize), |c: ParserInput| Some(c[0])),
        )),
    )
    .parse(input)
}

enum LiteralPiece<'a> {
    Direct(ParserInput<'a>),
    Escape(Option<u8>),
    Nested(Vec<u8>),
}

impl LiteralPiece<'_> {
    fn push(self, output: &mut Vec<u8>) {
        match self {
            LiteralPiece::Direct(s) => output.extend_from_slice(&s),
            LiteralPiece::Escape(e) => output.extend(e),
            LiteralPiece::Nested(n) => output.extend_from_slice(&n),
        }
    }
}

fn inner_literal_string(depth: usize) -> impl Fn(ParserInput) -> NomResult<Vec<u8>> {
    move |input| {
        fold_many0(
            alt((
                map(take_while1(is_direct_literal_string), LiteralPiece::Direct),
                map(escape_sequence, LiteralPiece::Escape),
                map(eol, LiteralPiece::Direct),
                map(nested_literal_string(depth), LiteralPiece::Nested),
            )),
            Vec::new,
            |mut out: Vec<u8>, piece| {
                piece.push(&mut out);
                out
            },
        )
        .parse(input)
    }
}

fn nested_literal_string(depth: usize) -> impl Fn(ParserInput) -> NomResult<Vec<u8>> {
    move |input| {
        if depth == 0 {
            // Always fails: nesting is capped at MAX_BRACKET.
            map(verify(tag(&b"("[..]), |_: &ParserInput| false), |_| vec![]).parse(input)
        } else {
            map(
                delimited(tag(&b"("[..]), inner_literal_string(depth - 1), tag(&b")"[..])),
                |mut content| {
                    content.insert(0, b'(');
                    content.push(b')');
                    content
                },
            )
            .parse(input)
        }
    }
}

fn literal_string(input: ParserInput) -> NomResult<Vec<u8>> {
    delimited(tag(&b"("[..]), inner_literal_string(MAX_BRACKET), tag(&b")"[..])).parse(input)
}

fn hex_digit(input: ParserInput) -> NomResult<u8> {
    map_opt(take(1usize), |c: ParserInput| hex_value(c[0])).parse(input)
}

fn hexadecimal_string(input: ParserInput) -> NomResult<Vec<u8>> {
    map(
        delimited(
            tag(&b"<"[..]),
            terminated(many0(preceded(white_space, hex_digit)), white_space),
            tag(&b">"[..]),
        ),
        // An odd final digit is padded with 0.
        |nibbles: Vec<u8>| {
            nibbles
                .chunks(2)
                .map(|pair| pair[0] << 4 | pair.get(1).copied().unwrap_or(0))
                .collect()
        },
    )
    .parse(input)
}

fn keyword(input: ParserInput) -> NomResult<Keyword> {
    map(take_while1(is_regular), |word: ParserInput| Keyword::from_bytes(&word)).parse(input)
}

fn token(input: ParserInput) -> NomResult<Token> {
    alt((
        map(tag(&b"<<"[..]), |_| Token::DictStart),
        map(tag(&b">>"[..]), |_| Token::DictEnd),
        map(tag(&b"["[..]), |_| Token::ArrayStart),
        map(tag(&b"]"[..]), |_| Token::ArrayEnd),
        map(name, Token::Name),
        map(literal_string, |s| Token::String(s, StringFormat::Literal)),
        map(hexadecimal_string, |s| Token::String(s, StringFormat::Hexadecimal)),
        map(real, Token::Real),
        map(integer, Token::Integer),
        map(keyword, Token::Keyword),
    ))
    .parse(input)
}
