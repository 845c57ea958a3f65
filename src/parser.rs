use std::collections::HashSet;
use std::str;

use log::{debug, warn};
use nom::Parser;
use nom::bytes::complete::{tag, take_while};
use nom::combinator::map_res;
use nom::sequence::{delimited, preceded};

use crate::error::{ParseError, XrefError};
use crate::reader::Reader;
use crate::tokenizer::{Keyword, NomResult, ParserInput, Token, Tokenizer, eol};
use crate::xref::{self, Xref, XrefEntry, XrefType};
use crate::{Dictionary, Error, Object, ObjectId, Result, Stream};

/// Maximum nesting of arrays and dictionaries inside one object.
pub const MAX_DEPTH: usize = 256;

/// Recursive-descent parser for PDF objects over a [`Tokenizer`].
#[derive(Clone, Copy)]
pub struct ObjectParser<'a> {
    tokenizer: Tokenizer<'a>,
}

impl<'a> ObjectParser<'a> {
    pub fn new(buffer: &'a [u8]) -> ObjectParser<'a> {
        ObjectParser {
            tokenizer: Tokenizer::new(buffer),
        }
    }

    pub fn tokenizer(&self) -> &Tokenizer<'a> {
        &self.tokenizer
    }

    /// Parse one direct object at `offset`, returning it with the offset just past it.
    pub fn direct_object(&self, offset: usize) -> Result<(Object, usize)> {
        let (token, next) = self.tokenizer.next_token(offset)?;
        self.object_from(token, self.tokenizer.skip_space(offset), next, 0)
    }

    fn object_from(&self, token: Token, start: usize, next: usize, depth: usize) -> Result<(Object, usize)> {
        match token {
            Token::Integer(number) => match self.reference_tail(number, next) {
                Some((id, end)) => Ok((Object::Reference(id), end)),
                None => Ok((Object::Integer(number), next)),
            },
            Token::Real(number) => Ok((Object::Real(number), next)),
            Token::Name(name) => Ok((Object::Name(name), next)),
            Token::String(bytes, format) => Ok((Object::String(bytes, format), next)),
            Token::Keyword(Keyword::True) => Ok((Object::Boolean(true), next)),
            Token::Keyword(Keyword::False) => Ok((Object::Boolean(false), next)),
            Token::Keyword(Keyword::Null) => Ok((Object::Null, next)),
            Token::ArrayStart => self.array(start, next, depth + 1),
            Token::DictStart => {
                let (dict, end) = self.dictionary_body(start, next, depth + 1)?;
                Ok((Object::Dictionary(dict), end))
            }
            _ => Err(ParseError::UnexpectedToken {
                offset: start,
                expected: "object",
            }
            .into()),
        }
    }

    /// Look ahead for the `G R` that turns an integer into an indirect reference.
    fn reference_tail(&self, number: i64, offset: usize) -> Option<(ObjectId, usize)> {
        let number = u32::try_from(number).ok()?;
        let (Token::Integer(generation), offset) = self.tokenizer.next_token(offset).ok()? else {
            return None;
        };
        let generation = u16::try_from(generation).ok()?;
        match self.tokenizer.next_token(offset).ok()? {
            (Token::Keyword(Keyword::R), end) => Some(((number, generation), end)),
            _ => None,
        }
    }

    fn array(&self, start: usize, mut offset: usize, depth: usize) -> Result<(Object, usize)> {
        if depth > MAX_DEPTH {
            return Err(ParseError::TooDeep { offset: start }.into());
        }
        let mut items = Vec::new();
        loop {
            let token_start = self.tokenizer.skip_space(offset);
            let (token, next) = self.tokenizer.next_token(offset)?;
            if token == Token::ArrayEnd {
                return Ok((Object::Array(items), next));
            }
            let (item, end) = self.object_from(token, token_start, next, depth)?;
            items.push(item);
            offset = end;
        }
    }

    /// Parse the entries following `<<` up to and including the closing `>>`.
    fn dictionary_body(&self, start: usize, mut offset: usize, depth: usize) -> Result<(Dictionary, usize)> {
        if depth > MAX_DEPTH {
            return Err(ParseError::TooDeep { offset: start }.into());
        }
        let mut dict = Dictionary::new();
        loop {
            let key_start = self.tokenizer.skip_space(offset);
            match self.tokenizer.next_token(offset)? {
                (Token::DictEnd, next) => return Ok((dict, next)),
                (Token::Name(key), next) => {
                    let (token, value_end) = self.tokenizer.next_token(next)?;
                    let (value, end) = self.object_from(token, self.tokenizer.skip_space(next), value_end, depth)?;
                    dict.set(key, value);
                    offset = end;
                }
                _ => {
                    return Err(ParseError::UnexpectedToken {
                        offset: key_start,
                        expected: "name or >>",
                    }
                    .into());
                }
            }
        }
    }

    /// Parse a dictionary that must start at `offset`.
    pub fn dictionary(&self, offset: usize) -> Result<(Dictionary, usize)> {
        let start = self.tokenizer.skip_space(offset);
        match self.tokenizer.next_token(offset)? {
            (Token::DictStart, next) => self.dictionary_body(start, next, 1),
            _ => Err(ParseError::UnexpectedToken {
                offset: start,
                expected: "<<",
            }
            .into()),
        }
    }

    fn object_header(&self, offset: usize) -> Option<(ObjectId, usize)> {
        let (Token::Integer(number), offset) = self.tokenizer.next_token(offset).ok()? else {
            return None;
        };
        let (Token::Integer(generation), offset) = self.tokenizer.next_token(offset).ok()? else {
            return None;
        };
        let (Token::Keyword(Keyword::Obj), offset) = self.tokenizer.next_token(offset).ok()? else {
            return None;
        };
        Some(((u32::try_from(number).ok()?, u16::try_from(generation).ok()?), offset))
    }

    /// Parse `N G obj <value> endobj` at `offset`.
    ///
    /// A stream `Length` given as an indirect reference is resolved through
    /// `reader`; `already_seen` guards against lengths that refer back to
    /// the stream being read.
    pub fn indirect_object(
        &self, offset: usize, expected_id: Option<ObjectId>, reader: &Reader,
        already_seen: &mut HashSet<ObjectId>,
    ) -> Result<(ObjectId, Object, usize)> {
        let Some((id, body)) = self.object_header(offset) else {
            return Err(match expected_id {
                Some(id) => XrefError::Entry { id, offset }.into(),
                None => ParseError::UnexpectedToken {
                    offset,
                    expected: "object header",
                }
                .into(),
            });
        };
        if let Some(expected) = expected_id {
            if id != expected {
                return Err(XrefError::ObjectIdMismatch { expected, found: id }.into());
            }
        }

        let value_start = self.tokenizer.skip_space(body);
        let (token, next) = self.tokenizer.next_token(body)?;
        let (object, end) = if token == Token::DictStart {
            let (dict, end) = self.dictionary_body(value_start, next, 1)?;
            match self.tokenizer.next_token(end) {
                Ok((Token::Keyword(Keyword::Stream), payload)) => {
                    self.stream(dict, payload, reader, already_seen)?
                }
                _ => (Object::Dictionary(dict), end),
            }
        } else {
            self.object_from(token, value_start, next, 0)?
        };

        match self.tokenizer.next_token(end) {
            Ok((Token::Keyword(Keyword::EndObj), after)) => Ok((id, object, after)),
            _ => {
                debug!("object {} {} is missing endobj", id.0, id.1);
                Ok((id, object, end))
            }
        }
    }

    /// Read the raw payload following the `stream` keyword that ends at `offset`.
    fn stream(
        &self, mut dict: Dictionary, offset: usize, reader: &Reader, already_seen: &mut HashSet<ObjectId>,
    ) -> Result<(Object, usize)> {
        let buffer = self.tokenizer.buffer();
        // Some writers put spaces between the keyword and its end-of-line.
        let mut start = offset;
        while buffer.get(start) == Some(&b' ') {
            start += 1;
        }
        let start = self.tokenizer.eol_at(start).ok_or(ParseError::UnexpectedToken {
            offset: start,
            expected: "end-of-line after stream",
        })?;

        let length = match dict.get(b"Length") {
            Ok(Object::Reference(id)) => reader.get_object(*id, already_seen).and_then(|value| value.as_i64()),
            Ok(value) => value.as_i64(),
            Err(err) => Err(err),
        };
        let declared = length.and_then(|length| {
            usize::try_from(length).map_err(|_| Error::from(ParseError::InvalidStreamLength { offset: start, length }))
        });
        let bounds = declared.and_then(|length| {
            let content_end = start
                .checked_add(length)
                .filter(|&end| end <= buffer.len())
                .ok_or(ParseError::UnterminatedStream { offset: start })?;
            match self.tokenizer.next_token(content_end) {
                Ok((Token::Keyword(Keyword::EndStream), end)) => Ok((content_end, end)),
                _ => Err(ParseError::UnterminatedStream { offset: start }.into()),
            }
        });
        let (content_end, end) = match bounds {
            Ok(bounds) => bounds,
            // Missing, unresolvable or wrong Length: delimit by the keyword.
            Err(err) => {
                warn!("stream at byte {} has no usable Length ({}), scanning for endstream", start, err);
                let (content_end, end) = self.scan_endstream(start)?;
                dict.set("Length", (content_end - start) as i64);
                (content_end, end)
            }
        };

        let content = buffer[start..content_end].to_vec();
        Ok((Object::Stream(Stream::from_raw(dict, content)), end))
    }

    /// Locate `endstream` after `start`, returning the end of the payload and of the keyword.
    fn scan_endstream(&self, start: usize) -> Result<(usize, usize)> {
        const KEYWORD: &[u8] = b"endstream";
        let buffer = self.tokenizer.buffer();
        let position = buffer[start..]
            .windows(KEYWORD.len())
            .position(|window| window == KEYWORD)
            .map(|position| start + position)
            .ok_or(ParseError::UnterminatedStream { offset: start })?;

        let mut content_end = position;
        if content_end > start && buffer[content_end - 1] == b'\n' {
            content_end -= 1;
        }
        if content_end > start && buffer[content_end - 1] == b'\r' {
            content_end -= 1;
        }
        Ok((content_end, position + KEYWORD.len()))
    }

    /// Parse a classic `xref` table starting at `offset`.
    pub fn xref_table(&self, offset: usize) -> Result<(Xref, usize)> {
        let broken = || Error::from(XrefError::Parse { offset });
        let (Token::Keyword(Keyword::Xref), mut position) = self.tokenizer.next_token(offset).map_err(|_| broken())?
        else {
            return Err(broken());
        };

        let mut xref = Xref::new(0, XrefType::CrossReferenceTable);
        // Subsections run until the `trailer` keyword.
        while let Ok((Token::Integer(first), next)) = self.tokenizer.next_token(position) {
            let (Token::Integer(count), next) = self.tokenizer.next_token(next).map_err(|_| broken())? else {
                return Err(broken());
            };
            if first < 0 || count < 0 {
                return Err(broken());
            }
            position = next;
            for index in 0..count {
                let (entry_offset, generation, kind, next) = self.xref_line(position).ok_or_else(broken)?;
                position = next;
                let Some(number) = first.checked_add(index).and_then(|number| u32::try_from(number).ok()) else {
                    return Err(broken());
                };
                match kind.as_slice() {
                    b"n" => {
                        // Generations above 65535 cannot be referenced.
                        let (Ok(offset), Ok(generation)) = (u32::try_from(entry_offset), u16::try_from(generation))
                        else {
                            continue;
                        };
                        xref.insert(number, XrefEntry::Normal { offset, generation });
                    }
                    b"f" => xref.insert(number, XrefEntry::Free),
                    _ => return Err(broken()),
                }
            }
        }
        Ok((xref, position))
    }

    fn xref_line(&self, offset: usize) -> Option<(i64, i64, Vec<u8>, usize)> {
        let (Token::Integer(entry_offset), offset) = self.tokenizer.next_token(offset).ok()? else {
            return None;
        };
        let (Token::Integer(generation), offset) = self.tokenizer.next_token(offset).ok()? else {
            return None;
        };
        let (Token::Keyword(Keyword::Other(kind)), offset) = self.tokenizer.next_token(offset).ok()? else {
            return None;
        };
        Some((entry_offset, generation, kind, offset))
    }

    /// Parse `trailer << ... >>` starting at `offset`.
    pub fn trailer(&self, offset: usize) -> Result<(Dictionary, usize)> {
        match self.tokenizer.next_token(offset) {
            Ok((Token::Keyword(Keyword::Trailer), next)) => self.dictionary(next),
            _ => Err(Error::MissingTrailer),
        }
    }

    /// Parse the cross-reference section at `offset`, either a table with its
    /// trailer or a cross-reference stream whose dictionary acts as trailer.
    pub fn xref_and_trailer(&self, offset: usize, reader: &Reader) -> Result<(Xref, Dictionary)> {
        match self.tokenizer.next_token(offset) {
            Ok((Token::Keyword(Keyword::Xref), _)) => {
                let (mut xref, next) = self.xref_table(offset)?;
                let (trailer, _) = self.trailer(next)?;
                xref.size = trailer
                    .get(b"Size")
                    .and_then(Object::as_i64)
                    .ok()
                    .and_then(|size| u32::try_from(size).ok())
                    .unwrap_or(0);
                Ok((xref, trailer))
            }
            Ok((Token::Integer(_), _)) => {
                let (_, object, _) = self
                    .indirect_object(offset, None, reader, &mut HashSet::new())
                    .map_err(|_| XrefError::Parse { offset })?;
                match object {
                    Object::Stream(stream) if stream.dict.has_type(b"XRef") => xref::decode_xref_stream(stream),
                    _ => Err(XrefError::Parse { offset }.into()),
                }
            }
            _ => Err(XrefError::Parse { offset }.into()),
        }
    }

    /// Value of the `startxref` keyword found at `offset`.
    pub fn xref_start(&self, offset: usize) -> Option<usize> {
        let (Token::Keyword(Keyword::StartXref), next) = self.tokenizer.next_token(offset).ok()? else {
            return None;
        };
        match self.tokenizer.next_token(next).ok()? {
            (Token::Integer(start), _) => usize::try_from(start).ok(),
            _ => None,
        }
    }
}

/// Version string of the `%PDF-x.y` header line.
pub fn header(buffer: &[u8]) -> Option<String> {
    map_res(
        delimited(tag(&b"%PDF-"[..]), take_while(|c: u8| !b"\r\n".contains(&c)), eol),
        |version: ParserInput| str::from_utf8(&version).map(|v| v.trim().to_owned()),
    )
    .parse(ParserInput::new_extra(buffer, "header"))
    .ok()
    .map(|(_, version)| version)
}

fn comment_line(input: ParserInput) -> NomResult<ParserInput> {
    preceded(tag(&b"%"[..]), take_while(|c: u8| !b"\r\n".contains(&c))).parse(input)
}

/// Bytes of a comment line, used for the binary marker following the header.
pub fn binary_mark(buffer: &[u8]) -> Option<Vec<u8>> {
    comment_line(ParserInput::new_extra(buffer, "binary_mark"))
        .ok()
        .map(|(_, mark)| mark.to_vec())
}
