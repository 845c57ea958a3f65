use std::collections::BTreeMap;

use log::warn;
#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::error::ParseError;
use crate::parser::ObjectParser;
use crate::tokenizer::Token;
use crate::{Object, ObjectId, Result, Stream};

/// Objects unpacked from a `/Type /ObjStm` stream.
#[derive(Debug)]
pub struct ObjectStream {
    pub objects: BTreeMap<ObjectId, Object>,
}

impl ObjectStream {
    pub fn new(stream: &Stream) -> Result<ObjectStream> {
        let content = stream.decompressed_content()?;
        if content.is_empty() {
            return Ok(ObjectStream {
                objects: BTreeMap::new(),
            });
        }

        let first_offset = stream
            .dict
            .get(b"First")
            .and_then(Object::as_i64)?
            .try_into()
            .map_err(|_| ParseError::InvalidObjectStream("First is negative"))?;
        let index_block = content
            .get(..first_offset)
            .ok_or(ParseError::InvalidObjectStream("First is past the end of the stream"))?;

        // Pairs of object number and offset relative to First.
        let parser = ObjectParser::new(index_block);
        let mut numbers = Vec::new();
        let mut position = 0;
        while let Ok((token, next)) = parser.tokenizer().next_token(position) {
            match token {
                Token::Integer(number) => numbers.push(number),
                _ => return Err(ParseError::InvalidObjectStream("index holds a non-integer").into()),
            }
            position = next;
        }
        let len = numbers.len() / 2 * 2;

        let n = stream.dict.get(b"N").and_then(Object::as_i64)?;
        if Some(numbers.len() as i64) != n.checked_mul(2) {
            warn!("object stream: the object stream dictionary specifies a wrong number of objects")
        }

        let parser = ObjectParser::new(&content);
        let chunks_filter_map = |chunk: &[i64]| -> Option<Result<(ObjectId, Object)>> {
            let (Ok(id), Ok(relative)) = (u32::try_from(chunk[0]), usize::try_from(chunk[1])) else {
                warn!("invalid index entry {} {} in object stream", chunk[0], chunk[1]);
                return None;
            };
            let offset = first_offset + relative;
            if offset >= content.len() {
                warn!("out-of-bounds offset in object stream");
                return None;
            }
            Some(parser.direct_object(offset).map(|(object, _)| ((id, 0), object)))
        };
        #[cfg(feature = "rayon")]
        let objects = numbers[..len].par_chunks(2).filter_map(chunks_filter_map).collect::<Result<_>>()?;
        #[cfg(not(feature = "rayon"))]
        let objects = numbers[..len].chunks(2).filter_map(chunks_filter_map).collect::<Result<_>>()?;

        Ok(ObjectStream { objects })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn unpack_objects() {
        let content = b"4 0 5 28 <</Type/Page/Parent 3 0 R>> [0 0 200 100]".to_vec();
        let stream = Stream::new(
            dictionary! {
                "Type" => "ObjStm",
                "N" => 2,
                "First" => 9,
            },
            content,
        );
        let objects = ObjectStream::new(&stream).unwrap().objects;
        assert_eq!(objects.len(), 2);
        assert!(objects[&(4, 0)].as_dict().unwrap().has_type(b"Page"));
        assert_eq!(objects[&(5, 0)].as_array().unwrap().len(), 4);
    }

    #[test]
    fn first_past_end() {
        let stream = Stream::new(dictionary! { "N" => 1, "First" => 50 }, b"4 0 null".to_vec());
        assert!(matches!(
            ObjectStream::new(&stream),
            Err(Error::MalformedSyntax(ParseError::InvalidObjectStream(_)))
        ));
    }
}
