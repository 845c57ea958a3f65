use std::fmt;

use indexmap::IndexMap;
use log::warn;

use crate::{Error, Result};

/// Object identifier consists of two parts: object number and generation number.
pub type ObjectId = (u32, u16);

/// Dictionary object.
#[derive(Clone, Default, PartialEq)]
pub struct Dictionary(IndexMap<Vec<u8>, Object>);

/// Stream object
/// Warning - all streams must be indirect objects, while
/// the stream dictionary may be a direct object
#[derive(Debug, Clone, PartialEq)]
pub struct Stream {
    /// Associated stream dictionary
    pub dict: Dictionary,
    /// Raw contents of the stream, still encoded with the stream's filters
    pub content: Vec<u8>,
}

/// Basic PDF object types defined in an enum.
#[derive(Clone, PartialEq)]
pub enum Object {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Name(Vec<u8>),
    String(Vec<u8>, StringFormat),
    Array(Vec<Object>),
    Dictionary(Dictionary),
    Stream(Stream),
    Reference(ObjectId),
}

/// String objects can be written in two formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StringFormat {
    #[default]
    Literal,
    Hexadecimal,
}

impl From<bool> for Object {
    fn from(value: bool) -> Self {
        Object::Boolean(value)
    }
}

impl From<i64> for Object {
    fn from(number: i64) -> Self {
        Object::Integer(number)
    }
}

macro_rules! from_smaller_ints {
    ($( $Int: ty )+) => {
        $(
            impl From<$Int> for Object {
                fn from(number: $Int) -> Self {
                    Object::Integer(i64::from(number))
                }
            }
        )+
    }
}

from_smaller_ints! {
    i8 i16 i32
    u8 u16 u32
}

impl From<f64> for Object {
    fn from(number: f64) -> Self {
        Object::Real(number)
    }
}

impl From<String> for Object {
    fn from(name: String) -> Self {
        Object::Name(name.into_bytes())
    }
}

impl<'a> From<&'a str> for Object {
    fn from(name: &'a str) -> Self {
        Object::Name(name.as_bytes().to_vec())
    }
}

impl From<Vec<Object>> for Object {
    fn from(array: Vec<Object>) -> Self {
        Object::Array(array)
    }
}

impl From<Dictionary> for Object {
    fn from(dict: Dictionary) -> Self {
        Object::Dictionary(dict)
    }
}

impl From<Stream> for Object {
    fn from(stream: Stream) -> Self {
        Object::Stream(stream)
    }
}

impl From<ObjectId> for Object {
    fn from(id: ObjectId) -> Self {
        Object::Reference(id)
    }
}

impl Object {
    pub fn as_i64(&self) -> Result<i64> {
        match *self {
            Object::Integer(value) => Ok(value),
            _ => Err(self.type_error("Integer")),
        }
    }

    /// Numeric value of an Integer or Real object.
    pub fn as_float(&self) -> Result<f64> {
        match *self {
            Object::Integer(value) => Ok(value as f64),
            Object::Real(value) => Ok(value),
            _ => Err(self.type_error("Integer or Real")),
        }
    }

    pub fn as_name(&self) -> Result<&[u8]> {
        match self {
            Object::Name(name) => Ok(name),
            _ => Err(self.type_error("Name")),
        }
    }

    pub fn as_str(&self) -> Result<&[u8]> {
        match self {
            Object::String(string, _) => Ok(string),
            _ => Err(self.type_error("String")),
        }
    }

    pub fn as_reference(&self) -> Result<ObjectId> {
        match *self {
            Object::Reference(id) => Ok(id),
            _ => Err(self.type_error("Reference")),
        }
    }

    pub fn as_array(&self) -> Result<&Vec<Object>> {
        match self {
            Object::Array(arr) => Ok(arr),
            _ => Err(self.type_error("Array")),
        }
    }

    pub fn as_dict(&self) -> Result<&Dictionary> {
        match self {
            Object::Dictionary(dict) => Ok(dict),
            _ => Err(self.type_error("Dictionary")),
        }
    }

    pub fn as_dict_mut(&mut self) -> Result<&mut Dictionary> {
        match self {
            Object::Dictionary(dict) => Ok(dict),
            _ => Err(self.type_error("Dictionary")),
        }
    }

    pub fn as_stream(&self) -> Result<&Stream> {
        match self {
            Object::Stream(stream) => Ok(stream),
            _ => Err(self.type_error("Stream")),
        }
    }

    /// The `/Type` name of a dictionary or stream dictionary.
    pub fn type_name(&self) -> Result<&[u8]> {
        match self {
            Object::Dictionary(dict) => dict.type_name(),
            Object::Stream(stream) => stream.dict.type_name(),
            _ => Err(self.type_error("Dictionary or Stream")),
        }
    }

    pub fn enum_variant(&self) -> &'static str {
        match self {
            Object::Null => "Null",
            Object::Boolean(_) => "Boolean",
            Object::Integer(_) => "Integer",
            Object::Real(_) => "Real",
            Object::Name(_) => "Name",
            Object::String(..) => "String",
            Object::Array(_) => "Array",
            Object::Dictionary(_) => "Dictionary",
            Object::Stream(_) => "Stream",
            Object::Reference(_) => "Reference",
        }
    }

    fn type_error(&self, expected: &'static str) -> Error {
        Error::ObjectType {
            expected,
            found: self.enum_variant(),
        }
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Null => f.write_str("null"),
            Object::Boolean(value) => write!(f, "{}", value),
            Object::Integer(value) => write!(f, "{}", value),
            Object::Real(value) => write!(f, "{}", value),
            Object::Name(name) => write!(f, "/{}", String::from_utf8_lossy(name)),
            Object::String(text, _) => write!(f, "({})", String::from_utf8_lossy(text)),
            Object::Array(array) => {
                let items = array.iter().map(|item| format!("{:?}", item)).collect::<Vec<String>>();
                write!(f, "[{}]", items.join(" "))
            }
            Object::Dictionary(dict) => write!(f, "{:?}", dict),
            Object::Stream(stream) => write!(f, "{:?}stream...endstream", stream.dict),
            Object::Reference(id) => write!(f, "{} {} R", id.0, id.1),
        }
    }
}

impl Dictionary {
    pub fn new() -> Dictionary {
        Dictionary(IndexMap::new())
    }

    pub fn has(&self, key: &[u8]) -> bool {
        self.0.contains_key(key)
    }

    pub fn get(&self, key: &[u8]) -> Result<&Object> {
        self.0
            .get(key)
            .ok_or_else(|| Error::DictKey(String::from_utf8_lossy(key).into_owned()))
    }

    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<Vec<u8>>,
        V: Into<Object>,
    {
        self.0.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn remove(&mut self, key: &[u8]) -> Option<Object> {
        self.0.shift_remove(key)
    }

    pub fn type_name(&self) -> Result<&[u8]> {
        self.get(b"Type").and_then(Object::as_name).or_else(|err| {
            if self.has(b"Linearized") {
                Ok(b"Linearized".as_slice())
            } else {
                Err(err)
            }
        })
    }

    pub fn has_type(&self, type_name: &[u8]) -> bool {
        self.get(b"Type").and_then(Object::as_name).ok() == Some(type_name)
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, Vec<u8>, Object> {
        self.0.iter()
    }
}

#[macro_export]
macro_rules! dictionary {
    () => {
        $crate::Dictionary::new()
    };
    ($( $key: expr => $value: expr ),+ ,) => {
        $crate::dictionary!( $($key => $value),+ )
    };
    ($( $key: expr => $value: expr ),*) => {{
        let mut dict = $crate::Dictionary::new();
        $(
            dict.set($key, $value);
        )*
        dict
    }}
}

impl fmt::Debug for Dictionary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self
            .into_iter()
            .map(|(key, value)| format!("/{} {:?}", String::from_utf8_lossy(key), value))
            .collect::<Vec<String>>();
        write!(f, "<<{}>>", entries.concat())
    }
}

impl<'a> IntoIterator for &'a Dictionary {
    type Item = (&'a Vec<u8>, &'a Object);
    type IntoIter = indexmap::map::Iter<'a, Vec<u8>, Object>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Stream {
    pub fn new(mut dict: Dictionary, content: Vec<u8>) -> Stream {
        dict.set("Length", content.len() as i64);
        Stream { dict, content }
    }

    /// Wrap raw bytes read from a file without touching the dictionary's `Length`.
    pub(crate) fn from_raw(dict: Dictionary, content: Vec<u8>) -> Stream {
        Stream { dict, content }
    }

    pub fn filters(&self) -> Result<Vec<&[u8]>> {
        let filter = match self.dict.get(b"Filter") {
            Ok(filter) => filter,
            Err(_) => return Ok(vec![]),
        };

        if let Ok(name) = filter.as_name() {
            Ok(vec![name])
        } else if let Ok(names) = filter.as_array() {
            names.iter().map(Object::as_name).collect()
        } else {
            Err(Error::ObjectType {
                expected: "Name or Array",
                found: filter.enum_variant(),
            })
        }
    }

    /// Decode the content through its filter chain.
    ///
    /// Only the filters used by cross-reference and object streams are
    /// supported. Page content is never decoded by this crate.
    pub fn decompressed_content(&self) -> Result<Vec<u8>> {
        let filters = self.filters()?;
        let params = match self.dict.get(b"DecodeParms") {
            Ok(Object::Dictionary(dict)) => vec![Some(dict)],
            Ok(Object::Array(array)) => array.iter().map(|p| p.as_dict().ok()).collect(),
            _ => vec![],
        };

        let mut output = self.content.clone();
        // Filters are in decoding order.
        for (index, filter) in filters.into_iter().enumerate() {
            let params = params.get(index).copied().flatten();
            output = match filter {
                b"FlateDecode" | b"Fl" => Self::decompress_zlib(&output, params)?,
                b"LZWDecode" | b"LZW" => Self::decompress_lzw(&output, params)?,
                _ => return Err(Error::UnsupportedFeature("stream filter other than FlateDecode or LZWDecode")),
            };
        }

        Ok(output)
    }

    fn decompress_zlib(input: &[u8], params: Option<&Dictionary>) -> Result<Vec<u8>> {
        use flate2::read::ZlibDecoder;
        use std::io::prelude::*;

        let mut output = Vec::with_capacity(input.len() * 2);
        if !input.is_empty() {
            let mut decoder = ZlibDecoder::new(input);
            if let Err(err) = decoder.read_to_end(&mut output) {
                // Truncated zlib data is common; keep what was inflated.
                if output.is_empty() {
                    return Err(Error::Decompress(err.to_string()));
                }
                warn!("{}", err);
            }
        }
        Self::decompress_predictor(output, params)
    }

    fn decompress_lzw(input: &[u8], params: Option<&Dictionary>) -> Result<Vec<u8>> {
        use weezl::{BitOrder, decode::Decoder};
        const MIN_BITS: u8 = 8;

        let early_change = params
            .and_then(|p| p.get(b"EarlyChange").ok())
            .and_then(|p| p.as_i64().ok())
            .map(|v| v != 0)
            .unwrap_or(true);

        let mut decoder = if early_change {
            Decoder::with_tiff_size_switch(BitOrder::Msb, MIN_BITS)
        } else {
            Decoder::new(BitOrder::Msb, MIN_BITS)
        };
        let output = decoder.decode(input).map_err(|err| Error::Decompress(err.to_string()))?;

        Self::decompress_predictor(output, params)
    }

    fn decompress_predictor(data: Vec<u8>, params: Option<&Dictionary>) -> Result<Vec<u8>> {
        use crate::filters::png;

        let Some(params) = params else {
            return Ok(data);
        };
        let predictor = params.get(b"Predictor").and_then(Object::as_i64).unwrap_or(1);
        match predictor {
            1 => Ok(data),
            10..=15 => {
                let positive = |key: &[u8], default: i64| -> Result<usize> {
                    let value = params.get(key).and_then(Object::as_i64).unwrap_or(default);
                    usize::try_from(value).ok().filter(|&value| value > 0).ok_or_else(|| {
                        Error::Decompress(format!("invalid predictor {} {}", String::from_utf8_lossy(key), value))
                    })
                };
                let pixels_per_row = positive(b"Columns", 1)?;
                let colors = positive(b"Colors", 1)?;
                let bits = positive(b"BitsPerComponent", 8)?;
                let bytes_per_pixel = colors
                    .checked_mul(bits)
                    .map(|bits| bits.div_ceil(8))
                    .ok_or_else(|| Error::Decompress("predictor pixel size overflows".to_string()))?;
                png::decode_frame(data.as_slice(), bytes_per_pixel, pixels_per_row)
                    .map_err(|err| Error::Decompress(err.to_string()))
            }
            _ => Err(Error::UnsupportedFeature("TIFF stream predictor")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_accessors() {
        assert_eq!(Object::Integer(612).as_float().unwrap(), 612.0);
        assert_eq!(Object::Real(0.5).as_float().unwrap(), 0.5);
        assert!(matches!(
            Object::Name(b"A".to_vec()).as_float(),
            Err(Error::ObjectType { found: "Name", .. })
        ));
    }

    #[test]
    fn dictionary_type() {
        let dict = dictionary! {
            "Type" => "Page",
            "Rotate" => 90,
        };
        assert!(dict.has_type(b"Page"));
        assert_eq!(dict.type_name().unwrap(), b"Page");
        assert!(matches!(dict.get(b"MediaBox"), Err(Error::DictKey(key)) if key == "MediaBox"));
    }

    #[test]
    fn flate_round_trip() {
        use flate2::Compression;
        use flate2::write::ZlibEncoder;
        use std::io::Write;

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"1 0 2 0 ").unwrap();
        let compressed = encoder.finish().unwrap();
        let stream = Stream::new(dictionary! { "Filter" => "FlateDecode" }, compressed);
        assert_eq!(stream.decompressed_content().unwrap(), b"1 0 2 0 ");
    }

    #[test]
    fn lzw_with_early_change() {
        use weezl::{BitOrder, encode::Encoder};

        let data = b"2 0 obj 3 0 obj 2 0 obj 3 0 obj".to_vec();
        let compressed = Encoder::with_tiff_size_switch(BitOrder::Msb, 8).encode(&data).unwrap();
        let stream = Stream::new(dictionary! { "Filter" => "LZWDecode" }, compressed);
        assert_eq!(stream.decompressed_content().unwrap(), data);
    }

    #[test]
    fn predictor_parameters_must_be_positive() {
        use flate2::Compression;
        use flate2::write::ZlibEncoder;
        use std::io::Write;

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&[2, 1, 0, 0]).unwrap();
        let compressed = encoder.finish().unwrap();
        for columns in [-1_i64, 0] {
            let stream = Stream::new(
                dictionary! {
                    "Filter" => "FlateDecode",
                    "DecodeParms" => dictionary! { "Predictor" => 12, "Columns" => columns },
                },
                compressed.clone(),
            );
            assert!(matches!(stream.decompressed_content(), Err(Error::Decompress(_))));
        }
    }

    #[test]
    fn unknown_filter_is_unsupported() {
        let stream = Stream::new(dictionary! { "Filter" => "DCTDecode" }, vec![0xFF, 0xD8]);
        assert!(matches!(
            stream.decompressed_content(),
            Err(Error::UnsupportedFeature(_))
        ));
    }
}
