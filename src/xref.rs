use std::collections::BTreeMap;

use crate::error::XrefError;
use crate::{Dictionary, Object, Result, Stream};

#[derive(Debug, Clone)]
pub struct Xref {
    /// Type of Cross-Reference used in the last incremental version.
    pub cross_reference_type: XrefType,

    /// Entries for indirect object.
    pub entries: BTreeMap<u32, XrefEntry>,

    /// Total number of entries (including free entries), equal to the highest object number plus 1.
    pub size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrefType {
    /// Cross-reference table, the `xref` keyword followed by fixed-width lines.
    CrossReferenceTable,
    /// Cross-reference stream, a `/Type /XRef` stream object.
    CrossReferenceStream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrefEntry {
    Free,
    Normal { offset: u32, generation: u16 },
    Compressed { container: u32, index: u16 },
}

impl Xref {
    pub fn new(size: u32, xref_type: XrefType) -> Xref {
        Xref {
            cross_reference_type: xref_type,
            entries: BTreeMap::new(),
            size,
        }
    }

    pub fn get(&self, id: u32) -> Option<&XrefEntry> {
        self.entries.get(&id)
    }

    pub fn insert(&mut self, id: u32, entry: XrefEntry) {
        self.entries.insert(id, entry);
    }

    /// Combine Xref entries of an older section, keeping entries that already exist.
    pub fn merge(&mut self, older: Xref) {
        for (id, entry) in older.entries {
            self.entries.entry(id).or_insert(entry);
        }
    }

    /// Combine the `XRefStm` stream of a hybrid-reference section.
    ///
    /// Objects hidden from the table are listed there as free or not at all,
    /// so stream entries replace free ones.
    pub fn merge_hidden(&mut self, stream: Xref) {
        for (id, entry) in stream.entries {
            let slot = self.entries.entry(id).or_insert(XrefEntry::Free);
            if *slot == XrefEntry::Free {
                *slot = entry;
            }
        }
    }

    pub fn max_id(&self) -> u32 {
        self.entries.keys().next_back().copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries that locate an object in the file, either directly or inside an object stream.
    pub fn in_use(&self) -> impl Iterator<Item = (u32, &XrefEntry)> {
        self.entries
            .iter()
            .filter(|(_, entry)| !matches!(entry, XrefEntry::Free))
            .map(|(id, entry)| (*id, entry))
    }
}

fn integer_array(object: &Object) -> Result<Vec<i64>> {
    object.as_array()?.iter().map(Object::as_i64).collect()
}

fn read_big_endian(data: &[u8], position: &mut usize, width: usize) -> Result<u64> {
    let bytes = data
        .get(*position..*position + width)
        .ok_or(XrefError::Stream("entry data is truncated"))?;
    *position += width;
    Ok(bytes.iter().fold(0_u64, |value, &byte| value << 8 | u64::from(byte)))
}

/// Decode a `/Type /XRef` stream into its entries and its trailer dictionary.
pub fn decode_xref_stream(stream: Stream) -> Result<(Xref, Dictionary)> {
    let content = stream.decompressed_content()?;
    let mut dict = stream.dict;

    let size = dict
        .get(b"Size")
        .and_then(Object::as_i64)
        .map_err(|_| XrefError::Stream("missing Size"))?;
    let size = u32::try_from(size).map_err(|_| XrefError::Stream("invalid Size"))?;
    let sections = dict
        .get(b"Index")
        .and_then(integer_array)
        .unwrap_or_else(|_| vec![0, i64::from(size)]);
    let widths = dict
        .get(b"W")
        .and_then(integer_array)
        .map_err(|_| XrefError::Stream("missing W"))?;
    if widths.len() < 3 || widths.iter().any(|&width| !(0..=8).contains(&width)) {
        return Err(XrefError::Stream("invalid W").into());
    }
    let (type_width, second_width, third_width) = (widths[0] as usize, widths[1] as usize, widths[2] as usize);

    let mut xref = Xref::new(size, XrefType::CrossReferenceStream);
    let mut position = 0;
    for section in sections.chunks_exact(2) {
        let (start, count) = (section[0], section[1]);
        if start < 0 || count < 0 {
            return Err(XrefError::Stream("invalid Index").into());
        }
        let end = start
            .checked_add(count)
            .ok_or(XrefError::Stream("invalid Index"))?;
        for number in start..end {
            let entry_type = if type_width == 0 {
                1
            } else {
                read_big_endian(&content, &mut position, type_width)?
            };
            let second = read_big_endian(&content, &mut position, second_width)?;
            let third = read_big_endian(&content, &mut position, third_width)?;
            let Ok(number) = u32::try_from(number) else {
                return Err(XrefError::Stream("object number out of range").into());
            };
            match entry_type {
                0 => xref.insert(number, XrefEntry::Free),
                1 => {
                    let offset = u32::try_from(second).map_err(|_| XrefError::Stream("offset out of range"))?;
                    let Ok(generation) = u16::try_from(third) else {
                        continue;
                    };
                    xref.insert(number, XrefEntry::Normal { offset, generation });
                }
                2 => {
                    let container =
                        u32::try_from(second).map_err(|_| XrefError::Stream("container out of range"))?;
                    let index = u16::try_from(third).map_err(|_| XrefError::Stream("index out of range"))?;
                    xref.insert(number, XrefEntry::Compressed { container, index });
                }
                // Unknown entry types are treated as references to the null object.
                _ => {}
            }
        }
    }

    dict.remove(b"Length");
    dict.remove(b"W");
    dict.remove(b"Index");
    Ok((xref, dict))
}
