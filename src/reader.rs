use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use log::{debug, warn};
#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::error::{ParseError, XrefError};
use crate::object_stream::ObjectStream;
use crate::parser::{self, ObjectParser};
use crate::xref::{Xref, XrefEntry};
use crate::{Dictionary, Document, Error, Object, ObjectId, Result};

impl Document {
    /// Load a PDF document from a specified file path.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Document> {
        let path = path.as_ref();
        let mut file = File::open(path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => Error::FileNotFound(path.to_path_buf()),
            _ => Error::Io(err),
        })?;
        let mut buffer = Vec::with_capacity(file.metadata()?.len() as usize);
        file.read_to_end(&mut buffer)?;
        Reader::new(&buffer).read()
    }

    /// Load a PDF document from a memory slice.
    pub fn load_mem(buffer: &[u8]) -> Result<Document> {
        Reader::new(buffer).read()
    }
}

pub struct Reader<'a> {
    pub buffer: &'a [u8],
    pub document: Document,
    parser: ObjectParser<'a>,
}

impl<'a> Reader<'a> {
    /// Prepare to read `buffer`, skipping any bytes before the `%PDF-` header.
    pub fn new(buffer: &'a [u8]) -> Reader<'a> {
        let offset = buffer.windows(5).position(|w| w == b"%PDF-").unwrap_or(0);
        let buffer = &buffer[offset..];
        Reader {
            buffer,
            document: Document::new(),
            parser: ObjectParser::new(buffer),
        }
    }

    /// Read whole document.
    pub fn read(mut self) -> Result<Document> {
        let version = parser::header(self.buffer).ok_or(ParseError::InvalidFileHeader)?;

        // The binary mark is the comment line right after the header.
        if let Some(pos) = self.buffer.iter().position(|&byte| byte == b'\n' || byte == b'\r') {
            let rest = &self.buffer[pos..];
            let line = rest.iter().position(|&byte| !b"\r\n".contains(&byte)).unwrap_or(rest.len());
            if let Some(binary_mark) = parser::binary_mark(&rest[line..]) {
                if !binary_mark.is_empty() && binary_mark.iter().all(|&byte| byte >= 128) {
                    self.document.binary_mark = binary_mark;
                }
            }
        }

        let (mut xref, trailer) = self.read_xref_sections()?;

        if trailer.has(b"Encrypt") {
            return Err(Error::UnsupportedFeature("encrypted documents"));
        }
        if !matches!(trailer.get(b"Root"), Ok(Object::Reference(_))) {
            return Err(Error::MissingTrailer);
        }

        let xref_entry_count = xref.max_id().saturating_add(1);
        if xref.size != xref_entry_count {
            warn!(
                "Size entry of trailer dictionary is {}, correct value is {}.",
                xref.size, xref_entry_count
            );
            xref.size = xref_entry_count;
        }

        self.document.version = version;
        self.document.trailer = trailer;
        self.document.reference_table = xref;
        self.document.source_len = self.buffer.len();

        self.load_objects()?;
        self.document.max_id = self.document.objects.keys().map(|id| id.0).max().unwrap_or(0);

        // The catalog has to exist before anything walks the page tree.
        self.document.catalog()?;
        Ok(self.document)
    }

    /// Read the newest cross-reference section and every section it chains to.
    fn read_xref_sections(&self) -> Result<(Xref, Dictionary)> {
        let (mut xref, mut trailer) = match self.get_xref_start() {
            Some(start) if start < self.buffer.len() => match self.parser.xref_and_trailer(start, self) {
                Ok(section) => section,
                Err(err) => {
                    warn!("cross-reference section at byte {} is unreadable: {}", start, err);
                    self.recover_trailer().map_err(|_| err)?
                }
            },
            Some(_) => self.recover_trailer().map_err(|_| XrefError::Start)?,
            None => self.recover_trailer()?,
        };

        // Hybrid-reference file.
        if let Some(stream_start) = trailer.remove(b"XRefStm") {
            xref.merge_hidden(self.read_xref_stream(&stream_start)?);
        }

        // Read previous sections of incrementally updated documents.
        let mut already_seen = HashSet::new();
        let mut prev_xref_start = trailer.remove(b"Prev");
        while let Some(prev) = prev_xref_start.and_then(|offset| offset.as_i64().ok()) {
            if !already_seen.insert(prev) {
                warn!("Prev chain loops back to byte {}", prev);
                break;
            }
            if prev < 0 || prev as usize >= self.buffer.len() {
                return Err(XrefError::PrevStart.into());
            }

            let (mut prev_xref, mut prev_trailer) = self.parser.xref_and_trailer(prev as usize, self)?;
            if let Some(stream_start) = prev_trailer.remove(b"XRefStm") {
                prev_xref.merge_hidden(self.read_xref_stream(&stream_start)?);
            }
            xref.merge(prev_xref);
            prev_xref_start = prev_trailer.remove(b"Prev");
        }

        Ok((xref, trailer))
    }

    fn read_xref_stream(&self, start: &Object) -> Result<Xref> {
        let start = start.as_i64().map_err(|_| XrefError::StreamStart)?;
        if start < 0 || start as usize >= self.buffer.len() {
            return Err(XrefError::StreamStart.into());
        }
        let (xref, _) = self.parser.xref_and_trailer(start as usize, self)?;
        Ok(xref)
    }

    /// Offset named by the last `startxref` keyword in the file.
    fn get_xref_start(&self) -> Option<usize> {
        let position = rfind(self.buffer, b"startxref")?;
        self.parser.xref_start(position)
    }

    /// Fall back to the last `trailer` keyword and the `xref` table before it.
    fn recover_trailer(&self) -> Result<(Xref, Dictionary)> {
        let trailer_start = rfind(self.buffer, b"trailer").ok_or(Error::MissingTrailer)?;
        let table_start = self.buffer[..trailer_start]
            .windows(4)
            .enumerate()
            .rev()
            .find(|&(position, window)| window == b"xref" && (position == 0 || self.buffer[position - 1] != b't'))
            .map(|(position, _)| position);

        match table_start {
            Some(start) => {
                debug!("recovered cross-reference table at byte {}", start);
                self.parser.xref_and_trailer(start, self)
            }
            None => Err(Error::MissingTrailer),
        }
    }

    fn load_objects(&mut self) -> Result<()> {
        let entries: Vec<(u32, XrefEntry)> = self
            .document
            .reference_table
            .in_use()
            .map(|(number, entry)| (number, *entry))
            .collect();

        let reader = &*self;
        let entries_filter_map = |&(number, entry): &(u32, XrefEntry)| match entry {
            XrefEntry::Normal { offset, generation } => {
                let id = (number, generation);
                Some((id, reader.read_object(offset as usize, id)))
            }
            _ => None,
        };
        #[cfg(feature = "rayon")]
        let parsed: Vec<_> = entries.par_iter().filter_map(entries_filter_map).collect();
        #[cfg(not(feature = "rayon"))]
        let parsed: Vec<_> = entries.iter().filter_map(entries_filter_map).collect();

        // Results are in object order, so the first failure reported is deterministic.
        let mut objects = BTreeMap::new();
        for (id, result) in parsed {
            let object = result.map_err(|err| Error::MalformedDocument {
                object: id,
                source: Box::new(err),
            })?;
            objects.insert(id, object);
        }
        self.document.objects = objects;

        let mut containers: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
        for (number, entry) in &entries {
            if let XrefEntry::Compressed { container, .. } = *entry {
                containers.entry(container).or_default().push(*number);
            }
        }
        for (container, numbers) in containers {
            let object_stream = self.object_stream((container, 0)).map_err(|err| Error::MalformedDocument {
                object: (container, 0),
                source: Box::new(err),
            })?;
            for number in numbers {
                let id = (number, 0);
                let object = object_stream.objects.get(&id).ok_or_else(|| Error::MalformedDocument {
                    object: id,
                    source: Box::new(XrefError::MissingEntry(id).into()),
                })?;
                // Objects stored directly in the file win over compressed copies.
                self.document.objects.entry(id).or_insert_with(|| object.clone());
            }
        }

        Ok(())
    }

    fn object_stream(&self, id: ObjectId) -> Result<ObjectStream> {
        let container = self.document.objects.get(&id).ok_or(XrefError::MissingEntry(id))?;
        let stream = container.as_stream()?;
        if !stream.dict.has_type(b"ObjStm") {
            return Err(ParseError::InvalidObjectStream("container is not an object stream").into());
        }
        ObjectStream::new(stream)
    }

    fn read_object(&self, offset: usize, id: ObjectId) -> Result<Object> {
        if offset >= self.buffer.len() {
            return Err(XrefError::Entry { id, offset }.into());
        }
        let mut already_seen = HashSet::from([id]);
        let (_, object, _) = self.parser.indirect_object(offset, Some(id), self, &mut already_seen)?;
        Ok(object)
    }

    /// Read an object straight from the file, used to resolve indirect stream lengths.
    pub fn get_object(&self, id: ObjectId, already_seen: &mut HashSet<ObjectId>) -> Result<Object> {
        if !already_seen.insert(id) {
            warn!("reference cycle detected resolving object {} {}", id.0, id.1);
            return Err(Error::ReferenceCycle(id));
        }
        match self.document.reference_table.get(id.0) {
            Some(&XrefEntry::Normal { offset, generation }) if generation == id.1 => {
                if offset as usize >= self.buffer.len() {
                    return Err(XrefError::Entry { id, offset: offset as usize }.into());
                }
                let (_, object, _) = self
                    .parser
                    .indirect_object(offset as usize, Some(id), self, already_seen)?;
                Ok(object)
            }
            Some(&XrefEntry::Compressed { container, .. }) if id.1 == 0 => {
                let container = self.get_object((container, 0), already_seen)?;
                let objects = ObjectStream::new(container.as_stream()?)?.objects;
                objects.get(&id).cloned().ok_or_else(|| XrefError::MissingEntry(id).into())
            }
            _ => Err(XrefError::MissingEntry(id).into()),
        }
    }
}

fn rfind(buffer: &[u8], pattern: &[u8]) -> Option<usize> {
    buffer.windows(pattern.len()).rposition(|window| window == pattern)
}
