use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use log::debug;

use crate::Object::*;
use crate::xref::{Xref, XrefEntry, XrefType};
use crate::{Dictionary, Document, Error, Object, Result, Stream, StringFormat};

/// Trailer entries that describe the layout of the file being replaced.
const STALE_TRAILER_KEYS: [&[u8]; 9] = [
    b"Prev",
    b"XRefStm",
    b"Type",
    b"W",
    b"Index",
    b"Filter",
    b"DecodeParms",
    b"Length",
    b"DL",
];

impl Document {
    /// Save PDF document to specified file path.
    #[inline]
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<File> {
        let mut file = BufWriter::new(File::create(path).map_err(Error::Serialization)?);
        self.save_internal(&mut file).map_err(Error::Serialization)?;
        file.into_inner().map_err(|err| Error::Serialization(err.into_error()))
    }

    /// Save PDF to arbitrary target
    #[inline]
    pub fn save_to<W: Write>(&mut self, target: &mut W) -> Result<()> {
        self.save_internal(target).map_err(Error::Serialization)
    }

    /// Serialize the document into a fresh buffer.
    pub fn serialize(&mut self) -> Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(self.source_len);
        self.save_to(&mut buffer)?;
        Ok(buffer)
    }

    fn save_internal<W: Write>(&mut self, target: &mut W) -> io::Result<()> {
        let mut target = CountingWrite {
            inner: target,
            bytes_written: 0,
        };
        self.max_id = self.objects.keys().map(|id| id.0).max().unwrap_or(0);
        let mut xref = Xref::new(self.max_id + 1, XrefType::CrossReferenceTable);
        writeln!(target, "%PDF-{}", self.version)?;
        if !self.binary_mark.is_empty() {
            target.write_all(b"%")?;
            target.write_all(&self.binary_mark)?;
            target.write_all(b"\n")?;
        }

        let mut skipped = 0;
        for (&(id, generation), object) in &self.objects {
            if object
                .type_name()
                .map(|name| [b"ObjStm".as_slice(), b"XRef", b"Linearized"].contains(&name))
                .ok()
                != Some(true)
            {
                Writer::write_indirect_object(&mut target, id, generation, object, &mut xref)?;
            } else {
                skipped += 1;
            }
        }
        debug!("wrote {} objects, dropped {} structural ones", xref.len(), skipped);

        let xref_start = target.bytes_written;
        Writer::write_xref(&mut target, &xref)?;
        self.write_trailer(&mut target)?;
        write!(target, "\nstartxref\n{}\n%%EOF\n", xref_start)?;
        target.flush()
    }

    fn write_trailer(&mut self, file: &mut dyn Write) -> io::Result<()> {
        for key in STALE_TRAILER_KEYS {
            self.trailer.remove(key);
        }
        self.trailer.set("Size", i64::from(self.max_id + 1));
        file.write_all(b"trailer\n")?;
        Writer::write_dictionary(file, &self.trailer)?;
        Ok(())
    }
}

pub struct Writer;

impl Writer {
    fn need_separator(object: &Object) -> bool {
        matches!(*object, Null | Boolean(_) | Integer(_) | Real(_) | Reference(_))
    }

    fn write_xref(file: &mut dyn Write, xref: &Xref) -> io::Result<()> {
        writeln!(file, "xref\n0 {}", xref.size)?;

        let mut write_xref_entry =
            |offset: u32, generation: u16, kind: char| writeln!(file, "{:>010} {:>05} {} ", offset, generation, kind);
        write_xref_entry(0, 65535, 'f')?;

        for id in 1..xref.size {
            match xref.get(id) {
                Some(&XrefEntry::Normal { offset, generation }) => write_xref_entry(offset, generation, 'n')?,
                _ => write_xref_entry(0, 65535, 'f')?,
            }
        }
        Ok(())
    }

    fn write_indirect_object<W: Write>(
        file: &mut CountingWrite<&mut W>, id: u32, generation: u16, object: &Object, xref: &mut Xref,
    ) -> io::Result<()> {
        let offset = u32::try_from(file.bytes_written)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "output exceeds the 10-digit xref offset range"))?;
        xref.insert(id, XrefEntry::Normal { offset, generation });
        writeln!(file, "{} {} obj", id, generation)?;
        Writer::write_object(file, object)?;
        file.write_all(b"\nendobj\n")?;
        Ok(())
    }

    pub fn write_object(file: &mut dyn Write, object: &Object) -> io::Result<()> {
        match *object {
            Null => file.write_all(b"null"),
            Boolean(ref value) => {
                if *value {
                    file.write_all(b"true")
                } else {
                    file.write_all(b"false")
                }
            }
            Integer(ref value) => {
                let mut buf = itoa::Buffer::new();
                file.write_all(buf.format(*value).as_bytes())
            }
            Real(ref value) => Writer::write_real(file, *value),
            Name(ref name) => Writer::write_name(file, name),
            String(ref text, ref format) => Writer::write_string(file, text, format),
            Array(ref array) => Writer::write_array(file, array),
            Object::Dictionary(ref dict) => Writer::write_dictionary(file, dict),
            Object::Stream(ref stream) => Writer::write_stream(file, stream),
            Reference(ref id) => write!(file, "{} {} R", id.0, id.1),
        }
    }

    /// PDF has no exponent notation; `Display` for `f64` never uses one and
    /// prints the shortest text that reads back to the same value.
    fn write_real(file: &mut dyn Write, value: f64) -> io::Result<()> {
        if !value.is_finite() || value == 0.0 {
            return file.write_all(b"0");
        }
        write!(file, "{}", value)
    }

    fn write_name(file: &mut dyn Write, name: &[u8]) -> io::Result<()> {
        file.write_all(b"/")?;
        for &byte in name {
            // white-space and delimiter chars are encoded to # sequences
            // also encode bytes outside of the range 33 (!) to 126 (~)
            if b" \t\n\r\x0C()<>[]{}/%#".contains(&byte) || !(33..=126).contains(&byte) {
                write!(file, "#{:02X}", byte)?;
            } else {
                file.write_all(&[byte])?;
            }
        }
        Ok(())
    }

    fn write_string(file: &mut dyn Write, text: &[u8], format: &StringFormat) -> io::Result<()> {
        match *format {
            // Within a Literal string, backslash (\) and unbalanced parentheses should be escaped.
            // An end-of-line marker inside a literal string reads back as \n, so \r is escaped too.
            StringFormat::Literal => {
                let mut escape_indice = Vec::new();
                let mut parentheses = Vec::new();
                for (index, &byte) in text.iter().enumerate() {
                    match byte {
                        b'(' => parentheses.push(index),
                        b')' => {
                            if parentheses.pop().is_none() {
                                escape_indice.push(index);
                            }
                        }
                        b'\\' | b'\r' => escape_indice.push(index),
                        _ => continue,
                    }
                }
                escape_indice.append(&mut parentheses);

                file.write_all(b"(")?;
                if !escape_indice.is_empty() {
                    for (index, &byte) in text.iter().enumerate() {
                        if escape_indice.contains(&index) {
                            file.write_all(b"\\")?;
                            file.write_all(&[if byte == b'\r' { b'r' } else { byte }])?;
                        } else {
                            file.write_all(&[byte])?;
                        }
                    }
                } else {
                    file.write_all(text)?;
                }
                file.write_all(b")")?;
            }
            StringFormat::Hexadecimal => {
                file.write_all(b"<")?;
                for &byte in text {
                    write!(file, "{:02X}", byte)?;
                }
                file.write_all(b">")?;
            }
        }
        Ok(())
    }

    fn write_array(file: &mut dyn Write, array: &[Object]) -> io::Result<()> {
        file.write_all(b"[")?;
        let mut first = true;
        for object in array {
            if first {
                first = false;
            } else if Writer::need_separator(object) {
                file.write_all(b" ")?;
            }
            Writer::write_object(file, object)?;
        }
        file.write_all(b"]")?;
        Ok(())
    }

    fn write_dictionary(file: &mut dyn Write, dictionary: &Dictionary) -> io::Result<()> {
        file.write_all(b"<<")?;
        for (key, value) in dictionary {
            Writer::write_name(file, key)?;
            if Writer::need_separator(value) {
                file.write_all(b" ")?;
            }
            Writer::write_object(file, value)?;
        }
        file.write_all(b">>")?;
        Ok(())
    }

    /// Payload bytes are copied as read; `Length` always describes them.
    fn write_stream(file: &mut dyn Write, stream: &Stream) -> io::Result<()> {
        let mut dict = stream.dict.clone();
        dict.set("Length", stream.content.len() as i64);
        Writer::write_dictionary(file, &dict)?;
        file.write_all(b"stream\n")?;
        file.write_all(&stream.content)?;
        file.write_all(b"\nendstream")?;
        Ok(())
    }
}

pub struct CountingWrite<W: Write> {
    inner: W,
    bytes_written: usize,
}

impl<W: Write> Write for CountingWrite<W> {
    #[inline]
    fn write(&mut self, buffer: &[u8]) -> io::Result<usize> {
        let result = self.inner.write(buffer);
        if let Ok(bytes) = result {
            self.bytes_written += bytes;
        }
        result
    }

    #[inline]
    fn write_all(&mut self, buffer: &[u8]) -> io::Result<()> {
        self.bytes_written += buffer.len();
        // On error the count is off, but the whole output is abandoned anyway.
        self.inner.write_all(buffer)
    }

    #[inline]
    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
