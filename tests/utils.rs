use std::collections::BTreeMap;
use std::io::Write;

use flate2::Compression;
use flate2::write::ZlibEncoder;

/// Assembles PDF files byte by byte, keeping track of object offsets.
pub struct PdfBuilder {
    buffer: Vec<u8>,
    offsets: BTreeMap<u32, usize>,
    compressed: BTreeMap<u32, (u32, u16)>,
    last_xref: Option<usize>,
}

#[allow(dead_code)]
impl PdfBuilder {
    pub fn new(version: &str) -> PdfBuilder {
        let mut buffer = format!("%PDF-{}\n", version).into_bytes();
        buffer.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");
        PdfBuilder {
            buffer,
            offsets: BTreeMap::new(),
            compressed: BTreeMap::new(),
            last_xref: None,
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buffer.extend_from_slice(bytes);
        self
    }

    pub fn object(&mut self, id: u32, body: &str) -> &mut Self {
        self.offsets.insert(id, self.buffer.len());
        self.buffer
            .extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", id, body).as_bytes());
        self
    }

    /// Stream object with a direct `/Length`; `dict` holds the other entries.
    pub fn stream(&mut self, id: u32, dict: &str, content: &[u8]) -> &mut Self {
        self.offsets.insert(id, self.buffer.len());
        self.buffer.extend_from_slice(
            format!("{} 0 obj\n<<{}/Length {}>>\nstream\n", id, dict, content.len()).as_bytes(),
        );
        self.buffer.extend_from_slice(content);
        self.buffer.extend_from_slice(b"\nendstream\nendobj\n");
        self
    }

    /// Object stream holding `objects`.
    pub fn object_stream(&mut self, id: u32, objects: &[(u32, &str)], encoding: Encoding) -> &mut Self {
        let mut index = String::new();
        let mut bodies = String::new();
        for (position, (number, body)) in objects.iter().enumerate() {
            index.push_str(&format!("{} {} ", number, bodies.len()));
            bodies.push_str(body);
            bodies.push('\n');
            self.compressed.insert(*number, (id, position as u16));
        }
        let content = format!("{}{}", index, bodies).into_bytes();
        let (filter, content) = encoding.apply(&content, 1);
        let dict = format!("/Type/ObjStm/N {}/First {}{}", objects.len(), index.len(), filter);
        self.stream(id, &dict, &content)
    }

    /// Classic cross-reference table for the objects in `ids`, then trailer and `startxref`.
    pub fn xref_table(&mut self, ids: &[u32], trailer: &str) -> &mut Self {
        let start = self.buffer.len();
        let mut table = String::from("xref\n");
        if self.last_xref.is_none() {
            table.push_str("0 1\n0000000000 65535 f \n");
        }
        for id in ids {
            table.push_str(&format!("{} 1\n{:010} 00000 n \n", id, self.offsets[id]));
        }
        let size = self.offsets.keys().chain(self.compressed.keys()).max().map_or(1, |max| max + 1);
        let prev = self.last_xref.map(|prev| format!("/Prev {}", prev)).unwrap_or_default();
        table.push_str(&format!(
            "trailer\n<</Size {}{}{}>>\nstartxref\n{}\n%%EOF\n",
            size, prev, trailer, start
        ));
        self.buffer.extend_from_slice(table.as_bytes());
        self.last_xref = Some(start);
        self
    }

    /// Cross-reference stream object `id` covering every object written so far.
    pub fn xref_stream(&mut self, id: u32, trailer: &str, encoding: Encoding) -> &mut Self {
        let prev = self.last_xref.map(|prev| format!("/Prev {}", prev)).unwrap_or_default();
        let start = self.write_xref_stream(id, &format!("{}{}", prev, trailer), encoding);
        self.buffer
            .extend_from_slice(format!("startxref\n{}\n%%EOF\n", start).as_bytes());
        self.last_xref = Some(start);
        self
    }

    /// Cross-reference stream meant for a hybrid file's `/XRefStm`; returns its offset.
    pub fn hidden_xref_stream(&mut self, id: u32, encoding: Encoding) -> usize {
        self.write_xref_stream(id, "", encoding)
    }

    fn write_xref_stream(&mut self, id: u32, trailer: &str, encoding: Encoding) -> usize {
        const ROW: usize = 7;
        let start = self.buffer.len();
        self.offsets.insert(id, start);
        let size = self.offsets.keys().chain(self.compressed.keys()).max().map_or(1, |max| max + 1);

        let mut rows = Vec::new();
        for number in 0..size {
            let (kind, second, third) = if let Some(&offset) = self.offsets.get(&number) {
                (1_u8, offset as u32, 0_u16)
            } else if let Some(&(container, index)) = self.compressed.get(&number) {
                (2, container, index)
            } else {
                (0, 0, if number == 0 { 65535 } else { 0 })
            };
            rows.push(kind);
            rows.extend_from_slice(&second.to_be_bytes());
            rows.extend_from_slice(&third.to_be_bytes());
        }

        let (filter, content) = encoding.apply(&rows, ROW);
        let dict = format!("/Type/XRef/Size {}/W[1 4 2]{}{}", size, trailer, filter);
        self.stream(id, &dict, &content);
        start
    }

    pub fn offset_of(&self, id: u32) -> usize {
        self.offsets[&id]
    }

    pub fn finish(&self) -> Vec<u8> {
        self.buffer.clone()
    }
}

/// How a structural stream's payload is written.
#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Raw,
    Flate,
    Lzw,
    /// Flate with the PNG `Up` predictor over rows of the given width.
    FlateUp,
}

impl Encoding {
    /// Filter entries for the stream dictionary and the encoded payload.
    fn apply(self, data: &[u8], columns: usize) -> (String, Vec<u8>) {
        match self {
            Encoding::Raw => (String::new(), data.to_vec()),
            Encoding::Flate => ("/Filter/FlateDecode".to_string(), deflate(data)),
            Encoding::Lzw => ("/Filter/LZWDecode".to_string(), lzw(data)),
            Encoding::FlateUp => {
                let mut predicted = Vec::new();
                let mut previous = vec![0_u8; columns];
                for row in data.chunks(columns) {
                    predicted.push(2);
                    predicted.extend(row.iter().zip(&previous).map(|(byte, above)| byte.wrapping_sub(*above)));
                    previous = row.to_vec();
                }
                (
                    format!("/Filter/FlateDecode/DecodeParms<</Predictor 12/Columns {}>>", columns),
                    deflate(&predicted),
                )
            }
        }
    }
}

pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

pub fn lzw(data: &[u8]) -> Vec<u8> {
    weezl::encode::Encoder::with_tiff_size_switch(weezl::BitOrder::Msb, 8)
        .encode(data)
        .unwrap()
}

/// Catalog, page tree and `pages` page dictionaries, objects numbered from 1.
///
/// Each page is given as the extra dictionary entries it carries.
#[allow(dead_code)]
pub fn simple_document(tree_entries: &str, pages: &[&str]) -> Vec<u8> {
    let mut builder = PdfBuilder::new("1.5");
    let kids: Vec<String> = (0..pages.len()).map(|index| format!("{} 0 R", index + 3)).collect();
    builder
        .object(1, "<</Type/Catalog/Pages 2 0 R>>")
        .object(
            2,
            &format!(
                "<</Type/Pages/Kids[{}]/Count {}{}>>",
                kids.join(" "),
                pages.len(),
                tree_entries
            ),
        );
    for (index, entries) in pages.iter().enumerate() {
        builder.object(index as u32 + 3, &format!("<</Type/Page/Parent 2 0 R{}>>", entries));
    }
    let ids: Vec<u32> = (1..pages.len() as u32 + 3).collect();
    builder.xref_table(&ids, "/Root 1 0 R");
    builder.finish()
}
