use std::io::{self, Write};

use pdfcrop::{BoundaryBox, Document, Error, Margins, Object, ParseError, XrefEntry};

mod utils;
use utils::{Encoding, PdfBuilder};

fn compressed_document(encoding: Encoding) -> Vec<u8> {
    let mut builder = PdfBuilder::new("1.5");
    builder
        .object(1, "<</Type/Catalog/Pages 2 0 R>>")
        .object_stream(
            4,
            &[
                (2, "<</Type/Pages/Kids[3 0 R]/Count 1/MediaBox[0 0 420 595]>>"),
                (3, "<</Type/Page/Parent 2 0 R>>"),
            ],
            encoding,
        )
        .xref_stream(5, "/Root 1 0 R", encoding);
    builder.finish()
}

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn load_xref_stream_and_object_stream() {
    init_logger();
    for encoding in [Encoding::Raw, Encoding::Flate, Encoding::Lzw, Encoding::FlateUp] {
        let doc = Document::load_mem(&compressed_document(encoding)).unwrap();
        assert_eq!(doc.version, "1.5");
        assert!(matches!(
            doc.reference_table.get(3),
            Some(XrefEntry::Compressed { container: 4, index: 1 })
        ));

        let pages = doc.page_entries().unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].id, (3, 0));
        assert_eq!(pages[0].media_box, BoundaryBox::new(0.0, 0.0, 420.0, 595.0));
    }
}

#[test]
fn compressed_structure_is_flattened_on_save() {
    let mut doc = Document::load_mem(&compressed_document(Encoding::Flate)).unwrap();
    doc.crop(&Margins::new(20.0, 20.0)).unwrap();
    let bytes = doc.serialize().unwrap();

    let text = String::from_utf8_lossy(&bytes);
    assert!(!text.contains("/ObjStm"));
    assert!(!text.contains("/XRef"));
    assert!(text.contains("\nxref\n"));

    let saved = Document::load_mem(&bytes).unwrap();
    assert!(!saved.trailer.has(b"W"));
    assert!(!saved.trailer.has(b"Prev"));
    assert_eq!(
        saved.page_entries().unwrap()[0].media_box,
        BoundaryBox::new(20.0, 20.0, 400.0, 575.0)
    );
}

#[test]
fn hybrid_file_reads_hidden_xref_stream() {
    init_logger();
    let mut builder = PdfBuilder::new("1.5");
    builder
        .object(1, "<</Type/Catalog/Pages 2 0 R>>")
        .object(2, "<</Type/Pages/Kids[3 0 R]/Count 1>>")
        .object_stream(4, &[(3, "<</Type/Page/Parent 2 0 R/MediaBox[0 0 200 100]>>")], Encoding::Flate);
    let hidden = builder.hidden_xref_stream(5, Encoding::FlateUp);
    builder.xref_table(&[1, 2, 4], &format!("/Root 1 0 R/XRefStm {}", hidden));

    let doc = Document::load_mem(&builder.finish()).unwrap();
    assert!(!doc.trailer.has(b"XRefStm"));
    assert!(matches!(
        doc.reference_table.get(3),
        Some(XrefEntry::Compressed { container: 4, index: 0 })
    ));
    assert_eq!(doc.page_entries().unwrap()[0].media_box, BoundaryBox::new(0.0, 0.0, 200.0, 100.0));
}

#[test]
fn prev_pointing_at_itself_is_ignored() {
    init_logger();
    let mut builder = PdfBuilder::new("1.4");
    builder
        .object(1, "<</Type/Catalog/Pages 2 0 R>>")
        .object(2, "<</Type/Pages/Kids[3 0 R]/Count 1>>")
        .object(3, "<</Type/Page/Parent 2 0 R/MediaBox[0 0 612 792]>>");
    let start = builder.len();
    builder.xref_table(&[1, 2, 3], &format!("/Root 1 0 R/Prev {}", start));

    let doc = Document::load_mem(&builder.finish()).unwrap();
    assert!(!doc.trailer.has(b"Prev"));
    assert_eq!(doc.page_entries().unwrap().len(), 1);
}

#[test]
fn negative_predictor_columns_fail_cleanly() {
    let mut builder = PdfBuilder::new("1.5");
    builder
        .object(1, "<</Type/Catalog/Pages 2 0 R>>")
        .object(2, "<</Type/Pages/Kids[]/Count 0>>")
        .stream(
            3,
            "/Type/XRef/Size 4/W[1 4 2]/Root 1 0 R/Filter/FlateDecode/DecodeParms<</Predictor 12/Columns -1>>",
            &utils::deflate(&[2, 1, 0, 0, 0, 9, 0, 0]),
        );
    let start = builder.offset_of(3);
    builder.raw(format!("startxref\n{}\n%%EOF\n", start).as_bytes());

    assert!(Document::load_mem(&builder.finish()).is_err());
}

#[test]
fn incremental_update_replaces_page() {
    let mut builder = PdfBuilder::new("1.4");
    builder
        .object(1, "<</Type/Catalog/Pages 2 0 R>>")
        .object(2, "<</Type/Pages/Kids[3 0 R]/Count 1>>")
        .object(3, "<</Type/Page/Parent 2 0 R/MediaBox[0 0 612 792]>>")
        .xref_table(&[1, 2, 3], "/Root 1 0 R")
        .object(3, "<</Type/Page/Parent 2 0 R/MediaBox[0 0 300 300]>>")
        .xref_table(&[3], "/Root 1 0 R");

    let doc = Document::load_mem(&builder.finish()).unwrap();
    assert!(!doc.trailer.has(b"Prev"));
    assert_eq!(doc.page_entries().unwrap()[0].media_box, BoundaryBox::new(0.0, 0.0, 300.0, 300.0));
}

#[test]
fn stream_lengths() {
    init_logger();
    let mut builder = PdfBuilder::new("1.4");
    builder
        .object(1, "<</Type/Catalog/Pages 2 0 R>>")
        .object(2, "<</Type/Pages/Kids[3 0 R]/Count 1>>")
        .object(3, "<</Type/Page/Parent 2 0 R/Contents[4 0 R 6 0 R]>>")
        .object(4, "<</Length 5 0 R>>\nstream\nq Q\nendstream")
        .object(5, "3")
        .object(6, "<<>>\nstream\nBT ET\nendstream")
        .xref_table(&[1, 2, 3, 4, 5, 6], "/Root 1 0 R");

    let doc = Document::load_mem(&builder.finish()).unwrap();
    let indirect = doc.get_object((4, 0)).unwrap().as_stream().unwrap();
    assert_eq!(indirect.content, b"q Q");
    let scanned = doc.get_object((6, 0)).unwrap().as_stream().unwrap();
    assert_eq!(scanned.content, b"BT ET");
    assert_eq!(scanned.dict.get(b"Length").unwrap(), &Object::Integer(5));
}

#[test]
fn wrong_stream_lengths_are_rescanned() {
    init_logger();
    let mut builder = PdfBuilder::new("1.4");
    builder
        .object(1, "<</Type/Catalog/Pages 2 0 R>>")
        .object(2, "<</Type/Pages/Kids[3 0 R]/Count 1>>")
        .object(3, "<</Type/Page/Parent 2 0 R/Contents[4 0 R 5 0 R]>>")
        .object(4, "<</Length 100>>\nstream\nq Q\nendstream")
        .object(5, "<</Length -3>>\nstream\nBT ET\nendstream")
        .xref_table(&[1, 2, 3, 4, 5], "/Root 1 0 R");

    let doc = Document::load_mem(&builder.finish()).unwrap();
    let too_long = doc.get_object((4, 0)).unwrap().as_stream().unwrap();
    assert_eq!(too_long.content, b"q Q");
    assert_eq!(too_long.dict.get(b"Length").unwrap(), &Object::Integer(3));
    let negative = doc.get_object((5, 0)).unwrap().as_stream().unwrap();
    assert_eq!(negative.content, b"BT ET");
    assert_eq!(negative.dict.get(b"Length").unwrap(), &Object::Integer(5));
}

struct BrokenSink;

impl Write for BrokenSink {
    fn write(&mut self, _: &[u8]) -> io::Result<usize> {
        Err(io::Error::other("disk full"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn write_failure_is_a_serialization_error() {
    let mut doc = Document::load_mem(&compressed_document(Encoding::Raw)).unwrap();
    assert!(matches!(doc.save_to(&mut BrokenSink), Err(Error::Serialization(_))));
}

#[test]
fn cyclic_page_tree_is_reported() {
    let mut builder = PdfBuilder::new("1.4");
    builder
        .object(1, "<</Type/Catalog/Pages 2 0 R>>")
        .object(2, "<</Type/Pages/Kids[3 0 R]/Count 1>>")
        .object(3, "<</Type/Pages/Parent 2 0 R/Kids[2 0 R]>>")
        .xref_table(&[1, 2, 3], "/Root 1 0 R");

    let mut doc = Document::load_mem(&builder.finish()).unwrap();
    assert!(matches!(doc.page_entries(), Err(Error::CyclicPageTree((2, 0)))));
    assert!(matches!(doc.crop(&Margins::new(1.0, 1.0)), Err(Error::CyclicPageTree(_))));
}

#[test]
fn not_a_pdf() {
    let err = Document::load_mem(b"GIF89a not a document").unwrap_err();
    assert!(matches!(err, Error::MalformedSyntax(ParseError::InvalidFileHeader)));
}

#[test]
fn missing_catalog() {
    let mut builder = PdfBuilder::new("1.4");
    builder
        .object(1, "<</Type/Pages/Kids[]/Count 0>>")
        .xref_table(&[1], "/Root 9 0 R");
    assert!(matches!(Document::load_mem(&builder.finish()), Err(Error::MissingRoot)));
}
