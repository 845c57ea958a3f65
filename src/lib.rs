#[macro_use]
mod object;
pub use object::{Dictionary, Object, ObjectId, Stream, StringFormat};

mod document;
pub use document::Document;

mod error;
pub use error::{Axis, Error, GeometryError, ParseError, Result, XrefError};

pub mod filters;
mod object_stream;
pub use object_stream::ObjectStream;

pub mod tokenizer;
pub use tokenizer::{Keyword, Token, Tokenizer};

pub mod parser;
pub use parser::ObjectParser;

pub mod xref;
pub use xref::{Xref, XrefEntry, XrefType};

mod reader;
pub use reader::Reader;

mod pages;
pub use pages::{BoxSource, PageEntry, enumerate_pages};

mod rectangle;
pub use rectangle::BoundaryBox;

mod crop;
pub use crop::{CropReport, CropSummary, Margins, crop_file, cropped_path, plan_crop};

mod writer;
pub use writer::Writer;
