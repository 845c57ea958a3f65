use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::ObjectId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The input path does not exist.
    #[error("PDF file '{}' not found", .0.display())]
    FileNotFound(PathBuf),
    /// The byte stream violates the PDF token or object grammar.
    #[error("malformed syntax: {0}")]
    MalformedSyntax(#[from] ParseError),
    /// The cross-reference data does not lead to valid object headers.
    #[error("broken cross-reference table: {0}")]
    BrokenXref(#[from] XrefError),
    /// No trailer dictionary, or a trailer without a `Root` entry.
    #[error("missing trailer or document root entry")]
    MissingTrailer,
    /// The trailer's `Root` reference does not resolve to a catalog dictionary.
    #[error("document root does not resolve to a catalog dictionary")]
    MissingRoot,
    /// A page tree node was revisited along its own ancestor path.
    #[error("page tree contains a cycle through object {0:?}")]
    CyclicPageTree(ObjectId),
    /// Requested margins do not leave a positive page area.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(GeometryError),
    /// The document uses a feature this crate does not handle.
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(&'static str),
    /// Writing the output failed.
    #[error("serialization failed: {0}")]
    Serialization(#[source] std::io::Error),
    /// Loading aborted on the first object that could not be read.
    #[error("malformed document: object {object:?}: {source}")]
    MalformedDocument {
        object: ObjectId,
        #[source]
        source: Box<Error>,
    },

    /// An Object has the wrong type, e.g. the Object is an Array where a Name would be expected.
    #[error("object has wrong type; expected type {expected} but found type {found}")]
    ObjectType {
        expected: &'static str,
        found: &'static str,
    },
    /// Dictionary key was not found.
    #[error("missing required dictionary key \"{0}\"")]
    DictKey(String),
    /// The stream couldn't be decompressed.
    #[error("couldn't decompress stream: {0}")]
    Decompress(String),
    /// The Object ID was not found.
    #[error("object {0:?} not found")]
    ObjectNotFound(ObjectId),
    /// Dereferencing object reached the limit.
    /// This might indicate a reference loop.
    #[error("reference chain is too long, possible reference cycle")]
    ReferenceLimit,
    /// Dereferencing a stream length ran into itself.
    #[error("reference cycle detected at object {0:?}")]
    ReferenceCycle(ObjectId),
    /// Page tree node that is neither a page nor a page tree node.
    #[error("invalid page tree node {node:?}: {reason}")]
    PageTree { node: ObjectId, reason: String },
    /// A margin is not a finite number.
    #[error("margin must be a finite number, got {0}")]
    InvalidMargin(f64),
    /// IO error while reading the input.
    #[error("IO error: {0}")]
    Io(std::io::Error),
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unexpected end of input at byte {offset}")]
    EndOfInput { offset: usize },
    #[error("invalid file header")]
    InvalidFileHeader,
    #[error("no valid token at byte {offset}")]
    InvalidToken { offset: usize },
    #[error("unexpected token at byte {offset}, expected {expected}")]
    UnexpectedToken { offset: usize, expected: &'static str },
    #[error("objects nested too deeply at byte {offset}")]
    TooDeep { offset: usize },
    #[error("stream at byte {offset} has invalid length {length}")]
    InvalidStreamLength { offset: usize, length: i64 },
    #[error("stream at byte {offset} is not terminated by endstream")]
    UnterminatedStream { offset: usize },
    #[error("invalid object stream: {0}")]
    InvalidObjectStream(&'static str),
}

#[derive(Debug)]
pub enum XrefError {
    /// Could not parse cross reference table.
    Parse { offset: usize },
    /// Could not find start of cross reference table.
    Start,
    /// The trailer's "Prev" field was invalid.
    PrevStart,
    /// The trailer's "XRefStm" field was invalid.
    StreamStart,
    /// The cross reference stream has invalid field widths or data.
    Stream(&'static str),
    /// An entry points at a byte offset that does not hold an object header.
    Entry { id: ObjectId, offset: usize },
    /// The object found at an offset is not the one the entry names.
    ObjectIdMismatch { expected: ObjectId, found: ObjectId },
    /// An entry names an object that has no entry of its own.
    MissingEntry(ObjectId),
}

impl fmt::Display for XrefError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            XrefError::Parse { offset } => write!(f, "could not parse xref at byte {}", offset),
            XrefError::Start => write!(f, "invalid start value"),
            XrefError::PrevStart => write!(f, "invalid start value in Prev field"),
            XrefError::StreamStart => write!(f, "invalid stream start value"),
            XrefError::Stream(reason) => write!(f, "invalid xref stream: {}", reason),
            XrefError::Entry { id, offset } => {
                write!(f, "entry {} {} points at byte {} which holds no object", id.0, id.1, offset)
            }
            XrefError::ObjectIdMismatch { expected, found } => write!(
                f,
                "expected object {} {} but found {} {}",
                expected.0, expected.1, found.0, found.1
            ),
            XrefError::MissingEntry(id) => write!(f, "no entry for object {} {}", id.0, id.1),
        }
    }
}

impl std::error::Error for XrefError {}

/// Which page dimension a margin pair was checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Width,
    Height,
}

/// Margins that consume a whole page dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryError {
    /// Zero-based index of the page in enumeration order.
    pub page_index: usize,
    pub axis: Axis,
    /// Left margin for `Width`, bottom margin for `Height`.
    pub leading: f64,
    /// Right margin for `Width`, top margin for `Height`.
    pub trailing: f64,
    /// Original page width or height.
    pub available: f64,
}

impl GeometryError {
    pub fn requested(&self) -> f64 {
        self.leading + self.trailing
    }
}

impl fmt::Display for GeometryError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (leading, trailing, dimension) = match self.axis {
            Axis::Width => ("left", "right", "width"),
            Axis::Height => ("bottom", "top", "height"),
        };
        write!(
            f,
            "page {}: {} margin ({}) + {} margin ({}) = {} exceed page {} ({})",
            self.page_index + 1,
            leading,
            self.leading,
            trailing,
            self.trailing,
            self.requested(),
            dimension,
            self.available
        )
    }
}

impl From<GeometryError> for Error {
    fn from(err: GeometryError) -> Self {
        Error::InvalidGeometry(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}
