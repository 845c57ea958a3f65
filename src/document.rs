use std::collections::BTreeMap;

use log::warn;

use crate::xref::{Xref, XrefType};
use crate::{Dictionary, Error, Object, ObjectId, Result};

/// Longest chain of references-to-references followed before giving up.
const MAX_REFERENCE_DEPTH: usize = 128;

static NULL: Object = Object::Null;

/// PDF document
#[derive(Debug, Clone)]
pub struct Document {
    /// The version of the PDF specification to which the file conforms.
    pub version: String,

    /// The comment line following the header, made of bytes above 127.
    pub binary_mark: Vec<u8>,

    /// The trailer gives the location of the cross-reference table and of certain special objects.
    pub trailer: Dictionary,

    /// The cross-reference table contains locations of the indirect objects.
    pub reference_table: Xref,

    /// The objects that make up the document contained in the file.
    pub objects: BTreeMap<ObjectId, Object>,

    /// Current maximum object id within the document.
    pub max_id: u32,

    /// Length in bytes of the file the document was read from, 0 for new documents.
    pub source_len: usize,
}

impl Document {
    /// Create new PDF document.
    pub fn new() -> Document {
        Document {
            version: "1.4".to_string(),
            binary_mark: vec![0xBB, 0xAD, 0xC0, 0xDE],
            trailer: Dictionary::new(),
            reference_table: Xref::new(0, XrefType::CrossReferenceTable),
            objects: BTreeMap::new(),
            max_id: 0,
            source_len: 0,
        }
    }

    pub fn with_version<S: Into<String>>(version: S) -> Document {
        let mut document = Self::new();
        document.version = version.into();
        document
    }

    /// Create an object ID.
    pub fn new_object_id(&mut self) -> ObjectId {
        self.max_id += 1;
        (self.max_id, 0)
    }

    /// Add PDF object into document's object list.
    pub fn add_object<T: Into<Object>>(&mut self, object: T) -> ObjectId {
        let id = self.new_object_id();
        self.objects.insert(id, object.into());
        id
    }

    /// Get object by object id, will iteratively dereference a referenced object.
    pub fn get_object(&self, id: ObjectId) -> Result<&Object> {
        let object = self.objects.get(&id).ok_or(Error::ObjectNotFound(id))?;
        self.dereference(object).map(|(_, object)| object)
    }

    /// Get mutable reference to object by object id, will iteratively dereference a referenced object.
    pub fn get_object_mut(&mut self, id: ObjectId) -> Result<&mut Object> {
        let mut id = id;
        for _ in 0..MAX_REFERENCE_DEPTH {
            match self.objects.get(&id) {
                Some(Object::Reference(next)) => id = *next,
                Some(_) => return self.objects.get_mut(&id).ok_or(Error::ObjectNotFound(id)),
                None => return Err(Error::ObjectNotFound(id)),
            }
        }
        Err(Error::ReferenceLimit)
    }

    /// Follow references starting at `object`, returning the last id reached
    /// and the first object that is not a reference.
    pub fn dereference<'a>(&'a self, mut object: &'a Object) -> Result<(Option<ObjectId>, &'a Object)> {
        let mut id = None;
        for _ in 0..MAX_REFERENCE_DEPTH {
            match *object {
                Object::Reference(ref_id) => {
                    id = Some(ref_id);
                    object = self.objects.get(&ref_id).ok_or(Error::ObjectNotFound(ref_id))?;
                }
                _ => return Ok((id, object)),
            }
        }
        Err(Error::ReferenceLimit)
    }

    /// Resolve a reference to the object it names.
    ///
    /// Dangling references resolve to the null object, as PDF readers treat them.
    pub fn resolve(&self, id: ObjectId) -> &Object {
        self.objects.get(&id).map_or(&NULL, |object| self.resolve_object(object))
    }

    /// Same as [`resolve`](Self::resolve) for an object that may or may not be a reference.
    pub fn resolve_object<'a>(&'a self, object: &'a Object) -> &'a Object {
        match self.dereference(object) {
            Ok((_, object)) => object,
            Err(Error::ReferenceLimit) => {
                warn!("reference chain starting at {:?} is too long", object);
                &NULL
            }
            Err(_) => &NULL,
        }
    }

    pub fn root_id(&self) -> Result<ObjectId> {
        self.trailer
            .get(b"Root")
            .and_then(Object::as_reference)
            .map_err(|_| Error::MissingTrailer)
    }

    /// Get the document's catalog.
    pub fn catalog(&self) -> Result<&Dictionary> {
        let root = self.root_id()?;
        self.resolve(root).as_dict().map_err(|_| Error::MissingRoot)
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}
