use std::collections::HashSet;

use log::{debug, warn};

use crate::rectangle::BoundaryBox;
use crate::{Dictionary, Document, Error, Object, ObjectId, Result};

/// Where a page's effective media box came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BoxSource {
    /// The page dictionary has its own `MediaBox`.
    Own,
    /// Inherited from the page tree node with this id.
    Inherited(ObjectId),
    /// No node on the path sets one; US Letter is assumed.
    Default,
}

/// A leaf of the page tree with its inherited attributes resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct PageEntry {
    pub id: ObjectId,
    pub media_box: BoundaryBox,
    pub box_source: BoxSource,
    /// Effective `Resources` entry, as written in the tree.
    pub resources: Option<Object>,
}

impl PageEntry {
    pub fn is_inherited(&self) -> bool {
        self.box_source != BoxSource::Own
    }
}

#[derive(Clone, Default)]
struct Inherited {
    media_box: Option<(BoundaryBox, ObjectId)>,
    resources: Option<Object>,
}

enum NodeKind {
    Pages,
    Page,
}

fn node_kind(id: ObjectId, node: &Dictionary) -> Result<NodeKind> {
    match node.get(b"Type").and_then(Object::as_name) {
        Ok(b"Pages") => Ok(NodeKind::Pages),
        Ok(b"Page") => Ok(NodeKind::Page),
        Ok(other) => Err(Error::PageTree {
            node: id,
            reason: format!("unexpected node type /{}", String::from_utf8_lossy(other)),
        }),
        // Some writers omit Type; intermediate nodes still carry Kids.
        Err(_) if node.has(b"Kids") => Ok(NodeKind::Pages),
        Err(_) => Ok(NodeKind::Page),
    }
}

struct Frame {
    id: ObjectId,
    kids: Vec<ObjectId>,
    next: usize,
    inherited: Inherited,
}

struct PageWalker<'a> {
    document: &'a Document,
    /// Nodes on the path from the root to the node being visited.
    path: HashSet<ObjectId>,
    pages: Vec<PageEntry>,
}

impl PageWalker<'_> {
    /// Visit one node, returning a frame when it has kids to descend into.
    fn enter(&mut self, id: ObjectId, parent: &Inherited) -> Result<Option<Frame>> {
        if !self.path.insert(id) {
            return Err(Error::CyclicPageTree(id));
        }
        let node = match self.document.resolve(id) {
            Object::Dictionary(dict) => dict,
            Object::Null => {
                return Err(Error::PageTree {
                    node: id,
                    reason: "reference to a missing object".to_string(),
                });
            }
            other => {
                return Err(Error::PageTree {
                    node: id,
                    reason: format!("expected a dictionary, found {}", other.enum_variant()),
                });
            }
        };

        let mut inherited = parent.clone();
        if let Ok(media_box) = node.get(b"MediaBox") {
            let media_box = BoundaryBox::from_object(media_box, self.document).map_err(|err| Error::PageTree {
                node: id,
                reason: format!("invalid MediaBox: {}", err),
            })?;
            inherited.media_box = Some((media_box, id));
        }
        if let Ok(resources) = node.get(b"Resources") {
            inherited.resources = Some(resources.clone());
        }

        match node_kind(id, node)? {
            NodeKind::Page => {
                let (media_box, box_source) = match inherited.media_box {
                    Some((media_box, source)) if source == id => (media_box, BoxSource::Own),
                    Some((media_box, source)) => (media_box, BoxSource::Inherited(source)),
                    None => (BoundaryBox::US_LETTER, BoxSource::Default),
                };
                debug!("page {} at {} {} R with MediaBox {}", self.pages.len() + 1, id.0, id.1, media_box);
                self.pages.push(PageEntry {
                    id,
                    media_box,
                    box_source,
                    resources: inherited.resources,
                });
                self.path.remove(&id);
                Ok(None)
            }
            NodeKind::Pages => {
                let kids = match node.get(b"Kids") {
                    Ok(kids) => self.document.resolve_object(kids).as_array().map_err(|_| Error::PageTree {
                        node: id,
                        reason: "Kids is not an array".to_string(),
                    })?,
                    Err(_) => {
                        warn!("page tree node {} {} R has no Kids", id.0, id.1);
                        return Ok(Some(Frame {
                            id,
                            kids: vec![],
                            next: 0,
                            inherited,
                        }));
                    }
                };
                let kids = kids
                    .iter()
                    .filter_map(|kid| match kid {
                        Object::Reference(kid) => Some(*kid),
                        other => {
                            warn!("skipping direct object {:?} in Kids of {} {} R", other, id.0, id.1);
                            None
                        }
                    })
                    .collect();
                Ok(Some(Frame {
                    id,
                    kids,
                    next: 0,
                    inherited,
                }))
            }
        }
    }
}

/// Collect the leaf pages of `document` in reading order.
///
/// Every page is reported with the `MediaBox` and `Resources` it inherits
/// from its ancestors. A node that appears among its own ancestors is
/// reported as [`Error::CyclicPageTree`].
pub fn enumerate_pages(document: &Document) -> Result<Vec<PageEntry>> {
    let catalog = document.catalog()?;
    let root_id = document.root_id()?;
    let pages_id = catalog
        .get(b"Pages")
        .and_then(Object::as_reference)
        .map_err(|_| Error::PageTree {
            node: root_id,
            reason: "catalog has no Pages reference".to_string(),
        })?;

    let mut walker = PageWalker {
        document,
        path: HashSet::new(),
        pages: Vec::new(),
    };
    let mut stack = Vec::new();
    if let Some(frame) = walker.enter(pages_id, &Inherited::default())? {
        stack.push(frame);
    }
    while let Some(frame) = stack.last_mut() {
        if frame.next < frame.kids.len() {
            let kid = frame.kids[frame.next];
            frame.next += 1;
            let inherited = frame.inherited.clone();
            if let Some(child) = walker.enter(kid, &inherited)? {
                stack.push(child);
            }
        } else {
            walker.path.remove(&frame.id);
            stack.pop();
        }
    }
    Ok(walker.pages)
}

impl Document {
    /// Leaf pages in reading order, see [`enumerate_pages`].
    pub fn page_entries(&self) -> Result<Vec<PageEntry>> {
        enumerate_pages(self)
    }
}
