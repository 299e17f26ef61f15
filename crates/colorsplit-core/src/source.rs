//! Input files and the page sources opened from them
//!
//! A [`SourceDocument`] hands out pages as self-contained [`CopiedPage`]
//! tokens: the page dictionary plus every object it reaches, with inherited
//! attributes made explicit and the page tree cut away. Link annotations
//! that jump to a page of the source document are dropped, since their
//! target is not part of the copy.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::error::SplitError;

/// Attributes a page may inherit from its ancestors in the page tree
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guard against cyclic Parent chains
const MAX_TREE_DEPTH: usize = 64;

static NEXT_SOURCE_ID: AtomicUsize = AtomicUsize::new(0);

/// Something the pipeline can read PDF bytes from
pub trait InputFile {
    /// Name used in progress events and diagnostics
    fn name(&self) -> String;

    fn read_bytes(&self) -> std::io::Result<Vec<u8>>;
}

impl InputFile for Path {
    fn name(&self) -> String {
        self.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.display().to_string())
    }

    fn read_bytes(&self) -> std::io::Result<Vec<u8>> {
        std::fs::read(self)
    }
}

impl InputFile for PathBuf {
    fn name(&self) -> String {
        self.as_path().name()
    }

    fn read_bytes(&self) -> std::io::Result<Vec<u8>> {
        std::fs::read(self)
    }
}

/// An input already held in memory
#[derive(Debug, Clone)]
pub struct MemoryFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl MemoryFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

impl InputFile for MemoryFile {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn read_bytes(&self) -> std::io::Result<Vec<u8>> {
        Ok(self.bytes.clone())
    }
}

/// Identifies the document a [`CopiedPage`] came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(usize);

/// A loaded input PDF
pub struct SourceDocument {
    id: SourceId,
    name: String,
    document: Document,
    page_ids: Vec<ObjectId>,
}

/// A page detached from its source, ready to be imported into an output
#[derive(Debug, Clone)]
pub struct CopiedPage {
    pub(crate) source: SourceId,
    pub(crate) page_id: ObjectId,
    pub(crate) page: Dictionary,
    pub(crate) objects: BTreeMap<ObjectId, Object>,
}

impl SourceDocument {
    pub fn load(name: impl Into<String>, bytes: &[u8]) -> Result<Self, SplitError> {
        let document = Document::load_mem(bytes).map_err(|e| SplitError::Decode(e.to_string()))?;

        if document.trailer.get(b"Encrypt").is_ok() {
            return Err(SplitError::Decode("Encrypted PDFs are not supported".into()));
        }

        // get_pages is keyed by 1-based page number, so values come out in page order
        let page_ids = document.get_pages().into_values().collect();

        Ok(Self {
            id: SourceId(NEXT_SOURCE_ID.fetch_add(1, Ordering::Relaxed)),
            name: name.into(),
            document,
            page_ids,
        })
    }

    pub fn id(&self) -> SourceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    /// MediaBox of page `index` (0-based), resolving inheritance and indirection
    pub fn media_box(&self, index: usize) -> Option<Object> {
        let page_id = *self.page_ids.get(index)?;
        let page = self.document.get_dictionary(page_id).ok()?;
        let media_box = match page.get(b"MediaBox") {
            Ok(value) => value.clone(),
            Err(_) => self.inherited_attribute(page_id, b"MediaBox")?,
        };
        let media_box = match media_box {
            Object::Reference(id) => self.document.get_object(id).ok()?.clone(),
            direct => direct,
        };
        match media_box.as_array() {
            Ok(values) if values.len() == 4 => Some(media_box),
            _ => None,
        }
    }

    /// Detach page `index` (0-based) together with everything it references
    pub fn copy_page(&self, index: usize) -> Result<CopiedPage, SplitError> {
        let page_id = *self.page_ids.get(index).ok_or_else(|| {
            SplitError::Transcribe(format!(
                "Page {} does not exist (document has {} pages)",
                index + 1,
                self.page_ids.len()
            ))
        })?;

        let mut page = self
            .document
            .get_dictionary(page_id)
            .map_err(|e| SplitError::Transcribe(format!("Page {}: {}", index + 1, e)))?
            .clone();

        for key in INHERITABLE {
            if !page.has(key) {
                if let Some(value) = self.inherited_attribute(page_id, key) {
                    page.set(key.to_vec(), value);
                }
            }
        }
        page.remove(b"Parent");
        self.drop_internal_links(&mut page);

        let mut pending = Vec::new();
        for (_, value) in page.iter() {
            collect_references(value, &mut pending);
        }

        let mut objects = BTreeMap::new();
        while let Some(id) = pending.pop() {
            if id == page_id || objects.contains_key(&id) {
                continue;
            }
            let object = self.document.get_object(id).map_err(|e| {
                SplitError::Transcribe(format!(
                    "Page {} references object {} {} R: {}",
                    index + 1,
                    id.0,
                    id.1,
                    e
                ))
            })?;
            // Links to other pages or the tree itself would drag in the whole document
            if is_page_tree_node(object) {
                continue;
            }
            collect_references(object, &mut pending);
            objects.insert(id, object.clone());
        }

        Ok(CopiedPage {
            source: self.id,
            page_id,
            page,
            objects,
        })
    }

    fn drop_internal_links(&self, page: &mut Dictionary) {
        let annotations = match page.get(b"Annots").ok().and_then(|a| self.resolve(a)) {
            Some(Object::Array(items)) => items.clone(),
            _ => return,
        };

        let before = annotations.len();
        let kept: Vec<Object> = annotations
            .into_iter()
            .filter(|annotation| !self.is_internal_link(annotation))
            .collect();
        if kept.len() == before {
            return;
        }

        if kept.is_empty() {
            page.remove(b"Annots");
        } else {
            page.set("Annots", Object::Array(kept));
        }
    }

    /// A Link annotation whose destination (direct or through a GoTo action)
    /// names a page object
    fn is_internal_link(&self, annotation: &Object) -> bool {
        let dict = match self.resolve(annotation) {
            Some(Object::Dictionary(dict)) => dict,
            _ => return false,
        };
        if !matches!(dict.get(b"Subtype").and_then(Object::as_name), Ok(b"Link")) {
            return false;
        }

        let destination = match dict.get(b"Dest") {
            Ok(dest) => Some(dest),
            Err(_) => match dict.get(b"A").ok().and_then(|a| self.resolve(a)) {
                Some(Object::Dictionary(action))
                    if matches!(action.get(b"S").and_then(Object::as_name), Ok(b"GoTo")) =>
                {
                    action.get(b"D").ok()
                }
                _ => None,
            },
        };

        match destination.and_then(|d| self.resolve(d)) {
            Some(Object::Array(items)) => match items.first() {
                Some(Object::Reference(target)) => self
                    .document
                    .get_object(*target)
                    .map(is_page_tree_node)
                    .unwrap_or(false),
                _ => false,
            },
            _ => false,
        }
    }

    /// Follow one level of indirection
    fn resolve<'a>(&'a self, object: &'a Object) -> Option<&'a Object> {
        match object {
            Object::Reference(id) => self.document.get_object(*id).ok(),
            direct => Some(direct),
        }
    }

    fn inherited_attribute(&self, page_id: ObjectId, key: &[u8]) -> Option<Object> {
        let mut current = parent_of(self.document.get_dictionary(page_id).ok()?);

        for _ in 0..MAX_TREE_DEPTH {
            let node = self.document.get_dictionary(current?).ok()?;
            if let Ok(value) = node.get(key) {
                return Some(value.clone());
            }
            current = parent_of(node);
        }

        None
    }
}

fn parent_of(node: &Dictionary) -> Option<ObjectId> {
    node.get(b"Parent").and_then(Object::as_reference).ok()
}

fn is_page_tree_node(object: &Object) -> bool {
    let dict = match object {
        Object::Dictionary(dict) => dict,
        _ => return false,
    };
    matches!(
        dict.get(b"Type").and_then(Object::as_name),
        Ok(b"Page") | Ok(b"Pages")
    )
}

/// Push every indirect reference found in `object` onto `out`
fn collect_references(object: &Object, out: &mut Vec<ObjectId>) {
    match object {
        Object::Reference(id) => out.push(*id),
        Object::Array(items) => {
            for item in items {
                collect_references(item, out);
            }
        }
        Object::Dictionary(dict) => {
            for (_, value) in dict.iter() {
                collect_references(value, out);
            }
        }
        Object::Stream(stream) => {
            for (_, value) in stream.dict.iter() {
                collect_references(value, out);
            }
        }
        _ => {}
    }
}
