//! Output document assembly
//!
//! Each page class owns one [`OutputAccumulator`], a growing lopdf document
//! that pages are imported into:
//! 1. Give every object of the copied page a fresh ID in the output
//!    (objects already imported from the same source keep their first ID)
//! 2. Rewrite references through that mapping; anything left unmapped
//!    (links into the source page tree) becomes null
//! 3. Hang the page under the output's single Pages node
//!
//! Nothing touches the page content streams.

use std::collections::HashMap;

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::classify::PageClass;
use crate::error::SplitError;
use crate::source::{CopiedPage, SourceDocument, SourceId};

/// Separator size when the following file gives no usable MediaBox
pub const A4_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 595.28, 841.89];

/// Ordered, append-only page sequence for one page class
pub struct OutputAccumulator {
    class: PageClass,
    document: Document,
    pages_id: ObjectId,
    kids: Vec<ObjectId>,
    imported: HashMap<(SourceId, ObjectId), ObjectId>,
    page_count: usize,
    separator_count: usize,
    pending_separator: Option<Object>,
}

impl OutputAccumulator {
    pub fn new(class: PageClass) -> Self {
        let mut document = Document::with_version("1.7");
        let pages_id = document.new_object_id();
        Self {
            class,
            document,
            pages_id,
            kids: Vec::new(),
            imported: HashMap::new(),
            page_count: 0,
            separator_count: 0,
            pending_separator: None,
        }
    }

    pub fn class(&self) -> PageClass {
        self.class
    }

    /// Number of source pages appended (separators excluded)
    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn separator_count(&self) -> usize {
        self.separator_count
    }

    pub fn is_empty(&self) -> bool {
        self.page_count == 0
    }

    /// Import a copied page at the end of the output
    pub fn append(&mut self, page: CopiedPage) {
        if let Some(media_box) = self.pending_separator.take() {
            self.append_blank(media_box);
        }

        let CopiedPage {
            source,
            page_id,
            page,
            objects,
        } = page;

        let new_page_id = self.document.new_object_id();
        let mut fresh = Vec::new();
        for (old_id, object) in objects {
            if !self.imported.contains_key(&(source, old_id)) {
                let new_id = self.document.new_object_id();
                self.imported.insert((source, old_id), new_id);
                fresh.push((new_id, object));
            }
        }

        let imported = &self.imported;
        let map = |id: ObjectId| {
            if id == page_id {
                Some(new_page_id)
            } else {
                imported.get(&(source, id)).copied()
            }
        };

        let remapped: Vec<(ObjectId, Object)> = fresh
            .into_iter()
            .map(|(id, object)| (id, remap_references(object, &map)))
            .collect();
        let mut page = remap_dictionary(page, &map);
        page.set("Parent", Object::Reference(self.pages_id));

        for (id, object) in remapped {
            self.document.objects.insert(id, object);
        }
        self.document
            .objects
            .insert(new_page_id, Object::Dictionary(page));
        self.kids.push(new_page_id);
        self.page_count += 1;
    }

    /// Append an empty page with the given MediaBox right away
    pub fn append_blank(&mut self, media_box: Object) {
        let page = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(self.pages_id)),
            ("MediaBox", media_box),
            ("Resources", Object::Dictionary(Dictionary::new())),
        ]);
        let page_id = self.document.add_object(page);
        self.kids.push(page_id);
        self.separator_count += 1;
    }

    /// Request a separator before the next appended page
    ///
    /// Ignored while the output has no pages; repeated requests collapse
    /// into one; a request never followed by a page is dropped.
    pub fn insert_separator(&mut self, media_box: Option<Object>) {
        if self.is_empty() {
            return;
        }
        self.pending_separator = Some(media_box.unwrap_or_else(default_media_box));
    }

    /// Write the complete output document
    pub fn serialize(self) -> Result<Vec<u8>, SplitError> {
        if self.is_empty() {
            return Err(SplitError::Encode(format!(
                "No {} pages to write",
                self.class
            )));
        }

        let mut document = self.document;

        let kids = self
            .kids
            .iter()
            .map(|&id| Object::Reference(id))
            .collect::<Vec<_>>();
        let pages = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Count", Object::Integer(self.kids.len() as i64)),
            ("Kids", Object::Array(kids)),
        ]);
        document
            .objects
            .insert(self.pages_id, Object::Dictionary(pages));

        let catalog_id = document.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(self.pages_id)),
        ]));
        document.trailer.set("Root", Object::Reference(catalog_id));

        document.compress();

        let mut buffer = Vec::new();
        document
            .save_to(&mut buffer)
            .map_err(|e| SplitError::Encode(format!("Save failed: {}", e)))?;

        Ok(buffer)
    }
}

fn default_media_box() -> Object {
    Object::Array(A4_MEDIA_BOX.iter().map(|&v| Object::Real(v)).collect())
}

/// Recursively rewrite indirect references; unmapped ones become null
fn remap_references<F>(obj: Object, map: &F) -> Object
where
    F: Fn(ObjectId) -> Option<ObjectId>,
{
    match obj {
        Object::Reference(id) => map(id).map(Object::Reference).unwrap_or(Object::Null),
        Object::Array(arr) => Object::Array(
            arr.into_iter()
                .map(|o| remap_references(o, map))
                .collect(),
        ),
        Object::Dictionary(dict) => Object::Dictionary(remap_dictionary(dict, map)),
        Object::Stream(mut stream) => {
            stream.dict = remap_dictionary(stream.dict, map);
            Object::Stream(stream)
        }
        other => other,
    }
}

fn remap_dictionary<F>(mut dict: Dictionary, map: &F) -> Dictionary
where
    F: Fn(ObjectId) -> Option<ObjectId>,
{
    for (_, value) in dict.iter_mut() {
        *value = remap_references(std::mem::replace(value, Object::Null), map);
    }
    dict
}

/// The pair of outputs for one run
pub struct DocumentAssembler {
    color: OutputAccumulator,
    black_and_white: OutputAccumulator,
}

impl Default for DocumentAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentAssembler {
    pub fn new() -> Self {
        Self {
            color: OutputAccumulator::new(PageClass::Color),
            black_and_white: OutputAccumulator::new(PageClass::BlackAndWhite),
        }
    }

    pub fn accumulator(&self, class: PageClass) -> &OutputAccumulator {
        match class {
            PageClass::Color => &self.color,
            PageClass::BlackAndWhite => &self.black_and_white,
        }
    }

    fn accumulator_mut(&mut self, class: PageClass) -> &mut OutputAccumulator {
        match class {
            PageClass::Color => &mut self.color,
            PageClass::BlackAndWhite => &mut self.black_and_white,
        }
    }

    /// Copy page `index` of `source` into the output for `class`
    ///
    /// On failure neither output is touched.
    pub fn append_page(
        &mut self,
        class: PageClass,
        source: &SourceDocument,
        index: usize,
    ) -> Result<(), SplitError> {
        let page = source.copy_page(index)?;
        self.accumulator_mut(class).append(page);
        Ok(())
    }

    /// Request a separator in both outputs
    pub fn insert_separator(&mut self, media_box: Option<Object>) {
        self.color.insert_separator(media_box.clone());
        self.black_and_white.insert_separator(media_box);
    }

    /// Serialize every non-empty output, color first
    pub fn finalize(self) -> Vec<(PageClass, Result<Vec<u8>, SplitError>)> {
        [self.color, self.black_and_white]
            .into_iter()
            .filter(|acc| !acc.is_empty())
            .map(|acc| (acc.class(), acc.serialize()))
            .collect()
    }
}
