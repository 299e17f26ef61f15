//! Shared fixtures: in-memory PDFs and a rasterizer driven by page text
//!
//! Each page carries one text label. The fake rasterizer reads the label to
//! decide what the page "looks like":
//! - contains `color`: solid red thumbnail
//! - contains `muted`: desaturated teal (color only at low thresholds)
//! - contains `render-fail`: rendering error
//! - anything else: plain white thumbnail
//!
//! A label containing `broken` gets a dangling resource reference so that
//! copying the page fails. A file with any label containing `no-raster` is
//! refused by the rasterizer at open time.

#![allow(dead_code)]

use colorsplit_core::{PageRasterizer, PixelBuffer, RasterSource, SplitError};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

/// Build a PDF with one page per label
pub fn create_labelled_pdf(labels: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"Type1".to_vec())),
        ("BaseFont", Object::Name(b"Helvetica".to_vec())),
    ]));

    let mut page_ids = Vec::new();
    for label in labels {
        let content = format!("BT /F1 12 Tf 50 700 Td ({}) Tj ET", label);
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));

        let mut resources = Dictionary::from_iter(vec![(
            "Font",
            Object::Dictionary(Dictionary::from_iter(vec![("F1", Object::Reference(font_id))])),
        )]);
        if label.contains("broken") {
            let missing: ObjectId = (9999, 0);
            resources.set(
                "XObject",
                Object::Dictionary(Dictionary::from_iter(vec![(
                    "Im0",
                    Object::Reference(missing),
                )])),
            );
        }

        let page_id = doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            ("Contents", Object::Reference(content_id)),
            ("Resources", Object::Dictionary(resources)),
            (
                "MediaBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(612),
                    Object::Integer(792),
                ]),
            ),
        ]));
        page_ids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Count", Object::Integer(labels.len() as i64)),
            ("Kids", Object::Array(page_ids)),
        ])),
    );
    let catalog_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

/// Labels of an output document in page order; separators read as "<blank>"
pub fn page_labels(bytes: &[u8]) -> Vec<String> {
    let doc = Document::load_mem(bytes).unwrap();
    doc.get_pages()
        .values()
        .map(|&id| label_of(&doc, id).unwrap_or_else(|| "<blank>".to_string()))
        .collect()
}

fn label_of(doc: &Document, page_id: ObjectId) -> Option<String> {
    let content = doc.get_page_content(page_id).ok()?;
    let text = String::from_utf8_lossy(&content);
    let start = text.find('(')?;
    let end = text.rfind(')')?;
    Some(text[start + 1..end].to_string())
}

pub struct LabelRasterizer;

struct LabelSource {
    labels: Vec<String>,
}

impl PageRasterizer for LabelRasterizer {
    fn open<'a>(&'a self, bytes: &'a [u8]) -> Result<Box<dyn RasterSource + 'a>, SplitError> {
        let doc = Document::load_mem(bytes).map_err(|e| SplitError::Decode(e.to_string()))?;
        let labels: Vec<String> = doc
            .get_pages()
            .values()
            .map(|&id| label_of(&doc, id).unwrap_or_default())
            .collect();

        if labels.iter().any(|l| l.contains("no-raster")) {
            return Err(SplitError::Decode("renderer refused document".into()));
        }
        Ok(Box::new(LabelSource { labels }))
    }
}

impl RasterSource for LabelSource {
    fn page_count(&self) -> usize {
        self.labels.len()
    }

    fn rasterize_page(&self, index: usize, _scale: f32) -> Result<PixelBuffer, SplitError> {
        let label = self
            .labels
            .get(index)
            .ok_or_else(|| SplitError::Render(format!("no page {}", index)))?;

        if label.contains("render-fail") {
            Err(SplitError::Render("renderer crashed".into()))
        } else if label.contains("color") {
            Ok(PixelBuffer::filled(32, 40, [230, 20, 20, 255]))
        } else if label.contains("muted") {
            Ok(PixelBuffer::filled(32, 40, [80, 100, 96, 255]))
        } else {
            Ok(PixelBuffer::filled(32, 40, [255, 255, 255, 255]))
        }
    }
}
