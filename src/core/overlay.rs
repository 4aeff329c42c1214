//! Draws an [`OverlayPlan`] onto the first page of a PDF template.
//!
//! The template's own content is bracketed in `q`/`Q` and the overlay is
//! appended as a separate content stream, so neither can disturb the other's
//! graphics state.

use crate::core::layout::{MarkStyle, OverlayPlan, SignatureSpec};
use crate::utils::error::{PermitError, Result};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::path::{Path, PathBuf};

pub const POINTS_PER_INCH: f32 = 72.0;

const FONT_TEXT: &str = "PdHelv";
const FONT_CHECK: &str = "PdZapf";
const IMAGE_SIGNATURE: &str = "PdSig";
/// ZapfDingbats code for a check mark.
const CHECK_GLYPH: &[u8] = b"4";
/// Parent chains longer than this are treated as broken.
const MAX_TREE_DEPTH: usize = 32;

/// A page's MediaBox.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub x0: f32,
    pub y0: f32,
    pub width: f32,
    pub height: f32,
}

/// US Letter, used when a template's MediaBox cannot be read.
pub const LETTER: PageBox = PageBox {
    x0: 0.0,
    y0: 0.0,
    width: 612.0,
    height: 792.0,
};

impl PageBox {
    fn from_object(doc: &Document, object: &Object) -> Option<Self> {
        let values = match resolve(doc, object) {
            Object::Array(items) => items
                .iter()
                .map(|item| number(resolve(doc, item)))
                .collect::<Option<Vec<f32>>>()?,
            _ => return None,
        };
        let [llx, lly, urx, ury] = values.as_slice() else {
            return None;
        };
        let page = PageBox {
            x0: llx.min(*urx),
            y0: lly.min(*ury),
            width: (urx - llx).abs(),
            height: (ury - lly).abs(),
        };
        (page.width > 0.0 && page.height > 0.0).then_some(page)
    }

    /// Inches from the top-left corner to PDF points.
    pub fn to_points(&self, x_in: f32, y_in: f32) -> (f32, f32) {
        (
            self.x0 + x_in * POINTS_PER_INCH,
            self.y0 + self.height - y_in * POINTS_PER_INCH,
        )
    }
}

fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

fn real(value: f32) -> Object {
    Object::Real(value.into())
}

fn resolve<'a>(doc: &'a Document, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(object),
        _ => object,
    }
}

fn resolve_dict(doc: &Document, object: &Object) -> Dictionary {
    match resolve(doc, object) {
        Object::Dictionary(dict) => dict.clone(),
        _ => Dictionary::new(),
    }
}

/// Looks `key` up on the page, then on its ancestors.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = node.get(key) {
            return Some(value);
        }
        let parent = node.get(b"Parent").and_then(Object::as_reference).ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

pub fn page_box(doc: &Document, page_id: ObjectId) -> PageBox {
    inherited(doc, page_id, b"MediaBox")
        .and_then(|media_box| PageBox::from_object(doc, media_box))
        .unwrap_or_else(|| {
            tracing::warn!("Template has no usable MediaBox, assuming US Letter");
            LETTER
        })
}

/// Latin-1 bytes for Helvetica; anything else becomes `?`.
pub fn encode_text(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

fn text_operations(font: &str, size: f32, x: f32, y: f32, bytes: Vec<u8>) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![Object::Name(font.as_bytes().to_vec()), real(size)]),
        Operation::new("Td", vec![real(x), real(y)]),
        Operation::new("Tj", vec![Object::String(bytes, StringFormat::Literal)]),
        Operation::new("ET", vec![]),
    ]
}

fn embed_image(doc: &mut Document, path: &Path) -> Result<ObjectId> {
    let rgba = image::open(path)?.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgb = Vec::with_capacity(rgba.len() / 4 * 3);
    let mut alpha = Vec::with_capacity(rgba.len() / 4);
    for pixel in rgba.pixels() {
        let [r, g, b, a] = pixel.0;
        rgb.extend_from_slice(&[r, g, b]);
        alpha.push(a);
    }

    let mut mask = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(width),
            "Height" => i64::from(height),
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
        },
        alpha,
    );
    if let Err(e) = mask.compress() {
        tracing::debug!("Leaving signature mask uncompressed: {}", e);
    }
    let mask_id = doc.add_object(mask);

    let mut image = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(width),
            "Height" => i64::from(height),
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "SMask" => mask_id,
        },
        rgb,
    );
    if let Err(e) = image.compress() {
        tracing::debug!("Leaving signature image uncompressed: {}", e);
    }
    Ok(doc.add_object(image))
}

/// Copies the page's effective resources onto the page itself and adds the
/// given entries, leaving shared resource dictionaries untouched.
fn install_resources(
    doc: &mut Document,
    page_id: ObjectId,
    entries: &[(&str, &str, ObjectId)],
) -> Result<()> {
    let mut resources = inherited(doc, page_id, b"Resources")
        .map(|object| resolve_dict(doc, object))
        .unwrap_or_else(Dictionary::new);

    for (category, name, id) in entries {
        let mut group = resources
            .get(category.as_bytes())
            .map(|object| resolve_dict(doc, object))
            .unwrap_or_else(|_| Dictionary::new());
        group.set(name.as_bytes().to_vec(), Object::Reference(*id));
        resources.set(category.as_bytes().to_vec(), Object::Dictionary(group));
    }

    doc.get_object_mut(page_id)?
        .as_dict_mut()?
        .set("Resources", Object::Dictionary(resources));
    Ok(())
}

fn existing_contents(doc: &Document, page_id: ObjectId) -> Result<Vec<Object>> {
    let contents = match doc.get_dictionary(page_id)?.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    };
    Ok(contents)
}

pub struct OverlayRenderer {
    image_dir: PathBuf,
}

impl OverlayRenderer {
    /// Signature images are looked up relative to `image_dir`.
    pub fn new(image_dir: impl Into<PathBuf>) -> Self {
        Self {
            image_dir: image_dir.into(),
        }
    }

    fn signature(&self, doc: &mut Document, spec: &SignatureSpec) -> Option<ObjectId> {
        let path = self.image_dir.join(&spec.image);
        match embed_image(doc, &path) {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!("Could not add signature image {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Returns the filled PDF.
    pub fn render(&self, template: &[u8], plan: &OverlayPlan, flatten: bool) -> Result<Vec<u8>> {
        let mut doc = Document::load_mem(template)?;
        let page_id = doc
            .get_pages()
            .values()
            .next()
            .copied()
            .ok_or_else(|| PermitError::render("Template has no pages"))?;
        let page = page_box(&doc, page_id);
        tracing::debug!("Template page box {:?}", page);

        let mut resources = Vec::new();
        let mut ops = vec![
            Operation::new("Q", vec![]),
            Operation::new("q", vec![]),
            Operation::new("g", vec![real(0.0)]),
        ];

        if !plan.texts.is_empty() {
            let font_id = doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => "Helvetica",
                "Encoding" => "WinAnsiEncoding",
            });
            resources.push(("Font", FONT_TEXT, font_id));

            for text in &plan.texts {
                let (x, y) = page.to_points(text.x, text.y);
                ops.extend(text_operations(
                    FONT_TEXT,
                    text.font_size,
                    x,
                    y,
                    encode_text(&text.text),
                ));
            }
        }

        if plan.marks.iter().any(|m| m.style == MarkStyle::Check) {
            let font_id = doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => "ZapfDingbats",
            });
            resources.push(("Font", FONT_CHECK, font_id));
        }

        for mark in &plan.marks {
            let (x, y) = page.to_points(mark.x, mark.y);
            ops.push(Operation::new("q", vec![]));
            ops.push(Operation::new("g", vec![real(mark.gray.unwrap_or(0.0))]));
            match mark.style {
                MarkStyle::Box => {
                    ops.push(Operation::new(
                        "re",
                        vec![real(x), real(y), real(mark.size), real(mark.size)],
                    ));
                    ops.push(Operation::new("f", vec![]));
                }
                MarkStyle::Check => {
                    ops.extend(text_operations(FONT_CHECK, mark.size, x, y, CHECK_GLYPH.to_vec()));
                }
            }
            ops.push(Operation::new("Q", vec![]));
        }

        if let Some(spec) = &plan.signature {
            if let Some(image_id) = self.signature(&mut doc, spec) {
                resources.push(("XObject", IMAGE_SIGNATURE, image_id));
                let (x, y) = page.to_points(spec.x, spec.y);
                ops.extend([
                    Operation::new("q", vec![]),
                    Operation::new(
                        "cm",
                        vec![
                            real(spec.width),
                            real(0.0),
                            real(0.0),
                            real(spec.height),
                            real(x),
                            real(y),
                        ],
                    ),
                    Operation::new("Do", vec![Object::Name(IMAGE_SIGNATURE.as_bytes().to_vec())]),
                    Operation::new("Q", vec![]),
                ]);
            }
        }
        ops.push(Operation::new("Q", vec![]));

        // Streams are concatenated when drawn; keep a token boundary.
        let mut overlay = b"\n".to_vec();
        overlay.extend(Content { operations: ops }.encode()?);
        let opening = Content {
            operations: vec![Operation::new("q", vec![])],
        }
        .encode()?;

        let mut contents = vec![Object::Reference(
            doc.add_object(Stream::new(Dictionary::new(), opening)),
        )];
        contents.extend(existing_contents(&doc, page_id)?);
        let mut overlay_stream = Stream::new(Dictionary::new(), overlay);
        if let Err(e) = overlay_stream.compress() {
            tracing::debug!("Leaving overlay stream uncompressed: {}", e);
        }
        contents.push(Object::Reference(doc.add_object(overlay_stream)));

        install_resources(&mut doc, page_id, &resources)?;

        let page_dict = doc.get_object_mut(page_id)?.as_dict_mut()?;
        page_dict.set("Contents", Object::Array(contents));
        if flatten && page_dict.remove(b"Annots").is_some() {
            tracing::debug!("Removed form annotations from page 1");
        }

        let mut out = Vec::new();
        doc.save_to(&mut out)?;
        Ok(out)
    }
}
