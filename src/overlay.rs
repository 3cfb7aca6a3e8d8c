//! Content-stream synthesis for flattened widgets.
//!
//! Builds the overlay operator buffer that redraws each widget's appearance
//! on top of its page, mints page-unique resource names, registers the
//! appearance streams into the page's XObject table, and splices the overlay
//! into the page's content.

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use crate::error::Result;
use crate::geometry::Rect;
use crate::graph;
use crate::transform::Matrix;

/// Overlay operator buffer for a single page.
///
/// The buffer opens with a save-state, isolates every widget in its own
/// save/restore block, and is closed by [`PageOverlay::finish`]. Widgets are
/// appended in page annotation order.
#[derive(Debug)]
pub struct PageOverlay {
    buf: String,
    placed: usize,
}

impl PageOverlay {
    /// Start an empty overlay.
    pub fn new() -> Self {
        Self {
            buf: String::from("q\n"),
            placed: 0,
        }
    }

    /// Stamp one appearance: concatenate its placement matrix, invoke the
    /// named drawable, then restore and re-save so the next widget starts
    /// from a clean graphics state.
    pub fn place(&mut self, name: &str, matrix: &Matrix) {
        self.buf.push_str(&format!("{} cm\n/{} Do\nQ\nq\n", matrix, name));
        self.placed += 1;
    }

    /// Outline the widget's rectangle (debug-box mode only).
    pub fn debug_box(&mut self, rect: &Rect) {
        self.buf.push_str(&format!(
            "{} {} {} {} re\nB*\n",
            rect.llx,
            rect.lly,
            rect.width(),
            rect.height()
        ));
    }

    /// Number of widgets placed so far.
    pub fn placed(&self) -> usize {
        self.placed
    }

    /// Close the buffer with the final restore-state.
    ///
    /// Returns `None` when nothing was placed, so untouched pages are left
    /// byte-identical.
    pub fn finish(mut self) -> Option<Vec<u8>> {
        if self.placed == 0 {
            return None;
        }
        self.buf.push_str("Q\n");
        Some(self.buf.into_bytes())
    }
}

impl Default for PageOverlay {
    fn default() -> Self {
        Self::new()
    }
}

/// Reuse an appearance stream's stamped resource name, or mint the next
/// page-local `ResX{N}` name and stamp it onto the stream.
///
/// The counter is owned by the caller and advances only when a name is
/// actually minted, so re-registering the same stream within one page is
/// idempotent.
pub fn xobject_name(doc: &mut Document, ap_id: ObjectId, counter: &mut u32) -> Result<String> {
    {
        let stream = doc.get_object(ap_id)?.as_stream()?;
        if let Ok(existing) = stream.dict.get(b"Name").and_then(Object::as_name) {
            return Ok(String::from_utf8_lossy(existing).into_owned());
        }
    }
    let name = format!("ResX{}", counter);
    *counter += 1;
    doc.get_object_mut(ap_id)?
        .as_stream_mut()?
        .dict
        .set("Name", Object::Name(name.clone().into_bytes()));
    Ok(name)
}

/// Register an appearance stream under `name` in the page's XObject resource
/// sub-table, creating the table (and the resource dictionary itself) when
/// absent. A colliding name is overwritten.
pub fn register_xobject(
    doc: &mut Document,
    page_id: ObjectId,
    name: &str,
    ap_id: ObjectId,
) -> Result<()> {
    if !doc.get_dictionary(page_id)?.has(b"Resources") {
        doc.get_object_mut(page_id)?
            .as_dict_mut()?
            .set("Resources", Dictionary::new());
    }
    let resources_id = graph::reference_entry(doc.get_dictionary(page_id)?, b"Resources");

    {
        let resources = resources_dict_mut(doc, page_id, resources_id)?;
        if !resources.has(b"XObject") {
            resources.set("XObject", Dictionary::new());
        }
    }
    let xobject_id = {
        let resources = match resources_id {
            Some(id) => doc.get_dictionary(id)?,
            None => doc
                .get_dictionary(page_id)?
                .get(b"Resources")?
                .as_dict()?,
        };
        match resources.get(b"XObject")? {
            Object::Reference(id) => Some(*id),
            _ => None,
        }
    };

    match xobject_id {
        Some(id) => doc
            .get_object_mut(id)?
            .as_dict_mut()?
            .set(name, Object::Reference(ap_id)),
        None => resources_dict_mut(doc, page_id, resources_id)?
            .get_mut(b"XObject")?
            .as_dict_mut()?
            .set(name, Object::Reference(ap_id)),
    }
    Ok(())
}

fn resources_dict_mut(
    doc: &mut Document,
    page_id: ObjectId,
    resources_id: Option<ObjectId>,
) -> Result<&mut Dictionary> {
    match resources_id {
        Some(id) => Ok(doc.get_object_mut(id)?.as_dict_mut()?),
        None => Ok(doc
            .get_object_mut(page_id)?
            .as_dict_mut()?
            .get_mut(b"Resources")?
            .as_dict_mut()?),
    }
}

/// Wrap the page's pre-existing content in an outer save/restore pair and
/// append the overlay after it, so the original content renders first and
/// cannot leak graphics state into the synthesized operators.
pub fn apply_overlay(doc: &mut Document, page_id: ObjectId, overlay: Vec<u8>) -> Result<()> {
    let mut contents: Vec<Object> = {
        let page = doc.get_dictionary(page_id)?;
        match page.get(b"Contents") {
            Ok(Object::Reference(id)) => match doc.get_object(*id)? {
                Object::Array(items) => items.clone(),
                _ => vec![Object::Reference(*id)],
            },
            Ok(Object::Array(items)) => items.clone(),
            _ => Vec::new(),
        }
    };

    let open = doc.add_object(Object::Stream(Stream::new(
        Dictionary::new(),
        b"q\n".to_vec(),
    )));
    let close = doc.add_object(Object::Stream(Stream::new(
        Dictionary::new(),
        b"\nQ\n".to_vec(),
    )));
    let overlay_id = doc.add_object(Object::Stream(Stream::new(Dictionary::new(), overlay)));

    contents.insert(0, Object::Reference(open));
    contents.push(Object::Reference(close));
    contents.push(Object::Reference(overlay_id));
    doc.get_object_mut(page_id)?
        .as_dict_mut()?
        .set("Contents", contents);
    Ok(())
}
