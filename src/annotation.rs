//! Annotation classification and visibility filtering.
//!
//! Implements the per-annotation checks that decide whether a widget is
//! eligible for flattening: subtype classification (only `/Widget`
//! annotations are candidates) and the `/F` flag filter per ISO 32000-1:2008
//! Table 165.

use bitflags::bitflags;
use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::error::{Error, Result};
use crate::geometry::Rect;
use crate::graph;

bitflags! {
    /// Annotation flags per PDF spec Table 165.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AnnotationFlags: u32 {
        /// Bit 1: Do not display if no handler is available
        const INVISIBLE = 1 << 0;
        /// Bit 2: Do not display or print
        const HIDDEN = 1 << 1;
        /// Bit 3: Print the annotation when the page is printed
        const PRINT = 1 << 2;
        /// Bit 4: Do not scale with page zoom
        const NO_ZOOM = 1 << 3;
        /// Bit 5: Do not rotate with the page
        const NO_ROTATE = 1 << 4;
        /// Bit 6: Do not display on screen
        const NO_VIEW = 1 << 5;
        /// Bit 7: Do not allow interaction
        const READ_ONLY = 1 << 6;
        /// Bit 8: Do not allow deletion or modification
        const LOCKED = 1 << 7;
        /// Bit 9: Invert NoView on mouse events
        const TOGGLE_NO_VIEW = 1 << 8;
        /// Bit 10: Do not allow content modification
        const LOCKED_CONTENTS = 1 << 9;
    }
}

impl AnnotationFlags {
    /// Whether an annotation with these flags should be rendered.
    ///
    /// Evaluated as an ordered short-circuit check: invisible and hidden
    /// annotations are denied, then anything not marked for print.
    pub fn renders(self) -> bool {
        if self.contains(Self::INVISIBLE) {
            return false;
        }
        if self.contains(Self::HIDDEN) {
            return false;
        }
        self.contains(Self::PRINT)
    }
}

impl Default for AnnotationFlags {
    /// The flag value assumed when an annotation has no `/F` entry:
    /// print, not hidden, not invisible.
    fn default() -> Self {
        Self::PRINT
    }
}

/// Read an annotation's flag bitmask, applying the default when absent.
pub fn annotation_flags(doc: &Document, annot: &Dictionary) -> AnnotationFlags {
    graph::resolve_entry(doc, annot, b"F")
        .and_then(|obj| obj.as_i64().ok())
        .map(|bits| AnnotationFlags::from_bits_truncate(bits as u32))
        .unwrap_or_default()
}

/// Whether an annotation dictionary is a form widget.
pub fn is_widget(doc: &Document, annot: &Dictionary) -> bool {
    graph::resolve_entry(doc, annot, b"Subtype")
        .and_then(|obj| obj.as_name().ok())
        .map(|name| name == b"Widget")
        .unwrap_or(false)
}

/// Read an annotation's placement rectangle.
pub fn annotation_rect(doc: &Document, annot_id: ObjectId) -> Result<Rect> {
    let annot = doc.get_dictionary(annot_id)?;
    let rect = annot
        .get(b"Rect")
        .ok()
        .and_then(|obj| graph::quad(doc, obj))
        .ok_or(Error::MalformedField {
            key: "Rect",
            id: annot_id,
        })?;
    Ok(Rect::new(rect[0], rect[1], rect[2], rect[3]))
}

/// Maximum `/Parent` chain length followed when looking up inherited keys.
const MAX_PARENT_DEPTH: usize = 32;

/// Look up a widget's field type, walking `/Parent` links when the widget
/// itself does not carry `/FT`.
pub fn field_type(doc: &Document, annot_id: ObjectId) -> Option<Vec<u8>> {
    let mut current = annot_id;
    for _ in 0..MAX_PARENT_DEPTH {
        let dict = doc.get_dictionary(current).ok()?;
        if let Some(ft) = graph::resolve_entry(doc, dict, b"FT").and_then(|o| o.as_name().ok()) {
            return Some(ft.to_vec());
        }
        match dict.get(b"Parent") {
            Ok(Object::Reference(parent)) => current = *parent,
            _ => return None,
        }
    }
    None
}
