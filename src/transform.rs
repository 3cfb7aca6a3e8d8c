//! Placement matrix calculation for flattened widgets.
//!
//! Derives the transform that maps an appearance stream's bounding box onto
//! its annotation's rectangle. Whether translation and scaling apply is
//! decided by inspecting the appearance's resource table, not by geometry
//! alone, and scaling requires BOTH dimensions to differ; single-axis
//! mismatches are ignored.

use std::fmt;

use lopdf::{Dictionary, Document, ObjectId};

use crate::error::{Error, Result};
use crate::geometry::Rect;
use crate::graph;

/// A transformation matrix `[a 0 0 d e f]`.
///
/// Shear and rotation are never produced, so only the scale and translation
/// components are stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    /// Horizontal scale
    pub a: f32,
    /// Vertical scale
    pub d: f32,
    /// Horizontal translation
    pub e: f32,
    /// Vertical translation
    pub f: f32,
}

impl Matrix {
    /// The identity transform.
    pub const IDENTITY: Matrix = Matrix {
        a: 1.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };
}

impl fmt::Display for Matrix {
    /// Formats the six operands the way they appear before a `cm` operator.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} 0 0 {} {} {}", self.a, self.d, self.e, self.f)
    }
}

/// Compute the placement matrix for an appearance stream inside a rectangle.
pub fn placement_matrix(doc: &Document, rect: &Rect, ap_id: ObjectId) -> Result<Matrix> {
    let stream = doc.get_object(ap_id)?.as_stream()?;
    let bbox = stream
        .dict
        .get(b"BBox")
        .ok()
        .and_then(|obj| graph::quad(doc, obj))
        .ok_or(Error::MalformedField {
            key: "BBox",
            id: ap_id,
        })?;
    let bbox_width = bbox[2] - bbox[0];
    let bbox_height = bbox[3] - bbox[1];

    let resources = stream
        .dict
        .get(b"Resources")
        .ok()
        .and_then(|obj| graph::resolve(doc, obj).ok())
        .and_then(|obj| obj.as_dict().ok());
    let xobjects = resources.and_then(|res| graph::dict_entry(doc, res, b"XObject"));

    let translate = match (resources, xobjects) {
        (None, _) => true,
        (Some(_), None) => true,
        (Some(_), Some(nested)) => any_nested_at_origin(doc, nested),
    };
    let (e, f) = if translate {
        (rect.llx, rect.lly)
    } else {
        (0.0, 0.0)
    };

    let scale_candidate = xobjects
        .map(|nested| nested.iter().next().is_some())
        .unwrap_or(false);
    let both_dimensions_differ =
        bbox_width - rect.width() != 0.0 && bbox_height - rect.height() != 0.0;
    // Degenerate boxes are left unscaled.
    let (a, d) = if scale_candidate && both_dimensions_differ && bbox_width != 0.0 && bbox_height != 0.0 {
        (rect.width() / bbox_width, rect.height() / bbox_height)
    } else {
        (1.0, 1.0)
    };

    Ok(Matrix { a, d, e, f })
}

/// Whether any drawable nested in the appearance's resource table has its
/// bounding box anchored at the origin.
fn any_nested_at_origin(doc: &Document, nested: &Dictionary) -> bool {
    nested.iter().any(|(_, value)| {
        graph::resolve(doc, value)
            .ok()
            .and_then(|obj| obj.as_stream().ok())
            .and_then(|stream| stream.dict.get(b"BBox").ok())
            .and_then(|obj| graph::quad(doc, obj))
            .map(|bbox| bbox[0] == 0.0 && bbox[1] == 0.0)
            .unwrap_or(false)
    })
}
