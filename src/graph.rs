//! Shared helpers for walking the lopdf object graph.

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::error::Result;

/// Maximum reference-chain length followed before giving up.
const MAX_INDIRECTION: usize = 16;

/// Follow indirect references until a concrete object is reached.
pub fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Result<&'a Object> {
    let mut current = obj;
    for _ in 0..MAX_INDIRECTION {
        match current {
            Object::Reference(id) => current = doc.get_object(*id)?,
            _ => return Ok(current),
        }
    }
    Err(lopdf::Error::ReferenceLimit.into())
}

/// The id of the object a (possibly chained) reference finally points at.
///
/// Returns `None` when the object is not a reference at all, or the chain is
/// broken or too long.
pub fn resolve_id(doc: &Document, obj: &Object) -> Option<ObjectId> {
    let mut current = obj;
    let mut last = None;
    for _ in 0..MAX_INDIRECTION {
        match current {
            Object::Reference(id) => {
                last = Some(*id);
                current = doc.get_object(*id).ok()?;
            },
            _ => return last,
        }
    }
    None
}

/// Resolve an entry on a dictionary to a concrete object, if present.
pub fn resolve_entry<'a>(
    doc: &'a Document,
    dict: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Object> {
    dict.get(key).ok().and_then(|obj| resolve(doc, obj).ok())
}

/// Read an entry as a dictionary, following references.
pub fn dict_entry<'a>(
    doc: &'a Document,
    dict: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Dictionary> {
    resolve_entry(doc, dict, key).and_then(|obj| obj.as_dict().ok())
}

/// Numeric cast covering both integer and real objects.
pub fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Read a 4-element numeric array (a `/Rect` or `/BBox` value), following a
/// reference to the array itself if needed.
pub fn quad(doc: &Document, obj: &Object) -> Option<[f32; 4]> {
    let array = resolve(doc, obj).ok()?.as_array().ok()?;
    if array.len() != 4 {
        return None;
    }
    let mut out = [0.0f32; 4];
    for (slot, item) in out.iter_mut().zip(array) {
        *slot = number(item)?;
    }
    Some(out)
}

/// The object id an entry refers to, if the entry is an indirect reference.
pub fn reference_entry(dict: &Dictionary, key: &[u8]) -> Option<ObjectId> {
    match dict.get(key) {
        Ok(Object::Reference(id)) => Some(*id),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    #[test]
    fn test_resolve_follows_reference_chain() {
        let mut doc = Document::with_version("1.5");
        let target = doc.add_object(Object::Integer(7));
        let hop = doc.add_object(Object::Reference(target));
        let obj = Object::Reference(hop);
        let resolved = resolve(&doc, &obj).unwrap();
        assert_eq!(resolved.as_i64().unwrap(), 7);
    }

    #[test]
    fn test_resolve_reports_cycles() {
        let mut doc = Document::with_version("1.5");
        let id = doc.add_object(Object::Null);
        // Point the object at itself.
        *doc.get_object_mut(id).unwrap() = Object::Reference(id);
        let obj = Object::Reference(id);
        assert!(resolve(&doc, &obj).is_err());
    }

    #[test]
    fn test_number_accepts_integers_and_reals() {
        assert_eq!(number(&Object::Integer(3)), Some(3.0));
        assert_eq!(number(&Object::Real(2.5)), Some(2.5));
        assert_eq!(number(&Object::Null), None);
    }

    #[test]
    fn test_quad_reads_rect_arrays() {
        let doc = Document::with_version("1.5");
        let obj = Object::Array(vec![
            Object::Integer(100),
            Object::Integer(200),
            Object::Real(300.0),
            Object::Real(250.0),
        ]);
        assert_eq!(quad(&doc, &obj), Some([100.0, 200.0, 300.0, 250.0]));
    }

    #[test]
    fn test_quad_rejects_short_arrays() {
        let doc = Document::with_version("1.5");
        let obj = Object::Array(vec![Object::Integer(1)]);
        assert_eq!(quad(&doc, &obj), None);
    }

    #[test]
    fn test_dict_entry_follows_reference() {
        let mut doc = Document::with_version("1.5");
        let inner = doc.add_object(dictionary! { "Kind" => "Test" });
        let outer = dictionary! { "Child" => Object::Reference(inner) };
        let child = dict_entry(&doc, &outer, b"Child").unwrap();
        assert!(child.has(b"Kind"));
    }
}
