//! Normal-appearance resolution for widget annotations.
//!
//! A widget's `/AP` entry holds its normal appearance under `/N`: either a
//! single form XObject, or a dictionary of named states (checked/unchecked
//! and the like) keyed by the annotation's `/AS` value. Flattening needs
//! exactly one drawable stream per widget; this module picks it.

use std::collections::BTreeMap;

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

use crate::error::{Error, Result};
use crate::geometry::Rect;
use crate::graph;

/// A widget's normal appearance.
///
/// Modelled as a tagged variant so callers dispatch on shape once instead of
/// probing object types at every use site.
#[derive(Debug, Clone)]
pub enum NormalAppearance {
    /// A single drawable form XObject
    Single(ObjectId),
    /// Named appearance states, selected by the annotation's `/AS` value
    States(BTreeMap<Vec<u8>, ObjectId>),
}

/// Produce the single drawable stream for an eligible widget.
///
/// Synthesizes an empty normal appearance when the annotation has none (the
/// widget then flattens to nothing visible), and selects the `/AS`-named
/// state, falling back to the down (`/D`) dictionary, when the normal
/// appearance is a state dictionary. A state name found in neither
/// dictionary is a malformed-field error recovered by the caller.
pub fn resolve_appearance(doc: &mut Document, annot_id: ObjectId, rect: &Rect) -> Result<ObjectId> {
    hoist_appearance_streams(doc, annot_id)?;
    match normal_appearance(doc, annot_id)? {
        None => synthesize_empty(doc, annot_id, rect),
        Some(NormalAppearance::Single(id)) => Ok(id),
        Some(NormalAppearance::States(states)) => select_state(doc, annot_id, &states),
    }
}

/// Read the shape of a widget's normal appearance, if it has one.
///
/// Callers that need object identity for the streams (everything in this
/// crate) must run [`hoist_appearance_streams`] first.
pub fn normal_appearance(doc: &Document, annot_id: ObjectId) -> Result<Option<NormalAppearance>> {
    let annot = doc.get_dictionary(annot_id)?;
    let Some(ap) = graph::dict_entry(doc, annot, b"AP") else {
        return Ok(None);
    };
    let Ok(n) = ap.get(b"N") else {
        return Ok(None);
    };
    match graph::resolve(doc, n)? {
        Object::Stream(_) => Ok(Some(match graph::resolve_id(doc, n) {
            Some(id) => NormalAppearance::Single(id),
            None => return Ok(None),
        })),
        Object::Dictionary(states) => {
            let mut map = BTreeMap::new();
            for (name, value) in states.iter() {
                if let Object::Reference(id) = value {
                    map.insert(name.clone(), *id);
                }
            }
            Ok(Some(NormalAppearance::States(map)))
        },
        _ => Ok(None),
    }
}

/// Select the appearance state named by the annotation's `/AS` value.
fn select_state(
    doc: &Document,
    annot_id: ObjectId,
    states: &BTreeMap<Vec<u8>, ObjectId>,
) -> Result<ObjectId> {
    let annot = doc.get_dictionary(annot_id)?;
    let state_name = graph::resolve_entry(doc, annot, b"AS")
        .and_then(|obj| obj.as_name().ok())
        .ok_or(Error::MalformedField {
            key: "AS",
            id: annot_id,
        })?;

    if let Some(id) = states.get(state_name) {
        return Ok(*id);
    }

    // The named state may only exist in the down appearance.
    if let Some(ap) = graph::dict_entry(doc, annot, b"AP") {
        if let Some(down) = ap
            .get(b"D")
            .ok()
            .and_then(|obj| graph::resolve(doc, obj).ok())
            .and_then(|obj| obj.as_dict().ok())
        {
            if let Ok(Object::Reference(id)) = down.get(state_name) {
                return Ok(*id);
            }
        }
    }

    Err(Error::MalformedField {
        key: "AS",
        id: annot_id,
    })
}

/// Synthesize an empty normal appearance for a widget without one.
fn synthesize_empty(doc: &mut Document, annot_id: ObjectId, rect: &Rect) -> Result<ObjectId> {
    log::debug!(
        "widget {} {} R has no appearance, synthesizing an empty one",
        annot_id.0,
        annot_id.1
    );
    let stream = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => vec![
                0.into(),
                0.into(),
                Object::Real(rect.width()),
                Object::Real(rect.height()),
            ],
        },
        Vec::new(),
    );
    let ap_id = doc.add_object(Object::Stream(stream));
    set_normal_appearance(doc, annot_id, ap_id)?;
    Ok(ap_id)
}

/// Where an annotation's `/AP` dictionary lives.
enum ApSlot {
    Missing,
    OnAnnot(Dictionary),
    Indirect(ObjectId),
}

fn ap_slot(doc: &Document, annot_id: ObjectId) -> Result<ApSlot> {
    let annot = doc.get_dictionary(annot_id)?;
    Ok(match annot.get(b"AP") {
        Ok(obj @ Object::Reference(_)) => match graph::resolve_id(doc, obj) {
            Some(id) => ApSlot::Indirect(id),
            None => ApSlot::Missing,
        },
        Ok(Object::Dictionary(dict)) => ApSlot::OnAnnot(dict.clone()),
        _ => ApSlot::Missing,
    })
}

/// Install `ap_id` as the annotation's normal appearance, creating the `/AP`
/// dictionary when absent.
pub(crate) fn set_normal_appearance(
    doc: &mut Document,
    annot_id: ObjectId,
    ap_id: ObjectId,
) -> Result<()> {
    match ap_slot(doc, annot_id)? {
        ApSlot::Missing => {
            doc.get_object_mut(annot_id)?.as_dict_mut()?.set(
                "AP",
                dictionary! { "N" => Object::Reference(ap_id) },
            );
        },
        ApSlot::OnAnnot(mut ap) => {
            ap.set("N", Object::Reference(ap_id));
            doc.get_object_mut(annot_id)?.as_dict_mut()?.set("AP", ap);
        },
        ApSlot::Indirect(id) => {
            let target = doc.get_object_mut(id)?;
            match target.as_dict_mut() {
                Ok(ap) => ap.set("N", Object::Reference(ap_id)),
                Err(_) => {
                    *target = Object::Dictionary(
                        dictionary! { "N" => Object::Reference(ap_id) },
                    );
                },
            }
        },
    }
    Ok(())
}

/// Move appearance streams stored directly inside `/AP` out into indirect
/// objects.
///
/// Registration into a page's resource table shares streams by reference, so
/// every drawable needs an object id of its own. Direct streams are rare but
/// legal; hoisting preserves sharing for them from this point on.
pub(crate) fn hoist_appearance_streams(doc: &mut Document, annot_id: ObjectId) -> Result<()> {
    let (slot_id, mut ap) = match ap_slot(doc, annot_id)? {
        ApSlot::Missing => return Ok(()),
        ApSlot::OnAnnot(dict) => (None, dict),
        ApSlot::Indirect(id) => (Some(id), doc.get_dictionary(id)?.clone()),
    };

    let mut changed = false;
    for key in [b"N".as_slice(), b"D".as_slice()] {
        let Ok(entry) = ap.get(key) else { continue };
        let mut entry_changed = false;
        let hoisted = hoist_entry(doc, entry.clone(), &mut entry_changed);
        if entry_changed {
            ap.set(key, hoisted);
            changed = true;
        }
    }
    if !changed {
        return Ok(());
    }

    match slot_id {
        Some(id) => *doc.get_object_mut(id)? = Object::Dictionary(ap),
        None => doc
            .get_object_mut(annot_id)?
            .as_dict_mut()?
            .set("AP", ap),
    }
    Ok(())
}

fn hoist_entry(doc: &mut Document, entry: Object, changed: &mut bool) -> Object {
    match entry {
        Object::Stream(stream) => {
            *changed = true;
            Object::Reference(doc.add_object(Object::Stream(stream)))
        },
        Object::Dictionary(states) => {
            let mut out = Dictionary::new();
            for (name, value) in states.iter() {
                let value = match value {
                    Object::Stream(stream) => {
                        *changed = true;
                        Object::Reference(doc.add_object(Object::Stream(stream.clone())))
                    },
                    other => other.clone(),
                };
                out.set(name.clone(), value);
            }
            Object::Dictionary(out)
        },
        other => other,
    }
}
