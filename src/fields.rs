//! Field-tree traversal with attribute inheritance.
//!
//! Form fields form a tree via `/Parent`/`/Kids` links rooted at the form
//! layer's `/Fields` array. A handful of attributes descend from ancestor to
//! descendant unless overridden; the walk here accumulates them top-down and
//! hands every text-field leaf to the appearance generator.

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::error::Result;
use crate::generate;
use crate::graph;

/// Maximum tree depth walked before assuming a `/Kids` cycle.
const MAX_FIELD_DEPTH: usize = 32;

/// Inheritable field attributes accumulated along a root-to-leaf path.
///
/// Passed down the recursion by value; leaves are mutated through the
/// document, never through shared accumulator state.
#[derive(Debug, Clone, Default)]
pub struct InheritedAttributes {
    /// Field type (`/FT`)
    pub field_type: Option<Vec<u8>>,
    /// Field flags (`/Ff`)
    pub flags: Option<i64>,
    /// Current value (`/V`)
    pub value: Option<Object>,
    /// Default value (`/DV`)
    pub default_value: Option<Object>,
    /// Default appearance string (`/DA`)
    pub default_appearance: Option<Vec<u8>>,
    /// Quadding / justification (`/Q`)
    pub quadding: Option<i64>,
}

impl InheritedAttributes {
    /// The attributes in effect at `node`: a key present on the node shadows
    /// the inherited one, absent keys keep the inherited value.
    pub fn overridden_by(&self, doc: &Document, node: &Dictionary) -> Self {
        let name = |key: &[u8]| {
            graph::resolve_entry(doc, node, key)
                .and_then(|obj| obj.as_name().ok())
                .map(|n| n.to_vec())
        };
        let int = |key: &[u8]| {
            graph::resolve_entry(doc, node, key).and_then(|obj| obj.as_i64().ok())
        };
        Self {
            field_type: name(b"FT").or_else(|| self.field_type.clone()),
            flags: int(b"Ff").or(self.flags),
            value: graph::resolve_entry(doc, node, b"V")
                .cloned()
                .or_else(|| self.value.clone()),
            default_value: graph::resolve_entry(doc, node, b"DV")
                .cloned()
                .or_else(|| self.default_value.clone()),
            default_appearance: graph::resolve_entry(doc, node, b"DA")
                .and_then(|obj| obj.as_str().ok())
                .map(|s| s.to_vec())
                .or_else(|| self.default_appearance.clone()),
            quadding: int(b"Q").or(self.quadding),
        }
    }

    /// Whether the effective field type is a text field.
    pub fn is_text(&self) -> bool {
        self.field_type.as_deref() == Some(b"Tx".as_slice())
    }
}

/// Regenerate text-field appearances for every leaf reachable from the given
/// top-level field nodes.
///
/// Returns the number of appearances rebuilt. Malformed fields are logged
/// and skipped; only document-level failures abort.
pub fn regenerate_appearances(
    doc: &mut Document,
    fields: &[ObjectId],
    default_resources: Option<ObjectId>,
) -> Result<usize> {
    let mut generated = 0;
    for &field_id in fields {
        walk_field(
            doc,
            field_id,
            InheritedAttributes::default(),
            default_resources,
            0,
            &mut generated,
        )?;
    }
    Ok(generated)
}

fn walk_field(
    doc: &mut Document,
    field_id: ObjectId,
    inherited: InheritedAttributes,
    default_resources: Option<ObjectId>,
    depth: usize,
    generated: &mut usize,
) -> Result<()> {
    if depth > MAX_FIELD_DEPTH {
        log::warn!(
            "field tree deeper than {} at {} {} R, assuming a cycle",
            MAX_FIELD_DEPTH,
            field_id.0,
            field_id.1
        );
        return Ok(());
    }
    let (effective, kids) = {
        let node = match doc.get_dictionary(field_id) {
            Ok(node) => node,
            Err(err) => {
                log::warn!(
                    "unreadable field {} {} R: {}",
                    field_id.0,
                    field_id.1,
                    err
                );
                return Ok(());
            },
        };
        let effective = inherited.overridden_by(doc, node);
        let kids: Vec<ObjectId> = node
            .get(b"Kids")
            .ok()
            .and_then(|obj| graph::resolve(doc, obj).ok())
            .and_then(|obj| obj.as_array().ok())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_reference().ok())
                    .collect()
            })
            .unwrap_or_default();
        (effective, kids)
    };

    if !kids.is_empty() {
        // Internal node: descend with the merged attributes as the new
        // baseline. No generation happens here.
        for kid in kids {
            walk_field(
                doc,
                kid,
                effective.clone(),
                default_resources,
                depth + 1,
                generated,
            )?;
        }
        return Ok(());
    }

    // Leaf: either a merged field/widget or a standalone top-level field
    // that is its own annotation. Only text fields are regenerated.
    if effective.is_text() {
        match generate::refresh_text_appearance(doc, field_id, &effective, default_resources) {
            Ok(()) => *generated += 1,
            Err(err) if err.is_recoverable() => {
                log::warn!("skipping appearance generation: {}", err);
            },
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appearance::{self, NormalAppearance};
    use lopdf::dictionary;

    #[test]
    fn test_child_attribute_shadows_inherited() {
        let doc = Document::with_version("1.5");
        let parent = InheritedAttributes::default().overridden_by(
            &doc,
            &dictionary! { "FT" => "Tx", "DA" => Object::string_literal("/Helv 12 Tf 0 g") },
        );
        let child = parent.overridden_by(
            &doc,
            &dictionary! { "DA" => Object::string_literal("/Helv 8 Tf 0 g") },
        );

        assert_eq!(child.field_type.as_deref(), Some(b"Tx".as_slice()));
        assert_eq!(
            child.default_appearance.as_deref(),
            Some(b"/Helv 8 Tf 0 g".as_slice())
        );
    }

    #[test]
    fn test_undefined_keys_keep_inherited_values() {
        let doc = Document::with_version("1.5");
        let parent = InheritedAttributes::default().overridden_by(
            &doc,
            &dictionary! {
                "FT" => "Tx",
                "V" => Object::string_literal("shared"),
                "Q" => 1,
            },
        );
        let child = parent.overridden_by(&doc, &dictionary! {});

        assert!(child.is_text());
        assert_eq!(child.quadding, Some(1));
        match child.value {
            Some(Object::String(bytes, _)) => assert_eq!(bytes, b"shared"),
            other => panic!("expected inherited value, got {:?}", other),
        }
    }

    #[test]
    fn test_walk_generates_for_inherited_text_leaves() {
        let mut doc = Document::with_version("1.5");
        // Parent holds everything inheritable; the kid is a bare widget.
        let kid_id = doc.add_object(dictionary! {
            "Subtype" => "Widget",
            "Rect" => vec![100.into(), 600.into(), 300.into(), 620.into()],
        });
        let parent_id = doc.add_object(dictionary! {
            "FT" => "Tx",
            "T" => Object::string_literal("name"),
            "V" => Object::string_literal("Ada"),
            "DA" => Object::string_literal("/Helv 12 Tf 0 g"),
            "Kids" => vec![Object::Reference(kid_id)],
        });
        doc.get_object_mut(kid_id)
            .unwrap()
            .as_dict_mut()
            .unwrap()
            .set("Parent", Object::Reference(parent_id));

        let generated = regenerate_appearances(&mut doc, &[parent_id], None).unwrap();
        assert_eq!(generated, 1);

        // The appearance landed on the kid, not the internal node.
        let ap = appearance::normal_appearance(&doc, kid_id).unwrap();
        assert!(matches!(ap, Some(NormalAppearance::Single(_))));
        assert!(appearance::normal_appearance(&doc, parent_id)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_walk_skips_non_text_fields() {
        let mut doc = Document::with_version("1.5");
        let button_id = doc.add_object(dictionary! {
            "FT" => "Btn",
            "T" => Object::string_literal("agree"),
            "Rect" => vec![0.into(), 0.into(), 15.into(), 15.into()],
        });

        let generated = regenerate_appearances(&mut doc, &[button_id], None).unwrap();
        assert_eq!(generated, 0);
        assert!(appearance::normal_appearance(&doc, button_id)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_walk_recovers_from_malformed_leaves() {
        let mut doc = Document::with_version("1.5");
        // Text field without /DA: generation is skipped, the walk continues.
        let broken_id = doc.add_object(dictionary! {
            "FT" => "Tx",
            "V" => Object::string_literal("x"),
            "Rect" => vec![0.into(), 0.into(), 100.into(), 20.into()],
        });
        let good_id = doc.add_object(dictionary! {
            "FT" => "Tx",
            "V" => Object::string_literal("y"),
            "DA" => Object::string_literal("/Helv 12 Tf 0 g"),
            "Rect" => vec![0.into(), 0.into(), 100.into(), 20.into()],
        });

        let generated = regenerate_appearances(&mut doc, &[broken_id, good_id], None).unwrap();
        assert_eq!(generated, 1);
        assert!(appearance::normal_appearance(&doc, broken_id)
            .unwrap()
            .is_none());
    }
}
