//! On-demand appearance generation for text fields.
//!
//! When a document declares that appearances must be regenerated before
//! flattening, every text field gets its visual stream rebuilt from its
//! current value and default-appearance string. Other field types are left
//! untouched by this subsystem.

use lopdf::{dictionary, Document, Object, ObjectId, Stream};

use crate::annotation;
use crate::appearance::{self, NormalAppearance};
use crate::error::{Error, Result};
use crate::fields::InheritedAttributes;

/// Build the operator stream that paints a text field's current value.
///
/// The default-appearance string is applied verbatim between `BT` and the
/// identity text matrix; any prior custom styling is intentionally
/// discarded by callers that overwrite an existing stream with this.
pub fn text_appearance_ops(default_appearance: &[u8], value: &[u8]) -> Vec<u8> {
    let mut ops = Vec::with_capacity(default_appearance.len() + value.len() + 48);
    ops.extend_from_slice(b"/Tx BMC\nq\nBT\n");
    ops.extend_from_slice(default_appearance);
    ops.extend_from_slice(b"\n1 0 0 1 0 0 Tm\n(");
    ops.extend_from_slice(&escape_literal(value));
    ops.extend_from_slice(b") Tj\nET\nQ\nEMC\n");
    ops
}

/// Escape special characters in a literal string operand.
fn escape_literal(value: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len());
    for &byte in value {
        match byte {
            b'\\' => out.extend_from_slice(b"\\\\"),
            b'(' => out.extend_from_slice(b"\\("),
            b')' => out.extend_from_slice(b"\\)"),
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\n' => out.extend_from_slice(b"\\n"),
            _ => out.push(byte),
        }
    }
    out
}

/// Produce or refresh the drawable representing a text field's value.
///
/// `target_id` is the annotation the appearance attaches to (for merged
/// field/widget leaves that is the field object itself). `default_resources`
/// is the form layer's shared `/DR` dictionary, referenced rather than
/// copied so every generated appearance sees the same resources.
pub fn refresh_text_appearance(
    doc: &mut Document,
    target_id: ObjectId,
    attrs: &InheritedAttributes,
    default_resources: Option<ObjectId>,
) -> Result<()> {
    let da = attrs
        .default_appearance
        .clone()
        .ok_or(Error::MalformedField {
            key: "DA",
            id: target_id,
        })?;
    let value = match &attrs.value {
        Some(Object::String(bytes, _)) => bytes.clone(),
        _ => {
            return Err(Error::MalformedField {
                key: "V",
                id: target_id,
            })
        },
    };
    let ops = text_appearance_ops(&da, &value);

    appearance::hoist_appearance_streams(doc, target_id)?;
    let existing = match appearance::normal_appearance(doc, target_id)? {
        Some(NormalAppearance::Single(id)) => Some(id),
        Some(NormalAppearance::States(_)) => {
            // Aberrant for a text field, but resolvable through /AS like any
            // state dictionary.
            let rect = annotation::annotation_rect(doc, target_id)?;
            Some(appearance::resolve_appearance(doc, target_id, &rect)?)
        },
        None => None,
    };

    match existing {
        Some(ap_id) => {
            let stream = doc.get_object_mut(ap_id)?.as_stream_mut()?;
            if let Some(dr) = default_resources {
                stream.dict.set("Resources", Object::Reference(dr));
            }
            // The replacement is written uncompressed; drop any stale filter.
            stream.dict.remove(b"Filter");
            stream.dict.remove(b"DecodeParms");
            stream.dict.set("Length", ops.len() as i64);
            stream.content = ops;
        },
        None => {
            let rect = annotation::annotation_rect(doc, target_id)?;
            let mut dict = dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => vec![
                    0.into(),
                    0.into(),
                    Object::Real(rect.width()),
                    Object::Real(rect.height()),
                ],
            };
            if let Some(dr) = default_resources {
                dict.set("Resources", Object::Reference(dr));
            }
            let ap_id = doc.add_object(Object::Stream(Stream::new(dict, ops)));
            appearance::set_normal_appearance(doc, target_id, ap_id)?;
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph;

    fn text_attrs(da: &[u8], value: &[u8]) -> InheritedAttributes {
        InheritedAttributes {
            field_type: Some(b"Tx".to_vec()),
            default_appearance: Some(da.to_vec()),
            value: Some(Object::string_literal(value.to_vec())),
            ..Default::default()
        }
    }

    #[test]
    fn test_template_operator_sequence() {
        let ops = text_appearance_ops(b"/Helv 12 Tf 0 g", b"Hello");
        assert_eq!(
            ops,
            b"/Tx BMC\nq\nBT\n/Helv 12 Tf 0 g\n1 0 0 1 0 0 Tm\n(Hello) Tj\nET\nQ\nEMC\n"
        );
    }

    #[test]
    fn test_literal_escaping() {
        assert_eq!(escape_literal(b"plain"), b"plain");
        assert_eq!(escape_literal(b"a(b)c"), b"a\\(b\\)c");
        assert_eq!(escape_literal(b"back\\slash"), b"back\\\\slash");
        assert_eq!(escape_literal(b"line\nbreak"), b"line\\nbreak");
    }

    #[test]
    fn test_new_appearance_attached_with_shared_resources() {
        let mut doc = Document::with_version("1.5");
        let dr_id = doc.add_object(dictionary! { "Font" => dictionary! {} });
        let field_id = doc.add_object(dictionary! {
            "FT" => "Tx",
            "Subtype" => "Widget",
            "Rect" => vec![100.into(), 600.into(), 300.into(), 620.into()],
        });
        let attrs = text_attrs(b"/Helv 12 Tf 0 g", b"Jane");

        refresh_text_appearance(&mut doc, field_id, &attrs, Some(dr_id)).unwrap();

        let ap = match appearance::normal_appearance(&doc, field_id).unwrap() {
            Some(NormalAppearance::Single(id)) => id,
            other => panic!("expected a single appearance, got {:?}", other),
        };
        let stream = doc.get_object(ap).unwrap().as_stream().unwrap();
        let bbox = graph::quad(&doc, stream.dict.get(b"BBox").unwrap()).unwrap();
        assert_eq!(bbox, [0.0, 0.0, 200.0, 20.0]);
        assert_eq!(
            stream.dict.get(b"Resources").unwrap(),
            &Object::Reference(dr_id)
        );
        let content = String::from_utf8_lossy(&stream.content);
        assert!(content.contains("(Jane) Tj"));
    }

    #[test]
    fn test_existing_appearance_is_overwritten() {
        let mut doc = Document::with_version("1.5");
        let dr_id = doc.add_object(dictionary! { "Font" => dictionary! {} });
        let ap_id = doc.add_object(Object::Stream(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => vec![0.into(), 0.into(), 200.into(), 20.into()],
                "Resources" => dictionary! { "ColorSpace" => dictionary! {} },
            },
            b"0.5 g 0 0 200 20 re f".to_vec(),
        )));
        let field_id = doc.add_object(dictionary! {
            "FT" => "Tx",
            "Subtype" => "Widget",
            "Rect" => vec![100.into(), 600.into(), 300.into(), 620.into()],
            "AP" => dictionary! { "N" => Object::Reference(ap_id) },
        });
        let attrs = text_attrs(b"/Helv 10 Tf 0 g", b"updated");

        refresh_text_appearance(&mut doc, field_id, &attrs, Some(dr_id)).unwrap();

        let stream = doc.get_object(ap_id).unwrap().as_stream().unwrap();
        let content = String::from_utf8_lossy(&stream.content);
        assert!(content.starts_with("/Tx BMC"));
        assert!(content.contains("(updated) Tj"));
        assert!(!content.contains("re f"));
        assert_eq!(
            stream.dict.get(b"Resources").unwrap(),
            &Object::Reference(dr_id)
        );
        // The old bounding box is kept.
        let bbox = graph::quad(&doc, stream.dict.get(b"BBox").unwrap()).unwrap();
        assert_eq!(bbox, [0.0, 0.0, 200.0, 20.0]);
    }

    #[test]
    fn test_missing_default_appearance_is_malformed() {
        let mut doc = Document::with_version("1.5");
        let field_id = doc.add_object(dictionary! {
            "FT" => "Tx",
            "Rect" => vec![0.into(), 0.into(), 100.into(), 20.into()],
        });
        let attrs = InheritedAttributes {
            field_type: Some(b"Tx".to_vec()),
            value: Some(Object::string_literal("x")),
            ..Default::default()
        };

        let err = refresh_text_appearance(&mut doc, field_id, &attrs, None).unwrap_err();
        assert!(err.is_recoverable());
        // Nothing was attached.
        assert!(appearance::normal_appearance(&doc, field_id)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_missing_value_is_malformed() {
        let mut doc = Document::with_version("1.5");
        let field_id = doc.add_object(dictionary! {
            "FT" => "Tx",
            "Rect" => vec![0.into(), 0.into(), 100.into(), 20.into()],
        });
        let attrs = InheritedAttributes {
            field_type: Some(b"Tx".to_vec()),
            default_appearance: Some(b"/Helv 12 Tf 0 g".to_vec()),
            ..Default::default()
        };

        let err = refresh_text_appearance(&mut doc, field_id, &attrs, None).unwrap_err();
        assert!(err.is_recoverable());
    }
}
