//! Page-level orchestration of form flattening.
//!
//! One pass over the document: regenerate appearances first when the form
//! layer asks for it, then flatten every eligible widget page by page, and
//! finally remove the form layer so no interactivity survives.

use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::annotation;
use crate::appearance;
use crate::error::Result;
use crate::fields;
use crate::graph;
use crate::overlay::{self, PageOverlay};
use crate::transform;

/// Options controlling a flattening run.
#[derive(Debug, Clone, Default)]
pub struct FlattenOptions {
    /// Outline every flattened widget's rectangle in the page content.
    pub debug_boxes: bool,
}

/// What a flattening run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlattenSummary {
    /// Pages whose content was rewritten
    pub pages_touched: usize,
    /// Widgets drawn into page content and removed from annotation lists
    pub flattened: usize,
    /// Annotations left in place: non-widgets, non-rendering widgets, and
    /// malformed ones
    pub preserved: usize,
    /// Text-field appearances rebuilt before flattening
    pub regenerated: usize,
}

/// Where the document keeps its form-layer dictionary.
enum FormSlot {
    /// `/AcroForm` is an indirect reference to this object
    Indirect(ObjectId),
    /// `/AcroForm` is a dictionary stored directly on the catalog
    OnCatalog(ObjectId),
}

/// Flatten every form widget in `doc` and remove the form layer.
///
/// A document without a form layer is a successful no-op. The caller owns
/// serialization; see [`flatten_file`] for the load-flatten-save wrapper.
pub fn flatten_document(doc: &mut Document, options: &FlattenOptions) -> Result<FlattenSummary> {
    let mut summary = FlattenSummary::default();

    let root_id = doc.trailer.get(b"Root")?.as_reference()?;
    let slot = {
        let catalog = doc.get_dictionary(root_id)?;
        match catalog.get(b"AcroForm") {
            Ok(obj @ Object::Reference(_)) => graph::resolve_id(doc, obj).map(FormSlot::Indirect),
            Ok(Object::Dictionary(_)) => Some(FormSlot::OnCatalog(root_id)),
            _ => None,
        }
    };
    let Some(slot) = slot else {
        log::info!("no form layer present, nothing to flatten");
        return Ok(summary);
    };

    if needs_appearance_regen(doc, &slot)? {
        let field_ids = top_level_fields(doc, &slot)?;
        let default_resources = shared_default_resources(doc, &slot)?;
        summary.regenerated = fields::regenerate_appearances(doc, &field_ids, default_resources)?;
        form_dict_mut(doc, &slot)?.set("NeedAppearances", false);
        log::debug!("regenerated {} text-field appearances", summary.regenerated);
    }

    let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
    for page_id in pages {
        let (flattened, preserved) = flatten_page(doc, page_id, options)?;
        summary.flattened += flattened;
        summary.preserved += preserved;
        if flattened > 0 {
            summary.pages_touched += 1;
        }
    }

    // Finalize: drop the form layer.
    doc.get_object_mut(root_id)?
        .as_dict_mut()?
        .remove(b"AcroForm");
    if let FormSlot::Indirect(id) = slot {
        doc.objects.remove(&id);
    }

    log::info!(
        "flattened {} widgets on {} pages ({} annotations preserved)",
        summary.flattened,
        summary.pages_touched,
        summary.preserved
    );
    Ok(summary)
}

/// Load `input`, flatten it, and write the result to `output`.
pub fn flatten_file(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    options: &FlattenOptions,
) -> Result<FlattenSummary> {
    let mut doc = Document::load(input)?;
    let summary = flatten_document(&mut doc, options)?;
    doc.save(output)?;
    Ok(summary)
}

fn form_dict<'a>(doc: &'a Document, slot: &FormSlot) -> Result<&'a Dictionary> {
    match slot {
        FormSlot::Indirect(id) => Ok(doc.get_dictionary(*id)?),
        FormSlot::OnCatalog(root_id) => Ok(doc
            .get_dictionary(*root_id)?
            .get(b"AcroForm")?
            .as_dict()?),
    }
}

fn form_dict_mut<'a>(doc: &'a mut Document, slot: &FormSlot) -> Result<&'a mut Dictionary> {
    match slot {
        FormSlot::Indirect(id) => Ok(doc.get_object_mut(*id)?.as_dict_mut()?),
        FormSlot::OnCatalog(root_id) => Ok(doc
            .get_object_mut(*root_id)?
            .as_dict_mut()?
            .get_mut(b"AcroForm")?
            .as_dict_mut()?),
    }
}

fn needs_appearance_regen(doc: &Document, slot: &FormSlot) -> Result<bool> {
    let form = form_dict(doc, slot)?;
    Ok(matches!(
        graph::resolve_entry(doc, form, b"NeedAppearances"),
        Some(Object::Boolean(true))
    ))
}

fn top_level_fields(doc: &Document, slot: &FormSlot) -> Result<Vec<ObjectId>> {
    let form = form_dict(doc, slot)?;
    Ok(form
        .get(b"Fields")
        .ok()
        .and_then(|obj| graph::resolve(doc, obj).ok())
        .and_then(|obj| obj.as_array().ok())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_reference().ok())
                .collect()
        })
        .unwrap_or_default())
}

/// The form layer's `/DR` dictionary as an indirect object, hoisting a
/// direct dictionary when needed so generated appearances can share it by
/// reference instead of copying it.
fn shared_default_resources(doc: &mut Document, slot: &FormSlot) -> Result<Option<ObjectId>> {
    enum Dr {
        Missing,
        Indirect(ObjectId),
        Direct(Dictionary),
    }
    let dr = {
        let form = form_dict(doc, slot)?;
        match form.get(b"DR") {
            Ok(obj @ Object::Reference(_)) => match graph::resolve_id(doc, obj) {
                Some(id) => Dr::Indirect(id),
                None => Dr::Missing,
            },
            Ok(Object::Dictionary(dict)) => Dr::Direct(dict.clone()),
            _ => Dr::Missing,
        }
    };
    match dr {
        Dr::Missing => Ok(None),
        Dr::Indirect(id) => Ok(Some(id)),
        Dr::Direct(dict) => {
            let id = doc.add_object(Object::Dictionary(dict));
            form_dict_mut(doc, slot)?.set("DR", Object::Reference(id));
            Ok(Some(id))
        },
    }
}

/// Flatten one page. Returns (flattened, preserved) annotation counts.
fn flatten_page(
    doc: &mut Document,
    page_id: ObjectId,
    options: &FlattenOptions,
) -> Result<(usize, usize)> {
    let annots: Vec<Object> = {
        let page = doc.get_dictionary(page_id)?;
        match page.get(b"Annots").ok().and_then(|obj| graph::resolve(doc, obj).ok()) {
            Some(Object::Array(items)) => items.clone(),
            // Pages without a usable annotation list are skipped.
            _ => return Ok((0, 0)),
        }
    };
    if annots.is_empty() {
        return Ok((0, 0));
    }

    let mut preserved: Vec<Object> = Vec::new();
    let mut overlay = PageOverlay::new();
    let mut name_counter: u32 = 1;

    for item in annots {
        let annot_id = match item.as_reference() {
            Ok(id) => id,
            Err(_) => {
                // Registration shares appearances by reference, which needs
                // object identity; entries without it stay interactive.
                log::debug!("annotation without object identity preserved as-is");
                preserved.push(item);
                continue;
            },
        };
        let eligible = match doc.get_dictionary(annot_id) {
            Ok(annot) => {
                annotation::is_widget(doc, annot)
                    && annotation::annotation_flags(doc, annot).renders()
            },
            Err(err) => {
                log::warn!(
                    "unreadable annotation {} {} R: {}",
                    annot_id.0,
                    annot_id.1,
                    err
                );
                false
            },
        };
        if !eligible {
            preserved.push(item);
            continue;
        }

        match flatten_widget(doc, page_id, annot_id, options, &mut overlay, &mut name_counter) {
            Ok(()) => {},
            Err(err) if err.is_recoverable() => {
                log::warn!("{}; widget left interactive", err);
                preserved.push(item);
            },
            Err(err) => return Err(err),
        }
    }

    let flattened = overlay.placed();
    let preserved_count = preserved.len();
    if let Some(buf) = overlay.finish() {
        overlay::apply_overlay(doc, page_id, buf)?;
        doc.get_object_mut(page_id)?
            .as_dict_mut()?
            .set("Annots", preserved);
    }
    Ok((flattened, preserved_count))
}

fn flatten_widget(
    doc: &mut Document,
    page_id: ObjectId,
    annot_id: ObjectId,
    options: &FlattenOptions,
    overlay: &mut PageOverlay,
    name_counter: &mut u32,
) -> Result<()> {
    let rect = annotation::annotation_rect(doc, annot_id)?;
    let ap_id = appearance::resolve_appearance(doc, annot_id, &rect)?;
    let matrix = transform::placement_matrix(doc, &rect, ap_id)?;

    let name = overlay::xobject_name(doc, ap_id, name_counter)?;
    overlay::register_xobject(doc, page_id, &name, ap_id)?;
    if options.debug_boxes {
        overlay.debug_box(&rect);
    }
    overlay.place(&name, &matrix);
    Ok(())
}
