//! Request payloads shared between the external `IngestAPI` surface and
//! the scheduler/worker command enums. See `spec.md` §6 and §4.C.

/// One override or flavor layer contributed to a document's composition.
pub type OverrideName = String;

/// A document name; validated by `Builder::is_a_valid_document_name`.
pub type DocumentName = String;

/// Parameters of a `Get`/`Watch` request: which document, seen through
/// which override/flavor stack, optionally rendered through a template,
/// as of which version (`0` means "current").
#[derive(Clone, Debug)]
pub struct DocumentView {
    pub root_path: String,
    pub overrides: Vec<OverrideName>,
    pub flavors: Vec<OverrideName>,
    pub document: DocumentName,
    pub template: Option<DocumentName>,
    pub version: u32,
}

/// One `(document, override)` pair touched by an `Update`.
#[derive(Clone, Debug)]
pub struct DocumentUpdate {
    pub document: DocumentName,
    pub r#override: OverrideName,
    pub flavor: Option<OverrideName>,
    /// `None` means this update deletes the document at this override/flavor.
    pub value: Option<crate::model::Element>,
    pub reference_to: Vec<DocumentName>,
}

/// Validates the structural rules the core enforces before scheduling:
/// non-empty document name with no path separators, template names
/// beginning with `_`, no duplicate overrides/flavors (`spec.md` §6).
pub fn validate_document_view(view: &DocumentView) -> crate::error::Result<()> {
    use crate::error::MhConfigError;
    if view.document.is_empty() || view.document.contains('/') || view.document.contains('\\') {
        return Err(MhConfigError::InvalidArguments(format!(
            "invalid document name: {:?}",
            view.document
        )));
    }
    if let Some(template) = &view.template {
        if !template.starts_with('_') {
            return Err(MhConfigError::InvalidArguments(format!(
                "template name must start with '_': {template:?}"
            )));
        }
    }
    if has_duplicates(&view.overrides) {
        return Err(MhConfigError::InvalidArguments(
            "duplicate override in request".into(),
        ));
    }
    if has_duplicates(&view.flavors) {
        return Err(MhConfigError::InvalidArguments(
            "duplicate flavor in request".into(),
        ));
    }
    Ok(())
}

fn has_duplicates(items: &[String]) -> bool {
    let mut seen = std::collections::HashSet::with_capacity(items.len());
    !items.iter().all(|item| seen.insert(item))
}

/// The string an override layer's raw-config history is indexed under.
/// An update always names exactly one override, and optionally the
/// flavor it's specific to; a `Get`/`Watch` resolves one key per
/// `(override, flavor)` combination it asks for, so both sides must
/// agree on this exact composition.
pub fn override_key_string(r#override: &str, flavor: Option<&str>) -> String {
    match flavor {
        Some(f) => format!("{override}\u{1f}{f}"),
        None => r#override.to_string(),
    }
}
