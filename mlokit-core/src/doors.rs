//! Door extension angle correction
//!
//! RedM no longer reads the legacy `<limitAngle>` tag on `CExtensionDefDoor`
//! items; it expects a pair of hashed tags instead. Exports also commonly
//! carry `value="false"` on those tags, which the game treats as a zero
//! angle. Two rules fix both, tree-wide:
//!
//! 1. `<limitAngle value="X" />` becomes
//!    `<nbjubyaa_0xcfe37bdb value="X" />` followed by
//!    `<gfkrydta_0xa0cf3c8d value="X" />`, in the same position.
//! 2. Any of those two tags with `value="false"` gets the supplied angle.
//!
//! Running the correction twice is a no-op the second time.

use xmltree::{Element, XMLNode};

use crate::document::{ArchetypeDocument, DocumentError};
use crate::query::child_text;
use crate::session::Session;

pub const LEGACY_ANGLE_TAG: &str = "limitAngle";

/// Replacement tags, in insertion order
pub const ANGLE_TAGS: [&str; 2] = ["nbjubyaa_0xcfe37bdb", "gfkrydta_0xa0cf3c8d"];

const FALSE_VALUE: &str = "false";

#[derive(Debug, thiserror::Error)]
pub enum DoorError {
    #[error("'{0}' is not a valid numerical value")]
    InvalidAngle(String),

    #[error(transparent)]
    Document(#[from] DocumentError),
}

/// One `<limitAngle>` converted by rule 1
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AngleConversion {
    /// `name` of the item that held the element, if it has one
    pub owner: Option<String>,
    pub value: Option<String>,
}

/// One `value="false"` overwritten by rule 2
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AngleUpdate {
    pub owner: Option<String>,
    pub tag: String,
}

#[derive(Debug, Clone, Default)]
pub struct DoorReport {
    pub door_extensions: usize,
    /// The angle rule 2 wrote
    pub angle: String,
    pub conversions: Vec<AngleConversion>,
    pub updates: Vec<AngleUpdate>,
    /// Whether the YTYP file was rewritten
    pub saved: bool,
}

impl DoorReport {
    pub fn modified(&self) -> bool {
        !self.conversions.is_empty() || !self.updates.is_empty()
    }
}

/// Pick the angle to write and validate it as a number
///
/// An empty or missing value falls back to `default`.
pub fn resolve_angle(requested: Option<&str>, default: &str) -> Result<String, DoorError> {
    let angle = match requested.map(str::trim) {
        Some(value) if !value.is_empty() => value,
        _ => {
            tracing::info!("No angle value given, using default: {}", default);
            default.trim()
        }
    };

    angle
        .parse::<f64>()
        .map(|_| angle.to_string())
        .map_err(|_| DoorError::InvalidAngle(angle.to_string()))
}

/// Correct door angles in the session's document
///
/// The rules run on a copy; the session's document is replaced by the
/// re-read file only after a successful write, and left alone when nothing
/// matched.
pub fn correct_door_angles(session: &mut Session, requested_angle: Option<&str>) -> Result<DoorReport, DoorError> {
    let angle = resolve_angle(requested_angle, &session.config().default_angle)?;
    let mut working: ArchetypeDocument = session.document()?.clone();

    let mut report = apply_rules(working.root_mut(), &angle);
    report.door_extensions = working.door_count();
    tracing::info!("{} door extension(s) detected", report.door_extensions);

    if report.modified() {
        let reloaded = working.save_and_reload()?;
        session.replace_document(reloaded);
        report.saved = true;
        tracing::info!(
            "Door correction saved ({} converted, {} updated)",
            report.conversions.len(),
            report.updates.len()
        );
    } else {
        tracing::info!("No modifications were made, angle values seem correct");
    }

    Ok(report)
}

/// Run both rules over `root`, rule 1 first
pub fn apply_rules(root: &mut Element, angle: &str) -> DoorReport {
    let mut report = DoorReport {
        angle: angle.to_string(),
        ..Default::default()
    };
    convert_legacy_angles(root, &mut report.conversions);
    replace_false_angles(root, angle, &mut report.updates);
    report
}

fn convert_legacy_angles(el: &mut Element, conversions: &mut Vec<AngleConversion>) {
    let owner = child_text(el, "name");

    let mut idx = 0;
    while idx < el.children.len() {
        let legacy_value = match &el.children[idx] {
            XMLNode::Element(child) if child.name == LEGACY_ANGLE_TAG => {
                Some(child.attributes.get("value").cloned())
            }
            _ => None,
        };

        if let Some(value) = legacy_value {
            tracing::debug!("Converting <{}> in {:?}", LEGACY_ANGLE_TAG, owner);
            let replacements = ANGLE_TAGS.map(|tag| XMLNode::Element(angle_element(tag, value.as_deref())));
            el.children.splice(idx..=idx, replacements);
            conversions.push(AngleConversion {
                owner: owner.clone(),
                value,
            });
            idx += ANGLE_TAGS.len();
            continue;
        }

        if let XMLNode::Element(child) = &mut el.children[idx] {
            convert_legacy_angles(child, conversions);
        }
        idx += 1;
    }
}

fn angle_element(tag: &str, value: Option<&str>) -> Element {
    let mut element = Element::new(tag);
    if let Some(value) = value {
        element.attributes.insert("value".to_string(), value.to_string());
    }
    element
}

fn replace_false_angles(el: &mut Element, angle: &str, updates: &mut Vec<AngleUpdate>) {
    let owner = child_text(el, "name");

    for node in el.children.iter_mut() {
        let XMLNode::Element(child) = node else {
            continue;
        };

        if ANGLE_TAGS.contains(&child.name.as_str()) {
            if let Some(value) = child.attributes.get_mut("value") {
                if *value == FALSE_VALUE {
                    *value = angle.to_string();
                    updates.push(AngleUpdate {
                        owner: owner.clone(),
                        tag: child.name.clone(),
                    });
                }
            }
        }

        replace_false_angles(child, angle, updates);
    }
}
