//! Reflection probe assignment
//!
//! Probe exports live in a folder tree where each interior export has a
//! `ref_probes/output` directory holding `*_YTYP.xml` fragments rooted at
//! `<reflectionProbes>`. Fragments are discovered, assigned to rooms by the
//! operator, then spliced into the YTYP, replacing whatever probes each
//! target room had.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;
use xmltree::{Element, XMLNode};

use crate::config::ToolConfig;
use crate::document::DocumentError;
use crate::query::{child_text, element_at_mut, locate};
use crate::session::Session;

/// Root tag of a valid probe fragment (and of a room's probe subtree)
pub const PROBES_TAG: &str = "reflectionProbes";

/// Path from any descendant to a room item
const ROOM_PATH: [&str; 2] = ["rooms", "Item"];

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("Probe source folder not found: {0}")]
    SourceNotFound(PathBuf),

    #[error(transparent)]
    Document(#[from] DocumentError),
}

/// A probe fragment found on disk
#[derive(Debug, Clone)]
pub struct ProbeFragment {
    /// Display name, `<folder above output> -- (<file name>)`, e.g.
    /// `ref_probes -- (hall_YTYP.xml)`
    pub name: String,
    pub path: PathBuf,
    pub root: Element,
}

/// Outcome of a folder scan
#[derive(Debug, Clone, Default)]
pub struct DiscoveryReport {
    /// Accepted fragments, counting ones later overwritten by a same-named fragment
    pub accepted: usize,
    /// Fragment names now available, sorted
    pub names: Vec<String>,
}

/// Outcome of applying assignments
#[derive(Debug, Clone, Default)]
pub struct ApplyReport {
    /// `(probe name, room name)` pairs that were spliced in
    pub applied: Vec<(String, String)>,
    /// Assigned room names with no matching room in the document
    pub unmatched_rooms: Vec<String>,
    pub saved: bool,
}

/// Scan `source` for probe fragments and make them the session's probe set
///
/// The previous set is discarded; assignments are kept. Files that fail to
/// parse, or whose root is not `<reflectionProbes>`, are skipped silently.
pub fn load_probe_folder(session: &mut Session, source: &Path) -> Result<DiscoveryReport, ProbeError> {
    session.document()?;
    if !source.is_dir() {
        return Err(ProbeError::SourceNotFound(source.to_path_buf()));
    }

    let (probes, accepted) = discover_probes(source, session.config());
    let report = DiscoveryReport {
        accepted,
        names: probes.keys().cloned().collect(),
    };

    if accepted == 0 {
        tracing::warn!("No valid probes found in {:?}", source);
    } else {
        tracing::info!("{} probe(s) found in {:?}", accepted, source);
    }

    session.set_probes(probes);
    Ok(report)
}

/// Walk `source` and collect fragments keyed by display name
///
/// Returns the map and the number of files accepted. The label is the
/// folder directly above the export directory, so fragments sharing a file
/// name across exports collide; walk order is sorted by file name and the
/// last one wins. Walk errors are logged and skipped.
pub fn discover_probes(source: &Path, config: &ToolConfig) -> (BTreeMap<String, ProbeFragment>, usize) {
    let mut probes = BTreeMap::new();
    let mut accepted = 0;

    let walker = WalkDir::new(source).sort_by_file_name().into_iter();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Failed to read probe folder entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_dir() || !ends_with_components(entry.path(), &config.probe_path_suffix) {
            continue;
        }

        let Some(label) = export_label(entry.path()) else {
            continue;
        };

        for file in fragment_files(entry.path(), &config.probe_file_suffix) {
            let Some(root) = parse_fragment(&file) else {
                tracing::debug!("Skipping {:?}", file);
                continue;
            };
            let file_name = file.file_name().and_then(OsStr::to_str).unwrap_or_default();
            let name = format!("{} -- ({})", label, file_name);

            accepted += 1;
            probes.insert(
                name.clone(),
                ProbeFragment {
                    name,
                    path: file.clone(),
                    root,
                },
            );
        }
    }

    (probes, accepted)
}

fn ends_with_components(path: &Path, suffix: &[String]) -> bool {
    let components: Vec<&OsStr> = path.iter().collect();
    !suffix.is_empty()
        && components.len() >= suffix.len()
        && components[components.len() - suffix.len()..]
            .iter()
            .zip(suffix)
            .all(|(component, expected)| *component == OsStr::new(expected))
}

/// Name of the folder directly above the export directory
fn export_label(dir: &Path) -> Option<String> {
    dir.parent()
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().to_string())
}

fn fragment_files(dir: &Path, suffix: &str) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(OsStr::to_str)
                    .is_some_and(|n| n.ends_with(suffix))
        })
        .collect();
    files.sort();
    files
}

fn parse_fragment(path: &Path) -> Option<Element> {
    let bytes = fs::read(path).ok()?;
    let root = Element::parse(bytes.as_slice()).ok()?;
    (root.name == PROBES_TAG).then_some(root)
}

/// Splice every assigned fragment into its room and save the document
///
/// Assignments run in probe-name order. A room is matched by exact `name`
/// text, first match wins. Any `<reflectionProbes>` the room already had is
/// removed before the fragment is appended. Nothing is written when no
/// assignment applied.
pub fn apply_assignments(session: &mut Session) -> Result<ApplyReport, ProbeError> {
    let mut working = session.document()?.clone();
    let mut report = ApplyReport::default();

    for (probe_name, room_name) in session.assignments() {
        if room_name.is_empty() {
            continue;
        }
        let Some(fragment) = session.probes().get(probe_name) else {
            tracing::debug!("Assignment for unknown probe {:?} ignored", probe_name);
            continue;
        };

        if replace_room_probes(working.root_mut(), room_name, &fragment.root) {
            tracing::info!("{} -> '{}'", probe_name, room_name);
            report.applied.push((probe_name.clone(), room_name.clone()));
        } else {
            tracing::warn!("Room '{}' not found in the YTYP", room_name);
            report.unmatched_rooms.push(room_name.clone());
        }
    }

    if report.applied.is_empty() {
        tracing::info!("No assignments were selected to be applied");
        return Ok(report);
    }

    working.save()?;
    session.replace_document(working);
    report.saved = true;
    tracing::info!("{} assignment(s) applied", report.applied.len());

    Ok(report)
}

/// Replace the probe subtree of the room named `room_name`
///
/// Returns false when no room has that name.
pub fn replace_room_probes(root: &mut Element, room_name: &str, probes: &Element) -> bool {
    let Some(route) = locate(root, &ROOM_PATH, |room| {
        child_text(room, "name").as_deref() == Some(room_name)
    }) else {
        return false;
    };
    let Some(room) = element_at_mut(root, &route) else {
        return false;
    };

    room.children
        .retain(|node| !matches!(node, XMLNode::Element(child) if child.name == PROBES_TAG));
    room.children.push(XMLNode::Element(probes.clone()));
    true
}
