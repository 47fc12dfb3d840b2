//! Interior manifest (`_manifest.ymf`) generation
//!
//! Cross-references the props placed in an interior against the local
//! `DATA_BASE` lookup directory to find which ytyp files must be loaded
//! alongside the interior, then renders the `CPackFileMetaData` manifest.
//!
//! Each database file looks like:
//!
//! ```xml
//! <RPF name="int_saloon">
//!   <Prop_Name>v_ilev_saloon_bar</Prop_Name>
//! </RPF>
//! ```

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use xmltree::Element;

use crate::document::DocumentError;
use crate::query::children_named;
use crate::session::Session;

/// Comment lines heading the missing-props report
const MISSING_REPORT_HEADER: &str = "# This file lists all entities for which a parent ytyp was not found in the DATA_BASE.\n\
# You may need to find the corresponding ytyp in Codex or else and add them by hand to the _manifest\n\n";

/// Prop name mapped to the ytyp (dependency) that provides it
pub type DependencyMap = HashMap<String, String>;

/// Output flavour of the manifest file
///
/// Both carry the same XML; only the extension differs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ManifestFormat {
    #[default]
    Ymf,
    PsoXml,
}

impl ManifestFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ManifestFormat::Ymf => ".ymf",
            ManifestFormat::PsoXml => ".ymf.pso.xml",
        }
    }
}

/// Errors that can occur during manifest generation
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("'DATA_BASE' directory not found; place it next to the executable or set databaseDir")]
    DatabaseNotFound,

    #[error("Failed to read DATA_BASE directory {path}: {source}")]
    DatabaseRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to compile the XML declaration pattern")]
    DeclarationPattern,

    #[error("IMAP name must not be empty")]
    EmptyImapName,

    #[error("Could not find a {} archetype", crate::document::MLO_ARCHETYPE_TYPE)]
    MloNotFound,

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Parameters for one manifest generation
#[derive(Debug, Clone)]
pub struct ManifestRequest {
    /// IMAP the interior is placed by; defaults to `<ytyp>_y`
    pub imap_name: Option<String>,
    pub format: ManifestFormat,
    /// Overrides the configured database directory
    pub database_dir: Option<PathBuf>,
}

/// Result of a successful manifest generation
#[derive(Debug, Clone)]
pub struct ManifestReport {
    pub manifest_path: PathBuf,
    /// Written only when at least one prop was unresolved
    pub missing_report_path: Option<PathBuf>,
    pub imap_name: String,
    pub collision_name: String,
    /// Parent ytyp first, then resolved dependencies in first-seen order
    pub dependencies: Vec<String>,
    /// Props with no database entry and no parent-ytyp prefix
    pub missing_props: Vec<String>,
}

/// Build the manifest for the session's document and write it next to it
pub fn generate_manifest(session: &Session, request: &ManifestRequest) -> Result<ManifestReport, ManifestError> {
    let database_dir = match &request.database_dir {
        Some(dir) if dir.is_dir() => dir.clone(),
        Some(_) => return Err(ManifestError::DatabaseNotFound),
        None => session
            .config()
            .resolve_database_dir()
            .ok_or(ManifestError::DatabaseNotFound)?,
    };

    let document = session.document()?;
    let imap_name = request
        .imap_name
        .clone()
        .unwrap_or_else(|| document.default_imap_name());
    if imap_name.trim().is_empty() {
        return Err(ManifestError::EmptyImapName);
    }

    let parent_ytyp = document.base_name();
    let mlo = document.mlo_archetype().ok_or(ManifestError::MloNotFound)?;
    tracing::info!(
        "Analyzing {} ({} distinct prop(s), collision name {})",
        parent_ytyp,
        mlo.props.len(),
        mlo.name
    );

    let prop_map = build_dependency_map(&database_dir)?;
    let (dependencies, missing_props) = resolve_dependencies(&parent_ytyp, &mlo.props, &prop_map);

    let out_dir = document.path().parent().unwrap_or_else(|| Path::new("."));
    let manifest_base = format!("_manifest_{}", parent_ytyp);

    let missing_report_path = if missing_props.is_empty() {
        None
    } else {
        let path = out_dir.join(format!("missing_ytyp_for_{}.txt", manifest_base));
        write_missing_report(&path, &missing_props)?;
        Some(path)
    };

    let manifest_path = out_dir.join(format!("{}{}", manifest_base, request.format.extension()));
    let content = render_manifest(&imap_name, &mlo.name, &dependencies);
    fs::write(&manifest_path, content).map_err(|source| ManifestError::Write {
        path: manifest_path.clone(),
        source,
    })?;
    tracing::info!("Manifest written to {:?}", manifest_path);

    Ok(ManifestReport {
        manifest_path,
        missing_report_path,
        imap_name,
        collision_name: mlo.name,
        dependencies,
        missing_props,
    })
}

/// Scan the lookup database and map every prop name to its ytyp
///
/// Rebuilt on every call. Files are read in name order and a later file
/// wins when two declare the same prop. Unreadable or malformed files are
/// logged and skipped.
pub fn build_dependency_map(database_dir: &Path) -> Result<DependencyMap, ManifestError> {
    let entries = fs::read_dir(database_dir).map_err(|source| ManifestError::DatabaseRead {
        path: database_dir.to_path_buf(),
        source,
    })?;

    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(".xml"))
        })
        .collect();
    files.sort();

    let declaration = xml_declaration_pattern()?;
    let mut prop_map = DependencyMap::new();

    for path in files {
        match parse_descriptor(&path, declaration) {
            Ok(Some((ytyp_name, props))) => {
                for prop in props {
                    prop_map.insert(prop, ytyp_name.clone());
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Could not parse {:?}: {}", path.file_name().unwrap_or_default(), e),
        }
    }

    tracing::debug!("DATA_BASE maps {} prop(s)", prop_map.len());
    Ok(prop_map)
}

static XML_DECLARATION: OnceLock<Option<Regex>> = OnceLock::new();

/// Pattern for `<?xml ...?>` declarations, compiled once
fn xml_declaration_pattern() -> Result<&'static Regex, ManifestError> {
    XML_DECLARATION
        .get_or_init(|| Regex::new(r"<\?xml.*?\?>").ok())
        .as_ref()
        .ok_or(ManifestError::DeclarationPattern)
}

#[derive(Debug, thiserror::Error)]
enum DescriptorError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Xml(#[from] xmltree::ParseError),
}

/// Parse one database file into its ytyp name and provided props
fn parse_descriptor(path: &Path, declaration: &Regex) -> Result<Option<(String, Vec<String>)>, DescriptorError> {
    let raw = fs::read_to_string(path)?;
    let content = raw.strip_prefix('\u{feff}').unwrap_or(&raw);
    let cleaned = declaration.replace_all(content, "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return Ok(None);
    }

    let root = Element::parse(cleaned.as_bytes())?;
    let Some(ytyp_name) = root.attributes.get("name").map(|n| n.trim().to_string()) else {
        return Ok(None);
    };
    if ytyp_name.is_empty() {
        return Ok(None);
    }

    let props = children_named(&root, "Prop_Name")
        .filter_map(|node| node.get_text())
        .map(|text| text.trim().to_string())
        .collect();

    Ok(Some((ytyp_name, props)))
}

/// Resolve props to dependencies, returning `(dependencies, missing_props)`
///
/// Dependencies start with the parent ytyp and are deduplicated in first-seen
/// order. A prop whose name starts with the parent ytyp is assumed to live in
/// it and is never reported missing.
pub fn resolve_dependencies(
    parent_ytyp: &str,
    props: &[String],
    prop_map: &DependencyMap,
) -> (Vec<String>, Vec<String>) {
    let mut dependencies = vec![parent_ytyp.to_string()];
    let mut seen: HashSet<&str> = HashSet::from([parent_ytyp]);
    let mut missing = Vec::new();
    let mut missing_seen = HashSet::new();

    for prop in props {
        if let Some(ytyp) = prop_map.get(prop) {
            if seen.insert(ytyp.as_str()) {
                dependencies.push(ytyp.clone());
            }
        } else if !prop.starts_with(parent_ytyp) && missing_seen.insert(prop.as_str()) {
            missing.push(prop.clone());
        }
    }

    (dependencies, missing)
}

/// Render the `CPackFileMetaData` manifest
pub fn render_manifest(imap_name: &str, collision_name: &str, dependencies: &[String]) -> String {
    let dep_items = dependencies
        .iter()
        .map(|dep| format!("        <Item>{}</Item>", dep))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<CPackFileMetaData>
  <MapDataGroups />
  <HDTxdBindingArray />
  <imapDependencies />
  <imapDependencies_2>
    <Item>
      <imapName>{imap_name}</imapName>
      <manifestFlags>INTERIOR_DATA</manifestFlags>
      <itypDepArray>
{dep_items}
      </itypDepArray>
    </Item>
  </imapDependencies_2>
  <itypDependencies_2 />
  <Interiors>
    <Item>
      <Name>{collision_name}</Name>
      <Bounds>
        <Item>{collision_name}</Item>
      </Bounds>
    </Item>
  </Interiors>
  <redm_loves_you_7cc2afb2d40476ed />
  <redm_loves_you_c1fa8cdfbc6c9972 />
  <txdRelationships />
  <imapAliases />
  <assetOwnerMap />
</CPackFileMetaData>
"#
    )
}

fn write_missing_report(path: &Path, missing_props: &[String]) -> Result<(), ManifestError> {
    let mut content = String::from(MISSING_REPORT_HEADER);
    for prop in missing_props {
        content.push_str(prop);
        content.push('\n');
    }
    fs::write(path, content).map_err(|source| ManifestError::Write {
        path: path.to_path_buf(),
        source,
    })
}
