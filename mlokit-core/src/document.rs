//! Archetype definition (YTYP) documents
//!
//! Wraps the parsed `.ytyp.rsc.xml` tree together with the path it was
//! loaded from, so every transformation writes back to the same file.

use std::fs;
use std::path::{Path, PathBuf};

use xmltree::{Element, EmitterConfig};

use crate::query::{child_text, find_all};

/// Suffix of archetype definition files exported by CodeWalker
pub const YTYP_SUFFIX: &str = ".ytyp.rsc.xml";

/// Archetype `type` attribute marking an interior
pub const MLO_ARCHETYPE_TYPE: &str = "CMloArchetypeDef";

/// Extension `type` attribute marking a door
pub const DOOR_EXTENSION_TYPE: &str = "CExtensionDefDoor";

/// Errors that can occur while loading or saving a document
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("No YTYP file is loaded")]
    NotLoaded,

    #[error("Failed to read YTYP file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YTYP file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: xmltree::ParseError,
    },

    #[error("Failed to serialize YTYP document: {0}")]
    Serialize(#[from] xmltree::Error),

    #[error("Failed to write YTYP file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A loaded archetype definition file
#[derive(Debug, Clone)]
pub struct ArchetypeDocument {
    path: PathBuf,
    root: Element,
}

/// The interior archetype located inside a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MloArchetype {
    /// Interior display name, also used as its collision name
    pub name: String,
    /// Distinct entity archetype names, in first-seen order
    pub props: Vec<String>,
}

impl ArchetypeDocument {
    /// Parse a document from disk
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DocumentError> {
        let path = path.as_ref().to_path_buf();
        let bytes = fs::read(&path).map_err(|source| DocumentError::Read {
            path: path.clone(),
            source,
        })?;
        let root = Element::parse(bytes.as_slice())
            .map_err(|source| DocumentError::Parse { path: path.clone(), source })?;
        Ok(Self { path, root })
    }

    /// Path the document was loaded from and is saved to
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    /// Parent ytyp name: the file name without `.ytyp.rsc.xml`
    pub fn base_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().replace(YTYP_SUFFIX, ""))
            .unwrap_or_default()
    }

    /// Default IMAP name offered for the manifest (`<base>_y`)
    pub fn default_imap_name(&self) -> String {
        format!("{}_y", self.base_name())
    }

    /// Locate the interior archetype and the props its entities reference
    pub fn mlo_archetype(&self) -> Option<MloArchetype> {
        let archetype = find_all(&self.root, &["archetypes", "Item"])
            .into_iter()
            .find(|item| {
                item.attributes.get("type").map(String::as_str) == Some(MLO_ARCHETYPE_TYPE)
                    && item.get_child("name").is_some()
            })?;

        let name = child_text(archetype, "name").unwrap_or_default();

        let mut props: Vec<String> = Vec::new();
        for entity in entity_items(archetype) {
            if let Some(prop) = child_text(entity, "archetypeName") {
                if !props.contains(&prop) {
                    props.push(prop);
                }
            }
        }

        Some(MloArchetype { name, props })
    }

    /// Number of door extension items anywhere in the document
    pub fn door_count(&self) -> usize {
        crate::query::descendants(&self.root)
            .into_iter()
            .filter(|el| {
                el.name == "Item"
                    && el.attributes.get("type").map(String::as_str) == Some(DOOR_EXTENSION_TYPE)
            })
            .count()
    }

    /// Number of room items, named or not
    pub fn room_count(&self) -> usize {
        find_all(&self.root, &["rooms", "Item"]).len()
    }

    /// Sorted names of rooms that carry a `name` child
    pub fn room_names(&self) -> Vec<String> {
        let mut names: Vec<String> = find_all(&self.root, &["rooms", "Item"])
            .into_iter()
            .filter_map(|room| child_text(room, "name"))
            .collect();
        names.sort();
        names
    }

    /// Serialize with an XML declaration and two-space indentation
    pub fn to_xml_bytes(&self) -> Result<Vec<u8>, DocumentError> {
        let config = EmitterConfig::new()
            .perform_indent(true)
            .indent_string("  ")
            .write_document_declaration(true);
        let mut out = Vec::new();
        self.root.write_with_config(&mut out, config)?;
        out.push(b'\n');
        Ok(out)
    }

    /// Write the document back to the path it was loaded from
    pub fn save(&self) -> Result<(), DocumentError> {
        let bytes = self.to_xml_bytes()?;
        fs::write(&self.path, bytes).map_err(|source| DocumentError::Write {
            path: self.path.clone(),
            source,
        })?;
        tracing::debug!("Saved YTYP file {:?}", self.path);
        Ok(())
    }

    /// Save, then re-read from disk so memory matches the written file
    pub fn save_and_reload(&self) -> Result<Self, DocumentError> {
        self.save()?;
        Self::load(&self.path)
    }
}

fn entity_items(archetype: &Element) -> impl Iterator<Item = &Element> {
    crate::query::children_named(archetype, "entities")
        .flat_map(|entities| crate::query::children_named(entities, "Item"))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::TempDir;

    pub(crate) const SALOON_YTYP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<CMapTypes>
  <extensions />
  <archetypes>
    <Item type="CMloArchetypeDef">
      <lodDist value="100.0" />
      <name>int_saloon_mlo</name>
      <entities>
        <Item type="CEntityDef">
          <archetypeName>v_ilev_saloon_bar</archetypeName>
        </Item>
        <Item type="CEntityDef">
          <archetypeName> p_chair01x </archetypeName>
        </Item>
        <Item type="CEntityDef">
          <archetypeName>v_ilev_saloon_bar</archetypeName>
        </Item>
      </entities>
      <rooms>
        <Item>
          <name>limbo</name>
        </Item>
        <Item>
          <name>main_hall</name>
        </Item>
      </rooms>
    </Item>
  </archetypes>
  <name>int_saloon</name>
</CMapTypes>
"#;

    pub(crate) fn write_ytyp(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_and_base_name() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_ytyp(temp_dir.path(), "int_saloon.ytyp.rsc.xml", SALOON_YTYP);

        let doc = ArchetypeDocument::load(&path).unwrap();
        assert_eq!(doc.base_name(), "int_saloon");
        assert_eq!(doc.default_imap_name(), "int_saloon_y");
        assert_eq!(doc.root().name, "CMapTypes");
    }

    #[test]
    fn test_mlo_archetype_props_deduplicated() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_ytyp(temp_dir.path(), "int_saloon.ytyp.rsc.xml", SALOON_YTYP);

        let mlo = ArchetypeDocument::load(&path).unwrap().mlo_archetype().unwrap();
        assert_eq!(mlo.name, "int_saloon_mlo");
        assert_eq!(mlo.props, vec!["v_ilev_saloon_bar", "p_chair01x"]);
    }

    #[test]
    fn test_missing_mlo_archetype() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_ytyp(
            temp_dir.path(),
            "props.ytyp.rsc.xml",
            r#"<CMapTypes><archetypes><Item type="CBaseArchetypeDef"><name>a</name></Item></archetypes></CMapTypes>"#,
        );

        let doc = ArchetypeDocument::load(&path).unwrap();
        assert!(doc.mlo_archetype().is_none());
    }

    #[test]
    fn test_rooms_and_doors() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_ytyp(temp_dir.path(), "int_saloon.ytyp.rsc.xml", SALOON_YTYP);

        let doc = ArchetypeDocument::load(&path).unwrap();
        assert_eq!(doc.room_count(), 2);
        assert_eq!(doc.room_names(), vec!["limbo", "main_hall"]);
        assert_eq!(doc.door_count(), 0);
    }

    #[test]
    fn test_parse_error_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_ytyp(temp_dir.path(), "broken.ytyp.rsc.xml", "<CMapTypes><archetypes>");

        let err = ArchetypeDocument::load(&path).unwrap_err();
        assert!(matches!(err, DocumentError::Parse { .. }));
    }

    #[test]
    fn test_save_and_reload_preserves_content() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_ytyp(temp_dir.path(), "int_saloon.ytyp.rsc.xml", SALOON_YTYP);

        let doc = ArchetypeDocument::load(&path).unwrap();
        let reloaded = doc.save_and_reload().unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("<?xml"));
        assert!(written.contains("\n  <archetypes>"));
        assert_eq!(reloaded.mlo_archetype(), doc.mlo_archetype());
        assert_eq!(reloaded.room_names(), doc.room_names());
    }
}
