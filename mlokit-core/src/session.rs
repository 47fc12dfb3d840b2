//! Editing session
//!
//! Holds the single active YTYP document, the probe fragments discovered for
//! it, and the operator's probe-to-room assignments. Every transformation
//! takes the session explicitly.

use std::collections::BTreeMap;
use std::path::Path;

use crate::config::ToolConfig;
use crate::document::{ArchetypeDocument, DocumentError};
use crate::probes::ProbeFragment;

#[derive(Debug, Default)]
pub struct Session {
    config: ToolConfig,
    document: Option<ArchetypeDocument>,
    probes: BTreeMap<String, ProbeFragment>,
    assignments: BTreeMap<String, String>,
}

impl Session {
    pub fn new(config: ToolConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &ToolConfig {
        &self.config
    }

    /// Load a YTYP file, replacing the active document
    ///
    /// Discovered probes and assignments belong to the previous document and
    /// are dropped. On failure the session is left without a document.
    pub fn load_document<P: AsRef<Path>>(&mut self, path: P) -> Result<&ArchetypeDocument, DocumentError> {
        self.document = None;
        self.probes.clear();
        self.assignments.clear();

        let document = ArchetypeDocument::load(path)?;
        tracing::info!(
            "Loaded {} ({} room(s), {} door extension(s))",
            document.base_name(),
            document.room_count(),
            document.door_count()
        );
        Ok(self.document.insert(document))
    }

    pub fn document(&self) -> Result<&ArchetypeDocument, DocumentError> {
        self.document.as_ref().ok_or(DocumentError::NotLoaded)
    }

    /// Swap in a document produced from the active one (e.g. after a save)
    pub(crate) fn replace_document(&mut self, document: ArchetypeDocument) {
        self.document = Some(document);
    }

    /// Probe fragments from the most recent folder scan, keyed by display name
    pub fn probes(&self) -> &BTreeMap<String, ProbeFragment> {
        &self.probes
    }

    pub(crate) fn set_probes(&mut self, probes: BTreeMap<String, ProbeFragment>) {
        self.probes = probes;
    }

    /// Current probe-to-room assignments, keyed by probe display name
    pub fn assignments(&self) -> &BTreeMap<String, String> {
        &self.assignments
    }

    /// Assign a probe to a room; an empty room name clears the assignment
    pub fn assign(&mut self, probe_name: &str, room_name: &str) {
        if room_name.is_empty() {
            self.assignments.remove(probe_name);
        } else {
            self.assignments
                .insert(probe_name.to_string(), room_name.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::tests::{write_ytyp, SALOON_YTYP};
    use tempfile::TempDir;

    #[test]
    fn test_no_document_loaded() {
        let session = Session::default();
        assert!(matches!(session.document(), Err(DocumentError::NotLoaded)));
    }

    #[test]
    fn test_assign_and_clear() {
        let mut session = Session::default();
        session.assign("hall -- (a_YTYP.xml)", "main_hall");
        session.assign("hall -- (b_YTYP.xml)", "limbo");
        session.assign("hall -- (a_YTYP.xml)", "");

        assert_eq!(session.assignments().len(), 1);
        assert_eq!(
            session.assignments().get("hall -- (b_YTYP.xml)").map(String::as_str),
            Some("limbo")
        );
    }

    #[test]
    fn test_loading_resets_assignments() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_ytyp(temp_dir.path(), "int_saloon.ytyp.rsc.xml", SALOON_YTYP);

        let mut session = Session::default();
        session.assign("hall -- (a_YTYP.xml)", "main_hall");
        session.load_document(&path).unwrap();

        assert!(session.assignments().is_empty());
        assert!(session.document().is_ok());
    }

    #[test]
    fn test_failed_load_unsets_document() {
        let temp_dir = TempDir::new().unwrap();
        let good = write_ytyp(temp_dir.path(), "int_saloon.ytyp.rsc.xml", SALOON_YTYP);
        let bad = write_ytyp(temp_dir.path(), "bad.ytyp.rsc.xml", "<CMapTypes>");

        let mut session = Session::default();
        session.load_document(&good).unwrap();
        assert!(session.load_document(&bad).is_err());
        assert!(session.document().is_err());
    }
}
