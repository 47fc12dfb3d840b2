//! mlokit Core Library
//!
//! This crate provides the YTYP editing operations behind mlokit:
//! - Archetype document loading, inspection and saving
//! - Interior manifest generation from the DATA_BASE prop lookup
//! - Door extension angle correction
//! - Reflection probe discovery and room assignment
//! - Tool configuration (`mlokit.json`)

pub mod config;
pub mod document;
pub mod doors;
pub mod manifest;
pub mod probes;
pub mod query;
pub mod session;

// Re-export commonly used types
pub use config::{ConfigError, ToolConfig, CONFIG_FILE_NAME, DEFAULT_DOOR_ANGLE};
pub use document::{ArchetypeDocument, DocumentError, MloArchetype};
pub use doors::{correct_door_angles, DoorError, DoorReport};
pub use manifest::{generate_manifest, ManifestError, ManifestFormat, ManifestReport, ManifestRequest};
pub use probes::{apply_assignments, load_probe_folder, ApplyReport, DiscoveryReport, ProbeError, ProbeFragment};
pub use session::Session;
