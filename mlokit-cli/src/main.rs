//! mlokit CLI
//!
//! Command-line interface for preparing RedM interior (MLO) YTYP files.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use mlokit_core::{
    apply_assignments, correct_door_angles, generate_manifest, load_probe_folder, ManifestFormat,
    ManifestRequest, Session, ToolConfig,
};

#[derive(Parser)]
#[command(name = "mlokit")]
#[command(about = "RedM interior (MLO) toolkit: manifests, door angles and reflection probes")]
#[command(version)]
struct Cli {
    /// Config file (default: ./mlokit.json when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show what a YTYP file contains
    Info {
        /// Path to the .ytyp.rsc.xml file
        ytyp: PathBuf,
    },

    /// Generate the interior _manifest from the DATA_BASE lookup
    Manifest {
        /// Path to the .ytyp.rsc.xml file
        ytyp: PathBuf,

        /// IMAP name (default: <ytyp name>_y)
        #[arg(short, long)]
        imap: Option<String>,

        /// Output format (default: from config, else ymf)
        #[arg(short, long, value_enum)]
        format: Option<FormatArg>,

        /// DATA_BASE directory (default: next to the executable)
        #[arg(short, long)]
        database: Option<PathBuf>,
    },

    /// Convert legacy door angles and fix value="false" limits
    Doors {
        /// Path to the .ytyp.rsc.xml file
        ytyp: PathBuf,

        /// Angle written over value="false" (default: from config, else 1.470796)
        #[arg(short, long, allow_hyphen_values = true)]
        angle: Option<String>,
    },

    /// Assign reflection probe exports to rooms
    Probes {
        #[command(subcommand)]
        action: ProbeCommands,
    },
}

#[derive(Subcommand)]
enum ProbeCommands {
    /// List discovered probe fragments and the rooms they can go to
    List {
        /// Path to the .ytyp.rsc.xml file
        ytyp: PathBuf,

        /// Folder to scan for ref_probes/output exports
        #[arg(short, long)]
        source: PathBuf,
    },

    /// Splice probe fragments into rooms and save the YTYP
    Apply {
        /// Path to the .ytyp.rsc.xml file
        ytyp: PathBuf,

        /// Folder to scan for ref_probes/output exports
        #[arg(short, long)]
        source: PathBuf,

        /// Assignment as "<probe name>=<room name>" (repeatable)
        #[arg(short, long = "assign", value_parser = parse_assignment)]
        assignments: Vec<(String, String)>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    /// _manifest_<name>.ymf
    Ymf,
    /// _manifest_<name>.ymf.pso.xml
    PsoXml,
}

impl From<FormatArg> for ManifestFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Ymf => ManifestFormat::Ymf,
            FormatArg::PsoXml => ManifestFormat::PsoXml,
        }
    }
}

fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    let (probe, room) = raw
        .rsplit_once('=')
        .ok_or_else(|| format!("expected \"<probe name>=<room name>\", got {:?}", raw))?;
    let probe = probe.trim();
    if probe.is_empty() {
        return Err("probe name must not be empty".to_string());
    }
    Ok((probe.to_string(), room.trim().to_string()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "mlokit=debug" } else { "mlokit=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.parse()?),
        )
        .with_target(false)
        .init();

    let config = load_config(cli.config.as_deref())?;
    tracing::debug!("Using config: {:?}", config);
    let mut session = Session::new(config);

    match cli.command {
        Commands::Info { ytyp } => cmd_info(&mut session, &ytyp)?,
        Commands::Manifest {
            ytyp,
            imap,
            format,
            database,
        } => cmd_manifest(&mut session, &ytyp, imap, format, database)?,
        Commands::Doors { ytyp, angle } => cmd_doors(&mut session, &ytyp, angle)?,
        Commands::Probes { action } => match action {
            ProbeCommands::List { ytyp, source } => cmd_probes_list(&mut session, &ytyp, &source)?,
            ProbeCommands::Apply {
                ytyp,
                source,
                assignments,
            } => cmd_probes_apply(&mut session, &ytyp, &source, &assignments)?,
        },
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<ToolConfig> {
    match path {
        Some(path) => ToolConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => {
            let cwd = std::env::current_dir().context("Failed to get current directory")?;
            ToolConfig::discover(&cwd).context("Failed to load mlokit.json")
        }
    }
}

fn open_ytyp(session: &mut Session, ytyp: &Path) -> Result<()> {
    session
        .load_document(ytyp)
        .with_context(|| format!("Critical error while reading YTYP {}", ytyp.display()))?;
    Ok(())
}

/// Print a summary of the YTYP
fn cmd_info(session: &mut Session, ytyp: &Path) -> Result<()> {
    open_ytyp(session, ytyp)?;
    let doc = session.document()?;

    println!("Parent YTYP: {}", doc.base_name());
    match doc.mlo_archetype() {
        Some(mlo) => {
            println!("Collision name: {}", mlo.name);
            println!("Entities: {} distinct prop(s)", mlo.props.len());
        }
        None => println!("No CMloArchetypeDef archetype found."),
    }
    println!("{} door extension(s) (CExtensionDefDoor) detected.", doc.door_count());
    println!("{} room(s) detected in the file.", doc.room_count());
    for room in doc.room_names() {
        println!("  - {}", room);
    }

    Ok(())
}

/// Generate the _manifest file
fn cmd_manifest(
    session: &mut Session,
    ytyp: &Path,
    imap: Option<String>,
    format: Option<FormatArg>,
    database: Option<PathBuf>,
) -> Result<()> {
    open_ytyp(session, ytyp)?;

    let request = ManifestRequest {
        imap_name: imap,
        format: format
            .map(ManifestFormat::from)
            .unwrap_or(session.config().manifest_format),
        database_dir: database,
    };

    println!("--- Analyzing ---");
    let report = generate_manifest(session, &request).context("Failed to generate manifest")?;

    println!("\nFound ytyp list:");
    for dep in &report.dependencies {
        println!("  - {}", dep);
    }

    if !report.missing_props.is_empty() {
        println!("\nYTYP not found for {} Entities:", report.missing_props.len());
        for prop in &report.missing_props {
            println!("  - {}", prop);
        }
    }
    if let Some(path) = &report.missing_report_path {
        println!("\nList of missing props saved to: {}", path.display());
    }

    println!("\n--- Result ---");
    println!("YTYP added: {}", report.dependencies.len());
    if !report.missing_props.is_empty() {
        println!("YTYP not found: {} Entities", report.missing_props.len());
        println!("You may have to add them by hand.");
    }
    println!("\n_manifest generated: {}", report.manifest_path.display());

    Ok(())
}

/// Run the door angle correction
fn cmd_doors(session: &mut Session, ytyp: &Path, angle: Option<String>) -> Result<()> {
    open_ytyp(session, ytyp)?;

    println!("--- Starting Door Correction ---");
    let report = correct_door_angles(session, angle.as_deref()).context("Door correction failed")?;

    println!("\n{} door extension(s) (CExtensionDefDoor) detected.", report.door_extensions);

    if !report.conversions.is_empty() {
        println!("\n--- Rule #1: Converting <limitAngle> ---");
        for conversion in &report.conversions {
            let value = conversion.value.as_deref().unwrap_or("");
            println!("\n<archetypeName>{}</archetypeName>", conversion.owner.as_deref().unwrap_or("?"));
            println!("  <limitAngle value=\"{}\" />", value);
            println!("  changed to:");
            for tag in mlokit_core::doors::ANGLE_TAGS {
                println!("    <{} value=\"{}\" />", tag, value);
            }
        }
    }

    if !report.updates.is_empty() {
        println!("\n--- Rule #2: Updating value=\"false\" ---");
        for update in &report.updates {
            println!(
                "<archetypeName>{}</archetypeName>  <{} value=\"false\" />  ->  value=\"{}\"",
                update.owner.as_deref().unwrap_or("?"),
                update.tag,
                report.angle
            );
        }
    }

    if report.saved {
        println!("\nCorrection finished and YTYP file saved.");
    } else {
        println!("\nNo modifications were made, angle values seem correct.");
    }

    Ok(())
}

/// List probes and rooms
fn cmd_probes_list(session: &mut Session, ytyp: &Path, source: &Path) -> Result<()> {
    open_ytyp(session, ytyp)?;

    let report = load_probe_folder(session, source).context("Failed to load probes")?;
    if report.accepted == 0 {
        println!("No valid probes found in the selected folder.");
    } else {
        println!("{} probe(s) found and added to the list.", report.accepted);
    }
    for name in &report.names {
        println!("  - {}", name);
    }

    let rooms = session.document()?.room_names();
    if rooms.is_empty() {
        println!("\nNo rooms were found in the YTYP.");
    } else {
        println!("\nRooms:");
        for room in rooms {
            println!("  - {}", room);
        }
    }

    Ok(())
}

/// Apply probe assignments
fn cmd_probes_apply(
    session: &mut Session,
    ytyp: &Path,
    source: &Path,
    assignments: &[(String, String)],
) -> Result<()> {
    open_ytyp(session, ytyp)?;

    let discovered = load_probe_folder(session, source).context("Failed to load probes")?;
    if discovered.accepted == 0 {
        println!("No probes are loaded.");
        return Ok(());
    }

    for (probe, room) in assignments {
        if !session.probes().contains_key(probe) {
            println!("Unknown probe '{}', skipped.", probe);
            continue;
        }
        session.assign(probe, room);
    }

    let report = apply_assignments(session).context("Failed to apply probe assignments")?;
    for (probe, room) in &report.applied {
        println!("- {}  ->  '{}'", probe, room);
    }
    for room in &report.unmatched_rooms {
        println!("Room '{}' not found in the YTYP.", room);
    }

    if report.saved {
        println!("\n{} assignment(s) applied.", report.applied.len());
        println!("YTYP file saved successfully.");
    } else {
        println!("No assignments were selected to be applied.");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_assignment() {
        assert_eq!(
            parse_assignment("ref_probes -- (hall_YTYP.xml)=main_hall").unwrap(),
            ("ref_probes -- (hall_YTYP.xml)".to_string(), "main_hall".to_string())
        );
        assert_eq!(
            parse_assignment("a=b=c").unwrap(),
            ("a=b".to_string(), "c".to_string())
        );
        assert_eq!(parse_assignment("probe=").unwrap().1, "");
        assert!(parse_assignment("no separator").is_err());
        assert!(parse_assignment("=room").is_err());
    }

    #[test]
    fn test_cli_parses_probe_apply() {
        let cli = Cli::try_parse_from([
            "mlokit",
            "probes",
            "apply",
            "int.ytyp.rsc.xml",
            "--source",
            "exports",
            "--assign",
            "x -- (a_YTYP.xml)=hall",
        ])
        .unwrap();

        match cli.command {
            Commands::Probes {
                action: ProbeCommands::Apply { assignments, .. },
            } => assert_eq!(assignments.len(), 1),
            _ => panic!("expected probes apply"),
        }
    }

    #[test]
    fn test_cli_parses_manifest_format() {
        let cli = Cli::try_parse_from(["mlokit", "manifest", "int.ytyp.rsc.xml", "--format", "pso-xml"]).unwrap();
        match cli.command {
            Commands::Manifest { format: Some(f), .. } => {
                assert_eq!(ManifestFormat::from(f), ManifestFormat::PsoXml)
            }
            _ => panic!("expected manifest"),
        }
    }
}
