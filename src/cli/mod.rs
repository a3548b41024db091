//! SF-016: CLI subcommands: init, validate, classes, bundle, probe, apply, completions.

use crate::core::orchestrator::SchemaBuilder;
use crate::core::types::{ExistenceVerdict, ProvisioningSpec};
use crate::core::{extractor, parser, prober};
use crate::provenance::eventlog::EventLog;
use crate::resources::{self, directory::DirectoryResources};
use crate::transport::sqlcmd::SqlcmdClient;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "schemaforge",
    version,
    about = "Idempotent, race-tolerant schema provisioning for clustered databases"
)]
pub struct Cli {
    /// Debug-level logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new schemaforge project
    Init {
        /// Directory to initialize (default: current)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Validate schemaforge.yaml without connecting to the cluster
    Validate {
        /// Path to schemaforge.yaml
        #[arg(short, long, default_value = "schemaforge.yaml")]
        file: PathBuf,
    },

    /// List procedure classes and the bundle layout
    Classes {
        /// Path to schemaforge.yaml
        #[arg(short, long, default_value = "schemaforge.yaml")]
        file: PathBuf,
    },

    /// Build and size-check the bundle without uploading it
    Bundle {
        /// Path to schemaforge.yaml
        #[arg(short, long, default_value = "schemaforge.yaml")]
        file: PathBuf,

        /// Resource root (compiled class-path directory)
        #[arg(long, default_value = "resources")]
        resources: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },

    /// Check whether the schema is already present
    Probe {
        /// Path to schemaforge.yaml
        #[arg(short, long, default_value = "schemaforge.yaml")]
        file: PathBuf,

        /// Cluster hosts, comma separated (overrides connection.servers)
        #[arg(long, value_delimiter = ',')]
        servers: Vec<String>,
    },

    /// Provision the schema if it is missing
    Apply {
        /// Path to schemaforge.yaml
        #[arg(short, long, default_value = "schemaforge.yaml")]
        file: PathBuf,

        /// Resource root (compiled class-path directory)
        #[arg(long, default_value = "resources")]
        resources: PathBuf,

        /// Cluster hosts, comma separated (overrides connection.servers)
        #[arg(long, value_delimiter = ',')]
        servers: Vec<String>,

        /// Keep the bundle file after upload
        #[arg(long)]
        retain_bundle: bool,

        /// State directory for the event log
        #[arg(long, default_value = "state")]
        state_dir: PathBuf,
    },

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<(), String> {
    match cmd {
        Commands::Init { path } => cmd_init(&path),
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Classes { file } => cmd_classes(&file),
        Commands::Bundle {
            file,
            resources,
            out,
        } => cmd_bundle(&file, &resources, &out),
        Commands::Probe { file, servers } => cmd_probe(&file, servers),
        Commands::Apply {
            file,
            resources,
            servers,
            retain_bundle,
            state_dir,
        } => cmd_apply(&file, &resources, servers, retain_bundle, &state_dir),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "schemaforge", &mut std::io::stdout());
            Ok(())
        }
    }
}

fn cmd_init(path: &Path) -> Result<(), String> {
    let config_path = path.join("schemaforge.yaml");
    if config_path.exists() {
        return Err(format!("{} already exists", config_path.display()));
    }

    let state_dir = path.join("state");
    std::fs::create_dir_all(&state_dir).map_err(|e| format!("cannot create state dir: {}", e))?;
    let resource_dir = path.join("resources");
    std::fs::create_dir_all(&resource_dir)
        .map_err(|e| format!("cannot create resource dir: {}", e))?;

    let template = r#"version: "1.0"
name: my-schema
package: com.example.app
bundle: app-procs.jar

ddl:
  - CREATE TABLE app_kv (k varchar(80) not null, v varchar(2048), primary key (k));
  - PARTITION TABLE app_kv ON COLUMN k;

procedures:
  - CREATE PROCEDURE PARTITION ON TABLE app_kv COLUMN k FROM CLASS com.example.app.Get;

classes: []
archives: []

probe:
  procedure: Get
  params: ["probe-key"]

policy:
  retain_bundle: false
  event_log: true

connection:
  servers: [localhost]
"#;
    std::fs::write(&config_path, template)
        .map_err(|e| format!("cannot write {}: {}", config_path.display(), e))?;

    println!("Initialized schemaforge project at {}", path.display());
    println!("  Created: {}", config_path.display());
    println!("  Created: {}/", resource_dir.display());
    println!("  Created: {}/", state_dir.display());
    Ok(())
}

fn cmd_validate(file: &Path) -> Result<(), String> {
    let config = parser::parse_config_file(file)?;
    let errors = parser::validate_config(&config);

    if errors.is_empty() {
        println!(
            "OK: {} ({} DDL statements, {} procedures, {} classes, {} archives)",
            config.name,
            config.ddl.len(),
            config.procedures.len(),
            config.classes.len(),
            config.archives.len()
        );
        Ok(())
    } else {
        for e in &errors {
            eprintln!("  ERROR: {}", e);
        }
        Err(format!("{} validation error(s)", errors.len()))
    }
}

/// Parse and validate a spec file, returning errors if invalid.
fn parse_and_validate(file: &Path) -> Result<ProvisioningSpec, String> {
    let config = parser::parse_config_file(file)?;
    let errors = parser::validate_config(&config);
    if errors.is_empty() {
        return Ok(config);
    }
    for e in &errors {
        eprintln!("  ERROR: {}", e);
    }
    Err("validation failed".to_string())
}

fn cmd_classes(file: &Path) -> Result<(), String> {
    let config = parse_and_validate(file)?;
    let (procs, anomalies) = extractor::scan(&config.procedures);

    println!("{}: {} procedure class(es)", config.name, procs.len());
    for p in &procs {
        println!("  [{}] {}", p.statement_index, p.class_name);
    }
    for a in &anomalies {
        println!("  ? [{}] unparsed: {}", a.statement_index, a.statement);
    }

    println!();
    println!("Bundle {}:", config.bundle);
    for entry in resources::plan_entries(&config, &procs) {
        println!("  {}", entry.entry_path);
    }
    Ok(())
}

fn cmd_bundle(file: &Path, resource_root: &Path, out: &Path) -> Result<(), String> {
    let config = parse_and_validate(file)?;
    std::fs::create_dir_all(out)
        .map_err(|e| format!("cannot create {}: {}", out.display(), e))?;

    let client = SqlcmdClient::from_config(&config.connection);
    let space = DirectoryResources::new(resource_root);
    let builder = SchemaBuilder::new(config, &client, &space).map_err(|e| e.to_string())?;
    let info = builder.package_bundle(out).map_err(|e| e.to_string())?;

    println!("Bundle: {}", info.path.display());
    println!("  {} entries, {} bytes", info.entries, info.bytes);
    println!("  {}", info.hash);
    Ok(())
}

fn apply_overrides(config: &mut ProvisioningSpec, servers: Vec<String>) {
    if !servers.is_empty() {
        config.connection.servers = servers;
    }
}

fn cmd_probe(file: &Path, servers: Vec<String>) -> Result<(), String> {
    let mut config = parse_and_validate(file)?;
    apply_overrides(&mut config, servers);

    let client = SqlcmdClient::from_config(&config.connection);
    let params = config.probe.call_params()?;
    let verdict = prober::probe(&client, &config.probe.procedure, &params);
    println!("{}", describe_verdict(&config.name, &verdict));
    Ok(())
}

/// One-line probe summary. An ambiguous probe reads as absent, the same way
/// provisioning treats it.
fn describe_verdict(schema: &str, verdict: &ExistenceVerdict) -> String {
    match verdict {
        ExistenceVerdict::Exists => format!("{}: present", schema),
        ExistenceVerdict::Absent => format!("{}: absent", schema),
        ExistenceVerdict::Indeterminate(why) => format!("{}: absent (indeterminate: {})", schema, why),
    }
}

fn cmd_apply(
    file: &Path,
    resource_root: &Path,
    servers: Vec<String>,
    retain_bundle: bool,
    state_dir: &Path,
) -> Result<(), String> {
    let mut config = parse_and_validate(file)?;
    apply_overrides(&mut config, servers);
    if retain_bundle {
        config.policy.retain_bundle = true;
    }

    let client = SqlcmdClient::from_config(&config.connection);
    let space = DirectoryResources::new(resource_root);
    let name = config.name.clone();
    let event_log = config.policy.event_log;

    let mut builder = SchemaBuilder::new(config, &client, &space).map_err(|e| e.to_string())?;
    if event_log {
        builder = builder.with_event_log(EventLog::new(state_dir, &name));
    }

    let report = builder.provision().map_err(|e| e.to_string())?;

    println!("{}: {}", name, report.outcome);
    if let Some(ref bundle) = report.bundle {
        let disposition = if bundle.retained { "retained" } else { "deleted" };
        println!(
            "  bundle: {} ({} entries, {} bytes, {}, {})",
            bundle.path.display(),
            bundle.entries,
            bundle.bytes,
            bundle.hash,
            disposition
        );
    }
    println!(
        "  {} DDL, {} procedure statement(s) applied ({:.1}s)",
        report.ddl_applied, report.procedures_applied, report.duration_seconds
    );
    Ok(())
}
