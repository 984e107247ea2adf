//! Stockreport CLI - Inventory reports from POS exports
//!
//! # Main Commands
//!
//! ```bash
//! stockreport report dead_stock1.xlsx dead_stock2.xlsx          # Dead stock report
//! stockreport report stock.csv --profile supplier-dead-stock    # Supplier drill-down
//! stockreport serve                                              # HTTP server (port 3000)
//! stockreport profile list                                       # Manage report profiles
//! ```
//!
//! # Helper Commands
//!
//! ```bash
//! stockreport inspect stock.xlsx#Sheet1    # Show detected columns and sample rows
//! stockreport example-profile              # Print an example custom profile
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};

use stockreport::logging::init_logging;
use stockreport::report::{export::export_to_file, render::render_report};
use stockreport::{
    example_profile, read_source, run, AppConfig, ProfileRegistry, ReportError,
    ReportProfile, RunConfig, Selection, Selections, SourceSpec,
};

#[derive(Parser)]
#[command(name = "stockreport")]
#[command(about = "Dead stock and purchase reports from inventory exports", long_about = None)]
struct Cli {
    /// Directory of custom profiles (default: STOCKREPORT_PROFILE_DIR or .stockreport/profiles)
    #[arg(long, global = true)]
    profile_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a report over one or more sources
    Report {
        /// Source files (`path` or `path#Sheet`); STOCKREPORT_SOURCES if omitted
        sources: Vec<String>,

        /// Profile id
        #[arg(short, long, default_value = stockreport::profiles::DEFAULT_PROFILE)]
        profile: String,

        /// Profile JSON file, used instead of --profile
        #[arg(long)]
        profile_file: Option<PathBuf>,

        /// Category filter, repeatable (default: All)
        #[arg(short, long)]
        category: Vec<String>,

        /// Item name filter
        #[arg(short, long)]
        item: Option<String>,

        /// Supplier to drill into (default: largest)
        #[arg(short, long)]
        supplier: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        output: OutputFormat,

        /// Write the detail table as CSV
        #[arg(short, long)]
        export: Option<PathBuf>,

        /// Detail rows shown in text output
        #[arg(long, default_value = "20")]
        rows: usize,
    },

    /// Show the detected format, columns and first rows of a source
    Inspect {
        /// Source file (`path` or `path#Sheet`)
        source: String,

        /// Rows to print
        #[arg(short = 'n', long, default_value = "5")]
        rows: usize,
    },

    /// Print an example custom profile
    ExampleProfile,

    /// Start HTTP server
    Serve {
        /// Port to listen on (default: STOCKREPORT_PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage report profiles
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
}

#[derive(Subcommand)]
enum ProfileAction {
    /// List built-in and custom profiles
    List,

    /// Import a profile JSON file
    Import {
        /// Profile JSON file to import
        file: PathBuf,
    },

    /// Show a profile definition
    Show {
        /// Profile ID
        id: String,
    },

    /// Delete a custom profile
    Delete {
        /// Profile ID
        id: String,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present) before the log filter is read
    dotenvy::dotenv().ok();
    init_logging();
    let mut config = AppConfig::from_env();

    let cli = Cli::parse();
    if let Some(dir) = cli.profile_dir {
        config.profile_dir = dir;
    }

    let result = match cli.command {
        Commands::Report {
            sources,
            profile,
            profile_file,
            category,
            item,
            supplier,
            output,
            export,
            rows,
        } => {
            let selections = Selections {
                category: selection_from(category),
                item: item.map(Selection::one).unwrap_or_default(),
                supplier,
            };
            cmd_report(
                &config,
                sources,
                &profile,
                profile_file.as_deref(),
                selections,
                output,
                export.as_deref(),
                rows,
            )
        }

        Commands::Inspect { source, rows } => cmd_inspect(&source, rows),

        Commands::ExampleProfile => cmd_example_profile(),

        Commands::Serve { port } => {
            if let Some(port) = port {
                config.port = port;
            }
            stockreport::server::start_server(config).await
        }

        Commands::Profile { action } => cmd_profile(&config, action),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

/// No values or `All` means no restriction; one value is a single select.
fn selection_from(values: Vec<String>) -> Selection {
    match values.len() {
        0 => Selection::All,
        1 => Selection::one(values[0].clone()),
        _ => Selection::many(values),
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_report(
    config: &AppConfig,
    sources: Vec<String>,
    profile_id: &str,
    profile_file: Option<&Path>,
    selections: Selections,
    output: OutputFormat,
    export: Option<&Path>,
    rows: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let sources = config.sources_or(sources.iter().map(|s| SourceSpec::parse(s)).collect());
    if sources.is_empty() {
        return Err("no sources given (pass files or set STOCKREPORT_SOURCES)".into());
    }

    let mut registry = ProfileRegistry::with_dir(&config.profile_dir);
    let profile = match profile_file {
        Some(path) => ReportProfile::from_json(&fs::read_to_string(path)?)?,
        None => registry.resolve(profile_id)?,
    };

    let run_config = RunConfig::new(sources, profile).with_selections(selections);
    let report = run(&run_config)?;
    registry.record_use(&run_config.profile.id);

    match output {
        OutputFormat::Text => print!("{}", render_report(&report, rows)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    if let Some(path) = export {
        export_to_file(&report.detail, path)?;
        eprintln!("💾 Detail CSV written to: {}", path.display());
    }

    Ok(())
}

fn cmd_inspect(source: &str, rows: usize) -> Result<(), Box<dyn std::error::Error>> {
    let spec = SourceSpec::parse(source);
    let loaded = read_source(&spec).map_err(|e| ReportError::source_unavailable(source, e))?;
    let info = &loaded.info;

    eprintln!("📄 Source: {}", info.name);
    if let Some(encoding) = &info.encoding {
        eprintln!("   Encoding: {}", encoding);
    }
    if let Some(delimiter) = info.delimiter {
        eprintln!("   Delimiter: '{}'", format_delimiter(delimiter));
    }
    if let Some(sheet) = &info.sheet {
        eprintln!("   Sheet: {}", sheet);
    }
    eprintln!("   Rows: {}", info.row_count);
    eprintln!("   Columns: {}", info.columns.join(", "));

    let sample: Vec<_> = loaded.rows.rows.iter().take(rows).collect();
    println!("{}", serde_json::to_string_pretty(&sample)?);
    Ok(())
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

fn cmd_example_profile() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", example_profile().to_json()?);
    Ok(())
}

fn cmd_profile(config: &AppConfig, action: ProfileAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut registry = ProfileRegistry::with_dir(&config.profile_dir);

    match action {
        ProfileAction::List => {
            let profiles = registry.list();
            eprintln!("📋 Profiles ({}):\n", profiles.len());
            for p in &profiles {
                println!("  📄 {} ({})", p.title, p.id);
                println!("     Filter: {}", p.predicate);
                if !p.description.is_empty() {
                    println!("     {}", p.description);
                }
                println!();
            }
            for stored in registry.stored() {
                println!(
                    "  {} used {} times{}",
                    stored.profile.id,
                    stored.use_count,
                    stored
                        .last_used
                        .as_deref()
                        .map(|t| format!(", last {}", t))
                        .unwrap_or_default()
                );
            }
        }

        ProfileAction::Import { file } => {
            eprintln!("📥 Importing profile from: {}", file.display());
            let id = registry.import(&file)?;
            eprintln!("✅ Profile saved with ID: {}", id);
        }

        ProfileAction::Show { id } => {
            let profile = registry.get(&id)?;
            println!("{}", profile.to_json()?);
        }

        ProfileAction::Delete { id } => {
            registry.delete(&id)?;
            eprintln!("🗑️  Profile deleted: {}", id);
        }
    }

    Ok(())
}
