//! Rx-Check CLI Tool
//!
//! Run prescription safety checks against a catalog from the command line.
//!
//! Usage:
//!   rx-check analyze --catalog <catalog.json|catalog.db> --request <request.json> [--config <config.json>]
//!   rx-check import --catalog <catalog.json> --database <catalog.db>
//!   rx-check inspect --catalog <catalog.json|catalog.db> [--drug <name>]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use rx_safety_core::catalog::{fetch_with_timeout, CatalogProvider, JsonFileProvider, SqliteProvider};
use rx_safety_core::{CatalogSnapshot, Database, EngineConfig, PrescriptionRequest, SafetyEngine};

#[derive(Parser)]
#[command(name = "rx-check")]
#[command(version)]
#[command(about = "Check prescriptions for interactions, dosing problems and safer alternatives", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Engine config file (JSON); defaults apply when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a prescription request
    Analyze {
        /// Catalog source: .json file or SQLite database
        #[arg(short, long)]
        catalog: PathBuf,

        /// Request file: {"entries": [...], "patient": {...}}
        #[arg(short, long)]
        request: PathBuf,

        /// Pretty-print the result
        #[arg(long)]
        pretty: bool,
    },

    /// Validate a JSON catalog and store it in a SQLite database
    Import {
        /// JSON catalog file
        #[arg(short, long)]
        catalog: PathBuf,

        /// Target SQLite database (created if missing)
        #[arg(short, long)]
        database: PathBuf,
    },

    /// Load a catalog and print its identity, or look up one drug
    Inspect {
        /// Catalog source: .json file or SQLite database
        #[arg(short, long)]
        catalog: PathBuf,

        /// Drug name, id or synonym to look up
        #[arg(long)]
        drug: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => EngineConfig::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Analyze {
            catalog,
            request,
            pretty,
        } => analyze(&catalog, &request, pretty, config),
        Commands::Import { catalog, database } => import(&catalog, &database, &config),
        Commands::Inspect { catalog, drug } => inspect(&catalog, drug.as_deref(), &config),
    }
}

fn provider_for(path: &Path) -> Arc<dyn CatalogProvider> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => Arc::new(JsonFileProvider::new(path)),
        _ => Arc::new(SqliteProvider::new(path)),
    }
}

fn load_catalog(path: &Path, config: &EngineConfig) -> Result<CatalogSnapshot> {
    let provider = provider_for(path);
    let description = provider.describe();
    let source = fetch_with_timeout(provider, config.catalog_fetch_timeout())
        .with_context(|| format!("Failed to fetch catalog from {}", description))?;
    CatalogSnapshot::load(&source).with_context(|| format!("Invalid catalog in {}", description))
}

fn analyze(catalog: &Path, request: &Path, pretty: bool, config: EngineConfig) -> Result<()> {
    let snapshot = load_catalog(catalog, &config)?;

    let text = std::fs::read_to_string(request)
        .with_context(|| format!("Failed to read request {}", request.display()))?;
    let request: PrescriptionRequest =
        serde_json::from_str(&text).context("Request is not a valid {entries, patient} document")?;

    let engine = SafetyEngine::new(config);
    let result = engine
        .analyze(&request.entries, &request.patient, &snapshot)
        .context("Analysis rejected the request")?;

    let output = if pretty {
        result.to_json_pretty()?
    } else {
        result.to_json()?
    };
    println!("{}", output);
    Ok(())
}

fn import(catalog: &Path, database: &Path, config: &EngineConfig) -> Result<()> {
    let provider: Arc<dyn CatalogProvider> = Arc::new(JsonFileProvider::new(catalog));
    let source = fetch_with_timeout(provider, config.catalog_fetch_timeout())
        .with_context(|| format!("Failed to read {}", catalog.display()))?;

    // Refuse to store a catalog that would not load.
    let snapshot = CatalogSnapshot::load(&source).context("Catalog failed validation")?;

    let mut db = Database::open(database)
        .with_context(|| format!("Failed to open database {}", database.display()))?;
    let record = db.import_catalog_source(&source)?;

    println!(
        "Imported {} drugs, {} interactions, {} dosage rules (fingerprint {})",
        snapshot.drug_count(),
        snapshot.edge_count(),
        snapshot.rule_count(),
        record.fingerprint
    );
    Ok(())
}

fn inspect(catalog: &Path, drug: Option<&str>, config: &EngineConfig) -> Result<()> {
    let snapshot = load_catalog(catalog, config)?;

    match drug {
        Some(name) => {
            let Some(hit) = snapshot.lookup_fuzzy(name, config.fuzzy_match_threshold) else {
                bail!("No drug matching '{}'", name);
            };
            let info = serde_json::json!({
                "matched_name": hit.matched_name,
                "similarity": hit.similarity,
                "drug": hit.drug,
                "dosage_rules": snapshot.dosage_rules(&hit.drug.id),
            });
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        None => {
            let info = serde_json::json!({
                "fingerprint": snapshot.fingerprint(),
                "loaded_at": snapshot.loaded_at(),
                "drugs": snapshot.drug_count(),
                "interactions": snapshot.edge_count(),
                "dosage_rules": snapshot.rule_count(),
            });
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
    }
    Ok(())
}
