//! Metadata Checker CLI
//!
//! Validates that every metadata source file parses, that the type
//! manifest is well-formed, and that every discoverable key resolves
//! end to end. Intended as a CI gate.

use clap::{Parser, Subcommand};
use metafold::config::{CacheBackend, Settings};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "metafold-check")]
#[command(about = "Validate metadata sources and type declarations")]
struct Cli {
    /// Path to a config file (defaults to metafold.toml lookup)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse every source file reachable from the search paths
    Sources,

    /// Validate the type manifest and report undeclared references
    Types,

    /// Run every check and fully resolve every discoverable key
    All,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut settings = Settings::load_from(cli.config.as_deref())?;
    // Checks never warm the real cache.
    settings.cache.backend = CacheBackend::Memory;

    match cli.command {
        Commands::Sources => {
            if check_sources(&settings)? {
                Ok(())
            } else {
                std::process::exit(1);
            }
        }

        Commands::Types => {
            check_types(&settings)?;
            Ok(())
        }

        Commands::All => {
            let sources_ok = check_sources(&settings)?;
            check_types(&settings)?;
            let resolve_ok = check_resolution(&settings)?;

            if !sources_ok || !resolve_ok {
                std::process::exit(1);
            }
            println!();
            println!("✅ All metadata checks passed");
            Ok(())
        }
    }
}

fn check_sources(settings: &Settings) -> Result<bool, Box<dyn std::error::Error>> {
    let loader = settings.build_loader()?;
    let keys = loader.reader().scan_keys();

    println!("🔍 Checking {} source keys...", keys.len());

    let mut all_valid = true;
    for key in &keys {
        match loader.reader().read_fragment(key) {
            Ok(Some(_)) => println!("  ✅ {}", key),
            Ok(None) => println!("  ⚠️  {} - empty", key),
            Err(e) => {
                println!("  ❌ {} - {}", key, e);
                all_valid = false;
            }
        }
    }

    if !all_valid {
        println!("❌ Source check FAILED");
    }
    Ok(all_valid)
}

fn check_types(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let loader = settings.build_loader()?;
    let graph = loader.graph();

    if graph.is_empty() {
        println!("⚠️  No type manifest configured, every lineage is a singleton");
        return Ok(());
    }

    println!("✅ {} types registered", graph.len());
    for key in graph.undeclared_keys() {
        println!("  ⚠️  referenced but never declared: {}", key);
    }
    Ok(())
}

fn check_resolution(settings: &Settings) -> Result<bool, Box<dyn std::error::Error>> {
    let mut loader = settings.build_loader()?;
    let keys = loader.reader().scan_keys();

    println!("🔍 Resolving {} keys end to end...", keys.len());

    let mut all_valid = true;
    for key in &keys {
        match loader.load(key.as_str()) {
            Ok(metadata) => {
                println!("  ✅ {} ({} top-level keys)", key, metadata.as_map().len())
            }
            Err(e) => {
                println!("  ❌ {} - {}", key, e);
                all_valid = false;
            }
        }
    }

    if !all_valid {
        println!("❌ Resolution check FAILED");
    }
    Ok(all_valid)
}
