//! Metadata Inspector CLI
//!
//! Resolves identifiers against the configured search paths and type
//! graph, and explores the registered type space.

use clap::{Parser, Subcommand};
use metafold::{KeyCodec, LoadTarget, Settings};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "metafold-inspect")]
#[command(about = "Resolve and explore model metadata")]
struct Cli {
    /// Path to a config file (defaults to metafold.toml lookup)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve an identifier and print the merged metadata as JSON
    Resolve {
        /// Type name or meta-key
        identifier: String,

        /// Merge these identifiers instead of the computed lineage
        #[arg(long)]
        ident: Vec<String>,
    },

    /// Show the lineage the default load path would read
    Lineage {
        /// Type name or meta-key
        identifier: String,
    },

    /// Show every identifier form for one input
    Key {
        /// Type name or meta-key
        identifier: String,
    },

    /// List every meta-key with a source file
    Keys,

    /// Fuzzy-search registered types
    Search {
        /// Query string
        query: String,

        /// Maximum number of results
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// List all transitive subtypes and implementors of a type
    Descendants {
        /// Type name or meta-key
        identifier: String,
    },

    /// Drop the cache entries for one identifier
    Invalidate {
        /// Type name or meta-key
        identifier: String,
    },
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
    let settings = Settings::load_from(cli.config.as_deref())?;
    let mut loader = settings.build_loader()?;

    match cli.command {
        Commands::Resolve { identifier, ident } => {
            let metadata = if ident.is_empty() {
                loader.load(&identifier)?
            } else {
                let idents: Vec<&str> = ident.iter().map(String::as_str).collect();
                loader.load_idents(&identifier, &idents, LoadTarget::New)?
            };

            if metadata.is_empty() {
                eprintln!("⚠️  No metadata found for {}", identifier);
            }
            println!("{}", serde_json::to_string_pretty(metadata.as_map())?);
            Ok(())
        }

        Commands::Lineage { identifier } => {
            let lineage = loader.resolve_lineage(&identifier)?;
            println!("🔍 Lineage for {} ({} members):", identifier, lineage.len());
            for (i, key) in lineage.iter().enumerate() {
                println!("  {}. {}", i + 1, key);
            }
            Ok(())
        }

        Commands::Key { identifier } => {
            let key = loader.normalize(&identifier)?;
            let mut codec = KeyCodec::new();
            println!("meta-key:  {}", key);
            println!("type name: {}", codec.type_name(&key));
            println!("file name: {}", loader.reader().file_name(&key));
            println!("cache key: {}", codec.cache_key(std::slice::from_ref(&key)));
            Ok(())
        }

        Commands::Keys => {
            let keys = loader.reader().scan_keys();
            if keys.is_empty() {
                println!("⚠️  No metadata source files found");
            } else {
                println!("🔍 {} metadata source keys:", keys.len());
                for key in keys {
                    println!("  {}", key);
                }
            }
            Ok(())
        }

        Commands::Search { query, limit } => {
            let hits = loader.graph().search(&query, limit);
            if hits.is_empty() {
                println!("❌ No registered types match '{}'", query);
            } else {
                for (key, score) in hits {
                    println!("  {:>5}  {}", score, key);
                }
            }
            Ok(())
        }

        Commands::Descendants { identifier } => {
            let key = loader.normalize(&identifier)?;
            let descendants = loader.graph().descendants(&key);
            if descendants.is_empty() {
                println!("{} has no registered descendants", key);
            } else {
                println!("🔍 {} descendants of {}:", descendants.len(), key);
                for descendant in descendants {
                    println!("  {}", descendant);
                }
            }
            Ok(())
        }

        Commands::Invalidate { identifier } => {
            loader.invalidate(&identifier)?;
            println!("✅ Cache entries for {} dropped", identifier);
            Ok(())
        }
    }
}
