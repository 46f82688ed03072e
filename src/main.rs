use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process;

use tracing_subscriber::EnvFilter;

use infolink::config::{get_config_path, load_config, save_config, ExportConfig};
use infolink::errors::{LinkError, Result};
use infolink::export::{check_index, run_export};

/// Resolves hyperlinks between exported infobase documents.
#[derive(Parser)]
#[command(name = "infolink", about = "Resolve infobase hyperlinks against a link index")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Project path (default: current directory)
        path: Option<String>,
        /// Overwrite an existing configuration
        #[arg(short, long)]
        force: bool,
    },
    /// Resolve links in every configured collection and write the output
    Resolve {
        /// Configuration file (default: ./infolink.json)
        #[arg(short, long)]
        config: Option<String>,
    },
    /// Show index statistics and verify collection root records
    Status {
        /// Configuration file (default: ./infolink.json)
        #[arg(short, long)]
        config: Option<String>,
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init { path, force } => {
            let project_path = resolve_path(path);
            let config_path = get_config_path(&project_path);
            if config_path.exists() && !force {
                return Err(LinkError::Configuration {
                    message: format!(
                        "'{}' already exists (use --force to overwrite)",
                        config_path.display()
                    ),
                });
            }
            save_config(&config_path, &ExportConfig::default())?;
            println!("Wrote {}", config_path.display());
        }
        Commands::Resolve { config } => {
            let (config, base_dir) = open_config(config)?;
            let summary = run_export(&config, &base_dir)?;
            if summary.passthrough {
                println!(
                    "Copied {} documents without resolving links (no index) in {}ms",
                    summary.documents, summary.duration_ms
                );
            } else {
                let stats = &summary.stats;
                println!(
                    "Exported {} documents in {}ms",
                    summary.documents, summary.duration_ms
                );
                println!("  Bookmarks:   {}", stats.bookmarks);
                println!(
                    "  Query links: {} resolved, {} broken, {} skipped",
                    stats.query_links.resolved,
                    stats.query_links.broken(),
                    stats.query_links.skipped
                );
                println!(
                    "  Jump links:  {} resolved, {} broken, {} skipped",
                    stats.jump_links.resolved,
                    stats.jump_links.broken(),
                    stats.jump_links.skipped
                );
            }
        }
        Commands::Status { config, json } => {
            let (config, base_dir) = open_config(config)?;
            let status = check_index(&config, &base_dir)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                println!("Link index {}", status.index_path.display());
                println!("  Records:      {}", status.stats.record_count);
                println!("  Roots:        {}", status.stats.root_count);
                println!("  Destinations: {}", status.stats.destination_count);
                println!("\n  Collections:");
                for (id, fields) in &status.profiles {
                    let count = status
                        .stats
                        .records_by_collection
                        .get(id)
                        .copied()
                        .unwrap_or(0);
                    println!("    {}: {} records, fields [{}]", id, count, fields.join(", "));
                }
            }
        }
    }
    Ok(())
}

/// Loads the configuration file and returns it with the directory its
/// relative paths are resolved against.
fn open_config(config: Option<String>) -> Result<(ExportConfig, PathBuf)> {
    let config_path = match config {
        Some(p) => PathBuf::from(p),
        None => get_config_path(&resolve_path(None)),
    };
    let config = load_config(&config_path)?;
    let base_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    Ok((config, base_dir))
}

/// Resolves an optional path argument to a `PathBuf`.
///
/// Defaults to the current working directory if no path is provided.
fn resolve_path(path: Option<String>) -> PathBuf {
    match path {
        Some(p) => PathBuf::from(p),
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}
