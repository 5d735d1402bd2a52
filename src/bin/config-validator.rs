//! # Campaign Configuration Validator
//!
//! Command-line tool for validating campaign configuration across
//! environments before starting an orchestrator.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use campaign_core::config::ConfigManager;
use campaign_core::CampaignConfig;

#[derive(Parser)]
#[command(name = "config-validator")]
#[command(about = "Validate campaign configuration files")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Environment to validate (development, test, production, ...)
    #[arg(short, long, default_value = "development")]
    environment: String,

    /// Configuration directory holding `campaign/` (default: ./config)
    #[arg(short, long)]
    config_dir: Option<PathBuf>,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output format (table, json)
    #[arg(long, default_value = "table")]
    format: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load, validate and print the effective configuration
    Validate,

    /// List environments with an override file
    Environments,

    /// Show the keys that differ between two environments
    Compare {
        /// Base environment for comparison
        #[arg(short, long, default_value = "development")]
        base: String,

        /// Target environment for comparison
        #[arg(short, long)]
        target: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let _subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .try_init();

    let result = match &cli.command {
        Some(Commands::Validate) | None => validate(&cli),
        Some(Commands::Environments) => list_environments(&cli),
        Some(Commands::Compare { base, target }) => compare(&cli, base, target),
    };

    match result {
        Ok(()) => {
            info!("Configuration check completed successfully");
            process::exit(0);
        }
        Err(e) => {
            error!("Configuration check failed: {e:#}");
            eprintln!("❌ {e:#}");
            process::exit(1);
        }
    }
}

fn load(cli: &Cli, environment: &str) -> Result<CampaignConfig> {
    let manager = ConfigManager::load_from_directory_with_env(cli.config_dir.clone(), environment)
        .with_context(|| format!("loading configuration for '{environment}'"))?;
    Ok(manager.config().clone())
}

fn validate(cli: &Cli) -> Result<()> {
    let config = load(cli, &cli.environment)?;

    match cli.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&config)?),
        _ => {
            println!("✅ Configuration valid for environment: {}", cli.environment);
            println!();
            for (key, value) in flatten(&serde_json::to_value(&config)?) {
                println!("  {key:<42} {value}");
            }
        }
    }
    Ok(())
}

fn list_environments(cli: &Cli) -> Result<()> {
    let dir = cli
        .config_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("config"))
        .join("campaign");

    let mut environments: Vec<String> = std::fs::read_dir(&dir)
        .with_context(|| format!("reading {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let path = entry.path();
            let is_toml = path.extension().is_some_and(|ext| ext == "toml");
            let stem = path.file_stem()?.to_str()?.to_string();
            (is_toml && stem != "base").then_some(stem)
        })
        .collect();
    environments.sort();

    println!("Environments with overrides in {}:", dir.display());
    for environment in environments {
        println!("  - {environment}");
    }
    Ok(())
}

fn compare(cli: &Cli, base: &str, target: &str) -> Result<()> {
    let base_values = flatten(&serde_json::to_value(load(cli, base)?)?);
    let target_values = flatten(&serde_json::to_value(load(cli, target)?)?);

    let mut differences = 0;
    for ((key, base_value), (_, target_value)) in base_values.iter().zip(target_values.iter()) {
        if base_value != target_value {
            differences += 1;
            println!("  {key:<42} {base_value} -> {target_value}");
        }
    }

    if differences == 0 {
        println!("No differences between '{base}' and '{target}'");
    }
    Ok(())
}

/// Dotted key/value pairs in key order
fn flatten(value: &serde_json::Value) -> Vec<(String, String)> {
    fn walk(prefix: &str, value: &serde_json::Value, out: &mut Vec<(String, String)>) {
        match value {
            serde_json::Value::Object(map) => {
                for (key, child) in map {
                    let path = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{prefix}.{key}")
                    };
                    walk(&path, child, out);
                }
            }
            other => out.push((prefix.to_string(), other.to_string())),
        }
    }

    let mut out = Vec::new();
    walk("", value, &mut out);
    out.sort();
    out
}
