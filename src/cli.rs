//! Command-line interface of the `tmxbake` binary.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use crate::audit::{audit_dir, AuditOptions, ImageStatus};
use crate::inspect::inspect;
use crate::map::convert_file;
use crate::partition::{split_map_files, SplitReport};
use crate::validate::validate_dir;
use crate::{Config, Map};

pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// Bake Tiled maps into json documents for the game engine
#[derive(Parser)]
#[command(name = "tmxbake")]
#[command(version)]
pub struct Cli {
    /// TOML file with default options for all commands
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert a tmx map and its tilesets into one json document
    Convert {
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Fail when a layer has the wrong number of tiles
        #[arg(long)]
        strict: bool,

        /// Correct the image height of tilesets whose name or image contains NAME
        #[arg(long = "override", value_name = "NAME=HEIGHT", value_parser = parse_override)]
        overrides: Vec<(String, u32)>,
    },

    /// Split atlas images taller than the engine allows into chunks
    Split {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output json (only with a single input, default: overwrite the input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long)]
        max_height: Option<u32>,

        /// Name or image substring of the tileset to split
        #[arg(long)]
        target: Option<String>,
    },

    /// Check tmx files for required layers and missing files
    Validate {
        /// Folder to scan
        #[arg(long = "in", default_value = ".")]
        input: PathBuf,

        /// Required layer names, e.g. --require Collisions Entities Ground
        #[arg(long, num_args = 0..)]
        require: Vec<String>,

        /// Max tmx files to scan
        #[arg(long)]
        max: Option<usize>,
    },

    /// Print the gid ranges of the tilesets of a json map, fails on overlaps and unknown gids
    Inspect {
        input: PathBuf,
    },

    /// List png sizes against the texture size limits
    AuditImages {
        dir: PathBuf,

        #[arg(long)]
        warn: Option<u32>,

        #[arg(long)]
        critical: Option<u32>,
    },
}

fn parse_override(raw: &str) -> Result<(String, u32), String> {
    let (name, height) = raw.rsplit_once('=').ok_or_else(|| format!("expected NAME=HEIGHT, got '{}'", raw))?;
    let height = height.trim().parse().map_err(|e| format!("invalid height '{}': {}", height, e))?;
    Ok((name.trim().to_string(), height))
}

/// Run the CLI application
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match Config::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: cannot load config {}: {}", path.display(), e);
                return ExitCode::from(EXIT_INVALID_ARGS);
            }
        },
        None => Config::default(),
    };

    match cli.command {
        Commands::Convert { input, output, strict, overrides } => run_convert(config, &input, &output, strict, overrides),
        Commands::Split { inputs, output, max_height, target } => {
            run_split(config, &inputs, output.as_deref(), max_height, target)
        }
        Commands::Validate { input, require, max } => run_validate(config, &input, require, max),
        Commands::Inspect { input } => run_inspect(&input),
        Commands::AuditImages { dir, warn, critical } => run_audit(&dir, warn, critical),
    }
}

fn run_convert(config: Config, input: &Path, output: &Path, strict: bool, overrides: Vec<(String, u32)>) -> ExitCode {
    let mut options = config.convert;
    options.strict |= strict;
    for (name, height) in overrides {
        options.height_overrides.insert(name, height);
    }

    match convert_file(input, output, &options) {
        Ok(diagnostics) => {
            println!("Converted {} -> {} ({} warnings)", input.display(), output.display(), diagnostics.warnings().count());
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            eprintln!("Error: {}: {}", input.display(), e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn run_split(config: Config, inputs: &[PathBuf], output: Option<&Path>, max_height: Option<u32>, target: Option<String>) -> ExitCode {
    if output.is_some() && inputs.len() > 1 {
        eprintln!("Error: --output can only be used with a single input");
        return ExitCode::from(EXIT_INVALID_ARGS);
    }

    let mut options = config.partition;
    if let Some(max_height) = max_height {
        options.max_chunk_height = max_height;
    }
    if target.is_some() {
        options.target = target;
    }

    let jobs: Vec<(PathBuf, PathBuf)> = inputs
        .iter()
        .map(|input| (input.clone(), output.unwrap_or(input.as_path()).to_path_buf()))
        .collect();
    let batch = split_map_files(&jobs, &options);

    for ((input, result), (_, destination)) in batch.results.iter().zip(&jobs) {
        match result {
            Ok(SplitReport{ tileset: Some(name), chunks, .. }) => println!(
                "OK    {}: split '{}' into {} chunks -> {}",
                input.display(), name, chunks.len(), destination.display()
            ),
            Ok(_) => println!("OK    {}: nothing to split", input.display()),
            Err(e) => println!("FAIL  {}: {}", input.display(), e),
        }
    }

    println!("Done. OK={}  FAIL={}", batch.succeeded(), batch.failed());
    ExitCode::from(if batch.failed() == 0 { EXIT_SUCCESS } else { EXIT_ERROR })
}

fn run_validate(config: Config, input: &Path, require: Vec<String>, max: Option<usize>) -> ExitCode {
    let mut options = config.validate;
    if !require.is_empty() {
        options.required_layers = require;
    }
    if let Some(max) = max {
        options.max_files = max;
    }

    let reports = match validate_dir(input, &options) {
        Ok(reports) => reports,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };
    if reports.is_empty() {
        println!("No TMX files found under: {}", input.display());
        return ExitCode::from(EXIT_SUCCESS);
    }

    let separator = "=".repeat(90);
    let (mut passed, mut failed) = (0, 0);
    for report in &reports {
        println!("{}", separator);
        let path = report.path.strip_prefix(input).unwrap_or(&report.path);
        println!("{}  {}", if report.ok() { "PASS" } else { "FAIL" }, path.display());

        if !report.errors.is_empty() {
            println!("  Errors:");
            for e in &report.errors {
                println!("   - {}", e);
            }
        }
        if !report.warnings.is_empty() {
            println!("  Warnings:");
            for w in &report.warnings {
                println!("   - {}", w);
            }
        }

        let layers: Vec<_> = report.layers_found.iter().map(String::as_str).collect();
        println!("  Layers found: {}", if layers.is_empty() { "(none)".to_string() } else { layers.join(", ") });

        if report.ok() {
            passed += 1;
        } else {
            failed += 1;
        }
    }

    println!("\n{}", separator);
    println!("Done. PASS={}  FAIL={}", passed, failed);
    ExitCode::from(if failed == 0 { EXIT_SUCCESS } else { EXIT_ERROR })
}

fn run_inspect(input: &Path) -> ExitCode {
    let map = match Map::from_json_file(input) {
        Ok(map) => map,
        Err(e) => {
            eprintln!("Error: {}: {}", input.display(), e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let inspection = inspect(&map);
    println!("Total Tilesets: {}", inspection.tilesets.len());
    for tileset in &inspection.tilesets {
        println!("{}", tileset);
        for problem in &tileset.problems {
            println!("   - {}", problem);
        }
    }
    if !inspection.unresolved_gids.is_empty() {
        let gids: Vec<_> = inspection.unresolved_gids.iter().map(u32::to_string).collect();
        println!("Gids without a tileset: {}", gids.join(", "));
    }
    ExitCode::from(if inspection.has_problems() { EXIT_ERROR } else { EXIT_SUCCESS })
}

fn run_audit(dir: &Path, warn: Option<u32>, critical: Option<u32>) -> ExitCode {
    let defaults = AuditOptions::default();
    let options = AuditOptions{
        warn: warn.unwrap_or(defaults.warn),
        critical: critical.unwrap_or(defaults.critical),
    };

    match audit_dir(dir, &options) {
        Ok(entries) => {
            println!("Checking images in {}...", dir.display());
            for entry in &entries {
                println!("{}", entry.display(dir, &options));
            }
            let count = |status| entries.iter().filter(|e| e.status() == Some(status)).count();
            println!(
                "Done. {} image(s), WARNING={}  CRITICAL={}",
                entries.len(), count(ImageStatus::Warning), count(ImageStatus::Critical)
            );
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}
