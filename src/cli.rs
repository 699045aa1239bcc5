use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use rcforest::{ForestConfig, RandomCutForest};

#[derive(Parser)]
#[command(name = "rcforest")]
#[command(author, version, about = "Streaming anomaly detection with Random Cut Forests")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to forest configuration (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Score comma-separated rows, then learn from them
    Score {
        /// Input file (stdin when omitted)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Append low/high attribution columns
        #[arg(short, long)]
        attribution: bool,
    },

    /// Print the effective configuration
    Config,
}

pub fn run_command(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Score { input, attribution } => {
            let reader: Box<dyn BufRead> = match &input {
                Some(path) => Box::new(BufReader::new(
                    File::open(path).with_context(|| format!("failed to open {}", path.display()))?,
                )),
                None => Box::new(BufReader::new(io::stdin())),
            };
            score_stream(reader, cli.config.as_deref(), attribution)
        }

        Commands::Config => {
            let config = match &cli.config {
                Some(path) => load_config(path)?,
                None => ForestConfig::new(1, 1),
            };
            print!("{}", effective(&config).to_toml_string()?);
            Ok(())
        }
    }
}

fn load_config(path: &Path) -> Result<ForestConfig> {
    ForestConfig::load(path).with_context(|| format!("invalid configuration {}", path.display()))
}

/// Fill in every derived default so the printed TOML is explicit
fn effective(config: &ForestConfig) -> ForestConfig {
    let mut config = config.clone();
    config.output_after = Some(config.effective_output_after());
    config.lambda = Some(config.effective_lambda());
    config.density_depth = Some(config.effective_density_depth());
    config
}

fn parse_row(line: &str, line_no: usize) -> Result<Vec<f64>> {
    line.split(',')
        .map(|field| {
            field
                .trim()
                .parse::<f64>()
                .with_context(|| format!("line {}: invalid number {:?}", line_no, field.trim()))
        })
        .collect()
}

fn score_stream(reader: impl BufRead, config_path: Option<&Path>, attribution: bool) -> Result<()> {
    let mut forest: Option<RandomCutForest> = match config_path {
        Some(path) => Some(RandomCutForest::new(load_config(path)?)?),
        None => None,
    };

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut index = 0usize;

    for (line_no, line) in reader.lines().enumerate() {
        let line = line.context("failed to read input")?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let row = parse_row(line, line_no + 1)?;

        let forest = match forest {
            Some(ref mut forest) => forest,
            None => {
                // Without a configuration the first row fixes the dimensions
                let config = ForestConfig::new(row.len(), 1);
                info!(dimensions = row.len(), "no configuration given, using defaults");
                forest.insert(RandomCutForest::new(config)?)
            }
        };

        if row.len() != forest.dimensions() {
            bail!(
                "line {}: expected {} values, got {}",
                line_no + 1,
                forest.dimensions(),
                row.len()
            );
        }

        let score = match forest.score(&row) {
            Ok(score) => Some(score),
            Err(e) if e.is_warming_up() => None,
            Err(e) => return Err(e).with_context(|| format!("line {}", line_no + 1)),
        };

        match score {
            Some(score) if attribution => {
                let attr = forest.attribution(&row)?;
                let columns: Vec<String> = attr
                    .low
                    .iter()
                    .chain(&attr.high)
                    .map(|v| format!("{:.6}", v))
                    .collect();
                writeln!(out, "{},{:.6},{}", index, score, columns.join(","))?;
            }
            Some(score) => writeln!(out, "{},{:.6}", index, score)?,
            None => writeln!(out, "{},", index)?,
        }

        forest.update(&row)?;
        index += 1;
    }

    out.flush()?;
    if let Some(forest) = &forest {
        let stats = forest.stats().snapshot();
        debug!(?stats, "stream finished");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_row() {
        assert_eq!(parse_row("1, 2.5,-3", 1).unwrap(), vec![1.0, 2.5, -3.0]);
        assert!(parse_row("1,x", 4).is_err());
    }

    #[test]
    fn test_effective_fills_defaults() {
        let config = effective(&ForestConfig::new(2, 2).with_sample_size(64));
        assert_eq!(config.output_after, Some(64));
        assert_eq!(config.density_depth, Some(6));
        assert!(config.lambda.is_some());
    }
}
