//! Sensor Anomaly Lab - Main Entry Point

use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use cli::{commands, init_logging, load_config};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "anomaly-lab")]
#[command(version, about = "Windowed features and threshold baselines for sensor anomaly data", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long, short, global = true, env = "ANOMALY_LAB_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter, takes precedence over RUST_LOG and the configured level
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Concatenate the first CSV of every unit folder
    Concat {
        #[arg(long)]
        source: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },

    /// Summarise each crane folder into a labeled use-instance table
    UseInstances {
        #[arg(long)]
        source: PathBuf,
        #[arg(long)]
        output_dir: PathBuf,
    },

    /// Label by the entity's danger zones, or by status mapping without --entity
    Label {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[arg(long)]
        entity: Option<String>,
    },

    /// Extract sliding-window features
    Segment {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        /// Window each entity separately
        #[arg(long)]
        entity_column: Option<String>,
    },

    /// Average sensor groups
    Group {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },

    /// Split into train and test tables
    Split {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        train: PathBuf,
        #[arg(long)]
        test: PathBuf,
        /// Split by row order instead of by entity
        #[arg(long)]
        chronological: bool,
    },

    /// Grid search the F1-optimal cutoff per field
    Search {
        #[arg(long)]
        input: PathBuf,
        /// Fields to search (all numeric fields when omitted)
        #[arg(long = "field")]
        fields: Vec<String>,
        /// Save the found cutoffs as a rule file
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Score saved rules, or a random forest trained on --train, on a labeled table
    Evaluate {
        #[arg(long, value_enum, default_value_t = Model::Rules)]
        model: Model,
        /// Labeled table to score
        #[arg(long, visible_alias = "input")]
        test: PathBuf,
        /// Rule file written by `search --output`
        #[arg(long)]
        rules: Option<PathBuf>,
        /// Training table for the random forest
        #[arg(long)]
        train: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Model {
    /// Saved threshold conjunction
    Rules,
    /// Random forest
    Rf,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    init_logging(
        cli.log_level.as_deref(),
        &config.logging.level,
        cli.json_logs || config.logging.json,
    );
    info!("=== Sensor Anomaly Lab v{} ===", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Concat { source, output } => {
            let summary = commands::concat(&source, &output)?;
            print_json(&summary)?;
        }
        Commands::UseInstances { source, output_dir } => {
            let summaries = commands::use_instances(&config, &source, &output_dir)?;
            print_json(&summaries)?;
        }
        Commands::Label {
            input,
            output,
            entity,
        } => {
            let summary = commands::label(&config, &input, &output, entity.as_deref())?;
            print_json(&summary)?;
        }
        Commands::Segment {
            input,
            output,
            entity_column,
        } => {
            let summary =
                commands::segment(&config, &input, &output, entity_column.as_deref())?;
            print_json(&summary)?;
        }
        Commands::Group { input, output } => {
            let summary = commands::group(&config, &input, &output)?;
            print_json(&summary)?;
        }
        Commands::Split {
            input,
            train,
            test,
            chronological,
        } => {
            let summary = commands::split(&config, &input, &train, &test, chronological)?;
            print_json(&summary)?;
        }
        Commands::Search {
            input,
            fields,
            output,
        } => {
            let summary = commands::search(&config, &input, &fields, output.as_deref())?;
            if cli.json {
                print_json(&summary)?;
            } else {
                for field in &summary.fields {
                    match field.outcome.best {
                        Some(best) => println!(
                            "{:<32} {} {:>14.6}  F1 {:.4}",
                            field.field, field.direction, best.cutoff, best.f1
                        ),
                        None => println!("{:<32} no cutoff with F1 above 0", field.field),
                    }
                }
            }
        }
        Commands::Evaluate {
            model,
            test,
            rules,
            train,
        } => {
            let evaluation = match (model, rules, train) {
                (Model::Rules, Some(rules), _) => {
                    commands::evaluate_rules(&config, &test, &rules)?
                }
                (Model::Rf, _, Some(train)) => {
                    commands::evaluate_forest(&config, &train, &test)?
                }
                (Model::Rules, None, _) => bail!("--model rules needs --rules"),
                (Model::Rf, _, None) => bail!("--model rf needs --train"),
            };
            if cli.json {
                print_json(&evaluation)?;
            } else {
                println!("{}", evaluation.report);
                println!("{}", evaluation.matrix.render_heatmap());
                println!("F1: {:.4}", evaluation.f1);
            }
        }
    }

    Ok(())
}
