use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kbgraph::config::ExplorerConfig;
use kbgraph::graph::{
    ExpansionOutcome, ExpansionPolicy, GraphState, MemorySource, expand_node, load_seeds,
};
use kbgraph::schema::{FormatOptions, Schema};

/// Validate knowledge-base records and explore them as a graph.
#[derive(Parser)]
#[command(name = "kbgraph")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Schema file (.yaml, .yml, .json); defaults to the bundled schema
    #[arg(long, global = true)]
    schema: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective properties of a class
    Describe {
        /// Class name (case-insensitive)
        class: String,
    },
    /// Validate and normalise a record against a class
    Validate {
        #[arg(short, long)]
        class: String,

        /// JSON file holding the record
        #[arg(short, long)]
        record: PathBuf,

        /// Fill absent attributes from defaults and generators
        #[arg(long)]
        add_defaults: bool,

        /// Tolerate missing mandatory attributes
        #[arg(long)]
        ignore_missing: bool,

        /// Drop attributes the class does not declare
        #[arg(long)]
        drop_extra: bool,
    },
    /// Build a graph from a record dump and print it as JSON
    Explore {
        /// JSON dump of records (array, or object keyed by id)
        #[arg(long)]
        records: PathBuf,

        /// Records to start from
        #[arg(long = "seed", required = true)]
        seeds: Vec<String>,

        /// Records to expand, in order
        #[arg(long = "expand")]
        expand: Vec<String>,

        /// Explorer config (.yaml)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Expand heavily connected records without confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "kbgraph=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .init();
}

fn load_schema(path: Option<&Path>) -> anyhow::Result<Schema> {
    let schema = match path {
        Some(path) => Schema::from_path(path)?,
        None => Schema::bundled()?,
    };
    Ok(schema)
}

fn describe(schema: &Schema, class: &str) -> anyhow::Result<()> {
    let model = schema.expect(class)?;
    let mut flags = Vec::new();
    if model.is_abstract {
        flags.push("abstract");
    }
    if model.is_edge {
        flags.push("edge");
    }
    if model.embedded {
        flags.push("embedded");
    }
    if flags.is_empty() {
        println!("{}", model.name);
    } else {
        println!("{} ({})", model.name, flags.join(", "));
    }
    let inherits = model.inherits();
    if !inherits.is_empty() {
        println!("inherits: {}", inherits.join(", "));
    }
    if let Some(description) = &model.description {
        println!("{description}");
    }

    for (name, prop) in model.properties() {
        let mut line = format!("  {name}: {}", prop.property_type);
        if let Some(linked) = model.linked_class(prop) {
            line.push_str(&format!(" -> {}", linked.name));
        }
        if prop.mandatory {
            line.push_str(" mandatory");
        }
        if !prop.nullable {
            line.push_str(" not-null");
        }
        if let Some(default) = &prop.default {
            line.push_str(&format!(" default={default}"));
        }
        if let Some(generator) = prop.default_generator.as_ref().or(prop.generator.as_ref()) {
            line.push_str(&format!(" generator={}", generator.name()));
        }
        if !prop.choices.is_empty() {
            let choices: Vec<String> = prop.choices.iter().map(Value::to_string).collect();
            line.push_str(&format!(" choices=[{}]", choices.join(", ")));
        }
        println!("{line}");
    }
    Ok(())
}

fn validate(schema: &Schema, class: &str, record: &Path, options: FormatOptions) -> anyhow::Result<()> {
    let model = schema.expect(class)?;
    let content = fs::read_to_string(record)
        .with_context(|| format!("failed to read record {}", record.display()))?;
    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse record {}", record.display()))?;
    let Value::Object(record) = value else {
        bail!("record must be a JSON object");
    };
    let formatted = model.format_record(&record, &options)?;
    println!("{}", serde_json::to_string_pretty(&formatted)?);
    Ok(())
}

async fn explore(
    schema: &Schema,
    records: &Path,
    seeds: &[String],
    expand: &[String],
    config: Option<&Path>,
    yes: bool,
) -> anyhow::Result<()> {
    let config = match config {
        Some(path) => ExplorerConfig::from_path(path)?,
        None => ExplorerConfig::default(),
    };
    let source = MemorySource::from_path(records)?;
    let mut state = GraphState::new(schema, &config);
    load_seeds(&mut state, &source, seeds).await?;

    let policy = if yes {
        ExpansionPolicy::Force
    } else {
        ExpansionPolicy::Confirm
    };
    for rid in expand {
        if let ExpansionOutcome::NeedsConfirmation(plan) =
            expand_node(&mut state, &source, rid, policy).await?
        {
            warn!(
                node = %rid,
                edges = plan.len(),
                threshold = state.heavily_connected(),
                "skipped heavily connected node; rerun with --yes to expand it"
            );
        }
    }

    println!("{}", serde_json::to_string_pretty(&state.snapshot())?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let schema = load_schema(cli.schema.as_deref())?;

    match cli.command {
        Commands::Describe { class } => describe(&schema, &class)?,
        Commands::Validate {
            class,
            record,
            add_defaults,
            ignore_missing,
            drop_extra,
        } => {
            let options = FormatOptions {
                add_defaults,
                ignore_missing,
                drop_extra,
                ..FormatOptions::default()
            };
            validate(&schema, &class, &record, options)?;
        }
        Commands::Explore {
            records,
            seeds,
            expand,
            config,
            yes,
        } => {
            explore(&schema, &records, &seeds, &expand, config.as_deref(), yes).await?;
        }
    }

    Ok(())
}
