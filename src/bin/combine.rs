//! combine CLI - run the aggregation demo and inspect field directives
//!
//! `RUST_LOG=combine=trace combine demo --concurrent` shows every dispatch and write-back.

use clap::{Parser, Subcommand};
use combine::{
    Combine, CombineConfig, Context, Directive, FieldValue, HandlerError, OutputTarget, Record,
    ResultMap, Schema,
};
use serde::Serialize;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "combine")]
#[command(version, about = "Tag-driven batch aggregation engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process the two-item demo batch and print the resulting records
    Demo {
        /// Path to a YAML engine configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Dispatch handlers concurrently (overrides the config file)
        #[arg(long)]
        concurrent: bool,
    },

    /// Parse a field directive and print how it would be applied
    CheckDirective {
        /// Directive text, e.g. "avg_score,fn:SetAvg"
        directive: String,
    },
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Item {
    #[serde(rename = "ID")]
    id: i64,
    name: String,
    score: i64,
    items: Vec<String>,
    avg_score: f64,
}

impl Record for Item {
    fn schema() -> Schema<Self> {
        Schema::new("Item")
            .tagged_field("ID", "combineItem,Items", |i: &Item| &i.id, |i: &mut Item| &mut i.id)
            .tagged_field("Name", "uppercase,Name", |i: &Item| &i.name, |i: &mut Item| &mut i.name)
            .tagged_field("Score", "avg_score,fn:SetAvg", |i: &Item| &i.score, |i: &mut Item| &mut i.score)
            .field("Items", |i: &Item| &i.items, |i: &mut Item| &mut i.items)
            .field("AvgScore", |i: &Item| &i.avg_score, |i: &mut Item| &mut i.avg_score)
            .callback("SetAvg", |i: &mut Item, avg: f64| i.avg_score = avg)
    }
}

fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Demo { config, concurrent } => run_demo(config, concurrent),
        Commands::CheckDirective { directive } => check_directive(&directive),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Run the demo batch through a fully configured engine
fn run_demo(config: Option<PathBuf>, concurrent: bool) -> Result<(), String> {
    let mut config = match config {
        Some(path) => CombineConfig::load_from_file(&path)
            .map_err(|e| format!("Failed to load config {}: {}", path.display(), e))?,
        None => CombineConfig::default(),
    };
    if concurrent {
        config = config.with_concurrent(true);
    }

    let engine = Combine::new(config);
    register_demo_handlers(&engine);
    tracing::info!(
        "Registered handlers: {}",
        engine.handler_names().join(", ")
    );

    let mut items = vec![
        Item { id: 1, name: "alice".to_string(), score: 90, ..Default::default() },
        Item { id: 2, name: "bob".to_string(), score: 80, ..Default::default() },
    ];

    engine
        .process_records(&mut items)
        .map_err(|e| format!("Processing failed: {}", e))?;

    let json = serde_json::to_string_pretty(&items)
        .map_err(|e| format!("Failed to serialize records: {}", e))?;
    println!("{}", json);
    Ok(())
}

fn register_demo_handlers(engine: &Combine) {
    engine.register(
        "uppercase",
        |values: &[FieldValue], _ctx: &Context| -> Result<ResultMap, HandlerError> {
            values
                .iter()
                .enumerate()
                .map(|(i, v)| match v.as_str() {
                    Some(s) => Ok((i, s.to_uppercase())),
                    None => Err(HandlerError::new(format!("expected string, got {}", v.kind()))),
                })
                .collect()
        },
    );

    engine.register(
        "combineItem",
        |values: &[FieldValue], _ctx: &Context| -> Result<ResultMap, HandlerError> {
            Ok(values
                .iter()
                .enumerate()
                .map(|(i, v)| {
                    let items = match v.as_i64() {
                        Some(1) => vec!["bbb", "aaa", "ccc"],
                        _ => vec!["sss"],
                    };
                    (i, items)
                })
                .collect())
        },
    );

    engine.register(
        "avg_score",
        |values: &[FieldValue], _ctx: &Context| -> Result<ResultMap, HandlerError> {
            Ok((0..values.len())
                .map(|i| (i, if i == 0 { 20.0 } else { 100.0 }))
                .collect())
        },
    );
}

/// Print the parsed form of a directive
fn check_directive(text: &str) -> Result<(), String> {
    let directive = Directive::parse(text)
        .ok_or_else(|| format!("Malformed directive: {:?}", text))?;

    println!("function: {}", directive.function);
    match &directive.output {
        OutputTarget::SameField => println!("output:   same field"),
        OutputTarget::Field(field) => println!("output:   field {}", field),
        OutputTarget::Callback(method) => println!("output:   callback {}", method),
    }
    Ok(())
}
