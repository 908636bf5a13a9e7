use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use weft_core::config::AppConfig;
use weft_core::traits::{CompletionBackend, ToolBackend};
use weft_core::types::Outputs;
use weft_core::workflow::Workflow;
use weft_engine::{RunLogger, WorkflowEngine};

#[derive(Parser)]
#[command(name = "weft", version, about = "Run declarative workflow graphs")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "weft.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a workflow file and print the result as JSON
    Run {
        /// Workflow definition (.json or .toml)
        file: PathBuf,
        /// Input value as key=value; the value is parsed as JSON when possible
        #[arg(short, long = "input", value_name = "KEY=VALUE")]
        inputs: Vec<String>,
        /// Inputs as a JSON object; --input entries override its keys
        #[arg(long, value_name = "JSON")]
        inputs_json: Option<String>,
        /// Answer llm nodes with their prompt instead of calling a model
        #[arg(long)]
        echo: bool,
    },
    /// Check a workflow file without running it
    Validate {
        /// Workflow definition (.json or .toml)
        file: PathBuf,
    },
    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("weft=info,warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::Validate { file } => {
            let workflow = load_workflow(&file)?;
            let engine = WorkflowEngine::builder().build();
            match engine.validate(&workflow) {
                Ok(()) => println!(
                    "Workflow '{}' is valid ({} nodes, {} edges)",
                    workflow.id,
                    workflow.nodes.len(),
                    workflow.edges.len()
                ),
                Err(e) => {
                    eprintln!("Workflow '{}' is invalid: {}", workflow.id, e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Run {
            file,
            inputs,
            inputs_json,
            echo,
        } => {
            let workflow = load_workflow(&file)?;
            let inputs = parse_inputs(inputs_json.as_deref(), &inputs)?;
            let engine = build_engine(&config, echo);

            let cancel = CancellationToken::new();
            let logger = config
                .log
                .as_ref()
                .filter(|l| l.enabled)
                .map(|l| RunLogger::from_config(l).single_run().spawn(engine.event_bus(), cancel.clone()));

            let result = engine.execute(&workflow, inputs).await;

            if let Some(handle) = logger {
                handle.await.ok();
            }
            cancel.cancel();

            println!("{}", serde_json::to_string_pretty(&result)?);
            if !result.success {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    if path.exists() {
        info!(path = %path.display(), "Loading config");
        Ok(AppConfig::load(path)?)
    } else {
        warn!(path = %path.display(), "No config file found, using defaults");
        Ok(AppConfig::default())
    }
}

/// Parse a workflow file, picking the format from its extension.
fn load_workflow(path: &Path) -> anyhow::Result<Workflow> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read workflow {}", path.display()))?;
    let workflow = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => Workflow::from_toml_str(&content)?,
        Some("json") | None => Workflow::from_json_str(&content)?,
        Some(other) => bail!("Unsupported workflow format: .{}", other),
    };
    Ok(workflow)
}

fn build_engine(config: &AppConfig, echo: bool) -> WorkflowEngine {
    let mut builder = WorkflowEngine::builder().config(config);

    if !config.tools.is_empty() {
        let tools: Arc<dyn ToolBackend> =
            Arc::new(weft_backends::ShellToolBackend::new(config.tools.clone()));
        builder = builder.tool_backend(tools);
    }

    let completion: Option<Arc<dyn CompletionBackend>> = if echo {
        Some(Arc::new(weft_backends::EchoCompletion))
    } else {
        config.model.as_ref().map(weft_backends::create_completion)
    };
    if let Some(completion) = completion {
        builder = builder.completion_backend(completion);
    }

    builder.build()
}

/// Merge `--inputs-json` and `--input key=value` pairs into one input map.
fn parse_inputs(json: Option<&str>, pairs: &[String]) -> anyhow::Result<Outputs> {
    let mut inputs = match json {
        Some(text) => match serde_json::from_str::<Value>(text).context("Invalid --inputs-json")? {
            Value::Object(map) => map,
            _ => bail!("--inputs-json must be a JSON object"),
        },
        None => Outputs::new(),
    };

    for pair in pairs {
        let Some((key, raw)) = pair.split_once('=') else {
            bail!("Invalid --input '{}', expected KEY=VALUE", pair);
        };
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        inputs.insert(key.trim().to_string(), value);
    }
    Ok(inputs)
}
