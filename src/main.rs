//! FlowRunner CLI Entry Point
//!
//! Runs a workflow graph file end-to-end against in-memory stores.
//!
//! # Usage
//!
//! ```bash
//! # Execute a workflow graph
//! flowrunner signup.json
//!
//! # Seed the working context
//! flowrunner signup.json --input email=ann@example.com --input plan=pro
//!
//! # Mark the run as a test run with a custom configuration
//! flowrunner signup.json --test --config flowrunner.yaml
//!
//! # Override the retry and timeout settings
//! flowrunner signup.json --retries 0 --timeout 60
//! ```

use std::env;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use colored::Colorize;
use log::{error, info};
use serde_json::Value;

use flowrunner::config::EngineConfig;
use flowrunner::execution::Engine;
use flowrunner::graph::load_definition;
use flowrunner::run::{Run, RunStatus};
use flowrunner::steps::WorkingContext;
use flowrunner::store::{MemoryRunStore, MemoryWorkflowStore, WorkflowRecord};
use flowrunner::{APP_NAME, VERSION};

/// Command-line configuration parsed from arguments.
#[derive(Debug, Default)]
struct Config {
    graph_path: Option<String>,
    config_path: Option<String>,
    is_test: bool,
    inputs: WorkingContext,
    retries: Option<u32>,
    retry_delay: Option<u64>,
    timeout: Option<u64>,
    verbose: bool,
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

/// Prints the application banner with version information.
fn print_banner() {
    println!();
    println!("{} v{}", APP_NAME, VERSION);
    println!("Workflow Execution Engine");
    println!();
}

/// Prints usage information.
fn print_usage() {
    println!("Usage: flowrunner [OPTIONS] <GRAPH_FILE>");
    println!();
    println!("Arguments:");
    println!("  <GRAPH_FILE>          Path to workflow graph JSON file");
    println!();
    println!("Options:");
    println!("  --test                Mark the run as a test run");
    println!("  --input KEY=VALUE     Seed the working context (repeatable)");
    println!("  --config PATH         Engine configuration YAML file");
    println!("  --retries N           Retries per failing node");
    println!("  --retry-delay SECS    Delay between retries");
    println!("  --timeout SECS        Run timeout, 0 disables it");
    println!("  --verbose             Enable debug logging");
    println!("  --help                Show this help message");
    println!("  --version             Show version information");
    println!();
    println!("Examples:");
    println!("  flowrunner signup.json");
    println!("  flowrunner signup.json --input plan=pro --retries 0");
}

/// Parses a `KEY=VALUE` input. Values that parse as JSON keep their type,
/// anything else is taken as a string.
fn parse_input(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("Invalid input '{}', expected KEY=VALUE", raw))?;

    let key = key.trim();
    if key.is_empty() {
        return Err(format!("Invalid input '{}', key is empty", raw));
    }

    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn next_value<'a>(args: &'a [String], i: &mut usize, flag: &str) -> Result<&'a str, String> {
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| format!("{} requires an argument", flag))
}

fn parse_number<T: std::str::FromStr>(value: &str, flag: &str) -> Result<T, String> {
    value
        .parse()
        .map_err(|_| format!("Invalid {} value: {}", flag, value))
}

/// Parses command-line arguments into a Config struct.
fn parse_arguments(args: &[String]) -> Result<Config, String> {
    let mut config = Config::default();
    let mut i = 1; // Skip program name

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--test" => {
                config.is_test = true;
            }
            "--verbose" | "-v" => {
                config.verbose = true;
            }
            "--input" => {
                let (key, value) = parse_input(next_value(args, &mut i, "--input")?)?;
                config.inputs.insert(key, value);
            }
            "--config" => {
                config.config_path = Some(next_value(args, &mut i, "--config")?.to_string());
            }
            "--retries" => {
                config.retries = Some(parse_number(next_value(args, &mut i, "--retries")?, "--retries")?);
            }
            "--retry-delay" => {
                config.retry_delay = Some(parse_number(
                    next_value(args, &mut i, "--retry-delay")?,
                    "--retry-delay",
                )?);
            }
            "--timeout" => {
                config.timeout = Some(parse_number(next_value(args, &mut i, "--timeout")?, "--timeout")?);
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => {
                if config.graph_path.is_some() {
                    return Err(format!("Unexpected argument: {}", arg));
                }
                config.graph_path = Some(arg.clone());
            }
        }
        i += 1;
    }

    if config.graph_path.is_none() {
        return Err("Missing <GRAPH_FILE> argument".to_string());
    }

    Ok(config)
}

/// Loads the engine configuration, then applies environment overrides.
fn load_engine_config(path: Option<&str>) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let base = match path {
        Some(path) => {
            info!("Loading configuration: {}", path);
            EngineConfig::load(path)?
        }
        None => EngineConfig::default(),
    };
    Ok(base.with_env_overrides(|key| env::var(key).ok())?)
}

/// Prints the final run record.
fn print_run(run: &Run) {
    println!();
    let status = match run.status {
        RunStatus::Success => run.status.as_str().green().bold(),
        RunStatus::Failed => run.status.as_str().red().bold(),
        _ => run.status.as_str().yellow().bold(),
    };
    println!("Run {}: {}", run.id, status);

    if let Some(secs) = run.duration_secs {
        println!("Duration: {}s", secs);
    }
    if let Some(ref message) = run.error_message {
        println!("Error: {}", message.red());
    }

    if !run.log.is_empty() {
        println!();
        println!("{}", "Log:".bold());
        print!("{}", run.log);
    }
}

/// Main application entry point. Returns the final run status.
async fn run() -> Result<RunStatus, Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    // Parse arguments
    let config = parse_arguments(&args).map_err(|e| {
        eprintln!("Error: {}", e);
        eprintln!();
        print_usage();
        e
    })?;

    setup_logging(config.verbose);
    print_banner();

    let engine_config = load_engine_config(config.config_path.as_deref())?;
    let graph_path = config.graph_path.unwrap_or_default();

    info!("Loading workflow graph: {}", graph_path);
    let (json_graph, definition) = load_definition(&graph_path).map_err(|e| {
        error!("Failed to load workflow graph: {}", e);
        format!("Could not load workflow graph from '{}': {}", graph_path, e)
    })?;
    info!(
        "Workflow loaded: {} nodes, {} edges",
        definition.nodes.len(),
        definition.edges.len()
    );

    let workflow_id = Path::new(&graph_path)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("workflow")
        .to_string();

    let mut record = WorkflowRecord::new(workflow_id.clone(), workflow_id.clone(), json_graph);
    if let Some(retries) = config.retries {
        record.retry_count = retries;
    }
    if let Some(delay) = config.retry_delay {
        record.retry_delay_secs = delay;
    }
    if let Some(timeout) = config.timeout {
        record.max_timeout_secs = timeout;
    }

    let workflows = Arc::new(MemoryWorkflowStore::new());
    let runs = Arc::new(MemoryRunStore::new());
    workflows.insert(record).await;

    let engine = Engine::new(workflows, runs, engine_config)?;
    info!("Step types: {}", engine.registry().step_types().join(", "));
    let run_id = engine.start(&workflow_id, config.is_test, config.inputs).await?;
    engine.join(&run_id).await?;

    let run = engine.run_record(&run_id).await?;
    print_run(&run);
    Ok(run.status)
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(RunStatus::Success) => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!();
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
