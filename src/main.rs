//! Reagent: bounded ReAct agent CLI.
//!
//! Usage:
//!   reagent ask "<query>"     Answer a query with the configured model and tools
//!   reagent tools             List the tools the agent can call
//!   reagent init              Write a default reagent.toml

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use reagent::agent::{prompt, Agent, PromptBuilder, Role};
use reagent::config::{self, ReagentConfig, CONFIG_FILE};
use reagent::inference::InferenceClient;
use reagent::tools;
use reagent::Outcome;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "reagent")]
#[command(version)]
#[command(about = "Bounded ReAct agent: think, pick a tool, observe, answer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to reagent home directory [default: ~/.reagent].
    #[arg(long)]
    home: Option<String>,

    /// Log level (debug, info, warn, error). Overrides the config file.
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Answer a query.
    Ask {
        /// The question to answer.
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,

        /// Override the configured iteration budget.
        #[arg(long)]
        max_iterations: Option<u32>,

        /// Print the full transcript after the answer.
        #[arg(long)]
        transcript: bool,

        /// Save the run report as JSON in the transcript directory.
        #[arg(long)]
        save: bool,
    },

    /// List the registered tools and their parameters.
    Tools,

    /// Write a default config file.
    Init {
        /// Overwrite an existing config.
        #[arg(long)]
        force: bool,
    },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let home_dir = cli
        .home
        .as_deref()
        .map(|h| PathBuf::from(shellexpand::tilde(h).into_owned()))
        .unwrap_or_else(config::default_home_dir);
    let config_path = home_dir.join(CONFIG_FILE);
    // `init` must work even when the existing file no longer loads.
    let cfg = match cli.command {
        Commands::Init { .. } => ReagentConfig::default(),
        _ => config::load_config(&config_path)?,
    };

    // Initialize logging
    let level = cli.log_level.as_deref().unwrap_or(&cfg.log_level);
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Ask {
            query,
            max_iterations,
            transcript,
            save,
        } => cmd_ask(cfg, &query.join(" "), max_iterations, transcript, save).await,
        Commands::Tools => cmd_tools(&cfg),
        Commands::Init { force } => cmd_init(&config_path, force),
    }
}

// ---------------------------------------------------------------------------
// Command implementations
// ---------------------------------------------------------------------------

async fn cmd_ask(
    mut cfg: ReagentConfig,
    query: &str,
    max_iterations: Option<u32>,
    show_transcript: bool,
    save: bool,
) -> Result<()> {
    if let Some(n) = max_iterations {
        cfg.max_iterations = n;
    }
    cfg.validate().context("Invalid configuration")?;
    if query.trim().is_empty() {
        bail!("Query must not be empty");
    }

    let model = Arc::new(
        InferenceClient::from_config(&cfg).context("Failed to build inference client")?,
    );
    let registry = tools::default_registry(&cfg, model.clone())?;
    let prompt_builder = match cfg.resolved_prompt_template() {
        Some(path) => PromptBuilder::from_file(&path)?,
        None => PromptBuilder::default(),
    };

    println!(
        "{} Asking {} ({} tools, budget {})",
        ">>>".green().bold(),
        model.model(),
        registry.len(),
        cfg.max_iterations,
    );

    let agent = Agent::new(model, registry)
        .with_max_iterations(cfg.max_iterations)
        .with_prompt_builder(prompt_builder);

    let report = agent.run(query).await;

    if show_transcript {
        println!();
        println!("{}", "=== Transcript ===".bold());
        for entry in report.transcript.entries() {
            let role = match entry.role {
                Role::User => "user".cyan(),
                Role::Assistant => "assistant".green(),
                Role::System => "system".yellow(),
            };
            println!(
                "[{}] {}: {}",
                entry.timestamp.format("%H:%M:%S"),
                role,
                entry.content
            );
        }
    }

    println!();
    match &report.outcome {
        Outcome::Answered(text) => println!("{} {}", "Answer:".green().bold(), text),
        Outcome::Exhausted => println!("{} {}", "Gave up:".red().bold(), report.outcome),
    }
    println!(
        "  {} iterations, {} model calls, {} tokens",
        report.iterations, report.model_calls, report.usage.total_tokens
    );

    if save {
        let path = cfg
            .resolved_transcript_dir()
            .join(format!("{}.json", report.run_id));
        report.save_json(&path)?;
        println!("  Saved run to {}", path.display());
    }

    if !report.outcome.is_answered() {
        std::process::exit(2);
    }
    Ok(())
}

fn cmd_tools(cfg: &ReagentConfig) -> Result<()> {
    let model = InferenceClient::from_config(cfg).context("Failed to build inference client")?;
    let registry = tools::default_registry(cfg, Arc::new(model))?;
    println!("{}", "=== Tools ===".bold());
    println!("{}", prompt::render_tools(&registry.catalog()));
    Ok(())
}

fn cmd_init(config_path: &Path, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        eprintln!(
            "{} Config already exists at {}. Use --force to overwrite.",
            "Error:".red().bold(),
            config_path.display()
        );
        std::process::exit(1);
    }

    config::save_config(&ReagentConfig::default(), config_path)?;
    info!("Wrote default config to {}", config_path.display());
    println!("Config written to {}", config_path.display());
    Ok(())
}
