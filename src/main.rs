//! qcode CLI - send editor prompts to LLM providers and apply the edits they return

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use qcode::{
    api::RequestDispatcher,
    apply::Workspace,
    catalog::ProviderId,
    changes::parse_changes,
    config::{Config, PromptMode},
    engine::{EditorContext, Engine, ProjectType},
    tui::{TerminalRenderer, WaitSpinner},
};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "qcode")]
#[command(about = "Route editor prompts to LLM providers and apply the edits they suggest")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level, overridden by RUST_LOG
    #[arg(short, long, default_value = "warn", global = true)]
    log_level: String,

    /// Config file (default: the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a prompt to the active provider
    Ask {
        /// What to ask or change
        prompt: String,

        /// Open file, relative to the workspace
        #[arg(short, long)]
        file: Option<String>,

        /// Selected text to include
        #[arg(short, long)]
        selection: Option<String>,

        /// Project type (flutter, rust, node, python, generic)
        #[arg(long, default_value = "generic")]
        project_type: ProjectType,

        /// chat returns the answer, engine applies the suggested edits
        #[arg(long, value_parser = parse_mode)]
        mode: Option<PromptMode>,

        /// Provider override (anthropic, openai, groq, ollama, deepseek, grok3)
        #[arg(short, long)]
        provider: Option<String>,

        /// Model override for the chosen provider
        #[arg(short, long)]
        model: Option<String>,

        /// Workspace root that edits are confined to
        #[arg(short, long, default_value = ".")]
        workspace: PathBuf,
    },

    /// Apply a saved model response containing a JSON edit array
    Apply {
        /// File holding the model's response text
        response: PathBuf,

        /// File that edits without a relativePath target
        #[arg(short, long)]
        file: Option<String>,

        #[arg(short, long, default_value = ".")]
        workspace: PathBuf,
    },

    /// List providers with models, limits, pricing and key status
    Providers,

    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Show the effective configuration with keys masked
    Show,
    /// Print the config file path
    Path,
}

fn parse_mode(s: &str) -> Result<PromptMode, String> {
    match s.to_lowercase().as_str() {
        "chat" => Ok(PromptMode::Chat),
        "engine" => Ok(PromptMode::Engine),
        other => Err(format!("unknown mode '{}', expected chat or engine", other)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = cli.config.unwrap_or_else(Config::default_path);

    match cli.command {
        Commands::Ask {
            prompt,
            file,
            selection,
            project_type,
            mode,
            provider,
            model,
            workspace,
        } => {
            let mut config = Config::load_from(config_path)?;
            if let Some(provider) = provider {
                config.active_provider = provider;
            }
            if let Some(model) = model {
                let id: ProviderId = config
                    .active_provider
                    .parse()
                    .map_err(|e: String| anyhow::anyhow!("unknown provider '{}'", e))?;
                config.provider_mut(id).model = model;
            }
            if let Some(mode) = mode {
                config.mode = mode;
            }

            let editor = EditorContext {
                content: match &file {
                    Some(path) => Some(read_open_file(&workspace, path).await?),
                    None => None,
                },
                file_path: file,
                selection,
                project_type,
            };
            run_ask(&prompt, &editor, &config, &workspace).await?;
        }
        Commands::Apply {
            response,
            file,
            workspace,
        } => {
            let config = Config::load_from(config_path)?;
            run_apply(&response, file.as_deref(), &workspace, &config).await?;
        }
        Commands::Providers => {
            let config = Config::load_from(config_path)?;
            TerminalRenderer::new().render_providers(&config);
        }
        Commands::Config(cmd) => {
            run_config_command(cmd, config_path)?;
        }
    }

    Ok(())
}

async fn read_open_file(workspace: &Path, file: &str) -> Result<String> {
    let path = workspace.join(file);
    tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))
}

async fn run_ask(prompt: &str, editor: &EditorContext, config: &Config, root: &Path) -> Result<()> {
    let renderer = TerminalRenderer::new();
    let workspace = Workspace::new(root)?.with_overwrite(config.workspace.allow_overwrite);
    let engine = Engine::new(RequestDispatcher::new(&config.dispatch)?, workspace);

    let model = config
        .active_provider
        .parse::<ProviderId>()
        .map(|id| config.provider(id).model_or_default(id))
        .unwrap_or_default();
    renderer.render_header(&config.active_provider, &model, config.mode);
    debug!("workspace root: {}", engine.workspace().root().display());

    let mut spinner = WaitSpinner::new();
    spinner.start(format!("Waiting for {}...", config.active_provider));
    let result = engine.process_prompt(prompt, editor, config).await;
    spinner.stop();

    let text = match result {
        Ok(text) => text,
        Err(e) => {
            renderer.render_error(&e.to_string());
            return Err(e.into());
        }
    };

    match config.mode {
        PromptMode::Chat => renderer.render_answer(&text),
        PromptMode::Engine => renderer.render_engine_summary(&text),
    }

    let metrics = engine.metrics().get_metrics();
    renderer.render_usage_line(
        metrics.total_input_tokens,
        metrics.total_output_tokens,
        metrics.total_cost,
        metrics.estimated_count > 0,
    );

    Ok(())
}

async fn run_apply(response: &Path, file: Option<&str>, root: &Path, config: &Config) -> Result<()> {
    let renderer = TerminalRenderer::new();
    let text = tokio::fs::read_to_string(response)
        .await
        .with_context(|| format!("failed to read {}", response.display()))?;

    let changes = parse_changes(&text)?;
    info!("applying {} change(s)", changes.len());

    let workspace = Workspace::new(root)?.with_overwrite(config.workspace.allow_overwrite);
    let report = workspace.apply_batch(&changes, file);
    renderer.render_changes(&report);

    let failed = report.failures().count();
    if failed > 0 {
        anyhow::bail!("{} change(s) could not be applied", failed);
    }
    Ok(())
}

fn run_config_command(cmd: ConfigCommands, path: PathBuf) -> Result<()> {
    match cmd {
        ConfigCommands::Init { force } => {
            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            Config::default().save_to(path.clone())?;
            println!("Configuration file created at: {}", path.display());
            println!();
            println!("Add API keys to the file, or set environment variables:");
            for provider in ProviderId::ALL.iter().filter(|p| p.requires_api_key()) {
                println!("  export {}=...", provider.api_key_env());
            }
        }
        ConfigCommands::Show => {
            let config = Config::load_from(path)?;
            println!("{}", toml::to_string_pretty(&config.masked())?);

            println!("--- Environment Variables ---");
            for provider in ProviderId::ALL.iter().filter(|p| p.requires_api_key()) {
                let env = provider.api_key_env();
                let state = if std::env::var(env).is_ok() { "set" } else { "not set" };
                println!("{}: {}", env, state);
            }
            println!(
                "OLLAMA_URL: {}",
                std::env::var("OLLAMA_URL").unwrap_or_else(|_| "not set".to_string())
            );
        }
        ConfigCommands::Path => {
            println!("{}", path.display());
        }
    }
    Ok(())
}
