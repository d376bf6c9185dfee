pub mod config_cmd;
pub mod count;
pub mod run;
pub mod serve;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use gemma_core::{EngineConfig, GemmaBackend, GemmaContext};

use crate::config::AppConfig;

#[derive(Parser)]
#[command(
    name = "gemma-server",
    version,
    about = "Run a Gemma engine context from the command line or over HTTP"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, clap::Args, Clone)]
pub struct GlobalArgs {
    /// Path or file name of the engine shared library.
    #[arg(long, global = true, env = "GEMMA_LIBRARY_PATH")]
    pub library: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API server (default).
    Serve(ServeArgs),

    /// Load a model and start an interactive prompt loop.
    Run(RunArgs),

    /// Print the number of tokens in a text.
    Count(CountArgs),

    /// View / edit configuration.
    Config(ConfigArgs),
}

//  Subcommand argument structs

/// Model selection; anything left unset falls back to the config file.
#[derive(Debug, clap::Args, Clone, Default)]
pub struct ModelArgs {
    /// Tokenizer file.
    #[arg(long)]
    pub tokenizer: Option<PathBuf>,

    /// Weights file.
    #[arg(long)]
    pub weights: Option<PathBuf>,

    /// Model type, e.g. `2b-it`.
    #[arg(long = "model-type")]
    pub model_type: Option<String>,

    /// Weight type, e.g. `sfp`.
    #[arg(long = "weight-type")]
    pub weight_type: Option<String>,

    /// Generation limit configured on the engine context.
    #[arg(long = "context-max-length")]
    pub context_max_length: Option<u32>,
}

impl ModelArgs {
    /// Merge command-line values over the configured model.
    pub fn resolve(&self, cfg: &AppConfig) -> anyhow::Result<EngineConfig> {
        let base = cfg.model.as_ref();
        let tokenizer = self
            .tokenizer
            .clone()
            .or_else(|| base.map(|m| m.tokenizer_path.clone()))
            .filter(|p| !p.as_os_str().is_empty())
            .context("no tokenizer given (use --tokenizer or set `model` in the config)")?;
        let weights = self
            .weights
            .clone()
            .or_else(|| base.map(|m| m.weights_path.clone()))
            .filter(|p| !p.as_os_str().is_empty())
            .context("no weights given (use --weights or set `model` in the config)")?;
        let model_type = self
            .model_type
            .clone()
            .or_else(|| base.map(|m| m.model_type.clone()))
            .filter(|s| !s.is_empty())
            .context("no model type given (use --model-type)")?;
        let weight_type = self
            .weight_type
            .clone()
            .or_else(|| base.map(|m| m.weight_type.clone()))
            .filter(|s| !s.is_empty())
            .context("no weight type given (use --weight-type)")?;

        let mut engine = EngineConfig::new(tokenizer, model_type, weights, weight_type);
        engine.max_length = self
            .context_max_length
            .or_else(|| base.and_then(|m| m.max_length));
        Ok(engine)
    }
}

#[derive(Debug, clap::Args, Clone, Default)]
pub struct ServeArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    /// Listen address (default: from config).
    #[arg(long, env = "GEMMA_HOST")]
    pub host: Option<String>,

    /// Listen port (default: from config).
    #[arg(short, long, env = "GEMMA_PORT")]
    pub port: Option<u16>,
}

#[derive(Debug, clap::Args, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    /// Output bound per reply, in bytes.
    #[arg(long)]
    pub max_length: Option<usize>,

    /// Stop a reply after this many seconds.
    #[arg(long)]
    pub timeout: Option<u64>,
}

#[derive(Debug, clap::Args, Clone)]
pub struct CountArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    /// Text to tokenize.
    pub text: String,
}

#[derive(Debug, clap::Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Display the current configuration.
    Show,
    /// Set a configuration value.
    Set { key: String, value: String },
}

/// Load the engine library and create a context for `model`.
pub fn open_context(
    global: &GlobalArgs,
    model: &ModelArgs,
    cfg: &AppConfig,
) -> anyhow::Result<GemmaContext> {
    let library = global.library.clone().or_else(|| cfg.library_path.clone());
    let backend = GemmaBackend::load(library.as_deref())?;
    let engine = model.resolve(cfg)?;
    Ok(GemmaContext::new(&backend, engine)?)
}
